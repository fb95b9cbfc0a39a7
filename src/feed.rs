//! Document operations: single feed/update/delete request builders and the
//! concurrent batch feed engine.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::{Stream, StreamExt};
use http::Method;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde_json::{Value, json};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::error;

use crate::error::{Result, VespaError};
use crate::response::{OperationType, VespaResponse};
use crate::transport::{ApiRequest, HttpTransport};

/// Path-segment encoding set matching JavaScript's `encodeURIComponent`.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

fn encode_segment(segment: &str) -> String {
    utf8_percent_encode(segment, PATH_SEGMENT).to_string()
}

/// Document API path for one document.
pub(crate) fn document_path(namespace: &str, schema: &str, data_id: &str) -> String {
    format!(
        "/document/v1/{}/{}/docid/{}",
        encode_segment(namespace),
        encode_segment(schema),
        encode_segment(data_id)
    )
}

/// Kind of document mutation performed by a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DocumentOperationKind {
    /// Create or replace a document (POST).
    #[default]
    Feed,
    /// Partially update a document (PUT).
    Update,
    /// Delete a document (DELETE).
    Delete,
}

/// One document operation, as produced by a caller's source.
///
/// `data_id` is the correlation identifier used to match the operation to its
/// reported outcome.
#[derive(Debug, Clone, Default)]
pub struct DocumentOperation {
    /// Correlation identifier (the document id within its namespace).
    pub data_id: Option<String>,
    /// Schema override for single-document calls. Ignored by batch feeds,
    /// where the batch options name the schema.
    pub schema: Option<String>,
    /// Document fields for feed, or update operations for update.
    pub fields: Option<Value>,
    /// Namespace override; defaults to the schema name.
    pub namespace: Option<String>,
    /// Per-operation timeout forwarded to Vespa.
    pub timeout: Option<Duration>,
    /// Route specification.
    pub route: Option<String>,
    /// Trace level.
    pub tracelevel: Option<u32>,
    /// Condition for conditional mutations.
    pub condition: Option<String>,
    /// Create flag for conditional mutations.
    pub create: Option<bool>,
}

impl DocumentOperation {
    /// Create an operation for the given document id.
    pub fn new(data_id: impl Into<String>) -> Self {
        Self {
            data_id: Some(data_id.into()),
            ..Default::default()
        }
    }

    /// Set the document fields.
    pub fn fields(mut self, fields: Value) -> Self {
        self.fields = Some(fields);
        self
    }

    /// Set the schema for a single-document call.
    pub fn schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    /// Set the namespace.
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Set the condition for a conditional mutation.
    pub fn condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    /// Set the create flag.
    pub fn create(mut self, create: bool) -> Self {
        self.create = Some(create);
        self
    }

    /// Set the per-operation timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

fn common_query(request: ApiRequest, op: &DocumentOperation) -> ApiRequest {
    let mut request = request;
    if let Some(timeout) = op.timeout {
        request = request.query("timeout", format!("{}ms", timeout.as_millis()));
    }
    if let Some(route) = &op.route {
        request = request.query("route", route);
    }
    if let Some(tracelevel) = op.tracelevel {
        request = request.query("tracelevel", tracelevel);
    }
    if let Some(condition) = &op.condition {
        request = request.query("condition", condition);
    }
    request
}

fn resolve_ids<'a>(schema: &'a str, op: &'a DocumentOperation) -> Result<(&'a str, &'a str)> {
    let data_id = op
        .data_id
        .as_deref()
        .ok_or_else(|| VespaError::Configuration("missing 'data_id' for document operation".into()))?;
    let namespace = op.namespace.as_deref().unwrap_or(schema);
    Ok((namespace, data_id))
}

/// Build the request for a single feed (create or replace) operation.
pub(crate) fn feed_request(schema: &str, op: &DocumentOperation) -> Result<ApiRequest> {
    let fields = op
        .fields
        .clone()
        .ok_or_else(|| VespaError::Configuration("missing 'fields' for feed operation".into()))?;
    let (namespace, data_id) = resolve_ids(schema, op)?;
    let mut request = ApiRequest::new(Method::POST, document_path(namespace, schema, data_id))
        .operation(OperationType::Feed)
        .json(fields);
    request = common_query(request, op);
    if let Some(create) = op.create {
        request = request.query("create", create);
    }
    Ok(request)
}

/// Build the request for a single update operation.
pub(crate) fn update_request(schema: &str, op: &DocumentOperation) -> Result<ApiRequest> {
    let fields = op
        .fields
        .clone()
        .ok_or_else(|| VespaError::Configuration("missing 'fields' for update operation".into()))?;
    let (namespace, data_id) = resolve_ids(schema, op)?;
    let mut request = ApiRequest::new(Method::PUT, document_path(namespace, schema, data_id))
        .operation(OperationType::Update)
        .json(json!({ "fields": fields }));
    request = common_query(request, op);
    if let Some(create) = op.create {
        request = request.query("create", create);
    }
    Ok(request)
}

/// Build the request for a single delete operation.
pub(crate) fn delete_request(schema: &str, op: &DocumentOperation) -> Result<ApiRequest> {
    let (namespace, data_id) = resolve_ids(schema, op)?;
    let request = ApiRequest::new(Method::DELETE, document_path(namespace, schema, data_id))
        .operation(OperationType::Delete);
    Ok(common_query(request, op))
}

/// Options for a batch feed.
#[derive(Debug, Clone)]
pub struct FeedOptions {
    /// Target schema name.
    pub schema: String,
    /// Namespace applied to items that carry none; defaults to the schema.
    pub namespace: Option<String>,
    /// Which mutation every item performs.
    pub operation: DocumentOperationKind,
    /// Maximum number of operations in flight at once.
    pub max_workers: usize,
    /// Default per-operation timeout for items that carry none.
    pub timeout: Option<Duration>,
    /// Default route for items that carry none.
    pub route: Option<String>,
    /// Default trace level for items that carry none.
    pub tracelevel: Option<u32>,
    /// Default condition for items that carry none.
    pub condition: Option<String>,
    /// Default create flag for items that carry none.
    pub create: Option<bool>,
}

impl FeedOptions {
    /// Options for feeding into the given schema with defaults
    /// (feed operation, 50 workers).
    pub fn new(schema: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            namespace: None,
            operation: DocumentOperationKind::Feed,
            max_workers: 50,
            timeout: None,
            route: None,
            tracelevel: None,
            condition: None,
            create: None,
        }
    }

    /// Set the operation kind.
    pub fn operation(mut self, operation: DocumentOperationKind) -> Self {
        self.operation = operation;
        self
    }

    /// Set the namespace default.
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Set the concurrency cap.
    pub fn max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers;
        self
    }

    /// Set the default per-operation timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the default condition.
    pub fn condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    /// Set the default create flag.
    pub fn create(mut self, create: bool) -> Self {
        self.create = Some(create);
        self
    }

    /// Fill fields the item leaves unset with the batch-wide defaults. The
    /// item's own values win.
    fn merge(&self, mut op: DocumentOperation) -> DocumentOperation {
        op.namespace = op.namespace.or_else(|| self.namespace.clone());
        op.timeout = op.timeout.or(self.timeout);
        op.route = op.route.or_else(|| self.route.clone());
        op.tracelevel = op.tracelevel.or(self.tracelevel);
        op.condition = op.condition.or_else(|| self.condition.clone());
        op.create = op.create.or(self.create);
        op
    }
}

/// Outcome of one batch item, delivered to the result sink.
#[derive(Debug)]
pub struct FeedOutcome {
    /// The item's correlation identifier, or `"unknown"` when the item
    /// carried none.
    pub id: String,
    /// The item's response or classified error.
    pub result: Result<VespaResponse>,
}

/// Drain a stream of document operations through the transport with at most
/// `max_workers` operations in flight, reporting each outcome to `sink`.
///
/// Items are pulled from the source sequentially and without bound; only
/// execution is gated. Items missing a `data_id` are reported to the sink as
/// Configuration errors under the id `"unknown"` and consume no concurrency
/// slot. A single item's failure never fails the batch, and a panicking sink
/// is caught and logged. Resolves once the source is drained and every
/// scheduled operation, including its sink delivery, has finished.
///
/// Result delivery order is not the source order; completions race on network
/// latency. Callers needing ordered results must reorder by `id`.
pub async fn feed_iterable<S, F>(
    transport: &HttpTransport,
    mut source: S,
    options: FeedOptions,
    sink: F,
) -> Result<()>
where
    S: Stream<Item = DocumentOperation> + Unpin,
    F: Fn(FeedOutcome) + Send + Sync + 'static,
{
    if options.schema.is_empty() {
        return Err(VespaError::Configuration(
            "schema must be provided for a batch feed".into(),
        ));
    }
    if options.max_workers == 0 {
        return Err(VespaError::Configuration(
            "max_workers must be at least 1".into(),
        ));
    }

    let sink: Arc<dyn Fn(FeedOutcome) + Send + Sync> = Arc::new(sink);
    let gate = Arc::new(Semaphore::new(options.max_workers));
    let options = Arc::new(options);
    let mut tasks: JoinSet<()> = JoinSet::new();

    while let Some(item) = source.next().await {
        let Some(id) = item.data_id.clone() else {
            deliver(
                &sink,
                FeedOutcome {
                    id: "unknown".into(),
                    result: Err(VespaError::Configuration(
                        "missing 'data_id' in document from source".into(),
                    )),
                },
            );
            continue;
        };

        let transport = transport.clone();
        let options = Arc::clone(&options);
        let gate = Arc::clone(&gate);
        let sink = Arc::clone(&sink);
        tasks.spawn(async move {
            // The gate outlives every task, so acquisition only fails if the
            // semaphore is closed, which never happens here.
            let _permit = gate.acquire_owned().await.ok();
            let result = execute_item(&transport, &options, item).await;
            deliver(&sink, FeedOutcome { id, result });
        });
    }

    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined {
            error!(error = %e, "batch feed task failed to join");
        }
    }

    Ok(())
}

async fn execute_item(
    transport: &HttpTransport,
    options: &FeedOptions,
    item: DocumentOperation,
) -> Result<VespaResponse> {
    let op = options.merge(item);
    let request = match options.operation {
        DocumentOperationKind::Feed => feed_request(&options.schema, &op)?,
        DocumentOperationKind::Update => update_request(&options.schema, &op)?,
        DocumentOperationKind::Delete => delete_request(&options.schema, &op)?,
    };
    transport.execute(request).await
}

/// The sink is an untrusted boundary: a panic inside it is caught and logged
/// so it cannot abort the remaining items.
fn deliver(sink: &Arc<dyn Fn(FeedOutcome) + Send + Sync>, outcome: FeedOutcome) {
    let id = outcome.id.clone();
    if std::panic::catch_unwind(AssertUnwindSafe(|| (**sink)(outcome))).is_err() {
        error!(id = %id, "feed result sink panicked");
    }
}
