//! Top-level client facade.

use futures::Stream;

use crate::application::ApplicationPackage;
use crate::config::HttpConfig;
use crate::deploy::{DeployOptions, deploy_application};
use crate::error::{Result, VespaError};
use crate::feed::{
    DocumentOperation, FeedOptions, FeedOutcome, delete_request, feed_iterable, feed_request,
    update_request,
};
use crate::query::{QueryParams, query_request};
use crate::response::{
    DeployResponse, ModelEndpointResponse, QueryResponse, StatusResponse, VespaResponse,
};
use crate::status::{model_endpoint_request, status_request};
use crate::transport::HttpTransport;

/// Client for one Vespa application.
///
/// Holds a single [`HttpTransport`] (one connection pool, safe for concurrent
/// use) and optionally an [`ApplicationPackage`] used to infer the schema name
/// for document operations that do not name one.
#[derive(Clone)]
pub struct VespaClient {
    transport: HttpTransport,
    application_package: Option<ApplicationPackage>,
}

impl VespaClient {
    /// Create a client from a transport configuration.
    pub fn new(config: HttpConfig) -> Result<Self> {
        Ok(Self {
            transport: HttpTransport::new(config)?,
            application_package: None,
        })
    }

    /// Create a client for the given endpoint with default settings and no
    /// authentication.
    pub fn connect(endpoint: impl Into<String>) -> Result<Self> {
        Self::new(HttpConfig::new(endpoint))
    }

    /// Associate an application package with this client.
    pub fn with_application_package(mut self, package: ApplicationPackage) -> Self {
        self.application_package = Some(package);
        self
    }

    /// The underlying transport.
    pub fn transport(&self) -> &HttpTransport {
        &self.transport
    }

    /// The associated application package, if any.
    pub fn application_package(&self) -> Option<&ApplicationPackage> {
        self.application_package.as_ref()
    }

    /// Run a search query.
    pub async fn query(&self, params: QueryParams) -> Result<QueryResponse> {
        let request = query_request(&params)?;
        Ok(QueryResponse::new(self.transport.execute(request).await?))
    }

    /// Feed (create or replace) a single document.
    pub async fn feed(&self, op: DocumentOperation) -> Result<VespaResponse> {
        let schema = self.resolve_schema(op.schema.as_deref(), "feed")?;
        let request = feed_request(&schema, &op)?;
        self.transport.execute(request).await
    }

    /// Update a single document.
    pub async fn update(&self, op: DocumentOperation) -> Result<VespaResponse> {
        let schema = self.resolve_schema(op.schema.as_deref(), "update")?;
        let request = update_request(&schema, &op)?;
        self.transport.execute(request).await
    }

    /// Delete a single document.
    pub async fn delete(&self, op: DocumentOperation) -> Result<VespaResponse> {
        let schema = self.resolve_schema(op.schema.as_deref(), "delete")?;
        let request = delete_request(&schema, &op)?;
        self.transport.execute(request).await
    }

    /// Feed documents from a stream with bounded concurrency, reporting each
    /// outcome to `sink`. See [`feed_iterable`] for the full contract.
    ///
    /// When `options.schema` is empty, the schema is inferred from the
    /// associated application package.
    pub async fn feed_iterable<S, F>(&self, source: S, options: FeedOptions, sink: F) -> Result<()>
    where
        S: Stream<Item = DocumentOperation> + Unpin,
        F: Fn(FeedOutcome) + Send + Sync + 'static,
    {
        let mut options = options;
        if options.schema.is_empty() {
            options.schema = self.resolve_schema(None, "feed_iterable")?;
        }
        feed_iterable(&self.transport, source, options, sink).await
    }

    /// Check the status of the application endpoint.
    pub async fn application_status(&self) -> Result<StatusResponse> {
        Ok(StatusResponse::new(
            self.transport.execute(status_request()).await?,
        ))
    }

    /// Fetch stateless model-evaluation endpoints, optionally for one model.
    pub async fn model_endpoint(&self, model_id: Option<&str>) -> Result<ModelEndpointResponse> {
        Ok(ModelEndpointResponse::new(
            self.transport.execute(model_endpoint_request(model_id)).await?,
        ))
    }

    /// Deploy an application package to Vespa Cloud. Requires token or mTLS
    /// authentication.
    pub async fn deploy(
        &self,
        package: &ApplicationPackage,
        options: &DeployOptions,
    ) -> Result<DeployResponse> {
        deploy_application(&self.transport, package, options).await
    }

    /// Resolve the schema name for an operation: the explicit name when
    /// given, else the associated package's single schema.
    fn resolve_schema(&self, explicit: Option<&str>, operation: &str) -> Result<String> {
        if let Some(schema) = explicit {
            return Ok(schema.to_string());
        }
        let Some(package) = &self.application_package else {
            return Err(VespaError::Configuration(format!(
                "schema name must be provided for {operation} when no application package is associated with the client"
            )));
        };
        let mut names = package.schema_names();
        match names.len() {
            0 => Err(VespaError::Configuration(format!(
                "cannot infer schema name for {operation}: application package has no schemas"
            ))),
            1 => Ok(names.remove(0)),
            _ => Err(VespaError::Configuration(format!(
                "cannot infer schema name for {operation}: application package has multiple schemas, specify one explicitly"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::Schema;

    fn client() -> VespaClient {
        VespaClient::connect("http://localhost:8080").unwrap()
    }

    #[test]
    fn schema_resolution_requires_a_package() {
        let err = client().resolve_schema(None, "feed").unwrap_err();
        assert!(matches!(err, VespaError::Configuration(_)));
    }

    #[test]
    fn schema_resolution_uses_single_package_schema() {
        let mut package = ApplicationPackage::new("app").unwrap();
        package
            .add_schema(&Schema::new("product", "schema product {}").unwrap())
            .unwrap();
        let client = client().with_application_package(package);
        assert_eq!(client.resolve_schema(None, "feed").unwrap(), "product");
        assert_eq!(client.resolve_schema(Some("other"), "feed").unwrap(), "other");
    }

    #[test]
    fn schema_resolution_rejects_ambiguity() {
        let mut package = ApplicationPackage::new("app").unwrap();
        package
            .add_schema(&Schema::new("a", "schema a {}").unwrap())
            .unwrap();
        package
            .add_schema(&Schema::new("b", "schema b {}").unwrap())
            .unwrap();
        let client = client().with_application_package(package);
        let err = client.resolve_schema(None, "update").unwrap_err();
        assert!(err.to_string().contains("multiple schemas"));
    }
}
