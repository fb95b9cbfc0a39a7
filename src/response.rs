//! Normalized response envelope and typed views.

use serde_json::Value;

/// Label identifying which operation produced a response. Carried through the
/// transport for diagnostics only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OperationType {
    /// Search query.
    Query,
    /// Document feed (create or replace).
    Feed,
    /// Partial document update.
    Update,
    /// Document delete.
    Delete,
    /// Application status check.
    Status,
    /// Model-evaluation endpoint lookup.
    ModelEndpoint,
    /// Application deployment.
    Deploy,
    /// Unclassified operation.
    #[default]
    Unknown,
}

impl OperationType {
    /// Stable string form for logging.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Query => "query",
            Self::Feed => "feed",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Status => "status",
            Self::ModelEndpoint => "model-endpoint",
            Self::Deploy => "deploy",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for OperationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized successful response from Vespa.
///
/// At most one decoding of the body is kept in each form: `text` holds the
/// UTF-8 decoding when it succeeded, `json` additionally holds the parsed
/// structure when the text was valid JSON. Both are `None` for empty bodies.
#[derive(Debug, Clone)]
pub struct VespaResponse {
    status: u16,
    url: String,
    json: Option<Value>,
    text: Option<String>,
    operation: OperationType,
}

impl VespaResponse {
    pub(crate) fn new(
        status: u16,
        url: String,
        json: Option<Value>,
        text: Option<String>,
        operation: OperationType,
    ) -> Self {
        Self {
            status,
            url,
            json,
            text,
            operation,
        }
    }

    /// HTTP status code.
    pub fn status_code(&self) -> u16 {
        self.status
    }

    /// The URL that was requested.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Parsed JSON body, if the body decoded as JSON.
    pub fn json(&self) -> Option<&Value> {
        self.json.as_ref()
    }

    /// Raw text body, if the body decoded as UTF-8.
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    /// Whether the status code is in `[200, 300)`.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// The operation that produced this response.
    pub fn operation_type(&self) -> OperationType {
        self.operation
    }
}

/// A single search hit.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct Hit {
    /// Hit identifier.
    pub id: String,
    /// Relevance score.
    #[serde(default)]
    pub relevance: f64,
    /// Source cluster, when reported.
    #[serde(default)]
    pub source: Option<String>,
    /// Document fields.
    #[serde(default)]
    pub fields: Option<Value>,
}

/// Query response view over a [`VespaResponse`].
#[derive(Debug, Clone)]
pub struct QueryResponse {
    response: VespaResponse,
}

impl QueryResponse {
    pub(crate) fn new(response: VespaResponse) -> Self {
        Self { response }
    }

    /// The underlying response envelope.
    pub fn response(&self) -> &VespaResponse {
        &self.response
    }

    /// The `root` object of the query response.
    pub fn root(&self) -> Option<&Value> {
        self.response.json()?.get("root")
    }

    /// Search hits (`root.children`), empty when absent.
    pub fn hits(&self) -> Vec<Hit> {
        self.root()
            .and_then(|root| root.get("children"))
            .and_then(|children| serde_json::from_value(children.clone()).ok())
            .unwrap_or_default()
    }

    /// Total number of matching documents (`root.fields.totalCount`).
    pub fn total_count(&self) -> Option<u64> {
        self.root()?.get("fields")?.get("totalCount")?.as_u64()
    }
}

/// Application-status view over a [`VespaResponse`].
#[derive(Debug, Clone)]
pub struct StatusResponse {
    response: VespaResponse,
}

impl StatusResponse {
    pub(crate) fn new(response: VespaResponse) -> Self {
        Self { response }
    }

    /// The underlying response envelope.
    pub fn response(&self) -> &VespaResponse {
        &self.response
    }

    /// Status code string reported by the application (`status.code`).
    pub fn status(&self) -> Option<&str> {
        self.response.json()?.get("status")?.get("code")?.as_str()
    }
}

/// Model-evaluation endpoint view over a [`VespaResponse`].
#[derive(Debug, Clone)]
pub struct ModelEndpointResponse {
    response: VespaResponse,
}

impl ModelEndpointResponse {
    pub(crate) fn new(response: VespaResponse) -> Self {
        Self { response }
    }

    /// The underlying response envelope.
    pub fn response(&self) -> &VespaResponse {
        &self.response
    }
}

/// Deployment view over a [`VespaResponse`].
#[derive(Debug, Clone)]
pub struct DeployResponse {
    response: VespaResponse,
}

impl DeployResponse {
    pub(crate) fn new(response: VespaResponse) -> Self {
        Self { response }
    }

    /// The underlying response envelope.
    pub fn response(&self) -> &VespaResponse {
        &self.response
    }

    /// Deployment session id, from either the prepare-and-activate wrapper or
    /// the top level of the response body.
    pub fn session_id(&self) -> Option<String> {
        let json = self.response.json()?;
        let id = json
            .get("prepareAndActivateResponse")
            .and_then(|r| r.get("sessionId"))
            .or_else(|| json.get("sessionId"))?;
        match id {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Message reported by the deploy API.
    pub fn message(&self) -> Option<&str> {
        self.response.json()?.get("message")?.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn envelope(json: Value) -> VespaResponse {
        VespaResponse::new(
            200,
            "http://localhost:8080/search/".into(),
            Some(json),
            None,
            OperationType::Query,
        )
    }

    #[test]
    fn success_predicate_covers_2xx_only() {
        let ok = VespaResponse::new(204, "u".into(), None, None, OperationType::Feed);
        assert!(ok.is_success());
        let redirect = VespaResponse::new(302, "u".into(), None, None, OperationType::Feed);
        assert!(!redirect.is_success());
    }

    #[test]
    fn query_view_extracts_hits_and_total_count() {
        let query = QueryResponse::new(envelope(json!({
            "root": {
                "fields": {"totalCount": 2},
                "children": [
                    {"id": "id:ns:doc::1", "relevance": 0.9, "fields": {"title": "a"}},
                    {"id": "id:ns:doc::2", "relevance": 0.5}
                ]
            }
        })));
        assert_eq!(query.total_count(), Some(2));
        let hits = query.hits();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, "id:ns:doc::1");
        assert!(hits[1].fields.is_none());
    }

    #[test]
    fn query_view_is_empty_without_root() {
        let query = QueryResponse::new(envelope(json!({})));
        assert!(query.hits().is_empty());
        assert_eq!(query.total_count(), None);
    }

    #[test]
    fn deploy_view_reads_nested_or_flat_session_id() {
        let nested = DeployResponse::new(envelope(
            json!({"prepareAndActivateResponse": {"sessionId": "42"}}),
        ));
        assert_eq!(nested.session_id().as_deref(), Some("42"));

        let flat = DeployResponse::new(envelope(json!({"sessionId": 7, "message": "ok"})));
        assert_eq!(flat.session_id().as_deref(), Some("7"));
        assert_eq!(flat.message(), Some("ok"));
    }
}
