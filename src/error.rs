//! Client error types.

use serde_json::Value;
use thiserror::Error;

/// Result type for Vespa client operations.
pub type Result<T> = std::result::Result<T, VespaError>;

/// Errors produced by the Vespa client.
///
/// HTTP-level failures (non-2xx responses) are classified into [`VespaError::Http`]
/// or [`VespaError::Server`] rather than surfaced as raw transport errors, so a
/// caller can distinguish a permanent 4xx from an exhausted-retry 5xx by status
/// code alone.
#[derive(Debug, Error)]
pub enum VespaError {
    /// Invalid or missing caller input, detected before any network call.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Credential material could not be loaded or is otherwise invalid.
    #[error("authentication error: {0}")]
    Authentication(String),

    /// Application deployment failed.
    #[error("deployment error: {0}")]
    Deployment(String),

    /// A non-2xx response without a recognizable structured error payload.
    ///
    /// Also covers "no response received" transport failures, which carry a
    /// 503 status proxy and no body.
    #[error("{message} (status: {status}, url: {url})")]
    Http {
        /// Human-readable failure message.
        message: String,
        /// HTTP status code, or 503 when no response was received.
        status: u16,
        /// The URL that was requested.
        url: String,
        /// Raw response body, if one was received.
        body: Option<Value>,
    },

    /// A non-2xx response carrying Vespa's structured error list.
    #[error("{message} (status: {status}, url: {url})")]
    Server {
        /// Message from the response body, or a generic status message.
        message: String,
        /// HTTP status code.
        status: u16,
        /// The URL that was requested.
        url: String,
        /// The full parsed response body.
        body: Value,
        /// Entries from `root.errors` or the top-level `errors` array.
        errors: Vec<Value>,
    },

    /// Request setup or other unclassifiable transport failure.
    #[error("request failed: {0}")]
    Request(String),
}

impl VespaError {
    /// HTTP status code, for errors that carry one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } | Self::Server { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Requested URL, for errors that carry one.
    pub fn url(&self) -> Option<&str> {
        match self {
            Self::Http { url, .. } | Self::Server { url, .. } => Some(url),
            _ => None,
        }
    }

    /// Structured error list from the server, for [`VespaError::Server`].
    pub fn server_errors(&self) -> Option<&[Value]> {
        match self {
            Self::Server { errors, .. } => Some(errors),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_error_display_includes_status_and_url() {
        let err = VespaError::Http {
            message: "request failed with status 404".into(),
            status: 404,
            url: "http://localhost:8080/search/".into(),
            body: None,
        };
        let text = err.to_string();
        assert!(text.contains("404"));
        assert!(text.contains("/search/"));
    }

    #[test]
    fn accessors_return_carried_fields() {
        let err = VespaError::Server {
            message: "cond failed".into(),
            status: 412,
            url: "http://localhost:8080/document/v1/ns/s/docid/1".into(),
            body: serde_json::json!({"message": "cond failed"}),
            errors: vec![serde_json::json!({"code": 12})],
        };
        assert_eq!(err.status(), Some(412));
        assert_eq!(err.server_errors().unwrap().len(), 1);

        let cfg = VespaError::Configuration("missing schema".into());
        assert_eq!(cfg.status(), None);
        assert!(cfg.server_errors().is_none());
    }
}
