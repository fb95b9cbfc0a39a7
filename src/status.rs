//! Application status and model-evaluation endpoint lookups.

use http::Method;
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};

use crate::response::OperationType;
use crate::transport::ApiRequest;

/// Request for `/ApplicationStatus`.
pub(crate) fn status_request() -> ApiRequest {
    ApiRequest::new(Method::GET, "/ApplicationStatus").operation(OperationType::Status)
}

/// Request for `/model-evaluation/v1/`, optionally narrowed to one model.
pub(crate) fn model_endpoint_request(model_id: Option<&str>) -> ApiRequest {
    let path = match model_id {
        Some(id) => format!(
            "/model-evaluation/v1/{}",
            utf8_percent_encode(id, NON_ALPHANUMERIC)
        ),
        None => "/model-evaluation/v1/".to_string(),
    };
    ApiRequest::new(Method::GET, path).operation(OperationType::ModelEndpoint)
}
