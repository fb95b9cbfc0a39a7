//! HTTP transport: request execution with compression, retry, and error
//! classification.

use std::io::{Read, Write};
use std::sync::Arc;

use bytes::Bytes;
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use http::Method;
use http::header::{ACCEPT, ACCEPT_ENCODING, CONTENT_ENCODING, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::auth::{AuthConfig, resolve_mtls, token_headers};
use crate::config::HttpConfig;
use crate::error::{Result, VespaError};
use crate::response::{OperationType, VespaResponse};
use crate::retry::RetryPolicy;

/// Request body accepted by the transport.
#[derive(Debug, Clone, Default)]
pub enum RequestBody {
    /// No body.
    #[default]
    None,
    /// Structured JSON body, serialized (and possibly gzipped) by the transport.
    Json(Value),
    /// Pre-built multipart form, sent verbatim and never compressed.
    Multipart(MultipartPayload),
}

/// A multipart form described as plain data, so the transport can rebuild the
/// wire form for every retry attempt.
#[derive(Debug, Clone, Default)]
pub struct MultipartPayload {
    parts: Vec<MultipartPart>,
}

/// One file part of a multipart payload.
#[derive(Debug, Clone)]
pub struct MultipartPart {
    /// Form field name.
    pub name: String,
    /// File name reported in the part headers.
    pub file_name: String,
    /// MIME type of the part.
    pub mime_type: String,
    /// Part content.
    pub data: Bytes,
}

impl MultipartPayload {
    /// Create an empty payload.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a file part.
    pub fn file_part(
        mut self,
        name: impl Into<String>,
        file_name: impl Into<String>,
        mime_type: impl Into<String>,
        data: impl Into<Bytes>,
    ) -> Self {
        self.parts.push(MultipartPart {
            name: name.into(),
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            data: data.into(),
        });
        self
    }

    /// The parts of this payload.
    pub fn parts(&self) -> &[MultipartPart] {
        &self.parts
    }

    fn to_form(&self) -> Result<reqwest::multipart::Form> {
        let mut form = reqwest::multipart::Form::new();
        for part in &self.parts {
            let piece = reqwest::multipart::Part::bytes(part.data.to_vec())
                .file_name(part.file_name.clone())
                .mime_str(&part.mime_type)
                .map_err(|e| {
                    VespaError::Configuration(format!(
                        "invalid MIME type {:?} for multipart part {:?}: {e}",
                        part.mime_type, part.name
                    ))
                })?;
            form = form.part(part.name.clone(), piece);
        }
        Ok(form)
    }
}

/// One request through the transport: method, path, query, body, extra
/// headers, and an operation label for diagnostics.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    /// HTTP method.
    pub method: Method,
    /// Path relative to the configured endpoint, already percent-encoded.
    pub path: String,
    /// Query parameters.
    pub query: Vec<(String, String)>,
    /// Request body.
    pub body: RequestBody,
    /// Extra headers merged onto the transport's defaults.
    pub headers: HeaderMap,
    /// Operation label carried into the response envelope.
    pub operation: OperationType,
}

impl ApiRequest {
    /// Create a request with no query, body, or extra headers.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: RequestBody::None,
            headers: HeaderMap::new(),
            operation: OperationType::Unknown,
        }
    }

    /// Tag the request with an operation label.
    pub fn operation(mut self, operation: OperationType) -> Self {
        self.operation = operation;
        self
    }

    /// Append a query parameter.
    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    /// Set a JSON body.
    pub fn json(mut self, body: Value) -> Self {
        self.body = RequestBody::Json(body);
        self
    }

    /// Set a multipart body.
    pub fn multipart(mut self, payload: MultipartPayload) -> Self {
        self.body = RequestBody::Multipart(payload);
        self
    }

    /// Add an extra header. Invalid header names or values are ignored.
    pub fn header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        if let (Ok(name), Ok(value)) = (
            http::header::HeaderName::try_from(name.as_ref()),
            HeaderValue::try_from(value.as_ref()),
        ) {
            self.headers.insert(name, value);
        }
        self
    }
}

/// Body as prepared for the wire, reusable across retry attempts.
enum PreparedBody {
    Empty,
    Bytes(Bytes),
    Multipart(MultipartPayload),
}

/// HTTP transport to a Vespa endpoint.
///
/// Owns one connection pool carrying the configured credentials. Cheap to
/// clone; clones share the pool and configuration.
#[derive(Clone)]
pub struct HttpTransport {
    inner: reqwest::Client,
    config: Arc<HttpConfig>,
    policy: RetryPolicy,
}

impl HttpTransport {
    /// Build a transport from the given configuration.
    ///
    /// mTLS certificate and key files are read eagerly here so that
    /// misconfiguration surfaces immediately rather than on the first request.
    pub fn new(config: HttpConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("gzip, deflate"));
        if let AuthConfig::Token { token } = &config.auth {
            headers.extend(token_headers(token));
        }

        let mut builder = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(format!("vespa-client/{}", env!("CARGO_PKG_VERSION")))
            .default_headers(headers);

        if let AuthConfig::Mtls {
            cert_path,
            key_path,
            ca_cert_path,
        } = &config.auth
        {
            let identity = resolve_mtls(cert_path, key_path, ca_cert_path.as_ref())?;
            builder = builder.identity(identity.identity);
            if let Some(ca) = identity.ca_cert {
                builder = builder.add_root_certificate(ca);
            }
            if identity.accept_invalid_certs {
                warn!("no CA certificate configured; server certificate validation is disabled");
                builder = builder.danger_accept_invalid_certs(true);
            }
        }

        let inner = builder
            .build()
            .map_err(|e| VespaError::Configuration(format!("failed to build HTTP client: {e}")))?;

        let policy = RetryPolicy::new(config.retries, config.retry_delay);

        Ok(Self {
            inner,
            config: Arc::new(config),
            policy,
        })
    }

    /// The transport configuration.
    pub fn config(&self) -> &HttpConfig {
        &self.config
    }

    /// Whether this transport carries a credential (token or mTLS).
    pub fn is_authenticated(&self) -> bool {
        self.config.auth.is_authenticated()
    }

    /// Execute one request to completion.
    ///
    /// Applies request compression, retry with backoff, response gunzip, and
    /// success/error classification. Returns the normalized envelope on 2xx
    /// and a classified [`VespaError`] otherwise; non-2xx statuses are never
    /// surfaced as raw transport errors.
    pub async fn execute(&self, request: ApiRequest) -> Result<VespaResponse> {
        let url = self.build_url(&request)?;
        let mut headers = request.headers;
        let body = self.prepare_body(request.body, &mut headers);
        let operation = request.operation;

        let mut attempt: u32 = 0;
        loop {
            let mut pending = self
                .inner
                .request(request.method.clone(), url.clone())
                .headers(headers.clone());
            match &body {
                PreparedBody::Empty => {}
                PreparedBody::Bytes(bytes) => pending = pending.body(bytes.clone()),
                PreparedBody::Multipart(payload) => pending = pending.multipart(payload.to_form()?),
            }

            match pending.send().await {
                Ok(response) => {
                    let status = response.status().as_u16();
                    if self.policy.should_retry_status(status)
                        && self.policy.attempts_remaining(attempt)
                    {
                        attempt += 1;
                        debug!(attempt, status, operation = %operation, "retrying after server error status");
                        tokio::time::sleep(self.policy.delay_for_attempt(attempt)).await;
                        continue;
                    }
                    return self.handle_response(response, operation).await;
                }
                Err(e) => {
                    if is_network_error(&e) && self.policy.attempts_remaining(attempt) {
                        attempt += 1;
                        debug!(attempt, error = %e, operation = %operation, "retrying after network error");
                        tokio::time::sleep(self.policy.delay_for_attempt(attempt)).await;
                        continue;
                    }
                    return Err(classify_transport_error(e, url.as_str()));
                }
            }
        }
    }

    fn build_url(&self, request: &ApiRequest) -> Result<Url> {
        let mut url = Url::parse(&self.config.endpoint)
            .map_err(|e| VespaError::Configuration(format!("invalid endpoint URL: {e}")))?;
        // Append to any path prefix on the endpoint rather than resolving
        // against it, so an endpoint like "http://host/vespa" keeps its
        // prefix for every request path.
        let path = format!(
            "{}/{}",
            url.path().trim_end_matches('/'),
            request.path.trim_start_matches('/')
        );
        url.set_path(&path);
        if !request.query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &request.query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    /// Serialize and, above the configured threshold, gzip a JSON body.
    /// Compression failure falls back to the uncompressed bytes.
    fn prepare_body(&self, body: RequestBody, headers: &mut HeaderMap) -> PreparedBody {
        match body {
            RequestBody::None => PreparedBody::Empty,
            RequestBody::Multipart(payload) => PreparedBody::Multipart(payload),
            RequestBody::Json(value) => {
                let serialized = value.to_string().into_bytes();
                headers.insert(
                    CONTENT_TYPE,
                    HeaderValue::from_static("application/json; charset=utf-8"),
                );
                if serialized.len() >= self.config.compress_limit {
                    match gzip(&serialized) {
                        Ok(compressed) => {
                            headers.insert(CONTENT_ENCODING, HeaderValue::from_static("gzip"));
                            return PreparedBody::Bytes(Bytes::from(compressed));
                        }
                        Err(e) => {
                            warn!(error = %e, "failed to gzip request body, sending uncompressed");
                        }
                    }
                }
                PreparedBody::Bytes(Bytes::from(serialized))
            }
        }
    }

    async fn handle_response(
        &self,
        response: reqwest::Response,
        operation: OperationType,
    ) -> Result<VespaResponse> {
        let status = response.status().as_u16();
        let url = response.url().to_string();
        let gzipped = response
            .headers()
            .get(CONTENT_ENCODING)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.eq_ignore_ascii_case("gzip"));

        let raw = response
            .bytes()
            .await
            .map_err(|e| VespaError::Request(format!("failed to read response body: {e}")))?;

        // A zero-length gzip body is not run through the decoder.
        let body = if gzipped && !raw.is_empty() {
            match gunzip(&raw) {
                Ok(decoded) => Bytes::from(decoded),
                Err(e) => {
                    warn!(error = %e, url = %url, "failed to decompress gzipped response, using raw body");
                    raw
                }
            }
        } else {
            raw
        };

        // Parse failures are tolerated: the text form is kept, the JSON form
        // stays empty.
        let mut text: Option<String> = None;
        let mut json: Option<Value> = None;
        if !body.is_empty()
            && let Ok(decoded) = std::str::from_utf8(&body)
        {
            text = Some(decoded.to_string());
            json = serde_json::from_str(decoded).ok();
        }

        if !(200..300).contains(&status) {
            return Err(classify_failure_status(status, url, json, text));
        }

        Ok(VespaResponse::new(status, url, json, text, operation))
    }
}

fn classify_failure_status(
    status: u16,
    url: String,
    json: Option<Value>,
    text: Option<String>,
) -> VespaError {
    if let Some(json) = json {
        let message = json
            .get("message")
            .and_then(|m| m.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| format!("request failed with status {status}"));
        if let Some(errors) = extract_error_list(&json) {
            return VespaError::Server {
                message,
                status,
                url,
                body: json,
                errors,
            };
        }
        return VespaError::Http {
            message,
            status,
            url,
            body: Some(json),
        };
    }
    VespaError::Http {
        message: format!("request failed with status {status}"),
        status,
        url,
        body: text.map(Value::String),
    }
}

/// Vespa error lists live at `root.errors` (query API) or as a top-level
/// `errors` array (document API).
fn extract_error_list(json: &Value) -> Option<Vec<Value>> {
    if let Some(errors) = json
        .get("root")
        .and_then(|root| root.get("errors"))
        .and_then(Value::as_array)
    {
        return Some(errors.clone());
    }
    json.get("errors").and_then(Value::as_array).cloned()
}

/// Whether a reqwest error means no usable response was received.
fn is_network_error(error: &reqwest::Error) -> bool {
    error.is_connect() || error.is_timeout() || (error.is_request() && error.status().is_none())
}

fn classify_transport_error(error: reqwest::Error, url: &str) -> VespaError {
    if error.is_builder() {
        return VespaError::Request(format!("request setup failed: {error}"));
    }
    if let Some(status) = error.status() {
        return VespaError::Http {
            message: format!("request failed with status {status}"),
            status: status.as_u16(),
            url: url.to_string(),
            body: None,
        };
    }
    // No response received; 503 stands in for the missing status.
    VespaError::Http {
        message: format!("no response received from server at {url}: {error}"),
        status: 503,
        url: url.to_string(),
        body: None,
    }
}

fn gzip(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}

fn gunzip(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut decoded = Vec::new();
    GzDecoder::new(data).read_to_end(&mut decoded)?;
    Ok(decoded)
}
