//! Query request construction.

use std::time::Duration;

use http::Method;
use serde_json::{Map, Value};

use crate::error::{Result, VespaError};
use crate::response::OperationType;
use crate::transport::ApiRequest;

/// Parameters for a search query.
///
/// YQL travels as a URL query-string parameter; `timeout`, `route`,
/// `tracelevel`, `ranking`, `model`, and any extras travel in the JSON body.
/// The request is a GET when the final body is empty, a POST otherwise.
#[derive(Debug, Clone, Default)]
pub struct QueryParams {
    /// YQL query string.
    pub yql: Option<String>,
    /// Additional URL query-string parameters.
    pub query: Vec<(String, String)>,
    /// Explicit request body; merged with the other parameters.
    pub body: Option<Value>,
    /// Group name for streaming search (query-string parameter).
    pub groupname: Option<String>,
    /// Query timeout.
    pub timeout: Option<Duration>,
    /// Route specification.
    pub route: Option<String>,
    /// Trace level.
    pub tracelevel: Option<u32>,
    /// Ranking profile name or configuration.
    pub ranking: Option<Value>,
    /// Model restriction.
    pub model: Option<Value>,
    /// Arbitrary extra body parameters.
    pub extra: Map<String, Value>,
}

impl QueryParams {
    /// Query with the given YQL string.
    pub fn yql(yql: impl Into<String>) -> Self {
        Self {
            yql: Some(yql.into()),
            ..Default::default()
        }
    }

    /// Query with an explicit body.
    pub fn body(body: Value) -> Self {
        Self {
            body: Some(body),
            ..Default::default()
        }
    }

    /// Append a URL query-string parameter.
    pub fn param(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    /// Set the query timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the ranking profile.
    pub fn ranking(mut self, ranking: Value) -> Self {
        self.ranking = Some(ranking);
        self
    }

    /// Add an extra body parameter.
    pub fn extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

/// Build the transport request for a query.
pub(crate) fn query_request(params: &QueryParams) -> Result<ApiRequest> {
    let mut body = match &params.body {
        Some(Value::Object(map)) => map.clone(),
        Some(_) => {
            return Err(VespaError::Configuration(
                "query body must be a JSON object".into(),
            ));
        }
        None => Map::new(),
    };

    let mut request = ApiRequest::new(Method::GET, "/search/").operation(OperationType::Query);

    // YQL is a query-string parameter; it may come from either the yql field
    // or the body, but not both.
    if let Some(Value::String(body_yql)) = body.remove("yql") {
        if params.yql.is_some() {
            return Err(VespaError::Configuration(
                "YQL cannot be specified in both 'yql' and 'body.yql'".into(),
            ));
        }
        request = request.query("yql", body_yql);
    } else if let Some(yql) = &params.yql {
        request = request.query("yql", yql);
    }

    for (key, value) in &params.query {
        request = request.query(key, value);
    }
    if let Some(groupname) = &params.groupname {
        request = request.query("groupname", groupname);
    }

    // Known parameters fill the body only where the explicit body left gaps.
    if let Some(timeout) = params.timeout {
        body.entry("timeout".to_string())
            .or_insert_with(|| Value::String(format!("{}ms", timeout.as_millis())));
    }
    if let Some(route) = &params.route {
        body.entry("route".to_string())
            .or_insert_with(|| Value::String(route.clone()));
    }
    if let Some(tracelevel) = params.tracelevel {
        body.entry("tracelevel".to_string())
            .or_insert_with(|| Value::from(tracelevel));
    }
    if let Some(ranking) = &params.ranking {
        body.entry("ranking".to_string()).or_insert_with(|| ranking.clone());
    }
    if let Some(model) = &params.model {
        body.entry("model".to_string()).or_insert_with(|| model.clone());
    }
    for (key, value) in &params.extra {
        body.entry(key.clone()).or_insert_with(|| value.clone());
    }

    if !body.is_empty() {
        request.method = Method::POST;
        request = request.json(Value::Object(body));
    }
    Ok(request)
}
