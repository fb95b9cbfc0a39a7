//! # Vespa Client
//!
//! An async client for a Vespa search engine's HTTP APIs: query, single and
//! batched document feeding, application status, and application deployment.
//!
//! ## Features
//!
//! - **Single execution path**: every request flows through one transport
//!   that applies authentication, request gzip compression, retry with
//!   exponential backoff and jitter, and structured error classification
//! - **Concurrent feeding**: drain a stream of document operations under a
//!   concurrency cap, with per-item failure isolation and result reporting
//! - **Authentication**: none, bearer token, or mutual TLS
//! - **Typed errors**: 4xx/5xx responses become classified [`VespaError`]
//!   values carrying status, URL, and Vespa's structured error list
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use vespa_client::{DocumentOperation, QueryParams, VespaClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = VespaClient::connect("http://localhost:8080")?;
//!
//!     client
//!         .feed(
//!             DocumentOperation::new("1")
//!                 .schema("doc")
//!                 .fields(serde_json::json!({"title": "hello"})),
//!         )
//!         .await?;
//!
//!     let results = client
//!         .query(QueryParams::yql("select * from doc where true"))
//!         .await?;
//!     println!("{} hits", results.hits().len());
//!     Ok(())
//! }
//! ```
//!
//! ## Batch Feeding
//!
//! ```rust,no_run
//! use futures::stream;
//! use vespa_client::{DocumentOperation, FeedOptions, VespaClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = VespaClient::connect("http://localhost:8080")?;
//!
//!     let docs = stream::iter((0..1000).map(|i| {
//!         DocumentOperation::new(i.to_string())
//!             .fields(serde_json::json!({"title": format!("doc {i}")}))
//!     }));
//!
//!     client
//!         .feed_iterable(docs, FeedOptions::new("doc").max_workers(50), |outcome| {
//!             if let Err(e) = outcome.result {
//!                 eprintln!("{}: {e}", outcome.id);
//!             }
//!         })
//!         .await?;
//!     Ok(())
//! }
//! ```

mod application;
mod auth;
mod client;
mod config;
mod deploy;
mod error;
mod feed;
mod query;
mod response;
mod retry;
mod status;
mod transport;

pub use application::{ApplicationPackage, Schema};
pub use auth::{AuthConfig, ClientIdentity, resolve_mtls, token_headers};
pub use client::VespaClient;
pub use config::{HttpConfig, HttpConfigBuilder};
pub use deploy::DeployOptions;
pub use error::{Result, VespaError};
pub use feed::{
    DocumentOperation, DocumentOperationKind, FeedOptions, FeedOutcome, feed_iterable,
};
pub use query::QueryParams;
pub use response::{
    DeployResponse, Hit, ModelEndpointResponse, OperationType, QueryResponse, StatusResponse,
    VespaResponse,
};
pub use retry::RetryPolicy;
pub use transport::{ApiRequest, HttpTransport, MultipartPayload, MultipartPart, RequestBody};

// Re-export common types
pub use http::Method;
pub use serde_json::Value;

/// Prelude for common imports.
///
/// ```
/// use vespa_client::prelude::*;
/// ```
pub mod prelude {
    pub use crate::application::{ApplicationPackage, Schema};
    pub use crate::auth::AuthConfig;
    pub use crate::client::VespaClient;
    pub use crate::config::HttpConfig;
    pub use crate::deploy::DeployOptions;
    pub use crate::error::{Result, VespaError};
    pub use crate::feed::{DocumentOperation, DocumentOperationKind, FeedOptions, FeedOutcome};
    pub use crate::query::QueryParams;
    pub use crate::response::{QueryResponse, VespaResponse};
    pub use crate::transport::{ApiRequest, HttpTransport};
    pub use http::Method;
}
