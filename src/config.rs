//! HTTP transport configuration.

use std::time::Duration;

use crate::auth::AuthConfig;

/// Configuration for the HTTP transport.
///
/// Immutable once a transport is constructed; reconfiguration requires
/// constructing a new transport.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Base URL of the Vespa endpoint (e.g. `http://localhost:8080`).
    pub endpoint: String,
    /// Authentication configuration.
    pub auth: AuthConfig,
    /// Maximum number of retries for failed requests.
    pub retries: u32,
    /// Base delay between retries.
    pub retry_delay: Duration,
    /// Minimum serialized body size that triggers request gzip compression.
    pub compress_limit: usize,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8080".to_string(),
            auth: AuthConfig::None,
            retries: 3,
            retry_delay: Duration::from_millis(100),
            compress_limit: 1024,
            timeout: Duration::from_secs(10),
        }
    }
}

impl HttpConfig {
    /// Create a configuration for the given endpoint with default settings.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }

    /// Create a new configuration builder.
    pub fn builder(endpoint: impl Into<String>) -> HttpConfigBuilder {
        HttpConfigBuilder {
            config: Self::new(endpoint),
        }
    }
}

/// Builder for [`HttpConfig`].
#[derive(Debug)]
pub struct HttpConfigBuilder {
    config: HttpConfig,
}

impl HttpConfigBuilder {
    /// Set the authentication configuration.
    pub fn auth(mut self, auth: AuthConfig) -> Self {
        self.config.auth = auth;
        self
    }

    /// Set the maximum number of retries.
    pub fn retries(mut self, retries: u32) -> Self {
        self.config.retries = retries;
        self
    }

    /// Set the base retry delay.
    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.config.retry_delay = delay;
        self
    }

    /// Set the request-body compression threshold in bytes.
    pub fn compress_limit(mut self, limit: usize) -> Self {
        self.config.compress_limit = limit;
        self
    }

    /// Set the per-request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Build the configuration.
    pub fn build(self) -> HttpConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = HttpConfig::new("http://localhost:8080");
        assert_eq!(config.retries, 3);
        assert_eq!(config.retry_delay, Duration::from_millis(100));
        assert_eq!(config.compress_limit, 1024);
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert!(matches!(config.auth, AuthConfig::None));
    }

    #[test]
    fn builder_overrides_defaults() {
        let config = HttpConfig::builder("https://vespa.example.com")
            .retries(5)
            .retry_delay(Duration::from_millis(250))
            .compress_limit(4096)
            .timeout(Duration::from_secs(30))
            .auth(AuthConfig::Token {
                token: "secret".into(),
            })
            .build();

        assert_eq!(config.endpoint, "https://vespa.example.com");
        assert_eq!(config.retries, 5);
        assert_eq!(config.compress_limit, 4096);
        assert!(matches!(config.auth, AuthConfig::Token { .. }));
    }
}
