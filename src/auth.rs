//! Authentication configuration and credential resolution.

use std::path::PathBuf;

use http::header::{AUTHORIZATION, HeaderMap, HeaderValue};

use crate::error::{Result, VespaError};

/// Authentication configuration for the transport.
///
/// Exactly one variant is active; it determines whether the transport attaches
/// a client-certificate identity to the connection pool or an `Authorization`
/// header to every request.
#[derive(Debug, Clone, Default)]
pub enum AuthConfig {
    /// No authentication.
    #[default]
    None,
    /// Mutual TLS with PEM-encoded certificate and key files.
    Mtls {
        /// Path to the client certificate file (`.pem`).
        cert_path: PathBuf,
        /// Path to the client key file (`.pem`).
        key_path: PathBuf,
        /// Optional path to the CA certificate file (`.pem`).
        ca_cert_path: Option<PathBuf>,
    },
    /// Bearer-token authentication.
    Token {
        /// The secret token.
        token: String,
    },
}

impl AuthConfig {
    /// Whether this configuration carries a credential.
    pub fn is_authenticated(&self) -> bool {
        !matches!(self, Self::None)
    }
}

/// TLS client identity resolved from mTLS configuration.
///
/// Built once per transport so that unreadable certificate or key files fail
/// at construction time rather than on the first request.
#[derive(Debug, Clone)]
pub struct ClientIdentity {
    /// Client certificate and key, ready to attach to the connection pool.
    pub identity: reqwest::Identity,
    /// Trusted CA certificate, when one was configured.
    pub ca_cert: Option<reqwest::Certificate>,
    /// Whether server-certificate validation is disabled.
    ///
    /// **Warning**: when no CA certificate path is supplied, validation of the
    /// server's certificate is turned off entirely. This mirrors the documented
    /// behavior of the upstream client and is a security footgun; supply a CA
    /// certificate in any deployment that talks to an untrusted network.
    pub accept_invalid_certs: bool,
}

/// Load mTLS credential material from the given PEM files.
///
/// The key is appended to the certificate chain to form the client identity.
/// Fails with [`VespaError::Authentication`] if any file cannot be read or the
/// material cannot be parsed.
pub fn resolve_mtls(
    cert_path: &PathBuf,
    key_path: &PathBuf,
    ca_cert_path: Option<&PathBuf>,
) -> Result<ClientIdentity> {
    let mut pem = read_pem(cert_path)?;
    pem.extend_from_slice(&read_pem(key_path)?);

    let identity = reqwest::Identity::from_pem(&pem).map_err(|e| {
        VespaError::Authentication(format!("failed to parse mTLS certificate or key: {e}"))
    })?;

    let ca_cert = match ca_cert_path {
        Some(path) => Some(reqwest::Certificate::from_pem(&read_pem(path)?).map_err(
            |e| VespaError::Authentication(format!("failed to parse CA certificate: {e}")),
        )?),
        None => None,
    };

    // CA validation is enforced only when a CA certificate was provided.
    let accept_invalid_certs = ca_cert.is_none();

    Ok(ClientIdentity {
        identity,
        ca_cert,
        accept_invalid_certs,
    })
}

/// Headers for bearer-token authentication. Pure, cannot fail for any token
/// that is valid header text.
pub fn token_headers(token: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    if let Ok(value) = HeaderValue::from_str(&format!("Bearer {token}")) {
        headers.insert(AUTHORIZATION, value);
    }
    headers
}

fn read_pem(path: &PathBuf) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|e| {
        VespaError::Authentication(format!(
            "failed to read mTLS certificate or key file {}: {e}",
            path.display()
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_headers_set_bearer_authorization() {
        let headers = token_headers("abc123");
        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Bearer abc123");
    }

    #[test]
    fn missing_cert_file_is_an_authentication_error() {
        let err = resolve_mtls(
            &PathBuf::from("/nonexistent/cert.pem"),
            &PathBuf::from("/nonexistent/key.pem"),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, VespaError::Authentication(_)));
        assert!(err.to_string().contains("cert.pem"));
    }

    #[test]
    fn auth_config_reports_authentication() {
        assert!(!AuthConfig::None.is_authenticated());
        assert!(
            AuthConfig::Token {
                token: "t".into()
            }
            .is_authenticated()
        );
    }
}
