//! Application deployment to Vespa Cloud.

use http::Method;
use tracing::info;

use crate::application::ApplicationPackage;
use crate::error::{Result, VespaError};
use crate::response::{DeployResponse, OperationType};
use crate::transport::{ApiRequest, HttpTransport, MultipartPayload};

/// Options for deploying an application package.
#[derive(Debug, Clone)]
pub struct DeployOptions {
    /// Vespa Cloud tenant name.
    pub tenant: String,
    /// Vespa Cloud application name.
    pub application: String,
    /// Instance name; defaults to `default`.
    pub instance: Option<String>,
}

impl DeployOptions {
    /// Deployment options for the given tenant and application.
    pub fn new(tenant: impl Into<String>, application: impl Into<String>) -> Self {
        Self {
            tenant: tenant.into(),
            application: application.into(),
            instance: None,
        }
    }

    /// Set the instance name.
    pub fn instance(mut self, instance: impl Into<String>) -> Self {
        self.instance = Some(instance.into());
        self
    }
}

/// Zip the package and upload it to the Vespa Cloud deploy API.
///
/// Requires an authenticated transport (token or mTLS).
pub(crate) async fn deploy_application(
    transport: &HttpTransport,
    package: &ApplicationPackage,
    options: &DeployOptions,
) -> Result<DeployResponse> {
    if !transport.is_authenticated() {
        return Err(VespaError::Authentication(
            "authentication (mTLS or token) is required for Vespa Cloud deployment".into(),
        ));
    }
    if options.tenant.is_empty() {
        return Err(VespaError::Configuration(
            "Vespa Cloud tenant name is required for deployment".into(),
        ));
    }
    if options.application.is_empty() {
        return Err(VespaError::Configuration(
            "Vespa Cloud application name is required for deployment".into(),
        ));
    }

    let zip = package
        .to_zip_bytes()
        .map_err(|e| VespaError::Deployment(format!("failed to create application package zip: {e}")))?;

    let instance = options.instance.as_deref().unwrap_or("default");
    let path = format!(
        "/application/v4/tenant/{}/application/{}/instance/{}/deploy",
        options.tenant, options.application, instance
    );

    let payload =
        MultipartPayload::new().file_part("applicationZip", "application.zip", "application/zip", zip);

    let request = ApiRequest::new(Method::POST, path)
        .operation(OperationType::Deploy)
        .multipart(payload);

    let response = DeployResponse::new(transport.execute(request).await?);
    info!(
        tenant = %options.tenant,
        application = %options.application,
        instance = %instance,
        session_id = response.session_id().as_deref().unwrap_or("unknown"),
        "deployment initiated"
    );
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HttpConfig;

    #[tokio::test]
    async fn unauthenticated_transport_cannot_deploy() {
        let transport = HttpTransport::new(HttpConfig::new("http://localhost:8080")).unwrap();
        let package = ApplicationPackage::new("app").unwrap();
        let err = deploy_application(&transport, &package, &DeployOptions::new("tenant", "app"))
            .await
            .unwrap_err();
        assert!(matches!(err, VespaError::Authentication(_)));
    }

    #[tokio::test]
    async fn empty_tenant_is_a_configuration_error() {
        let config = HttpConfig::builder("http://localhost:8080")
            .auth(crate::auth::AuthConfig::Token { token: "t".into() })
            .build();
        let transport = HttpTransport::new(config).unwrap();
        let package = ApplicationPackage::new("app").unwrap();
        let err = deploy_application(&transport, &package, &DeployOptions::new("", "app"))
            .await
            .unwrap_err();
        assert!(matches!(err, VespaError::Configuration(_)));
    }
}
