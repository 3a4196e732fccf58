//! Site configuration.

use std::env;

use crate::auth::{CertificateCredentials, DEFAULT_AUTHORITY_HOST};
use crate::error::{Result, SiteError};

pub const ENV_SITE_URL: &str = "SHAREPOINT_SITE_URL";
pub const ENV_TENANT_ID: &str = "SHAREPOINT_TENANT_ID";
pub const ENV_CLIENT_ID: &str = "SHAREPOINT_CLIENT_ID";
pub const ENV_CERT_THUMBPRINT: &str = "SHAREPOINT_CERT_THUMBPRINT";
pub const ENV_CERT_PEM: &str = "SHAREPOINT_CERT_PEM";
pub const ENV_AUTHORITY_HOST: &str = "SHAREPOINT_AUTHORITY_HOST";

/// Everything a session needs to reach one site.
#[derive(Debug, Clone)]
pub struct SiteConfig {
    /// Absolute site URL, e.g. `https://contoso.sharepoint.com/sites/team`.
    pub site_url: String,
    pub credentials: CertificateCredentials,
    /// Azure AD authority used for token requests.
    pub authority_host: String,
}

impl SiteConfig {
    pub fn new(site_url: impl Into<String>, credentials: CertificateCredentials) -> Self {
        Self {
            site_url: site_url.into(),
            credentials,
            authority_host: DEFAULT_AUTHORITY_HOST.to_string(),
        }
    }

    /// Override the token authority.
    pub fn with_authority_host(mut self, authority_host: impl Into<String>) -> Self {
        self.authority_host = authority_host.into();
        self
    }

    /// Build a configuration from the `SHAREPOINT_*` environment variables.
    pub fn from_env() -> Result<Self> {
        let credentials = CertificateCredentials::new(
            required(ENV_TENANT_ID)?,
            required(ENV_CLIENT_ID)?,
            required(ENV_CERT_THUMBPRINT)?,
            required(ENV_CERT_PEM)?,
        );
        let config = Self::new(required(ENV_SITE_URL)?, credentials);

        Ok(match env::var(ENV_AUTHORITY_HOST) {
            Ok(host) if !host.is_empty() => config.with_authority_host(host),
            _ => config,
        })
    }
}

fn required(name: &str) -> Result<String> {
    match env::var(name) {
        Ok(value) if !value.is_empty() => Ok(value),
        _ => Err(SiteError::MissingEnvVar(name.to_string())),
    }
}
