//! Certificate-based app-only authentication against Azure AD.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::{Result, SiteError};
use crate::models::TokenResponse;

/// Default Azure AD authority.
pub const DEFAULT_AUTHORITY_HOST: &str = "https://login.microsoftonline.com";

const CLIENT_ASSERTION_TYPE: &str = "urn:ietf:params:oauth:client-assertion-type:jwt-bearer";

/// Lifetime of a signed client assertion, in seconds.
const ASSERTION_LIFETIME: i64 = 600;

/// Application credentials backed by a certificate.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct CertificateCredentials {
    /// Azure AD tenant id.
    pub tenant_id: String,
    /// Azure AD application (client) id.
    pub client_id: String,
    /// Hex thumbprint of the certificate uploaded to the application.
    pub cert_thumbprint: String,
    /// PEM contents of the certificate's private key.
    pub cert_pem: String,
}

impl CertificateCredentials {
    pub fn new(
        tenant_id: impl Into<String>,
        client_id: impl Into<String>,
        cert_thumbprint: impl Into<String>,
        cert_pem: impl Into<String>,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            client_id: client_id.into(),
            cert_thumbprint: cert_thumbprint.into(),
            cert_pem: cert_pem.into(),
        }
    }

    /// Name of the first empty field, if any.
    pub fn missing_field(&self) -> Option<&'static str> {
        if self.tenant_id.is_empty() {
            Some("tenant_id")
        } else if self.client_id.is_empty() {
            Some("client_id")
        } else if self.cert_thumbprint.is_empty() {
            Some("cert_thumbprint")
        } else if self.cert_pem.is_empty() {
            Some("cert_pem")
        } else {
            None
        }
    }
}

impl fmt::Debug for CertificateCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CertificateCredentials")
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("cert_thumbprint", &self.cert_thumbprint)
            .field("cert_pem", &"<redacted>")
            .finish()
    }
}

/// JWT claims of a client assertion.
#[derive(Debug, Serialize)]
struct Claims {
    aud: String, // Token endpoint
    iss: String, // Client id
    sub: String, // Client id
    jti: String, // Unique assertion id
    nbf: i64,
    iat: i64,
    exp: i64,
}

/// Cached access token with expiration.
#[derive(Clone)]
struct CachedToken {
    access_token: String,
    expires_at: SystemTime,
}

/// Obtains bearer tokens for a SharePoint site using a signed client assertion.
#[derive(Clone)]
pub struct Authenticator {
    client_id: String,
    token_url: String,
    scope: String,
    header: Header,
    key: Arc<EncodingKey>,
    client: Client,
    cached_token: Arc<RwLock<Option<CachedToken>>>,
}

impl Authenticator {
    /// Create an authenticator for `resource` (a site origin such as
    /// `https://contoso.sharepoint.com`).
    ///
    /// The private key and thumbprint are parsed here, so bad credentials
    /// fail before any request is made.
    pub fn new(
        credentials: &CertificateCredentials,
        resource: &str,
        authority_host: &str,
    ) -> Result<Self> {
        if let Some(field) = credentials.missing_field() {
            return Err(SiteError::InvalidInput(format!("missing {}", field)));
        }

        let key = EncodingKey::from_rsa_pem(credentials.cert_pem.as_bytes())
            .map_err(|e| SiteError::InvalidCertificate(e.to_string()))?;

        Ok(Self {
            client_id: credentials.client_id.clone(),
            token_url: token_url(authority_host, &credentials.tenant_id),
            scope: format!("{}/.default", resource.trim_end_matches('/')),
            header: assertion_header(&credentials.cert_thumbprint)?,
            key: Arc::new(key),
            client: Client::new(),
            cached_token: Arc::new(RwLock::new(None)),
        })
    }

    /// Scope requested for tokens.
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Get a valid access token, refreshing if necessary.
    pub async fn get_access_token(&self) -> Result<String> {
        {
            let cached = self.cached_token.read().await;
            if let Some(token) = cached.as_ref() {
                // Add 60 second buffer before expiration
                let buffer = Duration::from_secs(60);
                if token.expires_at > SystemTime::now() + buffer {
                    return Ok(token.access_token.clone());
                }
            }
        }

        let new_token = self.refresh_token().await?;

        {
            let mut cached = self.cached_token.write().await;
            *cached = Some(new_token.clone());
        }

        Ok(new_token.access_token)
    }

    /// Sign a client assertion for the token endpoint.
    fn client_assertion(&self) -> Result<String> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            aud: self.token_url.clone(),
            iss: self.client_id.clone(),
            sub: self.client_id.clone(),
            jti: uuid::Uuid::new_v4().to_string(),
            nbf: now,
            iat: now,
            exp: now + ASSERTION_LIFETIME,
        };

        Ok(encode(&self.header, &claims, &self.key)?)
    }

    /// Exchange a fresh client assertion for an access token.
    async fn refresh_token(&self) -> Result<CachedToken> {
        let assertion = self.client_assertion()?;
        let params = [
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("scope", self.scope.as_str()),
            ("client_assertion_type", CLIENT_ASSERTION_TYPE),
            ("client_assertion", assertion.as_str()),
        ];

        tracing::debug!("requesting token from {}", self.token_url);

        let response = self
            .client
            .post(&self.token_url)
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SiteError::TokenRefreshError(format!(
                "Status {}: {}",
                status, body
            )));
        }

        let token_response: TokenResponse = response.json().await?;

        let expires_at = SystemTime::now() + Duration::from_secs(token_response.expires_in);

        Ok(CachedToken {
            access_token: token_response.access_token,
            expires_at,
        })
    }
}

/// Token endpoint for a tenant.
fn token_url(authority_host: &str, tenant_id: &str) -> String {
    format!(
        "{}/{}/oauth2/v2.0/token",
        authority_host.trim_end_matches('/'),
        tenant_id
    )
}

/// RS256 header carrying the certificate thumbprint.
///
/// Thumbprints are accepted in hex with optional `:` or space separators.
/// A 32-byte (SHA-256) thumbprint goes in `x5t#S256`, anything else in `x5t`.
fn assertion_header(thumbprint: &str) -> Result<Header> {
    let cleaned: String = thumbprint
        .chars()
        .filter(|c| !matches!(c, ':' | ' '))
        .collect();
    let digest = hex::decode(cleaned)?;

    let mut header = Header::new(Algorithm::RS256);
    let encoded = URL_SAFE_NO_PAD.encode(&digest);
    if digest.len() == 32 {
        header.x5t_s256 = Some(encoded);
    } else {
        header.x5t = Some(encoded);
    }
    Ok(header)
}
