//! Error types for the site_session crate.

use thiserror::Error;

/// Errors that can occur when talking to a SharePoint site.
#[derive(Error, Debug)]
pub enum SiteError {
    #[error("Not connected: call connect before using the site")]
    NotConnected,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid certificate: {0}")]
    InvalidCertificate(String),

    #[error("Invalid site URL: {0}")]
    InvalidSiteUrl(String),

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("JWT encoding error: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),

    #[error("Invalid certificate thumbprint: {0}")]
    ThumbprintError(#[from] hex::FromHexError),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Token refresh failed: {0}")]
    TokenRefreshError(String),
}

impl SiteError {
    /// True when the server reported that the requested object does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, SiteError::ApiError { status: 404, .. })
    }
}

/// Result type alias for SiteError.
pub type Result<T> = std::result::Result<T, SiteError>;
