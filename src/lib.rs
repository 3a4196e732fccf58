//! site_session - A session layer over a SharePoint Online site.
//!
//! This library provides functionality to:
//! - Connect to a site with certificate-based app-only credentials
//! - Summarise document libraries and folders
//! - List files under a folder, optionally filtered by modification time and tagged
//!   with a custom column
//! - Check whether a user can open a file
//! - Download files to local storage
//!
//! # Example
//!
//! ```no_run
//! use site_session::{SharePointSite, SiteConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = SiteConfig::from_env()?;
//!     let site_url = config.site_url.clone();
//!     let mut site = SharePointSite::new(config);
//!
//!     if site.connect_with_config() && site.is_valid(&site_url).await? {
//!         for file in site.list_files("Documents/reports", None, None).await? {
//!             println!("{}", file);
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod path;
pub mod site;

// Re-exports for convenience
pub use auth::{Authenticator, CertificateCredentials};
pub use client::SiteClient;
pub use config::SiteConfig;
pub use error::{Result, SiteError};
pub use models::{DownloadSummary, ObjectSummary};
pub use path::resolve_library_and_folder;
pub use site::SharePointSite;
