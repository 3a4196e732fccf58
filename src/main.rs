//! site_session CLI - Inspect and download from a SharePoint site.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{fmt, EnvFilter};

use site_session::auth::DEFAULT_AUTHORITY_HOST;
use site_session::models::{format_size, AccessKind};
use site_session::{CertificateCredentials, SharePointSite, SiteConfig};

/// CLI tool for working with a SharePoint site.
#[derive(Parser)]
#[command(name = "site_session")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Absolute site URL, e.g. https://contoso.sharepoint.com/sites/team.
    #[arg(long, env = "SHAREPOINT_SITE_URL")]
    site_url: String,

    /// Azure AD tenant id.
    #[arg(long, env = "SHAREPOINT_TENANT_ID")]
    tenant_id: String,

    /// Azure AD application (client) id.
    #[arg(long, env = "SHAREPOINT_CLIENT_ID")]
    client_id: String,

    /// Thumbprint of the application's certificate.
    #[arg(long, env = "SHAREPOINT_CERT_THUMBPRINT")]
    cert_thumbprint: String,

    /// PEM contents of the certificate's private key.
    #[arg(long, env = "SHAREPOINT_CERT_PEM", hide_env_values = true)]
    cert_pem: Option<String>,

    /// Read the private key PEM from a file instead.
    #[arg(long, conflicts_with = "cert_pem")]
    cert_pem_file: Option<PathBuf>,

    /// Azure AD authority host.
    #[arg(long, env = "SHAREPOINT_AUTHORITY_HOST", default_value = DEFAULT_AUTHORITY_HOST)]
    authority_host: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that the credentials reach the configured site.
    Validate,

    /// Summarise a document library.
    Library {
        /// Library title, e.g. Documents.
        title: String,
    },

    /// Summarise a folder.
    Folder {
        /// Folder path starting at the library, e.g. Documents/reports.
        path: String,
    },

    /// List files under a folder, including sub folders.
    Files {
        /// Folder path starting at the library, e.g. Documents/reports.
        path: String,

        /// Display name of a column to attach as tag.
        #[arg(long)]
        tag_column: Option<String>,

        /// Only files modified at or after this time (RFC 3339 or YYYY-MM-DD, UTC).
        #[arg(long, value_parser = parse_timestamp)]
        modified_after: Option<DateTime<Utc>>,
    },

    /// Check whether a user can open a file.
    Access {
        /// User e-mail address.
        #[arg(long)]
        user: String,

        /// Server-relative file path, e.g. /sites/team/Shared Documents/a.docx.
        #[arg(long)]
        path: String,

        /// Access kind to check.
        #[arg(long, default_value = AccessKind::OPEN_ITEMS)]
        kind: String,
    },

    /// Download a file into an existing directory.
    Download {
        /// Server-relative file path, e.g. /sites/team/Shared Documents/a.docx.
        path: String,

        /// Size reported by a previous listing.
        #[arg(long)]
        size_hint: Option<u64>,

        /// Local destination directory (must exist).
        #[arg(long, short = 't', default_value = ".")]
        to: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // RUST_LOG=debug site_session ... shows resolved paths and request URLs
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let cert_pem = match (&cli.cert_pem, &cli.cert_pem_file) {
        (Some(pem), _) => pem.clone(),
        (None, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read certificate PEM from {:?}", path))?,
        (None, None) => bail!("Provide --cert-pem, --cert-pem-file or SHAREPOINT_CERT_PEM"),
    };

    let credentials = CertificateCredentials::new(
        cli.tenant_id,
        cli.client_id,
        cli.cert_thumbprint,
        cert_pem,
    );
    let config = SiteConfig::new(cli.site_url.clone(), credentials)
        .with_authority_host(cli.authority_host);

    let mut site = SharePointSite::new(config);
    if !site.connect_with_config() {
        bail!("Failed to connect to {}", cli.site_url);
    }

    match cli.command {
        Commands::Validate => {
            let valid = site
                .is_valid(&cli.site_url)
                .await
                .context("Failed to validate connection")?;
            if !valid {
                bail!("Connection does not point at {}", cli.site_url);
            }
            println!("OK");
        }

        Commands::Library { title } => {
            let summary = site
                .get_library(&title)
                .await
                .with_context(|| format!("Failed to get library: {}", title))?;
            print_json(&summary)?;
        }

        Commands::Folder { path } => {
            let summary = site
                .list_folder(&path)
                .await
                .with_context(|| format!("Failed to get folder: {}", path))?;
            match summary {
                Some(summary) => print_json(&summary)?,
                None => println!("Folder not found."),
            }
        }

        Commands::Files {
            path,
            tag_column,
            modified_after,
        } => {
            let files = site
                .list_files(&path, tag_column.as_deref(), modified_after.as_ref())
                .await
                .with_context(|| format!("Failed to list files in folder: {}", path))?;
            print_json(&files)?;
        }

        Commands::Access { user, path, kind } => {
            let granted = site
                .check_access(&user, &path, &kind)
                .await
                .with_context(|| format!("Failed to check access for {} on {}", user, path))?;
            println!("{}", if granted { "granted" } else { "denied" });
        }

        Commands::Download {
            path,
            size_hint,
            to,
        } => {
            let (summary, ok) = site
                .download(&path, size_hint, &to)
                .await
                .with_context(|| format!("Failed to download file: {}", path))?;
            if !ok {
                bail!("Download of {} failed", path);
            }
            print_json(&summary)?;
            eprintln!("Saved {} ({})", summary.file_name, format_size(summary.file_size_bytes));
        }
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Parse an RFC 3339 timestamp, a naive `YYYY-MM-DDTHH:MM:SS` (UTC) or a date.
fn parse_timestamp(value: &str) -> std::result::Result<DateTime<Utc>, String> {
    if let Ok(t) = DateTime::parse_from_rfc3339(value) {
        return Ok(t.with_timezone(&Utc));
    }
    if let Ok(t) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S") {
        return Ok(t.and_utc());
    }
    if let Ok(d) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        if let Some(t) = d.and_hms_opt(0, 0, 0) {
            return Ok(t.and_utc());
        }
    }
    Err(format!("invalid timestamp: {}", value))
}
