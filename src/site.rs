//! Session over one SharePoint site.
//!
//! A [`SharePointSite`] starts disconnected. [`SharePointSite::connect`]
//! builds the connection handle from certificate credentials; every remote
//! operation afterwards goes through that handle. Rejected input is logged
//! and answered with a falsy result, a missing file or user is treated as
//! absent, and any other remote failure is returned as an error.

use std::path::Path;

use chrono::{DateTime, Utc};

use crate::auth::{Authenticator, CertificateCredentials};
use crate::client::SiteClient;
use crate::config::SiteConfig;
use crate::error::{Result, SiteError};
use crate::models::{
    field_text, format_timestamp, AccessKind, DownloadSummary, FileInfo, FileSystemObjectType,
    FolderInfo, ObjectSummary,
};
use crate::path::{base_name, resolve_library_and_folder, split_site_url};

/// A session bound to one site.
pub struct SharePointSite {
    config: SiteConfig,
    client: Option<SiteClient>,
}

impl SharePointSite {
    /// Create a disconnected session.
    pub fn new(config: SiteConfig) -> Self {
        if config.site_url.is_empty() {
            tracing::warn!("invalid input: missing site_url");
        }
        Self {
            config,
            client: None,
        }
    }

    /// The configured site URL.
    pub fn site_url(&self) -> &str {
        &self.config.site_url
    }

    /// Whether a connection handle is present.
    pub fn is_connected(&self) -> bool {
        self.client.is_some()
    }

    fn client(&self) -> Result<&SiteClient> {
        self.client.as_ref().ok_or(SiteError::NotConnected)
    }

    /// Connect with certificate credentials.
    ///
    /// Returns `false` when any field is empty or the certificate material
    /// cannot be parsed. No request is made here; the first token is
    /// fetched by the first remote operation. A previous handle is replaced.
    pub fn connect(
        &mut self,
        tenant_id: &str,
        client_id: &str,
        cert_thumbprint: &str,
        cert_pem: &str,
    ) -> bool {
        let credentials =
            CertificateCredentials::new(tenant_id, client_id, cert_thumbprint, cert_pem);
        self.connect_with(&credentials)
    }

    /// Connect with the credentials held in the session's configuration.
    pub fn connect_with_config(&mut self) -> bool {
        let credentials = self.config.credentials.clone();
        self.connect_with(&credentials)
    }

    fn connect_with(&mut self, credentials: &CertificateCredentials) -> bool {
        if let Some(field) = credentials.missing_field() {
            tracing::warn!("invalid input: missing {}", field);
            return false;
        }

        let (origin, _) = match split_site_url(&self.config.site_url) {
            Ok(parts) => parts,
            Err(e) => {
                tracing::warn!("{}", e);
                return false;
            }
        };

        match Authenticator::new(credentials, &origin, &self.config.authority_host) {
            Ok(auth) => {
                self.client = Some(SiteClient::new(&self.config.site_url, auth));
                tracing::info!("connected to site {}", self.config.site_url);
                true
            }
            Err(e) => {
                tracing::warn!("error getting context for site: {}", e);
                false
            }
        }
    }

    /// Check that the connection is live and points at `site_url`.
    pub async fn is_valid(&self, site_url: &str) -> Result<bool> {
        let Some(client) = self.client.as_ref() else {
            tracing::warn!("invalid context: not connected");
            return Ok(false);
        };

        let web = client.get_web().await?;
        tracing::debug!("site: {}", web.url);

        if web.url.is_empty() || !web.url.eq_ignore_ascii_case(site_url) {
            tracing::warn!("invalid context for site {}", site_url);
            return Ok(false);
        }

        Ok(true)
    }

    /// Split a path into library title and folder path.
    pub fn resolve_library_and_folder(&self, path: &str) -> (String, String) {
        resolve_library_and_folder(path)
    }

    /// Summary of a document library's root folder.
    pub async fn get_library(&self, title: &str) -> Result<ObjectSummary> {
        let root = self.client()?.get_library_root_folder(title).await?;
        let size_bytes = root
            .storage_metrics
            .as_ref()
            .map(|m| m.total_size)
            .unwrap_or_default();

        Ok(self.summary(
            root.server_relative_url,
            root.time_last_modified.as_ref(),
            size_bytes,
        ))
    }

    /// Summary of the folder at `path` (`<library>/<folder>`).
    ///
    /// The first library item whose folder URL contains the resolved folder
    /// path wins. A bare library name yields the library summary.
    pub async fn list_folder(&self, path: &str) -> Result<Option<ObjectSummary>> {
        if path.is_empty() {
            tracing::warn!("invalid input: missing path");
            return Ok(None);
        }

        let client = self.client()?;
        let (library, folder_path) = resolve_library_and_folder(path);
        tracing::debug!("library: {}, folder: {}", library, folder_path);

        if folder_path.is_empty() {
            return self.get_library(&library).await.map(Some);
        }

        let items = client.get_library_items(&library, None).await?;
        let found = items
            .into_iter()
            .find(|item| {
                item.folder_url()
                    .is_some_and(|url| url.contains(folder_path.as_str()))
            })
            .and_then(|item| item.folder);

        match found {
            Some(folder) => self.folder_summary(folder).await.map(Some),
            None => {
                tracing::warn!("folder not found: {}", path);
                Ok(None)
            }
        }
    }

    /// Files under the folder at `path`, including files in sub folders.
    ///
    /// `tag_column` names a library column by display title; its value is
    /// attached to every summary as `tag`. `modified_after` drops files
    /// modified before that instant.
    pub async fn list_files(
        &self,
        path: &str,
        tag_column: Option<&str>,
        modified_after: Option<&DateTime<Utc>>,
    ) -> Result<Vec<ObjectSummary>> {
        if path.is_empty() {
            tracing::warn!("invalid input: missing path");
            return Ok(Vec::new());
        }

        let client = self.client()?;
        let (library, folder_path) = resolve_library_and_folder(path);

        let tag_field = match tag_column.filter(|c| !c.is_empty()) {
            Some(column) => self.internal_field_name(&library, column).await?,
            None => String::new(),
        };

        let items = client.get_library_items(&library, modified_after).await?;

        let folder_url = if folder_path.is_empty() {
            None
        } else {
            match self.list_folder(path).await? {
                Some(folder) => Some(folder.server_relative_url),
                None => {
                    tracing::warn!("folder not found, no files listed: {}", path);
                    return Ok(Vec::new());
                }
            }
        };

        let mut files = Vec::new();
        for item in items {
            if item.object_type() != FileSystemObjectType::File {
                continue;
            }
            let Some(file) = item.file else {
                continue;
            };
            if let Some(url) = &folder_url {
                if !file.server_relative_url.contains(url.as_str()) {
                    continue;
                }
            }
            files.push(self.file_summary(file, &tag_field).await?);
        }

        tracing::info!("listed {} file(s) under {}", files.len(), path);
        Ok(files)
    }

    /// Whether `user_email` has `access_kind` on the file at `path`.
    ///
    /// Only `OPEN_ITEMS` is supported; any other kind is checked as `OPEN_ITEMS`.
    pub async fn check_access(
        &self,
        user_email: &str,
        path: &str,
        access_kind: &str,
    ) -> Result<bool> {
        if user_email.is_empty() {
            tracing::warn!("invalid input: missing user_email");
            return Ok(false);
        }
        if path.is_empty() {
            tracing::warn!("invalid input: missing path");
            return Ok(false);
        }

        let access = AccessKind::parse(access_kind).unwrap_or_else(|| {
            tracing::warn!(
                "unsupported access kind {}, checking {} instead",
                access_kind,
                AccessKind::OPEN_ITEMS
            );
            AccessKind::OpenItems
        });

        let client = self.client()?;

        let user = match client.get_user_by_email(user_email).await {
            Ok(user) if !user.login_name.is_empty() => user,
            Ok(_) => return Ok(false),
            Err(e) if e.is_not_found() => {
                tracing::warn!("user {} does not belong to site", user_email);
                return Ok(false);
            }
            Err(e) => return Err(e),
        };

        if self.find_file(path).await?.is_none() {
            return Ok(false);
        }

        match client
            .get_user_effective_permissions(path, &user.login_name)
            .await
        {
            Ok(permissions) => {
                let granted = permissions.has(access.permission_kind());
                if granted {
                    tracing::info!("user {} has access to file {}", user_email, path);
                } else {
                    tracing::info!("user {} does not have access to file {}", user_email, path);
                }
                Ok(granted)
            }
            Err(e) => {
                tracing::warn!(
                    "permission lookup failed for user {} on file {}: {}",
                    user.login_name,
                    path,
                    e
                );
                Ok(false)
            }
        }
    }

    /// Download the file at server-relative `path` into `dest_dir`.
    ///
    /// The local file takes the source's base name. `dest_dir` must already
    /// exist. `_size_hint` is accepted for callers that pass the listed size
    /// and is not used.
    pub async fn download<P: AsRef<Path>>(
        &self,
        path: &str,
        _size_hint: Option<u64>,
        dest_dir: P,
    ) -> Result<(DownloadSummary, bool)> {
        let dest_dir = dest_dir.as_ref();
        if !dest_dir.is_dir() {
            tracing::warn!("download directory does not exist: {}", dest_dir.display());
            return Ok((DownloadSummary::default(), false));
        }

        let client = self.client()?;
        if self.find_file(path).await?.is_none() {
            return Ok((DownloadSummary::default(), false));
        }

        let local_path = dest_dir.join(base_name(path));
        client.download_file(path, &local_path).await?;

        let file_size_bytes = tokio::fs::metadata(&local_path).await?.len();
        tracing::info!(
            "file has been downloaded: {}, size: {} bytes",
            local_path.display(),
            file_size_bytes
        );

        Ok((
            DownloadSummary {
                file_name: local_path.to_string_lossy().into_owned(),
                file_size_bytes,
            },
            true,
        ))
    }

    /// File by server-relative path; `None` when the site reports 404.
    async fn find_file(&self, path: &str) -> Result<Option<FileInfo>> {
        match self.client()?.get_file(path).await {
            Ok(file) => Ok(Some(file)),
            Err(e) if e.is_not_found() => {
                tracing::warn!("file {} does not belong to site", path);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Internal name of the library column titled `title`, or `""`.
    async fn internal_field_name(&self, library: &str, title: &str) -> Result<String> {
        let fields = self.client()?.get_library_fields(library).await?;
        match fields.into_iter().find(|f| f.title == title) {
            Some(field) => Ok(field.internal_name),
            None => {
                tracing::warn!("invalid input: column not found in library: {}", title);
                Ok(String::new())
            }
        }
    }

    async fn folder_summary(&self, folder: FolderInfo) -> Result<ObjectSummary> {
        let metrics = self
            .client()?
            .get_folder_storage_metrics(&folder.server_relative_url)
            .await?;

        Ok(self.summary(
            folder.server_relative_url,
            folder.time_last_modified.as_ref(),
            metrics.total_file_stream_size,
        ))
    }

    async fn file_summary(&self, file: FileInfo, tag_field: &str) -> Result<ObjectSummary> {
        let tag = if tag_field.is_empty() {
            None
        } else {
            let fields = self
                .client()?
                .get_file_fields(&file.server_relative_url)
                .await?;
            Some(field_text(fields.get(tag_field)))
        };

        let mut summary = self.summary(
            file.server_relative_url,
            file.time_last_modified.as_ref(),
            file.length,
        );
        summary.tag = tag;
        Ok(summary)
    }

    fn summary(
        &self,
        server_relative_url: String,
        time_last_modified: Option<&DateTime<Utc>>,
        size_bytes: u64,
    ) -> ObjectSummary {
        ObjectSummary {
            site_url: self.config.site_url.clone(),
            server_relative_url,
            time_last_modified: format_timestamp(time_last_modified),
            size_bytes,
            tag: None,
        }
    }
}
