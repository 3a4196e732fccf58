//! SharePoint REST client bound to one site.

use std::path::Path;

use chrono::{DateTime, TimeDelta, Utc};
use futures::TryStreamExt;
use reqwest::header::ACCEPT;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio_util::io::StreamReader;

use crate::auth::Authenticator;
use crate::error::{Result, SiteError};
use crate::models::{
    ApiErrorResponse, BasePermissions, Field, FileInfo, FolderInfo, ListItem, ODataCollection,
    SiteUser, StorageMetrics, Web,
};
use crate::path::odata_literal;

/// Accept header selecting plain JSON without OData metadata.
const ACCEPT_JSON: &str = "application/json;odata=nometadata";

/// Page size for list item queries.
const PAGE_SIZE: &str = "5000";

/// Authenticated connection to one SharePoint site.
#[derive(Clone)]
pub struct SiteClient {
    site_url: String,
    auth: Authenticator,
    http: Client,
}

impl SiteClient {
    /// Create a new SiteClient.
    ///
    /// # Arguments
    /// * `site_url` - Absolute URL of the site, e.g. `https://contoso.sharepoint.com/sites/team`
    /// * `auth` - Authenticator for obtaining access tokens
    pub fn new(site_url: &str, auth: Authenticator) -> Self {
        Self {
            site_url: site_url.trim_end_matches('/').to_string(),
            auth,
            http: Client::new(),
        }
    }

    fn api_url(&self, endpoint: &str) -> String {
        format!("{}/_api/{}", self.site_url, endpoint)
    }

    /// GET a single entity.
    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let token = self.auth.get_access_token().await?;
        let url = self.api_url(endpoint);
        tracing::debug!("GET {}", url);

        let response = self
            .http
            .get(&url)
            .bearer_auth(&token)
            .header(ACCEPT, ACCEPT_JSON)
            .query(query)
            .send()
            .await?;

        let response = check_status(response).await?;
        Ok(response.json().await?)
    }

    /// GET a collection, following `odata.nextLink` until every page is read.
    async fn get_collection<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>> {
        let token = self.auth.get_access_token().await?;
        let mut all_values = Vec::new();
        let mut next_link: Option<String> = None;

        loop {
            let request = match next_link.take() {
                Some(link) => self.http.get(link),
                None => self.http.get(self.api_url(endpoint)).query(query),
            };

            let response = request
                .bearer_auth(&token)
                .header(ACCEPT, ACCEPT_JSON)
                .send()
                .await?;

            let response = check_status(response).await?;
            let page: ODataCollection<T> = response.json().await?;
            all_values.extend(page.value);

            match page.next_link {
                Some(link) => next_link = Some(link),
                None => break,
            }
        }

        Ok(all_values)
    }

    /// Fetch the site's web object.
    pub async fn get_web(&self) -> Result<Web> {
        self.get_json("web", &[("$select", "Url,Title".to_string())]).await
    }

    /// Root folder of a document library, with storage metrics.
    pub async fn get_library_root_folder(&self, title: &str) -> Result<FolderInfo> {
        self.get_json(
            "web/lists/GetByTitle(@t)/RootFolder",
            &[
                ("$expand", "StorageMetrics".to_string()),
                ("@t", odata_literal(title)),
            ],
        )
        .await
    }

    /// Columns of a document library.
    pub async fn get_library_fields(&self, title: &str) -> Result<Vec<Field>> {
        self.get_collection(
            "web/lists/GetByTitle(@t)/fields",
            &[
                ("$select", "Title,InternalName".to_string()),
                ("@t", odata_literal(title)),
            ],
        )
        .await
    }

    /// All items of a document library with `File` and `Folder` expanded.
    ///
    /// With `modified_after`, only items modified at or after that instant are returned.
    pub async fn get_library_items(
        &self,
        title: &str,
        modified_after: Option<&DateTime<Utc>>,
    ) -> Result<Vec<ListItem>> {
        let mut query = vec![
            ("$select", "FileSystemObjectType,File,Folder".to_string()),
            ("$expand", "File,Folder".to_string()),
            ("$top", PAGE_SIZE.to_string()),
            ("@t", odata_literal(title)),
        ];
        if let Some(after) = modified_after {
            query.push(("$filter", modified_filter(after)));
        }

        self.get_collection("web/lists/GetByTitle(@t)/items", &query).await
    }

    /// Storage metrics of a folder.
    pub async fn get_folder_storage_metrics(
        &self,
        server_relative_url: &str,
    ) -> Result<StorageMetrics> {
        self.get_json(
            "web/GetFolderByServerRelativePath(decodedurl=@p)/StorageMetrics",
            &[("@p", odata_literal(server_relative_url))],
        )
        .await
    }

    /// File properties by server-relative path.
    pub async fn get_file(&self, server_relative_url: &str) -> Result<FileInfo> {
        self.get_json(
            "web/GetFileByServerRelativePath(decodedurl=@p)",
            &[("@p", odata_literal(server_relative_url))],
        )
        .await
    }

    /// All list item fields of a file, keyed by internal field name.
    pub async fn get_file_fields(&self, server_relative_url: &str) -> Result<Map<String, Value>> {
        self.get_json(
            "web/GetFileByServerRelativePath(decodedurl=@p)/ListItemAllFields",
            &[("@p", odata_literal(server_relative_url))],
        )
        .await
    }

    /// Site user by e-mail address.
    pub async fn get_user_by_email(&self, email: &str) -> Result<SiteUser> {
        self.get_json(
            "web/SiteUsers/GetByEmail(@e)",
            &[("@e", odata_literal(email))],
        )
        .await
    }

    /// Effective permissions of `login_name` on a file's list item.
    pub async fn get_user_effective_permissions(
        &self,
        server_relative_url: &str,
        login_name: &str,
    ) -> Result<BasePermissions> {
        self.get_json(
            "web/GetFileByServerRelativePath(decodedurl=@p)/ListItemAllFields/getUserEffectivePermissions(@u)",
            &[
                ("@p", odata_literal(server_relative_url)),
                ("@u", odata_literal(login_name)),
            ],
        )
        .await
    }

    /// Stream a file's content to `destination`, returning the bytes written.
    pub async fn download_file<P: AsRef<Path>>(
        &self,
        server_relative_url: &str,
        destination: P,
    ) -> Result<u64> {
        let token = self.auth.get_access_token().await?;

        let response = self
            .http
            .get(self.api_url("web/GetFileByServerRelativePath(decodedurl=@p)/$value"))
            .bearer_auth(&token)
            .query(&[("@p", odata_literal(server_relative_url))])
            .send()
            .await?;

        let response = check_status(response).await?;

        let mut file = File::create(destination.as_ref()).await?;
        let mut reader = StreamReader::new(response.bytes_stream().map_err(std::io::Error::other));
        let written = tokio::io::copy(&mut reader, &mut file).await?;

        file.flush().await?;

        Ok(written)
    }
}

/// OData predicate selecting items modified at or after `after`.
///
/// The predicate has whole-second precision, so a fractional bound is
/// rounded up to keep earlier items out.
pub fn modified_filter(after: &DateTime<Utc>) -> String {
    let bound = match after.timestamp_subsec_nanos() {
        0 => *after,
        nanos => *after + TimeDelta::nanoseconds(1_000_000_000 - i64::from(nanos)),
    };
    format!("Modified ge datetime'{}'", bound.format("%Y-%m-%dT%H:%M:%SZ"))
}

/// Turn a non-success response into an `ApiError` carrying the server's message.
async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let error_body = response.text().await.unwrap_or_default();
    if let Ok(api_error) = serde_json::from_str::<ApiErrorResponse>(&error_body) {
        return Err(SiteError::ApiError {
            status: status.as_u16(),
            message: api_error.error.message.value,
        });
    }
    Err(SiteError::ApiError {
        status: status.as_u16(),
        message: error_body,
    })
}
