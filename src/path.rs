//! Path helpers: library/folder resolution and site URL parsing.

use regex::Regex;
use std::sync::LazyLock;

use crate::error::{Result, SiteError};

/// Title of the default document library.
pub const DOCUMENTS_LIBRARY: &str = "Documents";

/// Name the default document library uses in server-relative URLs.
pub const DOCUMENTS_SITE_PATH: &str = "Shared Documents";

/// Absolute site URL: scheme and host, then an optional site path.
static SITE_URL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(https?://[^/?#\s]+)(/[^?#\s]*)?$").expect("Invalid site URL regex")
});

/// Split a user-facing path into a library title and a folder path.
///
/// The library is everything before the first `/`. The folder path is
/// empty when there is no `/`. When the library title contains
/// `Documents`, the remainder is rebased under `Shared Documents`;
/// any other library passes the whole input through as the folder.
///
/// # Examples
///
/// ```
/// use site_session::path::resolve_library_and_folder;
///
/// let (lib, folder) = resolve_library_and_folder("Documents/sharepoint-test-folder1");
/// assert_eq!(lib, "Documents");
/// assert_eq!(folder, "Shared Documents/sharepoint-test-folder1");
///
/// let (lib, folder) = resolve_library_and_folder("my-test-doc-lib/sub");
/// assert_eq!(lib, "my-test-doc-lib");
/// assert_eq!(folder, "my-test-doc-lib/sub");
/// ```
pub fn resolve_library_and_folder(path: &str) -> (String, String) {
    match path.split_once('/') {
        None => (path.to_string(), String::new()),
        Some((library, rest)) => {
            let folder = if library.contains(DOCUMENTS_LIBRARY) {
                format!("{}/{}", DOCUMENTS_SITE_PATH, rest)
            } else {
                path.to_string()
            };
            (library.to_string(), folder)
        }
    }
}

/// Last segment of a slash-delimited path.
pub fn base_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Split an absolute site URL into its origin and server-relative path.
///
/// `https://contoso.sharepoint.com/sites/team/` yields
/// `("https://contoso.sharepoint.com", "/sites/team")`.
pub fn split_site_url(site_url: &str) -> Result<(String, String)> {
    let trimmed = site_url.trim().trim_end_matches('/');
    let captures = SITE_URL_REGEX
        .captures(trimmed)
        .ok_or_else(|| SiteError::InvalidSiteUrl(site_url.to_string()))?;

    let origin = captures[1].to_string();
    let path = captures
        .get(2)
        .map(|m| m.as_str().to_string())
        .unwrap_or_default();

    Ok((origin, path))
}

/// Quote a string as an OData literal, doubling embedded single quotes.
pub fn odata_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}
