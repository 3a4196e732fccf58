//! Data models for SharePoint REST responses and the summaries handed to callers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Flat summary of a library, folder or file.
///
/// The serialized key names are what downstream consumers read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectSummary {
    pub site_url: String,
    pub server_relative_url: String,
    pub time_last_modified: String,
    pub size_bytes: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

impl std::fmt::Display for ObjectSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}\t{}\t{}",
            format_size(self.size_bytes),
            self.time_last_modified,
            self.server_relative_url
        )?;
        if let Some(tag) = &self.tag {
            write!(f, "\t{}", tag)?;
        }
        Ok(())
    }
}

/// Result of downloading a file to local storage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadSummary {
    /// Local path the file was written to.
    pub file_name: String,
    pub file_size_bytes: u64,
}

/// Format bytes into human-readable size.
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Render a timestamp the way C `ctime` does, e.g. `Wed Feb 14 10:30:00 2024`.
pub fn format_timestamp(timestamp: Option<&DateTime<Utc>>) -> String {
    timestamp
        .map(|t| t.format("%a %b %e %H:%M:%S %Y").to_string())
        .unwrap_or_default()
}

/// Text of a list item field, empty when the field is unset or falsy.
pub fn field_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) | Some(Value::Bool(false)) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(a)) if a.is_empty() => String::new(),
        Some(Value::Object(o)) if o.is_empty() => String::new(),
        Some(Value::Number(n)) if n.as_f64() == Some(0.0) => String::new(),
        Some(other) => other.to_string(),
    }
}

/// SharePoint serializes Int64 values as strings; accept either form.
fn deserialize_u64<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u64),
        Text(String),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Number(n)) => Ok(n),
        Some(Raw::Text(s)) => s.parse::<u64>().map_err(serde::de::Error::custom),
        None => Ok(0),
    }
}

/// OData collection envelope (`odata=nometadata`).
#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct ODataCollection<T> {
    #[serde(default)]
    pub value: Vec<T>,
    #[serde(default, rename = "odata.nextLink")]
    pub next_link: Option<String>,
}

/// The site's web object.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Web {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
}

/// Storage usage of a folder tree.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StorageMetrics {
    #[serde(default, deserialize_with = "deserialize_u64")]
    pub total_size: u64,
    #[serde(default, deserialize_with = "deserialize_u64")]
    pub total_file_stream_size: u64,
}

/// Folder properties. Every field is optional so that a null expansion
/// (`{"odata.null": true}`) still parses.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FolderInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub server_relative_url: String,
    #[serde(default)]
    pub time_last_modified: Option<DateTime<Utc>>,
    #[serde(default)]
    pub storage_metrics: Option<StorageMetrics>,
}

/// File properties.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FileInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub server_relative_url: String,
    #[serde(default)]
    pub time_last_modified: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "deserialize_u64")]
    pub length: u64,
}

/// Kind of object a list item stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileSystemObjectType {
    Invalid,
    File,
    Folder,
    Web,
}

impl From<i32> for FileSystemObjectType {
    fn from(value: i32) -> Self {
        match value {
            0 => Self::File,
            1 => Self::Folder,
            2 => Self::Web,
            _ => Self::Invalid,
        }
    }
}

/// A document library item with its `File` and `Folder` expanded.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ListItem {
    #[serde(default = "invalid_object_type")]
    pub file_system_object_type: i32,
    #[serde(default)]
    pub file: Option<FileInfo>,
    #[serde(default)]
    pub folder: Option<FolderInfo>,
}

fn invalid_object_type() -> i32 {
    -1
}

impl ListItem {
    pub fn object_type(&self) -> FileSystemObjectType {
        FileSystemObjectType::from(self.file_system_object_type)
    }

    /// Server-relative URL of the expanded folder, if any.
    pub fn folder_url(&self) -> Option<&str> {
        self.folder
            .as_ref()
            .map(|f| f.server_relative_url.as_str())
            .filter(|url| !url.is_empty())
    }
}

/// A library column.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Field {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub internal_name: String,
}

/// A site user.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SiteUser {
    #[serde(default)]
    pub login_name: String,
}

/// Individual rights in a SharePoint permission mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum PermissionKind {
    EmptyMask = 0,
    ViewListItems = 1,
    AddListItems = 2,
    EditListItems = 3,
    DeleteListItems = 4,
    ApproveItems = 5,
    OpenItems = 6,
    ViewVersions = 7,
    DeleteVersions = 8,
    CancelCheckout = 9,
    ManagePersonalViews = 10,
    ManageLists = 12,
    ViewFormPages = 13,
    Open = 17,
    ViewPages = 18,
    FullMask = 65,
}

/// A 64-bit permission mask split into its high and low words.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BasePermissions {
    #[serde(default, deserialize_with = "deserialize_u64")]
    pub high: u64,
    #[serde(default, deserialize_with = "deserialize_u64")]
    pub low: u64,
}

impl BasePermissions {
    /// Whether the mask grants `kind`.
    pub fn has(&self, kind: PermissionKind) -> bool {
        match kind {
            PermissionKind::EmptyMask => true,
            PermissionKind::FullMask => {
                (self.high & 0x7FFF) == 0x7FFF && self.low == 0xFFFF_FFFF
            }
            other => {
                let bit = other as u32 - 1;
                if bit < 32 {
                    self.low & (1u64 << bit) != 0
                } else {
                    self.high & (1u64 << (bit - 32)) != 0
                }
            }
        }
    }
}

/// Access a caller can ask about in a permission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessKind {
    OpenItems,
}

impl AccessKind {
    pub const OPEN_ITEMS: &'static str = "OPEN_ITEMS";

    /// Parse an access name. Only `OPEN_ITEMS` is supported; `None` for anything else.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            Self::OPEN_ITEMS => Some(Self::OpenItems),
            _ => None,
        }
    }

    pub fn permission_kind(self) -> PermissionKind {
        match self {
            Self::OpenItems => PermissionKind::OpenItems,
        }
    }
}

/// SharePoint error body (`odata=nometadata`).
#[derive(Debug, Deserialize)]
pub struct ApiErrorResponse {
    #[serde(rename = "odata.error")]
    pub error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
pub struct ApiErrorDetail {
    #[serde(default)]
    pub code: String,
    pub message: ApiErrorMessage,
}

#[derive(Debug, Deserialize)]
pub struct ApiErrorMessage {
    #[serde(default)]
    pub lang: Option<String>,
    pub value: String,
}

/// OAuth2 token response.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_collection_of_fields_without_value() {
        let page: ODataCollection<Field> =
            serde_json::from_value(json!({"odata.nextLink": "https://next"})).unwrap();
        assert!(page.value.is_empty());
        assert_eq!(page.next_link.as_deref(), Some("https://next"));
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(500), "500 B");
        assert_eq!(format_size(1024), "1.00 KB");
        assert_eq!(format_size(1536), "1.50 KB");
        assert_eq!(format_size(1048576), "1.00 MB");
        assert_eq!(format_size(1073741824), "1.00 GB");
    }

    #[test]
    fn test_format_timestamp_ctime() {
        let t = Utc.with_ymd_and_hms(2024, 2, 14, 10, 30, 0).unwrap();
        assert_eq!(format_timestamp(Some(&t)), "Wed Feb 14 10:30:00 2024");

        let t = Utc.with_ymd_and_hms(2024, 2, 5, 8, 1, 9).unwrap();
        assert_eq!(format_timestamp(Some(&t)), "Mon Feb  5 08:01:09 2024");

        assert_eq!(format_timestamp(None), "");
    }

    #[test]
    fn test_summary_serializes_fixed_keys() {
        let summary = ObjectSummary {
            site_url: "https://contoso.sharepoint.com/sites/team".to_string(),
            server_relative_url: "/sites/team/Shared Documents/a.docx".to_string(),
            time_last_modified: "Wed Feb 14 10:30:00 2024".to_string(),
            size_bytes: 19392,
            tag: None,
        };

        let value = serde_json::to_value(&summary).unwrap();
        let object = value.as_object().unwrap();
        assert_eq!(object.len(), 4);
        for key in ["site_url", "server_relative_url", "time_last_modified", "size_bytes"] {
            assert!(object.contains_key(key), "missing key {}", key);
        }
        assert_eq!(value["size_bytes"], 19392);

        let tagged = ObjectSummary {
            tag: Some(String::new()),
            ..summary
        };
        let value = serde_json::to_value(&tagged).unwrap();
        assert_eq!(value["tag"], "");
    }

    #[test]
    fn test_file_info_length_as_string() {
        let info: FileInfo = serde_json::from_value(json!({
            "Name": "a.docx",
            "ServerRelativeUrl": "/sites/team/Shared Documents/a.docx",
            "TimeLastModified": "2024-02-14T10:30:00Z",
            "Length": "19392"
        }))
        .unwrap();

        assert_eq!(info.length, 19392);
        assert_eq!(
            info.time_last_modified,
            Some(Utc.with_ymd_and_hms(2024, 2, 14, 10, 30, 0).unwrap())
        );
    }

    #[test]
    fn test_list_item_with_null_folder() {
        let item: ListItem = serde_json::from_value(json!({
            "FileSystemObjectType": 0,
            "File": { "ServerRelativeUrl": "/sites/team/Shared Documents/a.docx", "Length": 10 },
            "Folder": { "odata.null": true }
        }))
        .unwrap();

        assert_eq!(item.object_type(), FileSystemObjectType::File);
        assert_eq!(item.folder_url(), None);
    }

    #[test]
    fn test_base_permissions_open_items() {
        // Contribute-level mask.
        let perms: BasePermissions =
            serde_json::from_value(json!({ "High": "432", "Low": "1011030767" })).unwrap();
        assert!(perms.has(PermissionKind::OpenItems));
        assert!(perms.has(PermissionKind::ViewListItems));

        let none = BasePermissions { high: 0, low: 0 };
        assert!(!none.has(PermissionKind::OpenItems));
        assert!(none.has(PermissionKind::EmptyMask));

        let full = BasePermissions { high: 0x7FFF, low: 0xFFFF_FFFF };
        assert!(full.has(PermissionKind::FullMask));
        assert!(full.has(PermissionKind::ManageLists));
    }

    #[test]
    fn test_access_kind_parse() {
        assert_eq!(AccessKind::parse("OPEN_ITEMS"), Some(AccessKind::OpenItems));
        assert_eq!(AccessKind::parse("EDIT_ITEMS"), None);
        assert_eq!(
            AccessKind::OpenItems.permission_kind(),
            PermissionKind::OpenItems
        );
    }

    #[test]
    fn test_field_text() {
        assert_eq!(field_text(None), "");
        assert_eq!(field_text(Some(&Value::Null)), "");
        assert_eq!(field_text(Some(&json!(""))), "");
        assert_eq!(field_text(Some(&json!("finance"))), "finance");
        assert_eq!(field_text(Some(&json!(3))), "3");
        assert_eq!(field_text(Some(&json!(["a"]))), r#"["a"]"#);
    }

    #[test]
    fn test_api_error_deserialize() {
        let err: ApiErrorResponse = serde_json::from_value(json!({
            "odata.error": {
                "code": "-2130575338, Microsoft.SharePoint.SPException",
                "message": { "lang": "en-US", "value": "The file does not exist." }
            }
        }))
        .unwrap();
        assert_eq!(err.error.message.value, "The file does not exist.");
    }
}
