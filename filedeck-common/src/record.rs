use serde::{Deserialize, Serialize};

use crate::facts::FactKind;
use crate::preview::Preview;

/// Largest accepted upload: 5 MiB.
pub const MAX_UPLOAD_BYTES: u64 = 5 * 1024 * 1024;

/// One stored object as the application sees it.
///
/// The `url` is assigned by the store and never changes. A rename produces
/// a new record with a new url; the old record must be replaced, not merged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileRecord {
    pub url: String,
    pub pathname: String,
}

impl FileRecord {
    pub fn new(url: impl Into<String>, pathname: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            pathname: pathname.into(),
        }
    }

    pub fn content_disposition(&self) -> String {
        let name = self.pathname.rsplit('/').next().unwrap_or(&self.pathname);
        format!("attachment; filename=\"{}\"", name.replace('"', "\\\""))
    }
}

// ── Wire bodies ──

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResponse {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenameRequest {
    pub url: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenameResponse {
    #[serde(flatten)]
    pub record: FileRecord,
    /// Set when the old object could not be removed after the copy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orphaned_url: Option<String>,
}

/// A record decorated with list-time derived fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileView {
    pub url: String,
    pub pathname: String,
    pub content_disposition: String,
    pub preview: Preview,
}

impl From<FileView> for FileRecord {
    fn from(view: FileView) -> Self {
        FileRecord::new(view.url, view.pathname)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileListResponse {
    pub items: Vec<FileView>,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactResponse {
    pub kind: FactKind,
    pub fact: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}
