use chrono::Utc;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ImageRecord {
    pub id: Option<i64>,
    /// Path relative to the scanned root. Unique across the library.
    pub path: String,
    pub name: String,
    pub size: i64,
    pub last_modified: i64,
    /// Opaque token identifying the scanned root.
    pub directory_handle: String,
    #[serde(skip)]
    pub thumbnail: Option<Vec<u8>>,
    pub tags: Vec<String>,
    pub favorite: bool,
    /// Set once when a scan first observes the path; preserved on re-scans.
    pub date_added: i64,
}

impl ImageRecord {
    /// A freshly scanned candidate record with no persisted identity.
    pub fn draft(
        path: String,
        name: String,
        size: i64,
        last_modified: i64,
        directory_handle: String,
    ) -> Self {
        Self {
            id: None,
            path,
            name,
            size,
            last_modified,
            directory_handle,
            thumbnail: None,
            tags: Vec::new(),
            favorite: false,
            date_added: Utc::now().timestamp_millis(),
        }
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagRecord {
    pub name: String,
    /// Hex RGB, "#RRGGBB".
    pub color: String,
    /// Denormalized count of images currently carrying this tag.
    pub count: i64,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryRecord {
    pub id: String,
    pub name: String,
    pub last_scanned: i64,
    pub image_count: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    Name,
    Date,
    Size,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDir {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagMatchMode {
    /// Image must carry at least one selected tag.
    Any,
    /// Image must carry every selected tag.
    All,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterState {
    pub search: String,
    pub tags: Vec<String>,
    pub tag_mode: TagMatchMode,
    pub favorites_only: bool,
    pub sort_by: SortKey,
    pub sort_dir: SortDir,
}

impl Default for FilterState {
    fn default() -> Self {
        Self {
            search: String::new(),
            tags: Vec::new(),
            tag_mode: TagMatchMode::Any,
            favorites_only: false,
            sort_by: SortKey::Name,
            sort_dir: SortDir::Asc,
        }
    }
}
