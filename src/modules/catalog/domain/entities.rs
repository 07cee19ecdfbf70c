/// Catalog entities: titles, their chapters, and downloaded pages
use super::value_objects::{Direction, DownloadStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manga {
    pub id: Uuid,
    pub title: String,
    pub direction: Direction,
    /// Source URL the title was added from
    pub url: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chapter {
    pub id: Uuid,
    pub manga_id: Uuid,
    pub url: String,
    pub title: Option<String>,
    /// Ordinal reported by the content source
    pub index: i32,
    pub download_status: DownloadStatus,
    pub created_at: DateTime<Utc>,
}

/// A page ready to be written to the catalog
#[derive(Debug, Clone, PartialEq)]
pub struct NewPage {
    pub name: String,
    pub index: i32,
    pub width: i32,
    pub height: i32,
    pub data: Vec<u8>,
}

/// Page metadata without the image payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageSummary {
    pub id: Uuid,
    pub chapter_id: Uuid,
    pub name: String,
    pub index: i32,
    pub width: i32,
    pub height: i32,
}
