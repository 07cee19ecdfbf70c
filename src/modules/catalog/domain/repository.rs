/// Catalog persistence interface used by the download worker
use super::entities::{Chapter, Manga, NewPage, PageSummary};
use super::value_objects::{Direction, DownloadStatus};
use crate::shared::errors::AppResult;
use async_trait::async_trait;
use uuid::Uuid;

/// Chapter as reported by the content source, before it is stored
#[derive(Debug, Clone, PartialEq)]
pub struct NewChapter {
    pub url: String,
    pub title: Option<String>,
    pub index: i32,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Find a title by name, creating it when missing. Title is the natural key.
    async fn get_or_create_manga(
        &self,
        title: &str,
        direction: Direction,
        url: &str,
    ) -> AppResult<Manga>;

    async fn get_manga(&self, manga_id: Uuid) -> AppResult<Option<Manga>>;

    /// All chapters of a title ordered by index
    async fn get_chapters(&self, manga_id: Uuid) -> AppResult<Vec<Chapter>>;

    /// Store a chapter ready to receive pages.
    ///
    /// Re-appending a chapter that exists but never finished downloading drops
    /// its partial pages so a retried job starts that chapter clean.
    async fn append_chapter(&self, manga_id: Uuid, chapter: &NewChapter) -> AppResult<Chapter>;

    async fn append_page(&self, chapter_id: Uuid, page: NewPage) -> AppResult<Uuid>;

    async fn set_chapter_status(&self, chapter_id: Uuid, status: DownloadStatus) -> AppResult<()>;

    async fn get_pages(&self, chapter_id: Uuid) -> AppResult<Vec<PageSummary>>;
}
