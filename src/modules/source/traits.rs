use crate::modules::catalog::Direction;
use crate::shared::errors::AppResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Title metadata resolved from a source URL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceManga {
    pub title: String,
    /// Layout hint reported by the source
    pub direction: Direction,
    pub chapters: Vec<SourceChapter>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceChapter {
    /// Identifier assigned by the source
    pub id: String,
    pub title: Option<String>,
    pub index: i32,
    pub url: String,
}

/// One entry of a chapter's ordered page list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourcePage {
    pub name: String,
    pub url: String,
}

/// Raw page image and its pixel dimensions
#[derive(Debug, Clone, PartialEq)]
pub struct PageImage {
    pub bytes: Vec<u8>,
    pub width: i32,
    pub height: i32,
}

/// External scraper for a manga site.
///
/// Implementations report network and parse failures as
/// `AppError::SourceError`; the worker records the message on the job as-is.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Resolve title, layout hint and chapter list for a source URL
    async fn fetch_manga(&self, url: &str) -> AppResult<SourceManga>;

    /// Ordered page list of a chapter
    async fn fetch_pages(&self, chapter: &SourceChapter) -> AppResult<Vec<SourcePage>>;

    /// Download one page image
    async fn fetch_page(&self, page: &SourcePage) -> AppResult<PageImage>;
}
