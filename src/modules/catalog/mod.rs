/// Catalog of downloaded titles
///
/// Stores manga, their chapters and page images. The download worker is the
/// only writer; it converges jobs on one title per name.
pub mod domain;
pub mod infrastructure;

pub use domain::{
    CatalogStore, Chapter, Direction, DownloadStatus, Manga, NewChapter, NewPage, PageSummary,
};
pub use infrastructure::CatalogStoreImpl;
