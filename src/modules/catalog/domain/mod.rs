pub mod entities;
pub mod repository;
pub mod value_objects;

pub use entities::{Chapter, Manga, NewPage, PageSummary};
pub use repository::{CatalogStore, NewChapter};
pub use value_objects::{Direction, DownloadStatus};
