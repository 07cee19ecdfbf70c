/// Content source abstraction
///
/// The scraper itself lives outside this crate; embedders hand an
/// `Arc<dyn ContentSource>` to `crate::run`.
pub mod traits;

pub use traits::{ContentSource, PageImage, SourceChapter, SourceManga, SourcePage};
