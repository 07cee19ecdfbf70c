pub mod cancellation;
pub mod chapters;
pub mod service;

pub use cancellation::CancellationRegistry;
pub use chapters::chapters_to_download;
pub use service::DownloadQueueService;
