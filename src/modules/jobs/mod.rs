/// Download queue module
///
/// A SQLite-backed ordered queue of download jobs with one background
/// worker executing them.
///
/// Architecture:
/// - Domain: entities, lifecycle rules and the repository trait
/// - Infrastructure: Diesel-based repository implementation
/// - Application: queue control service and cancellation tokens
/// - Worker: background worker that processes jobs
/// - Commands: HTTP handlers
pub mod application;
pub mod commands;
pub mod domain;
pub mod infrastructure;
pub mod worker;

// Re-exports for easy access
pub use application::{CancellationRegistry, DownloadQueueService};
pub use domain::{
    entities::{JobKind, JobProgress, JobRecord, JobStatus, NewJob},
    repository::{CancelOutcome, JobOutcome, JobRepository, JobStatistics, UpdateEnqueue},
};
pub use infrastructure::JobRepositoryImpl;
pub use worker::{DownloadWorker, WorkerStatistics};
