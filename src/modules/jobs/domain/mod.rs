pub mod entities;
pub mod repository;
pub mod state_machine;

pub use entities::{JobKind, JobProgress, JobRecord, JobStatus, NewJob, PageProgress};
pub use repository::{CancelOutcome, JobOutcome, JobRepository, JobStatistics, UpdateEnqueue};
pub use state_machine::{InvalidTransition, JobFlags, JobTimestamps, Transition};
