/// Repository trait for the ordered download queue
///
/// Stores job records and keeps a total order over pending jobs through a
/// real-valued order key, so inserting at either end never renumbers other
/// rows. Every mutation touches a single row atomically.
use crate::modules::jobs::domain::entities::{JobProgress, JobRecord, NewJob};
use crate::shared::errors::AppResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Result of a cancel request against the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CancelOutcome {
    /// The job was still pending and is now canceled
    Canceled,
    /// The job is running; the worker will stop it at the next page
    Requested,
    /// Unknown or already finished job
    NoOp,
}

/// Result of queueing an update for a title
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateEnqueue {
    /// A new job was placed at the tail
    Queued(JobRecord),
    /// An update for the title was already waiting; nothing was inserted
    AlreadyPending(JobRecord),
}

impl UpdateEnqueue {
    pub fn into_job(self) -> JobRecord {
        match self {
            UpdateEnqueue::Queued(job) | UpdateEnqueue::AlreadyPending(job) => job,
        }
    }
}

/// How the worker ended a run
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    Completed,
    Canceled,
    Failed(String),
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Queue a job ahead of every pending job
    async fn insert_at_head(&self, job: NewJob) -> AppResult<JobRecord>;

    /// Queue a job behind every pending job
    async fn insert_at_tail(&self, job: NewJob) -> AppResult<JobRecord>;

    /// Get job by ID
    async fn get_by_id(&self, job_id: Uuid) -> AppResult<Option<JobRecord>>;

    /// Pending jobs in execution order
    async fn list_pending(&self, limit: Option<i64>) -> AppResult<Vec<JobRecord>>;

    /// Every job: running first, then pending in order, then finished jobs newest first
    async fn list_all(&self) -> AppResult<Vec<JobRecord>>;

    /// Returns false when the job is not pending
    async fn move_to_head(&self, job_id: Uuid) -> AppResult<bool>;

    /// Returns false when the job is not pending
    async fn move_to_tail(&self, job_id: Uuid) -> AppResult<bool>;

    /// Queue an UpdateTitle job at the tail unless one for the same title is
    /// already pending. The check and the insert share one transaction.
    async fn insert_update_at_tail(&self, job: NewJob) -> AppResult<UpdateEnqueue>;

    /// Move the first pending job to Running.
    ///
    /// Returns None when the queue is empty or another job is still running.
    async fn dequeue(&self) -> AppResult<Option<JobRecord>>;

    /// Record the catalog title an AddTitle job resolved to
    async fn set_resolved_title(&self, job_id: Uuid, manga_id: Uuid, title: &str) -> AppResult<()>;

    /// Overwrite the progress snapshot of a running job.
    ///
    /// Returns false (and writes nothing) when the job is no longer running
    /// or the snapshot would move backwards.
    async fn update_progress(&self, job_id: Uuid, progress: &JobProgress) -> AppResult<bool>;

    /// Cancel a pending job, or flag a running one
    async fn request_cancel(&self, job_id: Uuid) -> AppResult<CancelOutcome>;

    async fn is_cancel_requested(&self, job_id: Uuid) -> AppResult<bool>;

    /// Move a running job to its terminal state and return the stored record
    async fn finish(&self, job_id: Uuid, outcome: JobOutcome) -> AppResult<JobRecord>;

    /// Reset jobs orphaned in Running by a crash; returns the recovered ids.
    ///
    /// A job gets one recovery. Found orphaned again, it is failed.
    async fn recover_running(&self) -> AppResult<Vec<Uuid>>;

    /// Delete every completed, canceled or failed job
    async fn remove_terminal(&self) -> AppResult<usize>;

    /// Smallest and largest order key among pending jobs
    async fn order_key_bounds(&self) -> AppResult<Option<(f64, f64)>>;

    /// Reassign pending order keys to 0, 1, 2, ... keeping their order
    async fn renumber_pending(&self) -> AppResult<usize>;

    /// Get job statistics
    async fn get_statistics(&self) -> AppResult<JobStatistics>;
}

/// Job queue statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStatistics {
    pub pending_count: i64,
    pub running_count: i64,
    pub completed_count: i64,
    pub canceled_count: i64,
    pub failed_count: i64,
    pub total_count: i64,
}
