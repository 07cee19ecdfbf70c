/// Job lifecycle rules
///
/// Pending -> Running -> {Completed, Canceled, Failed}, plus Pending -> Canceled
/// and the startup-only Running -> Pending recovery, which a job gets once.
/// Stores validate every status write through `JobStatus::apply` so the table
/// lives in one place.
use super::entities::JobStatus;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

/// Event that asks a job to change status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Transition {
    /// Worker dequeued the job
    Start,
    /// Execution finished without error
    Complete,
    /// Cancellation took effect
    Cancel,
    /// Execution raised an unrecovered error
    Fail,
    /// Startup found the job orphaned in Running
    Recover,
}

/// Durable per-job flags that change how a transition resolves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct JobFlags {
    pub cancel_requested: bool,
    /// Already brought back once from an interrupted run
    pub recovered: bool,
}

impl JobFlags {
    pub fn cancel_requested() -> Self {
        Self {
            cancel_requested: true,
            ..Self::default()
        }
    }

    pub fn recovered() -> Self {
        Self {
            recovered: true,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("cannot apply {transition:?} to a {from} job")]
pub struct InvalidTransition {
    pub from: JobStatus,
    pub transition: Transition,
}

impl JobStatus {
    /// Status reached by applying `transition`.
    ///
    /// A requested cancel turns a `Complete` into `Canceled`: a cancel that
    /// raced the last page still wins. A job interrupted a second time is
    /// `Failed` instead of going back to the queue.
    pub fn apply(
        self,
        transition: Transition,
        flags: JobFlags,
    ) -> Result<JobStatus, InvalidTransition> {
        let next = match (self, transition) {
            (JobStatus::Pending, Transition::Start) => JobStatus::Running,
            (JobStatus::Pending, Transition::Cancel) => JobStatus::Canceled,
            (JobStatus::Running, Transition::Complete) if flags.cancel_requested => {
                JobStatus::Canceled
            }
            (JobStatus::Running, Transition::Complete) => JobStatus::Completed,
            (JobStatus::Running, Transition::Cancel) => JobStatus::Canceled,
            (JobStatus::Running, Transition::Fail) => JobStatus::Failed,
            (JobStatus::Running, Transition::Recover) if flags.recovered => JobStatus::Failed,
            (JobStatus::Running, Transition::Recover) => JobStatus::Pending,
            (from, transition) => return Err(InvalidTransition { from, transition }),
        };
        Ok(next)
    }
}

/// Lifecycle timestamps of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct JobTimestamps {
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl JobTimestamps {
    /// Stamp the first entry into Running and into a terminal state; existing
    /// values are never overwritten.
    pub fn stamp(self, next: JobStatus, now: DateTime<Utc>) -> Self {
        let mut stamped = self;
        match next {
            JobStatus::Running => {
                stamped.started_at.get_or_insert(now);
            }
            JobStatus::Completed | JobStatus::Canceled | JobStatus::Failed => {
                stamped.completed_at.get_or_insert(now);
            }
            JobStatus::Pending => {}
        }
        stamped
    }
}
