/// Diesel-based implementation of JobRepository
///
/// SQLite `BEGIN IMMEDIATE` transactions take the write lock up front, so a
/// read-then-write on one row (claiming a job, resolving a cancel against a
/// completion) cannot interleave with another writer.
use crate::modules::jobs::domain::entities::{JobKind, JobProgress, JobRecord, JobStatus, NewJob};
use crate::modules::jobs::domain::repository::{
    CancelOutcome, JobOutcome, JobRepository, JobStatistics, UpdateEnqueue,
};
use crate::modules::jobs::domain::state_machine::{JobTimestamps, Transition};
use crate::modules::jobs::infrastructure::models::{DownloadJobModel, ProgressColumns};
use crate::schema::download_jobs;
use crate::shared::errors::{AppError, AppResult};
use crate::shared::infrastructure::database::{DbConnection, DbPool};
use crate::{log_debug, log_info, log_warn};
use async_trait::async_trait;
use chrono::{NaiveDateTime, Utc};
use diesel::dsl::{count_star, max, min};
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use std::cmp::Ordering;
use uuid::Uuid;

const INTERRUPTED_TWICE: &str = "Interrupted by a restart twice; not retried again";

pub struct JobRepositoryImpl {
    pool: DbPool,
}

impl JobRepositoryImpl {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Get database connection from pool
    fn get_conn(&self) -> AppResult<DbConnection> {
        self.pool
            .get()
            .map_err(|e| AppError::DatabaseError(format!("Failed to get connection: {}", e)))
    }

    fn now() -> NaiveDateTime {
        Utc::now().naive_utc()
    }

    fn find_model(
        conn: &mut SqliteConnection,
        job_id: &str,
    ) -> QueryResult<Option<DownloadJobModel>> {
        download_jobs::table
            .find(job_id)
            .select(DownloadJobModel::as_select())
            .first(conn)
            .optional()
    }

    /// Min and max order key among pending jobs, optionally ignoring one job
    fn pending_bounds(
        conn: &mut SqliteConnection,
        excluding: Option<&str>,
    ) -> QueryResult<(Option<f64>, Option<f64>)> {
        let pending = download_jobs::table
            .filter(download_jobs::status.eq(JobStatus::Pending.as_str()))
            .filter(download_jobs::id.ne(excluding.unwrap_or("")));

        pending
            .select((min(download_jobs::order_key), max(download_jobs::order_key)))
            .first::<(Option<f64>, Option<f64>)>(conn)
    }

    fn head_key(conn: &mut SqliteConnection, excluding: Option<&str>) -> QueryResult<f64> {
        let (lowest, _) = Self::pending_bounds(conn, excluding)?;
        Ok(lowest.map(|key| key - 1.0).unwrap_or(0.0))
    }

    fn tail_key(conn: &mut SqliteConnection, excluding: Option<&str>) -> QueryResult<f64> {
        let (_, highest) = Self::pending_bounds(conn, excluding)?;
        Ok(highest.map(|key| key + 1.0).unwrap_or(0.0))
    }

    fn pending_update(
        conn: &mut SqliteConnection,
        manga_id: &str,
    ) -> QueryResult<Option<DownloadJobModel>> {
        download_jobs::table
            .filter(download_jobs::status.eq(JobStatus::Pending.as_str()))
            .filter(download_jobs::kind.eq(JobKind::UpdateTitle.as_str()))
            .filter(download_jobs::manga_id.eq(manga_id))
            .order(download_jobs::created_at.asc())
            .select(DownloadJobModel::as_select())
            .first(conn)
            .optional()
    }

    /// Insert within an open transaction
    fn insert_row(
        conn: &mut SqliteConnection,
        job: NewJob,
        at_head: bool,
    ) -> AppResult<DownloadJobModel> {
        let order_key = if at_head {
            Self::head_key(conn, None)?
        } else {
            Self::tail_key(conn, None)?
        };
        let model = DownloadJobModel::from_new_job(job, order_key, Self::now());

        diesel::insert_into(download_jobs::table)
            .values(&model)
            .execute(conn)?;
        Ok(model)
    }

    fn insert(&self, job: NewJob, at_head: bool) -> AppResult<JobRecord> {
        let mut conn = self.get_conn()?;

        let model = conn
            .immediate_transaction::<_, AppError, _>(|conn| Self::insert_row(conn, job, at_head))?;

        log_debug!(
            "Queued {} job {} at {} (order key {})",
            model.kind,
            model.id,
            if at_head { "head" } else { "tail" },
            model.order_key
        );
        model.to_job_record()
    }

    /// Recompute the order key of a pending job. `to_head` picks the end.
    fn reorder(&self, job_id: Uuid, to_head: bool) -> AppResult<bool> {
        let mut conn = self.get_conn()?;
        let key = job_id.to_string();

        conn.immediate_transaction::<_, AppError, _>(|conn| {
            let Some(model) = Self::find_model(conn, &key)? else {
                return Ok(false);
            };
            if model.parse_status()? != JobStatus::Pending {
                return Ok(false);
            }

            let (lowest, highest) = Self::pending_bounds(conn, Some(&key))?;
            let target = if to_head {
                match lowest {
                    Some(lowest) if model.order_key < lowest => None,
                    Some(lowest) => Some(lowest - 1.0),
                    None => None,
                }
            } else {
                match highest {
                    Some(highest) if model.order_key > highest => None,
                    Some(highest) => Some(highest + 1.0),
                    None => None,
                }
            };

            if let Some(order_key) = target {
                diesel::update(
                    download_jobs::table
                        .filter(download_jobs::id.eq(&key))
                        .filter(download_jobs::status.eq(JobStatus::Pending.as_str())),
                )
                .set(download_jobs::order_key.eq(order_key))
                .execute(conn)?;
            }
            Ok(true)
        })
    }

    /// Sort key for `list_all`: running, then pending by order, then finished newest first
    fn display_order(a: &JobRecord, b: &JobRecord) -> Ordering {
        fn rank(status: JobStatus) -> u8 {
            match status {
                JobStatus::Running => 0,
                JobStatus::Pending => 1,
                JobStatus::Completed | JobStatus::Canceled | JobStatus::Failed => 2,
            }
        }

        rank(a.status)
            .cmp(&rank(b.status))
            .then_with(|| match (a.status, b.status) {
                (JobStatus::Pending, JobStatus::Pending) => a
                    .order_key
                    .total_cmp(&b.order_key)
                    .then_with(|| a.created_at.cmp(&b.created_at)),
                _ => b
                    .completed_at
                    .cmp(&a.completed_at)
                    .then_with(|| b.created_at.cmp(&a.created_at)),
            })
    }
}

#[async_trait]
impl JobRepository for JobRepositoryImpl {
    async fn insert_at_head(&self, job: NewJob) -> AppResult<JobRecord> {
        self.insert(job, true)
    }

    async fn insert_at_tail(&self, job: NewJob) -> AppResult<JobRecord> {
        self.insert(job, false)
    }

    async fn get_by_id(&self, job_id: Uuid) -> AppResult<Option<JobRecord>> {
        let mut conn = self.get_conn()?;

        let job = Self::find_model(&mut conn, &job_id.to_string())
            .map_err(|e| AppError::DatabaseError(format!("Failed to get job by id: {}", e)))?;

        job.map(DownloadJobModel::to_job_record).transpose()
    }

    async fn list_pending(&self, limit: Option<i64>) -> AppResult<Vec<JobRecord>> {
        let mut conn = self.get_conn()?;

        let jobs: Vec<DownloadJobModel> = download_jobs::table
            .filter(download_jobs::status.eq(JobStatus::Pending.as_str()))
            .order((
                download_jobs::order_key.asc(),
                download_jobs::created_at.asc(),
            ))
            .limit(limit.unwrap_or(i64::MAX))
            .select(DownloadJobModel::as_select())
            .load(&mut conn)
            .map_err(|e| AppError::DatabaseError(format!("Failed to get pending jobs: {}", e)))?;

        jobs.into_iter().map(DownloadJobModel::to_job_record).collect()
    }

    async fn list_all(&self) -> AppResult<Vec<JobRecord>> {
        let mut conn = self.get_conn()?;

        let jobs: Vec<DownloadJobModel> = download_jobs::table
            .select(DownloadJobModel::as_select())
            .load(&mut conn)
            .map_err(|e| AppError::DatabaseError(format!("Failed to list jobs: {}", e)))?;

        let mut records = jobs
            .into_iter()
            .map(DownloadJobModel::to_job_record)
            .collect::<AppResult<Vec<_>>>()?;
        records.sort_by(Self::display_order);
        Ok(records)
    }

    async fn move_to_head(&self, job_id: Uuid) -> AppResult<bool> {
        self.reorder(job_id, true)
    }

    async fn move_to_tail(&self, job_id: Uuid) -> AppResult<bool> {
        self.reorder(job_id, false)
    }

    async fn insert_update_at_tail(&self, job: NewJob) -> AppResult<UpdateEnqueue> {
        let NewJob::UpdateTitle { manga_id, .. } = &job else {
            return Err(AppError::InvalidInput(
                "Only update jobs are deduplicated by title".to_string(),
            ));
        };
        let manga_key = manga_id.to_string();
        let mut conn = self.get_conn()?;

        let (model, inserted) = conn.immediate_transaction::<_, AppError, _>(|conn| {
            if let Some(existing) = Self::pending_update(conn, &manga_key)? {
                return Ok((existing, false));
            }
            Ok((Self::insert_row(conn, job, false)?, true))
        })?;

        let record = model.to_job_record()?;
        if inserted {
            log_debug!(
                "Queued update job {} at tail (order key {})",
                record.id,
                record.order_key
            );
            Ok(UpdateEnqueue::Queued(record))
        } else {
            Ok(UpdateEnqueue::AlreadyPending(record))
        }
    }

    async fn dequeue(&self) -> AppResult<Option<JobRecord>> {
        let mut conn = self.get_conn()?;

        let claimed = conn.immediate_transaction::<_, AppError, _>(|conn| {
            // Single execution slot
            let running: i64 = download_jobs::table
                .filter(download_jobs::status.eq(JobStatus::Running.as_str()))
                .count()
                .get_result(conn)?;
            if running > 0 {
                log_warn!("Refusing to start a job while {} job(s) are running", running);
                return Ok(None);
            }

            let next = download_jobs::table
                .filter(download_jobs::status.eq(JobStatus::Pending.as_str()))
                .order((
                    download_jobs::order_key.asc(),
                    download_jobs::created_at.asc(),
                ))
                .select(DownloadJobModel::as_select())
                .first(conn)
                .optional()?;
            let Some(next) = next else {
                return Ok(None);
            };

            let status = next
                .parse_status()?
                .apply(Transition::Start, next.flags())
                .map_err(|e| AppError::InternalError(e.to_string()))?;
            let timestamps = JobTimestamps {
                started_at: next.started_at.map(|t| t.and_utc()),
                completed_at: next.completed_at.map(|t| t.and_utc()),
            }
            .stamp(status, Utc::now());

            diesel::update(
                download_jobs::table
                    .filter(download_jobs::id.eq(&next.id))
                    .filter(download_jobs::status.eq(JobStatus::Pending.as_str())),
            )
            .set((
                download_jobs::status.eq(status.as_str()),
                download_jobs::started_at.eq(timestamps.started_at.map(|t| t.naive_utc())),
            ))
            .execute(conn)?;

            Ok(Self::find_model(conn, &next.id)?)
        })?;

        claimed.map(DownloadJobModel::to_job_record).transpose()
    }

    async fn set_resolved_title(&self, job_id: Uuid, manga_id: Uuid, title: &str) -> AppResult<()> {
        let mut conn = self.get_conn()?;

        diesel::update(download_jobs::table.find(job_id.to_string()))
            .set((
                download_jobs::manga_id.eq(Some(manga_id.to_string())),
                download_jobs::title.eq(Some(title)),
            ))
            .execute(&mut conn)
            .map_err(|e| AppError::DatabaseError(format!("Failed to set job title: {}", e)))?;

        Ok(())
    }

    async fn update_progress(&self, job_id: Uuid, progress: &JobProgress) -> AppResult<bool> {
        let mut conn = self.get_conn()?;
        let key = job_id.to_string();

        conn.immediate_transaction::<_, AppError, _>(|conn| {
            let Some(model) = Self::find_model(conn, &key)? else {
                return Ok(false);
            };
            if model.parse_status()? != JobStatus::Running || model.cancel_requested {
                return Ok(false);
            }

            let current = model.to_job_record()?.progress;
            if let Some(current) = current {
                if progress.position() < current.position() {
                    log_warn!(
                        "Ignoring backwards progress for job {}: {:?} -> {:?}",
                        key,
                        current.position(),
                        progress.position()
                    );
                    return Ok(false);
                }
            }

            diesel::update(download_jobs::table.find(&key))
                .set(&ProgressColumns::from(progress))
                .execute(conn)?;
            Ok(true)
        })
    }

    async fn request_cancel(&self, job_id: Uuid) -> AppResult<CancelOutcome> {
        let mut conn = self.get_conn()?;
        let key = job_id.to_string();

        conn.immediate_transaction::<_, AppError, _>(|conn| {
            let Some(model) = Self::find_model(conn, &key)? else {
                return Ok(CancelOutcome::NoOp);
            };

            match model.parse_status()? {
                JobStatus::Pending => {
                    let status = JobStatus::Pending
                        .apply(Transition::Cancel, model.flags())
                        .map_err(|e| AppError::InternalError(e.to_string()))?;
                    let now = Self::now();
                    diesel::update(download_jobs::table.find(&key))
                        .set((
                            download_jobs::status.eq(status.as_str()),
                            download_jobs::completed_at.eq(Some(model.completed_at.unwrap_or(now))),
                        ))
                        .execute(conn)?;
                    Ok(CancelOutcome::Canceled)
                }
                JobStatus::Running => {
                    if !model.cancel_requested {
                        diesel::update(download_jobs::table.find(&key))
                            .set(download_jobs::cancel_requested.eq(true))
                            .execute(conn)?;
                    }
                    Ok(CancelOutcome::Requested)
                }
                JobStatus::Completed | JobStatus::Canceled | JobStatus::Failed => {
                    Ok(CancelOutcome::NoOp)
                }
            }
        })
    }

    async fn is_cancel_requested(&self, job_id: Uuid) -> AppResult<bool> {
        let mut conn = self.get_conn()?;

        let requested = download_jobs::table
            .find(job_id.to_string())
            .select(download_jobs::cancel_requested)
            .first::<bool>(&mut conn)
            .optional()
            .map_err(|e| AppError::DatabaseError(format!("Failed to read cancel flag: {}", e)))?;

        Ok(requested.unwrap_or(false))
    }

    async fn finish(&self, job_id: Uuid, outcome: JobOutcome) -> AppResult<JobRecord> {
        let mut conn = self.get_conn()?;
        let key = job_id.to_string();

        let model = conn.immediate_transaction::<_, AppError, _>(|conn| {
            let model = Self::find_model(conn, &key)?
                .ok_or_else(|| AppError::NotFound(format!("Job {} not found", key)))?;

            let (transition, error) = match outcome {
                JobOutcome::Completed => (Transition::Complete, None),
                JobOutcome::Canceled => (Transition::Cancel, None),
                JobOutcome::Failed(message) => (Transition::Fail, Some(message)),
            };
            let status = model
                .parse_status()?
                .apply(transition, model.flags())
                .map_err(|e| AppError::InternalError(format!("Job {}: {}", key, e)))?;
            let timestamps = JobTimestamps {
                started_at: model.started_at.map(|t| t.and_utc()),
                completed_at: model.completed_at.map(|t| t.and_utc()),
            }
            .stamp(status, Utc::now());

            diesel::update(
                download_jobs::table
                    .filter(download_jobs::id.eq(&key))
                    .filter(download_jobs::status.eq(JobStatus::Running.as_str())),
            )
            .set((
                download_jobs::status.eq(status.as_str()),
                download_jobs::error.eq(error),
                download_jobs::completed_at.eq(timestamps.completed_at.map(|t| t.naive_utc())),
            ))
            .execute(conn)?;

            Self::find_model(conn, &key)?
                .ok_or_else(|| AppError::NotFound(format!("Job {} not found", key)))
        })?;

        model.to_job_record()
    }

    async fn recover_running(&self) -> AppResult<Vec<Uuid>> {
        let mut conn = self.get_conn()?;

        let orphaned: Vec<String> = download_jobs::table
            .filter(download_jobs::status.eq(JobStatus::Running.as_str()))
            .order(download_jobs::started_at.desc())
            .select(download_jobs::id)
            .load(&mut conn)
            .map_err(|e| AppError::DatabaseError(format!("Failed to find running jobs: {}", e)))?;

        let mut recovered = Vec::with_capacity(orphaned.len());
        for key in orphaned {
            let status = conn.immediate_transaction::<_, AppError, _>(|conn| {
                let Some(model) = Self::find_model(conn, &key)? else {
                    return Ok(None);
                };
                let current = model.parse_status()?;

                // A cancel that arrived before the crash still wins
                let transition = if model.cancel_requested {
                    Transition::Cancel
                } else {
                    Transition::Recover
                };
                let Ok(status) = current.apply(transition, model.flags()) else {
                    return Ok(None);
                };

                match status {
                    JobStatus::Pending => {
                        let order_key = Self::head_key(conn, Some(&key))?;
                        diesel::update(download_jobs::table.find(&key))
                            .set((
                                download_jobs::status.eq(status.as_str()),
                                download_jobs::order_key.eq(order_key),
                                download_jobs::recovered.eq(true),
                            ))
                            .execute(conn)?;
                        diesel::update(download_jobs::table.find(&key))
                            .set(&ProgressColumns::cleared())
                            .execute(conn)?;
                    }
                    _ => {
                        let error = (status == JobStatus::Failed).then_some(INTERRUPTED_TWICE);
                        let now = Self::now();
                        diesel::update(download_jobs::table.find(&key))
                            .set((
                                download_jobs::status.eq(status.as_str()),
                                download_jobs::error.eq(error),
                                download_jobs::completed_at
                                    .eq(Some(model.completed_at.unwrap_or(now))),
                            ))
                            .execute(conn)?;
                    }
                }
                Ok(Some(status))
            })?;

            match status {
                Some(JobStatus::Pending) => {
                    log_info!("Recovered interrupted job {} back to the queue head", key);
                    recovered.push(Uuid::parse_str(&key)?);
                }
                Some(JobStatus::Failed) => {
                    log_warn!("Job {} was interrupted again after recovery, failing it", key)
                }
                Some(other) => log_info!("Interrupted job {} finished as {}", key, other),
                None => {}
            }
        }

        Ok(recovered)
    }

    async fn remove_terminal(&self) -> AppResult<usize> {
        let mut conn = self.get_conn()?;

        let terminal: Vec<&str> = JobStatus::TERMINAL.iter().map(|s| s.as_str()).collect();
        let deleted = diesel::delete(
            download_jobs::table.filter(download_jobs::status.eq_any(terminal)),
        )
        .execute(&mut conn)
        .map_err(|e| AppError::DatabaseError(format!("Failed to delete finished jobs: {}", e)))?;

        Ok(deleted)
    }

    async fn order_key_bounds(&self) -> AppResult<Option<(f64, f64)>> {
        let mut conn = self.get_conn()?;

        let bounds = Self::pending_bounds(&mut conn, None)
            .map_err(|e| AppError::DatabaseError(format!("Failed to read order keys: {}", e)))?;

        Ok(match bounds {
            (Some(lowest), Some(highest)) => Some((lowest, highest)),
            _ => None,
        })
    }

    async fn renumber_pending(&self) -> AppResult<usize> {
        let mut conn = self.get_conn()?;

        conn.immediate_transaction::<_, AppError, _>(|conn| {
            let ids: Vec<String> = download_jobs::table
                .filter(download_jobs::status.eq(JobStatus::Pending.as_str()))
                .order((
                    download_jobs::order_key.asc(),
                    download_jobs::created_at.asc(),
                ))
                .select(download_jobs::id)
                .load(conn)?;

            for (position, id) in ids.iter().enumerate() {
                diesel::update(download_jobs::table.find(id))
                    .set(download_jobs::order_key.eq(position as f64))
                    .execute(conn)?;
            }
            Ok(ids.len())
        })
    }

    async fn get_statistics(&self) -> AppResult<JobStatistics> {
        let mut conn = self.get_conn()?;

        let counts: Vec<(String, i64)> = download_jobs::table
            .group_by(download_jobs::status)
            .select((download_jobs::status, count_star()))
            .load(&mut conn)
            .map_err(|e| AppError::DatabaseError(format!("Failed to count jobs: {}", e)))?;

        let mut stats = JobStatistics::default();
        for (status, count) in counts {
            match status.parse::<JobStatus>().map_err(AppError::DatabaseError)? {
                JobStatus::Pending => stats.pending_count = count,
                JobStatus::Running => stats.running_count = count,
                JobStatus::Completed => stats.completed_count = count,
                JobStatus::Canceled => stats.canceled_count = count,
                JobStatus::Failed => stats.failed_count = count,
            }
            stats.total_count += count;
        }
        Ok(stats)
    }
}
