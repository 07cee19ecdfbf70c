use super::cancellation::CancellationRegistry;
use super::chapters::chapters_to_download;
use crate::modules::catalog::{CatalogStore, Direction};
use crate::modules::jobs::domain::entities::{JobRecord, NewJob};
use crate::modules::jobs::domain::repository::{
    CancelOutcome, JobRepository, JobStatistics, UpdateEnqueue,
};
use crate::modules::source::ContentSource;
use crate::shared::errors::{AppError, AppResult};
use crate::shared::utils::Validator;
use crate::{log_debug, log_info};
use std::sync::Arc;
use uuid::Uuid;

/// Queue control operations exposed to the HTTP layer
pub struct DownloadQueueService {
    job_repo: Arc<dyn JobRepository>,
    catalog: Arc<dyn CatalogStore>,
    source: Arc<dyn ContentSource>,
    cancellations: Arc<CancellationRegistry>,
}

impl DownloadQueueService {
    pub fn new(
        job_repo: Arc<dyn JobRepository>,
        catalog: Arc<dyn CatalogStore>,
        source: Arc<dyn ContentSource>,
        cancellations: Arc<CancellationRegistry>,
    ) -> Self {
        Self {
            job_repo,
            catalog,
            source,
            cancellations,
        }
    }

    /// Queue a new title ahead of everything already waiting
    pub async fn enqueue_add(&self, url: &str, direction: Option<Direction>) -> AppResult<JobRecord> {
        Validator::validate_source_url(url)?;

        let job = self
            .job_repo
            .insert_at_head(NewJob::add_title(url.trim(), direction))
            .await?;

        log_info!("Queued download of {} as job {}", job.url, job.id);
        Ok(job)
    }

    /// Queue an update of a catalog title behind everything already waiting.
    ///
    /// A title with an update already pending keeps that job; its id is returned.
    pub async fn enqueue_update(&self, manga_id: Uuid) -> AppResult<JobRecord> {
        let manga = self
            .catalog
            .get_manga(manga_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Manga with ID {} not found", manga_id)))?;

        let queued = self
            .job_repo
            .insert_update_at_tail(NewJob::update_title(manga.id, &manga.title, &manga.url))
            .await?;

        match &queued {
            UpdateEnqueue::Queued(job) => {
                log_info!("Queued update of '{}' as job {}", manga.title, job.id)
            }
            UpdateEnqueue::AlreadyPending(job) => log_debug!(
                "Update of '{}' already queued as job {}",
                manga.title,
                job.id
            ),
        }
        Ok(queued.into_job())
    }

    /// Count the chapters a title is missing without queueing anything
    pub async fn check_for_updates(&self, manga_id: Uuid) -> AppResult<usize> {
        let manga = self
            .catalog
            .get_manga(manga_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Manga with ID {} not found", manga_id)))?;

        let remote = self.source.fetch_manga(&manga.url).await?;
        let stored = self.catalog.get_chapters(manga.id).await?;
        let missing = chapters_to_download(&remote.chapters, &stored).len();

        log_info!("'{}' has {} new chapter(s)", manga.title, missing);
        Ok(missing)
    }

    pub async fn move_to_head(&self, job_id: Uuid) -> AppResult<()> {
        if !self.job_repo.move_to_head(job_id).await? {
            log_debug!("Job {} is not pending, not moving it", job_id);
        }
        Ok(())
    }

    pub async fn move_to_tail(&self, job_id: Uuid) -> AppResult<()> {
        if !self.job_repo.move_to_tail(job_id).await? {
            log_debug!("Job {} is not pending, not moving it", job_id);
        }
        Ok(())
    }

    /// Cancel a job. Pending jobs end immediately; a running job stops after
    /// its current page. Finished or unknown jobs are left untouched.
    pub async fn cancel(&self, job_id: Uuid) -> AppResult<CancelOutcome> {
        let outcome = self.job_repo.request_cancel(job_id).await?;

        match outcome {
            CancelOutcome::Canceled => log_info!("Canceled pending job {}", job_id),
            CancelOutcome::Requested => {
                self.cancellations.cancel(job_id);
                log_info!("Cancellation requested for running job {}", job_id);
            }
            CancelOutcome::NoOp => log_debug!("Nothing to cancel for job {}", job_id),
        }

        Ok(outcome)
    }

    /// Remove every completed, canceled and failed job
    pub async fn clear_completed(&self) -> AppResult<usize> {
        let removed = self.job_repo.remove_terminal().await?;
        log_info!("Cleared {} finished job(s)", removed);
        Ok(removed)
    }

    pub async fn list(&self) -> AppResult<Vec<JobRecord>> {
        self.job_repo.list_all().await
    }

    pub async fn statistics(&self) -> AppResult<JobStatistics> {
        self.job_repo.get_statistics().await
    }
}
