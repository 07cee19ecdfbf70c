/// Background worker that executes download jobs one at a time
///
/// The worker polls the queue, claims the job at the head and drives it
/// through the content source into the catalog. On startup it heals jobs a
/// previous process left in `Running`. Queue store errors end the loop so a
/// supervisor can restart the worker and let recovery run again.
use crate::modules::catalog::{CatalogStore, DownloadStatus, Manga, NewChapter, NewPage};
use crate::modules::jobs::application::{chapters_to_download, CancellationRegistry};
use crate::modules::jobs::domain::entities::{JobKind, JobProgress, JobRecord};
use crate::modules::jobs::domain::repository::{JobOutcome, JobRepository};
use crate::modules::source::{ContentSource, SourceChapter};
use crate::shared::errors::{AppError, AppResult};
use crate::shared::utils::logger::{LogContext, TimedOperation};
use crate::{log_debug, log_error, log_info, log_warn};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
const DEFAULT_RENUMBER_THRESHOLD: f64 = 1e6;

/// Why a job stopped before finishing normally
#[derive(Debug)]
enum Halt {
    Canceled,
    /// Content source or catalog failure; recorded on the job
    Failed(AppError),
    /// Queue store failure; fatal to the worker
    Store(AppError),
}

pub struct DownloadWorker {
    job_repository: Arc<dyn JobRepository>,
    catalog: Arc<dyn CatalogStore>,
    source: Arc<dyn ContentSource>,
    cancellations: Arc<CancellationRegistry>,
    poll_interval: Duration,
    renumber_threshold: f64,
    shutdown: CancellationToken,
    is_running: Arc<RwLock<bool>>,
    current_job: Arc<RwLock<Option<Uuid>>>,
}

impl DownloadWorker {
    pub fn new(
        job_repository: Arc<dyn JobRepository>,
        catalog: Arc<dyn CatalogStore>,
        source: Arc<dyn ContentSource>,
        cancellations: Arc<CancellationRegistry>,
    ) -> Self {
        Self {
            job_repository,
            catalog,
            source,
            cancellations,
            poll_interval: DEFAULT_POLL_INTERVAL,
            renumber_threshold: DEFAULT_RENUMBER_THRESHOLD,
            shutdown: CancellationToken::new(),
            is_running: Arc::new(RwLock::new(false)),
            current_job: Arc::new(RwLock::new(None)),
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_renumber_threshold(mut self, threshold: f64) -> Self {
        self.renumber_threshold = threshold;
        self
    }

    /// Run the worker loop until `stop` is called.
    ///
    /// Spawn it with `tokio::spawn`. Returns an error only when the queue
    /// store fails; the job being executed is then left in `Running` for the
    /// next startup to recover.
    pub async fn run(self: Arc<Self>) -> AppResult<()> {
        if self.shutdown.is_cancelled() {
            return Ok(());
        }

        log_info!("Download worker started");
        *self.is_running.write().await = true;

        let result = self.run_loop().await;

        *self.is_running.write().await = false;
        match &result {
            Ok(()) => log_info!("Download worker stopped"),
            Err(e) => LogContext::error_with_context(e, "Download worker stopped on queue store error"),
        }
        result
    }

    async fn run_loop(&self) -> AppResult<()> {
        let recovered = self.job_repository.recover_running().await?;
        if !recovered.is_empty() {
            log_info!("Recovered {} interrupted job(s)", recovered.len());
        }

        while !self.shutdown.is_cancelled() {
            if self.process_next_job().await? {
                // Go straight to the next job
                continue;
            }

            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {}
                _ = self.shutdown.cancelled() => {}
            }
        }
        Ok(())
    }

    /// Stop after the current job
    pub fn stop(&self) {
        self.shutdown.cancel();
        log_info!("Download worker stop requested");
    }

    /// Process the next job in the queue
    ///
    /// Returns true if a job was processed, false if the queue was empty
    async fn process_next_job(&self) -> AppResult<bool> {
        self.maintain_order_keys().await?;

        let job = match self.job_repository.dequeue().await? {
            Some(job) => job,
            None => return Ok(false),
        };

        log_info!("Processing job {} ({}: {})", job.id, job.kind, job.url);
        let timer = TimedOperation::new(&format!("download job {}", job.id));
        *self.current_job.write().await = Some(job.id);

        let token = self.cancellations.register(job.id);
        let result = self.execute(&job, &token).await;
        self.cancellations.release(job.id);
        *self.current_job.write().await = None;

        let outcome = match result {
            Ok(()) => JobOutcome::Completed,
            Err(Halt::Canceled) => JobOutcome::Canceled,
            Err(Halt::Failed(e)) => {
                log_warn!("Job {} failed: {}", job.id, e);
                JobOutcome::Failed(e.to_string())
            }
            Err(Halt::Store(e)) => return Err(e),
        };

        let finished = self.job_repository.finish(job.id, outcome).await?;
        timer.finish_with_info(finished.status.as_str());
        log_info!("Job {} finished as {}", finished.id, finished.status);

        Ok(true)
    }

    async fn execute(&self, job: &JobRecord, token: &CancellationToken) -> Result<(), Halt> {
        // A cancel may have landed between dequeue and token registration
        if self
            .job_repository
            .is_cancel_requested(job.id)
            .await
            .map_err(Halt::Store)?
        {
            return Err(Halt::Canceled);
        }

        let remote = race(token, self.source.fetch_manga(&job.url)).await?;

        let manga = match job.kind {
            JobKind::AddTitle => {
                let direction = job.direction.unwrap_or(remote.direction);
                let manga = self
                    .catalog
                    .get_or_create_manga(&remote.title, direction, &job.url)
                    .await
                    .map_err(Halt::Failed)?;
                self.job_repository
                    .set_resolved_title(job.id, manga.id, &manga.title)
                    .await
                    .map_err(Halt::Store)?;
                manga
            }
            JobKind::UpdateTitle => {
                let manga_id = job.manga_id.ok_or_else(|| {
                    Halt::Failed(AppError::InvalidInput(format!(
                        "Update job {} has no manga",
                        job.id
                    )))
                })?;
                self.catalog
                    .get_manga(manga_id)
                    .await
                    .map_err(Halt::Failed)?
                    .ok_or_else(|| {
                        Halt::Failed(AppError::NotFound(format!(
                            "Manga with ID {} not found",
                            manga_id
                        )))
                    })?
            }
        };

        let stored = self
            .catalog
            .get_chapters(manga.id)
            .await
            .map_err(Halt::Failed)?;
        let chapters = chapters_to_download(&remote.chapters, &stored);
        log_debug!(
            "'{}': {} chapter(s) to download",
            manga.title,
            chapters.len()
        );

        let total_chapters = chapters.len() as i32;
        for (chapter_index, chapter) in chapters.iter().enumerate() {
            self.download_chapter(job, token, &manga, chapter, chapter_index as i32, total_chapters)
                .await?;
        }
        Ok(())
    }

    async fn download_chapter(
        &self,
        job: &JobRecord,
        token: &CancellationToken,
        manga: &Manga,
        chapter: &SourceChapter,
        chapter_index: i32,
        total_chapters: i32,
    ) -> Result<(), Halt> {
        let chapter_title = chapter
            .title
            .clone()
            .unwrap_or_else(|| format!("Chapter {}", chapter.index));
        let progress = JobProgress::chapter(&chapter_title, chapter_index, total_chapters);
        self.report(job.id, &progress).await?;

        let stored = self
            .catalog
            .append_chapter(
                manga.id,
                &NewChapter {
                    url: chapter.url.clone(),
                    title: chapter.title.clone(),
                    index: chapter.index,
                },
            )
            .await
            .map_err(Halt::Failed)?;

        let pages = race(token, self.source.fetch_pages(chapter)).await?;
        let total_pages = pages.len() as i32;

        for (page_index, page) in pages.iter().enumerate() {
            let page_index = page_index as i32;
            self.report(job.id, &progress.clone().with_page(page_index, total_pages))
                .await?;
            LogContext::download_progress(
                chapter_index as usize,
                total_chapters as usize,
                page_index as usize,
                total_pages as usize,
            );

            let image = race(token, self.source.fetch_page(page)).await?;
            self.catalog
                .append_page(
                    stored.id,
                    NewPage {
                        name: page.name.clone(),
                        index: page_index,
                        width: image.width,
                        height: image.height,
                        data: image.bytes,
                    },
                )
                .await
                .map_err(Halt::Failed)?;

            if token.is_cancelled() {
                return Err(Halt::Canceled);
            }
        }

        self.catalog
            .set_chapter_status(stored.id, DownloadStatus::Downloaded)
            .await
            .map_err(Halt::Failed)?;
        Ok(())
    }

    /// Write a progress snapshot. A rejected write means the job was asked to stop.
    async fn report(&self, job_id: Uuid, progress: &JobProgress) -> Result<(), Halt> {
        let accepted = self
            .job_repository
            .update_progress(job_id, progress)
            .await
            .map_err(Halt::Store)?;
        if accepted {
            return Ok(());
        }

        if self
            .job_repository
            .is_cancel_requested(job_id)
            .await
            .map_err(Halt::Store)?
        {
            return Err(Halt::Canceled);
        }
        log_warn!("Progress for job {} was not recorded", job_id);
        Ok(())
    }

    /// Renumber pending order keys once they drift far from zero
    async fn maintain_order_keys(&self) -> AppResult<()> {
        let Some((lowest, highest)) = self.job_repository.order_key_bounds().await? else {
            return Ok(());
        };

        if lowest.abs().max(highest.abs()) > self.renumber_threshold {
            let renumbered = self.job_repository.renumber_pending().await?;
            log_info!("Renumbered {} pending job(s)", renumbered);
        }
        Ok(())
    }

    /// Get statistics about the worker and job queue
    pub async fn get_statistics(&self) -> AppResult<WorkerStatistics> {
        let job_stats = self.job_repository.get_statistics().await?;
        let is_running = *self.is_running.read().await;
        let current_job = *self.current_job.read().await;

        Ok(WorkerStatistics {
            is_running,
            current_job,
            pending_jobs: job_stats.pending_count,
            running_jobs: job_stats.running_count,
            completed_jobs: job_stats.completed_count,
            canceled_jobs: job_stats.canceled_count,
            failed_jobs: job_stats.failed_count,
            total_jobs: job_stats.total_count,
        })
    }
}

/// Await a source call unless the job is canceled first
async fn race<T, F>(token: &CancellationToken, request: F) -> Result<T, Halt>
where
    F: Future<Output = AppResult<T>>,
{
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(Halt::Canceled),
        result = request => result.map_err(|e| {
            log_error!("Content source request failed: {}", e);
            Halt::Failed(e)
        }),
    }
}

/// Worker statistics for monitoring
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct WorkerStatistics {
    pub is_running: bool,
    pub current_job: Option<Uuid>,
    pub pending_jobs: i64,
    pub running_jobs: i64,
    pub completed_jobs: i64,
    pub canceled_jobs: i64,
    pub failed_jobs: i64,
    pub total_jobs: i64,
}
