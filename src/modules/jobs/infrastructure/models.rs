/// Diesel models for the download_jobs table
use crate::modules::catalog::Direction;
use crate::modules::jobs::domain::entities::{
    JobKind, JobProgress, JobRecord, JobStatus, NewJob, PageProgress,
};
use crate::modules::jobs::domain::state_machine::JobFlags;
use crate::schema::download_jobs;
use crate::shared::errors::{AppError, AppResult};
use chrono::NaiveDateTime;
use diesel::prelude::*;
use uuid::Uuid;

/// Diesel model for querying and inserting jobs
#[derive(Queryable, Selectable, Insertable, Debug, Clone)]
#[diesel(table_name = download_jobs)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct DownloadJobModel {
    pub id: String,
    pub kind: String,
    pub status: String,
    pub url: String,
    pub manga_id: Option<String>,
    pub title: Option<String>,
    pub direction: Option<String>,
    pub error: Option<String>,
    pub progress_chapter_title: Option<String>,
    pub progress_chapter_index: Option<i32>,
    pub progress_total_chapters: Option<i32>,
    pub progress_page_index: Option<i32>,
    pub progress_total_pages: Option<i32>,
    pub order_key: f64,
    pub cancel_requested: bool,
    pub created_at: NaiveDateTime,
    pub started_at: Option<NaiveDateTime>,
    pub completed_at: Option<NaiveDateTime>,
    pub recovered: bool,
}

/// Progress columns, written together so a snapshot is never half-updated
#[derive(AsChangeset, Debug, Clone, Default)]
#[diesel(table_name = download_jobs)]
#[diesel(treat_none_as_null = true)]
pub struct ProgressColumns {
    pub progress_chapter_title: Option<String>,
    pub progress_chapter_index: Option<i32>,
    pub progress_total_chapters: Option<i32>,
    pub progress_page_index: Option<i32>,
    pub progress_total_pages: Option<i32>,
}

impl ProgressColumns {
    /// All-null columns, used to clear progress
    pub fn cleared() -> Self {
        Self::default()
    }
}

impl From<&JobProgress> for ProgressColumns {
    fn from(progress: &JobProgress) -> Self {
        Self {
            progress_chapter_title: Some(progress.chapter_title.clone()),
            progress_chapter_index: Some(progress.chapter_index),
            progress_total_chapters: Some(progress.total_chapters),
            progress_page_index: progress.page.map(|p| p.page_index),
            progress_total_pages: progress.page.map(|p| p.total_pages),
        }
    }
}

impl DownloadJobModel {
    /// Build a pending row for a new job
    pub fn from_new_job(job: NewJob, order_key: f64, now: NaiveDateTime) -> Self {
        let kind = job.kind();
        let (url, manga_id, title, direction) = match job {
            NewJob::AddTitle { url, direction } => (url, None, None, direction),
            NewJob::UpdateTitle {
                manga_id,
                title,
                url,
            } => (url, Some(manga_id.to_string()), Some(title), None),
        };

        Self {
            id: Uuid::new_v4().to_string(),
            kind: kind.to_string(),
            status: JobStatus::Pending.to_string(),
            url,
            manga_id,
            title,
            direction: direction.map(|d| d.to_string()),
            error: None,
            progress_chapter_title: None,
            progress_chapter_index: None,
            progress_total_chapters: None,
            progress_page_index: None,
            progress_total_pages: None,
            order_key,
            cancel_requested: false,
            created_at: now,
            started_at: None,
            completed_at: None,
            recovered: false,
        }
    }

    pub fn parse_status(&self) -> AppResult<JobStatus> {
        self.status.parse().map_err(AppError::DatabaseError)
    }

    pub fn flags(&self) -> JobFlags {
        JobFlags {
            cancel_requested: self.cancel_requested,
            recovered: self.recovered,
        }
    }

    fn progress(&self) -> Option<JobProgress> {
        let (Some(title), Some(chapter_index), Some(total_chapters)) = (
            self.progress_chapter_title.as_ref(),
            self.progress_chapter_index,
            self.progress_total_chapters,
        ) else {
            return None;
        };

        let page = match (self.progress_page_index, self.progress_total_pages) {
            (Some(page_index), Some(total_pages)) => Some(PageProgress {
                page_index,
                total_pages,
            }),
            _ => None,
        };

        Some(JobProgress {
            chapter_title: title.clone(),
            chapter_index,
            total_chapters,
            page,
        })
    }

    /// Convert to domain JobRecord
    pub fn to_job_record(self) -> AppResult<JobRecord> {
        let progress = self.progress();
        let kind: JobKind = self.kind.parse().map_err(AppError::DatabaseError)?;
        let status = self.parse_status()?;
        let manga_id = self.manga_id.as_deref().map(Uuid::parse_str).transpose()?;
        let direction = self
            .direction
            .as_deref()
            .map(str::parse::<Direction>)
            .transpose()
            .map_err(AppError::DatabaseError)?;

        Ok(JobRecord {
            id: Uuid::parse_str(&self.id)?,
            kind,
            status,
            url: self.url,
            manga_id,
            title: self.title,
            direction,
            error: self.error,
            progress,
            order_key: self.order_key,
            cancel_requested: self.cancel_requested,
            created_at: self.created_at.and_utc(),
            started_at: self.started_at.map(|t| t.and_utc()),
            completed_at: self.completed_at.map(|t| t.and_utc()),
        })
    }
}
