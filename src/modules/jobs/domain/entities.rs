/// Domain entities for the download queue
///
/// A job asks the worker to add a new title or to fetch new chapters of a
/// known one. Jobs wait in an ordered queue until the worker picks them up.
use crate::modules::catalog::Direction;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Job status enum matching the persisted text values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Canceled,
    Failed,
}

impl JobStatus {
    pub const TERMINAL: [JobStatus; 3] = [JobStatus::Completed, JobStatus::Canceled, JobStatus::Failed];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Canceled => "canceled",
            JobStatus::Failed => "failed",
        }
    }

    /// No transition leaves a terminal state
    pub fn is_terminal(&self) -> bool {
        match self {
            JobStatus::Completed | JobStatus::Canceled | JobStatus::Failed => true,
            JobStatus::Pending | JobStatus::Running => false,
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(JobStatus::Pending),
            "running" => Ok(JobStatus::Running),
            "completed" => Ok(JobStatus::Completed),
            "canceled" => Ok(JobStatus::Canceled),
            "failed" => Ok(JobStatus::Failed),
            _ => Err(format!("Invalid job status: {}", s)),
        }
    }
}

/// What a job does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// Resolve a new title from its source URL and download every chapter
    AddTitle,
    /// Download chapters of a catalog title that are not stored yet
    UpdateTitle,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::AddTitle => "add_title",
            JobKind::UpdateTitle => "update_title",
        }
    }
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JobKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "add_title" => Ok(JobKind::AddTitle),
            "update_title" => Ok(JobKind::UpdateTitle),
            _ => Err(format!("Invalid job kind: {}", s)),
        }
    }
}

/// Snapshot of how far a running job has come.
///
/// Indexes are zero-based positions within the chapters (and pages) this run
/// downloads. Page fields are only present once the chapter is known.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobProgress {
    pub chapter_title: String,
    pub chapter_index: i32,
    pub total_chapters: i32,
    pub page: Option<PageProgress>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageProgress {
    pub page_index: i32,
    pub total_pages: i32,
}

impl JobProgress {
    pub fn chapter(chapter_title: impl Into<String>, chapter_index: i32, total_chapters: i32) -> Self {
        Self {
            chapter_title: chapter_title.into(),
            chapter_index,
            total_chapters,
            page: None,
        }
    }

    pub fn with_page(mut self, page_index: i32, total_pages: i32) -> Self {
        self.page = Some(PageProgress {
            page_index,
            total_pages,
        });
        self
    }

    /// Position used to check that progress never moves backwards
    pub fn position(&self) -> (i32, i32) {
        (
            self.chapter_index,
            self.page.map(|p| p.page_index).unwrap_or(-1),
        )
    }

    /// Completed fraction in `0.0..=1.0`
    pub fn fraction(&self) -> f64 {
        if self.total_chapters <= 0 {
            return 0.0;
        }
        let within_chapter = match self.page {
            Some(page) if page.total_pages > 0 => {
                (page.page_index + 1) as f64 / page.total_pages as f64
            }
            _ => 0.0,
        };
        ((self.chapter_index as f64 + within_chapter) / self.total_chapters as f64).min(1.0)
    }
}

/// New job to be queued (before insertion to database)
#[derive(Debug, Clone, PartialEq)]
pub enum NewJob {
    AddTitle {
        url: String,
        direction: Option<Direction>,
    },
    UpdateTitle {
        manga_id: Uuid,
        title: String,
        url: String,
    },
}

impl NewJob {
    pub fn add_title(url: impl Into<String>, direction: Option<Direction>) -> Self {
        NewJob::AddTitle {
            url: url.into(),
            direction,
        }
    }

    pub fn update_title(manga_id: Uuid, title: impl Into<String>, url: impl Into<String>) -> Self {
        NewJob::UpdateTitle {
            manga_id,
            title: title.into(),
            url: url.into(),
        }
    }

    pub fn kind(&self) -> JobKind {
        match self {
            NewJob::AddTitle { .. } => JobKind::AddTitle,
            NewJob::UpdateTitle { .. } => JobKind::UpdateTitle,
        }
    }
}

/// Job record from database (with metadata)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: Uuid,
    pub kind: JobKind,
    pub status: JobStatus,
    pub url: String,
    pub manga_id: Option<Uuid>,
    pub title: Option<String>,
    pub direction: Option<Direction>,
    pub error: Option<String>,
    pub progress: Option<JobProgress>,
    /// Only meaningful while the job is pending
    pub order_key: f64,
    pub cancel_requested: bool,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl JobRecord {
    /// Label shown in listings before the source has resolved a title
    pub fn display_title(&self) -> String {
        match (&self.title, self.kind) {
            (Some(title), _) => title.clone(),
            (None, JobKind::AddTitle) => format!("Adding: {}", self.url),
            (None, JobKind::UpdateTitle) => "Updating manga".to_string(),
        }
    }
}
