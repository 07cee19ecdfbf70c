use super::domain::entities::{JobKind, JobRecord, JobStatus};
use super::domain::repository::JobStatistics;
use crate::commands::AppState;
use crate::modules::catalog::Direction;
use crate::shared::errors::AppResult;
use crate::{log_debug, log_info};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnqueueDownloadRequest {
    pub url: String,
    pub direction: Option<Direction>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobCreatedResponse {
    pub id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateCheckResponse {
    pub new_chapters_found: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClearCompletedResponse {
    pub removed: usize,
}

/// Progress as shown to clients, flattened with a completed fraction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobProgressView {
    pub chapter_title: String,
    pub chapter_index: i32,
    pub total_chapters: i32,
    pub page_index: Option<i32>,
    pub total_pages: Option<i32>,
    pub fraction: f64,
}

/// One row of the downloads list
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobView {
    pub id: Uuid,
    pub kind: JobKind,
    pub status: JobStatus,
    pub title: String,
    pub url: String,
    pub manga_id: Option<Uuid>,
    pub direction: Option<Direction>,
    pub error: Option<String>,
    pub progress: Option<JobProgressView>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<JobRecord> for JobView {
    fn from(job: JobRecord) -> Self {
        let title = job.display_title();
        let progress = job.progress.map(|progress| JobProgressView {
            fraction: progress.fraction(),
            page_index: progress.page.map(|p| p.page_index),
            total_pages: progress.page.map(|p| p.total_pages),
            chapter_title: progress.chapter_title,
            chapter_index: progress.chapter_index,
            total_chapters: progress.total_chapters,
        });

        Self {
            id: job.id,
            kind: job.kind,
            status: job.status,
            title,
            url: job.url,
            manga_id: job.manga_id,
            direction: job.direction,
            error: job.error,
            progress,
            created_at: job.created_at,
            started_at: job.started_at,
            completed_at: job.completed_at,
        }
    }
}

// POST /api/downloads
pub async fn enqueue_download(
    State(state): State<Arc<AppState>>,
    Json(request): Json<EnqueueDownloadRequest>,
) -> AppResult<(StatusCode, Json<JobCreatedResponse>)> {
    log_info!("Download requested for {}", request.url);

    let job = state.queue.enqueue_add(&request.url, request.direction).await?;
    Ok((StatusCode::CREATED, Json(JobCreatedResponse { id: job.id })))
}

// POST /api/manga/:manga_id/update
pub async fn enqueue_update(
    State(state): State<Arc<AppState>>,
    Path(manga_id): Path<Uuid>,
) -> AppResult<(StatusCode, Json<JobCreatedResponse>)> {
    let job = state.queue.enqueue_update(manga_id).await?;
    Ok((StatusCode::CREATED, Json(JobCreatedResponse { id: job.id })))
}

// POST /api/manga/:manga_id/check-updates
pub async fn check_for_updates(
    State(state): State<Arc<AppState>>,
    Path(manga_id): Path<Uuid>,
) -> AppResult<Json<UpdateCheckResponse>> {
    let new_chapters_found = state.queue.check_for_updates(manga_id).await?;
    Ok(Json(UpdateCheckResponse { new_chapters_found }))
}

// POST /api/downloads/:id/cancel
pub async fn cancel_download(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let outcome = state.queue.cancel(job_id).await?;
    log_debug!("Cancel of job {}: {:?}", job_id, outcome);
    Ok(StatusCode::NO_CONTENT)
}

// POST /api/downloads/:id/move-top
pub async fn move_to_top(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    state.queue.move_to_head(job_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// POST /api/downloads/:id/move-bottom
pub async fn move_to_bottom(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    state.queue.move_to_tail(job_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// DELETE /api/downloads/completed
pub async fn clear_completed(
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<ClearCompletedResponse>> {
    let removed = state.queue.clear_completed().await?;
    Ok(Json(ClearCompletedResponse { removed }))
}

// GET /api/downloads
pub async fn list_downloads(State(state): State<Arc<AppState>>) -> AppResult<Json<Vec<JobView>>> {
    let jobs = state.queue.list().await?;
    Ok(Json(jobs.into_iter().map(JobView::from).collect()))
}

// GET /api/downloads/stats
pub async fn download_statistics(
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<JobStatistics>> {
    Ok(Json(state.queue.statistics().await?))
}
