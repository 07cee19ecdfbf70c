use crate::modules::jobs::commands::*;
use crate::modules::jobs::DownloadQueueService;
use axum::routing::{delete, get, post};
use axum::Router;
use std::sync::Arc;

/// State shared by every HTTP handler
pub struct AppState {
    pub queue: Arc<DownloadQueueService>,
}

impl AppState {
    pub fn new(queue: Arc<DownloadQueueService>) -> Self {
        Self { queue }
    }
}

/// Single source of truth for the HTTP routes
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Queue
        .route("/api/downloads", post(enqueue_download).get(list_downloads))
        .route("/api/downloads/stats", get(download_statistics))
        .route("/api/downloads/completed", delete(clear_completed))
        .route("/api/downloads/:id/cancel", post(cancel_download))
        .route("/api/downloads/:id/move-top", post(move_to_top))
        .route("/api/downloads/:id/move-bottom", post(move_to_bottom))
        // Catalog titles
        .route("/api/manga/:manga_id/update", post(enqueue_update))
        .route("/api/manga/:manga_id/check-updates", post(check_for_updates))
        .with_state(state)
}
