pub mod commands;
pub mod modules;
mod schema;
pub mod shared;

use commands::{build_router, AppState};
use modules::{
    catalog::{CatalogStore, CatalogStoreImpl},
    jobs::{
        CancellationRegistry, DownloadQueueService, DownloadWorker, JobRepository,
        JobRepositoryImpl,
    },
    source::ContentSource,
};
use shared::errors::{AppError, AppResult};
use shared::utils::logger::init_logger;
use shared::{AppConfig, Database};
use std::future::IntoFuture;
use std::sync::Arc;

/// Start the download queue: load configuration from the environment, open
/// the database, start the worker and serve the HTTP API.
///
/// Returns when the server stops or the worker hits a queue store error.
pub async fn run(source: Arc<dyn ContentSource>) -> AppResult<()> {
    init_logger();
    let config = AppConfig::from_env()?;
    serve(config, source).await
}

/// Same as [`run`] with an explicit configuration
pub async fn serve(config: AppConfig, source: Arc<dyn ContentSource>) -> AppResult<()> {
    let database = Arc::new(Database::open(&config.database_url)?);
    database.run_migrations()?;

    // Initialize repositories
    let job_repository: Arc<dyn JobRepository> =
        Arc::new(JobRepositoryImpl::new(database.pool().clone()));
    let catalog: Arc<dyn CatalogStore> = Arc::new(CatalogStoreImpl::new(Arc::clone(&database)));
    let cancellations = Arc::new(CancellationRegistry::new());

    let queue = Arc::new(DownloadQueueService::new(
        Arc::clone(&job_repository),
        Arc::clone(&catalog),
        Arc::clone(&source),
        Arc::clone(&cancellations),
    ));

    // Initialize background worker
    let worker = Arc::new(
        DownloadWorker::new(job_repository, catalog, source, cancellations)
            .with_poll_interval(config.poll_interval)
            .with_renumber_threshold(config.renumber_threshold),
    );
    let worker_handle = tokio::spawn(Arc::clone(&worker).run());
    log_info!("Download worker initialized");

    let app = build_router(Arc::new(AppState::new(queue)));
    let listener = tokio::net::TcpListener::bind(config.bind_address).await?;
    log_info!("Listening on {}", config.bind_address);

    tokio::select! {
        served = axum::serve(listener, app).into_future() => {
            worker.stop();
            served?;
            Ok(())
        }
        finished = worker_handle => {
            finished.map_err(|e| AppError::InternalError(format!("Worker task panicked: {}", e)))?
        }
    }
}
