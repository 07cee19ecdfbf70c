/// Test helpers to wire services against a temp database
use super::fakes::ScriptedSource;
use super::test_db::TestDb;
use mangaq::modules::catalog::{CatalogStore, CatalogStoreImpl};
use mangaq::modules::jobs::{
    CancellationRegistry, DownloadQueueService, DownloadWorker, JobRecord, JobRepository,
    JobRepositoryImpl, JobStatus,
};
use mangaq::shared::errors::AppResult;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use uuid::Uuid;

pub struct TestServices {
    pub db: TestDb,
    pub job_repository: Arc<JobRepositoryImpl>,
    pub catalog: Arc<CatalogStoreImpl>,
    pub source: Arc<ScriptedSource>,
    pub queue: Arc<DownloadQueueService>,
    pub worker: Arc<DownloadWorker>,
}

/// Build services over a fresh database
pub fn build_test_services(source: ScriptedSource) -> TestServices {
    build_services_on(TestDb::new(), source)
}

/// Build services over an existing database, as a restarted process would
pub fn build_services_on(db: TestDb, source: ScriptedSource) -> TestServices {
    let job_repository = Arc::new(JobRepositoryImpl::new(db.pool()));
    let catalog = Arc::new(CatalogStoreImpl::new(db.database()));
    let source = Arc::new(source);
    let cancellations = Arc::new(CancellationRegistry::new());

    let queue = Arc::new(DownloadQueueService::new(
        job_repository.clone(),
        catalog.clone(),
        source.clone(),
        cancellations.clone(),
    ));
    let worker = Arc::new(
        DownloadWorker::new(
            job_repository.clone(),
            catalog.clone(),
            source.clone(),
            cancellations,
        )
        .with_poll_interval(Duration::from_millis(20)),
    );

    TestServices {
        db,
        job_repository,
        catalog,
        source,
        queue,
        worker,
    }
}

impl TestServices {
    pub fn start_worker(&self) -> JoinHandle<AppResult<()>> {
        tokio::spawn(self.worker.clone().run())
    }

    /// Stop the worker and wait for its loop to exit
    pub async fn stop_worker(&self, handle: JoinHandle<AppResult<()>>) {
        self.worker.stop();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("worker did not stop")
            .expect("worker task panicked")
            .expect("worker returned an error");
    }

    pub async fn job(&self, job_id: Uuid) -> JobRecord {
        self.job_repository
            .get_by_id(job_id)
            .await
            .unwrap()
            .expect("job exists")
    }

    /// Poll until the job reaches `status`
    pub async fn wait_for_status(&self, job_id: Uuid, status: JobStatus) -> JobRecord {
        wait_until(move || async move {
            let job = self.job(job_id).await;
            (job.status == status).then_some(job)
        })
        .await
    }

    /// Poll until the source has served `count` pages
    pub async fn wait_for_pages(&self, count: usize) {
        wait_until(move || async move { (self.source.pages_fetched() >= count).then_some(()) })
            .await
    }

    pub async fn pending_ids(&self) -> Vec<Uuid> {
        self.job_repository
            .list_pending(None)
            .await
            .unwrap()
            .into_iter()
            .map(|job| job.id)
            .collect()
    }

    pub async fn manga_id_by_job(&self, job_id: Uuid) -> Uuid {
        self.job(job_id).await.manga_id.expect("job resolved a manga")
    }

    pub async fn chapter_count(&self, manga_id: Uuid) -> usize {
        self.catalog.get_chapters(manga_id).await.unwrap().len()
    }
}

/// Poll `check` every 10ms until it yields a value; panics after 5 seconds
pub async fn wait_until<T, F, Fut>(mut check: F) -> T
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Option<T>>,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        if let Some(value) = check().await {
            return value;
        }
        if tokio::time::Instant::now() > deadline {
            panic!("condition not reached within 5 seconds");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
