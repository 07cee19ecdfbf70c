/// Job repository tests - database operations
///
/// Tests cover:
/// - Head/tail insertion and reordering
/// - Atomic dequeue with a single execution slot
/// - Cancellation and terminal transitions
/// - Crash recovery and cleanup
mod utils;

use mangaq::modules::catalog::{CatalogStore, CatalogStoreImpl, Direction};
use mangaq::modules::jobs::{
    CancelOutcome, JobOutcome, JobProgress, JobRepository, JobRepositoryImpl, JobStatus, NewJob,
    UpdateEnqueue,
};
use std::sync::Arc;
use utils::test_db::TestDb;
use uuid::Uuid;

fn add(name: &str) -> NewJob {
    NewJob::add_title(format!("http://x/{}", name), None)
}

/// Update job for a title that exists in the catalog
async fn update(db: &TestDb, name: &str) -> NewJob {
    let catalog = CatalogStoreImpl::new(db.database());
    let url = format!("http://x/{}", name);
    let manga = catalog
        .get_or_create_manga(name, Direction::Horizontal, &url)
        .await
        .unwrap();
    NewJob::update_title(manga.id, name, url)
}

fn repo(db: &TestDb) -> JobRepositoryImpl {
    JobRepositoryImpl::new(db.pool())
}

async fn pending_urls(repo: &JobRepositoryImpl) -> Vec<String> {
    repo.list_pending(None)
        .await
        .unwrap()
        .into_iter()
        .map(|job| job.url)
        .collect()
}

// ================================================================================================
// ORDERING
// ================================================================================================

#[tokio::test]
async fn add_jobs_overtake_pending_updates() {
    let db = TestDb::new();
    let repo = repo(&db);

    repo.insert_at_tail(update(&db, "manga-b").await).await.unwrap();
    repo.insert_at_head(add("manga-a")).await.unwrap();
    repo.insert_at_head(add("manga-c")).await.unwrap();
    repo.insert_at_tail(update(&db, "manga-d").await).await.unwrap();

    assert_eq!(
        pending_urls(&repo).await,
        vec![
            "http://x/manga-c",
            "http://x/manga-a",
            "http://x/manga-b",
            "http://x/manga-d"
        ]
    );
}

#[tokio::test]
async fn first_job_gets_key_zero() {
    let db = TestDb::new();
    let repo = repo(&db);

    let first = repo.insert_at_tail(update(&db, "manga-b").await).await.unwrap();
    assert_eq!(first.order_key, 0.0);
    assert_eq!(first.status, JobStatus::Pending);
    assert!(first.started_at.is_none());

    let head = repo.insert_at_head(add("manga-a")).await.unwrap();
    assert_eq!(head.order_key, -1.0);
}

#[tokio::test]
async fn move_to_head_and_tail() {
    let db = TestDb::new();
    let repo = repo(&db);

    let a = repo.insert_at_tail(add("manga-a")).await.unwrap();
    repo.insert_at_tail(add("manga-b")).await.unwrap();
    let c = repo.insert_at_tail(add("manga-c")).await.unwrap();

    assert!(repo.move_to_head(c.id).await.unwrap());
    assert_eq!(
        pending_urls(&repo).await,
        vec!["http://x/manga-c", "http://x/manga-a", "http://x/manga-b"]
    );

    assert!(repo.move_to_tail(c.id).await.unwrap());
    assert!(repo.move_to_tail(a.id).await.unwrap());
    assert_eq!(
        pending_urls(&repo).await,
        vec!["http://x/manga-b", "http://x/manga-c", "http://x/manga-a"]
    );
}

#[tokio::test]
async fn move_to_head_of_head_job_is_idempotent() {
    let db = TestDb::new();
    let repo = repo(&db);

    let a = repo.insert_at_tail(add("manga-a")).await.unwrap();
    repo.insert_at_tail(add("manga-b")).await.unwrap();

    assert!(repo.move_to_head(a.id).await.unwrap());
    assert!(repo.move_to_head(a.id).await.unwrap());

    let after = repo.get_by_id(a.id).await.unwrap().unwrap();
    assert_eq!(after.order_key, a.order_key);
    assert_eq!(
        pending_urls(&repo).await,
        vec!["http://x/manga-a", "http://x/manga-b"]
    );
}

#[tokio::test]
async fn moving_non_pending_jobs_is_a_noop() {
    let db = TestDb::new();
    let repo = repo(&db);

    let running = repo.insert_at_tail(add("manga-a")).await.unwrap();
    let canceled = repo.insert_at_tail(add("manga-b")).await.unwrap();
    repo.dequeue().await.unwrap();
    repo.request_cancel(canceled.id).await.unwrap();

    assert!(!repo.move_to_head(running.id).await.unwrap());
    assert!(!repo.move_to_tail(canceled.id).await.unwrap());
    assert!(!repo.move_to_head(Uuid::new_v4()).await.unwrap());
}

#[tokio::test]
async fn concurrent_head_inserts_keep_distinct_keys() {
    let db = TestDb::new();
    let repo = Arc::new(repo(&db));

    let inserts = (0..8).map(|i| {
        let repo = Arc::clone(&repo);
        tokio::spawn(async move { repo.insert_at_head(add(&format!("manga-{}", i))).await })
    });
    for joined in futures::future::join_all(inserts).await {
        joined.unwrap().unwrap();
    }

    let pending = repo.list_pending(None).await.unwrap();
    assert_eq!(pending.len(), 8);
    let mut keys: Vec<f64> = pending.iter().map(|job| job.order_key).collect();
    keys.dedup();
    assert_eq!(keys.len(), 8);
}

#[tokio::test]
async fn list_pending_respects_limit() {
    let db = TestDb::new();
    let repo = repo(&db);

    for name in ["manga-a", "manga-b", "manga-c"] {
        repo.insert_at_tail(add(name)).await.unwrap();
    }

    let first_two = repo.list_pending(Some(2)).await.unwrap();
    assert_eq!(first_two.len(), 2);
    assert_eq!(first_two[0].url, "http://x/manga-a");
}

// ================================================================================================
// DEQUEUE
// ================================================================================================

#[tokio::test]
async fn dequeue_takes_head_and_stamps_start() {
    let db = TestDb::new();
    let repo = repo(&db);

    repo.insert_at_tail(update(&db, "manga-b").await).await.unwrap();
    let a = repo.insert_at_head(add("manga-a")).await.unwrap();

    let started = repo.dequeue().await.unwrap().unwrap();
    assert_eq!(started.id, a.id);
    assert_eq!(started.status, JobStatus::Running);
    assert!(started.started_at.is_some());
    assert!(started.completed_at.is_none());
}

#[tokio::test]
async fn dequeue_refuses_while_a_job_is_running() {
    let db = TestDb::new();
    let repo = repo(&db);

    repo.insert_at_tail(add("manga-a")).await.unwrap();
    repo.insert_at_tail(add("manga-b")).await.unwrap();

    let first = repo.dequeue().await.unwrap().unwrap();
    assert!(repo.dequeue().await.unwrap().is_none());

    repo.finish(first.id, JobOutcome::Completed).await.unwrap();
    let second = repo.dequeue().await.unwrap().unwrap();
    assert_eq!(second.url, "http://x/manga-b");
}

#[tokio::test]
async fn dequeue_on_empty_queue() {
    let db = TestDb::new();
    assert!(repo(&db).dequeue().await.unwrap().is_none());
}

// ================================================================================================
// CANCELLATION AND TERMINAL STATES
// ================================================================================================

#[tokio::test]
async fn cancel_pending_job_never_runs_it() {
    let db = TestDb::new();
    let repo = repo(&db);

    let job = repo.insert_at_tail(add("manga-a")).await.unwrap();
    assert_eq!(
        repo.request_cancel(job.id).await.unwrap(),
        CancelOutcome::Canceled
    );

    let canceled = repo.get_by_id(job.id).await.unwrap().unwrap();
    assert_eq!(canceled.status, JobStatus::Canceled);
    assert!(canceled.started_at.is_none());
    assert!(canceled.completed_at.is_some());
    assert!(repo.dequeue().await.unwrap().is_none());

    // Idempotent
    assert_eq!(repo.request_cancel(job.id).await.unwrap(), CancelOutcome::NoOp);
    assert_eq!(
        repo.request_cancel(Uuid::new_v4()).await.unwrap(),
        CancelOutcome::NoOp
    );
}

#[tokio::test]
async fn cancel_request_wins_over_completion() {
    let db = TestDb::new();
    let repo = repo(&db);

    let job = repo.insert_at_tail(add("manga-a")).await.unwrap();
    repo.dequeue().await.unwrap();

    assert_eq!(
        repo.request_cancel(job.id).await.unwrap(),
        CancelOutcome::Requested
    );
    assert_eq!(
        repo.request_cancel(job.id).await.unwrap(),
        CancelOutcome::Requested
    );
    assert!(repo.is_cancel_requested(job.id).await.unwrap());

    let finished = repo.finish(job.id, JobOutcome::Completed).await.unwrap();
    assert_eq!(finished.status, JobStatus::Canceled);
}

#[tokio::test]
async fn progress_is_refused_after_cancel_request() {
    let db = TestDb::new();
    let repo = repo(&db);

    let job = repo.insert_at_tail(add("manga-a")).await.unwrap();
    repo.dequeue().await.unwrap();

    let first = JobProgress::chapter("Ch. 1", 0, 2).with_page(0, 4);
    assert!(repo.update_progress(job.id, &first).await.unwrap());

    repo.request_cancel(job.id).await.unwrap();
    let later = JobProgress::chapter("Ch. 1", 0, 2).with_page(1, 4);
    assert!(!repo.update_progress(job.id, &later).await.unwrap());

    let stored = repo.get_by_id(job.id).await.unwrap().unwrap();
    assert_eq!(stored.progress, Some(first));
}

#[tokio::test]
async fn progress_never_moves_backwards() {
    let db = TestDb::new();
    let repo = repo(&db);

    let job = repo.insert_at_tail(add("manga-a")).await.unwrap();
    let pending_progress = JobProgress::chapter("Ch. 1", 0, 2);
    assert!(!repo.update_progress(job.id, &pending_progress).await.unwrap());

    repo.dequeue().await.unwrap();
    let ahead = JobProgress::chapter("Ch. 2", 1, 2).with_page(3, 5);
    assert!(repo.update_progress(job.id, &ahead).await.unwrap());
    assert!(!repo
        .update_progress(job.id, &JobProgress::chapter("Ch. 1", 0, 2).with_page(4, 5))
        .await
        .unwrap());
}

#[tokio::test]
async fn failed_job_keeps_error_and_progress() {
    let db = TestDb::new();
    let repo = repo(&db);

    let job = repo.insert_at_tail(add("manga-a")).await.unwrap();
    repo.dequeue().await.unwrap();
    let progress = JobProgress::chapter("Ch. 2", 1, 5).with_page(2, 10);
    repo.update_progress(job.id, &progress).await.unwrap();

    let failed = repo
        .finish(job.id, JobOutcome::Failed("HTTP 503".to_string()))
        .await
        .unwrap();
    assert_eq!(failed.status, JobStatus::Failed);
    assert_eq!(failed.error.as_deref(), Some("HTTP 503"));
    assert_eq!(failed.progress, Some(progress));

    // Terminal states accept no further transition
    assert!(repo.finish(job.id, JobOutcome::Completed).await.is_err());
    let unchanged = repo.get_by_id(job.id).await.unwrap().unwrap();
    assert_eq!(unchanged.status, JobStatus::Failed);
    assert_eq!(unchanged.completed_at, failed.completed_at);
}

// ================================================================================================
// RECOVERY AND CLEANUP
// ================================================================================================

#[tokio::test]
async fn recovery_resets_only_the_orphaned_job() {
    let db = TestDb::new();
    let repo = repo(&db);

    let orphan = repo.insert_at_tail(add("manga-a")).await.unwrap();
    let waiting = repo.insert_at_tail(update(&db, "manga-b").await).await.unwrap();
    let done = repo.insert_at_head(add("manga-c")).await.unwrap();

    // manga-c runs to completion, then manga-a is left running by a crash
    repo.dequeue().await.unwrap();
    repo.finish(done.id, JobOutcome::Completed).await.unwrap();
    repo.dequeue().await.unwrap();
    repo.update_progress(orphan.id, &JobProgress::chapter("Ch. 1", 0, 3))
        .await
        .unwrap();

    let recovered = repo.recover_running().await.unwrap();
    assert_eq!(recovered, vec![orphan.id]);

    let reset = repo.get_by_id(orphan.id).await.unwrap().unwrap();
    assert_eq!(reset.status, JobStatus::Pending);
    assert!(reset.progress.is_none());
    assert_eq!(
        repo.list_pending(None).await.unwrap()[0].id,
        orphan.id,
        "recovered job goes back to the head"
    );

    assert_eq!(
        repo.get_by_id(waiting.id).await.unwrap().unwrap().status,
        JobStatus::Pending
    );
    assert_eq!(
        repo.get_by_id(done.id).await.unwrap().unwrap().status,
        JobStatus::Completed
    );
}

#[tokio::test]
async fn recovery_honors_an_earlier_cancel_request() {
    let db = TestDb::new();
    let repo = repo(&db);

    let job = repo.insert_at_tail(add("manga-a")).await.unwrap();
    repo.dequeue().await.unwrap();
    repo.request_cancel(job.id).await.unwrap();

    assert!(repo.recover_running().await.unwrap().is_empty());
    let canceled = repo.get_by_id(job.id).await.unwrap().unwrap();
    assert_eq!(canceled.status, JobStatus::Canceled);
}

#[tokio::test]
async fn job_is_recovered_only_once() {
    let db = TestDb::new();
    let repo = repo(&db);

    let job = repo.insert_at_tail(add("manga-a")).await.unwrap();

    // First crash: back to the queue
    repo.dequeue().await.unwrap();
    assert_eq!(repo.recover_running().await.unwrap(), vec![job.id]);
    assert_eq!(
        repo.get_by_id(job.id).await.unwrap().unwrap().status,
        JobStatus::Pending
    );

    // Second crash on the same job: given up
    repo.dequeue().await.unwrap();
    repo.update_progress(job.id, &JobProgress::chapter("Ch. 1", 0, 2))
        .await
        .unwrap();
    assert!(repo.recover_running().await.unwrap().is_empty());

    let failed = repo.get_by_id(job.id).await.unwrap().unwrap();
    assert_eq!(failed.status, JobStatus::Failed);
    assert!(failed.error.is_some());
    assert!(failed.completed_at.is_some());
    assert_eq!(failed.progress, Some(JobProgress::chapter("Ch. 1", 0, 2)));

    // Further restarts leave it alone
    assert!(repo.recover_running().await.unwrap().is_empty());
    assert!(repo.dequeue().await.unwrap().is_none());
}

#[tokio::test]
async fn remove_terminal_only_removes_finished_jobs() {
    let db = TestDb::new();
    let repo = repo(&db);

    let completed = repo.insert_at_tail(add("manga-a")).await.unwrap();
    let failed = repo.insert_at_tail(add("manga-b")).await.unwrap();
    let canceled = repo.insert_at_tail(add("manga-c")).await.unwrap();
    let running = repo.insert_at_tail(add("manga-d")).await.unwrap();
    let pending = repo.insert_at_tail(add("manga-e")).await.unwrap();

    repo.dequeue().await.unwrap();
    repo.finish(completed.id, JobOutcome::Completed).await.unwrap();
    repo.dequeue().await.unwrap();
    repo.finish(failed.id, JobOutcome::Failed("boom".to_string()))
        .await
        .unwrap();
    repo.request_cancel(canceled.id).await.unwrap();
    repo.dequeue().await.unwrap();

    assert_eq!(repo.remove_terminal().await.unwrap(), 3);
    assert_eq!(repo.remove_terminal().await.unwrap(), 0);

    let remaining: Vec<Uuid> = repo
        .list_all()
        .await
        .unwrap()
        .into_iter()
        .map(|job| job.id)
        .collect();
    assert_eq!(remaining, vec![running.id, pending.id]);
}

#[tokio::test]
async fn list_all_orders_running_pending_then_finished() {
    let db = TestDb::new();
    let repo = repo(&db);

    let first = repo.insert_at_tail(add("manga-a")).await.unwrap();
    let second = repo.insert_at_tail(add("manga-b")).await.unwrap();
    let running = repo.insert_at_tail(add("manga-c")).await.unwrap();
    let pending = repo.insert_at_tail(add("manga-d")).await.unwrap();

    repo.dequeue().await.unwrap();
    repo.finish(first.id, JobOutcome::Completed).await.unwrap();
    repo.dequeue().await.unwrap();
    repo.finish(second.id, JobOutcome::Completed).await.unwrap();
    repo.dequeue().await.unwrap();

    let ids: Vec<Uuid> = repo
        .list_all()
        .await
        .unwrap()
        .into_iter()
        .map(|job| job.id)
        .collect();
    assert_eq!(ids, vec![running.id, pending.id, second.id, first.id]);
}

#[tokio::test]
async fn renumber_keeps_pending_order() {
    let db = TestDb::new();
    let repo = repo(&db);

    for name in ["manga-a", "manga-b", "manga-c"] {
        repo.insert_at_head(add(name)).await.unwrap();
    }
    let before = pending_urls(&repo).await;

    assert_eq!(repo.renumber_pending().await.unwrap(), 3);
    assert_eq!(pending_urls(&repo).await, before);
    assert_eq!(repo.order_key_bounds().await.unwrap(), Some((0.0, 2.0)));
}

#[tokio::test]
async fn pending_update_is_not_queued_twice() {
    let db = TestDb::new();
    let repo = repo(&db);

    let job = match repo
        .insert_update_at_tail(update(&db, "manga-b").await)
        .await
        .unwrap()
    {
        UpdateEnqueue::Queued(job) => job,
        other => panic!("expected a new job, got {:?}", other),
    };
    let again = repo
        .insert_update_at_tail(update(&db, "manga-b").await)
        .await
        .unwrap();
    assert_eq!(again, UpdateEnqueue::AlreadyPending(job.clone()));

    // Other titles are queued independently
    let other = repo
        .insert_update_at_tail(update(&db, "manga-c").await)
        .await
        .unwrap();
    assert!(matches!(other, UpdateEnqueue::Queued(_)));
    assert_eq!(repo.list_pending(None).await.unwrap().len(), 2);

    // Once the waiting update is gone a new one is accepted
    repo.request_cancel(job.id).await.unwrap();
    let fresh = repo
        .insert_update_at_tail(update(&db, "manga-b").await)
        .await
        .unwrap();
    assert!(matches!(fresh, UpdateEnqueue::Queued(ref j) if j.id != job.id));
}

#[tokio::test]
async fn add_jobs_are_not_deduplicated_as_updates() {
    let db = TestDb::new();
    let repo = repo(&db);

    let result = repo.insert_update_at_tail(add("manga-a")).await;
    assert!(result.is_err());
    assert!(repo.list_pending(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn statistics_count_by_status() {
    let db = TestDb::new();
    let repo = repo(&db);

    let a = repo.insert_at_tail(add("manga-a")).await.unwrap();
    repo.insert_at_tail(add("manga-b")).await.unwrap();
    let c = repo.insert_at_tail(add("manga-c")).await.unwrap();
    repo.dequeue().await.unwrap();
    repo.finish(a.id, JobOutcome::Completed).await.unwrap();
    repo.request_cancel(c.id).await.unwrap();

    let stats = repo.get_statistics().await.unwrap();
    assert_eq!(stats.pending_count, 1);
    assert_eq!(stats.completed_count, 1);
    assert_eq!(stats.canceled_count, 1);
    assert_eq!(stats.running_count, 0);
    assert_eq!(stats.total_count, 3);
}
