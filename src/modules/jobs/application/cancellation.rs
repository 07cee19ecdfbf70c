/// In-process cancellation tokens for running jobs
///
/// The durable `cancel_requested` flag in the queue store is the source of
/// truth; a token only wakes the worker early while it awaits the source.
use dashmap::DashMap;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

#[derive(Debug, Default)]
pub struct CancellationRegistry {
    tokens: DashMap<Uuid, CancellationToken>,
}

impl CancellationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token for a job about to execute. Replaces any stale token.
    pub fn register(&self, job_id: Uuid) -> CancellationToken {
        let token = CancellationToken::new();
        self.tokens.insert(job_id, token.clone());
        token
    }

    /// Fire the job's token. Returns false when the job has no token.
    pub fn cancel(&self, job_id: Uuid) -> bool {
        match self.tokens.get(&job_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn release(&self, job_id: Uuid) {
        self.tokens.remove(&job_id);
    }
}
