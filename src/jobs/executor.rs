//! Background job execution.
//!
//! Each job runs as a single spawned task that exclusively owns its record.
//! The task reports progress through the store and polls for cancellation
//! between phases; the top of the task is the only place uncaught errors
//! become a `failed` status.

use std::future::Future;
use std::sync::Arc;

use tracing::{error, info};

use super::store::JobStore;
use super::types::{JobKind, JobStatus};
use super::JobError;

/// Cooperative cancellation handle for one job.
///
/// Handlers cancel by flipping the job's status; running tasks observe it
/// here between phases. In-flight LLM/OCR calls run to completion and
/// their results are discarded.
#[derive(Clone)]
pub struct CancelCheck {
    store: Arc<JobStore>,
    kind: JobKind,
    job_id: String,
}

impl CancelCheck {
    pub fn new(store: Arc<JobStore>, kind: JobKind, job_id: &str) -> Self {
        Self {
            store,
            kind,
            job_id: job_id.to_string(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.store.is_cancelled(self.kind, &self.job_id)
    }
}

/// Spawns one task per job and translates its outcome into job state.
pub struct JobExecutor {
    store: Arc<JobStore>,
}

impl JobExecutor {
    pub fn new(store: Arc<JobStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> Arc<JobStore> {
        self.store.clone()
    }

    /// Run a job body in the background.
    ///
    /// The body owns all progress and completion writes. Here only the
    /// failure edges are handled: an `Err` return or a panic becomes
    /// `failed` with the message preserved — unless the job was already
    /// driven to a terminal state.
    pub fn spawn<F>(&self, kind: JobKind, job_id: &str, body: F) -> tokio::task::JoinHandle<()>
    where
        F: Future<Output = Result<(), JobError>> + Send + 'static,
    {
        let store = self.store.clone();
        let job_id = job_id.to_string();

        tokio::spawn(async move {
            let outcome = tokio::spawn(body).await;
            match outcome {
                Ok(Ok(())) => {
                    info!(job_id = %job_id, kind = kind.as_str(), "Job task finished");
                }
                Ok(Err(e)) => {
                    error!(job_id = %job_id, kind = kind.as_str(), error = %e, "Job task failed");
                    mark_failed(&store, kind, &job_id, &e.to_string());
                }
                Err(join_error) => {
                    error!(job_id = %job_id, kind = kind.as_str(), error = %join_error, "Job task panicked");
                    mark_failed(&store, kind, &job_id, "internal error: job task panicked");
                }
            }
        })
    }
}

/// Fail a job unless it already reached a terminal state (a cancelled job
/// stays cancelled even when its task errors on the way out).
fn mark_failed(store: &JobStore, kind: JobKind, job_id: &str, message: &str) {
    match store.get_job(kind, job_id) {
        Ok(Some(job)) if !job.status.is_terminal() && job.status != JobStatus::Failed => {
            if let Err(e) = store.fail(kind, job_id, message) {
                error!(job_id = %job_id, error = %e, "Could not mark job failed");
            }
        }
        Ok(_) => {}
        Err(e) => error!(job_id = %job_id, error = %e, "Could not load job for failure marking"),
    }
}
