//! Persisted job records: the state machine, the SQLite-backed store, and
//! the background executor that owns running jobs.

pub mod executor;
pub mod store;
pub mod types;

pub use executor::{CancelCheck, JobExecutor};
pub use store::{JobStore, PatientRecord, ReportRecord};
pub use types::{Job, JobKind, JobStatus};

/// Errors from the job store and executor.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("job {0} not found")]
    NotFound(String),

    #[error("invalid transition {from} -> {to}")]
    InvalidTransition {
        from: types::JobStatus,
        to: types::JobStatus,
    },

    #[error("store lock poisoned")]
    LockPoisoned,

    #[error("{0}")]
    Failed(String),
}
