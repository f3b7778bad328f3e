//! Job records and the job state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The two long-running job families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    DocAnalysis,
    TumorBoard,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DocAnalysis => "doc_analysis",
            Self::TumorBoard => "tumor_board",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "doc_analysis" => Some(Self::DocAnalysis),
            "tumor_board" => Some(Self::TumorBoard),
            _ => None,
        }
    }
}

/// Lifecycle states.
///
/// Jobs are created by request handlers and exclusively mutated by the
/// background executor that owns them; `cancel` is the one transition any
/// handler may request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Draft,
    Queued,
    Processing,
    Completed,
    Failed,
    Cancelled,
    Deleted,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Queued => "queued",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::Deleted => "deleted",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(Self::Draft),
            "queued" => Some(Self::Queued),
            "processing" => Some(Self::Processing),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "cancelled" => Some(Self::Cancelled),
            "deleted" => Some(Self::Deleted),
            _ => None,
        }
    }

    /// Terminal states admit no further transition (soft delete aside).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Deleted)
    }

    /// Whether a job in this state may still be cancelled.
    pub fn is_cancellable(&self) -> bool {
        matches!(self, Self::Queued | Self::Processing)
    }

    /// Admissible state-machine transitions.
    pub fn can_transition(from: JobStatus, to: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (from, to),
            (Draft, Queued)
                | (Queued, Processing)
                | (Queued, Cancelled)
                | (Processing, Completed)
                | (Processing, Failed)
                | (Processing, Cancelled)
                | (Failed, Queued)
                | (Draft, Deleted)
                | (Completed, Deleted)
                | (Failed, Deleted)
                | (Cancelled, Deleted)
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A persisted job record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub patient_id: String,
    pub kind: JobKind,
    pub status: JobStatus,
    pub progress_percent: u8,
    pub progress_message: Option<String>,
    pub error: Option<String>,
    pub generated_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub estimated_seconds: Option<u64>,
    /// Opaque JSON payload; typed values stop at the store boundary.
    pub result: Option<String>,
    pub report_count: u32,
}

impl Job {
    /// Seconds spent processing so far, when started.
    pub fn elapsed_seconds(&self, now: DateTime<Utc>) -> Option<i64> {
        self.started_at.map(|started| {
            let end = self.completed_at.unwrap_or(now);
            (end - started).num_seconds().max(0)
        })
    }
}
