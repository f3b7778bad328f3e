//! External orchestration overlay.
//!
//! Feature-flag gated, additive, and strictly non-reasoning: it emits
//! per-agent start/complete events to an external logging endpoint and
//! aggregates per-agent outcomes into an orchestration record attached to
//! the view's metadata. Every failure path falls back to local-only
//! execution; the overlay can never fail a board run.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

/// Outcome of one orchestrated agent invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRunStatus {
    Success,
    Failed,
    Timeout,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRunRecord {
    pub agent: String,
    pub status: AgentRunStatus,
    pub execution_time_seconds: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrchestrationStatus {
    Completed,
    Partial,
    Failed,
}

/// Aggregate orchestration outcome attached to the cleaned view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestrationResult {
    pub status: OrchestrationStatus,
    pub agents_completed: Vec<String>,
    pub agents_failed: Vec<String>,
    pub metadata: serde_json::Value,
}

/// Best-effort event emitter for the external orchestration service.
pub struct OrchestrationAdapter {
    enabled: bool,
    endpoint: Option<String>,
    key: Option<String>,
    http: reqwest::Client,
}

impl OrchestrationAdapter {
    pub fn new(enabled: bool, endpoint: Option<String>, key: Option<String>) -> Self {
        Self {
            enabled,
            endpoint,
            key,
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(5))
                .build()
                .unwrap_or_default(),
        }
    }

    pub fn disabled() -> Self {
        Self::new(false, None, None)
    }

    /// Enabled requires the flag AND usable credentials.
    pub fn is_enabled(&self) -> bool {
        self.enabled
            && self.endpoint.as_deref().is_some_and(|e| e.len() > 10)
            && self.key.as_deref().is_some_and(|k| !k.is_empty())
    }

    /// Emit an agent lifecycle event. Fire-and-forget: the post runs on its
    /// own task and failures are swallowed.
    pub fn emit_event(&self, event_type: &str, agent_name: &str, job_id: &str) {
        if !self.is_enabled() {
            return;
        }
        let (Some(endpoint), Some(key)) = (self.endpoint.clone(), self.key.clone()) else {
            return;
        };
        let body = json!({
            "event": event_type,
            "agent": agent_name,
            "job_id": job_id,
        });
        let http = self.http.clone();
        tokio::spawn(async move {
            let url = format!("{}/events", endpoint.trim_end_matches('/'));
            if let Err(e) = http.post(&url).bearer_auth(key).json(&body).send().await {
                debug!(error = %e, "Orchestration event emission failed");
            }
        });
    }

    /// Aggregate per-agent records into the orchestration result.
    pub fn aggregate(&self, records: &[AgentRunRecord]) -> OrchestrationResult {
        let completed: Vec<String> = records
            .iter()
            .filter(|r| r.status == AgentRunStatus::Success)
            .map(|r| r.agent.clone())
            .collect();
        let failed: Vec<String> = records
            .iter()
            .filter(|r| r.status != AgentRunStatus::Success)
            .map(|r| r.agent.clone())
            .collect();

        let status = if failed.is_empty() {
            OrchestrationStatus::Completed
        } else if completed.is_empty() {
            OrchestrationStatus::Failed
        } else {
            OrchestrationStatus::Partial
        };

        OrchestrationResult {
            status,
            agents_completed: completed,
            agents_failed: failed,
            metadata: json!({
                "agents": records,
                "overlay_enabled": self.is_enabled(),
            }),
        }
    }
}
