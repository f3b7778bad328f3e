//! Request/response shapes for the job APIs.
//!
//! The status format is stable: camelCase keys, ISO-8601 timestamps with a
//! trailing `Z`, and the result embedded as a JSON object.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::jobs::Job;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequest {
    pub patient_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub job_id: String,
    pub status: String,
    pub report_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_seconds: Option<u64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelResponse {
    pub cancelled: usize,
}

/// Stable job status projection.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusResponse {
    pub job_id: String,
    pub status: String,
    pub generated_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
    pub report_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_seconds: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed_seconds: Option<i64>,
    pub progress_percent: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn iso(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

impl JobStatusResponse {
    pub fn from_job(job: &Job) -> Self {
        Self {
            job_id: job.id.clone(),
            status: job.status.as_str().to_string(),
            generated_at: iso(job.generated_at),
            started_at: job.started_at.map(iso),
            completed_at: job.completed_at.map(iso),
            report_count: job.report_count,
            estimated_seconds: job.estimated_seconds,
            elapsed_seconds: job.elapsed_seconds(Utc::now()),
            progress_percent: job.progress_percent,
            progress_message: job.progress_message.clone(),
            result: job
                .result
                .as_deref()
                .and_then(|r| serde_json::from_str(r).ok()),
            error: job.error.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::{JobKind, JobStatus};

    #[test]
    fn status_projection_uses_camel_case_and_z_timestamps() {
        let job = Job {
            id: "job-1".into(),
            patient_id: "p-1".into(),
            kind: JobKind::DocAnalysis,
            status: JobStatus::Completed,
            progress_percent: 100,
            progress_message: Some("done".into()),
            error: None,
            generated_at: Utc::now(),
            started_at: Some(Utc::now()),
            completed_at: Some(Utc::now()),
            estimated_seconds: Some(300),
            result: Some(r#"{"results": []}"#.into()),
            report_count: 2,
        };

        let json = serde_json::to_value(JobStatusResponse::from_job(&job)).unwrap();
        assert_eq!(json["jobId"], "job-1");
        assert_eq!(json["status"], "completed");
        assert!(json["generatedAt"].as_str().unwrap().ends_with('Z'));
        assert_eq!(json["reportCount"], 2);
        assert_eq!(json["estimatedSeconds"], 300);
        assert!(json["result"]["results"].is_array(), "result embedded as object");
        assert!(json.get("error").is_none());
    }

    #[test]
    fn unparseable_result_is_omitted() {
        let job = Job {
            id: "job-2".into(),
            patient_id: "p".into(),
            kind: JobKind::TumorBoard,
            status: JobStatus::Queued,
            progress_percent: 0,
            progress_message: None,
            error: None,
            generated_at: Utc::now(),
            started_at: None,
            completed_at: None,
            estimated_seconds: None,
            result: Some("not json".into()),
            report_count: 0,
        };
        let json = serde_json::to_value(JobStatusResponse::from_job(&job)).unwrap();
        assert!(json.get("result").is_none());
        assert!(json.get("startedAt").is_none());
        assert!(json.get("elapsedSeconds").is_none());
    }
}
