//! Tumor-board job endpoints: submit, poll, retry, cancel, soft delete,
//! and the timeline compiler.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde_json::json;
use tracing::info;

use crate::board::timeline::TimelineCompiler;
use crate::board::TumorBoardRunner;
use crate::jobs::{JobKind, JobStatus};
use crate::runtime::Runtime;

use super::error::ApiError;
use super::types::{CancelResponse, JobStatusResponse, SubmitRequest, SubmitResponse};

fn spawn_board_job(runtime: &Arc<Runtime>, job_id: &str, patient_id: &str) {
    let runner = TumorBoardRunner::from_runtime(runtime);
    let job_id_owned = job_id.to_string();
    let patient_owned = patient_id.to_string();
    runtime.executor.spawn(JobKind::TumorBoard, job_id, async move {
        runner.run(&job_id_owned, &patient_owned).await
    });
}

/// Submit a tumor-board run for a patient.
pub async fn submit(
    State(runtime): State<Arc<Runtime>>,
    Json(request): Json<SubmitRequest>,
) -> Result<Json<SubmitResponse>, ApiError> {
    let patient = runtime
        .store
        .get_patient(&request.patient_id)?
        .ok_or_else(|| ApiError::NotFound("Patient not found".into()))?;

    // The board feeds on the latest completed document analysis
    let analysis = runtime
        .store
        .latest_completed_for_patient(JobKind::DocAnalysis, &patient.id)?;
    if analysis.is_none() {
        return Err(ApiError::BadRequest(
            "No completed AI analysis for patient; run document analysis first".into(),
        ));
    }

    let job = runtime
        .store
        .create_job(JobKind::TumorBoard, &patient.id, 0, None)?;
    info!(job_id = %job.id, patient = %patient.id, "Tumor board submitted");
    spawn_board_job(&runtime, &job.id, &patient.id);

    Ok(Json(SubmitResponse {
        job_id: job.id,
        status: "queued".into(),
        report_count: 0,
        estimated_seconds: None,
    }))
}

pub async fn job_status(
    State(runtime): State<Arc<Runtime>>,
    Path(job_id): Path<String>,
) -> Result<Json<JobStatusResponse>, ApiError> {
    let job = runtime
        .store
        .get_job(JobKind::TumorBoard, &job_id)?
        .ok_or_else(|| ApiError::NotFound(format!("Case {job_id} not found")))?;
    Ok(Json(JobStatusResponse::from_job(&job)))
}

/// Retry a failed case. Only `failed` cases are retryable.
pub async fn retry(
    State(runtime): State<Arc<Runtime>>,
    Path(job_id): Path<String>,
) -> Result<Json<JobStatusResponse>, ApiError> {
    let job = runtime
        .store
        .get_job(JobKind::TumorBoard, &job_id)?
        .ok_or_else(|| ApiError::NotFound(format!("Case {job_id} not found")))?;
    if job.status != JobStatus::Failed {
        return Err(ApiError::Conflict(format!(
            "Only failed cases can be retried (current status: {})",
            job.status
        )));
    }

    let requeued = runtime
        .store
        .transition(JobKind::TumorBoard, &job_id, JobStatus::Queued)?;
    spawn_board_job(&runtime, &requeued.id, &requeued.patient_id);
    Ok(Json(JobStatusResponse::from_job(&requeued)))
}

/// Bulk-cancel active cases for a patient.
pub async fn cancel(
    State(runtime): State<Arc<Runtime>>,
    Path(patient_id): Path<String>,
) -> Result<Json<CancelResponse>, ApiError> {
    let pk = runtime
        .store
        .get_patient(&patient_id)?
        .map(|p| p.id)
        .unwrap_or(patient_id);
    let cancelled = runtime.store.cancel_for_patient(JobKind::TumorBoard, &pk)?;
    info!(patient = %pk, cancelled, "Tumor board cases cancelled");
    Ok(Json(CancelResponse { cancelled }))
}

/// Soft-delete a case. Active cases must be cancelled first.
pub async fn soft_delete(
    State(runtime): State<Arc<Runtime>>,
    Path(job_id): Path<String>,
) -> Result<Json<JobStatusResponse>, ApiError> {
    let deleted = runtime
        .store
        .transition(JobKind::TumorBoard, &job_id, JobStatus::Deleted)?;
    Ok(Json(JobStatusResponse::from_job(&deleted)))
}

/// Compile the latest completed analysis into a medical timeline view.
pub async fn compile_timeline(
    State(runtime): State<Arc<Runtime>>,
    Json(request): Json<SubmitRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let patient = runtime
        .store
        .get_patient(&request.patient_id)?
        .ok_or_else(|| ApiError::NotFound("Patient not found".into()))?;
    let analysis = runtime
        .store
        .latest_completed_for_patient(JobKind::DocAnalysis, &patient.id)?
        .and_then(|job| job.result)
        .ok_or_else(|| ApiError::BadRequest("No completed AI analysis for patient".into()))?;

    let compiler = TimelineCompiler::new(
        runtime.gateway.clone(),
        &runtime.settings.models.tumor_board,
    );
    let result = compiler
        .compile(&analysis)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok(Json(json!({
        "patientId": patient.id,
        "timeline": result.timeline,
        "warnings": result.warnings,
    })))
}
