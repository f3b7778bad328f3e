//! Document-analysis job endpoints: submit, poll, bulk cancel.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use tracing::info;

use crate::analysis::AnalysisRunner;
use crate::jobs::JobKind;
use crate::runtime::Runtime;

use super::error::ApiError;
use super::types::{CancelResponse, JobStatusResponse, SubmitRequest, SubmitResponse};

/// Submit a document-analysis job for a patient's uploaded reports.
pub async fn submit(
    State(runtime): State<Arc<Runtime>>,
    Json(request): Json<SubmitRequest>,
) -> Result<Json<SubmitResponse>, ApiError> {
    let patient = runtime
        .store
        .get_patient(&request.patient_id)?
        .ok_or_else(|| ApiError::NotFound("Patient not found".into()))?;

    let reports = runtime.store.reports_for_patient(&patient.id)?;
    if reports.is_empty() {
        return Err(ApiError::BadRequest(
            "Patient has no uploaded reports to analyze".into(),
        ));
    }

    let report_count = reports.len() as u32;
    let estimated_seconds = report_count as u64 * runtime.settings.seconds_per_report;
    let job = runtime.store.create_job(
        JobKind::DocAnalysis,
        &patient.id,
        report_count,
        Some(estimated_seconds),
    )?;

    info!(job_id = %job.id, patient = %patient.id, reports = report_count, "Document analysis submitted");

    let runner = AnalysisRunner::from_runtime(&runtime);
    let job_id = job.id.clone();
    let patient_id = patient.id.clone();
    runtime.executor.spawn(JobKind::DocAnalysis, &job.id, async move {
        runner.run(&job_id, &patient_id).await
    });

    Ok(Json(SubmitResponse {
        job_id: job.id,
        status: "queued".into(),
        report_count,
        estimated_seconds: Some(estimated_seconds),
    }))
}

/// Poll one job by id.
pub async fn job_status(
    State(runtime): State<Arc<Runtime>>,
    Path(job_id): Path<String>,
) -> Result<Json<JobStatusResponse>, ApiError> {
    let job = runtime
        .store
        .get_job(JobKind::DocAnalysis, &job_id)?
        .ok_or_else(|| ApiError::NotFound(format!("Job {job_id} not found")))?;
    Ok(Json(JobStatusResponse::from_job(&job)))
}

/// Poll the latest job for a patient.
pub async fn patient_status(
    State(runtime): State<Arc<Runtime>>,
    Path(patient_id): Path<String>,
) -> Result<Json<JobStatusResponse>, ApiError> {
    let pk = runtime
        .store
        .get_patient(&patient_id)?
        .map(|p| p.id)
        .unwrap_or(patient_id);
    let job = runtime
        .store
        .latest_job_for_patient(JobKind::DocAnalysis, &pk)?
        .ok_or_else(|| ApiError::NotFound("No analysis job for patient".into()))?;
    Ok(Json(JobStatusResponse::from_job(&job)))
}

/// Bulk-cancel every active job for a patient.
pub async fn cancel(
    State(runtime): State<Arc<Runtime>>,
    Path(patient_id): Path<String>,
) -> Result<Json<CancelResponse>, ApiError> {
    let pk = runtime
        .store
        .get_patient(&patient_id)?
        .map(|p| p.id)
        .unwrap_or(patient_id);
    let cancelled = runtime.store.cancel_for_patient(JobKind::DocAnalysis, &pk)?;
    info!(patient = %pk, cancelled, "Document analysis jobs cancelled");
    Ok(Json(CancelResponse { cancelled }))
}
