//! Document-analysis job body.
//!
//! Reports fan out without an outer semaphore (they are coarse-grained);
//! pages fan out under the shared LLM semaphore inside the gateway, so the
//! number of in-flight LLM calls stays bounded regardless of how many
//! patients, documents, or pages are being processed.
//!
//! Per-report problems (unsupported extension, unreadable file, empty OCR
//! text, OCR failure) become per-report statuses and the job continues.
//! Gateway upstream/auth errors are systemic and fail the whole job with a
//! normalized message.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::extraction::{
    merge_pages, needs_validation, DocumentAnalysis, PageAnalysis, PageExtractor, PageValidator,
};
use crate::jobs::{CancelCheck, JobError, JobKind, JobStatus, JobStore, ReportRecord};
use crate::llm::map_upstream_error;
use crate::ocr::{DocumentOcrService, PageOcr, SourceKind};
use crate::runtime::Runtime;

const PAGE_TIMEOUT: Duration = Duration::from_secs(60);
const REPORT_TIMEOUT: Duration = Duration::from_secs(300);

/// Outcome class for one report within a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Success,
    Warning,
    Skipped,
    Error,
}

/// Per-report result stored in the job payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportResult {
    pub file_name: String,
    pub status: ReportStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<DocumentAnalysis>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pages: Vec<PageAnalysis>,
    #[serde(default)]
    pub page_count: usize,
}

impl ReportResult {
    fn skipped(file_name: &str, reason: &str) -> Self {
        Self {
            file_name: file_name.to_string(),
            status: ReportStatus::Skipped,
            error: Some(reason.to_string()),
            analysis: None,
            pages: Vec::new(),
            page_count: 0,
        }
    }

    fn error(file_name: &str, message: &str) -> Self {
        Self {
            file_name: file_name.to_string(),
            status: ReportStatus::Error,
            error: Some(message.to_string()),
            analysis: None,
            pages: Vec::new(),
            page_count: 0,
        }
    }

    fn warning(file_name: &str, message: &str, page_count: usize) -> Self {
        Self {
            file_name: file_name.to_string(),
            status: ReportStatus::Warning,
            error: Some(message.to_string()),
            analysis: None,
            pages: Vec::new(),
            page_count,
        }
    }
}

/// Job result payload, serialized as the opaque JSON blob on the record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResultPayload {
    pub processing_time_seconds: f64,
    pub results: Vec<ReportResult>,
    pub patient_name: String,
    pub report_count: usize,
    pub completed_at: String,
}

/// Document kind from the file extension; `None` is unsupported.
fn kind_for_file(file_name: &str) -> Option<SourceKind> {
    let lower = file_name.to_lowercase();
    if lower.ends_with(".pdf") {
        Some(SourceKind::Pdf)
    } else if lower.ends_with(".png") || lower.ends_with(".jpg") || lower.ends_with(".jpeg") {
        Some(SourceKind::Image)
    } else {
        None
    }
}

pub struct AnalysisRunner {
    store: Arc<JobStore>,
    ocr: Arc<DocumentOcrService>,
    extractor: Arc<PageExtractor>,
    validator: Arc<PageValidator>,
    llm_b_skip_threshold: f32,
}

impl AnalysisRunner {
    pub fn from_runtime(runtime: &Runtime) -> Self {
        Self {
            store: runtime.store.clone(),
            ocr: runtime.ocr.clone(),
            extractor: Arc::new(PageExtractor::new(
                runtime.gateway.clone(),
                &runtime.settings.models.llm_a,
            )),
            validator: Arc::new(PageValidator::new(
                runtime.gateway.clone(),
                &runtime.settings.models.llm_b,
            )),
            llm_b_skip_threshold: runtime.settings.llm_b_skip_threshold,
        }
    }

    /// Run one document-analysis job to completion.
    pub async fn run(&self, job_id: &str, patient_id: &str) -> Result<(), JobError> {
        let start = std::time::Instant::now();

        match self
            .store
            .transition(JobKind::DocAnalysis, job_id, JobStatus::Processing)
        {
            Ok(_) => {}
            // Cancelled while still queued: nothing to do.
            Err(JobError::InvalidTransition {
                from: JobStatus::Cancelled,
                ..
            }) => return Ok(()),
            Err(e) => return Err(e),
        }
        let cancel = CancelCheck::new(self.store.clone(), JobKind::DocAnalysis, job_id);

        self.store
            .set_progress(JobKind::DocAnalysis, job_id, 5, "Fetching patient reports")?;

        let patient = self
            .store
            .get_patient(patient_id)?
            .ok_or_else(|| JobError::Failed("Patient not found".into()))?;
        let reports = self.store.reports_for_patient(&patient.id)?;
        if reports.is_empty() {
            return Err(JobError::Failed(
                "Patient has no uploaded reports to analyze".into(),
            ));
        }

        if cancel.is_cancelled() {
            info!(job_id, "Document analysis cancelled before processing");
            return Ok(());
        }

        let total = reports.len();
        let completed = AtomicUsize::new(0);
        let outcomes = join_all(reports.iter().map(|report| {
            let completed = &completed;
            async move {
                let outcome = match tokio::time::timeout(
                    REPORT_TIMEOUT,
                    self.process_report(report),
                )
                .await
                {
                    Ok(result) => result,
                    Err(_) => Ok(ReportResult::error(
                        &report.file_name,
                        "Report processing timed out",
                    )),
                };
                let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                let percent = 5 + ((90 * done) / total) as u8;
                let _ = self.store.set_progress(
                    JobKind::DocAnalysis,
                    job_id,
                    percent,
                    &format!("Processed {done}/{total} reports"),
                );
                outcome
            }
        }))
        .await;

        let mut results = Vec::with_capacity(total);
        for outcome in outcomes {
            results.push(outcome?);
        }

        if cancel.is_cancelled() {
            info!(job_id, "Document analysis cancelled; discarding results");
            return Ok(());
        }

        let payload = AnalysisResultPayload {
            processing_time_seconds: (start.elapsed().as_secs_f64() * 100.0).round() / 100.0,
            results,
            patient_name: patient.name.clone(),
            report_count: total,
            completed_at: Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
        };
        let payload_json = serde_json::to_string(&payload)
            .map_err(|e| JobError::Failed(format!("could not serialize result: {e}")))?;
        self.store
            .complete_with_result(JobKind::DocAnalysis, job_id, &payload_json)?;

        info!(
            job_id,
            reports = total,
            seconds = payload.processing_time_seconds,
            "Document analysis completed"
        );
        Ok(())
    }

    /// Process a single report file. `Err` is reserved for systemic
    /// failures that must fail the job.
    async fn process_report(&self, report: &ReportRecord) -> Result<ReportResult, JobError> {
        let Some(kind) = kind_for_file(&report.file_name) else {
            return Ok(ReportResult::skipped(
                &report.file_name,
                "Unsupported file type",
            ));
        };

        let bytes = match tokio::fs::read(&report.file_path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                return Ok(ReportResult::error(
                    &report.file_name,
                    &format!("Could not read file: {e}"),
                ))
            }
        };

        let document = match self.ocr.extract(&bytes, kind).await {
            Ok(document) => document,
            Err(e) => {
                warn!(file = %report.file_name, error = %e, "OCR failed for report");
                return Ok(ReportResult::error(&report.file_name, &e.to_string()));
            }
        };

        if document.full_text().trim().is_empty() {
            return Ok(ReportResult::warning(
                &report.file_name,
                "No text could be extracted from this document",
                document.total_pages,
            ));
        }

        let pages = join_all(
            document
                .pages
                .iter()
                .map(|page| self.process_page_with_timeout(page)),
        )
        .await;
        let mut analyses = Vec::with_capacity(pages.len());
        for page in pages {
            analyses.push(page.map_err(|e| JobError::Failed(map_upstream_error(&e.to_string())))?);
        }

        let analysis = merge_pages(&analyses);
        Ok(ReportResult {
            file_name: report.file_name.clone(),
            status: ReportStatus::Success,
            error: None,
            page_count: analyses.len(),
            analysis: Some(analysis),
            pages: analyses,
        })
    }

    async fn process_page_with_timeout(
        &self,
        page: &PageOcr,
    ) -> Result<PageAnalysis, crate::llm::LlmError> {
        match tokio::time::timeout(PAGE_TIMEOUT, self.process_page(page)).await {
            Ok(result) => result,
            Err(_) => Ok(PageAnalysis::empty(
                page.page_number,
                "Page processing timed out",
            )),
        }
    }

    /// Structural extraction, deterministic verification, and the
    /// conditional validation pass for one page.
    async fn process_page(&self, page: &PageOcr) -> Result<PageAnalysis, crate::llm::LlmError> {
        let mut stage_a = self.extractor.extract_page(page).await?;

        let (validation_needed, verify_warnings) =
            needs_validation(&stage_a.findings, &page.text, self.llm_b_skip_threshold);
        stage_a.warnings.extend(verify_warnings);

        if !validation_needed {
            return Ok(stage_a);
        }
        Ok(self.validator.validate(page, &stage_a).await)
    }
}
