//! Tumor board job body: the phased execution plan.
//!
//! Phase 1 runs the radiology, pathology, and clinical agents in parallel
//! (bounded by the agent semaphore; LLM calls stay bounded by the shared
//! gateway semaphore). Phase 2 runs the research agent over the combined
//! Phase-1 summary. Phase 3 synthesizes locally via the coordinator. The
//! cleaner and validator then gate the final view before it lands on the
//! case record.
//!
//! Cancellation is polled between phases; in-flight agent calls run to
//! completion and their results are discarded.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::analysis::AnalysisResultPayload;
use crate::jobs::{CancelCheck, JobError, JobKind, JobStatus, JobStore};
use crate::llm::LlmGateway;
use crate::runtime::Runtime;

use super::agent::SpecialistAgent;
use super::cleaner::clean_view;
use super::clinical::ClinicalAgent;
use super::coordinator::{collect_warnings, CoordinatorAgent};
use super::intake::build_board_inputs;
use super::orchestration::{AgentRunRecord, AgentRunStatus, OrchestrationAdapter};
use super::pathology::PathologyAgent;
use super::radiology::RadiologyAgent;
use super::research::ResearchAgent;
use super::types::{
    AgentContext, AgentOutput, BoardFinding, BoardRecommendation, ClinicalTrial, TumorBoardView,
};

/// Progress checkpoints, monotonic, with operator-readable messages.
const PROGRESS_PREPARING: (u8, &str) = (10, "Preparing case data");
const PROGRESS_PHASE1: (u8, &str) = (25, "Specialist agents running");
const PROGRESS_IMAGING_DONE: (u8, &str) = (35, "Imaging analysis complete");
const PROGRESS_PHASE1_DONE: (u8, &str) = (50, "Specialist analysis complete");
const PROGRESS_RESEARCH: (u8, &str) = (55, "Research agent running");
const PROGRESS_RESEARCH_DONE: (u8, &str) = (70, "Research synthesis complete");
const PROGRESS_COORDINATOR: (u8, &str) = (80, "Coordinator synthesizing");
const PROGRESS_SYNTHESIS_DONE: (u8, &str) = (85, "Synthesis complete");
const PROGRESS_CLEANING: (u8, &str) = (90, "Validating and cleaning results");

pub struct TumorBoardRunner {
    store: Arc<JobStore>,
    gateway: Arc<LlmGateway>,
    radiology: RadiologyAgent,
    pathology: PathologyAgent,
    clinical: ClinicalAgent,
    research: ResearchAgent,
    coordinator: CoordinatorAgent,
    orchestration: OrchestrationAdapter,
    agent_permits: Arc<Semaphore>,
}

impl TumorBoardRunner {
    pub fn from_runtime(runtime: &Runtime) -> Self {
        let models = &runtime.settings.models;
        Self {
            store: runtime.store.clone(),
            gateway: runtime.gateway.clone(),
            radiology: RadiologyAgent::new(models.radiology()),
            pathology: PathologyAgent::new(models.pathology()),
            clinical: ClinicalAgent::new(models.clinical()),
            research: ResearchAgent::new(models.research()),
            coordinator: CoordinatorAgent::new(models.coordinator()),
            orchestration: OrchestrationAdapter::new(
                runtime.settings.azure_orchestration_enabled,
                runtime.settings.azure_agent_endpoint.clone(),
                runtime.settings.azure_agent_key.clone(),
            ),
            agent_permits: Arc::new(Semaphore::new(
                runtime.settings.tumor_board_max_agents.max(1),
            )),
        }
    }

    /// Run one tumor-board job to completion.
    pub async fn run(&self, job_id: &str, patient_id: &str) -> Result<(), JobError> {
        let start = std::time::Instant::now();

        match self
            .store
            .transition(JobKind::TumorBoard, job_id, JobStatus::Processing)
        {
            Ok(_) => {}
            Err(JobError::InvalidTransition {
                from: JobStatus::Cancelled,
                ..
            }) => return Ok(()),
            Err(e) => return Err(e),
        }
        let cancel = CancelCheck::new(self.store.clone(), JobKind::TumorBoard, job_id);
        self.progress(job_id, PROGRESS_PREPARING);

        // Latest completed document analysis is the board's input
        let patient = self.store.get_patient(patient_id)?;
        let patient_pk = patient
            .as_ref()
            .map(|p| p.id.clone())
            .unwrap_or_else(|| patient_id.to_string());
        let analysis_job = self
            .store
            .latest_completed_for_patient(JobKind::DocAnalysis, &patient_pk)?
            .ok_or_else(|| JobError::Failed("No AI analysis data".into()))?;
        let payload_json = analysis_job
            .result
            .ok_or_else(|| JobError::Failed("No AI analysis data".into()))?;
        let payload: AnalysisResultPayload = serde_json::from_str(&payload_json)
            .map_err(|e| JobError::Failed(format!("Analysis payload unreadable: {e}")))?;

        let inputs = build_board_inputs(&payload);
        if inputs.is_empty() {
            warn!(job_id, "Document analysis contained no usable findings");
        }

        let patient_name = patient
            .as_ref()
            .map(|p| p.name.clone())
            .unwrap_or_else(|| payload.patient_name.clone());
        let base_context = AgentContext {
            patient_id: patient_pk.clone(),
            patient_name: Some(patient_name.clone()),
            patient_age: patient.as_ref().and_then(|p| p.age.clone()),
            patient_gender: patient.as_ref().and_then(|p| p.gender.clone()),
            report_text: String::new(),
            report_type: None,
        };

        if cancel.is_cancelled() {
            info!(job_id, "Tumor board cancelled before agents started");
            return Ok(());
        }

        // ── Phase 1: parallel specialists ───────────────────
        self.progress(job_id, PROGRESS_PHASE1);
        let mut records: Vec<AgentRunRecord> = Vec::new();

        let (radiology, pathology, clinical) = tokio::join!(
            self.run_specialist(
                &self.radiology,
                &inputs.imaging_text,
                "Imaging Findings",
                &base_context,
                job_id,
            ),
            self.run_specialist(
                &self.pathology,
                &inputs.pathology_text,
                "Pathology and Hematology Findings",
                &base_context,
                job_id,
            ),
            self.run_specialist(
                &self.clinical,
                &inputs.clinical_text,
                "Clinical Findings",
                &base_context,
                job_id,
            ),
        );
        self.progress(job_id, PROGRESS_IMAGING_DONE);
        let (radiology, radiology_record) = radiology;
        let (pathology, pathology_record) = pathology;
        let (clinical, clinical_record) = clinical;
        records.extend([radiology_record, pathology_record, clinical_record].into_iter().flatten());
        self.progress(job_id, PROGRESS_PHASE1_DONE);

        if cancel.is_cancelled() {
            info!(job_id, "Tumor board cancelled after specialist phase");
            return Ok(());
        }

        // ── Phase 2: research over the combined summary ─────
        self.progress(job_id, PROGRESS_RESEARCH);
        let combined = combined_summary(
            radiology.as_ref(),
            pathology.as_ref(),
            clinical.as_ref(),
        );
        let (research, research_record) = self
            .run_specialist(&self.research, &combined, "Combined Summary", &base_context, job_id)
            .await;
        records.extend(research_record);
        self.progress(job_id, PROGRESS_RESEARCH_DONE);

        if cancel.is_cancelled() {
            info!(job_id, "Tumor board cancelled after research phase");
            return Ok(());
        }

        // ── Phase 3: local coordinator synthesis ────────────
        self.progress(job_id, PROGRESS_COORDINATOR);
        let synthesis = self
            .coordinator
            .synthesize(
                &self.gateway,
                &patient_pk,
                Some(&patient_name),
                radiology.as_ref(),
                pathology.as_ref(),
                clinical.as_ref(),
                research.as_ref(),
            )
            .await;
        self.progress(job_id, PROGRESS_SYNTHESIS_DONE);

        // ── Assemble, clean, persist ────────────────────────
        self.progress(job_id, PROGRESS_CLEANING);
        let mut view = assemble_view(
            &patient_pk,
            &patient_name,
            &base_context,
            radiology.as_ref(),
            pathology.as_ref(),
            clinical.as_ref(),
            research.as_ref(),
            &synthesis,
        );
        view.case_id = job_id.to_string();

        let mut view = clean_view(view);
        if self.orchestration.is_enabled() {
            let aggregate = self.orchestration.aggregate(&records);
            view.orchestration = serde_json::to_value(&aggregate).ok();
        }
        view.processing_time_seconds = (start.elapsed().as_secs_f64() * 100.0).round() / 100.0;

        if cancel.is_cancelled() {
            info!(job_id, "Tumor board cancelled; discarding view");
            return Ok(());
        }

        let view_json = serde_json::to_string(&view)
            .map_err(|e| JobError::Failed(format!("could not serialize view: {e}")))?;
        self.store
            .complete_with_result(JobKind::TumorBoard, job_id, &view_json)?;

        info!(
            job_id,
            agents = view.agents_used.len(),
            seconds = view.processing_time_seconds,
            "Tumor board completed"
        );
        Ok(())
    }

    fn progress(&self, job_id: &str, checkpoint: (u8, &str)) {
        let _ = self
            .store
            .set_progress(JobKind::TumorBoard, job_id, checkpoint.0, checkpoint.1);
    }

    /// Run one specialist under the agent semaphore with orchestration
    /// events. Empty input skips the agent entirely.
    async fn run_specialist(
        &self,
        agent: &dyn SpecialistAgent,
        input_text: &str,
        report_type: &str,
        base_context: &AgentContext,
        job_id: &str,
    ) -> (Option<AgentOutput>, Option<AgentRunRecord>) {
        if input_text.trim().is_empty() {
            return (None, None);
        }
        let Ok(_permit) = self.agent_permits.acquire().await else {
            return (None, None);
        };

        let context = AgentContext {
            report_text: input_text.to_string(),
            report_type: Some(report_type.to_string()),
            ..base_context.clone()
        };

        self.orchestration.emit_event("agent_start", agent.agent_name(), job_id);
        let start = std::time::Instant::now();
        let output = agent.analyze(&self.gateway, &context).await;
        let elapsed = start.elapsed().as_secs_f64();
        self.orchestration.emit_event("agent_complete", agent.agent_name(), job_id);

        let status = if output.success {
            AgentRunStatus::Success
        } else if output
            .error
            .as_deref()
            .is_some_and(|e| e.contains("timed out"))
        {
            AgentRunStatus::Timeout
        } else {
            AgentRunStatus::Failed
        };
        let record = AgentRunRecord {
            agent: agent.agent_name().to_string(),
            status,
            execution_time_seconds: (elapsed * 100.0).round() / 100.0,
        };
        (Some(output), Some(record))
    }
}

/// Combined Phase-1 summary for the research agent: each specialist's
/// summary plus its first five findings.
fn combined_summary(
    radiology: Option<&AgentOutput>,
    pathology: Option<&AgentOutput>,
    clinical: Option<&AgentOutput>,
) -> String {
    let mut parts = Vec::new();
    for (label, output) in [
        ("IMAGING", radiology),
        ("PATHOLOGY", pathology),
        ("CLINICAL", clinical),
    ] {
        let Some(output) = output.filter(|o| o.success) else {
            continue;
        };
        parts.push(format!("{label}: {}", output.summary));
        for finding in output.findings.iter().take(5) {
            parts.push(format!("  - {}: {}", finding.name, finding.value));
        }
    }
    parts.join("\n")
}

/// Build the raw view from agent outputs and the coordinator synthesis.
#[allow(clippy::too_many_arguments)]
fn assemble_view(
    patient_id: &str,
    patient_name: &str,
    context: &AgentContext,
    radiology: Option<&AgentOutput>,
    pathology: Option<&AgentOutput>,
    clinical: Option<&AgentOutput>,
    research: Option<&AgentOutput>,
    synthesis: &super::coordinator::CoordinatorSynthesis,
) -> TumorBoardView {
    let mut view = TumorBoardView::new(patient_id, patient_name);
    view.patient_age = context.patient_age.clone();
    view.patient_gender = context.patient_gender.clone();
    let now = Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
    view.case_date = now.clone();
    view.generated_at = now;

    let board_finding = |f: &super::types::SpecialistFinding, agent: &str| BoardFinding {
        category: f.category.clone(),
        title: f.name.clone(),
        value: f.value.clone(),
        severity: f.severity,
        source_agent: agent.to_string(),
        source_report: f.source_report.clone(),
        interpretation: f.interpretation.clone(),
    };
    let board_rec = |r: &super::types::SpecialistRecommendation| BoardRecommendation {
        category: r.category.clone(),
        text: r.text.clone(),
        priority: r.priority,
        rationale: r.rationale.clone(),
        evidence_level: r.evidence_level.clone(),
    };

    if let Some(output) = radiology.filter(|o| o.success) {
        view.agents_used.push(output.agent_name.clone());
        for finding in &output.findings {
            view.findings.imaging.push(board_finding(finding, "radiology"));
        }
        for rec in &output.recommendations {
            view.recommendations.imaging.push(board_rec(rec));
        }
    }

    if let Some(output) = pathology.filter(|o| o.success) {
        view.agents_used.push(output.agent_name.clone());
        for finding in &output.findings {
            if finding.category == "biomarker" {
                view.findings.biomarkers.push(board_finding(finding, "pathology"));
            } else {
                view.findings.pathology.push(board_finding(finding, "pathology"));
            }
        }
        for rec in &output.recommendations {
            view.recommendations.other.push(board_rec(rec));
        }
    }

    if let Some(output) = clinical.filter(|o| o.success) {
        view.agents_used.push(output.agent_name.clone());
        for finding in &output.findings {
            view.findings.clinical.push(board_finding(finding, "clinical"));
        }
        for rec in &output.recommendations {
            view.recommendations.other.push(board_rec(rec));
        }
    }

    if let Some(output) = research.filter(|o| o.success) {
        view.agents_used.push(output.agent_name.clone());
        for rec in &output.recommendations {
            match rec.category.as_str() {
                "treatment" => view.recommendations.treatment.push(board_rec(rec)),
                "clinical_trial" => view.clinical_trials.push(ClinicalTrial {
                    name: rec.text.clone(),
                    source: rec.source.clone(),
                    eligibility: rec.rationale.clone(),
                }),
                _ => view.recommendations.other.push(board_rec(rec)),
            }
        }
    }

    view.warnings = collect_warnings(&[radiology, pathology, clinical, research]);

    if synthesis.success {
        view.agents_used.push("Coordinator Agent".to_string());
        view.executive_summary = synthesis.executive_summary.clone();
        view.tnm_staging = synthesis.tnm_staging.clone();
        view.clinical_stage = synthesis.clinical_stage.clone();
        view.pathological_stage = synthesis.pathological_stage.clone();
        view.conflicts = synthesis.conflicts.clone();
        view.overall_confidence = synthesis.overall_confidence.clone();
        for rec in &synthesis.diagnostic_recommendations {
            view.recommendations.other.push(board_rec(rec));
        }
        for rec in &synthesis.treatment_recommendations {
            view.recommendations.treatment.push(board_rec(rec));
        }
    }
    for warning in &synthesis.warnings {
        if !view.warnings.contains(warning) {
            view.warnings.push(warning.clone());
        }
    }

    view
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{ReportResult, ReportStatus};
    use crate::extraction::{DocumentAnalysis, Finding, PatientIdentity, ReportMetadata};
    use crate::jobs::PatientRecord;
    use crate::llm::{ChatClient, ChatMessage, ChatOptions, ChatReply, LlmError, MockChatClient};
    use async_trait::async_trait;
    use serde_json::json;

    /// Chat client that routes responses by prompt content, so parallel
    /// agents each get their own script.
    struct RoutingChatClient {
        routes: Vec<(&'static str, String)>,
    }

    #[async_trait]
    impl ChatClient for RoutingChatClient {
        async fn chat(
            &self,
            _model: &str,
            messages: &[ChatMessage],
            _options: ChatOptions,
        ) -> Result<ChatReply, LlmError> {
            let prompt = messages.last().map(|m| m.content.as_str()).unwrap_or("");
            for (marker, response) in &self.routes {
                if prompt.contains(marker) {
                    return Ok(ChatReply {
                        content: response.clone(),
                        role: "assistant".into(),
                    });
                }
            }
            Ok(ChatReply {
                content: "{}".into(),
                role: "assistant".into(),
            })
        }
    }

    fn seeded_store(findings: Vec<Finding>) -> Arc<JobStore> {
        let store = Arc::new(JobStore::open_in_memory().unwrap());
        store
            .insert_patient(&PatientRecord {
                id: "pk-1".into(),
                patient_id: Some("P-0042".into()),
                name: "Jane Doe".into(),
                age: Some("54".into()),
                gender: Some("female".into()),
                cancer_type: None,
            })
            .unwrap();

        let payload = AnalysisResultPayload {
            processing_time_seconds: 2.0,
            results: vec![ReportResult {
                file_name: "cbc.pdf".into(),
                status: ReportStatus::Success,
                error: None,
                analysis: Some(DocumentAnalysis {
                    patient_identity: PatientIdentity::default(),
                    report_metadata: ReportMetadata::default(),
                    all_findings: findings,
                    diagnoses: vec![],
                    recommendations: vec![],
                    aggregate_confidence: 0.8,
                    merge_warnings: vec![],
                }),
                pages: vec![],
                page_count: 1,
            }],
            patient_name: "Jane Doe".into(),
            report_count: 1,
            completed_at: "2026-08-01T00:00:00Z".into(),
        };

        let analysis_job = store.create_job(JobKind::DocAnalysis, "pk-1", 1, None).unwrap();
        store
            .transition(JobKind::DocAnalysis, &analysis_job.id, JobStatus::Processing)
            .unwrap();
        store
            .complete_with_result(
                JobKind::DocAnalysis,
                &analysis_job.id,
                &serde_json::to_string(&payload).unwrap(),
            )
            .unwrap();
        store
    }

    fn runner_with(store: Arc<JobStore>, chat: Arc<dyn ChatClient>) -> TumorBoardRunner {
        TumorBoardRunner {
            store,
            gateway: Arc::new(LlmGateway::new(chat, 2)),
            radiology: RadiologyAgent::new("m"),
            pathology: PathologyAgent::new("m"),
            clinical: ClinicalAgent::new("m"),
            research: ResearchAgent::new("m"),
            coordinator: CoordinatorAgent::new("m"),
            orchestration: OrchestrationAdapter::disabled(),
            agent_permits: Arc::new(Semaphore::new(3)),
        }
    }

    fn hematology_findings() -> Vec<Finding> {
        vec![
            Finding::new("Hemoglobin", "13.2").with_unit("g/dL"),
            Finding::new("WBC Count", "7200"),
            Finding::new("Serum Creatinine", "1.1").with_unit("mg/dL"),
        ]
    }

    #[tokio::test]
    async fn safety_gating_without_pathology_confirmation() {
        // Agents succeed but nothing confirms a diagnosis: the cleaned view
        // must be fully gated.
        let chat = Arc::new(RoutingChatClient {
            routes: vec![
                (
                    "PATHOLOGY AI AGENT",
                    json!({
                        "diagnosis": {"type": "pending pathology confirmation", "is_confirmed": false, "confidence": "low"},
                        "suspected_disease_category": "unknown",
                        "summary": "Routine blood counts only."
                    })
                    .to_string(),
                ),
                (
                    "CLINICAL AI AGENT",
                    json!({
                        "labs": [
                            {"name": "Serum Creatinine", "value": "1.1", "unit": "mg/dL", "confidence": "high"}
                        ],
                        "summary": "Stable labs."
                    })
                    .to_string(),
                ),
                (
                    "RESEARCH AI AGENT",
                    json!({
                        "diagnosis_status": "pending",
                        "diagnostic_recommendations": [
                            {"type": "biopsy", "text": "Tissue biopsy to confirm diagnosis", "priority": "urgent"}
                        ],
                        "treatment_options": [{"name": "Chemotherapy"}],
                        "clinical_trials": [{"name": "Some trial", "cancer_type": "lung"}],
                        "summary": "Diagnosis pending."
                    })
                    .to_string(),
                ),
                (
                    "CHIEF DIAGNOSTIC COORDINATOR",
                    json!({
                        "executive_summary": "Diagnosis is pending; workup required.",
                        "diagnostic_status": "pending",
                        "key_findings": [],
                        "data_gaps": ["Pathology confirmation"],
                        "diagnostic_recommendations": [],
                        "treatment_recommendations": [],
                        "conflicts": [],
                        "staging_summary": {"tnm": null, "clinical_stage": null, "pathological_stage": null},
                        "overall_confidence": "low",
                        "warnings": []
                    })
                    .to_string(),
                ),
            ],
        });

        let store = seeded_store(hematology_findings());
        let runner = runner_with(store.clone(), chat);
        let job = store.create_job(JobKind::TumorBoard, "pk-1", 0, None).unwrap();

        runner.run(&job.id, "pk-1").await.unwrap();

        let done = store.get_job(JobKind::TumorBoard, &job.id).unwrap().unwrap();
        assert_eq!(done.status, JobStatus::Completed);
        assert_eq!(done.progress_percent, 100);

        let view: TumorBoardView = serde_json::from_str(done.result.as_deref().unwrap()).unwrap();
        assert_eq!(
            view.diagnostic_status.as_deref(),
            Some("diagnostic_workup_required")
        );
        assert!(matches!(view.overall_confidence.as_str(), "very_low" | "low"));
        assert!(view.clinical_trials.is_empty());
        assert!(view.recommendations.treatment.is_empty());
        assert!(view.warnings.iter().any(|w| w.contains("Diagnosis pending")));
        assert!(view
            .warnings
            .iter()
            .any(|w| w.contains("No imaging data available")));
        assert_eq!(view.patient_name, "Jane Doe");
        assert!(view.agents_used.contains(&"Coordinator Agent".to_string()));
    }

    #[tokio::test]
    async fn missing_analysis_fails_with_specific_message() {
        let store = Arc::new(JobStore::open_in_memory().unwrap());
        let runner = runner_with(store.clone(), Arc::new(MockChatClient::new("{}")));
        let job = store.create_job(JobKind::TumorBoard, "pk-1", 0, None).unwrap();

        let err = runner.run(&job.id, "pk-1").await.unwrap_err();
        assert_eq!(err.to_string(), "No AI analysis data");
    }

    #[tokio::test]
    async fn cancelled_while_queued_is_a_quiet_noop() {
        let store = seeded_store(hematology_findings());
        let runner = runner_with(store.clone(), Arc::new(MockChatClient::new("{}")));
        let job = store.create_job(JobKind::TumorBoard, "pk-1", 0, None).unwrap();
        store.cancel_for_patient(JobKind::TumorBoard, "pk-1").unwrap();

        runner.run(&job.id, "pk-1").await.unwrap();

        let cancelled = store.get_job(JobKind::TumorBoard, &job.id).unwrap().unwrap();
        assert_eq!(cancelled.status, JobStatus::Cancelled);
        assert!(cancelled.result.is_none());
        assert!(cancelled.completed_at.is_some());
    }

    /// Chat client that cancels the patient's board jobs on its first call,
    /// simulating a cancel request arriving during Phase 1.
    struct CancellingChatClient {
        store: Arc<JobStore>,
        fired: std::sync::atomic::AtomicBool,
    }

    #[async_trait]
    impl ChatClient for CancellingChatClient {
        async fn chat(
            &self,
            _model: &str,
            _messages: &[ChatMessage],
            _options: ChatOptions,
        ) -> Result<ChatReply, LlmError> {
            if !self.fired.swap(true, std::sync::atomic::Ordering::SeqCst) {
                self.store
                    .cancel_for_patient(JobKind::TumorBoard, "pk-1")
                    .unwrap();
            }
            Ok(ChatReply {
                content: r#"{"summary": "s"}"#.into(),
                role: "assistant".into(),
            })
        }
    }

    #[tokio::test]
    async fn cancellation_mid_run_discards_results() {
        let store = seeded_store(hematology_findings());
        let chat = Arc::new(CancellingChatClient {
            store: store.clone(),
            fired: std::sync::atomic::AtomicBool::new(false),
        });
        let runner = runner_with(store.clone(), chat);
        let job = store.create_job(JobKind::TumorBoard, "pk-1", 0, None).unwrap();

        runner.run(&job.id, "pk-1").await.unwrap();

        let cancelled = store.get_job(JobKind::TumorBoard, &job.id).unwrap().unwrap();
        assert_eq!(cancelled.status, JobStatus::Cancelled);
        assert!(cancelled.result.is_none(), "no view written after cancel");
        assert!(cancelled.completed_at.is_some());
    }

    #[test]
    fn combined_summary_includes_top_findings_only() {
        let mut radiology = AgentOutput::empty(super::super::types::AgentType::Radiology, "Radiology Agent");
        radiology.summary = "Mass in right lung.".into();
        for i in 0..8 {
            radiology.findings.push(super::super::types::SpecialistFinding::new(
                "tumor",
                format!("Lesion {i}"),
                "present",
            ));
        }
        let summary = combined_summary(Some(&radiology), None, None);
        assert!(summary.contains("IMAGING: Mass in right lung."));
        assert!(summary.contains("Lesion 4"));
        assert!(!summary.contains("Lesion 5"), "only the first five findings");
    }

    #[test]
    fn failed_agents_are_excluded_from_combined_summary() {
        let failed = AgentOutput::failure(
            super::super::types::AgentType::Pathology,
            "Pathology Agent",
            "boom",
        );
        let summary = combined_summary(None, Some(&failed), None);
        assert!(summary.is_empty());
    }
}
