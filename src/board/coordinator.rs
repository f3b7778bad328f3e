//! Coordinator: synthesizes the specialist outputs into an executive view.
//!
//! The coordinator is itself an LLM call, but its prompt enumerates the
//! safety rules — no treatment without pathological confirmation, no
//! staging that is not in its inputs, low confidence when critical data is
//! missing. A failed synthesis degrades gracefully: the runner builds the
//! view from the raw agent outputs and the cleaner's fallbacks.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tracing::warn;

use crate::extraction::prompts::fill;
use crate::llm::{ChatMessage, ChatOptions, LlmGateway};

use super::agent::{parse_agent_json, str_field, string_list};
use super::prompts::COORDINATOR_PROMPT;
use super::types::{
    AgentOutput, BoardConflict, ConfidenceLevel, SeverityLevel, SpecialistFinding,
    SpecialistRecommendation,
};

const COORDINATOR_MAX_TOKENS: u32 = 2048;
const COORDINATOR_TIMEOUT: Duration = Duration::from_secs(120);

/// Parsed coordinator output.
#[derive(Debug, Clone)]
pub struct CoordinatorSynthesis {
    pub success: bool,
    pub executive_summary: String,
    pub diagnostic_status: Option<String>,
    pub key_findings: Vec<SpecialistFinding>,
    pub data_gaps: Vec<String>,
    pub diagnostic_recommendations: Vec<SpecialistRecommendation>,
    pub treatment_recommendations: Vec<SpecialistRecommendation>,
    pub conflicts: Vec<BoardConflict>,
    pub tnm_staging: Option<String>,
    pub clinical_stage: Option<String>,
    pub pathological_stage: Option<String>,
    pub overall_confidence: String,
    pub confidence_justification: Option<String>,
    pub warnings: Vec<String>,
}

impl CoordinatorSynthesis {
    fn failed(reason: &str) -> Self {
        Self {
            success: false,
            executive_summary: String::new(),
            diagnostic_status: None,
            key_findings: Vec::new(),
            data_gaps: Vec::new(),
            diagnostic_recommendations: Vec::new(),
            treatment_recommendations: Vec::new(),
            conflicts: Vec::new(),
            tnm_staging: None,
            clinical_stage: None,
            pathological_stage: None,
            overall_confidence: "low".into(),
            confidence_justification: None,
            warnings: vec![reason.to_string()],
        }
    }
}

pub struct CoordinatorAgent {
    model: String,
}

impl CoordinatorAgent {
    pub fn new(model: &str) -> Self {
        Self {
            model: model.to_string(),
        }
    }

    /// Synthesize specialist outputs into an executive view.
    pub async fn synthesize(
        &self,
        gateway: &Arc<LlmGateway>,
        patient_id: &str,
        patient_name: Option<&str>,
        radiology: Option<&AgentOutput>,
        pathology: Option<&AgentOutput>,
        clinical: Option<&AgentOutput>,
        research: Option<&AgentOutput>,
    ) -> CoordinatorSynthesis {
        let agent_outputs = json!({
            "radiology": radiology,
            "pathology": pathology,
            "clinical": clinical,
            "research": research,
        });
        let agent_json = serde_json::to_string_pretty(&agent_outputs).unwrap_or_default();

        let prompt = fill(
            COORDINATOR_PROMPT,
            "patient_name",
            patient_name.unwrap_or("Unknown"),
        );
        let prompt = fill(&prompt, "patient_id", patient_id);
        let prompt = fill(&prompt, "agent_outputs", &agent_json);

        let messages = [ChatMessage::user(prompt)];
        let call = gateway.chat(
            &self.model,
            &messages,
            ChatOptions::json(COORDINATOR_MAX_TOKENS),
        );
        let reply = match tokio::time::timeout(COORDINATOR_TIMEOUT, call).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(e)) => {
                warn!(error = %e, "Coordinator LLM call failed");
                return CoordinatorSynthesis::failed(&format!("Coordinator failed: {e}"));
            }
            Err(_) => {
                warn!("Coordinator timed out");
                return CoordinatorSynthesis::failed("Coordinator timed out");
            }
        };

        match parse_synthesis(&reply.content) {
            Some(synthesis) => synthesis,
            None => CoordinatorSynthesis::failed("Coordinator returned no usable JSON"),
        }
    }
}

fn parse_synthesis(response: &str) -> Option<CoordinatorSynthesis> {
    let data = parse_agent_json(response)?;

    let mut key_findings = Vec::new();
    for f in data.get("key_findings").and_then(|v| v.as_array()).into_iter().flatten() {
        let mut finding = SpecialistFinding::new(
            &str_field(f, "category").unwrap_or_else(|| "summary".into()),
            str_field(f, "name").unwrap_or_else(|| "Finding".into()),
            str_field(f, "value").unwrap_or_default(),
        );
        finding.severity =
            SeverityLevel::parse(&str_field(f, "severity").unwrap_or_else(|| "moderate".into()));
        finding.confidence = ConfidenceLevel::parse(
            &str_field(f, "confidence").unwrap_or_else(|| "medium".into()),
        );
        finding.source_report = str_field(f, "source_agent");
        key_findings.push(finding);
    }

    let mut diagnostic_recommendations = Vec::new();
    for r in data
        .get("diagnostic_recommendations")
        .and_then(|v| v.as_array())
        .into_iter()
        .flatten()
    {
        if let Some(text) = str_field(r, "text") {
            let mut rec = SpecialistRecommendation::new(
                &str_field(r, "category").unwrap_or_else(|| "diagnostic".into()),
                text,
                SeverityLevel::parse(&str_field(r, "priority").unwrap_or_else(|| "moderate".into())),
            );
            rec.rationale = str_field(r, "rationale");
            diagnostic_recommendations.push(rec);
        }
    }

    let mut treatment_recommendations = Vec::new();
    for r in data
        .get("treatment_recommendations")
        .and_then(|v| v.as_array())
        .into_iter()
        .flatten()
    {
        if let Some(text) = str_field(r, "text") {
            let mut rec = SpecialistRecommendation::new(
                "treatment",
                text,
                SeverityLevel::parse(&str_field(r, "priority").unwrap_or_else(|| "moderate".into())),
            );
            rec.rationale = str_field(r, "rationale");
            rec.evidence_level = str_field(r, "evidence_level");
            rec.requires_confirmation = r
                .get("requires_confirmation")
                .and_then(|v| v.as_bool())
                .unwrap_or(true);
            treatment_recommendations.push(rec);
        }
    }

    let mut conflicts = Vec::new();
    for c in data.get("conflicts").and_then(|v| v.as_array()).into_iter().flatten() {
        if let Some(description) = str_field(c, "description") {
            conflicts.push(BoardConflict {
                description,
                agents_involved: string_list(c, "agents_involved"),
            });
        }
    }

    let staging = data.get("staging_summary").cloned().unwrap_or(json!({}));

    Some(CoordinatorSynthesis {
        success: true,
        executive_summary: str_field(&data, "executive_summary").unwrap_or_default(),
        diagnostic_status: str_field(&data, "diagnostic_status"),
        key_findings,
        data_gaps: string_list(&data, "data_gaps"),
        diagnostic_recommendations,
        treatment_recommendations,
        conflicts,
        tnm_staging: str_field(&staging, "tnm"),
        clinical_stage: str_field(&staging, "clinical_stage"),
        pathological_stage: str_field(&staging, "pathological_stage"),
        overall_confidence: str_field(&data, "overall_confidence").unwrap_or_else(|| "low".into()),
        confidence_justification: str_field(&data, "confidence_justification"),
        warnings: string_list(&data, "warnings"),
    })
}

/// Order-preserving union of warnings across agent outputs.
pub fn collect_warnings(outputs: &[Option<&AgentOutput>]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut warnings = Vec::new();
    for output in outputs.iter().flatten() {
        for warning in &output.warnings {
            if seen.insert(warning.clone()) {
                warnings.push(warning.clone());
            }
        }
    }
    warnings
}
