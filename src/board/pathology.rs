//! Pathology agent: histological diagnosis, grade, biomarkers, mutations,
//! margins, and hematologic findings.
//!
//! The diagnosis finding's interpretation carries the explicit
//! `is_confirmed` flag and the inferred disease category, which the
//! validator and cleaner read downstream.

use async_trait::async_trait;

use crate::extraction::prompts::fill;

use super::agent::{overall_confidence, parse_agent_json, rec_text, str_field, string_list, SpecialistAgent};
use super::prompts::PATHOLOGY_PROMPT;
use super::types::{
    AgentContext, AgentOutput, AgentType, ConfidenceLevel, SeverityLevel, SpecialistFinding,
    SpecialistRecommendation,
};

pub struct PathologyAgent {
    model: String,
}

impl PathologyAgent {
    pub fn new(model: &str) -> Self {
        Self {
            model: model.to_string(),
        }
    }
}

#[async_trait]
impl SpecialistAgent for PathologyAgent {
    fn agent_type(&self) -> AgentType {
        AgentType::Pathology
    }

    fn agent_name(&self) -> &'static str {
        "Pathology Agent"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn build_prompt(&self, context: &AgentContext) -> String {
        let prompt = fill(
            PATHOLOGY_PROMPT,
            "patient_name",
            context.patient_name.as_deref().unwrap_or("Unknown"),
        );
        let prompt = fill(&prompt, "patient_id", &context.patient_id);
        let prompt = fill(
            &prompt,
            "report_type",
            context.report_type.as_deref().unwrap_or("Pathology Report"),
        );
        fill(&prompt, "report_text", &context.report_text)
    }

    fn parse_response(&self, response: &str, context: &AgentContext) -> Option<AgentOutput> {
        let data = parse_agent_json(response)?;
        let mut output = AgentOutput::empty(self.agent_type(), self.agent_name());
        output.warnings = string_list(&data, "warnings");
        output.summary = str_field(&data, "summary").unwrap_or_default();

        if let Some(dx) = data.get("diagnosis").filter(|v| v.is_object()) {
            let confirmed = dx.get("is_confirmed").and_then(|v| v.as_bool()).unwrap_or(false);
            let mut finding = SpecialistFinding::new(
                "diagnosis",
                "Histological Diagnosis",
                str_field(dx, "type").unwrap_or_else(|| "Unknown".into()),
            );
            finding.severity = SeverityLevel::High;
            finding.confidence = ConfidenceLevel::parse(
                &str_field(dx, "confidence").unwrap_or_else(|| "medium".into()),
            );
            finding.source_report = context.report_type.clone();
            finding.interpretation = str_field(dx, "description");
            if !confirmed {
                output
                    .warnings
                    .push("Diagnosis not confirmed by pathology".into());
            }
            output.findings.push(finding);
        }

        if let Some(category) = str_field(&data, "suspected_disease_category") {
            let mut finding =
                SpecialistFinding::new("disease_category", "Suspected Disease Category", category);
            finding.severity = SeverityLevel::Info;
            output.findings.push(finding);
        }

        if let Some(grade) = data.get("grade").filter(|v| v.is_object()) {
            if let Some(value) = str_field(grade, "value") {
                let mut finding = SpecialistFinding::new("grade", "Tumor Grade", value);
                finding.severity = SeverityLevel::Moderate;
                finding.confidence = ConfidenceLevel::parse(
                    &str_field(grade, "confidence").unwrap_or_else(|| "medium".into()),
                );
                finding.source_report = context.report_type.clone();
                output.findings.push(finding);
            }
        }

        for marker in data.get("biomarkers").and_then(|v| v.as_array()).into_iter().flatten() {
            let value = str_field(marker, "value").unwrap_or_else(|| "Unknown".into());
            let mut finding = SpecialistFinding::new(
                "biomarker",
                str_field(marker, "name").unwrap_or_else(|| "Unknown Biomarker".into()),
                value.clone(),
            );
            finding.severity = if value.to_lowercase().contains("positive") {
                SeverityLevel::High
            } else {
                SeverityLevel::Moderate
            };
            finding.confidence = ConfidenceLevel::parse(
                &str_field(marker, "confidence").unwrap_or_else(|| "medium".into()),
            );
            finding.source_report = context.report_type.clone();
            finding.interpretation = str_field(marker, "interpretation");
            if marker.get("is_relevant_to_disease").and_then(|v| v.as_bool()) == Some(false) {
                output.warnings.push(format!(
                    "Biomarker {} flagged as not relevant to the suspected disease",
                    finding.name
                ));
            }
            output.findings.push(finding);
        }

        for mutation in data.get("mutations").and_then(|v| v.as_array()).into_iter().flatten() {
            let mut finding = SpecialistFinding::new(
                "mutation",
                str_field(mutation, "gene").unwrap_or_else(|| "Unknown Gene".into()),
                str_field(mutation, "status").unwrap_or_else(|| "Unknown".into()),
            );
            finding.severity = SeverityLevel::High;
            finding.confidence = ConfidenceLevel::parse(
                &str_field(mutation, "confidence").unwrap_or_else(|| "medium".into()),
            );
            finding.source_report = context.report_type.clone();
            finding.interpretation = str_field(mutation, "clinical_significance");
            output.findings.push(finding);
        }

        if let Some(margins) = data.get("margins").filter(|v| v.is_object()) {
            if let Some(status) = str_field(margins, "status") {
                let mut finding = SpecialistFinding::new("surgical", "Surgical Margins", status.clone());
                finding.severity = if status.to_lowercase() == "positive" {
                    SeverityLevel::High
                } else {
                    SeverityLevel::Low
                };
                finding.confidence = ConfidenceLevel::parse(
                    &str_field(margins, "confidence").unwrap_or_else(|| "medium".into()),
                );
                finding.source_report = context.report_type.clone();
                output.findings.push(finding);
            }
        }

        for hem in data
            .get("hematologic_findings")
            .and_then(|v| v.as_array())
            .into_iter()
            .flatten()
        {
            let mut finding = SpecialistFinding::new(
                "hematologic",
                str_field(hem, "name").unwrap_or_else(|| "Hematologic Finding".into()),
                str_field(hem, "value").unwrap_or_else(|| "Unknown".into()),
            );
            finding.severity = if hem.get("is_abnormal").and_then(|v| v.as_bool()) == Some(true) {
                SeverityLevel::Moderate
            } else {
                SeverityLevel::Info
            };
            finding.source_report = context.report_type.clone();
            finding.interpretation = str_field(hem, "interpretation");
            output.findings.push(finding);
        }

        for rec in data.get("recommendations").and_then(|v| v.as_array()).into_iter().flatten() {
            if let Some(text) = rec_text(rec) {
                output.recommendations.push(SpecialistRecommendation::new(
                    "pathology",
                    text,
                    SeverityLevel::Moderate,
                ));
            }
        }

        output.confidence = overall_confidence(&output.findings);
        Some(output)
    }
}
