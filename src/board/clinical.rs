//! Clinical agent: performance status, comorbidities, symptoms, labs, and
//! treatment history from clinical notes.

use async_trait::async_trait;

use crate::extraction::prompts::fill;

use super::agent::{overall_confidence, parse_agent_json, rec_text, str_field, string_list, SpecialistAgent};
use super::prompts::CLINICAL_PROMPT;
use super::types::{
    AgentContext, AgentOutput, AgentType, ConfidenceLevel, SeverityLevel, SpecialistFinding,
    SpecialistRecommendation,
};

pub struct ClinicalAgent {
    model: String,
}

impl ClinicalAgent {
    pub fn new(model: &str) -> Self {
        Self {
            model: model.to_string(),
        }
    }
}

/// ECOG 0-1 is low concern, 2 moderate, 3-4 high.
fn performance_status_severity(value: &str) -> SeverityLevel {
    if value.contains('0') || value.contains('1') {
        SeverityLevel::Low
    } else if value.contains('2') {
        SeverityLevel::Moderate
    } else if value.contains('3') || value.contains('4') {
        SeverityLevel::High
    } else {
        SeverityLevel::Moderate
    }
}

fn symptom_severity(value: &str) -> SeverityLevel {
    match value.to_ascii_lowercase().as_str() {
        "severe" => SeverityLevel::High,
        "mild" => SeverityLevel::Low,
        _ => SeverityLevel::Moderate,
    }
}

#[async_trait]
impl SpecialistAgent for ClinicalAgent {
    fn agent_type(&self) -> AgentType {
        AgentType::Clinical
    }

    fn agent_name(&self) -> &'static str {
        "Clinical Agent"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn build_prompt(&self, context: &AgentContext) -> String {
        let prompt = fill(
            CLINICAL_PROMPT,
            "patient_name",
            context.patient_name.as_deref().unwrap_or("Unknown"),
        );
        let prompt = fill(&prompt, "patient_id", &context.patient_id);
        let prompt = fill(
            &prompt,
            "patient_age",
            context.patient_age.as_deref().unwrap_or("Unknown"),
        );
        let prompt = fill(
            &prompt,
            "patient_gender",
            context.patient_gender.as_deref().unwrap_or("Unknown"),
        );
        let prompt = fill(
            &prompt,
            "report_type",
            context.report_type.as_deref().unwrap_or("Clinical Notes"),
        );
        fill(&prompt, "report_text", &context.report_text)
    }

    fn parse_response(&self, response: &str, context: &AgentContext) -> Option<AgentOutput> {
        let data = parse_agent_json(response)?;
        let mut output = AgentOutput::empty(self.agent_type(), self.agent_name());
        output.warnings = string_list(&data, "warnings");
        output.summary = str_field(&data, "summary").unwrap_or_default();

        if let Some(ps) = data.get("performance_status").filter(|v| v.is_object()) {
            let value = str_field(ps, "value").unwrap_or_else(|| "Unknown".into());
            let mut finding =
                SpecialistFinding::new("performance_status", "ECOG Performance Status", value.clone());
            finding.severity = performance_status_severity(&value);
            finding.confidence = ConfidenceLevel::parse(
                &str_field(ps, "confidence").unwrap_or_else(|| "medium".into()),
            );
            finding.source_report = context.report_type.clone();
            output.findings.push(finding);
        }

        for comorbidity in data.get("comorbidities").and_then(|v| v.as_array()).into_iter().flatten() {
            let mut finding = SpecialistFinding::new(
                "comorbidity",
                str_field(comorbidity, "name").unwrap_or_else(|| "Unknown".into()),
                str_field(comorbidity, "status").unwrap_or_else(|| "Present".into()),
            );
            finding.severity = SeverityLevel::Moderate;
            finding.confidence = ConfidenceLevel::parse(
                &str_field(comorbidity, "confidence").unwrap_or_else(|| "medium".into()),
            );
            finding.source_report = context.report_type.clone();
            output.findings.push(finding);
        }

        for symptom in data.get("symptoms").and_then(|v| v.as_array()).into_iter().flatten() {
            let severity_str = str_field(symptom, "severity").unwrap_or_else(|| "Present".into());
            let mut finding = SpecialistFinding::new(
                "symptom",
                str_field(symptom, "name").unwrap_or_else(|| "Unknown".into()),
                severity_str.clone(),
            );
            finding.severity = symptom_severity(&severity_str);
            finding.confidence = ConfidenceLevel::parse(
                &str_field(symptom, "confidence").unwrap_or_else(|| "medium".into()),
            );
            finding.source_report = context.report_type.clone();
            output.findings.push(finding);
        }

        for lab in data.get("labs").and_then(|v| v.as_array()).into_iter().flatten() {
            let mut finding = SpecialistFinding::new(
                "lab",
                str_field(lab, "name").unwrap_or_else(|| "Unknown".into()),
                str_field(lab, "value").unwrap_or_else(|| "Unknown".into()),
            );
            finding.unit = str_field(lab, "unit");
            finding.severity = SeverityLevel::Info;
            finding.confidence = ConfidenceLevel::parse(
                &str_field(lab, "confidence").unwrap_or_else(|| "medium".into()),
            );
            finding.source_report = context.report_type.clone();
            finding.interpretation = str_field(lab, "interpretation");
            output.findings.push(finding);
        }

        for treatment in data.get("treatment_history").and_then(|v| v.as_array()).into_iter().flatten() {
            let mut finding = SpecialistFinding::new(
                "treatment",
                str_field(treatment, "type").unwrap_or_else(|| "Treatment".into()),
                str_field(treatment, "name").unwrap_or_else(|| "Unknown".into()),
            );
            finding.severity = SeverityLevel::Info;
            finding.confidence = ConfidenceLevel::parse(
                &str_field(treatment, "confidence").unwrap_or_else(|| "medium".into()),
            );
            finding.source_report = context.report_type.clone();
            finding.interpretation = str_field(treatment, "response");
            output.findings.push(finding);
        }

        for rec in data.get("recommendations").and_then(|v| v.as_array()).into_iter().flatten() {
            if let Some(text) = rec_text(rec) {
                output.recommendations.push(SpecialistRecommendation::new(
                    "clinical",
                    text,
                    SeverityLevel::Moderate,
                ));
            }
        }

        output.confidence = overall_confidence(&output.findings);
        Some(output)
    }
}
