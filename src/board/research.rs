//! Research agent: evidence-based guidance over the combined summary of
//! the other specialists.
//!
//! Safety posture: treatment options surface only when the diagnosis is
//! confirmed, clinical trials only when the cancer type is known, and
//! every treatment carries `requires_confirmation` until pathology says
//! otherwise.

use async_trait::async_trait;

use crate::extraction::prompts::fill;

use super::agent::{parse_agent_json, str_field, string_list, SpecialistAgent};
use super::prompts::RESEARCH_PROMPT;
use super::types::{
    AgentContext, AgentOutput, AgentType, ConfidenceLevel, SeverityLevel,
    SpecialistRecommendation,
};

pub struct ResearchAgent {
    model: String,
}

impl ResearchAgent {
    pub fn new(model: &str) -> Self {
        Self {
            model: model.to_string(),
        }
    }
}

fn priority_from(value: Option<String>) -> SeverityLevel {
    SeverityLevel::parse(&value.unwrap_or_else(|| "moderate".into()))
}

#[async_trait]
impl SpecialistAgent for ResearchAgent {
    fn agent_type(&self) -> AgentType {
        AgentType::Research
    }

    fn agent_name(&self) -> &'static str {
        "Research Agent"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn build_prompt(&self, context: &AgentContext) -> String {
        let prompt = fill(
            RESEARCH_PROMPT,
            "patient_name",
            context.patient_name.as_deref().unwrap_or("Unknown"),
        );
        let prompt = fill(&prompt, "patient_id", &context.patient_id);
        let prompt = fill(
            &prompt,
            "patient_age",
            context.patient_age.as_deref().unwrap_or("Unknown"),
        );
        fill(&prompt, "clinical_summary", &context.report_text)
    }

    fn parse_response(&self, response: &str, _context: &AgentContext) -> Option<AgentOutput> {
        let data = parse_agent_json(response)?;
        let mut output = AgentOutput::empty(self.agent_type(), self.agent_name());
        output.warnings = string_list(&data, "warnings");
        output.summary = str_field(&data, "summary").unwrap_or_default();

        let diagnosis_status =
            str_field(&data, "diagnosis_status").unwrap_or_else(|| "unknown".into());
        let confirmed = diagnosis_status == "confirmed";

        for rec in data
            .get("diagnostic_recommendations")
            .and_then(|v| v.as_array())
            .into_iter()
            .flatten()
        {
            if let Some(text) = str_field(rec, "text") {
                let mut recommendation = SpecialistRecommendation::new(
                    "diagnostic",
                    text,
                    priority_from(str_field(rec, "priority")),
                );
                recommendation.rationale = str_field(rec, "rationale");
                output.recommendations.push(recommendation);
            }
        }

        // Treatment options surface only for a confirmed diagnosis; the
        // confirmation flag stays on regardless of what the model set.
        if confirmed {
            for option in data
                .get("treatment_options")
                .and_then(|v| v.as_array())
                .into_iter()
                .flatten()
            {
                if let Some(name) = str_field(option, "name") {
                    let mut recommendation =
                        SpecialistRecommendation::new("treatment", name, SeverityLevel::Moderate);
                    recommendation.rationale = str_field(option, "rationale");
                    recommendation.evidence_level = str_field(option, "evidence_level");
                    recommendation.source = str_field(option, "source");
                    recommendation.requires_confirmation = true;
                    output.recommendations.push(recommendation);
                }
            }
            for trial in data
                .get("clinical_trials")
                .and_then(|v| v.as_array())
                .into_iter()
                .flatten()
            {
                // Trials require a known cancer type
                if str_field(trial, "cancer_type").is_none() {
                    continue;
                }
                if let Some(name) = str_field(trial, "name") {
                    let mut recommendation = SpecialistRecommendation::new(
                        "clinical_trial",
                        name,
                        SeverityLevel::Moderate,
                    );
                    recommendation.rationale = str_field(trial, "eligibility");
                    recommendation.evidence_level = Some("Clinical Trial".into());
                    recommendation.source = str_field(trial, "nct_id");
                    output.recommendations.push(recommendation);
                }
            }
        } else {
            let dropped_treatments = data
                .get("treatment_options")
                .and_then(|v| v.as_array())
                .map(|a| a.len())
                .unwrap_or(0);
            let dropped_trials = data
                .get("clinical_trials")
                .and_then(|v| v.as_array())
                .map(|a| a.len())
                .unwrap_or(0);
            if dropped_treatments + dropped_trials > 0 {
                output.warnings.push(format!(
                    "Diagnosis {diagnosis_status}: withheld {dropped_treatments} treatment option(s) and {dropped_trials} trial(s)"
                ));
            }
        }

        for rec in data
            .get("supportive_care")
            .and_then(|v| v.as_array())
            .into_iter()
            .flatten()
        {
            if let Some(text) = str_field(rec, "text") {
                let mut recommendation =
                    SpecialistRecommendation::new("supportive_care", text, SeverityLevel::Low);
                recommendation.rationale = str_field(rec, "rationale");
                output.recommendations.push(recommendation);
            }
        }

        for referral in string_list(&data, "specialist_referrals") {
            output.recommendations.push(SpecialistRecommendation::new(
                "referral",
                format!("Refer to {referral}"),
                SeverityLevel::Moderate,
            ));
        }

        output.confidence = if output.recommendations.is_empty() {
            ConfidenceLevel::Low
        } else {
            ConfidenceLevel::Medium
        };
        Some(output)
    }
}
