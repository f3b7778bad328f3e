//! Radiology agent: tumors, lymph nodes, metastases from imaging reports.

use async_trait::async_trait;

use crate::extraction::prompts::fill;

use super::agent::{overall_confidence, parse_agent_json, rec_text, str_field, string_list, SpecialistAgent};
use super::prompts::RADIOLOGY_PROMPT;
use super::types::{
    AgentContext, AgentOutput, AgentType, ConfidenceLevel, SeverityLevel, SpecialistFinding,
    SpecialistRecommendation,
};

pub struct RadiologyAgent {
    model: String,
}

impl RadiologyAgent {
    pub fn new(model: &str) -> Self {
        Self {
            model: model.to_string(),
        }
    }
}

#[async_trait]
impl SpecialistAgent for RadiologyAgent {
    fn agent_type(&self) -> AgentType {
        AgentType::Radiology
    }

    fn agent_name(&self) -> &'static str {
        "Radiology Agent"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn build_prompt(&self, context: &AgentContext) -> String {
        let prompt = fill(
            RADIOLOGY_PROMPT,
            "patient_name",
            context.patient_name.as_deref().unwrap_or("Unknown"),
        );
        let prompt = fill(&prompt, "patient_id", &context.patient_id);
        let prompt = fill(
            &prompt,
            "report_type",
            context.report_type.as_deref().unwrap_or("Imaging Report"),
        );
        fill(&prompt, "report_text", &context.report_text)
    }

    fn parse_response(&self, response: &str, context: &AgentContext) -> Option<AgentOutput> {
        let data = parse_agent_json(response)?;
        let mut output = AgentOutput::empty(self.agent_type(), self.agent_name());
        output.warnings = string_list(&data, "warnings");
        output.summary = str_field(&data, "summary").unwrap_or_default();

        for tumor in data.get("tumors").and_then(|v| v.as_array()).into_iter().flatten() {
            let mut finding = SpecialistFinding::new(
                "tumor",
                str_field(tumor, "location").unwrap_or_else(|| "Primary Tumor".into()),
                str_field(tumor, "size").unwrap_or_else(|| "Unknown".into()),
            );
            finding.unit = str_field(tumor, "size_unit").or_else(|| Some("cm".into()));
            finding.severity = SeverityLevel::parse(
                &str_field(tumor, "severity").unwrap_or_else(|| "moderate".into()),
            );
            finding.confidence = ConfidenceLevel::parse(
                &str_field(tumor, "confidence").unwrap_or_else(|| "medium".into()),
            );
            finding.source_report = context.report_type.clone();
            finding.interpretation = str_field(tumor, "description");
            output.findings.push(finding);
        }

        for node in data.get("lymph_nodes").and_then(|v| v.as_array()).into_iter().flatten() {
            let mut finding = SpecialistFinding::new(
                "lymph_nodes",
                str_field(node, "location").unwrap_or_else(|| "Lymph Nodes".into()),
                str_field(node, "status").unwrap_or_else(|| "Unknown".into()),
            );
            finding.severity = SeverityLevel::parse(
                &str_field(node, "severity").unwrap_or_else(|| "moderate".into()),
            );
            finding.confidence = ConfidenceLevel::parse(
                &str_field(node, "confidence").unwrap_or_else(|| "medium".into()),
            );
            finding.source_report = context.report_type.clone();
            finding.interpretation = str_field(node, "description");
            output.findings.push(finding);
        }

        for met in data.get("metastases").and_then(|v| v.as_array()).into_iter().flatten() {
            let mut finding = SpecialistFinding::new(
                "metastasis",
                str_field(met, "location").unwrap_or_else(|| "Metastatic Site".into()),
                str_field(met, "status").unwrap_or_else(|| "Present".into()),
            );
            finding.severity = SeverityLevel::High;
            finding.confidence = ConfidenceLevel::parse(
                &str_field(met, "confidence").unwrap_or_else(|| "medium".into()),
            );
            finding.source_report = context.report_type.clone();
            finding.interpretation = str_field(met, "description");
            output.findings.push(finding);
        }

        for rec in data.get("recommendations").and_then(|v| v.as_array()).into_iter().flatten() {
            if let Some(text) = rec_text(rec) {
                let mut recommendation =
                    SpecialistRecommendation::new("imaging", text, SeverityLevel::Moderate);
                recommendation.rationale = str_field(rec, "rationale");
                output.recommendations.push(recommendation);
            }
        }

        output.confidence = overall_confidence(&output.findings);
        Some(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{LlmGateway, MockChatClient};
    use std::sync::Arc;

    fn response() -> String {
        serde_json::json!({
            "tumors": [
                {"location": "Right upper lobe", "size": "3.2 x 2.1", "size_unit": "cm",
                 "description": "Spiculated mass", "severity": "high", "confidence": "high"}
            ],
            "lymph_nodes": [
                {"location": "Station 4R", "status": "enlarged", "confidence": "medium"}
            ],
            "metastases": [
                {"location": "Liver", "status": "suspicious", "confidence": "low"}
            ],
            "recommendations": [
                {"text": "PET-CT for staging", "rationale": "Characterize liver lesion"}
            ],
            "summary": "Right upper lobe mass with nodal enlargement.",
            "warnings": ["Liver lesion incompletely characterized"]
        })
        .to_string()
    }

    #[tokio::test]
    async fn parses_all_imaging_categories() {
        let agent = RadiologyAgent::new("test-model");
        let gateway = Arc::new(LlmGateway::new(Arc::new(MockChatClient::new(&response())), 2));
        let context = AgentContext {
            patient_id: "p-1".into(),
            patient_name: Some("Jane Doe".into()),
            report_text: "CT chest: right upper lobe mass 3.2 x 2.1 cm".into(),
            report_type: Some("CT Chest".into()),
            ..Default::default()
        };

        let output = agent.analyze(&gateway, &context).await;
        assert!(output.success);
        assert_eq!(output.findings.len(), 3);

        let tumor = &output.findings[0];
        assert_eq!(tumor.category, "tumor");
        assert_eq!(tumor.name, "Right upper lobe");
        assert_eq!(tumor.value, "3.2 x 2.1");
        assert_eq!(tumor.unit.as_deref(), Some("cm"));
        assert_eq!(tumor.severity, SeverityLevel::High);
        assert_eq!(tumor.source_report.as_deref(), Some("CT Chest"));

        let met = &output.findings[2];
        assert_eq!(met.category, "metastasis");
        assert_eq!(met.severity, SeverityLevel::High, "metastases are always high severity");

        assert_eq!(output.recommendations.len(), 1);
        assert_eq!(output.recommendations[0].category, "imaging");
        assert!(output.warnings.iter().any(|w| w.contains("Liver lesion")));
    }

    #[tokio::test]
    async fn empty_report_yields_low_confidence() {
        let agent = RadiologyAgent::new("test-model");
        let gateway = Arc::new(LlmGateway::new(
            Arc::new(MockChatClient::new(
                r#"{"tumors": [], "summary": "No masses identified."}"#,
            )),
            2,
        ));
        let output = agent.analyze(&gateway, &AgentContext::default()).await;
        assert!(output.success);
        assert_eq!(output.confidence, ConfidenceLevel::Low);
    }

    #[test]
    fn prompt_embeds_context() {
        let agent = RadiologyAgent::new("m");
        let prompt = agent.build_prompt(&AgentContext {
            patient_id: "p-9".into(),
            patient_name: Some("Jane Doe".into()),
            report_text: "CT findings here".into(),
            report_type: Some("MRI Brain".into()),
            ..Default::default()
        });
        assert!(prompt.contains("Jane Doe"));
        assert!(prompt.contains("p-9"));
        assert!(prompt.contains("MRI Brain"));
        assert!(prompt.contains("CT findings here"));
        assert!(!prompt.contains("{report_text}"));
    }
}
