//! Structural extraction pass: OCR text → `PageAnalysis` via the LLM.
//!
//! The model transcribes; this module verifies. Numeric values that do not
//! appear verbatim in the page text are kept but flagged, and a patient
//! name that cannot be matched against the page text is cleared entirely —
//! a wrong name is worse than no name.

use std::sync::Arc;

use tracing::warn;

use crate::llm::{parse_tolerant_json, ChatMessage, ChatOptions, LlmError, LlmGateway};

use super::prompts::{fill, STAGE_A_PROMPT};
use super::types::{first_numeric_substring, name_verified_in_text, PageAnalysis};
use crate::ocr::PageOcr;

const RAW_TEXT_PREVIEW_CHARS: usize = 200;
const STAGE_A_MAX_TOKENS: u32 = 4096;

/// Confidence assumed when the model omits the field.
const DEFAULT_EXTRACTION_CONFIDENCE: f32 = 0.5;

pub struct PageExtractor {
    gateway: Arc<LlmGateway>,
    model: String,
}

impl PageExtractor {
    pub fn new(gateway: Arc<LlmGateway>, model: &str) -> Self {
        Self {
            gateway,
            model: model.to_string(),
        }
    }

    /// Extract structured findings from one OCR page.
    ///
    /// Parse failures degrade to an empty analysis whose warnings say what
    /// happened, so the page still participates in the merge. Gateway
    /// errors (transport, upstream, auth) propagate — they are systemic
    /// and must surface on the job, not vanish into page warnings.
    pub async fn extract_page(&self, page: &PageOcr) -> Result<PageAnalysis, LlmError> {
        tracing::debug!(page = page.page_number, model = %self.model, "Structural extraction");

        if page.text.trim().is_empty() {
            let mut analysis = PageAnalysis::empty(page.page_number, "Page has no OCR text");
            analysis.warnings.extend(page.warnings.iter().cloned());
            return Ok(analysis);
        }

        let prompt = fill(STAGE_A_PROMPT, "ocr_text", &page.text);
        let reply = self
            .gateway
            .chat(
                &self.model,
                &[ChatMessage::user(prompt)],
                ChatOptions::json(STAGE_A_MAX_TOKENS),
            )
            .await?;

        let mut analysis = match parse_analysis(&reply.content, page.page_number) {
            Some(analysis) => analysis,
            None => {
                let mut analysis =
                    PageAnalysis::empty(page.page_number, "Failed to parse LLM response as JSON");
                analysis.warnings.extend(page.warnings.iter().cloned());
                return Ok(analysis);
            }
        };

        // OCR-level warnings (dropped blocks, engine comparisons) surface on
        // the page analysis so they reach the stored result.
        let mut warnings: Vec<String> = page.warnings.clone();
        warnings.append(&mut analysis.warnings);
        analysis.warnings = warnings;

        verify_numeric_values(&mut analysis, &page.text);
        verify_patient_name(&mut analysis, &page.text);

        analysis.page_number = page.page_number;
        analysis.raw_text_preview = page.text.chars().take(RAW_TEXT_PREVIEW_CHARS).collect();
        Ok(analysis)
    }
}

/// Parse a model response into a `PageAnalysis`.
pub(crate) fn parse_analysis(response: &str, page_number: usize) -> Option<PageAnalysis> {
    let value = parse_tolerant_json(response)?;
    let mut analysis: PageAnalysis = match serde_json::from_value(value) {
        Ok(analysis) => analysis,
        Err(e) => {
            warn!(page = page_number, error = %e, "Extraction JSON did not match schema");
            return None;
        }
    };
    analysis.page_number = page_number;
    analysis.extraction_confidence = normalize_confidence(analysis.extraction_confidence);
    analysis
        .findings
        .retain(|f| !f.test_name.trim().is_empty() || !f.value.trim().is_empty());
    Some(analysis)
}

fn normalize_confidence(raw: f32) -> f32 {
    if raw == 0.0 {
        // Serde default and the structural pass's fixed 0.0 are
        // indistinguishable; both mean "model reported nothing".
        DEFAULT_EXTRACTION_CONFIDENCE
    } else {
        raw.clamp(0.0, 1.0)
    }
}

/// Flag findings whose first numeric substring is absent from the page
/// text. The finding is kept — downstream consumers see the warning.
pub(crate) fn verify_numeric_values(analysis: &mut PageAnalysis, page_text: &str) {
    let mut warnings = Vec::new();
    for finding in &analysis.findings {
        if finding.value.trim().is_empty() {
            continue;
        }
        if let Some(numeric) = first_numeric_substring(&finding.value) {
            if !page_text.contains(numeric) {
                warnings.push(format!(
                    "Value '{}' for {} not found verbatim in OCR text",
                    finding.value, finding.test_name
                ));
            }
        }
    }
    analysis.warnings.extend(warnings);
}

/// Clear a patient name that cannot be matched against the page text.
pub(crate) fn verify_patient_name(analysis: &mut PageAnalysis, page_text: &str) {
    let Some(name) = analysis.patient_identity.name.clone() else {
        return;
    };
    if name.trim().is_empty() {
        analysis.patient_identity.name = None;
        return;
    }
    if !name_verified_in_text(&name, page_text) {
        analysis.patient_identity.name = None;
        analysis.warnings.push(format!(
            "Patient name '{name}' not verified in OCR text - removed to prevent hallucination"
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockChatClient;
    use crate::ocr::{OcrSource, TextBlock};

    fn page(text: &str) -> PageOcr {
        let blocks = text
            .lines()
            .map(|l| TextBlock::unpositioned(l, 0.95))
            .collect();
        PageOcr::from_blocks(1, blocks, OcrSource::Paddle, vec![])
    }

    fn gateway(response: &str) -> Arc<LlmGateway> {
        Arc::new(LlmGateway::new(Arc::new(MockChatClient::new(response)), 2))
    }

    fn lab_response() -> String {
        serde_json::json!({
            "patient_identity": {"name": "Jane Doe", "id": null, "dob": null, "gender": null, "age": null},
            "report_metadata": {"report_type": "CBC", "date": null, "lab_name": null, "referring_physician": null},
            "findings": [
                {"test_name": "Hemoglobin", "value": "13.2", "unit": "g/dL", "reference_range": "12-15", "status": null, "interpretation": null}
            ],
            "diagnosis": null,
            "recommendations": [],
            "warnings": [],
            "extraction_confidence": 0.0
        })
        .to_string()
    }

    #[tokio::test]
    async fn happy_path_extracts_findings_without_warnings() {
        let extractor = PageExtractor::new(gateway(&lab_response()), "model-a");
        let analysis = extractor
            .extract_page(&page("Patient: Jane Doe\nHemoglobin 13.2 g/dL 12-15"))
            .await
            .unwrap();

        assert_eq!(analysis.findings.len(), 1);
        assert_eq!(analysis.findings[0].test_name, "Hemoglobin");
        assert_eq!(analysis.findings[0].value, "13.2");
        assert_eq!(analysis.patient_identity.name.as_deref(), Some("Jane Doe"));
        assert!(analysis.warnings.is_empty(), "{:?}", analysis.warnings);
        assert_eq!(analysis.extraction_confidence, 0.5);
    }

    #[tokio::test]
    async fn hallucinated_name_is_cleared_with_warning() {
        let response = serde_json::json!({
            "patient_identity": {"name": "John Smith"},
            "findings": [],
            "extraction_confidence": 0.0
        })
        .to_string();
        let extractor = PageExtractor::new(gateway(&response), "model-a");
        let analysis = extractor
            .extract_page(&page("Hemoglobin 13.2 g/dL no patient block here"))
            .await
            .unwrap();

        assert_eq!(analysis.patient_identity.name, None);
        assert!(analysis.warnings.iter().any(|w| w
            == "Patient name 'John Smith' not verified in OCR text - removed to prevent hallucination"));
    }

    #[tokio::test]
    async fn unverifiable_value_is_kept_but_flagged() {
        let response = serde_json::json!({
            "findings": [
                {"test_name": "Hemoglobin", "value": "14.9", "unit": "g/dL"}
            ]
        })
        .to_string();
        let extractor = PageExtractor::new(gateway(&response), "model-a");
        let analysis = extractor
            .extract_page(&page("Hemoglobin 13.2 g/dL"))
            .await
            .unwrap();

        assert_eq!(analysis.findings.len(), 1, "finding must survive");
        assert!(analysis
            .warnings
            .iter()
            .any(|w| w.contains("'14.9' for Hemoglobin not found verbatim")));
    }

    #[tokio::test]
    async fn unparseable_response_yields_empty_analysis() {
        let extractor = PageExtractor::new(gateway("I cannot produce JSON today."), "model-a");
        let analysis = extractor
            .extract_page(&page("Hemoglobin 13.2"))
            .await
            .unwrap();

        assert!(analysis.findings.is_empty());
        assert!(analysis
            .warnings
            .contains(&"Failed to parse LLM response as JSON".to_string()));
    }

    #[tokio::test]
    async fn upstream_error_propagates_to_caller() {
        let client = MockChatClient::with_responses(vec![Err(crate::llm::LlmError::Upstream {
            status: 401,
            message: "invalid_api_key".into(),
        })]);
        let extractor = PageExtractor::new(Arc::new(LlmGateway::new(Arc::new(client), 2)), "m");
        let err = extractor
            .extract_page(&page("Hemoglobin 13.2"))
            .await
            .unwrap_err();

        assert!(matches!(err, LlmError::Upstream { status: 401, .. }));
    }

    #[tokio::test]
    async fn empty_page_short_circuits_without_llm_call() {
        let client = Arc::new(MockChatClient::new("{}"));
        let extractor =
            PageExtractor::new(Arc::new(LlmGateway::new(client.clone(), 2)), "model-a");
        let analysis = extractor.extract_page(&page("")).await.unwrap();

        assert_eq!(client.call_count(), 0);
        assert!(analysis.warnings.contains(&"Page has no OCR text".to_string()));
    }

    #[tokio::test]
    async fn ocr_warnings_are_carried_onto_analysis() {
        let mut ocr_page = page("Hemoglobin 13.2 g/dL");
        ocr_page.warnings.push("Dropped low-confidence block (0.30): 'smudge'".into());
        let response = serde_json::json!({"findings": []}).to_string();
        let extractor = PageExtractor::new(gateway(&response), "model-a");
        let analysis = extractor.extract_page(&ocr_page).await.unwrap();

        assert!(analysis
            .warnings
            .iter()
            .any(|w| w.contains("Dropped low-confidence block")));
    }

    #[tokio::test]
    async fn fenced_response_is_parsed() {
        let fenced = format!("```json\n{}\n```", lab_response());
        let extractor = PageExtractor::new(gateway(&fenced), "model-a");
        let analysis = extractor
            .extract_page(&page("Patient: Jane Doe\nHemoglobin 13.2 g/dL 12-15"))
            .await
            .unwrap();
        assert_eq!(analysis.findings.len(), 1);
    }

    #[test]
    fn model_reported_confidence_is_clamped() {
        let response = serde_json::json!({"findings": [], "extraction_confidence": 3.5}).to_string();
        let analysis = parse_analysis(&response, 1).unwrap();
        assert_eq!(analysis.extraction_confidence, 1.0);
    }

    #[test]
    fn blank_findings_are_dropped_at_parse() {
        let response = serde_json::json!({
            "findings": [
                {"test_name": "", "value": ""},
                {"test_name": "WBC", "value": "7200"}
            ]
        })
        .to_string();
        let analysis = parse_analysis(&response, 1).unwrap();
        assert_eq!(analysis.findings.len(), 1);
    }

    #[test]
    fn raw_preview_is_capped() {
        // Exercised through extract_page in async tests; the cap itself:
        let text: String = "x".repeat(500);
        let preview: String = text.chars().take(RAW_TEXT_PREVIEW_CHARS).collect();
        assert_eq!(preview.len(), 200);
    }
}
