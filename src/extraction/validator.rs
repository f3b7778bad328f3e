//! Validation and filtering pass: re-prompts the model with the OCR text
//! and the structural extraction, asking it to remove anything not
//! explicitly present in the source.
//!
//! A response that parses is authoritative — even one that removes every
//! finding, since that is the filter doing its job. A response that fails
//! to parse falls back to the structural result unchanged.

use std::sync::Arc;

use tracing::warn;

use crate::llm::{ChatMessage, ChatOptions, LlmGateway};
use crate::ocr::PageOcr;

use super::extractor::{parse_analysis, verify_numeric_values, verify_patient_name};
use super::prompts::{fill, STAGE_B_PROMPT};
use super::types::PageAnalysis;

const STAGE_B_MAX_TOKENS: u32 = 4096;

pub struct PageValidator {
    gateway: Arc<LlmGateway>,
    model: String,
}

impl PageValidator {
    pub fn new(gateway: Arc<LlmGateway>, model: &str) -> Self {
        Self {
            gateway,
            model: model.to_string(),
        }
    }

    /// Run the filtering pass over a structural extraction.
    pub async fn validate(&self, page: &PageOcr, stage_a: &PageAnalysis) -> PageAnalysis {
        tracing::debug!(page = page.page_number, model = %self.model, "Validation pass");

        let stage_a_json = match serde_json::to_string_pretty(stage_a) {
            Ok(json) => json,
            Err(e) => {
                warn!(page = page.page_number, error = %e, "Could not serialize extraction for validation");
                return stage_a.clone();
            }
        };

        let prompt = fill(
            &fill(STAGE_B_PROMPT, "ocr_text", &page.text),
            "stage_a_json",
            &stage_a_json,
        );

        let reply = match self
            .gateway
            .chat(
                &self.model,
                &[ChatMessage::user(prompt)],
                ChatOptions::json(STAGE_B_MAX_TOKENS),
            )
            .await
        {
            Ok(reply) => reply,
            Err(e) => {
                warn!(page = page.page_number, error = %e, "Validation call failed; keeping extraction result");
                return stage_a.clone();
            }
        };

        let Some(mut validated) = parse_analysis(&reply.content, page.page_number) else {
            warn!(
                page = page.page_number,
                "Validation response unparseable; keeping extraction result"
            );
            return stage_a.clone();
        };

        // Warnings accumulated by OCR and the structural pass survive the
        // filter; the filter's own warnings append after them.
        let mut warnings = stage_a.warnings.clone();
        warnings.append(&mut validated.warnings);
        validated.warnings = warnings;

        verify_numeric_values(&mut validated, &page.text);
        verify_patient_name(&mut validated, &page.text);

        validated.page_number = stage_a.page_number;
        validated.raw_text_preview = stage_a.raw_text_preview.clone();
        validated
    }
}
