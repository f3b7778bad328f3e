//! Clinical intelligence compiler: reorganizes already-extracted findings
//! into a medical timeline grouped by date and domain.
//!
//! One LLM call with hard constraints — grouping and renaming only, never
//! re-evaluation. Degrades to an empty timeline with a warning when the
//! model response is unusable.

use std::sync::Arc;

use serde_json::json;
use tracing::warn;

use crate::llm::{parse_tolerant_json, ChatMessage, ChatOptions, LlmError, LlmGateway};

use crate::extraction::prompts::fill;

use super::prompts::TIMELINE_PROMPT;

const TIMELINE_MAX_TOKENS: u32 = 4096;

#[derive(Debug, Clone, serde::Serialize)]
pub struct TimelineResult {
    pub timeline: serde_json::Value,
    pub warnings: Vec<String>,
}

pub struct TimelineCompiler {
    gateway: Arc<LlmGateway>,
    model: String,
}

impl TimelineCompiler {
    pub fn new(gateway: Arc<LlmGateway>, model: &str) -> Self {
        Self {
            gateway,
            model: model.to_string(),
        }
    }

    /// Compile structured findings into a timeline view.
    pub async fn compile(&self, findings_json: &str) -> Result<TimelineResult, LlmError> {
        let prompt = fill(TIMELINE_PROMPT, "findings_json", findings_json);
        let reply = self
            .gateway
            .chat(
                &self.model,
                &[ChatMessage::user(prompt)],
                ChatOptions::json(TIMELINE_MAX_TOKENS),
            )
            .await?;

        match parse_tolerant_json(&reply.content) {
            Some(value) => {
                let warnings = value
                    .get("warnings")
                    .and_then(|w| w.as_array())
                    .map(|items| {
                        items
                            .iter()
                            .filter_map(|i| i.as_str().map(str::to_string))
                            .collect()
                    })
                    .unwrap_or_default();
                Ok(TimelineResult {
                    timeline: value.get("timeline").cloned().unwrap_or(json!([])),
                    warnings,
                })
            }
            None => {
                warn!("Timeline compiler returned no usable JSON");
                Ok(TimelineResult {
                    timeline: json!([]),
                    warnings: vec!["Timeline structuring failed to produce valid JSON".into()],
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockChatClient;

    #[tokio::test]
    async fn compiles_timeline_from_response() {
        let response = json!({
            "timeline": [
                {"date": "2026-07-01", "domain": "Hematology",
                 "entries": [{"name": "Hemoglobin", "value": "13.2", "unit": "g/dL", "reference_range": "12-15"}]}
            ],
            "warnings": []
        })
        .to_string();
        let compiler = TimelineCompiler::new(
            Arc::new(LlmGateway::new(Arc::new(MockChatClient::new(&response)), 2)),
            "test-model",
        );

        let result = compiler.compile(r#"{"findings": []}"#).await.unwrap();
        assert_eq!(result.timeline[0]["domain"], "Hematology");
        assert!(result.warnings.is_empty());
    }

    #[tokio::test]
    async fn unusable_response_degrades_with_warning() {
        let compiler = TimelineCompiler::new(
            Arc::new(LlmGateway::new(Arc::new(MockChatClient::new("nope")), 2)),
            "test-model",
        );
        let result = compiler.compile("{}").await.unwrap();
        assert!(result.timeline.as_array().unwrap().is_empty());
        assert_eq!(result.warnings.len(), 1);
    }

    #[tokio::test]
    async fn llm_errors_propagate() {
        let compiler = TimelineCompiler::new(
            Arc::new(LlmGateway::new(
                Arc::new(MockChatClient::with_responses(vec![Err(LlmError::Timeout(120))])),
                2,
            )),
            "test-model",
        );
        assert!(compiler.compile("{}").await.is_err());
    }
}
