//! Base contract shared by every board agent.
//!
//! An agent is a prompt builder plus a response parser. The shared `run`
//! flow calls the gateway in JSON mode at low temperature, parses
//! tolerantly, and turns every failure into an `AgentOutput` with
//! `success = false` — an agent never takes the board down with it.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tracing::warn;

use crate::llm::{parse_tolerant_json, ChatMessage, ChatOptions, LlmGateway};

use super::types::{AgentContext, AgentOutput, AgentType, ConfidenceLevel, SpecialistFinding};

const AGENT_MAX_TOKENS: u32 = 2048;

/// Hard ceiling per agent invocation; slow agents surface as failures,
/// never as hung jobs.
pub const AGENT_TIMEOUT: Duration = Duration::from_secs(120);

/// A specialized board agent: deterministic prompt, tolerant parser.
#[async_trait]
pub trait SpecialistAgent: Send + Sync {
    fn agent_type(&self) -> AgentType;
    fn agent_name(&self) -> &'static str;
    fn model(&self) -> &str;

    /// Build the prompt for this agent from the context.
    fn build_prompt(&self, context: &AgentContext) -> String;

    /// Parse the model response into an output. `None` means the response
    /// held no usable JSON.
    fn parse_response(&self, response: &str, context: &AgentContext) -> Option<AgentOutput>;

    /// Run the full analysis flow. Default implementation; agents only
    /// override `build_prompt` and `parse_response`.
    async fn analyze(&self, gateway: &Arc<LlmGateway>, context: &AgentContext) -> AgentOutput {
        let start = std::time::Instant::now();
        let prompt = self.build_prompt(context);

        let messages = [ChatMessage::user(prompt)];
        let call = gateway.chat(
            self.model(),
            &messages,
            ChatOptions::json(AGENT_MAX_TOKENS),
        );
        let reply = match tokio::time::timeout(AGENT_TIMEOUT, call).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(e)) => {
                warn!(agent = self.agent_name(), error = %e, "Agent LLM call failed");
                return self.finish(
                    AgentOutput::failure(self.agent_type(), self.agent_name(), e.to_string()),
                    context,
                    start,
                );
            }
            Err(_) => {
                warn!(agent = self.agent_name(), "Agent timed out");
                return self.finish(
                    AgentOutput::failure(
                        self.agent_type(),
                        self.agent_name(),
                        format!("Agent timed out after {}s", AGENT_TIMEOUT.as_secs()),
                    ),
                    context,
                    start,
                );
            }
        };

        let output = match self.parse_response(&reply.content, context) {
            Some(output) => output,
            None => AgentOutput::failure(
                self.agent_type(),
                self.agent_name(),
                "Failed to parse JSON response",
            ),
        };
        self.finish(output, context, start)
    }

    /// Stamp shared metadata and sanity warnings onto an output.
    fn finish(
        &self,
        mut output: AgentOutput,
        context: &AgentContext,
        start: std::time::Instant,
    ) -> AgentOutput {
        output.agent_type = self.agent_type();
        output.agent_name = self.agent_name().to_string();
        output.timestamp = Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
        output.patient_id = context.patient_id.clone();
        output.processing_time_ms = start.elapsed().as_millis() as u64;
        let sanity = validate_output(&output);
        output.warnings.extend(sanity);
        output
    }
}

/// Flag outputs that pass parsing but look clinically suspicious.
pub fn validate_output(output: &AgentOutput) -> Vec<String> {
    let mut warnings = Vec::new();
    if output.success && output.findings.is_empty() && output.agent_type != AgentType::Research {
        warnings.push(format!(
            "{}: No findings extracted despite success",
            output.agent_name
        ));
    }
    if output.success && output.confidence == ConfidenceLevel::None {
        warnings.push(format!(
            "{}: Success but zero confidence - suspicious",
            output.agent_name
        ));
    }
    warnings
}

/// Overall output confidence from per-finding confidence: high when at
/// least 70% of findings are high-confidence, low when there are none.
pub fn overall_confidence(findings: &[SpecialistFinding]) -> ConfidenceLevel {
    if findings.is_empty() {
        return ConfidenceLevel::Low;
    }
    let high = findings
        .iter()
        .filter(|f| f.confidence == ConfidenceLevel::High)
        .count();
    if high * 10 >= findings.len() * 7 {
        ConfidenceLevel::High
    } else {
        ConfidenceLevel::Medium
    }
}

/// Shared tolerant-parse entry for agent responses.
pub fn parse_agent_json(response: &str) -> Option<serde_json::Value> {
    parse_tolerant_json(response)
}

/// Read a string field from a JSON object, empty-safe.
pub fn str_field(value: &serde_json::Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Read a string array field from a JSON object.
pub fn string_list(value: &serde_json::Value, key: &str) -> Vec<String> {
    value
        .get(key)
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.as_str())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Recommendation items may be plain strings or `{text, ...}` objects.
pub fn rec_text(item: &serde_json::Value) -> Option<String> {
    if let Some(s) = item.as_str() {
        return Some(s.to_string());
    }
    str_field(item, "text")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockChatClient;

    struct EchoAgent;

    #[async_trait]
    impl SpecialistAgent for EchoAgent {
        fn agent_type(&self) -> AgentType {
            AgentType::Clinical
        }
        fn agent_name(&self) -> &'static str {
            "Echo Agent"
        }
        fn model(&self) -> &str {
            "test-model"
        }
        fn build_prompt(&self, context: &AgentContext) -> String {
            format!("analyze: {}", context.report_text)
        }
        fn parse_response(&self, response: &str, _context: &AgentContext) -> Option<AgentOutput> {
            let data = parse_agent_json(response)?;
            let mut output = AgentOutput::empty(AgentType::Clinical, "Echo Agent");
            if let Some(summary) = str_field(&data, "summary") {
                output.summary = summary;
                output.findings.push(SpecialistFinding::new(
                    "summary",
                    "echo",
                    "present",
                ));
            }
            Some(output)
        }
    }

    fn gateway(client: MockChatClient) -> Arc<LlmGateway> {
        Arc::new(LlmGateway::new(Arc::new(client), 2))
    }

    #[tokio::test]
    async fn analyze_stamps_metadata() {
        let agent = EchoAgent;
        let gw = gateway(MockChatClient::new(r#"{"summary": "all good"}"#));
        let context = AgentContext {
            patient_id: "p-1".into(),
            report_text: "text".into(),
            ..Default::default()
        };
        let output = agent.analyze(&gw, &context).await;
        assert!(output.success);
        assert_eq!(output.agent_name, "Echo Agent");
        assert_eq!(output.patient_id, "p-1");
        assert!(!output.timestamp.is_empty());
        assert_eq!(output.summary, "all good");
    }

    #[tokio::test]
    async fn unparseable_response_becomes_failure_output() {
        let agent = EchoAgent;
        let gw = gateway(MockChatClient::new("no json here"));
        let output = agent.analyze(&gw, &AgentContext::default()).await;
        assert!(!output.success);
        assert_eq!(output.confidence, ConfidenceLevel::None);
        assert_eq!(output.error.as_deref(), Some("Failed to parse JSON response"));
    }

    #[tokio::test]
    async fn llm_error_becomes_failure_output() {
        let agent = EchoAgent;
        let gw = gateway(MockChatClient::with_responses(vec![Err(
            crate::llm::LlmError::Timeout(120),
        )]));
        let output = agent.analyze(&gw, &AgentContext::default()).await;
        assert!(!output.success);
        assert!(output.error.unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn success_without_findings_is_flagged() {
        let agent = EchoAgent;
        let gw = gateway(MockChatClient::new(r#"{"nothing": true}"#));
        let output = agent.analyze(&gw, &AgentContext::default()).await;
        assert!(output.success);
        assert!(output
            .warnings
            .iter()
            .any(|w| w.contains("No findings extracted despite success")));
    }

    #[test]
    fn overall_confidence_tiers() {
        assert_eq!(overall_confidence(&[]), ConfidenceLevel::Low);

        let mut findings: Vec<SpecialistFinding> = (0..10)
            .map(|i| {
                let mut f = SpecialistFinding::new("lab", format!("t{i}"), "v");
                f.confidence = if i < 7 {
                    ConfidenceLevel::High
                } else {
                    ConfidenceLevel::Medium
                };
                f
            })
            .collect();
        assert_eq!(overall_confidence(&findings), ConfidenceLevel::High);

        findings[0].confidence = ConfidenceLevel::Low;
        assert_eq!(overall_confidence(&findings), ConfidenceLevel::Medium);
    }

    #[test]
    fn rec_text_accepts_both_shapes() {
        assert_eq!(
            rec_text(&serde_json::json!("follow up in 2 weeks")).as_deref(),
            Some("follow up in 2 weeks")
        );
        assert_eq!(
            rec_text(&serde_json::json!({"text": "order MRI", "rationale": "staging"})).as_deref(),
            Some("order MRI")
        );
        assert_eq!(rec_text(&serde_json::json!({"rationale": "only"})), None);
    }
}
