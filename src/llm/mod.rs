//! LLM gateway: one uniform chat call shared by the extraction passes and
//! the tumor board agents, plus the single tolerant JSON parser every LLM
//! consumer goes through.

pub mod gateway;
pub mod json_utils;

pub use gateway::{
    map_upstream_error, ChatClient, ChatMessage, ChatOptions, ChatReply, GroqClient, LlmGateway,
    MockChatClient,
};
pub use json_utils::parse_tolerant_json;

/// Errors from the LLM gateway.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("LLM transport error: {0}")]
    Transport(String),

    #[error("LLM upstream error (HTTP {status}): {message}")]
    Upstream { status: u16, message: String },

    #[error("LLM request timed out after {0}s")]
    Timeout(u64),

    #[error("LLM API key not configured")]
    MissingApiKey,

    #[error("LLM response missing choices")]
    EmptyResponse,
}
