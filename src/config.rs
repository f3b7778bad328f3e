//! Application settings loaded from environment variables.
//!
//! Every knob has a default so a bare process comes up in a usable
//! local configuration. `.env` loading happens in `main` before this
//! module reads the environment.

use std::env;

pub const APP_NAME: &str = "Oncoboard";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Fallback trigger for the secondary OCR engine: pages whose mean block
/// confidence falls below this run the remote engine (hybrid mode).
pub const OCR_FALLBACK_THRESHOLD: f32 = 0.75;

/// Which OCR engines participate in page extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OcrEnginePreference {
    /// Local engine only.
    Paddle,
    /// Remote engine only (bypasses the local pass).
    Azure,
    /// Local first, remote as a conditional fallback.
    Hybrid,
}

impl OcrEnginePreference {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Paddle => "paddle",
            Self::Azure => "azure",
            Self::Hybrid => "hybrid",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "paddle" => Some(Self::Paddle),
            "azure" => Some(Self::Azure),
            "hybrid" => Some(Self::Hybrid),
            _ => None,
        }
    }
}

/// Model routing for the two extraction passes and the board agents.
#[derive(Debug, Clone)]
pub struct ModelSettings {
    /// Stage-A structural extraction model.
    pub llm_a: String,
    /// Stage-B validation/filtering model.
    pub llm_b: String,
    /// Unified timeline-structuring model.
    pub tumor_board: String,
    /// Default model for all specialist agents.
    pub tumor_agents: String,
    pub radiology_agent: Option<String>,
    pub pathology_agent: Option<String>,
    pub clinical_agent: Option<String>,
    pub research_agent: Option<String>,
    pub coordinator_agent: Option<String>,
}

impl ModelSettings {
    pub fn radiology(&self) -> &str {
        self.radiology_agent.as_deref().unwrap_or(&self.tumor_agents)
    }

    pub fn pathology(&self) -> &str {
        self.pathology_agent.as_deref().unwrap_or(&self.tumor_agents)
    }

    pub fn clinical(&self) -> &str {
        self.clinical_agent.as_deref().unwrap_or(&self.tumor_agents)
    }

    pub fn research(&self) -> &str {
        self.research_agent.as_deref().unwrap_or(&self.tumor_agents)
    }

    pub fn coordinator(&self) -> &str {
        self.coordinator_agent.as_deref().unwrap_or(&self.tumor_agents)
    }
}

/// Complete application settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    pub database_path: String,

    pub models: ModelSettings,
    pub groq_api_key: Option<String>,

    /// Blocks below this confidence are dropped with a warning.
    pub ocr_min_confidence: f32,
    /// PDF pages render at most at this DPI.
    pub ocr_max_dpi: u32,
    pub ocr_cache_max_size: usize,
    pub ocr_engine: OcrEnginePreference,

    /// Fraction of unverified findings that triggers the Stage-B pass.
    pub llm_b_skip_threshold: f32,

    pub max_concurrent_llm: usize,
    pub max_ocr_workers: usize,

    pub seconds_per_page: u64,
    pub seconds_per_report: u64,
    pub tumor_board_max_agents: usize,

    pub azure_doc_endpoint: Option<String>,
    pub azure_doc_key: Option<String>,
    pub azure_agent_endpoint: Option<String>,
    pub azure_agent_key: Option<String>,
    pub azure_orchestration_enabled: bool,
}

impl Settings {
    /// Load settings from the process environment, falling back to defaults.
    pub fn from_env() -> Self {
        Self {
            host: env_string("HOST", "0.0.0.0"),
            port: env_parse("PORT", 8000),
            database_path: env_string("DATABASE_PATH", "oncoboard.db"),
            models: ModelSettings {
                llm_a: env_string("LLM_A_MODEL", "llama-3.3-70b-versatile"),
                llm_b: env_string("LLM_B_MODEL", "llama-3.3-70b-versatile"),
                tumor_board: env_string("TUMOR_BOARD_MODEL", "llama-3.3-70b-versatile"),
                tumor_agents: env_string("TUMOR_AGENTS_MODEL", "llama-3.1-8b-instant"),
                radiology_agent: env_optional("RADIOLOGY_AGENT_MODEL"),
                pathology_agent: env_optional("PATHOLOGY_AGENT_MODEL"),
                clinical_agent: env_optional("CLINICAL_AGENT_MODEL"),
                research_agent: env_optional("RESEARCH_AGENT_MODEL"),
                coordinator_agent: env_optional("COORDINATOR_AGENT_MODEL"),
            },
            groq_api_key: env_optional("GROQ_API_KEY"),
            ocr_min_confidence: env_parse("OCR_MIN_CONFIDENCE", 0.6),
            ocr_max_dpi: env_parse::<u32>("OCR_MAX_DPI", 300).min(300),
            ocr_cache_max_size: env_parse("OCR_CACHE_MAX_SIZE", 32),
            ocr_engine: env_optional("OCR_ENGINE")
                .and_then(|s| OcrEnginePreference::from_str(&s))
                .unwrap_or(OcrEnginePreference::Hybrid),
            llm_b_skip_threshold: env_parse("LLM_B_SKIP_THRESHOLD", 0.2),
            max_concurrent_llm: env_parse("MAX_CONCURRENT_LLM", 2),
            max_ocr_workers: env_parse("MAX_OCR_WORKERS", 4),
            seconds_per_page: env_parse("SECONDS_PER_PAGE", 60),
            seconds_per_report: env_parse("SECONDS_PER_REPORT", 300),
            tumor_board_max_agents: env_parse("TUMOR_BOARD_MAX_AGENTS", 3),
            azure_doc_endpoint: env_optional("AZURE_DOC_INTELLIGENCE_ENDPOINT"),
            azure_doc_key: env_optional("AZURE_DOC_INTELLIGENCE_KEY"),
            azure_agent_endpoint: env_optional("AZURE_AI_AGENT_ENDPOINT"),
            azure_agent_key: env_optional("AZURE_AI_AGENT_KEY"),
            azure_orchestration_enabled: env_parse_bool("AZURE_AGENT_ORCHESTRATION_ENABLED", false),
        }
    }

    /// Whether the secondary OCR engine has usable credentials.
    pub fn azure_ocr_configured(&self) -> bool {
        matches!(&self.azure_doc_endpoint, Some(e) if e.len() > 10)
            && matches!(&self.azure_doc_key, Some(k) if k.len() > 10)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8000,
            database_path: "oncoboard.db".into(),
            models: ModelSettings {
                llm_a: "llama-3.3-70b-versatile".into(),
                llm_b: "llama-3.3-70b-versatile".into(),
                tumor_board: "llama-3.3-70b-versatile".into(),
                tumor_agents: "llama-3.1-8b-instant".into(),
                radiology_agent: None,
                pathology_agent: None,
                clinical_agent: None,
                research_agent: None,
                coordinator_agent: None,
            },
            groq_api_key: None,
            ocr_min_confidence: 0.6,
            ocr_max_dpi: 300,
            ocr_cache_max_size: 32,
            ocr_engine: OcrEnginePreference::Hybrid,
            llm_b_skip_threshold: 0.2,
            max_concurrent_llm: 2,
            max_ocr_workers: 4,
            seconds_per_page: 60,
            seconds_per_report: 300,
            tumor_board_max_agents: 3,
            azure_doc_endpoint: None,
            azure_doc_key: None,
            azure_agent_endpoint: None,
            azure_agent_key: None,
            azure_orchestration_enabled: false,
        }
    }
}

fn env_string(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_parse_bool(key: &str, default: bool) -> bool {
    env::var(key)
        .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(default)
}
