//! Tumor board orchestration: specialist agents, the coordinator, clinical
//! validation and data cleaning, and the phased runner that ties them to
//! the job store.

pub mod agent;
pub mod cleaner;
pub mod clinical;
pub mod confidence;
pub mod coordinator;
pub mod intake;
pub mod orchestration;
pub mod pathology;
pub mod prompts;
pub mod radiology;
pub mod research;
pub mod runner;
pub mod timeline;
pub mod types;
pub mod validation;

pub use runner::TumorBoardRunner;
pub use types::{AgentContext, AgentOutput, AgentType, ConfidenceLevel, SeverityLevel, TumorBoardView};
