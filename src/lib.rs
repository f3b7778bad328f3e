//! Oncoboard: medical document understanding and tumor board synthesis.
//!
//! Two coupled pipelines over a shared concurrency substrate and job
//! store:
//!
//! - **Document understanding**: per-page OCR with dual-layer engine
//!   selection, a structural LLM extraction pass, deterministic
//!   verification that conditionally skips the validation pass, and a
//!   cross-page merger with conflict detection.
//! - **Tumor board**: a phased specialist-agent plan (parallel fan-out,
//!   dependent research stage, local coordinator synthesis) gated by
//!   evidence-based clinical validation and data cleaning.
//!
//! Both run as persisted background jobs with cooperative cancellation;
//! the HTTP layer only submits and projects.

pub mod analysis;
pub mod api;
pub mod board;
pub mod config;
pub mod extraction;
pub mod jobs;
pub mod llm;
pub mod ocr;
pub mod runtime;
