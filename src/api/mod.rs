//! HTTP surface: job submission/status/cancel endpoints for both
//! pipelines, the timeline compiler endpoint, and the remote-OCR
//! diagnostics.

pub mod analysis;
pub mod board;
pub mod diagnostics;
pub mod error;
pub mod router;
pub mod types;

pub use error::ApiError;
pub use router::build_router;
