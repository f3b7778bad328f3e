//! Per-patient document analysis: fans out across a patient's uploaded
//! reports, runs the two-stage extraction over every page, and lands the
//! merged results on the job record.

pub mod runner;

pub use runner::{AnalysisResultPayload, AnalysisRunner, ReportResult, ReportStatus};
