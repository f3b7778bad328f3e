//! Route table for the job and diagnostics APIs.

use std::sync::Arc;

use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::CorsLayer;

use crate::runtime::Runtime;

use super::{analysis, board, diagnostics};

pub fn build_router(runtime: Arc<Runtime>) -> Router {
    Router::new()
        // Document analysis jobs
        .route("/api/ai-analysis", post(analysis::submit))
        .route("/api/ai-analysis/job/:job_id", get(analysis::job_status))
        .route(
            "/api/ai-analysis/patient/:patient_id",
            get(analysis::patient_status),
        )
        .route(
            "/api/ai-analysis/patient/:patient_id/cancel",
            post(analysis::cancel),
        )
        // Tumor board cases
        .route("/api/tumor-board-ai", post(board::submit))
        .route("/api/tumor-board-ai/job/:job_id", get(board::job_status))
        .route("/api/tumor-board-ai/job/:job_id/retry", post(board::retry))
        .route("/api/tumor-board-ai/job/:job_id", delete(board::soft_delete))
        .route(
            "/api/tumor-board-ai/patient/:patient_id/cancel",
            post(board::cancel),
        )
        .route("/api/tumor-board-ai/compile", post(board::compile_timeline))
        // Remote OCR diagnostics
        .route("/api/azure/ping", get(diagnostics::ping))
        .route("/api/azure/check-config", get(diagnostics::check_config))
        .route("/api/azure/test-connection", get(diagnostics::test_connection))
        .route("/api/azure/health", get(diagnostics::health))
        .layer(CorsLayer::permissive())
        .with_state(runtime)
}
