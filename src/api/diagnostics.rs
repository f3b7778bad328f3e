//! Remote-OCR diagnostics: configuration checks and a lightweight
//! connectivity probe. Diagnostics never touch the pipeline; they only
//! report on the conditional-fallback engine's readiness.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde_json::json;

use crate::runtime::Runtime;

fn preview(value: Option<&str>, take: usize) -> String {
    match value {
        Some(v) if v.len() > 10 => {
            let head: String = v.chars().take(take).collect();
            format!("{head}...")
        }
        _ => "NOT SET".to_string(),
    }
}

pub async fn ping() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "message": "Remote OCR diagnostics router is running",
    }))
}

/// Report whether remote-OCR credentials are configured.
pub async fn check_config(State(runtime): State<Arc<Runtime>>) -> Json<serde_json::Value> {
    let settings = &runtime.settings;
    let endpoint_ok = settings
        .azure_doc_endpoint
        .as_deref()
        .is_some_and(|e| e.len() > 10);
    let key_ok = settings.azure_doc_key.as_deref().is_some_and(|k| k.len() > 10);
    let configured = endpoint_ok && key_ok;

    Json(json!({
        "status": if configured { "ok" } else { "warning" },
        "endpoint_configured": endpoint_ok,
        "endpoint_preview": preview(settings.azure_doc_endpoint.as_deref(), 30),
        "key_configured": key_ok,
        "key_preview": preview(settings.azure_doc_key.as_deref(), 8),
        "message": if configured {
            "Remote document intelligence is configured"
        } else {
            "Missing remote OCR credentials in environment"
        },
    }))
}

/// Probe the remote service's info endpoint.
pub async fn test_connection(State(runtime): State<Arc<Runtime>>) -> Json<serde_json::Value> {
    let Some(client) = runtime.azure_probe_client() else {
        return Json(json!({
            "status": "error",
            "message": "Remote OCR credentials not configured",
            "error": "Set AZURE_DOC_INTELLIGENCE_ENDPOINT and AZURE_DOC_INTELLIGENCE_KEY",
        }));
    };

    let probe = client.probe().await;
    let status = if !probe.reachable {
        "error"
    } else if probe.error.is_none() {
        "ok"
    } else if !probe.authenticated {
        "error"
    } else {
        "warning"
    };

    Json(json!({
        "status": status,
        "message": match status {
            "ok" => "Remote document intelligence API is reachable",
            "warning" => "Endpoint reached with a non-success response; API may still work",
            _ => "Could not verify remote document intelligence API",
        },
        "api_reachable": probe.reachable,
        "response_time_ms": probe.response_time_ms,
        "error": probe.error,
    }))
}

/// Combined configuration + connectivity report.
pub async fn health(State(runtime): State<Arc<Runtime>>) -> Json<serde_json::Value> {
    let config = check_config(State(runtime.clone())).await.0;
    let connection = test_connection(State(runtime)).await.0;

    let overall = if connection["status"] == "error" {
        "error"
    } else if config["status"] != "ok" {
        "warning"
    } else {
        "ok"
    };

    Json(json!({
        "overall_status": overall,
        "configuration": config,
        "connectivity": connection,
        "usage_note": "The remote read engine is a CONDITIONAL fallback used when local OCR confidence is low.",
    }))
}
