//! Remote OCR engine: Azure AI Document Intelligence "read" model.
//!
//! Submit-and-poll protocol: POST the page bytes, receive `202` with an
//! `Operation-Location` header, then poll at 1 Hz until the operation
//! reports `succeeded` or `failed`, capped at 30 polls.
//!
//! The remote engine is a conditional fallback. Any failure — missing
//! credentials, transport errors, analysis failure, poll exhaustion —
//! degrades to an empty block list at the call site; it never fails a page.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use super::types::TextBlock;
use super::OcrError;

const API_VERSION: &str = "2024-11-30";
const MAX_POLLS: usize = 30;

/// The read model reports per-word confidence but not per-line; lines are
/// assigned this fixed confidence, which in practice matches the service's
/// typical word scores.
const REMOTE_BLOCK_CONFIDENCE: f32 = 0.9;

/// Remote text-block engine seam.
#[async_trait]
pub trait RemoteOcrEngine: Send + Sync {
    /// Recognize text blocks in one encoded page image.
    async fn read_page(&self, image_bytes: &[u8]) -> Result<Vec<TextBlock>, OcrError>;
}

// ──────────────────────────────────────────────
// Wire format
// ──────────────────────────────────────────────

#[derive(Deserialize)]
struct OperationResult {
    status: String,
    #[serde(rename = "analyzeResult")]
    analyze_result: Option<AnalyzeResult>,
    error: Option<OperationError>,
}

#[derive(Deserialize)]
struct OperationError {
    message: Option<String>,
}

#[derive(Deserialize)]
struct AnalyzeResult {
    #[serde(default)]
    pages: Vec<ReadPage>,
}

#[derive(Deserialize)]
struct ReadPage {
    #[serde(default)]
    lines: Vec<ReadLine>,
}

#[derive(Deserialize)]
struct ReadLine {
    content: String,
    #[serde(default)]
    polygon: Vec<f32>,
}

/// Normalize the service's 8-coordinate polygon to the 4-point bbox format
/// shared with the local engine. Short or missing polygons degrade to a
/// zero box.
fn polygon_to_bbox(polygon: &[f32]) -> [[f32; 2]; 4] {
    let mut bbox = [[0.0f32; 2]; 4];
    for (i, corner) in bbox.iter_mut().enumerate() {
        let x = polygon.get(i * 2).copied().unwrap_or(0.0);
        let y = polygon.get(i * 2 + 1).copied().unwrap_or(0.0);
        *corner = [x, y];
    }
    bbox
}

// ──────────────────────────────────────────────
// Connectivity probe (diagnostics)
// ──────────────────────────────────────────────

/// Outcome of a lightweight connectivity probe for the diagnostics surface.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ServiceProbe {
    pub reachable: bool,
    pub authenticated: bool,
    pub response_time_ms: Option<f64>,
    pub error: Option<String>,
}

// ──────────────────────────────────────────────
// AzureReadClient
// ──────────────────────────────────────────────

/// Client for the Document Intelligence read model.
pub struct AzureReadClient {
    http: reqwest::Client,
    endpoint: String,
    key: String,
    poll_interval: Duration,
}

impl AzureReadClient {
    pub fn new(endpoint: &str, key: &str) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(60))
                .build()
                .unwrap_or_default(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            key: key.to_string(),
            poll_interval: Duration::from_secs(1),
        }
    }

    fn analyze_url(&self) -> String {
        format!(
            "{}/documentintelligence/documentModels/prebuilt-read:analyze?api-version={API_VERSION}",
            self.endpoint
        )
    }

    /// Probe the service info endpoint. Never fails the pipeline; used by
    /// the diagnostics API.
    pub async fn probe(&self) -> ServiceProbe {
        let url = format!(
            "{}/documentintelligence/info?api-version={API_VERSION}",
            self.endpoint
        );
        let start = std::time::Instant::now();
        let response = self
            .http
            .get(&url)
            .header("Ocp-Apim-Subscription-Key", &self.key)
            .timeout(Duration::from_secs(10))
            .send()
            .await;
        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;

        match response {
            Ok(resp) => {
                let status = resp.status().as_u16();
                ServiceProbe {
                    reachable: true,
                    authenticated: status != 401,
                    response_time_ms: Some((elapsed_ms * 100.0).round() / 100.0),
                    error: match status {
                        200 => None,
                        401 => Some("HTTP 401: Invalid or expired API key".into()),
                        404 => Some("HTTP 404: Info endpoint not available".into()),
                        other => Some(format!("HTTP {other}")),
                    },
                }
            }
            Err(e) if e.is_timeout() => ServiceProbe {
                reachable: false,
                authenticated: false,
                response_time_ms: None,
                error: Some("Request timed out after 10 seconds".into()),
            },
            Err(e) => ServiceProbe {
                reachable: false,
                authenticated: false,
                response_time_ms: None,
                error: Some(format!("Connection error: {e}")),
            },
        }
    }

    async fn submit(&self, image_bytes: &[u8]) -> Result<String, OcrError> {
        let response = self
            .http
            .post(self.analyze_url())
            .header("Ocp-Apim-Subscription-Key", &self.key)
            .header("Content-Type", "application/octet-stream")
            .body(image_bytes.to_vec())
            .send()
            .await
            .map_err(|e| OcrError::EngineFailure(format!("remote OCR submit: {e}")))?;

        if response.status().as_u16() != 202 {
            return Err(OcrError::EngineFailure(format!(
                "remote OCR submit returned HTTP {}",
                response.status()
            )));
        }

        response
            .headers()
            .get("Operation-Location")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| OcrError::EngineFailure("missing Operation-Location header".into()))
    }

    async fn poll(&self, operation_location: &str) -> Result<Vec<TextBlock>, OcrError> {
        for _ in 0..MAX_POLLS {
            tokio::time::sleep(self.poll_interval).await;

            let result: OperationResult = self
                .http
                .get(operation_location)
                .header("Ocp-Apim-Subscription-Key", &self.key)
                .send()
                .await
                .map_err(|e| OcrError::EngineFailure(format!("remote OCR poll: {e}")))?
                .json()
                .await
                .map_err(|e| OcrError::EngineFailure(format!("remote OCR poll body: {e}")))?;

            match result.status.as_str() {
                "succeeded" => {
                    let blocks = result
                        .analyze_result
                        .map(|ar| {
                            ar.pages
                                .into_iter()
                                .flat_map(|p| p.lines)
                                .map(|line| TextBlock {
                                    text: line.content,
                                    confidence: REMOTE_BLOCK_CONFIDENCE,
                                    bbox: polygon_to_bbox(&line.polygon),
                                })
                                .collect()
                        })
                        .unwrap_or_default();
                    return Ok(blocks);
                }
                "failed" => {
                    let message = result
                        .error
                        .and_then(|e| e.message)
                        .unwrap_or_else(|| "analysis failed".into());
                    return Err(OcrError::EngineFailure(message));
                }
                other => debug!(status = other, "Remote OCR operation still running"),
            }
        }

        Err(OcrError::EngineFailure(format!(
            "remote OCR did not complete within {MAX_POLLS} polls"
        )))
    }
}

#[async_trait]
impl RemoteOcrEngine for AzureReadClient {
    async fn read_page(&self, image_bytes: &[u8]) -> Result<Vec<TextBlock>, OcrError> {
        let operation_location = self.submit(image_bytes).await?;
        match self.poll(&operation_location).await {
            Ok(blocks) => Ok(blocks),
            Err(e) => {
                warn!(error = %e, "Remote OCR failed");
                Err(e)
            }
        }
    }
}

// ──────────────────────────────────────────────
// MockRemoteOcr (testing)
// ──────────────────────────────────────────────

/// Mock remote engine returning fixed blocks or a fixed failure.
pub struct MockRemoteOcr {
    blocks: Vec<TextBlock>,
    fail: bool,
}

impl MockRemoteOcr {
    pub fn new(blocks: Vec<TextBlock>) -> Self {
        Self {
            blocks,
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            blocks: Vec::new(),
            fail: true,
        }
    }
}

#[async_trait]
impl RemoteOcrEngine for MockRemoteOcr {
    async fn read_page(&self, _image_bytes: &[u8]) -> Result<Vec<TextBlock>, OcrError> {
        if self.fail {
            return Err(OcrError::EngineFailure("mock remote failure".into()));
        }
        Ok(self.blocks.clone())
    }
}
