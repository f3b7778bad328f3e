//! Document OCR service: image/PDF → per-page text blocks.
//!
//! Each page runs the dual-layer selection: the local engine first, and —
//! when its mean confidence falls below the fallback threshold and a remote
//! engine is configured — the remote read engine as a challenger. The
//! challenger's result is kept only when its mean confidence strictly
//! exceeds the local one; the comparison is always recorded on the page.
//!
//! A block filter then drops section-header blocks and blocks below the
//! configured confidence floor, one warning per drop. Whole-document
//! results are cached by content hash.

use std::sync::Arc;
use std::sync::OnceLock;

use regex::Regex;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::config::{OcrEnginePreference, OCR_FALLBACK_THRESHOLD};

use super::azure::RemoteOcrEngine;
use super::cache::OcrCache;
use super::pdf::PdfPageRenderer;
use super::types::{
    mean_confidence, DocumentOcr, LocalOcrEngine, OcrSource, PageOcr, SourceKind, TextBlock,
};
use super::OcrError;

/// Section headers that OCR reads as table rows; they carry no finding and
/// pollute extraction.
fn header_regex() -> &'static Regex {
    static HEADER: OnceLock<Regex> = OnceLock::new();
    HEADER.get_or_init(|| {
        Regex::new(
            r"(?i)^\s*(COMPLETE BLOOD COUNT|DIFFERENTIAL COUNT|PERIPHERAL SMEAR|HEMATOLOGY|BIOCHEMISTRY|CLINICAL PATHOLOGY|SEROLOGY|MICROBIOLOGY|IMMUNOLOGY|LIVER FUNCTION TEST|KIDNEY FUNCTION TEST|RENAL FUNCTION TEST|LIPID PROFILE|THYROID (FUNCTION TEST|PROFILE)|URINE (EXAMINATION|ROUTINE|ANALYSIS)|END OF REPORT)\b",
        )
        .expect("header regex is valid")
    })
}

/// Header heuristic: long all-caps text without digits is a section banner,
/// not a finding row.
fn is_section_header(text: &str) -> bool {
    let trimmed = text.trim();
    if header_regex().is_match(trimmed) {
        return true;
    }
    let has_alpha = trimmed.chars().any(|c| c.is_alphabetic());
    let all_upper = trimmed
        .chars()
        .filter(|c| c.is_alphabetic())
        .all(|c| c.is_uppercase());
    let has_digit = trimmed.chars().any(|c| c.is_ascii_digit());
    has_alpha && all_upper && !has_digit && trimmed.len() > 15
}

/// Drop header blocks and low-confidence blocks, one warning per drop.
fn filter_blocks(blocks: Vec<TextBlock>, min_confidence: f32) -> (Vec<TextBlock>, Vec<String>) {
    let mut kept = Vec::with_capacity(blocks.len());
    let mut warnings = Vec::new();

    for block in blocks {
        if is_section_header(&block.text) {
            warnings.push(format!("Dropped section header block: '{}'", block.text.trim()));
            continue;
        }
        if block.confidence < min_confidence {
            warnings.push(format!(
                "Dropped low-confidence block ({:.2}): '{}'",
                block.confidence,
                block.text.trim()
            ));
            continue;
        }
        kept.push(block);
    }

    (kept, warnings)
}

/// Per-page OCR with dual-layer engine selection and content caching.
pub struct DocumentOcrService {
    local: Option<Arc<dyn LocalOcrEngine>>,
    remote: Option<Arc<dyn RemoteOcrEngine>>,
    renderer: Arc<dyn PdfPageRenderer>,
    cache: OcrCache,
    ocr_permits: Arc<Semaphore>,
    preference: OcrEnginePreference,
    min_block_confidence: f32,
    render_dpi: u32,
}

impl DocumentOcrService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        local: Option<Arc<dyn LocalOcrEngine>>,
        remote: Option<Arc<dyn RemoteOcrEngine>>,
        renderer: Arc<dyn PdfPageRenderer>,
        cache_capacity: usize,
        max_ocr_workers: usize,
        preference: OcrEnginePreference,
        min_block_confidence: f32,
        render_dpi: u32,
    ) -> Self {
        Self {
            local,
            remote,
            renderer,
            cache: OcrCache::new(cache_capacity),
            ocr_permits: Arc::new(Semaphore::new(max_ocr_workers.max(1))),
            preference,
            min_block_confidence,
            render_dpi: render_dpi.min(300),
        }
    }

    /// Extract OCR for a whole document. Cached by file content; a second
    /// call with identical bytes never reaches either engine.
    pub async fn extract(&self, bytes: &[u8], kind: SourceKind) -> Result<DocumentOcr, OcrError> {
        if let Some(hit) = self.cache.get(bytes) {
            debug!(kind = ?kind, "OCR cache hit");
            return Ok(hit);
        }

        let document = match kind {
            SourceKind::Image => {
                // Camera captures may be rotated; use the angle-classifying
                // variant for single images.
                let page = self.extract_page(bytes, 1, true).await;
                DocumentOcr::new(vec![page], kind)
            }
            SourceKind::Pdf => {
                let count = {
                    let renderer = self.renderer.clone();
                    let owned = bytes.to_vec();
                    tokio::task::spawn_blocking(move || renderer.page_count(&owned))
                        .await
                        .map_err(|e| OcrError::EngineFailure(format!("render worker: {e}")))??
                };

                let mut pages = Vec::with_capacity(count);
                for index in 0..count {
                    let rendered = {
                        let renderer = self.renderer.clone();
                        let owned = bytes.to_vec();
                        let dpi = self.render_dpi;
                        tokio::task::spawn_blocking(move || renderer.render_page(&owned, index, dpi))
                            .await
                            .map_err(|e| OcrError::EngineFailure(format!("render worker: {e}")))?
                    };

                    match rendered {
                        // Rendered pages are upright; skip angle classification.
                        Ok(png) => pages.push(self.extract_page(&png, index + 1, false).await),
                        Err(e) => {
                            warn!(page = index + 1, error = %e, "Page rendering failed");
                            pages.push(PageOcr::from_blocks(
                                index + 1,
                                Vec::new(),
                                OcrSource::None,
                                vec![format!("Page rendering failed: {e}")],
                            ));
                        }
                    }
                }
                DocumentOcr::new(pages, kind)
            }
        };

        self.cache.insert(bytes, document.clone());
        Ok(document)
    }

    /// OCR one page image. Never fails: engine errors degrade to an empty
    /// page whose warnings record what happened.
    async fn extract_page(&self, image_bytes: &[u8], page_number: usize, with_angle: bool) -> PageOcr {
        let (blocks, source, mut warnings) = self.select_blocks(image_bytes, with_angle).await;
        let (kept, filter_warnings) = filter_blocks(blocks, self.min_block_confidence);
        warnings.extend(filter_warnings);
        PageOcr::from_blocks(page_number, kept, source, warnings)
    }

    /// Dual-layer engine selection for one page.
    async fn select_blocks(
        &self,
        image_bytes: &[u8],
        with_angle: bool,
    ) -> (Vec<TextBlock>, OcrSource, Vec<String>) {
        let mut warnings = Vec::new();

        // Remote-only preference bypasses the local pass entirely.
        if self.preference == OcrEnginePreference::Azure {
            if let Some(remote) = &self.remote {
                match remote.read_page(image_bytes).await {
                    Ok(blocks) => return (blocks, OcrSource::Azure, warnings),
                    Err(e) => {
                        warnings.push(format!("Remote OCR failed: {e}; falling back to local engine"));
                    }
                }
            }
        }

        let (local_blocks, mut source) = match self.run_local(image_bytes, with_angle).await {
            Ok(blocks) => (blocks, OcrSource::Paddle),
            Err(e) => {
                warnings.push(format!("Local OCR unavailable: {e}"));
                (Vec::new(), OcrSource::None)
            }
        };
        let local_confidence = mean_confidence(&local_blocks);

        if local_confidence < OCR_FALLBACK_THRESHOLD {
            let fallback_allowed = matches!(
                self.preference,
                OcrEnginePreference::Hybrid | OcrEnginePreference::Azure
            );
            match (&self.remote, fallback_allowed) {
                (Some(remote), true) => match remote.read_page(image_bytes).await {
                    Ok(remote_blocks) => {
                        let remote_confidence = mean_confidence(&remote_blocks);
                        if remote_confidence > local_confidence {
                            warnings.push(format!(
                                "Remote OCR selected: confidence {remote_confidence:.2} vs local {local_confidence:.2}"
                            ));
                            return (remote_blocks, OcrSource::Azure, warnings);
                        }
                        warnings.push(format!(
                            "Remote OCR not better: confidence {remote_confidence:.2} vs local {local_confidence:.2}; keeping local result"
                        ));
                    }
                    Err(e) => warnings.push(format!("Remote OCR fallback failed: {e}")),
                },
                _ => warnings.push(format!(
                    "Low OCR confidence {local_confidence:.2} and no remote fallback available"
                )),
            }
        }

        if local_blocks.is_empty() && source == OcrSource::Paddle {
            source = OcrSource::None;
        }
        (local_blocks, source, warnings)
    }

    /// Run the local engine on a blocking worker under the OCR semaphore.
    async fn run_local(
        &self,
        image_bytes: &[u8],
        with_angle: bool,
    ) -> Result<Vec<TextBlock>, OcrError> {
        let Some(engine) = self.local.clone() else {
            return Err(OcrError::EngineUnavailable("no local OCR engine configured".into()));
        };
        let _permit = self
            .ocr_permits
            .acquire()
            .await
            .map_err(|_| OcrError::EngineFailure("OCR semaphore closed".into()))?;
        let bytes = image_bytes.to_vec();
        tokio::task::spawn_blocking(move || engine.recognize(&bytes, with_angle))
            .await
            .map_err(|e| OcrError::EngineFailure(format!("OCR worker panicked: {e}")))?
    }
}
