//! Local OCR engine: PaddleOCR models via ONNX Runtime.
//!
//! The inference engine (`OcrLite`) needs `&mut self` and is not safe for
//! concurrent use, so each variant lives behind a process-wide mutex. Two
//! variants exist — with and without the angle-classification model — and
//! each is lazily constructed on first use.
//!
//! Model files are looked up in `PADDLE_OCR_MODEL_DIR` (default
//! `./models/paddle-ocr`); when they are missing the engine reports
//! unavailable and the dual-layer selection degrades per policy.

use std::io::Write;
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};

use paddle_ocr_rs::ocr_lite::OcrLite;
use tracing::info;

use super::types::{LocalOcrEngine, TextBlock};
use super::OcrError;

const DET_MODEL_NAME: &str = "ch_PP-OCRv4_det_infer.onnx";
const REC_MODEL_NAME: &str = "ch_PP-OCRv4_rec_infer.onnx";
const CLS_MODEL_NAME: &str = "ch_ppocr_mobile_v2.0_cls_infer.onnx";

const NUM_THREADS: i32 = 4;

/// Engines are cached for the process lifetime; init happens once per
/// variant.
static ENGINE_PLAIN: OnceLock<Mutex<OcrLite>> = OnceLock::new();
static ENGINE_ANGLE: OnceLock<Mutex<OcrLite>> = OnceLock::new();

/// PaddleOCR-backed local engine.
pub struct PaddleEngine {
    model_dir: PathBuf,
}

impl PaddleEngine {
    pub fn new() -> Self {
        let model_dir = std::env::var("PADDLE_OCR_MODEL_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("models/paddle-ocr"));
        Self { model_dir }
    }

    fn model_paths(&self) -> Result<(String, String, String), OcrError> {
        let det = self.model_dir.join(DET_MODEL_NAME);
        let rec = self.model_dir.join(REC_MODEL_NAME);
        let cls = self.model_dir.join(CLS_MODEL_NAME);

        if !det.exists() || !rec.exists() {
            return Err(OcrError::EngineUnavailable(format!(
                "PaddleOCR models not found in {:?}",
                self.model_dir
            )));
        }

        Ok((
            det.to_string_lossy().to_string(),
            cls.to_string_lossy().to_string(),
            rec.to_string_lossy().to_string(),
        ))
    }

    fn engine(&self, with_angle: bool) -> Result<&'static Mutex<OcrLite>, OcrError> {
        let slot = if with_angle { &ENGINE_ANGLE } else { &ENGINE_PLAIN };
        if let Some(engine) = slot.get() {
            return Ok(engine);
        }

        let (det, cls, rec) = self.model_paths()?;
        let mut ocr = OcrLite::new();
        ocr.init_models(&det, &cls, &rec, NUM_THREADS)
            .map_err(|e| OcrError::EngineFailure(format!("PaddleOCR init failed: {e}")))?;
        info!(with_angle, "PaddleOCR engine initialized");

        // A racing thread may have won; either instance is equivalent.
        let _ = slot.set(Mutex::new(ocr));
        slot.get()
            .ok_or_else(|| OcrError::EngineFailure("failed to cache OCR engine".into()))
    }
}

impl Default for PaddleEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalOcrEngine for PaddleEngine {
    fn name(&self) -> &'static str {
        "paddle"
    }

    fn is_available(&self) -> bool {
        self.model_paths().is_ok()
    }

    fn recognize(&self, image_bytes: &[u8], with_angle: bool) -> Result<Vec<TextBlock>, OcrError> {
        // The engine reads from a path, so stage the encoded image.
        let mut staged = tempfile::NamedTempFile::new()?;
        staged.write_all(image_bytes)?;
        let staged_path = staged.path().to_string_lossy().to_string();

        let engine = self.engine(with_angle)?;
        let mut ocr = engine
            .lock()
            .map_err(|_| OcrError::EngineFailure("OCR engine mutex poisoned".into()))?;

        let result = ocr
            .detect_from_path(
                &staged_path,
                50,         // padding
                1024,       // max side length
                0.5,        // box score threshold
                0.3,        // box threshold
                1.6,        // unclip ratio
                with_angle, // do angle
                with_angle, // most angle
            )
            .map_err(|e| OcrError::EngineFailure(format!("PaddleOCR detection failed: {e}")))?;

        let blocks = result
            .text_blocks
            .into_iter()
            .map(|block| {
                let confidence = if block.char_scores.is_empty() {
                    0.0
                } else {
                    block.char_scores.iter().sum::<f32>() / block.char_scores.len() as f32
                };
                let mut bbox = [[0.0f32; 2]; 4];
                for (corner, point) in bbox.iter_mut().zip(block.box_point.iter()) {
                    *corner = [point.x as f32, point.y as f32];
                }
                TextBlock {
                    text: block.text,
                    confidence,
                    bbox,
                }
            })
            .collect();

        Ok(blocks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_models_report_unavailable() {
        let engine = PaddleEngine {
            model_dir: PathBuf::from("/nonexistent/paddle-models"),
        };
        assert!(!engine.is_available());
        let err = engine.recognize(&[0u8; 4], false).unwrap_err();
        assert!(matches!(err, OcrError::EngineUnavailable(_)));
    }
}
