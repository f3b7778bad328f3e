//! Value types produced by OCR: text blocks with confidence and position,
//! per-page results, and whole-document results.

use serde::{Deserialize, Serialize};

use super::OcrError;

/// A single recognized text region.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextBlock {
    pub text: String,
    /// Recognition confidence in [0, 1].
    pub confidence: f32,
    /// Four corner points, clockwise from top-left: `[[x, y]; 4]`.
    pub bbox: [[f32; 2]; 4],
}

impl TextBlock {
    pub fn new(text: impl Into<String>, confidence: f32, bbox: [[f32; 2]; 4]) -> Self {
        Self {
            text: text.into(),
            confidence,
            bbox,
        }
    }

    /// Block with a degenerate bounding box, for engines without geometry.
    pub fn unpositioned(text: impl Into<String>, confidence: f32) -> Self {
        Self::new(text, confidence, [[0.0, 0.0]; 4])
    }
}

/// Which engine produced a page's blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OcrSource {
    Paddle,
    Azure,
    /// No engine produced usable output for the page.
    None,
}

impl OcrSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Paddle => "paddle",
            Self::Azure => "azure",
            Self::None => "none",
        }
    }
}

/// OCR result for one page. `text` always derives from `blocks`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageOcr {
    /// 1-based page number, unique and contiguous within a document.
    pub page_number: usize,
    pub text: String,
    pub blocks: Vec<TextBlock>,
    pub source: OcrSource,
    pub warnings: Vec<String>,
}

impl PageOcr {
    /// Build a page from its blocks; the page text is the blocks joined
    /// by newlines.
    pub fn from_blocks(
        page_number: usize,
        blocks: Vec<TextBlock>,
        source: OcrSource,
        warnings: Vec<String>,
    ) -> Self {
        let text = blocks
            .iter()
            .map(|b| b.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        Self {
            page_number,
            text,
            blocks,
            source,
            warnings,
        }
    }

    pub fn mean_confidence(&self) -> f32 {
        mean_confidence(&self.blocks)
    }
}

/// Mean block confidence; zero for an empty block list.
pub fn mean_confidence(blocks: &[TextBlock]) -> f32 {
    if blocks.is_empty() {
        return 0.0;
    }
    blocks.iter().map(|b| b.confidence).sum::<f32>() / blocks.len() as f32
}

/// Input document kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Image,
    Pdf,
}

/// OCR result for a whole document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentOcr {
    pub pages: Vec<PageOcr>,
    pub total_pages: usize,
    pub source_type: SourceKind,
}

impl DocumentOcr {
    pub fn new(pages: Vec<PageOcr>, source_type: SourceKind) -> Self {
        let total_pages = pages.len();
        Self {
            pages,
            total_pages,
            source_type,
        }
    }

    /// All page text concatenated, page order preserved.
    pub fn full_text(&self) -> String {
        self.pages
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Local synchronous text-block engine.
///
/// Implementations are CPU-bound and must be driven from a blocking
/// worker; the underlying inference library is additionally not safe for
/// concurrent use, so implementations serialize internally with a mutex.
pub trait LocalOcrEngine: Send + Sync {
    /// Engine identifier for logs and per-page source records.
    fn name(&self) -> &'static str;

    /// Whether the engine can run (models present, library loadable).
    fn is_available(&self) -> bool;

    /// Recognize text blocks in an encoded image (PNG/JPEG bytes).
    /// `with_angle` selects the angle-classification variant.
    fn recognize(&self, image_bytes: &[u8], with_angle: bool) -> Result<Vec<TextBlock>, OcrError>;
}

/// Mock local engine returning fixed blocks, for pipeline tests.
pub struct MockOcrEngine {
    blocks: Vec<TextBlock>,
    available: bool,
}

impl MockOcrEngine {
    pub fn new(blocks: Vec<TextBlock>) -> Self {
        Self {
            blocks,
            available: true,
        }
    }

    /// A single full-confidence block per line of `text`.
    pub fn from_lines(text: &str, confidence: f32) -> Self {
        let blocks = text
            .lines()
            .map(|line| TextBlock::unpositioned(line, confidence))
            .collect();
        Self::new(blocks)
    }

    pub fn unavailable() -> Self {
        Self {
            blocks: Vec::new(),
            available: false,
        }
    }
}

impl LocalOcrEngine for MockOcrEngine {
    fn name(&self) -> &'static str {
        "paddle"
    }

    fn is_available(&self) -> bool {
        self.available
    }

    fn recognize(&self, _image_bytes: &[u8], _with_angle: bool) -> Result<Vec<TextBlock>, OcrError> {
        if !self.available {
            return Err(OcrError::EngineUnavailable("mock engine disabled".into()));
        }
        Ok(self.blocks.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_text_derives_from_blocks() {
        let blocks = vec![
            TextBlock::unpositioned("Hemoglobin 13.2 g/dL", 0.95),
            TextBlock::unpositioned("WBC 7200 /cu.mm", 0.91),
        ];
        let page = PageOcr::from_blocks(1, blocks, OcrSource::Paddle, vec![]);
        assert_eq!(page.text, "Hemoglobin 13.2 g/dL\nWBC 7200 /cu.mm");
        assert_eq!(page.page_number, 1);
    }

    #[test]
    fn mean_confidence_of_empty_is_zero() {
        assert_eq!(mean_confidence(&[]), 0.0);
    }

    #[test]
    fn mean_confidence_averages() {
        let blocks = vec![
            TextBlock::unpositioned("a", 0.8),
            TextBlock::unpositioned("b", 0.6),
        ];
        assert!((mean_confidence(&blocks) - 0.7).abs() < 1e-6);
    }

    #[test]
    fn document_full_text_preserves_page_order() {
        let doc = DocumentOcr::new(
            vec![
                PageOcr::from_blocks(
                    1,
                    vec![TextBlock::unpositioned("page one", 0.9)],
                    OcrSource::Paddle,
                    vec![],
                ),
                PageOcr::from_blocks(
                    2,
                    vec![TextBlock::unpositioned("page two", 0.9)],
                    OcrSource::Azure,
                    vec![],
                ),
            ],
            SourceKind::Pdf,
        );
        assert_eq!(doc.total_pages, 2);
        assert_eq!(doc.full_text(), "page one\npage two");
    }

    #[test]
    fn unavailable_mock_engine_errors() {
        let engine = MockOcrEngine::unavailable();
        assert!(!engine.is_available());
        assert!(engine.recognize(b"png", false).is_err());
    }

    #[test]
    fn ocr_source_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&OcrSource::Paddle).unwrap(),
            "\"paddle\""
        );
        assert_eq!(OcrSource::Azure.as_str(), "azure");
    }
}
