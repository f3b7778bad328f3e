//! Document OCR: local text-block engine, remote read engine, PDF page
//! rendering, the content-hash cache, and the dual-layer page extraction
//! service that combines them.

pub mod azure;
pub mod cache;
pub mod document;
#[cfg(feature = "ocr-paddle")]
pub mod paddle;
pub mod pdf;
pub mod types;

pub use azure::{AzureReadClient, RemoteOcrEngine};
pub use cache::OcrCache;
pub use document::DocumentOcrService;
pub use pdf::{MockPdfPageRenderer, PdfPageRenderer, PdfiumRenderer, UnavailableRenderer};
pub use types::{DocumentOcr, LocalOcrEngine, MockOcrEngine, OcrSource, PageOcr, SourceKind, TextBlock};

/// Errors from OCR engines and document extraction.
#[derive(Debug, thiserror::Error)]
pub enum OcrError {
    #[error("OCR engine unavailable: {0}")]
    EngineUnavailable(String),

    #[error("OCR engine failure: {0}")]
    EngineFailure(String),

    #[error("PDF rendering failed on page {page}: {reason}")]
    PdfRendering { page: usize, reason: String },

    #[error("PDF is password-protected")]
    PdfEncrypted,

    #[error("Image processing failed: {0}")]
    ImageProcessing(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
