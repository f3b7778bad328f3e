//! PDF page rasterization for the OCR engines.
//!
//! Pages are rendered to PNG through the PDFium dynamic library, which
//! copes with the font and layout mess real lab reports ship with. The
//! `Pdfium` handle is `!Send`, so every call binds a fresh instance; the
//! loader cache makes that cheap after the first bind.

use std::io::Cursor;

use image::ImageFormat;
use pdfium_render::prelude::*;
use tracing::{debug, warn};

use super::OcrError;

/// PDF coordinates are expressed in points, 72 per inch.
const POINTS_PER_INCH: f32 = 72.0;

/// Upper bound on either rendered dimension. A corrupt page box or an
/// oversized DPI setting must not balloon into a multi-gigapixel bitmap.
const MAX_RENDER_PX: u32 = 4096;

/// PDF page-to-image renderer seam.
///
/// Production: `PdfiumRenderer`. Testing: `MockPdfPageRenderer`. Startup
/// without the library: `UnavailableRenderer`.
pub trait PdfPageRenderer: Send + Sync {
    /// Render a single 0-indexed PDF page to PNG bytes at the given DPI.
    fn render_page(&self, pdf_bytes: &[u8], page_index: usize, dpi: u32)
        -> Result<Vec<u8>, OcrError>;

    /// Count pages in a PDF document.
    fn page_count(&self, pdf_bytes: &[u8]) -> Result<usize, OcrError>;
}

/// Pixel dimensions for a page, with the oversize guard applied.
///
/// The nominal scale is `dpi / 72`. When the larger edge would exceed
/// `MAX_RENDER_PX`, the whole scale is reduced so that edge lands exactly
/// on the bound; aspect ratio is untouched because both edges share one
/// scale factor. Returns `(width_px, height_px, capped)`.
fn page_pixel_size(width_points: f32, height_points: f32, dpi: u32) -> (u32, u32, bool) {
    let longest = width_points.max(height_points).max(1.0);
    let nominal = dpi as f32 / POINTS_PER_INCH;
    let bounded = (MAX_RENDER_PX as f32 / longest).min(nominal);
    let capped = bounded < nominal;

    let to_px = |points: f32| (points * bounded).round().clamp(1.0, MAX_RENDER_PX as f32) as u32;
    (to_px(width_points), to_px(height_points), capped)
}

/// Production renderer backed by the PDFium dynamic library.
pub struct PdfiumRenderer;

impl PdfiumRenderer {
    /// Create a renderer, failing fast when the library cannot be bound.
    pub fn new() -> Result<Self, OcrError> {
        bind_pdfium().map(|_| Self)
    }
}

/// Bind the PDFium library, trying each known location in turn:
/// the `PDFIUM_DYNAMIC_LIB_PATH` override, the directory of the running
/// executable, then the system loader paths. The error lists everything
/// that was tried.
fn bind_pdfium() -> Result<Pdfium, OcrError> {
    let mut attempts: Vec<String> = Vec::new();

    if let Ok(override_path) = std::env::var("PDFIUM_DYNAMIC_LIB_PATH") {
        match Pdfium::bind_to_library(&override_path) {
            Ok(bindings) => {
                debug!(path = %override_path, "PDFium bound via env override");
                return Ok(Pdfium::new(bindings));
            }
            Err(e) => attempts.push(format!("env override {override_path}: {e}")),
        }
    }

    if let Some(exe_dir) = std::env::current_exe().ok().and_then(|p| p.parent().map(|d| d.to_path_buf())) {
        let candidate = Pdfium::pdfium_platform_library_name_at_path(exe_dir.to_string_lossy().as_ref());
        match Pdfium::bind_to_library(&candidate) {
            Ok(bindings) => {
                debug!(dir = %exe_dir.display(), "PDFium bound from executable directory");
                return Ok(Pdfium::new(bindings));
            }
            Err(e) => attempts.push(format!("executable directory: {e}")),
        }
    }

    match Pdfium::bind_to_system_library() {
        Ok(bindings) => Ok(Pdfium::new(bindings)),
        Err(e) => {
            attempts.push(format!("system paths: {e}"));
            Err(OcrError::EngineUnavailable(format!(
                "PDFium library not loadable ({})",
                attempts.join("; ")
            )))
        }
    }
}

/// Open a PDF from memory, distinguishing password protection from
/// general corruption.
fn open_document<'a>(pdfium: &'a Pdfium, pdf_bytes: &'a [u8]) -> Result<PdfDocument<'a>, OcrError> {
    pdfium.load_pdf_from_byte_slice(pdf_bytes, None).map_err(|e| {
        let description = e.to_string();
        let lower = description.to_lowercase();
        if lower.contains("password") || lower.contains("encrypt") {
            OcrError::PdfEncrypted
        } else {
            OcrError::PdfRendering {
                page: 0,
                reason: format!("Document could not be opened: {description}"),
            }
        }
    })
}

impl PdfPageRenderer for PdfiumRenderer {
    fn page_count(&self, pdf_bytes: &[u8]) -> Result<usize, OcrError> {
        let pdfium = bind_pdfium()?;
        let document = open_document(&pdfium, pdf_bytes)?;
        Ok(document.pages().len() as usize)
    }

    fn render_page(
        &self,
        pdf_bytes: &[u8],
        page_index: usize,
        dpi: u32,
    ) -> Result<Vec<u8>, OcrError> {
        let pdfium = bind_pdfium()?;
        let document = open_document(&pdfium, pdf_bytes)?;
        let pages = document.pages();
        let total = pages.len() as usize;

        let index = u16::try_from(page_index)
            .ok()
            .filter(|_| page_index < total)
            .ok_or_else(|| OcrError::PdfRendering {
                page: page_index,
                reason: format!("Page index {page_index} past end of document ({total} pages)"),
            })?;
        let page = pages.get(index).map_err(|e| OcrError::PdfRendering {
            page: page_index,
            reason: format!("Page could not be loaded: {e}"),
        })?;

        let (width_px, height_px, capped) =
            page_pixel_size(page.width().value, page.height().value, dpi);
        if capped {
            warn!(
                page = page_index,
                width = width_px,
                height = height_px,
                dpi,
                "Oversized page scaled down to the {MAX_RENDER_PX}px render bound"
            );
        }

        let bitmap = page
            .render_with_config(
                &PdfRenderConfig::new()
                    .set_target_width(width_px as i32)
                    .set_maximum_height(height_px as i32),
            )
            .map_err(|e| OcrError::PdfRendering {
                page: page_index,
                reason: format!("Rasterization failed: {e}"),
            })?;

        let png = encode_png(&bitmap.as_image())?;
        debug!(
            page = page_index,
            width = width_px,
            height = height_px,
            bytes = png.len(),
            "Rendered PDF page"
        );
        Ok(png)
    }
}

fn encode_png(image: &image::DynamicImage) -> Result<Vec<u8>, OcrError> {
    let mut cursor = Cursor::new(Vec::new());
    image
        .write_to(&mut cursor, ImageFormat::Png)
        .map_err(|e| OcrError::ImageProcessing(format!("Could not encode page as PNG: {e}")))?;
    Ok(cursor.into_inner())
}

// ── Test doubles ──────────────────────────────────────────

/// Mock renderer with a fixed page count; pipeline tests run without the
/// PDFium binary. Each valid page renders as a small blank PNG.
pub struct MockPdfPageRenderer {
    page_count: usize,
}

impl MockPdfPageRenderer {
    pub fn new(page_count: usize) -> Self {
        Self { page_count }
    }
}

impl PdfPageRenderer for MockPdfPageRenderer {
    fn page_count(&self, _pdf_bytes: &[u8]) -> Result<usize, OcrError> {
        Ok(self.page_count)
    }

    fn render_page(
        &self,
        _pdf_bytes: &[u8],
        page_index: usize,
        _dpi: u32,
    ) -> Result<Vec<u8>, OcrError> {
        if page_index >= self.page_count {
            return Err(OcrError::PdfRendering {
                page: page_index,
                reason: format!("Mock document only has {} pages", self.page_count),
            });
        }
        let blank = image::DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
            8,
            8,
            image::Rgb([255, 255, 255]),
        ));
        encode_png(&blank)
    }
}

/// Renderer used when the PDFium library cannot be loaded at startup.
/// Image documents still process; PDF documents fail with the load reason.
pub struct UnavailableRenderer {
    reason: String,
}

impl UnavailableRenderer {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl PdfPageRenderer for UnavailableRenderer {
    fn page_count(&self, _pdf_bytes: &[u8]) -> Result<usize, OcrError> {
        Err(OcrError::EngineUnavailable(self.reason.clone()))
    }

    fn render_page(
        &self,
        _pdf_bytes: &[u8],
        _page_index: usize,
        _dpi: u32,
    ) -> Result<Vec<u8>, OcrError> {
        Err(OcrError::EngineUnavailable(self.reason.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a4_at_300dpi_is_uncapped() {
        // A4 = 595 x 842 points; at 300 DPI the long edge is ~3508px
        let (w, h, capped) = page_pixel_size(595.0, 842.0, 300);
        assert!(!capped);
        assert_eq!(w, (595.0f32 * 300.0 / 72.0).round() as u32);
        assert_eq!(h, (842.0f32 * 300.0 / 72.0).round() as u32);
    }

    #[test]
    fn long_edge_lands_on_the_bound_when_capped() {
        // Square poster page: 5000 points at 300 DPI would be ~20833px
        let (w, h, capped) = page_pixel_size(5000.0, 5000.0, 300);
        assert!(capped);
        assert_eq!(w, MAX_RENDER_PX, "long edge must land on the bound, not near it");
        assert_eq!(h, MAX_RENDER_PX);
    }

    #[test]
    fn capping_preserves_aspect_ratio() {
        let (w, h, capped) = page_pixel_size(5000.0, 10000.0, 300);
        assert!(capped);
        assert_eq!(h, MAX_RENDER_PX);
        let ratio = h as f32 / w as f32;
        assert!((ratio - 2.0).abs() < 0.01, "aspect drifted to {ratio}");
    }

    #[test]
    fn cap_flag_reflects_scale_reduction_not_exact_pixel_match() {
        // Just past the bound: the rounded edge may land below MAX_RENDER_PX,
        // but the reduction must still be reported.
        let width_points = 1000.0f32;
        let dpi = 300;
        let uncapped_px = width_points * dpi as f32 / POINTS_PER_INCH; // ~4167
        assert!(uncapped_px > MAX_RENDER_PX as f32);

        let (w, _, capped) = page_pixel_size(width_points, 700.0, dpi);
        assert!(capped);
        assert!(w <= MAX_RENDER_PX);
    }

    #[test]
    fn degenerate_page_box_yields_one_pixel_minimum() {
        let (w, h, _) = page_pixel_size(0.0, 0.0, 300);
        assert_eq!((w, h), (1, 1));
    }

    #[test]
    fn low_dpi_small_page_is_untouched() {
        let (w, h, capped) = page_pixel_size(100.0, 100.0, 72);
        assert!(!capped);
        assert_eq!((w, h), (100, 100));
    }

    #[test]
    fn mock_pages_decode_as_images() {
        let mock = MockPdfPageRenderer::new(2);
        assert_eq!(mock.page_count(&[]).unwrap(), 2);
        for index in 0..2 {
            let png = mock.render_page(&[], index, 300).unwrap();
            let decoded = image::load_from_memory(&png).expect("mock page must be a valid image");
            assert_eq!(decoded.width(), 8);
        }
    }

    #[test]
    fn mock_rejects_pages_past_the_count() {
        let mock = MockPdfPageRenderer::new(1);
        let err = mock.render_page(&[], 1, 300).unwrap_err();
        assert!(matches!(err, OcrError::PdfRendering { page: 1, .. }));
    }

    #[test]
    fn unavailable_renderer_reports_its_reason() {
        let renderer = UnavailableRenderer::new("library missing");
        let err = renderer.page_count(b"%PDF").unwrap_err();
        assert!(matches!(err, OcrError::EngineUnavailable(reason) if reason == "library missing"));
        assert!(renderer.render_page(b"%PDF", 0, 300).is_err());
    }
}
