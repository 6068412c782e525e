//! OCR boundary: page rendering and image-to-text engines.
//!
//! Both sides are traits so the pipeline can run against the tesseract CLI,
//! the pure Rust ONNX engine, or in-memory fakes.

mod render;
mod tesseract;
#[cfg(feature = "onnx-ocr")]
mod pure_engine;

pub use render::PdftoppmRenderer;
pub use tesseract::TesseractCli;
#[cfg(feature = "onnx-ocr")]
pub use pure_engine::OnnxOcr;

use std::path::Path;

use image::DynamicImage;
use tracing::debug;

use crate::error::OcrError;
use crate::models::config::{OcrConfig, OcrEngineKind, RendererKind};
use crate::pdf::EmbeddedImageRenderer;

/// Extensions read directly as a single page image.
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "tif", "tiff"];

/// One OCR pass over one page image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPage {
    /// Zero-based page index.
    pub index: usize,
    /// Text as returned by the engine.
    pub text: String,
}

/// Turns a document file into page images.
pub trait PageRenderer: Send + Sync {
    /// Render at most `max_pages` pages, in page order.
    fn render_pages(&self, path: &Path, max_pages: usize) -> Result<Vec<DynamicImage>, OcrError>;

    /// Check that the renderer can run. Returns a version or description.
    fn probe(&self) -> Result<String, OcrError> {
        Ok("built-in".to_string())
    }
}

/// Turns one page image into text.
pub trait OcrEngine: Send + Sync {
    /// Recognize the text of an image.
    fn image_to_text(&self, image: &DynamicImage, language: &str, mode: u8) -> Result<String, OcrError>;

    /// Check that the engine is installed and reachable. Returns its version.
    fn probe(&self) -> Result<String, OcrError>;

    /// Engine name for logs.
    fn name(&self) -> &'static str;
}

/// Whether a path is a plain image input.
pub fn is_image_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.iter().any(|x| x.eq_ignore_ascii_case(e)))
        .unwrap_or(false)
}

/// Whether a path is a PDF.
pub fn is_pdf_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false)
}

/// Load an image input as its only page.
pub fn load_image_page(path: &Path) -> Result<Vec<DynamicImage>, OcrError> {
    debug!("Loading image input {}", path.display());
    Ok(vec![image::open(path)?])
}

/// Build the configured page renderer.
pub fn build_renderer(config: &OcrConfig) -> Box<dyn PageRenderer> {
    match config.renderer {
        RendererKind::Pdftoppm => Box::new(
            PdftoppmRenderer::new()
                .with_binary(&config.pdftoppm_path)
                .with_dpi(config.render_dpi),
        ),
        RendererKind::Embedded => Box::new(EmbeddedImageRenderer::new()),
    }
}

/// Build the configured OCR engine.
pub fn build_engine(config: &OcrConfig) -> Result<Box<dyn OcrEngine>, OcrError> {
    match config.engine {
        OcrEngineKind::Tesseract => Ok(Box::new(TesseractCli::new(&config.tesseract_path))),
        OcrEngineKind::Onnx => build_onnx_engine(config),
    }
}

#[cfg(feature = "onnx-ocr")]
fn build_onnx_engine(config: &OcrConfig) -> Result<Box<dyn OcrEngine>, OcrError> {
    let model_dir = config.model_dir.as_ref().ok_or_else(|| {
        OcrError::EngineUnavailable("ocr.model_dir is required for the onnx engine".to_string())
    })?;
    Ok(Box::new(OnnxOcr::from_dir(model_dir)?))
}

#[cfg(not(feature = "onnx-ocr"))]
fn build_onnx_engine(_config: &OcrConfig) -> Result<Box<dyn OcrEngine>, OcrError> {
    Err(OcrError::EngineUnavailable(
        "built without the `onnx-ocr` feature".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_path_kinds() {
        assert!(is_image_path(&PathBuf::from("scan.JPG")));
        assert!(is_image_path(&PathBuf::from("scan.tiff")));
        assert!(!is_image_path(&PathBuf::from("scan.pdf")));
        assert!(is_pdf_path(&PathBuf::from("scan.PDF")));
        assert!(!is_pdf_path(&PathBuf::from("scan")));
    }

    #[test]
    fn test_load_image_page() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page.png");
        DynamicImage::new_rgb8(4, 3).save(&path).unwrap();

        let pages = load_image_page(&path).unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].width(), 4);
    }

    #[cfg(not(feature = "onnx-ocr"))]
    #[test]
    fn test_onnx_engine_requires_feature() {
        let config = OcrConfig {
            engine: OcrEngineKind::Onnx,
            ..Default::default()
        };
        assert!(matches!(
            build_engine(&config),
            Err(OcrError::EngineUnavailable(_))
        ));
    }
}
