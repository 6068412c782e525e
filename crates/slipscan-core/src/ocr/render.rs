//! Page rasterization through poppler's `pdftoppm`.

use std::path::{Path, PathBuf};
use std::process::Command;

use image::DynamicImage;
use tracing::debug;

use super::{PageRenderer, is_image_path, is_pdf_path, load_image_page};
use crate::error::OcrError;

/// Rasterizes the first pages of a PDF with `pdftoppm -png`.
#[derive(Debug, Clone)]
pub struct PdftoppmRenderer {
    binary: String,
    dpi: u32,
}

impl PdftoppmRenderer {
    pub fn new() -> Self {
        Self {
            binary: "pdftoppm".to_string(),
            dpi: 200,
        }
    }

    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    pub fn with_dpi(mut self, dpi: u32) -> Self {
        self.dpi = dpi;
        self
    }
}

impl Default for PdftoppmRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl PageRenderer for PdftoppmRenderer {
    fn render_pages(&self, path: &Path, max_pages: usize) -> Result<Vec<DynamicImage>, OcrError> {
        if is_image_path(path) {
            return load_image_page(path);
        }
        if !is_pdf_path(path) {
            return Err(OcrError::UnsupportedFormat(path.display().to_string()));
        }

        let out_dir = tempfile::tempdir()?;
        let prefix = out_dir.path().join("page");
        let last = max_pages.max(1);

        let output = Command::new(&self.binary)
            .arg("-r")
            .arg(self.dpi.to_string())
            .arg("-f")
            .arg("1")
            .arg("-l")
            .arg(last.to_string())
            .arg("-png")
            .arg(path)
            .arg(&prefix)
            .output()
            .map_err(|e| {
                OcrError::EngineUnavailable(format!(
                    "failed to run pdftoppm (path='{}'): {}",
                    self.binary, e
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OcrError::Render(format!(
                "pdftoppm failed on {}: {}",
                path.display(),
                stderr.trim()
            )));
        }

        // page-1.png or page-01.png; the padding is uniform within one run.
        let mut files: Vec<PathBuf> = std::fs::read_dir(out_dir.path())?
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|e| e == "png"))
            .collect();
        files.sort();

        if files.is_empty() {
            return Err(OcrError::Render(format!(
                "pdftoppm produced no pages for {}",
                path.display()
            )));
        }

        let pages = files
            .iter()
            .take(last)
            .map(|p| image::open(p).map_err(OcrError::from))
            .collect::<Result<Vec<_>, _>>()?;

        debug!("Rendered {} pages of {} at {} dpi", pages.len(), path.display(), self.dpi);
        Ok(pages)
    }

    fn probe(&self) -> Result<String, OcrError> {
        let output = Command::new(&self.binary)
            .arg("-v")
            .output()
            .map_err(|e| {
                OcrError::EngineUnavailable(format!(
                    "failed to run pdftoppm (is poppler installed? path='{}'): {}",
                    self.binary, e
                ))
            })?;

        // pdftoppm prints its version on stderr.
        let text = String::from_utf8_lossy(&output.stderr);
        Ok(text
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .unwrap_or("pdftoppm")
            .to_string())
    }
}
