//! Tesseract command line engine.

use std::process::Command;

use image::{DynamicImage, ImageFormat};
use tracing::{debug, trace};

use super::OcrEngine;
use crate::error::OcrError;

/// Runs `tesseract <page.png> stdout -l <lang> --psm <mode>` per page.
#[derive(Debug, Clone)]
pub struct TesseractCli {
    binary: String,
}

impl TesseractCli {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn unavailable(&self, e: std::io::Error) -> OcrError {
        OcrError::EngineUnavailable(format!(
            "failed to run tesseract (is it installed? path='{}'): {}",
            self.binary, e
        ))
    }
}

impl Default for TesseractCli {
    fn default() -> Self {
        Self::new("tesseract")
    }
}

impl OcrEngine for TesseractCli {
    fn image_to_text(&self, image: &DynamicImage, language: &str, mode: u8) -> Result<String, OcrError> {
        let page = tempfile::Builder::new()
            .prefix("slipscan-page-")
            .suffix(".png")
            .tempfile()?;
        image.save_with_format(page.path(), ImageFormat::Png)?;

        trace!("Running {} on {}", self.binary, page.path().display());
        let output = Command::new(&self.binary)
            .arg(page.path())
            .arg("stdout")
            .arg("-l")
            .arg(language)
            .arg("--psm")
            .arg(mode.to_string())
            .output()
            .map_err(|e| self.unavailable(e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OcrError::Recognition(format!(
                "tesseract exited with code {}: {}",
                output.status.code().unwrap_or(-1),
                stderr.trim()
            )));
        }

        let text = String::from_utf8_lossy(&output.stdout).into_owned();
        debug!("tesseract returned {} chars", text.len());
        Ok(text)
    }

    fn probe(&self) -> Result<String, OcrError> {
        let output = Command::new(&self.binary)
            .arg("--version")
            .output()
            .map_err(|e| self.unavailable(e))?;

        if !output.status.success() {
            return Err(OcrError::EngineUnavailable(format!(
                "'{} --version' exited with code {}",
                self.binary,
                output.status.code().unwrap_or(-1)
            )));
        }

        // Older releases print the version on stderr.
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let version = stdout
            .lines()
            .chain(stderr.lines())
            .map(str::trim)
            .find(|l| !l.is_empty())
            .unwrap_or("tesseract")
            .to_string();

        Ok(version)
    }

    fn name(&self) -> &'static str {
        "tesseract"
    }
}
