//! Pure Rust OCR engine using `pure-onnx-ocr`.

use std::path::Path;
use std::time::Instant;

use image::{DynamicImage, GenericImageView};
use tracing::{debug, info};

use super::OcrEngine;
use crate::error::OcrError;

/// Line height, in pixels, used to group boxes into reading rows.
const ROW_HEIGHT: f64 = 20.0;

/// OCR engine backed by `pure-onnx-ocr` (no external ONNX Runtime).
///
/// Language and segmentation mode are fixed by the models, so the values
/// passed to `image_to_text` are ignored.
pub struct OnnxOcr {
    engine: pure_onnx_ocr::engine::OcrEngine,
}

impl OnnxOcr {
    /// Load `det.onnx`, `latin_rec.onnx` and `latin_dict.txt` from a directory.
    pub fn from_dir(model_dir: &Path) -> Result<Self, OcrError> {
        let det_path = model_dir.join("det.onnx");
        let rec_path = model_dir.join("latin_rec.onnx");
        let dict_path = model_dir.join("latin_dict.txt");

        let engine = pure_onnx_ocr::engine::OcrEngineBuilder::new()
            .det_model_path(&det_path)
            .rec_model_path(&rec_path)
            .dictionary_path(&dict_path)
            .build()
            .map_err(|e| OcrError::EngineUnavailable(format!("pure-onnx-ocr: {}", e)))?;

        info!("Loaded pure-onnx-ocr engine from {}", model_dir.display());
        Ok(Self { engine })
    }
}

impl OcrEngine for OnnxOcr {
    fn image_to_text(&self, image: &DynamicImage, _language: &str, _mode: u8) -> Result<String, OcrError> {
        let start = Instant::now();
        let (width, height) = image.dimensions();

        let results = self
            .engine
            .run_from_image(image)
            .map_err(|e| OcrError::Recognition(format!("pure-onnx-ocr: {}", e)))?;

        let mut lines: Vec<((i64, f64), String)> = results
            .iter()
            .map(|r| {
                let (x, y) = top_left(&r.bounding_box);
                let key = ((y / ROW_HEIGHT) as i64, x);
                (key, r.text.replace("[UNK]", " "))
            })
            .collect();

        // Top-to-bottom rows, left-to-right within a row.
        lines.sort_by(|a, b| {
            a.0.0
                .cmp(&b.0.0)
                .then(a.0.1.partial_cmp(&b.0.1).unwrap_or(std::cmp::Ordering::Equal))
        });

        debug!(
            "pure-onnx-ocr: {} regions on {}x{} in {}ms",
            lines.len(),
            width,
            height,
            start.elapsed().as_millis()
        );

        Ok(lines
            .into_iter()
            .map(|(_, text)| text)
            .collect::<Vec<_>>()
            .join("\n"))
    }

    fn probe(&self) -> Result<String, OcrError> {
        Ok("pure-onnx-ocr".to_string())
    }

    fn name(&self) -> &'static str {
        "onnx"
    }
}

/// Smallest x and y of a detection polygon.
fn top_left(polygon: &pure_onnx_ocr::Polygon<f64>) -> (f64, f64) {
    polygon
        .exterior()
        .coords()
        .take(4)
        .fold((f64::INFINITY, f64::INFINITY), |(x, y), c| {
            (x.min(c.x), y.min(c.y))
        })
}
