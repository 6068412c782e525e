//! Configuration structures for the triage pipeline.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::SlipscanError;

/// Main configuration for the slipscan pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SlipscanConfig {
    /// OCR boundary configuration.
    pub ocr: OcrConfig,

    /// Document classification configuration.
    pub classification: ClassificationConfig,

    /// Field extraction configuration.
    pub extraction: ExtractionConfig,

    /// Processing ledger configuration.
    pub ledger: LedgerConfig,

    /// Tabular export configuration.
    pub export: ExportConfig,

    /// Input selection.
    pub input: InputConfig,
}

/// Which OCR engine turns page images into text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OcrEngineKind {
    /// The `tesseract` command line program.
    Tesseract,
    /// The pure Rust ONNX engine (requires the `onnx-ocr` feature).
    Onnx,
}

/// How PDF documents are turned into page images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RendererKind {
    /// Rasterize pages with poppler's `pdftoppm`.
    Pdftoppm,
    /// Pull the scanned image embedded in each page.
    Embedded,
}

/// OCR engine configuration. Passed through to the engine unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// OCR engine to use.
    pub engine: OcrEngineKind,

    /// Path to the tesseract binary.
    pub tesseract_path: String,

    /// Tesseract language code.
    pub language: String,

    /// Tesseract page segmentation mode.
    pub page_segmentation_mode: u8,

    /// Page renderer for PDF inputs.
    pub renderer: RendererKind,

    /// Path to the pdftoppm binary.
    pub pdftoppm_path: String,

    /// DPI for rasterizing PDF pages.
    pub render_dpi: u32,

    /// Maximum pages per document that go through OCR.
    pub max_pages: usize,

    /// Model directory for the ONNX engine.
    pub model_dir: Option<PathBuf>,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            engine: OcrEngineKind::Tesseract,
            tesseract_path: "tesseract".to_string(),
            language: "por".to_string(),
            page_segmentation_mode: 6,
            renderer: RendererKind::Pdftoppm,
            pdftoppm_path: "pdftoppm".to_string(),
            render_dpi: 200,
            max_pages: 2,
            model_dir: None,
        }
    }
}

/// What an unmatched document becomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownPolicy {
    /// Label as `Unknown`.
    Strict,
    /// Label as `PaymentSlip`.
    Permissive,
}

/// Document classification configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassificationConfig {
    /// Fallback for text matching no indicator.
    pub unknown_policy: UnknownPolicy,

    /// Payment slip indicators, checked first.
    pub slip_indicators: Vec<String>,

    /// Invoice indicators, checked only when no slip indicator matches.
    pub invoice_indicators: Vec<String>,

    /// Directory holding `model.onnx` and `tokenizer.json` of a learned
    /// classifier. When set, the learned classifier replaces the keywords.
    pub model_dir: Option<PathBuf>,

    /// Model output labels in logit order.
    pub labels: Vec<String>,

    /// Token budget for the learned classifier input.
    pub max_input_tokens: usize,
}

impl Default for ClassificationConfig {
    fn default() -> Self {
        Self {
            unknown_policy: UnknownPolicy::Permissive,
            slip_indicators: [
                "Linha Digitável",
                "Linha Digitavel",
                "Código de Barras",
                "Agência/Código do Beneficiário",
                "Código do Beneficiário",
                "Agência",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            invoice_indicators: ["Prefeitura", "Nota Fiscal", "Nota de Serviço", "Recibo"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            model_dir: None,
            labels: vec!["NF".to_string(), "BOLETO".to_string()],
            max_input_tokens: 512,
        }
    }
}

/// Field extraction configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Tokens allowed between a field label and its value.
    pub token_window: usize,

    /// Keep scanning later pages to fill fields still "not found".
    pub scan_all_pages: bool,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            token_window: 5,
            scan_all_pages: true,
        }
    }
}

/// Processing ledger configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Ledger file name inside the output directory.
    pub file_name: String,

    /// Entries older than this many days are pruned on load.
    pub retention_days: u32,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            file_name: "arquivos_processados.log".to_string(),
            retention_days: 45,
        }
    }
}

/// Tabular export configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Export file name inside the output directory. A `.xlsx` name writes a
    /// workbook, any other name delimited text.
    pub file_name: String,

    /// Column delimiter of delimited text.
    pub delimiter: char,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            file_name: "resultados_pdfs.csv".to_string(),
            delimiter: ',',
        }
    }
}

/// Input selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// File extensions (lower-case, without dot) picked up from the input
    /// directory.
    pub extensions: Vec<String>,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            extensions: vec!["pdf".to_string()],
        }
    }
}

impl InputConfig {
    /// Whether a path has one of the configured extensions.
    pub fn accepts(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| {
                let e = e.to_lowercase();
                self.extensions.iter().any(|x| x.eq_ignore_ascii_case(&e))
            })
            .unwrap_or(false)
    }
}

impl SlipscanConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, SlipscanError> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| SlipscanError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &Path) -> Result<(), SlipscanError> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| SlipscanError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Ledger path inside an output directory.
    pub fn ledger_path(&self, output_dir: &Path) -> PathBuf {
        output_dir.join(&self.ledger.file_name)
    }

    /// Export path inside an output directory.
    pub fn export_path(&self, output_dir: &Path) -> PathBuf {
        output_dir.join(&self.export.file_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: SlipscanConfig = serde_json::from_str(
            r#"{ "classification": { "unknown_policy": "strict" }, "ocr": { "max_pages": 3 } }"#,
        )
        .unwrap();

        assert_eq!(config.classification.unknown_policy, UnknownPolicy::Strict);
        assert_eq!(config.ocr.max_pages, 3);
        assert_eq!(config.ocr.language, "por");
        assert_eq!(config.ledger.retention_days, 45);
        assert_eq!(config.classification.slip_indicators.len(), 6);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = SlipscanConfig::default();
        config.ledger.retention_days = 10;
        config.save(&path).unwrap();

        let loaded = SlipscanConfig::from_file(&path).unwrap();
        assert_eq!(loaded.ledger.retention_days, 10);
        assert_eq!(loaded.ocr.engine, OcrEngineKind::Tesseract);
    }

    #[test]
    fn test_input_accepts_extension_case_insensitively() {
        let input = InputConfig::default();
        assert!(input.accepts(Path::new("a/B.PDF")));
        assert!(!input.accepts(Path::new("a/notes.txt")));
        assert!(!input.accepts(Path::new("a/noext")));
    }
}
