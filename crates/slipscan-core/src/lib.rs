//! Core library for scanned invoice and payment slip triage.
//!
//! This crate provides:
//! - Page rendering (pdftoppm or embedded scan images) and OCR (tesseract CLI,
//!   optionally a pure Rust ONNX engine)
//! - Text normalization and document classification (keywords or a learned model)
//! - Per-type field extraction with bounded label/value windows
//! - Type suffix renaming, a processing ledger for idempotent reruns and CSV or xlsx export
//! - Roster checks of expected documents and staging of mail attachments

pub mod classify;
pub mod error;
pub mod export;
pub mod extract;
pub mod fingerprint;
pub mod intake;
pub mod ledger;
pub mod models;
pub mod normalize;
pub mod ocr;
pub mod pdf;
pub mod pipeline;
pub mod roster;

pub use classify::{KeywordClassifier, TextClassifier, build_classifier};
pub use error::{Result, SlipscanError};
pub use export::{CsvExporter, ResultExporter, XlsxExporter, build_exporter};
pub use extract::{CompiledSchema, FieldExtractor, FieldSchema, FieldSpec};
pub use ledger::{LedgerEntry, ProcessingLedger};
pub use models::{DocumentType, ExtractedFields, FieldValue, NOT_FOUND, ProcessingResult, SlipscanConfig};
pub use ocr::{OcrEngine, PageRenderer};
pub use pipeline::{BatchReport, DocumentOutcome, OutcomeStatus, Pipeline, collect_inputs};

#[cfg(feature = "ml")]
pub use classify::OnnxTextClassifier;
