//! Error types for the slipscan-core library.

use thiserror::Error;

/// Main error type for the slipscan library.
#[derive(Error, Debug)]
pub enum SlipscanError {
    /// Page rendering or text recognition failed.
    #[error("OCR error: {0}")]
    Ocr(#[from] OcrError),

    /// Processing ledger could not be read or written.
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// Tabular export failed.
    #[error("export error: {0}")]
    Export(#[from] ExportError),

    /// Learned classifier could not be loaded or run.
    #[error("classifier error: {0}")]
    Classifier(#[from] ClassifierError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Roster file could not be read.
    #[error("roster error: {0}")]
    Roster(String),
}

/// Errors raised at the OCR boundary. Any of these fails a single document.
#[derive(Error, Debug)]
pub enum OcrError {
    /// The OCR engine binary or models are not installed/reachable.
    #[error("OCR engine unavailable: {0}")]
    EngineUnavailable(String),

    /// Rendering the document into page images failed.
    #[error("failed to render pages: {0}")]
    Render(String),

    /// Converting a page image to text failed.
    #[error("text recognition failed: {0}")]
    Recognition(String),

    /// The input file type cannot be rendered.
    #[error("unsupported input format: {0}")]
    UnsupportedFormat(String),

    /// Image decoding/encoding error.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// I/O error while staging pages.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors related to the processing ledger.
#[derive(Error, Debug)]
pub enum LedgerError {
    /// Reading, appending or rewriting the ledger file failed.
    #[error("I/O error on ledger: {0}")]
    Io(#[from] std::io::Error),

    /// An entry could not be serialized.
    #[error("failed to serialize entry: {0}")]
    Serialize(#[from] serde_json::Error),

    /// An entry with the same natural key is already recorded.
    #[error("{0} is already recorded")]
    Duplicate(String),

    /// A persisted line is not a valid entry. Reported, never fatal to `load`.
    #[error("malformed ledger line {line}: {reason}")]
    MalformedLine { line: usize, reason: String },
}

/// Errors related to the tabular exporter.
#[derive(Error, Debug)]
pub enum ExportError {
    /// I/O error on the export destination.
    #[error("I/O error on export: {0}")]
    Io(#[from] std::io::Error),

    /// CSV encoding or decoding failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Reading an existing workbook failed.
    #[error("Workbook read error: {0}")]
    Workbook(#[from] calamine::Error),

    /// Writing the workbook failed.
    #[error("Workbook write error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    /// The existing workbook has no sheet the results can go to.
    #[error("Unsupported workbook: {0}")]
    UnsupportedWorkbook(String),
}

/// Errors related to the learned document classifier.
#[derive(Error, Debug)]
pub enum ClassifierError {
    /// Model files are missing or unreadable.
    #[error("failed to load classifier model: {0}")]
    ModelLoad(String),

    /// Tokenizer could not be loaded or failed to encode text.
    #[error("tokenizer error: {0}")]
    Tokenizer(String),

    /// Running the model failed.
    #[error("classifier inference failed: {0}")]
    Inference(String),
}

/// Result type for the slipscan library.
pub type Result<T> = std::result::Result<T, SlipscanError>;
