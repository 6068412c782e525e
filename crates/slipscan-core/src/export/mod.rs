//! Incremental tabular export of processed documents.
//!
//! The header is `Original Filename, Renamed Filename, Type` followed by the
//! field columns. An existing header keeps its order; unseen fields become
//! new trailing columns, sorted. Growing the header keeps every prior cell
//! and gives prior rows `not found` in the added columns.
//!
//! Two sinks share these rules: delimited text and an xlsx workbook. The
//! destination's extension picks one.

mod delimited;
mod workbook;

pub use delimited::CsvExporter;
pub use workbook::{SHEET_NAME, XlsxExporter};

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::ExportError;
use crate::models::config::ExportConfig;
use crate::models::{NOT_FOUND, ProcessingResult};

pub const ORIGINAL_COLUMN: &str = "Original Filename";
pub const RENAMED_COLUMN: &str = "Renamed Filename";
pub const TYPE_COLUMN: &str = "Type";

/// Appends result rows to a table at a destination path.
pub trait ResultExporter: Send + Sync {
    /// Append `results` to `destination`, creating it when absent.
    fn export(&self, results: &[ProcessingResult], destination: &Path) -> Result<PathBuf, ExportError>;

    /// Sink name for logs.
    fn name(&self) -> &'static str;
}

/// Build the exporter for the configured file name: `.xlsx` writes a
/// workbook, anything else delimited text.
pub fn build_exporter(config: &ExportConfig) -> Box<dyn ResultExporter> {
    let exporter: Box<dyn ResultExporter> = if is_workbook(Path::new(&config.file_name)) {
        Box::new(XlsxExporter::new())
    } else {
        Box::new(CsvExporter::new().with_delimiter(config.delimiter))
    };
    debug!("Exporting {} as {}", config.file_name, exporter.name());
    exporter
}

fn is_workbook(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("xlsx"))
}

/// Header for a table that has none yet.
fn initial_header() -> Vec<String> {
    vec![
        ORIGINAL_COLUMN.to_string(),
        RENAMED_COLUMN.to_string(),
        TYPE_COLUMN.to_string(),
    ]
}

/// Append the fields of `results` missing from `header`, sorted. Returns the
/// added column names.
fn grow_header(header: &mut Vec<String>, results: &[ProcessingResult]) -> Vec<String> {
    let fields: BTreeSet<&str> = results.iter().flat_map(|r| r.fields.names()).collect();
    let added: Vec<String> = fields
        .into_iter()
        .filter(|f| !header.iter().any(|h| h == f))
        .map(String::from)
        .collect();
    header.extend(added.iter().cloned());
    added
}

/// Cells of one result in header order.
fn row_for(header: &[String], result: &ProcessingResult) -> Vec<String> {
    header
        .iter()
        .map(|column| match column.as_str() {
            ORIGINAL_COLUMN => result.original_name.clone(),
            RENAMED_COLUMN => result.renamed_name.clone(),
            TYPE_COLUMN => result.type_label(),
            field => result
                .fields
                .get(field)
                .map(|v| v.as_str().to_string())
                .unwrap_or_else(|| NOT_FOUND.to_string()),
        })
        .collect()
}

/// Directory that receives the temporary file of an atomic rewrite.
fn staging_dir(destination: &Path) -> PathBuf {
    match destination.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DocumentType, ExtractedFields, FieldValue};
    use pretty_assertions::assert_eq;

    fn config(file_name: &str) -> ExportConfig {
        ExportConfig {
            file_name: file_name.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_extension_selects_sink() {
        assert_eq!(build_exporter(&config("resultados_pdfs.csv")).name(), "csv");
        assert_eq!(build_exporter(&config("Resultados.XLSX")).name(), "xlsx");
        assert_eq!(build_exporter(&config("resultados")).name(), "csv");
    }

    #[test]
    fn test_grow_header_adds_sorted_unseen_fields() {
        let mut fields = ExtractedFields::new();
        fields.insert("Vencimento", FieldValue::Found("10/11/2025".into()));
        fields.insert("Número do Documento", FieldValue::NotFound);
        let result = ProcessingResult {
            original_name: "a.pdf".into(),
            renamed_name: "a_BOLETO.pdf".into(),
            doc_type: DocumentType::PaymentSlip,
            fields,
            error: None,
        };

        let mut header = initial_header();
        header.push("Vencimento".into());
        let added = grow_header(&mut header, std::slice::from_ref(&result));

        assert_eq!(added, vec!["Número do Documento"]);
        assert_eq!(
            row_for(&header, &result),
            vec!["a.pdf", "a_BOLETO.pdf", "BOLETO", "10/11/2025", "not found"]
        );
    }
}
