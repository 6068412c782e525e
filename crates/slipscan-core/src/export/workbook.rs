//! Xlsx workbook sink.
//!
//! An xlsx file cannot be appended to, so every export reads the existing
//! sheet and writes the whole workbook again through a temporary file.

use std::io::Write;
use std::path::{Path, PathBuf};

use calamine::{DataType, Reader, open_workbook_auto};
use rust_xlsxwriter::{Format, Workbook, XlsxError};
use tracing::{debug, info};

use super::{ResultExporter, grow_header, initial_header, row_for, staging_dir};
use crate::error::ExportError;
use crate::models::{NOT_FOUND, ProcessingResult};

/// Name of the results sheet.
pub const SHEET_NAME: &str = "Resultados PDF";

const MAX_COLUMN_WIDTH: f64 = 80.0;

/// Appends result rows to the results sheet of a workbook.
#[derive(Debug, Clone, Default)]
pub struct XlsxExporter;

impl XlsxExporter {
    pub fn new() -> Self {
        Self
    }

    /// Append `results` to the workbook at `destination`, creating it when
    /// absent.
    pub fn export(&self, results: &[ProcessingResult], destination: &Path) -> Result<PathBuf, ExportError> {
        if results.is_empty() {
            debug!("Nothing to export");
            return Ok(destination.to_path_buf());
        }

        let mut table = if destination.exists() {
            read_sheet(destination)?
        } else {
            Vec::new()
        };

        let mut header = if table.is_empty() {
            initial_header()
        } else {
            table.remove(0)
        };
        let added = grow_header(&mut header, results);
        if !added.is_empty() {
            debug!("Workbook header grew by {:?}", added);
        }

        for row in &mut table {
            while row.len() < header.len() {
                row.push(NOT_FOUND.to_string());
            }
        }
        table.extend(results.iter().map(|r| row_for(&header, r)));

        let bytes = write_workbook(&header, &table)?;
        let mut tmp = tempfile::NamedTempFile::new_in(staging_dir(destination))?;
        tmp.write_all(&bytes)?;
        tmp.flush()?;
        tmp.persist(destination).map_err(|e| ExportError::Io(e.error))?;

        info!("Exported {} rows to {}", results.len(), destination.display());
        Ok(destination.to_path_buf())
    }
}

impl ResultExporter for XlsxExporter {
    fn export(&self, results: &[ProcessingResult], destination: &Path) -> Result<PathBuf, ExportError> {
        XlsxExporter::export(self, results, destination)
    }

    fn name(&self) -> &'static str {
        "xlsx"
    }
}

/// Rows of the results sheet, header first. Blank rows are dropped.
///
/// The results sheet is the one named [`SHEET_NAME`], or the only sheet of a
/// single-sheet workbook.
fn read_sheet(path: &Path) -> Result<Vec<Vec<String>>, ExportError> {
    let mut workbook = open_workbook_auto(path)?;
    let names = workbook.sheet_names();

    let sheet = match names.iter().find(|n| n.as_str() == SHEET_NAME) {
        Some(name) => name.clone(),
        None if names.len() == 1 => names[0].clone(),
        None => {
            return Err(ExportError::UnsupportedWorkbook(format!(
                "{} has no '{}' sheet and {} others",
                path.display(),
                SHEET_NAME,
                names.len()
            )));
        }
    };

    let range = workbook.worksheet_range(&sheet)?;
    Ok(range
        .rows()
        .map(|row| {
            row.iter()
                .map(|cell| cell.as_string().unwrap_or_default())
                .collect::<Vec<String>>()
        })
        .filter(|row| row.iter().any(|cell| !cell.trim().is_empty()))
        .map(trim_trailing_blanks)
        .collect())
}

fn trim_trailing_blanks(mut row: Vec<String>) -> Vec<String> {
    while row.last().is_some_and(|cell| cell.is_empty()) {
        row.pop();
    }
    row
}

fn write_workbook(header: &[String], rows: &[Vec<String>]) -> Result<Vec<u8>, ExportError> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(SHEET_NAME)?;

    let bold = Format::new().set_bold();
    let mut widths: Vec<usize> = header.iter().map(|h| h.chars().count()).collect();

    for (col, name) in header.iter().enumerate() {
        worksheet.write_string_with_format(0, column(col)?, name, &bold)?;
    }

    for (index, row) in rows.iter().enumerate() {
        let row_number = u32::try_from(index + 1).map_err(|_| XlsxError::RowColumnLimitError)?;
        for (col, cell) in row.iter().enumerate() {
            worksheet.write_string(row_number, column(col)?, cell)?;
            if let Some(width) = widths.get_mut(col) {
                *width = (*width).max(cell.chars().count());
            }
        }
    }

    for (col, width) in widths.iter().enumerate() {
        let width = ((*width as f64 + 2.0) * 1.2).min(MAX_COLUMN_WIDTH);
        worksheet.set_column_width(column(col)?, width)?;
    }
    worksheet.set_freeze_panes(1, 0)?;

    Ok(workbook.save_to_buffer()?)
}

fn column(index: usize) -> Result<u16, XlsxError> {
    u16::try_from(index).map_err(|_| XlsxError::RowColumnLimitError)
}
