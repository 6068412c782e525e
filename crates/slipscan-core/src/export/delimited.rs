//! Delimited text sink. Rows of a table whose header already covers every
//! field are appended in place.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use tracing::{debug, info};

use super::{ResultExporter, grow_header, initial_header, row_for, staging_dir};
use crate::error::ExportError;
use crate::models::{NOT_FOUND, ProcessingResult};

/// Appends result rows to a CSV table, growing its header as needed.
#[derive(Debug, Clone)]
pub struct CsvExporter {
    delimiter: u8,
}

impl CsvExporter {
    pub fn new() -> Self {
        Self { delimiter: b',' }
    }

    /// Set the column delimiter. Non-ASCII delimiters fall back to `,`.
    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = u8::try_from(delimiter)
            .ok()
            .filter(u8::is_ascii)
            .unwrap_or(b',');
        self
    }

    /// Append `results` to `destination`, creating it when absent.
    pub fn export(&self, results: &[ProcessingResult], destination: &Path) -> Result<PathBuf, ExportError> {
        if results.is_empty() {
            debug!("Nothing to export");
            return Ok(destination.to_path_buf());
        }

        let existing = if destination.exists() {
            std::fs::read(destination)?
        } else {
            Vec::new()
        };

        let (mut header, body_start) = self.read_header(&existing)?;
        let is_new = header.is_empty();
        if is_new {
            header = initial_header();
        }
        let added = grow_header(&mut header, results);

        let rows: Vec<Vec<String>> = results.iter().map(|r| row_for(&header, r)).collect();

        if is_new || !added.is_empty() {
            self.rewrite_header(destination, &header, &existing[body_start..], &rows)?;
            if !is_new {
                info!("Export header grew by {:?}", added);
            }
        } else {
            self.append_rows(destination, &existing, &rows)?;
        }

        info!("Exported {} rows to {}", rows.len(), destination.display());
        Ok(destination.to_path_buf())
    }

    /// Header of an existing table and the byte offset where its body starts.
    /// Empty when the table has no header yet.
    fn read_header(&self, bytes: &[u8]) -> Result<(Vec<String>, usize), ExportError> {
        if bytes.is_empty() {
            return Ok((Vec::new(), 0));
        }

        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .delimiter(self.delimiter)
            .from_reader(bytes);

        let mut record = StringRecord::new();
        if !reader.read_record(&mut record)? {
            return Ok((Vec::new(), bytes.len()));
        }

        let header = record.iter().map(|h| h.trim().to_string()).collect();
        let mut offset = (reader.position().byte() as usize).min(bytes.len());
        // The reader may stop between the `\r` and `\n` of a CRLF terminator.
        while offset < bytes.len() && matches!(bytes[offset], b'\r' | b'\n') {
            offset += 1;
        }
        Ok((header, offset))
    }

    fn rewrite_header(
        &self,
        destination: &Path,
        header: &[String],
        body: &[u8],
        rows: &[Vec<String>],
    ) -> Result<(), ExportError> {
        let mut tmp = tempfile::NamedTempFile::new_in(staging_dir(destination))?;

        {
            let mut writer = self.writer(tmp.as_file_mut());
            writer.write_record(header)?;

            let mut reader = ReaderBuilder::new()
                .has_headers(false)
                .flexible(true)
                .delimiter(self.delimiter)
                .from_reader(body);
            let mut padded = 0;
            for record in reader.records() {
                let mut record = record?;
                while record.len() < header.len() {
                    record.push_field(NOT_FOUND);
                    padded += 1;
                }
                writer.write_record(&record)?;
            }
            if padded > 0 {
                debug!("Padded prior rows with {} '{}' cells", padded, NOT_FOUND);
            }

            for row in rows {
                writer.write_record(row)?;
            }
            writer.flush()?;
        }

        tmp.persist(destination).map_err(|e| ExportError::Io(e.error))?;
        Ok(())
    }

    fn append_rows(&self, destination: &Path, existing: &[u8], rows: &[Vec<String>]) -> Result<(), ExportError> {
        let mut file = OpenOptions::new().append(true).open(destination)?;
        if !existing.ends_with(b"\n") {
            file.write_all(b"\n")?;
        }

        let mut writer = self.writer(file);
        for row in rows {
            writer.write_record(row)?;
        }
        writer.flush()?;
        Ok(())
    }

    fn writer<W: Write>(&self, inner: W) -> csv::Writer<W> {
        WriterBuilder::new()
            .delimiter(self.delimiter)
            .from_writer(inner)
    }
}

impl Default for CsvExporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultExporter for CsvExporter {
    fn export(&self, results: &[ProcessingResult], destination: &Path) -> Result<PathBuf, ExportError> {
        CsvExporter::export(self, results, destination)
    }

    fn name(&self) -> &'static str {
        "csv"
    }
}
