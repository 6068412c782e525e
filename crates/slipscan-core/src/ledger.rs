//! Append-only, retention-bounded record of processed documents.
//!
//! One JSON object per line:
//! `{"arquivo", "tipo", "campos_extraidos", "data_processo", "sha256"}`.
//! Lines are independent; a malformed or truncated line is skipped on load.

use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use chrono::{Duration, Local, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::LedgerError;
use crate::extract::FieldSchema;
use crate::models::{DocumentType, ExtractedFields, ProcessingResult};

/// Timestamp format of `data_processo`.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One processed document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Original file name.
    #[serde(rename = "arquivo")]
    pub file_name: String,

    #[serde(rename = "tipo")]
    pub doc_type: DocumentType,

    #[serde(rename = "campos_extraidos", default)]
    pub fields: ExtractedFields,

    /// Processing time. Entries without one are never pruned.
    #[serde(
        rename = "data_processo",
        default,
        with = "timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub processed_at: Option<NaiveDateTime>,

    /// Hex SHA-256 of the source file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
}

impl LedgerEntry {
    /// Entry for a successful result, stamped with the current local time.
    pub fn from_result(result: &ProcessingResult, sha256: Option<String>) -> Self {
        Self {
            file_name: result.original_name.clone(),
            doc_type: result.doc_type,
            fields: result.fields.clone(),
            processed_at: Some(now()),
            sha256,
        }
    }

    /// Override the processing time.
    pub fn with_processed_at(mut self, processed_at: Option<NaiveDateTime>) -> Self {
        self.processed_at = processed_at;
        self
    }

    pub fn natural_key(&self) -> Option<NaturalKey> {
        NaturalKey::from_fields(self.doc_type, &self.fields)
    }
}

/// Fields that identify one document instance of a type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NaturalKey {
    pub doc_type: DocumentType,
    pub first: String,
    pub second: String,
}

impl NaturalKey {
    /// Build the key, or `None` when the type has no key or either component
    /// is missing or not found.
    pub fn from_fields(doc_type: DocumentType, fields: &ExtractedFields) -> Option<Self> {
        let schema = FieldSchema::for_type(doc_type);
        let (first, second) = schema.natural_key()?;

        Some(Self {
            doc_type,
            first: fields.found(first)?.to_string(),
            second: fields.found(second)?.to_string(),
        })
    }
}

/// What happened while loading.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Entries read.
    pub loaded: usize,
    /// Lines skipped as malformed, with their 1-based line number.
    pub malformed: Vec<usize>,
}

/// The processing ledger, loaded in memory and backed by a JSONL file.
#[derive(Debug)]
pub struct ProcessingLedger {
    path: PathBuf,
    entries: Vec<LedgerEntry>,
    keys: HashSet<NaturalKey>,
    fingerprints: HashSet<String>,
    report: LoadReport,
}

impl ProcessingLedger {
    /// Load the ledger at `path`. A missing file is an empty ledger.
    ///
    /// Malformed lines are skipped individually, logged and counted in the
    /// load report.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, LedgerError> {
        let path = path.into();
        let mut ledger = Self {
            path,
            entries: Vec::new(),
            keys: HashSet::new(),
            fingerprints: HashSet::new(),
            report: LoadReport::default(),
        };

        if !ledger.path.exists() {
            debug!("No ledger at {}, starting empty", ledger.path.display());
            return Ok(ledger);
        }

        let reader = BufReader::new(File::open(&ledger.path)?);
        for (index, line) in reader.split(b'\n').enumerate() {
            let line = line?;
            let line_no = index + 1;
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }

            match parse_line(&line, line_no) {
                Ok(entry) => ledger.index(entry),
                Err(e) => {
                    warn!("{}: {}", ledger.path.display(), e);
                    ledger.report.malformed.push(line_no);
                }
            }
        }

        ledger.report.loaded = ledger.entries.len();
        info!(
            "Loaded {} ledger entries from {} ({} malformed)",
            ledger.report.loaded,
            ledger.path.display(),
            ledger.report.malformed.len()
        );

        Ok(ledger)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn load_report(&self) -> &LoadReport {
        &self.report
    }

    /// Remove entries older than `retention_days`, measured from now.
    pub fn prune(&mut self, retention_days: u32) -> Result<bool, LedgerError> {
        self.prune_at(now(), retention_days)
    }

    /// Remove entries processed before `now - retention_days`.
    ///
    /// Entries without a timestamp are kept. The file is rewritten only when
    /// something was removed, via a temporary file and an atomic rename;
    /// lines skipped as malformed at load are not carried over.
    pub fn prune_at(&mut self, now: NaiveDateTime, retention_days: u32) -> Result<bool, LedgerError> {
        let Some(cutoff) = Duration::try_days(i64::from(retention_days))
            .and_then(|retention| now.checked_sub_signed(retention))
        else {
            debug!(
                "Retention of {} days reaches before any date, nothing to prune",
                retention_days
            );
            return Ok(false);
        };
        let before = self.entries.len();
        self.entries.retain(|e| e.processed_at.is_none_or(|t| t >= cutoff));
        let removed = before - self.entries.len();

        if removed == 0 {
            debug!("Nothing to prune in {}", self.path.display());
            return Ok(false);
        }

        self.reindex();
        self.rewrite()?;
        self.report.malformed.clear();
        info!(
            "Pruned {} ledger entries older than {} days",
            removed, retention_days
        );
        Ok(true)
    }

    /// Drop every entry after the first `len`, rewriting the file. Returns
    /// the dropped entries, oldest first.
    ///
    /// Used to undo the entries of a batch whose results could not be
    /// exported, so those documents are processed again on the next run.
    pub fn truncate(&mut self, len: usize) -> Result<Vec<LedgerEntry>, LedgerError> {
        if len >= self.entries.len() {
            return Ok(Vec::new());
        }

        let dropped: Vec<LedgerEntry> = self.entries.drain(len..).collect();
        self.reindex();
        self.rewrite()?;
        self.report.malformed.clear();

        for entry in &dropped {
            debug!("Dropped {} from {}", entry.file_name, self.path.display());
        }
        info!("Rolled back {} ledger entries", dropped.len());
        Ok(dropped)
    }

    /// Whether a document with the same type and complete natural key was
    /// already recorded. Incomplete keys are never duplicates.
    pub fn contains(&self, doc_type: DocumentType, fields: &ExtractedFields) -> bool {
        NaturalKey::from_fields(doc_type, fields)
            .map(|key| self.keys.contains(&key))
            .unwrap_or(false)
    }

    /// Whether a document with this content digest was already recorded.
    pub fn contains_fingerprint(&self, sha256: &str) -> bool {
        self.fingerprints.contains(sha256)
    }

    /// Append one entry as a new line. Prior lines are never rewritten.
    ///
    /// An entry whose complete natural key is already recorded is rejected
    /// and nothing is written.
    pub fn append(&mut self, entry: LedgerEntry) -> Result<(), LedgerError> {
        if entry.natural_key().is_some_and(|key| self.keys.contains(&key)) {
            return Err(LedgerError::Duplicate(entry.file_name));
        }

        let mut line = serde_json::to_string(&entry)?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)?;

        if ends_without_newline(&mut file)? {
            warn!(
                "{} ends with a partial line; starting a new one",
                self.path.display()
            );
            file.write_all(b"\n")?;
        }

        file.write_all(line.as_bytes())?;
        file.flush()?;

        debug!("Recorded {} as {}", entry.file_name, entry.doc_type);
        self.index(entry);
        Ok(())
    }

    fn index(&mut self, entry: LedgerEntry) {
        if let Some(key) = entry.natural_key() {
            self.keys.insert(key);
        }
        if let Some(sha) = &entry.sha256 {
            self.fingerprints.insert(sha.clone());
        }
        self.entries.push(entry);
    }

    fn reindex(&mut self) {
        let entries = std::mem::take(&mut self.entries);
        self.keys.clear();
        self.fingerprints.clear();
        for entry in entries {
            self.index(entry);
        }
    }

    fn rewrite(&self) -> Result<(), LedgerError> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        for entry in &self.entries {
            serde_json::to_writer(&mut tmp, entry)?;
            tmp.write_all(b"\n")?;
        }
        tmp.flush()?;
        tmp.persist(&self.path).map_err(|e| LedgerError::Io(e.error))?;
        Ok(())
    }
}

fn parse_line(line: &[u8], line_no: usize) -> Result<LedgerEntry, LedgerError> {
    serde_json::from_slice(line).map_err(|e| LedgerError::MalformedLine {
        line: line_no,
        reason: e.to_string(),
    })
}

fn ends_without_newline(file: &mut File) -> std::io::Result<bool> {
    let len = file.metadata()?.len();
    if len == 0 {
        return Ok(false);
    }
    file.seek(SeekFrom::Start(len - 1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] != b'\n')
}

/// Local time truncated to whole seconds, as persisted.
fn now() -> NaiveDateTime {
    let now = Local::now().naive_local();
    now.with_nanosecond(0).unwrap_or(now)
}

mod timestamp {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    use super::TIMESTAMP_FORMAT;

    pub fn serialize<S: Serializer>(
        value: &Option<NaiveDateTime>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(t) => serializer.serialize_str(&t.format(TIMESTAMP_FORMAT).to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<NaiveDateTime>, D::Error> {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        match raw.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(s) => NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
                .map(Some)
                .map_err(serde::de::Error::custom),
        }
    }
}
