//! Roster of expected documents.
//!
//! A roster CSV lists, per month, the aliases whose documents should be in the
//! input directory. A document matches an alias when its file stem, without a
//! type suffix, equals the alias ignoring case.

use std::collections::BTreeSet;
use std::path::Path;

use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{Result, SlipscanError};
use crate::pipeline::rename::strip_type_suffix;

const ALIAS_HEADERS: &[&str] = &["apelido"];
const MONTH_HEADERS: &[&str] = &["mês", "mes"];
const YEAR_HEADERS: &[&str] = &["ano"];
const CODE_HEADERS: &[&str] = &["codigo", "código", "chave"];

/// One roster line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RosterRow {
    /// Alias, trimmed and lower-cased.
    pub alias: String,
    pub month: Option<u32>,
    pub year: Option<i32>,
    pub code: Option<String>,
}

impl RosterRow {
    pub fn in_period(&self, period: Period) -> bool {
        self.month == Some(period.month) && self.year == Some(period.year)
    }
}

/// A calendar month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Period {
    pub month: u32,
    pub year: i32,
}

impl Period {
    pub fn new(month: u32, year: i32) -> Self {
        Self { month, year }
    }

    /// The month before `today`'s, in January the December of last year.
    pub fn previous_month(today: NaiveDate) -> Self {
        if today.month() == 1 {
            Self::new(12, today.year() - 1)
        } else {
            Self::new(today.month() - 1, today.year())
        }
    }
}

impl std::fmt::Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}/{}", self.month, self.year)
    }
}

/// Read a roster file, `;` or `,` separated.
pub fn read_roster(path: &Path) -> Result<Vec<RosterRow>> {
    let data = std::fs::read(path)?;
    parse_roster(&data)
}

/// Parse roster CSV bytes.
///
/// Requires an `Apelido` column; `Mês`, `Ano` and `Codigo` (or `chave`) are
/// optional. Rows with an empty alias are skipped.
pub fn parse_roster(data: &[u8]) -> Result<Vec<RosterRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(sniff_delimiter(data))
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(data);

    let headers = reader
        .headers()
        .map_err(|e| SlipscanError::Roster(e.to_string()))?
        .clone();

    let column = |names: &[&str]| {
        headers.iter().position(|h| {
            let h = h.trim_start_matches('\u{feff}').to_lowercase();
            names.contains(&h.as_str())
        })
    };

    let alias_idx = column(ALIAS_HEADERS)
        .ok_or_else(|| SlipscanError::Roster("missing column 'Apelido'".to_string()))?;
    let month_idx = column(MONTH_HEADERS);
    let year_idx = column(YEAR_HEADERS);
    let code_idx = column(CODE_HEADERS);

    let mut rows = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record.map_err(|e| SlipscanError::Roster(e.to_string()))?;
        let alias = record.get(alias_idx).unwrap_or("").trim().to_lowercase();
        if alias.is_empty() {
            debug!("Roster row {} has no alias", line + 2);
            continue;
        }

        let field = |idx: Option<usize>| {
            idx.and_then(|i| record.get(i))
                .map(str::trim)
                .filter(|v| !v.is_empty())
        };

        let month = field(month_idx).and_then(|v| parse_number::<u32>(v, line + 2));
        let year = field(year_idx).and_then(|v| parse_number::<i32>(v, line + 2));
        let code = field(code_idx).map(str::to_string);

        rows.push(RosterRow {
            alias,
            month,
            year,
            code,
        });
    }

    Ok(rows)
}

/// Aliases with no matching PDF in `dir`, sorted and deduplicated.
///
/// With a `period`, only rows of that month are expected.
pub fn missing_documents(
    roster: &[RosterRow],
    period: Option<Period>,
    dir: &Path,
) -> Result<Vec<String>> {
    let expected: BTreeSet<&str> = roster
        .iter()
        .filter(|row| period.is_none_or(|p| row.in_period(p)))
        .map(|row| row.alias.as_str())
        .collect();

    let present = present_stems(dir)?;
    debug!("{} expected aliases, {} PDFs present", expected.len(), present.len());

    Ok(expected
        .into_iter()
        .filter(|alias| !present.contains(*alias))
        .map(str::to_string)
        .collect())
}

/// Lower-cased PDF stems in `dir`, type suffix removed.
fn present_stems(dir: &Path) -> Result<BTreeSet<String>> {
    let mut stems = BTreeSet::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let is_pdf = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("pdf"));
        if !is_pdf || !path.is_file() {
            continue;
        }
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            stems.insert(strip_type_suffix(stem).trim().to_lowercase());
        }
    }
    Ok(stems)
}

fn sniff_delimiter(data: &[u8]) -> u8 {
    let first_line = data.split(|&b| b == b'\n').next().unwrap_or_default();
    let count = |c: u8| first_line.iter().filter(|&&b| b == c).count();
    if count(b';') > count(b',') { b';' } else { b',' }
}

fn parse_number<T: std::str::FromStr>(value: &str, line: usize) -> Option<T> {
    // Spreadsheet exports may write whole numbers as "10.0".
    let value = value.strip_suffix(".0").unwrap_or(value);
    match value.parse() {
        Ok(n) => Some(n),
        Err(_) => {
            warn!("Roster row {}: '{}' is not a number", line, value);
            None
        }
    }
}
