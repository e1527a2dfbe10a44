//! File-backed sources: CSV, JSON, and XLSX.
//!
//! The format comes from the file extension alone (case-insensitive). A file
//! is always parsed in full; row limits are applied by the caller after
//! parsing, never inside the parsers.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use super::{SourceCapabilities, SourceKind, TabularSource};
use crate::aggregate::{aggregate_ranked, AggregationRequest, Bucket};
use crate::error::{ConnectorError, Result};
use crate::schema::{record_from_json, Record, Scalar};

/// Largest magnitude a CSV cell may have and still be read as a number.
/// Larger values stay text so no digits are silently lost.
const MAX_EXACT_FLOAT: f64 = 9_007_199_254_740_992.0;

/// Detects the source kind from a path's extension.
///
/// # Errors
///
/// Returns [`ConnectorError::UnsupportedSource`] for anything other than
/// `.csv`, `.json`, or `.xlsx`.
pub fn detect_format(path: &Path) -> Result<SourceKind> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "csv" => Ok(SourceKind::Csv),
        "json" => Ok(SourceKind::Json),
        "xlsx" => Ok(SourceKind::Xlsx),
        "" => Err(ConnectorError::UnsupportedSource(format!(
            "file '{}' has no extension",
            path.display()
        ))),
        other => Err(ConnectorError::UnsupportedSource(format!(
            "file type '.{other}'"
        ))),
    }
}

/// Reads and parses a whole file.
///
/// # Errors
///
/// Returns [`ConnectorError::UnsupportedSource`] before any I/O if the
/// extension is not recognised, [`ConnectorError::Io`] if the file cannot
/// be read, or [`ConnectorError::Parse`] if its content is malformed.
pub async fn parse_file(path: &Path) -> Result<Vec<Record>> {
    FileSource::open(path)?.read_all().await
}

/// Parses file content of a known kind.
///
/// # Errors
///
/// Returns [`ConnectorError::Parse`] for malformed content, or
/// [`ConnectorError::UnsupportedSource`] for a non-file kind.
pub fn parse_bytes(kind: SourceKind, bytes: Vec<u8>) -> Result<Vec<Record>> {
    match kind {
        SourceKind::Csv => parse_csv(&bytes),
        SourceKind::Json => parse_json(&bytes),
        #[cfg(feature = "xlsx")]
        SourceKind::Xlsx => parse_xlsx(bytes),
        #[cfg(not(feature = "xlsx"))]
        SourceKind::Xlsx => Err(ConnectorError::UnsupportedSource(
            "xlsx support is not compiled in".into(),
        )),
        other => Err(ConnectorError::UnsupportedSource(format!(
            "{other} is not a file format"
        ))),
    }
}

// ── CSV ────────────────────────────────────────────────────────────

/// Parses CSV with a required header row.
///
/// Blank lines are skipped. Cells are typed: empty → null,
/// `true`/`TRUE`/`false`/`FALSE` → boolean, plain decimals → numbers,
/// anything else stays text. Short rows are padded with nulls and extra
/// cells are ignored.
///
/// # Errors
///
/// Returns [`ConnectorError::Parse`] on malformed quoting or invalid UTF-8.
pub fn parse_csv(bytes: &[u8]) -> Result<Vec<Record>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes);

    let mut row = csv::StringRecord::new();
    let mut next_row = |row: &mut csv::StringRecord| -> Result<bool> {
        loop {
            if !reader
                .read_record(row)
                .map_err(|e| ConnectorError::parse("csv", e))?
            {
                return Ok(false);
            }
            if !is_blank_row(row) {
                return Ok(true);
            }
        }
    };

    if !next_row(&mut row)? {
        return Ok(Vec::new());
    }
    let headers: Vec<String> = row.iter().map(str::to_string).collect();

    let mut records = Vec::new();
    while next_row(&mut row)? {
        let record: Record = headers
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), row.get(i).map_or(Scalar::Null, csv_cell)))
            .collect();
        records.push(record);
    }

    Ok(records)
}

fn is_blank_row(row: &csv::StringRecord) -> bool {
    row.len() == 1 && row[0].trim().is_empty()
}

fn csv_cell(raw: &str) -> Scalar {
    match raw {
        "" => Scalar::Null,
        "true" | "TRUE" => Scalar::Bool(true),
        "false" | "FALSE" => Scalar::Bool(false),
        _ => match parse_csv_number(raw) {
            Some(n) => number_scalar(n),
            None => Scalar::Text(raw.to_string()),
        },
    }
}

/// Accepts `-?(digits[.digits]|.digits)([eE][+-]?digits)?` with surrounding
/// whitespace, within the exactly-representable integer range.
fn parse_csv_number(raw: &str) -> Option<f64> {
    let s = raw.trim();
    let unsigned = s.strip_prefix('-').unwrap_or(s);
    let (mantissa, exponent) = match unsigned.find(['e', 'E']) {
        Some(i) => (&unsigned[..i], Some(&unsigned[i + 1..])),
        None => (unsigned, None),
    };

    let mut digits = 0;
    let mut dots = 0;
    for b in mantissa.bytes() {
        match b {
            b'0'..=b'9' => digits += 1,
            b'.' => dots += 1,
            _ => return None,
        }
    }
    if digits == 0 || dots > 1 {
        return None;
    }

    if let Some(exp) = exponent {
        let exp_digits = exp.strip_prefix(['+', '-']).unwrap_or(exp);
        if exp_digits.is_empty() || !exp_digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
    }

    let n: f64 = s.parse().ok()?;
    (n.abs() <= MAX_EXACT_FLOAT).then_some(n)
}

#[allow(clippy::cast_possible_truncation)]
fn number_scalar(n: f64) -> Scalar {
    if n.fract() == 0.0 && n.abs() <= MAX_EXACT_FLOAT {
        Scalar::Integer(n as i64)
    } else {
        Scalar::Float(n)
    }
}

// ── JSON ───────────────────────────────────────────────────────────

/// Parses a JSON array of objects, or a single object as one row.
///
/// Nested arrays and objects inside a row are kept as JSON text.
///
/// # Errors
///
/// Returns [`ConnectorError::Parse`] for invalid JSON, a top-level scalar,
/// or an array element that is not an object.
pub fn parse_json(bytes: &[u8]) -> Result<Vec<Record>> {
    let value: serde_json::Value =
        serde_json::from_slice(bytes).map_err(|e| ConnectorError::parse("json", e))?;

    match value {
        serde_json::Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(i, item)| {
                record_from_json(item).ok_or_else(|| {
                    ConnectorError::parse("json", format!("element {i} is not an object"))
                })
            })
            .collect(),
        obj @ serde_json::Value::Object(_) => Ok(record_from_json(obj).into_iter().collect()),
        _ => Err(ConnectorError::parse(
            "json",
            "expected an array of objects or a single object",
        )),
    }
}

// ── XLSX ───────────────────────────────────────────────────────────

/// Parses the first worksheet of an XLSX workbook; its first row is the
/// header.
///
/// Empty cells and error cells become null, whole numbers become integers,
/// and date cells become ISO dates (`YYYY-MM-DD`, or with a time part when
/// it is not midnight). Fully empty rows are skipped.
///
/// # Errors
///
/// Returns [`ConnectorError::Parse`] if the workbook cannot be opened or has
/// no worksheet.
#[cfg(feature = "xlsx")]
pub fn parse_xlsx(bytes: Vec<u8>) -> Result<Vec<Record>> {
    use calamine::{Data, Reader, Xlsx};

    let mut workbook: Xlsx<_> = Xlsx::new(std::io::Cursor::new(bytes))
        .map_err(|e| ConnectorError::parse("xlsx", e))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| ConnectorError::parse("xlsx", "workbook has no worksheets"))?
        .map_err(|e| ConnectorError::parse("xlsx", e))?;

    let mut rows = range.rows();
    let Some(header_row) = rows.next() else {
        return Ok(Vec::new());
    };
    let headers: Vec<String> = header_row
        .iter()
        .enumerate()
        .map(|(i, cell)| match cell {
            Data::Empty => format!("column_{}", i + 1),
            other => other.to_string(),
        })
        .collect();

    let records: Vec<Record> = rows
        .filter(|row| !row.iter().all(|c| matches!(c, Data::Empty)))
        .map(|row| {
            headers
                .iter()
                .enumerate()
                .map(|(i, name)| (name.clone(), row.get(i).map_or(Scalar::Null, xlsx_cell)))
                .collect()
        })
        .collect();
    Ok(records)
}

#[cfg(feature = "xlsx")]
fn xlsx_cell(cell: &calamine::Data) -> Scalar {
    use calamine::{Data, DataType};

    match cell {
        Data::Empty | Data::Error(_) => Scalar::Null,
        Data::Int(i) => Scalar::Integer(*i),
        Data::Float(f) => number_scalar(*f),
        Data::Bool(b) => Scalar::Bool(*b),
        Data::String(s) | Data::DurationIso(s) => Scalar::Text(s.clone()),
        Data::DateTimeIso(s) => Scalar::Date(s.clone()),
        Data::DateTime(dt) => match cell.as_datetime() {
            Some(naive) if naive.time() == chrono::NaiveTime::MIN => {
                Scalar::Date(naive.date().format("%Y-%m-%d").to_string())
            }
            Some(naive) => Scalar::Date(naive.format("%Y-%m-%dT%H:%M:%S").to_string()),
            None => Scalar::Float(dt.as_f64()),
        },
    }
}

// ── Source ─────────────────────────────────────────────────────────

/// A [`TabularSource`] over one local file.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
    kind: SourceKind,
}

impl FileSource {
    /// Creates a source for `path`, detecting its format. Does not touch
    /// the file system.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectorError::UnsupportedSource`] for an unrecognised
    /// extension.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let kind = detect_format(&path)?;
        Ok(Self { path, kind })
    }

    /// Detected format.
    #[must_use]
    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    /// File path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parses the entire file.
    ///
    /// # Errors
    ///
    /// Returns an I/O or parse error.
    pub async fn read_all(&self) -> Result<Vec<Record>> {
        let bytes = tokio::fs::read(&self.path).await?;
        let records = parse_bytes(self.kind, bytes)?;
        debug!(
            path = %self.path.display(),
            format = %self.kind,
            rows = records.len(),
            "parsed file"
        );
        Ok(records)
    }
}

#[async_trait]
impl TabularSource for FileSource {
    #[allow(clippy::unnecessary_literal_bound)]
    fn source_name(&self) -> &str {
        "file"
    }

    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities {
            supports_aggregate_pushdown: false,
            loads_entire_source: true,
        }
    }

    async fn sample(&self, limit: usize) -> Result<Vec<Record>> {
        let mut records = self.read_all().await?;
        records.truncate(limit);
        Ok(records)
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.read_all().await?.len() as u64)
    }

    async fn aggregate(&self, request: &AggregationRequest) -> Result<Vec<Bucket>> {
        let records = self.read_all().await?;
        Ok(aggregate_ranked(&records, request))
    }

    async fn sample_and_count(&self, limit: usize) -> Result<(Vec<Record>, u64)> {
        let mut records = self.read_all().await?;
        let count = records.len() as u64;
        records.truncate(limit);
        Ok((records, count))
    }
}
