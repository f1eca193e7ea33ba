//! CSV bar loading.
//!
//! A bar table is one time column plus any number of numeric columns sharing
//! its index. Empty cells load as NaN (the kernels' missing marker) and
//! boolean-like cells (`true/false`, `1/0`) load as `1.0/0.0`, so filters
//! and contract-change flags live alongside prices.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use thiserror::Error;
use tracing::debug;

use crate::config::DataConfig;

/// Errors from the data loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to open {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("column '{0}' not found")]
    MissingColumn(String),

    #[error("row {row}: cannot parse time '{value}'")]
    BadTime { row: usize, value: String },

    #[error("row {row}, column '{column}': cannot parse '{value}' as a number")]
    BadCell {
        column: String,
        row: usize,
        value: String,
    },
}

const TIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S%.f",
    "%Y%m%d %H:%M:%S%.f",
];

/// Column-oriented bars.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BarTable {
    pub time: Vec<NaiveDateTime>,
    pub columns: BTreeMap<String, Vec<f64>>,
}

impl BarTable {
    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    pub fn column(&self, name: &str) -> Result<&[f64], LoadError> {
        self.columns
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| LoadError::MissingColumn(name.to_string()))
    }

    /// Read a column as flags: non-zero is true, missing cells take `null_as`.
    pub fn flags(&self, name: &str, null_as: bool) -> Result<Vec<bool>, LoadError> {
        Ok(self
            .column(name)?
            .iter()
            .map(|&v| if v.is_nan() { null_as } else { v != 0.0 })
            .collect())
    }

    pub fn insert(&mut self, name: impl Into<String>, values: Vec<f64>) {
        self.columns.insert(name.into(), values);
    }
}

/// Load a CSV with a `time` column in one of the common layouts.
pub fn load_table(path: impl AsRef<Path>) -> Result<BarTable, LoadError> {
    let path = path.as_ref();
    let file = open(path)?;
    read_table(file, "time", None)
}

/// Load the table a run file points at.
pub fn load_data(config: &DataConfig) -> Result<BarTable, LoadError> {
    let file = open(&config.path)?;
    let table = read_table(file, &config.time_column, config.time_format.as_deref())?;
    debug!(path = %config.path.display(), rows = table.len(), "loaded bars");
    Ok(table)
}

fn open(path: &Path) -> Result<std::fs::File, LoadError> {
    std::fs::File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Parse CSV from any reader. Rows are numbered from 1 after the header.
pub fn read_table<R: Read>(
    reader: R,
    time_column: &str,
    time_format: Option<&str>,
) -> Result<BarTable, LoadError> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let headers = rdr.headers()?.clone();
    let time_idx = headers
        .iter()
        .position(|h| h == time_column)
        .ok_or_else(|| LoadError::MissingColumn(time_column.to_string()))?;

    let names: Vec<&str> = headers.iter().collect();
    let mut values: Vec<Vec<f64>> = vec![Vec::new(); names.len()];
    let mut time = Vec::new();

    for (i, record) in rdr.records().enumerate() {
        let record = record?;
        let row = i + 1;
        for (col, cell) in record.iter().enumerate() {
            if col == time_idx {
                time.push(parse_time(cell, time_format).ok_or_else(|| LoadError::BadTime {
                    row,
                    value: cell.to_string(),
                })?);
            } else {
                let v = parse_cell(cell).ok_or_else(|| LoadError::BadCell {
                    column: names[col].to_string(),
                    row,
                    value: cell.to_string(),
                })?;
                values[col].push(v);
            }
        }
    }

    let columns = names
        .iter()
        .zip(values)
        .enumerate()
        .filter(|(col, _)| *col != time_idx)
        .map(|(_, (name, v))| (name.to_string(), v))
        .collect();
    Ok(BarTable { time, columns })
}

fn parse_cell(cell: &str) -> Option<f64> {
    if cell.is_empty() || cell.eq_ignore_ascii_case("nan") || cell.eq_ignore_ascii_case("null") {
        return Some(f64::NAN);
    }
    if cell.eq_ignore_ascii_case("true") {
        return Some(1.0);
    }
    if cell.eq_ignore_ascii_case("false") {
        return Some(0.0);
    }
    cell.parse().ok()
}

fn parse_time(cell: &str, format: Option<&str>) -> Option<NaiveDateTime> {
    if let Some(fmt) = format {
        return NaiveDateTime::parse_from_str(cell, fmt)
            .ok()
            .or_else(|| NaiveDate::parse_from_str(cell, fmt).ok()?.and_hms_opt(0, 0, 0));
    }
    if let Some(t) = TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(cell, fmt).ok())
    {
        return Some(t);
    }
    if let Ok(d) = NaiveDate::parse_from_str(cell, "%Y-%m-%d") {
        return d.and_hms_opt(0, 0, 0);
    }
    let millis: i64 = cell.parse().ok()?;
    DateTime::from_timestamp_millis(millis).map(|t| t.naive_utc())
}
