//! Polar heart-rate export reader
//!
//! A Polar CSV export starts with a metadata block (a header line and a value
//! line), followed by the per-second sample table.

use crate::error::QcError;
use crate::types::{HeartRateSample, HeartRateSeries};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use csv::StringRecord;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use super::SeriesAdapter;

/// Metadata lines before the sample header in a Polar export
pub const DEFAULT_HEADER_ROWS: usize = 2;

const TIME_COLUMN: &str = "Time";
const HR_COLUMNS: [&str; 2] = ["Heart Rate (bpm)", "HR (bpm)"];
const DATE_FORMATS: [&str; 3] = ["%d-%m-%Y", "%Y-%m-%d", "%m/%d/%Y"];

/// Polar CSV adapter
#[derive(Debug, Clone, Copy)]
pub struct PolarCsvAdapter {
    header_rows: usize,
}

impl Default for PolarCsvAdapter {
    fn default() -> Self {
        Self::new(DEFAULT_HEADER_ROWS)
    }
}

impl SeriesAdapter for PolarCsvAdapter {
    fn parse(&self, path: &Path) -> Result<HeartRateSeries, QcError> {
        let file = File::open(path)?;
        self.parse_reader(file).map_err(|e| match e {
            QcError::Parse(msg) => QcError::Parse(format!("{}: {}", path.display(), msg)),
            other => other,
        })
    }
}

impl PolarCsvAdapter {
    pub fn new(header_rows: usize) -> Self {
        Self { header_rows }
    }

    /// Parse an export from any reader
    pub fn parse_reader<R: Read>(&self, reader: R) -> Result<HeartRateSeries, QcError> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);

        let mut records = rdr.records();
        let mut metadata = Vec::with_capacity(self.header_rows);
        for _ in 0..self.header_rows {
            match records.next() {
                Some(record) => metadata.push(record?),
                None => return Err(QcError::Parse("file ends inside metadata block".to_string())),
            }
        }

        let header = match records.next() {
            Some(record) => record?,
            None => return Err(QcError::Parse("missing sample header".to_string())),
        };
        let time_idx = column_index(&header, &[TIME_COLUMN]);
        let hr_idx = column_index(&header, &HR_COLUMNS);
        let (time_idx, hr_idx) = match (time_idx, hr_idx) {
            (Some(t), Some(h)) => (t, h),
            _ => {
                return Err(QcError::Parse(format!(
                    "expected columns '{}' and '{}'",
                    TIME_COLUMN, HR_COLUMNS[0]
                )))
            }
        };

        let date = session_date(&metadata).unwrap_or_else(default_date);
        let mut series = HeartRateSeries::default();
        for (line, record) in records.enumerate() {
            let record = record?;
            let raw_time = record.get(time_idx).map(str::trim).unwrap_or("");
            if raw_time.is_empty() && record.iter().all(|f| f.trim().is_empty()) {
                continue;
            }
            let time = NaiveTime::parse_from_str(raw_time, "%H:%M:%S").map_err(|e| {
                QcError::Parse(format!(
                    "bad time '{}' on sample line {}: {}",
                    raw_time,
                    line + 1,
                    e
                ))
            })?;
            let hr = record.get(hr_idx).and_then(parse_hr);
            series.push(HeartRateSample::new(NaiveDateTime::new(date, time), hr));
        }

        Ok(series)
    }
}

fn column_index(header: &StringRecord, names: &[&str]) -> Option<usize> {
    header
        .iter()
        .position(|h| names.iter().any(|n| h.trim().eq_ignore_ascii_case(n)))
}

/// Heart-rate cell value; blanks, NaN and garbage are missing readings
fn parse_hr(cell: &str) -> Option<f64> {
    cell.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Recording date from a `Date` column in the metadata block
fn session_date(metadata: &[StringRecord]) -> Option<NaiveDate> {
    metadata.windows(2).find_map(|pair| {
        let idx = column_index(&pair[0], &["Date"])?;
        let value = pair[1].get(idx)?.trim();
        DATE_FORMATS
            .iter()
            .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
    })
}

/// Date used when the export carries none; matches pandas' default for bare times
fn default_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(1900, 1, 1).unwrap_or(NaiveDate::MIN)
}
