//! QC report aggregation
//!
//! Flattens per-subject, per-file findings into one tidy table and writes it
//! as CSV. Every finding detail becomes a row; a finding without details still
//! produces a single row with empty timing fields.

use crate::error::QcError;
use crate::types::{Finding, FindingKind, SubjectFindings};
use chrono::NaiveDateTime;
use serde::{Serialize, Serializer};
use std::cmp::Ordering;
use std::fs;
use std::path::Path;

/// Column names of the written report
pub const REPORT_HEADER: [&str; 8] = [
    "subject",
    "file",
    "error_type",
    "message",
    "start_time",
    "end_time",
    "duration_s",
    "length",
];

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One report line
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRow {
    pub subject: String,
    pub file: String,
    pub error_type: FindingKind,
    pub message: String,
    #[serde(serialize_with = "serialize_time")]
    pub start_time: Option<NaiveDateTime>,
    #[serde(serialize_with = "serialize_time")]
    pub end_time: Option<NaiveDateTime>,
    pub duration_s: Option<f64>,
    pub length: Option<usize>,
}

fn serialize_time<S: Serializer>(
    time: &Option<NaiveDateTime>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match time {
        Some(t) => serializer.serialize_str(&t.format(TIME_FORMAT).to_string()),
        None => serializer.serialize_none(),
    }
}

/// Detail row in the common shape shared by every finding kind
#[derive(Debug, Clone, Copy, PartialEq)]
struct DetailRow {
    start_time: Option<NaiveDateTime>,
    end_time: Option<NaiveDateTime>,
    duration_s: Option<f64>,
    length: Option<usize>,
}

impl DetailRow {
    const EMPTY: DetailRow = DetailRow {
        start_time: None,
        end_time: None,
        duration_s: None,
        length: None,
    };
}

fn normalize_details(finding: &Finding) -> Vec<DetailRow> {
    match finding {
        Finding::Gap { gaps, .. } => gaps
            .iter()
            .map(|g| DetailRow {
                start_time: Some(g.start),
                end_time: Some(g.end),
                duration_s: Some(g.duration_secs),
                length: None,
            })
            .collect(),
        Finding::NanRun { runs, .. } => runs
            .iter()
            .map(|r| DetailRow {
                start_time: Some(r.start),
                end_time: Some(r.end),
                duration_s: None,
                length: Some(r.length),
            })
            .collect(),
        Finding::Failed { .. } => Vec::new(),
    }
}

/// Flat, sorted QC report
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QcReport {
    rows: Vec<ReportRow>,
}

impl QcReport {
    pub fn rows(&self) -> &[ReportRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Write the report as CSV, creating parent directories as needed.
    ///
    /// The header is written even when the report has no rows.
    pub fn write_csv(&self, path: &Path) -> Result<(), QcError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let file = fs::File::create(path)?;
        self.write_to(file)
    }

    /// Write the report as CSV to any writer
    pub fn write_to<W: std::io::Write>(&self, writer: W) -> Result<(), QcError> {
        let mut wtr = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(writer);
        wtr.write_record(REPORT_HEADER)?;
        for row in &self.rows {
            wtr.serialize(row)?;
        }
        wtr.flush()?;
        Ok(())
    }
}

/// Builds a [`QcReport`] from collected findings
pub struct ReportAggregator;

impl ReportAggregator {
    /// Flatten and sort findings into a report
    pub fn aggregate(results: &[SubjectFindings]) -> QcReport {
        let mut rows = Vec::new();

        for subject in results {
            for file in &subject.files {
                for finding in &file.findings {
                    let mut details = normalize_details(finding);
                    if details.is_empty() {
                        details.push(DetailRow::EMPTY);
                    }
                    rows.extend(details.into_iter().map(|d| ReportRow {
                        subject: subject.subject.clone(),
                        file: file.file.clone(),
                        error_type: finding.kind(),
                        message: finding.message().to_string(),
                        start_time: d.start_time,
                        end_time: d.end_time,
                        duration_s: d.duration_s,
                        length: d.length,
                    }));
                }
            }
        }

        // Vec::sort_by is stable, so ties keep discovery order
        rows.sort_by(compare_rows);
        QcReport { rows }
    }
}

fn compare_rows(a: &ReportRow, b: &ReportRow) -> Ordering {
    a.subject
        .cmp(&b.subject)
        .then_with(|| a.file.cmp(&b.file))
        .then_with(|| a.error_type.as_str().cmp(b.error_type.as_str()))
        .then_with(|| nulls_last(&a.start_time, &b.start_time))
        .then_with(|| nulls_last(&a.end_time, &b.end_time))
}

fn nulls_last<T: Ord>(a: &Option<T>, b: &Option<T>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => x.cmp(y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
