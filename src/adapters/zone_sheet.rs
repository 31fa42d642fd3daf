//! Zone sheet reader
//!
//! Reads the CSV export of the study's zone spreadsheet. Each row carries a
//! subject `ID` column and, starting at a fixed column offset, the ten zone
//! bounds `z1_start, z1_end, ..., z5_start, z5_end`.

use crate::error::QcError;
use crate::events::{QcEvent, SharedSink};
use crate::types::{RawZoneTable, ZONE_COUNT};
use crate::zones::{subject_key, ZoneTableSource};
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

/// Column where zone 1 start sits in the study sheet
pub const DEFAULT_ZONE_COLUMN_OFFSET: usize = 5;

const ID_COLUMN: &str = "ID";

/// Largest zone bound accepted from the sheet (bpm)
const MAX_BPM: f64 = 400.0;

/// Zone rows keyed by numeric subject id
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ZoneSheet {
    rows: HashMap<i64, RawZoneTable>,
}

impl ZoneTableSource for ZoneSheet {
    fn lookup(&self, subject: &str) -> Result<RawZoneTable, QcError> {
        let key = subject_key(subject)?;
        self.rows.get(&key).copied().ok_or_else(|| {
            QcError::Lookup(format!("{} (id {}) has no zone row", subject, key))
        })
    }
}

impl ZoneSheet {
    /// Build a sheet from `(id, table)` pairs; the first row for an id wins
    pub fn from_rows<I: IntoIterator<Item = (i64, RawZoneTable)>>(rows: I) -> Self {
        let mut sheet = Self::default();
        for (id, table) in rows {
            sheet.rows.entry(id).or_insert(table);
        }
        sheet
    }

    /// Load a sheet export from disk
    pub fn from_csv_path(
        path: &Path,
        zone_column_offset: usize,
        sink: &SharedSink,
    ) -> Result<Self, QcError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file, zone_column_offset, sink)
    }

    /// Load a sheet export from any reader.
    ///
    /// Rows with a non-numeric id or zone value are skipped and reported.
    pub fn from_reader<R: Read>(
        reader: R,
        zone_column_offset: usize,
        sink: &SharedSink,
    ) -> Result<Self, QcError> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let headers = rdr.headers()?.clone();
        let id_idx = headers
            .iter()
            .position(|h| h.trim() == ID_COLUMN)
            .ok_or_else(|| QcError::Parse(format!("zone sheet has no '{}' column", ID_COLUMN)))?;
        if headers.len() < zone_column_offset + ZONE_COUNT * 2 {
            return Err(QcError::Parse(format!(
                "zone sheet needs {} zone columns from column {}, found {} columns",
                ZONE_COUNT * 2,
                zone_column_offset,
                headers.len()
            )));
        }

        let mut rows = Vec::new();
        for (idx, record) in rdr.records().enumerate() {
            let record = record?;
            // header is line 1
            let row = idx + 2;

            let id = match record.get(id_idx).and_then(parse_id) {
                Some(id) => id,
                None => {
                    sink.emit(QcEvent::SheetRowSkipped {
                        row,
                        reason: "non-numeric ID".to_string(),
                    });
                    continue;
                }
            };

            let mut values = [0i32; ZONE_COUNT * 2];
            let mut complete = true;
            for (i, value) in values.iter_mut().enumerate() {
                match record.get(zone_column_offset + i).and_then(parse_bpm) {
                    Some(v) => *value = v,
                    None => {
                        complete = false;
                        break;
                    }
                }
            }
            if !complete {
                sink.emit(QcEvent::SheetRowSkipped {
                    row,
                    reason: format!("missing or out-of-range zone values for ID {}", id),
                });
                continue;
            }

            rows.push((id, RawZoneTable::from_columns(values)));
        }

        Ok(Self::from_rows(rows))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Subject id cell; spreadsheets often store ids as `7.0`
fn parse_id(cell: &str) -> Option<i64> {
    subject_key(cell).ok().or_else(|| {
        let v = cell.trim().parse::<f64>().ok()?;
        (v.is_finite() && v.fract() == 0.0).then_some(v as i64)
    })
}

/// Zone bound cell, truncated to whole bpm; values outside `0..=MAX_BPM` are rejected
fn parse_bpm(cell: &str) -> Option<i32> {
    let v = cell.trim().parse::<f64>().ok()?;
    (0.0..=MAX_BPM).contains(&v).then_some(v as i32)
}
