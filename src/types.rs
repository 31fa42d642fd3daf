//! Core types for the QC engine
//!
//! This module defines the data structures that flow through each stage of the
//! engine: parsed heart-rate series, raw and derived zone tables, and findings.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Number of heart-rate zones in a subject's training schedule
pub const ZONE_COUNT: usize = 5;

/// One heart-rate reading
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeartRateSample {
    /// Sample time
    pub time: NaiveDateTime,
    /// Heart rate (bpm), `None` when the instrument recorded nothing
    pub hr: Option<f64>,
}

impl HeartRateSample {
    pub fn new(time: NaiveDateTime, hr: Option<f64>) -> Self {
        Self { time, hr }
    }

    /// Sample with no heart-rate value
    pub fn missing(time: NaiveDateTime) -> Self {
        Self { time, hr: None }
    }

    pub fn is_missing(&self) -> bool {
        self.hr.is_none()
    }
}

/// Heart-rate trace for one recording file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HeartRateSeries {
    samples: Vec<HeartRateSample>,
}

impl HeartRateSeries {
    pub fn new(samples: Vec<HeartRateSample>) -> Self {
        Self { samples }
    }

    pub fn push(&mut self, sample: HeartRateSample) {
        self.samples.push(sample);
    }

    pub fn samples(&self) -> &[HeartRateSample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Number of samples carrying a heart-rate value
    pub fn valid_count(&self) -> usize {
        self.samples.iter().filter(|s| !s.is_missing()).count()
    }

    /// Stable sort by timestamp; equal timestamps keep file order
    pub fn sort_by_time(&mut self) {
        self.samples.sort_by_key(|s| s.time);
    }
}

impl FromIterator<HeartRateSample> for HeartRateSeries {
    fn from_iter<I: IntoIterator<Item = HeartRateSample>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Inclusive heart-rate range (bpm)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneRange {
    pub start: i32,
    pub end: i32,
}

impl ZoneRange {
    pub fn new(start: i32, end: i32) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, bpm: f64) -> bool {
        bpm >= self.start as f64 && bpm <= self.end as f64
    }
}

/// Zone table row for one subject, as entered by study staff.
///
/// Adjacent zones may overlap or leave gaps between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawZoneTable {
    pub zones: [ZoneRange; ZONE_COUNT],
}

impl RawZoneTable {
    /// Build from `(start, end)` pairs for zones 1 through 5
    pub fn from_pairs(pairs: [(i32, i32); ZONE_COUNT]) -> Self {
        Self {
            zones: pairs.map(|(start, end)| ZoneRange::new(start, end)),
        }
    }

    /// Build from the sheet's column order: z1_start, z1_end, ..., z5_start, z5_end
    pub fn from_columns(values: [i32; ZONE_COUNT * 2]) -> Self {
        let mut zones = [ZoneRange::new(0, 0); ZONE_COUNT];
        for (i, zone) in zones.iter_mut().enumerate() {
            *zone = ZoneRange::new(values[2 * i], values[2 * i + 1]);
        }
        Self { zones }
    }
}

/// Contiguous zone boundaries derived from a [`RawZoneTable`].
///
/// Zone `i` end + 1 always equals zone `i + 1` start. Only the zone deriver
/// constructs this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ZoneBoundarySet {
    zones: [ZoneRange; ZONE_COUNT],
}

impl ZoneBoundarySet {
    pub(crate) fn from_zones(zones: [ZoneRange; ZONE_COUNT]) -> Self {
        Self { zones }
    }

    pub fn zones(&self) -> &[ZoneRange; ZONE_COUNT] {
        &self.zones
    }

    /// Zone by 1-based number
    pub fn zone(&self, number: usize) -> Option<ZoneRange> {
        number
            .checked_sub(1)
            .and_then(|idx| self.zones.get(idx))
            .copied()
    }

    /// 1-based zone number containing `bpm`, if any
    pub fn classify(&self, bpm: f64) -> Option<usize> {
        self.zones
            .iter()
            .position(|z| z.contains(bpm))
            .map(|idx| idx + 1)
    }
}

/// Silence between two valid readings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GapRecord {
    /// Time of the last valid reading before the silence
    pub start: NaiveDateTime,
    /// Time of the first valid reading after the silence
    pub end: NaiveDateTime,
    pub duration_secs: f64,
}

impl GapRecord {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        let duration_secs = (end - start).num_milliseconds() as f64 / 1000.0;
        Self {
            start,
            end,
            duration_secs,
        }
    }
}

/// Maximal run of consecutive missing readings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NanRun {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    /// Number of samples in the run
    pub length: usize,
}

/// Finding category, ordered the way report rows sort
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingKind {
    /// Processing failed for the file
    Error,
    /// Gap between valid readings
    Missing,
    /// Long run of missing readings
    Nan,
}

impl FindingKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FindingKind::Error => "error",
            FindingKind::Missing => "missing",
            FindingKind::Nan => "nan",
        }
    }
}

/// One QC issue detected for one recording
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Finding {
    Gap {
        message: String,
        gaps: Vec<GapRecord>,
    },
    NanRun {
        message: String,
        runs: Vec<NanRun>,
    },
    /// The file could not be evaluated
    Failed { message: String },
}

impl Finding {
    pub fn kind(&self) -> FindingKind {
        match self {
            Finding::Gap { .. } => FindingKind::Missing,
            Finding::NanRun { .. } => FindingKind::Nan,
            Finding::Failed { .. } => FindingKind::Error,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Finding::Gap { message, .. }
            | Finding::NanRun { message, .. }
            | Finding::Failed { message } => message,
        }
    }

    /// Number of detail rows carried by the finding
    pub fn detail_len(&self) -> usize {
        match self {
            Finding::Gap { gaps, .. } => gaps.len(),
            Finding::NanRun { runs, .. } => runs.len(),
            Finding::Failed { .. } => 0,
        }
    }
}

/// Findings for one recording file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileFindings {
    pub file: String,
    pub findings: Vec<Finding>,
}

impl FileFindings {
    pub fn new(file: impl Into<String>, findings: Vec<Finding>) -> Self {
        Self {
            file: file.into(),
            findings,
        }
    }
}

/// Findings for every recording of one subject
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectFindings {
    pub subject: String,
    pub files: Vec<FileFindings>,
}

impl SubjectFindings {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            files: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 15)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn test_sort_by_time_is_stable() {
        let mut series = HeartRateSeries::new(vec![
            HeartRateSample::new(at(10, 0, 2), Some(120.0)),
            HeartRateSample::new(at(10, 0, 1), Some(110.0)),
            HeartRateSample::new(at(10, 0, 1), None),
        ]);
        series.sort_by_time();

        let hrs: Vec<Option<f64>> = series.samples().iter().map(|s| s.hr).collect();
        assert_eq!(hrs, vec![Some(110.0), None, Some(120.0)]);
        assert_eq!(series.valid_count(), 2);
    }

    #[test]
    fn test_raw_table_from_columns() {
        let raw = RawZoneTable::from_columns([100, 120, 125, 140, 145, 160, 165, 180, 185, 200]);
        assert_eq!(raw.zones[0], ZoneRange::new(100, 120));
        assert_eq!(raw.zones[4], ZoneRange::new(185, 200));
    }

    #[test]
    fn test_gap_record_duration() {
        let gap = GapRecord::new(at(10, 0, 0), at(10, 0, 45));
        assert!((gap.duration_secs - 45.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_zone_lookup_is_one_based() {
        let set = ZoneBoundarySet::from_zones([
            ZoneRange::new(100, 120),
            ZoneRange::new(121, 140),
            ZoneRange::new(141, 160),
            ZoneRange::new(161, 180),
            ZoneRange::new(181, 200),
        ]);
        assert_eq!(set.zone(1), Some(ZoneRange::new(100, 120)));
        assert_eq!(set.zone(0), None);
        assert_eq!(set.zone(6), None);
        assert_eq!(set.classify(150.0), Some(3));
        assert_eq!(set.classify(90.0), None);
    }

    #[test]
    fn test_finding_kind_labels() {
        let finding = Finding::NanRun {
            message: "more than 30 NaNs in a row".to_string(),
            runs: vec![],
        };
        assert_eq!(finding.kind().as_str(), "nan");
        assert_eq!(finding.detail_len(), 0);
        assert!(FindingKind::Error < FindingKind::Missing);
        assert!(FindingKind::Missing < FindingKind::Nan);
    }
}
