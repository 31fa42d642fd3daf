//! QC engine
//!
//! Runs the detectors for one recording and turns their output into findings.
//!
//! Gap findings take precedence: when a recording has any gap, NaN runs are
//! not evaluated for it. Zone adherence is a pluggable [`ZoneCheck`] that does
//! nothing by default.

use crate::detectors::{GapDetector, RunDetector};
use crate::error::QcError;
use crate::events::{default_sink, QcEvent, SharedSink};
use crate::types::{Finding, HeartRateSeries, ZoneBoundarySet};

/// Message attached to gap findings
pub const GAP_MESSAGE: &str = "missing significant time";

/// Per-sample zone adherence check
pub trait ZoneCheck {
    /// Findings for a time-sorted series against the subject's zones
    fn check(&self, series: &HeartRateSeries, zones: &ZoneBoundarySet) -> Vec<Finding>;
}

/// Zone check that reports nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NoZoneCheck;

impl ZoneCheck for NoZoneCheck {
    fn check(&self, _series: &HeartRateSeries, _zones: &ZoneBoundarySet) -> Vec<Finding> {
        Vec::new()
    }
}

/// Evaluates recordings against gap and NaN-run rules
pub struct QcEngine {
    gaps: GapDetector,
    runs: RunDetector,
    zone_check: Box<dyn ZoneCheck>,
    sink: SharedSink,
}

impl Default for QcEngine {
    fn default() -> Self {
        Self::new(GapDetector::default(), RunDetector::default())
    }
}

impl QcEngine {
    pub fn new(gaps: GapDetector, runs: RunDetector) -> Self {
        Self {
            gaps,
            runs,
            zone_check: Box::new(NoZoneCheck),
            sink: default_sink(),
        }
    }

    /// Replace the zone adherence check
    pub fn with_zone_check(mut self, zone_check: Box<dyn ZoneCheck>) -> Self {
        self.zone_check = zone_check;
        self
    }

    /// Replace the event sink
    pub fn with_sink(mut self, sink: SharedSink) -> Self {
        self.sink = sink;
        self
    }

    /// Evaluate one recording.
    ///
    /// Returns at most one gap-or-NaN finding, followed by whatever the zone
    /// check reports. An empty series is an input error.
    pub fn evaluate(
        &self,
        mut series: HeartRateSeries,
        zones: &ZoneBoundarySet,
    ) -> Result<Vec<Finding>, QcError> {
        if series.is_empty() {
            return Err(QcError::Input("recording has no samples".to_string()));
        }
        series.sort_by_time();

        let mut findings = Vec::new();

        let gaps = self.gaps.find_gaps(&series);
        if !gaps.is_empty() {
            let longest_secs = gaps.iter().map(|g| g.duration_secs).fold(0.0, f64::max);
            self.sink.emit(QcEvent::GapsDetected {
                count: gaps.len(),
                longest_secs,
            });
            findings.push(Finding::Gap {
                message: GAP_MESSAGE.to_string(),
                gaps,
            });
        } else {
            let runs = self.runs.find_runs(&series);
            if !runs.is_empty() {
                let longest = runs.iter().map(|r| r.length).max().unwrap_or(0);
                self.sink.emit(QcEvent::NanRunsDetected {
                    count: runs.len(),
                    longest,
                });
                findings.push(Finding::NanRun {
                    message: nan_message(self.runs.min_run_length()),
                    runs,
                });
            }
        }

        findings.extend(self.zone_check.check(&series, zones));
        Ok(findings)
    }
}

fn nan_message(min_run_length: usize) -> String {
    format!("more than {} NaNs in a row", min_run_length)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::MemorySink;
    use crate::types::{FindingKind, HeartRateSample, RawZoneTable};
    use crate::zones::ZoneBoundaryDeriver;
    use chrono::{Duration, NaiveDate, NaiveDateTime};
    use std::sync::Arc;

    fn base() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 15)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
    }

    fn zones() -> ZoneBoundarySet {
        let raw =
            RawZoneTable::from_pairs([(100, 120), (125, 140), (145, 160), (165, 180), (185, 200)]);
        ZoneBoundaryDeriver::derive(&raw, 5).unwrap()
    }

    fn sample(offset: i64, hr: Option<f64>) -> HeartRateSample {
        HeartRateSample::new(base() + Duration::seconds(offset), hr)
    }

    /// Readings every second; `missing` offsets carry no heart rate
    fn series(len: i64, missing: std::ops::Range<i64>) -> HeartRateSeries {
        (0..len)
            .map(|i| {
                if missing.contains(&i) {
                    sample(i, None)
                } else {
                    sample(i, Some(125.0))
                }
            })
            .collect()
    }

    struct HighHrCheck;

    impl ZoneCheck for HighHrCheck {
        fn check(&self, series: &HeartRateSeries, zones: &ZoneBoundarySet) -> Vec<Finding> {
            let over = series
                .samples()
                .iter()
                .filter_map(|s| s.hr)
                .any(|hr| hr > zones.zones()[4].end as f64);
            if over {
                vec![Finding::Failed {
                    message: "above zone 5".to_string(),
                }]
            } else {
                Vec::new()
            }
        }
    }

    #[test]
    fn test_clean_recording_has_no_findings() {
        let findings = QcEngine::default().evaluate(series(600, 0..0), &zones()).unwrap();
        assert!(findings.is_empty());
    }

    #[test]
    fn test_gap_finding() {
        // missing 10:00:01 .. 10:00:44, valid again at 10:00:45
        let findings = QcEngine::default()
            .evaluate(series(120, 1..45), &zones())
            .unwrap();

        assert_eq!(findings.len(), 1);
        match &findings[0] {
            Finding::Gap { message, gaps } => {
                assert_eq!(message, GAP_MESSAGE);
                assert_eq!(gaps.len(), 1);
                assert!((gaps[0].duration_secs - 45.0).abs() < 1e-9);
            }
            other => panic!("expected gap finding, got {:?}", other),
        }
    }

    #[test]
    fn test_nan_run_finding_without_gap() {
        // 40 missing samples but the engine's gap threshold is wider than the run
        let engine = QcEngine::new(GapDetector::new(60), RunDetector::new(30));
        let findings = engine.evaluate(series(200, 50..90), &zones()).unwrap();

        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].kind(), FindingKind::Nan);
        assert_eq!(findings[0].message(), "more than 30 NaNs in a row");
        match &findings[0] {
            Finding::NanRun { runs, .. } => assert_eq!(runs[0].length, 40),
            other => panic!("expected NaN-run finding, got {:?}", other),
        }
    }

    #[test]
    fn test_gap_suppresses_nan_runs() {
        // 40 missing samples form both a 41s gap and a qualifying NaN run
        let sink = Arc::new(MemorySink::new());
        let engine = QcEngine::default().with_sink(sink.clone());
        let findings = engine.evaluate(series(200, 50..90), &zones()).unwrap();

        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].kind(), FindingKind::Missing);
        assert!(sink
            .events()
            .iter()
            .all(|e| !matches!(e, QcEvent::NanRunsDetected { .. })));
    }

    #[test]
    fn test_unsorted_series_is_sorted_first() {
        let mut samples: Vec<HeartRateSample> = series(120, 1..45).samples().to_vec();
        samples.reverse();
        let findings = QcEngine::default()
            .evaluate(HeartRateSeries::new(samples), &zones())
            .unwrap();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].detail_len(), 1);
    }

    #[test]
    fn test_empty_series_is_input_error() {
        let result = QcEngine::default().evaluate(HeartRateSeries::default(), &zones());
        assert!(matches!(result, Err(QcError::Input(_))));
    }

    #[test]
    fn test_zone_check_findings_follow_gap_finding() {
        let mut s = series(120, 1..45);
        s.push(sample(200, Some(230.0)));
        let engine = QcEngine::default().with_zone_check(Box::new(HighHrCheck));
        let findings = engine.evaluate(s, &zones()).unwrap();

        assert_eq!(findings.len(), 2);
        assert_eq!(findings[0].kind(), FindingKind::Missing);
        assert_eq!(findings[1].message(), "above zone 5");
    }
}
