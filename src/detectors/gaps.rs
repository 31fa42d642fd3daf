//! Gap detection
//!
//! Finds silences in a trace: consecutive valid readings further apart than a
//! threshold.

use crate::types::{GapRecord, HeartRateSeries};
use chrono::{Duration, NaiveDateTime};

/// Default maximum silence between valid readings (seconds)
pub const DEFAULT_GAP_THRESHOLD_SECS: i64 = 30;

/// Detector for missing-data gaps
#[derive(Debug, Clone, Copy)]
pub struct GapDetector {
    threshold_secs: i64,
}

impl Default for GapDetector {
    fn default() -> Self {
        Self::new(DEFAULT_GAP_THRESHOLD_SECS)
    }
}

impl GapDetector {
    pub fn new(threshold_secs: i64) -> Self {
        Self { threshold_secs }
    }

    pub fn threshold_secs(&self) -> i64 {
        self.threshold_secs
    }

    /// All gaps longer than the threshold, in time order
    pub fn find_gaps(&self, series: &HeartRateSeries) -> Vec<GapRecord> {
        let mut times: Vec<NaiveDateTime> = series
            .samples()
            .iter()
            .filter(|s| !s.is_missing())
            .map(|s| s.time)
            .collect();

        if times.len() < 2 {
            return Vec::new();
        }
        times.sort();

        let threshold = Duration::seconds(self.threshold_secs);
        times
            .windows(2)
            .filter(|pair| pair[1] - pair[0] > threshold)
            .map(|pair| GapRecord::new(pair[0], pair[1]))
            .collect()
    }
}
