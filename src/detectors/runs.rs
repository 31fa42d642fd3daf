//! NaN-run detection
//!
//! Groups the trace into maximal runs of missing / present readings and keeps
//! the missing runs that are longer than a minimum length.

use crate::types::{HeartRateSample, HeartRateSeries, NanRun};

/// Default minimum number of consecutive missing samples worth reporting
pub const DEFAULT_MIN_RUN_LENGTH: usize = 30;

/// Detector for sustained runs of missing readings
#[derive(Debug, Clone, Copy)]
pub struct RunDetector {
    min_run_length: usize,
}

impl Default for RunDetector {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_RUN_LENGTH)
    }
}

impl RunDetector {
    pub fn new(min_run_length: usize) -> Self {
        Self { min_run_length }
    }

    pub fn min_run_length(&self) -> usize {
        self.min_run_length
    }

    /// Missing runs strictly longer than the minimum, in time order
    pub fn find_runs(&self, series: &HeartRateSeries) -> Vec<NanRun> {
        let mut ordered: Vec<&HeartRateSample> = series.samples().iter().collect();
        ordered.sort_by_key(|s| s.time);

        let mut runs = Vec::new();
        let mut start = 0;
        for idx in 1..=ordered.len() {
            let boundary =
                idx == ordered.len() || ordered[idx].is_missing() != ordered[start].is_missing();
            if !boundary {
                continue;
            }

            let length = idx - start;
            if ordered[start].is_missing() && length > self.min_run_length {
                runs.push(NanRun {
                    start: ordered[start].time,
                    end: ordered[idx - 1].time,
                    length,
                });
            }
            start = idx;
        }

        runs
    }
}
