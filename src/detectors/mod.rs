//! Time-series detectors
//!
//! Each detector scans one heart-rate series and returns typed detail rows.
//! Detectors keep no state between calls.

mod gaps;
mod runs;

pub use gaps::{GapDetector, DEFAULT_GAP_THRESHOLD_SECS};
pub use runs::{RunDetector, DEFAULT_MIN_RUN_LENGTH};
