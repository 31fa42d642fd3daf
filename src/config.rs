//! Run configuration
//!
//! Detection thresholds and reader settings, plus the deployment labels that
//! map to the study's base directory on each machine.

use crate::adapters::{PolarCsvAdapter, DEFAULT_HEADER_ROWS, DEFAULT_ZONE_COLUMN_OFFSET};
use crate::detectors::{
    GapDetector, RunDetector, DEFAULT_GAP_THRESHOLD_SECS, DEFAULT_MIN_RUN_LENGTH,
};
use crate::error::QcError;
use crate::zones::DEFAULT_SNAP_TO;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Thresholds and reader settings for a QC run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QcConfig {
    /// Longest tolerated silence between valid readings (seconds)
    pub gap_threshold_secs: i64,
    /// NaN runs must be longer than this many samples to be reported
    pub min_nan_run: usize,
    /// Zone midpoint snap granularity (bpm)
    pub snap_to: i32,
    /// Metadata lines before the sample header in each recording
    pub header_rows: usize,
    /// Column index of zone 1 start in the zone sheet
    pub zone_column_offset: usize,
}

impl Default for QcConfig {
    fn default() -> Self {
        Self {
            gap_threshold_secs: DEFAULT_GAP_THRESHOLD_SECS,
            min_nan_run: DEFAULT_MIN_RUN_LENGTH,
            snap_to: DEFAULT_SNAP_TO,
            header_rows: DEFAULT_HEADER_ROWS,
            zone_column_offset: DEFAULT_ZONE_COLUMN_OFFSET,
        }
    }
}

impl QcConfig {
    /// Parse from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self, QcError> {
        let config: QcConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a JSON file
    pub fn from_path(path: &Path) -> Result<Self, QcError> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            QcError::Config(format!("cannot read config {}: {}", path.display(), e))
        })?;
        Self::from_json(&json)
    }

    pub fn validate(&self) -> Result<(), QcError> {
        if self.snap_to < 1 {
            return Err(QcError::Config(format!(
                "snap_to must be at least 1, got {}",
                self.snap_to
            )));
        }
        if self.gap_threshold_secs < 0 {
            return Err(QcError::Config(format!(
                "gap_threshold_secs must not be negative, got {}",
                self.gap_threshold_secs
            )));
        }
        Ok(())
    }

    pub fn gap_detector(&self) -> GapDetector {
        GapDetector::new(self.gap_threshold_secs)
    }

    pub fn run_detector(&self) -> RunDetector {
        RunDetector::new(self.min_nan_run)
    }

    pub fn series_adapter(&self) -> PolarCsvAdapter {
        PolarCsvAdapter::new(self.header_rows)
    }
}

/// Machines the study data is mounted on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum System {
    Argon,
    Home,
    #[serde(rename = "vosslnx")]
    Vosslnx,
}

impl System {
    pub fn as_str(&self) -> &'static str {
        match self {
            System::Argon => "Argon",
            System::Home => "Home",
            System::Vosslnx => "vosslnx",
        }
    }

    /// Study root on this machine
    pub fn base_path(&self) -> PathBuf {
        let root = match self {
            System::Argon => "/Shared/vosslabhpc/Projects/BOOST/",
            System::Home => "/mnt/lss/Projects/BOOST/",
            System::Vosslnx => "/mnt/lss/vosslabhpc/Projects/BOOST/",
        };
        PathBuf::from(root)
    }
}

impl FromStr for System {
    type Err = QcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Argon" => Ok(System::Argon),
            "Home" => Ok(System::Home),
            "vosslnx" => Ok(System::Vosslnx),
            other => Err(QcError::Config(format!(
                "unknown system '{}', expected one of Argon, Home, vosslnx",
                other
            ))),
        }
    }
}

/// Study root from an explicit path or a system label.
///
/// A given label must be known even when an explicit path overrides it.
pub fn resolve_base_path(
    system: Option<&str>,
    base_override: Option<&Path>,
) -> Result<PathBuf, QcError> {
    let system = system.map(str::parse::<System>).transpose()?;
    match (base_override, system) {
        (Some(path), _) => Ok(path.to_path_buf()),
        (None, Some(system)) => Ok(system.base_path()),
        (None, None) => Err(QcError::Config(
            "base path is not set; pass a system label or an explicit base path".to_string(),
        )),
    }
}
