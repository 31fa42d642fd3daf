//! Input adapters
//!
//! This module provides adapters that read study files into the engine's
//! types: heart-rate exports into [`HeartRateSeries`] and zone sheets into
//! [`crate::types::RawZoneTable`] rows.

mod polar;
mod zone_sheet;

pub use polar::{PolarCsvAdapter, DEFAULT_HEADER_ROWS};
pub use zone_sheet::{ZoneSheet, DEFAULT_ZONE_COLUMN_OFFSET};

use crate::error::QcError;
use crate::types::HeartRateSeries;
use std::path::Path;

/// Trait for heart-rate recording readers
pub trait SeriesAdapter {
    /// Read one recording file into a heart-rate series
    fn parse(&self, path: &Path) -> Result<HeartRateSeries, QcError>;
}
