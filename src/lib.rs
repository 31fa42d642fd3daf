//! Heart-rate QC - Quality control for exercise-session heart-rate recordings
//!
//! Each recording is checked for time gaps and runs of missing readings,
//! against zone boundaries derived from the subject's prescribed training
//! zones. Findings from every subject and file are flattened into one CSV
//! report.
//!
//! ## Pipeline
//!
//! discovery → recording adapter → QC engine (gap and NaN-run detectors)
//! → report aggregation
//!
//! Zones come from a [`zones::ZoneTableSource`] (the zone sheet export) and
//! are derived once per subject by [`ZoneCache`].

pub mod adapters;
pub mod config;
pub mod detectors;
pub mod discovery;
pub mod engine;
pub mod error;
pub mod events;
pub mod pipeline;
pub mod report;
pub mod types;
pub mod zones;

pub use config::QcConfig;
pub use engine::QcEngine;
pub use error::QcError;
pub use pipeline::{QcOutcome, QcRunner, RunSummary};
pub use report::{QcReport, ReportAggregator};
pub use types::{Finding, FindingKind, HeartRateSeries, ZoneBoundarySet};
pub use zones::{ZoneBoundaryDeriver, ZoneCache};

/// Crate version, reported by the CLI
pub const QC_VERSION: &str = env!("CARGO_PKG_VERSION");
