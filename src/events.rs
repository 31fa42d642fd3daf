//! Structured QC events
//!
//! Components report progress and problems through an [`EventSink`] handed to
//! them at construction. [`TracingSink`] forwards events to `tracing`;
//! [`MemorySink`] keeps them for inspection in tests.

use crate::types::ZoneBoundarySet;
use std::sync::{Arc, Mutex};

/// Something worth recording while a QC run is in progress
#[derive(Debug, Clone, PartialEq)]
pub enum QcEvent {
    SessionStarted {
        project: String,
        session: String,
        path: String,
    },
    SessionSkipped {
        path: String,
        reason: String,
    },
    ZonesDerived {
        subject: String,
        zones: ZoneBoundarySet,
    },
    ZoneLookupFailed {
        subject: String,
        error: String,
    },
    GapsDetected {
        count: usize,
        longest_secs: f64,
    },
    NanRunsDetected {
        count: usize,
        longest: usize,
    },
    FileProcessed {
        subject: String,
        file: String,
        findings: usize,
    },
    FileFailed {
        subject: String,
        file: String,
        error: String,
    },
    FileSkipped {
        subject: String,
        file: String,
        reason: String,
    },
    SubjectSkipped {
        subject: String,
        reason: String,
    },
    SheetRowSkipped {
        row: usize,
        reason: String,
    },
    ReportWritten {
        path: String,
        rows: usize,
    },
}

/// Receiver for [`QcEvent`]s
pub trait EventSink: Send + Sync {
    fn emit(&self, event: QcEvent);
}

/// Shared handle to an event sink
pub type SharedSink = Arc<dyn EventSink>;

/// Default sink: the tracing handle for the global subscriber
pub fn default_sink() -> SharedSink {
    Arc::new(TracingSink)
}

/// Forwards every event to `tracing` with structured fields
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: QcEvent) {
        match event {
            QcEvent::SessionStarted {
                project,
                session,
                path,
            } => {
                tracing::debug!(%project, %session, %path, "processing session");
            }
            QcEvent::SessionSkipped { path, reason } => {
                tracing::warn!(%path, %reason, "session folder skipped");
            }
            QcEvent::ZonesDerived { subject, zones } => {
                tracing::debug!(%subject, zones = ?zones.zones(), "zones derived");
            }
            QcEvent::ZoneLookupFailed { subject, error } => {
                tracing::warn!(%subject, %error, "zone lookup failed");
            }
            QcEvent::GapsDetected {
                count,
                longest_secs,
            } => {
                tracing::debug!(count, longest_secs, "gaps detected");
            }
            QcEvent::NanRunsDetected { count, longest } => {
                tracing::debug!(count, longest, "NaN runs detected");
            }
            QcEvent::FileProcessed {
                subject,
                file,
                findings,
            } => {
                tracing::info!(%subject, %file, findings, "file processed");
            }
            QcEvent::FileFailed {
                subject,
                file,
                error,
            } => {
                tracing::error!(%subject, %file, %error, "file failed");
            }
            QcEvent::FileSkipped {
                subject,
                file,
                reason,
            } => {
                tracing::debug!(%subject, %file, %reason, "file skipped");
            }
            QcEvent::SubjectSkipped { subject, reason } => {
                tracing::warn!(%subject, %reason, "subject skipped");
            }
            QcEvent::SheetRowSkipped { row, reason } => {
                tracing::warn!(row, %reason, "zone sheet row skipped");
            }
            QcEvent::ReportWritten { path, rows } => {
                tracing::info!(%path, rows, "QC summary written");
            }
        }
    }
}

/// Collects events in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<QcEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything emitted so far
    pub fn events(&self) -> Vec<QcEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl EventSink for MemorySink {
    fn emit(&self, event: QcEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_sink_keeps_order() {
        let sink = MemorySink::new();
        sink.emit(QcEvent::SubjectSkipped {
            subject: "sub01".to_string(),
            reason: "no files".to_string(),
        });
        sink.emit(QcEvent::ReportWritten {
            path: "qc.csv".to_string(),
            rows: 3,
        });

        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[1], QcEvent::ReportWritten { rows: 3, .. }));
    }
}
