//! Pipeline orchestration
//!
//! Wires discovery, readers, zone derivation, the QC engine and the report
//! together for a batch run. Work is sequential: one subject, one file at a
//! time. A failing file becomes an `error` finding and the run moves on.

use crate::adapters::SeriesAdapter;
use crate::config::QcConfig;
use crate::discovery::{list_subjects, subject_files, SessionFiles, StudyLayout};
use crate::engine::QcEngine;
use crate::error::QcError;
use crate::events::{default_sink, QcEvent, SharedSink};
use crate::report::{QcReport, ReportAggregator};
use crate::types::{FileFindings, Finding, SubjectFindings, ZoneBoundarySet};
use crate::zones::{ZoneCache, ZoneTableSource};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Counts describing a finished run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub subjects: usize,
    pub files: usize,
    pub failed_files: usize,
    pub flagged_files: usize,
    pub report_rows: usize,
}

/// Everything a run produced
#[derive(Debug, Clone)]
pub struct QcOutcome {
    pub results: Vec<SubjectFindings>,
    pub report: QcReport,
    pub summary: RunSummary,
}

/// Batch QC runner.
///
/// Holds the per-subject zone cache, so zones are derived once per subject
/// even when the subject appears in several session folders.
pub struct QcRunner {
    engine: QcEngine,
    adapter: Box<dyn SeriesAdapter>,
    cache: ZoneCache,
    sink: SharedSink,
}

impl QcRunner {
    /// Create a runner that reports through `tracing`
    pub fn new(config: &QcConfig) -> Result<Self, QcError> {
        Self::with_sink(config, default_sink())
    }

    /// Create a runner with a specific event sink
    pub fn with_sink(config: &QcConfig, sink: SharedSink) -> Result<Self, QcError> {
        config.validate()?;
        let engine = QcEngine::new(config.gap_detector(), config.run_detector())
            .with_sink(sink.clone());
        Ok(Self {
            engine,
            adapter: Box::new(config.series_adapter()),
            cache: ZoneCache::new(config.snap_to),
            sink,
        })
    }

    /// Replace the recording reader
    pub fn with_adapter(mut self, adapter: Box<dyn SeriesAdapter>) -> Self {
        self.adapter = adapter;
        self
    }

    /// Replace the engine, e.g. to install a zone check
    pub fn with_engine(mut self, engine: QcEngine) -> Self {
        self.engine = engine.with_sink(self.sink.clone());
        self
    }

    pub fn zone_cache(&self) -> &ZoneCache {
        &self.cache
    }

    /// Parse and evaluate one recording
    pub fn process_file(
        &self,
        path: &Path,
        zones: &ZoneBoundarySet,
    ) -> Result<Vec<Finding>, QcError> {
        let series = self.adapter.parse(path)?;
        self.engine.evaluate(series, zones)
    }

    /// Evaluate every recording of one subject.
    ///
    /// Fails only on an empty file list; per-file problems are recorded as
    /// `error` findings.
    pub fn process_subject(
        &mut self,
        subject: &str,
        files: &[PathBuf],
        zone_source: &dyn ZoneTableSource,
    ) -> Result<SubjectFindings, QcError> {
        if files.is_empty() {
            return Err(QcError::Input(format!("{} has no session files", subject)));
        }

        let first_use = self.cache.get(subject).is_none();
        let zones = match self.cache.get_or_derive(subject, zone_source) {
            Ok(zones) => {
                if first_use {
                    self.sink.emit(QcEvent::ZonesDerived {
                        subject: subject.to_string(),
                        zones,
                    });
                }
                Ok(zones)
            }
            Err(e) => {
                self.sink.emit(QcEvent::ZoneLookupFailed {
                    subject: subject.to_string(),
                    error: e.to_string(),
                });
                Err(e.to_string())
            }
        };

        let mut out = SubjectFindings::new(subject);
        for path in files {
            let file = path.display().to_string();
            if !is_csv(path) {
                self.sink.emit(QcEvent::FileSkipped {
                    subject: subject.to_string(),
                    file,
                    reason: "not a CSV file".to_string(),
                });
                continue;
            }

            let result = match &zones {
                Ok(zones) => self.process_file(path, zones).map_err(|e| e.to_string()),
                Err(lookup) => Err(lookup.clone()),
            };

            let findings = match result {
                Ok(findings) => {
                    self.sink.emit(QcEvent::FileProcessed {
                        subject: subject.to_string(),
                        file: file.clone(),
                        findings: findings.len(),
                    });
                    findings
                }
                Err(message) => {
                    self.sink.emit(QcEvent::FileFailed {
                        subject: subject.to_string(),
                        file: file.clone(),
                        error: message.clone(),
                    });
                    vec![Finding::Failed { message }]
                }
            };
            out.files.push(FileFindings::new(file, findings));
        }

        Ok(out)
    }

    /// Evaluate every subject of one session folder listing
    pub fn run(
        &mut self,
        sessions: &SessionFiles,
        zone_source: &dyn ZoneTableSource,
    ) -> QcOutcome {
        let started_at = Utc::now();
        let results = self.collect(sessions, zone_source);
        self.finish(results, started_at)
    }

    /// Discover and evaluate every session folder of the study tree under `base`.
    ///
    /// Folders that cannot be listed are reported and skipped.
    pub fn run_study(
        &mut self,
        base: &Path,
        layout: &StudyLayout,
        zone_source: &dyn ZoneTableSource,
    ) -> QcOutcome {
        let started_at = Utc::now();
        let mut results = Vec::new();
        for dir in layout.session_dirs(base) {
            self.sink.emit(QcEvent::SessionStarted {
                project: dir.project.clone(),
                session: dir.session.clone(),
                path: dir.path.display().to_string(),
            });
            let sessions = self.readable_sessions(&dir.path);
            results.extend(self.collect(&sessions, zone_source));
        }
        self.finish(results, started_at)
    }

    /// Subjects of one session folder; unreadable folders are reported and left out
    fn readable_sessions(&self, dir: &Path) -> SessionFiles {
        let mut sessions = SessionFiles::new();
        let subjects = match list_subjects(dir) {
            Ok(subjects) => subjects,
            Err(e) => {
                self.sink.emit(QcEvent::SessionSkipped {
                    path: dir.display().to_string(),
                    reason: e.to_string(),
                });
                return sessions;
            }
        };

        for (subject, path) in subjects {
            match subject_files(&path) {
                Ok(files) => {
                    sessions.insert(subject, files);
                }
                Err(e) => self.sink.emit(QcEvent::SubjectSkipped {
                    subject,
                    reason: e.to_string(),
                }),
            }
        }
        sessions
    }

    fn collect(
        &mut self,
        sessions: &SessionFiles,
        zone_source: &dyn ZoneTableSource,
    ) -> Vec<SubjectFindings> {
        let mut results = Vec::new();
        for (subject, files) in sessions {
            match self.process_subject(subject, files, zone_source) {
                Ok(findings) => results.push(findings),
                Err(e) => self.sink.emit(QcEvent::SubjectSkipped {
                    subject: subject.clone(),
                    reason: e.to_string(),
                }),
            }
        }
        results
    }

    fn finish(&self, results: Vec<SubjectFindings>, started_at: DateTime<Utc>) -> QcOutcome {
        let report = ReportAggregator::aggregate(&results);

        let files = results.iter().map(|s| s.files.len()).sum();
        let failed_files = count_files(&results, |f| {
            f.findings.iter().any(|x| matches!(x, Finding::Failed { .. }))
        });
        let flagged_files = count_files(&results, |f| !f.findings.is_empty());

        let summary = RunSummary {
            run_id: Uuid::new_v4(),
            started_at,
            finished_at: Utc::now(),
            subjects: results.len(),
            files,
            failed_files,
            flagged_files,
            report_rows: report.len(),
        };

        QcOutcome {
            results,
            report,
            summary,
        }
    }
}

fn count_files(results: &[SubjectFindings], pred: impl Fn(&FileFindings) -> bool) -> usize {
    results
        .iter()
        .flat_map(|s| s.files.iter())
        .filter(|f| pred(f))
        .count()
}

fn is_csv(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("csv"))
        .unwrap_or(false)
}
