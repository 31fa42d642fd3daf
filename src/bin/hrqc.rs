//! hrqc - Command-line interface for the heart-rate QC engine
//!
//! Commands:
//! - run: QC every recording in the study tree (or one session folder) and write the CSV report
//! - check: QC a single recording and print its findings
//! - zones: Print a subject's derived zone boundaries

use clap::{Parser, Subcommand};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Mutex;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use hr_zone_qc::adapters::{SeriesAdapter, ZoneSheet};
use hr_zone_qc::config::{resolve_base_path, QcConfig};
use hr_zone_qc::discovery::{discover_sessions, StudyLayout};
use hr_zone_qc::engine::QcEngine;
use hr_zone_qc::events::{default_sink, QcEvent};
use hr_zone_qc::pipeline::QcRunner;
use hr_zone_qc::zones::{placeholder_zones, ZoneBoundaryDeriver, ZoneCache, ZoneTableSource};
use hr_zone_qc::{QcError, QC_VERSION};

/// hrqc - Quality control for exercise-session heart-rate recordings
#[derive(Parser)]
#[command(name = "hrqc")]
#[command(version = QC_VERSION)]
#[command(about = "Flag gaps and missing-value runs in heart-rate recordings", long_about = None)]
struct Cli {
    /// Log debug events
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Also append log output to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// QC every recording and write the report
    Run {
        /// Deployment label (Argon, Home, vosslnx)
        #[arg(long)]
        system: Option<String>,

        /// Study root, overriding the system label's path
        #[arg(long)]
        base_path: Option<PathBuf>,

        /// Process a single session folder instead of the study tree
        #[arg(long, conflicts_with_all = ["system", "base_path"])]
        session_dir: Option<PathBuf>,

        /// Zone sheet (CSV export)
        #[arg(long)]
        zones: PathBuf,

        /// Report path
        #[arg(short, long)]
        output: PathBuf,

        /// QC configuration (JSON)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Write the run summary as JSON to this path
        #[arg(long)]
        summary: Option<PathBuf>,
    },

    /// QC one recording and print its findings as JSON
    Check {
        /// Recording (Polar CSV export)
        #[arg(short, long)]
        input: PathBuf,

        /// Zone sheet (CSV export); placeholder zones are used without it
        #[arg(long, requires = "subject")]
        zones: Option<PathBuf>,

        /// Subject id to look up in the zone sheet
        #[arg(long, requires = "zones")]
        subject: Option<String>,

        /// QC configuration (JSON)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Print a subject's derived zones as JSON
    Zones {
        /// Zone sheet (CSV export)
        #[arg(long)]
        zones: PathBuf,

        /// Subject id, e.g. sub07
        #[arg(long)]
        subject: String,

        /// Midpoint snap granularity (bpm)
        #[arg(long, default_value = "5")]
        snap_to: i32,

        /// Column of zone 1 start in the sheet
        #[arg(long, default_value = "5")]
        zone_column_offset: usize,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_tracing(cli.verbose, cli.log_file.as_deref()) {
        eprintln!("{}", error_json(e));
        return ExitCode::FAILURE;
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", error_json(e));
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool, log_file: Option<&Path>) -> Result<(), HrqcCliError> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let file_layer = match log_file {
        Some(path) => {
            let file = fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .init();
    Ok(())
}

fn run(cli: Cli) -> Result<(), HrqcCliError> {
    match cli.command {
        Commands::Run {
            system,
            base_path,
            session_dir,
            zones,
            output,
            config,
            summary,
        } => cmd_run(
            system.as_deref(),
            base_path.as_deref(),
            session_dir.as_deref(),
            &zones,
            &output,
            config.as_deref(),
            summary.as_deref(),
        ),

        Commands::Check {
            input,
            zones,
            subject,
            config,
        } => cmd_check(&input, zones.as_deref(), subject.as_deref(), config.as_deref()),

        Commands::Zones {
            zones,
            subject,
            snap_to,
            zone_column_offset,
        } => cmd_zones(&zones, &subject, snap_to, zone_column_offset),
    }
}

fn load_config(path: Option<&Path>) -> Result<QcConfig, QcError> {
    match path {
        Some(path) => QcConfig::from_path(path),
        None => Ok(QcConfig::default()),
    }
}

enum Target {
    Session(PathBuf),
    Study(PathBuf),
}

fn cmd_run(
    system: Option<&str>,
    base_path: Option<&Path>,
    session_dir: Option<&Path>,
    zones: &Path,
    output: &Path,
    config: Option<&Path>,
    summary: Option<&Path>,
) -> Result<(), HrqcCliError> {
    // Configuration problems abort before anything is read
    let config = load_config(config)?;
    let target = match session_dir {
        Some(dir) => Target::Session(dir.to_path_buf()),
        None => Target::Study(resolve_base_path(system, base_path)?),
    };

    let sink = default_sink();
    let sheet = ZoneSheet::from_csv_path(zones, config.zone_column_offset, &sink)?;
    let mut runner = QcRunner::with_sink(&config, sink.clone())?;

    let outcome = match target {
        Target::Session(dir) => {
            let sessions = discover_sessions(&dir)?;
            runner.run(&sessions, &sheet)
        }
        Target::Study(base) => runner.run_study(&base, &StudyLayout::default(), &sheet),
    };

    outcome.report.write_csv(output)?;
    sink.emit(QcEvent::ReportWritten {
        path: output.display().to_string(),
        rows: outcome.report.len(),
    });

    if let Some(path) = summary {
        fs::write(path, serde_json::to_string_pretty(&outcome.summary)?)?;
    }

    let s = &outcome.summary;
    println!("QC Run {}", s.run_id);
    println!("==========");
    println!("Subjects:      {}", s.subjects);
    println!("Files:         {}", s.files);
    println!("Flagged files: {}", s.flagged_files);
    println!("Failed files:  {}", s.failed_files);
    println!("Report rows:   {}", s.report_rows);
    println!("Report:        {}", output.display());

    Ok(())
}

fn cmd_check(
    input: &Path,
    zones: Option<&Path>,
    subject: Option<&str>,
    config: Option<&Path>,
) -> Result<(), HrqcCliError> {
    let config = load_config(config)?;
    config.validate()?;
    let sink = default_sink();

    let boundaries = match (zones, subject) {
        (Some(zones), Some(subject)) => {
            let sheet = ZoneSheet::from_csv_path(zones, config.zone_column_offset, &sink)?;
            ZoneCache::new(config.snap_to).get_or_derive(subject, &sheet)?
        }
        _ => placeholder_zones(),
    };

    let series = config.series_adapter().parse(input)?;
    let engine = QcEngine::new(config.gap_detector(), config.run_detector()).with_sink(sink);
    let findings = engine.evaluate(series, &boundaries)?;

    println!("{}", serde_json::to_string_pretty(&findings)?);
    Ok(())
}

fn cmd_zones(
    zones: &Path,
    subject: &str,
    snap_to: i32,
    zone_column_offset: usize,
) -> Result<(), HrqcCliError> {
    let sink = default_sink();
    let sheet = ZoneSheet::from_csv_path(zones, zone_column_offset, &sink)?;
    let raw = sheet.lookup(subject)?;
    let derived = ZoneBoundaryDeriver::derive(&raw, snap_to)?;

    let out = serde_json::json!({
        "subject": subject,
        "snap_to": snap_to,
        "raw": raw.zones,
        "derived": derived.zones(),
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

// Error types

#[derive(Debug)]
enum HrqcCliError {
    Qc(QcError),
    Io(io::Error),
    Json(serde_json::Error),
}

impl From<QcError> for HrqcCliError {
    fn from(e: QcError) -> Self {
        HrqcCliError::Qc(e)
    }
}

impl From<io::Error> for HrqcCliError {
    fn from(e: io::Error) -> Self {
        HrqcCliError::Io(e)
    }
}

impl From<serde_json::Error> for HrqcCliError {
    fn from(e: serde_json::Error) -> Self {
        HrqcCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<HrqcCliError> for CliError {
    fn from(e: HrqcCliError) -> Self {
        match e {
            HrqcCliError::Qc(e) => {
                let hint = match &e {
                    QcError::Config(_) => Some("Check --system, --base-path and the config file"),
                    QcError::Lookup(_) => Some("Check the subject id against the zone sheet"),
                    QcError::Parse(_) => Some("Ensure the file is an unmodified Polar CSV export"),
                    QcError::Input(_) => Some("Check that the recording contains samples"),
                    QcError::Io(_) | QcError::Csv(_) => Some("Check file paths and permissions"),
                    QcError::Json(_) => Some("Check JSON syntax"),
                };
                CliError {
                    code: e.code().to_string(),
                    message: e.to_string(),
                    hint: hint.map(str::to_string),
                }
            }
            HrqcCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            HrqcCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: None,
            },
        }
    }
}

fn error_json(e: HrqcCliError) -> String {
    serde_json::to_string(&CliError::from(e)).unwrap_or_else(|_| "Unknown error".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_check_subject_requires_zone_sheet() {
        let result = Cli::try_parse_from(["hrqc", "check", "--input", "a.csv", "--subject", "sub07"]);
        assert!(result.is_err());

        let result = Cli::try_parse_from(["hrqc", "check", "--input", "a.csv", "--zones", "z.csv"]);
        assert!(result.is_err());

        let cli = Cli::try_parse_from([
            "hrqc", "check", "--input", "a.csv", "--zones", "z.csv", "--subject", "sub07",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Commands::Check { subject: Some(ref s), .. } if s == "sub07"
        ));
    }

    #[test]
    fn test_check_without_zone_sheet_parses() {
        let cli = Cli::try_parse_from(["hrqc", "check", "--input", "a.csv"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Check {
                zones: None,
                subject: None,
                ..
            }
        ));
    }
}
