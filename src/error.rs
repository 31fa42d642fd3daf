//! Error types for the heart-rate QC engine

use thiserror::Error;

/// Errors that can occur while deriving zones, reading recordings or running QC
#[derive(Debug, Error)]
pub enum QcError {
    #[error("Invalid input: {0}")]
    Input(String),

    #[error("Subject not found in zone table: {0}")]
    Lookup(String),

    #[error("Failed to parse input file: {0}")]
    Parse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl QcError {
    /// Short machine-readable code, used by the CLI error output
    pub fn code(&self) -> &'static str {
        match self {
            QcError::Input(_) => "INPUT_ERROR",
            QcError::Lookup(_) => "LOOKUP_ERROR",
            QcError::Parse(_) => "PARSE_ERROR",
            QcError::Config(_) => "CONFIG_ERROR",
            QcError::Io(_) => "IO_ERROR",
            QcError::Csv(_) => "CSV_ERROR",
            QcError::Json(_) => "JSON_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_detail() {
        let err = QcError::Lookup("sub99".to_string());
        assert_eq!(err.to_string(), "Subject not found in zone table: sub99");
        assert_eq!(err.code(), "LOOKUP_ERROR");
    }
}
