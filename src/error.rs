//! Error taxonomy for the pipeline.
//!
//! Fatal conditions are `AppError` variants; every variant maps to a process
//! exit code so the binary can stay a thin wrapper. Non-fatal outcomes
//! (convergence warnings, skipped associations) are plain values in `domain`.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Malformed or insufficient input data, with optional row/column context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataError {
    pub message: String,
    pub line: Option<usize>,
    pub column: Option<String>,
}

impl DataError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            line: None,
            column: None,
        }
    }

    pub fn at_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }

    pub fn in_column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }
}

impl fmt::Display for DataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        match (&self.line, &self.column) {
            (Some(line), Some(col)) => write!(f, " (line {line}, column `{col}`)"),
            (Some(line), None) => write!(f, " (line {line})"),
            (None, Some(col)) => write!(f, " (column `{col}`)"),
            (None, None) => Ok(()),
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("data error: {0}")]
    Data(DataError),

    /// The sampler failed; no change-point artifact is written.
    #[error("model fit failed: {0}")]
    ModelFit(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("I/O error on '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error in '{}': {source}", .path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("JSON error in '{}': {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("FRED fetch failed: {0}")]
    Fetch(String),
}

impl AppError {
    pub fn data(message: impl Into<String>) -> Self {
        AppError::Data(DataError::new(message))
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        AppError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn csv(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        AppError::Csv {
            path: path.into(),
            source,
        }
    }

    pub fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        AppError::Json {
            path: path.into(),
            source,
        }
    }

    pub fn exit_code(&self) -> u8 {
        match self {
            AppError::Config(_) | AppError::Io { .. } | AppError::Csv { .. } | AppError::Json { .. } => 2,
            AppError::Data(_) => 3,
            AppError::ModelFit(_) | AppError::Fetch(_) => 4,
        }
    }
}

impl From<DataError> for AppError {
    fn from(value: DataError) -> Self {
        AppError::Data(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_error_display_includes_context() {
        let err = DataError::new("Invalid price").at_line(7).in_column("Price");
        assert_eq!(err.to_string(), "Invalid price (line 7, column `Price`)");

        let err = DataError::new("Too few rows");
        assert_eq!(err.to_string(), "Too few rows");
    }

    #[test]
    fn exit_codes_follow_stage_severity() {
        assert_eq!(AppError::Config("x".into()).exit_code(), 2);
        assert_eq!(AppError::data("x").exit_code(), 3);
        assert_eq!(AppError::ModelFit("x".into()).exit_code(), 4);
        let io = AppError::io("a.csv", std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        assert_eq!(io.exit_code(), 2);
        assert!(io.to_string().contains("a.csv"));
    }
}
