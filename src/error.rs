//! Error taxonomy for the analysis core
//!
//! Library code returns [`Result<T>`]; CLI handlers wrap these in `anyhow`
//! with extra context.

use std::path::PathBuf;
use thiserror::Error;

/// Errors produced by parsing, the feature table, training and inference
#[derive(Error, Debug)]
pub enum Error {
    /// Source text is not valid Python
    #[error("{}", format_parse_error(.file, .line, .column, .message))]
    Parse {
        file: Option<String>,
        line: usize,
        column: usize,
        message: String,
    },

    /// Table or model columns do not match what the operation expects
    #[error("schema error: {0}")]
    Schema(String),

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read feature table: {0}")]
    Csv(#[from] csv::Error),

    /// Model artifact is truncated, foreign, or from another format version
    #[error("invalid model artifact: {0}")]
    ModelFormat(String),

    /// A batch run found no top-level functions in any file
    #[error("no functions found to analyze")]
    NoFunctions,

    #[error("insufficient training data: {0}")]
    InsufficientData(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Wrap an I/O error with the path it happened on
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    pub fn is_parse(&self) -> bool {
        matches!(self, Error::Parse { .. })
    }

    pub fn is_schema(&self) -> bool {
        matches!(self, Error::Schema(_))
    }
}

fn format_parse_error(file: &Option<String>, line: &usize, column: &usize, message: &str) -> String {
    match file {
        Some(file) => format!("{file}:{line}:{column}: {message}"),
        None => format!("line {line}, column {column}: {message}"),
    }
}
