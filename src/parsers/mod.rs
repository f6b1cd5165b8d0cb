//! Source code parsing using tree-sitter
//!
//! Python is the only supported language. [`python`] turns source text into
//! a syntax tree and finds top-level functions; [`metrics`] computes the
//! structural features of each one.

pub mod metrics;
pub mod python;

use crate::error::{Error, Result};
use crate::models::FunctionRecord;
use std::path::Path;

/// File extensions the batch walker picks up
pub const SUPPORTED_EXTENSIONS: &[&str] = &["py"];

/// Check whether a path has a recognized source extension
pub fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| SUPPORTED_EXTENSIONS.contains(&ext))
}

/// Parse a file and extract a record for every top-level function.
///
/// Records are stamped with the file name (not the full path).
pub fn parse_file(path: &Path) -> Result<Vec<FunctionRecord>> {
    let source = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    python::extract_functions(&source, Some(&file_name))
}
