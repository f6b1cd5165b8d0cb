//! Batch aggregation pipeline
//!
//! Turns a directory of Python sources into one ordered list of function
//! records:
//! 1. Walk source files (respecting `.gitignore` and hidden files)
//! 2. Skip files over the size bound
//! 3. Parse files in parallel, isolating per-file failures
//! 4. Merge results ordered by file path, then declaration order

use rayon::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::models::FunctionRecord;
use crate::parsers;

/// Default per-file size bound (2 MiB)
pub const DEFAULT_MAX_FILE_SIZE: u64 = 2 * 1024 * 1024;

/// Batch run over a source directory.
#[derive(Debug, Clone)]
pub struct Pipeline {
    root: PathBuf,
    max_file_size: u64,
}

/// A file that could not be analyzed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFailure {
    pub path: PathBuf,
    pub message: String,
}

/// Source files found by the walk, plus entries the walk could not read
#[derive(Debug, Default)]
pub struct SourceFiles {
    /// Sorted by path
    pub files: Vec<PathBuf>,
    pub failures: Vec<FileFailure>,
}

impl SourceFiles {
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Output of a batch run.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Records in file-path order, then declaration order
    pub records: Vec<FunctionRecord>,
    /// Files skipped or rejected, in file-path order
    pub failures: Vec<FileFailure>,
    /// Source files considered
    pub files_scanned: usize,
}

impl BatchReport {
    /// Get a summary string.
    pub fn summary(&self) -> String {
        format!(
            "{} files, {} functions, {} failed",
            self.files_scanned,
            self.records.len(),
            self.failures.len()
        )
    }
}

impl Pipeline {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }

    /// Set the per-file size bound in bytes.
    pub fn with_max_file_size(mut self, bytes: u64) -> Self {
        self.max_file_size = bytes;
        self
    }

    /// Collect source files under the root, sorted by path.
    ///
    /// Directories or entries the walk cannot read are returned as failures
    /// rather than aborting the scan.
    pub fn collect_files(&self) -> Result<SourceFiles> {
        if !self.root.is_dir() {
            return Err(Error::io(
                &self.root,
                std::io::Error::new(std::io::ErrorKind::NotFound, "source directory not found"),
            ));
        }

        let mut builder = ignore::WalkBuilder::new(&self.root);
        builder
            .hidden(true)
            .git_ignore(true)
            .git_global(false)
            .git_exclude(true)
            .require_git(false);

        let mut sources = SourceFiles::default();
        for entry in builder.build() {
            match entry {
                Ok(entry) => {
                    let path = entry.into_path();
                    if path.is_file() && parsers::is_supported(&path) {
                        sources.files.push(path);
                    }
                }
                Err(err) => {
                    let failure = self.walk_failure(&err);
                    warn!("Cannot read {}: {}", failure.path.display(), failure.message);
                    sources.failures.push(failure);
                }
            }
        }
        sources.files.sort();

        debug!(
            "found {} source files under {} ({} unreadable entries)",
            sources.files.len(),
            self.root.display(),
            sources.failures.len()
        );
        Ok(sources)
    }

    /// Attribute a walk error to the deepest path it names, or the root
    fn walk_failure(&self, err: &ignore::Error) -> FileFailure {
        let mut path = None;
        let mut current = err;
        loop {
            match current {
                ignore::Error::WithPath { path: p, err } => {
                    path = Some(p.clone());
                    current = &**err;
                }
                ignore::Error::WithDepth { err, .. } | ignore::Error::WithLineNumber { err, .. } => {
                    current = &**err;
                }
                ignore::Error::Loop { child, .. } => {
                    path = Some(child.clone());
                    break;
                }
                _ => break,
            }
        }
        FileFailure {
            path: path.unwrap_or_else(|| self.root.clone()),
            message: err.to_string(),
        }
    }

    /// Run the batch. Fails with [`Error::NoFunctions`] if nothing was found.
    pub fn run(&self) -> Result<BatchReport> {
        self.run_with_progress(|_| {})
    }

    /// Run the batch, calling `on_file` once per file as it finishes.
    pub fn run_with_progress<F>(&self, on_file: F) -> Result<BatchReport>
    where
        F: Fn(&Path) + Sync,
    {
        let sources = self.collect_files()?;
        self.run_files(sources, on_file)
    }

    /// Analyze an already collected file list (see [`Pipeline::collect_files`]).
    pub fn run_files<F>(&self, sources: SourceFiles, on_file: F) -> Result<BatchReport>
    where
        F: Fn(&Path) + Sync,
    {
        let SourceFiles { files, failures } = sources;
        info!("Analyzing {} files under {}", files.len(), self.root.display());

        // Indexed parallel collect keeps the sorted file order
        let outcomes: Vec<std::result::Result<Vec<FunctionRecord>, String>> = files
            .par_iter()
            .map(|path| {
                let outcome = self.analyze_file(path);
                on_file(path);
                outcome
            })
            .collect();

        let mut report = BatchReport {
            files_scanned: files.len(),
            failures,
            ..Default::default()
        };
        for (path, outcome) in files.into_iter().zip(outcomes) {
            match outcome {
                Ok(records) => report.records.extend(records),
                Err(message) => {
                    warn!("Skipping {}: {}", path.display(), message);
                    report.failures.push(FileFailure { path, message });
                }
            }
        }

        report.failures.sort_by(|a, b| a.path.cmp(&b.path));

        if report.records.is_empty() {
            return Err(Error::NoFunctions);
        }
        info!("Batch complete: {}", report.summary());
        Ok(report)
    }

    fn analyze_file(&self, path: &Path) -> std::result::Result<Vec<FunctionRecord>, String> {
        let size = std::fs::metadata(path).map_err(|e| e.to_string())?.len();
        if size > self.max_file_size {
            return Err(format!(
                "file is {size} bytes, over the {} byte limit",
                self.max_file_size
            ));
        }
        parsers::parse_file(path).map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_records_ordered_by_path_then_declaration() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("b.py"), "def b1():\n    pass\n\ndef b2():\n    pass\n").unwrap();
        fs::write(dir.path().join("a.py"), "def a1():\n    return 1\n").unwrap();
        fs::create_dir(dir.path().join("pkg")).unwrap();
        fs::write(dir.path().join("pkg").join("c.py"), "def c1(x):\n    return x\n").unwrap();
        fs::write(dir.path().join("notes.txt"), "def not_python():\n").unwrap();

        let report = Pipeline::new(dir.path()).run().unwrap();
        let names: Vec<&str> = report.records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["a1", "b1", "b2", "c1"]);
        assert_eq!(report.files_scanned, 3);
        assert!(report.failures.is_empty());
        assert_eq!(report.records[3].file.as_deref(), Some("c.py"));
    }

    #[test]
    fn test_malformed_file_does_not_abort_batch() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("bad.py"), "def broken(:\n    pass\n").unwrap();
        fs::write(dir.path().join("good.py"), "def fine():\n    return 0\n").unwrap();

        let report = Pipeline::new(dir.path()).run().unwrap();
        assert_eq!(report.records.len(), 1);
        assert_eq!(report.records[0].name, "fine");
        assert_eq!(report.failures.len(), 1);
        assert!(report.failures[0].path.ends_with("bad.py"));
    }

    #[test]
    fn test_oversized_file_skipped() {
        let dir = tempdir().unwrap();
        let big = format!("def big():\n    x = '{}'\n", "a".repeat(200));
        fs::write(dir.path().join("big.py"), big).unwrap();
        fs::write(dir.path().join("small.py"), "def s():\n    pass\n").unwrap();

        let report = Pipeline::new(dir.path())
            .with_max_file_size(100)
            .run()
            .unwrap();
        assert_eq!(report.records.len(), 1);
        assert!(report.failures[0].message.contains("limit"));
    }

    #[test]
    fn test_no_functions_is_an_error() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("consts.py"), "X = 1\n").unwrap();
        assert!(matches!(Pipeline::new(dir.path()).run(), Err(Error::NoFunctions)));
    }

    #[test]
    fn test_missing_root_is_io_error() {
        let dir = tempdir().unwrap();
        let err = Pipeline::new(dir.path().join("absent")).run().unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }

    #[test]
    fn test_walk_error_attributed_to_its_path() {
        let pipeline = Pipeline::new("/src");
        let err = ignore::Error::WithDepth {
            depth: 1,
            err: Box::new(ignore::Error::WithPath {
                path: PathBuf::from("/src/locked"),
                err: Box::new(ignore::Error::Io(std::io::Error::new(
                    std::io::ErrorKind::PermissionDenied,
                    "permission denied",
                ))),
            }),
        };
        let failure = pipeline.walk_failure(&err);
        assert_eq!(failure.path, PathBuf::from("/src/locked"));
        assert!(failure.message.contains("permission denied"));

        let bare = ignore::Error::Io(std::io::Error::other("boom"));
        assert_eq!(pipeline.walk_failure(&bare).path, PathBuf::from("/src"));
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_directory_recorded_as_failure() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        fs::write(dir.path().join("ok.py"), "def ok():\n    pass\n").unwrap();
        let locked = dir.path().join("locked");
        fs::create_dir(&locked).unwrap();
        fs::write(locked.join("hidden.py"), "def h():\n    pass\n").unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        // Privileged users can still list the directory
        let readable = fs::read_dir(&locked).is_ok();
        let report = Pipeline::new(dir.path()).run();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
        if readable {
            return;
        }

        let report = report.unwrap();
        assert_eq!(report.records.len(), 1);
        assert_eq!(report.failures.len(), 1);
        assert!(report.failures[0].path.ends_with("locked"));
    }

    #[test]
    fn test_progress_called_per_file() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let dir = tempdir().unwrap();
        for i in 0..5 {
            fs::write(dir.path().join(format!("m{i}.py")), "def f():\n    pass\n").unwrap();
        }
        let seen = AtomicUsize::new(0);
        let report = Pipeline::new(dir.path())
            .run_with_progress(|_| {
                seen.fetch_add(1, Ordering::Relaxed);
            })
            .unwrap();
        assert_eq!(seen.load(Ordering::Relaxed), 5);
        assert_eq!(report.summary(), "5 files, 5 functions, 0 failed");
    }
}
