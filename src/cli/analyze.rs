//! Analyze command - extract a feature table from a source directory

use anyhow::{Context, Result};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;

use crate::config::RiskscanConfig;
use crate::dataset;
use crate::error::Error;
use crate::pipeline::Pipeline;

/// Run the analyze command
pub fn run(src: &Path, output: &Path, config: &RiskscanConfig) -> Result<()> {
    let pipeline = Pipeline::new(src).with_max_file_size(config.batch.max_file_size);
    let sources = pipeline
        .collect_files()
        .with_context(|| format!("Failed to scan {}", src.display()))?;

    let bar = ProgressBar::new(sources.len() as u64);
    bar.set_style(bar_style());
    bar.set_message("Extracting features...");

    let result = pipeline.run_files(sources, |_| bar.inc(1));
    bar.finish_and_clear();

    let report = match result {
        Ok(report) => report,
        Err(Error::NoFunctions) => {
            eprintln!(
                "{} No functions found under {}; nothing written",
                style("!").yellow(),
                style(src.display()).cyan()
            );
            anyhow::bail!(Error::NoFunctions);
        }
        Err(e) => return Err(e).context("Batch analysis failed"),
    };

    dataset::save_records(output, &report.records)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    println!(
        "{} Extracted {} functions from {} files to {}",
        style("✓").green(),
        style(report.records.len()).cyan(),
        style(report.files_scanned).cyan(),
        style(output.display()).cyan()
    );
    for failure in &report.failures {
        println!(
            "  {} {}: {}",
            style("skipped").yellow(),
            failure.path.display(),
            style(&failure.message).dim()
        );
    }
    Ok(())
}

/// Create bar progress style
fn bar_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .map(|s| s.progress_chars("█▓▒░  "))
        .unwrap_or_else(|_| ProgressStyle::default_bar())
}
