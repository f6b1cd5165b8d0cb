//! Stubs command handler

use anyhow::{Context, Result};
use console::style;
use std::path::Path;

/// Generate unittest stubs from a feature table
pub fn run(data: &Path, output: &Path, module: &str) -> Result<()> {
    let count = crate::stubs::generate_from_csv(data, output, module)
        .with_context(|| format!("Failed to generate stubs from {}", data.display()))?;
    println!(
        "{} Test cases generated and saved to {} ({} stubs)",
        style("✓").green(),
        style(output.display()).cyan(),
        count
    );
    Ok(())
}
