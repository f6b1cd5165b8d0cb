//! Train command handler

use anyhow::{Context, Result};
use console::style;
use std::path::Path;

use crate::classifier::{self, TrainConfig};

/// Train on `data`, print the held-out report, save to `model`
pub fn run(data: &Path, model: &Path, config: &TrainConfig) -> Result<()> {
    let result = classifier::train_from_file(data, model, config)
        .with_context(|| format!("Training on {} failed", data.display()))?;

    let forest = result.artifact.forest().config();
    println!(
        "\n{} ({} train / {} test rows; {} trees, max depth {}, seed {})\n",
        style("Held-out evaluation").bold(),
        result.train_rows,
        result.test_rows,
        forest.n_trees,
        forest.max_depth,
        forest.seed
    );
    println!("{}", result.report);
    println!(
        "{} Model saved to {}",
        style("✓").green(),
        style(model.display()).cyan()
    );
    Ok(())
}
