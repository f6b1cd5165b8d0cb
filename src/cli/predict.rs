//! Predict command - classify the functions in one file

use anyhow::{Context, Result};
use console::style;
use std::path::Path;

use crate::inference::RiskPredictor;
use crate::models::{RiskLabel, RiskPrediction};

/// Run the predict command
pub fn run(file: &Path, model: &Path, format: &str) -> Result<()> {
    let predictor = RiskPredictor::load(model)
        .with_context(|| format!("Failed to load model {}", model.display()))?;
    let source = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let predictions = predictor
        .predict_source(&source)
        .with_context(|| format!("Failed to classify {}", file.display()))?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&predictions)?),
        _ => print_text(file, &predictions),
    }
    Ok(())
}

fn print_text(file: &Path, predictions: &[RiskPrediction]) {
    if predictions.is_empty() {
        println!("No top-level functions in {}", file.display());
        return;
    }
    let width = predictions.iter().map(|p| p.name.len()).max().unwrap_or(0);
    for p in predictions {
        let label = match p.risk_prediction {
            RiskLabel::Risky => style("risky").red().bold(),
            RiskLabel::Ok => style("ok").green(),
        };
        let score = p
            .risk_score
            .map(|s| format!("{:.2}", s))
            .unwrap_or_default();
        println!("{:<width$}  {:<5}  {}", p.name, label, style(score).dim());
    }
}
