//! Training for the risk classifier
//!
//! Reads a labeled feature table, holds out a seeded test split, fits the
//! forest on the rest, scores the held-out rows and persists the artifact.
//! The evaluation report is diagnostic; a weak model is still saved.

use std::path::Path;

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use super::features::FeatureMatrix;
use super::forest::{ForestConfig, RandomForest};
use super::model::ModelArtifact;
use super::report::ClassificationReport;
use crate::dataset;
use crate::error::{Error, Result};
use crate::models::{Dataset, LabeledRecord, RiskLabel};

/// Training configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    /// Fraction of rows held out for evaluation (0.0 - 1.0)
    pub test_size: f64,
    /// Seed for the split and for forest sampling
    pub seed: u64,
    pub forest: ForestConfig,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            test_size: 0.2,
            seed: 42,
            forest: ForestConfig::default(),
        }
    }
}

/// Training result
#[derive(Debug)]
pub struct TrainResult {
    pub artifact: ModelArtifact,
    /// Held-out evaluation
    pub report: ClassificationReport,
    pub train_rows: usize,
    pub test_rows: usize,
}

/// Row indices for the training and held-out parts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Seeded shuffle split of `n` rows; the test part has `ceil(n * test_size)`
/// rows.
pub fn train_test_split(n: usize, test_size: f64, seed: u64) -> Split {
    let test_size = test_size.clamp(0.0, 1.0);
    let n_test = ((n as f64) * test_size).ceil() as usize;
    let n_test = n_test.min(n);

    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let train = indices.split_off(n_test);
    Split {
        train,
        test: indices,
    }
}

/// Train on an in-memory dataset
pub fn train(dataset: Dataset, config: &TrainConfig) -> Result<TrainResult> {
    let rows = match dataset {
        Dataset::Labeled(rows) => rows,
        Dataset::Unlabeled(_) => return Err(Error::Schema("missing label column".into())),
    };
    train_labeled(&rows, config)
}

fn train_labeled(rows: &[LabeledRecord], config: &TrainConfig) -> Result<TrainResult> {
    let split = train_test_split(rows.len(), config.test_size, config.seed);
    if split.train.is_empty() {
        return Err(Error::InsufficientData(format!(
            "{} labeled rows leave nothing to train on after the held-out split",
            rows.len()
        )));
    }

    tracing::info!(
        "Training: {} examples, held out: {} examples",
        split.train.len(),
        split.test.len()
    );

    let matrix = FeatureMatrix::from_records(rows.iter().map(|r| &r.record));
    let labels: Vec<RiskLabel> = rows.iter().map(|r| r.label).collect();

    let train_matrix = matrix.select(&split.train);
    let train_labels: Vec<RiskLabel> = split.train.iter().map(|&i| labels[i]).collect();

    let forest_config = ForestConfig {
        seed: config.seed,
        ..config.forest.clone()
    };
    let forest = RandomForest::fit(&train_matrix, &train_labels, &forest_config)?;
    let artifact = ModelArtifact::new(matrix.schema().clone(), forest, split.train.len());

    let test_matrix = matrix.select(&split.test);
    let test_labels: Vec<RiskLabel> = split.test.iter().map(|&i| labels[i]).collect();
    let predicted = artifact.predict(&test_matrix)?;
    let report = ClassificationReport::from_predictions(&test_labels, &predicted);

    Ok(TrainResult {
        artifact,
        report,
        train_rows: split.train.len(),
        test_rows: split.test.len(),
    })
}

/// Load a labeled table, train, log the report and save the model
pub fn train_from_file(data: &Path, model: &Path, config: &TrainConfig) -> Result<TrainResult> {
    let dataset = dataset::load(data)?;
    tracing::info!("Loaded {} rows from {}", dataset.len(), data.display());

    let result = train(dataset, config)?;
    tracing::info!(
        "Held-out accuracy {:.3} over {} rows",
        result.report.accuracy,
        result.test_rows
    );
    tracing::debug!("classification report:\n{}", result.report);

    result.artifact.save(model)?;
    tracing::info!("Model saved to {}", model.display());
    Ok(result)
}
