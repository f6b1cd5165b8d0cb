//! Inference path
//!
//! [`RiskPredictor`] wraps a loaded [`ModelArtifact`]. It is built once,
//! never mutated, and shared by `Arc` between request handlers; concurrent
//! calls only read it.

use std::path::Path;

use crate::classifier::{label_for_score, FeatureMatrix, FeatureSchema, ModelArtifact};
use crate::error::Result;
use crate::models::{FunctionRecord, RiskPrediction};
use crate::parsers::python;

/// Loaded classifier ready to score functions
#[derive(Debug)]
pub struct RiskPredictor {
    artifact: ModelArtifact,
}

impl RiskPredictor {
    /// Load a persisted model artifact
    pub fn load(path: &Path) -> Result<Self> {
        let artifact = ModelArtifact::load(path)?;
        tracing::info!(
            "Loaded model from {} ({} trees, schema {})",
            path.display(),
            artifact.forest().n_trees(),
            artifact.schema()
        );
        Ok(Self::from_artifact(artifact))
    }

    pub fn from_artifact(artifact: ModelArtifact) -> Self {
        Self { artifact }
    }

    /// Columns the model expects
    pub fn schema(&self) -> &FeatureSchema {
        self.artifact.schema()
    }

    /// Parse source text and classify every top-level function, in
    /// declaration order.
    pub fn predict_source(&self, code: &str) -> Result<Vec<RiskPrediction>> {
        let records = python::extract_functions(code, None)?;
        self.predict_records(&records)
    }

    /// Classify pre-extracted records, preserving input order
    pub fn predict_records(&self, records: &[FunctionRecord]) -> Result<Vec<RiskPrediction>> {
        let matrix = FeatureMatrix::from_records(records);
        self.predict_matrix(records, &matrix)
    }

    fn predict_matrix(
        &self,
        records: &[FunctionRecord],
        matrix: &FeatureMatrix,
    ) -> Result<Vec<RiskPrediction>> {
        if records.is_empty() {
            self.artifact.schema().ensure_matches(matrix.schema())?;
            return Ok(Vec::new());
        }
        let scores = self.artifact.risk_scores(matrix)?;
        Ok(records
            .iter()
            .zip(scores)
            .map(|(record, score)| RiskPrediction {
                name: record.name.clone(),
                risk_prediction: label_for_score(score),
                risk_score: Some(score),
            })
            .collect())
    }
}
