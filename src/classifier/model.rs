//! Persisted model artifact
//!
//! A trained forest is stored together with the feature schema it was fit on
//! and a small amount of training metadata. On disk the artifact is:
//!
//! ```text
//! b"RSKM" | format version (u16, little endian) | bitcode payload
//! ```
//!
//! Loading checks the magic and version before decoding, so a truncated or
//! foreign file fails with [`Error::ModelFormat`] instead of a decode panic.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::features::{FeatureMatrix, FeatureSchema};
use super::forest::{label_for_score, RandomForest};
use crate::error::{Error, Result};
use crate::models::RiskLabel;

const MAGIC: &[u8; 4] = b"RSKM";
const FORMAT_VERSION: u16 = 1;
const HEADER_LEN: usize = MAGIC.len() + 2;

/// Trained classifier plus the schema it expects
#[derive(Debug, Serialize, Deserialize)]
pub struct ModelArtifact {
    schema: FeatureSchema,
    forest: RandomForest,
    /// Rows the forest was fit on
    pub train_rows: usize,
    /// Crate version that produced the artifact
    pub created_by: String,
}

impl ModelArtifact {
    pub fn new(schema: FeatureSchema, forest: RandomForest, train_rows: usize) -> Self {
        Self {
            schema,
            forest,
            train_rows,
            created_by: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn forest(&self) -> &RandomForest {
        &self.forest
    }

    /// Vote fraction per row, after checking the matrix follows this
    /// artifact's schema
    pub fn risk_scores(&self, matrix: &FeatureMatrix) -> Result<Vec<f64>> {
        self.schema.ensure_matches(matrix.schema())?;
        self.forest.risk_scores(matrix)
    }

    /// Hard label per row, in input order
    pub fn predict(&self, matrix: &FeatureMatrix) -> Result<Vec<RiskLabel>> {
        Ok(self
            .risk_scores(matrix)?
            .into_iter()
            .map(label_for_score)
            .collect())
    }

    /// Encode to the on-disk byte format
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let payload = bitcode::serialize(self)
            .map_err(|e| Error::ModelFormat(format!("failed to encode model: {e}")))?;
        let mut bytes = Vec::with_capacity(HEADER_LEN + payload.len());
        bytes.extend_from_slice(MAGIC);
        bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        bytes.extend_from_slice(&payload);
        Ok(bytes)
    }

    /// Decode from the on-disk byte format
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN || &bytes[..MAGIC.len()] != MAGIC {
            return Err(Error::ModelFormat("not a riskscan model file".into()));
        }
        let version = u16::from_le_bytes([bytes[4], bytes[5]]);
        if version != FORMAT_VERSION {
            return Err(Error::ModelFormat(format!(
                "unsupported model format version {version} (expected {FORMAT_VERSION})"
            )));
        }
        bitcode::deserialize(&bytes[HEADER_LEN..])
            .map_err(|e| Error::ModelFormat(format!("corrupt model payload: {e}")))
    }

    /// Write the artifact, creating parent directories as needed
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }
        let bytes = self.to_bytes()?;
        std::fs::write(path, bytes).map_err(|e| Error::io(path, e))?;
        tracing::debug!("saved model ({} trees) to {}", self.forest.n_trees(), path.display());
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| Error::io(path, e))?;
        Self::from_bytes(&bytes)
    }
}
