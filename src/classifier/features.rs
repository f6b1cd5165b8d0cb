//! Feature schema and feature matrix
//!
//! A [`FeatureMatrix`] is a set of function records projected onto the
//! numeric columns: `name`, `file` and `label` are dropped, nothing else is.
//! The [`FeatureSchema`] travels with every matrix and every trained model so
//! a mismatch between the two is caught instead of silently mis-scored.

use crate::error::{Error, Result};
use crate::models::FunctionRecord;
use serde::{Deserialize, Serialize};

/// Number of numeric features per function.
pub const NUM_FEATURES: usize = 7;

/// Feature column names, in extraction order.
pub const FEATURE_NAMES: [&str; NUM_FEATURES] = [
    "length",
    "num_args",
    "num_returns",
    "num_if",
    "num_for",
    "num_while",
    "max_depth",
];

/// Ordered feature column names a matrix or model is built on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSchema {
    columns: Vec<String>,
}

impl FeatureSchema {
    /// The schema the current extractor produces
    pub fn current() -> Self {
        Self::new(FEATURE_NAMES.iter().map(|s| s.to_string()).collect())
    }

    pub fn new(columns: Vec<String>) -> Self {
        Self { columns }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Fail with a schema error unless `other` has the same columns in the
    /// same order.
    pub fn ensure_matches(&self, other: &FeatureSchema) -> Result<()> {
        if self == other {
            return Ok(());
        }
        Err(Error::Schema(format!(
            "feature columns [{}] do not match model columns [{}]",
            other.columns.join(", "),
            self.columns.join(", ")
        )))
    }
}

impl std::fmt::Display for FeatureSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.columns.join(","))
    }
}

/// Row-major numeric features plus the schema they follow
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    schema: FeatureSchema,
    rows: Vec<Vec<f32>>,
}

impl FeatureMatrix {
    /// Project records onto the current feature schema, preserving order
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a FunctionRecord>) -> Self {
        let rows = records
            .into_iter()
            .map(|r| r.metrics.values().iter().map(|&v| v as f32).collect())
            .collect();
        Self {
            schema: FeatureSchema::current(),
            rows,
        }
    }

    /// Build a matrix with an explicit schema.
    ///
    /// Every row must have one value per schema column.
    pub fn with_schema(schema: FeatureSchema, rows: Vec<Vec<f32>>) -> Result<Self> {
        if let Some((idx, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != schema.len())
        {
            return Err(Error::Schema(format!(
                "row {} has {} values, schema has {} columns",
                idx,
                row.len(),
                schema.len()
            )));
        }
        Ok(Self { schema, rows })
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn rows(&self) -> &[Vec<f32>] {
        &self.rows
    }

    pub fn row(&self, idx: usize) -> &[f32] {
        &self.rows[idx]
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn n_features(&self) -> usize {
        self.schema.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows at the given indices, same schema
    pub fn select(&self, indices: &[usize]) -> Self {
        Self {
            schema: self.schema.clone(),
            rows: indices.iter().map(|&i| self.rows[i].clone()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FunctionMetrics;

    #[test]
    fn test_projection_drops_identity_columns() {
        let record = FunctionRecord::new(
            "f",
            FunctionMetrics {
                length: 3,
                num_args: 1,
                num_returns: 1,
                num_if: 2,
                num_for: 0,
                num_while: 1,
                max_depth: 2,
            },
        )
        .with_file("a.py");

        let matrix = FeatureMatrix::from_records([&record]);
        assert_eq!(matrix.n_rows(), 1);
        assert_eq!(matrix.n_features(), NUM_FEATURES);
        assert_eq!(matrix.row(0), &[3.0, 1.0, 1.0, 2.0, 0.0, 1.0, 2.0]);
        assert_eq!(matrix.schema(), &FeatureSchema::current());
    }

    #[test]
    fn test_schema_mismatch_detected() {
        let current = FeatureSchema::current();
        let mut cols: Vec<String> = current.columns().to_vec();
        cols.swap(0, 1);
        let swapped = FeatureSchema::new(cols);

        assert!(current.ensure_matches(&current.clone()).is_ok());
        let err = current.ensure_matches(&swapped).unwrap_err();
        assert!(err.is_schema());
    }

    #[test]
    fn test_with_schema_rejects_ragged_rows() {
        let err = FeatureMatrix::with_schema(FeatureSchema::current(), vec![vec![1.0, 2.0]])
            .unwrap_err();
        assert!(err.is_schema());
    }

    #[test]
    fn test_select_keeps_order() {
        let rows = vec![vec![0.0; NUM_FEATURES], vec![1.0; NUM_FEATURES], vec![2.0; NUM_FEATURES]];
        let m = FeatureMatrix::with_schema(FeatureSchema::current(), rows).unwrap();
        let picked = m.select(&[2, 0]);
        assert_eq!(picked.row(0)[0], 2.0);
        assert_eq!(picked.row(1)[0], 0.0);
    }
}
