//! Core data models for riskscan
//!
//! A function is described by its identity (`name`, `file`) and a fixed set
//! of structural metrics. Training rows carry a [`RiskLabel`] on top; the two
//! shapes are separate types so nothing downstream has to guess which one it
//! holds.

use serde::{Deserialize, Serialize};

/// Structural metrics for one function, in feature-schema order
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionMetrics {
    /// Statements directly in the function body (not the full subtree)
    pub length: u32,
    /// Positional-or-keyword parameters
    pub num_args: u32,
    pub num_returns: u32,
    pub num_if: u32,
    pub num_for: u32,
    pub num_while: u32,
    /// Deepest statement-block nesting level; the function body is level 0
    pub max_depth: u32,
}

impl FunctionMetrics {
    /// Metric values in feature-schema order
    pub fn values(&self) -> [u32; 7] {
        [
            self.length,
            self.num_args,
            self.num_returns,
            self.num_if,
            self.num_for,
            self.num_while,
            self.max_depth,
        ]
    }
}

/// One analyzed function without ground truth
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionRecord {
    pub name: String,
    /// Originating file name; `None` for snippets submitted directly
    pub file: Option<String>,
    pub metrics: FunctionMetrics,
}

impl FunctionRecord {
    pub fn new(name: impl Into<String>, metrics: FunctionMetrics) -> Self {
        Self {
            name: name.into(),
            file: None,
            metrics,
        }
    }

    /// Stamp the originating file
    pub fn with_file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }

    /// Attach ground truth, turning this into a training row
    pub fn labeled(self, label: RiskLabel) -> LabeledRecord {
        LabeledRecord {
            record: self,
            label,
        }
    }
}

/// Binary risk outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum RiskLabel {
    Ok = 0,
    Risky = 1,
}

impl RiskLabel {
    pub const ALL: [RiskLabel; 2] = [RiskLabel::Ok, RiskLabel::Risky];

    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl From<RiskLabel> for u8 {
    fn from(label: RiskLabel) -> u8 {
        label.as_u8()
    }
}

impl TryFrom<u8> for RiskLabel {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(RiskLabel::Ok),
            1 => Ok(RiskLabel::Risky),
            other => Err(format!("label must be 0 or 1, found {other}")),
        }
    }
}

impl TryFrom<i64> for RiskLabel {
    type Error = String;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(RiskLabel::Ok),
            1 => Ok(RiskLabel::Risky),
            other => Err(format!("label must be 0 or 1, found {other}")),
        }
    }
}

impl std::fmt::Display for RiskLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_u8())
    }
}

/// A function record with ground truth, used for training
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabeledRecord {
    pub record: FunctionRecord,
    pub label: RiskLabel,
}

/// Rows read from a feature table, variant chosen by the presence of a
/// `label` column
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dataset {
    Labeled(Vec<LabeledRecord>),
    Unlabeled(Vec<FunctionRecord>),
}

impl Dataset {
    pub fn len(&self) -> usize {
        match self {
            Dataset::Labeled(rows) => rows.len(),
            Dataset::Unlabeled(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_labeled(&self) -> bool {
        matches!(self, Dataset::Labeled(_))
    }

    /// Drop labels (if any) and return the bare records
    pub fn into_records(self) -> Vec<FunctionRecord> {
        match self {
            Dataset::Labeled(rows) => rows.into_iter().map(|r| r.record).collect(),
            Dataset::Unlabeled(rows) => rows,
        }
    }
}

/// Classifier output for one function
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskPrediction {
    pub name: String,
    pub risk_prediction: RiskLabel,
    /// Fraction of trees voting risky
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub risk_score: Option<f64>,
}
