//! Function risk classifier
//!
//! A random forest over the structural metrics of a function:
//!
//! - [`features`]: the feature schema and the record → matrix projection
//! - [`forest`]: bagged decision trees with majority vote
//! - [`model`]: the persisted artifact (forest + schema)
//! - [`report`]: held-out evaluation
//! - [`train`]: split, fit, evaluate, save

pub mod features;
pub mod forest;
pub mod model;
pub mod report;
pub mod train;

pub use features::{FeatureMatrix, FeatureSchema, FEATURE_NAMES, NUM_FEATURES};
pub use forest::{label_for_score, ForestConfig, RandomForest};
pub use model::ModelArtifact;
pub use report::{ClassMetrics, ClassificationReport};
pub use train::{train, train_from_file, train_test_split, Split, TrainConfig, TrainResult};
