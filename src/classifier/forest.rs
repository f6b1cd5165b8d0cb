//! Bagged decision-tree ensemble (random forest)
//!
//! Each member is a `gbdt` regression tree fit on a bootstrap resample of the
//! training rows, restricted to a random subset of feature columns. Trees
//! regress the 0/1 label, so a leaf value is the fraction of risky rows that
//! reached it; a tree votes risky when its output is at least 0.5 and the
//! forest predicts risky on a strict majority of votes.
//!
//! All randomness (bootstrap rows and feature subsets) is drawn up front from
//! a seeded ChaCha stream, so training is reproducible even though the trees
//! are fit in parallel.

use gbdt::config::Loss;
use gbdt::decision_tree::{Data, DataVec, DecisionTree, TrainingCache};
use rand::seq::index;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::features::FeatureMatrix;
use crate::error::{Error, Result};
use crate::models::RiskLabel;

/// Forest hyper-parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestConfig {
    /// Number of trees in the ensemble
    pub n_trees: usize,
    /// Maximum depth of each tree
    pub max_depth: u32,
    /// Minimum rows per leaf
    pub min_leaf_size: usize,
    /// Feature columns per tree; `None` means `floor(sqrt(n_features))`
    pub max_features: Option<usize>,
    /// Seed for bootstrap and feature sampling
    pub seed: u64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_depth: 10,
            min_leaf_size: 1,
            max_features: None,
            seed: 42,
        }
    }
}

impl ForestConfig {
    /// Feature subset size for a matrix with `n_features` columns
    pub fn features_per_tree(&self, n_features: usize) -> usize {
        let default = (n_features as f64).sqrt().floor() as usize;
        self.max_features
            .unwrap_or(default)
            .clamp(1, n_features.max(1))
    }
}

/// One ensemble member and the columns it was trained on
#[derive(Serialize, Deserialize)]
struct BaggedTree {
    features: Vec<usize>,
    tree: DecisionTree,
}

impl BaggedTree {
    fn project(&self, row: &[f32]) -> Vec<f32> {
        self.features.iter().map(|&i| row[i]).collect()
    }

    /// Risky vote per row
    fn votes(&self, matrix: &FeatureMatrix) -> Vec<bool> {
        let data: DataVec = matrix
            .rows()
            .iter()
            .map(|row| Data::new_test_data(self.project(row), None))
            .collect();
        self.tree
            .predict(&data)
            .into_iter()
            .map(|p| p >= 0.5)
            .collect()
    }
}

/// Sampling plan for one tree, drawn before any fitting happens
struct TreePlan {
    features: Vec<usize>,
    rows: Vec<usize>,
}

/// Trained ensemble classifier
#[derive(Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<BaggedTree>,
    n_features: usize,
    config: ForestConfig,
}

impl std::fmt::Debug for RandomForest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RandomForest")
            .field("n_trees", &self.trees.len())
            .field("n_features", &self.n_features)
            .field("config", &self.config)
            .finish()
    }
}

impl RandomForest {
    /// Fit a forest on `matrix` with one label per row.
    pub fn fit(matrix: &FeatureMatrix, labels: &[RiskLabel], config: &ForestConfig) -> Result<Self> {
        if matrix.is_empty() {
            return Err(Error::InsufficientData("no training rows".into()));
        }
        if matrix.n_rows() != labels.len() {
            return Err(Error::InsufficientData(format!(
                "row count ({}) does not match label count ({})",
                matrix.n_rows(),
                labels.len()
            )));
        }
        if matrix.n_features() == 0 {
            return Err(Error::Schema("matrix has no feature columns".into()));
        }
        if config.n_trees == 0 {
            return Err(Error::InsufficientData("forest needs at least one tree".into()));
        }

        let n_rows = matrix.n_rows();
        let n_features = matrix.n_features();
        let per_tree = config.features_per_tree(n_features);

        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
        let plans: Vec<TreePlan> = (0..config.n_trees)
            .map(|_| {
                let mut features = index::sample(&mut rng, n_features, per_tree).into_vec();
                features.sort_unstable();
                let rows = (0..n_rows).map(|_| rng.random_range(0..n_rows)).collect();
                TreePlan { features, rows }
            })
            .collect();

        let trees = plans
            .into_par_iter()
            .map(|plan| fit_tree(matrix, labels, plan, config))
            .collect();

        tracing::debug!(
            "fit {} trees on {} rows, {} of {} features each",
            config.n_trees,
            n_rows,
            per_tree,
            n_features
        );

        Ok(Self {
            trees,
            n_features,
            config: config.clone(),
        })
    }

    /// Fraction of trees voting risky, per row
    pub fn risk_scores(&self, matrix: &FeatureMatrix) -> Result<Vec<f64>> {
        if matrix.n_features() != self.n_features {
            return Err(Error::Schema(format!(
                "matrix has {} features, forest was trained on {}",
                matrix.n_features(),
                self.n_features
            )));
        }
        if matrix.is_empty() || self.trees.is_empty() {
            return Ok(vec![0.0; matrix.n_rows()]);
        }

        let mut risky = vec![0usize; matrix.n_rows()];
        for tree in &self.trees {
            for (count, vote) in risky.iter_mut().zip(tree.votes(matrix)) {
                if vote {
                    *count += 1;
                }
            }
        }

        let n_trees = self.trees.len() as f64;
        Ok(risky.into_iter().map(|c| c as f64 / n_trees).collect())
    }

    /// Majority-vote label per row; a tie goes to [`RiskLabel::Ok`]
    pub fn predict(&self, matrix: &FeatureMatrix) -> Result<Vec<RiskLabel>> {
        Ok(self
            .risk_scores(matrix)?
            .into_iter()
            .map(label_for_score)
            .collect())
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn config(&self) -> &ForestConfig {
        &self.config
    }
}

/// Hard label from a vote fraction
pub fn label_for_score(score: f64) -> RiskLabel {
    if score > 0.5 {
        RiskLabel::Risky
    } else {
        RiskLabel::Ok
    }
}

fn fit_tree(
    matrix: &FeatureMatrix,
    labels: &[RiskLabel],
    plan: TreePlan,
    config: &ForestConfig,
) -> BaggedTree {
    let data: DataVec = plan
        .rows
        .iter()
        .map(|&i| {
            let row = matrix.row(i);
            let features = plan.features.iter().map(|&f| row[f]).collect();
            Data::new_training_data(features, 1.0, labels[i].as_u8() as f32, None)
        })
        .collect();

    let mut tree = DecisionTree::new();
    tree.set_feature_size(plan.features.len());
    tree.set_max_depth(config.max_depth);
    tree.set_min_leaf_size(config.min_leaf_size);
    tree.set_loss(Loss::SquaredError);

    let mut cache = TrainingCache::get_cache(plan.features.len(), &data, 2);
    tree.fit(&data, &mut cache);

    BaggedTree {
        features: plan.features,
        tree,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::features::{FeatureSchema, NUM_FEATURES};

    /// Two well-separated clusters: small flat functions are ok, large deeply
    /// nested ones are risky.
    fn clustered(n_per_class: usize) -> (FeatureMatrix, Vec<RiskLabel>) {
        let mut rows = Vec::new();
        let mut labels = Vec::new();
        for i in 0..n_per_class {
            let jitter = (i % 3) as f32;
            rows.push(vec![2.0 + jitter, 1.0, 1.0, 0.0, 0.0, 0.0, 0.0]);
            labels.push(RiskLabel::Ok);
            rows.push(vec![40.0 + jitter, 6.0, 8.0, 12.0, 5.0, 3.0, 6.0 + jitter]);
            labels.push(RiskLabel::Risky);
        }
        let matrix = FeatureMatrix::with_schema(FeatureSchema::current(), rows).unwrap();
        (matrix, labels)
    }

    fn small_config() -> ForestConfig {
        ForestConfig {
            n_trees: 15,
            max_depth: 4,
            ..Default::default()
        }
    }

    #[test]
    fn test_features_per_tree() {
        let config = ForestConfig::default();
        assert_eq!(config.features_per_tree(NUM_FEATURES), 2);
        assert_eq!(config.features_per_tree(1), 1);

        let all = ForestConfig {
            max_features: Some(100),
            ..Default::default()
        };
        assert_eq!(all.features_per_tree(NUM_FEATURES), NUM_FEATURES);
    }

    #[test]
    fn test_fit_separates_clusters() {
        let (matrix, labels) = clustered(20);
        let forest = RandomForest::fit(&matrix, &labels, &small_config()).expect("fit");
        assert_eq!(forest.n_trees(), 15);

        let predicted = forest.predict(&matrix).unwrap();
        let correct = predicted.iter().zip(&labels).filter(|(p, l)| p == l).count();
        assert!(
            correct as f64 / labels.len() as f64 >= 0.9,
            "expected clusters to be separable, got {correct}/{}",
            labels.len()
        );
    }

    #[test]
    fn test_same_seed_same_scores() {
        let (matrix, labels) = clustered(12);
        let config = ForestConfig {
            n_trees: 30,
            seed: 42,
            ..small_config()
        };
        let first = RandomForest::fit(&matrix, &labels, &config).unwrap();
        let second = RandomForest::fit(&matrix, &labels, &config).unwrap();
        assert_eq!(first.config().seed, 42);
        assert_eq!(
            first.risk_scores(&matrix).unwrap(),
            second.risk_scores(&matrix).unwrap()
        );

        // Rows between the clusters depend most on which trees saw what
        let between = FeatureMatrix::with_schema(
            FeatureSchema::current(),
            vec![vec![20.0, 3.0, 4.0, 6.0, 2.0, 1.0, 3.0]],
        )
        .unwrap();
        assert_eq!(
            first.risk_scores(&between).unwrap(),
            second.risk_scores(&between).unwrap()
        );
    }

    #[test]
    fn test_scores_are_fractions() {
        let (matrix, labels) = clustered(10);
        let forest = RandomForest::fit(&matrix, &labels, &small_config()).unwrap();
        for score in forest.risk_scores(&matrix).unwrap() {
            assert!((0.0..=1.0).contains(&score));
        }
    }

    #[test]
    fn test_fit_rejects_bad_input() {
        let empty = FeatureMatrix::with_schema(FeatureSchema::current(), vec![]).unwrap();
        assert!(RandomForest::fit(&empty, &[], &small_config()).is_err());

        let (matrix, _) = clustered(2);
        assert!(RandomForest::fit(&matrix, &[RiskLabel::Ok], &small_config()).is_err());
    }

    #[test]
    fn test_predict_rejects_wrong_width() {
        let (matrix, labels) = clustered(5);
        let forest = RandomForest::fit(&matrix, &labels, &small_config()).unwrap();

        let narrow = FeatureMatrix::with_schema(
            FeatureSchema::new(vec!["length".into()]),
            vec![vec![1.0]],
        )
        .unwrap();
        assert!(forest.predict(&narrow).unwrap_err().is_schema());
    }

    #[test]
    fn test_single_class_predicts_that_class() {
        let rows = vec![vec![1.0; NUM_FEATURES]; 6];
        let matrix = FeatureMatrix::with_schema(FeatureSchema::current(), rows).unwrap();
        let labels = vec![RiskLabel::Risky; 6];
        let forest = RandomForest::fit(&matrix, &labels, &small_config()).unwrap();
        assert!(forest
            .predict(&matrix)
            .unwrap()
            .iter()
            .all(|l| *l == RiskLabel::Risky));
    }

    #[test]
    fn test_tie_goes_to_ok() {
        assert_eq!(label_for_score(0.5), RiskLabel::Ok);
        assert_eq!(label_for_score(0.51), RiskLabel::Risky);
        assert_eq!(label_for_score(0.0), RiskLabel::Ok);
    }
}
