//! Gradient-boosted regression ensemble
//!
//! Squared-error boosting: start from the target mean, then fit each tree to
//! the residuals of the ensemble so far and add it scaled by the learning rate.
//! Feature importances follow the usual ensemble convention: average the
//! impurity decrease of every tree that split at least once, then normalize
//! the average to sum to one.

use rand::SeedableRng as _;
use rand_pcg::Pcg32;

use crate::config::ImportanceConfig;
use crate::error::AnalysisError;

use super::tree::{RegressionTree, TreeParams};

/// Boosting hyper-parameters
#[derive(Debug, Clone, Copy)]
pub struct BoostingParams {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub tree: TreeParams,
    pub seed: u64,
}

impl From<&ImportanceConfig> for BoostingParams {
    fn from(config: &ImportanceConfig) -> Self {
        Self {
            n_estimators: config.n_estimators,
            learning_rate: config.learning_rate,
            tree: TreeParams {
                max_depth: config.max_depth,
                min_samples_split: config.min_samples_split,
                min_samples_leaf: config.min_samples_leaf,
            },
            seed: config.seed,
        }
    }
}

/// Fitted gradient-boosted regressor
#[derive(Debug, Clone)]
pub struct GradientBoostingRegressor {
    init: f64,
    learning_rate: f64,
    n_features: usize,
    trees: Vec<RegressionTree>,
}

impl GradientBoostingRegressor {
    /// Fit the ensemble; the same inputs and seed always give the same model
    pub fn fit(x: &[Vec<f64>], y: &[f64], params: BoostingParams) -> Result<Self, AnalysisError> {
        validate_training_data(x, y)?;

        let n_features = x[0].len();
        let init = y.iter().sum::<f64>() / y.len() as f64;
        let mut predictions = vec![init; y.len()];
        let mut residuals = vec![0.0; y.len()];
        let mut trees = Vec::with_capacity(params.n_estimators);
        let mut rng = Pcg32::seed_from_u64(params.seed);

        for _ in 0..params.n_estimators {
            for ((r, target), pred) in residuals.iter_mut().zip(y).zip(&predictions) {
                *r = target - pred;
            }

            let tree = RegressionTree::fit(x, &residuals, params.tree, &mut rng);
            for (pred, row) in predictions.iter_mut().zip(x) {
                *pred += params.learning_rate * tree.predict_row(row);
            }
            trees.push(tree);
        }

        if predictions.iter().any(|p| !p.is_finite()) {
            return Err(AnalysisError::ModelFit(
                "training diverged to non-finite predictions".to_string(),
            ));
        }

        tracing::debug!(
            rows = y.len(),
            features = n_features,
            estimators = trees.len(),
            "fitted gradient boosting ensemble"
        );

        Ok(Self {
            init,
            learning_rate: params.learning_rate,
            n_features,
            trees,
        })
    }

    pub fn predict_row(&self, row: &[f64]) -> f64 {
        self.init
            + self
                .trees
                .iter()
                .map(|t| self.learning_rate * t.predict_row(row))
                .sum::<f64>()
    }

    pub fn predict(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>, AnalysisError> {
        rows.iter()
            .map(|row| {
                if row.len() == self.n_features {
                    Ok(self.predict_row(row))
                } else {
                    Err(AnalysisError::MalformedInput(format!(
                        "row has {} features, model expects {}",
                        row.len(),
                        self.n_features
                    )))
                }
            })
            .collect()
    }

    /// Normalized importance per feature; all zeros when no tree ever split
    pub fn feature_importances(&self) -> Vec<f64> {
        let relevant: Vec<&RegressionTree> =
            self.trees.iter().filter(|t| t.node_count() > 1).collect();
        if relevant.is_empty() {
            return vec![0.0; self.n_features];
        }

        let mut average = vec![0.0; self.n_features];
        for tree in &relevant {
            for (avg, imp) in average.iter_mut().zip(tree.importances()) {
                *avg += imp;
            }
        }
        let n_relevant = relevant.len() as f64;
        average.iter_mut().for_each(|v| *v /= n_relevant);

        let total: f64 = average.iter().sum();
        if total > 0.0 {
            average.iter_mut().for_each(|v| *v /= total);
        }
        average
    }
}

fn validate_training_data(x: &[Vec<f64>], y: &[f64]) -> Result<(), AnalysisError> {
    if x.is_empty() || y.is_empty() {
        return Err(AnalysisError::ModelFit("no training rows".to_string()));
    }
    if x.len() != y.len() {
        return Err(AnalysisError::ModelFit(format!(
            "{} feature rows but {} targets",
            x.len(),
            y.len()
        )));
    }
    let width = x[0].len();
    if width == 0 || x.iter().any(|row| row.len() != width) {
        return Err(AnalysisError::ModelFit(
            "feature rows must share a non-zero width".to_string(),
        ));
    }
    if x.iter().flatten().chain(y).any(|v| !v.is_finite()) {
        return Err(AnalysisError::ModelFit(
            "training data contains non-finite values".to_string(),
        ));
    }
    Ok(())
}
