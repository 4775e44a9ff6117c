//! Lap-time feature importance
//!
//! Fits a gradient-boosted regressor that predicts lap time from a fixed set of
//! lap attributes and ranks the attributes by their contribution.
//!
//! Pipeline: target construction → feature selection → compound encoding →
//! seeded train/test split → mean imputation (training split statistics) →
//! model fit → ranking → held-out evaluation

pub mod boosting;
pub mod features;
pub mod impute;
pub mod split;
pub mod tree;

use crate::config::{ImportanceConfig, MissingTargetPolicy};
use crate::error::AnalysisError;
use crate::types::{ImportanceEntry, ImportanceReport, NormalizedLap};

use boosting::{BoostingParams, GradientBoostingRegressor};
use features::{build_matrix, feature_columns, CompoundEncoder, FeatureColumn};
use impute::{column_mean, MeanImputer};
use split::train_test_split;

/// Fewest laps with a known lap time a fit can run on
pub const MIN_TRAINING_ROWS: usize = 2;

/// Feature importance pipeline over a session's lap table
pub struct FeatureImportancePipeline {
    config: ImportanceConfig,
}

impl Default for FeatureImportancePipeline {
    fn default() -> Self {
        Self::new(ImportanceConfig::default())
    }
}

/// A fitted lap-time model together with the encoding and imputation it was fit with
#[derive(Debug, Clone)]
pub struct FittedLapTimeModel {
    columns: Vec<FeatureColumn>,
    encoder: CompoundEncoder,
    imputer: MeanImputer,
    model: GradientBoostingRegressor,
    report: ImportanceReport,
}

impl FeatureImportancePipeline {
    pub fn new(config: ImportanceConfig) -> Self {
        Self { config }
    }

    /// Rank the features of `laps` by their importance for lap time
    pub fn run(&self, laps: &[NormalizedLap]) -> Result<ImportanceReport, AnalysisError> {
        Ok(self.fit(laps)?.report)
    }

    /// Fit the model and keep it for prediction
    pub fn fit(&self, laps: &[NormalizedLap]) -> Result<FittedLapTimeModel, AnalysisError> {
        // Target construction
        let known_targets = laps.iter().filter(|l| l.lap_time_s.is_some()).count();
        if known_targets < MIN_TRAINING_ROWS {
            return Err(AnalysisError::InsufficientData {
                required: MIN_TRAINING_ROWS,
                available: known_targets,
            });
        }

        let rows: Vec<&NormalizedLap> = match self.config.missing_target {
            MissingTargetPolicy::Drop => laps.iter().filter(|l| l.lap_time_s.is_some()).collect(),
            MissingTargetPolicy::Impute => laps.iter().collect(),
        };
        let dropped_target_rows = laps.len() - rows.len();
        if dropped_target_rows > 0 {
            tracing::warn!(
                dropped = dropped_target_rows,
                "laps without a lap time excluded from the model"
            );
        }

        // Feature selection and encoding
        let columns = feature_columns(self.config.include_driver_number);
        let encoder = CompoundEncoder::fit(rows.iter().map(|l| &l.compound));
        let matrix = build_matrix(&rows, &columns, &encoder);
        let targets: Vec<Option<f64>> = rows.iter().map(|l| l.lap_time_s).collect();

        // Split
        let split = train_test_split(rows.len(), self.config.test_fraction, self.config.seed)?;
        let train_x: Vec<Vec<Option<f64>>> =
            split.train.iter().map(|&i| matrix[i].clone()).collect();
        let train_y: Vec<Option<f64>> = split.train.iter().map(|&i| targets[i]).collect();

        // Imputation from the training split only
        let imputer = MeanImputer::fit(&train_x, columns.len());
        let train_x = imputer.transform(&train_x)?;
        let target_mean = column_mean(&train_y).ok_or(AnalysisError::InsufficientData {
            required: MIN_TRAINING_ROWS,
            available: 0,
        })?;
        let train_y: Vec<f64> = train_y.iter().map(|t| t.unwrap_or(target_mean)).collect();

        // Fit
        let model = GradientBoostingRegressor::fit(
            &train_x,
            &train_y,
            BoostingParams::from(&self.config),
        )?;

        // Ranking
        let entries = rank(&columns, &model.feature_importances());

        // Held-out evaluation on test rows with a known lap time
        let mut squared_errors = Vec::new();
        for &i in &split.test {
            if let Some(actual) = targets[i] {
                let row = imputer.transform_row(&matrix[i])?;
                squared_errors.push((model.predict_row(&row) - actual).powi(2));
            }
        }
        let test_mse = (!squared_errors.is_empty())
            .then(|| squared_errors.iter().sum::<f64>() / squared_errors.len() as f64);

        tracing::debug!(
            train = split.train.len(),
            test = split.test.len(),
            ?test_mse,
            "feature importance fit complete"
        );

        let report = ImportanceReport {
            entries,
            train_rows: split.train.len(),
            test_rows: split.test.len(),
            dropped_target_rows,
            test_mse,
            compound_encoding: encoder.mapping(),
        };

        Ok(FittedLapTimeModel {
            columns,
            encoder,
            imputer,
            model,
            report,
        })
    }
}

impl FittedLapTimeModel {
    pub fn report(&self) -> &ImportanceReport {
        &self.report
    }

    /// Predict the lap time of a lap in seconds.
    ///
    /// Missing attributes, and compounds not seen during the fit, take the
    /// training-split mean.
    pub fn predict_lap(&self, lap: &NormalizedLap) -> Result<f64, AnalysisError> {
        let raw = build_matrix(&[lap], &self.columns, &self.encoder);
        let row = self.imputer.transform_row(&raw[0])?;
        Ok(self.model.predict_row(&row))
    }
}

/// Pair scores with feature names and sort by descending score.
///
/// The sort is stable, so equal scores keep feature-column order.
fn rank(columns: &[FeatureColumn], scores: &[f64]) -> Vec<ImportanceEntry> {
    let mut entries: Vec<ImportanceEntry> = columns
        .iter()
        .zip(scores)
        .map(|(column, &score)| ImportanceEntry {
            feature_name: column.name().to_string(),
            importance_score: score.max(0.0),
        })
        .collect();
    entries.sort_by(|a, b| b.importance_score.total_cmp(&a.importance_score));
    entries
}
