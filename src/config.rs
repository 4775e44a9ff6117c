//! Analysis configuration
//!
//! Every policy that changes an analysis result is an explicit field here
//! rather than an implicit property of container order or a hard-coded constant.

use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;

/// Default number of boosting stages
pub const DEFAULT_ESTIMATORS: usize = 100;

/// Default seed for the train/test split
pub const DEFAULT_SEED: u64 = 42;

/// How a lap window treats samples at its end boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryPolicy {
    /// `start <= t <= end`: a sample exactly on a lap boundary belongs to both
    /// adjacent laps, so neither chart loses its edge point
    #[default]
    InclusiveInclusive,
    /// `start <= t < end`: every sample belongs to exactly one lap
    HalfOpen,
}

/// Which element of a collection is the default selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionPolicy {
    /// First element in the order the source table lists them
    #[default]
    FirstInSourceOrder,
    /// Lexicographically smallest element
    Lexicographic,
}

/// What to do with laps that have no recorded lap time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingTargetPolicy {
    /// Exclude the lap from training and evaluation
    #[default]
    Drop,
    /// Keep the lap and replace its lap time with the training-split mean
    Impute,
}

/// Hyper-parameters of the lap-time feature importance model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportanceConfig {
    /// Number of sequential regression trees
    pub n_estimators: usize,
    /// Shrinkage applied to every tree's contribution
    pub learning_rate: f64,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Share of rows held out for evaluation
    pub test_fraction: f64,
    pub seed: u64,
    pub missing_target: MissingTargetPolicy,
    /// Add the car number as a feature column
    pub include_driver_number: bool,
}

impl Default for ImportanceConfig {
    fn default() -> Self {
        Self {
            n_estimators: DEFAULT_ESTIMATORS,
            learning_rate: 0.1,
            max_depth: 3,
            min_samples_split: 2,
            min_samples_leaf: 1,
            test_fraction: 0.2,
            seed: DEFAULT_SEED,
            missing_target: MissingTargetPolicy::default(),
            include_driver_number: false,
        }
    }
}

/// Presentation-only derived columns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Factor applied to RPM for the `rpm_display` column
    pub rpm_scale: f64,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self { rpm_scale: 0.01 }
    }
}

/// Top-level analysis configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub boundary_policy: BoundaryPolicy,
    pub default_selection: SelectionPolicy,
    pub importance: ImportanceConfig,
    pub display: DisplayConfig,
}

impl AnalysisConfig {
    /// Load configuration from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self, AnalysisError> {
        let config: AnalysisConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, AnalysisError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reject settings no analysis can run with
    pub fn validate(&self) -> Result<(), AnalysisError> {
        let imp = &self.importance;
        if imp.n_estimators == 0 {
            return Err(AnalysisError::InvalidConfig(
                "n_estimators must be at least 1".to_string(),
            ));
        }
        if !(imp.learning_rate.is_finite() && imp.learning_rate > 0.0) {
            return Err(AnalysisError::InvalidConfig(format!(
                "learning_rate must be positive, got {}",
                imp.learning_rate
            )));
        }
        if imp.max_depth == 0 {
            return Err(AnalysisError::InvalidConfig(
                "max_depth must be at least 1".to_string(),
            ));
        }
        if imp.min_samples_split < 2 {
            return Err(AnalysisError::InvalidConfig(
                "min_samples_split must be at least 2".to_string(),
            ));
        }
        if imp.min_samples_leaf == 0 {
            return Err(AnalysisError::InvalidConfig(
                "min_samples_leaf must be at least 1".to_string(),
            ));
        }
        if !(imp.test_fraction > 0.0 && imp.test_fraction < 1.0) {
            return Err(AnalysisError::InvalidConfig(format!(
                "test_fraction must lie in (0, 1), got {}",
                imp.test_fraction
            )));
        }
        if !self.display.rpm_scale.is_finite() {
            return Err(AnalysisError::InvalidConfig(
                "rpm_scale must be finite".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AnalysisConfig::default();
        assert_eq!(config.boundary_policy, BoundaryPolicy::InclusiveInclusive);
        assert_eq!(config.default_selection, SelectionPolicy::FirstInSourceOrder);
        assert_eq!(config.importance.n_estimators, 100);
        assert_eq!(config.importance.seed, 42);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json() {
        let config = AnalysisConfig::from_json(
            r#"{"boundary_policy": "half_open", "importance": {"n_estimators": 25}}"#,
        )
        .unwrap();
        assert_eq!(config.boundary_policy, BoundaryPolicy::HalfOpen);
        assert_eq!(config.importance.n_estimators, 25);
        assert!((config.importance.learning_rate - 0.1).abs() < f64::EPSILON);
    }

    #[test]
    fn test_rejects_bad_test_fraction() {
        let result = AnalysisConfig::from_json(r#"{"importance": {"test_fraction": 1.5}}"#);
        assert!(matches!(result, Err(AnalysisError::InvalidConfig(_))));
    }

    #[test]
    fn test_json_round_trip() {
        let config = AnalysisConfig::default();
        let json = config.to_json().unwrap();
        assert_eq!(AnalysisConfig::from_json(&json).unwrap(), config);
    }
}
