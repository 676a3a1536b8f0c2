//! Training configuration

use super::gradient_boosting::GradientBoostingConfig;
use super::random_forest::MaxFeatures;
use super::xgboost::XGBoostConfig;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which rows the category encoders are fitted on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncoderFit {
    /// Train and test rows together
    #[default]
    FullDataset,
    /// Train partition only; unseen test categories abort the run
    TrainOnly,
}

impl fmt::Display for EncoderFit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncoderFit::FullDataset => write!(f, "full_dataset"),
            EncoderFit::TrainOnly => write!(f, "train_only"),
        }
    }
}

/// Random forest hyper-parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestConfig {
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_features: MaxFeatures,
    pub bootstrap: bool,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_estimators: 200,
            max_depth: Some(15),
            min_samples_split: 5,
            min_samples_leaf: 2,
            max_features: MaxFeatures::Sqrt,
            bootstrap: true,
        }
    }
}

/// One candidate model family with fixed hyper-parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "model", content = "params")]
pub enum CandidateSpec {
    RandomForest(ForestConfig),
    XGBoost(XGBoostConfig),
    GradientBoosting(GradientBoostingConfig),
}

impl CandidateSpec {
    pub fn random_forest() -> Self {
        CandidateSpec::RandomForest(ForestConfig::default())
    }

    pub fn xgboost() -> Self {
        CandidateSpec::XGBoost(XGBoostConfig {
            n_estimators: 200,
            max_depth: 8,
            learning_rate: 0.1,
            subsample: 0.8,
            colsample_bytree: 0.8,
            reg_lambda: 1.0,
            ..Default::default()
        })
    }

    pub fn gradient_boosting() -> Self {
        CandidateSpec::GradientBoosting(GradientBoostingConfig {
            n_estimators: 200,
            learning_rate: 0.1,
            max_depth: 5,
            min_samples_split: 5,
            ..Default::default()
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            CandidateSpec::RandomForest(_) => "RandomForest",
            CandidateSpec::XGBoost(_) => "XGBoost",
            CandidateSpec::GradientBoosting(_) => "GradientBoosting",
        }
    }

    pub fn n_estimators(&self) -> usize {
        match self {
            CandidateSpec::RandomForest(c) => c.n_estimators,
            CandidateSpec::XGBoost(c) => c.n_estimators,
            CandidateSpec::GradientBoosting(c) => c.n_estimators,
        }
    }

    /// Same family with a different ensemble size
    pub fn with_estimators(mut self, n: usize) -> Self {
        match &mut self {
            CandidateSpec::RandomForest(c) => c.n_estimators = n,
            CandidateSpec::XGBoost(c) => c.n_estimators = n,
            CandidateSpec::GradientBoosting(c) => c.n_estimators = n,
        }
        self
    }
}

/// Configuration of a training run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Seed for the split and every candidate
    pub random_state: u64,
    /// Fraction of rows held out for evaluation
    pub test_size: f64,
    pub encoder_fit: EncoderFit,
    /// Candidates in evaluation order; the first wins accuracy ties
    pub candidates: Vec<CandidateSpec>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            random_state: 42,
            test_size: 0.2,
            encoder_fit: EncoderFit::FullDataset,
            candidates: vec![
                CandidateSpec::random_forest(),
                CandidateSpec::xgboost(),
                CandidateSpec::gradient_boosting(),
            ],
        }
    }
}

impl TrainingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    pub fn with_test_size(mut self, test_size: f64) -> Self {
        self.test_size = test_size;
        self
    }

    pub fn with_encoder_fit(mut self, encoder_fit: EncoderFit) -> Self {
        self.encoder_fit = encoder_fit;
        self
    }

    pub fn with_candidates(mut self, candidates: Vec<CandidateSpec>) -> Self {
        self.candidates = candidates;
        self
    }

    /// Shrink (or grow) every ensemble to `n` trees or rounds
    pub fn with_estimators(mut self, n: usize) -> Self {
        self.candidates = self
            .candidates
            .into_iter()
            .map(|c| c.with_estimators(n))
            .collect();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_candidates() {
        let config = TrainingConfig::default();
        let names: Vec<&str> = config.candidates.iter().map(CandidateSpec::name).collect();
        assert_eq!(names, vec!["RandomForest", "XGBoost", "GradientBoosting"]);
        assert!(config.candidates.iter().all(|c| c.n_estimators() == 200));
        assert_eq!(config.random_state, 42);
        assert_eq!(config.test_size, 0.2);
        assert_eq!(config.encoder_fit, EncoderFit::FullDataset);
    }

    #[test]
    fn test_with_estimators() {
        let config = TrainingConfig::default().with_estimators(5);
        assert!(config.candidates.iter().all(|c| c.n_estimators() == 5));
        match &config.candidates[0] {
            CandidateSpec::RandomForest(c) => assert_eq!(c.max_depth, Some(15)),
            other => panic!("unexpected candidate {other:?}"),
        }
    }

    #[test]
    fn test_config_serialization() {
        let config = TrainingConfig::default().with_encoder_fit(EncoderFit::TrainOnly);
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"train_only\""));
        let back: TrainingConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.candidates.len(), 3);
        assert_eq!(back.encoder_fit, EncoderFit::TrainOnly);
    }
}
