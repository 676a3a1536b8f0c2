//! Model training module
//!
//! Provides the candidate classifiers and the pipeline that selects one:
//! - Decision trees and Random Forests
//! - Softmax gradient boosting
//! - XGBoost-style second-order boosting
//! - Stratified splitting and held-out classification metrics

mod config;
mod engine;
pub mod decision_tree;
pub mod random_forest;
pub mod gradient_boosting;
pub mod xgboost;
pub mod metrics;
pub mod split;

pub use config::{CandidateSpec, EncoderFit, ForestConfig, TrainingConfig};
pub use engine::{select_best, CandidateReport, TrainedModel, TrainingOutcome, TrainingPipeline};
pub use decision_tree::{DecisionTree, TreeNode, Criterion};
pub use random_forest::{RandomForest, MaxFeatures};
pub use gradient_boosting::{GradientBoostingClassifier, GradientBoostingConfig};
pub use xgboost::{XGBoostClassifier, XGBoostConfig};
pub use metrics::{ClassMetrics, ClassificationReport};
pub use split::{SplitIndices, StratifiedSplit};

/// Index of the largest value; the lowest index wins ties
pub(crate) fn argmax<'a>(values: impl IntoIterator<Item = &'a f64>) -> usize {
    let mut best = 0;
    let mut best_value = f64::NEG_INFINITY;
    for (i, &v) in values.into_iter().enumerate() {
        if v > best_value {
            best = i;
            best_value = v;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_argmax_ties_go_low() {
        assert_eq!(argmax(&[0.2, 0.5, 0.3]), 1);
        assert_eq!(argmax(&[0.4, 0.4, 0.2]), 0);
        assert_eq!(argmax(&[0.1, 0.45, 0.45]), 1);
    }
}
