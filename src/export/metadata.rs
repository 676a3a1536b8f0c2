//! Model metadata persisted next to the artifacts

use crate::training::EncoderFit;
use serde::{Deserialize, Serialize};

/// Held-out scores of one evaluated candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateScore {
    pub model_name: String,
    pub accuracy: f64,
    pub f1_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance {
    pub feature: String,
    pub importance: f64,
}

/// Describes the selected model and how it was trained.
///
/// The first six fields are required; the rest default when absent so that
/// minimal metadata files still load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub model_name: String,
    pub accuracy: f64,
    pub f1_score: f64,
    /// Feature columns in model input order
    pub feature_columns: Vec<String>,
    pub categorical_columns: Vec<String>,
    /// Target classes in encoder order
    pub target_classes: Vec<String>,
    /// RFC 3339 timestamp
    #[serde(default)]
    pub trained_at: String,
    #[serde(default)]
    pub random_state: u64,
    #[serde(default)]
    pub test_size: f64,
    #[serde(default)]
    pub encoder_fit: EncoderFit,
    #[serde(default)]
    pub n_train: usize,
    #[serde(default)]
    pub n_test: usize,
    #[serde(default)]
    pub candidates: Vec<CandidateScore>,
    #[serde(default)]
    pub feature_importances: Vec<FeatureImportance>,
}

impl ModelMetadata {
    /// Most important features first
    pub fn top_features(&self, n: usize) -> Vec<&FeatureImportance> {
        let mut sorted: Vec<&FeatureImportance> = self.feature_importances.iter().collect();
        sorted.sort_by(|a, b| b.importance.total_cmp(&a.importance));
        sorted.truncate(n);
        sorted
    }
}
