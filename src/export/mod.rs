//! Artifact persistence
//!
//! Saves and loads the trained bundle as a directory of JSON files:
//! - `model_metadata.json`: model name, scores and column layout
//! - `best_model.json`: the selected classifier
//! - `scaler.json`, `label_encoders.json`, `target_encoder.json`: preprocessing state

mod bundle;
mod metadata;

pub use bundle::{
    ArtifactBundle, ARTIFACT_FILES, ENCODERS_FILE, METADATA_FILE, MODEL_FILE, SCALER_FILE,
    TARGET_ENCODER_FILE,
};
pub use metadata::{CandidateScore, FeatureImportance, ModelMetadata};
