//! Riverbank erosion adaptation classifier
//!
//! Classifies riverbank households as Highly Adaptive, Moderately Adaptive or
//! Non-Adaptive from a 23-field survey record:
//! - Training several tree ensembles and keeping the most accurate one
//! - Persisting the matched encoders, scaler and model as one bundle
//! - Serving predictions over HTTP and the command line
//!
//! # Modules
//!
//! ## Data
//! - [`schema`] - Feature registry with declared domains and bounds
//! - [`record`] - Validated household records
//! - [`data`] - CSV loading and synthetic survey generation
//!
//! ## Core ML Modules
//! - [`preprocessing`] - Label encoding and standard scaling
//! - [`training`] - Candidate models, evaluation and selection
//! - [`inference`] - Predictions with recommendations
//! - [`export`] - Artifact bundle persistence
//!
//! ## Services
//! - [`server`] - HTTP server with REST API and prediction form
//! - [`cli`] - Command-line interface

// Core error handling
pub mod error;

// Data
pub mod schema;
pub mod record;
pub mod data;

// Core ML modules
pub mod preprocessing;
pub mod training;
pub mod inference;
pub mod export;

// Services
pub mod server;
pub mod cli;

pub use error::{AdaptError, Result};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{AdaptError, Result};

    // Data
    pub use crate::schema::{FeatureSchema, FeatureSpec, FeatureKind, TARGET_CLASSES, TARGET_COLUMN};
    pub use crate::record::{FeatureValue, HouseholdRecord};
    pub use crate::data::{DataLoader, Dataset, SyntheticSurvey};

    // Preprocessing
    pub use crate::preprocessing::{CategoryEncoder, StandardScaler, TargetEncoder};

    // Training
    pub use crate::training::{
        CandidateSpec, EncoderFit, TrainedModel, TrainingConfig, TrainingOutcome, TrainingPipeline,
    };

    // Inference
    pub use crate::inference::{AdaptationCategory, Prediction, Predictor, SharedPredictor};

    // Export
    pub use crate::export::{ArtifactBundle, ModelMetadata};
}
