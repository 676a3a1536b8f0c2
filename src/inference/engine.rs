//! Inference over a loaded artifact bundle
//!
//! A `Predictor` owns one consistent bundle and turns raw household records
//! into a label, a confidence and the full class distribution.

use crate::error::{AdaptError, Result};
use crate::export::{ArtifactBundle, ModelMetadata};
use crate::record::HouseholdRecord;
use crate::schema::FeatureSchema;
use super::recommendations::AdaptationCategory;
use ndarray::Array2;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::debug;

/// Probability of one class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassProbability {
    pub category: String,
    pub probability: f64,
}

/// Outcome of classifying one household
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub label: String,
    /// Probability of `label` as a percentage
    pub confidence: f64,
    /// One entry per class, in target encoder order
    pub probabilities: Vec<ClassProbability>,
}

impl Prediction {
    pub fn category(&self) -> Option<AdaptationCategory> {
        self.label.parse().ok()
    }

    pub fn recommendations(&self) -> &'static [&'static str] {
        self.category().map(AdaptationCategory::recommendations).unwrap_or_default()
    }

    pub fn probability_of(&self, category: &str) -> Option<f64> {
        self.probabilities
            .iter()
            .find(|p| p.category == category)
            .map(|p| p.probability)
    }
}

/// Read-only classifier built from a validated bundle
#[derive(Debug)]
pub struct Predictor {
    schema: FeatureSchema,
    bundle: ArtifactBundle,
    source: Option<PathBuf>,
}

impl Predictor {
    pub fn from_bundle(bundle: ArtifactBundle) -> Result<Self> {
        let schema = FeatureSchema::riverbank();
        bundle.validate(&schema)?;
        Ok(Self {
            schema,
            bundle,
            source: None,
        })
    }

    /// Load the bundle stored in `dir`
    pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let bundle = ArtifactBundle::load(dir)?;
        Ok(Self {
            schema: FeatureSchema::riverbank(),
            bundle,
            source: Some(dir.to_path_buf()),
        })
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn metadata(&self) -> &ModelMetadata {
        &self.bundle.metadata
    }

    pub fn bundle(&self) -> &ArtifactBundle {
        &self.bundle
    }

    /// Directory the bundle was loaded from, if any
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn predict(&self, record: &HouseholdRecord) -> Result<Prediction> {
        let start = Instant::now();
        record.check_bounds(&self.schema)?;

        let encoded = self.bundle.encoder.encode(&self.schema, record)?;
        let scaled = self.bundle.scaler.transform_row(&encoded)?;
        let proba = self.bundle.model.predict_proba_row(scaled.view())?;

        let prediction = self.to_prediction(&proba.to_vec())?;
        debug!(
            label = %prediction.label,
            confidence = prediction.confidence,
            elapsed_us = start.elapsed().as_micros() as u64,
            "Predicted"
        );
        Ok(prediction)
    }

    /// Parse and classify a JSON object of raw field values
    pub fn predict_json(&self, object: &serde_json::Map<String, serde_json::Value>) -> Result<Prediction> {
        let record = HouseholdRecord::from_json(&self.schema, object)?;
        self.predict(&record)
    }

    /// Classify many households; fails on the first invalid record
    pub fn predict_batch(&self, records: &[HouseholdRecord]) -> Result<Vec<Prediction>> {
        if records.is_empty() {
            return Ok(Vec::new());
        }
        for record in records {
            record.check_bounds(&self.schema)?;
        }
        let encoded = self.bundle.encoder.encode_batch(&self.schema, records)?;
        let scaled: Array2<f64> = self.bundle.scaler.transform(&encoded)?;
        let proba = self.bundle.model.predict_proba(&scaled)?;

        (0..proba.nrows())
            .into_par_iter()
            .map(|i| self.to_prediction(&proba.row(i).to_vec()))
            .collect()
    }

    fn to_prediction(&self, proba: &[f64]) -> Result<Prediction> {
        let classes = self.bundle.target_encoder.classes();
        if proba.len() != classes.len() {
            return Err(AdaptError::ShapeError {
                expected: format!("{} class probabilities", classes.len()),
                actual: format!("{}", proba.len()),
            });
        }

        let best = crate::training::argmax(proba);
        let label = self.bundle.target_encoder.decode(best)?.to_string();
        let probabilities = classes
            .iter()
            .zip(proba)
            .map(|(category, &probability)| ClassProbability {
                category: category.clone(),
                probability,
            })
            .collect();

        Ok(Prediction {
            label,
            confidence: proba[best] * 100.0,
            probabilities,
        })
    }
}
