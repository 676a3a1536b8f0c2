//! Training and model selection pipeline

use crate::data::{DataLoader, Dataset};
use crate::error::{AdaptError, Result};
use crate::export::{ArtifactBundle, CandidateScore, FeatureImportance, ModelMetadata};
use crate::preprocessing::{CategoryEncoder, StandardScaler, TargetEncoder};
use crate::schema::FeatureSchema;
use super::config::{CandidateSpec, EncoderFit, TrainingConfig};
use super::gradient_boosting::{GradientBoostingClassifier, GradientBoostingConfig};
use super::metrics::ClassificationReport;
use super::random_forest::RandomForest;
use super::split::StratifiedSplit;
use super::xgboost::{XGBoostClassifier, XGBoostConfig};
use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

/// Enum to hold trained model variants
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "model_type", content = "model")]
pub enum TrainedModel {
    RandomForest(RandomForest),
    XGBoost(XGBoostClassifier),
    GradientBoosting(GradientBoostingClassifier),
}

impl TrainedModel {
    /// Fit one candidate on class codes `0..n_classes`
    pub fn fit(
        spec: &CandidateSpec,
        x: &Array2<f64>,
        y: &Array1<f64>,
        n_classes: usize,
        random_state: u64,
    ) -> Result<Self> {
        match spec {
            CandidateSpec::RandomForest(c) => {
                let mut rf = RandomForest::new(c.n_estimators)
                    .with_min_samples_split(c.min_samples_split)
                    .with_min_samples_leaf(c.min_samples_leaf)
                    .with_max_features(c.max_features)
                    .with_bootstrap(c.bootstrap)
                    .with_n_classes(n_classes)
                    .with_random_state(random_state);
                if let Some(depth) = c.max_depth {
                    rf = rf.with_max_depth(depth);
                }
                rf.fit(x, y)?;
                Ok(TrainedModel::RandomForest(rf))
            }
            CandidateSpec::XGBoost(c) => {
                let config = XGBoostConfig { random_state: Some(random_state), ..c.clone() };
                let mut model = XGBoostClassifier::new(config);
                model.fit(x, y, n_classes)?;
                Ok(TrainedModel::XGBoost(model))
            }
            CandidateSpec::GradientBoosting(c) => {
                let config = GradientBoostingConfig { random_state: Some(random_state), ..c.clone() };
                let mut model = GradientBoostingClassifier::new(config);
                model.fit(x, y, n_classes)?;
                Ok(TrainedModel::GradientBoosting(model))
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TrainedModel::RandomForest(_) => "RandomForest",
            TrainedModel::XGBoost(_) => "XGBoost",
            TrainedModel::GradientBoosting(_) => "GradientBoosting",
        }
    }

    pub fn n_classes(&self) -> usize {
        match self {
            TrainedModel::RandomForest(m) => m.n_classes(),
            TrainedModel::XGBoost(m) => m.n_classes(),
            TrainedModel::GradientBoosting(m) => m.n_classes(),
        }
    }

    /// Check that a deserialized model can score `n_features`-wide rows into
    /// `n_classes` probabilities without indexing out of bounds
    pub fn check_structure(
        &self,
        n_features: usize,
        n_classes: usize,
    ) -> std::result::Result<(), String> {
        match self {
            TrainedModel::RandomForest(m) => m.check_structure(n_features, n_classes),
            TrainedModel::XGBoost(m) => m.check_structure(n_features, n_classes),
            TrainedModel::GradientBoosting(m) => m.check_structure(n_features, n_classes),
        }
    }

    /// Class probabilities, columns in target-encoder order
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        match self {
            TrainedModel::RandomForest(m) => m.predict_proba(x),
            TrainedModel::XGBoost(m) => m.predict_proba(x),
            TrainedModel::GradientBoosting(m) => m.predict_proba(x),
        }
    }

    pub fn predict_proba_row(&self, sample: ArrayView1<f64>) -> Result<Array1<f64>> {
        match self {
            TrainedModel::RandomForest(m) => m.predict_proba_row(sample),
            TrainedModel::XGBoost(m) => m.predict_proba_row(sample),
            TrainedModel::GradientBoosting(m) => m.predict_proba_row(sample),
        }
    }

    /// Argmax class codes, ties to the lowest code
    pub fn predict(&self, x: &Array2<f64>) -> Result<Vec<usize>> {
        let proba = self.predict_proba(x)?;
        Ok(proba.rows().into_iter().map(|row| super::argmax(&row)).collect())
    }

    pub fn feature_importances(&self) -> Option<Array1<f64>> {
        match self {
            TrainedModel::RandomForest(m) => m.feature_importances().cloned(),
            TrainedModel::XGBoost(m) => m.feature_importances(),
            TrainedModel::GradientBoosting(m) => Some(Array1::from_vec(m.feature_importances().to_vec())),
        }
    }
}

/// Held-out evaluation of one candidate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateReport {
    pub model_name: String,
    pub accuracy: f64,
    pub f1_score: f64,
    pub training_time_secs: f64,
    pub report: ClassificationReport,
}

/// Result of a training run
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub bundle: ArtifactBundle,
    /// Every candidate in evaluation order
    pub candidates: Vec<CandidateReport>,
    /// Position of the selected candidate in `candidates`
    pub selected: usize,
}

impl TrainingOutcome {
    pub fn selected_report(&self) -> &CandidateReport {
        &self.candidates[self.selected]
    }
}

/// Highest accuracy wins; the first candidate wins ties and F1 is ignored
pub fn select_best(candidates: &[CandidateReport]) -> Option<usize> {
    candidates
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f64)>, (i, c)| match best {
            Some((_, acc)) if acc >= c.accuracy => best,
            _ => Some((i, c.accuracy)),
        })
        .map(|(i, _)| i)
}

/// Fits encoders and scaler, trains every candidate and keeps the best
#[derive(Debug, Clone)]
pub struct TrainingPipeline {
    config: TrainingConfig,
    schema: FeatureSchema,
}

impl TrainingPipeline {
    pub fn new(config: TrainingConfig) -> Self {
        Self {
            config,
            schema: FeatureSchema::riverbank(),
        }
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Load a survey CSV and train on it
    pub fn run_csv(&self, path: impl AsRef<Path>) -> Result<TrainingOutcome> {
        let dataset = DataLoader::new().load_csv(&self.schema, path)?;
        self.run(&dataset)
    }

    pub fn run(&self, dataset: &Dataset) -> Result<TrainingOutcome> {
        let start = Instant::now();
        let schema = &self.schema;
        if self.config.candidates.is_empty() {
            return Err(AdaptError::Training("no candidate models configured".into()));
        }

        let target_encoder = TargetEncoder::fit(dataset.labels())?;
        let codes = target_encoder.encode_all(dataset.labels())?;
        let split = StratifiedSplit::new(self.config.test_size, self.config.random_state).split(&codes)?;
        info!(
            rows = dataset.len(),
            n_train = split.train.len(),
            n_test = split.test.len(),
            classes = ?target_encoder.classes(),
            "Split dataset"
        );

        let encoder = match self.config.encoder_fit {
            EncoderFit::FullDataset => CategoryEncoder::fit(schema, dataset.records())?,
            EncoderFit::TrainOnly => CategoryEncoder::fit(schema, dataset.subset(&split.train).records())?,
        };
        let encoded = encoder.encode_batch(schema, dataset.records())?;

        let x_train_raw = encoded.select(Axis(0), &split.train);
        let x_test_raw = encoded.select(Axis(0), &split.test);
        let scaler = StandardScaler::fit(&x_train_raw)?;
        let x_train = scaler.transform(&x_train_raw)?;
        let x_test = scaler.transform(&x_test_raw)?;

        let y_train: Array1<f64> = split.train.iter().map(|&i| codes[i] as f64).collect();
        let y_test: Vec<usize> = split.test.iter().map(|&i| codes[i]).collect();
        let n_classes = target_encoder.n_classes();

        let mut models = Vec::with_capacity(self.config.candidates.len());
        let mut reports = Vec::with_capacity(self.config.candidates.len());
        for spec in &self.config.candidates {
            let fit_start = Instant::now();
            let model = TrainedModel::fit(spec, &x_train, &y_train, n_classes, self.config.random_state)?;
            let training_time_secs = fit_start.elapsed().as_secs_f64();

            let y_pred = model.predict(&x_test)?;
            let report = ClassificationReport::compute(&y_test, &y_pred, target_encoder.classes());
            info!(
                model = spec.name(),
                accuracy = report.accuracy,
                f1_score = report.macro_f1,
                training_time_secs,
                "Evaluated candidate"
            );

            reports.push(CandidateReport {
                model_name: spec.name().to_string(),
                accuracy: report.accuracy,
                f1_score: report.macro_f1,
                training_time_secs,
                report,
            });
            models.push(model);
        }

        let selected = select_best(&reports)
            .ok_or_else(|| AdaptError::Training("no candidate was evaluated".into()))?;
        let model = models.swap_remove(selected);
        let best = &reports[selected];
        info!(
            model = %best.model_name,
            accuracy = best.accuracy,
            f1_score = best.f1_score,
            elapsed_secs = start.elapsed().as_secs_f64(),
            "Selected best model"
        );

        let feature_importances: Vec<FeatureImportance> = model
            .feature_importances()
            .map(|imp| {
                schema
                    .features()
                    .iter()
                    .zip(imp.iter())
                    .map(|(spec, &importance)| FeatureImportance {
                        feature: spec.name.to_string(),
                        importance,
                    })
                    .collect()
            })
            .unwrap_or_default();
        debug!(?feature_importances, "Feature importances");

        let metadata = ModelMetadata {
            model_name: best.model_name.clone(),
            accuracy: best.accuracy,
            f1_score: best.f1_score,
            feature_columns: schema.names(),
            categorical_columns: schema.categorical_columns(),
            target_classes: target_encoder.classes().to_vec(),
            trained_at: chrono::Utc::now().to_rfc3339(),
            random_state: self.config.random_state,
            test_size: self.config.test_size,
            encoder_fit: self.config.encoder_fit,
            n_train: split.train.len(),
            n_test: split.test.len(),
            candidates: reports
                .iter()
                .map(|r| CandidateScore {
                    model_name: r.model_name.clone(),
                    accuracy: r.accuracy,
                    f1_score: r.f1_score,
                })
                .collect(),
            feature_importances,
        };

        Ok(TrainingOutcome {
            bundle: ArtifactBundle {
                metadata,
                encoder,
                target_encoder,
                scaler,
                model,
            },
            candidates: reports,
            selected,
        })
    }
}
