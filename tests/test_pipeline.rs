//! Integration test: survey → training → selection → prediction

mod common;

use common::{highly_adaptive_household, survey, trained_bundle};
use riverbank_adapt::error::AdaptError;
use riverbank_adapt::inference::Predictor;
use riverbank_adapt::record::HouseholdRecord;
use riverbank_adapt::schema::{FeatureSchema, TARGET_CLASSES};
use riverbank_adapt::training::{CandidateSpec, EncoderFit, TrainingConfig, TrainingPipeline};
use serde_json::json;

#[test]
fn test_reference_household_is_highly_adaptive() {
    let predictor = Predictor::from_bundle(trained_bundle(600, 30)).unwrap();
    let prediction = predictor.predict_json(&highly_adaptive_household()).unwrap();

    assert_eq!(prediction.label, "Highly Adaptive");
    assert!(prediction.confidence > 50.0, "confidence {}", prediction.confidence);
}

#[test]
fn test_probabilities_cover_every_class() {
    let predictor = Predictor::from_bundle(trained_bundle(300, 10)).unwrap();
    let dataset = survey(40, 99);

    for record in dataset.records() {
        let prediction = predictor.predict(record).unwrap();
        assert!(TARGET_CLASSES.contains(&prediction.label.as_str()));

        let labels: Vec<&str> = prediction.probabilities.iter().map(|p| p.category.as_str()).collect();
        assert_eq!(labels, TARGET_CLASSES.to_vec());
        let total: f64 = prediction.probabilities.iter().map(|p| p.probability).sum();
        assert!((total - 1.0).abs() < 1e-6);
        assert!(prediction.probabilities.iter().all(|p| (0.0..=1.0).contains(&p.probability)));
    }
}

#[test]
fn test_training_is_deterministic() {
    let dataset = survey(250, 5);
    let config = TrainingConfig::default().with_estimators(8);

    let a = TrainingPipeline::new(config.clone()).run(&dataset).unwrap();
    let b = TrainingPipeline::new(config).run(&dataset).unwrap();

    assert_eq!(a.selected, b.selected);
    for (x, y) in a.candidates.iter().zip(&b.candidates) {
        assert_eq!(x.model_name, y.model_name);
        assert_eq!(x.accuracy, y.accuracy);
        assert_eq!(x.f1_score, y.f1_score);
        assert_eq!(x.report.confusion_matrix, y.report.confusion_matrix);
    }

    let predictor_a = Predictor::from_bundle(a.bundle).unwrap();
    let predictor_b = Predictor::from_bundle(b.bundle).unwrap();
    let household = highly_adaptive_household();
    assert_eq!(
        predictor_a.predict_json(&household).unwrap(),
        predictor_b.predict_json(&household).unwrap()
    );
}

#[test]
fn test_selected_model_has_best_accuracy() {
    let outcome = TrainingPipeline::new(TrainingConfig::default().with_estimators(5))
        .run(&survey(200, 8))
        .unwrap();
    let best = outcome.selected_report().accuracy;

    assert!(outcome.candidates.iter().all(|c| c.accuracy <= best));
    // First candidate with the top accuracy wins.
    let first_best = outcome.candidates.iter().position(|c| c.accuracy == best).unwrap();
    assert_eq!(outcome.selected, first_best);
    assert_eq!(outcome.bundle.metadata.candidates.len(), 3);
}

#[test]
fn test_single_candidate_run() {
    let config = TrainingConfig::default()
        .with_candidates(vec![CandidateSpec::gradient_boosting().with_estimators(5)]);
    let outcome = TrainingPipeline::new(config).run(&survey(150, 3)).unwrap();
    assert_eq!(outcome.bundle.metadata.model_name, "GradientBoosting");
    assert_eq!(outcome.bundle.model.name(), "GradientBoosting");
}

#[test]
fn test_train_only_encoders() {
    let config = TrainingConfig::default()
        .with_estimators(5)
        .with_encoder_fit(EncoderFit::TrainOnly);
    let outcome = TrainingPipeline::new(config).run(&survey(300, 12)).unwrap();
    assert_eq!(outcome.bundle.metadata.encoder_fit, EncoderFit::TrainOnly);

    let predictor = Predictor::from_bundle(outcome.bundle).unwrap();
    predictor.predict_json(&highly_adaptive_household()).unwrap();
}

#[test]
fn test_unknown_gender_is_rejected() {
    let predictor = Predictor::from_bundle(trained_bundle(150, 5)).unwrap();
    let mut household = highly_adaptive_household();
    household.insert("Gender".into(), json!("Other"));

    match predictor.predict_json(&household) {
        Err(AdaptError::UnknownCategory { column, value }) => {
            assert_eq!(column, "Gender");
            assert_eq!(value, "Other");
        }
        other => panic!("expected UnknownCategory, got {other:?}"),
    }
}

#[test]
fn test_missing_field_is_schema_mismatch() {
    let schema = FeatureSchema::riverbank();
    let mut household = highly_adaptive_household();
    household.remove("EII");

    match HouseholdRecord::from_json(&schema, &household) {
        Err(AdaptError::SchemaMismatch { missing, unexpected }) => {
            assert_eq!(missing, vec!["EII".to_string()]);
            assert!(unexpected.is_empty());
        }
        other => panic!("expected SchemaMismatch, got {other:?}"),
    }
}

#[test]
fn test_out_of_range_value_is_rejected() {
    let predictor = Predictor::from_bundle(trained_bundle(150, 5)).unwrap();
    let mut household = highly_adaptive_household();
    household.insert("SRI".into(), json!(1.5));

    assert!(matches!(
        predictor.predict_json(&household),
        Err(AdaptError::InvalidFeatureValue { ref column, .. }) if column == "SRI"
    ));
}
