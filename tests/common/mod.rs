//! Shared fixtures for integration tests

#![allow(dead_code)]

use riverbank_adapt::data::{Dataset, SyntheticSurvey};
use riverbank_adapt::export::ArtifactBundle;
use riverbank_adapt::schema::FeatureSchema;
use riverbank_adapt::training::{TrainingConfig, TrainingPipeline};
use serde_json::{json, Map, Value};

/// Household with strong resilience indices and every adaptation measure in place
pub fn highly_adaptive_household() -> Map<String, Value> {
    let value = json!({
        "Gender": "Female",
        "Age": 35,
        "Education_Level": "Educated",
        "Monthly_Income": 15000,
        "Family_Size": 4,
        "Housing_Type": "Permanent",
        "Land_Ownership": "Yes",
        "Previous_Erosion_Experience": "No",
        "Distance_from_River": 500,
        "Access_to_Warning": "Yes",
        "Relocation_History": "No",
        "Govt_or_NGO_Assistance": "Yes",
        "Has_Protection_System": "Yes",
        "Infrastructure_Loss": "No",
        "Income_Diversification": "Yes",
        "Employment_Status": "Employed",
        "Involved_in_Community_Adaptation": "Yes",
        "Awareness_Level": "High",
        "Distance_score": 0.9,
        "EII": 0.2,
        "ASI": 0.1,
        "SRI": 0.9,
        "ISS": 0.8
    });
    match value {
        Value::Object(map) => map,
        _ => unreachable!(),
    }
}

pub fn survey(rows: usize, seed: u64) -> Dataset {
    SyntheticSurvey::new(rows)
        .with_seed(seed)
        .generate(&FeatureSchema::riverbank())
        .unwrap()
}

/// Bundle trained with small ensembles
pub fn trained_bundle(rows: usize, estimators: usize) -> ArtifactBundle {
    let config = TrainingConfig::default().with_estimators(estimators);
    TrainingPipeline::new(config).run(&survey(rows, 42)).unwrap().bundle
}
