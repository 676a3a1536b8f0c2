//! Schema registry for the household survey
//!
//! The feature list, its order, every categorical domain and every numeric bound
//! are declared here once and shared by training and serving.

use crate::error::{AdaptError, Result};
use serde::Serialize;
use std::collections::BTreeSet;

/// Name of the target column in the training dataset
pub const TARGET_COLUMN: &str = "Adaptation_Category";

/// Declared adaptation categories
pub const TARGET_CLASSES: [&str; 3] = ["Highly Adaptive", "Moderately Adaptive", "Non-Adaptive"];

const YES_NO: &[&str] = &["Yes", "No"];

/// Kind of a feature column
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FeatureKind {
    /// Closed set of category strings
    Categorical { domain: &'static [&'static str] },
    /// Real-valued feature with inclusive bounds
    Numeric { min: f64, max: f64 },
}

/// One registered feature
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FeatureSpec {
    pub name: &'static str,
    #[serde(flatten)]
    pub kind: FeatureKind,
}

impl FeatureSpec {
    const fn categorical(name: &'static str, domain: &'static [&'static str]) -> Self {
        Self { name, kind: FeatureKind::Categorical { domain } }
    }

    const fn numeric(name: &'static str, min: f64, max: f64) -> Self {
        Self { name, kind: FeatureKind::Numeric { min, max } }
    }

    pub fn is_categorical(&self) -> bool {
        matches!(self.kind, FeatureKind::Categorical { .. })
    }

    /// Declared domain for categorical features
    pub fn domain(&self) -> Option<&'static [&'static str]> {
        match self.kind {
            FeatureKind::Categorical { domain } => Some(domain),
            FeatureKind::Numeric { .. } => None,
        }
    }

    /// Inclusive bounds for numeric features
    pub fn bounds(&self) -> Option<(f64, f64)> {
        match self.kind {
            FeatureKind::Numeric { min, max } => Some((min, max)),
            FeatureKind::Categorical { .. } => None,
        }
    }
}

static RIVERBANK_FEATURES: [FeatureSpec; 23] = [
    FeatureSpec::categorical("Gender", &["Male", "Female"]),
    FeatureSpec::numeric("Age", 18.0, 100.0),
    FeatureSpec::categorical("Education_Level", &["Not Educated", "Partially Educated", "Educated"]),
    FeatureSpec::numeric("Monthly_Income", 0.0, 100_000.0),
    FeatureSpec::numeric("Family_Size", 1.0, 20.0),
    FeatureSpec::categorical("Housing_Type", &["Temporary", "Semi-Permanent", "Permanent"]),
    FeatureSpec::categorical("Land_Ownership", YES_NO),
    FeatureSpec::categorical("Previous_Erosion_Experience", YES_NO),
    FeatureSpec::numeric("Distance_from_River", 0.0, 1000.0),
    FeatureSpec::categorical("Access_to_Warning", YES_NO),
    FeatureSpec::categorical("Relocation_History", YES_NO),
    FeatureSpec::categorical("Govt_or_NGO_Assistance", YES_NO),
    FeatureSpec::categorical("Has_Protection_System", YES_NO),
    FeatureSpec::categorical("Infrastructure_Loss", YES_NO),
    FeatureSpec::categorical("Income_Diversification", YES_NO),
    FeatureSpec::categorical("Employment_Status", &["Employed", "Not Employed"]),
    FeatureSpec::categorical("Involved_in_Community_Adaptation", YES_NO),
    FeatureSpec::categorical("Awareness_Level", &["Low", "Moderate", "High"]),
    FeatureSpec::numeric("Distance_score", 0.0, 1.0),
    FeatureSpec::numeric("EII", 0.0, 1.0),
    FeatureSpec::numeric("ASI", 0.0, 1.0),
    FeatureSpec::numeric("SRI", 0.0, 1.0),
    FeatureSpec::numeric("ISS", 0.0, 1.0),
];

/// Ordered feature schema
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureSchema {
    features: &'static [FeatureSpec],
}

impl Default for FeatureSchema {
    fn default() -> Self {
        Self::riverbank()
    }
}

impl FeatureSchema {
    /// The 23-feature household survey schema
    pub fn riverbank() -> Self {
        Self { features: &RIVERBANK_FEATURES }
    }

    pub fn features(&self) -> &'static [FeatureSpec] {
        self.features
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Feature names in model input order
    pub fn names(&self) -> Vec<String> {
        self.features.iter().map(|f| f.name.to_string()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&'static FeatureSpec> {
        self.features.iter().find(|f| f.name == name)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.features.iter().position(|f| f.name == name)
    }

    /// Unknown names are not categorical
    pub fn is_categorical(&self, name: &str) -> bool {
        self.get(name).map_or(false, FeatureSpec::is_categorical)
    }

    /// Categorical feature names in schema order
    pub fn categorical_columns(&self) -> Vec<String> {
        self.features
            .iter()
            .filter(|f| f.is_categorical())
            .map(|f| f.name.to_string())
            .collect()
    }

    pub fn target_column(&self) -> &'static str {
        TARGET_COLUMN
    }

    pub fn target_classes(&self) -> &'static [&'static str] {
        &TARGET_CLASSES
    }

    /// Check that a set of provided keys is exactly the registered feature set.
    pub fn check_keys<'a, I>(&self, keys: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let provided: BTreeSet<&str> = keys.into_iter().collect();
        let missing: Vec<String> = self
            .features
            .iter()
            .filter(|f| !provided.contains(f.name))
            .map(|f| f.name.to_string())
            .collect();
        let unexpected: Vec<String> = provided
            .iter()
            .filter(|k| self.get(k).is_none())
            .map(|k| k.to_string())
            .collect();

        if missing.is_empty() && unexpected.is_empty() {
            Ok(())
        } else {
            Err(AdaptError::SchemaMismatch { missing, unexpected })
        }
    }

    /// Check that a dataset provides every feature and the target column.
    /// Extra dataset columns are allowed.
    pub fn check_dataset_columns<'a, I>(&self, columns: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let provided: BTreeSet<&str> = columns.into_iter().collect();
        let missing: Vec<String> = self
            .features
            .iter()
            .map(|f| f.name)
            .chain(std::iter::once(TARGET_COLUMN))
            .filter(|name| !provided.contains(name))
            .map(str::to_string)
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(AdaptError::SchemaMismatch { missing, unexpected: Vec::new() })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_order_and_size() {
        let schema = FeatureSchema::riverbank();
        let names = schema.names();
        assert_eq!(names.len(), 23);
        assert_eq!(names[0], "Gender");
        assert_eq!(names[22], "ISS");
        assert_eq!(schema.index_of("Awareness_Level"), Some(17));
    }

    #[test]
    fn test_is_categorical() {
        let schema = FeatureSchema::riverbank();
        assert!(schema.is_categorical("Gender"));
        assert!(schema.is_categorical("Employment_Status"));
        assert!(!schema.is_categorical("Age"));
        assert!(!schema.is_categorical("Unknown_Field"));
        assert_eq!(schema.categorical_columns().len(), 14);
    }

    #[test]
    fn test_domains_and_bounds() {
        let schema = FeatureSchema::riverbank();
        let housing = schema.get("Housing_Type").unwrap();
        assert_eq!(housing.domain().unwrap(), &["Temporary", "Semi-Permanent", "Permanent"]);
        assert_eq!(schema.get("Age").unwrap().bounds(), Some((18.0, 100.0)));
        assert_eq!(schema.get("EII").unwrap().bounds(), Some((0.0, 1.0)));
        assert!(schema.get("Age").unwrap().domain().is_none());
    }

    #[test]
    fn test_check_keys_reports_both_sides() {
        let schema = FeatureSchema::riverbank();
        let mut keys: Vec<String> = schema.names();
        keys.retain(|k| k != "ISS");
        keys.push("Union_Name".to_string());

        let err = schema.check_keys(keys.iter().map(String::as_str)).unwrap_err();
        match err {
            AdaptError::SchemaMismatch { missing, unexpected } => {
                assert_eq!(missing, vec!["ISS".to_string()]);
                assert_eq!(unexpected, vec!["Union_Name".to_string()]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_check_dataset_columns_requires_target() {
        let schema = FeatureSchema::riverbank();
        let names = schema.names();
        let err = schema
            .check_dataset_columns(names.iter().map(String::as_str))
            .unwrap_err();
        assert!(matches!(err, AdaptError::SchemaMismatch { ref missing, .. } if missing == &vec![TARGET_COLUMN.to_string()]));

        let mut with_extra = names.clone();
        with_extra.push(TARGET_COLUMN.to_string());
        with_extra.push("Union_Name".to_string());
        assert!(schema.check_dataset_columns(with_extra.iter().map(String::as_str)).is_ok());
    }
}
