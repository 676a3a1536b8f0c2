//! Statically validated household records

use crate::error::{AdaptError, Result};
use crate::schema::{FeatureKind, FeatureSchema, FeatureSpec};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// A single raw feature value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureValue {
    Number(f64),
    Category(String),
}

impl FeatureValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            FeatureValue::Number(v) => Some(*v),
            FeatureValue::Category(_) => None,
        }
    }

    pub fn as_category(&self) -> Option<&str> {
        match self {
            FeatureValue::Category(s) => Some(s),
            FeatureValue::Number(_) => None,
        }
    }
}

impl fmt::Display for FeatureValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeatureValue::Number(v) => write!(f, "{v}"),
            FeatureValue::Category(s) => f.write_str(s),
        }
    }
}

impl From<f64> for FeatureValue {
    fn from(v: f64) -> Self {
        FeatureValue::Number(v)
    }
}

impl From<&str> for FeatureValue {
    fn from(s: &str) -> Self {
        FeatureValue::Category(s.to_string())
    }
}

impl From<String> for FeatureValue {
    fn from(s: String) -> Self {
        FeatureValue::Category(s)
    }
}

/// One household, with values held in schema order.
///
/// Construction checks that each value has its feature's kind. Bounds are
/// checked separately by [`HouseholdRecord::check_bounds`], since survey data used
/// for training is taken as recorded while interactive input is not.
#[derive(Debug, Clone, PartialEq)]
pub struct HouseholdRecord {
    values: Vec<FeatureValue>,
}

impl HouseholdRecord {
    /// Build from values already in schema order
    pub fn from_values(schema: &FeatureSchema, values: Vec<FeatureValue>) -> Result<Self> {
        if values.len() != schema.len() {
            return Err(AdaptError::ShapeError {
                expected: format!("{} feature values", schema.len()),
                actual: format!("{} feature values", values.len()),
            });
        }
        for (spec, value) in schema.features().iter().zip(values.iter()) {
            check_kind(spec, value)?;
        }
        Ok(Self { values })
    }

    /// Build from a name → value map, rejecting unknown or missing keys
    pub fn from_map(schema: &FeatureSchema, mut map: HashMap<String, FeatureValue>) -> Result<Self> {
        schema.check_keys(map.keys().map(String::as_str))?;
        let values = schema
            .features()
            .iter()
            .map(|spec| {
                map.remove(spec.name).ok_or_else(|| AdaptError::SchemaMismatch {
                    missing: vec![spec.name.to_string()],
                    unexpected: Vec::new(),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Self::from_values(schema, values)
    }

    /// Build from a JSON object as submitted by the form or API.
    ///
    /// Numeric features also accept numeric strings, since HTML forms submit text.
    pub fn from_json(schema: &FeatureSchema, object: &serde_json::Map<String, serde_json::Value>) -> Result<Self> {
        schema.check_keys(object.keys().map(String::as_str))?;
        let mut map = HashMap::with_capacity(object.len());
        for spec in schema.features() {
            let raw = object.get(spec.name).ok_or_else(|| AdaptError::SchemaMismatch {
                missing: vec![spec.name.to_string()],
                unexpected: Vec::new(),
            })?;
            let value = match (&spec.kind, raw) {
                (FeatureKind::Numeric { .. }, serde_json::Value::Number(n)) => {
                    FeatureValue::Number(n.as_f64().ok_or_else(|| invalid(spec, "not a finite number"))?)
                }
                (FeatureKind::Numeric { .. }, serde_json::Value::String(s)) => {
                    let v: f64 = s.trim().parse().map_err(|_| invalid(spec, &format!("{s:?} is not a number")))?;
                    FeatureValue::Number(v)
                }
                (FeatureKind::Categorical { .. }, serde_json::Value::String(s)) => {
                    FeatureValue::Category(s.clone())
                }
                (FeatureKind::Numeric { .. }, other) => {
                    return Err(invalid(spec, &format!("expected a number, got {other}")));
                }
                (FeatureKind::Categorical { .. }, other) => {
                    return Err(invalid(spec, &format!("expected a string, got {other}")));
                }
            };
            map.insert(spec.name.to_string(), value);
        }
        let record = Self::from_map(schema, map)?;
        record.check_bounds(schema)?;
        Ok(record)
    }

    /// Reject numeric values outside the declared bounds
    pub fn check_bounds(&self, schema: &FeatureSchema) -> Result<()> {
        for (spec, value) in schema.features().iter().zip(self.values.iter()) {
            if let (Some((min, max)), Some(v)) = (spec.bounds(), value.as_number()) {
                if !v.is_finite() || v < min || v > max {
                    return Err(invalid(spec, &format!("{v} is outside [{min}, {max}]")));
                }
            }
        }
        Ok(())
    }

    pub fn values(&self) -> &[FeatureValue] {
        &self.values
    }

    pub fn get(&self, schema: &FeatureSchema, name: &str) -> Option<&FeatureValue> {
        schema.index_of(name).map(|i| &self.values[i])
    }

    /// Name → value view, in schema order
    pub fn to_map(&self, schema: &FeatureSchema) -> BTreeMap<String, FeatureValue> {
        schema
            .features()
            .iter()
            .zip(self.values.iter())
            .map(|(spec, v)| (spec.name.to_string(), v.clone()))
            .collect()
    }
}

fn check_kind(spec: &FeatureSpec, value: &FeatureValue) -> Result<()> {
    match (&spec.kind, value) {
        (FeatureKind::Numeric { .. }, FeatureValue::Number(v)) if v.is_finite() => Ok(()),
        (FeatureKind::Numeric { .. }, FeatureValue::Number(_)) => Err(invalid(spec, "not a finite number")),
        (FeatureKind::Categorical { .. }, FeatureValue::Category(_)) => Ok(()),
        (FeatureKind::Numeric { .. }, FeatureValue::Category(s)) => {
            Err(invalid(spec, &format!("expected a number, got {s:?}")))
        }
        (FeatureKind::Categorical { .. }, FeatureValue::Number(v)) => {
            Err(invalid(spec, &format!("expected a category, got {v}")))
        }
    }
}

fn invalid(spec: &FeatureSpec, reason: &str) -> AdaptError {
    AdaptError::InvalidFeatureValue {
        column: spec.name.to_string(),
        reason: reason.to_string(),
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::highly_adaptive_json;
    use super::*;

    #[test]
    fn test_from_json_orders_values() {
        let schema = FeatureSchema::riverbank();
        let record = HouseholdRecord::from_json(&schema, &highly_adaptive_json()).unwrap();
        assert_eq!(record.values().len(), 23);
        assert_eq!(record.values()[0], FeatureValue::Category("Female".into()));
        assert_eq!(record.get(&schema, "Age"), Some(&FeatureValue::Number(35.0)));
        assert_eq!(record.get(&schema, "ISS"), Some(&FeatureValue::Number(0.8)));
    }

    #[test]
    fn test_missing_field_is_schema_mismatch() {
        let schema = FeatureSchema::riverbank();
        let mut json = highly_adaptive_json();
        json.remove("SRI");
        let err = HouseholdRecord::from_json(&schema, &json).unwrap_err();
        assert!(matches!(err, AdaptError::SchemaMismatch { ref missing, .. } if missing == &vec!["SRI".to_string()]));
    }

    #[test]
    fn test_extra_field_is_schema_mismatch() {
        let schema = FeatureSchema::riverbank();
        let mut json = highly_adaptive_json();
        json.insert("Union_Name".into(), serde_json::json!("Kachua"));
        let err = HouseholdRecord::from_json(&schema, &json).unwrap_err();
        assert!(matches!(err, AdaptError::SchemaMismatch { ref unexpected, .. } if unexpected == &vec!["Union_Name".to_string()]));
    }

    #[test]
    fn test_wrong_kind_rejected() {
        let schema = FeatureSchema::riverbank();
        let mut json = highly_adaptive_json();
        json.insert("Gender".into(), serde_json::json!(1));
        let err = HouseholdRecord::from_json(&schema, &json).unwrap_err();
        assert!(matches!(err, AdaptError::InvalidFeatureValue { ref column, .. } if column == "Gender"));
    }

    #[test]
    fn test_numeric_strings_accepted() {
        let schema = FeatureSchema::riverbank();
        let mut json = highly_adaptive_json();
        json.insert("Age".into(), serde_json::json!(" 42 "));
        let record = HouseholdRecord::from_json(&schema, &json).unwrap();
        assert_eq!(record.get(&schema, "Age").and_then(FeatureValue::as_number), Some(42.0));
    }

    #[test]
    fn test_out_of_bounds_rejected() {
        let schema = FeatureSchema::riverbank();
        let mut json = highly_adaptive_json();
        json.insert("EII".into(), serde_json::json!(1.5));
        let err = HouseholdRecord::from_json(&schema, &json).unwrap_err();
        assert!(matches!(err, AdaptError::InvalidFeatureValue { ref column, .. } if column == "EII"));

        let mut json = highly_adaptive_json();
        json.insert("Age".into(), serde_json::json!(17));
        assert!(HouseholdRecord::from_json(&schema, &json).is_err());
    }

    #[test]
    fn test_from_values_checks_length() {
        let schema = FeatureSchema::riverbank();
        let err = HouseholdRecord::from_values(&schema, vec![FeatureValue::from("Male")]).unwrap_err();
        assert!(matches!(err, AdaptError::ShapeError { .. }));
    }
}
