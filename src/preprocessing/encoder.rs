//! Label encoding for categorical features and the target

use crate::error::{AdaptError, Result};
use crate::record::{FeatureValue, HouseholdRecord};
use crate::schema::FeatureSchema;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Per-column label encoders for the categorical features.
///
/// Codes follow the byte order of the distinct values seen during fit, so
/// they do not depend on row order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryEncoder {
    classes: BTreeMap<String, Vec<String>>,
}

impl CategoryEncoder {
    /// Fit one encoder per categorical column.
    ///
    /// Observed values outside the declared domain fail with `UndeclaredCategory`.
    pub fn fit(schema: &FeatureSchema, records: &[HouseholdRecord]) -> Result<Self> {
        if records.is_empty() {
            return Err(AdaptError::Training("cannot fit encoders on zero rows".into()));
        }

        let mut classes = BTreeMap::new();
        for (idx, spec) in schema.features().iter().enumerate() {
            let Some(domain) = spec.domain() else { continue };

            let mut seen = BTreeSet::new();
            for record in records {
                let value = category_at(record, idx, spec.name)?;
                if !domain.contains(&value) {
                    return Err(AdaptError::UndeclaredCategory {
                        column: spec.name.to_string(),
                        value: value.to_string(),
                    });
                }
                seen.insert(value);
            }
            classes.insert(
                spec.name.to_string(),
                seen.into_iter().map(str::to_string).collect(),
            );
        }

        Ok(Self { classes })
    }

    /// Encoded columns
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.classes.keys().map(String::as_str)
    }

    /// Sorted classes of one column
    pub fn classes(&self, column: &str) -> Option<&[String]> {
        self.classes.get(column).map(Vec::as_slice)
    }

    /// Code for one category value
    pub fn encode_value(&self, column: &str, value: &str) -> Result<usize> {
        let classes = self.classes.get(column).ok_or_else(|| unknown(column, value))?;
        classes
            .binary_search_by(|c| c.as_str().cmp(value))
            .map_err(|_| unknown(column, value))
    }

    /// Encode a record into model input order; numeric values pass through
    pub fn encode(&self, schema: &FeatureSchema, record: &HouseholdRecord) -> Result<Vec<f64>> {
        schema
            .features()
            .iter()
            .zip(record.values())
            .map(|(spec, value)| match value {
                FeatureValue::Category(s) if spec.is_categorical() => {
                    self.encode_value(spec.name, s).map(|code| code as f64)
                }
                FeatureValue::Number(v) if !spec.is_categorical() => Ok(*v),
                other => Err(AdaptError::InvalidFeatureValue {
                    column: spec.name.to_string(),
                    reason: format!("unexpected value kind: {other}"),
                }),
            })
            .collect()
    }

    /// Encode many records into an `(n_rows, n_features)` matrix
    pub fn encode_batch(&self, schema: &FeatureSchema, records: &[HouseholdRecord]) -> Result<Array2<f64>> {
        let mut flat = Vec::with_capacity(records.len() * schema.len());
        for record in records {
            flat.extend(self.encode(schema, record)?);
        }
        Ok(Array2::from_shape_vec((records.len(), schema.len()), flat)?)
    }
}

fn category_at<'a>(record: &'a HouseholdRecord, idx: usize, column: &str) -> Result<&'a str> {
    record.values()[idx]
        .as_category()
        .ok_or_else(|| AdaptError::InvalidFeatureValue {
            column: column.to_string(),
            reason: "expected a category".into(),
        })
}

fn unknown(column: &str, value: &str) -> AdaptError {
    AdaptError::UnknownCategory {
        column: column.to_string(),
        value: value.to_string(),
    }
}

/// Bijection between target labels and class indices
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetEncoder {
    classes: Vec<String>,
}

impl TargetEncoder {
    /// Classes are the sorted distinct labels
    pub fn fit(labels: &[String]) -> Result<Self> {
        let classes: BTreeSet<&str> = labels.iter().map(String::as_str).collect();
        if classes.is_empty() {
            return Err(AdaptError::Training("cannot fit target encoder on zero rows".into()));
        }
        Ok(Self {
            classes: classes.into_iter().map(str::to_string).collect(),
        })
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn n_classes(&self) -> usize {
        self.classes.len()
    }

    pub fn encode(&self, label: &str) -> Result<usize> {
        self.classes
            .binary_search_by(|c| c.as_str().cmp(label))
            .map_err(|_| AdaptError::InvalidTargetLabel(label.to_string()))
    }

    pub fn encode_all(&self, labels: &[String]) -> Result<Vec<usize>> {
        labels.iter().map(|l| self.encode(l)).collect()
    }

    pub fn decode(&self, code: usize) -> Result<&str> {
        self.classes
            .get(code)
            .map(String::as_str)
            .ok_or(AdaptError::InvalidTargetCode {
                code,
                n_classes: self.classes.len(),
            })
    }

    /// Sortedness and uniqueness, checked when loading persisted encoders
    pub(crate) fn is_canonical(&self) -> bool {
        !self.classes.is_empty() && self.classes.windows(2).all(|w| w[0] < w[1])
    }
}
