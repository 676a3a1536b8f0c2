//! Household survey datasets
//!
//! - [`DataLoader`] reads the survey CSV and validates it against the schema
//! - [`SyntheticSurvey`] generates a representative survey for demos and tests

mod loader;
mod synthetic;

pub use loader::DataLoader;
pub use synthetic::SyntheticSurvey;

use crate::error::{AdaptError, Result};
use crate::record::{FeatureValue, HouseholdRecord};
use crate::schema::FeatureSchema;
use polars::prelude::*;
use std::collections::BTreeMap;

/// Labelled households in file order
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    records: Vec<HouseholdRecord>,
    labels: Vec<String>,
}

impl Dataset {
    /// Pair records with their adaptation categories.
    ///
    /// Labels must be declared target classes.
    pub fn new(schema: &FeatureSchema, records: Vec<HouseholdRecord>, labels: Vec<String>) -> Result<Self> {
        if records.len() != labels.len() {
            return Err(AdaptError::ShapeError {
                expected: format!("{} labels", records.len()),
                actual: format!("{} labels", labels.len()),
            });
        }
        if let Some(bad) = labels.iter().find(|l| !schema.target_classes().contains(&l.as_str())) {
            return Err(AdaptError::InvalidTargetLabel(bad.clone()));
        }
        Ok(Self { records, labels })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[HouseholdRecord] {
        &self.records
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Rows at the given positions, in the given order
    pub fn subset(&self, indices: &[usize]) -> Self {
        Self {
            records: indices.iter().map(|&i| self.records[i].clone()).collect(),
            labels: indices.iter().map(|&i| self.labels[i].clone()).collect(),
        }
    }

    /// Number of households per category
    pub fn class_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for label in &self.labels {
            *counts.entry(label.clone()).or_insert(0) += 1;
        }
        counts
    }

    /// Convert to a DataFrame with the schema's columns followed by the target
    pub fn to_dataframe(&self, schema: &FeatureSchema) -> Result<DataFrame> {
        let mut columns: Vec<Column> = Vec::with_capacity(schema.len() + 1);
        for (idx, spec) in schema.features().iter().enumerate() {
            let column = if spec.is_categorical() {
                let values: Vec<String> = self
                    .records
                    .iter()
                    .map(|r| r.values()[idx].to_string())
                    .collect();
                Series::new(spec.name.into(), values)
            } else {
                let values: Vec<f64> = self
                    .records
                    .iter()
                    .map(|r| r.values()[idx].as_number().unwrap_or(f64::NAN))
                    .collect();
                Series::new(spec.name.into(), values)
            };
            columns.push(column.into());
        }
        columns.push(Series::new(schema.target_column().into(), self.labels.clone()).into());
        Ok(DataFrame::new(columns)?)
    }

    /// Build from a DataFrame carrying at least the schema columns and the target
    pub fn from_dataframe(schema: &FeatureSchema, df: &DataFrame) -> Result<Self> {
        schema.check_dataset_columns(df.get_column_names().iter().map(|s| s.as_str()))?;

        let n_rows = df.height();
        let mut rows: Vec<Vec<FeatureValue>> = (0..n_rows).map(|_| Vec::with_capacity(schema.len())).collect();

        for spec in schema.features() {
            let column = df.column(spec.name)?;
            if spec.is_categorical() {
                for (row, value) in rows.iter_mut().zip(string_values(column, spec.name)?) {
                    row.push(FeatureValue::Category(value));
                }
            } else {
                let casted = column.cast(&DataType::Float64)?;
                let ca = casted.as_materialized_series().f64()?;
                for (i, (row, value)) in rows.iter_mut().zip(ca.into_iter()).enumerate() {
                    let v = value.ok_or_else(|| null_cell(spec.name, i))?;
                    row.push(FeatureValue::Number(v));
                }
            }
        }

        let labels = string_values(df.column(schema.target_column())?, schema.target_column())?;
        let records = rows
            .into_iter()
            .map(|values| HouseholdRecord::from_values(schema, values))
            .collect::<Result<Vec<_>>>()?;

        Self::new(schema, records, labels)
    }
}

fn string_values(column: &Column, name: &str) -> Result<Vec<String>> {
    let casted = column.cast(&DataType::String)?;
    let ca = casted.as_materialized_series().str()?;
    ca.into_iter()
        .enumerate()
        .map(|(i, v)| v.map(|s| s.trim().to_string()).ok_or_else(|| null_cell(name, i)))
        .collect()
}

fn null_cell(column: &str, row: usize) -> AdaptError {
    AdaptError::DatasetLoad(format!("missing value in column {column} at row {}", row + 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dataframe_roundtrip_keeps_rows() {
        let schema = FeatureSchema::riverbank();
        let dataset = SyntheticSurvey::new(30).with_seed(7).generate(&schema).unwrap();
        let df = dataset.to_dataframe(&schema).unwrap();
        assert_eq!(df.height(), 30);
        assert_eq!(df.width(), 24);

        let back = Dataset::from_dataframe(&schema, &df).unwrap();
        assert_eq!(back, dataset);
    }

    #[test]
    fn test_missing_column_is_schema_mismatch() {
        let schema = FeatureSchema::riverbank();
        let dataset = SyntheticSurvey::new(10).generate(&schema).unwrap();
        let df = dataset.to_dataframe(&schema).unwrap().drop("EII").unwrap();
        let err = Dataset::from_dataframe(&schema, &df).unwrap_err();
        assert!(matches!(err, AdaptError::SchemaMismatch { ref missing, .. } if missing == &vec!["EII".to_string()]));
    }

    #[test]
    fn test_undeclared_label_rejected() {
        let schema = FeatureSchema::riverbank();
        let dataset = SyntheticSurvey::new(2).generate(&schema).unwrap();
        let err = Dataset::new(
            &schema,
            dataset.records().to_vec(),
            vec!["Highly Adaptive".to_string(), "Unknown".to_string()],
        )
        .unwrap_err();
        assert!(matches!(err, AdaptError::InvalidTargetLabel(ref l) if l == "Unknown"));
    }

    #[test]
    fn test_subset_and_counts() {
        let schema = FeatureSchema::riverbank();
        let dataset = SyntheticSurvey::new(20).generate(&schema).unwrap();
        let subset = dataset.subset(&[3, 1]);
        assert_eq!(subset.len(), 2);
        assert_eq!(subset.labels()[0], dataset.labels()[3]);
        assert_eq!(dataset.class_counts().values().sum::<usize>(), 20);
    }
}
