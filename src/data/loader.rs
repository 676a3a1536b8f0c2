//! Survey CSV loading

use super::Dataset;
use crate::error::{AdaptError, Result};
use crate::schema::FeatureSchema;
use polars::prelude::*;
use std::fs::File;
use std::path::Path;
use std::time::Instant;
use tracing::info;

/// Reads the household survey from CSV
#[derive(Debug, Clone)]
pub struct DataLoader {
    /// Rows polars scans to infer column types
    infer_schema_length: Option<usize>,
}

impl Default for DataLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DataLoader {
    pub fn new() -> Self {
        Self {
            infer_schema_length: Some(1000),
        }
    }

    /// Set how many rows are scanned for type inference (`None` scans everything)
    pub fn with_infer_schema_length(mut self, rows: Option<usize>) -> Self {
        self.infer_schema_length = rows;
        self
    }

    /// Load and validate a survey CSV.
    ///
    /// Fails with `DatasetLoad` when the file is missing or unreadable and with
    /// `SchemaMismatch` when a registered column is absent.
    pub fn load_csv(&self, schema: &FeatureSchema, path: impl AsRef<Path>) -> Result<Dataset> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(AdaptError::DatasetLoad(format!(
                "dataset not found: {}",
                path.display()
            )));
        }

        let start = Instant::now();
        let df = self.read_frame(path)?;
        let dataset = Dataset::from_dataframe(schema, &df)?;
        if dataset.is_empty() {
            return Err(AdaptError::DatasetLoad(format!(
                "dataset is empty: {}",
                path.display()
            )));
        }

        info!(
            path = %path.display(),
            rows = dataset.len(),
            columns = df.width(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Loaded survey dataset"
        );
        Ok(dataset)
    }

    /// Write a dataset as CSV (schema columns, then the target)
    pub fn write_csv(&self, schema: &FeatureSchema, dataset: &Dataset, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let mut df = dataset.to_dataframe(schema)?;
        let mut file = File::create(path)?;
        CsvWriter::new(&mut file).include_header(true).finish(&mut df)?;
        Ok(())
    }

    fn read_frame(&self, path: &Path) -> Result<DataFrame> {
        CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(self.infer_schema_length)
            .try_into_reader_with_file_path(Some(path.to_path_buf()))
            .and_then(|reader| reader.finish())
            .map_err(|e| AdaptError::DatasetLoad(format!("{}: {e}", path.display())))
    }
}
