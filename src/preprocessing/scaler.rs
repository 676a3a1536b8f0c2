//! Feature standardization

use crate::error::{AdaptError, Result};
use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};

/// Standard scaling (z-score): `(x - mean) / std`, with population std.
///
/// Columns whose std is zero are divided by 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    mean: Vec<f64>,
    scale: Vec<f64>,
}

impl StandardScaler {
    /// Fit per-column statistics
    pub fn fit(x: &Array2<f64>) -> Result<Self> {
        if x.nrows() == 0 {
            return Err(AdaptError::Training("cannot fit scaler on zero rows".into()));
        }

        let mean = x
            .mean_axis(Axis(0))
            .ok_or_else(|| AdaptError::Training("cannot fit scaler on zero rows".into()))?;
        let std = x.std_axis(Axis(0), 0.0);

        let scale = std
            .iter()
            .zip(mean.iter())
            .map(|(&s, &m)| if is_degenerate(s, m) { 1.0 } else { s })
            .collect();

        Ok(Self {
            mean: mean.to_vec(),
            scale,
        })
    }

    pub fn n_features(&self) -> usize {
        self.mean.len()
    }

    pub fn mean(&self) -> &[f64] {
        &self.mean
    }

    pub fn scale(&self) -> &[f64] {
        &self.scale
    }

    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.check_width(x.ncols())?;
        let mean = ArrayView1::from(&self.mean[..]);
        let scale = ArrayView1::from(&self.scale[..]);
        Ok((x - &mean) / &scale)
    }

    pub fn transform_row(&self, row: &[f64]) -> Result<Array1<f64>> {
        self.check_width(row.len())?;
        Ok(row
            .iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(v, (m, s))| (v - m) / s)
            .collect())
    }

    /// Lengths agree and every divisor is usable, checked when loading
    pub(crate) fn is_well_formed(&self) -> bool {
        self.mean.len() == self.scale.len()
            && self.mean.iter().all(|m| m.is_finite())
            && self.scale.iter().all(|s| s.is_finite() && *s > 0.0)
    }

    fn check_width(&self, width: usize) -> Result<()> {
        if width != self.mean.len() {
            return Err(AdaptError::ShapeError {
                expected: format!("{} columns", self.mean.len()),
                actual: format!("{width} columns"),
            });
        }
        Ok(())
    }
}

// A constant column can leave rounding noise in its std.
fn is_degenerate(std: f64, mean: f64) -> bool {
    !std.is_finite() || std <= 10.0 * f64::EPSILON * mean.abs().max(1.0)
}
