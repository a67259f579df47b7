//! Per-feature standardization fitted on the corpus and reused at projection time.

use ndarray::{Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use crate::error::LayoutError;

/// Standard deviations below this are treated as constant columns.
const MIN_STD: f64 = 1e-8;

/// Per-dimension mean and standard deviation fitted once per corpus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NormalizationStats {
    pub mean: Vec<f32>,
    pub std: Vec<f32>,
}

impl NormalizationStats {
    /// Fit population statistics over the rows of `data`.
    pub fn fit(data: ArrayView2<f32>) -> Result<Self, LayoutError> {
        let rows = data.nrows();
        if rows == 0 {
            return Err(LayoutError::Reduce(
                "Cannot fit normalization on an empty matrix".to_string(),
            ));
        }
        let mut mean = Vec::with_capacity(data.ncols());
        let mut std = Vec::with_capacity(data.ncols());
        for column in data.axis_iter(Axis(1)) {
            let sum: f64 = column.iter().map(|&v| v as f64).sum();
            let mu = sum / rows as f64;
            let var = column
                .iter()
                .map(|&v| {
                    let d = v as f64 - mu;
                    d * d
                })
                .sum::<f64>()
                / rows as f64;
            let sigma = var.sqrt();
            mean.push(mu as f32);
            std.push(if sigma < MIN_STD { 1.0 } else { sigma as f32 });
        }
        Ok(Self { mean, std })
    }

    pub fn dim(&self) -> usize {
        self.mean.len()
    }

    /// Standardize every row of `data` with the stored statistics.
    pub fn apply(&self, data: ArrayView2<f32>) -> Result<Array2<f32>, LayoutError> {
        self.check_dim(data.ncols())?;
        let mut out = data.to_owned();
        for mut row in out.axis_iter_mut(Axis(0)) {
            for ((value, &mu), &sigma) in row.iter_mut().zip(&self.mean).zip(&self.std) {
                *value = (*value - mu) / sigma;
            }
        }
        Ok(out)
    }

    /// Standardize a single vector with the stored statistics.
    pub fn apply_row(&self, row: &[f32]) -> Result<Vec<f32>, LayoutError> {
        self.check_dim(row.len())?;
        Ok(row
            .iter()
            .zip(&self.mean)
            .zip(&self.std)
            .map(|((&value, &mu), &sigma)| (value - mu) / sigma)
            .collect())
    }

    pub(crate) fn validate(&self) -> Result<(), String> {
        if self.mean.len() != self.std.len() {
            return Err(format!(
                "normalization mean has {} values but std has {}",
                self.mean.len(),
                self.std.len()
            ));
        }
        if self.std.iter().any(|s| !s.is_finite() || *s <= 0.0) {
            return Err("normalization std must be finite and positive".to_string());
        }
        Ok(())
    }

    fn check_dim(&self, found: usize) -> Result<(), LayoutError> {
        if found != self.dim() {
            return Err(LayoutError::Reduce(format!(
                "Feature dimension mismatch: model expects {}, got {found}",
                self.dim()
            )));
        }
        Ok(())
    }
}
