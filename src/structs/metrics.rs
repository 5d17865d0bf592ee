use ndarray::{Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{GswError, Result};

/// Reported distances indexed by `(iteration, configuration)`.
///
/// Cells start out as NaN, which marks "not recorded yet". A diverged run that
/// reports a NaN distance is therefore indistinguishable from a missing cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunningMetrics {
    values: Array2<f64>,
    labels: Vec<String>,
}

impl RunningMetrics {
    pub fn new(iterations: usize, labels: Vec<String>) -> Self {
        RunningMetrics {
            values: Array2::from_elem((iterations, labels.len()), f64::NAN),
            labels,
        }
    }

    pub fn iterations(&self) -> usize {
        self.values.nrows()
    }

    pub fn configurations(&self) -> usize {
        self.values.ncols()
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    pub fn record(&mut self, iteration: usize, configuration: usize, value: f64) -> Result<()> {
        let (rows, cols) = self.values.dim();
        if iteration >= rows || configuration >= cols {
            return Err(GswError::InvalidConfiguration(format!(
                "metric cell ({}, {}) outside a {}x{} table",
                iteration, configuration, rows, cols
            )));
        }
        self.values[[iteration, configuration]] = value;
        Ok(())
    }

    /// The recorded value, or `None` for a missing cell.
    pub fn get(&self, iteration: usize, configuration: usize) -> Option<f64> {
        self.values
            .get([iteration, configuration])
            .copied()
            .filter(|v| !v.is_nan())
    }

    /// All iterations for one configuration
    pub fn series(&self, configuration: usize) -> ArrayView1<'_, f64> {
        self.values.index_axis(Axis(1), configuration)
    }

    /// The last recorded value for a configuration
    pub fn last(&self, configuration: usize) -> Option<f64> {
        (0..self.iterations())
            .rev()
            .find_map(|i| self.get(i, configuration))
    }

    pub fn is_complete(&self) -> bool {
        self.values.iter().all(|v| !v.is_nan())
    }
}
