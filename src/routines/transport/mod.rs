//! Optimal transport costs
//!
//! [one_dim] holds the sorted-matching cost used inside the distance engine.
//! The remaining modules compute the full d-dimensional 2-Wasserstein distance
//! between two point clouds, which is only used as a reported metric and never
//! differentiated.

pub mod assignment;
pub mod one_dim;
pub mod sinkhorn;

use ndarray::{Array2, Axis};
use rayon::prelude::*;

use crate::error::{GswError, Result};
use crate::structs::points::PointSet;

use self::sinkhorn::SinkhornConfig;

/// Solver used for the reported d-dimensional 2-Wasserstein distance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum W2Solver {
    /// Exact optimal assignment. Requires both sets to have the same size.
    Exact,
    /// Entropic approximation, any sizes.
    Sinkhorn(SinkhornConfig),
}

impl Default for W2Solver {
    fn default() -> Self {
        W2Solver::Exact
    }
}

/// Pairwise squared Euclidean costs, `C[i, j] = |x_i - y_j|²`.
pub fn squared_euclidean(x: &PointSet, y: &PointSet) -> Result<Array2<f64>> {
    x.check_compatible(y)?;
    let mut cost = Array2::<f64>::zeros((x.len(), y.len()));
    let (xm, ym) = (x.view(), y.view());
    cost.axis_iter_mut(Axis(0))
        .into_par_iter()
        .enumerate()
        .for_each(|(i, mut row)| {
            let xi = xm.row(i);
            for (j, slot) in row.iter_mut().enumerate() {
                *slot = xi
                    .iter()
                    .zip(ym.row(j).iter())
                    .map(|(a, b)| (a - b) * (a - b))
                    .sum();
            }
        });
    Ok(cost)
}

/// The 2-Wasserstein distance between the uniform empirical measures on `x` and `y`.
///
/// Works on the raw coordinates, no projection involved. Non-finite inputs
/// yield NaN rather than an error so that a diverged flow can still be reported.
pub fn w2(x: &PointSet, y: &PointSet, solver: &W2Solver) -> Result<f64> {
    x.check_compatible(y)?;
    if x.is_empty() || y.is_empty() {
        return Err(GswError::EmptyInput);
    }
    if !x.is_finite() || !y.is_finite() {
        return Ok(f64::NAN);
    }

    let cost = squared_euclidean(x, y)?;
    // Finite but huge coordinates can still overflow the squared distances
    if cost.iter().any(|c| !c.is_finite()) {
        return Ok(f64::NAN);
    }
    let squared = match solver {
        W2Solver::Exact => {
            if x.len() != y.len() {
                return Err(GswError::CountMismatch {
                    left: x.len(),
                    right: y.len(),
                });
            }
            let (_, total) = assignment::hungarian(&cost)?;
            total / x.len() as f64
        }
        W2Solver::Sinkhorn(config) => sinkhorn::sinkhorn(&cost, config)?.cost,
    };
    Ok(squared.max(0.0).sqrt())
}
