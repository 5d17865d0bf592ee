//! One-dimensional optimal transport between empirical distributions
//!
//! In one dimension the optimal coupling between two uniform empirical
//! measures is monotone: sorting both samples and matching them in order is
//! optimal for every `p >= 1`. For equal sample counts this pairs the `i`-th
//! smallest value of `a` with the `i`-th smallest of `b`, each pair carrying
//! mass `1/N`. Unequal counts are handled with the same monotone rule, splitting
//! mass along the merged quantile grid.
//!
//! Gradients hold the sort permutation fixed, which is the usual subgradient
//! of an almost-everywhere piecewise-smooth function. Ties are broken by the
//! original index so the permutation is deterministic.

use ndarray::{Array1, ArrayView1};
use serde::{Deserialize, Serialize};

use crate::error::{GswError, Result};

/// Indices that sort `values` ascending. Ties keep their input order, and
/// NaN values are placed after every other value.
pub fn argsort(values: ArrayView1<'_, f64>) -> Vec<usize> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&i, &j| values[i].total_cmp(&values[j]));
    order
}

/// One cell of the monotone coupling: `mass` moves from `a[from]` to `b[to]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transfer {
    pub from: usize,
    pub to: usize,
    pub mass: f64,
}

/// Build the monotone coupling between the uniform empirical measures on `a` and `b`.
///
/// Mass is tracked in integer units of `1/(n*m)` so that the split points are
/// exact regardless of the sample counts.
pub fn monotone_coupling(a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> Result<Vec<Transfer>> {
    let (n, m) = (a.len(), b.len());
    if n == 0 || m == 0 {
        return Err(GswError::EmptyInput);
    }
    let order_a = argsort(a);
    let order_b = argsort(b);
    let total = (n * m) as f64;

    let mut transfers = Vec::with_capacity(n + m - 1);
    let (mut i, mut j) = (0, 0);
    let (mut left_a, mut left_b) = (m, n);
    while i < n && j < m {
        let units = left_a.min(left_b);
        transfers.push(Transfer {
            from: order_a[i],
            to: order_b[j],
            mass: units as f64 / total,
        });
        left_a -= units;
        left_b -= units;
        if left_a == 0 {
            i += 1;
            left_a = m;
        }
        if left_b == 0 {
            j += 1;
            left_b = n;
        }
    }
    Ok(transfers)
}

/// The p-Wasserstein cost between two scalar samples.
///
/// With `rooted = false` the value is `Σ mass · |a_i - b_j|^p`, the form used
/// as a training loss. With `rooted = true` it is raised to `1/p`, giving the
/// p-Wasserstein distance itself.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransportCost {
    p: u32,
    rooted: bool,
}

impl Default for TransportCost {
    fn default() -> Self {
        TransportCost::squared()
    }
}

/// Value of a [TransportCost] together with its gradient with respect to both inputs.
#[derive(Debug, Clone, PartialEq)]
pub struct CostGradient {
    pub value: f64,
    pub grad_a: Array1<f64>,
    pub grad_b: Array1<f64>,
}

impl TransportCost {
    pub fn new(p: u32, rooted: bool) -> Result<Self> {
        if p == 0 {
            return Err(GswError::InvalidConfiguration(
                "transport power must be at least 1".to_string(),
            ));
        }
        Ok(TransportCost { p, rooted })
    }

    /// Unrooted `p = 2`: the mean squared sorted difference for equal counts.
    pub fn squared() -> Self {
        TransportCost {
            p: 2,
            rooted: false,
        }
    }

    /// Rooted `p = 2`: the 1-D 2-Wasserstein distance.
    pub fn w2() -> Self {
        TransportCost { p: 2, rooted: true }
    }

    pub fn power(&self) -> u32 {
        self.p
    }

    pub fn rooted(&self) -> bool {
        self.rooted
    }

    pub fn evaluate(&self, a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> Result<f64> {
        let p = self.p as i32;
        let unrooted: f64 = monotone_coupling(a, b)?
            .iter()
            .map(|t| t.mass * (a[t.from] - b[t.to]).abs().powi(p))
            .sum();
        Ok(self.finish(unrooted))
    }

    /// Evaluate and differentiate with the coupling held fixed.
    pub fn evaluate_with_gradient(
        &self,
        a: ArrayView1<'_, f64>,
        b: ArrayView1<'_, f64>,
    ) -> Result<CostGradient> {
        let coupling = monotone_coupling(a, b)?;
        let p = self.p as i32;
        let mut grad_a = Array1::zeros(a.len());
        let mut grad_b = Array1::zeros(b.len());
        let mut unrooted = 0.0;

        for t in &coupling {
            let diff = a[t.from] - b[t.to];
            unrooted += t.mass * diff.abs().powi(p);
            // d/d(diff) of |diff|^p; the subgradient at zero is taken as zero
            let slope = if diff == 0.0 {
                0.0
            } else {
                self.p as f64 * diff.abs().powi(p - 1) * diff.signum()
            };
            grad_a[t.from] += t.mass * slope;
            grad_b[t.to] -= t.mass * slope;
        }

        let value = self.finish(unrooted);
        if self.rooted && self.p > 1 {
            let scale = if unrooted > 0.0 {
                value / (self.p as f64 * unrooted)
            } else {
                0.0
            };
            grad_a *= scale;
            grad_b *= scale;
        }

        Ok(CostGradient {
            value,
            grad_a,
            grad_b,
        })
    }

    fn finish(&self, unrooted: f64) -> f64 {
        if self.rooted && self.p > 1 {
            unrooted.powf(1.0 / self.p as f64)
        } else {
            unrooted
        }
    }
}

/// Shorthand for `TransportCost::new(p, rooted)?.evaluate(a, b)`.
pub fn cost(a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>, p: u32, rooted: bool) -> Result<f64> {
    TransportCost::new(p, rooted)?.evaluate(a, b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_argsort_stable() {
        let values = array![3.0, 1.0, 2.0, 1.0];
        assert_eq!(argsort(values.view()), vec![1, 3, 2, 0]);
    }

    #[test]
    fn test_argsort_nan_last() {
        let values = array![f64::NAN, 1.0, -1.0];
        assert_eq!(argsort(values.view()), vec![2, 1, 0]);
    }

    #[test]
    fn test_squared_cost_sorted_matching() {
        // sorted a = [0, 1, 2], sorted b = [1, 2, 4]
        let a = array![2.0, 0.0, 1.0];
        let b = array![4.0, 1.0, 2.0];
        let value = TransportCost::squared().evaluate(a.view(), b.view()).unwrap();
        assert!((value - (1.0 + 1.0 + 4.0) / 3.0).abs() < 1e-12);

        let rooted = TransportCost::w2().evaluate(a.view(), b.view()).unwrap();
        assert!((rooted - 2.0_f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_p1_is_mean_absolute_difference() {
        let a = array![0.0, 10.0];
        let b = array![1.0, 7.0];
        let value = cost(a.view(), b.view(), 1, true).unwrap();
        assert!((value - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_unequal_counts() {
        // a = {0, 1} with mass 1/2, b = {0, 0.5, 1} with mass 1/3
        let a = array![0.0, 1.0];
        let b = array![0.0, 0.5, 1.0];
        let coupling = monotone_coupling(a.view(), b.view()).unwrap();
        let total: f64 = coupling.iter().map(|t| t.mass).sum();
        assert!((total - 1.0).abs() < 1e-12);
        assert_eq!(coupling.len(), 4);

        let value = TransportCost::squared().evaluate(a.view(), b.view()).unwrap();
        // 1/3 * 0 + 1/6 * 0.25 + 1/6 * 0.25 + 1/3 * 0
        assert!((value - 1.0 / 12.0).abs() < 1e-12);
    }

    #[test]
    fn test_empty_input() {
        let a: Array1<f64> = Array1::zeros(0);
        let b = array![1.0];
        assert_eq!(
            TransportCost::squared().evaluate(a.view(), b.view()),
            Err(GswError::EmptyInput)
        );
    }

    #[test]
    fn test_zero_power_rejected() {
        assert!(matches!(
            TransportCost::new(0, false),
            Err(GswError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_nan_propagates() {
        let a = array![0.0, f64::NAN];
        let b = array![0.0, 1.0];
        let value = TransportCost::squared().evaluate(a.view(), b.view()).unwrap();
        assert!(value.is_nan());
    }

    #[test]
    fn test_gradient_matches_finite_differences() {
        let a = array![0.3, -1.2, 2.5, 0.9];
        let b = array![1.1, 0.2, -0.7, 3.0];
        let h = 1e-6;
        for cost in [TransportCost::squared(), TransportCost::w2()] {
            let grad = cost.evaluate_with_gradient(a.view(), b.view()).unwrap();
            for i in 0..a.len() {
                let mut up = a.clone();
                up[i] += h;
                let mut down = a.clone();
                down[i] -= h;
                let numeric = (cost.evaluate(up.view(), b.view()).unwrap()
                    - cost.evaluate(down.view(), b.view()).unwrap())
                    / (2.0 * h);
                assert!(
                    (numeric - grad.grad_a[i]).abs() < 1e-5,
                    "grad_a[{}]: {} vs {}",
                    i,
                    numeric,
                    grad.grad_a[i]
                );

                let mut up = b.clone();
                up[i] += h;
                let mut down = b.clone();
                down[i] -= h;
                let numeric = (cost.evaluate(a.view(), up.view()).unwrap()
                    - cost.evaluate(a.view(), down.view()).unwrap())
                    / (2.0 * h);
                assert!((numeric - grad.grad_b[i]).abs() < 1e-5);
            }
        }
    }

    #[test]
    fn test_gradient_zero_at_identity() {
        let a = array![1.0, 2.0, 3.0];
        let grad = TransportCost::w2()
            .evaluate_with_gradient(a.view(), a.view())
            .unwrap();
        assert_eq!(grad.value, 0.0);
        assert!(grad.grad_a.iter().all(|g| *g == 0.0));
    }
}
