use ndarray::Array2;

use crate::error::{GswError, Result};
use crate::routines::optimization::adam::Optimizer;
use crate::routines::projection::{GradientMode, Projector};
use crate::routines::transport::one_dim::TransportCost;
use crate::structs::points::PointSet;

/// A distance value together with the gradients requested for it.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub value: f64,
    /// Gradient with respect to the positions of the second point set
    pub grad_y: Option<Array2<f64>>,
    /// Gradient with respect to the projector parameters, flattened
    pub grad_parameters: Option<Vec<f64>>,
}

impl Evaluation {
    /// `false` if the value or any returned gradient entry is NaN or infinite.
    pub fn is_finite(&self) -> bool {
        self.value.is_finite()
            && self
                .grad_y
                .as_ref()
                .map_or(true, |g| g.iter().all(|v| v.is_finite()))
            && self
                .grad_parameters
                .as_ref()
                .map_or(true, |g| g.iter().all(|v| v.is_finite()))
    }
}

/// Generalized sliced-Wasserstein distance with a single learned slice.
///
/// Both point sets go through the same [Projector] and the resulting scalar
/// samples are compared with a one-dimensional [TransportCost]. The default
/// cost is the unrooted `p = 2` form, i.e. the mean squared sorted difference;
/// take a square root of [Evaluation::value] to report a distance.
#[derive(Debug, Clone)]
pub struct Gsw {
    projector: Box<dyn Projector>,
    cost: TransportCost,
}

impl Gsw {
    pub fn new(projector: Box<dyn Projector>) -> Self {
        Gsw {
            projector,
            cost: TransportCost::squared(),
        }
    }

    pub fn with_cost(mut self, cost: TransportCost) -> Self {
        self.cost = cost;
        self
    }

    pub fn projector(&self) -> &dyn Projector {
        self.projector.as_ref()
    }

    pub fn cost(&self) -> TransportCost {
        self.cost
    }

    /// Swap in a freshly initialized projector of the same input dimension.
    pub fn reinitialize(&mut self, projector: Box<dyn Projector>) -> Result<()> {
        if projector.input_dim() != self.projector.input_dim() {
            return Err(GswError::DimensionMismatch {
                left: self.projector.input_dim(),
                right: projector.input_dim(),
            });
        }
        self.projector = projector;
        Ok(())
    }

    /// Apply one optimizer step to the projector parameters.
    pub fn step_projector(&mut self, optimizer: &mut dyn Optimizer, gradient: &[f64]) -> Result<()> {
        self.projector.step(optimizer, gradient)
    }

    /// The detached distance value.
    pub fn gsw(&self, x: &PointSet, y: &PointSet) -> Result<f64> {
        Ok(self.evaluate(x, y, GradientMode::Detached)?.value)
    }

    /// Evaluate the distance between `x` and `y`, with the gradients selected by `mode`.
    ///
    /// Point gradients are only ever taken with respect to `y`; `x` is the fixed
    /// reference sample.
    pub fn evaluate(&self, x: &PointSet, y: &PointSet, mode: GradientMode) -> Result<Evaluation> {
        x.check_compatible(y)?;
        if x.dim() != self.projector.input_dim() {
            return Err(GswError::DimensionMismatch {
                left: self.projector.input_dim(),
                right: x.dim(),
            });
        }

        let slice_x = self.projector.project(x.view());
        let slice_y = self.projector.project(y.view());

        if mode == GradientMode::Detached {
            let value = self.cost.evaluate(slice_x.view(), slice_y.view())?;
            return Ok(Evaluation {
                value,
                grad_y: None,
                grad_parameters: None,
            });
        }

        let cost = self
            .cost
            .evaluate_with_gradient(slice_x.view(), slice_y.view())?;

        let back_y = self.projector.backward(y.view(), cost.grad_b.view(), mode);
        let grad_parameters = if mode.parameters() {
            let back_x = self
                .projector
                .backward(x.view(), cost.grad_a.view(), GradientMode::Parameters);
            match (back_x.parameters, back_y.parameters) {
                (Some(gx), Some(gy)) => Some(gx.iter().zip(&gy).map(|(a, b)| a + b).collect()),
                _ => None,
            }
        } else {
            None
        };

        Ok(Evaluation {
            value: cost.value,
            grad_y: back_y.points,
            grad_parameters,
        })
    }
}
