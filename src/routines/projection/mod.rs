//! Learned scalar slices
//!
//! A [Projector] maps every point of a cloud to one real number, point by
//! point. The three concrete depths are separate types chosen once by
//! [ProjectorSpec::build], so the forward pass never branches on depth.

pub mod linear;
pub mod mlp;

use std::fmt::Debug;

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{GswError, Result};
use crate::routines::optimization::adam::Optimizer;
use crate::structs::parameters::{Affine, ProjectorParameters};
use crate::structs::points::PointSet;

pub use linear::LinearProjector;
pub use mlp::{DeepProjector, ShallowProjector};

/// Hidden width of the depth-2 and depth-3 projectors unless overridden
pub const DEFAULT_HIDDEN: usize = 32;

/// Slope of the LeakyReLU used between hidden layers
pub const NEGATIVE_SLOPE: f64 = 0.2;

/// Number of affine layers in a projector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "usize", into = "usize")]
pub enum Depth {
    One,
    Two,
    Three,
}

impl Depth {
    pub const ALL: [Depth; 3] = [Depth::One, Depth::Two, Depth::Three];

    pub fn layers(self) -> usize {
        match self {
            Depth::One => 1,
            Depth::Two => 2,
            Depth::Three => 3,
        }
    }
}

impl TryFrom<usize> for Depth {
    type Error = GswError;

    fn try_from(layers: usize) -> Result<Self> {
        match layers {
            1 => Ok(Depth::One),
            2 => Ok(Depth::Two),
            3 => Ok(Depth::Three),
            other => Err(GswError::InvalidConfiguration(format!(
                "projector depth must be 1, 2 or 3, found {}",
                other
            ))),
        }
    }
}

impl From<Depth> for usize {
    fn from(depth: Depth) -> usize {
        depth.layers()
    }
}

impl std::fmt::Display for Depth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.layers())
    }
}

/// Which gradients a backward pass should produce.
///
/// `Detached` computes nothing, which is how the ascent phase of max-GSW keeps
/// the point positions out of the parameter update and how the final emit
/// evaluation keeps the parameters out of the outer gradient.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GradientMode {
    Detached,
    Parameters,
    Points,
    Joint,
}

impl GradientMode {
    pub fn parameters(self) -> bool {
        matches!(self, GradientMode::Parameters | GradientMode::Joint)
    }

    pub fn points(self) -> bool {
        matches!(self, GradientMode::Points | GradientMode::Joint)
    }
}

/// Output of [Projector::backward].
#[derive(Debug, Clone, Default)]
pub struct ProjectorGradient {
    /// Flattened in [ProjectorParameters::to_vec] order
    pub parameters: Option<Vec<f64>>,
    /// Same shape as the input points
    pub points: Option<Array2<f64>>,
}

pub trait Projector: Send + Sync + Debug {
    fn depth(&self) -> Depth;

    fn parameters(&self) -> &ProjectorParameters;

    /// Row-wise forward pass, `(N, d) -> N`.
    fn project(&self, points: ArrayView2<'_, f64>) -> Array1<f64>;

    /// Pull `upstream = dL/d(projection)` back to the parameters and/or points.
    fn backward(
        &self,
        points: ArrayView2<'_, f64>,
        upstream: ArrayView1<'_, f64>,
        mode: GradientMode,
    ) -> ProjectorGradient;

    /// Apply one optimizer step to the parameters.
    fn step(&mut self, optimizer: &mut dyn Optimizer, gradient: &[f64]) -> Result<()>;

    fn box_clone(&self) -> Box<dyn Projector>;

    fn input_dim(&self) -> usize {
        self.parameters().input_dim()
    }

    fn num_parameters(&self) -> usize {
        self.parameters().len()
    }

    /// [Projector::project] with a dimensionality check.
    fn project_points(&self, points: &PointSet) -> Result<Array1<f64>> {
        if points.dim() != self.input_dim() {
            return Err(GswError::DimensionMismatch {
                left: self.input_dim(),
                right: points.dim(),
            });
        }
        Ok(self.project(points.view()))
    }
}

impl Clone for Box<dyn Projector> {
    fn clone(&self) -> Self {
        self.box_clone()
    }
}

/// Everything needed to (re)initialize a projector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProjectorSpec {
    pub dim: usize,
    pub depth: Depth,
    pub hidden: usize,
}

impl ProjectorSpec {
    pub fn new(dim: usize, depth: Depth) -> Self {
        ProjectorSpec {
            dim,
            depth,
            hidden: DEFAULT_HIDDEN,
        }
    }

    pub fn with_hidden(mut self, hidden: usize) -> Self {
        self.hidden = hidden;
        self
    }

    /// Draw fresh random parameters and build the matching variant.
    pub fn build<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Box<dyn Projector>> {
        if self.dim == 0 {
            return Err(GswError::InvalidConfiguration(
                "projector input dimension must be positive".to_string(),
            ));
        }
        if self.hidden == 0 && self.depth != Depth::One {
            return Err(GswError::InvalidConfiguration(
                "hidden width must be positive".to_string(),
            ));
        }
        let hidden = vec![self.hidden; self.depth.layers() - 1];
        from_parameters(ProjectorParameters::random(self.dim, &hidden, rng))
    }
}

/// Build the projector variant matching the number of layers in `parameters`.
pub fn from_parameters(parameters: ProjectorParameters) -> Result<Box<dyn Projector>> {
    match Depth::try_from(parameters.layers().len())? {
        Depth::One => Ok(Box::new(LinearProjector::new(parameters)?)),
        Depth::Two => Ok(Box::new(ShallowProjector::new(parameters)?)),
        Depth::Three => Ok(Box::new(DeepProjector::new(parameters)?)),
    }
}

#[inline]
pub(crate) fn leaky_relu(x: f64) -> f64 {
    if x >= 0.0 {
        x
    } else {
        NEGATIVE_SLOPE * x
    }
}

#[inline]
pub(crate) fn leaky_relu_slope(x: f64) -> f64 {
    if x >= 0.0 {
        1.0
    } else {
        NEGATIVE_SLOPE
    }
}

/// Reverse-mode pass through `affine -> LeakyReLU -> ... -> affine`.
///
/// Shared by every depth; the forward activations are recomputed here
/// because the distance engine only asks for gradients on a subset of calls.
pub(crate) fn backprop(
    layers: &[Affine],
    x: ArrayView2<'_, f64>,
    upstream: ArrayView1<'_, f64>,
    mode: GradientMode,
) -> ProjectorGradient {
    if mode == GradientMode::Detached {
        return ProjectorGradient::default();
    }

    // pre[k] is the pre-activation of hidden layer k, hidden[k] its activation
    let mut pre: Vec<Array2<f64>> = Vec::with_capacity(layers.len() - 1);
    let mut hidden: Vec<Array2<f64>> = Vec::with_capacity(layers.len() - 1);
    for layer in &layers[..layers.len() - 1] {
        let z = match hidden.last() {
            Some(h) => layer.forward(h.view()),
            None => layer.forward(x),
        };
        hidden.push(z.mapv(leaky_relu));
        pre.push(z);
    }

    let mut grad = upstream.to_owned().insert_axis(Axis(1));
    let mut per_layer: Vec<Vec<f64>> = Vec::with_capacity(layers.len());
    let mut points = None;

    for k in (0..layers.len()).rev() {
        let layer = &layers[k];
        let input = if k == 0 { x.view() } else { hidden[k - 1].view() };

        if mode.parameters() {
            let grad_w = grad.t().dot(&input);
            let grad_b = grad.sum_axis(Axis(0));
            per_layer.push(grad_w.iter().chain(grad_b.iter()).copied().collect());
        }

        if k > 0 {
            let mut grad_in = grad.dot(layer.weight());
            grad_in.zip_mut_with(&pre[k - 1], |g, z| *g *= leaky_relu_slope(*z));
            grad = grad_in;
        } else if mode.points() {
            points = Some(grad.dot(layer.weight()));
        }
    }

    let parameters = if mode.parameters() {
        Some(per_layer.into_iter().rev().flatten().collect())
    } else {
        None
    };

    ProjectorGradient { parameters, points }
}
