use ndarray::{Array1, Array2, ArrayView2};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{GswError, Result};
use crate::routines::optimization::adam::Optimizer;

/// A single affine map `x -> W x + b`, applied row-wise to a batch of points.
///
/// `weight` has shape `(outputs, inputs)` and `bias` has length `outputs`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Affine {
    weight: Array2<f64>,
    bias: Array1<f64>,
}

impl Affine {
    pub fn new(weight: Array2<f64>, bias: Array1<f64>) -> Result<Self> {
        if weight.nrows() != bias.len() {
            return Err(GswError::ParameterLength {
                expected: weight.nrows(),
                found: bias.len(),
            });
        }
        Ok(Affine { weight, bias })
    }

    /// Draw weights and biases uniformly in `±1/sqrt(inputs)`.
    pub fn random<R: Rng + ?Sized>(inputs: usize, outputs: usize, rng: &mut R) -> Self {
        let bound = 1.0 / (inputs.max(1) as f64).sqrt();
        let weight = Array2::from_shape_fn((outputs, inputs), |_| rng.gen_range(-bound..=bound));
        let bias = Array1::from_shape_fn(outputs, |_| rng.gen_range(-bound..=bound));
        Affine { weight, bias }
    }

    pub fn inputs(&self) -> usize {
        self.weight.ncols()
    }

    pub fn outputs(&self) -> usize {
        self.weight.nrows()
    }

    pub fn weight(&self) -> &Array2<f64> {
        &self.weight
    }

    pub fn bias(&self) -> &Array1<f64> {
        &self.bias
    }

    /// Number of scalars held by this layer
    pub fn len(&self) -> usize {
        self.weight.len() + self.bias.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Row-wise forward pass, `(N, inputs) -> (N, outputs)`.
    pub fn forward(&self, x: ArrayView2<'_, f64>) -> Array2<f64> {
        let mut out = x.dot(&self.weight.t());
        out += &self.bias;
        out
    }
}

/// The learnable state of a projector: an ordered chain of affine layers.
///
/// The layers are only ever changed through [ProjectorParameters::apply_step],
/// which hands the flattened values to an [Optimizer]. Construction is the
/// only place where values are assigned directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectorParameters {
    layers: Vec<Affine>,
}

impl ProjectorParameters {
    /// Chain `layers`, checking that consecutive shapes agree and that the
    /// final layer maps to a single scalar.
    pub fn from_layers(layers: Vec<Affine>) -> Result<Self> {
        let last = layers.last().ok_or(GswError::EmptyInput)?;
        if last.outputs() != 1 {
            return Err(GswError::InvalidConfiguration(format!(
                "final layer must produce one output, found {}",
                last.outputs()
            )));
        }
        for pair in layers.windows(2) {
            if pair[0].outputs() != pair[1].inputs() {
                return Err(GswError::DimensionMismatch {
                    left: pair[0].outputs(),
                    right: pair[1].inputs(),
                });
            }
        }
        Ok(ProjectorParameters { layers })
    }

    /// Randomly initialize a chain `dim -> hidden[0] -> ... -> 1`.
    pub fn random<R: Rng + ?Sized>(dim: usize, hidden: &[usize], rng: &mut R) -> Self {
        let mut widths = Vec::with_capacity(hidden.len() + 2);
        widths.push(dim);
        widths.extend_from_slice(hidden);
        widths.push(1);
        let layers = widths
            .windows(2)
            .map(|w| Affine::random(w[0], w[1], rng))
            .collect();
        ProjectorParameters { layers }
    }

    pub fn layers(&self) -> &[Affine] {
        &self.layers
    }

    pub fn input_dim(&self) -> usize {
        self.layers.first().map(|l| l.inputs()).unwrap_or(0)
    }

    /// Total number of scalars across all layers
    pub fn len(&self) -> usize {
        self.layers.iter().map(|l| l.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flatten as `[W_0 (row-major), b_0, W_1, b_1, ...]`.
    ///
    /// Gradients produced by the projectors use the same ordering.
    pub fn to_vec(&self) -> Vec<f64> {
        let mut flat = Vec::with_capacity(self.len());
        for layer in &self.layers {
            flat.extend(layer.weight.iter());
            flat.extend(layer.bias.iter());
        }
        flat
    }

    /// A new set of parameters with the same layer shapes, filled from `values`
    /// in the [ProjectorParameters::to_vec] order.
    pub fn with_values(&self, values: &[f64]) -> Result<Self> {
        if values.len() != self.len() {
            return Err(GswError::ParameterLength {
                expected: self.len(),
                found: values.len(),
            });
        }
        let mut layers = self.layers.clone();
        let mut values = values.iter();
        for layer in layers.iter_mut() {
            for (slot, value) in layer
                .weight
                .iter_mut()
                .chain(layer.bias.iter_mut())
                .zip(&mut values)
            {
                *slot = *value;
            }
        }
        Ok(ProjectorParameters { layers })
    }

    pub fn is_finite(&self) -> bool {
        self.layers
            .iter()
            .all(|l| l.weight.iter().chain(l.bias.iter()).all(|x| x.is_finite()))
    }

    /// Apply one optimizer step with the given flattened gradient.
    pub fn apply_step(&mut self, optimizer: &mut dyn Optimizer, gradient: &[f64]) -> Result<()> {
        if gradient.len() != self.len() {
            return Err(GswError::ParameterLength {
                expected: self.len(),
                found: gradient.len(),
            });
        }
        let mut flat = self.to_vec();
        optimizer.step(&mut flat, gradient)?;
        *self = self.with_values(&flat)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routines::optimization::adam::Sgd;
    use ndarray::array;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_affine_forward() {
        let layer = Affine::new(array![[1.0, 2.0], [0.0, -1.0]], array![0.5, 1.0]).unwrap();
        let out = layer.forward(array![[1.0, 1.0], [2.0, 0.0]].view());
        assert_eq!(out, array![[3.5, 0.0], [2.5, 1.0]]);
    }

    #[test]
    fn test_from_layers_checks_shapes() {
        let a = Affine::new(Array2::zeros((3, 2)), Array1::zeros(3)).unwrap();
        let b = Affine::new(Array2::zeros((1, 4)), Array1::zeros(1)).unwrap();
        assert_eq!(
            ProjectorParameters::from_layers(vec![a.clone(), b]),
            Err(GswError::DimensionMismatch { left: 3, right: 4 })
        );
        assert!(matches!(
            ProjectorParameters::from_layers(vec![a]),
            Err(GswError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_random_shapes_and_bounds() {
        let mut rng = StdRng::seed_from_u64(1);
        let params = ProjectorParameters::random(2, &[32, 32], &mut rng);
        assert_eq!(params.layers().len(), 3);
        assert_eq!(params.len(), (2 * 32 + 32) + (32 * 32 + 32) + (32 + 1));
        let bound = 1.0 / 2.0_f64.sqrt();
        assert!(params.layers()[0].weight().iter().all(|w| w.abs() <= bound));
    }

    #[test]
    fn test_apply_step_round_trips_layout() {
        let layer = Affine::new(array![[1.0, 2.0]], array![3.0]).unwrap();
        let mut params = ProjectorParameters::from_layers(vec![layer]).unwrap();
        let mut sgd = Sgd::new(1.0);
        params.apply_step(&mut sgd, &[1.0, 0.0, -1.0]).unwrap();
        assert_eq!(params.to_vec(), vec![0.0, 2.0, 4.0]);
        assert_eq!(
            params.apply_step(&mut sgd, &[1.0]),
            Err(GswError::ParameterLength {
                expected: 3,
                found: 1
            })
        );
    }
}
