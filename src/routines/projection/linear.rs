use ndarray::{Array1, ArrayView1, ArrayView2, Axis};

use super::{backprop, Depth, GradientMode, Projector, ProjectorGradient};
use crate::error::{GswError, Result};
use crate::routines::optimization::adam::Optimizer;
use crate::structs::parameters::ProjectorParameters;

/// Depth 1: a single affine map `x -> w·x + b`.
///
/// With `b = 0` this is the classical sliced-Wasserstein projection onto `w`.
#[derive(Debug, Clone)]
pub struct LinearProjector {
    parameters: ProjectorParameters,
}

impl LinearProjector {
    pub fn new(parameters: ProjectorParameters) -> Result<Self> {
        if parameters.layers().len() != 1 {
            return Err(GswError::InvalidConfiguration(format!(
                "linear projector needs 1 layer, found {}",
                parameters.layers().len()
            )));
        }
        Ok(LinearProjector { parameters })
    }
}

impl Projector for LinearProjector {
    fn depth(&self) -> Depth {
        Depth::One
    }

    fn parameters(&self) -> &ProjectorParameters {
        &self.parameters
    }

    fn project(&self, points: ArrayView2<'_, f64>) -> Array1<f64> {
        self.parameters.layers()[0]
            .forward(points)
            .index_axis_move(Axis(1), 0)
    }

    fn backward(
        &self,
        points: ArrayView2<'_, f64>,
        upstream: ArrayView1<'_, f64>,
        mode: GradientMode,
    ) -> ProjectorGradient {
        backprop(self.parameters.layers(), points, upstream, mode)
    }

    fn step(&mut self, optimizer: &mut dyn Optimizer, gradient: &[f64]) -> Result<()> {
        self.parameters.apply_step(optimizer, gradient)
    }

    fn box_clone(&self) -> Box<dyn Projector> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structs::parameters::Affine;
    use ndarray::array;

    #[test]
    fn test_linear_projection() {
        let layer = Affine::new(array![[0.5, 0.25]], array![0.0]).unwrap();
        let projector =
            LinearProjector::new(ProjectorParameters::from_layers(vec![layer]).unwrap()).unwrap();
        let out = projector.project(array![[1.0, 0.0], [0.0, 1.0], [1.0, 1.0]].view());
        assert_eq!(out, array![0.5, 0.25, 0.75]);
    }

    #[test]
    fn test_rejects_deeper_parameters() {
        let a = Affine::new(array![[1.0, 0.0], [0.0, 1.0]], array![0.0, 0.0]).unwrap();
        let b = Affine::new(array![[1.0, 1.0]], array![0.0]).unwrap();
        let parameters = ProjectorParameters::from_layers(vec![a, b]).unwrap();
        assert!(LinearProjector::new(parameters).is_err());
    }
}
