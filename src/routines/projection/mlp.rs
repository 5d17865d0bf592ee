use ndarray::{Array1, ArrayView1, ArrayView2, Axis};

use super::{backprop, leaky_relu, Depth, GradientMode, Projector, ProjectorGradient};
use crate::error::{GswError, Result};
use crate::routines::optimization::adam::Optimizer;
use crate::structs::parameters::ProjectorParameters;

fn expect_layers(parameters: &ProjectorParameters, layers: usize) -> Result<()> {
    if parameters.layers().len() != layers {
        return Err(GswError::InvalidConfiguration(format!(
            "expected {} layers, found {}",
            layers,
            parameters.layers().len()
        )));
    }
    Ok(())
}

/// Depth 2: `affine -> LeakyReLU -> affine`.
#[derive(Debug, Clone)]
pub struct ShallowProjector {
    parameters: ProjectorParameters,
}

impl ShallowProjector {
    pub fn new(parameters: ProjectorParameters) -> Result<Self> {
        expect_layers(&parameters, 2)?;
        Ok(ShallowProjector { parameters })
    }
}

impl Projector for ShallowProjector {
    fn depth(&self) -> Depth {
        Depth::Two
    }

    fn parameters(&self) -> &ProjectorParameters {
        &self.parameters
    }

    fn project(&self, points: ArrayView2<'_, f64>) -> Array1<f64> {
        let layers = self.parameters.layers();
        let hidden = layers[0].forward(points).mapv_into(leaky_relu);
        layers[1]
            .forward(hidden.view())
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

/// Depth 3: `affine -> LeakyReLU -> affine -> LeakyReLU -> affine`.
#[derive(Debug, Clone)]
pub struct DeepProjector {
    parameters: ProjectorParameters,
}

impl DeepProjector {
    pub fn new(parameters: ProjectorParameters) -> Result<Self> {
        expect_layers(&parameters, 3)?;
        Ok(DeepProjector { parameters })
    }
}

impl Projector for DeepProjector {
    fn depth(&self) -> Depth {
        Depth::Three
    }

    fn parameters(&self) -> &ProjectorParameters {
        &self.parameters
    }

    fn project(&self, points: ArrayView2<'_, f64>) -> Array1<f64> {
        let layers = self.parameters.layers();
        let first = layers[0].forward(points).mapv_into(leaky_relu);
        let second = layers[1].forward(first.view()).mapv_into(leaky_relu);
        layers[2]
            .forward(second.view())
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
