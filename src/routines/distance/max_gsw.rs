//! max-GSW: the slice is pushed towards the worst case before it is used
//!
//! Every call runs a short gradient ascent on the projector parameters (the
//! ASCEND phase), holding both point sets fixed and computing no point
//! gradients, then evaluates the distance once more at the ascended
//! parameters with gradients taken with respect to `y` only (the EMIT phase).
//! The outer gradient therefore sees the final slice as a constant and never
//! the path that found it.
//!
//! Parameters and optimizer state persist between calls by default, so each
//! outer step warm-starts from the previous adversarial slice.

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use super::gsw::{Evaluation, Gsw};
use crate::error::{GswError, Result};
use crate::routines::optimization::adam::{Adam, Optimizer};
use crate::routines::projection::{Depth, GradientMode, Projector, ProjectorSpec, DEFAULT_HIDDEN};
use crate::structs::points::PointSet;

/// What happens to the projector at the start of every `max_gsw` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ResetPolicy {
    /// Keep the parameters and optimizer state from the previous call
    #[default]
    Warm,
    /// Draw fresh parameters and clear the optimizer state
    Reinitialize,
}

/// Result of one `max_gsw` call.
#[derive(Debug, Clone)]
pub struct MaxEvaluation {
    /// The EMIT-phase evaluation, carrying the gradient with respect to `y`
    pub evaluation: Evaluation,
    /// Distance at the start of each ascent step
    pub ascent: Vec<f64>,
}

#[derive(Debug, Clone)]
pub struct MaxGsw {
    engine: Gsw,
    optimizer: Adam,
    spec: ProjectorSpec,
    reset: ResetPolicy,
    rng: StdRng,
}

impl MaxGsw {
    /// Build a max-GSW oracle around a randomly initialized projector.
    pub fn new(spec: ProjectorSpec, seed: u64) -> Result<Self> {
        let mut rng = StdRng::seed_from_u64(seed);
        let projector = spec.build(&mut rng)?;
        Ok(MaxGsw {
            engine: Gsw::new(projector),
            optimizer: Adam::new(0.0),
            spec,
            reset: ResetPolicy::Warm,
            rng,
        })
    }

    /// Build a max-GSW oracle around an existing projector.
    ///
    /// `seed` is only used if the oracle is later switched to
    /// [ResetPolicy::Reinitialize].
    pub fn from_projector(projector: Box<dyn Projector>, seed: u64) -> Self {
        let hidden = match projector.depth() {
            Depth::One => DEFAULT_HIDDEN,
            _ => projector.parameters().layers()[0].outputs(),
        };
        let spec = ProjectorSpec::new(projector.input_dim(), projector.depth()).with_hidden(hidden);
        MaxGsw {
            engine: Gsw::new(projector),
            optimizer: Adam::new(0.0),
            spec,
            reset: ResetPolicy::Warm,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn with_reset(mut self, reset: ResetPolicy) -> Self {
        self.reset = reset;
        self
    }

    pub fn engine(&self) -> &Gsw {
        &self.engine
    }

    pub fn projector(&self) -> &dyn Projector {
        self.engine.projector()
    }

    pub fn reset_policy(&self) -> ResetPolicy {
        self.reset
    }

    /// Ascend on the projector for `inner_iterations` steps, then evaluate.
    ///
    /// `inner_iterations = 0` is a plain GSW evaluation at the current
    /// parameters. Negative counts and negative or non-finite learning rates
    /// are rejected with [GswError::InvalidConfiguration].
    pub fn max_gsw(
        &mut self,
        x: &PointSet,
        y: &PointSet,
        inner_iterations: i64,
        inner_lr: f64,
    ) -> Result<MaxEvaluation> {
        if inner_iterations < 0 {
            return Err(GswError::InvalidConfiguration(format!(
                "inner iterations must be non-negative, found {}",
                inner_iterations
            )));
        }
        if !(inner_lr >= 0.0 && inner_lr.is_finite()) {
            return Err(GswError::InvalidConfiguration(format!(
                "inner learning rate must be a non-negative number, found {}",
                inner_lr
            )));
        }
        x.check_compatible(y)?;

        if self.reset == ResetPolicy::Reinitialize {
            let projector = self.spec.build(&mut self.rng)?;
            self.engine.reinitialize(projector)?;
            self.optimizer.reset();
        }
        self.optimizer.set_learning_rate(inner_lr);

        let mut ascent = Vec::with_capacity(inner_iterations as usize);
        for step in 0..inner_iterations {
            let eval = self.engine.evaluate(x, y, GradientMode::Parameters)?;
            ascent.push(eval.value);
            tracing::trace!(step, value = eval.value, "max-GSW ascent");

            // The optimizer minimizes, so hand it the negated gradient
            let direction: Vec<f64> = eval
                .grad_parameters
                .unwrap_or_default()
                .iter()
                .map(|g| -g)
                .collect();
            self.engine.step_projector(&mut self.optimizer, &direction)?;
        }

        let evaluation = self.engine.evaluate(x, y, GradientMode::Points)?;
        Ok(MaxEvaluation { evaluation, ascent })
    }
}
