//! Outer loop: move a point cloud towards a target by descending on a sliced distance
//!
//! A [Flow] owns everything one configuration needs: its point positions,
//! the optimizer state for those positions, and its own projector with its
//! own optimizer. Flows never share mutable state, so several of them can be
//! stepped side by side on different threads.

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::error::{GswError, Result};
use crate::routines::distance::gsw::{Evaluation, Gsw};
use crate::routines::distance::max_gsw::{MaxGsw, ResetPolicy};
use crate::routines::optimization::adam::{Adam, Optimizer};
use crate::routines::projection::{Depth, GradientMode, Projector, ProjectorSpec};
use crate::structs::points::PointSet;

/// How a GSW flow treats its projector between outer steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProjectorUpdate {
    /// Draw a fresh random slice before every step
    #[default]
    Resample,
    /// Keep one slice and descend on it together with the points
    Joint,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Objective {
    Gsw {
        update: ProjectorUpdate,
    },
    MaxGsw {
        inner_iterations: i64,
        inner_lr: f64,
        reset: ResetPolicy,
    },
}

impl Objective {
    pub fn label(&self) -> &'static str {
        match self {
            Objective::Gsw { .. } => "GSW",
            Objective::MaxGsw { .. } => "max-GSW",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FlowConfig {
    pub objective: Objective,
    pub depth: Depth,
    pub hidden: usize,
    /// Learning rate of the Adam optimizer on the point positions
    pub lr: f64,
    pub seed: u64,
}

impl FlowConfig {
    pub fn name(&self) -> String {
        format!("{} depth {}", self.objective.label(), self.depth)
    }
}

#[derive(Debug, Clone)]
enum Slicer {
    Gsw {
        engine: Gsw,
        optimizer: Adam,
        spec: ProjectorSpec,
        rng: StdRng,
        update: ProjectorUpdate,
    },
    Max {
        oracle: MaxGsw,
        inner_iterations: i64,
        inner_lr: f64,
    },
}

/// Summary of one outer step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepReport {
    pub iteration: usize,
    /// The training loss (unrooted squared distance) before the step
    pub loss: f64,
    /// `false` if the loss or its gradient contained NaN or infinity
    pub finite: bool,
}

#[derive(Debug, Clone)]
pub struct Flow {
    config: FlowConfig,
    slicer: Slicer,
    points: PointSet,
    optimizer: Adam,
    iteration: usize,
}

impl Flow {
    pub fn new(config: FlowConfig, source: PointSet) -> Result<Self> {
        if !(config.lr > 0.0 && config.lr.is_finite()) {
            return Err(GswError::InvalidConfiguration(format!(
                "outer learning rate must be positive, found {}",
                config.lr
            )));
        }
        let spec = ProjectorSpec::new(source.dim(), config.depth).with_hidden(config.hidden);

        let slicer = match config.objective {
            Objective::Gsw { update } => {
                let mut rng = StdRng::seed_from_u64(config.seed);
                let engine = Gsw::new(spec.build(&mut rng)?);
                Slicer::Gsw {
                    engine,
                    optimizer: Adam::new(config.lr),
                    spec,
                    rng,
                    update,
                }
            }
            Objective::MaxGsw {
                inner_iterations,
                inner_lr,
                reset,
            } => {
                if inner_iterations < 0 {
                    return Err(GswError::InvalidConfiguration(format!(
                        "inner iterations must be non-negative, found {}",
                        inner_iterations
                    )));
                }
                Slicer::Max {
                    oracle: MaxGsw::new(spec, config.seed)?.with_reset(reset),
                    inner_iterations,
                    inner_lr,
                }
            }
        };

        Ok(Flow {
            optimizer: Adam::new(config.lr),
            config,
            slicer,
            points: source,
            iteration: 0,
        })
    }

    pub fn config(&self) -> &FlowConfig {
        &self.config
    }

    pub fn name(&self) -> String {
        self.config.name()
    }

    /// Current point positions
    pub fn points(&self) -> &PointSet {
        &self.points
    }

    pub fn projector(&self) -> &dyn Projector {
        match &self.slicer {
            Slicer::Gsw { engine, .. } => engine.projector(),
            Slicer::Max { oracle, .. } => oracle.projector(),
        }
    }

    /// Number of completed steps
    pub fn iteration(&self) -> usize {
        self.iteration
    }

    /// Evaluate the objective against `target` and take one Adam step on the points.
    ///
    /// A non-finite loss is reported through [StepReport::finite] and the step
    /// is still applied; deciding whether to stop is left to the caller.
    pub fn step(&mut self, target: &PointSet) -> Result<StepReport> {
        target.check_compatible(&self.points)?;

        let evaluation: Evaluation = match &mut self.slicer {
            Slicer::Gsw {
                engine,
                optimizer,
                spec,
                rng,
                update,
            } => match update {
                ProjectorUpdate::Resample => {
                    engine.reinitialize(spec.build(rng)?)?;
                    engine.evaluate(target, &self.points, GradientMode::Points)?
                }
                ProjectorUpdate::Joint => {
                    let eval = engine.evaluate(target, &self.points, GradientMode::Joint)?;
                    if let Some(grad) = &eval.grad_parameters {
                        engine.step_projector(optimizer, grad)?;
                    }
                    eval
                }
            },
            Slicer::Max {
                oracle,
                inner_iterations,
                inner_lr,
            } => {
                oracle
                    .max_gsw(target, &self.points, *inner_iterations, *inner_lr)?
                    .evaluation
            }
        };

        if let Some(grad) = &evaluation.grad_y {
            let mut flat: Vec<f64> = self.points.matrix().iter().copied().collect();
            let gradient: Vec<f64> = grad.iter().copied().collect();
            self.optimizer.step(&mut flat, &gradient)?;
            for (slot, value) in self.points.view_mut().iter_mut().zip(flat) {
                *slot = value;
            }
        }

        let report = StepReport {
            iteration: self.iteration,
            loss: evaluation.value,
            finite: evaluation.is_finite(),
        };
        self.iteration += 1;
        tracing::debug!(
            "{} iteration {}: loss {:.6e}",
            self.config.name(),
            report.iteration,
            report.loss
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routines::datasets;

    fn setup() -> (PointSet, PointSet) {
        let mut rng = StdRng::seed_from_u64(347);
        let target = datasets::load_data("8gaussians", 64, &mut rng).unwrap();
        let source = datasets::gaussian(64, 2, 0.25, &mut StdRng::seed_from_u64(347)).unwrap();
        (target, source)
    }

    fn config(objective: Objective, depth: Depth) -> FlowConfig {
        FlowConfig {
            objective,
            depth,
            hidden: 8,
            lr: 1e-2,
            seed: 1,
        }
    }

    #[test]
    fn test_step_moves_points_and_counts() {
        let (target, source) = setup();
        let objective = Objective::Gsw {
            update: ProjectorUpdate::Resample,
        };
        let mut flow = Flow::new(config(objective, Depth::Two), source.clone()).unwrap();
        let report = flow.step(&target).unwrap();
        assert_eq!(report.iteration, 0);
        assert!(report.finite);
        assert_eq!(flow.iteration(), 1);
        assert_ne!(flow.points(), &source);
        assert_eq!(flow.name(), "GSW depth 2");
    }

    #[test]
    fn test_joint_update_moves_projector() {
        let (target, source) = setup();
        let objective = Objective::Gsw {
            update: ProjectorUpdate::Joint,
        };
        let mut flow = Flow::new(config(objective, Depth::One), source).unwrap();
        let before = flow.projector().parameters().clone();
        flow.step(&target).unwrap();
        assert_ne!(flow.projector().parameters(), &before);
    }

    #[test]
    fn test_max_gsw_flow_steps() {
        let (target, source) = setup();
        let objective = Objective::MaxGsw {
            inner_iterations: 3,
            inner_lr: 1e-3,
            reset: ResetPolicy::Warm,
        };
        let mut flow = Flow::new(config(objective, Depth::Three), source).unwrap();
        let before = flow.projector().parameters().clone();
        flow.step(&target).unwrap();
        assert_ne!(flow.projector().parameters(), &before);
        assert_eq!(flow.name(), "max-GSW depth 3");
    }

    #[test]
    fn test_rejects_bad_configuration() {
        let (target, source) = setup();
        let mut bad = config(
            Objective::Gsw {
                update: ProjectorUpdate::Resample,
            },
            Depth::One,
        );
        bad.lr = 0.0;
        assert!(Flow::new(bad, source.clone()).is_err());

        let negative = config(
            Objective::MaxGsw {
                inner_iterations: -2,
                inner_lr: 1e-3,
                reset: ResetPolicy::Warm,
            },
            Depth::One,
        );
        assert!(matches!(
            Flow::new(negative, source.clone()),
            Err(GswError::InvalidConfiguration(_))
        ));

        let mut flow = Flow::new(
            config(
                Objective::Gsw {
                    update: ProjectorUpdate::Resample,
                },
                Depth::One,
            ),
            source,
        )
        .unwrap();
        let wrong = PointSet::from(ndarray::Array2::zeros((64, 3)));
        assert!(flow.step(&wrong).is_err());
        assert!(flow.step(&target).is_ok());
    }
}
