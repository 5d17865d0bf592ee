//! Generalized sliced-Wasserstein (GSW) and max-GSW distances with learned
//! nonlinear slices, and gradient flows driven by them.
//!
//! A projector maps every point of a cloud to a scalar. GSW compares two
//! clouds by the one-dimensional transport cost between their projections.
//! max-GSW first trains the projector to make that cost as large as possible,
//! then reports the cost and its gradient with respect to the moving cloud.
//!
//! The [entrypoints] module runs the comparison experiment: six flows (GSW and
//! max-GSW, each with a depth 1, 2 or 3 projector) move a Gaussian cloud
//! towards a toy target while the d-dimensional 2-Wasserstein distance is
//! tracked.

pub mod entrypoints;
pub mod error;
pub mod logger;
pub mod routines {
    pub mod datasets;
    pub mod distance {
        pub mod gsw;
        pub mod max_gsw;
    }
    pub mod flow;
    pub mod math;
    pub mod optimization {
        pub mod adam;
    }
    pub mod output;
    pub mod projection;
    pub mod settings;
    pub mod transport;
}
pub mod structs {
    pub mod metrics;
    pub mod parameters;
    pub mod points;
}

pub mod prelude {
    pub use crate::entrypoints::{configurations, run, run_experiment, ExperimentResult};
    pub use crate::error::{GswError, Result};
    pub use crate::logger::setup_log;
    pub use crate::routines::datasets::{self, Dataset};
    pub use crate::routines::distance::gsw::{Evaluation, Gsw};
    pub use crate::routines::distance::max_gsw::{MaxEvaluation, MaxGsw, ResetPolicy};
    pub use crate::routines::flow::{Flow, FlowConfig, Objective, ProjectorUpdate, StepReport};
    pub use crate::routines::optimization::adam::{Adam, Optimizer, Sgd};
    pub use crate::routines::projection::{
        from_parameters, Depth, GradientMode, Projector, ProjectorGradient, ProjectorSpec,
    };
    pub use crate::routines::settings::{read_settings, Settings};
    pub use crate::routines::transport::one_dim::TransportCost;
    pub use crate::routines::transport::sinkhorn::SinkhornConfig;
    pub use crate::routines::transport::{w2, W2Solver};
    pub use crate::structs::metrics::RunningMetrics;
    pub use crate::structs::parameters::{Affine, ProjectorParameters};
    pub use crate::structs::points::PointSet;
}
