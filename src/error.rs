use thiserror::Error;

/// Failures raised by the distance engine and its building blocks.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GswError {
    /// The two point sets do not live in the same ambient space.
    #[error("dimension mismatch: {left} vs {right}")]
    DimensionMismatch { left: usize, right: usize },

    /// A transport cost was requested on an empty sequence or point set.
    #[error("empty input")]
    EmptyInput,

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Exact assignment needs both sets to carry the same number of points.
    #[error("point count mismatch: {left} vs {right}")]
    CountMismatch { left: usize, right: usize },

    /// A gradient or parameter vector does not match the projector layout.
    #[error("parameter length mismatch: expected {expected}, found {found}")]
    ParameterLength { expected: usize, found: usize },

    /// The outer loop produced a non-finite loss and was configured to stop.
    #[error("non-finite loss at iteration {iteration} in configuration {configuration}")]
    Diverged {
        iteration: usize,
        configuration: String,
    },
}

pub type Result<T> = std::result::Result<T, GswError>;
