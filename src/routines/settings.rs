use std::path::Path;

use config::{Config, Environment, File, FileFormat};
use eyre::WrapErr;
use serde::{Deserialize, Serialize};

use crate::error::{GswError, Result};
use crate::routines::datasets::Dataset;
use crate::routines::distance::max_gsw::ResetPolicy;
use crate::routines::flow::ProjectorUpdate;
use crate::routines::transport::sinkhorn::SinkhornConfig;
use crate::routines::transport::W2Solver;

/// Settings for one experiment, read from a TOML file.
///
/// Every section and every key is optional. Values can be overridden from the
/// environment with the `GSW_` prefix and `__` between section and key, for
/// example `GSW_FLOW__ITERATIONS=500`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub data: DataSettings,
    #[serde(default)]
    pub flow: FlowSettings,
    #[serde(default)]
    pub max_gsw: MaxGswSettings,
    #[serde(default)]
    pub metrics: MetricSettings,
    #[serde(default)]
    pub log: LogSettings,
    #[serde(default)]
    pub output: OutputSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSettings {
    #[serde(default = "default_target")]
    pub target: Dataset,
    /// Number of points in both the source and the target cloud
    #[serde(default = "default_samples")]
    pub samples: usize,
    /// Standard deviation of the Gaussian source cloud
    #[serde(default = "default_source_std")]
    pub source_std: f64,
    #[serde(default = "default_seed")]
    pub seed: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowSettings {
    #[serde(default = "default_iterations")]
    pub iterations: usize,
    #[serde(default = "default_lr")]
    pub lr: f64,
    #[serde(default = "default_hidden")]
    pub hidden: usize,
    #[serde(default)]
    pub gsw_projector: ProjectorUpdate,
    /// Stop the experiment on the first non-finite loss instead of logging a warning
    #[serde(default = "default_false")]
    pub abort_on_divergence: bool,
    /// Step the configurations on the rayon thread pool
    #[serde(default = "default_false")]
    pub parallel: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaxGswSettings {
    #[serde(default = "default_inner_iterations")]
    pub inner_iterations: i64,
    #[serde(default = "default_inner_lr")]
    pub inner_lr: f64,
    #[serde(default)]
    pub reset: ResetPolicy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MetricSolver {
    #[default]
    Exact,
    Sinkhorn,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSettings {
    /// `exact` solves an N×N assignment per configuration on every recorded
    /// iteration, roughly half a second at N = 1000 in a release build.
    /// `sinkhorn` is cheaper for large clouds.
    #[serde(default)]
    pub solver: MetricSolver,
    /// Record the reported distance every `interval` iterations, plus the last one
    #[serde(default = "default_interval")]
    pub interval: usize,
    #[serde(default = "default_sinkhorn_epsilon")]
    pub sinkhorn_epsilon: f64,
    #[serde(default = "default_sinkhorn_iterations")]
    pub sinkhorn_iterations: usize,
}

impl MetricSettings {
    pub fn solver(&self) -> W2Solver {
        match self.solver {
            MetricSolver::Exact => W2Solver::Exact,
            MetricSolver::Sinkhorn => W2Solver::Sinkhorn(SinkhornConfig {
                epsilon: self.sinkhorn_epsilon,
                max_iterations: self.sinkhorn_iterations,
                ..SinkhornConfig::default()
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log file name inside the output folder. An empty name disables the file.
    #[serde(default = "default_log_file")]
    pub file: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputSettings {
    #[serde(default = "default_true")]
    pub write: bool,
    #[serde(default = "default_output_path")]
    pub path: String,
    #[serde(default = "default_metrics_file")]
    pub metrics: String,
}

impl Settings {
    /// Check the values that deserialization alone cannot rule out.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(GswError::InvalidConfiguration(msg));

        if self.data.samples == 0 {
            return invalid("data.samples must be at least 1".to_string());
        }
        if !(self.data.source_std > 0.0 && self.data.source_std.is_finite()) {
            return invalid(format!(
                "data.source_std must be positive, found {}",
                self.data.source_std
            ));
        }
        if self.flow.iterations == 0 {
            return invalid("flow.iterations must be at least 1".to_string());
        }
        if !(self.flow.lr > 0.0 && self.flow.lr.is_finite()) {
            return invalid(format!("flow.lr must be positive, found {}", self.flow.lr));
        }
        if self.flow.hidden == 0 {
            return invalid("flow.hidden must be at least 1".to_string());
        }
        if self.max_gsw.inner_iterations < 0 {
            return invalid(format!(
                "max_gsw.inner_iterations must be non-negative, found {}",
                self.max_gsw.inner_iterations
            ));
        }
        if !(self.max_gsw.inner_lr >= 0.0 && self.max_gsw.inner_lr.is_finite()) {
            return invalid(format!(
                "max_gsw.inner_lr must be non-negative, found {}",
                self.max_gsw.inner_lr
            ));
        }
        if self.metrics.interval == 0 {
            return invalid("metrics.interval must be at least 1".to_string());
        }
        if self.metrics.solver == MetricSolver::Sinkhorn {
            if !(self.metrics.sinkhorn_epsilon > 0.0 && self.metrics.sinkhorn_epsilon.is_finite()) {
                return invalid(format!(
                    "metrics.sinkhorn_epsilon must be positive, found {}",
                    self.metrics.sinkhorn_epsilon
                ));
            }
            if self.metrics.sinkhorn_iterations == 0 {
                return invalid("metrics.sinkhorn_iterations must be at least 1".to_string());
            }
        }
        Ok(())
    }
}

/// Read and validate settings from a TOML file, applying `GSW_` environment overrides.
pub fn read_settings(path: impl AsRef<Path>) -> eyre::Result<Settings> {
    let path = path.as_ref();
    let parsed = Config::builder()
        .add_source(File::from(path).format(FileFormat::Toml))
        .add_source(environment())
        .build()
        .wrap_err_with(|| format!("Failed to read settings from {:?}", path))?;

    finish(parsed)
}

/// Parse settings from a TOML string, applying `GSW_` environment overrides.
pub fn parse_settings(contents: &str) -> eyre::Result<Settings> {
    let parsed = Config::builder()
        .add_source(File::from_str(contents, FileFormat::Toml))
        .add_source(environment())
        .build()
        .wrap_err("Failed to parse settings")?;

    finish(parsed)
}

fn environment() -> Environment {
    Environment::with_prefix("GSW")
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

fn finish(parsed: Config) -> eyre::Result<Settings> {
    let settings: Settings = parsed
        .try_deserialize()
        .wrap_err("Settings do not match the expected layout")?;
    settings.validate()?;
    Ok(settings)
}

// *********************************
// Default values for deserializing
// *********************************
impl Default for DataSettings {
    fn default() -> Self {
        DataSettings {
            target: default_target(),
            samples: default_samples(),
            source_std: default_source_std(),
            seed: default_seed(),
        }
    }
}

impl Default for FlowSettings {
    fn default() -> Self {
        FlowSettings {
            iterations: default_iterations(),
            lr: default_lr(),
            hidden: default_hidden(),
            gsw_projector: ProjectorUpdate::default(),
            abort_on_divergence: default_false(),
            parallel: default_false(),
        }
    }
}

impl Default for MaxGswSettings {
    fn default() -> Self {
        MaxGswSettings {
            inner_iterations: default_inner_iterations(),
            inner_lr: default_inner_lr(),
            reset: ResetPolicy::default(),
        }
    }
}

impl Default for MetricSettings {
    fn default() -> Self {
        MetricSettings {
            solver: MetricSolver::default(),
            interval: default_interval(),
            sinkhorn_epsilon: default_sinkhorn_epsilon(),
            sinkhorn_iterations: default_sinkhorn_iterations(),
        }
    }
}

impl Default for LogSettings {
    fn default() -> Self {
        LogSettings {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

impl Default for OutputSettings {
    fn default() -> Self {
        OutputSettings {
            write: default_true(),
            path: default_output_path(),
            metrics: default_metrics_file(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_false() -> bool {
    false
}

fn default_target() -> Dataset {
    Dataset::Circle
}

fn default_samples() -> usize {
    1000
}

fn default_source_std() -> f64 {
    0.25
}

fn default_seed() -> u64 {
    347
}

fn default_iterations() -> usize {
    250
}

fn default_lr() -> f64 {
    1e-2
}

fn default_hidden() -> usize {
    crate::routines::projection::DEFAULT_HIDDEN
}

fn default_inner_iterations() -> i64 {
    50
}

fn default_inner_lr() -> f64 {
    1e-4
}

fn default_interval() -> usize {
    10
}

fn default_sinkhorn_epsilon() -> f64 {
    1e-2
}

fn default_sinkhorn_iterations() -> usize {
    500
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> Option<String> {
    Some("gswflow.log".to_string())
}

fn default_output_path() -> String {
    "outputs".to_string()
}

fn default_metrics_file() -> String {
    "metrics.csv".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.data.target, Dataset::Circle);
        assert_eq!(settings.flow.iterations, 250);
        assert_eq!(settings.max_gsw.inner_iterations, 50);
        assert_eq!(settings.metrics.solver(), W2Solver::Exact);
        assert_eq!(settings.metrics.interval, 10);
    }

    #[test]
    fn test_sinkhorn_solver() {
        let mut metrics = MetricSettings::default();
        metrics.solver = MetricSolver::Sinkhorn;
        metrics.sinkhorn_epsilon = 0.5;
        match metrics.solver() {
            W2Solver::Sinkhorn(config) => {
                assert_eq!(config.epsilon, 0.5);
                assert_eq!(config.max_iterations, 500);
            }
            other => panic!("unexpected solver {:?}", other),
        }
    }

    #[test]
    fn test_validate_rejects() {
        let mut settings = Settings::default();
        settings.max_gsw.inner_iterations = -1;
        assert!(matches!(
            settings.validate(),
            Err(GswError::InvalidConfiguration(_))
        ));

        let mut settings = Settings::default();
        settings.metrics.interval = 0;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.data.source_std = f64::NAN;
        assert!(settings.validate().is_err());
    }
}
