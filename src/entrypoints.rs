use std::path::{Path, PathBuf};
use std::time::Instant;

use eyre::Result;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;

use crate::error::GswError;
use crate::logger;
use crate::routines::datasets;
use crate::routines::flow::{Flow, FlowConfig, Objective, StepReport};
use crate::routines::output::{write_metrics, write_settings};
use crate::routines::projection::Depth;
use crate::routines::settings::{read_settings, Settings};
use crate::routines::transport::{w2, W2Solver};
use crate::structs::metrics::RunningMetrics;
use crate::structs::points::PointSet;

/// Everything produced by one experiment
#[derive(Debug)]
pub struct ExperimentResult {
    /// Reported 2-Wasserstein distance per iteration and configuration
    pub metrics: RunningMetrics,
    /// Final state of every flow, in the order of [configurations]
    pub flows: Vec<Flow>,
    pub target: PointSet,
    /// Location of the metrics file, if one was written
    pub output: Option<PathBuf>,
}

/// The six compared configurations: GSW and max-GSW, each at depth 1, 2 and 3.
///
/// Every configuration gets its own seed so the projectors start from
/// different draws.
pub fn configurations(settings: &Settings) -> Vec<FlowConfig> {
    let gsw = Objective::Gsw {
        update: settings.flow.gsw_projector,
    };
    let max_gsw = Objective::MaxGsw {
        inner_iterations: settings.max_gsw.inner_iterations,
        inner_lr: settings.max_gsw.inner_lr,
        reset: settings.max_gsw.reset,
    };

    [gsw, max_gsw]
        .into_iter()
        .flat_map(|objective| Depth::ALL.into_iter().map(move |depth| (objective, depth)))
        .enumerate()
        .map(|(index, (objective, depth))| FlowConfig {
            objective,
            depth,
            hidden: settings.flow.hidden,
            lr: settings.flow.lr,
            seed: settings.data.seed.wrapping_add(1 + index as u64),
        })
        .collect()
}

/// Primary entrypoint
///
/// Reads the settings file, sets up logging and runs the experiment.
pub fn run(settings_path: impl AsRef<Path>) -> Result<ExperimentResult> {
    let settings = read_settings(settings_path)?;
    logger::setup_log(&settings)?;
    run_experiment(&settings)
}

/// Flow a Gaussian source cloud towards the configured target under every configuration.
///
/// All flows start from the same source points. After each outer step the
/// d-dimensional 2-Wasserstein distance between every flow and the target is
/// recorded every `metrics.interval` iterations and at the final iteration.
pub fn run_experiment(settings: &Settings) -> Result<ExperimentResult> {
    let now = Instant::now();
    settings.validate()?;

    let samples = settings.data.samples;
    let seed = settings.data.seed;
    let target = settings
        .data
        .target
        .sample(samples, &mut StdRng::seed_from_u64(seed));
    let source = datasets::gaussian(
        samples,
        target.dim(),
        settings.data.source_std,
        &mut StdRng::seed_from_u64(seed),
    )?;
    tracing::info!(
        "Target {} with {} points, Gaussian source with standard deviation {}",
        settings.data.target,
        samples,
        settings.data.source_std
    );

    let mut flows = configurations(settings)
        .into_iter()
        .map(|config| Flow::new(config, source.clone()))
        .collect::<crate::error::Result<Vec<Flow>>>()?;
    let labels: Vec<String> = flows.iter().map(|f| f.name()).collect();

    let iterations = settings.flow.iterations;
    let interval = settings.metrics.interval;
    let solver = settings.metrics.solver();
    let mut metrics = RunningMetrics::new(iterations, labels.clone());
    let mut diverged = vec![false; flows.len()];

    for iteration in 0..iterations {
        let reports: Vec<StepReport> = if settings.flow.parallel {
            flows
                .par_iter_mut()
                .map(|flow| flow.step(&target))
                .collect::<crate::error::Result<_>>()?
        } else {
            flows
                .iter_mut()
                .map(|flow| flow.step(&target))
                .collect::<crate::error::Result<_>>()?
        };

        for (index, report) in reports.iter().enumerate() {
            if report.finite || diverged[index] {
                continue;
            }
            if settings.flow.abort_on_divergence {
                return Err(GswError::Diverged {
                    iteration: report.iteration,
                    configuration: labels[index].clone(),
                }
                .into());
            }
            tracing::warn!(
                "{} produced a non-finite loss at iteration {}, its metrics will be missing from here on",
                labels[index],
                report.iteration
            );
            diverged[index] = true;
        }

        if iteration % interval == 0 || iteration + 1 == iterations {
            let distances = reported_distances(&flows, &target, &solver, settings.flow.parallel)?;
            for (index, distance) in distances.iter().enumerate() {
                metrics.record(iteration, index, *distance)?;
            }
            tracing::info!(
                "Iteration {}: {}",
                iteration,
                labels
                    .iter()
                    .zip(&distances)
                    .map(|(label, d)| format!("{} = {:.4}", label, d))
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }
    }

    let output = if settings.output.write {
        let path = write_metrics(&metrics, &settings.output.path, &settings.output.metrics)?;
        write_settings(settings, &settings.output.path)?;
        tracing::info!("Metrics written to {:?}", path);
        Some(path)
    } else {
        None
    };

    tracing::info!("Finished {} iterations in {:.2?}", iterations, now.elapsed());

    Ok(ExperimentResult {
        metrics,
        flows,
        target,
        output,
    })
}

fn reported_distances(
    flows: &[Flow],
    target: &PointSet,
    solver: &W2Solver,
    parallel: bool,
) -> crate::error::Result<Vec<f64>> {
    if parallel {
        flows
            .par_iter()
            .map(|flow| w2(flow.points(), target, solver))
            .collect()
    } else {
        flows
            .iter()
            .map(|flow| w2(flow.points(), target, solver))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configurations() {
        let settings = Settings::default();
        let configs = configurations(&settings);
        let names: Vec<String> = configs.iter().map(|c| c.name()).collect();
        assert_eq!(
            names,
            vec![
                "GSW depth 1",
                "GSW depth 2",
                "GSW depth 3",
                "max-GSW depth 1",
                "max-GSW depth 2",
                "max-GSW depth 3"
            ]
        );
        let mut seeds: Vec<u64> = configs.iter().map(|c| c.seed).collect();
        seeds.dedup();
        assert_eq!(seeds.len(), 6);
    }

    #[test]
    fn test_small_experiment_records_interval() {
        let mut settings = Settings::default();
        settings.data.samples = 24;
        settings.flow.iterations = 5;
        settings.flow.hidden = 4;
        settings.max_gsw.inner_iterations = 2;
        settings.metrics.interval = 2;
        settings.output.write = false;

        let result = run_experiment(&settings).unwrap();
        assert_eq!(result.flows.len(), 6);
        assert!(result.output.is_none());
        for c in 0..6 {
            assert!(result.metrics.get(0, c).is_some());
            assert!(result.metrics.get(1, c).is_none());
            assert!(result.metrics.get(2, c).is_some());
            assert!(result.metrics.get(4, c).is_some());
        }
        assert!(result.flows.iter().all(|f| f.iteration() == 5));
    }
}
