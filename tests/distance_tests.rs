use eyre::Result;
use gswflow::prelude::*;
use ndarray::{array, Array1, Array2};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn clouds(seed: u64, n: usize) -> (PointSet, PointSet) {
    let mut rng = StdRng::seed_from_u64(seed);
    let x = datasets::load_data("half_moons", n, &mut rng).unwrap();
    let y = datasets::gaussian(n, 2, 0.5, &mut rng).unwrap();
    (x, y)
}

/// Mean squared difference of the sorted projections onto `w`
fn sliced_along(x: &PointSet, y: &PointSet, w: &Array1<f64>) -> f64 {
    let sorted = |points: &PointSet| {
        let mut values: Vec<f64> = points.matrix().dot(w).to_vec();
        values.sort_by(|a, b| a.total_cmp(b));
        values
    };
    let (a, b) = (sorted(x), sorted(y));
    a.iter().zip(&b).map(|(u, v)| (u - v).powi(2)).sum::<f64>() / a.len() as f64
}

/// A depth-1 projector with zero bias is a plain linear slice
#[test]
fn test_depth_one_is_classical_sliced_wasserstein() -> Result<()> {
    let (x, y) = clouds(11, 50);
    for w in [array![1.0, 0.0], array![0.6, -0.8], array![-0.25, 2.0]] {
        let weight = w.clone().into_shape((1, 2))?;
        let layer = Affine::new(weight, Array1::zeros(1))?;
        let projector = from_parameters(ProjectorParameters::from_layers(vec![layer])?)?;
        assert_eq!(projector.depth(), Depth::One);

        let engine = Gsw::new(projector);
        let expected = sliced_along(&x, &y, &w);
        let found = engine.gsw(&x, &y)?;
        assert!(
            (found - expected).abs() < 1e-12,
            "direction {:?}: {} vs {}",
            w,
            found,
            expected
        );
    }
    Ok(())
}

/// Zero ascent steps gives exactly GSW, and small ascent steps never go below it
#[test]
fn test_max_gsw_lower_bound() -> Result<()> {
    let (x, y) = clouds(5, 40);
    for (seed, depth) in [(1, Depth::One), (2, Depth::Two), (3, Depth::Three)] {
        let spec = ProjectorSpec::new(2, depth).with_hidden(8);
        let start = spec.build(&mut StdRng::seed_from_u64(seed))?;
        let baseline = Gsw::new(start.clone()).gsw(&x, &y)?;

        let mut exact = MaxGsw::from_projector(start.clone(), seed);
        let zero = exact.max_gsw(&x, &y, 0, 1e-3)?;
        assert_eq!(zero.evaluation.value, baseline);
        assert!(zero.ascent.is_empty());

        let mut ascended = MaxGsw::from_projector(start, seed);
        let result = ascended.max_gsw(&x, &y, 5, 1e-6)?;
        assert_eq!(result.ascent.len(), 5);
        assert_eq!(result.ascent[0], baseline);
        assert!(result.evaluation.value >= baseline - 1e-12);
    }
    Ok(())
}

/// The emitted gradient depends only on the final slice, not on how it was found
#[test]
fn test_gradient_isolation() -> Result<()> {
    let (x, y) = clouds(9, 30);
    let spec = ProjectorSpec::new(2, Depth::Two).with_hidden(8);
    let start = spec.build(&mut StdRng::seed_from_u64(4))?;

    let mut long = MaxGsw::from_projector(start, 4);
    let trained = long.max_gsw(&x, &y, 7, 1e-3)?;
    let final_parameters = long.projector().parameters().clone();

    // Inject the final slice into a fresh oracle and skip the ascent entirely
    let mut injected = MaxGsw::from_projector(from_parameters(final_parameters)?, 99);
    let direct = injected.max_gsw(&x, &y, 0, 1e-3)?;

    let a = trained.evaluation.grad_y.expect("point gradient");
    let b = direct.evaluation.grad_y.expect("point gradient");
    let difference: Array2<f64> = &a - &b;
    assert!(difference.iter().all(|d| d.abs() < 1e-12));
    assert_eq!(trained.evaluation.value, direct.evaluation.value);
    assert!(trained.evaluation.grad_parameters.is_none());
    Ok(())
}

#[test]
fn test_gsw_is_symmetric_and_handles_unequal_counts() -> Result<()> {
    let (x, _) = clouds(21, 30);
    let (_, y) = clouds(22, 45);
    let engine = Gsw::new(ProjectorSpec::new(2, Depth::Three).build(&mut StdRng::seed_from_u64(0))?);

    let forward = engine.gsw(&x, &y)?;
    let backward = engine.gsw(&y, &x)?;
    assert!((forward - backward).abs() < 1e-12);
    assert!(forward > 0.0);
    assert_eq!(engine.gsw(&x, &x)?, 0.0);
    Ok(())
}

#[test]
fn test_reported_distance_solvers_agree() -> Result<()> {
    let (x, y) = clouds(3, 40);
    let exact = w2(&x, &y, &W2Solver::Exact)?;
    let entropic = w2(
        &x,
        &y,
        &W2Solver::Sinkhorn(SinkhornConfig {
            epsilon: 1e-2,
            max_iterations: 1000,
            tolerance: 1e-9,
        }),
    )?;
    assert!(exact > 0.0);
    assert!((entropic - exact).abs() < 0.1 * exact);
    Ok(())
}
