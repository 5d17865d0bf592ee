//! Toy two-dimensional target distributions and the Gaussian source cloud

use std::f64::consts::PI;
use std::str::FromStr;

use ndarray::Array2;
use rand::Rng;
use rand_distr::{Distribution, Normal, StandardNormal};
use serde::{Deserialize, Serialize};

use crate::error::{GswError, Result};
use crate::structs::points::PointSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dataset {
    #[serde(rename = "swiss_roll")]
    SwissRoll,
    #[serde(rename = "half_moons")]
    HalfMoons,
    #[serde(rename = "circle")]
    Circle,
    #[serde(rename = "8gaussians")]
    EightGaussians,
    #[serde(rename = "25gaussians")]
    TwentyFiveGaussians,
}

impl Dataset {
    pub const ALL: [Dataset; 5] = [
        Dataset::SwissRoll,
        Dataset::HalfMoons,
        Dataset::Circle,
        Dataset::EightGaussians,
        Dataset::TwentyFiveGaussians,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Dataset::SwissRoll => "swiss_roll",
            Dataset::HalfMoons => "half_moons",
            Dataset::Circle => "circle",
            Dataset::EightGaussians => "8gaussians",
            Dataset::TwentyFiveGaussians => "25gaussians",
        }
    }

    /// Draw `n_samples` points.
    pub fn sample<R: Rng + ?Sized>(&self, n_samples: usize, rng: &mut R) -> PointSet {
        let mut points = Array2::<f64>::zeros((n_samples, 2));
        for mut row in points.rows_mut() {
            let (a, b) = match self {
                Dataset::SwissRoll => {
                    let t = 1.5 * PI * (1.0 + 2.0 * rng.gen::<f64>());
                    let (na, nb) = noise(rng, 0.25);
                    ((t * t.cos() + na) / 7.5, (t * t.sin() + nb) / 7.5)
                }
                Dataset::HalfMoons => {
                    let theta = PI * rng.gen::<f64>();
                    let (na, nb) = noise(rng, 0.05);
                    let (a, b) = if rng.gen::<bool>() {
                        (theta.cos(), theta.sin())
                    } else {
                        (1.0 - theta.cos(), 0.5 - theta.sin())
                    };
                    (a - 0.5 + na, b - 0.25 + nb)
                }
                Dataset::Circle => {
                    let theta = 2.0 * PI * rng.gen::<f64>();
                    let (na, nb) = noise(rng, 0.01);
                    (theta.cos() + na, theta.sin() + nb)
                }
                Dataset::EightGaussians => {
                    let k = rng.gen_range(0..8) as f64;
                    let angle = k * PI / 4.0;
                    let (na, nb) = noise(rng, 0.02);
                    (
                        (2.0 * angle.cos() + na) / 2.0_f64.sqrt(),
                        (2.0 * angle.sin() + nb) / 2.0_f64.sqrt(),
                    )
                }
                Dataset::TwentyFiveGaussians => {
                    let cx = rng.gen_range(-2..=2) as f64;
                    let cy = rng.gen_range(-2..=2) as f64;
                    let (na, nb) = noise(rng, 0.05);
                    ((cx + na) / 2.828, (cy + nb) / 2.828)
                }
            };
            row[0] = a;
            row[1] = b;
        }
        PointSet::from(points)
    }
}

impl FromStr for Dataset {
    type Err = GswError;

    fn from_str(name: &str) -> Result<Self> {
        Dataset::ALL
            .iter()
            .find(|d| d.name() == name)
            .copied()
            .ok_or_else(|| GswError::InvalidConfiguration(format!("unknown dataset: {}", name)))
    }
}

impl std::fmt::Display for Dataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

fn noise<R: Rng + ?Sized>(rng: &mut R, std: f64) -> (f64, f64) {
    let a: f64 = rng.sample(StandardNormal);
    let b: f64 = rng.sample(StandardNormal);
    (std * a, std * b)
}

/// Sample one of the named toy distributions.
pub fn load_data<R: Rng + ?Sized>(name: &str, n_samples: usize, rng: &mut R) -> Result<PointSet> {
    Ok(Dataset::from_str(name)?.sample(n_samples, rng))
}

/// Isotropic Gaussian cloud `N(0, std² I)` in `dim` dimensions.
pub fn gaussian<R: Rng + ?Sized>(n_samples: usize, dim: usize, std: f64, rng: &mut R) -> Result<PointSet> {
    if !(std > 0.0 && std.is_finite()) {
        return Err(GswError::InvalidConfiguration(format!(
            "gaussian standard deviation must be positive, found {}",
            std
        )));
    }
    let normal = Normal::new(0.0, std)
        .map_err(|e| GswError::InvalidConfiguration(format!("gaussian source: {}", e)))?;
    let points = Array2::from_shape_fn((n_samples, dim), |_| normal.sample(rng));
    Ok(PointSet::from(points))
}
