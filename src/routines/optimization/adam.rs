//! First-order optimizers for the projector parameters and the point positions
//!
//! Both optimizers minimize: a caller that wants gradient ascent hands in the
//! negated gradient. Optimizer state lives as long as the optimizer value, so
//! keeping one optimizer per projector gives warm-started updates across calls.

use crate::error::{GswError, Result};

/// Optimizer trait for parameter updates
pub trait Optimizer: Send + Sync + std::fmt::Debug {
    /// Update `params` in place using `gradients`.
    fn step(&mut self, params: &mut [f64], gradients: &[f64]) -> Result<()>;

    /// Reset the accumulated state
    fn reset(&mut self);

    fn learning_rate(&self) -> f64;

    fn set_learning_rate(&mut self, lr: f64);
}

fn check_lengths(params: &[f64], gradients: &[f64]) -> Result<()> {
    if params.len() != gradients.len() {
        return Err(GswError::ParameterLength {
            expected: params.len(),
            found: gradients.len(),
        });
    }
    Ok(())
}

/// Plain gradient descent
#[derive(Debug, Clone)]
pub struct Sgd {
    lr: f64,
}

impl Sgd {
    pub fn new(lr: f64) -> Self {
        Self { lr }
    }
}

impl Optimizer for Sgd {
    fn step(&mut self, params: &mut [f64], gradients: &[f64]) -> Result<()> {
        check_lengths(params, gradients)?;
        for (p, g) in params.iter_mut().zip(gradients) {
            *p -= self.lr * g;
        }
        Ok(())
    }

    fn reset(&mut self) {}

    fn learning_rate(&self) -> f64 {
        self.lr
    }

    fn set_learning_rate(&mut self, lr: f64) {
        self.lr = lr;
    }
}

/// Adam optimizer with bias correction
///
/// The moment buffers are sized lazily on the first step, and are
/// re-zeroed if the parameter count ever changes.
#[derive(Debug, Clone)]
pub struct Adam {
    lr: f64,
    beta1: f64,
    beta2: f64,
    epsilon: f64,
    m: Vec<f64>,
    v: Vec<f64>,
    t: i32,
}

impl Adam {
    pub fn new(lr: f64) -> Self {
        Self {
            lr,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-8,
            m: Vec::new(),
            v: Vec::new(),
            t: 0,
        }
    }

    pub fn with_betas(mut self, beta1: f64, beta2: f64) -> Self {
        self.beta1 = beta1;
        self.beta2 = beta2;
        self
    }

    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    /// Number of steps taken since construction or the last reset
    pub fn steps(&self) -> i32 {
        self.t
    }
}

impl Optimizer for Adam {
    fn step(&mut self, params: &mut [f64], gradients: &[f64]) -> Result<()> {
        check_lengths(params, gradients)?;
        if self.m.len() != params.len() {
            self.m = vec![0.0; params.len()];
            self.v = vec![0.0; params.len()];
            self.t = 0;
        }

        self.t = self.t.saturating_add(1);
        let bias_correction1 = 1.0 - self.beta1.powi(self.t);
        let bias_correction2 = 1.0 - self.beta2.powi(self.t);

        for i in 0..params.len() {
            let g = gradients[i];

            self.m[i] = self.beta1 * self.m[i] + (1.0 - self.beta1) * g;
            self.v[i] = self.beta2 * self.v[i] + (1.0 - self.beta2) * g * g;

            let m_hat = self.m[i] / bias_correction1;
            let v_hat = self.v[i] / bias_correction2;

            params[i] -= self.lr * m_hat / (v_hat.sqrt() + self.epsilon);
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.m.clear();
        self.v.clear();
        self.t = 0;
    }

    fn learning_rate(&self) -> f64 {
        self.lr
    }

    fn set_learning_rate(&mut self, lr: f64) {
        self.lr = lr;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sgd_step() {
        let mut sgd = Sgd::new(0.5);
        let mut params = vec![1.0, -1.0];
        sgd.step(&mut params, &[2.0, -2.0]).unwrap();
        assert_eq!(params, vec![0.0, 0.0]);
    }

    #[test]
    fn test_adam_first_step_is_lr_sized() {
        // With bias correction the first update is lr * g / |g|
        let mut adam = Adam::new(0.1);
        let mut params = vec![0.0, 0.0, 0.0];
        adam.step(&mut params, &[3.0, -0.5, 0.0]).unwrap();
        assert!((params[0] + 0.1).abs() < 1e-6);
        assert!((params[1] - 0.1).abs() < 1e-6);
        assert_eq!(params[2], 0.0);
        assert_eq!(adam.steps(), 1);
    }

    #[test]
    fn test_adam_minimizes_quadratic() {
        let mut adam = Adam::new(0.05);
        let mut x = vec![3.0];
        for _ in 0..2000 {
            let grad = vec![2.0 * (x[0] - 1.0)];
            adam.step(&mut x, &grad).unwrap();
        }
        assert!((x[0] - 1.0).abs() < 1e-2);
    }

    #[test]
    fn test_adam_reset_and_length_check() {
        let mut adam = Adam::new(0.1);
        let mut params = vec![0.0];
        adam.step(&mut params, &[1.0]).unwrap();
        adam.reset();
        assert_eq!(adam.steps(), 0);
        assert!(adam.step(&mut params, &[1.0, 2.0]).is_err());
    }
}
