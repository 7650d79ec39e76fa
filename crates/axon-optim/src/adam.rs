use std::fmt;

use axon_core::{bail, Result, Tensor};

use crate::optimizer::{Optimizer, ParamState};

/// Adam: adaptive moment estimation with bias correction.
///
/// ```text
/// m  = b1 * m + (1 - b1) * g
/// v  = b2 * v + (1 - b2) * g^2
/// m^ = m / (1 - b1^t)
/// v^ = v / (1 - b2^t)
/// delta = lr * m^ / (sqrt(v^) + eps)
/// ```
///
/// `t` is the per-parameter step counter, so a layer added late starts its
/// own bias correction from 1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Adam {
    learning_rate: f32,
    beta1: f32,
    beta2: f32,
    epsilon: f32,
}

impl Default for Adam {
    fn default() -> Self {
        Adam::new(0.001)
    }
}

impl Adam {
    pub fn new(learning_rate: f32) -> Self {
        Adam {
            learning_rate,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-8,
        }
    }

    pub fn with_betas(mut self, beta1: f32, beta2: f32) -> Self {
        self.beta1 = beta1;
        self.beta2 = beta2;
        self
    }

    pub fn with_epsilon(mut self, epsilon: f32) -> Self {
        self.epsilon = epsilon;
        self
    }
}

impl Optimizer for Adam {
    fn delta(&self, state: &mut ParamState, gradient: &Tensor) -> Result<Tensor> {
        let t = state.step().min(i32::MAX as u64) as i32;
        let (b1, b2) = (self.beta1, self.beta2);

        let m = state.moment(0, gradient.shape());
        *m = m.map2(gradient, |m, g| b1 * m + (1.0 - b1) * g)?;
        let m_hat = m.div_scalar(1.0 - b1.powi(t));

        let v = state.moment(1, gradient.shape());
        *v = v.map2(gradient, |v, g| b2 * v + (1.0 - b2) * g * g)?;
        let v_hat = v.div_scalar(1.0 - b2.powi(t));

        let (lr, eps) = (self.learning_rate, self.epsilon);
        m_hat.map2(&v_hat, |m, v| lr * m / (v.sqrt() + eps))
    }

    fn learning_rate(&self) -> f32 {
        self.learning_rate
    }

    fn validate(&self) -> Result<()> {
        if !self.learning_rate.is_finite() || self.learning_rate < 0.0 {
            bail!("Adam learning rate must be finite and >= 0, got {}", self.learning_rate);
        }
        for (name, beta) in [("beta1", self.beta1), ("beta2", self.beta2)] {
            if !(0.0..1.0).contains(&beta) {
                bail!("Adam {name} must be in [0, 1), got {beta}");
            }
        }
        if self.epsilon <= 0.0 {
            bail!("Adam epsilon must be positive, got {}", self.epsilon);
        }
        Ok(())
    }

    fn box_clone(&self) -> Box<dyn Optimizer> {
        Box::new(*self)
    }
}

impl fmt::Display for Adam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Adam(lr={})", self.learning_rate)
    }
}
