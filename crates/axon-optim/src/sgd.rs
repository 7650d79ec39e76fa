use std::fmt;

use axon_core::{bail, Result, Tensor};

use crate::optimizer::{Optimizer, ParamState};

/// Stochastic Gradient Descent with optional momentum.
///
/// Without momentum: `delta = lr * g`.
/// With momentum `mu`: `v = mu * v + lr * g`, `delta = v`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sgd {
    learning_rate: f32,
    momentum: f32,
}

impl Default for Sgd {
    fn default() -> Self {
        Sgd::new(0.02)
    }
}

impl Sgd {
    pub fn new(learning_rate: f32) -> Self {
        Sgd {
            learning_rate,
            momentum: 0.0,
        }
    }

    /// Builder-style momentum setter, `0 <= momentum < 1`.
    pub fn with_momentum(mut self, momentum: f32) -> Self {
        self.momentum = momentum;
        self
    }

    pub fn momentum(&self) -> f32 {
        self.momentum
    }
}

impl Optimizer for Sgd {
    fn delta(&self, state: &mut ParamState, gradient: &Tensor) -> Result<Tensor> {
        let step = gradient.mul_scalar(self.learning_rate);
        if self.momentum == 0.0 {
            return Ok(step);
        }
        let velocity = state.moment(0, gradient.shape());
        velocity.scale_assign(self.momentum);
        velocity.add_assign(&step)?;
        Ok(velocity.clone())
    }

    fn learning_rate(&self) -> f32 {
        self.learning_rate
    }

    fn validate(&self) -> Result<()> {
        if !self.learning_rate.is_finite() || self.learning_rate < 0.0 {
            bail!("SGD learning rate must be finite and >= 0, got {}", self.learning_rate);
        }
        if !(0.0..1.0).contains(&self.momentum) {
            bail!("SGD momentum must be in [0, 1), got {}", self.momentum);
        }
        Ok(())
    }

    fn box_clone(&self) -> Box<dyn Optimizer> {
        Box::new(*self)
    }
}

impl fmt::Display for Sgd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.momentum == 0.0 {
            write!(f, "SGD(lr={})", self.learning_rate)
        } else {
            write!(f, "SGD(lr={}, momentum={})", self.learning_rate, self.momentum)
        }
    }
}
