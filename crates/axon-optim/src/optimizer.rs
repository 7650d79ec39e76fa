use std::collections::HashMap;
use std::fmt;

use axon_core::{bail, ParamId, Result, Shape, Tensor};

// Optimizer — the parameter update rule
//
// An Optimizer is a stateless rule: given the running state of ONE parameter
// and that parameter's averaged gradient, it returns the delta to subtract.
// The running state (moments, step counter) lives in an OptimizerState owned
// by the layer that owns the parameter, keyed by ParamId. Two layers sharing
// one optimizer therefore never share moments.
//
// UPDATE SEQUENCE (OptimizerState::apply):
//
//   1. g   = accumulated_gradient / sample_count
//   2. step counter of the slot += 1
//   3. d   = optimizer.delta(slot, g)
//   4. param -= d
//
// Zeroing the accumulated gradient afterwards is the layer's job.

/// A gradient-based update rule.
pub trait Optimizer: Send + Sync + fmt::Debug + fmt::Display {
    /// The amount to subtract from a parameter, given its averaged gradient.
    /// `state.step()` has already been advanced for this update.
    fn delta(&self, state: &mut ParamState, gradient: &Tensor) -> Result<Tensor>;

    fn learning_rate(&self) -> f32;

    /// Reject out-of-range hyperparameters.
    fn validate(&self) -> Result<()> {
        Ok(())
    }

    fn box_clone(&self) -> Box<dyn Optimizer>;
}

impl Clone for Box<dyn Optimizer> {
    fn clone(&self) -> Self {
        self.box_clone()
    }
}

/// Running state of one parameter tensor.
#[derive(Debug, Clone, Default)]
pub struct ParamState {
    step: u64,
    moments: Vec<Tensor>,
}

impl ParamState {
    /// Number of updates applied so far, including the current one.
    pub fn step(&self) -> u64 {
        self.step
    }

    /// Moment buffer `index`, created as zeros of `shape` on first access.
    pub fn moment(&mut self, index: usize, shape: Shape) -> &mut Tensor {
        while self.moments.len() <= index {
            self.moments.push(Tensor::zeros(shape));
        }
        &mut self.moments[index]
    }

    pub fn moments(&self) -> &[Tensor] {
        &self.moments
    }
}

/// Per-parameter optimizer state owned by a single layer.
#[derive(Debug, Clone, Default)]
pub struct OptimizerState {
    slots: HashMap<ParamId, ParamState>,
}

impl OptimizerState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one update to `value` from its accumulated `gradient`.
    pub fn apply(
        &mut self,
        optimizer: &dyn Optimizer,
        id: ParamId,
        value: &mut Tensor,
        gradient: &Tensor,
        sample_count: usize,
    ) -> Result<()> {
        if sample_count == 0 {
            bail!("sample_count must be positive");
        }
        let averaged = gradient.div_scalar(sample_count as f32);
        let slot = self.slots.entry(id).or_default();
        slot.step += 1;
        let delta = optimizer.delta(slot, &averaged)?;
        value.sub_assign(&delta)
    }

    pub fn slot(&self, id: ParamId) -> Option<&ParamState> {
        self.slots.get(&id)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Forget all moments and step counters.
    pub fn reset(&mut self) {
        self.slots.clear();
    }
}
