use axon_core::{bail, Error, ParamId, ParamReader, ParamWriter, Result, Tensor};
use axon_optim::{Optimizer, OptimizerState};

// Parameters — learnable tensors of one layer
//
// A Parameter pairs a value with its gradient accumulator. back_prop adds
// into the accumulator; update() hands each pair to the optimizer and then
// zeroes the accumulator. A ParameterSet also owns the OptimizerState for
// its parameters, so moments are never shared between layers.

/// One learnable tensor and its accumulated gradient.
#[derive(Debug)]
pub struct Parameter {
    name: String,
    id: ParamId,
    value: Tensor,
    gradient: Tensor,
}

impl Parameter {
    pub fn new(name: impl Into<String>, value: Tensor) -> Self {
        let gradient = Tensor::zeros(value.shape());
        Parameter {
            name: name.into(),
            id: ParamId::new(),
            value,
            gradient,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> ParamId {
        self.id
    }

    pub fn value(&self) -> &Tensor {
        &self.value
    }

    pub fn gradient(&self) -> &Tensor {
        &self.gradient
    }

    /// Replace the value; the shape must stay the same.
    pub fn set_value(&mut self, value: Tensor) -> Result<()> {
        if value.shape() != self.value.shape() {
            return Err(Error::shape_mismatch(
                "set parameter",
                self.value.shape(),
                value.shape(),
            ));
        }
        self.value = value;
        Ok(())
    }

    /// Add `gradient` into the accumulator.
    pub fn accumulate(&mut self, gradient: &Tensor) -> Result<()> {
        self.gradient.add_assign(gradient)
    }

    pub fn zero_gradient(&mut self) {
        self.gradient.zero();
    }

    /// Same value under a fresh id with an empty accumulator.
    fn duplicate(&self) -> Parameter {
        Parameter::new(self.name.clone(), self.value.clone())
    }
}

/// The parameters of one layer plus their optimizer state.
#[derive(Debug, Default)]
pub struct ParameterSet {
    params: Vec<Parameter>,
    state: OptimizerState,
}

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a parameter and return its index.
    pub fn push(&mut self, parameter: Parameter) -> usize {
        self.params.push(parameter);
        self.params.len() - 1
    }

    /// Panics if `index` is out of range, like slice indexing.
    pub fn get(&self, index: usize) -> &Parameter {
        &self.params[index]
    }

    pub fn get_mut(&mut self, index: usize) -> &mut Parameter {
        &mut self.params[index]
    }

    pub fn by_name(&self, name: &str) -> Option<&Parameter> {
        self.params.iter().find(|p| p.name == name)
    }

    /// Replace the value of the parameter called `name`.
    pub fn set(&mut self, name: &str, value: Tensor) -> Result<()> {
        match self.params.iter_mut().find(|p| p.name == name) {
            Some(p) => p.set_value(value),
            None => bail!("no parameter named '{name}'"),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.params.iter()
    }

    /// Number of parameter tensors.
    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Number of scalar weights.
    pub fn count(&self) -> usize {
        self.params.iter().map(|p| p.value.len()).sum()
    }

    pub fn optimizer_state(&self) -> &OptimizerState {
        &self.state
    }

    /// One optimizer step for every parameter, then clear the accumulators.
    pub fn update(&mut self, optimizer: &dyn Optimizer, sample_count: usize) -> Result<()> {
        for p in &mut self.params {
            self.state
                .apply(optimizer, p.id, &mut p.value, &p.gradient, sample_count)?;
            p.gradient.zero();
        }
        Ok(())
    }

    /// Independent copy: same values, fresh ids, empty gradients and state.
    pub fn duplicate(&self) -> ParameterSet {
        ParameterSet {
            params: self.params.iter().map(Parameter::duplicate).collect(),
            state: OptimizerState::new(),
        }
    }

    /// `target = tau * self + (1 - tau) * target` for every parameter.
    pub fn blend_into(&self, target: &mut ParameterSet, tau: f32) -> Result<()> {
        if self.params.len() != target.params.len() {
            bail!(
                "parameter count mismatch: {} vs {}",
                self.params.len(),
                target.params.len()
            );
        }
        for (src, dst) in self.params.iter().zip(&mut target.params) {
            if src.value.shape() != dst.value.shape() {
                return Err(Error::shape_mismatch(
                    "copy parameters",
                    src.value.shape(),
                    dst.value.shape(),
                ));
            }
        }
        for (src, dst) in self.params.iter().zip(&mut target.params) {
            if tau == 1.0 {
                dst.value = src.value.clone();
            } else {
                dst.value = src
                    .value
                    .map2(&dst.value, |s, d| tau * s + (1.0 - tau) * d)?;
            }
        }
        Ok(())
    }

    pub fn save(&self, writer: &mut ParamWriter<'_>) -> Result<()> {
        for p in &self.params {
            writer.write_tensor(&p.name, &p.value)?;
        }
        Ok(())
    }

    pub fn load(&mut self, reader: &mut ParamReader<'_>) -> Result<()> {
        for p in &mut self.params {
            p.value = reader.read_tensor(&p.name, p.value.shape())?;
            p.gradient.zero();
        }
        self.state.reset();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axon_optim::Sgd;

    fn set() -> ParameterSet {
        let mut set = ParameterSet::new();
        set.push(Parameter::new("weights", Tensor::filled((2, 2), 1.0)));
        set.push(Parameter::new("bias", Tensor::filled((1, 2), 0.0)));
        set
    }

    #[test]
    fn test_update_applies_and_zeroes() {
        let mut params = set();
        params
            .get_mut(0)
            .accumulate(&Tensor::filled((2, 2), 4.0))
            .unwrap();
        params.update(&Sgd::new(0.5), 2).unwrap();
        assert_eq!(params.get(0).value().values(), &[0.0; 4]);
        assert_eq!(params.get(0).gradient().sum(), 0.0);
        assert_eq!(params.optimizer_state().len(), 2);
    }

    #[test]
    fn test_blend_into() {
        let src = set();
        let mut dst = set();
        dst.set("weights", Tensor::filled((2, 2), 3.0)).unwrap();
        src.blend_into(&mut dst, 0.25).unwrap();
        // 0.25 * 1 + 0.75 * 3
        assert_eq!(dst.get(0).value().values(), &[2.5; 4]);
    }

    #[test]
    fn test_duplicate_gets_fresh_ids() {
        let a = set();
        let b = a.duplicate();
        assert_ne!(a.get(0).id(), b.get(0).id());
        assert_eq!(a.get(0).value(), b.get(0).value());
        assert_eq!(a.count(), 6);
    }

    #[test]
    fn test_set_checks_name_and_shape() {
        let mut params = set();
        assert!(params.set("gamma", Tensor::zeros(1)).is_err());
        assert!(params.set("bias", Tensor::zeros(3)).is_err());
    }
}
