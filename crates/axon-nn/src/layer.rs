use std::fmt;

use axon_core::{bail, Error, ParamReader, ParamWriter, Result, Shape, Tensor};
use axon_optim::Optimizer;
use rand::rngs::StdRng;

use crate::parameter::ParameterSet;

// Layer — the interface every network layer implements
//
// A network is an ordered chain of boxed Layers. The training loop only
// talks to this trait; it never inspects the concrete type.
//
// LIFECYCLE:
//
//   new(..)            hyperparameters only, shapes unknown
//   init(input_shape)  fixes input/output shapes, creates parameters (once)
//   feed_forward(x)    caches x and the output for the next back_prop
//   back_prop(g)       accumulates parameter gradients, returns dL/dx
//   update_parameters  optimizer step on the accumulated gradients
//
// Only the most recent forward pass is cached. back_prop needs a prior
// feed_forward and a gradient shaped like that forward's output.
//
// SHAPES:
//
//   `input_shape` / `output_shape` describe ONE sample (batch = 1). The
//   tensors passed to feed_forward may carry any batch count.

/// Differentiable building block of a network.
pub trait Layer: Send + fmt::Debug {
    /// Type name used in summaries and checkpoints, e.g. `"Dense"`.
    fn kind(&self) -> &'static str;

    /// Fix shapes and create parameters. Returns the per-sample output shape.
    fn init(&mut self, input_shape: Shape, rng: &mut StdRng) -> Result<Shape>;

    /// Per-sample input shape, `None` before `init`.
    fn input_shape(&self) -> Option<Shape>;

    /// Per-sample output shape, `None` before `init`.
    fn output_shape(&self) -> Option<Shape>;

    fn feed_forward(&mut self, input: &Tensor) -> Result<Tensor>;

    fn back_prop(&mut self, output_gradient: &Tensor) -> Result<Tensor>;

    /// `feed_forward` taking ownership of the input, so reshape-only layers
    /// can reuse its buffer. The network chain calls this for every layer
    /// after the first.
    fn feed_forward_owned(&mut self, input: Tensor) -> Result<Tensor> {
        self.feed_forward(&input)
    }

    /// `back_prop` taking ownership of the gradient.
    fn back_prop_owned(&mut self, output_gradient: Tensor) -> Result<Tensor> {
        self.back_prop(&output_gradient)
    }

    /// Deep copy of the parameters (not the cached activations) as a new,
    /// independently trainable layer.
    fn clone_layer(&self) -> Box<dyn Layer>;

    fn parameters(&self) -> Option<&ParameterSet> {
        None
    }

    fn parameters_mut(&mut self) -> Option<&mut ParameterSet> {
        None
    }

    /// Apply `optimizer` to the gradients accumulated since the last update,
    /// averaged over `sample_count`, and reset them.
    fn update_parameters(&mut self, optimizer: &dyn Optimizer, sample_count: usize) -> Result<()> {
        match self.parameters_mut() {
            Some(params) => params.update(optimizer, sample_count),
            None => Ok(()),
        }
    }

    /// Blend `target`'s parameters toward this layer's:
    /// `target = tau * self + (1 - tau) * target`, `tau` in `(0, 1]`.
    fn copy_parameters_to(&self, target: &mut dyn Layer, tau: f32) -> Result<()> {
        if !(tau > 0.0 && tau <= 1.0) {
            bail!("tau must be in (0, 1], got {tau}");
        }
        if self.kind() != target.kind() {
            bail!("cannot copy {} parameters into {}", self.kind(), target.kind());
        }
        match (self.parameters(), target.parameters_mut()) {
            (Some(src), Some(dst)) => src.blend_into(dst, tau),
            (None, None) => Ok(()),
            _ => bail!("{} layers differ in parameter layout", self.kind()),
        }
    }

    /// Number of scalar weights.
    fn parameter_count(&self) -> usize {
        self.parameters().map_or(0, ParameterSet::count)
    }

    fn save_parameters(&self, writer: &mut ParamWriter<'_>) -> Result<()> {
        match self.parameters() {
            Some(params) => params.save(writer),
            None => Ok(()),
        }
    }

    fn load_parameters(&mut self, reader: &mut ParamReader<'_>) -> Result<()> {
        match self.parameters_mut() {
            Some(params) => params.load(reader),
            None => Ok(()),
        }
    }
}

/// Shapes fixed by `init`, shared bookkeeping for every layer.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Shapes {
    io: Option<(Shape, Shape)>,
}

impl Shapes {
    pub(crate) fn set(&mut self, kind: &str, input: Shape, output: Shape) -> Result<Shape> {
        if self.io.is_some() {
            bail!("{kind} layer is already initialized");
        }
        input.validate()?;
        output.validate()?;
        log::debug!("{kind}: {input} -> {output}");
        self.io = Some((input.with_batch(1), output.with_batch(1)));
        Ok(output.with_batch(1))
    }

    pub(crate) fn input(&self) -> Option<Shape> {
        self.io.map(|(i, _)| i)
    }

    pub(crate) fn output(&self) -> Option<Shape> {
        self.io.map(|(_, o)| o)
    }

    /// Both shapes, failing if `init` has not run.
    pub(crate) fn require(&self, kind: &str) -> Result<(Shape, Shape)> {
        self.io
            .ok_or_else(|| Error::config(format!("{kind} layer used before init")))
    }

    /// Check a batched input against the per-sample input shape.
    pub(crate) fn check_input(&self, kind: &'static str, input: &Tensor) -> Result<(Shape, Shape)> {
        let (expected, output) = self.require(kind)?;
        if !input.shape().same_sample_dims(&expected) {
            return Err(Error::shape_mismatch(kind, expected, input.shape()));
        }
        Ok((expected, output))
    }
}

/// The tensors kept from the last feed_forward.
#[derive(Debug, Default)]
pub(crate) struct Cache {
    pub(crate) input: Option<Tensor>,
    pub(crate) output: Option<Tensor>,
}

impl Cache {
    pub(crate) fn store(&mut self, input: Tensor, output: Tensor) {
        self.input = Some(input);
        self.output = Some(output);
    }

    /// The cached (input, output) pair, checked against `gradient`'s shape.
    pub(crate) fn for_backward(&self, kind: &'static str, gradient: &Tensor) -> Result<(&Tensor, &Tensor)> {
        match (&self.input, &self.output) {
            (Some(input), Some(output)) => {
                if gradient.shape() != output.shape() {
                    return Err(Error::shape_mismatch(kind, output.shape(), gradient.shape()));
                }
                Ok((input, output))
            }
            _ => bail!("{kind}: back_prop called without a prior feed_forward"),
        }
    }
}
