// NeuralNetwork — an ordered chain of layers plus optimizer and loss
//
// The output of layer i is the input of layer i + 1. Layers are initialised
// as they are added, so every layer knows its shapes before training starts.
//
// One StdRng, seeded at construction, drives weight initialisation and
// per-epoch shuffling; two networks built with the same seed and layers are
// identical.
//
// Each layer owns the optimizer state of its own parameters, so a single
// optimizer value (hyperparameters only) is shared by all layers.

use std::fmt::Write as _;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use axon_core::{bail, Error, Result, Shape, Tensor};
use axon_nn::{Layer, Loss};
use axon_optim::Optimizer;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::checkpoint;

/// A feed-forward network trained with mini-batch gradient descent.
#[derive(Debug)]
pub struct NeuralNetwork {
    pub(crate) name: String,
    pub(crate) input_shape: Shape,
    pub(crate) layers: Vec<Box<dyn Layer>>,
    pub(crate) optimizer: Option<Box<dyn Optimizer>>,
    pub(crate) loss: Loss,
    pub(crate) seed: u64,
    pub(crate) rng: StdRng,
}

impl NeuralNetwork {
    /// Empty network accepting samples of `input_shape` (batch axis ignored).
    pub fn new(name: impl Into<String>, input_shape: impl Into<Shape>, seed: u64) -> Result<Self> {
        let input_shape = input_shape.into().with_batch(1);
        input_shape.validate()?;
        Ok(NeuralNetwork {
            name: name.into(),
            input_shape,
            layers: Vec::new(),
            optimizer: None,
            loss: Loss::default(),
            seed,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Per-sample input shape.
    pub fn input_shape(&self) -> Shape {
        self.input_shape
    }

    /// Per-sample output shape of the last layer (the input shape when empty).
    pub fn output_shape(&self) -> Shape {
        self.layers
            .last()
            .and_then(|l| l.output_shape())
            .unwrap_or(self.input_shape)
    }

    /// Append a layer, initialising it against the current output shape.
    pub fn add_layer<L: Layer + 'static>(&mut self, layer: L) -> Result<&mut Self> {
        let mut layer = Box::new(layer);
        let input = self.output_shape();
        let output = layer.init(input, &mut self.rng)?;
        log::debug!(
            "{}: layer {} {} {input} -> {output}",
            self.name,
            self.layers.len(),
            layer.kind()
        );
        self.layers.push(layer);
        Ok(self)
    }

    /// Set the optimizer and loss used by `fit`.
    pub fn optimize(&mut self, optimizer: impl Optimizer + 'static, loss: Loss) -> Result<()> {
        if self.layers.is_empty() {
            bail!("{}: add layers before calling optimize()", self.name);
        }
        optimizer.validate()?;
        log::debug!("{}: optimizer {optimizer}, loss {loss}", self.name);
        self.optimizer = Some(Box::new(optimizer));
        self.loss = loss;
        Ok(())
    }

    pub fn optimizer(&self) -> Option<&dyn Optimizer> {
        self.optimizer.as_deref()
    }

    pub fn loss(&self) -> Loss {
        self.loss
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn layer(&self, index: usize) -> Option<&dyn Layer> {
        self.layers.get(index).map(|l| &**l)
    }

    pub fn layer_mut(&mut self, index: usize) -> Option<&mut (dyn Layer + 'static)> {
        self.layers.get_mut(index).map(|l| &mut **l)
    }

    /// Total number of scalar weights.
    pub fn parameter_count(&self) -> usize {
        self.layers.iter().map(|l| l.parameter_count()).sum()
    }

    /// Run `input` (any batch count) through every layer.
    pub fn predict(&mut self, input: &Tensor) -> Result<Tensor> {
        if !input.shape().same_sample_dims(&self.input_shape) {
            return Err(Error::shape_mismatch(
                "network input",
                self.input_shape,
                input.shape(),
            ));
        }
        self.forward(input)
    }

    pub(crate) fn forward(&mut self, input: &Tensor) -> Result<Tensor> {
        let Some((first, rest)) = self.layers.split_first_mut() else {
            bail!("{}: network has no layers", self.name);
        };
        let mut x = first.feed_forward(input)?;
        for layer in rest {
            x = layer.feed_forward_owned(x)?;
        }
        Ok(x)
    }

    /// Independent copy: same parameters, optimizer and loss, fresh optimizer
    /// state.
    pub fn clone_network(&self) -> NeuralNetwork {
        NeuralNetwork {
            name: self.name.clone(),
            input_shape: self.input_shape,
            layers: self.layers.iter().map(|l| l.clone_layer()).collect(),
            optimizer: self.optimizer.clone(),
            loss: self.loss,
            seed: self.seed,
            rng: self.rng.clone(),
        }
    }

    /// Overwrite `target`'s parameters with this network's.
    pub fn copy_parameters_to(&self, target: &mut NeuralNetwork) -> Result<()> {
        self.soft_copy_parameters_to(target, 1.0)
    }

    /// `target = tau * self + (1 - tau) * target`, layer by layer.
    pub fn soft_copy_parameters_to(&self, target: &mut NeuralNetwork, tau: f32) -> Result<()> {
        if !(tau > 0.0 && tau <= 1.0) {
            bail!("tau must be in (0, 1], got {tau}");
        }
        if self.layers.len() != target.layers.len() {
            bail!(
                "layer count mismatch: {} has {}, {} has {}",
                self.name,
                self.layers.len(),
                target.name,
                target.layers.len()
            );
        }
        for (src, dst) in self.layers.iter().zip(&target.layers) {
            if src.kind() != dst.kind() || src.output_shape() != dst.output_shape() {
                bail!(
                    "layer mismatch: {} {:?} vs {} {:?}",
                    src.kind(),
                    src.output_shape(),
                    dst.kind(),
                    dst.output_shape()
                );
            }
        }
        for (src, dst) in self.layers.iter().zip(&mut target.layers) {
            src.copy_parameters_to(dst.as_mut(), tau)?;
        }
        Ok(())
    }

    /// Table of layers, output shapes and parameter counts.
    pub fn summary(&self) -> String {
        let rule = "_".repeat(64);
        let mut s = String::new();
        let _ = writeln!(s, "Model: \"{}\"", self.name);
        let _ = writeln!(s, "{rule}");
        let _ = writeln!(s, "{:<28}{:<24}{:>12}", "Layer (type)", "Output Shape", "Param #");
        let _ = writeln!(s, "{}", "=".repeat(64));
        for (i, layer) in self.layers.iter().enumerate() {
            let shape = layer
                .output_shape()
                .map_or_else(|| "?".to_string(), |s| s.to_string());
            let _ = writeln!(
                s,
                "{:<28}{:<24}{:>12}",
                format!("{}_{} ({})", layer.kind().to_lowercase(), i + 1, layer.kind()),
                shape,
                layer.parameter_count()
            );
        }
        let _ = writeln!(s, "{}", "=".repeat(64));
        let _ = writeln!(s, "Total params: {}", self.parameter_count());
        s
    }

    /// Write all layer parameters to `path`.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut w = BufWriter::new(File::create(path.as_ref())?);
        checkpoint::write_network(self, &mut w)?;
        w.flush()?;
        log::debug!("{}: saved checkpoint to {}", self.name, path.as_ref().display());
        Ok(())
    }

    /// Load parameters written by [`save`](Self::save) into this network.
    /// Nothing changes unless the whole file matches the architecture.
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let mut r = BufReader::new(File::open(path.as_ref())?);
        checkpoint::read_network(self, &mut r)?;
        log::debug!("{}: loaded checkpoint from {}", self.name, path.as_ref().display());
        Ok(())
    }
}
