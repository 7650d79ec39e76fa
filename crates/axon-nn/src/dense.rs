use axon_core::{Result, Shape, Tensor};
use rand::rngs::StdRng;

use crate::activation::Activation;
use crate::init::Init;
use crate::layer::{Cache, Layer, Shapes};
use crate::parameter::{Parameter, ParameterSet};

// Dense — fully-connected layer
//
// Samples are column vectors: an input of N features is (1, N, 1, batch).
// Inputs of any other per-sample shape are read as that column (same
// element order), so Dense can follow a Pooling or Convolution layer
// directly.
//
// PARAMETER SHAPES:
//
//   weights: (inputs, outputs, 1, 1)   width = inputs, height = outputs
//   bias:    (1, outputs, 1, 1)
//
// COMPUTATION (per batch slice, weights broadcast over the batch):
//
//   forward:  y  = act(W x + b)
//   backward: d  = act'(y) * g
//             dW += sum_n d_n x_n^T
//             db += sum_n d_n
//             dx  = W^T d

const WEIGHTS: usize = 0;
const BIAS: usize = 1;

/// A fully-connected layer.
#[derive(Debug)]
pub struct Dense {
    outputs: usize,
    activation: Activation,
    init: Init,
    shapes: Shapes,
    params: ParameterSet,
    cache: Cache,
}

impl Dense {
    pub fn new(outputs: usize, activation: Activation) -> Self {
        Dense {
            outputs,
            activation,
            init: Init::default(),
            shapes: Shapes::default(),
            params: ParameterSet::new(),
            cache: Cache::default(),
        }
    }

    /// Builder-style weight initializer (default: Glorot uniform).
    pub fn with_init(mut self, init: Init) -> Self {
        self.init = init;
        self
    }

    pub fn activation(&self) -> Activation {
        self.activation
    }

    /// Weight matrix, `None` before `init`.
    pub fn weights(&self) -> Option<&Tensor> {
        self.params.by_name("weights").map(Parameter::value)
    }

    /// Bias column, `None` before `init`.
    pub fn bias(&self) -> Option<&Tensor> {
        self.params.by_name("bias").map(Parameter::value)
    }

    fn column(input: &Tensor) -> Result<Tensor> {
        let features = input.shape().batch_len();
        input.reshaped((1, features, 1, input.batch()))
    }
}

impl Layer for Dense {
    fn kind(&self) -> &'static str {
        "Dense"
    }

    fn init(&mut self, input_shape: Shape, rng: &mut StdRng) -> Result<Shape> {
        self.init.validate()?;
        let inputs = input_shape.batch_len();
        let output = self
            .shapes
            .set(self.kind(), input_shape, Shape::new(1, self.outputs, 1, 1))?;

        let weights = self
            .init
            .fill(Shape::new(inputs, self.outputs, 1, 1), inputs, self.outputs, rng);
        self.params.push(Parameter::new("weights", weights));
        self.params
            .push(Parameter::new("bias", Tensor::zeros((1, self.outputs))));
        Ok(output)
    }

    fn input_shape(&self) -> Option<Shape> {
        self.shapes.input()
    }

    fn output_shape(&self) -> Option<Shape> {
        self.shapes.output()
    }

    fn feed_forward(&mut self, input: &Tensor) -> Result<Tensor> {
        self.shapes.check_input("Dense", input)?;
        let x = Self::column(input)?;
        let z = self
            .params
            .get(WEIGHTS)
            .value()
            .mul(&x)?
            .add(self.params.get(BIAS).value())?;
        let y = self.activation.compute(&z);
        // cached as a column; back_prop restores the input shape
        self.cache.store(x, y.clone());
        Ok(y)
    }

    fn back_prop(&mut self, output_gradient: &Tensor) -> Result<Tensor> {
        let (input_shape, _) = self.shapes.require("Dense")?;
        let (x, y) = self.cache.for_backward("Dense", output_gradient)?;
        let delta = self.activation.derivative(y, output_gradient)?;

        let weights_grad = delta.mul(&x.transposed())?.sum_batches();
        let bias_grad = delta.sum_batches();
        let input_grad = self.params.get(WEIGHTS).value().transposed().mul(&delta)?;
        let batch = x.batch();

        self.params.get_mut(WEIGHTS).accumulate(&weights_grad)?;
        self.params.get_mut(BIAS).accumulate(&bias_grad)?;
        input_grad.into_reshaped(input_shape.with_batch(batch))
    }

    fn clone_layer(&self) -> Box<dyn Layer> {
        Box::new(Dense {
            outputs: self.outputs,
            activation: self.activation,
            init: self.init,
            shapes: self.shapes,
            params: self.params.duplicate(),
            cache: Cache::default(),
        })
    }

    fn parameters(&self) -> Option<&ParameterSet> {
        Some(&self.params)
    }

    fn parameters_mut(&mut self) -> Option<&mut ParameterSet> {
        Some(&mut self.params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn dense(inputs: usize, outputs: usize, act: Activation) -> Dense {
        let mut layer = Dense::new(outputs, act);
        layer
            .init(Shape::new(1, inputs, 1, 1), &mut StdRng::seed_from_u64(1))
            .unwrap();
        layer
    }

    #[test]
    fn test_shapes() {
        let layer = dense(3, 2, Activation::Linear);
        assert_eq!(layer.output_shape(), Some(Shape::new(1, 2, 1, 1)));
        assert_eq!(layer.weights().unwrap().shape(), Shape::new(3, 2, 1, 1));
        assert_eq!(layer.bias().unwrap().shape(), Shape::new(1, 2, 1, 1));
        assert_eq!(layer.parameter_count(), 8);
    }

    #[test]
    fn test_forward_known_weights() {
        let mut layer = dense(2, 2, Activation::Linear);
        let params = layer.parameters_mut().unwrap();
        params
            .set("weights", Tensor::from_vec(vec![1.0, 2.0, 3.0, 4.0], (2, 2)).unwrap())
            .unwrap();
        params
            .set("bias", Tensor::from_vec(vec![0.5, -0.5], (1, 2)).unwrap())
            .unwrap();

        let x = Tensor::from_vec(vec![1.0, 1.0, 0.0, 2.0], (1, 2, 1, 2)).unwrap();
        let y = layer.feed_forward(&x).unwrap();
        assert_eq!(y.shape(), Shape::new(1, 2, 1, 2));
        assert_eq!(y.values(), &[3.5, 6.5, 4.5, 7.5]);
    }

    #[test]
    fn test_accessors_before_init() {
        let layer = Dense::new(2, Activation::Linear);
        assert!(layer.weights().is_none());
        assert!(layer.bias().is_none());
    }

    #[test]
    fn test_invalid_init_range_fails() {
        let mut layer = Dense::new(2, Activation::Linear).with_init(Init::Uniform(1.0, -1.0));
        let err = layer.init(Shape::new(1, 2, 1, 1), &mut StdRng::seed_from_u64(0));
        assert!(err.is_err());
        assert!(layer.output_shape().is_none());
    }

    #[test]
    fn test_back_prop_before_forward_fails() {
        let mut layer = dense(2, 2, Activation::Sigmoid);
        assert!(layer.back_prop(&Tensor::zeros((1, 2))).is_err());
    }

    #[test]
    fn test_back_prop_rejects_wrong_gradient_shape() {
        let mut layer = dense(2, 3, Activation::Sigmoid);
        layer.feed_forward(&Tensor::zeros((1, 2))).unwrap();
        assert!(layer.back_prop(&Tensor::zeros((1, 2))).is_err());
    }

    #[test]
    fn test_init_twice_fails() {
        let mut layer = dense(2, 2, Activation::Linear);
        assert!(layer
            .init(Shape::new(1, 2, 1, 1), &mut StdRng::seed_from_u64(0))
            .is_err());
    }

    #[test]
    fn test_feed_forward_rejects_wrong_input() {
        let mut layer = dense(3, 2, Activation::Linear);
        assert!(layer.feed_forward(&Tensor::zeros((1, 4))).is_err());
    }
}
