use axon_core::{Error, PaddingType, Result, Shape, Tensor};
use rand::rngs::StdRng;

use crate::activation::Activation;
use crate::init::Init;
use crate::layer::{Cache, Layer, Shapes};
use crate::parameter::{Parameter, ParameterSet};

// Convolution — 2-D convolution layer
//
// kernels: (filter_size, filter_size, input_depth, filters)
//
//   forward:  y  = act(conv2d(x, K))
//   backward: d  = act'(y) * g
//             dK += conv2d_kernels_gradient(x, d)   (summed over the batch)
//             dx  = conv2d_input_gradient(d, K)
//
// Output width/height follow the padding rule of PaddingType; the output
// depth is the number of filters.

/// A 2-D convolution layer without bias.
#[derive(Debug)]
pub struct Convolution {
    filter_size: usize,
    filters: usize,
    stride: usize,
    padding: PaddingType,
    activation: Activation,
    init: Init,
    shapes: Shapes,
    params: ParameterSet,
    cache: Cache,
}

impl Convolution {
    pub fn new(filter_size: usize, filters: usize, stride: usize, activation: Activation) -> Self {
        Convolution {
            filter_size,
            filters,
            stride,
            padding: PaddingType::Valid,
            activation,
            init: Init::default(),
            shapes: Shapes::default(),
            params: ParameterSet::new(),
            cache: Cache::default(),
        }
    }

    pub fn with_padding(mut self, padding: PaddingType) -> Self {
        self.padding = padding;
        self
    }

    pub fn with_init(mut self, init: Init) -> Self {
        self.init = init;
        self
    }

    /// Kernel tensor `(f, f, input_depth, filters)`, `None` before `init`.
    pub fn kernels(&self) -> Option<&Tensor> {
        self.params.by_name("kernels").map(Parameter::value)
    }
}

impl Layer for Convolution {
    fn kind(&self) -> &'static str {
        "Convolution"
    }

    fn init(&mut self, input_shape: Shape, rng: &mut StdRng) -> Result<Shape> {
        if self.filters == 0 {
            return Err(Error::config("Convolution needs at least one filter"));
        }
        self.init.validate()?;
        let f = self.filter_size;
        let pad = self.padding.params(
            input_shape.width(),
            input_shape.height(),
            f,
            f,
            self.stride,
        )?;
        let output = Shape::new(pad.out_width, pad.out_height, self.filters, 1);
        let output = self.shapes.set(self.kind(), input_shape, output)?;

        let kernel_shape = Shape::new(f, f, input_shape.depth(), self.filters);
        let fan_in = f * f * input_shape.depth();
        let fan_out = f * f * self.filters;
        let kernels = self.init.fill(kernel_shape, fan_in, fan_out, rng);
        self.params.push(Parameter::new("kernels", kernels));
        Ok(output)
    }

    fn input_shape(&self) -> Option<Shape> {
        self.shapes.input()
    }

    fn output_shape(&self) -> Option<Shape> {
        self.shapes.output()
    }

    fn feed_forward(&mut self, input: &Tensor) -> Result<Tensor> {
        self.shapes.check_input("Convolution", input)?;
        let z = input.conv2d(self.params.get(0).value(), self.stride, self.padding)?;
        let y = self.activation.compute(&z);
        self.cache.store(input.clone(), y.clone());
        Ok(y)
    }

    fn back_prop(&mut self, output_gradient: &Tensor) -> Result<Tensor> {
        let (x, y) = self.cache.for_backward("Convolution", output_gradient)?;
        let delta = self.activation.derivative(y, output_gradient)?;
        let f = self.filter_size;

        let kernels_grad =
            Tensor::conv2d_kernels_gradient(x, &delta, self.stride, self.padding, f, f)?;
        let input_grad = Tensor::conv2d_input_gradient(
            &delta,
            self.params.get(0).value(),
            self.stride,
            self.padding,
            x.shape(),
        )?;
        self.params.get_mut(0).accumulate(&kernels_grad)?;
        Ok(input_grad)
    }

    fn clone_layer(&self) -> Box<dyn Layer> {
        Box::new(Convolution {
            filter_size: self.filter_size,
            filters: self.filters,
            stride: self.stride,
            padding: self.padding,
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
