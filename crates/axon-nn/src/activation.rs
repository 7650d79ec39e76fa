use std::fmt;

use axon_core::{Error, Result, Tensor};

// Activation — element-wise (or per-sample) non-linearity of a layer
//
// Layers apply the activation to their pre-activation values in
// feed_forward and chain its derivative in back_prop. The derivative is
// expressed through the FORWARD OUTPUT, which the layer already keeps, so
// the pre-activation tensor never needs to be stored:
//
//   Linear   y = x                    dx = g
//   Sigmoid  y = 1 / (1 + e^-x)       dx = g * y * (1 - y)
//   Tanh     y = tanh(x)              dx = g * (1 - y^2)
//   ReLU     y = max(0, x)            dx = g * [y > 0]
//   ELU(a)   y = x | a(e^x - 1)       dx = g | g * (y + a)
//   Softmax  per batch slice, max-shifted for stability
//            dx_i = y_i * (g_i - sum_j y_j g_j)

/// Activation function applied by Dense and Convolution layers.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Activation {
    #[default]
    Linear,
    Sigmoid,
    Tanh,
    ReLU,
    Elu(f32),
    Softmax,
}

impl Activation {
    pub fn compute(&self, input: &Tensor) -> Tensor {
        match *self {
            Activation::Linear => input.clone(),
            Activation::Sigmoid => input.map(|x| 1.0 / (1.0 + (-x).exp())),
            Activation::Tanh => input.map(f32::tanh),
            Activation::ReLU => input.map(|x| x.max(0.0)),
            Activation::Elu(alpha) => input.map(|x| if x >= 0.0 { x } else { alpha * (x.exp() - 1.0) }),
            Activation::Softmax => softmax(input),
        }
    }

    /// Gradient w.r.t. the activation input, given the forward `output` and
    /// the gradient w.r.t. that output.
    pub fn derivative(&self, output: &Tensor, output_gradient: &Tensor) -> Result<Tensor> {
        match *self {
            Activation::Linear => {
                if output.shape() != output_gradient.shape() {
                    return Err(Error::shape_mismatch(
                        "activation derivative",
                        output.shape(),
                        output_gradient.shape(),
                    ));
                }
                Ok(output_gradient.clone())
            }
            Activation::Sigmoid => output.map2(output_gradient, |y, g| g * y * (1.0 - y)),
            Activation::Tanh => output.map2(output_gradient, |y, g| g * (1.0 - y * y)),
            Activation::ReLU => output.map2(output_gradient, |y, g| if y > 0.0 { g } else { 0.0 }),
            Activation::Elu(alpha) => {
                output.map2(output_gradient, |y, g| if y > 0.0 { g } else { g * (y + alpha) })
            }
            Activation::Softmax => softmax_derivative(output, output_gradient),
        }
    }
}

impl fmt::Display for Activation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Activation::Linear => write!(f, "linear"),
            Activation::Sigmoid => write!(f, "sigmoid"),
            Activation::Tanh => write!(f, "tanh"),
            Activation::ReLU => write!(f, "relu"),
            Activation::Elu(alpha) => write!(f, "elu({alpha})"),
            Activation::Softmax => write!(f, "softmax"),
        }
    }
}

fn softmax(input: &Tensor) -> Tensor {
    let mut out = input.clone();
    let len = input.shape().batch_len();
    for slice in out.values_mut().chunks_mut(len) {
        let max = slice.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let mut sum = 0.0;
        for v in slice.iter_mut() {
            *v = (*v - max).exp();
            sum += *v;
        }
        for v in slice.iter_mut() {
            *v /= sum;
        }
    }
    out
}

fn softmax_derivative(output: &Tensor, output_gradient: &Tensor) -> Result<Tensor> {
    let mut result = output.map2(output_gradient, |y, g| y * g)?;
    let len = output.shape().batch_len();
    let slices = output.values().chunks(len).zip(output_gradient.values().chunks(len));
    for (dst, (y, g)) in result.values_mut().chunks_mut(len).zip(slices) {
        let dot: f32 = y.iter().zip(g).map(|(a, b)| a * b).sum();
        for (d, &yi) in dst.iter_mut().zip(y) {
            *d -= yi * dot;
        }
    }
    Ok(result)
}
