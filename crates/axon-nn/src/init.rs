// Weight initialization
//
// Initializers fill a parameter tensor from the network's seeded RNG, so a
// given seed always produces the same starting weights.
//
//   Init::GlorotUniform   U(-a, a),  a = sqrt(6 / (fan_in + fan_out))
//   Init::GlorotNormal    N(0, s),   s = sqrt(2 / (fan_in + fan_out))
//   Init::HeNormal        N(0, s),   s = sqrt(2 / fan_in)       (ReLU layers)
//   Init::Uniform(lo, hi) U(lo, hi)
//   Init::Constant(v)     all elements = v
//   Init::Zeros

use axon_core::{bail, Result, Shape, Tensor};
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};

/// Strategy for filling a freshly created parameter.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Init {
    #[default]
    GlorotUniform,
    GlorotNormal,
    HeNormal,
    Uniform(f32, f32),
    Constant(f32),
    Zeros,
}

impl Init {
    /// Fails for a uniform range that is not finite or has `low > high`.
    pub fn validate(&self) -> Result<()> {
        match *self {
            Init::Uniform(low, high) if !(low.is_finite() && high.is_finite() && low <= high) => {
                bail!("uniform init needs finite low <= high, got ({low}, {high})")
            }
            Init::Constant(value) if !value.is_finite() => {
                bail!("constant init needs a finite value, got {value}")
            }
            _ => Ok(()),
        }
    }

    /// Create a tensor of `shape` for a parameter with the given fan sizes.
    pub fn fill(&self, shape: Shape, fan_in: usize, fan_out: usize, rng: &mut StdRng) -> Tensor {
        let (fan_in, fan_out) = (fan_in.max(1) as f32, fan_out.max(1) as f32);
        match *self {
            Init::GlorotUniform => {
                let a = (6.0 / (fan_in + fan_out)).sqrt();
                Tensor::rand(shape, -a, a, rng).unwrap_or_else(|_| Tensor::zeros(shape))
            }
            Init::GlorotNormal => normal(shape, (2.0 / (fan_in + fan_out)).sqrt(), rng),
            Init::HeNormal => normal(shape, (2.0 / fan_in).sqrt(), rng),
            // a rejected range (see validate) degenerates to a constant fill
            Init::Uniform(low, high) => {
                Tensor::rand(shape, low, high, rng).unwrap_or_else(|_| Tensor::filled(shape, low))
            }
            Init::Constant(value) => Tensor::filled(shape, value),
            Init::Zeros => Tensor::zeros(shape),
        }
    }
}

fn normal(shape: Shape, std: f32, rng: &mut StdRng) -> Tensor {
    match Normal::new(0.0f32, std) {
        Ok(dist) => {
            let mut t = Tensor::zeros(shape);
            for v in t.values_mut() {
                *v = dist.sample(rng);
            }
            t
        }
        // only reachable for a non-finite std
        Err(_) => Tensor::zeros(shape),
    }
}
