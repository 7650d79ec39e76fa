use std::fmt;

use axon_core::{Error, Result, Tensor};

// Loss functions
//
// A loss maps (output, target) to a tensor of PER-ELEMENT losses of the
// same shape; the training loop reduces it. `derivative` is the gradient of
// the summed loss w.r.t. the output and seeds back-propagation.
//
//   MeanSquareError          l = 1/2 (o - t)^2              dl/do = o - t
//   CategoricalCrossEntropy  l = -t ln o                     dl/do = -t / o
//   BinaryCrossEntropy       l = -(t ln o + (1-t) ln(1-o))   dl/do = (o - t) / (o (1 - o))
//
// Logarithms and divisions use the output clipped to [EPSILON, 1 - EPSILON].

/// Clip bound for probabilities inside logarithms and divisions.
pub const EPSILON: f32 = 1e-6;

#[inline]
fn clip(o: f32) -> f32 {
    o.clamp(EPSILON, 1.0 - EPSILON)
}

/// Loss function used by a network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Loss {
    #[default]
    MeanSquareError,
    CategoricalCrossEntropy,
    BinaryCrossEntropy,
}

impl Loss {
    fn check(output: &Tensor, target: &Tensor) -> Result<()> {
        if output.shape() != target.shape() {
            return Err(Error::shape_mismatch("loss", output.shape(), target.shape()));
        }
        Ok(())
    }

    /// Per-element loss.
    pub fn compute(&self, output: &Tensor, target: &Tensor) -> Result<Tensor> {
        Self::check(output, target)?;
        match self {
            Loss::MeanSquareError => output.map2(target, |o, t| 0.5 * (o - t) * (o - t)),
            Loss::CategoricalCrossEntropy => output.map2(target, |o, t| -t * clip(o).ln()),
            Loss::BinaryCrossEntropy => output.map2(target, |o, t| {
                let o = clip(o);
                -(t * o.ln() + (1.0 - t) * (1.0 - o).ln())
            }),
        }
    }

    /// Gradient of the loss w.r.t. `output`.
    pub fn derivative(&self, output: &Tensor, target: &Tensor) -> Result<Tensor> {
        Self::check(output, target)?;
        match self {
            Loss::MeanSquareError => output.sub(target),
            Loss::CategoricalCrossEntropy => output.map2(target, |o, t| -t / clip(o)),
            Loss::BinaryCrossEntropy => output.map2(target, |o, t| {
                let o = clip(o);
                (o - t) / (o * (1.0 - o))
            }),
        }
    }
}

impl fmt::Display for Loss {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Loss::MeanSquareError => write!(f, "mse"),
            Loss::CategoricalCrossEntropy => write!(f, "categorical_crossentropy"),
            Loss::BinaryCrossEntropy => write!(f, "binary_crossentropy"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn col(values: &[f32]) -> Tensor {
        Tensor::column(values.to_vec()).unwrap()
    }

    #[test]
    fn test_mse() {
        let out = col(&[1.0, 2.0]);
        let target = col(&[0.0, 4.0]);
        let loss = Loss::MeanSquareError.compute(&out, &target).unwrap();
        assert_eq!(loss.values(), &[0.5, 2.0]);
        let grad = Loss::MeanSquareError.derivative(&out, &target).unwrap();
        assert_eq!(grad.values(), &[1.0, -2.0]);
    }

    #[test]
    fn test_cross_entropy_clips_zero_output() {
        let out = col(&[0.0, 1.0]);
        let target = col(&[1.0, 0.0]);
        let loss = Loss::CategoricalCrossEntropy.compute(&out, &target).unwrap();
        assert!(loss.values().iter().all(|v| v.is_finite()));
        assert_abs_diff_eq!(loss.values()[0], -(EPSILON.ln()), epsilon = 1e-3);
        let grad = Loss::CategoricalCrossEntropy.derivative(&out, &target).unwrap();
        assert!(grad.values().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_losses_match_finite_differences() {
        let out = col(&[0.2, 0.7, 0.4]);
        let target = col(&[0.0, 1.0, 1.0]);
        let h = 1e-3;
        for loss in [
            Loss::MeanSquareError,
            Loss::CategoricalCrossEntropy,
            Loss::BinaryCrossEntropy,
        ] {
            let analytic = loss.derivative(&out, &target).unwrap();
            for i in 0..out.len() {
                let mut plus = out.clone();
                plus.values_mut()[i] += h;
                let mut minus = out.clone();
                minus.values_mut()[i] -= h;
                let numeric = (loss.compute(&plus, &target).unwrap().sum()
                    - loss.compute(&minus, &target).unwrap().sum())
                    / (2.0 * h);
                assert_abs_diff_eq!(numeric, analytic.values()[i], epsilon = 1e-2);
            }
        }
    }

    #[test]
    fn test_shape_mismatch() {
        assert!(Loss::MeanSquareError
            .compute(&col(&[1.0]), &col(&[1.0, 2.0]))
            .is_err());
    }
}
