// Data — paired (input, target) samples and batching
//
// A Data value holds one sample (batch 1) or a merged batch (batch N) of
// inputs together with the matching targets. Merging stacks samples along
// the batch axis; shuffling permutes the sample list in place.

use axon_core::{bail, Error, Result, Tensor};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

/// An input tensor and its target tensor with equal batch counts.
#[derive(Debug, Clone, PartialEq)]
pub struct Data {
    pub input: Tensor,
    pub output: Tensor,
}

impl Data {
    /// Pair an input with its target. Fails when the batch counts differ.
    pub fn new(input: Tensor, output: Tensor) -> Result<Self> {
        if input.batch() != output.batch() {
            return Err(Error::shape_mismatch("Data", input.shape(), output.shape()));
        }
        Ok(Data { input, output })
    }

    /// Number of samples in this pair.
    pub fn batch(&self) -> usize {
        self.input.batch()
    }
}

/// Check that every sample in the list has the same per-sample input and
/// target dimensions as the first one.
pub fn validate_samples(samples: &[Data]) -> Result<()> {
    let Some(first) = samples.first() else {
        bail!("empty sample list");
    };
    for sample in &samples[1..] {
        if !sample.input.shape().same_sample_dims(&first.input.shape()) {
            return Err(Error::shape_mismatch(
                "sample input",
                first.input.shape(),
                sample.input.shape(),
            ));
        }
        if !sample.output.shape().same_sample_dims(&first.output.shape()) {
            return Err(Error::shape_mismatch(
                "sample output",
                first.output.shape(),
                sample.output.shape(),
            ));
        }
        if sample.input.batch() != sample.output.batch() {
            return Err(Error::shape_mismatch(
                "Data",
                sample.input.shape(),
                sample.output.shape(),
            ));
        }
    }
    Ok(())
}

/// Stack samples into batches of `batch_size` along the batch axis.
///
/// `None` merges everything into a single batch. When the sample count is not
/// a multiple of `batch_size` the last batch holds the remainder.
pub fn merge_data(samples: &[Data], batch_size: Option<usize>) -> Result<Vec<Data>> {
    validate_samples(samples)?;
    let batch_size = batch_size.unwrap_or(samples.len());
    if batch_size == 0 {
        bail!("batch size must be positive");
    }

    samples
        .chunks(batch_size)
        .map(|chunk| {
            let inputs: Vec<Tensor> = chunk.iter().map(|d| d.input.clone()).collect();
            let outputs: Vec<Tensor> = chunk.iter().map(|d| d.output.clone()).collect();
            Data::new(Tensor::merge(&inputs)?, Tensor::merge(&outputs)?)
        })
        .collect()
}

/// Uniform in-place permutation (Fisher–Yates) driven by the given RNG.
pub fn shuffle(samples: &mut [Data], rng: &mut StdRng) {
    samples.shuffle(rng);
}

#[cfg(test)]
mod tests {
    use super::*;
    use axon_core::Shape;

    fn sample(value: f32) -> Data {
        Data::new(Tensor::filled((1, 2), value), Tensor::filled((1, 1), value)).unwrap()
    }

    #[test]
    fn test_new_rejects_batch_mismatch() {
        let r = Data::new(Tensor::zeros((1, 2, 1, 3)), Tensor::zeros((1, 1, 1, 2)));
        assert!(r.is_err());
    }

    #[test]
    fn test_merge_with_remainder() {
        let samples: Vec<Data> = (0..5).map(|i| sample(i as f32)).collect();
        let batches = merge_data(&samples, Some(2)).unwrap();
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0].batch(), 2);
        assert_eq!(batches[2].batch(), 1);
        assert_eq!(batches[1].input.values(), &[2.0, 2.0, 3.0, 3.0]);
        assert_eq!(batches[2].output.values(), &[4.0]);
    }

    #[test]
    fn test_merge_everything() {
        let samples: Vec<Data> = (0..4).map(|i| sample(i as f32)).collect();
        let batches = merge_data(&samples, None).unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].input.shape(), Shape::new(1, 2, 1, 4));
    }

    #[test]
    fn test_merge_rejects_mixed_shapes() {
        let odd = Data::new(Tensor::zeros((1, 3)), Tensor::zeros((1, 1))).unwrap();
        assert!(merge_data(&[sample(0.0), odd], Some(2)).is_err());
        assert!(merge_data(&[], Some(2)).is_err());
        assert!(merge_data(&[sample(0.0)], Some(0)).is_err());
    }
}
