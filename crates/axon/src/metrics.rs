// Metrics — per-epoch error/accuracy reporting and accuracy functions
//
// The training loop pushes (epoch, value, kind) tuples into a MetricSink.
// Sinks are purely observational: nothing flows back into training.

use std::fmt;

use axon_core::Tensor;

/// Which series a metric value belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricKind {
    TrainError,
    TestError,
    TrainAccuracy,
    TestAccuracy,
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MetricKind::TrainError => "train_error",
            MetricKind::TestError => "test_error",
            MetricKind::TrainAccuracy => "train_accuracy",
            MetricKind::TestAccuracy => "test_accuracy",
        };
        f.write_str(s)
    }
}

/// Receiver for metric values produced during training.
pub trait MetricSink {
    fn record(&mut self, epoch: usize, value: f32, kind: MetricKind);
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl MetricSink for NullSink {
    fn record(&mut self, _epoch: usize, _value: f32, _kind: MetricKind) {}
}

/// Keeps every recorded value in memory.
#[derive(Debug, Default, Clone)]
pub struct MetricHistory {
    entries: Vec<(usize, f32, MetricKind)>,
}

impl MetricHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[(usize, f32, MetricKind)] {
        &self.entries
    }

    /// `(epoch, value)` pairs of one series, in recording order.
    pub fn series(&self, kind: MetricKind) -> Vec<(usize, f32)> {
        self.entries
            .iter()
            .filter(|(_, _, k)| *k == kind)
            .map(|&(e, v, _)| (e, v))
            .collect()
    }
}

impl MetricSink for MetricHistory {
    fn record(&mut self, epoch: usize, value: f32, kind: MetricKind) {
        self.entries.push((epoch, value, kind));
    }
}

/// Counts correctly predicted samples in a batch.
pub type AccuracyFn = fn(target: &Tensor, output: &Tensor) -> usize;

/// Single-output classification: a hit when the rounded output equals the
/// target exactly. Targets are expected to be 0 or 1 already.
pub fn binary_accuracy(target: &Tensor, output: &Tensor) -> usize {
    let len = output.shape().batch_len();
    (0..output.batch())
        .filter(|&n| {
            let o = output.values()[n * len];
            let t = target.values()[n * len];
            o.round() == t
        })
        .count()
}

/// Multi-output classification: a hit when the argmax of output and target
/// agree.
pub fn categorical_accuracy(target: &Tensor, output: &Tensor) -> usize {
    (0..output.batch())
        .filter(|&n| output.argmax(n) == target.argmax(n))
        .count()
}

/// Pick the accuracy function for a network whose output has `outputs`
/// elements per sample.
pub fn accuracy_for(outputs: usize) -> AccuracyFn {
    if outputs == 1 {
        binary_accuracy
    } else {
        categorical_accuracy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(values: &[f32], shape: (usize, usize, usize, usize)) -> Tensor {
        Tensor::from_vec(values.to_vec(), shape).unwrap()
    }

    #[test]
    fn test_binary_accuracy() {
        let target = t(&[1.0, 0.0, 1.0], (1, 1, 1, 3));
        let output = t(&[0.8, 0.6, 0.2], (1, 1, 1, 3));
        assert_eq!(binary_accuracy(&target, &output), 1);
    }

    #[test]
    fn test_binary_accuracy_does_not_round_target() {
        // a soft target never matches a rounded output
        let target = t(&[0.9, 0.1], (1, 1, 1, 2));
        let output = t(&[0.95, 0.05], (1, 1, 1, 2));
        assert_eq!(binary_accuracy(&target, &output), 0);
    }

    #[test]
    fn test_categorical_accuracy() {
        let target = t(&[0.0, 1.0, 0.0, 1.0, 0.0, 0.0], (1, 3, 1, 2));
        let output = t(&[0.1, 0.7, 0.2, 0.1, 0.1, 0.8], (1, 3, 1, 2));
        assert_eq!(categorical_accuracy(&target, &output), 1);
    }

    #[test]
    fn test_history_series() {
        let mut h = MetricHistory::new();
        h.record(1, 0.5, MetricKind::TrainError);
        h.record(1, 0.9, MetricKind::TrainAccuracy);
        h.record(2, 0.25, MetricKind::TrainError);
        assert_eq!(
            h.series(MetricKind::TrainError),
            vec![(1, 0.5), (2, 0.25)]
        );
        assert!(h.series(MetricKind::TestError).is_empty());
    }
}
