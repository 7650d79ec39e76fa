// Training — mini-batch gradient descent over a NeuralNetwork
//
// Per epoch:
//   1. Shuffle the sample list (only with more than one batch, only for
//      unbatched samples, only when enabled)
//   2. Merge samples into batches (remainder batch allowed)
//   3. Per batch, strictly in order:
//        forward -> loss -> backward -> optimizer step
//   4. Optional validation pass (forward + loss only)
//   5. Report train/test error and accuracy to the metric sink
//
// Epoch error = sum over batches of (loss.sum() / per-sample output length),
// divided by the number of samples. Parameter gradients are summed over the
// batch by the layers and averaged in the optimizer step.

use std::fmt;
use std::ops::BitOr;
use std::time::{Duration, Instant};

use axon_core::{bail, Error, Result, Tensor};
use axon_data::{merge_data, shuffle, validate_samples, Data};

use crate::metrics::{accuracy_for, AccuracyFn, MetricKind, MetricSink, NullSink};
use crate::network::NeuralNetwork;
use crate::progress::{progress_string, LogProgress, ProgressSink};

/// Set of metrics to compute and report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Track(u8);

impl Track {
    pub const NOTHING: Track = Track(0);
    pub const TRAIN_ERROR: Track = Track(1 << 0);
    pub const TEST_ERROR: Track = Track(1 << 1);
    pub const TRAIN_ACCURACY: Track = Track(1 << 2);
    pub const TEST_ACCURACY: Track = Track(1 << 3);
    pub const ALL: Track = Track(0b1111);

    pub fn contains(self, other: Track) -> bool {
        self.0 & other.0 == other.0 && other.0 != 0
    }

    fn wants_accuracy(self) -> bool {
        self.contains(Track::TRAIN_ACCURACY) || self.contains(Track::TEST_ACCURACY)
    }
}

impl Default for Track {
    fn default() -> Self {
        Track::TRAIN_ERROR | Track::TEST_ACCURACY
    }
}

impl BitOr for Track {
    type Output = Track;

    fn bitor(self, rhs: Track) -> Track {
        Track(self.0 | rhs.0)
    }
}

/// How much the loop reports through the `log` facade and progress sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    Silent,
    /// One `info!` summary line per epoch.
    #[default]
    Epoch,
    /// Epoch summaries plus a progress line per batch.
    Progress,
}

/// Configuration for [`NeuralNetwork::fit`].
#[derive(Debug, Clone)]
pub struct FitConfig {
    /// Samples per gradient step. `None` uses the whole set (or the existing
    /// batch size for pre-batched data).
    pub batch_size: Option<usize>,
    pub epochs: usize,
    /// Shuffle the sample list at the start of every epoch.
    pub shuffle: bool,
    pub track: Track,
    pub verbosity: Verbosity,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            batch_size: None,
            epochs: 1,
            shuffle: true,
            track: Track::default(),
            verbosity: Verbosity::default(),
        }
    }
}

impl FitConfig {
    pub fn batch_size(mut self, size: usize) -> Self {
        self.batch_size = Some(size);
        self
    }
    pub fn epochs(mut self, epochs: usize) -> Self {
        self.epochs = epochs;
        self
    }
    pub fn shuffle(mut self, s: bool) -> Self {
        self.shuffle = s;
        self
    }
    pub fn track(mut self, track: Track) -> Self {
        self.track = track;
        self
    }
    pub fn verbosity(mut self, v: Verbosity) -> Self {
        self.verbosity = v;
        self
    }
}

/// Log for a single training epoch.
#[derive(Debug, Clone)]
pub struct EpochLog {
    /// Epoch number (1-indexed).
    pub epoch: usize,
    /// Average training loss per sample.
    pub train_loss: f32,
    /// Fraction of correctly classified training samples, when tracked.
    pub train_accuracy: Option<f32>,
    pub test_loss: Option<f32>,
    pub test_accuracy: Option<f32>,
    pub elapsed: Duration,
}

/// Summary of a full training run.
#[derive(Debug, Clone, Default)]
pub struct TrainResult {
    pub epochs: Vec<EpochLog>,
}

impl TrainResult {
    /// Training loss of the last epoch.
    pub fn final_loss(&self) -> Option<f32> {
        self.epochs.last().map(|e| e.train_loss)
    }

    pub fn losses(&self) -> Vec<f32> {
        self.epochs.iter().map(|e| e.train_loss).collect()
    }
}

impl fmt::Display for TrainResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Training complete: {} epochs", self.epochs.len())?;
        for log in &self.epochs {
            writeln!(f, "  epoch {}: loss = {:.6}", log.epoch, log.train_loss)?;
        }
        match self.final_loss() {
            Some(loss) => write!(f, "  final loss: {loss:.6}"),
            None => write!(f, "  final loss: n/a"),
        }
    }
}

/// Running totals for one pass over a sample list.
#[derive(Debug, Default)]
struct Totals {
    error: f32,
    hits: usize,
}

impl NeuralNetwork {
    /// Train on a list of samples, with optional validation data evaluated
    /// after every epoch.
    ///
    /// Metrics are collected in the returned [`TrainResult`]; progress lines
    /// go to the `log` facade.
    pub fn fit(
        &mut self,
        training: &[Data],
        validation: Option<&[Data]>,
        config: &FitConfig,
    ) -> Result<TrainResult> {
        self.fit_with_sinks(training, validation, config, &mut NullSink, &mut LogProgress)
    }

    /// Train on a single pre-batched input/target pair. The batch is kept as
    /// one unit for every epoch.
    pub fn fit_batched(
        &mut self,
        input: Tensor,
        output: Tensor,
        config: &FitConfig,
    ) -> Result<TrainResult> {
        let data = Data::new(input, output)?;
        let config = FitConfig {
            batch_size: Some(data.batch()),
            ..config.clone()
        };
        self.fit(&[data], None, &config)
    }

    /// [`fit`](Self::fit) with caller-supplied metric and progress sinks.
    pub fn fit_with_sinks(
        &mut self,
        training: &[Data],
        validation: Option<&[Data]>,
        config: &FitConfig,
        metrics: &mut dyn MetricSink,
        progress: &mut dyn ProgressSink,
    ) -> Result<TrainResult> {
        if self.optimizer.is_none() {
            bail!("{}: optimize() must be called before fit()", self.name);
        }
        self.check_samples(training)?;
        if let Some(validation) = validation {
            self.check_samples(validation)?;
        }

        let already_batched = training[0].batch() > 1;
        let batch_size = match config.batch_size {
            Some(0) => bail!("batch size must be positive"),
            Some(size) => size,
            None if already_batched => training[0].batch(),
            None => training.len(),
        };
        let batches_num = if already_batched {
            training.len()
        } else {
            training.len().div_ceil(batch_size)
        };
        let total_samples: usize = training.iter().map(Data::batch).sum();

        let accuracy = if config.track.wants_accuracy() {
            Some(accuracy_for(self.output_shape().batch_len()))
        } else {
            None
        };

        let mut samples = training.to_vec();
        let mut result = TrainResult::default();

        for epoch in 1..=config.epochs {
            let timer = Instant::now();

            if batches_num > 1 && config.shuffle && !already_batched {
                shuffle(&mut samples, &mut self.rng);
            }
            let merged;
            let batches: &[Data] = if already_batched {
                &samples
            } else {
                merged = merge_data(&samples, Some(batch_size))?;
                &merged
            };

            let mut train = Totals::default();
            let mut done = 0;
            for (b, batch) in batches.iter().enumerate() {
                let before = train.error;
                self.gradient_descent_step(batch, accuracy, &mut train)?;
                done += batch.batch();
                log::trace!(
                    "epoch {epoch} batch {}/{}: loss {:.6}",
                    b + 1,
                    batches.len(),
                    (train.error - before) / batch.batch() as f32
                );
                if config.verbosity == Verbosity::Progress {
                    progress.progress(&progress_string(done, total_samples));
                }
            }

            let train_loss = train.error / total_samples as f32;
            let train_accuracy = accuracy.map(|_| train.hits as f32 / total_samples as f32);
            if config.track.contains(Track::TRAIN_ERROR) {
                metrics.record(epoch, train_loss, MetricKind::TrainError);
            }
            if let (true, Some(acc)) = (config.track.contains(Track::TRAIN_ACCURACY), train_accuracy) {
                metrics.record(epoch, acc, MetricKind::TrainAccuracy);
            }

            let (test_loss, test_accuracy) = match validation {
                Some(validation) => {
                    let (loss, acc) = self.evaluate(validation, accuracy, config, progress)?;
                    if config.track.contains(Track::TEST_ERROR) {
                        metrics.record(epoch, loss, MetricKind::TestError);
                    }
                    if let (true, Some(acc)) = (config.track.contains(Track::TEST_ACCURACY), acc) {
                        metrics.record(epoch, acc, MetricKind::TestAccuracy);
                    }
                    (Some(loss), acc)
                }
                None => (None, None),
            };

            let elapsed = timer.elapsed();
            if config.verbosity != Verbosity::Silent {
                let mut line = format!("Epoch {epoch}/{} - loss: {train_loss:.4}", config.epochs);
                if let (true, Some(acc)) = (config.track.contains(Track::TRAIN_ACCURACY), train_accuracy) {
                    line.push_str(&format!(" - acc: {:.4}%", acc * 100.0));
                }
                if let Some(loss) = test_loss {
                    line.push_str(&format!(" - val_loss: {loss:.4}"));
                }
                if let Some(acc) = test_accuracy {
                    line.push_str(&format!(" - val_acc: {:.4}%", acc * 100.0));
                }
                line.push_str(&format!(" - eta: {:.3}s", elapsed.as_secs_f32()));
                log::info!("{line}");
            }

            result.epochs.push(EpochLog {
                epoch,
                train_loss,
                train_accuracy,
                test_loss,
                test_accuracy,
                elapsed,
            });
        }
        Ok(result)
    }

    /// One forward/loss/backward/update cycle on a single batch.
    fn gradient_descent_step(
        &mut self,
        batch: &Data,
        accuracy: Option<AccuracyFn>,
        totals: &mut Totals,
    ) -> Result<()> {
        let output = self.forward(&batch.input)?;
        if output.shape() != batch.output.shape() {
            return Err(Error::shape_mismatch("loss", output.shape(), batch.output.shape()));
        }
        let losses = self.loss.compute(&output, &batch.output)?;
        totals.error += losses.sum() / output.shape().batch_len() as f32;
        if let Some(acc) = accuracy {
            totals.hits += acc(&batch.output, &output);
        }

        let mut gradient = self.loss.derivative(&output, &batch.output)?;
        for layer in self.layers.iter_mut().rev() {
            gradient = layer.back_prop_owned(gradient)?;
        }

        let Some(optimizer) = self.optimizer.as_deref() else {
            bail!("{}: no optimizer configured", self.name);
        };
        for layer in &mut self.layers {
            layer.update_parameters(optimizer, batch.batch())?;
        }
        Ok(())
    }

    /// Forward-only pass over `data`: (loss per sample, accuracy if tracked).
    fn evaluate(
        &mut self,
        data: &[Data],
        accuracy: Option<AccuracyFn>,
        config: &FitConfig,
        progress: &mut dyn ProgressSink,
    ) -> Result<(f32, Option<f32>)> {
        let samples: usize = data.iter().map(Data::batch).sum();
        let mut totals = Totals::default();
        for (i, d) in data.iter().enumerate() {
            let output = self.forward(&d.input)?;
            if output.shape() != d.output.shape() {
                return Err(Error::shape_mismatch("loss", output.shape(), d.output.shape()));
            }
            let losses = self.loss.compute(&output, &d.output)?;
            totals.error += losses.sum() / output.shape().batch_len() as f32;
            if let Some(acc) = accuracy {
                totals.hits += acc(&d.output, &output);
            }
            if config.verbosity == Verbosity::Progress {
                progress.progress(&format!(
                    " - validating: {}%",
                    (i + 1) * 100 / data.len()
                ));
            }
        }
        let acc = accuracy.map(|_| totals.hits as f32 / samples as f32);
        Ok((totals.error / samples as f32, acc))
    }

    /// Every sample must fit the network's input and output shapes.
    fn check_samples(&self, samples: &[Data]) -> Result<()> {
        validate_samples(samples)?;
        let first = &samples[0];
        let input = self.input_shape();
        if !first.input.shape().same_sample_dims(&input) {
            return Err(Error::shape_mismatch("network input", input, first.input.shape()));
        }
        let output = self.output_shape();
        if !first.output.shape().same_sample_dims(&output) {
            return Err(Error::shape_mismatch("network output", output, first.output.shape()));
        }
        Ok(())
    }
}
