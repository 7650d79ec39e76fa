//! # Axon
//!
//! A from-scratch neural network training engine in Rust.
//!
//! This is the top-level facade crate that re-exports everything you need.
//!
//! ## Usage
//!
//! ```rust
//! use axon::prelude::*;
//! ```
//!
//! ## Architecture
//!
//! | Crate | Purpose |
//! |-------|----------|
//! | `axon-core` | Tensor, Shape, Error, Backend trait, CPU and multi-core kernels |
//! | `axon-optim` | Optimizers (SGD, Adam) and per-parameter optimizer state |
//! | `axon-nn` | Layers (Dense, Convolution, Pooling, Flatten), activations, losses |
//! | `axon-data` | Sample pairs, batching, shuffling, MNIST and CSV decoders |
//!
//! ## Modules
//!
//! - [`network`] — `NeuralNetwork`: layer chain, predict, clone, parameter copy
//! - [`train`] — `fit` / `fit_batched` and their configuration
//! - [`metrics`] — metric sinks and accuracy functions
//! - [`progress`] — progress sinks and the progress bar string
//! - [`checkpoint`] — save/load network parameters

/// Re-export core types.
pub use axon_core::{
    select_backend, selected_backend, Backend, BackendKind, Error, PaddingType, PoolType, Result,
    Shape, Tensor,
};

/// Re-export layers, activations and losses.
pub mod nn {
    pub use axon_nn::*;
}

/// Re-export optimizers.
pub mod optim {
    pub use axon_optim::*;
}

/// Re-export datasets and batching.
pub mod data {
    pub use axon_data::*;
}

/// Checkpoint — save and load network parameters.
pub mod checkpoint;

/// Metrics — metric sinks and accuracy functions.
pub mod metrics;

/// NeuralNetwork — the layer chain.
pub mod network;

/// Progress — progress sinks and the progress bar.
pub mod progress;

/// Training loop.
pub mod train;

pub use network::NeuralNetwork;
pub use train::{EpochLog, FitConfig, Track, TrainResult, Verbosity};

/// Prelude: import this for the most common types.
pub mod prelude {
    pub use crate::data::{load_csv, merge_data, read_mnist, shuffle, Data};
    pub use crate::metrics::{MetricHistory, MetricKind, MetricSink, NullSink};
    pub use crate::nn::{
        Activation, Convolution, Dense, Flatten, Init, Layer, Loss, Pooling,
    };
    pub use crate::optim::{Adam, Optimizer, Sgd};
    pub use crate::progress::{progress_string, LogProgress, NullProgress, ProgressSink};
    pub use crate::{
        BackendKind, EpochLog, Error, FitConfig, NeuralNetwork, PaddingType, PoolType, Result,
        Shape, Tensor, Track, TrainResult, Verbosity,
    };
}
