//! # axon-optim
//!
//! Optimizers for Axon layers.
//!
//! - [`Optimizer`] — the update rule (stateless, cloneable behind `Box<dyn>`)
//! - [`OptimizerState`] — per-parameter moments and step counters, owned by a layer
//! - [`Sgd`] — plain or momentum SGD
//! - [`Adam`] — Adam with bias correction

pub mod adam;
pub mod optimizer;
pub mod sgd;

pub use adam::Adam;
pub use optimizer::{Optimizer, OptimizerState, ParamState};
pub use sgd::Sgd;
