//! # axon-nn
//!
//! Layers, activations, losses and initializers for Axon.
//!
//! Every layer implements the [`Layer`] trait with an explicit
//! forward/backward pair:
//!
//! 1. **Dense** — fully connected: `y = act(W x + b)`
//! 2. **Convolution** — 2-D convolution with Valid/Same/Full padding
//! 3. **Pooling** — max or average pooling
//! 4. **Flatten** — reshape to a column per sample
//!
//! Parameters live in a [`ParameterSet`] together with the layer's own
//! optimizer state.

pub mod activation;
pub mod convolution;
pub mod dense;
pub mod flatten;
pub mod init;
pub mod layer;
pub mod loss;
pub mod parameter;
pub mod pooling;

pub use activation::Activation;
pub use convolution::Convolution;
pub use dense::Dense;
pub use flatten::Flatten;
pub use init::Init;
pub use layer::Layer;
pub use loss::Loss;
pub use parameter::{Parameter, ParameterSet};
pub use pooling::Pooling;
