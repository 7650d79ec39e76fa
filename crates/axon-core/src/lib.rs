//! # axon-core
//!
//! Tensor primitives and compute kernels for Axon.
//!
//! This crate provides:
//! - [`Tensor`] — batched 4-D `f32` buffer with validated operations
//! - [`Shape`] — `(width, height, depth, batch)` shape and index math
//! - [`Backend`] trait — swappable kernel strategy ([`CpuBackend`], [`MultiCpuBackend`])
//! - [`ParamWriter`] / [`ParamReader`] — named tensor cursors for persistence
//! - [`Error`] / [`Result`] — the error type shared by every Axon crate

pub mod backend;
pub mod cpu;
pub mod error;
pub mod io;
mod kernels;
pub mod multi_cpu;
pub mod shape;
pub mod tensor;

pub use backend::{
    backend, backend_for, select_backend, selected_backend, Backend, BackendKind, Padding,
    PaddingType, PoolType,
};
pub use cpu::CpuBackend;
pub use error::{Error, Result};
pub use io::{ParamId, ParamReader, ParamWriter};
pub use multi_cpu::MultiCpuBackend;
pub use shape::Shape;
pub use tensor::Tensor;
