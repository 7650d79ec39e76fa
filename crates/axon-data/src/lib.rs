//! # axon-data
//!
//! Samples, batching and dataset decoders for Axon.
//!
//! This crate provides:
//! - [`Data`] — an (input, target) pair with matching batch counts
//! - [`merge_data`] — stack samples into batches, remainder included
//! - [`shuffle`] — seeded Fisher–Yates permutation of a sample list
//! - MNIST IDX reader and writer
//! - CSV reader with optional one-hot targets

pub mod csv;
pub mod data;
pub mod mnist;

pub use csv::{load_csv, parse_csv};
pub use data::{merge_data, shuffle, validate_samples, Data};
pub use mnist::{encode_mnist, parse_mnist, read_mnist, write_mnist};
