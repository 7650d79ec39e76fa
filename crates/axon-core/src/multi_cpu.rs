use rayon::prelude::*;

use crate::backend::{Backend, BackendKind, Padding, PoolType};
use crate::kernels::{self, BinaryOp, ELEMENTWISE_CHUNK};
use crate::tensor::Tensor;

// MultiCpuBackend — rayon-parallel kernels
//
// PARTITIONING:
//
//   element-wise      flat chunks of ELEMENTWISE_CHUNK values
//   mul, conv2d, pool one task per (depth, batch) output plane
//   pool_gradient     one task per (depth, batch) input plane
//   input gradient    batch loop sequential, one task per input depth plane
//   kernels gradient  batch loop sequential, one task per output channel
//
// Every task owns a `&mut` slice obtained from par_chunks_mut, so the
// disjoint-write rule holds by construction. Each call joins the pool
// before returning.

/// Rayon-parallel implementation of [`Backend`].
#[derive(Debug, Clone, Copy, Default)]
pub struct MultiCpuBackend;

impl MultiCpuBackend {
    fn binary(op: BinaryOp, t1: &Tensor, t2: &Tensor, result: &mut Tensor) {
        result
            .values_mut()
            .par_chunks_mut(ELEMENTWISE_CHUNK)
            .enumerate()
            .for_each(|(c, out)| {
                kernels::binary_chunk(op, t1, t2, c * ELEMENTWISE_CHUNK, out);
            });
    }
}

impl Backend for MultiCpuBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::MultiCpu
    }

    fn add(&self, t1: &Tensor, t2: &Tensor, result: &mut Tensor) {
        Self::binary(BinaryOp::Add, t1, t2, result);
    }

    fn sub(&self, t1: &Tensor, t2: &Tensor, result: &mut Tensor) {
        Self::binary(BinaryOp::Sub, t1, t2, result);
    }

    fn mul_elem(&self, t1: &Tensor, t2: &Tensor, result: &mut Tensor) {
        Self::binary(BinaryOp::Mul, t1, t2, result);
    }

    fn mul(&self, t1: &Tensor, t2: &Tensor, result: &mut Tensor) {
        let plane = result.shape().plane_len();
        result
            .values_mut()
            .par_chunks_mut(plane)
            .enumerate()
            .for_each(|(p, out)| kernels::mul_plane(t1, t2, p, out));
    }

    fn conv2d(
        &self,
        input: &Tensor,
        kernels: &Tensor,
        stride: usize,
        padding: Padding,
        result: &mut Tensor,
    ) {
        let plane = result.shape().plane_len();
        result
            .values_mut()
            .par_chunks_mut(plane)
            .enumerate()
            .for_each(|(p, out)| kernels::conv2d_plane(input, kernels, stride, padding, p, out));
    }

    fn conv2d_input_gradient(
        &self,
        gradient: &Tensor,
        kernels: &Tensor,
        stride: usize,
        padding: Padding,
        input_gradient: &mut Tensor,
    ) {
        let rotated = kernels.rotated_180();
        let width = input_gradient.width();
        let depth = input_gradient.depth();
        let plane = input_gradient.shape().plane_len();
        let slice_len = input_gradient.shape().batch_len();

        for (n, slice) in input_gradient.values_mut().chunks_mut(slice_len).enumerate() {
            slice
                .par_chunks_mut(plane)
                .enumerate()
                .for_each(|(d, out)| {
                    kernels::conv2d_input_gradient_plane(
                        gradient,
                        &rotated,
                        stride,
                        padding,
                        n * depth + d,
                        width,
                        out,
                    );
                });
        }
    }

    fn conv2d_kernels_gradient(
        &self,
        input: &Tensor,
        gradient: &Tensor,
        stride: usize,
        padding: Padding,
        kernels_gradient: &mut Tensor,
    ) {
        let (kw, kh) = (kernels_gradient.width(), kernels_gradient.height());
        let block = kernels_gradient.shape().batch_len();
        kernels_gradient.zero();
        for n in 0..input.batch() {
            kernels_gradient
                .values_mut()
                .par_chunks_mut(block)
                .enumerate()
                .for_each(|(o, out)| {
                    kernels::conv2d_kernels_gradient_block(
                        input, gradient, stride, padding, n, o, kw, kh, out,
                    );
                });
        }
    }

    fn pool(
        &self,
        input: &Tensor,
        filter_size: usize,
        stride: usize,
        pool_type: PoolType,
        padding: Padding,
        result: &mut Tensor,
    ) {
        let plane = result.shape().plane_len();
        result
            .values_mut()
            .par_chunks_mut(plane)
            .enumerate()
            .for_each(|(p, out)| {
                kernels::pool_plane(input, filter_size, stride, pool_type, padding, p, out);
            });
    }

    fn pool_gradient(
        &self,
        output: &Tensor,
        input: &Tensor,
        output_gradient: &Tensor,
        filter_size: usize,
        stride: usize,
        pool_type: PoolType,
        padding: Padding,
        result: &mut Tensor,
    ) {
        let plane = result.shape().plane_len();
        result
            .values_mut()
            .par_chunks_mut(plane)
            .enumerate()
            .for_each(|(p, out)| {
                kernels::pool_gradient_plane(
                    output,
                    input,
                    output_gradient,
                    filter_size,
                    stride,
                    pool_type,
                    padding,
                    p,
                    out,
                );
            });
    }
}
