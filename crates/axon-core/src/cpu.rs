use crate::backend::{Backend, BackendKind, Padding, PoolType};
use crate::kernels::{self, BinaryOp};
use crate::tensor::Tensor;

// CpuBackend — single-threaded reference kernels
//
// Walks the same disjoint regions as MultiCpuBackend, one after another.
// Useful as the numeric reference in tests and on machines where spinning
// up the rayon pool costs more than it saves (tiny networks).

/// Sequential implementation of [`Backend`].
#[derive(Debug, Clone, Copy, Default)]
pub struct CpuBackend;

impl CpuBackend {
    fn binary(op: BinaryOp, t1: &Tensor, t2: &Tensor, result: &mut Tensor) {
        kernels::binary_chunk(op, t1, t2, 0, result.values_mut());
    }
}

impl Backend for CpuBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Cpu
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
        for (p, out) in result.values_mut().chunks_mut(plane).enumerate() {
            kernels::mul_plane(t1, t2, p, out);
        }
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
        for (p, out) in result.values_mut().chunks_mut(plane).enumerate() {
            kernels::conv2d_plane(input, kernels, stride, padding, p, out);
        }
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
        let plane = input_gradient.shape().plane_len();
        for (p, out) in input_gradient.values_mut().chunks_mut(plane).enumerate() {
            kernels::conv2d_input_gradient_plane(gradient, &rotated, stride, padding, p, width, out);
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
            for (o, out) in kernels_gradient.values_mut().chunks_mut(block).enumerate() {
                kernels::conv2d_kernels_gradient_block(
                    input, gradient, stride, padding, n, o, kw, kh, out,
                );
            }
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
        for (p, out) in result.values_mut().chunks_mut(plane).enumerate() {
            kernels::pool_plane(input, filter_size, stride, pool_type, padding, p, out);
        }
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
        for (p, out) in result.values_mut().chunks_mut(plane).enumerate() {
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
        }
    }
}
