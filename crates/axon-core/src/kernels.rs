// Kernel bodies shared by the CPU backends
//
// Every function here fills ONE disjoint region of a result buffer:
//
//   binary_chunk               — a flat index range
//   mul_plane / conv2d_plane   — one (depth, batch) output plane
//   pool_plane                 — one (depth, batch) output plane
//   conv2d_input_gradient_plane, pool_gradient_plane
//                              — one (depth, batch) plane of the input gradient
//   conv2d_kernels_gradient_block
//                              — one output-channel block of the kernel gradient,
//                                for a single batch slice (accumulating)
//
// The backends only decide how the regions are scheduled (sequentially or
// on the rayon pool). Because regions never overlap, any schedule is free of
// write races.

use crate::backend::{Padding, PoolType};
use crate::tensor::Tensor;

/// Flat elements handled per task by element-wise kernels.
pub(crate) const ELEMENTWISE_CHUNK: usize = 4096;

#[derive(Debug, Clone, Copy)]
pub(crate) enum BinaryOp {
    Add,
    Sub,
    Mul,
}

impl BinaryOp {
    #[inline]
    fn apply(self, a: f32, b: f32) -> f32 {
        match self {
            BinaryOp::Add => a + b,
            BinaryOp::Sub => a - b,
            BinaryOp::Mul => a * b,
        }
    }
}

/// Fill `out`, which starts at flat index `start` of the result buffer.
/// An operand with batch count 1 is re-read for every result slice.
pub(crate) fn binary_chunk(op: BinaryOp, t1: &Tensor, t2: &Tensor, start: usize, out: &mut [f32]) {
    let (a, b) = (t1.values(), t2.values());
    if t1.batch() == t2.batch() {
        for (i, o) in out.iter_mut().enumerate() {
            *o = op.apply(a[start + i], b[start + i]);
        }
        return;
    }

    let batch_len = t1.shape().batch_len();
    let a_fixed = t1.batch() == 1;
    let b_fixed = t2.batch() == 1;
    for (i, o) in out.iter_mut().enumerate() {
        let idx = start + i;
        let within = idx % batch_len;
        let ia = if a_fixed { within } else { idx };
        let ib = if b_fixed { within } else { idx };
        *o = op.apply(a[ia], b[ib]);
    }
}

/// Matrix product for result plane `plane = n * depth + d`.
pub(crate) fn mul_plane(t1: &Tensor, t2: &Tensor, plane: usize, out: &mut [f32]) {
    let depth = t1.depth();
    let (n, d) = (plane / depth, plane % depth);
    let n1 = if t1.batch() == 1 { 0 } else { n };
    let n2 = if t2.batch() == 1 { 0 } else { n };

    let (rows, inner, cols) = (t1.height(), t1.width(), t2.width());
    let a_start = t1.shape().index(0, 0, d, n1);
    let b_start = t2.shape().index(0, 0, d, n2);
    let a = &t1.values()[a_start..a_start + rows * inner];
    let b = &t2.values()[b_start..b_start + inner * cols];

    out.fill(0.0);
    for h in 0..rows {
        let row = &mut out[h * cols..(h + 1) * cols];
        for i in 0..inner {
            let av = a[h * inner + i];
            let b_row = &b[i * cols..(i + 1) * cols];
            for (r, &bv) in row.iter_mut().zip(b_row) {
                *r += av * bv;
            }
        }
    }
}

/// Forward convolution for result plane `plane = n * out_depth + o`.
pub(crate) fn conv2d_plane(
    input: &Tensor,
    kernels: &Tensor,
    stride: usize,
    padding: Padding,
    plane: usize,
    out: &mut [f32],
) {
    let out_depth = kernels.batch();
    let (n, o) = (plane / out_depth, plane % out_depth);
    let (kw, kh, kd) = (kernels.width(), kernels.height(), kernels.depth());

    for out_y in 0..padding.out_height {
        let y0 = (out_y * stride) as isize - padding.pad_y as isize;
        for out_x in 0..padding.out_width {
            let x0 = (out_x * stride) as isize - padding.pad_x as isize;
            let mut val = 0.0f32;
            for z in 0..kd {
                for ky in 0..kh {
                    for kx in 0..kw {
                        val += input.try_get(0.0, x0 + kx as isize, y0 + ky as isize, z, n)
                            * kernels.get(kx, ky, z, o);
                    }
                }
            }
            out[out_y * padding.out_width + out_x] = val;
        }
    }
}

/// Upstream gradient value at `(x, y)` of the stride-dilated gradient map:
/// zero between stride positions and outside the map.
#[inline]
fn dilated(gradient: &Tensor, x: isize, y: isize, stride: isize, z: usize, n: usize) -> f32 {
    if x < 0 || y < 0 || x % stride != 0 || y % stride != 0 {
        return 0.0;
    }
    gradient.try_get(0.0, x / stride, y / stride, z, n)
}

/// Input gradient for plane `plane = n * in_depth + d`.
///
/// Correlates the stride-dilated upstream gradient with the 180° rotated
/// kernels using "full" padding `k - 1 - forward_pad`, which equals Full
/// padding when the forward pass used Valid.
pub(crate) fn conv2d_input_gradient_plane(
    gradient: &Tensor,
    rotated: &Tensor,
    stride: usize,
    padding: Padding,
    plane: usize,
    width: usize,
    out: &mut [f32],
) {
    let depth = rotated.depth();
    let (n, d) = (plane / depth, plane % depth);
    let (kw, kh) = (rotated.width(), rotated.height());
    let full_x = kw as isize - 1 - padding.pad_x as isize;
    let full_y = kh as isize - 1 - padding.pad_y as isize;
    let s = stride as isize;
    let height = out.len() / width;

    for y in 0..height {
        for x in 0..width {
            let mut val = 0.0f32;
            for o in 0..rotated.batch() {
                for ky in 0..kh {
                    let gy = y as isize - full_y + ky as isize;
                    for kx in 0..kw {
                        let gx = x as isize - full_x + kx as isize;
                        val += dilated(gradient, gx, gy, s, o, n) * rotated.get(kx, ky, d, o);
                    }
                }
            }
            out[y * width + x] = val;
        }
    }
}

/// Adds batch slice `n`'s contribution to the gradient of kernel `o`.
/// `out` is that kernel's `(kW, kH, depth)` block.
#[allow(clippy::too_many_arguments)]
pub(crate) fn conv2d_kernels_gradient_block(
    input: &Tensor,
    gradient: &Tensor,
    stride: usize,
    padding: Padding,
    n: usize,
    o: usize,
    kernel_w: usize,
    kernel_h: usize,
    out: &mut [f32],
) {
    let depth = input.depth();
    for out_y in 0..gradient.height() {
        let y0 = (out_y * stride) as isize - padding.pad_y as isize;
        for out_x in 0..gradient.width() {
            let x0 = (out_x * stride) as isize - padding.pad_x as isize;
            let grad = gradient.get(out_x, out_y, o, n);
            for z in 0..depth {
                for ky in 0..kernel_h {
                    let row = (z * kernel_h + ky) * kernel_w;
                    for kx in 0..kernel_w {
                        out[row + kx] +=
                            input.try_get(0.0, x0 + kx as isize, y0 + ky as isize, z, n) * grad;
                    }
                }
            }
        }
    }
}

/// Pooling for output plane `plane = n * depth + d`.
pub(crate) fn pool_plane(
    input: &Tensor,
    filter_size: usize,
    stride: usize,
    pool_type: PoolType,
    padding: Padding,
    plane: usize,
    out: &mut [f32],
) {
    let depth = input.depth();
    let (n, d) = (plane / depth, plane % depth);
    let area = (filter_size * filter_size) as f32;

    for out_y in 0..padding.out_height {
        let y0 = (out_y * stride) as isize - padding.pad_y as isize;
        for out_x in 0..padding.out_width {
            let x0 = (out_x * stride) as isize - padding.pad_x as isize;
            let value = match pool_type {
                PoolType::Max => {
                    let mut max = f32::NEG_INFINITY;
                    for py in 0..filter_size {
                        for px in 0..filter_size {
                            let v = input.try_get(
                                f32::NEG_INFINITY,
                                x0 + px as isize,
                                y0 + py as isize,
                                d,
                                n,
                            );
                            max = max.max(v);
                        }
                    }
                    max
                }
                PoolType::Avg => {
                    let mut sum = 0.0f32;
                    for py in 0..filter_size {
                        for px in 0..filter_size {
                            sum += input.try_get(0.0, x0 + px as isize, y0 + py as isize, d, n);
                        }
                    }
                    // nominal window area, also for windows clipped by padding
                    sum / area
                }
            };
            out[out_y * padding.out_width + out_x] = value;
        }
    }
}

/// Pooling gradient for input plane `plane = n * depth + d`.
///
/// Max: every window position equal to the recorded maximum receives the full
/// upstream gradient (ties are not split). Avg: the gradient divided by the
/// nominal window area goes to every position. Overlapping windows add up.
#[allow(clippy::too_many_arguments)]
pub(crate) fn pool_gradient_plane(
    output: &Tensor,
    input: &Tensor,
    output_gradient: &Tensor,
    filter_size: usize,
    stride: usize,
    pool_type: PoolType,
    padding: Padding,
    plane: usize,
    out: &mut [f32],
) {
    let depth = input.depth();
    let (n, d) = (plane / depth, plane % depth);
    let (width, height) = (input.width() as isize, input.height() as isize);
    let area = (filter_size * filter_size) as f32;

    out.fill(0.0);
    for out_y in 0..output.height() {
        let y0 = (out_y * stride) as isize - padding.pad_y as isize;
        for out_x in 0..output.width() {
            let x0 = (out_x * stride) as isize - padding.pad_x as isize;
            let grad = output_gradient.get(out_x, out_y, d, n);
            let pooled = output.get(out_x, out_y, d, n);
            for py in 0..filter_size {
                let y = y0 + py as isize;
                if y < 0 || y >= height {
                    continue;
                }
                for px in 0..filter_size {
                    let x = x0 + px as isize;
                    if x < 0 || x >= width {
                        continue;
                    }
                    let idx = y as usize * width as usize + x as usize;
                    match pool_type {
                        PoolType::Max => {
                            if input.get(x as usize, y as usize, d, n) == pooled {
                                out[idx] += grad;
                            }
                        }
                        PoolType::Avg => out[idx] += grad / area,
                    }
                }
            }
        }
    }
}
