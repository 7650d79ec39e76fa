use rand::Rng;

use crate::backend::{backend, PaddingType, PoolType};
use crate::error::{Error, Result};
use crate::shape::Shape;

// Tensor — owned, batched 4-D buffer of f32
//
// A Tensor is a flat Vec<f32> plus a Shape (see shape.rs for the memory
// order). Arithmetic returns new tensors; the `*_assign` family mutates in
// place for gradient accumulation.
//
// OPERATION FLOW:
//
//   1. validate operand shapes (ShapeMismatch / Config errors)
//   2. allocate the zeroed result
//   3. hand operands + result to the active Backend kernel
//
// Kernels therefore never fail. Floating-point overflow is not checked:
// NaN and Inf propagate like any other value.
//
// BATCH BROADCAST:
//
//   Binary operations need identical width/height/depth. Batch counts must be
//   equal, or one of them must be 1, in which case that single slice is
//   combined with every slice of the other operand.

/// Batched 4-D tensor of `f32` values.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    shape: Shape,
    values: Vec<f32>,
}

impl Tensor {
    // Construction

    /// A zero-filled tensor.
    pub fn zeros(shape: impl Into<Shape>) -> Self {
        Self::filled(shape, 0.0)
    }

    /// A tensor with every element set to `value`.
    pub fn filled(shape: impl Into<Shape>, value: f32) -> Self {
        let shape = shape.into();
        Tensor {
            shape,
            values: vec![value; shape.len()],
        }
    }

    /// Wrap an existing buffer. Every axis must be at least 1 and the buffer
    /// length must equal `shape.len()`.
    pub fn from_vec(values: Vec<f32>, shape: impl Into<Shape>) -> Result<Self> {
        let shape = shape.into();
        shape.validate()?;
        let expected = shape.checked_len();
        if expected != Some(values.len()) {
            return Err(Error::ElementCountMismatch {
                shape,
                expected: expected.unwrap_or(usize::MAX),
                got: values.len(),
            });
        }
        Ok(Tensor { shape, values })
    }

    /// A single column vector `(1, len, 1, 1)`.
    pub fn column(values: Vec<f32>) -> Result<Self> {
        let shape = Shape::new(1, values.len(), 1, 1);
        shape.validate()?;
        Self::from_vec(values, shape)
    }

    /// Uniform random values in `[low, high)` drawn from `rng`. Both bounds
    /// must be finite with `low < high`.
    pub fn rand<R: Rng + ?Sized>(
        shape: impl Into<Shape>,
        low: f32,
        high: f32,
        rng: &mut R,
    ) -> Result<Self> {
        if !(low.is_finite() && high.is_finite() && low < high) {
            return Err(Error::config(format!(
                "uniform range needs finite low < high, got [{low}, {high})"
            )));
        }
        let shape = shape.into();
        let values = (0..shape.len()).map(|_| rng.gen_range(low..high)).collect();
        Ok(Tensor { shape, values })
    }

    /// `start, start + step, start + 2 * step, ...` in flat order.
    pub fn range(shape: impl Into<Shape>, start: f32, step: f32) -> Self {
        let shape = shape.into();
        let values = (0..shape.len()).map(|i| start + step * i as f32).collect();
        Tensor { shape, values }
    }

    /// Zeroed tensor for an operation result; rejects degenerate shapes so
    /// kernels never see an empty plane.
    fn alloc(shape: Shape) -> Result<Self> {
        shape.validate()?;
        Ok(Self::zeros(shape))
    }

    // Accessors

    pub fn shape(&self) -> Shape {
        self.shape
    }

    pub fn width(&self) -> usize {
        self.shape.width()
    }

    pub fn height(&self) -> usize {
        self.shape.height()
    }

    pub fn depth(&self) -> usize {
        self.shape.depth()
    }

    pub fn batch(&self) -> usize {
        self.shape.batch()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn values_mut(&mut self) -> &mut [f32] {
        &mut self.values
    }

    pub fn into_values(self) -> Vec<f32> {
        self.values
    }

    /// Element `(x, y, z, n)`. Panics when out of range, like slice indexing.
    #[inline]
    pub fn get(&self, x: usize, y: usize, z: usize, n: usize) -> f32 {
        self.values[self.shape.index(x, y, z, n)]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, z: usize, n: usize, value: f32) {
        let idx = self.shape.index(x, y, z, n);
        self.values[idx] = value;
    }

    /// Bounds-checked read: returns `default` when `(x, y)` falls outside the
    /// plane. Sliding-window kernels use it to read padding.
    #[inline]
    pub fn try_get(&self, default: f32, x: isize, y: isize, z: usize, n: usize) -> f32 {
        if x < 0 || y < 0 || x as usize >= self.width() || y as usize >= self.height() {
            return default;
        }
        self.get(x as usize, y as usize, z, n)
    }

    /// Bounds-checked write; returns whether the element was inside.
    pub fn try_set(&mut self, x: isize, y: isize, z: usize, n: usize, value: f32) -> bool {
        if x < 0 || y < 0 || x as usize >= self.width() || y as usize >= self.height() {
            return false;
        }
        self.set(x as usize, y as usize, z, n, value);
        true
    }

    /// Element-wise comparison with an absolute tolerance.
    pub fn approx_eq(&self, other: &Tensor, epsilon: f32) -> bool {
        self.shape == other.shape
            && self
                .values
                .iter()
                .zip(&other.values)
                .all(|(a, b)| (a - b).abs() <= epsilon)
    }

    // Binary kernels

    fn elementwise_shape(op: &'static str, t1: &Tensor, t2: &Tensor) -> Result<Shape> {
        if !t1.shape.same_sample_dims(&t2.shape) {
            return Err(Error::shape_mismatch(op, t1.shape, t2.shape));
        }
        let batch = Shape::broadcast_batch(op, &t1.shape, &t2.shape)?;
        Ok(t1.shape.with_batch(batch))
    }

    /// `self + other` with batch broadcast.
    pub fn add(&self, other: &Tensor) -> Result<Tensor> {
        let mut result = Self::alloc(Self::elementwise_shape("add", self, other)?)?;
        backend().add(self, other, &mut result);
        Ok(result)
    }

    /// `self - other` with batch broadcast.
    pub fn sub(&self, other: &Tensor) -> Result<Tensor> {
        let mut result = Self::alloc(Self::elementwise_shape("sub", self, other)?)?;
        backend().sub(self, other, &mut result);
        Ok(result)
    }

    /// Element-wise (Hadamard) product with batch broadcast.
    pub fn mul_elem(&self, other: &Tensor) -> Result<Tensor> {
        let mut result = Self::alloc(Self::elementwise_shape("mul_elem", self, other)?)?;
        backend().mul_elem(self, other, &mut result);
        Ok(result)
    }

    /// Matrix product per `(depth, batch)` plane.
    ///
    /// `(w1, h1, d, _) x (w2, w1, d, _) -> (w2, h1, d, n)`: the left operand's
    /// width must equal the right operand's height.
    pub fn mul(&self, other: &Tensor) -> Result<Tensor> {
        if self.width() != other.height() || self.depth() != other.depth() {
            return Err(Error::shape_mismatch("mul", self.shape, other.shape));
        }
        let batch = Shape::broadcast_batch("mul", &self.shape, &other.shape)?;
        let shape = Shape::new(other.width(), self.height(), self.depth(), batch);
        let mut result = Self::alloc(shape)?;
        backend().mul(self, other, &mut result);
        Ok(result)
    }

    // Sliding-window kernels

    /// 2-D convolution with kernels `(kW, kH, self.depth, out_depth)`.
    /// Output is `(out_w, out_h, out_depth, self.batch)`.
    pub fn conv2d(&self, kernels: &Tensor, stride: usize, padding: PaddingType) -> Result<Tensor> {
        if kernels.depth() != self.depth() {
            return Err(Error::shape_mismatch("conv2d", self.shape, kernels.shape));
        }
        let pad = padding.params(
            self.width(),
            self.height(),
            kernels.width(),
            kernels.height(),
            stride,
        )?;
        let shape = Shape::new(pad.out_width, pad.out_height, kernels.batch(), self.batch());
        let mut result = Self::alloc(shape)?;
        backend().conv2d(self, kernels, stride, pad, &mut result);
        Ok(result)
    }

    /// Gradient of [`Tensor::conv2d`] with respect to its input.
    pub fn conv2d_input_gradient(
        gradient: &Tensor,
        kernels: &Tensor,
        stride: usize,
        padding: PaddingType,
        input_shape: Shape,
    ) -> Result<Tensor> {
        if kernels.depth() != input_shape.depth() {
            return Err(Error::shape_mismatch(
                "conv2d_input_gradient",
                input_shape,
                kernels.shape,
            ));
        }
        let pad = padding.params(
            input_shape.width(),
            input_shape.height(),
            kernels.width(),
            kernels.height(),
            stride,
        )?;
        let expected = Shape::new(
            pad.out_width,
            pad.out_height,
            kernels.batch(),
            input_shape.batch(),
        );
        if gradient.shape != expected {
            return Err(Error::shape_mismatch(
                "conv2d_input_gradient",
                expected,
                gradient.shape,
            ));
        }
        let mut result = Self::alloc(input_shape)?;
        backend().conv2d_input_gradient(gradient, kernels, stride, pad, &mut result);
        Ok(result)
    }

    /// Gradient of [`Tensor::conv2d`] with respect to kernels of
    /// `kernel_width x kernel_height`, summed (not averaged) over the batch.
    pub fn conv2d_kernels_gradient(
        input: &Tensor,
        gradient: &Tensor,
        stride: usize,
        padding: PaddingType,
        kernel_width: usize,
        kernel_height: usize,
    ) -> Result<Tensor> {
        let pad = padding.params(
            input.width(),
            input.height(),
            kernel_width,
            kernel_height,
            stride,
        )?;
        if gradient.width() != pad.out_width
            || gradient.height() != pad.out_height
            || gradient.batch() != input.batch()
        {
            return Err(Error::shape_mismatch(
                "conv2d_kernels_gradient",
                input.shape,
                gradient.shape,
            ));
        }
        let shape = Shape::new(kernel_width, kernel_height, input.depth(), gradient.depth());
        let mut result = Self::alloc(shape)?;
        backend().conv2d_kernels_gradient(input, gradient, stride, pad, &mut result);
        Ok(result)
    }

    /// Square-window pooling per `(depth, batch)` plane.
    pub fn pool(
        &self,
        filter_size: usize,
        stride: usize,
        pool_type: PoolType,
        padding: PaddingType,
    ) -> Result<Tensor> {
        let pad = padding.params(self.width(), self.height(), filter_size, filter_size, stride)?;
        let shape = Shape::new(pad.out_width, pad.out_height, self.depth(), self.batch());
        let mut result = Self::alloc(shape)?;
        backend().pool(self, filter_size, stride, pool_type, pad, &mut result);
        Ok(result)
    }

    /// Gradient of [`Tensor::pool`]: routes `output_gradient` back to the
    /// positions of `input` that produced `output`.
    #[allow(clippy::too_many_arguments)]
    pub fn pool_gradient(
        output: &Tensor,
        input: &Tensor,
        output_gradient: &Tensor,
        filter_size: usize,
        stride: usize,
        pool_type: PoolType,
        padding: PaddingType,
    ) -> Result<Tensor> {
        let pad = padding.params(input.width(), input.height(), filter_size, filter_size, stride)?;
        let expected = Shape::new(pad.out_width, pad.out_height, input.depth(), input.batch());
        if output.shape != expected {
            return Err(Error::shape_mismatch("pool_gradient", expected, output.shape));
        }
        if output_gradient.shape != expected {
            return Err(Error::shape_mismatch(
                "pool_gradient",
                expected,
                output_gradient.shape,
            ));
        }
        let mut result = Self::alloc(input.shape)?;
        backend().pool_gradient(
            output,
            input,
            output_gradient,
            filter_size,
            stride,
            pool_type,
            pad,
            &mut result,
        );
        Ok(result)
    }

    // In-place accumulation

    fn check_assign(&self, op: &'static str, other: &Tensor) -> Result<()> {
        if self.shape == other.shape
            || (other.batch() == 1 && self.shape.same_sample_dims(&other.shape))
        {
            return Ok(());
        }
        Err(Error::shape_mismatch(op, self.shape, other.shape))
    }

    fn zip_assign(&mut self, other: &Tensor, f: impl Fn(f32, f32) -> f32) {
        let slice = other.shape.batch_len();
        if other.batch() == self.batch() {
            for (a, &b) in self.values.iter_mut().zip(&other.values) {
                *a = f(*a, b);
            }
        } else {
            for chunk in self.values.chunks_mut(slice) {
                for (a, &b) in chunk.iter_mut().zip(&other.values) {
                    *a = f(*a, b);
                }
            }
        }
    }

    /// `self += other`; `other` may have batch count 1.
    pub fn add_assign(&mut self, other: &Tensor) -> Result<()> {
        self.check_assign("add_assign", other)?;
        self.zip_assign(other, |a, b| a + b);
        Ok(())
    }

    /// `self -= other`; `other` may have batch count 1.
    pub fn sub_assign(&mut self, other: &Tensor) -> Result<()> {
        self.check_assign("sub_assign", other)?;
        self.zip_assign(other, |a, b| a - b);
        Ok(())
    }

    /// `self *= factor`.
    pub fn scale_assign(&mut self, factor: f32) {
        self.values.iter_mut().for_each(|v| *v *= factor);
    }

    /// Reset every element to 0.
    pub fn zero(&mut self) {
        self.values.fill(0.0);
    }

    // Scalar ops

    pub fn mul_scalar(&self, factor: f32) -> Tensor {
        self.map(|v| v * factor)
    }

    pub fn div_scalar(&self, divisor: f32) -> Tensor {
        self.map(|v| v / divisor)
    }

    pub fn add_scalar(&self, offset: f32) -> Tensor {
        self.map(|v| v + offset)
    }

    /// Apply `f` to every element.
    pub fn map(&self, f: impl Fn(f32) -> f32) -> Tensor {
        Tensor {
            shape: self.shape,
            values: self.values.iter().map(|&v| f(v)).collect(),
        }
    }

    /// Combine two tensors of identical shape element by element.
    pub fn map2(&self, other: &Tensor, f: impl Fn(f32, f32) -> f32) -> Result<Tensor> {
        if self.shape != other.shape {
            return Err(Error::shape_mismatch("map2", self.shape, other.shape));
        }
        Ok(Tensor {
            shape: self.shape,
            values: self
                .values
                .iter()
                .zip(&other.values)
                .map(|(&a, &b)| f(a, b))
                .collect(),
        })
    }

    // Reductions

    pub fn sum(&self) -> f32 {
        self.values.iter().sum()
    }

    /// Sum of batch slice `n`.
    pub fn sum_batch(&self, n: usize) -> f32 {
        let len = self.shape.batch_len();
        self.values[n * len..(n + 1) * len].iter().sum()
    }

    /// Collapse the batch axis by summing all slices into one.
    pub fn sum_batches(&self) -> Tensor {
        let len = self.shape.batch_len();
        let mut values = vec![0.0; len];
        for slice in self.values.chunks(len) {
            for (acc, &v) in values.iter_mut().zip(slice) {
                *acc += v;
            }
        }
        Tensor {
            shape: self.shape.with_batch(1),
            values,
        }
    }

    pub fn avg(&self) -> f32 {
        self.sum() / self.len() as f32
    }

    pub fn max(&self) -> f32 {
        self.values.iter().copied().fold(f32::NEG_INFINITY, f32::max)
    }

    /// Flat position of the largest value inside batch slice `n`.
    /// The first occurrence wins on ties.
    pub fn argmax(&self, n: usize) -> usize {
        let len = self.shape.batch_len();
        let slice = &self.values[n * len..(n + 1) * len];
        let mut best = 0;
        for (i, &v) in slice.iter().enumerate() {
            if v > slice[best] {
                best = i;
            }
        }
        best
    }

    // Reshaping

    /// A copy with a different shape of the same element count.
    pub fn reshaped(&self, shape: impl Into<Shape>) -> Result<Tensor> {
        self.clone().into_reshaped(shape)
    }

    /// Reinterpret the buffer under a new shape without copying.
    pub fn into_reshaped(self, shape: impl Into<Shape>) -> Result<Tensor> {
        let shape = shape.into();
        if shape.len() != self.values.len() {
            return Err(Error::ElementCountMismatch {
                shape,
                expected: shape.len(),
                got: self.values.len(),
            });
        }
        Ok(Tensor {
            shape,
            values: self.values,
        })
    }

    /// Swap width and height inside every `(depth, batch)` plane.
    pub fn transposed(&self) -> Tensor {
        let (w, h) = (self.width(), self.height());
        let shape = Shape::new(h, w, self.depth(), self.batch());
        let mut values = vec![0.0; self.len()];
        let plane = self.shape.plane_len();
        for (src, dst) in self.values.chunks(plane).zip(values.chunks_mut(plane)) {
            for y in 0..h {
                for x in 0..w {
                    dst[x * h + y] = src[y * w + x];
                }
            }
        }
        Tensor { shape, values }
    }

    /// Rotate every `(depth, batch)` plane by 180°.
    pub fn rotated_180(&self) -> Tensor {
        let mut rotated = self.clone();
        let plane = self.shape.plane_len();
        for chunk in rotated.values.chunks_mut(plane) {
            chunk.reverse();
        }
        rotated
    }

    /// Copy of batch slice `n` as a batch-1 tensor.
    pub fn batch_slice(&self, n: usize) -> Result<Tensor> {
        if n >= self.batch() {
            return Err(Error::config(format!(
                "batch index {n} out of range for {}",
                self.shape
            )));
        }
        let len = self.shape.batch_len();
        Ok(Tensor {
            shape: self.shape.with_batch(1),
            values: self.values[n * len..(n + 1) * len].to_vec(),
        })
    }

    /// Stack tensors along the batch axis. All parts must share
    /// width/height/depth; their batch counts add up.
    pub fn merge(parts: &[Tensor]) -> Result<Tensor> {
        let first = parts
            .first()
            .ok_or_else(|| Error::config("cannot merge an empty list of tensors"))?;
        let mut batch = 0;
        for part in parts {
            if !part.shape.same_sample_dims(&first.shape) {
                return Err(Error::shape_mismatch("merge", first.shape, part.shape));
            }
            batch += part.batch();
        }
        let mut values = Vec::with_capacity(first.shape.batch_len() * batch);
        for part in parts {
            values.extend_from_slice(&part.values);
        }
        Ok(Tensor {
            shape: first.shape.with_batch(batch),
            values,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn t(values: &[f32], shape: impl Into<Shape>) -> Tensor {
        Tensor::from_vec(values.to_vec(), shape).unwrap()
    }

    #[test]
    fn test_from_vec_checks_length() {
        assert!(matches!(
            Tensor::from_vec(vec![1.0; 5], (2, 3)),
            Err(Error::ElementCountMismatch {
                expected: 6,
                got: 5,
                ..
            })
        ));
    }

    #[test]
    fn test_from_vec_rejects_zero_axis() {
        assert!(matches!(
            Tensor::from_vec(Vec::new(), (0, 0, 1, 1)),
            Err(Error::Config(_))
        ));
        assert!(Tensor::from_vec(vec![1.0; 4], (2, 2, 1, 0)).is_err());
    }

    #[test]
    fn test_rand_rejects_bad_range() {
        let mut rng = StdRng::seed_from_u64(0);
        assert!(Tensor::rand((2, 2), 1.0, 1.0, &mut rng).is_err());
        assert!(Tensor::rand((2, 2), 1.0, -1.0, &mut rng).is_err());
        assert!(Tensor::rand((2, 2), f32::NEG_INFINITY, 0.0, &mut rng).is_err());
        assert!(Tensor::rand((2, 2), 0.0, f32::NAN, &mut rng).is_err());
    }

    #[test]
    fn test_add_sub() {
        let a = t(&[1.0, 2.0, 3.0, 4.0], (2, 2));
        let b = t(&[10.0, 20.0, 30.0, 40.0], (2, 2));
        assert_eq!(a.add(&b).unwrap().values(), &[11.0, 22.0, 33.0, 44.0]);
        assert_eq!(b.sub(&a).unwrap().values(), &[9.0, 18.0, 27.0, 36.0]);
        assert_eq!(a.mul_elem(&a).unwrap().values(), &[1.0, 4.0, 9.0, 16.0]);
    }

    #[test]
    fn test_add_rejects_mismatched_dims() {
        let a = Tensor::zeros((3, 2));
        let b = Tensor::zeros((2, 3));
        assert!(matches!(a.add(&b), Err(Error::ShapeMismatch { op: "add", .. })));
    }

    #[test]
    fn test_add_broadcasts_single_batch() {
        let a = t(&[1.0, 2.0, 3.0, 4.0], (2, 1, 1, 2));
        let b = t(&[10.0, 20.0], (2, 1, 1, 1));
        let c = a.add(&b).unwrap();
        assert_eq!(c.shape(), Shape::new(2, 1, 1, 2));
        assert_eq!(c.values(), &[11.0, 22.0, 13.0, 24.0]);
        // and from the other side
        assert_eq!(b.sub(&a).unwrap().values(), &[9.0, 18.0, 7.0, 16.0]);
    }

    #[test]
    fn test_add_rejects_incompatible_batches() {
        let a = Tensor::zeros((1, 1, 1, 2));
        let b = Tensor::zeros((1, 1, 1, 3));
        assert!(a.add(&b).is_err());
    }

    #[test]
    fn test_matmul() {
        // [[1, 2, 3], [4, 5, 6]] x [[7, 8], [9, 10], [11, 12]]
        let a = t(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], (3, 2));
        let b = t(&[7.0, 8.0, 9.0, 10.0, 11.0, 12.0], (2, 3));
        let c = a.mul(&b).unwrap();
        assert_eq!(c.shape(), Shape::new(2, 2, 1, 1));
        assert_eq!(c.values(), &[58.0, 64.0, 139.0, 154.0]);
    }

    #[test]
    fn test_matmul_broadcasts_weights() {
        let w = t(&[1.0, 2.0], (2, 1));
        let x = t(&[1.0, 1.0, 2.0, 3.0], (1, 2, 1, 2));
        let y = w.mul(&x).unwrap();
        assert_eq!(y.shape(), Shape::new(1, 1, 1, 2));
        assert_eq!(y.values(), &[3.0, 8.0]);
    }

    #[test]
    fn test_matmul_checks_inner_dims() {
        let a = Tensor::zeros((3, 2));
        let b = Tensor::zeros((2, 2));
        assert!(a.mul(&b).is_err());
    }

    #[test]
    fn test_transposed() {
        let a = t(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], (3, 2));
        let at = a.transposed();
        assert_eq!(at.shape(), Shape::new(2, 3, 1, 1));
        assert_eq!(at.values(), &[1.0, 4.0, 2.0, 5.0, 3.0, 6.0]);
        assert_eq!(at.transposed(), a);
    }

    #[test]
    fn test_rotated_180() {
        let k = t(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0], (2, 2, 2));
        assert_eq!(
            k.rotated_180().values(),
            &[4.0, 3.0, 2.0, 1.0, 8.0, 7.0, 6.0, 5.0]
        );
    }

    #[test]
    fn test_conv2d_valid() {
        let input = Tensor::range((3, 3), 1.0, 1.0);
        let kernel = t(&[1.0, 0.0, 0.0, 1.0], (2, 2));
        let out = input.conv2d(&kernel, 1, PaddingType::Valid).unwrap();
        assert_eq!(out.shape(), Shape::new(2, 2, 1, 1));
        // each output = top-left + bottom-right of the window
        assert_eq!(out.values(), &[6.0, 8.0, 12.0, 14.0]);
    }

    #[test]
    fn test_conv2d_same_reads_zero_padding() {
        let input = Tensor::filled((3, 3), 1.0);
        let kernel = Tensor::filled((3, 3), 1.0);
        let out = input.conv2d(&kernel, 1, PaddingType::Same).unwrap();
        assert_eq!(out.shape(), Shape::new(3, 3, 1, 1));
        assert_eq!(out.values(), &[4.0, 6.0, 4.0, 6.0, 9.0, 6.0, 4.0, 6.0, 4.0]);
    }

    #[test]
    fn test_conv2d_rejects_depth_mismatch() {
        let input = Tensor::zeros((4, 4, 2));
        let kernel = Tensor::zeros((2, 2, 3));
        assert!(input.conv2d(&kernel, 1, PaddingType::Valid).is_err());
    }

    #[test]
    fn test_max_pool() {
        let input = t(
            &[
                1.0, 2.0, 5.0, 6.0, //
                3.0, 4.0, 7.0, 8.0, //
                0.0, 0.0, 1.0, 1.0, //
                0.0, -1.0, 1.0, 1.0,
            ],
            (4, 4),
        );
        let out = input.pool(2, 2, PoolType::Max, PaddingType::Valid).unwrap();
        assert_eq!(out.values(), &[4.0, 8.0, 0.0, 1.0]);
        let avg = input.pool(2, 2, PoolType::Avg, PaddingType::Valid).unwrap();
        assert_eq!(avg.values(), &[2.5, 6.5, -0.25, 1.0]);
    }

    #[test]
    fn test_max_pool_gradient_routes_to_ties() {
        let input = t(&[1.0, 3.0, 3.0, 0.0], (2, 2));
        let output = input.pool(2, 2, PoolType::Max, PaddingType::Valid).unwrap();
        let grad = t(&[2.0], (1, 1));
        let back =
            Tensor::pool_gradient(&output, &input, &grad, 2, 2, PoolType::Max, PaddingType::Valid)
                .unwrap();
        assert_eq!(back.values(), &[0.0, 2.0, 2.0, 0.0]);
    }

    #[test]
    fn test_reductions() {
        let a = t(&[1.0, -2.0, 3.0, 4.0, 0.5, 9.0], (3, 1, 1, 2));
        assert_abs_diff_eq!(a.sum(), 15.5);
        assert_abs_diff_eq!(a.sum_batch(1), 13.5);
        assert_abs_diff_eq!(a.avg(), 15.5 / 6.0);
        assert_eq!(a.max(), 9.0);
        assert_eq!(a.argmax(0), 2);
        assert_eq!(a.argmax(1), 2);
        assert_eq!(a.sum_batches().values(), &[5.0, -1.5, 12.0]);
    }

    #[test]
    fn test_reshape_keeps_values() {
        let a = Tensor::range((2, 3), 0.0, 1.0);
        let b = a.reshaped((1, 6)).unwrap();
        assert_eq!(b.values(), a.values());
        assert!(a.reshaped((4, 2)).is_err());
    }

    #[test]
    fn test_merge_and_slice() {
        let a = t(&[1.0, 2.0], (1, 2));
        let b = t(&[3.0, 4.0, 5.0, 6.0], (1, 2, 1, 2));
        let m = Tensor::merge(&[a.clone(), b]).unwrap();
        assert_eq!(m.shape(), Shape::new(1, 2, 1, 3));
        assert_eq!(m.batch_slice(0).unwrap(), a);
        assert_eq!(m.batch_slice(2).unwrap().values(), &[5.0, 6.0]);
        assert!(m.batch_slice(3).is_err());
        assert!(Tensor::merge(&[]).is_err());
    }

    #[test]
    fn test_assign_ops_broadcast() {
        let mut acc = Tensor::zeros((2, 1, 1, 2));
        acc.add_assign(&t(&[1.0, 2.0], 2)).unwrap();
        acc.add_assign(&t(&[1.0, 1.0, 1.0, 1.0], (2, 1, 1, 2))).unwrap();
        assert_eq!(acc.values(), &[2.0, 3.0, 2.0, 3.0]);
        acc.scale_assign(0.5);
        assert_eq!(acc.values(), &[1.0, 1.5, 1.0, 1.5]);
        assert!(acc.sub_assign(&Tensor::zeros(3)).is_err());
    }

    #[test]
    fn test_try_get_out_of_bounds() {
        let a = Tensor::filled((2, 2), 5.0);
        assert_eq!(a.try_get(0.0, -1, 0, 0, 0), 0.0);
        assert_eq!(a.try_get(-1.0, 0, 2, 0, 0), -1.0);
        assert_eq!(a.try_get(0.0, 1, 1, 0, 0), 5.0);
    }

    #[test]
    fn test_rand_is_seeded() {
        let a = Tensor::rand((3, 3), -1.0, 1.0, &mut StdRng::seed_from_u64(7)).unwrap();
        let b = Tensor::rand((3, 3), -1.0, 1.0, &mut StdRng::seed_from_u64(7)).unwrap();
        assert_eq!(a, b);
        assert!(a.values().iter().all(|v| (-1.0..1.0).contains(v)));
    }
}
