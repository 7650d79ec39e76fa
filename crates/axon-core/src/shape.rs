use std::fmt;

use crate::error::{Error, Result};

// Shape — fixed 4-D shape of a batched tensor
//
// Every tensor in Axon has exactly four axes, ordered from fastest to
// slowest varying in memory:
//
//   width   (x) — contiguous
//   height  (y)
//   depth   (z) — channels / feature maps
//   batch   (n) — one independent sample per slice
//
// Element (x, y, z, n) lives at flat index
//
//   n * batch_len + z * height * width + y * width + x
//
// so every batch slice is one contiguous block of `batch_len` values and
// every (z, n) pair is one contiguous `width * height` plane. The kernels
// partition work along these planes.
//
// Lower-rank data uses trailing 1s: a column vector of 5 features is
// (1, 5, 1, 1), a 28x28 grey image is (28, 28, 1, 1).

/// Four-axis shape `(width, height, depth, batch)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Shape {
    width: usize,
    height: usize,
    depth: usize,
    batch: usize,
}

impl Shape {
    pub const fn new(width: usize, height: usize, depth: usize, batch: usize) -> Self {
        Shape {
            width,
            height,
            depth,
            batch,
        }
    }

    /// Fails when any axis is zero.
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 || self.depth == 0 || self.batch == 0 {
            return Err(Error::config(format!(
                "all shape axes must be at least 1, got {self}"
            )));
        }
        Ok(())
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Number of batch slices.
    pub fn batch(&self) -> usize {
        self.batch
    }

    /// Total number of elements (product of all four axes).
    pub fn len(&self) -> usize {
        self.batch_len() * self.batch
    }

    /// Element count, or `None` when the product overflows `usize`.
    pub fn checked_len(&self) -> Option<usize> {
        self.width
            .checked_mul(self.height)?
            .checked_mul(self.depth)?
            .checked_mul(self.batch)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Elements in one batch slice: `width * height * depth`.
    pub fn batch_len(&self) -> usize {
        self.plane_len() * self.depth
    }

    /// Elements in one `(depth, batch)` plane: `width * height`.
    pub fn plane_len(&self) -> usize {
        self.width * self.height
    }

    pub fn dims(&self) -> [usize; 4] {
        [self.width, self.height, self.depth, self.batch]
    }

    /// Same width/height/depth with a different batch count.
    pub fn with_batch(&self, batch: usize) -> Shape {
        Shape { batch, ..*self }
    }

    /// Flat buffer index of element `(x, y, z, n)`.
    #[inline]
    pub fn index(&self, x: usize, y: usize, z: usize, n: usize) -> usize {
        n * self.batch_len() + z * self.plane_len() + y * self.width + x
    }

    /// Whether width, height and depth agree (batch count ignored).
    pub fn same_sample_dims(&self, other: &Shape) -> bool {
        self.width == other.width && self.height == other.height && self.depth == other.depth
    }

    /// Resulting batch count of an operation between two batched operands.
    ///
    /// Batch counts must be equal, or one of them must be 1 in which case the
    /// single slice is re-read for every output slice.
    pub fn broadcast_batch(op: &'static str, lhs: &Shape, rhs: &Shape) -> Result<usize> {
        match (lhs.batch, rhs.batch) {
            (a, b) if a == b => Ok(a),
            (1, b) => Ok(b),
            (a, 1) => Ok(a),
            _ => Err(Error::shape_mismatch(op, *lhs, *rhs)),
        }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}, {}, {})",
            self.width, self.height, self.depth, self.batch
        )
    }
}

// Convenient From implementations
// Missing trailing axes default to 1: Shape::from((1, 5)) is a 5-element column.

impl From<usize> for Shape {
    fn from(w: usize) -> Self {
        Shape::new(w, 1, 1, 1)
    }
}

impl From<(usize, usize)> for Shape {
    fn from((w, h): (usize, usize)) -> Self {
        Shape::new(w, h, 1, 1)
    }
}

impl From<(usize, usize, usize)> for Shape {
    fn from((w, h, d): (usize, usize, usize)) -> Self {
        Shape::new(w, h, d, 1)
    }
}

impl From<(usize, usize, usize, usize)> for Shape {
    fn from((w, h, d, n): (usize, usize, usize, usize)) -> Self {
        Shape::new(w, h, d, n)
    }
}

impl From<[usize; 4]> for Shape {
    fn from([w, h, d, n]: [usize; 4]) -> Self {
        Shape::new(w, h, d, n)
    }
}
