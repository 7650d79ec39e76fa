use crate::shape::Shape;

/// All errors that can occur within Axon.
///
/// Shape problems, invalid hyperparameters and persistence failures share a
/// single enum so that `?` works from the tensor kernels all the way up to
/// the training loop. Floating-point overflow is not an error: NaN and Inf
/// propagate silently through every kernel.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Operand shapes are incompatible for the requested operation
    /// (e.g. adding `(3, 2, 1, 1)` to `(2, 3, 1, 1)`, or batch counts 2 and 3).
    #[error("shape mismatch in {op}: {lhs} vs {rhs}")]
    ShapeMismatch {
        op: &'static str,
        lhs: Shape,
        rhs: Shape,
    },

    /// Element count mismatch when creating a tensor from a buffer.
    #[error("element count mismatch: shape {shape} requires {expected} elements, got {got}")]
    ElementCountMismatch {
        shape: Shape,
        expected: usize,
        got: usize,
    },

    /// Invalid hyperparameter or call order (e.g. `tau` outside `(0, 1]`,
    /// a zero batch size, back-prop before feed-forward).
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Underlying I/O failure while saving or loading.
    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed persisted data (bad magic, truncated stream, unparsable field).
    #[error("malformed data: {0}")]
    Decode(String),
}

impl Error {
    /// Create a configuration error from any string message.
    pub fn config(s: impl Into<String>) -> Self {
        Error::Config(s.into())
    }

    /// Create a decode error from any string message.
    pub fn decode(s: impl Into<String>) -> Self {
        Error::Decode(s.into())
    }

    pub fn shape_mismatch(op: &'static str, lhs: Shape, rhs: Shape) -> Self {
        Error::ShapeMismatch { op, lhs, rhs }
    }
}

/// Convenience Result type used throughout Axon.
pub type Result<T> = std::result::Result<T, Error>;

/// Early return with a formatted configuration error.
/// Usage: `bail!("batch size must be positive, got {}", n)`
#[macro_export]
macro_rules! bail {
    ($($arg:tt)*) => {
        return Err($crate::Error::Config(format!($($arg)*)))
    };
}
