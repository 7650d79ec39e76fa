use std::fmt;
use std::sync::OnceLock;

use crate::cpu::CpuBackend;
use crate::error::{Error, Result};
use crate::multi_cpu::MultiCpuBackend;
use crate::shape::Shape;
use crate::tensor::Tensor;

// Backend — swappable strategy that runs the numeric kernels
//
// Tensor methods validate shapes, allocate the result and then hand the
// actual arithmetic to a Backend. Every backend receives operands that are
// already known to be compatible, so kernels are infallible and only have
// to fill `result`.
//
// CONTRACT:
//
//   Each kernel must produce its complete output, i.e. assign every element
//   of `result` (gradient kernels zero their destination before they start
//   accumulating). Parallel backends must partition work so that no two
//   workers ever write the same output index; read-only operands may be
//   shared freely. Kernels block until all work has joined.
//
// SELECTION:
//
//   One backend serves the whole process. It is chosen on first use from
//   `select_backend()` or the AXON_BACKEND environment variable and never
//   changes afterwards. Both backends are also public types, so tests and
//   benchmarks can call kernels on a specific backend directly.

/// Zero-padding policy for sliding-window operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaddingType {
    /// No padding; the output shrinks.
    Valid,
    /// Pad so that `out = ceil(in / stride)`.
    Same,
    /// Pad by `kernel - 1` on each side; the output grows.
    Full,
}

/// Reduction applied over each pooling window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolType {
    Max,
    Avg,
}

/// Resolved output size and leading padding for one sliding-window call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Padding {
    pub out_width: usize,
    pub out_height: usize,
    pub pad_x: usize,
    pub pad_y: usize,
}

impl PaddingType {
    /// Output size and leading padding along one axis.
    ///
    /// - Valid: `out = floor((in - k) / s) + 1`, pad 0
    /// - Same:  `out = ceil(in / s)`, pad `floor(max((out-1)*s + k - in, 0) / 2)`
    /// - Full:  `out = floor((in + k - 2) / s) + 1`, pad `k - 1`
    pub fn axis(self, input: usize, kernel: usize, stride: usize) -> Option<(usize, usize)> {
        if stride == 0 || kernel == 0 || input == 0 {
            return None;
        }
        match self {
            PaddingType::Valid => {
                if kernel > input {
                    return None;
                }
                Some(((input - kernel) / stride + 1, 0))
            }
            PaddingType::Same => {
                let out = input.div_ceil(stride);
                let total = ((out - 1) * stride + kernel).saturating_sub(input);
                Some((out, total / 2))
            }
            PaddingType::Full => Some(((input + kernel - 2) / stride + 1, kernel - 1)),
        }
    }

    /// Resolve padding for a 2-D window of `kernel_w x kernel_h` over a
    /// `width x height` input.
    pub fn params(
        self,
        width: usize,
        height: usize,
        kernel_w: usize,
        kernel_h: usize,
        stride: usize,
    ) -> Result<Padding> {
        if stride == 0 || kernel_w == 0 || kernel_h == 0 {
            return Err(Error::config(format!(
                "window {kernel_w}x{kernel_h} with stride {stride} is degenerate"
            )));
        }
        let x = self.axis(width, kernel_w, stride);
        let y = self.axis(height, kernel_h, stride);
        match (x, y) {
            (Some((out_width, pad_x)), Some((out_height, pad_y))) => Ok(Padding {
                out_width,
                out_height,
                pad_x,
                pad_y,
            }),
            _ => Err(Error::shape_mismatch(
                "sliding window",
                Shape::new(width, height, 1, 1),
                Shape::new(kernel_w, kernel_h, 1, 1),
            )),
        }
    }
}

/// The kernel interface every compute backend implements.
///
/// Shapes are validated by the calling [`Tensor`] method; see the module
/// notes for the disjoint-write contract.
pub trait Backend: Send + Sync + fmt::Debug {
    fn kind(&self) -> BackendKind;

    /// `result = t1 + t2` with batch broadcast.
    fn add(&self, t1: &Tensor, t2: &Tensor, result: &mut Tensor);

    /// `result = t1 - t2` with batch broadcast.
    fn sub(&self, t1: &Tensor, t2: &Tensor, result: &mut Tensor);

    /// `result = t1 * t2` element-wise with batch broadcast.
    fn mul_elem(&self, t1: &Tensor, t2: &Tensor, result: &mut Tensor);

    /// Per `(depth, batch)` plane matrix product:
    /// `(t1.height x t1.width) @ (t2.height x t2.width)`.
    fn mul(&self, t1: &Tensor, t2: &Tensor, result: &mut Tensor);

    /// Forward 2-D convolution (cross-correlation) of `input` with
    /// `kernels` laid out as `(kW, kH, in_depth, out_depth)`.
    fn conv2d(
        &self,
        input: &Tensor,
        kernels: &Tensor,
        stride: usize,
        padding: Padding,
        result: &mut Tensor,
    );

    /// Gradient w.r.t. the convolution input. `padding` is the forward
    /// padding; `input_gradient` has the forward input's shape.
    fn conv2d_input_gradient(
        &self,
        gradient: &Tensor,
        kernels: &Tensor,
        stride: usize,
        padding: Padding,
        input_gradient: &mut Tensor,
    );

    /// Gradient w.r.t. the kernels, summed over the batch.
    fn conv2d_kernels_gradient(
        &self,
        input: &Tensor,
        gradient: &Tensor,
        stride: usize,
        padding: Padding,
        kernels_gradient: &mut Tensor,
    );

    /// Max or average pooling with a square `filter_size` window.
    fn pool(
        &self,
        input: &Tensor,
        filter_size: usize,
        stride: usize,
        pool_type: PoolType,
        padding: Padding,
        result: &mut Tensor,
    );

    /// Routes `output_gradient` back onto the pooled input positions.
    #[allow(clippy::too_many_arguments)]
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
    );
}

/// Identifies one of the built-in backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// Single-threaded reference kernels.
    Cpu,
    /// Rayon-parallel kernels.
    MultiCpu,
}

impl BackendKind {
    /// Environment variable consulted when no backend was selected explicitly.
    pub const ENV_VAR: &'static str = "AXON_BACKEND";

    /// Parse a backend name (`cpu`, `multi_cpu`).
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "cpu" | "single" => Some(BackendKind::Cpu),
            "multi_cpu" | "multicpu" | "multi-cpu" | "parallel" => Some(BackendKind::MultiCpu),
            _ => None,
        }
    }

    fn from_env() -> Self {
        match std::env::var(Self::ENV_VAR) {
            Ok(name) => Self::parse(&name).unwrap_or_else(|| {
                log::warn!(
                    "unknown {}={name:?}, falling back to {}",
                    Self::ENV_VAR,
                    BackendKind::MultiCpu
                );
                BackendKind::MultiCpu
            }),
            Err(_) => BackendKind::MultiCpu,
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Cpu => write!(f, "cpu"),
            BackendKind::MultiCpu => write!(f, "multi_cpu"),
        }
    }
}

static SELECTED: OnceLock<BackendKind> = OnceLock::new();
static CPU: CpuBackend = CpuBackend;
static MULTI_CPU: MultiCpuBackend = MultiCpuBackend;

/// Select the process-wide backend. Selecting the backend that is already
/// active is a no-op; switching to a different one fails.
pub fn select_backend(kind: BackendKind) -> Result<()> {
    let active = *SELECTED.get_or_init(|| {
        log::debug!("compute backend selected: {kind}");
        kind
    });
    if active != kind {
        return Err(Error::config(format!(
            "compute backend already set to {active}, cannot switch to {kind}"
        )));
    }
    Ok(())
}

/// The active backend kind, resolving it from the environment on first use.
pub fn selected_backend() -> BackendKind {
    *SELECTED.get_or_init(|| {
        let kind = BackendKind::from_env();
        log::debug!("compute backend selected: {kind}");
        kind
    })
}

/// The backend used by all [`Tensor`] operations.
pub fn backend() -> &'static dyn Backend {
    backend_for(selected_backend())
}

/// A specific built-in backend, regardless of the process-wide selection.
pub fn backend_for(kind: BackendKind) -> &'static dyn Backend {
    match kind {
        BackendKind::Cpu => &CPU,
        BackendKind::MultiCpu => &MULTI_CPU,
    }
}
