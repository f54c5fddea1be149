//! Accelerator abstraction shared by all device backends.
//!
//! Every backend runs the same kernel: one worker per source index, each
//! computing its own destination and writing one element. Workers never
//! read each other's output, so the kernel needs no synchronization.
//!
//! A backend owns its long-lived handles (context, queue) but rebuilds the
//! program and allocates fresh input/output buffers on every call to
//! [`Accelerator::rotate_left`]. The buffers are released before the call
//! returns.

use crate::timing::{Checkpoints, PhaseBreakdown};
use crate::{RotError, RotResult};

/// Kernel entry point name, shared by the OpenCL and WGSL sources.
pub const ROTATE_ENTRY_POINT: &str = "rotate_left";

/// Result of one accelerator rotation.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceRun {
    /// Rotated array, copied back to the host.
    pub output: Vec<i32>,
    /// Device-clock checkpoints bracketing the run.
    pub checkpoints: Checkpoints,
}

impl DeviceRun {
    pub fn phases(&self) -> PhaseBreakdown {
        self.checkpoints.phases()
    }
}

/// A device that can run the rotation kernel with phase checkpoints.
pub trait Accelerator {
    /// Human-readable device name for logs.
    fn name(&self) -> &str;

    /// Workers per block used for launches.
    fn block_size(&self) -> usize;

    /// Build the kernel, move `input` to the device, launch, and copy the
    /// result back, recording [`Checkpoints`] on the device clock.
    ///
    /// Any device fault is returned as an error; the caller treats it as
    /// fatal for the run.
    fn rotate_left(&self, input: &[i32]) -> RotResult<DeviceRun>;
}

impl<A: Accelerator + ?Sized> Accelerator for Box<A> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn block_size(&self) -> usize {
        (**self).block_size()
    }

    fn rotate_left(&self, input: &[i32]) -> RotResult<DeviceRun> {
        (**self).rotate_left(input)
    }
}

/// Block/grid shape for one launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaunchGeometry {
    /// Workers per block.
    pub block_size: usize,
    /// Number of blocks, `ceil(len / block_size)`.
    pub grid_size: usize,
}

impl LaunchGeometry {
    /// Geometry covering `len` elements with blocks of `block_size` workers.
    pub fn for_len(len: usize, block_size: usize) -> RotResult<Self> {
        if len == 0 {
            return Err(RotError::InvalidSize);
        }
        if block_size == 0 {
            return Err(RotError::InvalidConfig("block size must be positive".into()));
        }
        Ok(LaunchGeometry {
            block_size,
            grid_size: len.div_ceil(block_size),
        })
    }

    /// Total workers launched; at least `len`, the excess is masked off.
    pub fn global_size(&self) -> usize {
        self.grid_size * self.block_size
    }

    /// Split the grid into 2D `(x, y)` block counts so neither dimension
    /// exceeds `max_per_dim`. Workers linearize as `x + y * x_width`.
    pub fn tiled(&self, max_per_dim: u32) -> RotResult<(u32, u32)> {
        let max = max_per_dim.max(1) as usize;
        if self.grid_size <= max {
            return Ok((self.grid_size as u32, 1));
        }
        let rows = self.grid_size.div_ceil(max);
        if rows > max {
            return Err(RotError::Device(format!(
                "grid of {} blocks exceeds {max}x{max} dispatch limit",
                self.grid_size
            )));
        }
        Ok((max as u32, rows as u32))
    }
}

/// Which accelerator implementation to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// Host-emulated device, always available.
    Host,
    /// OpenCL device (feature `opencl`).
    OpenCl,
    /// wgpu device (feature `webgpu`).
    WebGpu,
}

impl Default for Backend {
    /// The first GPU backend compiled in, else the host emulation.
    fn default() -> Self {
        if cfg!(feature = "opencl") {
            Backend::OpenCl
        } else if cfg!(feature = "webgpu") {
            Backend::WebGpu
        } else {
            Backend::Host
        }
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Host => write!(f, "host"),
            Self::OpenCl => write!(f, "opencl"),
            Self::WebGpu => write!(f, "webgpu"),
        }
    }
}

/// Open an accelerator of the requested backend.
///
/// Returns [`RotError::DeviceUnavailable`] when the backend was not
/// compiled in or no device could be initialized.
pub fn open(backend: Backend, block_size: usize) -> RotResult<Box<dyn Accelerator>> {
    match backend {
        Backend::Host => Ok(Box::new(crate::host::HostDevice::new(block_size)?)),
        #[cfg(feature = "opencl")]
        Backend::OpenCl => Ok(Box::new(crate::opencl::OpenClDevice::new(block_size)?)),
        #[cfg(feature = "webgpu")]
        Backend::WebGpu => Ok(Box::new(crate::webgpu::WebGpuDevice::new(block_size)?)),
        #[allow(unreachable_patterns)]
        other => Err(RotError::DeviceUnavailable(format!(
            "backend `{other}` not compiled in"
        ))),
    }
}
