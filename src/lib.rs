//! Phase-timed benchmark harness for circular left-rotation.
//!
//! Runs the same rotation three ways (an accelerator kernel, a scalar CPU
//! loop, and a bulk-copy CPU version) over a list of input sizes, checks
//! that all three agree exactly, and reduces repeated trials to per-size
//! mean timings with cold-start program builds filtered out.
//!
//! ```rust,no_run
//! use rotbench::aggregate::run_benchmark;
//! use rotbench::config::BenchConfig;
//! use rotbench::host::HostDevice;
//! use rotbench::sink::MemorySink;
//!
//! # fn main() -> rotbench::RotResult<()> {
//! let config = BenchConfig::default().with_sizes(vec![1000, 5000]);
//! let device = HostDevice::new(config.block_size)?;
//! let mut sink = MemorySink::default();
//! let report = run_benchmark(&config, &device, &mut sink)?;
//! assert_eq!(report.summaries.len(), 2);
//! # Ok(())
//! # }
//! ```

pub mod aggregate;
pub mod config;
pub mod device;
pub mod host;
pub mod rotate;
pub mod sink;
pub mod timing;
pub mod trial;
pub mod verify;
pub mod workload;

#[cfg(feature = "opencl")]
pub mod opencl;

#[cfg(feature = "webgpu")]
pub mod webgpu;

#[cfg(test)]
mod validation;

/// Error types for rotbench operations.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum RotError {
    /// A workload or rotation was requested for zero elements.
    #[error("input size must be at least 1")]
    InvalidSize,
    /// The benchmark configuration is unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// No usable accelerator device (or backend not compiled in).
    #[error("accelerator unavailable: {0}")]
    DeviceUnavailable(String),
    /// The device program failed to compile.
    #[error("program build failed: {0}")]
    Build(String),
    /// A device buffer could not be allocated.
    #[error("device allocation failed: {0}")]
    Allocation(String),
    /// A transfer, launch, or timer readback failed on the device.
    #[error("device error: {0}")]
    Device(String),
    /// Writing results failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type RotResult<T> = Result<T, RotError>;
