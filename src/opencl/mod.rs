//! OpenCL accelerator backend.
//!
//! Runs the rotation kernel on an OpenCL device and records the phase
//! checkpoints as marker commands on a profiling-enabled in-order queue.
//! Each marker's `CL_PROFILING_COMMAND_END` is a device-clock timestamp
//! taken once everything enqueued before it has finished, so the markers
//! bracket device work the same way stream events do. Markers that precede
//! host-side work (the program build, buffer creation, the launch) are
//! flushed immediately so they reach the device before that work starts.
//! All five markers are read after a single `finish()`.
//!
//! ```text
//! marker(start) → build program → marker(built) → alloc + write →
//! marker(launch_start) → kernel → marker(launch_end) → read → marker(end)
//! ```
//!
//! # Feature Gate
//!
//! This module is only available when compiled with the `opencl` feature:
//! ```bash
//! cargo build --features opencl
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! # #[cfg(feature = "opencl")]
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! use rotbench::device::Accelerator;
//! use rotbench::opencl::OpenClDevice;
//!
//! let device = OpenClDevice::new(128)?;
//! println!("Using device: {}", device.name());
//!
//! let run = device.rotate_left(&[1, 2, 3, 4])?;
//! assert_eq!(run.output, vec![2, 3, 4, 1]);
//! # Ok(())
//! # }
//! ```

use crate::device::{Accelerator, DeviceRun, LaunchGeometry, ROTATE_ENTRY_POINT};
use crate::timing::Checkpoints;
use crate::{RotError, RotResult};

use opencl3::command_queue::{CommandQueue, CL_QUEUE_PROFILING_ENABLE};
use opencl3::context::Context;
use opencl3::device::{get_all_devices, Device, CL_DEVICE_TYPE_ALL, CL_DEVICE_TYPE_GPU};
use opencl3::event::Event;
use opencl3::kernel::{ExecuteKernel, Kernel};
use opencl3::memory::{Buffer, CL_MEM_READ_ONLY, CL_MEM_WRITE_ONLY};
use opencl3::program::Program;
use opencl3::types::{cl_device_type, cl_int, cl_mem_flags, cl_uint, CL_BLOCKING};

use tracing::debug;

use std::ptr;

/// Embedded OpenCL kernel source: one work-item per source index.
const ROTATE_KERNEL_SOURCE: &str = include_str!("../../kernels/rotate.cl");

/// Build options for the rotation program.
const BUILD_OPTIONS: &str = "-Werror";

/// Information about a discovered OpenCL device.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    /// Human-readable device name (e.g. "NVIDIA GeForce RTX 3080").
    pub name: String,
    /// Device vendor string.
    pub vendor: String,
    /// Whether this is a GPU device (vs CPU or accelerator).
    pub is_gpu: bool,
    /// Maximum work-group size supported by the device.
    pub max_work_group_size: usize,
    /// Global memory size in bytes.
    pub global_mem_size: u64,
}

/// Probe all available OpenCL devices without opening one.
///
/// Returns an empty vec if no OpenCL runtime is installed or no
/// devices are found (never errors).
pub fn probe_devices() -> Vec<DeviceInfo> {
    let device_ids = match get_all_devices(CL_DEVICE_TYPE_ALL) {
        Ok(ids) => ids,
        Err(_) => return Vec::new(),
    };

    device_ids
        .into_iter()
        .map(|id| {
            let dev = Device::new(id);
            let dev_type: cl_device_type = dev.dev_type().unwrap_or(0);
            DeviceInfo {
                name: dev.name().unwrap_or_default().trim().to_string(),
                vendor: dev.vendor().unwrap_or_default().trim().to_string(),
                is_gpu: (dev_type & CL_DEVICE_TYPE_GPU) != 0,
                max_work_group_size: dev.max_work_group_size().unwrap_or(1),
                global_mem_size: dev.global_mem_size().unwrap_or(0),
            }
        })
        .collect()
}

/// Return the number of available OpenCL devices. Returns 0 if OpenCL is
/// not available.
pub fn device_count() -> usize {
    get_all_devices(CL_DEVICE_TYPE_ALL)
        .map(|ids| ids.len())
        .unwrap_or(0)
}

/// OpenCL rotation device.
///
/// Holds the device, context, and profiling command queue for the whole
/// run. The program and buffers are per call.
pub struct OpenClDevice {
    _device: Device,
    context: Context,
    queue: CommandQueue,
    device_name: String,
    max_work_group_size: usize,
    block_size: usize,
}

impl std::fmt::Debug for OpenClDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenClDevice")
            .field("device_name", &self.device_name)
            .field("max_work_group_size", &self.max_work_group_size)
            .field("block_size", &self.block_size)
            .finish_non_exhaustive()
    }
}

impl OpenClDevice {
    /// Open the best available device, preferring GPUs.
    ///
    /// Among GPUs, the one with the most global memory is tried first
    /// (discrete over integrated). Every candidate must create a context
    /// and queue and compile the rotation kernel; the first that does is
    /// used.
    pub fn new(block_size: usize) -> RotResult<Self> {
        if block_size == 0 {
            return Err(RotError::InvalidConfig("block size must be positive".into()));
        }

        let all_ids = get_all_devices(CL_DEVICE_TYPE_ALL)
            .map_err(|e| RotError::DeviceUnavailable(format!("no OpenCL platform: {e}")))?;
        if all_ids.is_empty() {
            return Err(RotError::DeviceUnavailable("no OpenCL devices".into()));
        }

        let mut gpu_ids = get_all_devices(CL_DEVICE_TYPE_GPU).unwrap_or_default();
        gpu_ids.sort_by(|a, b| {
            let mem_a = Device::new(*a).global_mem_size().unwrap_or(0);
            let mem_b = Device::new(*b).global_mem_size().unwrap_or(0);
            mem_b.cmp(&mem_a)
        });
        let candidates: Vec<_> = gpu_ids.iter().chain(all_ids.iter()).copied().collect();

        let mut selected = None;
        for id in candidates {
            let dev = Device::new(id);
            let Ok(ctx) = Context::from_device(&dev) else {
                continue;
            };
            // OpenCL 1.2 API: macOS has no clCreateCommandQueueWithProperties.
            #[allow(deprecated)]
            let Ok(queue) = CommandQueue::create_default(&ctx, CL_QUEUE_PROFILING_ENABLE) else {
                continue;
            };
            if Program::create_and_build_from_source(&ctx, ROTATE_KERNEL_SOURCE, BUILD_OPTIONS)
                .is_err()
            {
                continue;
            }
            selected = Some((dev, ctx, queue));
            break;
        }
        let (device, context, queue) = selected.ok_or_else(|| {
            RotError::DeviceUnavailable("no OpenCL device could build the kernel".into())
        })?;

        let device_name = device.name().unwrap_or_default().trim().to_string();
        let max_work_group_size = device.max_work_group_size().unwrap_or(1);
        if block_size > max_work_group_size {
            return Err(RotError::InvalidConfig(format!(
                "block size {block_size} exceeds device work-group limit {max_work_group_size}"
            )));
        }
        debug!(device = %device_name, max_work_group_size, "opened OpenCL device");

        Ok(OpenClDevice {
            _device: device,
            context,
            queue,
            device_name,
            max_work_group_size,
            block_size,
        })
    }

    /// Return the maximum work-group size for the device.
    pub fn max_work_group_size(&self) -> usize {
        self.max_work_group_size
    }

    fn marker(&self) -> RotResult<Event> {
        unsafe {
            self.queue
                .enqueue_marker_with_wait_list(&[])
                .map_err(|e| RotError::Device(format!("enqueue marker: {e}")))
        }
    }

    /// Enqueue a marker and submit it to the device without waiting.
    fn flushed_marker(&self) -> RotResult<Event> {
        let event = self.marker()?;
        self.queue
            .flush()
            .map_err(|e| RotError::Device(format!("queue flush: {e}")))?;
        Ok(event)
    }

    fn build_kernel(&self) -> RotResult<Kernel> {
        let program =
            Program::create_and_build_from_source(&self.context, ROTATE_KERNEL_SOURCE, BUILD_OPTIONS)
                .map_err(RotError::Build)?;
        Kernel::create(&program, ROTATE_ENTRY_POINT).map_err(|e| RotError::Build(e.to_string()))
    }

    fn create_buffer(&self, flags: cl_mem_flags, len: usize) -> RotResult<Buffer<cl_int>> {
        unsafe {
            Buffer::<cl_int>::create(&self.context, flags, len, ptr::null_mut())
                .map_err(|e| RotError::Allocation(format!("{len} x i32: {e}")))
        }
    }
}

/// Device timestamp (ns) at which a completed marker finished.
fn marker_time(event: &Event) -> RotResult<u64> {
    event
        .profiling_command_end()
        .map_err(|e| RotError::Device(format!("read marker timestamp: {e}")))
}

impl Accelerator for OpenClDevice {
    fn name(&self) -> &str {
        &self.device_name
    }

    fn block_size(&self) -> usize {
        self.block_size
    }

    fn rotate_left(&self, input: &[i32]) -> RotResult<DeviceRun> {
        let geometry = LaunchGeometry::for_len(input.len(), self.block_size)?;
        let n = cl_uint::try_from(input.len())
            .map_err(|_| RotError::InvalidConfig(format!("{} elements exceed u32", input.len())))?;

        let start = self.flushed_marker()?;

        let kernel = self.build_kernel()?;
        let built = self.flushed_marker()?;

        let mut device_input = self.create_buffer(CL_MEM_READ_ONLY, input.len())?;
        let device_output = self.create_buffer(CL_MEM_WRITE_ONLY, input.len())?;
        unsafe {
            self.queue
                .enqueue_write_buffer(&mut device_input, CL_BLOCKING, 0, input, &[])
                .map_err(|e| RotError::Device(format!("host-to-device copy: {e}")))?;
        }

        let launch_start = self.flushed_marker()?;
        unsafe {
            ExecuteKernel::new(&kernel)
                .set_arg(&device_input)
                .set_arg(&device_output)
                .set_arg(&n)
                .set_global_work_size(geometry.global_size())
                .set_local_work_size(geometry.block_size)
                .enqueue_nd_range(&self.queue)
                .map_err(|e| RotError::Device(format!("kernel launch: {e}")))?;
        }
        let launch_end = self.flushed_marker()?;

        let mut output = vec![0 as cl_int; input.len()];
        unsafe {
            self.queue
                .enqueue_read_buffer(&device_output, CL_BLOCKING, 0, &mut output, &[])
                .map_err(|e| RotError::Device(format!("device-to-host copy: {e}")))?;
        }
        let end = self.marker()?;

        self.queue
            .finish()
            .map_err(|e| RotError::Device(format!("queue finish: {e}")))?;

        let checkpoints = Checkpoints {
            start: marker_time(&start)?,
            built: marker_time(&built)?,
            launch_start: marker_time(&launch_start)?,
            launch_end: marker_time(&launch_end)?,
            end: marker_time(&end)?,
        };
        if !checkpoints.is_ordered() {
            return Err(RotError::Device(format!(
                "device clock went backwards: {:?}",
                checkpoints.rebased()
            )));
        }
        debug!(size = input.len(), phases = ?checkpoints.phases(), "opencl rotation");

        Ok(DeviceRun {
            output,
            checkpoints,
        })
    }
}
