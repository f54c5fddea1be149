//! WebGPU (wgpu) accelerator backend.
//!
//! Runs the rotation kernel through wgpu, which supports Vulkan, Metal,
//! DX12, and WebGPU. Phase checkpoints are timestamp queries written into
//! the command stream between submissions, so each one is taken on the
//! device timeline after the work submitted before it. All five are
//! resolved into one buffer and read back after a single blocking poll.
//!
//! Requires an adapter with `TIMESTAMP_QUERY` and
//! `TIMESTAMP_QUERY_INSIDE_ENCODERS`; without them there is no device clock
//! to bracket the phases and [`WebGpuDevice::new`] reports the backend as
//! unavailable.
//!
//! # Feature Gate
//!
//! This module is only available when compiled with the `webgpu` feature:
//! ```bash
//! cargo build --features webgpu
//! ```

use crate::device::{Accelerator, DeviceRun, LaunchGeometry, ROTATE_ENTRY_POINT};
use crate::timing::Checkpoints;
use crate::{RotError, RotResult};

use tracing::debug;


/// Embedded WGSL kernel source. `WORKGROUP_SIZE` is supplied by
/// [`kernel_source`].
const ROTATE_KERNEL_SOURCE: &str = include_str!("../../kernels/rotate.wgsl");

/// Timestamps written per rotation: start, built, launch_start, launch_end, end.
const CHECKPOINT_COUNT: u32 = 5;


/// Information about a discovered WebGPU adapter.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    /// Human-readable device name.
    pub name: String,
    /// Device vendor string.
    pub vendor: String,
    /// Whether this is a discrete or integrated GPU.
    pub is_gpu: bool,
    /// Whether the adapter can write timestamps inside command encoders.
    pub supports_timestamps: bool,
}

/// Probe all available WebGPU adapters without opening a device.
pub fn probe_devices() -> Vec<DeviceInfo> {
    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        ..Default::default()
    });

    instance
        .enumerate_adapters(wgpu::Backends::all())
        .into_iter()
        .map(|adapter| {
            let info = adapter.get_info();
            DeviceInfo {
                name: info.name.clone(),
                vendor: format!("{:?}", info.vendor),
                is_gpu: matches!(
                    info.device_type,
                    wgpu::DeviceType::DiscreteGpu | wgpu::DeviceType::IntegratedGpu
                ),
                supports_timestamps: adapter.features().contains(required_features()),
            }
        })
        .collect()
}

/// Return the number of available WebGPU adapters.
pub fn device_count() -> usize {
    probe_devices().len()
}

fn required_features() -> wgpu::Features {
    wgpu::Features::TIMESTAMP_QUERY | wgpu::Features::TIMESTAMP_QUERY_INSIDE_ENCODERS
}

/// WGSL source with the workgroup size bound as a module-scope constant.
fn kernel_source(block_size: usize) -> String {
    format!("const WORKGROUP_SIZE: u32 = {block_size}u;\n{ROTATE_KERNEL_SOURCE}")
}

/// Uniform parameters matching `Params` in rotate.wgsl.
/// 4 x u32 = 16 bytes.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Params {
    n: u32,
    dispatch_width: u32,
    _pad: [u32; 2],
}

impl Params {
    fn new(n: u32, dispatch_width: u32) -> Self {
        Params {
            n,
            dispatch_width,
            _pad: [0; 2],
        }
    }
}

// SAFETY: Params is repr(C) with all-u32 fields, which are Pod/Zeroable.
unsafe impl bytemuck::Pod for Params {}
unsafe impl bytemuck::Zeroable for Params {}

/// wgpu rotation device.
pub struct WebGpuDevice {
    device: wgpu::Device,
    queue: wgpu::Queue,
    device_name: String,
    max_workgroups_per_dim: u32,
    /// Nanoseconds per timestamp tick.
    timestamp_period: f32,
    block_size: usize,
}

impl std::fmt::Debug for WebGpuDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebGpuDevice")
            .field("device_name", &self.device_name)
            .field("block_size", &self.block_size)
            .finish_non_exhaustive()
    }
}

impl WebGpuDevice {
    /// Open a high-performance GPU adapter with timestamp support.
    pub fn new(block_size: usize) -> RotResult<Self> {
        if block_size == 0 {
            return Err(RotError::InvalidConfig("block size must be positive".into()));
        }

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            force_fallback_adapter: false,
            compatible_surface: None,
        }))
        .map_err(|e| RotError::DeviceUnavailable(e.to_string()))?;

        let info = adapter.get_info();
        // Software adapters (e.g. WARP) are too slow to be worth timing.
        if matches!(info.device_type, wgpu::DeviceType::Cpu) {
            return Err(RotError::DeviceUnavailable(format!(
                "{} is a software adapter",
                info.name
            )));
        }
        if !adapter.features().contains(required_features()) {
            return Err(RotError::DeviceUnavailable(format!(
                "{} lacks timestamp queries inside encoders",
                info.name
            )));
        }

        let limits = adapter.limits();
        let max_group = limits
            .max_compute_workgroup_size_x
            .min(limits.max_compute_invocations_per_workgroup) as usize;
        if block_size > max_group {
            return Err(RotError::InvalidConfig(format!(
                "block size {block_size} exceeds device workgroup limit {max_group}"
            )));
        }
        let max_workgroups_per_dim = limits.max_compute_workgroups_per_dimension;

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("rotbench-webgpu"),
            required_features: required_features(),
            required_limits: limits,
            memory_hints: wgpu::MemoryHints::Performance,
            experimental_features: wgpu::ExperimentalFeatures::disabled(),
            trace: wgpu::Trace::Off,
        }))
        .map_err(|e| RotError::DeviceUnavailable(e.to_string()))?;

        let timestamp_period = queue.get_timestamp_period();
        debug!(device = %info.name, timestamp_period, "opened WebGPU device");

        Ok(WebGpuDevice {
            device,
            queue,
            device_name: info.name,
            max_workgroups_per_dim,
            timestamp_period,
            block_size,
        })
    }

    /// Submit an encoder that only writes timestamp `index`.
    fn stamp(&self, query_set: &wgpu::QuerySet, index: u32) {
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("checkpoint"),
            });
        encoder.write_timestamp(query_set, index);
        self.queue.submit(Some(encoder.finish()));
    }

    fn create_buffer(&self, label: &str, size: u64, usage: wgpu::BufferUsages) -> wgpu::Buffer {
        self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size,
            usage,
            mapped_at_creation: false,
        })
    }

    fn build_pipeline(&self) -> RotResult<wgpu::ComputePipeline> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("rotate"),
                source: wgpu::ShaderSource::Wgsl(kernel_source(self.block_size).into()),
            });
        let pipeline = self
            .device
            .create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some("rotate"),
                layout: None,
                module: &module,
                entry_point: Some(ROTATE_ENTRY_POINT),
                compilation_options: Default::default(),
                cache: None,
            });
        match pollster::block_on(self.device.pop_error_scope()) {
            Some(err) => Err(RotError::Build(err.to_string())),
            None => Ok(pipeline),
        }
    }

    /// Block until the device is idle.
    fn poll_wait(&self) -> RotResult<()> {
        self.device
            .poll(wgpu::PollType::wait_indefinitely())
            .map(|_| ())
            .map_err(|e| RotError::Device(format!("poll: {e}")))
    }

    /// Map a MAP_READ buffer, wait for it, and copy its contents out as `T`.
    fn read_mapped<T: bytemuck::Pod>(&self, buffer: &wgpu::Buffer) -> RotResult<Vec<T>> {
        let slice = buffer.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.poll_wait()?;
        rx.recv()
            .map_err(|e| RotError::Device(format!("map callback dropped: {e}")))?
            .map_err(|e| RotError::Device(format!("map buffer: {e}")))?;

        let mapped = slice.get_mapped_range();
        let data = bytemuck::cast_slice::<u8, T>(&mapped).to_vec();
        drop(mapped);
        buffer.unmap();
        Ok(data)
    }

    fn ticks_to_ns(&self, ticks: u64) -> u64 {
        (ticks as f64 * self.timestamp_period as f64) as u64
    }
}

impl Accelerator for WebGpuDevice {
    fn name(&self) -> &str {
        &self.device_name
    }

    fn block_size(&self) -> usize {
        self.block_size
    }

    fn rotate_left(&self, input: &[i32]) -> RotResult<DeviceRun> {
        let geometry = LaunchGeometry::for_len(input.len(), self.block_size)?;
        let (wx, wy) = geometry.tiled(self.max_workgroups_per_dim)?;
        let n = u32::try_from(input.len())
            .map_err(|_| RotError::InvalidConfig(format!("{} elements exceed u32", input.len())))?;
        let dispatch_width = wx * self.block_size as u32;
        let bytes = std::mem::size_of_val(input) as u64;
        let query_bytes = CHECKPOINT_COUNT as u64 * wgpu::QUERY_SIZE as u64;

        let query_set = self.device.create_query_set(&wgpu::QuerySetDescriptor {
            label: Some("rotate_checkpoints"),
            ty: wgpu::QueryType::Timestamp,
            count: CHECKPOINT_COUNT,
        });

        self.stamp(&query_set, 0);

        let pipeline = self.build_pipeline()?;
        self.stamp(&query_set, 1);

        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        let input_buf = self.create_buffer(
            "rotate_input",
            bytes,
            wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
        );
        let output_buf = self.create_buffer(
            "rotate_output",
            bytes,
            wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
        );
        let params_buf = self.create_buffer(
            "rotate_params",
            std::mem::size_of::<Params>() as u64,
            wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        );
        let staging_buf = self.create_buffer(
            "rotate_staging",
            bytes,
            wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
        );
        let resolve_buf = self.create_buffer(
            "checkpoint_resolve",
            query_bytes,
            wgpu::BufferUsages::QUERY_RESOLVE | wgpu::BufferUsages::COPY_SRC,
        );
        let checkpoint_staging = self.create_buffer(
            "checkpoint_staging",
            query_bytes,
            wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
        );
        if let Some(err) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(RotError::Allocation(err.to_string()));
        }

        // Staged writes execute at the start of the next submission,
        // after checkpoint 1 and before checkpoint 2.
        self.queue
            .write_buffer(&input_buf, 0, bytemuck::cast_slice(input));
        let params = Params::new(n, dispatch_width);
        self.queue
            .write_buffer(&params_buf, 0, bytemuck::bytes_of(&params));

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("rotate"),
            layout: &pipeline.get_bind_group_layout(0),
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: input_buf.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: output_buf.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: params_buf.as_entire_binding(),
                },
            ],
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("rotate"),
            });
        encoder.write_timestamp(&query_set, 2);
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("rotate"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups(wx, wy, 1);
        }
        encoder.write_timestamp(&query_set, 3);
        encoder.copy_buffer_to_buffer(&output_buf, 0, &staging_buf, 0, bytes);
        encoder.write_timestamp(&query_set, 4);
        encoder.resolve_query_set(&query_set, 0..CHECKPOINT_COUNT, &resolve_buf, 0);
        encoder.copy_buffer_to_buffer(&resolve_buf, 0, &checkpoint_staging, 0, query_bytes);
        self.queue.submit(Some(encoder.finish()));

        let output: Vec<i32> = self.read_mapped(&staging_buf)?;
        let stamps: Vec<u64> = self
            .read_mapped::<u64>(&checkpoint_staging)?
            .into_iter()
            .map(|ticks| self.ticks_to_ns(ticks))
            .collect();
        if stamps.len() != CHECKPOINT_COUNT as usize {
            return Err(RotError::Device(format!(
                "expected {CHECKPOINT_COUNT} timestamps, read {}",
                stamps.len()
            )));
        }

        let checkpoints = Checkpoints {
            start: stamps[0],
            built: stamps[1],
            launch_start: stamps[2],
            launch_end: stamps[3],
            end: stamps[4],
        };
        if !checkpoints.is_ordered() {
            return Err(RotError::Device(format!(
                "device clock went backwards: {:?}",
                checkpoints.rebased()
            )));
        }
        debug!(size = input.len(), phases = ?checkpoints.phases(), "webgpu rotation");

        Ok(DeviceRun {
            output,
            checkpoints,
        })
    }
}
