//! Host-emulated accelerator.
//!
//! Executes the rotation kernel's grid on the calling thread: blocks in
//! order, workers within a block in order, each worker masked off when its
//! global index is past the end of the input. Its "device" buffers are host
//! allocations and its clock is the host monotonic clock, which is valid
//! here because every step completes before the next checkpoint is taken.
//!
//! Always available, so the harness and its tests run on machines without
//! a GPU runtime.

use crate::device::{Accelerator, DeviceRun, LaunchGeometry};
use crate::rotate::destination_index;
use crate::timing::{Checkpoints, HostClock};
use crate::{RotError, RotResult};

/// A compiled host kernel: the launch shape bound to the worker body.
struct HostKernel {
    geometry: LaunchGeometry,
}

impl HostKernel {
    fn build(len: usize, block_size: usize) -> RotResult<Self> {
        Ok(HostKernel {
            geometry: LaunchGeometry::for_len(len, block_size)?,
        })
    }

    /// Run every worker of every block.
    fn launch(&self, input: &[i32], output: &mut [i32]) {
        let n = input.len();
        let block_size = self.geometry.block_size;
        for block in 0..self.geometry.grid_size {
            for thread in 0..block_size {
                let idx = block * block_size + thread;
                if idx < n {
                    output[destination_index(idx, n)] = input[idx];
                }
            }
        }
    }
}

/// Accelerator that emulates the kernel grid on the host CPU.
#[derive(Debug, Clone)]
pub struct HostDevice {
    block_size: usize,
}

impl HostDevice {
    pub fn new(block_size: usize) -> RotResult<Self> {
        if block_size == 0 {
            return Err(RotError::InvalidConfig("block size must be positive".into()));
        }
        Ok(HostDevice { block_size })
    }
}

impl Accelerator for HostDevice {
    fn name(&self) -> &str {
        "host-emulated"
    }

    fn block_size(&self) -> usize {
        self.block_size
    }

    fn rotate_left(&self, input: &[i32]) -> RotResult<DeviceRun> {
        if input.is_empty() {
            return Err(RotError::InvalidSize);
        }
        let clock = HostClock::start();
        let start = clock.now_ns();

        let kernel = HostKernel::build(input.len(), self.block_size)?;
        let built = clock.now_ns();

        let device_input = input.to_vec();
        let mut device_output = vec![0i32; input.len()];
        let launch_start = clock.now_ns();

        kernel.launch(&device_input, &mut device_output);
        let launch_end = clock.now_ns();

        let output = device_output.clone();
        drop(device_input);
        drop(device_output);
        let end = clock.now_ns();

        Ok(DeviceRun {
            output,
            checkpoints: Checkpoints {
                start,
                built,
                launch_start,
                launch_end,
                end,
            },
        })
    }
}
