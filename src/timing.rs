//! Phase timing.
//!
//! The accelerator path records five checkpoints on the device's own clock
//! and reads them all after a single synchronization:
//!
//! ```text
//! start ──build──▶ built ──alloc + upload──▶ launch_start ──kernel──▶ launch_end ──download──▶ end
//! ```
//!
//! Program build and compute are bracketed directly. Memory movement is
//! the residual `total - build - compute`, so it covers allocation and both
//! copy directions without bracketing them separately. The CPU strategies
//! use one host-clock interval each.

use std::time::Instant;

const NANOS_PER_MILLI: f64 = 1_000_000.0;

/// Convert a nanosecond count to fractional milliseconds.
#[inline]
pub fn ns_to_ms(ns: u64) -> f64 {
    ns as f64 / NANOS_PER_MILLI
}

/// Raw checkpoint timestamps, in nanoseconds on one device clock.
///
/// The epoch is backend-defined; only differences are meaningful.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Checkpoints {
    pub start: u64,
    pub built: u64,
    pub launch_start: u64,
    pub launch_end: u64,
    pub end: u64,
}

impl Checkpoints {
    /// Whether the timestamps are monotonically non-decreasing.
    pub fn is_ordered(&self) -> bool {
        self.start <= self.built
            && self.built <= self.launch_start
            && self.launch_start <= self.launch_end
            && self.launch_end <= self.end
    }

    /// Shift every checkpoint so `start` becomes zero.
    pub fn rebased(&self) -> Checkpoints {
        let origin = self.start;
        Checkpoints {
            start: 0,
            built: self.built.saturating_sub(origin),
            launch_start: self.launch_start.saturating_sub(origin),
            launch_end: self.launch_end.saturating_sub(origin),
            end: self.end.saturating_sub(origin),
        }
    }

    /// Reduce the checkpoints to the three reported phases.
    pub fn phases(&self) -> PhaseBreakdown {
        let total = self.end.saturating_sub(self.start);
        let build = self.built.saturating_sub(self.start);
        let compute = self.launch_end.saturating_sub(self.launch_start);
        let memory = total.saturating_sub(build.saturating_add(compute));
        PhaseBreakdown {
            program_build_ms: ns_to_ms(build),
            memory_movement_ms: ns_to_ms(memory),
            compute_ms: ns_to_ms(compute),
        }
    }
}

/// Accelerator cost split into its three phases, in milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PhaseBreakdown {
    pub program_build_ms: f64,
    pub memory_movement_ms: f64,
    pub compute_ms: f64,
}

impl PhaseBreakdown {
    pub fn total_ms(&self) -> f64 {
        self.program_build_ms + self.memory_movement_ms + self.compute_ms
    }
}

/// Monotonic nanosecond clock for backends whose work is synchronous with
/// the host.
#[derive(Debug, Clone, Copy)]
pub struct HostClock {
    origin: Instant,
}

impl HostClock {
    pub fn start() -> Self {
        HostClock {
            origin: Instant::now(),
        }
    }

    /// Nanoseconds since [`HostClock::start`].
    pub fn now_ns(&self) -> u64 {
        u64::try_from(self.origin.elapsed().as_nanos()).unwrap_or(u64::MAX)
    }
}

/// Run `f` and return its result with the elapsed host time in milliseconds.
pub fn time_host<T>(f: impl FnOnce() -> T) -> (T, f64) {
    let start = Instant::now();
    let value = f();
    let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
    (value, elapsed_ms)
}
