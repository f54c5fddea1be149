//! One trial: all three strategies against one workload, strictly in
//! sequence so no strategy's timing overlaps another's.

use tracing::{debug, warn};

use crate::device::Accelerator;
use crate::rotate::{rotate_left_iterative, rotate_left_vectorized};
use crate::timing::time_host;
use crate::verify::{self, Verdict};
use crate::{RotError, RotResult};

/// Timings and verdict from one trial. All durations are milliseconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrialRecord {
    /// Position of this trial within its size, from 0.
    pub trial: usize,
    pub size: usize,
    pub program_build_ms: f64,
    pub memory_movement_ms: f64,
    pub compute_ms: f64,
    pub cpu_iterative_ms: f64,
    pub cpu_vectorized_ms: f64,
    pub verdict: Verdict,
}

impl TrialRecord {
    /// Sum of the three accelerator phases.
    pub fn accelerator_total_ms(&self) -> f64 {
        self.program_build_ms + self.memory_movement_ms + self.compute_ms
    }
}

/// Run the accelerator, CPU-iterative and CPU-vectorized strategies on
/// `workload`, time them, and check their outputs. `trial` is the trial's
/// index within its size and tags the record and its log events.
///
/// Accelerator faults propagate as errors. An equivalence mismatch does
/// not: the record is returned with a failing verdict and a warning is
/// logged.
pub fn run_trial(
    device: &dyn Accelerator,
    trial: usize,
    workload: &[i32],
) -> RotResult<TrialRecord> {
    if workload.is_empty() {
        return Err(RotError::InvalidSize);
    }

    let run = device.rotate_left(workload)?;
    let phases = run.phases();

    let (iterative, cpu_iterative_ms) = time_host(|| rotate_left_iterative(workload));
    let (vectorized, cpu_vectorized_ms) = time_host(|| rotate_left_vectorized(workload));

    let verdict = verify::check(&run.output, &iterative, &vectorized);
    if !verdict.passed() {
        warn!(
            trial,
            size = workload.len(),
            device = device.name(),
            "{verdict}"
        );
    }

    let record = TrialRecord {
        trial,
        size: workload.len(),
        program_build_ms: phases.program_build_ms,
        memory_movement_ms: phases.memory_movement_ms,
        compute_ms: phases.compute_ms,
        cpu_iterative_ms,
        cpu_vectorized_ms,
        verdict,
    };
    debug!(
        trial,
        size = record.size,
        build_ms = record.program_build_ms,
        memory_ms = record.memory_movement_ms,
        compute_ms = record.compute_ms,
        cpu_iterative_ms = record.cpu_iterative_ms,
        cpu_vectorized_ms = record.cpu_vectorized_ms,
        passed = verdict.passed(),
        "trial complete"
    );
    Ok(record)
}
