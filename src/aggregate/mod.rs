//! Trial aggregation.
//!
//! Per input size: run the configured number of trials, drop trials whose
//! program build exceeded the ceiling (cold-start JIT), and average what
//! remains into one [`AggregateRecord`]. A size whose trials are all
//! dropped produces no record at all.
//!
//! Trials that fail the equivalence check still contribute their timings;
//! they are counted in [`SizeSummary::mismatches`] and logged so the
//! failure is visible next to the means.

use tracing::{info, warn};

use crate::config::BenchConfig;
use crate::device::Accelerator;
use crate::sink::ResultSink;
use crate::trial::{run_trial, TrialRecord};
use crate::workload;
use crate::RotResult;

/// Admits a trial iff its program-build phase is at most the ceiling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutlierFilter {
    build_ceiling_ms: f64,
}

impl OutlierFilter {
    pub fn new(build_ceiling_ms: f64) -> Self {
        OutlierFilter { build_ceiling_ms }
    }

    pub fn ceiling_ms(&self) -> f64 {
        self.build_ceiling_ms
    }

    /// A NaN build time is never admitted.
    pub fn admits(&self, record: &TrialRecord) -> bool {
        record.program_build_ms <= self.build_ceiling_ms
    }
}

impl From<&BenchConfig> for OutlierFilter {
    fn from(config: &BenchConfig) -> Self {
        OutlierFilter::new(config.build_ceiling_ms)
    }
}

/// Mean timings for one input size, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AggregateRecord {
    pub size: usize,
    pub program_build_ms: f64,
    pub memory_movement_ms: f64,
    pub compute_ms: f64,
    pub cpu_iterative_ms: f64,
    pub cpu_vectorized_ms: f64,
}

impl AggregateRecord {
    /// Sum of the three accelerator phase means.
    pub fn accelerator_total_ms(&self) -> f64 {
        self.program_build_ms + self.memory_movement_ms + self.compute_ms
    }

    /// CPU-iterative time over accelerator total; `None` if the total is zero.
    pub fn speedup_vs_iterative(&self) -> Option<f64> {
        ratio(self.cpu_iterative_ms, self.accelerator_total_ms())
    }

    /// CPU-vectorized time over accelerator total; `None` if the total is zero.
    pub fn speedup_vs_vectorized(&self) -> Option<f64> {
        ratio(self.cpu_vectorized_ms, self.accelerator_total_ms())
    }
}

fn ratio(numerator: f64, denominator: f64) -> Option<f64> {
    if denominator > 0.0 {
        Some(numerator / denominator)
    } else {
        None
    }
}

/// Average the admitted records of exactly `size`.
///
/// Records of other sizes are ignored. Returns `None` when no record of
/// that size survives the filter.
pub fn aggregate(
    size: usize,
    records: &[TrialRecord],
    filter: &OutlierFilter,
) -> Option<AggregateRecord> {
    let kept: Vec<&TrialRecord> = records
        .iter()
        .filter(|r| r.size == size && filter.admits(r))
        .collect();
    if kept.is_empty() {
        return None;
    }
    let count = kept.len() as f64;
    let mean = |field: fn(&TrialRecord) -> f64| kept.iter().map(|r| field(r)).sum::<f64>() / count;
    Some(AggregateRecord {
        size,
        program_build_ms: mean(|r| r.program_build_ms),
        memory_movement_ms: mean(|r| r.memory_movement_ms),
        compute_ms: mean(|r| r.compute_ms),
        cpu_iterative_ms: mean(|r| r.cpu_iterative_ms),
        cpu_vectorized_ms: mean(|r| r.cpu_vectorized_ms),
    })
}

/// What happened for one input size.
#[derive(Debug, Clone, PartialEq)]
pub struct SizeSummary {
    pub size: usize,
    pub trials_run: usize,
    /// Trials admitted by the outlier filter.
    pub trials_kept: usize,
    /// Indices of trials whose outputs were not all equal.
    pub failed_trials: Vec<usize>,
    /// `None` when every trial was filtered out.
    pub record: Option<AggregateRecord>,
}

impl SizeSummary {
    /// Number of trials whose outputs were not all equal.
    pub fn mismatches(&self) -> usize {
        self.failed_trials.len()
    }
}

/// Outcome of a full benchmark run, one summary per size in run order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BenchReport {
    pub summaries: Vec<SizeSummary>,
}

impl BenchReport {
    /// Emitted aggregate records, ascending by size.
    pub fn records(&self) -> Vec<AggregateRecord> {
        self.summaries.iter().filter_map(|s| s.record).collect()
    }

    pub fn total_mismatches(&self) -> usize {
        self.summaries.iter().map(SizeSummary::mismatches).sum()
    }

    /// Sizes that produced no record.
    pub fn omitted_sizes(&self) -> Vec<usize> {
        self.summaries
            .iter()
            .filter(|s| s.record.is_none())
            .map(|s| s.size)
            .collect()
    }
}

/// Run `trials` trials at `size` and reduce them.
///
/// Each trial gets its own freshly generated workload, dropped once the
/// trial's checks are done.
pub fn run_size(
    size: usize,
    trials: usize,
    device: &dyn Accelerator,
    filter: &OutlierFilter,
) -> RotResult<SizeSummary> {
    let mut records = Vec::with_capacity(trials);
    for trial in 0..trials {
        let data = workload::generate(size)?;
        records.push(run_trial(device, trial, &data)?);
    }

    let failed_trials: Vec<usize> = records
        .iter()
        .filter(|r| !r.verdict.passed())
        .map(|r| r.trial)
        .collect();
    let trials_kept = records.iter().filter(|r| filter.admits(r)).count();
    let record = aggregate(size, &records, filter);

    Ok(SizeSummary {
        size,
        trials_run: records.len(),
        trials_kept,
        failed_trials,
        record,
    })
}

/// Benchmark every configured size in ascending order, passing each
/// aggregate to `sink` as soon as it is computed.
///
/// Accelerator faults and sink errors abort the run. Mismatches and
/// fully filtered sizes are logged and the run continues.
pub fn run_benchmark(
    config: &BenchConfig,
    device: &dyn Accelerator,
    sink: &mut dyn ResultSink,
) -> RotResult<BenchReport> {
    config.validate()?;
    let filter = OutlierFilter::from(config);
    let mut report = BenchReport::default();

    for size in config.ordered_sizes() {
        let summary = run_size(size, config.trials_per_size, device, &filter)?;

        if summary.mismatches() > 0 {
            warn!(
                size,
                failed_trials = ?summary.failed_trials,
                trials = summary.trials_run,
                "outputs do not match; timings still included in the means"
            );
        }

        match &summary.record {
            Some(record) => {
                info!(
                    size,
                    kept = summary.trials_kept,
                    build_ms = record.program_build_ms,
                    memory_ms = record.memory_movement_ms,
                    compute_ms = record.compute_ms,
                    cpu_iterative_ms = record.cpu_iterative_ms,
                    cpu_vectorized_ms = record.cpu_vectorized_ms,
                    "size complete"
                );
                sink.record(record)?;
            }
            None => warn!(
                size,
                trials = summary.trials_run,
                ceiling_ms = filter.ceiling_ms(),
                "every trial exceeded the build ceiling; size omitted"
            ),
        }

        report.summaries.push(summary);
    }

    sink.finish()?;
    Ok(report)
}

#[cfg(test)]
#[path = "tests.rs"]
mod tests;
