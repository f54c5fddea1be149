use super::*;

use std::cell::RefCell;
use std::collections::VecDeque;

use crate::device::DeviceRun;
use crate::rotate::rotate_left_vectorized;
use crate::sink::MemorySink;
use crate::timing::Checkpoints;
use crate::verify::{Comparison, Verdict};
use crate::RotError;

const PASS: Verdict = Verdict {
    accelerator: Comparison::Match,
    iterative: Comparison::Match,
};

const FAIL: Verdict = Verdict {
    accelerator: Comparison::ValueMismatch {
        index: 0,
        expected: 1,
        actual: 2,
    },
    iterative: Comparison::Match,
};

fn record(size: usize, fields: [f64; 5], verdict: Verdict) -> TrialRecord {
    TrialRecord {
        trial: 0,
        size,
        program_build_ms: fields[0],
        memory_movement_ms: fields[1],
        compute_ms: fields[2],
        cpu_iterative_ms: fields[3],
        cpu_vectorized_ms: fields[4],
        verdict,
    }
}

/// Rotates correctly and reports scripted program-build times
/// (in milliseconds), one per call, with fixed memory and compute phases.
struct ScriptedDevice {
    build_ms: RefCell<VecDeque<u64>>,
}

impl ScriptedDevice {
    fn new(build_ms: &[u64]) -> Self {
        ScriptedDevice {
            build_ms: RefCell::new(build_ms.iter().copied().collect()),
        }
    }
}

impl Accelerator for ScriptedDevice {
    fn name(&self) -> &str {
        "scripted"
    }

    fn block_size(&self) -> usize {
        128
    }

    fn rotate_left(&self, input: &[i32]) -> RotResult<DeviceRun> {
        let build = self
            .build_ms
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| RotError::Device("script exhausted".into()))?;
        let ms = 1_000_000;
        let built = build * ms;
        Ok(DeviceRun {
            output: rotate_left_vectorized(input),
            checkpoints: Checkpoints {
                start: 0,
                built,
                launch_start: built + ms,
                launch_end: built + 3 * ms,
                end: built + 4 * ms,
            },
        })
    }
}

// ---------------------------------------------------------------------------
// Outlier filter
// ---------------------------------------------------------------------------

#[test]
fn test_filter_ceiling_is_inclusive() {
    let filter = OutlierFilter::new(5.0);
    assert!(filter.admits(&record(8, [5.0, 0.0, 0.0, 0.0, 0.0], PASS)));
    assert!(filter.admits(&record(8, [0.0, 0.0, 0.0, 0.0, 0.0], PASS)));
    assert!(!filter.admits(&record(8, [5.000001, 0.0, 0.0, 0.0, 0.0], PASS)));
}

#[test]
fn test_filter_rejects_nan_build() {
    let filter = OutlierFilter::new(5.0);
    assert!(!filter.admits(&record(8, [f64::NAN, 0.0, 0.0, 0.0, 0.0], PASS)));
}

#[test]
fn test_filter_from_config() {
    let config = BenchConfig::default().with_build_ceiling_ms(2.5);
    assert_eq!(OutlierFilter::from(&config).ceiling_ms(), 2.5);
}

// ---------------------------------------------------------------------------
// Reduction
// ---------------------------------------------------------------------------

#[test]
fn test_four_passing_trials_average_every_field() {
    let records = [
        record(1000, [1.0, 2.0, 0.5, 10.0, 0.25], PASS),
        record(1000, [2.0, 4.0, 1.5, 20.0, 0.75], PASS),
        record(1000, [3.0, 6.0, 2.5, 30.0, 1.25], PASS),
        record(1000, [2.0, 4.0, 1.5, 40.0, 1.75], PASS),
    ];
    let agg = aggregate(1000, &records, &OutlierFilter::new(5.0)).unwrap();
    assert_eq!(agg.size, 1000);
    assert_eq!(agg.program_build_ms, 2.0);
    assert_eq!(agg.memory_movement_ms, 4.0);
    assert_eq!(agg.compute_ms, 1.5);
    assert_eq!(agg.cpu_iterative_ms, 25.0);
    assert_eq!(agg.cpu_vectorized_ms, 1.0);
}

#[test]
fn test_cold_start_trial_is_excluded() {
    let records = [
        record(1000, [250.0, 9.0, 9.0, 9.0, 9.0], PASS),
        record(1000, [1.0, 1.0, 1.0, 1.0, 1.0], PASS),
        record(1000, [3.0, 3.0, 3.0, 3.0, 3.0], PASS),
    ];
    let agg = aggregate(1000, &records, &OutlierFilter::new(5.0)).unwrap();
    assert_eq!(agg.program_build_ms, 2.0);
    assert_eq!(agg.memory_movement_ms, 2.0);
    assert!(agg.program_build_ms <= 5.0);
}

#[test]
fn test_all_filtered_emits_nothing() {
    let records = [
        record(1000, [6.0, 1.0, 1.0, 1.0, 1.0], PASS),
        record(1000, [7.0, 1.0, 1.0, 1.0, 1.0], PASS),
    ];
    assert!(aggregate(1000, &records, &OutlierFilter::new(5.0)).is_none());
}

#[test]
fn test_never_averages_across_sizes() {
    let records = [
        record(1000, [1.0, 1.0, 1.0, 1.0, 1.0], PASS),
        record(5000, [3.0, 3.0, 3.0, 3.0, 3.0], PASS),
    ];
    let filter = OutlierFilter::new(5.0);
    assert_eq!(aggregate(1000, &records, &filter).unwrap().compute_ms, 1.0);
    assert_eq!(aggregate(5000, &records, &filter).unwrap().compute_ms, 3.0);
    assert!(aggregate(25000, &records, &filter).is_none());
}

#[test]
fn test_failing_trials_still_counted_in_means() {
    let records = [
        record(8, [1.0, 1.0, 1.0, 1.0, 1.0], PASS),
        record(8, [3.0, 3.0, 3.0, 3.0, 3.0], FAIL),
    ];
    let agg = aggregate(8, &records, &OutlierFilter::new(5.0)).unwrap();
    assert_eq!(agg.cpu_iterative_ms, 2.0);
}

#[test]
fn test_speedups() {
    let agg = AggregateRecord {
        size: 10,
        program_build_ms: 1.0,
        memory_movement_ms: 2.0,
        compute_ms: 1.0,
        cpu_iterative_ms: 8.0,
        cpu_vectorized_ms: 2.0,
    };
    assert_eq!(agg.accelerator_total_ms(), 4.0);
    assert_eq!(agg.speedup_vs_iterative(), Some(2.0));
    assert_eq!(agg.speedup_vs_vectorized(), Some(0.5));

    let zero = AggregateRecord {
        program_build_ms: 0.0,
        memory_movement_ms: 0.0,
        compute_ms: 0.0,
        ..agg
    };
    assert_eq!(zero.speedup_vs_iterative(), None);
}

// ---------------------------------------------------------------------------
// Full runs
// ---------------------------------------------------------------------------

#[test]
fn test_run_size_with_scripted_builds() {
    let device = ScriptedDevice::new(&[40, 1, 2, 3]);
    let summary = run_size(1000, 4, &device, &OutlierFilter::new(5.0)).unwrap();
    assert_eq!(summary.trials_run, 4);
    assert_eq!(summary.trials_kept, 3);
    assert!(summary.failed_trials.is_empty());
    let agg = summary.record.unwrap();
    assert_eq!(agg.program_build_ms, 2.0);
    assert_eq!(agg.compute_ms, 2.0);
    // memory = total(build + 4) - build - compute(2) = 2
    assert_eq!(agg.memory_movement_ms, 2.0);
}

#[test]
fn test_run_benchmark_emits_in_ascending_order_and_omits_filtered() {
    // Sizes run ascending: 8, 1000, 5000. Size 1000 is all cold starts.
    let device = ScriptedDevice::new(&[1, 1, 9, 9, 2, 4]);
    let config = BenchConfig::default()
        .with_sizes(vec![5000, 8, 1000])
        .with_trials_per_size(2)
        .with_build_ceiling_ms(5.0);
    let mut sink = MemorySink::default();

    let report = run_benchmark(&config, &device, &mut sink).unwrap();

    let sizes: Vec<usize> = report.summaries.iter().map(|s| s.size).collect();
    assert_eq!(sizes, vec![8, 1000, 5000]);
    assert_eq!(report.omitted_sizes(), vec![1000]);
    assert_eq!(report.total_mismatches(), 0);

    let emitted: Vec<usize> = sink.records.iter().map(|r| r.size).collect();
    assert_eq!(emitted, vec![8, 5000]);
    assert_eq!(sink.records, report.records());
    assert_eq!(sink.records[0].program_build_ms, 1.0);
    assert_eq!(sink.records[1].program_build_ms, 3.0);
    assert!(sink.finished);
}

#[test]
fn test_run_benchmark_on_host_device() {
    let device = crate::host::HostDevice::new(128).unwrap();
    // Generous ceiling: the host build phase is effectively free.
    let config = BenchConfig::default()
        .with_sizes(vec![1, 1000])
        .with_trials_per_size(4)
        .with_build_ceiling_ms(1_000.0);
    let mut sink = MemorySink::default();

    let report = run_benchmark(&config, &device, &mut sink).unwrap();

    assert_eq!(sink.records.len(), 2);
    for summary in &report.summaries {
        assert_eq!(summary.trials_run, 4);
        assert_eq!(summary.trials_kept, 4);
        assert!(summary.failed_trials.is_empty());
    }
}

#[test]
fn test_run_benchmark_rejects_invalid_config() {
    let device = crate::host::HostDevice::new(128).unwrap();
    let config = BenchConfig::default().with_trials_per_size(0);
    let mut sink = MemorySink::default();
    assert!(matches!(
        run_benchmark(&config, &device, &mut sink),
        Err(RotError::InvalidConfig(_))
    ));
    assert!(sink.records.is_empty());
}

#[test]
fn test_run_benchmark_stops_on_device_fault() {
    // Script covers only the first size; the second size's first trial fails.
    let device = ScriptedDevice::new(&[1, 1]);
    let config = BenchConfig::default()
        .with_sizes(vec![10, 20])
        .with_trials_per_size(2);
    let mut sink = MemorySink::default();

    let err = run_benchmark(&config, &device, &mut sink).unwrap_err();
    assert!(matches!(err, RotError::Device(_)));
    // The first size was persisted before the fault.
    assert_eq!(sink.records.len(), 1);
    assert_eq!(sink.records[0].size, 10);
    assert!(!sink.finished);
}

/// Correct device that corrupts its output on the listed calls (from 0).
struct FlakyDevice {
    calls: std::cell::Cell<usize>,
    corrupt_on: Vec<usize>,
}

impl Accelerator for FlakyDevice {
    fn name(&self) -> &str {
        "flaky"
    }

    fn block_size(&self) -> usize {
        128
    }

    fn rotate_left(&self, input: &[i32]) -> RotResult<DeviceRun> {
        let call = self.calls.get();
        self.calls.set(call + 1);
        let mut output = rotate_left_vectorized(input);
        if self.corrupt_on.contains(&call) {
            output[0] = output[0].wrapping_add(1);
        }
        Ok(DeviceRun {
            output,
            checkpoints: Checkpoints::default(),
        })
    }
}

#[test]
fn test_run_size_reports_which_trials_failed() {
    let device = FlakyDevice {
        calls: std::cell::Cell::new(0),
        corrupt_on: vec![1, 3],
    };
    let summary = run_size(100, 4, &device, &OutlierFilter::new(5.0)).unwrap();
    assert_eq!(summary.failed_trials, vec![1, 3]);
    assert_eq!(summary.mismatches(), 2);
    // Failing trials still count toward the means.
    assert_eq!(summary.trials_kept, 4);
    assert!(summary.record.is_some());
}

// ---------------------------------------------------------------------------
// Property tests
// ---------------------------------------------------------------------------

mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn arb_record() -> impl Strategy<Value = TrialRecord> {
        (
            prop::sample::select(vec![8usize, 1000]),
            0.0f64..20.0,
            0.0f64..10.0,
            0.0f64..10.0,
            any::<bool>(),
        )
            .prop_map(|(size, build, memory, compute, passed)| {
                let verdict = if passed { PASS } else { FAIL };
                record(size, [build, memory, compute, 1.0, 1.0], verdict)
            })
    }

    proptest! {
        #[test]
        fn filter_never_admits_above_ceiling(
            records in prop::collection::vec(arb_record(), 0..16),
            ceiling in 0.0f64..20.0,
        ) {
            let filter = OutlierFilter::new(ceiling);
            for r in &records {
                prop_assert_eq!(filter.admits(r), r.program_build_ms <= ceiling);
            }
        }

        #[test]
        fn aggregate_build_mean_within_ceiling(
            records in prop::collection::vec(arb_record(), 0..16),
            ceiling in 0.0f64..20.0,
        ) {
            let filter = OutlierFilter::new(ceiling);
            let admitted = records
                .iter()
                .filter(|r| r.size == 1000 && r.program_build_ms <= ceiling)
                .count();
            match aggregate(1000, &records, &filter) {
                Some(agg) => {
                    prop_assert!(admitted > 0);
                    prop_assert_eq!(agg.size, 1000);
                    // Allow for summation rounding in the mean.
                    prop_assert!(agg.program_build_ms <= ceiling + 1e-9);
                }
                None => {
                    prop_assert_eq!(admitted, 0);
                }
            }
        }
    }
}
