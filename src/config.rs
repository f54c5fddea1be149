//! Benchmark parameters: which sizes to run, how many trials per size,
//! and the program-build ceiling used to drop cold-start trials.

use crate::{RotError, RotResult};

/// Input sizes of the reference workload, smallest first.
pub const DEFAULT_SIZES: &[usize] = &[
    1_000, 5_000, 25_000, 125_000, 625_000, 3_125_000, 6_250_000, 12_500_000,
];

/// Trials run for every input size.
pub const DEFAULT_TRIALS_PER_SIZE: usize = 4;

/// Trials whose program-build phase exceeds this many milliseconds are
/// treated as one-time JIT compilation and left out of the means.
pub const DEFAULT_BUILD_CEILING_MS: f64 = 5.0;

/// Workers per block for the accelerator kernel.
pub const DEFAULT_BLOCK_SIZE: usize = 128;

/// Full parameter set for one benchmark run.
#[derive(Debug, Clone, PartialEq)]
pub struct BenchConfig {
    /// Input sizes to benchmark. Order and duplicates do not matter;
    /// see [`BenchConfig::ordered_sizes`].
    pub sizes: Vec<usize>,
    /// Trials per size.
    pub trials_per_size: usize,
    /// Outlier ceiling for the program-build phase, in milliseconds.
    pub build_ceiling_ms: f64,
    /// Accelerator block size (workers per block).
    pub block_size: usize,
}

impl Default for BenchConfig {
    fn default() -> Self {
        BenchConfig {
            sizes: DEFAULT_SIZES.to_vec(),
            trials_per_size: DEFAULT_TRIALS_PER_SIZE,
            build_ceiling_ms: DEFAULT_BUILD_CEILING_MS,
            block_size: DEFAULT_BLOCK_SIZE,
        }
    }
}

impl BenchConfig {
    pub fn with_sizes(mut self, sizes: Vec<usize>) -> Self {
        self.sizes = sizes;
        self
    }

    pub fn with_trials_per_size(mut self, trials: usize) -> Self {
        self.trials_per_size = trials;
        self
    }

    pub fn with_build_ceiling_ms(mut self, ceiling: f64) -> Self {
        self.build_ceiling_ms = ceiling;
        self
    }

    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }

    /// Check that every parameter is usable.
    pub fn validate(&self) -> RotResult<()> {
        if self.sizes.is_empty() {
            return Err(RotError::InvalidConfig("no input sizes given".into()));
        }
        if self.sizes.contains(&0) {
            return Err(RotError::InvalidConfig("input sizes must be positive".into()));
        }
        if self.trials_per_size == 0 {
            return Err(RotError::InvalidConfig(
                "trials per size must be positive".into(),
            ));
        }
        if self.block_size == 0 {
            return Err(RotError::InvalidConfig("block size must be positive".into()));
        }
        if !self.build_ceiling_ms.is_finite() || self.build_ceiling_ms < 0.0 {
            return Err(RotError::InvalidConfig(format!(
                "build ceiling must be a finite, non-negative number of ms (got {})",
                self.build_ceiling_ms
            )));
        }
        Ok(())
    }

    /// Sizes in the order they are benchmarked: ascending, without duplicates.
    pub fn ordered_sizes(&self) -> Vec<usize> {
        let mut sizes = self.sizes.clone();
        sizes.sort_unstable();
        sizes.dedup();
        sizes
    }
}
