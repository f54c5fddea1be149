//! Random integer workloads.
//!
//! Every call draws fresh values; nothing is cached between trials so each
//! equivalence check runs against different data.

use std::ops::Range;

use rand::distributions::{Distribution, Uniform};
use rand::Rng;

use crate::{RotError, RotResult};

/// Half-open range every workload element is drawn from.
pub const VALUE_RANGE: Range<i32> = 0..10;

/// Generate `len` values uniformly from [`VALUE_RANGE`] using the thread RNG.
pub fn generate(len: usize) -> RotResult<Vec<i32>> {
    generate_with(&mut rand::thread_rng(), len)
}

/// Generate `len` values uniformly from [`VALUE_RANGE`] using `rng`.
///
/// Returns [`RotError::InvalidSize`] when `len` is zero.
pub fn generate_with<R: Rng + ?Sized>(rng: &mut R, len: usize) -> RotResult<Vec<i32>> {
    if len == 0 {
        return Err(RotError::InvalidSize);
    }
    let dist = Uniform::from(VALUE_RANGE);
    Ok((0..len).map(|_| dist.sample(rng)).collect())
}
