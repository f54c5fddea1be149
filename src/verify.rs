//! Exact cross-strategy equivalence checking.
//!
//! The CPU-vectorized output is the reference. The accelerator and the
//! CPU-iterative outputs are each compared against it independently, so
//! both comparisons passing means all three outputs are pairwise equal and
//! a fault in one strategy never masks the verdict of the other.

/// Outcome of comparing one output against the reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    /// Same length, every element equal.
    Match,
    /// Lengths differ.
    LengthMismatch { expected: usize, actual: usize },
    /// First index whose values differ.
    ValueMismatch {
        index: usize,
        expected: i32,
        actual: i32,
    },
}

impl Comparison {
    pub fn is_match(&self) -> bool {
        matches!(self, Comparison::Match)
    }
}

impl std::fmt::Display for Comparison {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Match => write!(f, "match"),
            Self::LengthMismatch { expected, actual } => {
                write!(f, "length {actual}, expected {expected}")
            }
            Self::ValueMismatch {
                index,
                expected,
                actual,
            } => write!(f, "index {index}: got {actual}, expected {expected}"),
        }
    }
}

/// Compare `actual` against `reference` element for element.
pub fn compare(reference: &[i32], actual: &[i32]) -> Comparison {
    if reference.len() != actual.len() {
        return Comparison::LengthMismatch {
            expected: reference.len(),
            actual: actual.len(),
        };
    }
    match reference.iter().zip(actual).position(|(a, b)| a != b) {
        None => Comparison::Match,
        Some(index) => Comparison::ValueMismatch {
            index,
            expected: reference[index],
            actual: actual[index],
        },
    }
}

/// Equivalence verdict for one trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    /// Accelerator output vs the reference.
    pub accelerator: Comparison,
    /// CPU-iterative output vs the reference.
    pub iterative: Comparison,
}

impl Verdict {
    /// True iff all three outputs are exactly equal.
    pub fn passed(&self) -> bool {
        self.accelerator.is_match() && self.iterative.is_match()
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.passed() {
            write!(f, "outputs match")
        } else {
            write!(
                f,
                "outputs differ (accelerator: {}; cpu iterative: {})",
                self.accelerator, self.iterative
            )
        }
    }
}

/// Check the three strategy outputs of one trial against the vectorized reference.
pub fn check(accelerator: &[i32], iterative: &[i32], vectorized: &[i32]) -> Verdict {
    Verdict {
        accelerator: compare(vectorized, accelerator),
        iterative: compare(vectorized, iterative),
    }
}
