//! CPU rotation strategies.
//!
//! Both produce `B` with `B[(i - 1) mod N] = A[i]`: the array shifted one
//! place toward the front, with the first element wrapping to the end.
//! An empty input yields an empty output.

/// Destination of source index `i` in a left rotation of `n` elements.
///
/// Written as `(i + n - 1) % n` so it never underflows for `i = 0`.
#[inline]
pub fn destination_index(i: usize, n: usize) -> usize {
    (i + n - 1) % n
}

/// Scalar loop: one indexed write per element.
pub fn rotate_left_iterative(input: &[i32]) -> Vec<i32> {
    let n = input.len();
    let mut output = vec![0i32; n];
    for (i, &value) in input.iter().enumerate() {
        output[destination_index(i, n)] = value;
    }
    output
}

/// Bulk form: `input[1..]` followed by `input[..1]`, as two slice copies.
pub fn rotate_left_vectorized(input: &[i32]) -> Vec<i32> {
    if input.is_empty() {
        return Vec::new();
    }
    let mut output = Vec::with_capacity(input.len());
    output.extend_from_slice(&input[1..]);
    output.extend_from_slice(&input[..1]);
    output
}
