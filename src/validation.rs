/// Cross-strategy validation.
///
/// These tests verify:
/// 1. **Equivalence** - host accelerator, CPU iterative and CPU vectorized
///    agree exactly on every input shape
/// 2. **Rotation contract** - `B[(i - 1) mod N] = A[i]` checked structurally
/// 3. **Fixed points** - N = 1 is unchanged; N rotations restore the input
/// 4. **Edge cases** - block boundaries, extreme values, generated workloads
#[cfg(test)]
mod tests {
    use crate::device::Accelerator;
    use crate::host::HostDevice;
    use crate::rotate::{rotate_left_iterative, rotate_left_vectorized};
    use crate::verify;
    use crate::workload;
    use proptest::prelude::*;

    // ---------------------------------------------------------------
    // Helpers
    // ---------------------------------------------------------------

    fn data_sequential(n: usize) -> Vec<i32> {
        (0..n as i32).collect()
    }

    fn data_constant(n: usize) -> Vec<i32> {
        vec![4; n]
    }

    fn data_alternating_extremes(n: usize) -> Vec<i32> {
        (0..n)
            .map(|i| if i % 2 == 0 { i32::MIN } else { i32::MAX })
            .collect()
    }

    /// Run all three strategies and assert they agree and satisfy the contract.
    fn assert_all_strategies(input: &[i32], block_size: usize) {
        let device = HostDevice::new(block_size).unwrap();
        let accel = device.rotate_left(input).unwrap().output;
        let iterative = rotate_left_iterative(input);
        let vectorized = rotate_left_vectorized(input);

        let verdict = verify::check(&accel, &iterative, &vectorized);
        assert!(verdict.passed(), "n={}: {verdict}", input.len());

        let n = input.len();
        for (i, &value) in input.iter().enumerate() {
            assert_eq!(vectorized[(i + n - 1) % n], value, "n={n} i={i}");
        }
    }

    // ---------------------------------------------------------------
    // Equivalence across input shapes
    // ---------------------------------------------------------------

    #[test]
    fn test_equivalence_sequential() {
        for n in [1, 2, 3, 127, 128, 129, 1000, 5000] {
            assert_all_strategies(&data_sequential(n), 128);
        }
    }

    #[test]
    fn test_equivalence_constant() {
        assert_all_strategies(&data_constant(1000), 128);
    }

    #[test]
    fn test_equivalence_extremes() {
        assert_all_strategies(&data_alternating_extremes(513), 128);
    }

    #[test]
    fn test_equivalence_generated_reference_sizes() {
        for n in [1000, 5000, 25000] {
            let data = workload::generate(n).unwrap();
            assert_all_strategies(&data, 128);
        }
    }

    #[test]
    fn test_single_element_every_strategy() {
        let input = [8];
        let device = HostDevice::new(128).unwrap();
        assert_eq!(device.rotate_left(&input).unwrap().output, vec![8]);
        assert_eq!(rotate_left_iterative(&input), vec![8]);
        assert_eq!(rotate_left_vectorized(&input), vec![8]);
    }

    #[test]
    fn test_last_element_wraps_from_first() {
        let input = data_sequential(300);
        let device = HostDevice::new(128).unwrap();
        let out = device.rotate_left(&input).unwrap().output;
        assert_eq!(out[299], 0);
        assert_eq!(out[0], 1);
        assert_eq!(out[127], 128);
        assert_eq!(out[128], 129);
    }

    // ---------------------------------------------------------------
    // Round trip
    // ---------------------------------------------------------------

    #[test]
    fn test_n_device_rotations_restore_input() {
        let input = data_sequential(37);
        let device = HostDevice::new(8).unwrap();
        let mut current = input.clone();
        for _ in 0..input.len() {
            current = device.rotate_left(&current).unwrap().output;
        }
        assert_eq!(current, input);
    }

    #[test]
    fn test_fewer_than_n_rotations_do_not_restore() {
        let input = data_sequential(10);
        let mut current = input.clone();
        for _ in 0..9 {
            current = rotate_left_vectorized(&current);
        }
        assert_ne!(current, input);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_three_strategies_agree(
            input in prop::collection::vec(any::<i32>(), 1..1500),
            block_size in 1usize..300,
        ) {
            let device = HostDevice::new(block_size).unwrap();
            let accel = device.rotate_left(&input).unwrap().output;
            let verdict = verify::check(
                &accel,
                &rotate_left_iterative(&input),
                &rotate_left_vectorized(&input),
            );
            prop_assert!(verdict.passed(), "{}", verdict);
        }

        #[test]
        fn prop_n_rotations_identity(input in prop::collection::vec(0i32..10, 1..64)) {
            let device = HostDevice::new(16).unwrap();
            let mut current = input.clone();
            for _ in 0..input.len() {
                current = device.rotate_left(&current).unwrap().output;
            }
            prop_assert_eq!(current, input);
        }
    }
}
