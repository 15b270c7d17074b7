//! mulberry32 generator shared by `random`, `random_range`, `random_float` and `pick`.

pub(crate) fn next_random_u32(state: &mut u32) -> u32 {
    let mut next = state.wrapping_add(0x6d2b79f5);
    *state = next;
    next = (next ^ (next >> 15)).wrapping_mul(next | 1);
    next ^= next.wrapping_add((next ^ (next >> 7)).wrapping_mul(next | 61));
    next ^ (next >> 14)
}

/// Uniform in `0..bound` without modulo bias. `bound` must be non-zero.
pub(crate) fn next_random_bounded(state: &mut u32, bound: u32) -> u32 {
    next_random_bounded_with(state, bound, next_random_u32)
}

fn next_random_bounded_with<F>(state: &mut u32, bound: u32, mut next: F) -> u32
where
    F: FnMut(&mut u32) -> u32,
{
    let threshold = (u64::from(u32::MAX) + 1) / u64::from(bound) * u64::from(bound);
    let mut candidate = next(state);
    while u64::from(candidate) >= threshold {
        candidate = next(state);
    }
    candidate % bound
}

/// Uniform in `[0, 1)`.
pub(crate) fn next_random_unit(state: &mut u32) -> f64 {
    f64::from(next_random_u32(state)) / (f64::from(u32::MAX) + 1.0)
}

/// Seed used when the host does not pin one.
pub(crate) fn seed_from_clock() -> u32 {
    let nanos = chrono::Utc::now().timestamp_subsec_nanos();
    let seconds = chrono::Utc::now().timestamp() as u32;
    nanos ^ seconds.rotate_left(16)
}

#[cfg(test)]
mod rng_tests {
    use super::*;

    #[test]
    fn bounded_retries_above_threshold() {
        let mut state = 0u32;
        let mut values = vec![u32::MAX, 42u32].into_iter();
        let result = next_random_bounded_with(&mut state, 10, |_s| {
            values.next().expect("test values should be available")
        });
        assert_eq!(result, 2);
    }

    #[test]
    fn same_seed_gives_same_sequence() {
        let mut a = 7u32;
        let mut b = 7u32;
        let left: Vec<u32> = (0..5).map(|_| next_random_bounded(&mut a, 100)).collect();
        let right: Vec<u32> = (0..5).map(|_| next_random_bounded(&mut b, 100)).collect();
        assert_eq!(left, right);
        assert!(left.iter().all(|value| *value < 100));
    }

    #[test]
    fn unit_values_stay_below_one() {
        let mut state = 1u32;
        for _ in 0..100 {
            let value = next_random_unit(&mut state);
            assert!((0.0..1.0).contains(&value));
        }
    }
}
