use std::time::Duration;

/// Open-state duration after `failure_count` consecutive failures:
/// `min(base * 2^failure_count, max)`.
///
/// Doubling stops as soon as the cap is reached (or at once for a zero
/// base), so large failure counts cannot overflow or spin.
pub fn open_timeout(base: Duration, max: Duration, failure_count: u32) -> Duration {
    let mut timeout = base;

    for _ in 0..failure_count {
        if timeout.is_zero() || timeout >= max {
            break;
        }
        timeout = timeout.checked_mul(2).unwrap_or(max);
    }

    timeout.min(max)
}
