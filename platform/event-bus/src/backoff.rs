//! Exponential backoff with jitter for the consumer worker's retry path.
//! Separate from [`crate::constants`] retry/TTL counters because the jitter
//! source is swappable in tests.

use rand::Rng;

use crate::constants::{BACKOFF_BASE_SECONDS, BACKOFF_JITTER_MAX};

/// `base · 2^(attempt-1) + jitter`, jitter uniform in `[0, BACKOFF_JITTER_MAX)`.
///
/// `attempt` is 1-based: the backoff before the *first* retry uses `attempt = 1`.
pub fn calculate_backoff(attempt: u32) -> std::time::Duration {
    let exponential = BACKOFF_BASE_SECONDS * 2f64.powi(attempt as i32 - 1);
    let jitter = rand::thread_rng().gen_range(0.0..BACKOFF_JITTER_MAX);
    std::time::Duration::from_secs_f64(exponential + jitter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_exponentially_before_jitter() {
        let d1 = calculate_backoff(1).as_secs_f64();
        let d2 = calculate_backoff(2).as_secs_f64();
        // d1 in [0.5, 0.7), d2 in [1.0, 1.2) — no overlap, so d2 > d1 always.
        assert!(d2 > d1);
    }

    #[test]
    fn backoff_is_never_less_than_the_exponential_floor() {
        for attempt in 1..=5u32 {
            let floor = BACKOFF_BASE_SECONDS * 2f64.powi(attempt as i32 - 1);
            let d = calculate_backoff(attempt).as_secs_f64();
            assert!(d >= floor);
            assert!(d < floor + BACKOFF_JITTER_MAX);
        }
    }
}
