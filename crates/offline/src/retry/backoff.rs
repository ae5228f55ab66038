//! Backoff schedule: capped exponential delay with additive jitter.

use std::time::Duration;

use rand::Rng;

use super::constants::MAX_BACKOFF_EXPONENT;

/// Delay before the retry that follows failed attempt `attempt` (1-based).
///
/// The nominal schedule is `base * 2^(attempt-1)` capped at `max`. Jitter
/// is additive in `[0, delay * jitter_factor]`, so the nominal schedule is
/// a lower bound: many callers retrying at once spread out instead of
/// retrying in lockstep, and callers timing the schedule can still rely on
/// the exponential floor.
pub fn delay_for_attempt(
    base: Duration,
    max: Duration,
    attempt: u32,
    jitter_factor: f64,
) -> Duration {
    let nominal = exponential_delay(base, max, attempt);

    if jitter_factor <= 0.0 {
        return nominal;
    }

    let bound_ms = (nominal.as_millis() as f64 * jitter_factor).round() as u64;
    if bound_ms == 0 {
        return nominal;
    }

    let jitter_ms = rand::thread_rng().gen_range(0..=bound_ms);
    nominal.saturating_add(Duration::from_millis(jitter_ms))
}

fn exponential_delay(base: Duration, max: Duration, attempt: u32) -> Duration {
    let base_millis = base.as_millis() as u64;
    let max_millis = max.as_millis() as u64;

    // Cap the exponent to prevent overflow.
    let exponent = attempt.saturating_sub(1).min(MAX_BACKOFF_EXPONENT);
    let multiplier = 2_u64.saturating_pow(exponent);

    let delay_millis = base_millis.saturating_mul(multiplier).min(max_millis);
    Duration::from_millis(delay_millis)
}

#[cfg(test)]
mod tests {
    //! Unit tests for the backoff schedule.
    use super::*;

    #[test]
    fn test_exponential_doubling_without_jitter() {
        let base = Duration::from_millis(100);
        let max = Duration::from_secs(60);

        assert_eq!(delay_for_attempt(base, max, 1, 0.0), Duration::from_millis(100));
        assert_eq!(delay_for_attempt(base, max, 2, 0.0), Duration::from_millis(200));
        assert_eq!(delay_for_attempt(base, max, 3, 0.0), Duration::from_millis(400));
        assert_eq!(delay_for_attempt(base, max, 4, 0.0), Duration::from_millis(800));
    }

    #[test]
    fn test_max_delay_caps_schedule() {
        let base = Duration::from_secs(1);
        let max = Duration::from_secs(5);

        assert_eq!(delay_for_attempt(base, max, 10, 0.0), Duration::from_secs(5));
    }

    #[test]
    fn test_large_attempt_does_not_overflow() {
        let base = Duration::from_secs(1);
        let max = Duration::from_secs(3600);

        let delay = delay_for_attempt(base, max, u32::MAX, 0.0);
        assert_eq!(delay, Duration::from_secs(3600));
    }

    /// Jitter is additive only: the nominal schedule stays a lower bound
    /// and the jittered delay never exceeds nominal * (1 + factor).
    #[test]
    fn test_jitter_never_reduces_delay() {
        let base = Duration::from_millis(100);
        let max = Duration::from_secs(60);

        for attempt in 1..=5 {
            let nominal = delay_for_attempt(base, max, attempt, 0.0);
            for _ in 0..20 {
                let jittered = delay_for_attempt(base, max, attempt, 0.25);
                assert!(jittered >= nominal);
                assert!(jittered <= nominal + Duration::from_millis(nominal.as_millis() as u64 / 4 + 1));
            }
        }
    }

    #[test]
    fn test_jitter_varies() {
        let base = Duration::from_millis(400);
        let max = Duration::from_secs(60);

        let delays: Vec<Duration> =
            (0..10).map(|_| delay_for_attempt(base, max, 3, 0.5)).collect();

        let all_same = delays.windows(2).all(|w| w[0] == w[1]);
        assert!(!all_same);
    }
}
