//! Exponential backoff with jitter.

use rand::Rng;
use std::time::Duration;

/// Delay before retry number `attempt` (1-based).
///
/// Doubles from `base` per attempt, is capped at `max`, and adds up to 10% jitter.
pub fn retry_delay(attempt: u32, base: Duration, max: Duration) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }

    let factor = 2u32.saturating_pow(attempt - 1);
    let capped = base.saturating_mul(factor).min(max);

    let jitter_ms = (capped.as_millis() / 10) as u64;
    let jitter = if jitter_ms > 0 {
        rand::thread_rng().gen_range(0..jitter_ms)
    } else {
        0
    };

    capped + Duration::from_millis(jitter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_attempt_has_no_delay() {
        assert_eq!(retry_delay(0, Duration::from_millis(100), Duration::from_secs(2)), Duration::ZERO);
    }

    #[test]
    fn test_delay_doubles_and_caps() {
        let base = Duration::from_millis(100);
        let max = Duration::from_millis(1000);

        let d1 = retry_delay(1, base, max);
        assert!(d1 >= base && d1 < Duration::from_millis(110));

        let d3 = retry_delay(3, base, max);
        assert!(d3 >= Duration::from_millis(400) && d3 < Duration::from_millis(440));

        let capped = retry_delay(20, base, max);
        assert!(capped >= max && capped < Duration::from_millis(1100));
    }
}
