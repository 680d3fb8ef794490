use std::time::Duration;

use tokio::time::Instant;

/// Time still to wait before a window of `gap` that opened at `start` has passed.
///
/// A `now` at or before `start` counts as zero elapsed time; the result is
/// clamped to zero once the window is over.
pub fn remaining(start: Instant, now: Instant, gap: Duration) -> Duration {
    gap.saturating_sub(now.saturating_duration_since(start))
}

#[cfg(test)]
mod tests {
    use super::*;

    const GAP: Duration = Duration::from_millis(1200);

    #[test]
    fn test_now_before_start_waits_full_gap() {
        let start = Instant::now() + Duration::from_secs(5);
        for back in [0, 1, 250, 5000] {
            let now = start - Duration::from_millis(back);
            assert_eq!(remaining(start, now, GAP), GAP);
        }
    }

    #[test]
    fn test_inside_window_subtracts_elapsed() {
        let start = Instant::now();
        for elapsed in [0u64, 1, 600, 1199, 1200] {
            let now = start + Duration::from_millis(elapsed);
            assert_eq!(
                remaining(start, now, GAP),
                GAP - Duration::from_millis(elapsed)
            );
        }
    }

    #[test]
    fn test_after_window_is_zero() {
        let start = Instant::now();
        for elapsed in [1200u64, 1201, 60_000] {
            let now = start + Duration::from_millis(elapsed);
            assert_eq!(remaining(start, now, GAP), Duration::ZERO);
        }
    }

    #[test]
    fn test_zero_gap_never_waits() {
        let start = Instant::now();
        assert_eq!(remaining(start, start, Duration::ZERO), Duration::ZERO);
        assert_eq!(
            remaining(start + Duration::from_secs(1), start, Duration::ZERO),
            Duration::ZERO
        );
    }
}
