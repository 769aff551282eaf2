//! Monotonic nanosecond clock for frame timestamps.
//!
//! Producers that do not supply a timestamp get one from here at enqueue
//! time. The clock is anchored at the first read so timestamps are small,
//! strictly monotonic, and immune to wall-clock adjustments.

use std::sync::OnceLock;
use std::time::Instant;

static EPOCH: OnceLock<Instant> = OnceLock::new();

/// Current time in nanoseconds since the first call in this process.
/// Never returns 0, which producers use as the "assign me a timestamp"
/// sentinel.
pub fn now_ns() -> u64 {
    let epoch = EPOCH.get_or_init(Instant::now);
    (epoch.elapsed().as_nanos() as u64).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_is_monotonic() {
        let a = now_ns();
        let b = now_ns();
        let c = now_ns();
        assert!(a <= b);
        assert!(b <= c);
    }

    #[test]
    fn clock_advances() {
        let a = now_ns();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let b = now_ns();
        assert!(b - a >= 1_000_000, "expected at least 1ms to elapse");
    }
}
