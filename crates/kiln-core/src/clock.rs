//! Monotonic time source.
//!
//! Every duration and deadline in the core (segment elapsed time, window
//! checks, element-hours, auto-tune timeout, SSR window) is measured against
//! a monotonic tick source, never wall-clock time. `Clock` is the seam that
//! lets the firing engine, safety monitor, and auto-tuner be driven
//! deterministically in tests without sleeping real time.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// A source of monotonically non-decreasing milliseconds.
pub trait Clock: Send + Sync {
    /// Milliseconds since some unspecified epoch. Only differences between
    /// two calls are meaningful.
    fn now_ms(&self) -> u64;
}

/// `Clock` backed by `std::time::Instant`.
pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

/// Lets a shared, dynamically-dispatched clock be passed anywhere a
/// concrete `Clock` is expected, so host code can wire up one clock
/// instance across the sensor reader, SSR modulator, and firing engine
/// without committing to a single concrete type parameter.
impl<T: Clock + ?Sized> Clock for std::sync::Arc<T> {
    fn now_ms(&self) -> u64 {
        (**self).now_ms()
    }
}

/// A manually-advanced clock for deterministic tests.
pub struct TestClock {
    ms: AtomicU64,
}

impl TestClock {
    pub fn new() -> Self {
        Self { ms: AtomicU64::new(0) }
    }

    pub fn advance_ms(&self, delta: u64) {
        self.ms.fetch_add(delta, Ordering::SeqCst);
    }

    pub fn advance_s(&self, delta: u64) {
        self.advance_ms(delta * 1000);
    }

    pub fn set_ms(&self, value: u64) {
        self.ms.store(value, Ordering::SeqCst);
    }
}

impl Default for TestClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TestClock {
    fn now_ms(&self) -> u64 {
        self.ms.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_is_monotonic_under_advance() {
        let clock = TestClock::new();
        assert_eq!(clock.now_ms(), 0);
        clock.advance_s(5);
        assert_eq!(clock.now_ms(), 5000);
        clock.advance_ms(250);
        assert_eq!(clock.now_ms(), 5250);
    }
}
