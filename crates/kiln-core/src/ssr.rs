//! Time-proportional solid-state-relay modulator.
//!
//! Grounded in `safety_set_ssr`/`SSR_WINDOW_US` from the original
//! `safety.c`: duty cycle is expressed as a fraction of a fixed window
//! rather than a PWM frequency, because SSRs driving resistive kiln
//! elements should switch far slower than a PWM-style driver would.

use tracing::trace;

use crate::clock::Clock;

/// Length of one time-proportioning window (spec.md §4.2).
pub const WINDOW_MS: u64 = 2000;

/// Output pin for the SSR gate signal.
pub trait Gpio: Send + Sync {
    fn set_high(&self);
    fn set_low(&self);
}

impl Gpio for Box<dyn Gpio> {
    fn set_high(&self) {
        (**self).set_high()
    }
    fn set_low(&self) {
        (**self).set_low()
    }
}

/// Drives a [`Gpio`] on/off within a fixed window to approximate an
/// analog duty cycle with a switch the kiln's contactor can tolerate.
pub struct SsrModulator<G: Gpio, C: Clock> {
    gpio: G,
    clock: C,
    duty: f32,
    window_start_ms: u64,
    emergency: bool,
}

impl<G: Gpio, C: Clock> SsrModulator<G, C> {
    pub fn new(gpio: G, clock: C) -> Self {
        Self {
            gpio,
            clock,
            duty: 0.0,
            window_start_ms: 0,
            emergency: false,
        }
    }

    /// Sets the requested duty cycle, clamped to `[0.0, 1.0]`.
    ///
    /// If emergency-stop is latched, the gate is forced low regardless of
    /// the requested duty and the request is dropped: emergency override
    /// happens before clamping, matching the original's ordering.
    pub fn set_duty(&mut self, duty: f32) {
        if self.emergency {
            self.duty = 0.0;
            self.gpio.set_low();
            return;
        }
        self.duty = duty.clamp(0.0, 1.0);
    }

    /// Latches or clears the emergency override. While latched, the gate
    /// is forced low on every call regardless of `duty`.
    pub fn set_emergency(&mut self, emergency: bool) {
        self.emergency = emergency;
        if emergency {
            self.duty = 0.0;
            self.gpio.set_low();
        }
    }

    /// Advances the window state machine and drives the gpio. Call at
    /// least as often as the smallest duty resolution you need; the
    /// simulator and host both call this every control tick.
    pub fn update(&mut self) {
        if self.emergency {
            self.gpio.set_low();
            return;
        }
        let now = self.clock.now_ms();
        let elapsed = now.saturating_sub(self.window_start_ms);
        if elapsed >= WINDOW_MS {
            self.window_start_ms = now;
        }
        let elapsed_in_window = now.saturating_sub(self.window_start_ms);
        let on_time_ms = (WINDOW_MS as f32 * self.duty) as u64;
        if elapsed_in_window < on_time_ms {
            trace!(duty = self.duty, "ssr on");
            self.gpio.set_high();
        } else {
            self.gpio.set_low();
        }
    }

    pub fn duty(&self) -> f32 {
        self.duty
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::TestClock;
    use std::cell::Cell;

    struct RecordingGpio {
        high: Cell<bool>,
    }
    impl RecordingGpio {
        fn new() -> Self {
            Self { high: Cell::new(false) }
        }
    }
    impl Gpio for RecordingGpio {
        fn set_high(&self) {
            self.high.set(true);
        }
        fn set_low(&self) {
            self.high.set(false);
        }
    }

    #[test]
    fn zero_duty_stays_low() {
        let clock = TestClock::new();
        let mut ssr = SsrModulator::new(RecordingGpio::new(), clock);
        ssr.set_duty(0.0);
        ssr.update();
        assert!(!ssr.gpio.high.get());
    }

    #[test]
    fn half_duty_switches_mid_window() {
        let clock = TestClock::new();
        let mut ssr = SsrModulator::new(RecordingGpio::new(), clock);
        ssr.set_duty(0.5);
        ssr.update();
        assert!(ssr.gpio.high.get());
        ssr.clock.advance_ms(1001);
        ssr.update();
        assert!(!ssr.gpio.high.get());
    }

    #[test]
    fn emergency_forces_low_even_with_full_duty() {
        let clock = TestClock::new();
        let mut ssr = SsrModulator::new(RecordingGpio::new(), clock);
        ssr.set_duty(1.0);
        ssr.update();
        assert!(ssr.gpio.high.get());
        ssr.set_emergency(true);
        assert!(!ssr.gpio.high.get());
        ssr.set_duty(1.0);
        assert_eq!(ssr.duty(), 0.0);
        ssr.update();
        assert!(!ssr.gpio.high.get());
    }

    #[test]
    fn duty_is_clamped() {
        let clock = TestClock::new();
        let mut ssr = SsrModulator::new(RecordingGpio::new(), clock);
        ssr.set_duty(5.0);
        assert_eq!(ssr.duty(), 1.0);
        ssr.set_duty(-5.0);
        assert_eq!(ssr.duty(), 0.0);
    }
}
