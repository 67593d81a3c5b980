//! Ziegler–Nichols relay-method PID auto-tuner.
//!
//! Grounded in `pid_autotune_start`/`pid_autotune_update` from the
//! original firmware's `pid_control.c`. The tuner first drives full
//! power until the process reaches the target setpoint, then switches
//! the SSR output between full-on and full-off around that setpoint
//! (the "relay") and watches the resulting oscillation. After enough
//! cycles it has an amplitude and a period, from which Ziegler-Nichols
//! gains are derived.

use tracing::{info, warn};

use crate::pid::PidGains;

/// Oscillation cycles to observe before computing gains.
pub const CYCLES_NEEDED: u32 = 5;

/// Giving up after this long with no convergence (1 hour).
pub const TIMEOUT_MS: u64 = 60 * 60 * 1000;

/// Oscillation amplitudes below this are too small to trust the
/// resulting gains; the process is probably not actually driven by the
/// element (thermocouple miswired, element failed open, etc).
pub const MIN_AMPLITUDE_C: f32 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AutoTuneState {
    Idle,
    HeatingToSetpoint,
    RelayCycling,
    Complete,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AutoTuneResult {
    pub gains: PidGains,
    pub ultimate_gain: f32,
    pub ultimate_period_s: f32,
}

/// Drives the relay experiment and accumulates peaks across cycles.
pub struct AutoTuner {
    state: AutoTuneState,
    setpoint_c: f32,
    hysteresis_c: f32,
    relay_high: bool,
    /// Which side of `setpoint_c` the reading was on last tick, used to
    /// detect the zero-crossings that mark a half-cycle.
    above_setpoint: bool,
    peak_high: f32,
    peak_low: f32,
    /// Crossings seen since the last full cycle closed; two of these make
    /// one cycle (one full oscillation period).
    half_cycles: u32,
    cycles_seen: u32,
    last_crossing_ms: u64,
    period_sum_s: f32,
    amplitude_sum_c: f32,
    start_ms: u64,
    result: Option<AutoTuneResult>,
}

impl AutoTuner {
    /// Builds a tuner without starting it. `setpoint_c` and `hysteresis_c`
    /// are not validated here — that happens in [`AutoTuner::start`], which
    /// is the point at which the original firmware rejects bad arguments.
    pub fn new(setpoint_c: f32, hysteresis_c: f32, now_ms: u64) -> Self {
        Self {
            state: AutoTuneState::Idle,
            setpoint_c,
            hysteresis_c,
            relay_high: true,
            above_setpoint: false,
            peak_high: -1000.0,
            peak_low: 10_000.0,
            half_cycles: 0,
            cycles_seen: 0,
            last_crossing_ms: now_ms,
            period_sum_s: 0.0,
            amplitude_sum_c: 0.0,
            start_ms: now_ms,
            result: None,
        }
    }

    pub fn state(&self) -> AutoTuneState {
        self.state
    }

    pub fn result(&self) -> Option<AutoTuneResult> {
        self.result
    }

    /// Transitions from `Idle` to `HeatingToSetpoint`. Rejects a
    /// non-positive setpoint or hysteresis and leaves the tuner `Idle`,
    /// matching the original's `ESP_ERR_INVALID_ARG` rather than entering
    /// a relay experiment that can never converge.
    pub fn start(&mut self, now_ms: u64) {
        if self.setpoint_c <= 0.0 || self.hysteresis_c <= 0.0 {
            warn!(
                setpoint_c = self.setpoint_c,
                hysteresis_c = self.hysteresis_c,
                "rejected auto-tune start: setpoint and hysteresis must both be positive"
            );
            self.state = AutoTuneState::Idle;
            return;
        }
        self.state = AutoTuneState::HeatingToSetpoint;
        self.start_ms = now_ms;
    }

    pub fn abort(&mut self) {
        self.state = AutoTuneState::Failed;
    }

    /// Advances the tuner by one tick. Returns the requested SSR duty
    /// (always 0.0 or 1.0 once cycling has begun).
    pub fn update(&mut self, current_c: f32, now_ms: u64) -> f32 {
        if now_ms.saturating_sub(self.start_ms) > TIMEOUT_MS
            && !matches!(self.state, AutoTuneState::Complete | AutoTuneState::Failed)
        {
            warn!("auto-tune timed out before converging");
            self.state = AutoTuneState::Failed;
            return 0.0;
        }

        match self.state {
            AutoTuneState::Idle | AutoTuneState::Complete | AutoTuneState::Failed => 0.0,
            AutoTuneState::HeatingToSetpoint => {
                if current_c >= self.setpoint_c - self.hysteresis_c {
                    info!("auto-tune reached setpoint, beginning relay cycling");
                    self.state = AutoTuneState::RelayCycling;
                    self.relay_high = false;
                    self.above_setpoint = true;
                    self.last_crossing_ms = now_ms;
                    self.peak_high = current_c;
                    self.peak_low = current_c;
                    0.0
                } else {
                    1.0
                }
            }
            AutoTuneState::RelayCycling => self.relay_cycle(current_c, now_ms),
        }
    }

    /// Tracks peaks over the current half-cycle and, on every crossing of
    /// `setpoint_c`, advances the half-cycle counter. Every *two*
    /// crossings (one full oscillation) closes out a period/amplitude
    /// sample and resets the peak tracker; a single crossing is not
    /// enough; it only marks the midpoint of one cycle.
    fn relay_cycle(&mut self, current_c: f32, now_ms: u64) -> f32 {
        self.peak_high = self.peak_high.max(current_c);
        self.peak_low = self.peak_low.min(current_c);

        let now_above = current_c > self.setpoint_c;
        if now_above != self.above_setpoint {
            self.half_cycles += 1;
            self.above_setpoint = now_above;

            if self.half_cycles >= 2 {
                let period_s = now_ms.saturating_sub(self.last_crossing_ms) as f32 / 1000.0;
                let amplitude = (self.peak_high - self.peak_low) / 2.0;

                self.period_sum_s += period_s;
                self.amplitude_sum_c += amplitude;
                self.cycles_seen += 1;
                self.half_cycles = 0;
                self.last_crossing_ms = now_ms;
                self.peak_high = current_c;
                self.peak_low = current_c;

                if self.cycles_seen >= CYCLES_NEEDED {
                    self.finish();
                }
            }
        }

        if current_c < self.setpoint_c - self.hysteresis_c {
            self.relay_high = true;
        } else if current_c > self.setpoint_c + self.hysteresis_c {
            self.relay_high = false;
        }

        if self.relay_high {
            1.0
        } else {
            0.0
        }
    }

    fn finish(&mut self) {
        let avg_amplitude = self.amplitude_sum_c / self.cycles_seen as f32;
        let avg_period_s = self.period_sum_s / self.cycles_seen as f32;

        if avg_amplitude < MIN_AMPLITUDE_C {
            warn!(
                amplitude = avg_amplitude,
                "auto-tune oscillation amplitude too small, aborting"
            );
            self.state = AutoTuneState::Failed;
            return;
        }

        // Relay amplitude `d` is the full-scale duty step (0.0 to 1.0).
        let d = 1.0;
        let ultimate_gain = (4.0 * d) / (std::f32::consts::PI * avg_amplitude);
        let period_s = avg_period_s;

        let gains = PidGains {
            kp: 0.6 * ultimate_gain,
            ki: (1.2 * ultimate_gain) / period_s,
            kd: 0.075 * ultimate_gain * period_s,
        };

        info!(?gains, ultimate_gain, period_s, "auto-tune converged");
        self.result = Some(AutoTuneResult {
            gains,
            ultimate_gain,
            ultimate_period_s: period_s,
        });
        self.state = AutoTuneState::Complete;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heats_to_setpoint_before_cycling() {
        let mut t = AutoTuner::new(100.0, 2.0, 0);
        t.start(0);
        assert_eq!(t.update(50.0, 1000), 1.0);
        assert_eq!(t.state(), AutoTuneState::HeatingToSetpoint);
        assert_eq!(t.update(101.0, 2000), 0.0);
        assert_eq!(t.state(), AutoTuneState::RelayCycling);
    }

    #[test]
    fn completes_after_enough_cycles_with_clean_oscillation() {
        let mut t = AutoTuner::new(100.0, 2.0, 0);
        t.start(0);
        // Enter RelayCycling with peaks seeded at 105 so the very first
        // half-cycle's peak tracking is symmetric with every later one.
        t.update(105.0, 0);
        assert_eq!(t.state(), AutoTuneState::RelayCycling);

        // A perfectly clean square oscillation: 95/105 every 60s. Each pair
        // of half-cycles (120s, one full period) swings peak-to-peak 10C,
        // i.e. amplitude 5C, exactly matching spec scenario 6 (P=120s bar,
        // A=5C bar).
        for i in 0..10u64 {
            let t_ms = (i + 1) * 60_000;
            let val = if i % 2 == 0 { 95.0 } else { 105.0 };
            t.update(val, t_ms);
            if t.state() == AutoTuneState::Complete {
                break;
            }
        }

        assert_eq!(t.state(), AutoTuneState::Complete);
        let result = t.result().expect("result present on completion");
        // Ku = 4/(pi*5) ~= 0.25465, Pu = 120s.
        assert!((result.ultimate_gain - 0.25465).abs() < 1e-3);
        assert!((result.ultimate_period_s - 120.0).abs() < 1e-6);
        assert!((result.gains.kp - 0.15279).abs() < 1e-3);
        assert!((result.gains.ki - 0.0025465).abs() < 1e-4);
        assert!((result.gains.kd - 2.29186).abs() < 1e-2);
    }

    #[test]
    fn times_out_without_convergence() {
        let mut t = AutoTuner::new(100.0, 2.0, 0);
        t.start(0);
        t.update(50.0, TIMEOUT_MS + 1);
        assert_eq!(t.state(), AutoTuneState::Failed);
    }

    #[test]
    fn abort_marks_failed() {
        let mut t = AutoTuner::new(100.0, 2.0, 0);
        t.start(0);
        t.abort();
        assert_eq!(t.state(), AutoTuneState::Failed);
    }
}
