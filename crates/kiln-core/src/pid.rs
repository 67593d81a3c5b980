//! PID controller with conditional-integration anti-windup.
//!
//! Grounded in `pid_compute` from the original firmware's
//! `pid_control.c`. Ordinary clamped-output PID lets the integral term
//! keep growing while the output is saturated, so when the process
//! finally catches up the controller overshoots badly. Conditional
//! integration instead withholds the integral update whenever the
//! unsaturated output is already past a limit and the current error
//! would push it further past that same limit.

/// Default gains, carried over unchanged from the original firmware.
pub const DEFAULT_KP: f32 = 2.0;
pub const DEFAULT_KI: f32 = 0.01;
pub const DEFAULT_KD: f32 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PidGains {
    pub kp: f32,
    pub ki: f32,
    pub kd: f32,
}

impl Default for PidGains {
    fn default() -> Self {
        Self {
            kp: DEFAULT_KP,
            ki: DEFAULT_KI,
            kd: DEFAULT_KD,
        }
    }
}

/// A single PID loop driving a 0.0..=1.0 SSR duty cycle from a
/// temperature error.
#[derive(Debug, Clone)]
pub struct Pid {
    gains: PidGains,
    integral: f32,
    prev_error: f32,
    out_min: f32,
    out_max: f32,
    /// Set on construction and by `reset()`; suppresses the derivative
    /// term for exactly one `step()` call so a stale `prev_error` of 0.0
    /// doesn't inject a derivative kick on the first tick.
    first_run: bool,
}

impl Pid {
    pub fn new(gains: PidGains, out_min: f32, out_max: f32) -> Self {
        Self {
            gains,
            integral: 0.0,
            prev_error: 0.0,
            out_min,
            out_max,
            first_run: true,
        }
    }

    pub fn gains(&self) -> PidGains {
        self.gains
    }

    pub fn set_gains(&mut self, gains: PidGains) {
        self.gains = gains;
    }

    /// Clears accumulated integral and derivative history. Call this on
    /// every segment transition and whenever the loop resumes from pause,
    /// or the stale integral from the previous segment will bias the
    /// first few ticks of the new one.
    pub fn reset(&mut self) {
        self.integral = 0.0;
        self.prev_error = 0.0;
        self.first_run = true;
    }

    /// Computes one control step. `dt_s <= 0.0` is treated as "no time has
    /// passed" and returns `out_min` without touching any internal state,
    /// matching the original's handling of a zero or negative tick delta.
    pub fn step(&mut self, setpoint_c: f32, current_c: f32, dt_s: f32) -> f32 {
        if dt_s <= 0.0 {
            return self.out_min;
        }

        let error = setpoint_c - current_c;
        let derivative = if self.first_run {
            0.0
        } else {
            (error - self.prev_error) / dt_s
        };
        self.first_run = false;

        let unsaturated =
            self.gains.kp * error + self.gains.ki * self.integral + self.gains.kd * derivative;

        let saturated_high = unsaturated > self.out_max;
        let saturated_low = unsaturated < self.out_min;
        let would_deepen_saturation =
            (saturated_high && error > 0.0) || (saturated_low && error < 0.0);

        if !would_deepen_saturation {
            self.integral += error * dt_s;
        }

        self.prev_error = error;
        unsaturated.clamp(self.out_min, self.out_max)
    }
}
