//! Independent safety monitor.
//!
//! Runs on its own 2 Hz cadence, deliberately decoupled from the firing
//! engine's 1 Hz tick, so that a stuck or crashed firing engine still
//! gets shut down. Grounded in `safety_task`/`safety_check_temps` from
//! the original firmware's `safety.c`.

use tracing::{error, warn};

use crate::types::{AlarmPattern, Reading};

/// Safety audit cadence (spec.md §4.3).
pub const AUDIT_PERIOD_MS: u64 = 500;

/// Absolute ceiling no setting can raise `max_safe_temp` above.
pub const HARDWARE_MAX_TEMP_C: f32 = 1400.0;

/// A stale reading older than this is treated as a sensor fault.
pub const TEMP_FAULT_TIMEOUT_MS: u64 = 5_000;

/// Bits describing why the monitor last changed state, consumed by the
/// host layer to decide what to log/notify about without re-deriving it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SafetyEvents {
    pub emergency_stop: bool,
    pub temp_fault: bool,
    pub firing_complete: bool,
}

/// Result of one audit pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AuditOutcome {
    pub emergency: bool,
    pub events: SafetyEvents,
    pub alarm: Option<AlarmPattern>,
}

/// Independently polices the hardware ceiling, the user-configured
/// ceiling, and sensor freshness. Once tripped, `emergency` latches true
/// until [`SafetyMonitor::reset`] is called explicitly — auto-recovery
/// from an over-temp condition is never safe to do unattended.
pub struct SafetyMonitor {
    max_safe_temp_c: f32,
    emergency: bool,
    last_good_reading_ms: Option<u64>,
}

impl SafetyMonitor {
    pub fn new(max_safe_temp_c: f32) -> Self {
        Self {
            max_safe_temp_c: max_safe_temp_c.clamp(100.0, HARDWARE_MAX_TEMP_C),
            emergency: false,
            last_good_reading_ms: None,
        }
    }

    /// Clamps into `[100, HARDWARE_MAX_TEMP_C]`; the invariant
    /// `max_safe_temp <= hardware_max_temp` must hold unconditionally.
    pub fn set_max_safe_temp(&mut self, temp_c: f32) {
        self.max_safe_temp_c = temp_c.clamp(100.0, HARDWARE_MAX_TEMP_C);
    }

    pub fn max_safe_temp(&self) -> f32 {
        self.max_safe_temp_c
    }

    pub fn is_emergency(&self) -> bool {
        self.emergency
    }

    /// Clears the latch. Only the operator (or a fresh boot) may call
    /// this; the monitor itself never clears its own trip.
    pub fn reset(&mut self) {
        self.emergency = false;
        self.last_good_reading_ms = None;
    }

    /// One audit pass, run every [`AUDIT_PERIOD_MS`]:
    ///
    /// 1. If the latch is already set, stay tripped and report nothing new.
    /// 2. A thermocouple fault bit only trips the latch once it has
    ///    persisted past [`TEMP_FAULT_TIMEOUT_MS`] since the last good
    ///    reading; a transient glitch is expected and does not fire.
    /// 3. A good reading that has gone stale for that same window trips
    ///    the latch too (no new data at all).
    /// 4. `temperature_c` above [`HARDWARE_MAX_TEMP_C`] trips the latch.
    /// 5. `temperature_c` above the configured `max_safe_temp` trips the
    ///    latch (a stricter, user-chosen ceiling).
    pub fn audit(&mut self, reading: Reading, now_ms: u64) -> AuditOutcome {
        if self.emergency {
            return AuditOutcome {
                emergency: true,
                events: SafetyEvents::default(),
                alarm: None,
            };
        }

        let mut events = SafetyEvents::default();

        if !reading.is_valid() {
            let since_good_ms = match self.last_good_reading_ms {
                Some(last_good_ms) => now_ms.saturating_sub(last_good_ms),
                None => 0,
            };
            if since_good_ms > TEMP_FAULT_TIMEOUT_MS {
                error!(?reading.fault, "thermocouple fault persisted, tripping emergency stop");
                self.emergency = true;
                events.emergency_stop = true;
                events.temp_fault = true;
                return AuditOutcome {
                    emergency: true,
                    events,
                    alarm: Some(AlarmPattern::Error),
                };
            }
            warn!(?reading.fault, since_good_ms, "transient thermocouple fault, within grace window");
            return AuditOutcome {
                emergency: false,
                events,
                alarm: None,
            };
        }
        self.last_good_reading_ms = Some(reading.timestamp_ms);

        if now_ms.saturating_sub(reading.timestamp_ms) > TEMP_FAULT_TIMEOUT_MS {
            error!("thermocouple reading stale, tripping emergency stop");
            self.emergency = true;
            events.emergency_stop = true;
            events.temp_fault = true;
            return AuditOutcome {
                emergency: true,
                events,
                alarm: Some(AlarmPattern::Error),
            };
        }

        if reading.temperature_c > HARDWARE_MAX_TEMP_C {
            error!(
                temp = reading.temperature_c,
                "hardware max temperature exceeded, tripping emergency stop"
            );
            self.emergency = true;
            events.emergency_stop = true;
            return AuditOutcome {
                emergency: true,
                events,
                alarm: Some(AlarmPattern::Error),
            };
        }

        if reading.temperature_c > self.max_safe_temp_c {
            warn!(
                temp = reading.temperature_c,
                limit = self.max_safe_temp_c,
                "configured safe temperature exceeded, tripping emergency stop"
            );
            self.emergency = true;
            events.emergency_stop = true;
            return AuditOutcome {
                emergency: true,
                events,
                alarm: Some(AlarmPattern::Error),
            };
        }

        AuditOutcome {
            emergency: false,
            events,
            alarm: None,
        }
    }
}
