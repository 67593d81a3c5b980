//! Data model shared by every component of the core.
//!
//! Matches (in meaning, not in C layout) `firing_types.h` / `safety.h` /
//! `thermocouple.h` from the original firmware: `FiringSegment`,
//! `FiringProfile`, `thermocouple_reading_t`, `firing_progress_t`,
//! `kiln_settings_t`, and the `firing_cmd_t` tagged union.

use serde::{Deserialize, Serialize};

/// Small macro standing in for a dependency-free bitflags type: the corpus
/// doesn't otherwise need a `bitflags` crate dependency for three bits.
macro_rules! bitflags_like {
    (
        $(#[$meta:meta])*
        pub struct $name:ident: $ty:ty {
            $(const $flag:ident = $value:expr;)*
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
        pub struct $name($ty);

        impl $name {
            $(pub const $flag: $name = $name($value);)*

            pub const fn empty() -> Self {
                $name(0)
            }

            pub const fn bits(&self) -> $ty {
                self.0
            }

            pub const fn from_bits(bits: $ty) -> Self {
                $name(bits)
            }

            pub const fn is_empty(&self) -> bool {
                self.0 == 0
            }

            pub const fn contains(&self, other: Self) -> bool {
                (self.0 & other.0) == other.0
            }
        }

        impl std::ops::BitOr for $name {
            type Output = Self;
            fn bitor(self, rhs: Self) -> Self {
                $name(self.0 | rhs.0)
            }
        }

        impl std::ops::BitOrAssign for $name {
            fn bitor_assign(&mut self, rhs: Self) {
                self.0 |= rhs.0;
            }
        }
    };
}

/// Hard ceiling on segments per profile (spec.md §3 invariant).
pub const MAX_SEGMENTS: usize = 16;

/// One ramp/hold step of a firing program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FiringSegment {
    pub id: String,
    pub name: String,
    /// °C/hr; positive = heating, negative = cooling.
    pub ramp_rate: f32,
    /// Absolute target temperature in °C.
    pub target_temp: f32,
    /// Minutes to hold at `target_temp`. 0 = hold indefinitely until a
    /// `SkipSegment` command.
    pub hold_time_min: u16,
}

/// An ordered firing program: 1 to [`MAX_SEGMENTS`] segments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FiringProfile {
    pub id: String,
    pub name: String,
    pub description: String,
    pub segments: Vec<FiringSegment>,
    /// Max across `segments[].target_temp`; kept precomputed like the
    /// original rather than recomputed on every read.
    pub max_temp: f32,
    /// Minutes, used only to estimate remaining time.
    pub estimated_duration_min: u32,
}

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum ProfileError {
    #[error("profile must have between 1 and {} segments, got {0}", MAX_SEGMENTS)]
    SegmentCountOutOfRange(usize),
    #[error("max_temp {max_temp} is less than the highest segment target {highest}")]
    MaxTempTooLow { max_temp: f32, highest: f32 },
}

impl FiringProfile {
    /// Validates the invariants from spec.md §3:
    /// `segment_count ∈ [1, 16]` and `max_temp ≥ max(segment.target_temp)`.
    pub fn validate(&self) -> Result<(), ProfileError> {
        if self.segments.is_empty() || self.segments.len() > MAX_SEGMENTS {
            return Err(ProfileError::SegmentCountOutOfRange(self.segments.len()));
        }
        let highest = self
            .segments
            .iter()
            .map(|s| s.target_temp)
            .fold(f32::MIN, f32::max);
        if self.max_temp < highest {
            return Err(ProfileError::MaxTempTooLow {
                max_temp: self.max_temp,
                highest,
            });
        }
        Ok(())
    }
}

bitflags_like! {
    /// Thermocouple fault bits, bits [2:0] of the MAX31855-style frame.
    pub struct TcFault: u8 {
        const OPEN_CIRCUIT = 1 << 0;
        const SHORT_GND    = 1 << 1;
        const SHORT_VCC    = 1 << 2;
    }
}

/// A single thermocouple sample.
///
/// If `fault` is non-zero, `temperature_c`/`internal_temp_c` are undefined
/// and MUST NOT be consumed by controllers (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    pub temperature_c: f32,
    pub internal_temp_c: f32,
    pub fault: TcFault,
    /// Monotonic acquisition timestamp, milliseconds.
    pub timestamp_ms: u64,
}

impl Reading {
    pub fn is_valid(&self) -> bool {
        self.fault.is_empty()
    }
}

/// Observable firing status, matching `firing_status_t`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FiringStatus {
    Idle,
    Heating,
    Holding,
    Cooling,
    Complete,
    Error,
    Paused,
    AutoTune,
}

/// Live progress snapshot, matching `firing_progress_t`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FiringProgress {
    pub is_active: bool,
    pub profile_id: String,
    pub current_temp: f32,
    pub target_temp: f32,
    pub current_segment: u8,
    pub total_segments: u8,
    pub elapsed_s: u32,
    pub estimated_remaining_s: u32,
    pub status: FiringStatus,
}

impl Default for FiringProgress {
    fn default() -> Self {
        Self {
            is_active: false,
            profile_id: String::new(),
            current_temp: 0.0,
            target_temp: 0.0,
            current_segment: 0,
            total_segments: 0,
            elapsed_s: 0,
            estimated_remaining_s: 0,
            status: FiringStatus::Idle,
        }
    }
}

/// Temperature display unit for the (external) UI layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TempUnit {
    Celsius,
    Fahrenheit,
}

/// User-configurable settings, matching `kiln_settings_t` plus the
/// notification fields named in spec.md §6.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KilnSettings {
    pub temp_unit: TempUnit,
    pub max_safe_temp_c: f32,
    pub alarm_enabled: bool,
    pub auto_shutdown: bool,
    pub notifications_enabled: bool,
    /// Added to every thermocouple reading before it reaches any controller.
    pub tc_offset_c: f32,
    pub webhook_url: String,
    pub api_token: String,
    pub element_watts: f32,
    pub electricity_cost_per_kwh: f32,
}

impl KilnSettings {
    /// Clamps `max_safe_temp_c` into `[100, hardware_max_temp]`, preserving
    /// every other field. The invariant `max_safe_temp <= hardware_max_temp`
    /// must hold after every write (spec.md §3).
    pub fn clamped(mut self, hardware_max_temp: f32) -> Self {
        self.max_safe_temp_c = self.max_safe_temp_c.clamp(100.0, hardware_max_temp);
        self
    }
}

impl Default for KilnSettings {
    fn default() -> Self {
        Self {
            temp_unit: TempUnit::Celsius,
            max_safe_temp_c: 1300.0,
            alarm_enabled: true,
            auto_shutdown: true,
            notifications_enabled: true,
            tc_offset_c: 0.0,
            webhook_url: String::new(),
            api_token: String::new(),
            element_watts: 5000.0,
            electricity_cost_per_kwh: 0.15,
        }
    }
}

/// Commands accepted by the firing engine's command channel.
#[derive(Debug, Clone)]
pub enum FiringCommand {
    Start { profile: FiringProfile, delay_min: u32 },
    Stop,
    Pause,
    Resume,
    SkipSegment,
    AutoTuneStart { setpoint: f32, hysteresis: f32 },
    AutoTuneStop,
}

/// How a firing concluded, recorded in history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HistoryOutcome {
    Complete,
    Error,
    Aborted,
}

/// One completed (or aborted/errored) firing, handed to the history sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub id: u32,
    /// Unix timestamp; 0 if wall-clock was never available (spec.md §9).
    pub start_time_unix: i64,
    pub profile_id: String,
    pub profile_name: String,
    pub peak_temp_c: f32,
    pub duration_s: u32,
    pub outcome: HistoryOutcome,
    pub error_code: i32,
}

/// Alarm buzzer patterns (spec.md §6): short beep, completion, error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmPattern {
    ShortBeep,
    Complete,
    Error,
}

impl AlarmPattern {
    /// `(pulse count, on_ms, off_ms)` describing the GPIO toggle pattern.
    pub fn pulses(&self) -> (u32, u64, u64) {
        match self {
            AlarmPattern::ShortBeep => (1, 200, 0),
            AlarmPattern::Complete => (3, 500, 200),
            AlarmPattern::Error => (5, 100, 100),
        }
    }
}

/// Vent relay is energized exactly while actively firing below 700°C,
/// per spec.md §6.
pub fn vent_should_be_energized(is_active: bool, current_temp_c: f32) -> bool {
    is_active && current_temp_c < 700.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(ramp: f32, target: f32, hold: u16) -> FiringSegment {
        FiringSegment {
            id: "1".into(),
            name: "seg".into(),
            ramp_rate: ramp,
            target_temp: target,
            hold_time_min: hold,
        }
    }

    #[test]
    fn profile_segment_count_invariant() {
        let empty = FiringProfile {
            id: "p".into(),
            name: "p".into(),
            description: String::new(),
            segments: vec![],
            max_temp: 0.0,
            estimated_duration_min: 0,
        };
        assert!(empty.validate().is_err());

        let too_many = FiringProfile {
            segments: (0..17).map(|_| seg(50.0, 100.0, 0)).collect(),
            ..empty.clone()
        };
        assert!(too_many.validate().is_err());
    }

    #[test]
    fn profile_max_temp_invariant() {
        let p = FiringProfile {
            id: "p".into(),
            name: "p".into(),
            description: String::new(),
            segments: vec![seg(100.0, 600.0, 0)],
            max_temp: 500.0,
            estimated_duration_min: 10,
        };
        assert!(p.validate().is_err());
    }

    #[test]
    fn tc_fault_bits_roundtrip() {
        let f = TcFault::OPEN_CIRCUIT | TcFault::SHORT_VCC;
        assert!(f.contains(TcFault::OPEN_CIRCUIT));
        assert!(!f.contains(TcFault::SHORT_GND));
        assert_eq!(TcFault::from_bits(f.bits()), f);
    }

    #[test]
    fn settings_clamp_keeps_invariant() {
        let hardware_max = 1400.0;
        let low = KilnSettings {
            max_safe_temp_c: 10.0,
            ..KilnSettings::default()
        }
        .clamped(hardware_max);
        assert_eq!(low.max_safe_temp_c, 100.0);

        let high = KilnSettings {
            max_safe_temp_c: 5000.0,
            ..KilnSettings::default()
        }
        .clamped(hardware_max);
        assert_eq!(high.max_safe_temp_c, hardware_max);
    }

    #[test]
    fn vent_rule() {
        assert!(vent_should_be_energized(true, 650.0));
        assert!(!vent_should_be_energized(true, 750.0));
        assert!(!vent_should_be_energized(false, 100.0));
    }

    #[test]
    fn settings_round_trip_through_json() {
        let settings = KilnSettings {
            webhook_url: "https://example.com/hook".into(),
            ..KilnSettings::default()
        };
        let json = serde_json::to_string(&settings).unwrap();
        let restored: KilnSettings = serde_json::from_str(&json).unwrap();
        assert_eq!(settings, restored);
    }
}
