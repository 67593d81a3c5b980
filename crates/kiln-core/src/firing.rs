//! The firing engine: owns the active profile, advances it segment by
//! segment, and turns a temperature error into an SSR duty cycle.
//!
//! Grounded in the tick loop of the original firmware's
//! `firing_engine.c`: command draining, delay-start, the moving
//! setpoint, the kiln-not-rising and thermal-runaway guards, and
//! element-hours bookkeeping are all ported from that file's semantics,
//! not reinvented.

use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender, TrySendError};
use tracing::{info, warn};

use crate::autotune::{AutoTuneState, AutoTuner};
use crate::error::ErrorCode;
use crate::persistence::Persistence;
use crate::pid::Pid;
use crate::types::{
    FiringCommand, FiringProfile, FiringProgress, FiringStatus, HistoryOutcome, HistoryRecord,
};

/// Capacity of the command queue: a control surface, not a work queue,
/// so a handful of pending commands is always enough.
pub const COMMAND_QUEUE_DEPTH: usize = 4;

/// Width of the kiln-not-rising detection window.
pub const RISING_CHECK_WINDOW_MS: u64 = 15 * 60 * 1000;
/// Minimum rise required within that window.
pub const RISING_CHECK_MIN_DELTA_C: f32 = 10.0;

/// Runaway detection starts observing this long into a segment.
pub const RUNAWAY_CHECK_DELAY_MS: u64 = 5 * 60 * 1000;
/// Realized rate must exceed `max(RUNAWAY_RATE_MULTIPLIER * |ramp_rate|,
/// RUNAWAY_RATE_FLOOR_C_PER_HR)` to trip.
pub const RUNAWAY_RATE_MULTIPLIER: f32 = 2.0;
pub const RUNAWAY_RATE_FLOOR_C_PER_HR: f32 = 50.0;

/// How close current temp must be to the segment target, and how settled
/// the moving setpoint must be, before a ramp is considered arrived.
pub const AT_TARGET_TEMP_TOLERANCE_C: f32 = 2.0;
pub const AT_TARGET_SETPOINT_TOLERANCE_C: f32 = 0.5;

/// Element-hours are persisted this often rather than on every tick.
pub const ELEMENT_HOURS_SAVE_INTERVAL_MS: u64 = 5 * 60 * 1000;
/// History samples are captured this often while a firing is active.
pub const HISTORY_SAMPLE_INTERVAL_MS: u64 = 60 * 1000;

fn new_command_channel() -> (Sender<FiringCommand>, Receiver<FiringCommand>) {
    crossbeam_channel::bounded(COMMAND_QUEUE_DEPTH)
}

struct ActiveFiring {
    profile: FiringProfile,
    segment_idx: usize,
    /// Ramp-clock accumulator: advances only while actively ramping and
    /// not paused. Used for the moving setpoint.
    ramp_accum_ms: u64,
    /// Absolute wall-clock start of the current segment. Never adjusted
    /// for pauses; used by the runaway guard.
    segment_start_abs_ms: u64,
    segment_start_temp_c: f32,
    /// Absolute wall-clock timestamp the current hold began, if holding.
    /// Deliberately NOT paused-adjusted: a pause during a hold does not
    /// extend the hold.
    hold_start_abs_ms: Option<u64>,
    paused: bool,
    delay_deadline_ms: Option<u64>,
    rising_window_start_ms: u64,
    rising_window_start_temp: f32,
    peak_temp_c: f32,
    started_at_unix: i64,
}

/// Drives one firing program to completion, reporting progress and
/// consuming an SSR duty setpoint every tick.
pub struct FiringEngine {
    persistence: Arc<dyn Persistence>,
    cmd_tx: Sender<FiringCommand>,
    cmd_rx: Receiver<FiringCommand>,
    pid: Pid,
    autotuner: Option<AutoTuner>,
    active: Option<ActiveFiring>,
    status: FiringStatus,
    last_error: ErrorCode,
    last_tick_ms: Option<u64>,
    element_hours: f32,
    last_element_hours_save_ms: u64,
    last_history_sample_ms: u64,
    next_history_id: u32,
}

impl FiringEngine {
    pub fn new(persistence: Arc<dyn Persistence>, pid: Pid) -> Self {
        let (cmd_tx, cmd_rx) = new_command_channel();
        let element_hours = persistence.load_element_hours();
        Self {
            persistence,
            cmd_tx,
            cmd_rx,
            pid,
            autotuner: None,
            active: None,
            status: FiringStatus::Idle,
            last_error: ErrorCode::None,
            last_tick_ms: None,
            element_hours,
            last_element_hours_save_ms: 0,
            last_history_sample_ms: 0,
            next_history_id: 1,
        }
    }

    /// A cloneable handle for submitting commands from another task
    /// (the host's API layer, a CLI subcommand, or a test harness).
    pub fn command_sender(&self) -> Sender<FiringCommand> {
        self.cmd_tx.clone()
    }

    pub fn submit(&self, cmd: FiringCommand) -> Result<(), TrySendError<FiringCommand>> {
        self.cmd_tx.try_send(cmd)
    }

    pub fn status(&self) -> FiringStatus {
        self.status
    }

    pub fn last_error(&self) -> ErrorCode {
        self.last_error
    }

    pub fn element_hours(&self) -> f32 {
        self.element_hours
    }

    /// Forces a full stop: used by the safety monitor when it trips
    /// emergency-stop, bypassing the command queue entirely so a wedged
    /// or backed-up queue can never delay a shutdown.
    pub fn force_stop(&mut self, error: ErrorCode, now_ms: u64, current_temp_c: f32) {
        if let Some(active) = self.active.take() {
            self.record_history(&active, HistoryOutcome::Error, error, now_ms, current_temp_c);
        }
        self.autotuner = None;
        self.status = FiringStatus::Error;
        self.last_error = error;
        self.pid.reset();
    }

    fn drain_commands(&mut self, now_ms: u64, current_temp_c: f32) {
        while let Ok(cmd) = self.cmd_rx.try_recv() {
            self.apply_command(cmd, now_ms, current_temp_c);
        }
    }

    fn apply_command(&mut self, cmd: FiringCommand, now_ms: u64, current_temp_c: f32) {
        match cmd {
            FiringCommand::Start { profile, delay_min } => {
                if let Err(err) = profile.validate() {
                    warn!(?err, "rejected invalid profile on start");
                    return;
                }
                self.pid.reset();
                self.last_error = ErrorCode::None;
                let delay_deadline_ms = if delay_min > 0 {
                    Some(now_ms + u64::from(delay_min) * 60_000)
                } else {
                    None
                };
                self.active = Some(ActiveFiring {
                    profile,
                    segment_idx: 0,
                    ramp_accum_ms: 0,
                    segment_start_abs_ms: now_ms,
                    segment_start_temp_c: current_temp_c,
                    hold_start_abs_ms: None,
                    paused: false,
                    delay_deadline_ms,
                    rising_window_start_ms: now_ms,
                    rising_window_start_temp: current_temp_c,
                    peak_temp_c: current_temp_c,
                    started_at_unix: 0,
                });
                self.status = FiringStatus::Heating;
                if delay_deadline_ms.is_none() {
                    let active = self.active.as_ref().expect("just set");
                    self.persistence.start_history(&active.profile.id, &active.profile.name);
                    self.last_history_sample_ms = now_ms;
                }
                info!("firing started");
            }
            FiringCommand::Stop => {
                if let Some(active) = self.active.take() {
                    self.record_history(&active, HistoryOutcome::Aborted, ErrorCode::None, now_ms, active.peak_temp_c);
                }
                self.autotuner = None;
                self.status = FiringStatus::Idle;
                self.pid.reset();
            }
            FiringCommand::Pause => {
                if let Some(active) = self.active.as_mut() {
                    active.paused = true;
                    self.status = FiringStatus::Paused;
                }
            }
            FiringCommand::Resume => {
                if let Some(active) = self.active.as_mut() {
                    active.paused = false;
                    self.status = if active.hold_start_abs_ms.is_some() {
                        FiringStatus::Holding
                    } else {
                        FiringStatus::Heating
                    };
                }
            }
            FiringCommand::SkipSegment => {
                if let Some(mut active) = self.active.take() {
                    if advance_segment(&mut active, now_ms, current_temp_c) {
                        self.record_history(&active, HistoryOutcome::Complete, ErrorCode::None, now_ms, active.peak_temp_c);
                        self.status = FiringStatus::Complete;
                        self.pid.reset();
                    } else {
                        self.status = FiringStatus::Heating;
                        self.pid.reset();
                        self.active = Some(active);
                    }
                }
            }
            FiringCommand::AutoTuneStart { setpoint, hysteresis } => {
                let mut tuner = AutoTuner::new(setpoint, hysteresis, now_ms);
                tuner.start(now_ms);
                if tuner.state() == AutoTuneState::HeatingToSetpoint {
                    self.autotuner = Some(tuner);
                    self.status = FiringStatus::AutoTune;
                } else {
                    warn!("auto-tune start rejected, staying idle");
                }
            }
            FiringCommand::AutoTuneStop => {
                if let Some(mut tuner) = self.autotuner.take() {
                    tuner.abort();
                }
                self.status = FiringStatus::Idle;
            }
        }
    }

    fn record_history(
        &mut self,
        active: &ActiveFiring,
        outcome: HistoryOutcome,
        error: ErrorCode,
        now_ms: u64,
        peak_temp_c: f32,
    ) {
        let record = HistoryRecord {
            id: self.next_history_id,
            start_time_unix: active.started_at_unix,
            profile_id: active.profile.id.clone(),
            profile_name: active.profile.name.clone(),
            peak_temp_c,
            duration_s: (now_ms.saturating_sub(active.segment_start_abs_ms) / 1000) as u32,
            outcome,
            error_code: error.as_i32(),
        };
        self.next_history_id += 1;
        self.persistence.append_history_event(record);
    }

    /// Advances the engine by one tick and returns the requested SSR
    /// duty cycle in `[0.0, 1.0]`, together with an up-to-date progress
    /// snapshot. `emergency` reflects the safety monitor's latch and
    /// always wins: when set, the engine force-stops and reports 0 duty.
    pub fn tick(&mut self, now_ms: u64, current_temp_c: f32, emergency: bool) -> (f32, FiringProgress) {
        self.drain_commands(now_ms, current_temp_c);

        if emergency {
            if self.status != FiringStatus::Error {
                self.force_stop(ErrorCode::EmergencyStop, now_ms, current_temp_c);
            }
            return (0.0, self.progress(current_temp_c));
        }

        if let Some(mut tuner) = self.autotuner.take() {
            let duty = tuner.update(current_temp_c, now_ms);
            match tuner.state() {
                AutoTuneState::Complete => {
                    if let Some(result) = tuner.result() {
                        self.persistence.save_gains(result.gains);
                        self.pid.set_gains(result.gains);
                        info!(?result.gains, "auto-tune gains applied");
                    }
                    self.status = FiringStatus::Idle;
                }
                AutoTuneState::Failed => {
                    warn!("auto-tune failed to converge");
                    self.status = FiringStatus::Idle;
                }
                _ => {
                    self.autotuner = Some(tuner);
                }
            }
            return (duty, self.progress(current_temp_c));
        }

        let Some(mut active) = self.active.take() else {
            self.last_tick_ms = Some(now_ms);
            return (0.0, self.progress(current_temp_c));
        };

        active.peak_temp_c = active.peak_temp_c.max(current_temp_c);

        if let Some(deadline) = active.delay_deadline_ms {
            if now_ms < deadline {
                self.active = Some(active);
                self.last_tick_ms = Some(now_ms);
                return (0.0, self.progress(current_temp_c));
            }
            active.delay_deadline_ms = None;
            active.segment_start_abs_ms = now_ms;
            active.segment_start_temp_c = current_temp_c;
            active.rising_window_start_ms = now_ms;
            active.rising_window_start_temp = current_temp_c;
            active.peak_temp_c = current_temp_c;
            self.persistence.start_history(&active.profile.id, &active.profile.name);
            self.last_history_sample_ms = now_ms;
        }

        let dt_ms = now_ms.saturating_sub(self.last_tick_ms.unwrap_or(now_ms));
        self.last_tick_ms = Some(now_ms);

        if active.paused {
            self.status = FiringStatus::Paused;
            self.active = Some(active);
            return (0.0, self.progress(current_temp_c));
        }

        let segment = active.profile.segments[active.segment_idx].clone();
        let is_holding = active.hold_start_abs_ms.is_some();

        if !is_holding {
            active.ramp_accum_ms += dt_ms;
        }

        let setpoint_c = moving_setpoint(
            active.segment_start_temp_c,
            segment.target_temp,
            segment.ramp_rate,
            active.ramp_accum_ms,
        );

        let effective_setpoint = if is_holding { segment.target_temp } else { setpoint_c };
        let dt_s = dt_ms as f32 / 1000.0;
        let duty = self.pid.step(effective_setpoint, current_temp_c, dt_s);

        self.element_hours += duty * (dt_s / 3600.0);
        if now_ms.saturating_sub(self.last_element_hours_save_ms) >= ELEMENT_HOURS_SAVE_INTERVAL_MS {
            self.persistence.save_element_hours(self.element_hours);
            self.last_element_hours_save_ms = now_ms;
        }

        if !is_holding {
            if now_ms.saturating_sub(active.rising_window_start_ms) >= RISING_CHECK_WINDOW_MS {
                let risen = current_temp_c - active.rising_window_start_temp;
                let trip = segment.ramp_rate > 0.0 && risen < RISING_CHECK_MIN_DELTA_C;
                active.rising_window_start_ms = now_ms;
                active.rising_window_start_temp = current_temp_c;
                if trip {
                    warn!("kiln not rising fast enough, tripping");
                    self.record_history(&active, HistoryOutcome::Error, ErrorCode::NotRising, now_ms, active.peak_temp_c);
                    self.autotuner = None;
                    self.status = FiringStatus::Error;
                    self.last_error = ErrorCode::NotRising;
                    return (0.0, self.progress(current_temp_c));
                }
            }

            let segment_elapsed_ms = now_ms.saturating_sub(active.segment_start_abs_ms);
            if segment_elapsed_ms >= RUNAWAY_CHECK_DELAY_MS {
                let elapsed_hr = segment_elapsed_ms as f32 / 3_600_000.0;
                let realized_rate = (current_temp_c - active.segment_start_temp_c) / elapsed_hr;
                let threshold =
                    (RUNAWAY_RATE_MULTIPLIER * segment.ramp_rate.abs()).max(RUNAWAY_RATE_FLOOR_C_PER_HR);
                if realized_rate.abs() > threshold {
                    warn!(realized_rate, threshold, "thermal runaway detected");
                    self.record_history(&active, HistoryOutcome::Error, ErrorCode::Runaway, now_ms, active.peak_temp_c);
                    self.autotuner = None;
                    self.status = FiringStatus::Error;
                    self.last_error = ErrorCode::Runaway;
                    return (0.0, self.progress(current_temp_c));
                }
            }
        }

        if !is_holding && at_target(current_temp_c, setpoint_c, segment.target_temp) {
            active.hold_start_abs_ms = Some(now_ms);
            self.status = FiringStatus::Holding;
            self.pid.reset();
            info!(segment = active.segment_idx, "reached target, holding");
        } else if is_holding {
            self.status = FiringStatus::Holding;
            if segment.hold_time_min > 0 {
                let hold_start = active.hold_start_abs_ms.expect("holding implies hold_start set");
                let hold_elapsed_min = (now_ms.saturating_sub(hold_start)) / 60_000;
                if hold_elapsed_min >= u64::from(segment.hold_time_min) {
                    if advance_segment(&mut active, now_ms, current_temp_c) {
                        self.record_history(&active, HistoryOutcome::Complete, ErrorCode::None, now_ms, active.peak_temp_c);
                        self.pid.reset();
                        self.status = FiringStatus::Complete;
                        self.active = None;
                        return (0.0, self.progress(current_temp_c));
                    }
                    self.status = FiringStatus::Heating;
                    self.pid.reset();
                }
            }
        } else {
            self.status = FiringStatus::Heating;
        }

        if now_ms.saturating_sub(self.last_history_sample_ms) >= HISTORY_SAMPLE_INTERVAL_MS {
            self.persistence.record_temp_sample(current_temp_c, now_ms);
            self.last_history_sample_ms = now_ms;
        }

        let progress = self.progress_from_active(&active, current_temp_c, setpoint_c);
        self.active = Some(active);
        (duty, progress)
    }

    fn progress(&self, current_temp_c: f32) -> FiringProgress {
        match &self.active {
            Some(active) => {
                let segment = &active.profile.segments[active.segment_idx];
                self.progress_from_active(active, current_temp_c, segment.target_temp)
            }
            None => FiringProgress {
                current_temp: current_temp_c,
                status: self.status,
                ..FiringProgress::default()
            },
        }
    }

    fn progress_from_active(
        &self,
        active: &ActiveFiring,
        current_temp_c: f32,
        _setpoint_c: f32,
    ) -> FiringProgress {
        let segment = &active.profile.segments[active.segment_idx];
        FiringProgress {
            is_active: true,
            profile_id: active.profile.id.clone(),
            current_temp: current_temp_c,
            target_temp: segment.target_temp,
            current_segment: active.segment_idx as u8,
            total_segments: active.profile.segments.len() as u8,
            elapsed_s: (active.ramp_accum_ms / 1000) as u32,
            estimated_remaining_s: 0,
            status: self.status,
        }
    }
}

/// Linear ramp from `start_temp` toward `target_temp` at `ramp_rate_c_per_hr`,
/// clamped so it never overshoots the segment's own target.
pub fn moving_setpoint(start_temp: f32, target_temp: f32, ramp_rate_c_per_hr: f32, elapsed_ms: u64) -> f32 {
    let elapsed_hr = elapsed_ms as f32 / 3_600_000.0;
    let delta = ramp_rate_c_per_hr * elapsed_hr;
    let raw = start_temp + delta;
    if target_temp >= start_temp {
        raw.clamp(start_temp, target_temp)
    } else {
        raw.clamp(target_temp, start_temp)
    }
}

/// True once the kiln has both arrived physically and the moving
/// setpoint has settled onto the segment target.
pub fn at_target(current_temp_c: f32, setpoint_c: f32, target_temp_c: f32) -> bool {
    (current_temp_c - target_temp_c).abs() < AT_TARGET_TEMP_TOLERANCE_C
        && (setpoint_c - target_temp_c).abs() < AT_TARGET_SETPOINT_TOLERANCE_C
}

/// Moves to the next segment, if any. Returns `true` if that was the
/// last segment (the firing is now complete). Uses the live temperature
/// at the moment of transition, not the running peak, matching the
/// original's `start_segment(next_seg, current_temp)`.
fn advance_segment(active: &mut ActiveFiring, now_ms: u64, current_temp_c: f32) -> bool {
    active.segment_idx += 1;
    active.hold_start_abs_ms = None;
    active.ramp_accum_ms = 0;
    active.segment_start_abs_ms = now_ms;
    active.segment_start_temp_c = current_temp_c;
    active.rising_window_start_ms = now_ms;
    active.rising_window_start_temp = current_temp_c;
    active.segment_idx >= active.profile.segments.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::InMemoryPersistence;
    use crate::pid::PidGains;
    use crate::types::FiringSegment;

    fn engine() -> FiringEngine {
        let persistence = Arc::new(InMemoryPersistence::new());
        FiringEngine::new(persistence, Pid::new(PidGains::default(), 0.0, 1.0))
    }

    fn engine_with_persistence() -> (FiringEngine, Arc<InMemoryPersistence>) {
        let persistence = Arc::new(InMemoryPersistence::new());
        let eng = FiringEngine::new(persistence.clone(), Pid::new(PidGains::default(), 0.0, 1.0));
        (eng, persistence)
    }

    fn simple_profile() -> FiringProfile {
        FiringProfile {
            id: "t".into(),
            name: "t".into(),
            description: String::new(),
            segments: vec![FiringSegment {
                id: "1".into(),
                name: "s1".into(),
                ramp_rate: 600.0,
                target_temp: 100.0,
                hold_time_min: 5,
            }],
            max_temp: 100.0,
            estimated_duration_min: 10,
        }
    }

    #[test]
    fn moving_setpoint_clamps_at_target() {
        let sp = moving_setpoint(20.0, 100.0, 600.0, 3_600_000 * 2);
        assert_eq!(sp, 100.0);
    }

    #[test]
    fn at_target_requires_both_temp_and_setpoint_close() {
        assert!(at_target(99.5, 99.8, 100.0));
        assert!(!at_target(95.0, 99.8, 100.0));
        assert!(!at_target(99.5, 90.0, 100.0));
    }

    #[test]
    fn start_then_tick_reports_heating() {
        let mut eng = engine();
        eng.submit(FiringCommand::Start {
            profile: simple_profile(),
            delay_min: 0,
        })
        .unwrap();
        let (_duty, progress) = eng.tick(1000, 20.0, false);
        assert!(progress.is_active);
        assert_eq!(progress.status, FiringStatus::Heating);
    }

    #[test]
    fn delay_start_withholds_heating_until_deadline() {
        let mut eng = engine();
        eng.submit(FiringCommand::Start {
            profile: simple_profile(),
            delay_min: 1,
        })
        .unwrap();
        let (duty, progress) = eng.tick(1000, 20.0, false);
        assert_eq!(duty, 0.0);
        assert!(progress.is_active);
        let (_duty, progress) = eng.tick(70_000, 20.0, false);
        assert_eq!(progress.status, FiringStatus::Heating);
    }

    #[test]
    fn emergency_forces_stop_and_zero_duty() {
        let mut eng = engine();
        eng.submit(FiringCommand::Start {
            profile: simple_profile(),
            delay_min: 0,
        })
        .unwrap();
        eng.tick(0, 20.0, false);
        let (duty, progress) = eng.tick(1000, 50.0, true);
        assert_eq!(duty, 0.0);
        assert_eq!(progress.status, FiringStatus::Error);
        assert_eq!(eng.last_error(), ErrorCode::EmergencyStop);
    }

    #[test]
    fn pause_freezes_ramp_but_not_hold_clock() {
        let mut eng = engine();
        eng.submit(FiringCommand::Start {
            profile: simple_profile(),
            delay_min: 0,
        })
        .unwrap();
        eng.tick(0, 20.0, false);
        // Drive straight to holding by reaching target.
        let (_duty, progress) = eng.tick(1000, 100.0, false);
        assert_eq!(progress.status, FiringStatus::Holding);

        eng.submit(FiringCommand::Pause).unwrap();
        eng.tick(2000, 100.0, false);
        assert_eq!(eng.status(), FiringStatus::Paused);

        eng.submit(FiringCommand::Resume).unwrap();
        // Hold clock should have kept running across the 6-minute pause.
        let (_duty, progress) = eng.tick(1000 + 6 * 60_000, 100.0, false);
        assert_eq!(progress.status, FiringStatus::Complete);
    }

    #[test]
    fn hold_time_zero_never_self_advances() {
        let mut eng = engine();
        let mut profile = simple_profile();
        profile.segments[0].hold_time_min = 0;
        eng.submit(FiringCommand::Start {
            profile,
            delay_min: 0,
        })
        .unwrap();
        eng.tick(0, 20.0, false);
        eng.tick(1000, 100.0, false);
        let (_duty, progress) = eng.tick(1000 + 60 * 60_000, 100.0, false);
        assert_eq!(progress.status, FiringStatus::Holding);
    }

    #[test]
    fn skip_segment_advances_even_with_indefinite_hold() {
        let mut eng = engine();
        let mut profile = simple_profile();
        profile.segments[0].hold_time_min = 0;
        profile.segments.push(FiringSegment {
            id: "2".into(),
            name: "s2".into(),
            ramp_rate: 600.0,
            target_temp: 200.0,
            hold_time_min: 5,
        });
        profile.max_temp = 200.0;
        eng.submit(FiringCommand::Start {
            profile,
            delay_min: 0,
        })
        .unwrap();
        eng.tick(0, 20.0, false);
        eng.tick(1000, 100.0, false);
        assert_eq!(eng.status(), FiringStatus::Holding);
        eng.submit(FiringCommand::SkipSegment).unwrap();
        let (_duty, progress) = eng.tick(2000, 100.0, false);
        assert_eq!(progress.current_segment, 1);
    }

    #[test]
    fn immediate_start_uses_live_temperature_not_a_hardcoded_fallback() {
        // Starting a firing while the kiln is already hot (e.g. mid-day
        // relight) must ramp from that live temperature, never a phantom
        // 20C baseline.
        let mut eng = engine();
        let mut profile = simple_profile();
        profile.segments[0].target_temp = 500.0;
        eng.submit(FiringCommand::Start {
            profile,
            delay_min: 0,
        })
        .unwrap();
        eng.tick(0, 300.0, false);
        assert_eq!(
            eng.active.as_ref().expect("active").segment_start_temp_c,
            300.0
        );
    }

    #[test]
    fn advancing_a_segment_after_a_temperature_peak_uses_live_temp_not_peak() {
        // A hold followed by a cooling segment must start its ramp from
        // the live reading, not from the highest temperature ever seen.
        let mut eng = engine();
        let mut profile = simple_profile();
        profile.segments[0].hold_time_min = 0;
        profile.segments.push(FiringSegment {
            id: "2".into(),
            name: "cool".into(),
            ramp_rate: -100.0,
            target_temp: 50.0,
            hold_time_min: 5,
        });
        profile.max_temp = 100.0;
        eng.submit(FiringCommand::Start {
            profile,
            delay_min: 0,
        })
        .unwrap();
        eng.tick(0, 20.0, false);
        eng.tick(1000, 100.0, false); // peaks at 100, reaches target, holds
        assert_eq!(eng.status(), FiringStatus::Holding);

        eng.submit(FiringCommand::SkipSegment).unwrap();
        // Kiln has since cooled to 80 by the time the new segment starts.
        let (_duty, progress) = eng.tick(2000, 80.0, false);
        assert_eq!(progress.current_segment, 1);
        // Had segment_start_temp_c been taken from peak_temp_c (100) this
        // would read 100 instead of the live 80C reading.
        assert_eq!(
            eng.active.as_ref().expect("active").segment_start_temp_c,
            80.0
        );
    }

    #[test]
    fn immediate_start_opens_a_history_trace() {
        let (mut eng, persistence) = engine_with_persistence();
        eng.submit(FiringCommand::Start {
            profile: simple_profile(),
            delay_min: 0,
        })
        .unwrap();
        eng.tick(0, 20.0, false);
        assert_eq!(persistence.current_trace(), Some(Vec::new()));
    }

    #[test]
    fn delayed_start_opens_history_trace_only_once_the_delay_elapses() {
        let (mut eng, persistence) = engine_with_persistence();
        eng.submit(FiringCommand::Start {
            profile: simple_profile(),
            delay_min: 1,
        })
        .unwrap();
        eng.tick(0, 20.0, false);
        assert_eq!(persistence.current_trace(), None);
        eng.tick(70_000, 20.0, false);
        assert_eq!(persistence.current_trace(), Some(Vec::new()));
    }

    #[test]
    fn periodic_history_samples_are_recorded_while_firing() {
        let (mut eng, persistence) = engine_with_persistence();
        let mut profile = simple_profile();
        profile.segments[0].target_temp = 1000.0; // stays heating, never holds
        eng.submit(FiringCommand::Start {
            profile,
            delay_min: 0,
        })
        .unwrap();
        eng.tick(0, 20.0, false);
        eng.tick(HISTORY_SAMPLE_INTERVAL_MS, 25.0, false);
        let trace = persistence.current_trace().expect("trace open");
        assert_eq!(trace, vec![(HISTORY_SAMPLE_INTERVAL_MS, 25.0)]);
    }
}
