//! Real-time control core for a kiln controller.
//!
//! This crate has no knowledge of HTTP, MQTT, flash storage, or any
//! particular SPI/GPIO peripheral. It exposes traits
//! ([`sensor::SpiBus`], [`ssr::Gpio`], [`persistence::Persistence`]) at
//! every hardware or storage seam so the host binary and the simulator
//! can each provide their own implementation while sharing the same
//! firing state machine, PID loop, auto-tuner, and safety monitor.

pub mod autotune;
pub mod clock;
pub mod error;
pub mod firing;
pub mod persistence;
pub mod pid;
pub mod safety;
pub mod sensor;
pub mod ssr;
pub mod types;

pub use autotune::{AutoTuneResult, AutoTuneState, AutoTuner};
pub use clock::{Clock, SystemClock, TestClock};
pub use error::ErrorCode;
pub use firing::FiringEngine;
pub use persistence::{InMemoryPersistence, Persistence};
pub use pid::{Pid, PidGains};
pub use safety::SafetyMonitor;
pub use sensor::{SensorReader, SpiBus};
pub use ssr::{Gpio, SsrModulator};
pub use types::{
    FiringCommand, FiringProfile, FiringProgress, FiringSegment, FiringStatus, HistoryOutcome,
    HistoryRecord, KilnSettings, Reading, TcFault, TempUnit,
};
