//! Deterministic simulation harness for the kiln control core.
//!
//! `ThermalPlant` implements the core's hardware-facing traits
//! (`SpiBus`, `Gpio`) in-process, so tests and demo runs can drive a
//! complete firing without any physical thermocouple, SSR, or kiln.

pub mod plant;
pub mod trace;

pub use plant::{SimGpio, ThermalPlant};
pub use trace::{Trace, TraceEntry};
