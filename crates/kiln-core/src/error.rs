//! Error types for the kiln control core.

use thiserror::Error;

/// Errors from the thermocouple SPI transport.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SpiError {
    #[error("SPI transaction timed out")]
    Timeout,
    #[error("SPI transaction failed")]
    TransportError,
}

/// Errors from the persistence port.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PersistenceError {
    #[error("profile not found: {0}")]
    ProfileNotFound(String),
    #[error("profile store is full")]
    StoreFull,
    #[error("profile id is invalid after sanitization")]
    InvalidId,
}

/// Engine-level error taxonomy surfaced in `FiringProgress`/history records.
///
/// Thermocouple faults are not a distinct variant: they surface as
/// `EmergencyStop` once the 5-second freshness window elapses, per
/// spec.md §7.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub enum ErrorCode {
    #[default]
    None,
    EmergencyStop,
    NotRising,
    Runaway,
}

impl ErrorCode {
    pub fn as_i32(&self) -> i32 {
        match self {
            ErrorCode::None => 0,
            ErrorCode::EmergencyStop => 1,
            ErrorCode::NotRising => 2,
            ErrorCode::Runaway => 3,
        }
    }
}
