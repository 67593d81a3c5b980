//! Thermocouple sensor reader.
//!
//! Decodes the 32-bit SPI frame produced by a MAX31855-style digital
//! thermocouple-to-digital converter and republishes the latest reading
//! behind a short-held mutex, matching `temp_read_task` in the original
//! firmware's `thermocouple.c`.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::error::SpiError;
use crate::types::{Reading, TcFault};

/// Sampling period for the sensor task (spec.md §4.1).
pub const SAMPLE_PERIOD_MS: u64 = 250;

/// Abstraction over the SPI peripheral so the reader can be driven by a
/// real bus or a simulated one without the core depending on any
/// particular HAL crate.
pub trait SpiBus: Send + Sync {
    /// Clocks out one 32-bit frame from the converter.
    fn read_frame(&self) -> Result<u32, SpiError>;
}

impl SpiBus for Box<dyn SpiBus> {
    fn read_frame(&self) -> Result<u32, SpiError> {
        (**self).read_frame()
    }
}

impl<T: SpiBus + ?Sized> SpiBus for Arc<T> {
    fn read_frame(&self) -> Result<u32, SpiError> {
        (**self).read_frame()
    }
}

/// Decodes a raw 32-bit MAX31855-style frame into a [`Reading`].
///
/// Bit layout (MSB first):
/// - `[31:18]`: 14-bit signed thermocouple temperature, 0.25 °C/LSB.
/// - `[17]`: reserved.
/// - `[16]`: composite fault flag (OR of the three fault sub-bits).
/// - `[15:4]`: 12-bit signed cold-junction temperature, 0.0625 °C/LSB.
/// - `[3]`: reserved.
/// - `[2]`: short to VCC.
/// - `[1]`: short to GND.
/// - `[0]`: open circuit.
pub fn decode_frame(frame: u32, timestamp_ms: u64) -> Reading {
    let tc_raw = (frame >> 18) as u16 & 0x3FFF;
    let tc_signed = sign_extend_14(tc_raw);
    let temperature_c = tc_signed as f32 * 0.25;

    let cj_raw = ((frame >> 4) as u16) & 0x0FFF;
    let cj_signed = sign_extend_12(cj_raw);
    let internal_temp_c = cj_signed as f32 * 0.0625;

    let mut fault = TcFault::empty();
    if frame & (1 << 0) != 0 {
        fault |= TcFault::OPEN_CIRCUIT;
    }
    if frame & (1 << 1) != 0 {
        fault |= TcFault::SHORT_GND;
    }
    if frame & (1 << 2) != 0 {
        fault |= TcFault::SHORT_VCC;
    }

    Reading {
        temperature_c,
        internal_temp_c,
        fault,
        timestamp_ms,
    }
}

fn sign_extend_14(raw: u16) -> i16 {
    if raw & 0x2000 != 0 {
        (raw | 0xC000) as i16
    } else {
        raw as i16
    }
}

fn sign_extend_12(raw: u16) -> i16 {
    if raw & 0x0800 != 0 {
        (raw | 0xF000) as i16
    } else {
        raw as i16
    }
}

/// Reads the bus on a fixed period and republishes the latest decoded
/// reading. `tc_offset_c` is applied after decode, before publication,
/// matching the original's handling of the user-configurable offset.
pub struct SensorReader<B: SpiBus, C: Clock> {
    bus: B,
    clock: Arc<C>,
    latest: Mutex<Option<Reading>>,
}

impl<B: SpiBus, C: Clock> SensorReader<B, C> {
    pub fn new(bus: B, clock: Arc<C>) -> Self {
        Self {
            bus,
            clock,
            latest: Mutex::new(None),
        }
    }

    /// Performs one read, applies `tc_offset_c`, and stores the result.
    /// Returns the stored reading (valid or faulted) for convenience.
    ///
    /// A failed SPI transaction does NOT overwrite the cached reading:
    /// the previous sample is preserved (matching `temp_read_task`, which
    /// only republishes `s_latest_reading` on `ESP_OK`) so a transient
    /// glitch doesn't look like a fresh fault to the safety monitor. The
    /// only exception is the very first read ever attempted, where there
    /// is no prior reading to fall back to.
    pub fn read_once(&self, tc_offset_c: f32) -> Reading {
        match self.bus.read_frame() {
            Ok(frame) => {
                let mut r = decode_frame(frame, self.clock.now_ms());
                if r.is_valid() {
                    r.temperature_c += tc_offset_c;
                } else {
                    debug!(?r.fault, "thermocouple fault");
                }
                *self.latest.lock() = Some(r);
                r
            }
            Err(err) => {
                warn!(?err, "thermocouple SPI transaction failed");
                let mut latest = self.latest.lock();
                match *latest {
                    Some(cached) => cached,
                    None => {
                        let fallback = Reading {
                            temperature_c: 0.0,
                            internal_temp_c: 0.0,
                            fault: TcFault::OPEN_CIRCUIT,
                            timestamp_ms: self.clock.now_ms(),
                        };
                        *latest = Some(fallback);
                        fallback
                    }
                }
            }
        }
    }

    /// Latest published reading, if any read has happened yet.
    pub fn get_latest(&self) -> Option<Reading> {
        *self.latest.lock()
    }

    /// Runs `read_once` every [`SAMPLE_PERIOD_MS`] until `should_stop`
    /// returns true. Intended to be driven from a tokio task via
    /// `tokio::time::interval`; kept free of tokio so it can also be
    /// exercised synchronously in tests.
    pub fn tick(&self, tc_offset_c: f32) -> Reading {
        self.read_once(tc_offset_c)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::TestClock;

    struct FixedBus(u32);
    impl SpiBus for FixedBus {
        fn read_frame(&self) -> Result<u32, SpiError> {
            Ok(self.0)
        }
    }

    struct FailingBus;
    impl SpiBus for FailingBus {
        fn read_frame(&self) -> Result<u32, SpiError> {
            Err(SpiError::Timeout)
        }
    }

    struct SwitchableBus(std::sync::atomic::AtomicBool);
    impl SpiBus for SwitchableBus {
        fn read_frame(&self) -> Result<u32, SpiError> {
            if self.0.load(std::sync::atomic::Ordering::SeqCst) {
                Ok(100u32 << 18)
            } else {
                Err(SpiError::Timeout)
            }
        }
    }

    #[test]
    fn decodes_positive_temperature_no_fault() {
        // 25.00 C -> raw = 100 (0x64), shifted into [31:18], no fault bits.
        let frame = (100u32) << 18;
        let r = decode_frame(frame, 0);
        assert_eq!(r.temperature_c, 25.0);
        assert!(r.is_valid());
    }

    #[test]
    fn decodes_negative_temperature_via_sign_extension() {
        // -10.00 C -> -40 LSB -> 14-bit two's complement 0x3FD8.
        let raw: u16 = (-40i16 as u16) & 0x3FFF;
        let frame = (raw as u32) << 18;
        let r = decode_frame(frame, 0);
        assert_eq!(r.temperature_c, -10.0);
    }

    #[test]
    fn decodes_cold_junction_and_fault_bits() {
        // cold junction 20.0625 C -> 321 LSB (0x0141), open-circuit fault.
        let cj: u16 = 321;
        let frame = ((cj as u32) << 4) | (1 << 16) | (1 << 0);
        let r = decode_frame(frame, 0);
        assert_eq!(r.internal_temp_c, 20.0625);
        assert!(r.fault.contains(TcFault::OPEN_CIRCUIT));
        assert!(!r.is_valid());
    }

    #[test]
    fn sensor_reader_applies_offset_only_when_valid() {
        let clock = Arc::new(TestClock::new());
        let reader = SensorReader::new(FixedBus(100u32 << 18), clock);
        let r = reader.read_once(2.5);
        assert_eq!(r.temperature_c, 27.5);
        assert_eq!(reader.get_latest(), Some(r));
    }

    #[test]
    fn sensor_reader_surfaces_transport_failure_as_open_circuit_with_no_prior_reading() {
        let clock = Arc::new(TestClock::new());
        let reader = SensorReader::new(FailingBus, clock);
        let r = reader.read_once(0.0);
        assert!(!r.is_valid());
        assert!(r.fault.contains(TcFault::OPEN_CIRCUIT));
    }

    #[test]
    fn transport_failure_preserves_previously_cached_reading() {
        let clock = Arc::new(TestClock::new());
        let bus = SwitchableBus(std::sync::atomic::AtomicBool::new(true));
        let reader = SensorReader::new(bus, clock);

        let good = reader.read_once(0.0);
        assert!(good.is_valid());

        reader.bus.0.store(false, std::sync::atomic::Ordering::SeqCst);
        let after_glitch = reader.read_once(0.0);
        assert_eq!(after_glitch, good);
        assert_eq!(reader.get_latest(), Some(good));
    }
}
