//! A deterministic simulated thermal plant.
//!
//! Implements [`SpiBus`] and [`Gpio`] directly so `kiln-core`'s sensor
//! reader and SSR modulator can be driven against it exactly as they
//! would be against real hardware, with no host-to-MCU wire protocol in
//! between (the kiln talks to its thermocouple and SSR over local SPI
//! and GPIO, not a serial link to a separate microcontroller).

use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::Arc;

use kiln_core::error::SpiError;
use kiln_core::{Gpio, SpiBus};
use tracing::trace;

/// A single lumped-capacitance heating element plus kiln chamber: power
/// in from the element while the gate is high, loss out proportional to
/// the gap above ambient.
pub struct ThermalPlant {
    /// Current temperature, stored as millidegrees C for lock-free access.
    temp_milli_c: AtomicI32,
    ambient_c: f32,
    element_watts: f32,
    /// Watts lost per degree C above ambient.
    loss_coefficient: f32,
    /// Joules to raise the lumped mass by 1 degree C.
    thermal_mass_j_per_c: f32,
    gpio_state: Arc<AtomicBool>,
}

impl ThermalPlant {
    pub fn new(ambient_c: f32, element_watts: f32, loss_coefficient: f32, thermal_mass_j_per_c: f32) -> Self {
        Self {
            temp_milli_c: AtomicI32::new((ambient_c * 1000.0) as i32),
            ambient_c,
            element_watts,
            loss_coefficient,
            thermal_mass_j_per_c,
            gpio_state: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn current_temp_c(&self) -> f32 {
        self.temp_milli_c.load(Ordering::SeqCst) as f32 / 1000.0
    }

    /// A [`Gpio`] handle wired to this plant's simulated SSR gate.
    pub fn gpio(&self) -> SimGpio {
        SimGpio {
            state: self.gpio_state.clone(),
        }
    }

    /// Integrates the plant forward by `dt_s` seconds using forward Euler.
    pub fn step(&self, dt_s: f32) {
        let powered = self.gpio_state.load(Ordering::SeqCst);
        let temp_c = self.current_temp_c();
        let power_in = if powered { self.element_watts } else { 0.0 };
        let power_out = self.loss_coefficient * (temp_c - self.ambient_c);
        let net_watts = power_in - power_out;
        let delta_c = (net_watts * dt_s) / self.thermal_mass_j_per_c;
        let new_temp = temp_c + delta_c;
        trace!(powered, temp_c = new_temp, "plant step");
        self.temp_milli_c.store((new_temp * 1000.0) as i32, Ordering::SeqCst);
    }
}

impl SpiBus for ThermalPlant {
    fn read_frame(&self) -> Result<u32, SpiError> {
        Ok(encode_frame(self.current_temp_c(), self.ambient_c))
    }
}

/// Encodes a temperature pair into the same 32-bit layout
/// `kiln_core::sensor::decode_frame` parses, the exact inverse of that
/// function, so the plant can stand in for real SPI hardware in tests.
pub fn encode_frame(temp_c: f32, cold_junction_c: f32) -> u32 {
    let tc_raw = ((temp_c / 0.25) as i32) as u16 & 0x3FFF;
    let cj_raw = ((cold_junction_c / 0.0625) as i32) as u16 & 0x0FFF;
    ((tc_raw as u32) << 18) | ((cj_raw as u32) << 4)
}

/// A [`Gpio`] implementation backed by a shared atomic, read back by
/// [`ThermalPlant::step`] on every simulation tick.
#[derive(Clone)]
pub struct SimGpio {
    state: Arc<AtomicBool>,
}

impl Gpio for SimGpio {
    fn set_high(&self) {
        self.state.store(true, Ordering::SeqCst);
    }

    fn set_low(&self) {
        self.state.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_roundtrips_through_core_decode() {
        let frame = encode_frame(850.25, 22.0);
        let reading = kiln_core::sensor::decode_frame(frame, 0);
        assert!((reading.temperature_c - 850.25).abs() < 0.26);
        assert!((reading.internal_temp_c - 22.0).abs() < 0.07);
    }

    #[test]
    fn plant_heats_up_while_powered() {
        let plant = ThermalPlant::new(20.0, 5000.0, 5.0, 50_000.0);
        let gpio = plant.gpio();
        gpio.set_high();
        let before = plant.current_temp_c();
        for _ in 0..100 {
            plant.step(1.0);
        }
        assert!(plant.current_temp_c() > before);
    }

    #[test]
    fn plant_cools_toward_ambient_when_unpowered() {
        let plant = ThermalPlant::new(20.0, 5000.0, 5.0, 50_000.0);
        plant.temp_milli_c.store(500_000, Ordering::SeqCst); // 500 C
        let gpio = plant.gpio();
        gpio.set_low();
        for _ in 0..1000 {
            plant.step(1.0);
        }
        assert!(plant.current_temp_c() < 500.0);
        assert!(plant.current_temp_c() > 20.0);
    }
}
