//! Shared state wiring the control core to the rest of the host
//! process: one sensor reader, one SSR modulator, one safety monitor,
//! and one firing engine, each behind the lock granularity the core
//! itself expects (short-held `parking_lot` locks, never held across
//! an await).

use std::sync::Arc;

use kiln_core::{
    FiringEngine, InMemoryPersistence, KilnSettings, Persistence, SafetyMonitor, SensorReader,
    SsrModulator, SystemClock,
};
use kiln_sim::ThermalPlant;
use parking_lot::RwLock;

/// Everything a periodic task needs a handle to. Cloned (cheaply, via
/// `Arc`) into each tokio task spawned from `main`.
pub struct AppState {
    pub persistence: Arc<InMemoryPersistence>,
    pub sensor: Arc<SensorReader<Arc<ThermalPlant>, SystemClock>>,
    pub ssr: Arc<parking_lot::Mutex<SsrModulator<Box<dyn kiln_core::Gpio>, SystemClock>>>,
    pub safety: Arc<parking_lot::Mutex<SafetyMonitor>>,
    pub firing: Arc<parking_lot::Mutex<FiringEngine>>,
    pub settings: Arc<RwLock<KilnSettings>>,
}

impl AppState {
    /// Builds a fully wired state using a simulated plant in place of
    /// real SPI/GPIO hardware, for `--mock-sensor` runs and for tests.
    pub fn new_simulated(initial_settings: KilnSettings) -> (Self, Arc<ThermalPlant>) {
        let plant = Arc::new(ThermalPlant::new(20.0, initial_settings.element_watts, 4.0, 60_000.0));

        let sensor = Arc::new(SensorReader::new(plant.clone(), Arc::new(SystemClock::new())));
        let ssr_gpio: Box<dyn kiln_core::Gpio> = Box::new(plant.gpio());
        let ssr = Arc::new(parking_lot::Mutex::new(SsrModulator::new(ssr_gpio, SystemClock::new())));
        let safety = Arc::new(parking_lot::Mutex::new(SafetyMonitor::new(
            initial_settings.max_safe_temp_c,
        )));

        let persistence = Arc::new(InMemoryPersistence::new());
        let gains = persistence.load_gains().unwrap_or_default();
        let firing = Arc::new(parking_lot::Mutex::new(FiringEngine::new(
            persistence.clone(),
            kiln_core::Pid::new(gains, 0.0, 1.0),
        )));

        let state = Self {
            persistence,
            sensor,
            ssr,
            safety,
            firing,
            settings: Arc::new(RwLock::new(initial_settings)),
        };
        (state, plant)
    }
}
