//! Drives a complete simulated firing end to end: sensor decode, PID,
//! SSR modulation, and segment advancement, against `ThermalPlant`
//! instead of real hardware. Dumps a trace so a future run can be
//! diffed against this one.

use std::sync::Arc;

use kiln_core::{
    FiringCommand, FiringEngine, FiringProfile, FiringSegment, FiringStatus, InMemoryPersistence,
    Pid, PidGains, SensorReader, TestClock,
};
use kiln_sim::{ThermalPlant, Trace};

#[test]
fn simulated_single_segment_firing_completes() {
    let clock = Arc::new(TestClock::new());
    let plant = Arc::new(ThermalPlant::new(20.0, 6000.0, 4.0, 40_000.0));
    let sensor: SensorReader<Arc<ThermalPlant>, TestClock> =
        SensorReader::new(plant.clone(), clock.clone());

    let persistence = Arc::new(InMemoryPersistence::new());
    let mut engine = FiringEngine::new(persistence, Pid::new(PidGains::default(), 0.0, 1.0));

    let profile = FiringProfile {
        id: "simtest".into(),
        name: "Sim Test".into(),
        description: String::new(),
        segments: vec![FiringSegment {
            id: "1".into(),
            name: "quick ramp".into(),
            ramp_rate: 3_600_000.0, // effectively instantaneous for the test
            target_temp: 200.0,
            hold_time_min: 1,
        }],
        max_temp: 200.0,
        estimated_duration_min: 5,
    };
    engine.submit(FiringCommand::Start { profile, delay_min: 0 }).unwrap();

    let mut trace = Trace::new();
    let mut now_ms = 0u64;
    let mut last_status = FiringStatus::Idle;

    for _ in 0..600 {
        now_ms += 1000;
        clock.set_ms(now_ms);
        let reading = sensor.tick(0.0);
        let (duty, progress) = engine.tick(now_ms, reading.temperature_c, false);
        plant.gpio().set_low(); // the SSR modulator would drive this in a real host loop
        if duty > 0.0 {
            plant.gpio().set_high();
        }
        plant.step(1.0);
        trace.record(now_ms, reading.temperature_c, duty, &progress);
        last_status = progress.status;
        if last_status == FiringStatus::Complete {
            break;
        }
    }

    assert_eq!(last_status, FiringStatus::Complete);
    assert!(trace.entries().len() > 1);

    let path = std::env::temp_dir().join("kiln_sim_single_segment_trace.json");
    trace.dump(&path).expect("trace dump should succeed");
    assert!(path.exists());
}
