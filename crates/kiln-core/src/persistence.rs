//! Persistence port.
//!
//! A trait rather than a concrete store: the control core must not know
//! whether settings land in flash, a file, or nowhere at all. Only an
//! in-memory implementation ships here; a durable backend is an
//! integration concern for the host binary.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::error::PersistenceError;
use crate::pid::PidGains;
use crate::types::{FiringProfile, FiringSegment, HistoryRecord, KilnSettings};

/// Storage port the firing engine and host layer read/write through.
pub trait Persistence: Send + Sync {
    fn load_gains(&self) -> Option<PidGains>;
    fn save_gains(&self, gains: PidGains);

    fn load_settings(&self) -> Option<KilnSettings>;
    fn save_settings(&self, settings: KilnSettings);

    fn load_profile(&self, id: &str) -> Result<FiringProfile, PersistenceError>;
    fn save_profile(&self, profile: FiringProfile) -> Result<(), PersistenceError>;
    fn delete_profile(&self, id: &str) -> Result<(), PersistenceError>;
    fn list_profiles(&self) -> Vec<FiringProfile>;

    fn append_history_event(&self, record: HistoryRecord);
    fn history(&self) -> Vec<HistoryRecord>;

    /// Opens a new trace for a firing that has genuinely begun (never at
    /// mere command-enqueue time). Grounded in `history_firing_start`.
    fn start_history(&self, profile_id: &str, profile_name: &str);
    /// Appends one temperature sample to the open trace, if any. Grounded
    /// in `history_record_temp`.
    fn record_temp_sample(&self, temp_c: f32, now_ms: u64);

    fn save_element_hours(&self, hours: f32);
    fn load_element_hours(&self) -> f32;
}

/// Sanitizes a profile id into the form the original firmware required
/// for its NVS key (<=15 chars, alphanumeric/underscore only), so a
/// persistence backend with that same constraint can be swapped in
/// later without a migration.
pub fn sanitize_profile_id(id: &str) -> Result<String, PersistenceError> {
    let sanitized: String = id
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .take(15)
        .collect();
    if sanitized.is_empty() {
        return Err(PersistenceError::InvalidId);
    }
    Ok(sanitized)
}

struct Store {
    gains: Option<PidGains>,
    settings: Option<KilnSettings>,
    profiles: HashMap<String, FiringProfile>,
    history: Vec<HistoryRecord>,
    element_hours: f32,
    /// The currently-open firing trace, if any: `(now_ms, temp_c)` samples
    /// recorded since the last `start_history`.
    trace: Option<Vec<(u64, f32)>>,
}

/// Volatile, process-lifetime persistence. Seeded with the five bundled
/// default firing profiles on construction.
pub struct InMemoryPersistence {
    store: Mutex<Store>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        let mut profiles = HashMap::new();
        for p in default_profiles() {
            profiles.insert(p.id.clone(), p);
        }
        Self {
            store: Mutex::new(Store {
                gains: None,
                settings: None,
                profiles,
                history: Vec::new(),
                element_hours: 0.0,
                trace: None,
            }),
        }
    }

    /// Returns the samples recorded for the currently-open trace, if any.
    /// Test-only hook; the host has no current use for reading a trace
    /// back mid-firing.
    #[cfg(test)]
    pub fn current_trace(&self) -> Option<Vec<(u64, f32)>> {
        self.store.lock().trace.clone()
    }
}

impl Default for InMemoryPersistence {
    fn default() -> Self {
        Self::new()
    }
}

impl Persistence for InMemoryPersistence {
    fn load_gains(&self) -> Option<PidGains> {
        self.store.lock().gains
    }

    fn save_gains(&self, gains: PidGains) {
        self.store.lock().gains = Some(gains);
    }

    fn load_settings(&self) -> Option<KilnSettings> {
        self.store.lock().settings.clone()
    }

    fn save_settings(&self, settings: KilnSettings) {
        self.store.lock().settings = Some(settings);
    }

    fn load_profile(&self, id: &str) -> Result<FiringProfile, PersistenceError> {
        self.store
            .lock()
            .profiles
            .get(id)
            .cloned()
            .ok_or_else(|| PersistenceError::ProfileNotFound(id.to_string()))
    }

    fn save_profile(&self, profile: FiringProfile) -> Result<(), PersistenceError> {
        let id = sanitize_profile_id(&profile.id)?;
        let mut store = self.store.lock();
        if !store.profiles.contains_key(&id) && store.profiles.len() >= 20 {
            return Err(PersistenceError::StoreFull);
        }
        store.profiles.insert(id, profile);
        Ok(())
    }

    fn delete_profile(&self, id: &str) -> Result<(), PersistenceError> {
        self.store
            .lock()
            .profiles
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| PersistenceError::ProfileNotFound(id.to_string()))
    }

    fn list_profiles(&self) -> Vec<FiringProfile> {
        self.store.lock().profiles.values().cloned().collect()
    }

    fn append_history_event(&self, record: HistoryRecord) {
        self.store.lock().history.push(record);
    }

    fn history(&self) -> Vec<HistoryRecord> {
        self.store.lock().history.clone()
    }

    fn start_history(&self, profile_id: &str, profile_name: &str) {
        let _ = (profile_id, profile_name);
        self.store.lock().trace = Some(Vec::new());
    }

    fn record_temp_sample(&self, temp_c: f32, now_ms: u64) {
        if let Some(trace) = self.store.lock().trace.as_mut() {
            trace.push((now_ms, temp_c));
        }
    }

    fn save_element_hours(&self, hours: f32) {
        self.store.lock().element_hours = hours;
    }

    fn load_element_hours(&self) -> f32 {
        self.store.lock().element_hours
    }
}

fn seg(id: &str, name: &str, ramp_rate: f32, target_temp: f32, hold_time_min: u16) -> FiringSegment {
    FiringSegment {
        id: id.to_string(),
        name: name.to_string(),
        ramp_rate,
        target_temp,
        hold_time_min,
    }
}

/// The five firing programs bundled with every unit, so a kiln works
/// out of the box before anyone has uploaded a custom profile. Segment
/// data is transcribed exactly from `s_default_profiles` in the original
/// firmware's `firing_engine.c`.
pub fn default_profiles() -> Vec<FiringProfile> {
    vec![
        FiringProfile {
            id: "bisque-04".into(),
            name: "Bisque Cone 04".into(),
            description: "Standard bisque firing to cone 04".into(),
            segments: vec![
                seg("1", "Warm-up", 100.0, 200.0, 60),
                seg("2", "Water smoke", 50.0, 600.0, 30),
                seg("3", "Ramp to top", 150.0, 1060.0, 15),
            ],
            max_temp: 1060.0,
            estimated_duration_min: 540,
        },
        FiringProfile {
            id: "glaze-6".into(),
            name: "Glaze Cone 6".into(),
            description: "Mid-fire glaze for stoneware".into(),
            segments: vec![
                seg("1", "Initial heat", 150.0, 600.0, 0),
                seg("2", "Medium ramp", 100.0, 1000.0, 0),
                seg("3", "Final ramp", 80.0, 1222.0, 10),
            ],
            max_temp: 1222.0,
            estimated_duration_min: 480,
        },
        FiringProfile {
            id: "glaze-10".into(),
            name: "Glaze Cone 10".into(),
            description: "High-fire glaze for porcelain".into(),
            segments: vec![
                seg("1", "Low heat", 120.0, 500.0, 0),
                seg("2", "Medium heat", 150.0, 1000.0, 15),
                seg("3", "High heat", 100.0, 1305.0, 20),
            ],
            max_temp: 1305.0,
            estimated_duration_min: 600,
        },
        FiringProfile {
            id: "low-fire".into(),
            name: "Low Fire Cone 06".into(),
            description: "Low temp for earthenware and decals".into(),
            segments: vec![
                seg("1", "Warm-up", 100.0, 400.0, 30),
                seg("2", "Ramp to top", 120.0, 999.0, 10),
            ],
            max_temp: 999.0,
            estimated_duration_min: 420,
        },
        FiringProfile {
            id: "crystalline".into(),
            name: "Crystalline Glaze".into(),
            description: "Controlled cooling for crystal growth".into(),
            segments: vec![
                seg("1", "Initial ramp", 200.0, 1260.0, 30),
                seg("2", "Crystal growth", -200.0, 1100.0, 120),
                seg("3", "Cool down", -150.0, 800.0, 0),
            ],
            max_temp: 1260.0,
            estimated_duration_min: 720,
        },
    ]
}
