//! Trace capture for simulation runs.
//!
//! Recording what the core actually did at each tick, and dumping it to
//! a file, is what lets a CI run diff today's simulated firing against
//! a golden trace from a known-good build instead of re-deriving
//! expected temperatures by hand.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use kiln_core::{FiringProgress, FiringStatus};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceEntry {
    pub tick_ms: u64,
    pub current_temp_c: f32,
    pub duty: f32,
    pub status: FiringStatus,
}

/// Accumulates [`TraceEntry`] rows across a simulated run.
#[derive(Default)]
pub struct Trace {
    entries: Vec<TraceEntry>,
}

impl Trace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, tick_ms: u64, current_temp_c: f32, duty: f32, progress: &FiringProgress) {
        self.entries.push(TraceEntry {
            tick_ms,
            current_temp_c,
            duty,
            status: progress.status,
        });
    }

    pub fn entries(&self) -> &[TraceEntry] {
        &self.entries
    }

    pub fn dump(&self, path: &Path) -> Result<()> {
        let mut file = File::create(path)?;
        let json = serde_json::to_string_pretty(&self.entries)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}
