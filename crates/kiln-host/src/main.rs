//! # Kiln Host
//!
//! Entry point for the kiln controller host process. Wires the
//! hardware-agnostic control core (`kiln-core`) to a thermocouple SPI
//! bus, an SSR gate, and a settings/profile store, then drives it with
//! three independent periodic tasks:
//!
//! *   A 250 ms sensor task that reads the thermocouple and republishes
//!     the latest decoded temperature.
//! *   A 500 ms safety task that audits that reading independently of
//!     whatever the firing engine is doing, and can latch an emergency
//!     stop the firing engine cannot override.
//! *   A 1 Hz firing task that drains operator commands, advances the
//!     active profile, and turns the resulting setpoint into an SSR
//!     duty cycle.
//!
//! A kiln has no display or network API in this build; operators drive
//! it through the CLI subcommands below.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};

mod config;
mod notify;
mod state;

use config::HostConfig;
use kiln_core::{FiringCommand, FiringProfile, KilnSettings, Persistence};
use state::AppState;

/// Host process for a kiln controller.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the kiln controller daemon.
    Run(RunArgs),
    /// List the firing profiles bundled with this build.
    Profiles,
}

/// Arguments for the `run` command.
#[derive(Parser, Debug)]
struct RunArgs {
    /// Path to the host configuration file.
    #[arg(short, long, default_value = "kiln.cfg")]
    config_path: PathBuf,

    /// Run against a simulated thermal plant instead of real hardware.
    /// The only mode this build can actually drive, since no
    /// production SPI/GPIO backend is wired up yet.
    #[arg(long, default_value_t = true)]
    mock_sensor: bool,

    /// Immediately start this bundled profile on launch.
    #[arg(long)]
    start: Option<String>,

    /// Delay, in minutes, before the auto-started profile begins.
    #[arg(long, default_value_t = 0)]
    delay_min: u32,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => run_daemon(args).await,
        Commands::Profiles => {
            print_profiles();
            Ok(())
        }
    }
}

fn print_profiles() {
    for profile in kiln_core::InMemoryPersistence::new().list_profiles() {
        println!("{:<12} {} ({} segments, {}°C max)", profile.id, profile.name, profile.segments.len(), profile.max_temp);
    }
}

async fn run_daemon(args: RunArgs) -> Result<()> {
    info!("starting kiln host");

    if !args.mock_sensor {
        warn!("no hardware SPI/GPIO backend is wired up in this build; falling back to the simulated plant");
    }

    let host_config = HostConfig::load(&args.config_path).unwrap_or_else(|err| {
        warn!(%err, "using built-in defaults");
        HostConfig::default()
    });

    let initial_settings = KilnSettings {
        max_safe_temp_c: host_config.kiln.max_safe_temp_c,
        tc_offset_c: host_config.kiln.tc_offset_c,
        element_watts: host_config.kiln.element_watts,
        ..KilnSettings::default()
    };

    let (app_state, _plant) = AppState::new_simulated(initial_settings.clone());
    let app_state = Arc::new(app_state);

    if let Some(profile_id) = args.start {
        match app_state.persistence.load_profile(&profile_id) {
            Ok(profile) => start_profile(&app_state, profile, args.delay_min),
            Err(err) => error!(%err, profile_id, "could not auto-start profile"),
        }
    }

    let sensor_task = spawn_sensor_task(app_state.clone());
    let safety_task = spawn_safety_task(app_state.clone());
    let firing_task = spawn_firing_task(app_state.clone());

    tokio::select! {
        _ = sensor_task => warn!("sensor task exited"),
        _ = safety_task => warn!("safety task exited"),
        _ = firing_task => warn!("firing task exited"),
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received, exiting");
        }
    }

    Ok(())
}

fn start_profile(app_state: &AppState, profile: FiringProfile, delay_min: u32) {
    if let Err(err) = app_state
        .firing
        .lock()
        .submit(FiringCommand::Start { profile, delay_min })
    {
        error!(%err, "failed to queue start command");
    }
}

fn spawn_sensor_task(app_state: Arc<AppState>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_millis(kiln_core::sensor::SAMPLE_PERIOD_MS));
        loop {
            ticker.tick().await;
            let offset = app_state.settings.read().tc_offset_c;
            let reading = app_state.sensor.read_once(offset);
            if !reading.is_valid() {
                warn!(?reading.fault, "thermocouple fault");
            }
        }
    })
}

fn spawn_safety_task(app_state: Arc<AppState>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_millis(kiln_core::safety::AUDIT_PERIOD_MS));
        let start = std::time::Instant::now();
        loop {
            ticker.tick().await;
            let Some(reading) = app_state.sensor.get_latest() else {
                continue;
            };
            let now_ms = start.elapsed().as_millis() as u64;
            let outcome = app_state.safety.lock().audit(reading, now_ms);
            if outcome.emergency {
                app_state.ssr.lock().set_emergency(true);
                if let Some(alarm) = outcome.alarm {
                    notify::sound_alarm(alarm);
                }
            }
        }
    })
}

fn spawn_firing_task(app_state: Arc<AppState>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(1));
        let start = std::time::Instant::now();
        loop {
            ticker.tick().await;
            let Some(reading) = app_state.sensor.get_latest() else {
                continue;
            };
            let now_ms = start.elapsed().as_millis() as u64;
            let emergency = app_state.safety.lock().is_emergency();

            let (duty, progress) = app_state.firing.lock().tick(now_ms, reading.temperature_c, emergency);

            let mut ssr = app_state.ssr.lock();
            ssr.set_duty(duty);
            ssr.update();
            drop(ssr);

            if progress.status == kiln_core::FiringStatus::Complete {
                info!("firing complete");
                notify::webhook_notify(&app_state.settings.read(), "firing complete");
            }
        }
    })
}
