//! Kiln host configuration loader.
//!
//! Parses the host's `kiln.cfg` using the same INI-style format and
//! `configparser` crate the host process has always used for its
//! settings file, restyled around kiln sections instead of printer
//! kinematics sections.

use anyhow::{Context, Result};
use configparser::ini::Ini;
use std::path::Path;

/// The `[hardware]` section: pin assignments for the thermocouple SPI
/// bus, the SSR gate, and the vent/alarm relays.
#[derive(Debug, Clone)]
pub struct HardwareConfig {
    pub spi_bus: String,
    pub spi_cs_pin: u32,
    pub ssr_gpio_pin: u32,
    pub vent_gpio_pin: u32,
    pub alarm_gpio_pin: u32,
}

/// The `[kiln]` section: initial safety and control settings, applied
/// only if persistence has nothing saved yet.
#[derive(Debug, Clone)]
pub struct KilnInfoConfig {
    pub max_safe_temp_c: f32,
    pub tc_offset_c: f32,
    pub element_watts: f32,
}

/// Holds the entire parsed host configuration.
#[derive(Debug, Clone)]
pub struct HostConfig {
    pub hardware: HardwareConfig,
    pub kiln: KilnInfoConfig,
}

impl HostConfig {
    /// Loads and parses the configuration file from the given path.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = Ini::new();
        config
            .load(path)
            .map_err(|e| anyhow::anyhow!(e))
            .with_context(|| format!("failed to load configuration file: {:?}", path))?;

        let hardware = HardwareConfig {
            spi_bus: config
                .get("hardware", "spi_bus")
                .context("[hardware] spi_bus not found")?,
            spi_cs_pin: config
                .getuint("hardware", "spi_cs_pin")
                .context("[hardware] spi_cs_pin not found")? as u32,
            ssr_gpio_pin: config
                .getuint("hardware", "ssr_gpio_pin")
                .context("[hardware] ssr_gpio_pin not found")? as u32,
            vent_gpio_pin: config
                .getuint("hardware", "vent_gpio_pin")
                .context("[hardware] vent_gpio_pin not found")? as u32,
            alarm_gpio_pin: config
                .getuint("hardware", "alarm_gpio_pin")
                .context("[hardware] alarm_gpio_pin not found")? as u32,
        };

        let kiln = KilnInfoConfig {
            max_safe_temp_c: config
                .getfloat("kiln", "max_safe_temp_c")
                .context("[kiln] max_safe_temp_c not found")? as f32,
            tc_offset_c: config.getfloat("kiln", "tc_offset_c").unwrap_or(Some(0.0)).unwrap_or(0.0) as f32,
            element_watts: config
                .getfloat("kiln", "element_watts")
                .context("[kiln] element_watts not found")? as f32,
        };

        Ok(Self { hardware, kiln })
    }
}

/// Default host configuration used when no `kiln.cfg` is supplied, so
/// `--mock-sensor` demo runs don't require a config file at all.
impl Default for HostConfig {
    fn default() -> Self {
        Self {
            hardware: HardwareConfig {
                spi_bus: "spidev0.0".into(),
                spi_cs_pin: 8,
                ssr_gpio_pin: 17,
                vent_gpio_pin: 27,
                alarm_gpio_pin: 22,
            },
            kiln: KilnInfoConfig {
                max_safe_temp_c: 1300.0,
                tc_offset_c: 0.0,
                element_watts: 5000.0,
            },
        }
    }
}
