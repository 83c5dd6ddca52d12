// Configuration - drive pins and timing, loaded from a RON file
//
// Example `drives.ron`:
//
//     (
//         drives: [
//             (direction_pin: 17, step_pin: 18),
//             (direction_pin: 22, step_pin: 23),
//         ],
//         backend: Sysfs(root: "/sys/class/gpio"),
//         drop_factor: 2.0,
//     )

use crate::drive::{
    DEFAULT_HOMING_STEP_DELAY, DEFAULT_RESOLUTION, DriveConfig, PulseWidth, RegistryOptions,
};
use crate::gpio::mmio::DEFAULT_GPIOMEM;
use crate::gpio::sysfs::DEFAULT_SYSFS_ROOT;
use crate::gpio::{GpioChip, GpioResult, MAX_PIN, MmioChip, SysfsChip, VirtualChip};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration syntax: {0}")]
    Ron(#[from] ron::error::SpannedError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Which output line implementation drives the pins
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub enum GpioBackend {
    Sysfs {
        #[serde(default = "default_sysfs_root")]
        root: PathBuf,
    },
    Mmio {
        #[serde(default = "default_gpiomem")]
        device: PathBuf,
    },
    /// No hardware at all
    Virtual,
}

impl Default for GpioBackend {
    fn default() -> Self {
        GpioBackend::Sysfs {
            root: default_sysfs_root(),
        }
    }
}

impl GpioBackend {
    pub fn open(&self) -> GpioResult<Arc<dyn GpioChip>> {
        Ok(match self {
            GpioBackend::Sysfs { root } => {
                let chip = SysfsChip::new(root);
                tracing::info!(root = %chip.root().display(), "using sysfs GPIO");
                Arc::new(chip)
            }
            GpioBackend::Mmio { device } => {
                let chip = MmioChip::open(device)?;
                tracing::info!(device = %chip.path().display(), "GPIO registers mapped");
                Arc::new(chip)
            }
            GpioBackend::Virtual => {
                tracing::info!("using virtual GPIO lines");
                Arc::new(VirtualChip::new())
            }
        })
    }
}

fn default_sysfs_root() -> PathBuf {
    PathBuf::from(DEFAULT_SYSFS_ROOT)
}

fn default_gpiomem() -> PathBuf {
    PathBuf::from(DEFAULT_GPIOMEM)
}

fn default_resolution() -> u32 {
    DEFAULT_RESOLUTION
}

fn default_homing_step_delay_micros() -> u64 {
    DEFAULT_HOMING_STEP_DELAY.as_micros() as u64
}

fn default_drop_factor() -> f64 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AppConfig {
    pub drives: Vec<DriveConfig>,
    #[serde(default)]
    pub backend: GpioBackend,
    #[serde(default = "default_resolution")]
    pub resolution: u32,
    #[serde(default)]
    pub pulse_width: PulseWidth,
    #[serde(default = "default_homing_step_delay_micros")]
    pub homing_step_delay_micros: u64,
    #[serde(default = "default_drop_factor")]
    pub drop_factor: f64,
    #[serde(default)]
    pub lyrics: bool,
    #[serde(default)]
    pub mute_tracks: Vec<usize>,
}

impl AppConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_ron(&text)
    }

    pub fn from_ron(text: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = ron::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.drives.is_empty() {
            return Err(ConfigError::Invalid("no drives configured".into()));
        }

        let mut seen = HashSet::new();
        for (index, drive) in self.drives.iter().enumerate() {
            for pin in [drive.direction_pin, drive.step_pin] {
                if pin > MAX_PIN {
                    return Err(ConfigError::Invalid(format!(
                        "drive {index}: pin {pin} is outside 0..={MAX_PIN}"
                    )));
                }
                if !seen.insert(pin) {
                    return Err(ConfigError::Invalid(format!(
                        "drive {index}: pin {pin} is used more than once"
                    )));
                }
            }
        }

        if self.resolution == 0 {
            return Err(ConfigError::Invalid("resolution must be positive".into()));
        }
        if !self.drop_factor.is_finite() || self.drop_factor <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "drop factor must be a positive number, got {}",
                self.drop_factor
            )));
        }
        Ok(())
    }

    pub fn registry_options(&self) -> RegistryOptions {
        RegistryOptions {
            resolution: self.resolution,
            pulse_width: self.pulse_width,
            homing_step_delay: Duration::from_micros(self.homing_step_delay_micros),
        }
    }
}
