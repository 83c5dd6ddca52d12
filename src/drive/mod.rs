// Drives - one floppy drive per (direction, step) pin pair

pub mod pulse;
pub mod registry;
pub mod scheduler;

pub use pulse::PulseWidth;
pub use registry::{DriveRegistry, RegistryOptions, maxticks_for};

use crate::gpio::{GpioChip, GpioError, GpioResult, OutputLine};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

/// Head travel in steps before the direction flips
pub const MAX_STEPS: u32 = 80;

/// Scheduler wake frequency in Hz
pub const DEFAULT_RESOLUTION: u32 = 7200;

/// Pause after each homing pulse
pub const DEFAULT_HOMING_STEP_DELAY: Duration = Duration::from_micros(2500);

/// Pins of one physical drive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct DriveConfig {
    pub direction_pin: u32,
    pub step_pin: u32,
}

impl DriveConfig {
    pub fn new(direction_pin: u32, step_pin: u32) -> Self {
        Self {
            direction_pin,
            step_pin,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DriveError {
    #[error("no drive at index {index} (pool has {len})")]
    NoSuchDrive { index: usize, len: usize },
}

/// Why `DriveRegistry::setup` left the registry stopped
#[derive(Debug, Error)]
pub enum SetupError {
    #[error(transparent)]
    Gpio(#[from] GpioError),

    #[error("failed to start the scheduler thread: {0}")]
    Spawn(#[source] std::io::Error),
}

/// Control surface used by the voice allocator
pub trait DriveControl {
    /// Start pulsing drive `index` at `frequency` Hz; 0 silences it
    fn play(&self, index: usize, frequency: f64) -> Result<(), DriveError>;

    fn stop(&self, index: usize) -> Result<(), DriveError>;

    /// Size of the drive pool
    fn drive_count(&self) -> usize;
}

/// Copy of a drive's counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriveState {
    /// Ticks elapsed since the last pulse
    pub ticks: u32,
    /// Ticks between pulses; `None` while the drive is idle
    pub maxticks: Option<u32>,
    /// Head position in `0..=MAX_STEPS`
    pub steps: u32,
    pub direction: bool,
}

/// A configured drive with its two output lines
pub struct Drive {
    direction_line: Box<dyn OutputLine>,
    step_line: Box<dyn OutputLine>,
    pub(crate) ticks: u32,
    pub(crate) maxticks: Option<u32>,
    pub(crate) steps: u32,
    pub(crate) direction: bool,
}

impl Drive {
    /// Acquire and configure both lines. A line that was already claimed is
    /// released again if the other one fails.
    pub fn open(config: &DriveConfig, chip: &dyn GpioChip) -> GpioResult<Self> {
        let mut direction_line = open_line(chip, config.direction_pin)?;
        let step_line = match open_line(chip, config.step_pin) {
            Ok(line) => line,
            Err(e) => {
                let _ = direction_line.release();
                return Err(e);
            }
        };

        Ok(Self {
            direction_line,
            step_line,
            ticks: 0,
            maxticks: None,
            steps: 0,
            direction: true,
        })
    }

    /// Run the head against its stop: direction low, `MAX_STEPS` pulses
    /// with `step_delay` between them, then park the direction line high.
    pub fn home(&mut self, pulse: PulseWidth, step_delay: Duration) {
        self.direction_line.clear();
        for _ in 0..MAX_STEPS {
            self.pulse(pulse);
            if !step_delay.is_zero() {
                std::thread::sleep(step_delay);
            }
        }
        self.direction_line.set();
        self.direction = true;
        self.steps = 0;
    }

    pub(crate) fn pulse(&mut self, pulse: PulseWidth) {
        self.step_line.set();
        pulse.hold();
        self.step_line.clear();
    }

    pub(crate) fn reverse(&mut self) {
        self.direction = !self.direction;
        self.direction_line.write(self.direction);
    }

    pub fn state(&self) -> DriveState {
        DriveState {
            ticks: self.ticks,
            maxticks: self.maxticks,
            steps: self.steps,
            direction: self.direction,
        }
    }

    /// Pulse every `maxticks` ticks, counting from now
    pub fn start(&mut self, maxticks: u32) {
        self.ticks = 0;
        self.maxticks = Some(maxticks);
    }

    pub fn silence(&mut self) {
        self.maxticks = None;
    }

    pub fn is_idle(&self) -> bool {
        self.maxticks.is_none()
    }

    /// Give both lines back. Only valid once the scheduler is gone.
    pub fn release(&mut self) -> GpioResult<()> {
        let direction = self.direction_line.release();
        let step = self.step_line.release();
        direction.and(step)
    }

    pub fn pins(&self) -> DriveConfig {
        DriveConfig::new(self.direction_line.pin(), self.step_line.pin())
    }
}

fn open_line(chip: &dyn GpioChip, pin: u32) -> GpioResult<Box<dyn OutputLine>> {
    let mut line = chip.acquire(pin)?;
    if let Err(e) = line.configure_output() {
        let _ = line.release();
        return Err(e);
    }
    Ok(line)
}
