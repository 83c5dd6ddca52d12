// Drive Registry - owns the drive pool and the scheduler thread

use super::scheduler;
use super::{
    DEFAULT_HOMING_STEP_DELAY, DEFAULT_RESOLUTION, Drive, DriveConfig, DriveControl, DriveError,
    DriveState, PulseWidth, SetupError,
};
use crate::gpio::GpioChip;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Timing knobs of the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryOptions {
    /// Scheduler ticks per second
    pub resolution: u32,
    pub pulse_width: PulseWidth,
    /// Pause after each homing pulse
    pub homing_step_delay: Duration,
}

impl Default for RegistryOptions {
    fn default() -> Self {
        Self {
            resolution: DEFAULT_RESOLUTION,
            pulse_width: PulseWidth::default(),
            homing_step_delay: DEFAULT_HOMING_STEP_DELAY,
        }
    }
}

/// Ticks between pulses for `frequency`, or `None` for silence.
///
/// Truncating division, clamped to at least one tick.
pub fn maxticks_for(resolution: u32, frequency: f64) -> Option<u32> {
    if !frequency.is_finite() || frequency <= 0.0 {
        return None;
    }
    let ticks = (f64::from(resolution) / frequency).floor();
    Some((ticks as u32).max(1))
}

/// Fixed set of drives shared between the control thread and the scheduler.
///
/// Every access to drive state goes through the one mutex. Dropping the
/// registry stops and joins the scheduler before any line is released.
pub struct DriveRegistry {
    configs: Vec<DriveConfig>,
    chip: Arc<dyn GpioChip>,
    options: RegistryOptions,
    drives: Arc<Mutex<Vec<Drive>>>,
    running: Arc<AtomicBool>,
    scheduler: Option<JoinHandle<()>>,
}

impl DriveRegistry {
    pub fn new(configs: Vec<DriveConfig>, chip: Arc<dyn GpioChip>, options: RegistryOptions) -> Self {
        Self {
            configs,
            chip,
            options,
            drives: Arc::new(Mutex::new(Vec::new())),
            running: Arc::new(AtomicBool::new(false)),
            scheduler: None,
        }
    }

    /// Configure and home every drive, then start the scheduler.
    ///
    /// Fails on the first drive whose lines cannot be acquired; lines already
    /// taken are handed back and the registry stays stopped.
    pub fn setup(&mut self) -> Result<(), SetupError> {
        if self.is_running() {
            return Ok(());
        }

        let mut drives = Vec::with_capacity(self.configs.len());
        for (index, config) in self.configs.iter().enumerate() {
            match Drive::open(config, self.chip.as_ref()) {
                Ok(drive) => drives.push(drive),
                Err(e) => {
                    tracing::error!(
                        index,
                        direction_pin = config.direction_pin,
                        step_pin = config.step_pin,
                        "drive setup failed: {e}"
                    );
                    release_all(&mut drives);
                    return Err(e.into());
                }
            }
        }

        for (index, drive) in drives.iter_mut().enumerate() {
            drive.home(self.options.pulse_width, self.options.homing_step_delay);
            tracing::info!(index, pins = ?drive.pins(), "drive homed");
        }

        *self.lock() = drives;
        self.running.store(true, Ordering::Release);

        let drives = Arc::clone(&self.drives);
        let running = Arc::clone(&self.running);
        let resolution = self.options.resolution;
        let pulse = self.options.pulse_width;
        let spawned = thread::Builder::new()
            .name("drive-scheduler".into())
            .spawn(move || scheduler::run(drives, running, resolution, pulse));

        match spawned {
            Ok(handle) => {
                self.scheduler = Some(handle);
                tracing::info!(
                    drives = self.configs.len(),
                    resolution,
                    "drive scheduler running"
                );
                Ok(())
            }
            Err(e) => {
                self.running.store(false, Ordering::Release);
                let mut drives = self.lock();
                release_all(&mut drives);
                drives.clear();
                Err(SetupError::Spawn(e))
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Number of drives in the pool (0 until `setup` succeeds)
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Consistent copy of one drive's counters
    pub fn state(&self, index: usize) -> Option<DriveState> {
        self.lock().get(index).map(Drive::state)
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Drive>> {
        self.drives.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn with_drive<R>(&self, index: usize, f: impl FnOnce(&mut Drive) -> R) -> Result<R, DriveError> {
        let mut drives = self.lock();
        let len = drives.len();
        drives
            .get_mut(index)
            .map(f)
            .ok_or(DriveError::NoSuchDrive { index, len })
    }
}

impl DriveControl for DriveRegistry {
    fn play(&self, index: usize, frequency: f64) -> Result<(), DriveError> {
        let Some(maxticks) = maxticks_for(self.options.resolution, frequency) else {
            return self.stop(index);
        };
        self.with_drive(index, |drive| drive.start(maxticks))
    }

    fn stop(&self, index: usize) -> Result<(), DriveError> {
        self.with_drive(index, Drive::silence)
    }

    fn drive_count(&self) -> usize {
        self.len()
    }
}

impl Drop for DriveRegistry {
    fn drop(&mut self) {
        if !self.is_running() {
            return;
        }
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.scheduler.take() {
            if handle.join().is_err() {
                tracing::warn!("drive scheduler panicked");
            }
        }

        release_all(&mut self.lock());
        tracing::info!("drives released");
    }
}

fn release_all(drives: &mut [Drive]) {
    for drive in drives.iter_mut() {
        if let Err(e) = drive.release() {
            tracing::warn!(pins = ?drive.pins(), "failed to release drive: {e}");
        }
    }
}
