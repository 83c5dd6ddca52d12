// Virtual backend - no hardware, records what would have been driven

use super::{GpioChip, GpioError, GpioResult, OutputLine, check_pin};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Observable state of one virtual pin
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PinState {
    pub acquired: bool,
    pub configured: bool,
    pub released: bool,
    pub high: bool,
    /// Number of low -> high transitions since acquisition
    pub rising_edges: u64,
}

#[derive(Default)]
struct Bank {
    pins: HashMap<u32, PinState>,
    failing: HashSet<u32>,
}

/// In-memory chip. Clones share the same pin bank, so a test can keep one
/// handle and inspect what the registry did with the other.
#[derive(Clone, Default)]
pub struct VirtualChip {
    bank: Arc<Mutex<Bank>>,
}

impl VirtualChip {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every later `acquire(pin)` fail
    pub fn fail_pin(&self, pin: u32) {
        self.lock().failing.insert(pin);
    }

    pub fn pin(&self, pin: u32) -> PinState {
        self.lock().pins.get(&pin).copied().unwrap_or_default()
    }

    pub fn rising_edges(&self, pin: u32) -> u64 {
        self.pin(pin).rising_edges
    }

    fn lock(&self) -> MutexGuard<'_, Bank> {
        self.bank.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl GpioChip for VirtualChip {
    fn acquire(&self, pin: u32) -> GpioResult<Box<dyn OutputLine>> {
        check_pin(pin)?;
        let mut bank = self.lock();
        if bank.failing.contains(&pin) {
            return Err(GpioError::Rejected(pin));
        }
        bank.pins.insert(
            pin,
            PinState {
                acquired: true,
                ..PinState::default()
            },
        );
        Ok(Box::new(VirtualLine {
            chip: self.clone(),
            pin,
        }))
    }
}

pub struct VirtualLine {
    chip: VirtualChip,
    pin: u32,
}

impl VirtualLine {
    fn update(&self, f: impl FnOnce(&mut PinState)) {
        let mut bank = self.chip.lock();
        f(bank.pins.entry(self.pin).or_default());
    }
}

impl OutputLine for VirtualLine {
    fn pin(&self) -> u32 {
        self.pin
    }

    fn configure_output(&mut self) -> GpioResult<()> {
        self.update(|state| state.configured = true);
        Ok(())
    }

    fn set(&mut self) {
        self.update(|state| {
            if !state.high {
                state.rising_edges += 1;
            }
            state.high = true;
        });
    }

    fn clear(&mut self) {
        self.update(|state| state.high = false);
    }

    fn release(&mut self) -> GpioResult<()> {
        self.update(|state| {
            state.released = true;
            state.acquired = false;
        });
        Ok(())
    }
}
