// Scheduler - fixed-resolution tick loop driving every step line
//
// Each tick advances every playing drive by one; a drive whose counter has
// reached its `maxticks` emits a step pulse. The pitch a drive produces is
// therefore `resolution / maxticks`, so high notes get coarser.

use super::{Drive, MAX_STEPS, PulseWidth};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

/// Duration of one tick at `resolution` Hz
pub fn tick_period(resolution: u32) -> Duration {
    Duration::from_nanos(1_000_000_000 / u64::from(resolution.max(1)))
}

/// Advance one drive by a single tick. Returns true if a pulse was emitted.
pub fn advance(drive: &mut Drive, pulse: PulseWidth) -> bool {
    let Some(maxticks) = drive.maxticks else {
        return false;
    };

    drive.ticks += 1;
    if drive.ticks < maxticks {
        return false;
    }

    drive.steps += 1;
    if drive.steps > MAX_STEPS {
        drive.reverse();
        drive.steps = 0;
    }
    drive.pulse(pulse);
    drive.ticks = 0;
    true
}

/// One tick over the whole pool. Returns the number of pulses emitted.
pub fn sweep(drives: &mut [Drive], pulse: PulseWidth) -> usize {
    drives
        .iter_mut()
        .map(|drive| advance(drive, pulse))
        .filter(|&pulsed| pulsed)
        .count()
}

/// Body of the scheduler thread. Runs until `running` goes false.
///
/// Wakeups are scheduled on absolute deadlines so the time spent sweeping
/// does not stretch the period. After a stall longer than one period the
/// deadline is re-anchored to now instead of bursting to catch up.
pub fn run(
    drives: Arc<Mutex<Vec<Drive>>>,
    running: Arc<AtomicBool>,
    resolution: u32,
    pulse: PulseWidth,
) {
    let period = tick_period(resolution);
    let mut deadline = Instant::now() + period;

    tracing::info!(?period, resolution, "scheduler started");

    while running.load(Ordering::Acquire) {
        {
            let mut drives = drives.lock().unwrap_or_else(PoisonError::into_inner);
            sweep(&mut drives, pulse);
        }

        let now = Instant::now();
        if deadline > now {
            thread::sleep(deadline - now);
            deadline += period;
        } else if now - deadline > period {
            deadline = now + period;
        } else {
            deadline += period;
        }
    }

    tracing::info!("scheduler stopped");
}
