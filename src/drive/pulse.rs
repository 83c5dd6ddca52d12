// Minimum pulse width - hold time between setting and clearing a step line

use serde::Deserialize;
use std::time::Duration;

/// How long the step line stays high for one pulse.
///
/// Some drive controllers miss a pulse that is only as wide as the gap
/// between two register writes, so the default burns a few spin iterations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum PulseWidth {
    /// Clear right after set
    None,
    /// Spin for a fixed number of iterations
    BusyWait { iterations: u32 },
    /// Sleep the scheduler thread (coarse, adds to tick jitter)
    Sleep { micros: u64 },
}

impl Default for PulseWidth {
    fn default() -> Self {
        PulseWidth::BusyWait { iterations: 15 }
    }
}

impl PulseWidth {
    pub fn hold(&self) {
        match *self {
            PulseWidth::None => {}
            PulseWidth::BusyWait { iterations } => {
                for i in 0..iterations {
                    std::hint::black_box(i);
                    std::hint::spin_loop();
                }
            }
            PulseWidth::Sleep { micros } => std::thread::sleep(Duration::from_micros(micros)),
        }
    }
}
