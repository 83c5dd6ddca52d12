// GPIO - Digital output line capability
//
// The drive core only ever sees `GpioChip` (acquires lines by pin number) and
// `OutputLine` (configure, set, clear, release). Three backends implement it:
// - `sysfs`: /sys/class/gpio export/direction/value files
// - `mmio`: BCM283x registers mapped through /dev/gpiomem
// - `virtual_line`: no hardware, records levels and edges (dry runs, tests)

pub mod mmio;
pub mod sysfs;
pub mod virtual_line;

pub use mmio::MmioChip;
pub use sysfs::SysfsChip;
pub use virtual_line::VirtualChip;

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Highest pin number exposed by the BCM283x GPIO block
pub const MAX_PIN: u32 = 53;

/// Errors raised while acquiring or configuring an output line
#[derive(Debug, Error)]
pub enum GpioError {
    #[error("pin {0} is outside the GPIO range 0..={MAX_PIN}")]
    InvalidPin(u32),

    #[error("failed to export pin {pin}: {source}")]
    Export {
        pin: u32,
        #[source]
        source: io::Error,
    },

    #[error("failed to unexport pin {pin}: {source}")]
    Unexport {
        pin: u32,
        #[source]
        source: io::Error,
    },

    #[error("failed to configure pin {pin} as output: {source}")]
    Configure {
        pin: u32,
        #[source]
        source: io::Error,
    },

    #[error("failed to open value file of pin {pin}: {source}")]
    Open {
        pin: u32,
        #[source]
        source: io::Error,
    },

    #[error("failed to map GPIO registers from {}: {source}", path.display())]
    Map {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("pin {0} was rejected by the virtual backend")]
    Rejected(u32),
}

pub type GpioResult<T> = Result<T, GpioError>;

/// Source of output lines, one per pin
pub trait GpioChip: Send + Sync {
    /// Claim `pin`. The line is not driven until `configure_output` succeeds.
    fn acquire(&self, pin: u32) -> GpioResult<Box<dyn OutputLine>>;
}

/// A single claimed digital output.
///
/// `set`/`clear` are called from the scheduler thread with the registry lock
/// held, so they must not block and they never report failure.
pub trait OutputLine: Send {
    fn pin(&self) -> u32;

    fn configure_output(&mut self) -> GpioResult<()>;

    /// Drive the line high
    fn set(&mut self);

    /// Drive the line low
    fn clear(&mut self);

    /// Give the pin back to the system
    fn release(&mut self) -> GpioResult<()>;

    fn write(&mut self, high: bool) {
        if high {
            self.set();
        } else {
            self.clear();
        }
    }
}

pub(crate) fn check_pin(pin: u32) -> GpioResult<()> {
    if pin > MAX_PIN {
        return Err(GpioError::InvalidPin(pin));
    }
    Ok(())
}
