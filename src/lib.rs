// Floppy Music - Library exports for the player binary, tests and benchmarks

pub mod config;
pub mod drive;
pub mod gpio;
pub mod midi;
pub mod sequencer;
pub mod voice;

// Re-export commonly used types for convenience
pub use config::{AppConfig, ConfigError, GpioBackend};
pub use drive::{
    DriveConfig, DriveControl, DriveError, DriveRegistry, DriveState, PulseWidth,
    RegistryOptions, SetupError,
};
pub use gpio::{GpioChip, GpioError, OutputLine, VirtualChip};
pub use midi::{Event, EventKind, Smf, SmfError, merge_tracks};
pub use sequencer::{EventPump, PumpError, PumpReport};
pub use voice::{NoteOnOutcome, VoiceAllocator, note_frequency};
