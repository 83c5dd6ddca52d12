pub mod allocator;
pub mod pitch;

pub use allocator::{NoteOnOutcome, VoiceAllocator};
pub use pitch::{PITCH_TABLE, note_frequency};
