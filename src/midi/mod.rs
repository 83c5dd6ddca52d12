// MIDI - event model, file reader, track merge

pub mod event;
pub mod merge;
pub mod smf;

pub use event::{ChannelMessage, Event, EventKind};
pub use merge::{merge_tracks, total_duration};
pub use smf::{Smf, SmfError};
