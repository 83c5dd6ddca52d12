// Sequencer - real-time replay of merged events

pub mod pump;

pub use pump::{EventPump, PumpError, PumpReport, normalize_line_breaks};
