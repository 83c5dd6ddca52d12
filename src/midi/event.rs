// MIDI event types

use std::time::Duration;

/// Channel voice message decoded from raw bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelMessage {
    NoteOn { channel: u8, note: u8, velocity: u8 },
    NoteOff { channel: u8, note: u8 },
    ControlChange { channel: u8, controller: u8, value: u8 },
    ProgramChange { channel: u8, program: u8 },
    PitchBend { channel: u8, value: i16 },
    /// Aftertouch and channel pressure, decoded only to be skipped
    Other { channel: u8 },
}

impl ChannelMessage {
    /// Number of data bytes that follow a status byte, or `None` for
    /// non-channel statuses
    pub fn data_len(status: u8) -> Option<usize> {
        match status & 0xF0 {
            0x80 | 0x90 | 0xA0 | 0xB0 | 0xE0 => Some(2),
            0xC0 | 0xD0 => Some(1),
            _ => None,
        }
    }

    /// Parse one raw channel message (status byte followed by data bytes)
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let (&status, data) = bytes.split_first()?;
        let len = Self::data_len(status)?;
        if data.len() < len {
            return None;
        }

        let channel = status & 0x0F;
        let message = match status & 0xF0 {
            0x90 => {
                let (note, velocity) = (data[0], data[1]);
                // Velocity 0 = Note Off
                if velocity == 0 {
                    ChannelMessage::NoteOff { channel, note }
                } else {
                    ChannelMessage::NoteOn {
                        channel,
                        note,
                        velocity,
                    }
                }
            }
            0x80 => ChannelMessage::NoteOff {
                channel,
                note: data[0],
            },
            0xB0 => ChannelMessage::ControlChange {
                channel,
                controller: data[0],
                value: data[1],
            },
            0xC0 => ChannelMessage::ProgramChange {
                channel,
                program: data[0],
            },
            0xE0 => {
                let lsb = i16::from(data[0] & 0x7F);
                let msb = i16::from(data[1] & 0x7F);
                ChannelMessage::PitchBend {
                    channel,
                    value: (msb << 7) | lsb,
                }
            }
            _ => ChannelMessage::Other { channel },
        };
        Some(message)
    }
}

/// What an event asks the player to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    NoteOn { channel: u8, note: u8 },
    NoteOff { channel: u8 },
    Lyric(String),
    Other,
}

impl From<ChannelMessage> for EventKind {
    fn from(message: ChannelMessage) -> Self {
        match message {
            ChannelMessage::NoteOn { channel, note, .. } => EventKind::NoteOn { channel, note },
            ChannelMessage::NoteOff { channel, .. } => EventKind::NoteOff { channel },
            _ => EventKind::Other,
        }
    }
}

/// One entry of the merged, time-ordered performance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// Time since the previous event
    pub delay: Duration,
    pub kind: EventKind,
    /// Set for events of muted tracks
    pub muted: bool,
}

impl Event {
    pub fn new(delay: Duration, kind: EventKind) -> Self {
        Self {
            delay,
            kind,
            muted: false,
        }
    }

    pub fn note_on(channel: u8, note: u8, delay_micros: u64) -> Self {
        Self::new(
            Duration::from_micros(delay_micros),
            EventKind::NoteOn { channel, note },
        )
    }

    pub fn note_off(channel: u8, delay_micros: u64) -> Self {
        Self::new(
            Duration::from_micros(delay_micros),
            EventKind::NoteOff { channel },
        )
    }

    pub fn lyric(text: impl Into<String>, delay_micros: u64) -> Self {
        Self::new(
            Duration::from_micros(delay_micros),
            EventKind::Lyric(text.into()),
        )
    }

    pub fn muted(mut self) -> Self {
        self.muted = true;
        self
    }
}
