// Standard MIDI File reader
//
// Reads the header and every MTrk chunk into per-track event lists with tick
// deltas. Only what playback needs is decoded: channel messages, tempo,
// lyrics and end of track. Everything else is skipped.

use super::event::ChannelMessage;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SmfError {
    #[error("failed to read MIDI file: {0}")]
    Io(#[from] std::io::Error),

    #[error("not a standard MIDI file (missing MThd header)")]
    NotMidi,

    #[error("unexpected end of data at byte {offset}")]
    Truncated { offset: usize },

    #[error("MIDI format {0} is not supported")]
    UnsupportedFormat(u16),

    #[error("time division {0:#06x} is not supported (only ticks per quarter note)")]
    UnsupportedDivision(u16),

    #[error("variable-length quantity too long at byte {offset}")]
    BadVarLen { offset: usize },

    #[error("data byte without a running status at byte {offset}")]
    MissingStatus { offset: usize },
}

pub type SmfResult<T> = Result<T, SmfError>;

/// Default tempo: 120 BPM
pub const DEFAULT_TEMPO: u32 = 500_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackEventKind {
    Channel(ChannelMessage),
    /// Microseconds per quarter note
    Tempo(u32),
    Lyric(String),
    EndOfTrack,
    /// Any other meta event, by type byte
    Meta(u8),
    SysEx,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackEvent {
    /// Ticks since the previous event in the same track
    pub delta: u32,
    pub kind: TrackEventKind,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Track {
    pub events: Vec<TrackEvent>,
}

/// A parsed format 0 or format 1 file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Smf {
    pub format: u16,
    /// Ticks per quarter note
    pub division: u16,
    pub tracks: Vec<Track>,
}

impl Smf {
    pub fn open(path: impl AsRef<Path>) -> SmfResult<Self> {
        let bytes = std::fs::read(path)?;
        Self::parse(&bytes)
    }

    pub fn parse(bytes: &[u8]) -> SmfResult<Self> {
        let mut reader = Reader::new(bytes);

        if reader.take(4).ok() != Some(b"MThd".as_slice()) {
            return Err(SmfError::NotMidi);
        }
        let header_len = reader.u32()? as usize;
        if header_len < 6 {
            return Err(SmfError::Truncated {
                offset: reader.pos,
            });
        }
        let header = reader.take(header_len)?;
        let format = u16::from_be_bytes([header[0], header[1]]);
        let declared_tracks = u16::from_be_bytes([header[2], header[3]]);
        let division = u16::from_be_bytes([header[4], header[5]]);

        if format > 1 {
            return Err(SmfError::UnsupportedFormat(format));
        }
        if division & 0x8000 != 0 || division == 0 {
            return Err(SmfError::UnsupportedDivision(division));
        }

        let mut tracks = Vec::with_capacity(usize::from(declared_tracks));
        while !reader.is_empty() {
            let id = reader.take(4)?;
            let len = reader.u32()? as usize;
            let start = reader.pos;
            let body = reader.take(len)?;
            if id == b"MTrk" {
                tracks.push(parse_track(body, start)?);
            }
        }

        if tracks.len() != usize::from(declared_tracks) {
            tracing::warn!(
                declared = declared_tracks,
                found = tracks.len(),
                "track count does not match header"
            );
        }

        Ok(Self {
            format,
            division,
            tracks,
        })
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }
}

fn parse_track(body: &[u8], base: usize) -> SmfResult<Track> {
    let mut reader = Reader::with_base(body, base);
    let mut events = Vec::new();
    let mut running_status: Option<u8> = None;

    while !reader.is_empty() {
        let delta = reader.varlen()?;
        let offset = reader.offset();
        let lead = reader.u8()?;

        let kind = match lead {
            0xFF => {
                running_status = None;
                let meta_type = reader.u8()?;
                let len = reader.varlen()? as usize;
                let data = reader.take(len)?;
                match meta_type {
                    0x05 => TrackEventKind::Lyric(String::from_utf8_lossy(data).into_owned()),
                    0x51 if data.len() >= 3 => TrackEventKind::Tempo(
                        u32::from(data[0]) << 16 | u32::from(data[1]) << 8 | u32::from(data[2]),
                    ),
                    0x2F => TrackEventKind::EndOfTrack,
                    other => TrackEventKind::Meta(other),
                }
            }
            0xF0 | 0xF7 => {
                running_status = None;
                let len = reader.varlen()? as usize;
                reader.take(len)?;
                TrackEventKind::SysEx
            }
            _ => {
                // Status byte, or first data byte under running status
                let (status, first) = if lead & 0x80 != 0 {
                    (lead, None)
                } else {
                    let status = running_status.ok_or(SmfError::MissingStatus { offset })?;
                    (status, Some(lead))
                };
                let len = ChannelMessage::data_len(status)
                    .ok_or(SmfError::MissingStatus { offset })?;
                running_status = Some(status);

                let mut message = [status, 0, 0];
                let mut filled = 0;
                if let Some(first) = first {
                    message[1] = first;
                    filled = 1;
                }
                for slot in message.iter_mut().skip(1 + filled).take(len - filled) {
                    *slot = reader.u8()?;
                }
                match ChannelMessage::from_bytes(&message[..=len]) {
                    Some(message) => TrackEventKind::Channel(message),
                    None => return Err(SmfError::Truncated { offset }),
                }
            }
        };

        let end = kind == TrackEventKind::EndOfTrack;
        events.push(TrackEvent { delta, kind });
        if end {
            break;
        }
    }

    Ok(Track { events })
}

/// Big-endian byte cursor with absolute offsets for error reporting
struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
    base: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self::with_base(bytes, 0)
    }

    fn with_base(bytes: &'a [u8], base: usize) -> Self {
        Self {
            bytes,
            pos: 0,
            base,
        }
    }

    fn offset(&self) -> usize {
        self.base + self.pos
    }

    fn is_empty(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn take(&mut self, len: usize) -> SmfResult<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.bytes.len())
            .ok_or(SmfError::Truncated {
                offset: self.offset(),
            })?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u8(&mut self) -> SmfResult<u8> {
        Ok(self.take(1)?[0])
    }

    fn u32(&mut self) -> SmfResult<u32> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Variable-length quantity, at most four bytes
    fn varlen(&mut self) -> SmfResult<u32> {
        let offset = self.offset();
        let mut value = 0u32;
        for _ in 0..4 {
            let byte = self.u8()?;
            value = (value << 7) | u32::from(byte & 0x7F);
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(SmfError::BadVarLen { offset })
    }
}
