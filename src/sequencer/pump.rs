// Event Pump - replays the merged performance in real time

use crate::drive::{DriveControl, DriveError};
use crate::midi::{Event, EventKind};
use crate::voice::{NoteOnOutcome, VoiceAllocator};
use std::io::{self, Write};
use std::thread;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PumpError {
    #[error(transparent)]
    Drive(#[from] DriveError),

    #[error("failed to write lyrics: {0}")]
    Lyrics(#[from] io::Error),
}

/// Counters of one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PumpReport {
    pub events: usize,
    pub notes_started: usize,
    pub notes_retriggered: usize,
    pub notes_dropped: usize,
    pub notes_stopped: usize,
    pub muted_skipped: usize,
    pub lyrics: usize,
}

/// Single-threaded control loop: sleep each event's delay, then hand it to
/// the voice allocator. Drives still sounding when the events run out are
/// left alone; the registry silences them at teardown.
pub struct EventPump<'a> {
    drives: &'a dyn DriveControl,
    allocator: VoiceAllocator,
    lyrics: bool,
}

impl<'a> EventPump<'a> {
    pub fn new(drives: &'a dyn DriveControl, drop_factor: f64) -> Self {
        Self {
            allocator: VoiceAllocator::new(drives.drive_count(), drop_factor),
            drives,
            lyrics: false,
        }
    }

    /// Print lyric events to the output passed to `run`
    pub fn with_lyrics(mut self, enabled: bool) -> Self {
        self.lyrics = enabled;
        self
    }

    pub fn allocator(&self) -> &VoiceAllocator {
        &self.allocator
    }

    pub fn run<I, W>(&mut self, events: I, out: &mut W) -> Result<PumpReport, PumpError>
    where
        I: IntoIterator<Item = Event>,
        W: Write,
    {
        let mut report = PumpReport::default();
        for event in events {
            // No compensation for time spent on the previous event
            if !event.delay.is_zero() {
                thread::sleep(event.delay);
            }
            self.dispatch(&event, out, &mut report)?;
        }

        tracing::info!(
            events = report.events,
            started = report.notes_started,
            retriggered = report.notes_retriggered,
            dropped = report.notes_dropped,
            stopped = report.notes_stopped,
            muted = report.muted_skipped,
            "performance finished"
        );
        Ok(report)
    }

    /// Act on one event without waiting
    pub fn dispatch<W: Write>(
        &mut self,
        event: &Event,
        out: &mut W,
        report: &mut PumpReport,
    ) -> Result<(), PumpError> {
        report.events += 1;
        if event.muted {
            report.muted_skipped += 1;
            return Ok(());
        }

        match &event.kind {
            EventKind::NoteOn { channel, note } => {
                match self.allocator.note_on(self.drives, *channel, *note)? {
                    NoteOnOutcome::Assigned(_) => report.notes_started += 1,
                    NoteOnOutcome::Retriggered(_) => report.notes_retriggered += 1,
                    NoteOnOutcome::Dropped => report.notes_dropped += 1,
                }
            }
            EventKind::NoteOff { channel } => {
                if self.allocator.note_off(self.drives, *channel)?.is_some() {
                    report.notes_stopped += 1;
                }
            }
            EventKind::Lyric(text) if self.lyrics => {
                out.write_all(normalize_line_breaks(text).as_bytes())?;
                out.flush()?;
                report.lyrics += 1;
            }
            EventKind::Lyric(_) | EventKind::Other => {}
        }
        Ok(())
    }
}

/// Lyrics use carriage returns as line breaks
pub fn normalize_line_breaks(text: &str) -> String {
    text.replace('\r', "\n")
}
