// Voice Allocator - channels to drives, bounded pool, no stealing

use super::pitch::note_frequency;
use crate::drive::{DriveControl, DriveError};
use std::collections::HashMap;

/// What a Note-On did to the pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteOnOutcome {
    /// A free drive was claimed for the channel
    Assigned(usize),
    /// The channel already held this drive; only the pitch changed
    Retriggered(usize),
    /// Every drive was busy
    Dropped,
}

/// Maps performance channels onto the drive pool.
///
/// A channel keeps its drive until a Note-Off on that channel; a second
/// Note-On on the same channel just changes the pitch.
pub struct VoiceAllocator {
    assignments: HashMap<u8, usize>,
    occupied: Vec<bool>,
    drop_factor: f64,
}

impl VoiceAllocator {
    pub fn new(pool_size: usize, drop_factor: f64) -> Self {
        Self {
            assignments: HashMap::new(),
            occupied: vec![false; pool_size],
            drop_factor,
        }
    }

    pub fn note_on(
        &mut self,
        drives: &dyn DriveControl,
        channel: u8,
        note: u8,
    ) -> Result<NoteOnOutcome, DriveError> {
        let (index, outcome) = match self.assignments.get(&channel) {
            Some(&index) => (index, NoteOnOutcome::Retriggered(index)),
            None => match self.occupied.iter().position(|busy| !busy) {
                Some(index) => (index, NoteOnOutcome::Assigned(index)),
                None => {
                    tracing::warn!(channel, note, "no free drive, note dropped");
                    return Ok(NoteOnOutcome::Dropped);
                }
            },
        };

        let frequency = note_frequency(note, self.drop_factor);
        drives.play(index, frequency)?;

        self.occupied[index] = true;
        self.assignments.insert(channel, index);
        tracing::debug!(channel, note, drive = index, frequency, "note on");
        Ok(outcome)
    }

    /// Silence and free the channel's drive. Returns the freed index, or
    /// `None` if the channel had no drive (its Note-On was dropped).
    pub fn note_off(
        &mut self,
        drives: &dyn DriveControl,
        channel: u8,
    ) -> Result<Option<usize>, DriveError> {
        let Some(&index) = self.assignments.get(&channel) else {
            return Ok(None);
        };

        drives.stop(index)?;
        self.occupied[index] = false;
        self.assignments.remove(&channel);
        tracing::debug!(channel, drive = index, "note off");
        Ok(Some(index))
    }

    pub fn drive_for(&self, channel: u8) -> Option<usize> {
        self.assignments.get(&channel).copied()
    }

    pub fn is_occupied(&self, index: usize) -> bool {
        self.occupied.get(index).copied().unwrap_or(false)
    }

    pub fn active_voice_count(&self) -> usize {
        self.occupied.iter().filter(|&&busy| busy).count()
    }
}
