// Track merge - all tracks into one time-ordered list with real-time delays

use super::event::{Event, EventKind};
use super::smf::{DEFAULT_TEMPO, Smf, TrackEventKind};
use std::time::Duration;

/// Merge every track of `smf` into one sequence of events whose `delay` is
/// the wall-clock time since the previous event.
///
/// Events at the same tick keep track order, then file order. Tempo changes
/// from any track apply from their tick on. Events of `mute_tracks` are kept
/// (so timing is unchanged) but flagged `muted`.
pub fn merge_tracks(smf: &Smf, mute_tracks: &[usize]) -> Vec<Event> {
    let mut timeline: Vec<(u64, usize, &TrackEventKind)> = Vec::new();
    for (track_index, track) in smf.tracks.iter().enumerate() {
        let mut tick = 0u64;
        for event in &track.events {
            tick += u64::from(event.delta);
            timeline.push((tick, track_index, &event.kind));
        }
    }
    // stable: same-tick events of one track stay in file order
    timeline.sort_by_key(|&(tick, track, _)| (tick, track));

    let division = u128::from(smf.division.max(1));
    let mut tempo = DEFAULT_TEMPO;
    let mut last_tick = 0u64;
    // sum of ticks * tempo; dividing only at the end keeps rounding from adding up
    let mut elapsed = 0u128;
    let mut last_micros = 0u64;

    let mut merged = Vec::with_capacity(timeline.len());
    for (tick, track, kind) in timeline {
        elapsed += u128::from(tick - last_tick) * u128::from(tempo);
        last_tick = tick;

        let micros = ((elapsed + division / 2) / division) as u64;
        let delay = Duration::from_micros(micros - last_micros);
        last_micros = micros;

        let kind = match kind {
            TrackEventKind::Channel(message) => EventKind::from(*message),
            TrackEventKind::Lyric(text) => EventKind::Lyric(text.clone()),
            TrackEventKind::Tempo(new_tempo) => {
                tempo = *new_tempo;
                EventKind::Other
            }
            TrackEventKind::EndOfTrack | TrackEventKind::Meta(_) | TrackEventKind::SysEx => {
                EventKind::Other
            }
        };

        merged.push(Event {
            delay,
            kind,
            muted: mute_tracks.contains(&track),
        });
    }
    merged
}

/// Total playing time of a merged sequence
pub fn total_duration(events: &[Event]) -> Duration {
    events.iter().map(|e| e.delay).sum()
}
