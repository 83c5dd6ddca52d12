// Integration test: MIDI file to drives, end to end on virtual lines

use floppymusic::drive::{DriveConfig, DriveRegistry, RegistryOptions};
use floppymusic::{Event, EventPump, PulseWidth, Smf, SmfError, VirtualChip, merge_tracks};
use std::io;
use std::sync::Arc;
use std::time::Duration;

fn started_registry(chip: &VirtualChip, drives: u32) -> DriveRegistry {
    let options = RegistryOptions {
        pulse_width: PulseWidth::None,
        homing_step_delay: Duration::ZERO,
        ..RegistryOptions::default()
    };
    let configs = (0..drives)
        .map(|i| DriveConfig::new(2 + 2 * i, 3 + 2 * i))
        .collect();
    let mut registry = DriveRegistry::new(configs, Arc::new(chip.clone()), options);
    registry.setup().unwrap();
    registry
}

/// Minimal SMF image: header plus one MTrk chunk per body
fn smf_bytes(format: u16, division: u16, tracks: &[Vec<u8>]) -> Vec<u8> {
    let mut out = b"MThd".to_vec();
    out.extend_from_slice(&6u32.to_be_bytes());
    out.extend_from_slice(&format.to_be_bytes());
    out.extend_from_slice(&(tracks.len() as u16).to_be_bytes());
    out.extend_from_slice(&division.to_be_bytes());
    for body in tracks {
        out.extend_from_slice(b"MTrk");
        out.extend_from_slice(&(body.len() as u32).to_be_bytes());
        out.extend_from_slice(body);
    }
    out
}

#[test]
fn test_two_drives_three_channels() {
    let chip = VirtualChip::new();
    let registry = started_registry(&chip, 2);
    let events = vec![
        Event::note_on(1, 60, 0),
        Event::note_on(2, 64, 1000),
        Event::note_on(3, 67, 1000),
        Event::note_off(1, 500),
    ];

    let mut pump = EventPump::new(&registry, 1.0);
    let report = pump.run(events, &mut io::sink()).unwrap();

    assert_eq!(report.notes_started, 2);
    assert_eq!(report.notes_dropped, 1);
    assert_eq!(report.notes_stopped, 1);

    let allocator = pump.allocator();
    assert_eq!(allocator.drive_for(1), None);
    assert_eq!(allocator.drive_for(2), Some(1));
    assert_eq!(allocator.drive_for(3), None);
    assert!(!allocator.is_occupied(0));

    // E4 at 7200 Hz: floor(7200 / 329.628)
    assert_eq!(registry.state(0).unwrap().maxticks, None);
    assert_eq!(registry.state(1).unwrap().maxticks, Some(21));
}

#[test]
fn test_drop_factor_lowers_pitch() {
    let chip = VirtualChip::new();
    let registry = started_registry(&chip, 1);

    EventPump::new(&registry, 2.0)
        .run(vec![Event::note_on(0, 69, 0)], &mut io::sink())
        .unwrap();

    // A at 220 Hz
    assert_eq!(registry.state(0).unwrap().maxticks, Some(32));
}

#[test]
fn test_midi_file_playback() {
    // conductor sets 100us per quarter note so the file plays in well under a millisecond
    let conductor = vec![0x00, 0xFF, 0x51, 0x03, 0x00, 0x00, 0x64, 0x00, 0xFF, 0x2F, 0x00];
    let melody = vec![
        0x00, 0x90, 60, 100, // C on channel 0
        0x83, 0x60, 0x90, 62, 100, // D one quarter later, same channel
        0x83, 0x60, 0x80, 62, 0, // off
        0x00, 0xFF, 0x05, 0x03, b'l', b'a', b'\r', // lyric
        0x00, 0xFF, 0x2F, 0x00,
    ];
    let smf = Smf::parse(&smf_bytes(1, 480, &[conductor, melody])).unwrap();
    let events = merge_tracks(&smf, &[]);

    let chip = VirtualChip::new();
    let registry = started_registry(&chip, 1);
    let mut out = Vec::new();
    let mut pump = EventPump::new(&registry, 1.0).with_lyrics(true);
    let report = pump.run(events, &mut out).unwrap();

    assert_eq!(report.notes_started, 1);
    assert_eq!(report.notes_retriggered, 1);
    assert_eq!(report.notes_stopped, 1);
    assert_eq!(report.lyrics, 1);
    assert_eq!(String::from_utf8(out).unwrap(), "la\n");
    assert_eq!(registry.state(0).unwrap().maxticks, None);
}

#[test]
fn test_muted_track_never_sounds() {
    let lead = vec![0x00, 0x90, 60, 100, 0x00, 0xFF, 0x2F, 0x00];
    let bass = vec![0x00, 0x91, 40, 100, 0x00, 0xFF, 0x2F, 0x00];
    let smf = Smf::parse(&smf_bytes(1, 96, &[lead, bass])).unwrap();
    let events = merge_tracks(&smf, &[0]);

    let chip = VirtualChip::new();
    let registry = started_registry(&chip, 2);
    let mut pump = EventPump::new(&registry, 1.0);
    pump.run(events, &mut io::sink()).unwrap();

    assert_eq!(pump.allocator().drive_for(0), None);
    assert_eq!(pump.allocator().drive_for(1), Some(0));
}

#[test]
fn test_format_two_rejected() {
    let track = vec![0x00, 0xFF, 0x2F, 0x00];
    let result = Smf::parse(&smf_bytes(2, 96, &[track]));
    assert!(matches!(result, Err(SmfError::UnsupportedFormat(2))));
}
