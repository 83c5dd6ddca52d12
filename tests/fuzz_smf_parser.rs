//! Fuzzing tests for the Standard MIDI File reader
//!
//! Random and corrupted files must come back as errors, never as panics.

use floppymusic::{Smf, merge_tracks};
use rand::Rng;

fn header(tracks: u16) -> Vec<u8> {
    let mut out = b"MThd".to_vec();
    out.extend_from_slice(&6u32.to_be_bytes());
    out.extend_from_slice(&1u16.to_be_bytes());
    out.extend_from_slice(&tracks.to_be_bytes());
    out.extend_from_slice(&96u16.to_be_bytes());
    out
}

/// Fuzz the reader with random byte sequences
#[test]
fn fuzz_smf_random_bytes() {
    let mut rng = rand::thread_rng();

    for _ in 0..1000 {
        let length = rng.gen_range(0..=256);
        let bytes: Vec<u8> = (0..length).map(|_| rng.gen_range(0..=255)).collect();
        let _ = Smf::parse(&bytes);
    }
}

/// Valid header, random track bodies
#[test]
fn fuzz_smf_random_tracks() {
    let mut rng = rand::thread_rng();

    for _ in 0..1000 {
        let mut bytes = header(1);
        let body_len = rng.gen_range(0..=128usize);
        let body: Vec<u8> = (0..body_len).map(|_| rng.gen_range(0..=255)).collect();
        bytes.extend_from_slice(b"MTrk");
        // sometimes lie about the length
        let declared = if rng.gen_bool(0.2) {
            rng.gen_range(0..=u32::MAX)
        } else {
            body_len as u32
        };
        bytes.extend_from_slice(&declared.to_be_bytes());
        bytes.extend_from_slice(&body);

        if let Ok(smf) = Smf::parse(&bytes) {
            let _ = merge_tracks(&smf, &[0]);
        }
    }
}

/// Well-formed file truncated at every possible length
#[test]
fn fuzz_smf_truncation() {
    let mut bytes = header(1);
    let body = [
        0x00, 0x90, 60, 100, 0x60, 62, 100, 0x81, 0x00, 0x80, 60, 0, 0x00, 0xFF, 0x51, 0x03,
        0x07, 0xA1, 0x20, 0x00, 0xFF, 0x2F, 0x00,
    ];
    bytes.extend_from_slice(b"MTrk");
    bytes.extend_from_slice(&(body.len() as u32).to_be_bytes());
    bytes.extend_from_slice(&body);

    assert_eq!(Smf::parse(&bytes).unwrap().track_count(), 1);

    // a bare header is a file without tracks
    assert_eq!(Smf::parse(&bytes[..14]).unwrap().track_count(), 0);
    for len in (0..bytes.len()).filter(|&len| len != 14) {
        assert!(Smf::parse(&bytes[..len]).is_err(), "accepted {len} bytes");
    }
}
