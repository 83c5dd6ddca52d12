// Pitch mapping - note number to drive frequency

/// One equal-tempered octave starting at middle C (C C# D D# E F F# G G# A A# B)
pub const PITCH_TABLE: [f64; 12] = [
    261.626, 277.183, 293.665, 311.127, 329.628, 349.228, 369.994, 391.995, 415.305, 440.000,
    466.164, 493.883,
];

/// Frequency for `note`, divided by `drop_factor`.
///
/// Only the pitch class is used: every octave plays in the table's octave.
pub fn note_frequency(note: u8, drop_factor: f64) -> f64 {
    PITCH_TABLE[usize::from(note % 12)] / drop_factor
}
