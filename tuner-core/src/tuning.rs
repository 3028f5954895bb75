//! # Musical Tuning Module
//!
//! This module maps frequencies onto the equal-tempered chromatic scale and onto
//! the six strings of a guitar in standard tuning.
//!
//! ## Features
//! - Chromatic note, octave and cents reading for any positive frequency
//! - Cents deviation against a fixed target (string lock)
//! - Closest-string search for string indicators
//! - In-tune predicate and meter segment mapping for presentation layers

use once_cell::sync::Lazy;
use std::fmt;

/// Reference pitch of A4 in Hz.
pub const REFERENCE_A4: f32 = 440.0;

/// MIDI note number of A4.
pub const REFERENCE_MIDI: i32 = 69;

/// Default tolerance, in cents, within which a note counts as in tune.
pub const IN_TUNE_CENTS: i32 = 5;

/// Largest distance from a string, in cents, at which it is still reported as
/// the string being tuned.
const STRING_CAPTURE_CENTS: f32 = 100.0;

/// Chromatic pitch classes, index 0 = C.
pub const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// A frequency in Hz that is known to be finite and strictly positive.
///
/// Every logarithmic mapping in this module takes a `Frequency`, so taking the
/// log of zero or a negative value cannot happen.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Frequency(f32);

impl Frequency {
    /// Returns `None` unless `hz` is finite and greater than zero.
    pub fn new(hz: f32) -> Option<Self> {
        if hz.is_finite() && hz > 0.0 {
            Some(Self(hz))
        } else {
            None
        }
    }

    pub fn hz(self) -> f32 {
        self.0
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2} Hz", self.0)
    }
}

/// One of the six open strings of a guitar in standard tuning.
#[derive(Debug, Clone, PartialEq)]
pub struct GuitarString {
    /// Display label, e.g. "E2".
    pub label: &'static str,
    /// Pitch class name.
    pub note: &'static str,
    pub octave: i32,
    pub midi: i32,
    pub frequency: Frequency,
}

/// Standard tuning, low E (index 0) to high E (index 5).
///
/// Frequencies are computed once from A4 = 440 Hz equal temperament.
pub static GUITAR_STRINGS: Lazy<[GuitarString; 6]> = Lazy::new(|| {
    const STRINGS: [(&str, u8); 6] = [
        ("E2", 40),
        ("A2", 45),
        ("D3", 50),
        ("G3", 55),
        ("B3", 59),
        ("E4", 64),
    ];
    STRINGS.map(|(label, midi)| GuitarString {
        label,
        note: NOTE_NAMES[usize::from(midi % 12)],
        octave: i32::from(midi / 12) - 1,
        midi: i32::from(midi),
        frequency: note_frequency(midi),
    })
});

/// Looks up a guitar string by index (0 = low E).
pub fn guitar_string(index: usize) -> Option<&'static GuitarString> {
    GUITAR_STRINGS.get(index)
}

/// Equal-temperament frequency of a MIDI note number.
///
/// Every `u8` note number maps to somewhere between 8.18 Hz (0) and about
/// 20 MHz (255), so the result is always a valid frequency.
pub fn note_frequency(midi: u8) -> Frequency {
    let semitones = i32::from(midi) - REFERENCE_MIDI;
    Frequency(REFERENCE_A4 * 2.0_f32.powf(semitones as f32 / 12.0))
}

/// A chromatic reading of a frequency.
#[derive(Debug, Clone, PartialEq)]
pub struct NoteReading {
    pub note: &'static str,
    pub octave: i32,
    /// Deviation from the nearest note, in [-50, 50].
    pub cents: i32,
    /// Nearest MIDI note number.
    pub midi: i32,
}

/// Finds the nearest chromatic note to a frequency.
///
/// # Arguments
/// * `freq` - Measured frequency
///
/// # Returns
/// * `NoteReading` - Nearest note name, its octave, and the rounded cents
///   deviation from it (positive = sharp)
pub fn from_frequency(freq: Frequency) -> NoteReading {
    let midi = 12.0 * (freq.hz() / REFERENCE_A4).log2() + REFERENCE_MIDI as f32;
    let rounded = midi.round();
    let cents = ((midi - rounded) * 100.0).round() as i32;
    let midi = rounded as i32;

    NoteReading {
        note: NOTE_NAMES[midi.rem_euclid(12) as usize],
        octave: midi.div_euclid(12) - 1,
        cents,
        midi,
    }
}

/// Calculates the deviation from a target frequency in cents.
///
/// Cents are a logarithmic unit of pitch measurement where:
/// - 100 cents = 1 semitone
/// - 1200 cents = 1 octave
/// - Positive values indicate sharpness, negative values indicate flatness
pub fn calculate_cents_deviation(freq: Frequency, target: Frequency) -> f32 {
    1200.0 * (freq.hz() / target.hz()).log2()
}

/// Rounded cents deviation against a fixed target, as used in locked mode.
///
/// The value is not clamped; a string tuned a whole tone flat reports -200.
pub fn from_target(freq: Frequency, target: Frequency) -> i32 {
    calculate_cents_deviation(freq, target).round() as i32
}

pub fn is_in_tune(cents: i32, tolerance: i32) -> bool {
    cents.abs() <= tolerance
}

/// The guitar string nearest to a frequency.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StringMatch {
    pub index: usize,
    /// Signed deviation from the string, in cents.
    pub cents: f32,
}

/// Finds the string being tuned, if any.
///
/// Only strings within one semitone count, so an unrelated note does not light
/// up a string indicator.
///
/// # Returns
/// * `Some(match)` - Nearest string and the deviation from it
/// * `None` - Every string is a semitone or more away
pub fn closest_string(freq: Frequency) -> Option<StringMatch> {
    GUITAR_STRINGS
        .iter()
        .enumerate()
        .map(|(index, string)| StringMatch {
            index,
            cents: calculate_cents_deviation(freq, string.frequency),
        })
        .min_by(|a, b| a.cents.abs().total_cmp(&b.cents.abs()))
        .filter(|m| m.cents.abs() < STRING_CAPTURE_CENTS)
}

/// Maps a cents value onto one of `segments` meter cells.
///
/// Cents are clamped to [-50, 50]; -50 lands on the first segment, 0 on the
/// middle one and +50 on the last.
pub fn meter_segment(cents: i32, segments: usize) -> usize {
    if segments < 2 {
        return 0;
    }
    let clamped = cents.clamp(-50, 50) as f32;
    let step = 100.0 / (segments - 1) as f32;
    (((clamped + 50.0) / step).round() as usize).min(segments - 1)
}
