// tuner-core/src/lib.rs

//! The core logic for the guitar tuner.
//! This crate is responsible for pitch detection, smoothing and mapping
//! frequencies onto notes and guitar strings. It is completely headless
//! and contains no presentation code.

#[cfg(feature = "capture")]
pub mod audio;
pub mod config;
pub mod driver;
pub mod pitch;
pub mod session;
pub mod smoothing;
pub mod tuning;
pub mod window;

pub use config::{CorrelationMethod, TunerConfig};
pub use session::{SessionState, TunerSession};
pub use tuning::Frequency;
pub use window::{CaptureBuffer, SampleWindow};

/// Largest deviation, in cents, a meter can show.
pub const DISPLAY_CENTS: i32 = 50;

/// The reading produced by one tick with a clear pitch.
#[derive(Debug, Clone, PartialEq)]
pub struct TuningResult {
    /// Smoothed fundamental frequency.
    pub frequency: Frequency,
    /// This tick's estimate before smoothing.
    pub raw_frequency: Frequency,
    /// Nearest note name, or the locked string's note.
    pub note: &'static str,
    pub octave: i32,
    /// Signed deviation in cents. Within [-50, 50] in free mode; unclamped
    /// against a locked string.
    pub cents: i32,
    pub in_tune: bool,
    /// The locked string, or in free mode the string within a semitone.
    pub string: Option<usize>,
    /// Whether the reading is against a locked string.
    pub locked: bool,
}

impl TuningResult {
    /// Cents clamped to the range a meter can show.
    pub fn display_cents(&self) -> i32 {
        self.cents.clamp(-DISPLAY_CENTS, DISPLAY_CENTS)
    }

    /// Index of the lit segment on a meter with `segments` cells.
    pub fn meter_segment(&self, segments: usize) -> usize {
        tuning::meter_segment(self.cents, segments)
    }
}

/// What a tick hands to the presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Too quiet, or no clear pitch. Indicators should be cleared.
    NoSignal,
    Tuning(TuningResult),
}
