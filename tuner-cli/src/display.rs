//! # Text Meter
//!
//! Renders tick outcomes as one line of text: note, frequency, cents, and a
//! segment meter centred on zero deviation.

use tuner_core::tuning::guitar_string;
use tuner_core::{TickOutcome, TuningResult};

/// Narrowest meter that still has a centre and two sides.
const MIN_SEGMENTS: usize = 3;

pub struct Meter {
    segments: usize,
}

impl Meter {
    pub fn new(segments: usize) -> Self {
        Self {
            segments: segments.max(MIN_SEGMENTS),
        }
    }

    pub fn render(&self, outcome: &TickOutcome) -> String {
        match outcome {
            TickOutcome::NoSignal => "--".to_string(),
            TickOutcome::Tuning(result) => self.render_result(result),
        }
    }

    fn render_result(&self, result: &TuningResult) -> String {
        let note = format!("{}{}", result.note, result.octave);
        let string = match result.string.and_then(guitar_string) {
            Some(string) if result.locked => format!("[lock {}]", string.label),
            Some(string) => format!("({})", string.label),
            None => String::new(),
        };
        let status = if result.in_tune { "in tune" } else { "" };

        format!(
            "{:<4} {:>8.2} Hz {:>+5}c {} {:<9} {}",
            note,
            result.frequency.hz(),
            result.cents,
            self.bar(result),
            string,
            status
        )
        .trim_end()
        .to_string()
    }

    fn bar(&self, result: &TuningResult) -> String {
        let lit = result.meter_segment(self.segments);
        let centre = (self.segments - 1) / 2;
        let cells: String = (0..self.segments)
            .map(|i| match i {
                _ if i == lit && result.in_tune => 'O',
                _ if i == lit => '#',
                _ if i == centre => '|',
                _ => '-',
            })
            .collect();
        format!("[{cells}]")
    }
}
