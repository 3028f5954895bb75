//! # Tuner Session
//!
//! Owns everything that survives from one tick to the next (smoothing state and
//! the string lock) and runs the per-tick pipeline:
//! level gate, pitch estimation, smoothing, then note mapping.

use anyhow::{Result, ensure};

use crate::config::TunerConfig;
use crate::pitch::PitchEstimator;
use crate::smoothing::Smoother;
use crate::tuning::{self, Frequency, GUITAR_STRINGS};
use crate::window::SampleWindow;
use crate::{TickOutcome, TuningResult};

/// Whether capture is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Listening,
}

pub struct TunerSession {
    config: TunerConfig,
    estimator: PitchEstimator,
    smoother: Smoother,
    state: SessionState,
    lock: Option<usize>,
    ticks: u64,
}

impl TunerSession {
    /// Creates an idle session after validating the configuration.
    pub fn new(config: TunerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            estimator: PitchEstimator::new(&config),
            smoother: Smoother::new(config.smoothing_alpha),
            config,
            state: SessionState::Idle,
            lock: None,
            ticks: 0,
        })
    }

    pub fn start(&mut self) {
        if self.state == SessionState::Listening {
            return;
        }
        log::debug!("session listening (lock: {:?})", self.lock);
        self.smoother.reset();
        self.state = SessionState::Listening;
    }

    /// Stops processing. Display state is dropped; the string lock is kept.
    pub fn stop(&mut self) {
        if self.state == SessionState::Idle {
            return;
        }
        log::debug!("session idle after {} ticks", self.ticks);
        self.smoother.reset();
        self.state = SessionState::Idle;
    }

    /// Locks onto a string, or unlocks if that string is already locked.
    ///
    /// # Arguments
    /// * `index` - Guitar string index, 0 (low E) to 5 (high E)
    ///
    /// # Returns
    /// * `Ok(lock)` - The lock after toggling
    /// * `Err(e)` - The index does not name a string
    pub fn toggle_lock(&mut self, index: usize) -> Result<Option<usize>> {
        ensure!(
            index < GUITAR_STRINGS.len(),
            "string index {index} out of range (0-{})",
            GUITAR_STRINGS.len() - 1
        );
        self.lock = if self.lock == Some(index) { None } else { Some(index) };
        log::debug!("string lock now {:?}", self.lock);
        Ok(self.lock)
    }

    /// Runs the pipeline on one window.
    ///
    /// # Returns
    /// * `None` - The session is idle; nothing is emitted
    /// * `Some(TickOutcome::NoSignal)` - Too quiet, or no clear pitch
    /// * `Some(TickOutcome::Tuning(result))` - A pitch was found
    pub fn tick(&mut self, window: &SampleWindow<'_>) -> Option<TickOutcome> {
        if self.state != SessionState::Listening {
            return None;
        }
        self.ticks += 1;

        let level = window.rms();
        if level < self.config.min_volume_rms {
            log::trace!("tick {}: level {level:.4} below gate", self.ticks);
            self.smoother.reset();
            return Some(TickOutcome::NoSignal);
        }

        // An unclear pitch at adequate volume is handled exactly like silence.
        let Some(pitch) = self.estimator.estimate(window) else {
            log::trace!("tick {}: no pitch at level {level:.4}", self.ticks);
            self.smoother.reset();
            return Some(TickOutcome::NoSignal);
        };

        let smoothed = self.smoother.update(Some(pitch.frequency))?;
        Some(TickOutcome::Tuning(self.describe(smoothed, pitch.frequency)))
    }

    fn describe(&self, frequency: Frequency, raw: Frequency) -> TuningResult {
        let tolerance = self.config.in_tune_cents;

        if let Some(string) = self.lock.and_then(tuning::guitar_string) {
            let cents = tuning::from_target(frequency, string.frequency);
            return TuningResult {
                frequency,
                raw_frequency: raw,
                note: string.note,
                octave: string.octave,
                cents,
                in_tune: tuning::is_in_tune(cents, tolerance),
                string: self.lock,
                locked: true,
            };
        }

        let reading = tuning::from_frequency(frequency);
        TuningResult {
            frequency,
            raw_frequency: raw,
            note: reading.note,
            octave: reading.octave,
            cents: reading.cents,
            in_tune: tuning::is_in_tune(reading.cents, tolerance),
            string: tuning::closest_string(frequency).map(|m| m.index),
            locked: false,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_listening(&self) -> bool {
        self.state == SessionState::Listening
    }

    pub fn lock(&self) -> Option<usize> {
        self.lock
    }

    pub fn config(&self) -> &TunerConfig {
        &self.config
    }

    /// Ticks processed while listening, over the session's lifetime.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }
}
