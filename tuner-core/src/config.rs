//! # Tuner Configuration
//!
//! Calibrated constants for the detection pipeline. The defaults cover the open
//! strings of a guitar with some headroom; a configuration file may override any
//! subset of them.

use anyhow::{Result, ensure};
use serde::{Deserialize, Serialize};

use crate::tuning::IN_TUNE_CENTS;

/// Number of samples analysed per tick.
pub const WINDOW_SIZE: usize = 4096;

/// Sample rate assumed until the capture device reports its own.
pub const DEFAULT_SAMPLE_RATE: u32 = 44100;

/// How the autocorrelation curve is computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrelationMethod {
    /// Lag-by-lag dot products.
    Direct,
    /// FFT autocorrelation with prefix-summed energies.
    #[default]
    Spectral,
}

/// Settings for a tuner session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TunerConfig {
    pub window_size: usize,
    pub sample_rate: u32,
    /// Lowest detectable fundamental in Hz. Sets the longest lag scanned.
    pub min_frequency: f32,
    /// Highest detectable fundamental in Hz. Sets the shortest lag scanned.
    pub max_frequency: f32,
    /// Normalized correlation a lag must exceed to count as a pitch.
    pub correlation_threshold: f32,
    /// RMS level below which a window is treated as silence.
    pub min_volume_rms: f32,
    /// Weight of the newest estimate in the exponential moving average.
    pub smoothing_alpha: f32,
    pub in_tune_cents: i32,
    pub correlation_method: CorrelationMethod,
    /// Apply the octave guard and sub-sample interpolation to the winning lag.
    pub refine_lag: bool,
    /// Fraction of the best correlation a shorter lag needs to be preferred.
    pub octave_tolerance: f32,
}

impl Default for TunerConfig {
    fn default() -> Self {
        Self {
            window_size: WINDOW_SIZE,
            sample_rate: DEFAULT_SAMPLE_RATE,
            min_frequency: 80.0,
            max_frequency: 400.0,
            correlation_threshold: 0.2,
            min_volume_rms: 0.01,
            smoothing_alpha: 0.2,
            in_tune_cents: IN_TUNE_CENTS,
            correlation_method: CorrelationMethod::default(),
            refine_lag: true,
            octave_tolerance: 0.9,
        }
    }
}

impl TunerConfig {
    /// Same configuration at a different sample rate.
    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    /// Checks that the settings describe a usable pipeline.
    ///
    /// # Returns
    /// * `Ok(())` - All values are in range
    /// * `Err(e)` - The first offending setting, with an explanation
    pub fn validate(&self) -> Result<()> {
        ensure!(self.window_size >= 2, "window_size must be at least 2, got {}", self.window_size);
        ensure!(self.sample_rate > 0, "sample_rate must be positive");
        ensure!(
            self.min_frequency > 0.0 && self.min_frequency.is_finite(),
            "min_frequency must be positive, got {}",
            self.min_frequency
        );
        ensure!(
            self.max_frequency > self.min_frequency && self.max_frequency.is_finite(),
            "max_frequency ({}) must be above min_frequency ({})",
            self.max_frequency,
            self.min_frequency
        );
        ensure!(
            self.max_frequency < self.sample_rate as f32 / 2.0,
            "max_frequency ({}) must be below the Nyquist frequency",
            self.max_frequency
        );
        ensure!(
            (0.0..1.0).contains(&self.correlation_threshold),
            "correlation_threshold must be in [0, 1), got {}",
            self.correlation_threshold
        );
        ensure!(self.min_volume_rms >= 0.0, "min_volume_rms must not be negative");
        ensure!(
            self.smoothing_alpha > 0.0 && self.smoothing_alpha <= 1.0,
            "smoothing_alpha must be in (0, 1], got {}",
            self.smoothing_alpha
        );
        ensure!(self.in_tune_cents >= 0, "in_tune_cents must not be negative");
        ensure!(
            (0.0..=1.0).contains(&self.octave_tolerance),
            "octave_tolerance must be in [0, 1], got {}",
            self.octave_tolerance
        );

        let longest = self.max_period();
        if longest >= self.window_size / 2 {
            log::warn!(
                "window of {} samples cannot reach {} Hz (needs a lag of {} samples)",
                self.window_size,
                self.min_frequency,
                longest
            );
        }
        Ok(())
    }

    /// Shortest lag scanned, in samples.
    pub fn min_period(&self) -> usize {
        (self.sample_rate as f32 / self.max_frequency).floor() as usize
    }

    /// Longest lag scanned, in samples (exclusive bound).
    pub fn max_period(&self) -> usize {
        (self.sample_rate as f32 / self.min_frequency).floor() as usize
    }
}
