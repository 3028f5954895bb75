//! # Pitch Detection Module
//!
//! This module estimates the fundamental frequency of a monophonic signal with a
//! normalized autocorrelation scan, tuned for the low, harmonically rich notes of
//! a guitar.
//!
//! ## Features
//! - Lag scan restricted to the periods of the configured frequency range
//! - Direct or FFT-backed correlation curve
//! - Correlation floor to reject noise and silence
//! - Octave error prevention and parabolic interpolation of the winning lag

use rustfft::{FftPlanner, num_complex::Complex};

use crate::config::{CorrelationMethod, TunerConfig};
use crate::tuning::Frequency;
use crate::window::SampleWindow;

/// Energy products below this fraction of the squared total energy are treated
/// as zero. FFT round-off leaves a residue of that order on silent stretches.
const ENERGY_FLOOR: f64 = 1e-12;

/// A detected pitch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pitch {
    pub frequency: Frequency,
    /// Normalized correlation at the reported period, in [-1, 1].
    pub correlation: f32,
    /// Period in samples. Fractional when the lag was interpolated.
    pub period: f32,
}

/// Autocorrelation pitch estimator.
///
/// Holds the FFT planner and scratch buffers between calls so a tuner running
/// at display rate does not reallocate every tick.
pub struct PitchEstimator {
    min_frequency: f32,
    max_frequency: f32,
    threshold: f64,
    method: CorrelationMethod,
    refine: bool,
    octave_tolerance: f64,
    planner: FftPlanner<f64>,
    spectrum: Vec<Complex<f64>>,
    energy: Vec<f64>,
    /// Correlation per scanned lag; `NEG_INFINITY` marks a skipped lag.
    curve: Vec<f64>,
}

impl PitchEstimator {
    pub fn new(config: &TunerConfig) -> Self {
        Self {
            min_frequency: config.min_frequency,
            max_frequency: config.max_frequency,
            threshold: config.correlation_threshold as f64,
            method: config.correlation_method,
            refine: config.refine_lag,
            octave_tolerance: config.octave_tolerance as f64,
            planner: FftPlanner::new(),
            spectrum: Vec::new(),
            energy: Vec::new(),
            curve: Vec::new(),
        }
    }

    /// Estimates the fundamental frequency of a window.
    ///
    /// Only the first half of the window takes part in the correlation, so that
    /// every lag is compared over the same stretch of signal minus the lag.
    ///
    /// # Arguments
    /// * `window` - Samples of the current tick and their sample rate
    ///
    /// # Returns
    /// * `Some(pitch)` - The best lag correlated above the threshold
    /// * `None` - Empty, silent or aperiodic input; never an error
    pub fn estimate(&mut self, window: &SampleWindow<'_>) -> Option<Pitch> {
        let rate = window.sample_rate();
        let half = window.len() / 2;
        if half == 0 || rate == 0 {
            return None;
        }

        let min_period = (rate as f32 / self.max_frequency).floor() as usize;
        let max_period = (rate as f32 / self.min_frequency).floor() as usize;
        let end = half.min(max_period);
        if min_period >= end {
            return None;
        }

        // One lag below the scan is correlated too. It is never a candidate; it
        // only gives the shortest scanned lag a left neighbour to interpolate with.
        let guard = usize::from(min_period >= 2);
        let first_lag = min_period - guard;

        let segment = &window.samples()[..half];
        match self.method {
            CorrelationMethod::Direct => direct_curve(segment, first_lag, end, &mut self.curve),
            CorrelationMethod::Spectral => self.spectral_curve(segment, first_lag, end),
        }

        let (best_lag, best) = strongest_lag(&self.curve[guard..], min_period)?;
        if best <= self.threshold || best_lag == 0 {
            return None;
        }

        let (period, correlation) = if self.refine {
            let floor = best * self.octave_tolerance;
            refine_period(&self.curve, first_lag, guard, best_lag, floor)
        } else {
            (best_lag as f64, best)
        };

        let frequency = Frequency::new((rate as f64 / period) as f32)?;
        Some(Pitch {
            frequency,
            correlation: correlation as f32,
            period: period as f32,
        })
    }

    /// Fills the curve from one FFT autocorrelation of the segment.
    ///
    /// The segment is zero padded to at least twice its length, which makes the
    /// circular correlation equal to the linear one for every lag we read.
    fn spectral_curve(&mut self, segment: &[f32], min_period: usize, end: usize) {
        let half = segment.len();
        let fft_len = (2 * half).next_power_of_two();
        let forward = self.planner.plan_fft_forward(fft_len);
        let inverse = self.planner.plan_fft_inverse(fft_len);

        self.spectrum.clear();
        self.spectrum.extend(segment.iter().map(|&s| Complex::new(s as f64, 0.0)));
        self.spectrum.resize(fft_len, Complex::new(0.0, 0.0));

        forward.process(&mut self.spectrum);
        for bin in self.spectrum.iter_mut() {
            *bin = Complex::new(bin.norm_sqr(), 0.0);
        }
        inverse.process(&mut self.spectrum);

        // energy[j] = sum of squares of the first j samples
        self.energy.clear();
        self.energy.push(0.0);
        let mut running = 0.0;
        for &s in segment {
            running += s as f64 * s as f64;
            self.energy.push(running);
        }
        let total = running;
        let floor = total * total * ENERGY_FLOOR;
        let scale = fft_len as f64;

        self.curve.clear();
        self.curve.extend((min_period..end).map(|offset| {
            let dot = self.spectrum[offset].re / scale;
            let head = self.energy[half - offset];
            let tail = total - self.energy[offset];
            let denominator = head * tail;
            if denominator <= floor {
                f64::NEG_INFINITY
            } else {
                dot / denominator.sqrt()
            }
        }));
    }
}

/// Lag-by-lag normalized correlation over `[min_period, end)`.
fn direct_curve(segment: &[f32], min_period: usize, end: usize, curve: &mut Vec<f64>) {
    let half = segment.len();
    curve.clear();
    curve.extend((min_period..end).map(|offset| {
        let head = &segment[..half - offset];
        let tail = &segment[offset..];

        let (mut dot, mut e1, mut e2) = (0.0_f64, 0.0_f64, 0.0_f64);
        for (&a, &b) in head.iter().zip(tail) {
            let (a, b) = (a as f64, b as f64);
            dot += a * b;
            e1 += a * a;
            e2 += b * b;
        }

        let denominator = e1 * e2;
        if denominator == 0.0 {
            f64::NEG_INFINITY
        } else {
            dot / denominator.sqrt()
        }
    }));
}

/// First lag holding the maximum correlation; later equal values do not win.
fn strongest_lag(curve: &[f64], first_lag: usize) -> Option<(usize, f64)> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &value) in curve.iter().enumerate() {
        if !value.is_finite() {
            continue;
        }
        if best.is_none_or(|(_, b)| value > b) {
            best = Some((first_lag + i, value));
        }
    }
    best
}

/// Picks the shortest lag that is a peak of the curve and reaches `floor`, then
/// interpolates it to sub-sample precision.
///
/// A pure tone correlates almost perfectly at every multiple of its period, so
/// the global maximum can sit on a multiple; the first strong peak is the
/// fundamental. Falls back to the best lag when no earlier peak qualifies.
///
/// # Arguments
/// * `curve` - Correlation per lag, starting at `first_lag`
/// * `guard` - Leading entries that only serve as interpolation neighbours
/// * `best_lag` - Lag of the strongest correlation
/// * `floor` - Correlation an earlier peak needs to be preferred
///
/// # Returns
/// * `(period, correlation)` - Refined period in samples and the correlation at
///   the chosen lag
fn refine_period(
    curve: &[f64],
    first_lag: usize,
    guard: usize,
    best_lag: usize,
    floor: f64,
) -> (f64, f64) {
    let best_index = best_lag - first_lag;
    let chosen = (guard..=best_index)
        .find(|&i| curve[i] >= floor && is_peak(curve, i))
        .unwrap_or(best_index);

    let period = (first_lag + chosen) as f64 + vertex_offset(curve, chosen);
    (period, curve[chosen])
}

/// A lag whose correlation rises into it and does not rise after it. The first
/// lag of the scan only needs the second condition.
fn is_peak(curve: &[f64], i: usize) -> bool {
    let Some(&next) = curve.get(i + 1) else {
        return false;
    };
    let here = curve[i];
    let rising = i == 0 || curve[i - 1] < here;
    rising && here >= next
}

/// Offset of the vertex of the parabola through `i - 1`, `i` and `i + 1`,
/// clamped to half a sample. Zero at the edges or on a non-concave fit.
fn vertex_offset(curve: &[f64], i: usize) -> f64 {
    if i == 0 || i + 1 >= curve.len() {
        return 0.0;
    }
    let (y1, y2, y3) = (curve[i - 1], curve[i], curve[i + 1]);
    if !(y1.is_finite() && y3.is_finite()) {
        return 0.0;
    }

    let curvature = y1 - 2.0 * y2 + y3;
    if curvature >= 0.0 {
        return 0.0;
    }
    ((y1 - y3) / (2.0 * curvature)).clamp(-0.5, 0.5)
}

#[cfg(test)]
mod tests {
    use super::*;

    const RATE: u32 = 44100;

    fn sine(freq: f32, len: usize, rate: u32) -> Vec<f32> {
        (0..len)
            .map(|i| 0.5 * (2.0 * std::f32::consts::PI * freq * i as f32 / rate as f32).sin())
            .collect()
    }

    fn literal() -> TunerConfig {
        TunerConfig {
            refine_lag: false,
            correlation_method: CorrelationMethod::Direct,
            ..TunerConfig::default()
        }
    }

    #[test]
    fn empty_window_is_not_found() {
        let mut estimator = PitchEstimator::new(&TunerConfig::default());
        assert!(estimator.estimate(&SampleWindow::new(&[], RATE)).is_none());
    }

    #[test]
    fn silent_window_is_not_found() {
        let silence = vec![0.0; 4096];
        for method in [CorrelationMethod::Direct, CorrelationMethod::Spectral] {
            let config = TunerConfig {
                correlation_method: method,
                ..TunerConfig::default()
            };
            let mut estimator = PitchEstimator::new(&config);
            assert!(estimator.estimate(&SampleWindow::new(&silence, RATE)).is_none(), "{method:?}");
        }
    }

    #[test]
    fn window_too_short_for_the_scan_is_not_found() {
        // Half of 200 samples is below the 110 sample minimum period.
        let samples = sine(200.0, 200, RATE);
        let mut estimator = PitchEstimator::new(&TunerConfig::default());
        assert!(estimator.estimate(&SampleWindow::new(&samples, RATE)).is_none());
    }

    #[test]
    fn literal_scan_returns_rate_over_best_lag() {
        let samples = sine(110.0, 4096, RATE);
        let mut estimator = PitchEstimator::new(&literal());
        let pitch = estimator.estimate(&SampleWindow::new(&samples, RATE)).unwrap();

        assert_eq!(pitch.period, 401.0);
        assert_eq!(pitch.frequency.hz(), (RATE as f64 / 401.0) as f32);
        assert!(pitch.correlation > 0.99);
    }

    #[test]
    fn noise_stays_below_the_correlation_floor() {
        // Deterministic LCG noise.
        let mut state: u32 = 0x1234_5678;
        let noise: Vec<f32> = (0..4096)
            .map(|_| {
                state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
                (state >> 8) as f32 / (1u32 << 24) as f32 * 2.0 - 1.0
            })
            .collect();

        let mut estimator = PitchEstimator::new(&TunerConfig::default());
        assert!(estimator.estimate(&SampleWindow::new(&noise, RATE)).is_none());
    }

    #[test]
    fn backends_produce_the_same_curve() {
        let samples = sine(146.83, 4096, RATE);
        let half = &samples[..2048];

        let mut direct = Vec::new();
        direct_curve(half, 110, 551, &mut direct);

        let mut estimator = PitchEstimator::new(&TunerConfig::default());
        estimator.spectral_curve(half, 110, 551);

        assert_eq!(direct.len(), estimator.curve.len());
        for (a, b) in direct.iter().zip(&estimator.curve) {
            assert!((a - b).abs() < 1e-9, "{a} vs {b}");
        }
    }

    #[test]
    fn strongest_lag_prefers_the_first_maximum() {
        let curve = [0.1, 0.8, f64::NEG_INFINITY, 0.8, 0.3];
        assert_eq!(strongest_lag(&curve, 10), Some((11, 0.8)));
        assert_eq!(strongest_lag(&[f64::NEG_INFINITY; 3], 10), None);
    }

    #[test]
    fn octave_guard_prefers_the_first_strong_peak() {
        // Peaks at index 2 (0.95) and index 6 (0.99).
        let curve = [0.2, 0.7, 0.95, 0.6, 0.3, 0.8, 0.99, 0.7];
        let (period, correlation) = refine_period(&curve, 100, 0, 106, 0.99 * 0.9);
        assert!((period - 102.0).abs() <= 0.5);
        assert_eq!(correlation, 0.95);

        // A weaker early peak is ignored.
        let (period, _) = refine_period(&curve, 100, 0, 106, 0.99 * 0.97);
        assert!((period - 106.0).abs() <= 0.5);
    }

    #[test]
    fn guard_lag_is_a_neighbour_not_a_candidate() {
        // Lag 99 is the guard. It outscores lag 100 but can never be chosen,
        // and it pulls the vertex of the lag 100 peak below 100.
        let curve = [0.97, 0.96, 0.5, 0.2];
        let (period, correlation) = refine_period(&curve, 99, 1, 100, 0.96 * 0.9);
        assert_eq!(correlation, 0.96);
        assert!(period < 100.0 && period >= 99.5, "{period}");

        // With the guard below the peak, the vertex moves up from the first lag.
        let curve = [0.90, 0.99, 0.95, 0.6];
        let (period, _) = refine_period(&curve, 109, 1, 110, 0.99 * 0.9);
        assert!(period > 110.0 && period < 110.5, "{period}");
    }

    #[test]
    fn first_scanned_lag_is_interpolated() {
        // 399.5 Hz has a period of 110.39 samples, just above the 110 sample
        // minimum at 44.1 kHz.
        let samples = sine(399.5, 4096, RATE);
        for method in [CorrelationMethod::Direct, CorrelationMethod::Spectral] {
            let config = TunerConfig {
                correlation_method: method,
                ..TunerConfig::default()
            };
            let mut estimator = PitchEstimator::new(&config);
            let pitch = estimator.estimate(&SampleWindow::new(&samples, RATE)).unwrap();
            assert!(pitch.period > 110.0, "{method:?}: {}", pitch.period);
            assert!((pitch.frequency.hz() - 399.5).abs() <= 1.0, "{method:?}: {}", pitch.frequency);
        }
    }

    #[test]
    fn vertex_offset_finds_the_true_peak() {
        // Samples of -(x - 0.25)^2 at x = -1, 0, 1.
        let curve = [-(1.25_f64 * 1.25), -(0.25_f64 * 0.25), -(0.75_f64 * 0.75)];
        assert!((vertex_offset(&curve, 1) - 0.25).abs() < 1e-12);
        assert_eq!(vertex_offset(&curve, 0), 0.0);
        assert_eq!(vertex_offset(&[0.0, 1.0, 2.0], 1), 0.0);
    }
}
