use tuner_core::pitch::PitchEstimator;
use tuner_core::{CorrelationMethod, SampleWindow, TunerConfig};

const SAMPLE_RATE: u32 = 44100;
const WINDOW: usize = 4096;

/// A sum of harmonics of `freq`, with the given relative amplitudes.
fn signal_factory(freq: f32, harmonics: &[f32], len: usize, sample_rate: u32) -> Vec<f32> {
    let dt = 1.0 / sample_rate as f64;
    let norm: f32 = harmonics.iter().sum();
    (0..len)
        .map(|i| {
            let t = i as f64 * dt;
            let value: f64 = harmonics
                .iter()
                .enumerate()
                .map(|(n, &a)| {
                    let w = 2.0 * std::f64::consts::PI * freq as f64 * (n + 1) as f64;
                    a as f64 * (w * t).sin()
                })
                .sum();
            0.6 * value as f32 / norm
        })
        .collect()
}

fn sine(freq: f32) -> Vec<f32> {
    signal_factory(freq, &[1.0], WINDOW, SAMPLE_RATE)
}

fn estimate(config: &TunerConfig, samples: &[f32], sample_rate: u32) -> Option<f32> {
    let mut estimator = PitchEstimator::new(config);
    estimator
        .estimate(&SampleWindow::new(samples, sample_rate))
        .map(|pitch| pitch.frequency.hz())
}

#[test]
fn sine_sweep_within_one_hertz() {
    let config = TunerConfig::default();
    let mut freq = 80.0_f32;
    while freq <= 400.0 {
        let found = estimate(&config, &sine(freq), SAMPLE_RATE)
            .unwrap_or_else(|| panic!("no pitch for {freq} Hz"));
        assert!((found - freq).abs() <= 1.0, "{freq} Hz estimated as {found} Hz");
        freq += 7.3;
    }
}

#[test]
fn top_of_range_within_one_hertz() {
    // Periods here sit within a sample of the shortest scanned lag.
    for sample_rate in [44100, 48000] {
        for method in [CorrelationMethod::Direct, CorrelationMethod::Spectral] {
            let config = TunerConfig {
                correlation_method: method,
                ..TunerConfig::default().with_sample_rate(sample_rate)
            };
            for step in 0..=50 {
                let freq = 395.0 + step as f32 * 0.1;
                let signal = signal_factory(freq, &[1.0], WINDOW, sample_rate);
                let found = estimate(&config, &signal, sample_rate).unwrap_or_else(|| {
                    panic!("{method:?} @ {sample_rate}: no pitch for {freq} Hz")
                });
                assert!(
                    (found - freq).abs() <= 1.0,
                    "{method:?} @ {sample_rate}: {freq} Hz estimated as {found} Hz"
                );
            }
        }
    }
}

#[test]
fn open_strings_within_one_hertz() {
    for freq in [82.41, 110.0, 146.83, 196.0, 246.94, 329.63] {
        for method in [CorrelationMethod::Direct, CorrelationMethod::Spectral] {
            let config = TunerConfig {
                correlation_method: method,
                ..TunerConfig::default()
            };
            let found = estimate(&config, &sine(freq), SAMPLE_RATE).unwrap();
            assert!((found - freq).abs() <= 1.0, "{method:?}: {freq} Hz estimated as {found} Hz");
        }
    }
}

#[test]
fn backends_agree() {
    let direct = TunerConfig {
        correlation_method: CorrelationMethod::Direct,
        ..TunerConfig::default()
    };
    let spectral = TunerConfig {
        correlation_method: CorrelationMethod::Spectral,
        ..TunerConfig::default()
    };

    for freq in [90.0, 123.0, 250.0, 333.0] {
        let signal = signal_factory(freq, &[1.0, 0.5, 0.25], WINDOW, SAMPLE_RATE);
        let a = estimate(&direct, &signal, SAMPLE_RATE).unwrap();
        let b = estimate(&spectral, &signal, SAMPLE_RATE).unwrap();
        assert!((a - b).abs() < 0.01, "{freq} Hz: direct {a}, spectral {b}");
    }
}

#[test]
fn harmonically_rich_tone_reports_the_fundamental() {
    // Low E with strong upper partials, as a plucked string produces.
    let signal = signal_factory(82.41, &[1.0, 0.8, 0.6, 0.4, 0.3], WINDOW, SAMPLE_RATE);
    let found = estimate(&TunerConfig::default(), &signal, SAMPLE_RATE).unwrap();
    assert!((found - 82.41).abs() <= 1.0, "{found}");

    let signal = signal_factory(196.0, &[1.0, 0.7, 0.5], WINDOW, SAMPLE_RATE);
    let found = estimate(&TunerConfig::default(), &signal, SAMPLE_RATE).unwrap();
    assert!((found - 196.0).abs() <= 1.0, "{found}");
}

#[test]
fn other_sample_rates() {
    let config = TunerConfig::default().with_sample_rate(48000);
    let signal = signal_factory(146.83, &[1.0], WINDOW, 48000);
    let found = estimate(&config, &signal, 48000).unwrap();
    assert!((found - 146.83).abs() <= 1.0, "{found}");
}

#[test]
fn estimate_stays_inside_the_scanned_range() {
    // A 60 Hz hum has no period inside the 80-400 Hz scan; whatever is found
    // must still respect the lag bounds.
    let config = TunerConfig::default();
    let signal = signal_factory(60.0, &[1.0], WINDOW, SAMPLE_RATE);
    if let Some(found) = estimate(&config, &signal, SAMPLE_RATE) {
        let min = SAMPLE_RATE as f32 / (config.max_period() as f32 + 0.5);
        let max = SAMPLE_RATE as f32 / (config.min_period() as f32 - 0.5);
        assert!(found >= min && found <= max, "{found}");
    }
}

#[test]
fn degenerate_windows_are_not_found() {
    let config = TunerConfig::default();
    assert_eq!(estimate(&config, &[], SAMPLE_RATE), None);
    assert_eq!(estimate(&config, &vec![0.0; WINDOW], SAMPLE_RATE), None);
}
