//! # Sample Sources
//!
//! Offline stand-ins for the microphone: a decoded WAV file and a synthesized
//! sine, both delivered to the tuner in display-rate hops.

use std::f64::consts::TAU;
use std::path::Path;

use anyhow::{Context, Result, ensure};
use tuner_core::driver::SampleSource;
use tuner_core::{CaptureBuffer, SampleWindow};

/// Decodes a WAV file to mono f32 samples in [-1, 1].
///
/// # Returns
/// * `Ok((samples, sample_rate))` - Downmixed samples and the file's rate
/// * `Err(e)` - The file could not be opened or decoded
pub fn read_wav(path: &Path) -> Result<(Vec<f32>, u32)> {
    let mut reader =
        hound::WavReader::open(path).with_context(|| format!("opening {}", path.display()))?;
    let spec = reader.spec();
    ensure!(spec.channels > 0, "{} has no channels", path.display());

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<_, _>>()
            .with_context(|| format!("decoding {}", path.display()))?,
        hound::SampleFormat::Int => {
            let scale = (1_i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()
                .with_context(|| format!("decoding {}", path.display()))?
        }
    };

    let channels = spec.channels as usize;
    let mono = interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect();

    log::debug!(
        "read {} ({} Hz, {} channel(s), {}-bit {:?})",
        path.display(),
        spec.sample_rate,
        spec.channels,
        spec.bits_per_sample,
        spec.sample_format
    );
    Ok((mono, spec.sample_rate))
}

/// Number of samples that arrive between two ticks.
pub fn hop_size(sample_rate: u32, ticks_per_second: u32) -> usize {
    (sample_rate / ticks_per_second.max(1)).max(1) as usize
}

/// Plays pre-recorded samples into the capture buffer, one hop per tick.
pub struct FileSource {
    samples: Vec<f32>,
    position: usize,
    hop: usize,
    buffer: CaptureBuffer,
}

impl FileSource {
    pub fn new(samples: Vec<f32>, sample_rate: u32, window_size: usize, hop: usize) -> Self {
        Self {
            samples,
            position: 0,
            hop: hop.max(1),
            buffer: CaptureBuffer::new(window_size, sample_rate),
        }
    }

    /// Seconds of audio consumed so far.
    pub fn elapsed(&self) -> f32 {
        self.position as f32 / self.buffer.window().sample_rate() as f32
    }
}

impl SampleSource for FileSource {
    fn refill(&mut self) -> Result<bool> {
        if self.position >= self.samples.len() {
            return Ok(false);
        }
        let end = (self.position + self.hop).min(self.samples.len());
        self.buffer.push(&self.samples[self.position..end]);
        self.position = end;
        Ok(true)
    }

    fn window(&self) -> SampleWindow<'_> {
        self.buffer.window()
    }
}

/// Generates a steady sine for a fixed number of samples.
pub struct ToneSource {
    step: f64,
    phase: f64,
    amplitude: f32,
    remaining: usize,
    hop: usize,
    chunk: Vec<f32>,
    buffer: CaptureBuffer,
}

impl ToneSource {
    pub fn new(
        frequency: f32,
        sample_rate: u32,
        seconds: f32,
        window_size: usize,
        hop: usize,
    ) -> Self {
        Self {
            step: TAU * frequency as f64 / sample_rate as f64,
            phase: 0.0,
            amplitude: 0.5,
            remaining: (seconds.max(0.0) * sample_rate as f32) as usize,
            hop: hop.max(1),
            chunk: Vec::with_capacity(hop),
            buffer: CaptureBuffer::new(window_size, sample_rate),
        }
    }
}

impl SampleSource for ToneSource {
    fn refill(&mut self) -> Result<bool> {
        if self.remaining == 0 {
            return Ok(false);
        }
        let count = self.hop.min(self.remaining);
        self.chunk.clear();
        for _ in 0..count {
            self.chunk.push(self.amplitude * self.phase.sin() as f32);
            self.phase = (self.phase + self.step) % TAU;
        }
        self.buffer.push(&self.chunk);
        self.remaining -= count;
        Ok(true)
    }

    fn window(&self) -> SampleWindow<'_> {
        self.buffer.window()
    }
}
