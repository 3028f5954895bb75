//! # Sample Windows
//!
//! The acquisition side owns a [`CaptureBuffer`] and refills it between ticks;
//! the pipeline only ever sees a borrowed [`SampleWindow`] for the duration of a
//! single tick.

/// A read-only view of the most recent samples, in [-1, 1].
#[derive(Debug, Clone, Copy)]
pub struct SampleWindow<'a> {
    samples: &'a [f32],
    sample_rate: u32,
}

impl<'a> SampleWindow<'a> {
    pub fn new(samples: &'a [f32], sample_rate: u32) -> Self {
        Self { samples, sample_rate }
    }

    pub fn samples(&self) -> &'a [f32] {
        self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Root-mean-square level of the window. An empty window has level 0.
    pub fn rms(&self) -> f32 {
        if self.samples.is_empty() {
            return 0.0;
        }
        (self.samples.iter().map(|&s| s * s).sum::<f32>() / self.samples.len() as f32).sqrt()
    }
}

/// Fixed-length rolling buffer holding the newest captured samples.
///
/// Starts out silent. Each push shifts the oldest samples out, so after enough
/// audio has arrived the buffer always holds the last `len()` samples in order.
#[derive(Debug, Clone)]
pub struct CaptureBuffer {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl CaptureBuffer {
    pub fn new(window_size: usize, sample_rate: u32) -> Self {
        Self {
            samples: vec![0.0; window_size],
            sample_rate,
        }
    }

    /// Appends a chunk of newly captured samples.
    ///
    /// A chunk longer than the buffer replaces its whole content with the tail
    /// of the chunk.
    pub fn push(&mut self, chunk: &[f32]) {
        let len = self.samples.len();
        if chunk.len() >= len {
            self.samples.copy_from_slice(&chunk[chunk.len() - len..]);
            return;
        }
        self.samples.copy_within(chunk.len().., 0);
        self.samples[len - chunk.len()..].copy_from_slice(chunk);
    }

    /// Zeroes the buffer so no audio from before a restart is analysed.
    pub fn clear(&mut self) {
        self.samples.fill(0.0);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn window(&self) -> SampleWindow<'_> {
        SampleWindow::new(&self.samples, self.sample_rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rms_of_empty_and_silent_windows_is_zero() {
        assert_eq!(SampleWindow::new(&[], 44100).rms(), 0.0);
        assert_eq!(SampleWindow::new(&[0.0; 64], 44100).rms(), 0.0);
    }

    #[test]
    fn rms_of_constant_signal() {
        let samples = [0.5, -0.5, 0.5, -0.5];
        let window = SampleWindow::new(&samples, 8000);
        assert!((window.rms() - 0.5).abs() < 1e-6);
        assert_eq!(window.len(), 4);
        assert_eq!(window.sample_rate(), 8000);
    }

    #[test]
    fn buffer_starts_silent() {
        let buffer = CaptureBuffer::new(8, 44100);
        assert_eq!(buffer.window().samples(), &[0.0; 8]);
    }

    #[test]
    fn push_keeps_newest_samples_in_order() {
        let mut buffer = CaptureBuffer::new(5, 44100);
        buffer.push(&[1.0, 2.0]);
        buffer.push(&[3.0, 4.0, 5.0]);
        buffer.push(&[6.0]);
        assert_eq!(buffer.window().samples(), &[2.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn oversized_chunk_keeps_its_tail() {
        let mut buffer = CaptureBuffer::new(3, 44100);
        buffer.push(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(buffer.window().samples(), &[3.0, 4.0, 5.0]);

        buffer.clear();
        assert_eq!(buffer.window().samples(), &[0.0; 3]);
    }
}
