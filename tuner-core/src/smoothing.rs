//! # Frequency Smoothing
//!
//! Single-pole exponential moving average over successive pitch estimates.
//! Damps single-frame estimator noise without holding a history buffer.

use crate::tuning::Frequency;

#[derive(Debug, Clone)]
pub struct Smoother {
    alpha: f32,
    current: Option<Frequency>,
}

impl Smoother {
    /// `alpha` is the weight of the newest estimate: lower is steadier, higher
    /// tracks faster.
    pub fn new(alpha: f32) -> Self {
        Self { alpha, current: None }
    }

    /// Feeds one tick's estimate and returns the smoothed frequency.
    ///
    /// `None` (silence, or no clear pitch) clears the state so the next valid
    /// estimate is taken as is instead of being blended with a stale value.
    pub fn update(&mut self, raw: Option<Frequency>) -> Option<Frequency> {
        let Some(raw) = raw else {
            self.reset();
            return None;
        };

        let next = match self.current {
            None => raw,
            Some(previous) => {
                let blended = self.alpha * raw.hz() + (1.0 - self.alpha) * previous.hz();
                Frequency::new(blended).unwrap_or(raw)
            }
        };
        self.current = Some(next);
        self.current
    }

    pub fn reset(&mut self) {
        self.current = None;
    }

    pub fn current(&self) -> Option<Frequency> {
        self.current
    }
}
