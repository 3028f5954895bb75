//! # Tick Driver
//!
//! Runs a [`TunerSession`] at a fixed refresh rate, the way a display loop
//! would, and applies start/stop/lock controls between ticks.
//!
//! Ticks are single-flight: each one is processed to completion on the calling
//! thread before the next is taken, and ticks that arrive late are coalesced.
//! While the session is idle no tick is scheduled at all, and the sample source
//! is reset when listening resumes.

use std::time::{Duration, Instant};

use anyhow::Result;
use crossbeam_channel::{Receiver, TryRecvError, never, select, tick};

use crate::session::TunerSession;
use crate::window::{CaptureBuffer, SampleWindow};
use crate::TickOutcome;

/// Tick period of a 60 Hz display.
pub const DISPLAY_PERIOD: Duration = Duration::from_micros(16_667);

/// Requests from the user interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Start,
    Stop,
    ToggleLock(usize),
    /// Leave the loop. Also implied when every control sender is dropped.
    Shutdown,
}

/// Where the samples for each tick come from.
pub trait SampleSource {
    /// Pulls in whatever audio arrived since the last tick.
    ///
    /// # Returns
    /// * `Ok(true)` - The window is ready
    /// * `Ok(false)` - The source is exhausted; the loop ends
    fn refill(&mut self) -> Result<bool>;

    /// The current window. Only valid until the next `refill`.
    fn window(&self) -> SampleWindow<'_>;

    /// Called when listening starts again after a stop. Sources fed by a live
    /// stream drop whatever they buffered in the meantime.
    fn reset(&mut self) {}
}

/// Feeds a [`CaptureBuffer`] from chunks sent by a capture thread.
pub struct ChannelSource {
    chunks: Receiver<Vec<f32>>,
    buffer: CaptureBuffer,
}

impl ChannelSource {
    pub fn new(chunks: Receiver<Vec<f32>>, window_size: usize, sample_rate: u32) -> Self {
        Self {
            chunks,
            buffer: CaptureBuffer::new(window_size, sample_rate),
        }
    }
}

impl SampleSource for ChannelSource {
    fn refill(&mut self) -> Result<bool> {
        loop {
            match self.chunks.try_recv() {
                Ok(chunk) => self.buffer.push(&chunk),
                Err(TryRecvError::Empty) => return Ok(true),
                Err(TryRecvError::Disconnected) => return Ok(false),
            }
        }
    }

    fn window(&self) -> SampleWindow<'_> {
        self.buffer.window()
    }

    fn reset(&mut self) {
        let stale = self.chunks.try_iter().count();
        self.buffer.clear();
        log::debug!("discarded {stale} chunk(s) captured while idle");
    }
}

/// Counters reported when the loop exits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub ticks: u64,
    pub results: u64,
    pub no_signal: u64,
}

enum Flow {
    Continue,
    Exit,
}

pub struct TickDriver {
    period: Duration,
    control: Receiver<Control>,
}

impl TickDriver {
    pub fn new(period: Duration, control: Receiver<Control>) -> Self {
        Self { period, control }
    }

    /// Runs until `Shutdown`, a closed control channel, or an exhausted source.
    ///
    /// # Arguments
    /// * `session` - The session to drive; its state decides whether ticks run
    /// * `source` - Refilled once per tick
    /// * `emit` - Receives every outcome, on the calling thread
    pub fn run<S, F>(
        &self,
        session: &mut TunerSession,
        source: &mut S,
        mut emit: F,
    ) -> Result<RunSummary>
    where
        S: SampleSource,
        F: FnMut(&TickOutcome),
    {
        let mut summary = RunSummary::default();
        let mut listening = session.is_listening();
        let mut ticker = self.schedule(listening);

        loop {
            let flow = select! {
                recv(self.control) -> msg => Ok(match msg {
                    Ok(control) => apply(session, source, control),
                    Err(_) => Flow::Exit,
                }),
                recv(ticker) -> _ => self.on_tick(session, source, &mut summary, &mut emit),
            };
            if let Flow::Exit = flow? {
                break;
            }
            // Re-arm or cancel the schedule when the session changes state.
            if session.is_listening() != listening {
                listening = session.is_listening();
                ticker = self.schedule(listening);
            }
        }

        log::debug!("tick loop finished: {summary:?}");
        Ok(summary)
    }

    fn on_tick<S, F>(
        &self,
        session: &mut TunerSession,
        source: &mut S,
        summary: &mut RunSummary,
        emit: &mut F,
    ) -> Result<Flow>
    where
        S: SampleSource,
        F: FnMut(&TickOutcome),
    {
        // Controls queued while waiting take effect before the tick.
        if let Flow::Exit = self.drain_controls(session, source) {
            return Ok(Flow::Exit);
        }
        if !session.is_listening() {
            return Ok(Flow::Continue);
        }
        if !source.refill()? {
            log::debug!("sample source exhausted");
            return Ok(Flow::Exit);
        }

        if let Some(outcome) = session.tick(&source.window()) {
            summary.ticks += 1;
            match outcome {
                TickOutcome::NoSignal => summary.no_signal += 1,
                TickOutcome::Tuning(_) => summary.results += 1,
            }
            emit(&outcome);
        }
        Ok(Flow::Continue)
    }

    fn drain_controls<S: SampleSource>(&self, session: &mut TunerSession, source: &mut S) -> Flow {
        loop {
            match self.control.try_recv() {
                Ok(control) => {
                    if let Flow::Exit = apply(session, source, control) {
                        return Flow::Exit;
                    }
                }
                Err(TryRecvError::Empty) => return Flow::Continue,
                Err(TryRecvError::Disconnected) => return Flow::Exit,
            }
        }
    }

    fn schedule(&self, listening: bool) -> Receiver<Instant> {
        if listening {
            tick(self.period)
        } else {
            never()
        }
    }
}

fn apply<S: SampleSource>(session: &mut TunerSession, source: &mut S, control: Control) -> Flow {
    match control {
        Control::Start => {
            if !session.is_listening() {
                source.reset();
                session.start();
            }
        }
        Control::Stop => session.stop(),
        Control::ToggleLock(index) => {
            if let Err(e) = session.toggle_lock(index) {
                log::warn!("ignoring lock request: {e}");
            }
        }
        Control::Shutdown => return Flow::Exit,
    }
    Flow::Continue
}
