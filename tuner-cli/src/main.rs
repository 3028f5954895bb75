//! # Tuner CLI
//!
//! Command-line front end for `tuner-core`. Reads audio from a WAV file, a
//! synthesized tone, or (with the `live` feature) the default microphone, and
//! prints one meter line whenever the reading changes.

mod controls;
mod display;
mod sources;

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use crossbeam_channel::{Sender, unbounded};
use tuner_core::driver::{Control, DISPLAY_PERIOD, RunSummary, SampleSource, TickDriver};
use tuner_core::{TickOutcome, TunerConfig, TunerSession};

use display::Meter;
use sources::{FileSource, ToneSource, hop_size};

#[derive(Parser)]
#[command(name = "tuner", version, about = "Monophonic guitar and chromatic tuner")]
struct Cli {
    /// JSON file with tuner settings; missing fields keep their defaults
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Lock the reading to one string (0 = low E .. 5 = high E)
    #[arg(long, global = true, value_parser = clap::value_parser!(u8).range(0..6))]
    lock: Option<u8>,

    /// Number of meter segments
    #[arg(long, global = true, default_value_t = 11)]
    segments: usize,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Analyse a WAV file as fast as possible
    File {
        path: PathBuf,

        /// Simulated display refresh rate, in ticks per second
        #[arg(long, default_value_t = 60)]
        rate: u32,
    },
    /// Tune against a generated sine at the display refresh rate
    Tone {
        frequency: f32,

        #[arg(long, default_value_t = 2.0)]
        seconds: f32,

        #[arg(long, default_value_t = 44100)]
        sample_rate: u32,
    },
    /// Listen to the default input device
    #[cfg(feature = "live")]
    Listen {
        /// Stop after this many seconds instead of waiting for `quit`
        #[arg(long)]
        seconds: Option<f32>,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    let meter = Meter::new(cli.segments);
    let lock = cli.lock.map(usize::from);

    let summary = match cli.command {
        Command::File { path, rate } => run_file(config, &path, rate, lock, &meter)?,
        Command::Tone { frequency, seconds, sample_rate } => {
            let stdin = |tx| {
                controls::spawn_stdin_reader(tx);
            };
            run_tone(config, frequency, seconds, sample_rate, lock, &meter, stdin)?
        }
        #[cfg(feature = "live")]
        Command::Listen { seconds } => run_live(config, seconds, lock, &meter)?,
    };

    println!(
        "{} ticks: {} readings, {} without signal",
        summary.ticks, summary.results, summary.no_signal
    );
    Ok(())
}

/// Loads settings from `path`, or the defaults when no file is given.
fn load_config(path: Option<&Path>) -> Result<TunerConfig> {
    let Some(path) = path else {
        return Ok(TunerConfig::default());
    };
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let config: TunerConfig = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("parsing {}", path.display()))?;
    log::info!("loaded settings from {}", path.display());
    Ok(config)
}

fn new_session(config: TunerConfig, lock: Option<usize>) -> Result<TunerSession> {
    let mut session = TunerSession::new(config)?;
    if let Some(index) = lock {
        session.toggle_lock(index)?;
    }
    Ok(session)
}

/// Prints an outcome unless it renders the same as the previous one.
struct Printer<'a> {
    meter: &'a Meter,
    last: Option<String>,
}

impl<'a> Printer<'a> {
    fn new(meter: &'a Meter) -> Self {
        Self { meter, last: None }
    }

    fn show(&mut self, outcome: &TickOutcome) {
        let line = self.meter.render(outcome);
        if self.last.as_deref() != Some(line.as_str()) {
            println!("{line}");
            self.last = Some(line);
        }
    }
}

fn run_file(
    config: TunerConfig,
    path: &Path,
    rate: u32,
    lock: Option<usize>,
    meter: &Meter,
) -> Result<RunSummary> {
    let (samples, sample_rate) = sources::read_wav(path)?;
    let config = config.with_sample_rate(sample_rate);
    let hop = hop_size(sample_rate, rate);
    let mut source = FileSource::new(samples, sample_rate, config.window_size, hop);
    let mut session = new_session(config, lock)?;
    session.start();

    let mut printer = Printer::new(meter);
    let mut summary = RunSummary::default();
    while source.refill()? {
        let Some(outcome) = session.tick(&source.window()) else {
            break;
        };
        summary.ticks += 1;
        match outcome {
            TickOutcome::NoSignal => summary.no_signal += 1,
            TickOutcome::Tuning(_) => summary.results += 1,
        }
        printer.show(&outcome);
    }
    log::info!("analysed {:.2} s of audio", source.elapsed());
    Ok(summary)
}

/// Plays a generated sine through the tick driver.
///
/// # Arguments
/// * `attach_controls` - Receives a control sender, e.g. to forward keyboard input.
///   It may drop the sender at any time; the tone still plays to the end.
fn run_tone(
    config: TunerConfig,
    frequency: f32,
    seconds: f32,
    sample_rate: u32,
    lock: Option<usize>,
    meter: &Meter,
    attach_controls: impl FnOnce(Sender<Control>),
) -> Result<RunSummary> {
    let config = config.with_sample_rate(sample_rate);
    let ticks_per_second = (1.0 / DISPLAY_PERIOD.as_secs_f64()).round() as u32;
    let mut source = ToneSource::new(
        frequency,
        sample_rate,
        seconds,
        config.window_size,
        hop_size(sample_rate, ticks_per_second),
    );
    let mut session = new_session(config, lock)?;

    // The tone ends when the source runs dry. Holding a sender here keeps the
    // loop alive when stdin closes early.
    let (control_tx, control_rx) = unbounded();
    control_tx.send(Control::Start)?;
    attach_controls(control_tx.clone());
    let driver = TickDriver::new(DISPLAY_PERIOD, control_rx);

    let mut printer = Printer::new(meter);
    let summary = driver.run(&mut session, &mut source, |outcome| printer.show(outcome));
    drop(control_tx);
    summary
}

#[cfg(feature = "live")]
fn run_live(
    config: TunerConfig,
    seconds: Option<f32>,
    lock: Option<usize>,
    meter: &Meter,
) -> Result<RunSummary> {
    use std::time::Duration;
    use tuner_core::audio::start_audio_capture;
    use tuner_core::driver::ChannelSource;

    let (chunk_tx, chunk_rx) = crossbeam_channel::bounded(64);
    let (stream, sample_rate) = start_audio_capture(chunk_tx)?;

    let config = config.with_sample_rate(sample_rate);
    let mut source = ChannelSource::new(chunk_rx, config.window_size, sample_rate);
    let mut session = new_session(config, lock)?;

    let (control_tx, control_rx) = unbounded();
    control_tx.send(Control::Start)?;
    controls::spawn_stdin_reader(control_tx.clone());
    if let Some(seconds) = seconds {
        let timer_tx = control_tx.clone();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_secs_f32(seconds.max(0.0)));
            let _ = timer_tx.send(Control::Shutdown);
        });
    }
    log::info!("listening; type start, stop, a string (0-5 or E2..E4), or quit");

    let driver = TickDriver::new(DISPLAY_PERIOD, control_rx);
    let mut printer = Printer::new(meter);
    let summary = driver.run(&mut session, &mut source, |outcome| printer.show(outcome));
    drop(stream);
    summary
}
