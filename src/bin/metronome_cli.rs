use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use metronome_core::audio::{generate_click_sample, ClickSample};
use metronome_core::config::{AppConfig, BackendPreference};
use metronome_core::engine::{ManualClock, MetronomeHandle};
use metronome_core::input::parse_tempo_input;
use metronome_core::scheduler::{PrecisionScheduler, Tempo};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

#[derive(Parser, Debug)]
#[command(
    name = "metronome_cli",
    about = "Desktop harness for the metronome timing core"
)]
struct Cli {
    /// Configuration file (defaults to assets/metronome_config.json)
    #[arg(long)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Play clicks on the default output device and print telemetry as JSON lines
    Play {
        #[arg(long, default_value_t = 120)]
        bpm: u32,
        #[arg(long, default_value_t = 5)]
        seconds: u64,
        /// Override the configured backend preference
        #[arg(long, value_enum)]
        backend: Option<BackendArg>,
        /// WAV file to use as the click
        #[arg(long)]
        click: Option<PathBuf>,
    },
    /// Run the lookahead scheduler against a simulated clock with wake-up jitter
    Simulate {
        #[arg(long, default_value_t = 120)]
        bpm: u32,
        #[arg(long, default_value_t = 4.0)]
        seconds: f64,
        /// Maximum extra delay added to each wake-up, in milliseconds
        #[arg(long, default_value_t = 0.0)]
        jitter_ms: f64,
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
    /// Validate tempo text the way the input field does
    ParseTempo { raw: String },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum BackendArg {
    Auto,
    Precise,
    Coarse,
}

impl From<BackendArg> for BackendPreference {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Auto => BackendPreference::Auto,
            BackendArg::Precise => BackendPreference::Precise,
            BackendArg::Coarse => BackendPreference::Coarse,
        }
    }
}

#[derive(Debug, Serialize)]
struct SimulationReport {
    bpm: u32,
    beat_interval: f64,
    pulse_count: usize,
    max_drift: f64,
    pulses: Vec<f64>,
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = cli
        .config
        .map(AppConfig::load_from_file)
        .unwrap_or_else(AppConfig::load);

    match cli.command {
        Commands::Play {
            bpm,
            seconds,
            backend,
            click,
        } => {
            let mut config = config;
            if let Some(backend) = backend {
                config.audio.backend = backend.into();
            }
            if click.is_some() {
                config.audio.click_asset = click;
            }
            run_play(config, bpm, seconds)
        }
        Commands::Simulate {
            bpm,
            seconds,
            jitter_ms,
            seed,
        } => run_simulate(&config, bpm, seconds, jitter_ms, seed),
        Commands::ParseTempo { raw } => run_parse_tempo(&raw),
    }
}

fn run_play(config: AppConfig, bpm: u32, seconds: u64) -> Result<ExitCode> {
    metronome_core::init_logging();

    let handle = MetronomeHandle::spawn(config).context("starting control thread")?;
    let mut events = handle.subscribe();
    let printer = std::thread::spawn(move || -> Result<()> {
        while let Ok(event) = events.blocking_recv() {
            println!("{}", serde_json::to_string(&event)?);
        }
        Ok(())
    });

    handle.retune(bpm).context("setting tempo")?;
    handle.start().context("starting metronome")?;
    std::thread::sleep(Duration::from_secs(seconds));
    handle.stop().context("stopping metronome")?;

    drop(handle);
    match printer.join() {
        Ok(result) => result?,
        Err(_) => anyhow::bail!("telemetry printer panicked"),
    }
    Ok(ExitCode::from(0))
}

fn run_simulate(
    config: &AppConfig,
    bpm: u32,
    seconds: f64,
    jitter_ms: f64,
    seed: u64,
) -> Result<ExitCode> {
    let tempo = Tempo::new(bpm)?;
    let timing = &config.timing;
    let tick = timing.tick_period().as_secs_f64();
    let jitter = jitter_ms.max(0.0) / 1000.0;

    let clock = ManualClock::new();
    let click: ClickSample = Arc::from(generate_click_sample(48_000));
    let mut rng = StdRng::seed_from_u64(seed);
    let mut scheduler = PrecisionScheduler::new(timing.lookahead_secs());
    let first_pulse = timing.start_lead_secs();
    scheduler.start(first_pulse, tempo);

    let mut now = 0.0;
    while now < seconds {
        clock.set_now(now);
        scheduler.tick(&clock, &click);
        now += tick + rng.gen_range(0.0..=jitter);
    }

    let pulses = clock.scheduled_pulses();
    let max_drift = pulses
        .iter()
        .enumerate()
        .map(|(k, at)| (at - (first_pulse + k as f64 * tempo.beat_interval())).abs())
        .fold(0.0, f64::max);

    let report = SimulationReport {
        bpm: tempo.bpm(),
        beat_interval: tempo.beat_interval(),
        pulse_count: pulses.len(),
        max_drift,
        pulses,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(ExitCode::from(0))
}

fn run_parse_tempo(raw: &str) -> Result<ExitCode> {
    match parse_tempo_input(raw) {
        Some(tempo) => {
            println!("{}", tempo.bpm());
            Ok(ExitCode::from(0))
        }
        None => {
            eprintln!("Rejected tempo input {:?}", raw);
            Ok(ExitCode::from(2))
        }
    }
}
