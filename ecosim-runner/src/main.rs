use clap::Parser;
use crossbeam_channel::Receiver;
use ecosim_config::{load_config, Config, ConfigError};
use ecosim_simulation::{AppError, EcosystemApp, ResetEvent};
use ecosim_transport::{TransportController, TransportError};
use hdrhistogram::Histogram;
use log::{error, info, warn};
use thiserror::Error;

use std::path::PathBuf;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the simulation configuration file (JSON or TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Seed string for the generated ecosystem
    #[arg(short, long, conflicts_with = "load")]
    seed: Option<String>,

    /// Ecosystem file to start from instead of generating one
    #[arg(short, long)]
    load: Option<PathBuf>,

    /// Where to save the live ecosystem on exit
    #[arg(long)]
    save: Option<PathBuf>,

    /// Number of ticks to run; 0 runs until Ctrl+C
    #[arg(short, long, default_value_t = 600)]
    ticks: u64,

    /// Pace ticks to wall-clock time instead of running flat out
    #[arg(long)]
    realtime: bool,
}

#[derive(Error, Debug)]
enum RunnerError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    App(#[from] AppError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("Failed to set up: {0}")]
    Setup(String),
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    if let Err(e) = run(args) {
        error!("{}", e);
        process::exit(1);
    }
}

fn run(args: Args) -> Result<(), RunnerError> {
    let config = match &args.config {
        Some(path) => {
            let config = load_config(path)?;
            info!("Using configuration from {}", path.display());
            config
        }
        None => Config::default(),
    };

    let mut app = EcosystemApp::new(&config);
    let events = app.subscribe();
    let mut transport = TransportController::from_config(&config.transport)?;

    match (&args.load, &args.seed) {
        (Some(path), _) => app.load_ecosystem(path)?,
        (None, Some(seed)) => {
            app.generate_random_ecosystem(seed)?;
        }
        (None, None) => {
            let seed = app.generate_unnamed_ecosystem()?;
            info!("No seed given, generated '{}'", seed);
        }
    }

    let running = Arc::new(AtomicBool::new(true));
    let handler_flag = running.clone();
    ctrlc::set_handler(move || handler_flag.store(false, Ordering::SeqCst))
        .map_err(|e| RunnerError::Setup(e.to_string()))?;

    let mut step_times = Histogram::<u64>::new(3).map_err(|e| RunnerError::Setup(e.to_string()))?;
    let frame_duration = Duration::from_secs_f32(config.simulation.fixed_delta_time);
    let mut last_frame = Instant::now();

    info!(
        "Running {} ticks{}",
        if args.ticks == 0 { "unbounded".to_string() } else { args.ticks.to_string() },
        if args.realtime { " in real time" } else { "" }
    );

    while running.load(Ordering::SeqCst)
        && (args.ticks == 0 || app.engine().tick_count() < args.ticks)
    {
        let step_start = Instant::now();
        let tick_before = app.engine().tick_count();
        if args.realtime {
            let now = Instant::now();
            app.update(now.duration_since(last_frame).as_secs_f32());
            last_frame = now;
        } else {
            app.tick();
        }
        // Histogram values must be at least 1.
        let elapsed = step_start.elapsed().as_micros().max(1) as u64;
        if let Err(e) = step_times.record(elapsed) {
            warn!("Dropping step timing {}us: {}", elapsed, e);
        }

        drain_events(&events);
        if app.engine().tick_count() != tick_before {
            transport.export(app.engine())?;
        }

        if args.realtime {
            let spent = step_start.elapsed();
            if spent < frame_duration {
                spin_sleep::sleep(frame_duration - spent);
            } else {
                warn!("Frame time exceeded budget: {:?} > {:?}", spent, frame_duration);
            }
        }
    }

    if let Some(path) = &args.save {
        app.save_ecosystem(path)?;
        info!("Saved '{}' to {}", app.engine().description().name, path.display());
    }

    info!(
        "Finished after {} ticks, {} frames exported. Step time us: p50={} p99={} max={}",
        app.engine().tick_count(),
        transport.frames_sent(),
        step_times.value_at_quantile(0.5),
        step_times.value_at_quantile(0.99),
        step_times.max()
    );
    Ok(())
}

fn drain_events(events: &Receiver<ResetEvent>) {
    for event in events.try_iter() {
        match event {
            ResetEvent::Started { name, behavior } => {
                info!("Reset to '{}' started ({:?})", name, behavior)
            }
            ResetEvent::Midway { name, .. } => info!("Reset to '{}' midway", name),
            ResetEvent::Finished { name, particle_count, .. } => {
                info!("Ecosystem '{}' live with {} particles", name, particle_count)
            }
            ResetEvent::Superseded { name, .. } => warn!("Reset to '{}' was superseded", name),
        }
    }
}
