//! # stepr
//!
//! Runs text motion programs on the stepper engine.
//!
//! Loads the engine configuration (`--config`, else the default path, else
//! the built-in two-motor wiring), starts the engine, queues one program per
//! `--program <motor>=<path>`, starts every motor and waits until all motors
//! are idle, `--run-for` elapses or Ctrl-C arrives. Teardown parks every
//! output.

use clap::Parser;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use stepr_common::config::{ConfigError, EngineConfig, RtConfig};
use stepr_common::consts::DEFAULT_CONFIG_PATH;
use stepr_common::hal::config::HardwareConfig;
use stepr_engine::{Engine, Program};
use stepr_hal::{DriverRegistry, open_hardware};
use tracing::{Level, error, info, warn};
use tracing_subscriber::EnvFilter;

const IDLE_POLL: Duration = Duration::from_millis(10);

/// Tick-driven stepper motor runner.
#[derive(Parser, Debug)]
#[command(name = "stepr")]
#[command(author = "RTS007")]
#[command(version)]
#[command(about = "Run motion programs on GPIO stepper motors")]
struct Args {
    /// Engine configuration TOML (default: /etc/stepr/stepr.toml if present).
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Program to run, as <motor>=<path>. Motor is a name or an index.
    #[arg(short, long = "program", value_name = "MOTOR=PATH", value_parser = parse_program_arg)]
    programs: Vec<(String, PathBuf)>,

    /// Use the simulation GPIO and software clock, no RT scheduling.
    #[arg(long)]
    simulate: bool,

    /// Stop after this many seconds even if motors are still running.
    #[arg(long, value_name = "SECS")]
    run_for: Option<f64>,

    /// Enable verbose logging (DEBUG level).
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format.
    #[arg(long)]
    json: bool,
}

fn parse_program_arg(raw: &str) -> Result<(String, PathBuf), String> {
    match raw.split_once('=') {
        Some((motor, path)) if !motor.is_empty() && !path.is_empty() => {
            Ok((motor.to_string(), PathBuf::from(path)))
        }
        _ => Err(format!("expected <motor>=<path>, got '{raw}'")),
    }
}

fn main() {
    let args = Args::parse();
    let config = load_config(args.config.as_deref());
    setup_tracing(&args, config.as_ref().ok());

    info!("stepr v{} starting...", env!("CARGO_PKG_VERSION"));

    let result = config
        .map_err(|e| Box::new(e) as Box<dyn std::error::Error>)
        .and_then(|config| run(&args, config));
    if let Err(e) = result {
        error!("FATAL: {e}");
        process::exit(1);
    }

    info!("stepr shutdown complete");
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig, ConfigError> {
    match path {
        Some(path) => EngineConfig::load_validated(path),
        None => match EngineConfig::load_validated(Path::new(DEFAULT_CONFIG_PATH)) {
            Err(ConfigError::FileNotFound) => Ok(EngineConfig::default()),
            other => other,
        },
    }
}

fn run(args: &Args, mut config: EngineConfig) -> Result<(), Box<dyn std::error::Error>> {
    if args.simulate {
        config.hardware = HardwareConfig::simulation();
        config.rt = RtConfig::disabled();
    }
    info!(
        "Config OK: {} motors, tick_period={}ns, gpio={}",
        config.motors.len(),
        config.timing.tick_period_ns,
        config.hardware.gpio_driver
    );

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        r.store(false, Ordering::SeqCst);
    })?;

    let hardware = open_hardware(&config.hardware, &DriverRegistry::with_builtin())?;
    let engine = Engine::start(&config, hardware)?;

    for (motor, path) in &args.programs {
        let index = resolve_motor(&engine, motor)?;
        let program = Program::load(path)?;
        if let Err(e) = program.queue_on(&engine, index) {
            engine.clear_motor(index)?;
            return Err(Box::new(e));
        }
        info!(
            "Motor {index} ('{}'): queued {} commands from {}",
            engine.motor(index)?.name(),
            program.len(),
            path.display()
        );
    }

    engine.start_all();

    let deadline = args
        .run_for
        .and_then(|secs| Duration::try_from_secs_f64(secs.max(0.0)).ok())
        .and_then(|d| Instant::now().checked_add(d));
    while running.load(Ordering::SeqCst) && !engine.all_idle() {
        if deadline.is_some_and(|d| Instant::now() >= d) {
            warn!("Run time elapsed with motors still moving");
            break;
        }
        thread::sleep(IDLE_POLL);
    }

    let stats = engine.shutdown()?;
    info!(
        "Tick stats: {} ticks, avg={}ns, max={}ns, overruns={}",
        stats.tick_count,
        stats.avg_tick_ns(),
        stats.max_tick_ns,
        stats.overruns
    );
    Ok(())
}

fn resolve_motor(engine: &Engine, motor: &str) -> Result<usize, Box<dyn std::error::Error>> {
    if let Some(index) = engine.motor_index(motor) {
        return Ok(index);
    }
    let index: usize = motor
        .parse()
        .map_err(|_| format!("unknown motor '{motor}'"))?;
    engine.motor(index)?;
    Ok(index)
}

/// Setup tracing subscriber based on CLI arguments and the configured level.
fn setup_tracing(args: &Args, config: Option<&EngineConfig>) {
    let filter = if args.verbose {
        EnvFilter::from_default_env().add_directive(Level::DEBUG.into())
    } else {
        let level = config.map(|c| c.shared.log_level.as_directive()).unwrap_or("info");
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
    };

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .compact()
            .init();
    }
}
