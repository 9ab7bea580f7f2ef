use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use log::info;

use staged_ascent::{
    AutopilotMode, DynamicsKind, RocketSimulator, RunOutcome, SettingsFile, Telemetry,
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    Manual,
    MaxDistance,
    StableOrbit,
}

impl From<ModeArg> for AutopilotMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Manual => AutopilotMode::Manual,
            ModeArg::MaxDistance => AutopilotMode::MaxDistance,
            ModeArg::StableOrbit => AutopilotMode::StableOrbit,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum DynamicsArg {
    Reference,
    Optimized,
}

impl From<DynamicsArg> for DynamicsKind {
    fn from(dynamics: DynamicsArg) -> Self {
        match dynamics {
            DynamicsArg::Reference => DynamicsKind::Reference,
            DynamicsArg::Optimized => DynamicsKind::Optimized,
        }
    }
}

#[derive(Parser, Debug)]
#[command(version, about = "Real-time staged rocket ascent simulation", long_about = None)]
struct Args {
    /// TOML file with the rocket definition and flight settings
    #[arg(short, long, default_value = "config/ascent.toml")]
    settings: PathBuf,

    #[arg(short, long, value_enum)]
    mode: Option<ModeArg>,

    #[arg(short, long)]
    tick_interval_ms: Option<u64>,

    #[arg(short, long, value_enum)]
    dynamics: Option<DynamicsArg>,
}

fn main() -> Result<()> {
    // Default log level to "info"
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info");
    }
    pretty_env_logger::init();

    let args = Args::parse();

    info!("Reading settings from '{}'", args.settings.display());
    let settings = SettingsFile::load(&args.settings)
        .with_context(|| format!("loading {}", args.settings.display()))?;

    let mut simulator = RocketSimulator::from_settings_file(settings)?;
    if let Some(mode) = args.mode {
        simulator.set_autopilot_mode(mode.into());
    }
    if let Some(tick_interval_ms) = args.tick_interval_ms {
        simulator.set_tick_interval(tick_interval_ms)?;
    }
    if let Some(dynamics) = args.dynamics {
        simulator.set_dynamics(dynamics.into());
    }

    let telemetry = Arc::new(Telemetry::new());
    simulator.subscribe(telemetry.clone());

    let (tx_interrupt, rx_interrupt) = flume::bounded(1);
    ctrlc::set_handler(move || {
        let _ = tx_interrupt.try_send(());
    })
    .context("installing Ctrl-C handler")?;

    simulator.start()?;

    while simulator.is_running() {
        if rx_interrupt.recv_timeout(Duration::from_millis(100)).is_ok() {
            info!("Interrupted");
            break;
        }
    }
    simulator.stop();

    if let Some(snapshot) = simulator.latest_snapshot() {
        info!(
            "Flown path: {} points, last forecast: {} points, final altitude {:.1} m",
            simulator.paths().flown_len(),
            simulator.paths().predicted().len(),
            snapshot.altitude()
        );
    }

    println!("{}", telemetry.summary());

    if telemetry.data().outcome == Some(RunOutcome::GroundImpact) {
        info!("Boom!");
    }

    Ok(())
}
