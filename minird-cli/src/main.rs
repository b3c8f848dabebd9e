//! miniRD Bridge CLI Application
//!
//! Connects a miniRD console to the Run8 simulator. It uses the
//! minird-bridge library and adds:
//! - Controller discovery over serial ports
//! - The UDP link to the simulator
//! - Console prompts for recalibration
//! - TOML configuration and logging setup

use anyhow::{Context, Result};
use clap::Parser;
use minird_bridge::{Bridge, CalibrationStore, CommandTable, SampleSource};
use std::path::PathBuf;
use std::time::Instant;

mod config;
mod console;
mod serial;
mod udp;

use config::AppConfig;

/// miniRD Bridge - Drive Run8 from a miniRD locomotive console
#[derive(Parser, Debug)]
#[command(name = "minird")]
#[command(about = "Bridge a miniRD console to the Run8 simulator", long_about = None)]
#[command(version)]
struct Args {
    /// Serial port the miniRD is connected to (probes every port when omitted)
    #[arg(short, long, value_name = "PORT")]
    port: Option<String>,

    /// Path to the calibration file
    #[arg(long, value_name = "FILE")]
    calibration: Option<PathBuf>,

    /// Path to configuration file (minird.toml)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Identify the controller, print one status sample and exit
    #[arg(long)]
    probe: bool,

    /// Verbosity level (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(args.verbose, args.quiet);

    log::info!("miniRD Bridge CLI v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Using bridge library v{}", minird_bridge::VERSION);

    let config = resolve_config(&args)?;

    if args.probe {
        return probe_mode(&config);
    }
    bridge_mode(config)
}

/// Load the config file (if any) and apply command-line overrides
fn resolve_config(args: &Args) -> Result<AppConfig> {
    let mut config = match &args.config {
        Some(path) => config::load_config(path)?,
        None => AppConfig::default(),
    };

    if let Some(port) = &args.port {
        config.serial.port = Some(port.clone());
    }
    if let Some(path) = &args.calibration {
        config.calibration.path = path.clone();
    }
    Ok(config)
}

fn find_port(config: &AppConfig) -> Result<String> {
    match &config.serial.port {
        Some(port) => Ok(port.clone()),
        None => {
            let found = serial::discover(config.serial.baud_rate, config.serial.probe_timeout())
                .context("Controller discovery failed")?;
            log::info!("Using {} (firmware {})", found.port, found.firmware);
            Ok(found.port)
        }
    }
}

/// Normal operation: poll the controller and stream frames to the simulator
fn bridge_mode(config: AppConfig) -> Result<()> {
    let port = find_port(&config)?;
    let source = serial::open(&port, config.serial.baud_rate, config.serial.timeout())?;
    let sink = udp::UdpSink::connect(config.simulator.socket_addr()?)?;

    let store = CalibrationStore::load_or_create(&config.calibration.path)
        .with_context(|| format!("Failed to load calibration {:?}", config.calibration.path))?;

    let mut bridge = Bridge::start(
        source,
        sink,
        console::ConsolePrompter::stdio(),
        CommandTable::minird(),
        config.engine,
        store,
        Instant::now(),
    )
    .context("Failed to read the first status sample")?;

    log::info!(
        "miniRD server started at {}",
        chrono::Local::now().format("%H:%M:%S")
    );

    let result = bridge.run();
    let stats = bridge.stats();
    log::info!(
        "Session ended after {} cycles ({} skipped), {} frames sent, {} send failures, \
         {} calibrations",
        stats.cycles,
        stats.skipped,
        stats.frames_sent,
        stats.send_failures,
        stats.calibrations
    );
    result.with_context(|| format!("Lost connection to controller on {}", port))
}

/// Identify the controller and show one decoded sample
fn probe_mode(config: &AppConfig) -> Result<()> {
    let port = find_port(config)?;
    let mut link = serial::open(&port, config.serial.baud_rate, config.serial.timeout())?;

    match link.identify()? {
        Some(firmware) => println!("miniRD on {}, firmware version {}", port, firmware),
        None => println!("Device on {} did not identify as a miniRD", port),
    }

    let sample = link.sample().context("Failed to read a status sample")?;
    let table = CommandTable::minird();
    for (entry, raw) in table.entries().iter().zip(&sample) {
        println!("  {:>2}  {:<28} {}", entry.channel, entry.name(), raw);
    }
    if sample.len() > table.len() {
        println!("  ({} extra fields ignored)", sample.len() - table.len());
    }
    Ok(())
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: u8, quiet: bool) {
    use env_logger::Builder;
    use log::LevelFilter;
    use std::io::Write;

    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    Builder::new()
        .filter_level(level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {}] {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}
