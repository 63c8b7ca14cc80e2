//! OBD Monitor CLI Application
//!
//! Host application for the obd-monitor library. It builds an engine from a
//! TOML configuration, feeds it a recorded candump capture and prints:
//! - A JSON telemetry snapshot on every change
//! - Raw frames in candump format (with --raw)
//! - Broker messages through a logging publisher (with --publish)

use anyhow::{Context, Result};
use clap::Parser;
use obd_monitor::formats::candump::format_line;
use obd_monitor::{BrokerPublisher, ObdMonitor, RawFrame, ReplayTransport, VehicleTelemetry};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

mod config;

use config::AppConfig;

/// OBD Monitor - EV telemetry acquisition over OBD-II/UDS
#[derive(Parser, Debug)]
#[command(name = "obd-monitor-cli")]
#[command(about = "Replay CAN captures through the OBD telemetry engine", long_about = None)]
#[command(version)]
struct Args {
    /// Path to configuration file (config.toml)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// candump log to replay (overrides [replay].file)
    #[arg(short, long, value_name = "FILE")]
    replay: Option<PathBuf>,

    /// Stop after this many seconds (default: when the replay is exhausted)
    #[arg(short, long, value_name = "SECS")]
    duration: Option<u64>,

    /// Print every observed frame in candump format
    #[arg(long)]
    raw: bool,

    /// Request the battery state of health once connected
    #[arg(long)]
    soh: bool,

    /// Log broker messages for every telemetry change
    #[arg(long)]
    publish: bool,

    /// Report this link signal strength (dBm) as a manual field update
    #[arg(long, value_name = "DBM", allow_hyphen_values = true)]
    rssi: Option<i32>,

    /// Pretty-print JSON snapshots
    #[arg(long)]
    pretty: bool,

    /// Verbosity level (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    quiet: bool,
}

/// Broker client stand-in that writes messages to the log
struct LogPublisher;

impl BrokerPublisher for LogPublisher {
    fn publish(&self, topic: &str, payload: &str) -> bool {
        log::info!("publish {} = {}", topic, payload);
        true
    }
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    init_logging(args.verbose, args.quiet);

    log::info!("OBD Monitor CLI v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Using monitor library v{}", obd_monitor::VERSION);

    let mut config = match &args.config {
        Some(path) => {
            log::info!("Loading configuration from: {:?}", path);
            config::load_config(path)?
        }
        None => AppConfig::default(),
    };
    apply_overrides(&mut config, &args);

    let Some(replay_path) = config.replay.file.clone() else {
        println!("OBD Monitor - No input specified");
        println!("\nQuick Start:");
        println!("  obd-monitor-cli --replay drive.log");
        println!("  obd-monitor-cli --replay drive.log --raw --soh");
        println!("  obd-monitor-cli --config config.toml");
        println!("\nUse --help for more options");
        return Ok(());
    };

    replay_mode(&config, &args, replay_path)
}

/// Command-line flags take precedence over the config file
fn apply_overrides(config: &mut AppConfig, args: &Args) {
    if let Some(path) = &args.replay {
        config.replay.file = Some(path.clone());
    }
    if args.raw {
        config.output.raw = true;
    }
    if args.pretty {
        config.output.pretty = true;
    }
    if args.publish {
        config.monitor.publish.enabled = true;
    }
}

/// Replay mode - run the engine over a recorded capture
fn replay_mode(config: &AppConfig, args: &Args, path: PathBuf) -> Result<()> {
    let transport = ReplayTransport::from_candump(&path)
        .with_context(|| format!("Failed to load candump log: {:?}", path))?
        .with_loops(config.replay.loops)
        .with_restamp(config.replay.restamp);
    let transport = Arc::new(transport);

    let monitor = ObdMonitor::new(transport.clone(), config.monitor.clone());

    let pretty = config.output.pretty;
    monitor.add_telemetry_observer(move |snapshot: &VehicleTelemetry| {
        print_snapshot(snapshot, pretty)
    });

    if config.output.raw {
        let interface = config.output.interface.clone();
        monitor.add_raw_observer(move |frame: &RawFrame| {
            println!("{}", format_line(frame, &interface))
        });
        monitor.start_raw_capture();
    }

    if config.monitor.publish.enabled {
        monitor.set_publisher(LogPublisher);
    }

    monitor.start().context("Failed to start monitor")?;
    log::info!("Status: {}", monitor.connection_status());

    if let Some(rssi) = args.rssi {
        monitor
            .set_field("rssi", &rssi.to_string())
            .context("Failed to set signal strength")?;
    }

    if args.soh {
        match monitor.request_state_of_health() {
            Some(soh) => log::info!("Battery state of health: {:.2}%", soh),
            None => log::warn!("State of health request failed"),
        }
    }

    let deadline = args
        .duration
        .map(|secs| Instant::now() + Duration::from_secs(secs));
    while !transport.is_exhausted() && deadline.map_or(true, |d| Instant::now() < d) {
        thread::sleep(Duration::from_millis(50));
    }

    // Give the worker a final pass to notify observers
    thread::sleep(config.monitor.loop_sleep() * 2);
    monitor.stop();

    log::info!(
        "Replay finished: {} frames processed, {} injected frames dropped",
        monitor.frames_seen(),
        monitor.dropped_frames()
    );
    print_snapshot(&monitor.snapshot(), pretty);

    Ok(())
}

fn print_snapshot(snapshot: &VehicleTelemetry, pretty: bool) {
    let rendered = if pretty {
        serde_json::to_string_pretty(snapshot)
    } else {
        serde_json::to_string(snapshot)
    };

    match rendered {
        Ok(json) => println!("{}", json),
        Err(e) => log::error!("Failed to serialize telemetry: {}", e),
    }
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_config() {
        let args = Args::parse_from([
            "obd-monitor-cli",
            "--replay",
            "drive.log",
            "--raw",
            "--publish",
            "--rssi",
            "-67",
        ]);
        let mut config = AppConfig::default();
        apply_overrides(&mut config, &args);

        assert_eq!(config.replay.file, Some(PathBuf::from("drive.log")));
        assert!(config.output.raw);
        assert!(config.monitor.publish.enabled);
        assert_eq!(args.rssi, Some(-67));
    }

    #[test]
    fn test_replay_mode_runs_capture() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "(1.000) can0 1FFF0120#0102030000000000").unwrap();
        writeln!(file, "(1.010) can0 348#A0").unwrap();

        let args = Args::parse_from(["obd-monitor-cli", "--duration", "2"]);
        let mut config = AppConfig::default();
        config.monitor.loop_sleep_ms = 5;
        config.monitor.receive_timeout_ms = 5;
        config.monitor.frames_per_cycle = 4;

        replay_mode(&config, &args, file.path().to_path_buf()).unwrap();
    }
}
