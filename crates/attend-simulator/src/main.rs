//! Desktop simulator for the attend-rs fingerprint attendance terminal.
//!
//! Runs the same terminal loop as the firmware against a simulated sensor.
//! Reports go out as real HTTP(S) requests through `reqwest`, so a local or
//! hosted server sees the same JSON the device would send.
//!
//! # Console
//!
//! | Input | Action                          |
//! |-------|---------------------------------|
//! | e     | Enroll, then type an id + Enter |
//! | m     | Match the finger on the glass   |
//! | EOF   | Quit                            |
//!
//! Build with `--features window` to see the status screen in an SDL2 window.

mod host;
mod sim_sensor;
#[cfg(feature = "window")]
mod window;

use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
#[cfg(not(feature = "window"))]
use attend_core::feedback::LogFeedback;
use attend_core::{AttendanceTerminal, Config, Feedback};
use clap::Parser;
use embassy_futures::block_on;
use log::info;

use crate::host::{HttpUplink, StdClock, StdinConsole};
use crate::sim_sensor::{SimulatedSensor, SimulationOptions};

#[derive(Parser, Debug)]
#[command(name = "attend-simulator")]
#[command(about = "Fingerprint attendance terminal running on the desktop")]
#[command(version)]
struct Args {
    /// Device configuration (JSON, same shape as the firmware's)
    #[arg(short, long, default_value = "simulator.json")]
    config: PathBuf,

    /// Empty image polls before each scan finds a finger
    #[arg(long, default_value = "0")]
    scan_failures: u32,

    /// Cut the template dump short after this many bytes
    #[arg(long)]
    stall_after: Option<usize>,

    /// Finger on the glass; different fingers never match
    #[arg(long, default_value = "1")]
    finger: u32,

    /// Pretend the WiFi link is down
    #[arg(long)]
    offline: bool,

    /// Give up waiting for a finger during enrollment after this long
    #[arg(long)]
    enroll_scan_timeout_ms: Option<u32>,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let json = std::fs::read_to_string(&args.config)
        .with_context(|| format!("reading {}", args.config.display()))?;
    let mut config = Config::from_json(&json).map_err(|e| anyhow!("{}", e))?;
    if args.enroll_scan_timeout_ms.is_some() {
        config.timing.enroll_scan_timeout_ms = args.enroll_scan_timeout_ms;
    }

    info!("Starting attend-rs simulator");
    info!("Enroll: {}", config.api.enroll_url);
    info!("Match:  {}", config.api.match_url);

    #[cfg(feature = "window")]
    let feedback = window::WindowFeedback::new("Attendance");
    #[cfg(not(feature = "window"))]
    let feedback = LogFeedback;

    run(&args, &config, feedback)
}

fn run<F: Feedback>(args: &Args, config: &Config<'_>, feedback: F) -> Result<()> {
    let sensor = SimulatedSensor::new(SimulationOptions {
        template_len: config.sensor.template_len,
        scan_failures: args.scan_failures,
        stall_after: args.stall_after,
        finger: args.finger,
    });

    let uplink = HttpUplink::new(args.offline).context("building HTTP client")?;
    let mut terminal = block_on(AttendanceTerminal::start(
        sensor,
        uplink,
        feedback,
        StdClock::new(),
        config,
    ))
    .map_err(|e| anyhow!("{}", e))?;

    info!("Press 'e' to enroll or 'm' to match");
    block_on(terminal.serve(&mut StdinConsole::new()));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_defaults() {
        let args = Args::parse_from(["attend-simulator"]);

        assert_eq!(args.config, PathBuf::from("simulator.json"));
        assert_eq!(args.scan_failures, 0);
        assert_eq!(args.stall_after, None);
        assert!(!args.offline);
    }

    #[test]
    fn test_bundled_config_parses() {
        let json = include_str!("../simulator.json");
        let config = Config::from_json(json).unwrap();

        assert_eq!(config.sensor.template_len, 512);
        assert!(config.api.match_url.ends_with("/api/fingerprint/match"));
    }
}
