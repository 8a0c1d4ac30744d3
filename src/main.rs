//! # Ringosc Capture
//!
//! Record ring-oscillator frequencies and die temperature from a stress-test
//! rig over UART.
//!
//! Frames are read from the rig's USB-UART bridge, logged to daily files
//! under `db/` and summarized on the console. Completed daily files can be
//! committed and pushed to a git repository.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use ringosc_capture::capture::{CaptureLoop, StopToken, TracingDisplay};
use ringosc_capture::config::{Config, DiagnosticsConfig};
use ringosc_capture::frame::protocol::FrameVariant;
use ringosc_capture::serial::RigSerial;
use ringosc_capture::telemetry::archive::{GitPublisher, PublishQueue};

/// Diagnostics file name prefix; tracing-appender adds the date
const DIAGNOSTICS_FILE: &str = "ringosc-capture.log";

#[derive(Debug, Parser, Clone)]
#[clap(version, about)]
struct Args {
    /// TOML configuration file; built-in defaults are used when omitted
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// Serial device of the rig, e.g. /dev/ttyUSB1
    #[arg(short = 'p', long = "port")]
    port: Option<String>,

    /// Serial baud rate
    #[arg(short = 'b', long = "baud")]
    baud_rate: Option<u32>,

    /// Frame layout: two_channel, three_channel or four_channel
    #[arg(short = 'v', long = "variant")]
    variant: Option<FrameVariant>,

    /// Directory for the capture log files
    #[arg(short = 'd', long = "log-dir")]
    log_dir: Option<String>,

    /// Commit and push each completed log file
    #[arg(long = "archive")]
    archive: bool,
}

impl Args {
    /// Apply command-line overrides on top of the loaded configuration
    ///
    /// Returns a warning to log once tracing is up, if an override forced
    /// another setting to change.
    fn apply_to(&self, config: &mut Config) -> Option<String> {
        let mut warning = None;

        if let Some(port) = &self.port {
            config.serial.port = port.clone();
        }
        if let Some(baud_rate) = self.baud_rate {
            config.serial.baud_rate = baud_rate;
        }
        if let Some(variant) = self.variant {
            config.frame.variant = variant;
            if !config.frame.channel_labels.is_empty()
                && config.frame.channel_labels.len() != variant.oscillator_channels()
            {
                warning = Some(format!(
                    "Dropping {} channel labels that do not fit {}",
                    config.frame.channel_labels.len(),
                    variant
                ));
                config.frame.channel_labels.clear();
            }
        }
        if let Some(log_dir) = &self.log_dir {
            config.logging.log_dir = log_dir.clone();
        }
        if self.archive {
            config.archive.enabled = true;
        }
        warning
    }
}

/// Install the tracing subscriber
///
/// Logs go to stdout, or to a daily rolling file when a diagnostics
/// directory is configured. The returned guard must be held until exit so
/// buffered lines are flushed.
fn init_tracing(diagnostics: &DiagnosticsConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match diagnostics.log_dir() {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, DIAGNOSTICS_FILE);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
            None
        }
    }
}

/// Main entry point for Ringosc Capture
///
/// # Control Flow
///
/// 1. **Initialization**
///    - Parse arguments and load the configuration
///    - Set up logging with tracing subscriber
///    - Spawn the archive worker if publishing is enabled
///
/// 2. **Capture**
///    - Open the rig's serial port
///    - Read, decode, log and display frames until stopped
///    - Handle Ctrl+C for graceful shutdown
///
/// 3. **Shutdown**
///    - Close the serial port and the log file
///    - Publish anything still queued, with a bounded wait
///    - Log capture statistics
///
/// # Errors
///
/// Returns error if:
/// - The configuration cannot be loaded or is invalid
/// - The serial port cannot be opened
/// - A log file cannot be written
/// - Archival fails under the `fatal` policy
///
/// # Examples
///
/// ```bash
/// ringosc-capture --port /dev/ttyUSB0 --variant two_channel
/// ```
///
/// Expected output:
/// ```text
/// INFO ringosc_capture: Ringosc Capture v0.1.0 starting...
/// INFO ringosc_capture::serial: Connected to /dev/ttyUSB0 at 115200 baud
/// INFO ringosc_capture::telemetry::logger: Logging to file path=db/log_2025-01-21.csv
/// INFO ringosc_capture::capture::display: samples=50 3V6: 1.000050 MHz, 2V5: 2.500030 MHz
/// ```
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => Config::default(),
    };
    let override_warning = args.apply_to(&mut config);
    config.validate().context("Invalid configuration")?;

    let _guard = init_tracing(&config.diagnostics);
    info!("Ringosc Capture v{} starting...", env!("CARGO_PKG_VERSION"));
    if let Some(warning) = override_warning {
        warn!("{}", warning);
    }

    let stop = StopToken::new();
    let ctrl_c_stop = stop.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, shutting down...");
            ctrl_c_stop.cancel();
        }
    });

    let archive = if config.archive.enabled {
        info!(
            repo = %config.archive.repo_dir,
            remote = %config.archive.remote,
            branch = %config.archive.branch,
            "Archiving completed log files"
        );
        let publisher = GitPublisher::new(
            &config.archive.repo_dir,
            config.archive.remote.as_str(),
            config.archive.branch.as_str(),
        );
        Some(PublishQueue::spawn(publisher, config.archive.retry_settings()))
    } else {
        None
    };

    let display = TracingDisplay::from_config(&config.frame, &config.display);
    let capture = CaptureLoop::new(&config, display, stop, archive);

    info!("Press Ctrl+C to exit");
    let stats = capture
        .run(|| RigSerial::open(&config.serial))
        .await
        .context("Capture failed")?;

    info!(
        "Recorded {} samples from {} frames ({} dropped, {} log files)",
        stats.samples_recorded, stats.frames_read, stats.frames_dropped, stats.files_opened
    );

    Ok(())
}
