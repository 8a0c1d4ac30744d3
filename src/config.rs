//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.
//!
//! Every section and field has a default, so an empty file (or no file at
//! all) describes the standard four-channel rig on `/dev/ttyUSB1`.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::compensation::Calibration;
use crate::error::{CaptureError, Result};
use crate::frame::protocol::FrameVariant;
use crate::telemetry::archive::{FailurePolicy, RetrySettings};
use crate::telemetry::logger::RotationMode;

/// Baud rates accepted for the rig link
pub const SUPPORTED_BAUD_RATES: &[u32] = &[9600, 19200, 38400, 57600, 115_200, 230_400, 460_800, 921_600];

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub serial: SerialConfig,

    #[serde(default)]
    pub frame: FrameConfig,

    #[serde(default)]
    pub calibration: Calibration,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub display: DisplayConfig,

    #[serde(default)]
    pub archive: ArchiveConfig,

    #[serde(default)]
    pub diagnostics: DiagnosticsConfig,
}

/// Serial port configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SerialConfig {
    #[serde(default = "default_serial_port")]
    pub port: String,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// DTR level; the line drives the rig's reset, so keep it low
    #[serde(default)]
    pub dtr: bool,
}

/// Frame layout configuration
#[derive(Debug, Deserialize, Clone)]
pub struct FrameConfig {
    #[serde(default = "default_variant")]
    pub variant: FrameVariant,

    /// Display names for the oscillator channels, in wiring order
    #[serde(default = "default_channel_labels")]
    pub channel_labels: Vec<String>,
}

/// Log file configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    #[serde(default = "default_rotation")]
    pub rotation: RotationMode,

    #[serde(default = "default_session_prefix")]
    pub session_prefix: String,
}

/// Live display configuration
#[derive(Debug, Deserialize, Clone)]
pub struct DisplayConfig {
    #[serde(default = "default_capacity")]
    pub capacity: usize,

    #[serde(default = "default_render_delay_ms")]
    pub render_delay_ms: u64,

    #[serde(default = "default_summary_every")]
    pub summary_every: u64,
}

/// Archive publishing configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ArchiveConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_repo_dir")]
    pub repo_dir: String,

    #[serde(default = "default_remote")]
    pub remote: String,

    #[serde(default = "default_branch")]
    pub branch: String,

    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    #[serde(default = "default_failure_policy")]
    pub failure_policy: FailurePolicy,

    #[serde(default = "default_drain_timeout_ms")]
    pub drain_timeout_ms: u64,
}

/// Diagnostic (tracing) output configuration
#[derive(Debug, Deserialize, Clone, Default)]
pub struct DiagnosticsConfig {
    /// Write diagnostics to daily files in this directory instead of stdout
    #[serde(default)]
    pub log_dir: Option<String>,
}

// Default value functions
fn default_serial_port() -> String { "/dev/ttyUSB1".to_string() }
fn default_baud_rate() -> u32 { 115_200 }
fn default_timeout_ms() -> u64 { 1000 }

fn default_variant() -> FrameVariant { FrameVariant::FourChannel }
fn default_channel_labels() -> Vec<String> {
    vec!["3V6".to_string(), "2V5".to_string(), "1V8".to_string()]
}

fn default_log_dir() -> String { "db".to_string() }
fn default_rotation() -> RotationMode { RotationMode::Daily }
fn default_session_prefix() -> String { "uart_data".to_string() }

fn default_capacity() -> usize { 100 }
fn default_render_delay_ms() -> u64 { 10 }
fn default_summary_every() -> u64 { 50 }

fn default_repo_dir() -> String { ".".to_string() }
fn default_remote() -> String { "origin".to_string() }
fn default_branch() -> String { "main".to_string() }
fn default_max_attempts() -> u32 { 3 }
fn default_retry_delay_ms() -> u64 { 5000 }
fn default_failure_policy() -> FailurePolicy { FailurePolicy::Log }
fn default_drain_timeout_ms() -> u64 { 10_000 }

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: default_serial_port(),
            baud_rate: default_baud_rate(),
            timeout_ms: default_timeout_ms(),
            dtr: false,
        }
    }
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            variant: default_variant(),
            channel_labels: default_channel_labels(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_dir: default_log_dir(),
            rotation: default_rotation(),
            session_prefix: default_session_prefix(),
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            render_delay_ms: default_render_delay_ms(),
            summary_every: default_summary_every(),
        }
    }
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            repo_dir: default_repo_dir(),
            remote: default_remote(),
            branch: default_branch(),
            max_attempts: default_max_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            failure_policy: default_failure_policy(),
            drain_timeout_ms: default_drain_timeout_ms(),
        }
    }
}

impl SerialConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl FrameConfig {
    /// Display label of oscillator channel `index`
    pub fn channel_label(&self, index: usize) -> String {
        self.channel_labels
            .get(index)
            .cloned()
            .unwrap_or_else(|| format!("osc{}", index))
    }
}

impl DisplayConfig {
    pub fn render_delay(&self) -> Duration {
        Duration::from_millis(self.render_delay_ms)
    }
}

impl ArchiveConfig {
    pub fn retry_settings(&self) -> RetrySettings {
        RetrySettings {
            max_attempts: self.max_attempts,
            retry_delay: Duration::from_millis(self.retry_delay_ms),
            policy: self.failure_policy,
            drain_timeout: Duration::from_millis(self.drain_timeout_ms),
        }
    }
}

impl DiagnosticsConfig {
    pub fn log_dir(&self) -> Option<PathBuf> {
        self.log_dir.as_deref().filter(|d| !d.is_empty()).map(PathBuf::from)
    }
}

fn invalid(message: impl std::fmt::Display) -> CaptureError {
    CaptureError::Config(toml::de::Error::custom(message))
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// * `Result<Config>` - Loaded and validated configuration
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use ringosc_capture::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns `CaptureError::Config` naming the first value out of range
    pub fn validate(&self) -> Result<()> {
        // Serial link
        if self.serial.port.is_empty() {
            return Err(invalid("serial port cannot be empty"));
        }

        if !SUPPORTED_BAUD_RATES.contains(&self.serial.baud_rate) {
            return Err(invalid(format!(
                "baud_rate must be one of: {:?}",
                SUPPORTED_BAUD_RATES
            )));
        }

        if self.serial.timeout_ms == 0 || self.serial.timeout_ms > 10000 {
            return Err(invalid("timeout_ms must be between 1 and 10000"));
        }

        // Channel labels are optional, but must cover every channel if given
        let channels = self.frame.variant.oscillator_channels();
        if !self.frame.channel_labels.is_empty() && self.frame.channel_labels.len() != channels {
            return Err(invalid(format!(
                "channel_labels has {} entries but {} carries {} oscillator channels",
                self.frame.channel_labels.len(),
                self.frame.variant,
                channels
            )));
        }

        for (name, value) in [
            ("dig_t1", self.calibration.dig_t1),
            ("dig_t2", self.calibration.dig_t2),
            ("dig_t3", self.calibration.dig_t3),
        ] {
            if !(-32768..=65535).contains(&value) {
                return Err(invalid(format!(
                    "{} must fit in 16 bits (-32768 to 65535), got {}",
                    name, value
                )));
            }
        }

        // Log files
        if self.logging.log_dir.is_empty() {
            return Err(invalid("logging log_dir cannot be empty"));
        }

        if self.logging.rotation == RotationMode::Session && self.logging.session_prefix.is_empty() {
            return Err(invalid("session_prefix cannot be empty when rotation is 'session'"));
        }

        // Display
        if self.display.capacity == 0 {
            return Err(invalid("display capacity must be greater than 0"));
        }

        if self.display.render_delay_ms > 1000 {
            return Err(invalid("render_delay_ms must be between 0 and 1000"));
        }

        if self.display.summary_every == 0 {
            return Err(invalid("summary_every must be greater than 0"));
        }

        // Archive
        if self.archive.enabled {
            if self.archive.repo_dir.is_empty() {
                return Err(invalid("archive repo_dir cannot be empty when enabled"));
            }
            if self.archive.remote.is_empty() || self.archive.branch.is_empty() {
                return Err(invalid("archive remote and branch cannot be empty when enabled"));
            }
        }

        if self.archive.max_attempts == 0 {
            return Err(invalid("max_attempts must be greater than 0"));
        }

        Ok(())
    }
}
