//! # Samples and Log Records
//!
//! The decoded measurement type and its one-line text form:
//!
//! ```text
//! 2025-01-21 23:59:11; 36000123; 25000456; 18000789; 28.80
//! ```

use chrono::NaiveDateTime;

use crate::compensation::centi_to_celsius;
use crate::error::{CaptureError, Result};
use crate::frame::protocol::FrameVariant;

/// Timestamp format used in log records
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Separator between record fields
pub const FIELD_SEPARATOR: &str = "; ";

/// One decoded and compensated measurement
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    timestamp: NaiveDateTime,
    oscillators: Vec<u32>,
    temperature_centi: Option<i64>,
}

impl Sample {
    /// Create a sample
    ///
    /// # Arguments
    ///
    /// * `timestamp` - Local wall-clock time the frame was received
    /// * `oscillators` - Oscillator counts in Hz, in wiring order
    /// * `temperature_centi` - Compensated temperature in centi-°C, if measured
    pub fn new(timestamp: NaiveDateTime, oscillators: Vec<u32>, temperature_centi: Option<i64>) -> Self {
        Self {
            timestamp,
            oscillators,
            temperature_centi,
        }
    }

    pub fn timestamp(&self) -> NaiveDateTime {
        self.timestamp
    }

    pub fn oscillators(&self) -> &[u32] {
        &self.oscillators
    }

    pub fn temperature_centi(&self) -> Option<i64> {
        self.temperature_centi
    }

    /// Temperature in degrees Celsius
    pub fn temperature_celsius(&self) -> Option<f64> {
        self.temperature_centi.map(centi_to_celsius)
    }
}

/// Format a sample as a log line (without the trailing newline)
///
/// Fields: timestamp, each oscillator count in Hz, then the temperature in
/// °C with two decimals when present.
pub fn format_record(sample: &Sample) -> String {
    let mut fields = Vec::with_capacity(sample.oscillators.len() + 2);
    fields.push(sample.timestamp.format(TIMESTAMP_FORMAT).to_string());
    fields.extend(sample.oscillators.iter().map(|osc| osc.to_string()));
    if let Some(celsius) = sample.temperature_celsius() {
        fields.push(format!("{:.2}", celsius));
    }
    fields.join(FIELD_SEPARATOR)
}

/// A log line parsed back into its fields
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    pub timestamp: NaiveDateTime,
    pub oscillators: Vec<u32>,
    pub temperature_celsius: Option<f64>,
}

/// Parse a log line written by [`format_record`]
///
/// # Arguments
///
/// * `line` - One record, with or without the trailing newline
/// * `variant` - Frame variant the log was captured with
///
/// # Errors
///
/// Returns `CaptureError::Record` if the field count does not match the
/// variant or a field does not parse.
pub fn parse_record(line: &str, variant: FrameVariant) -> Result<LogRecord> {
    let fields: Vec<&str> = line.trim_end().split(';').map(str::trim).collect();

    let expected = 1 + variant.oscillator_channels() + usize::from(variant.has_temperature());
    if fields.len() != expected {
        return Err(CaptureError::Record(format!(
            "expected {} fields for {}, got {}: {:?}",
            expected,
            variant,
            fields.len(),
            line
        )));
    }

    let timestamp = NaiveDateTime::parse_from_str(fields[0], TIMESTAMP_FORMAT)
        .map_err(|e| CaptureError::Record(format!("bad timestamp {:?}: {}", fields[0], e)))?;

    let osc_end = 1 + variant.oscillator_channels();
    let oscillators = fields[1..osc_end]
        .iter()
        .map(|field| {
            field
                .parse::<u32>()
                .map_err(|e| CaptureError::Record(format!("bad oscillator count {:?}: {}", field, e)))
        })
        .collect::<Result<Vec<u32>>>()?;

    let temperature_celsius = if variant.has_temperature() {
        let field = fields[osc_end];
        Some(
            field
                .parse::<f64>()
                .map_err(|e| CaptureError::Record(format!("bad temperature {:?}: {}", field, e)))?,
        )
    } else {
        None
    };

    Ok(LogRecord {
        timestamp,
        oscillators,
        temperature_celsius,
    })
}
