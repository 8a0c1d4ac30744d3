//! Live display consumers of the rolling buffer

use tracing::info;

use crate::config::{DisplayConfig, FrameConfig};
use crate::telemetry::buffer::{RollingBuffer, SeriesId};

/// Consumer of the rolling buffer, driven once per recorded sample
///
/// A display that wants the capture to end (window closed, key pressed)
/// cancels its clone of the loop's [`StopToken`](super::StopToken).
#[cfg_attr(test, mockall::automock)]
pub trait DisplaySink: Send {
    /// Redraw from the current buffer contents
    fn render(&mut self, buffer: &RollingBuffer);
}

/// Headless display that logs the latest value of every series
///
/// Logs one summary line every `summary_every` renders.
#[derive(Debug, Clone)]
pub struct TracingDisplay {
    labels: Vec<String>,
    summary_every: u64,
    rendered: u64,
}

impl TracingDisplay {
    pub fn new(labels: Vec<String>, summary_every: u64) -> Self {
        Self {
            labels,
            summary_every: summary_every.max(1),
            rendered: 0,
        }
    }

    /// Build from the frame and display sections of the configuration
    pub fn from_config(frame: &FrameConfig, display: &DisplayConfig) -> Self {
        let labels = (0..frame.variant.oscillator_channels())
            .map(|i| frame.channel_label(i))
            .collect();
        Self::new(labels, display.summary_every)
    }

    /// Number of renders so far
    pub fn rendered(&self) -> u64 {
        self.rendered
    }

    /// One-line summary of the latest point in each series
    pub fn summary(&self, buffer: &RollingBuffer) -> String {
        buffer
            .series()
            .filter_map(|series| buffer.latest(series).map(|point| (series, point)))
            .map(|(series, point)| match series {
                SeriesId::Oscillator(i) => {
                    let label = self
                        .labels
                        .get(i)
                        .cloned()
                        .unwrap_or_else(|| format!("osc{}", i));
                    format!("{}: {:.6} MHz", label, point.value)
                }
                SeriesId::Temperature => format!("T: {:.2} °C", point.value),
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl DisplaySink for TracingDisplay {
    fn render(&mut self, buffer: &RollingBuffer) {
        self.rendered += 1;
        if self.rendered % self.summary_every == 0 {
            info!(samples = self.rendered, "{}", self.summary(buffer));
        }
    }
}
