//! # Capture Module
//!
//! The acquisition loop: read a frame, decode it, compensate the
//! temperature, log the sample, buffer it and drive the display.
//!
//! Lifecycle: `Connecting → Running → Draining → Closed`. Every exit path
//! goes through `Draining`, which releases the transport, the log file and
//! the archive worker.

pub mod display;

use chrono::NaiveDateTime;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::compensation::Calibration;
use crate::config::Config;
use crate::error::{CaptureError, Result};
use crate::frame::decoder::decode_frame;
use crate::frame::protocol::FrameVariant;
use crate::serial::port_trait::FrameTransport;
use crate::telemetry::archive::PublishQueue;
use crate::telemetry::buffer::{RollingBuffer, SeriesId};
use crate::telemetry::logger::{LogNaming, LogRotator, RotationMode};
use crate::telemetry::sample::{format_record, Sample};

pub use display::{DisplaySink, TracingDisplay};

/// Shared cancellation flag
///
/// Clones share one flag. The loop polls it once per iteration, so a read
/// already in flight completes (or times out) before the stop is seen.
#[derive(Debug, Clone, Default)]
pub struct StopToken {
    cancelled: Arc<AtomicBool>,
}

impl StopToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request the capture loop to stop
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Lifecycle state of a [`CaptureLoop`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Connecting,
    Running,
    Draining,
    Closed,
}

/// Counters reported when the loop closes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureStats {
    /// Reads that returned at least one byte
    pub frames_read: u64,

    /// Samples written to the log
    pub samples_recorded: u64,

    /// Reads that failed or did not decode to a frame
    pub frames_dropped: u64,

    /// Log files opened, counting the first one and every rotation
    pub files_opened: u64,
}

fn local_now() -> NaiveDateTime {
    chrono::Local::now().naive_local()
}

/// Single-threaded acquisition pipeline
pub struct CaptureLoop<D> {
    variant: FrameVariant,
    calibration: Calibration,
    read_timeout: Duration,
    render_delay: Duration,
    rotator: LogRotator,
    buffer: RollingBuffer,
    display: D,
    stop: StopToken,
    archive: Option<PublishQueue>,
    clock: fn() -> NaiveDateTime,
    started: Option<Instant>,
    state: CaptureState,
    stats: CaptureStats,
}

impl<D> std::fmt::Debug for CaptureLoop<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureLoop")
            .field("variant", &self.variant)
            .field("state", &self.state)
            .field("rotator", &self.rotator)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl<D: DisplaySink> CaptureLoop<D> {
    /// Create a capture loop stamping samples with the local wall clock
    ///
    /// # Arguments
    ///
    /// * `config` - Validated configuration
    /// * `display` - Consumer driven once per recorded sample
    /// * `stop` - Cancellation flag shared with the display and signal handler
    /// * `archive` - Publish queue for closed log files, if archival is enabled
    pub fn new(config: &Config, display: D, stop: StopToken, archive: Option<PublishQueue>) -> Self {
        Self::with_clock(config, display, stop, archive, local_now)
    }

    /// Same as [`CaptureLoop::new`] with a custom sample clock
    pub fn with_clock(
        config: &Config,
        display: D,
        stop: StopToken,
        archive: Option<PublishQueue>,
        clock: fn() -> NaiveDateTime,
    ) -> Self {
        let naming = match config.logging.rotation {
            RotationMode::Daily => LogNaming::daily(&config.logging.log_dir),
            RotationMode::Session => {
                LogNaming::session(&config.logging.log_dir, &config.logging.session_prefix, clock())
            }
        };

        let mut rotator = LogRotator::new(naming);
        if let Some(queue) = &archive {
            rotator = rotator.with_archive(queue.sender());
        }

        Self {
            variant: config.frame.variant,
            calibration: config.calibration,
            read_timeout: config.serial.timeout(),
            render_delay: config.display.render_delay(),
            rotator,
            buffer: RollingBuffer::new(config.display.capacity),
            display,
            stop,
            archive,
            clock,
            started: None,
            state: CaptureState::Connecting,
            stats: CaptureStats::default(),
        }
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    /// Run until stopped or a fatal error occurs
    ///
    /// # Arguments
    ///
    /// * `connect` - Opens the transport; called exactly once
    ///
    /// # Returns
    ///
    /// * `Result<CaptureStats>` - Counters on a clean stop
    ///
    /// # Errors
    ///
    /// Returns `CaptureError::TransportConnect` (or whatever `connect`
    /// returned) if the transport cannot be opened, `CaptureError::FileIo`
    /// if a record cannot be written and `CaptureError::Publish` if
    /// archival fails under the fatal policy. Resources are released before
    /// any error is returned.
    pub async fn run<T, F>(mut self, connect: F) -> Result<CaptureStats>
    where
        T: FrameTransport,
        F: FnOnce() -> Result<T>,
    {
        let mut transport = match connect() {
            Ok(transport) => transport,
            Err(e) => {
                error!("Failed to open transport: {}", e);
                self.drain_archive().await;
                self.transition(CaptureState::Closed);
                return Err(e);
            }
        };

        self.transition(CaptureState::Running);
        self.started = Some(Instant::now());
        info!(variant = %self.variant, frame_len = self.variant.frame_len(), "Capture started");

        let outcome = self.run_until_stopped(&mut transport).await;

        self.transition(CaptureState::Draining);
        self.drain(&mut transport).await;
        self.transition(CaptureState::Closed);

        info!(
            frames_read = self.stats.frames_read,
            samples_recorded = self.stats.samples_recorded,
            frames_dropped = self.stats.frames_dropped,
            files_opened = self.stats.files_opened,
            "Capture closed"
        );

        outcome.map(|()| self.stats)
    }

    async fn run_until_stopped<T: FrameTransport>(&mut self, transport: &mut T) -> Result<()> {
        while !self.stop.is_cancelled() {
            if let Err(e) = self.step(transport).await {
                error!("Capture aborted: {}", e);
                return Err(e);
            }
        }

        info!("Stop requested");
        Ok(())
    }

    /// One iteration: at most one sample
    async fn step<T: FrameTransport>(&mut self, transport: &mut T) -> Result<()> {
        if let Some(err) = self.archive.as_mut().and_then(PublishQueue::take_fatal) {
            return Err(err);
        }

        let frame_len = self.variant.frame_len();
        let read_started = Instant::now();
        let bytes = match transport.read_frame(frame_len, self.read_timeout).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("{}", CaptureError::FrameRead(e));
                self.stats.frames_dropped += 1;
                self.back_off(read_started).await;
                return Ok(());
            }
        };

        // Nothing arrived: timeout, or end of stream on a dead port
        if bytes.is_empty() {
            self.back_off(read_started).await;
            return Ok(());
        }
        self.stats.frames_read += 1;

        let Some(frame) = decode_frame(&bytes, self.variant) else {
            debug!(len = bytes.len(), expected = frame_len, "Dropping incomplete frame");
            self.stats.frames_dropped += 1;
            return Ok(());
        };

        let temperature = frame.raw_temperature.map(|raw| self.calibration.compensate(raw));
        let sample = Sample::new((self.clock)(), frame.oscillators, temperature);

        self.rotator.record(&sample, format_record)?;
        self.stats.samples_recorded += 1;

        self.push_sample(&sample);
        self.display.render(&self.buffer);

        if !self.render_delay.is_zero() {
            tokio::time::sleep(self.render_delay).await;
        }

        Ok(())
    }

    /// Wait out the rest of the read timeout after a read that produced nothing
    ///
    /// A failing or closed port returns at once; without this the loop would
    /// spin on it.
    async fn back_off(&self, read_started: Instant) {
        let remaining = self.read_timeout.saturating_sub(read_started.elapsed());
        if !remaining.is_zero() {
            tokio::time::sleep(remaining).await;
        }
    }

    fn push_sample(&mut self, sample: &Sample) {
        let elapsed = self.started.map_or(0.0, |started| started.elapsed().as_secs_f64());

        for (i, &hz) in sample.oscillators().iter().enumerate() {
            self.buffer.push(SeriesId::Oscillator(i), elapsed, f64::from(hz) / 1e6);
        }
        if let Some(celsius) = sample.temperature_celsius() {
            self.buffer.push(SeriesId::Temperature, elapsed, celsius);
        }
    }

    /// Release everything; each step runs even if an earlier one failed
    async fn drain<T: FrameTransport>(&mut self, transport: &mut T) {
        if let Err(e) = transport.close().await {
            warn!("Failed to close transport: {}", e);
        }

        if let Err(e) = self.rotator.close() {
            error!("{}", e);
        }
        self.stats.files_opened = self.rotator.files_opened();

        self.drain_archive().await;
    }

    async fn drain_archive(&mut self) {
        if let Some(queue) = self.archive.take() {
            queue.shutdown().await;
        }
    }

    fn transition(&mut self, next: CaptureState) {
        debug!(from = ?self.state, to = ?next, "Capture state change");
        self.state = next;
    }
}
