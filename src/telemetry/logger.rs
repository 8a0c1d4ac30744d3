//! # Rotating Log Writer
//!
//! Appends one text record per sample to a date-named file.
//!
//! The rotator does not track the date itself. On every record it derives
//! the path the sample belongs in and reopens when that path differs from
//! the open one or no longer exists on disk. The same check covers the
//! first record, a midnight rollover and a file removed underneath us.

use chrono::NaiveDateTime;
use serde::Deserialize;
use std::fs::{self, File, OpenOptions};
use std::io::{LineWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

use super::archive::ArchiveSender;
use super::sample::Sample;
use crate::error::{CaptureError, Result};

/// How log files are named
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RotationMode {
    /// One file per calendar day: `log_<YYYY-MM-DD>.csv`
    Daily,

    /// One file per run, named after the start time
    Session,
}

/// Maps a sample timestamp to its log file path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogNaming {
    Daily { dir: PathBuf },
    Session { path: PathBuf },
}

impl LogNaming {
    /// Daily files under `dir`
    pub fn daily(dir: impl Into<PathBuf>) -> Self {
        LogNaming::Daily { dir: dir.into() }
    }

    /// A single file under `dir` named `<prefix>_<YYYY-MM-DD_HH-MM-SS>.csv`
    pub fn session(dir: impl AsRef<Path>, prefix: &str, started: NaiveDateTime) -> Self {
        let name = format!("{}_{}.csv", prefix, started.format("%Y-%m-%d_%H-%M-%S"));
        LogNaming::Session {
            path: dir.as_ref().join(name),
        }
    }

    /// Path of the file a sample taken at `timestamp` belongs in
    pub fn path_for(&self, timestamp: NaiveDateTime) -> PathBuf {
        match self {
            LogNaming::Daily { dir } => dir.join(format!("log_{}.csv", timestamp.format("%Y-%m-%d"))),
            LogNaming::Session { path } => path.clone(),
        }
    }
}

struct OpenLog {
    path: PathBuf,
    writer: LineWriter<File>,
}

/// Appends records to the current log file, rotating as needed
pub struct LogRotator {
    naming: LogNaming,
    current: Option<OpenLog>,
    archive: Option<ArchiveSender>,
    files_opened: u64,
}

impl std::fmt::Debug for LogRotator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogRotator")
            .field("naming", &self.naming)
            .field("current", &self.current_path())
            .field("files_opened", &self.files_opened)
            .finish_non_exhaustive()
    }
}

impl LogRotator {
    pub fn new(naming: LogNaming) -> Self {
        Self {
            naming,
            current: None,
            archive: None,
            files_opened: 0,
        }
    }

    /// Hand every file closed by a rotation to `archive`
    pub fn with_archive(mut self, archive: ArchiveSender) -> Self {
        self.archive = Some(archive);
        self
    }

    /// Path of the open log file, if any
    pub fn current_path(&self) -> Option<&Path> {
        self.current.as_ref().map(|open| open.path.as_path())
    }

    /// Number of files opened so far, including the first one
    pub fn files_opened(&self) -> u64 {
        self.files_opened
    }

    /// Append one record for `sample`
    ///
    /// # Arguments
    ///
    /// * `sample` - Sample to log; its timestamp selects the file
    /// * `format` - Serializes the sample into one line (no newline)
    ///
    /// # Errors
    ///
    /// Returns `CaptureError::FileIo` if the file cannot be created, opened
    /// or written. The open handle, if any, is kept so `close` can still
    /// release it.
    pub fn record<F>(&mut self, sample: &Sample, format: F) -> Result<()>
    where
        F: FnOnce(&Sample) -> String,
    {
        let expected = self.naming.path_for(sample.timestamp());

        let mut open = match self.current.take() {
            Some(open) if open.path == expected && expected.exists() => open,
            previous => self.rotate(previous, expected)?,
        };

        let line = format(sample);
        let written = writeln!(open.writer, "{}", line).map_err(|source| CaptureError::FileIo {
            path: open.path.clone(),
            source,
        });
        self.current = Some(open);
        written
    }

    /// Flush and release the open file
    ///
    /// Safe to call more than once.
    pub fn close(&mut self) -> Result<()> {
        match self.current.take() {
            Some(mut open) => {
                debug!(path = %open.path.display(), "Closing log file");
                open.writer.flush().map_err(|source| CaptureError::FileIo {
                    path: open.path,
                    source,
                })
            }
            None => Ok(()),
        }
    }

    fn rotate(&mut self, previous: Option<OpenLog>, expected: PathBuf) -> Result<OpenLog> {
        if let Some(mut old) = previous {
            if let Err(e) = old.writer.flush() {
                warn!(path = %old.path.display(), "Failed to flush log file on rotation: {}", e);
            }
            drop(old.writer);

            if old.path == expected {
                warn!(path = %expected.display(), "Log file disappeared, recreating");
            } else if let Some(archive) = &self.archive {
                if let Err(e) = archive.submit(old.path) {
                    error!("{}", e);
                }
            }
        }

        if let Some(parent) = expected.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| CaptureError::FileIo {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&expected)
            .map_err(|source| CaptureError::FileIo {
                path: expected.clone(),
                source,
            })?;

        self.files_opened += 1;
        info!(path = %expected.display(), "Logging to file");

        Ok(OpenLog {
            path: expected,
            writer: LineWriter::new(file),
        })
    }
}
