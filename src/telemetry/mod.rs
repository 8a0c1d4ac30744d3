//! # Telemetry Module
//!
//! Everything that happens to a sample after it is decoded.
//!
//! This module handles:
//! - The sample type and its `; `-separated log record format
//! - Writing records to daily rotating log files
//! - Handing completed files to an archive publisher
//! - The bounded rolling history shown on the live display

pub mod archive;
pub mod buffer;
pub mod logger;
pub mod sample;
