//! # Ringosc Capture Library
//!
//! Capture ring-oscillator and die-temperature telemetry from a stress-test
//! rig over UART.
//!
//! This library provides the pipeline behind the `ringosc-capture` binary:
//! fixed-length frame decoding, fixed-point temperature compensation, daily
//! rotating log files with optional git archival, and a bounded rolling
//! buffer for live display.

pub mod capture;
pub mod compensation;
pub mod config;
pub mod error;
pub mod frame;
pub mod serial;
pub mod telemetry;
