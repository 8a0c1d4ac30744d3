//! # Rig Frame Module
//!
//! Fixed-length binary frames streamed by the ring-oscillator test rig.
//!
//! This module handles:
//! - Frame variants (2, 3 or 4 big-endian 32-bit fields)
//! - Decoding a byte block into oscillator counts and raw temperature
//! - Encoding frames for simulated transports

pub mod protocol;
pub mod decoder;
pub mod encoder;
