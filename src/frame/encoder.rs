//! # Frame Encoder
//!
//! Builds rig frames from field values. Used to feed simulated transports.

use bytes::{BufMut, BytesMut};

use super::protocol::{DecodedFrame, FieldKind, FrameVariant};

/// Encode field values into a wire frame
///
/// # Arguments
///
/// * `frame` - Oscillator counts and optional raw temperature
/// * `variant` - Target frame layout
///
/// # Returns
///
/// * `Option<Vec<u8>>` - Frame bytes, or `None` if the number of oscillators
///   or the presence of a temperature word does not match `variant`
pub fn encode_frame(frame: &DecodedFrame, variant: FrameVariant) -> Option<Vec<u8>> {
    if frame.oscillators.len() != variant.oscillator_channels()
        || frame.raw_temperature.is_some() != variant.has_temperature()
    {
        return None;
    }

    let mut buf = BytesMut::with_capacity(variant.frame_len());
    let mut oscillators = frame.oscillators.iter();

    for kind in variant.fields() {
        match kind {
            FieldKind::OscillatorCount => buf.put_u32(*oscillators.next()?),
            FieldKind::RawTemperature => buf.put_u32(frame.raw_temperature?),
        }
    }

    Some(buf.to_vec())
}

/// Encode a two-channel frame
pub fn encode_two_channel(osc0: u32, osc1: u32) -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(FrameVariant::TwoChannel.frame_len());
    buf.put_u32(osc0);
    buf.put_u32(osc1);
    buf.to_vec()
}
