//! # Frame Decoder
//!
//! Decodes one fixed-size rig frame into its channel readings.

use bytes::Buf;

use super::protocol::{DecodedFrame, FieldKind, FrameVariant, MAX_OSCILLATOR_CHANNELS};

/// Decode a complete frame
///
/// # Arguments
///
/// * `frame` - Raw bytes exactly as read from the transport
/// * `variant` - Configured frame layout
///
/// # Returns
///
/// * `Option<DecodedFrame>` - Decoded fields, or `None` if the length is not
///   exactly `variant.frame_len()`
///
/// A short or long block is dropped as a whole. The decoder never searches
/// for a frame boundary inside the block, so a lost byte on the wire shifts
/// every following frame until the port is reopened.
///
/// # Examples
///
/// ```
/// use ringosc_capture::frame::decoder::decode_frame;
/// use ringosc_capture::frame::protocol::FrameVariant;
///
/// let bytes = [0x00, 0x0F, 0x42, 0x40, 0x00, 0x26, 0x25, 0xA0];
/// let frame = decode_frame(&bytes, FrameVariant::TwoChannel).unwrap();
/// assert_eq!(frame.oscillators, vec![1_000_000, 2_500_000]);
/// assert_eq!(frame.raw_temperature, None);
/// ```
pub fn decode_frame(frame: &[u8], variant: FrameVariant) -> Option<DecodedFrame> {
    if frame.len() != variant.frame_len() {
        return None;
    }

    let mut buf = frame;
    let mut oscillators = Vec::with_capacity(MAX_OSCILLATOR_CHANNELS);
    let mut raw_temperature = None;

    for kind in variant.fields() {
        let value = buf.get_u32();
        match kind {
            FieldKind::OscillatorCount => oscillators.push(value),
            FieldKind::RawTemperature => raw_temperature = Some(value),
        }
    }

    Some(DecodedFrame {
        oscillators,
        raw_temperature,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(values: &[u32]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_be_bytes()).collect()
    }

    #[test]
    fn test_decode_two_channel() {
        let bytes = words(&[1_000_000, 2_500_000]);
        let frame = decode_frame(&bytes, FrameVariant::TwoChannel).unwrap();
        assert_eq!(frame.oscillators, vec![1_000_000, 2_500_000]);
        assert_eq!(frame.raw_temperature, None);
    }

    #[test]
    fn test_decode_three_channel() {
        let bytes = words(&[11, 22, 0x0080_0000]);
        let frame = decode_frame(&bytes, FrameVariant::ThreeChannel).unwrap();
        assert_eq!(frame.oscillators, vec![11, 22]);
        assert_eq!(frame.raw_temperature, Some(0x0080_0000));
    }

    #[test]
    fn test_decode_four_channel_field_order() {
        let bytes = words(&[36_000_000, 25_000_000, 18_000_000, 0x0012_3450]);
        let frame = decode_frame(&bytes, FrameVariant::FourChannel).unwrap();
        assert_eq!(frame.oscillators, vec![36_000_000, 25_000_000, 18_000_000]);
        assert_eq!(frame.raw_temperature, Some(0x0012_3450));
    }

    #[test]
    fn test_decode_is_big_endian_and_unsigned() {
        let bytes = [0xFF, 0xFF, 0xFF, 0xFF, 0x01, 0x02, 0x03, 0x04];
        let frame = decode_frame(&bytes, FrameVariant::TwoChannel).unwrap();
        assert_eq!(frame.oscillators, vec![u32::MAX, 0x0102_0304]);
    }

    #[test]
    fn test_decode_wrong_length_is_no_sample() {
        let full = words(&[1, 2, 3, 4]);
        for variant in [
            FrameVariant::TwoChannel,
            FrameVariant::ThreeChannel,
            FrameVariant::FourChannel,
        ] {
            let len = variant.frame_len();
            assert!(decode_frame(&full[..len - 1], variant).is_none());
            assert!(decode_frame(&[], variant).is_none());
        }
        // Too long is rejected as well
        assert!(decode_frame(&full, FrameVariant::ThreeChannel).is_none());
    }

    #[test]
    fn test_decode_does_not_resynchronize() {
        // One stray byte in front: the block is still the right length, so it
        // decodes into shifted (wrong) values instead of being realigned.
        let mut bytes = vec![0xAA];
        bytes.extend_from_slice(&words(&[1_000_000, 2_500_000]));
        bytes.truncate(8);
        let frame = decode_frame(&bytes, FrameVariant::TwoChannel).unwrap();
        assert_ne!(frame.oscillators, vec![1_000_000, 2_500_000]);
        assert_eq!(frame.oscillators[0], 0xAA00_0F42);
    }
}
