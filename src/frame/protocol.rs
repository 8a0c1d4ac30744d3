//! # Frame Protocol Constants and Types
//!
//! Wire layout of the frames streamed by the test rig.
//!
//! Every field is an unsigned 32-bit big-endian word, with no sync byte,
//! length prefix or checksum. The variant is a startup choice and is never
//! inferred from the data.

use serde::Deserialize;

/// Size of every field on the wire
pub const FIELD_SIZE: usize = 4;

/// Largest number of oscillator channels any variant carries
pub const MAX_OSCILLATOR_CHANNELS: usize = 3;

/// Kind of a single 32-bit field inside a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Ring-oscillator count in Hz
    OscillatorCount,

    /// Raw sensor temperature word (24-bit code in the upper bits)
    RawTemperature,
}

const TWO_CHANNEL_FIELDS: &[FieldKind] = &[FieldKind::OscillatorCount, FieldKind::OscillatorCount];

const THREE_CHANNEL_FIELDS: &[FieldKind] = &[
    FieldKind::OscillatorCount,
    FieldKind::OscillatorCount,
    FieldKind::RawTemperature,
];

const FOUR_CHANNEL_FIELDS: &[FieldKind] = &[
    FieldKind::OscillatorCount,
    FieldKind::OscillatorCount,
    FieldKind::OscillatorCount,
    FieldKind::RawTemperature,
];

/// Frame layout produced by the rig firmware
///
/// | Variant      | Bytes | Fields                       |
/// |--------------|-------|------------------------------|
/// | TwoChannel   | 8     | osc0, osc1                   |
/// | ThreeChannel | 12    | osc0, osc1, raw_temp24       |
/// | FourChannel  | 16    | osc0, osc1, osc2, raw_temp24 |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameVariant {
    TwoChannel,
    ThreeChannel,
    FourChannel,
}

impl FrameVariant {
    /// Ordered field kinds as they appear on the wire
    pub fn fields(self) -> &'static [FieldKind] {
        match self {
            FrameVariant::TwoChannel => TWO_CHANNEL_FIELDS,
            FrameVariant::ThreeChannel => THREE_CHANNEL_FIELDS,
            FrameVariant::FourChannel => FOUR_CHANNEL_FIELDS,
        }
    }

    /// Exact frame length in bytes
    pub fn frame_len(self) -> usize {
        self.fields().len() * FIELD_SIZE
    }

    /// Number of oscillator channels
    pub fn oscillator_channels(self) -> usize {
        self.fields()
            .iter()
            .filter(|kind| **kind == FieldKind::OscillatorCount)
            .count()
    }

    /// Whether the variant carries a raw temperature word
    pub fn has_temperature(self) -> bool {
        self.fields().contains(&FieldKind::RawTemperature)
    }

    /// Configuration name of the variant
    pub fn name(self) -> &'static str {
        match self {
            FrameVariant::TwoChannel => "two_channel",
            FrameVariant::ThreeChannel => "three_channel",
            FrameVariant::FourChannel => "four_channel",
        }
    }
}

impl std::str::FromStr for FrameVariant {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "two_channel" | "2" => Ok(FrameVariant::TwoChannel),
            "three_channel" | "3" => Ok(FrameVariant::ThreeChannel),
            "four_channel" | "4" => Ok(FrameVariant::FourChannel),
            other => Err(format!(
                "unknown frame variant '{}' (expected two_channel, three_channel or four_channel)",
                other
            )),
        }
    }
}

impl std::fmt::Display for FrameVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Field values of one decoded frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedFrame {
    /// Oscillator counts in wiring order (Hz)
    pub oscillators: Vec<u32>,

    /// Raw temperature word, present for variants that carry one
    pub raw_temperature: Option<u32>,
}
