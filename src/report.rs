//! Input report decoding.
//!
//! The pad answers every all-zero output report with one fixed-layout input
//! report. Offsets are counted from the first byte of the buffer as handed to
//! the decoder (the report-ID byte, when the transport keeps one, is byte 0).
//!
//! | offset | meaning                    | values                                  |
//! |--------|----------------------------|-----------------------------------------|
//! | 4      | horizontal axis            | `0x00` left, `0xFF` right, else neutral |
//! | 5      | vertical axis              | `0x00` up, `0xFF` down, else neutral    |
//! | 6      | face buttons               | `0x20` A, `0x40` B                      |
//! | 7      | system buttons             | `0x10` Select, `0x20` Start             |
//!
//! No other bits are interpreted. The axis rest value is `0x7F`.
//!
//! [`decode`] is total: a short buffer decodes as [`ControllerKey::STATIONARY`].
//! Use [`InputReport::parse`] when the failure itself is interesting.

use crate::key::ControllerKey;
use thiserror::Error;

/// Axis byte value for the left/up extreme.
pub const AXIS_MIN: u8 = 0x00;
/// Axis byte value for the right/down extreme.
pub const AXIS_MAX: u8 = 0xFF;
/// Axis byte value at rest.
pub const AXIS_NEUTRAL: u8 = 0x7F;

pub const FACE_A: u8 = 0x20;
pub const FACE_B: u8 = 0x40;
pub const SYSTEM_SELECT: u8 = 0x10;
pub const SYSTEM_START: u8 = 0x20;

/// Byte offsets of the interpreted fields inside an input report.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReportLayout {
    pub horizontal: usize,
    pub vertical: usize,
    pub face: usize,
    pub system: usize,
}

impl ReportLayout {
    /// Layout of the stock pad firmware.
    pub const V1: ReportLayout = ReportLayout {
        horizontal: 4,
        vertical: 5,
        face: 6,
        system: 7,
    };

    /// Smallest buffer that contains every interpreted field.
    pub const fn min_len(&self) -> usize {
        let mut max = self.horizontal;
        if self.vertical > max {
            max = self.vertical;
        }
        if self.face > max {
            max = self.face;
        }
        if self.system > max {
            max = self.system;
        }
        max + 1
    }
}

impl Default for ReportLayout {
    fn default() -> Self {
        Self::V1
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReportError {
    #[error("input report truncated: got {got} byte(s), need {need}")]
    Truncated { got: usize, need: usize },
}

/// The interpreted bytes of one input report.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InputReport {
    pub horizontal: u8,
    pub vertical: u8,
    pub face: u8,
    pub system: u8,
}

impl InputReport {
    /// Extract the interpreted fields.
    ///
    /// `expected_len` is the device's advertised input report length; a buffer
    /// shorter than it (or than the layout itself) is rejected.
    pub fn parse(
        bytes: &[u8],
        expected_len: usize,
        layout: &ReportLayout,
    ) -> Result<Self, ReportError> {
        let need = expected_len.max(layout.min_len());
        if bytes.len() < need {
            return Err(ReportError::Truncated {
                got: bytes.len(),
                need,
            });
        }
        Ok(Self {
            horizontal: bytes[layout.horizontal],
            vertical: bytes[layout.vertical],
            face: bytes[layout.face],
            system: bytes[layout.system],
        })
    }

    /// Map the raw fields onto key bits.
    pub fn keys(&self) -> ControllerKey {
        let mut key = ControllerKey::STATIONARY;

        match self.horizontal {
            AXIS_MIN => key |= ControllerKey::LEFT,
            AXIS_MAX => key |= ControllerKey::RIGHT,
            _ => {}
        }
        match self.vertical {
            AXIS_MIN => key |= ControllerKey::UP,
            AXIS_MAX => key |= ControllerKey::DOWN,
            _ => {}
        }

        if self.face & FACE_A != 0 {
            key |= ControllerKey::A;
        }
        if self.face & FACE_B != 0 {
            key |= ControllerKey::B;
        }
        if self.system & SYSTEM_SELECT != 0 {
            key |= ControllerKey::SELECT;
        }
        if self.system & SYSTEM_START != 0 {
            key |= ControllerKey::START;
        }

        key
    }
}

/// Decode a raw input report with the stock layout. Never fails.
pub fn decode(bytes: &[u8], expected_len: usize) -> ControllerKey {
    decode_with(bytes, expected_len, &ReportLayout::V1)
}

/// [`decode`] with an explicit layout.
pub fn decode_with(bytes: &[u8], expected_len: usize, layout: &ReportLayout) -> ControllerKey {
    match InputReport::parse(bytes, expected_len, layout) {
        Ok(report) => report.keys(),
        Err(e) => {
            tracing::trace!("{e}; decoding as stationary");
            ControllerKey::STATIONARY
        }
    }
}
