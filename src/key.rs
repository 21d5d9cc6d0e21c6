//! Decoded pad state.
//!
//! [`ControllerKey`] is the vocabulary every layer above the report decoder
//! speaks: the decoder produces it, the poller caches it, and the aggregator
//! merges it with keyboard and gamepad input.
//!
//! ## Conventions
//! - [`ControllerKey::STATIONARY`] is the empty set ("nothing held").
//! - The four direction bits come first and are covered by [`ControllerKey::DIRECTIONS`].
//! - Buttons are independent bits; any combination may be held at once.
//!
//! "No device attached" is **not** a key value. It is expressed one level up by
//! [`PadState::Disconnected`] so callers can tell "no input" from "no device".

use bitflags::bitflags;
use std::fmt;

bitflags! {
    /// Bit set of held directions and buttons.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct ControllerKey: u16 {
        const RIGHT  = 0x0001;
        const LEFT   = 0x0002;
        const UP     = 0x0004;
        const DOWN   = 0x0008;
        const SELECT = 0x0010;
        const START  = 0x0020;
        const B      = 0x0040;
        const A      = 0x0080;
    }
}

impl ControllerKey {
    /// No direction and no button held.
    pub const STATIONARY: Self = Self::empty();

    /// Mask over the four direction bits.
    pub const DIRECTIONS: Self = Self::RIGHT
        .union(Self::LEFT)
        .union(Self::UP)
        .union(Self::DOWN);

    /// Mask over the four button bits.
    pub const BUTTONS: Self = Self::SELECT
        .union(Self::START)
        .union(Self::B)
        .union(Self::A);

    /// Direction bits only.
    #[inline]
    pub fn directions(self) -> Self {
        self & Self::DIRECTIONS
    }

    /// Button bits only.
    #[inline]
    pub fn buttons(self) -> Self {
        self & Self::BUTTONS
    }

    #[inline]
    pub fn is_stationary(self) -> bool {
        self.is_empty()
    }

    /// Collapse opposing directions: Left beats Right, Up beats Down.
    ///
    /// Buttons pass through untouched.
    pub fn resolve_directions(self) -> Self {
        let mut out = self.buttons();

        if self.contains(Self::LEFT) {
            out |= Self::LEFT;
        } else if self.contains(Self::RIGHT) {
            out |= Self::RIGHT;
        }

        if self.contains(Self::UP) {
            out |= Self::UP;
        } else if self.contains(Self::DOWN) {
            out |= Self::DOWN;
        }

        out
    }
}

impl fmt::Display for ControllerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("Stationary");
        }
        let mut first = true;
        for (name, _) in self.iter_names() {
            if !first {
                f.write_str("|")?;
            }
            first = false;
            f.write_str(name)?;
        }
        Ok(())
    }
}

/// Pad state as seen by consumers: either no device, or a decoded key set.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum PadState {
    /// No pad attached (or the last exchange failed).
    #[default]
    Disconnected,
    /// Pad attached; the key set may be [`ControllerKey::STATIONARY`].
    Connected(ControllerKey),
}

impl PadState {
    #[inline]
    pub fn is_connected(self) -> bool {
        matches!(self, PadState::Connected(_))
    }

    /// Key set contributed to the aggregate. Disconnected pads contribute nothing.
    #[inline]
    pub fn keys(self) -> ControllerKey {
        match self {
            PadState::Connected(k) => k,
            PadState::Disconnected => ControllerKey::STATIONARY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_mask_covers_first_four_bits() {
        assert_eq!(ControllerKey::DIRECTIONS.bits(), 0x000F);
        assert_eq!(ControllerKey::BUTTONS.bits(), 0x00F0);
        assert!((ControllerKey::DIRECTIONS & ControllerKey::BUTTONS).is_empty());
    }

    #[test]
    fn left_and_up_win_ties() {
        let all = ControllerKey::all();
        let resolved = all.resolve_directions();
        assert_eq!(
            resolved,
            ControllerKey::LEFT | ControllerKey::UP | ControllerKey::BUTTONS
        );

        let right_down = ControllerKey::RIGHT | ControllerKey::DOWN | ControllerKey::A;
        assert_eq!(right_down.resolve_directions(), right_down);
    }

    #[test]
    fn disconnected_is_not_stationary() {
        assert_ne!(PadState::Disconnected, PadState::Connected(ControllerKey::STATIONARY));
        assert_eq!(PadState::Disconnected.keys(), ControllerKey::STATIONARY);
        assert!(!PadState::Disconnected.is_connected());
    }

    #[test]
    fn display_lists_held_keys() {
        assert_eq!(ControllerKey::STATIONARY.to_string(), "Stationary");
        assert_eq!((ControllerKey::LEFT | ControllerKey::A).to_string(), "LEFT|A");
    }
}
