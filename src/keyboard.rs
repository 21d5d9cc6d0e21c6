//! Keyboard input source.
//!
//! Keys are identified by hardware scancode plus the extended (E0/E1) flag,
//! packed into a [`KeyCode`]. This is layout-independent and matches what
//! Windows Raw Input delivers; hosts on other platforms translate their own
//! key events into scancodes before feeding [`KeyboardState`].
//!
//! [`KeyMap`] binds each [`ControllerKey`] bit to any number of key codes.

use crate::key::ControllerKey;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Packed keyboard key identity.
///
/// Layout:
/// - low 15 bits = scancode
/// - high bit    = extended flag
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyCode(pub u16);

impl KeyCode {
    pub const ESCAPE: KeyCode = KeyCode::from_scancode(0x01, false);
    pub const ENTER: KeyCode = KeyCode::from_scancode(0x1C, false);
    pub const Z: KeyCode = KeyCode::from_scancode(0x2C, false);
    pub const X: KeyCode = KeyCode::from_scancode(0x2D, false);
    pub const RIGHT_SHIFT: KeyCode = KeyCode::from_scancode(0x36, false);
    pub const SPACE: KeyCode = KeyCode::from_scancode(0x39, false);
    pub const ARROW_UP: KeyCode = KeyCode::from_scancode(0x48, true);
    pub const ARROW_LEFT: KeyCode = KeyCode::from_scancode(0x4B, true);
    pub const ARROW_RIGHT: KeyCode = KeyCode::from_scancode(0x4D, true);
    pub const ARROW_DOWN: KeyCode = KeyCode::from_scancode(0x50, true);

    #[inline]
    pub const fn from_scancode(scancode: u16, is_extended: bool) -> Self {
        let mut idx = scancode & 0x7FFF;
        if is_extended {
            idx |= 0x8000;
        }
        KeyCode(idx)
    }

    #[inline]
    pub const fn scancode(self) -> u16 {
        self.0 & 0x7FFF
    }

    #[inline]
    pub const fn is_extended(self) -> bool {
        self.0 & 0x8000 != 0
    }
}

impl fmt::Display for KeyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_extended() {
            write!(f, "key_E0{:02X}", self.scancode())
        } else {
            write!(f, "key_{:02X}", self.scancode())
        }
    }
}

/// Set of currently held keys, fed by the host's key events.
#[derive(Clone, Debug, Default)]
pub struct KeyboardState {
    held: HashSet<KeyCode>,
}

impl KeyboardState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn press(&mut self, key: KeyCode) {
        self.held.insert(key);
    }

    pub fn release(&mut self, key: KeyCode) {
        self.held.remove(&key);
    }

    /// Apply one make (`down == true`) or break event.
    pub fn set(&mut self, key: KeyCode, down: bool) {
        if down {
            self.press(key);
        } else {
            self.release(key);
        }
    }

    /// Release everything, e.g. when the host window loses focus.
    pub fn clear(&mut self) {
        self.held.clear();
    }

    #[inline]
    pub fn is_held(&self, key: KeyCode) -> bool {
        self.held.contains(&key)
    }

    pub fn held(&self) -> impl Iterator<Item = KeyCode> + '_ {
        self.held.iter().copied()
    }
}

/// Key bindings per pad key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyMap {
    pub right: Vec<KeyCode>,
    pub left: Vec<KeyCode>,
    pub up: Vec<KeyCode>,
    pub down: Vec<KeyCode>,
    pub select: Vec<KeyCode>,
    pub start: Vec<KeyCode>,
    pub b: Vec<KeyCode>,
    pub a: Vec<KeyCode>,
}

impl Default for KeyMap {
    fn default() -> Self {
        Self {
            right: vec![KeyCode::ARROW_RIGHT],
            left: vec![KeyCode::ARROW_LEFT],
            up: vec![KeyCode::ARROW_UP],
            down: vec![KeyCode::ARROW_DOWN],
            select: vec![KeyCode::RIGHT_SHIFT],
            start: vec![KeyCode::ENTER],
            b: vec![KeyCode::X],
            a: vec![KeyCode::Z, KeyCode::SPACE],
        }
    }
}

impl KeyMap {
    /// Every binding, in `ControllerKey` bit order.
    pub fn bindings(&self) -> [(ControllerKey, &[KeyCode]); 8] {
        [
            (ControllerKey::RIGHT, self.right.as_slice()),
            (ControllerKey::LEFT, self.left.as_slice()),
            (ControllerKey::UP, self.up.as_slice()),
            (ControllerKey::DOWN, self.down.as_slice()),
            (ControllerKey::SELECT, self.select.as_slice()),
            (ControllerKey::START, self.start.as_slice()),
            (ControllerKey::B, self.b.as_slice()),
            (ControllerKey::A, self.a.as_slice()),
        ]
    }

    /// Pad keys asserted by the held keyboard keys. Opposing directions are not resolved here.
    pub fn resolve(&self, keyboard: &KeyboardState) -> ControllerKey {
        self.bindings()
            .into_iter()
            .filter(|(_, codes)| codes.iter().any(|&c| keyboard.is_held(c)))
            .fold(ControllerKey::STATIONARY, |acc, (key, _)| acc | key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_code_packs_extended_flag() {
        let k = KeyCode::from_scancode(0x4B, true);
        assert_eq!(k, KeyCode(0x804B));
        assert_eq!(k.scancode(), 0x4B);
        assert!(k.is_extended());
        assert_eq!(k.to_string(), "key_E04B");
        // Numpad 4 shares the scancode but not the flag.
        assert_ne!(KeyCode::from_scancode(0x4B, false), KeyCode::ARROW_LEFT);
    }

    #[test]
    fn default_map_resolves_arrows_and_buttons() {
        let map = KeyMap::default();
        let mut kb = KeyboardState::new();
        assert_eq!(map.resolve(&kb), ControllerKey::STATIONARY);

        kb.press(KeyCode::ARROW_LEFT);
        kb.press(KeyCode::SPACE);
        assert_eq!(map.resolve(&kb), ControllerKey::LEFT | ControllerKey::A);

        kb.set(KeyCode::SPACE, false);
        kb.press(KeyCode::ARROW_RIGHT);
        assert_eq!(map.resolve(&kb), ControllerKey::LEFT | ControllerKey::RIGHT);

        kb.clear();
        assert_eq!(map.resolve(&kb), ControllerKey::STATIONARY);
    }

    #[test]
    fn key_map_reads_partial_toml() {
        let text = "left = [0x804B, 0x1E]\na = [0x2C]\n";
        let map: KeyMap = toml::from_str(text).expect("parse");
        assert_eq!(map.left, vec![KeyCode::ARROW_LEFT, KeyCode(0x1E)]);
        assert_eq!(map.a, vec![KeyCode::Z]);
        // Unlisted keys keep their defaults.
        assert_eq!(map.start, vec![KeyCode::ENTER]);
    }
}
