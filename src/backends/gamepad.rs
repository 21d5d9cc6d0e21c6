//! Platform gamepad source (`gilrs`).
//!
//! Maps any connected gamepad onto the pad's key set:
//!
//! | gamepad                 | key                 |
//! |-------------------------|---------------------|
//! | d-pad / left stick      | directions          |
//! | South                   | `A`                 |
//! | East                    | `B`                 |
//! | Select / Start          | `SELECT` / `START`  |
//!
//! Stick deflection counts as a direction past [`STICK_THRESHOLD`]. The HID
//! pad itself is excluded by vendor/product so it is not counted twice when
//! the OS also exposes it as a gamepad.

use crate::aggregator::InputSource;
use crate::device::DeviceIdentity;
use crate::error::DeviceError;
use crate::key::ControllerKey;
use gilrs::{Axis, Button, EventType, Gamepad, Gilrs};
use tracing::{debug, info, warn};

/// Stick deflection needed to assert a direction.
pub const STICK_THRESHOLD: f32 = 0.5;

pub struct GilrsSource {
    gilrs: Gilrs,
    exclude: Option<DeviceIdentity>,
}

impl GilrsSource {
    /// Start the gamepad subsystem. Gamepads matching `exclude` are ignored.
    pub fn new(exclude: Option<DeviceIdentity>) -> Result<Self, DeviceError> {
        let gilrs = match Gilrs::new() {
            Ok(g) => g,
            Err(gilrs::Error::NotImplemented(dummy)) => {
                warn!("platform has no gamepad support; gamepad source stays idle");
                dummy
            }
            Err(e) => return Err(DeviceError::Gamepad(e.to_string())),
        };

        for (id, pad) in gilrs.gamepads() {
            debug!(?id, name = pad.name(), "gamepad present");
        }
        Ok(Self { gilrs, exclude })
    }

    fn excluded(&self, pad: &Gamepad<'_>) -> bool {
        match (self.exclude, pad.vendor_id(), pad.product_id()) {
            (Some(identity), Some(vid), Some(pid)) => identity.matches(vid, pid),
            _ => false,
        }
    }
}

impl InputSource for GilrsSource {
    fn name(&self) -> &str {
        "gilrs"
    }

    fn capture(&mut self) -> ControllerKey {
        // Pump events so gamepad state is current.
        while let Some(event) = self.gilrs.next_event() {
            match event.event {
                EventType::Connected => {
                    info!(id = ?event.id, name = self.gilrs.gamepad(event.id).name(), "gamepad connected")
                }
                EventType::Disconnected => info!(id = ?event.id, "gamepad disconnected"),
                _ => {}
            }
        }

        self.gilrs
            .gamepads()
            .filter(|(_, pad)| !self.excluded(pad))
            .fold(ControllerKey::STATIONARY, |acc, (_, pad)| acc | keys_of(&pad))
    }
}

fn keys_of(pad: &Gamepad<'_>) -> ControllerKey {
    let mut keys = ControllerKey::STATIONARY;
    let x = pad.value(Axis::LeftStickX);
    // Up is positive.
    let y = pad.value(Axis::LeftStickY);

    if pad.is_pressed(Button::DPadRight) || x >= STICK_THRESHOLD {
        keys |= ControllerKey::RIGHT;
    }
    if pad.is_pressed(Button::DPadLeft) || x <= -STICK_THRESHOLD {
        keys |= ControllerKey::LEFT;
    }
    if pad.is_pressed(Button::DPadUp) || y >= STICK_THRESHOLD {
        keys |= ControllerKey::UP;
    }
    if pad.is_pressed(Button::DPadDown) || y <= -STICK_THRESHOLD {
        keys |= ControllerKey::DOWN;
    }
    if pad.is_pressed(Button::Select) {
        keys |= ControllerKey::SELECT;
    }
    if pad.is_pressed(Button::Start) {
        keys |= ControllerKey::START;
    }
    if pad.is_pressed(Button::East) {
        keys |= ControllerKey::B;
    }
    if pad.is_pressed(Button::South) {
        keys |= ControllerKey::A;
    }
    keys
}
