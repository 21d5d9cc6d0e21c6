//! Host-scripted pad.
//!
//! [`VirtualPad`] stands in for the hardware pad: the host (or a test) plugs
//! it, unplugs it and sets keys directly. Clones share state, so one clone
//! can sit inside an [`InputAggregator`](crate::aggregator::InputAggregator)
//! while another drives it.

use crate::aggregator::{InputSource, PadSource};
use crate::key::{ControllerKey, PadState};
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Clone, Debug, Default)]
pub struct VirtualPad {
    state: Arc<Mutex<PadState>>,
}

impl VirtualPad {
    /// A pad that starts unplugged.
    pub fn new() -> Self {
        Self::default()
    }

    /// A pad that starts plugged in with nothing held.
    pub fn connected() -> Self {
        let pad = Self::new();
        pad.plug();
        pad
    }

    pub fn plug(&self) {
        let mut state = self.state.lock();
        if !state.is_connected() {
            *state = PadState::Connected(ControllerKey::STATIONARY);
        }
    }

    pub fn unplug(&self) {
        *self.state.lock() = PadState::Disconnected;
    }

    /// Replace the held keys. Ignored while unplugged.
    pub fn set(&self, keys: ControllerKey) {
        let mut state = self.state.lock();
        if state.is_connected() {
            *state = PadState::Connected(keys);
        }
    }

    pub fn press(&self, keys: ControllerKey) {
        let current = self.state();
        self.set(current.keys() | keys);
    }

    pub fn release(&self, keys: ControllerKey) {
        let current = self.state();
        self.set(current.keys() - keys);
    }

    pub fn state(&self) -> PadState {
        *self.state.lock()
    }
}

impl PadSource for VirtualPad {
    fn get_state(&mut self) -> PadState {
        self.state()
    }
}

impl InputSource for VirtualPad {
    fn name(&self) -> &str {
        "virtual"
    }

    fn capture(&mut self) -> ControllerKey {
        self.state().keys()
    }
}
