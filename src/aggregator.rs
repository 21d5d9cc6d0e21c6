//! Input aggregation.
//!
//! [`InputAggregator`] is the surface gameplay code queries. Once per frame the
//! host calls [`InputAggregator::poll_user_input`], which captures every source
//! into a [`FrameSnapshot`]:
//! - the keyboard, through the [`KeyMap`],
//! - any extra [`InputSource`]s (platform gamepad, scripted input),
//! - the HID pad, through a [`PadSource`] (normally a [`DebouncedPoller`](crate::poller::DebouncedPoller)).
//!
//! All queries made during that frame read the captured snapshot, so they agree
//! with each other. The previous frame's snapshot is kept for edge queries.
//!
//! ## Precedence
//! Directions from all sources are merged, then opposing pairs are collapsed:
//! Left wins over Right, Up wins over Down. Buttons are a plain OR.
//!
//! There is no global instance; construct one and pass it to whatever needs input.

use crate::key::{ControllerKey, PadState};
use crate::keyboard::{KeyMap, KeyboardState};
use crate::snapshot::FrameSnapshot;
use tracing::{debug, trace};

/// A source sampled once per frame.
pub trait InputSource {
    fn name(&self) -> &str;

    /// Keys this source asserts right now.
    fn capture(&mut self) -> ControllerKey;
}

/// A pad whose state can be disconnected.
pub trait PadSource {
    fn get_state(&mut self) -> PadState;
}

pub struct InputAggregator {
    keyboard: KeyboardState,
    keymap: KeyMap,
    pad: Option<Box<dyn PadSource>>,
    sources: Vec<Box<dyn InputSource>>,
    previous: FrameSnapshot,
    current: FrameSnapshot,
    frame: u64,
}

impl Default for InputAggregator {
    fn default() -> Self {
        Self::new(KeyMap::default())
    }
}

impl InputAggregator {
    pub fn new(keymap: KeyMap) -> Self {
        Self {
            keyboard: KeyboardState::new(),
            keymap,
            pad: None,
            sources: Vec::new(),
            previous: FrameSnapshot::default(),
            current: FrameSnapshot::default(),
            frame: 0,
        }
    }

    pub fn with_pad(mut self, pad: impl PadSource + 'static) -> Self {
        self.pad = Some(Box::new(pad));
        self
    }

    pub fn add_source(&mut self, source: impl InputSource + 'static) {
        debug!(source = source.name(), "input source added");
        self.sources.push(Box::new(source));
    }

    /// Keyboard map and HID pad from `config`, plus the platform gamepad when enabled.
    ///
    /// A gamepad subsystem that fails to start is logged and skipped.
    #[cfg(feature = "hid")]
    pub fn from_config(config: &crate::config::PadConfig) -> Result<Self, crate::error::DeviceError> {
        let poller = crate::poller::DebouncedPoller::from_config(config)?;
        #[allow(unused_mut)]
        let mut aggregator = Self::new(config.keyboard.clone()).with_pad(poller);

        #[cfg(feature = "gamepad")]
        {
            use crate::backends::gamepad::GilrsSource;
            match GilrsSource::new(Some(config.device.identity())) {
                Ok(source) => aggregator.add_source(source),
                Err(e) => tracing::warn!("platform gamepad unavailable: {e}"),
            }
        }

        Ok(aggregator)
    }

    /// Held keyboard keys. The host feeds key events in here between frames.
    pub fn keyboard_mut(&mut self) -> &mut KeyboardState {
        &mut self.keyboard
    }

    pub fn keyboard(&self) -> &KeyboardState {
        &self.keyboard
    }

    pub fn keymap(&self) -> &KeyMap {
        &self.keymap
    }

    pub fn set_keymap(&mut self, keymap: KeyMap) {
        self.keymap = keymap;
    }

    /// Capture every source. Call exactly once per frame, before any query.
    pub fn poll_user_input(&mut self) {
        let keyboard = self.keymap.resolve(&self.keyboard);
        let sources = self
            .sources
            .iter_mut()
            .fold(ControllerKey::STATIONARY, |acc, s| acc | s.capture());
        let pad = self
            .pad
            .as_mut()
            .map_or(PadState::Disconnected, |p| p.get_state());

        self.previous = self.current;
        self.current = FrameSnapshot {
            keyboard,
            sources,
            pad,
        };
        self.frame += 1;

        if self.current != self.previous {
            trace!(
                frame = self.frame,
                keyboard = %keyboard,
                sources = %sources,
                ?pad,
                "input changed"
            );
        }
    }

    /// Resolved direction bits for this frame. Never both Left and Right, never both Up and Down.
    pub fn direction_keys(&self) -> ControllerKey {
        self.current.directions()
    }

    /// Every asserted key for this frame, directions resolved.
    pub fn all_keys(&self) -> ControllerKey {
        self.current.resolved()
    }

    /// Level query. `STATIONARY` asks whether nothing is held at all.
    pub fn is_pressed(&self, key: ControllerKey) -> bool {
        held(&self.current, key)
    }

    /// Edge query: held this frame but not the previous one.
    pub fn is_newly_pressed(&self, key: ControllerKey) -> bool {
        held(&self.current, key) && !held(&self.previous, key)
    }

    /// Edge query: held the previous frame but not this one.
    pub fn is_newly_released(&self, key: ControllerKey) -> bool {
        !held(&self.current, key) && held(&self.previous, key)
    }

    /// HID pad state captured this frame; `Disconnected` when no pad source is attached.
    pub fn pad_state(&self) -> PadState {
        self.current.pad
    }

    pub fn snapshot(&self) -> FrameSnapshot {
        self.current
    }

    pub fn previous_snapshot(&self) -> FrameSnapshot {
        self.previous
    }

    /// Number of `poll_user_input` calls so far.
    pub fn frame(&self) -> u64 {
        self.frame
    }
}

fn held(snap: &FrameSnapshot, key: ControllerKey) -> bool {
    let all = snap.resolved();
    if key.is_empty() {
        all.is_empty()
    } else {
        all.contains(key)
    }
}
