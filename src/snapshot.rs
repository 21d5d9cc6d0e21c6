//! Per-frame snapshot of merged input.
//!
//! [`FrameSnapshot`] is an **owned**, read-only view of every source at one
//! point in time (typically "this frame"). It is produced by
//! [`InputAggregator::poll_user_input`](crate::aggregator::InputAggregator::poll_user_input)
//! and is `Copy`, so keeping the previous frame around for edge detection is free.
//!
//! # Semantics
//! - `keyboard` is what the key map resolved from held keys.
//! - `sources` is the union of every extra [`InputSource`](crate::aggregator::InputSource).
//! - `pad` is the debounced HID pad state, `Disconnected` included.
//! - A snapshot never polls anything; it reflects the last `poll_user_input`.
//!
//! # Examples
//! ```
//! use padlink::{ControllerKey, FrameSnapshot, PadState};
//!
//! let snap = FrameSnapshot {
//!     keyboard: ControllerKey::LEFT,
//!     sources: ControllerKey::STATIONARY,
//!     pad: PadState::Connected(ControllerKey::RIGHT | ControllerKey::A),
//! };
//! assert_eq!(snap.resolved(), ControllerKey::LEFT | ControllerKey::A);
//! ```

use crate::key::{ControllerKey, PadState};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameSnapshot {
    pub keyboard: ControllerKey,
    pub sources: ControllerKey,
    pub pad: PadState,
}

impl FrameSnapshot {
    /// Raw union of all sources. Opposing directions may both be set.
    #[inline]
    pub fn combined(&self) -> ControllerKey {
        self.keyboard | self.sources | self.pad.keys()
    }

    /// Union with opposing directions collapsed (Left over Right, Up over Down).
    #[inline]
    pub fn resolved(&self) -> ControllerKey {
        self.combined().resolve_directions()
    }

    #[inline]
    pub fn directions(&self) -> ControllerKey {
        self.resolved().directions()
    }
}
