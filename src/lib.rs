//! padlink: client for a single USB HID game pad.
//!
//! Finds the pad among attached HID devices, exchanges request/response
//! reports with it without blocking the frame loop, follows unplug and replug,
//! and merges its state with keyboard and platform gamepad input.
//!
//! Data flows upward only:
//!
//! ```text
//! report::decode → channel::ReportChannel → session::ControllerSession
//!     → poller::DebouncedPoller → aggregator::InputAggregator → game code
//! ```
//!
//! # Quick start
//! ```no_run
//! use padlink::{ControllerKey, InputAggregator, PadConfig};
//!
//! # #[cfg(not(feature = "hid"))]
//! # fn main() {}
//! # #[cfg(feature = "hid")]
//! # fn main() -> Result<(), padlink::DeviceError> {
//! let config = PadConfig::default();
//! let mut input = InputAggregator::from_config(&config)?;
//! loop {
//!     input.poll_user_input();
//!     if input.is_newly_pressed(ControllerKey::START) {
//!         break;
//!     }
//! #   break;
//! }
//! # Ok(())
//! # }
//! ```

pub mod aggregator;
pub mod backends;
pub mod channel;
pub mod config;
pub mod device;
pub mod error;
pub mod key;
pub mod keyboard;
pub mod metadata;
pub mod notify;
pub mod poller;
pub mod report;
pub mod session;
pub mod snapshot;

pub use aggregator::{InputAggregator, InputSource, PadSource};
pub use backends::virtual_input::VirtualPad;
pub use channel::{ChannelOptions, KeyCell, ReportChannel};
pub use config::PadConfig;
pub use device::{
    DeviceCapabilities, DeviceIdentity, DeviceLocator, DevicePath, LocatedDevice, ReportTransport,
};
pub use error::DeviceError;
pub use key::{ControllerKey, PadState};
pub use keyboard::{KeyCode, KeyMap, KeyboardState};
pub use metadata::DeviceMeta;
pub use notify::{DeviceEvent, DeviceNotifier, EventSink, PresenceWatcher};
pub use poller::DebouncedPoller;
pub use report::{decode, InputReport, ReportError, ReportLayout};
pub use session::{ControllerSession, QueryOutcome, SessionState};
pub use snapshot::FrameSnapshot;

#[cfg(feature = "hid")]
pub use backends::hid::{HidLocator, HidOptions};
