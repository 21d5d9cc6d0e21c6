#![cfg(target_os = "windows")]

//! Windows platform glue.
//!
//! - **HID probe**: attribute and capability queries on a candidate interface,
//!   used by [`HidLocator`](crate::backends::hid::HidLocator) during discovery.
//! - **Device notifications**: `WM_DEVICECHANGE` registration on a host window.
//! - **Raw Input**: keyboard `WM_INPUT` parsing into a [`KeyboardState`](crate::keyboard::KeyboardState).
//!
//! The last two need a window owned by the host application. They run inside
//! the host's message loop, never on a background thread.

pub mod device_notify;
pub mod hid_discovery;
pub mod raw_input;

pub use device_notify::{WindowNotifier, WM_DEVICECHANGE};
pub use hid_discovery::probe;
pub use raw_input::{apply_raw_input_bytes, apply_wm_input, register_keyboard};
