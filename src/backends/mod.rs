//! Input backends for `padlink`.
//!
//! Implementations of the [`DeviceLocator`](crate::device::DeviceLocator),
//! [`DeviceNotifier`](crate::notify::DeviceNotifier) and
//! [`InputSource`](crate::aggregator::InputSource) seams.
//!
//! # Feature flags
//! - **`hid`**: `hidapi` locator and transport (default).
//! - **`gamepad`**: `gilrs` platform gamepad source.
//!
//! Windows-only glue (capability probe, `WM_DEVICECHANGE`, Raw Input keyboard)
//! is compiled on Windows regardless of features.

#[cfg(feature = "hid")]
#[cfg_attr(docsrs, doc(cfg(feature = "hid")))]
pub mod hid;

#[cfg(feature = "gamepad")]
#[cfg_attr(docsrs, doc(cfg(feature = "gamepad")))]
pub mod gamepad;

pub mod virtual_input;

#[cfg(target_os = "windows")]
#[cfg_attr(docsrs, doc(cfg(target_os = "windows")))]
pub mod windows;
