//! Crate-wide error type.
//!
//! Most failures never reach game code: the session turns them into a
//! `Disconnected` state. `DeviceError` is what the lower layers hand the
//! session, and what construction/config helpers return to the host.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeviceError {
    /// HID backend could not be initialized or enumerated.
    #[cfg(feature = "hid")]
    #[error("HID backend error: {0}")]
    Hid(#[from] hidapi::HidError),

    /// A candidate device could not be opened.
    #[error("failed to open {path}: {reason}")]
    Open { path: String, reason: String },

    /// A candidate device opened but refused attribute retrieval.
    #[error("failed to read attributes of {path}")]
    Attributes { path: String },

    /// Capability (report length) query failed.
    #[error("failed to query capabilities of {path}")]
    Capabilities { path: String },

    /// Output write or input read failed on an open handle.
    #[error("transfer failed: {0}")]
    Transfer(String),

    /// The channel's completion worker is no longer running.
    #[error("report worker is gone")]
    WorkerGone,

    /// Device change notifications could not be set up.
    #[error("notification subscription failed: {0}")]
    Subscription(String),

    /// Gamepad subsystem could not be initialized.
    #[cfg(feature = "gamepad")]
    #[error("gamepad backend error: {0}")]
    Gamepad(String),

    #[error("config error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
