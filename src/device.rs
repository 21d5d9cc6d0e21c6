//! Device identity, capabilities, and the backend seams.
//!
//! Two traits separate the session logic from the platform:
//! - [`DeviceLocator`] finds the pad among attached HID interfaces and opens it.
//! - [`ReportTransport`] is an open handle: write an output report, read an input report.
//!
//! The `hid` feature provides [`HidLocator`](crate::backends::hid::HidLocator).
//! Hosts and tests may supply their own implementations.

use crate::error::DeviceError;
use crate::metadata::DeviceMeta;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// USB vendor/product pair selecting one controller model.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceIdentity {
    pub vendor_id: u16,
    pub product_id: u16,
}

impl DeviceIdentity {
    /// The stock pad (generic USB SNES-style controller).
    pub const SNES_PAD: DeviceIdentity = DeviceIdentity {
        vendor_id: 0x0079,
        product_id: 0x0011,
    };

    pub const fn new(vendor_id: u16, product_id: u16) -> Self {
        Self {
            vendor_id,
            product_id,
        }
    }

    #[inline]
    pub fn matches(&self, vendor_id: u16, product_id: u16) -> bool {
        self.vendor_id == vendor_id && self.product_id == product_id
    }
}

impl Default for DeviceIdentity {
    fn default() -> Self {
        Self::SNES_PAD
    }
}

impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04x}:{:04x}", self.vendor_id, self.product_id)
    }
}

/// Report sizes advertised by the device, including the report-ID byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceCapabilities {
    pub input_report_length: u16,
    pub output_report_length: u16,
}

impl Default for DeviceCapabilities {
    fn default() -> Self {
        Self {
            input_report_length: 9,
            output_report_length: 0,
        }
    }
}

/// OS interface path of a HID device.
///
/// Treated as opaque. Equality is ASCII case-insensitive because Windows
/// reports the same interface with differently-cased paths depending on the API.
#[derive(Clone, Debug, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DevicePath(String);

impl DevicePath {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl PartialEq for DevicePath {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl std::hash::Hash for DevicePath {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        for b in self.0.bytes() {
            state.write_u8(b.to_ascii_lowercase());
        }
    }
}

impl fmt::Display for DevicePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DevicePath {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Result of a successful discovery.
#[derive(Clone, Debug)]
pub struct LocatedDevice {
    pub path: DevicePath,
    pub capabilities: DeviceCapabilities,
    pub meta: DeviceMeta,
}

/// Finds and opens the pad.
pub trait DeviceLocator: Send {
    /// Enumerate attached HID interfaces and return the first one matching `identity`.
    ///
    /// `None` means "not plugged in" and is a normal outcome. Candidates that
    /// fail to open or report attributes are skipped, never fatal.
    fn find(&mut self, identity: DeviceIdentity) -> Option<LocatedDevice>;

    /// Open a read/write transport to a located device.
    fn open(&mut self, device: &LocatedDevice) -> Result<Box<dyn ReportTransport>, DeviceError>;

    /// Paths of every attached interface matching `identity`.
    ///
    /// Used by the polling notification fallback to diff presence.
    fn present_paths(&mut self, identity: DeviceIdentity) -> Vec<DevicePath>;
}

/// An open handle to the pad.
pub trait ReportTransport: Send {
    /// Write one output report. Returns bytes written.
    fn write_output(&mut self, report: &[u8]) -> Result<usize, DeviceError>;

    /// Read one input report into `buf`.
    ///
    /// `timeout == None` blocks; `Some(Duration::ZERO)` polls. `Ok(0)` means
    /// nothing arrived before the timeout.
    fn read_input(&mut self, buf: &mut [u8], timeout: Option<Duration>)
        -> Result<usize, DeviceError>;
}
