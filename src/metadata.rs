//! Device metadata snapshot.
//!
//! [`DeviceMeta`] is a lightweight, cloneable description of the located pad,
//! suitable for logging and diagnostics. Backends populate what they know;
//! unknown fields remain `None`.
//!
//! ## Persistence notes
//! - `vid`/`pid` and `serial_number` (when present) are stable across reconnects.
//! - `path` may change across ports, drivers and reconnects; treat it as
//!   diagnostic first, identity second.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Snapshot of metadata describing the pad.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceMeta {
    /// High-level bus classification (e.g. `"usb"`, `"bluetooth"`).
    pub bus: Option<String>,

    pub vid: Option<u16>,
    pub pid: Option<u16>,

    /// Human-readable product name from the firmware/OS.
    pub product_string: Option<String>,

    pub manufacturer_string: Option<String>,

    pub serial_number: Option<String>,

    /// HID interface index. Some stacks report `-1` for "not applicable"; that maps to `None`.
    pub interface_number: Option<i32>,

    /// OS/topological path (opaque, platform-specific).
    pub path: Option<String>,
}

impl fmt::Display for DeviceMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.product_string.as_deref().unwrap_or("Unknown pad");
        match (self.vid, self.pid) {
            (Some(v), Some(p)) => write!(f, "{name} ({v:04x}:{p:04x})"),
            _ => f.write_str(name),
        }
    }
}
