//! `hidapi` backend.
//!
//! [`HidLocator`] enumerates HID interfaces through a shared [`HidApi`] and
//! opens the pad as a [`HidTransport`]. Clones share the same `HidApi`, so the
//! session and its presence watcher can each hold one.
//!
//! ## Report IDs
//! The pad uses unnumbered reports. The HID layer strips the report-ID byte
//! (always 0) from those before handing them to us, which shifts every offset
//! by one. With `report_id_prefix` set (the default) the transport puts the 0
//! back in front so reports match the device layout.

use crate::device::{
    DeviceCapabilities, DeviceIdentity, DeviceLocator, DevicePath, LocatedDevice, ReportTransport,
};
use crate::error::DeviceError;
use crate::metadata::DeviceMeta;
use hidapi::{DeviceInfo, HidApi, HidDevice};
use parking_lot::Mutex;
use std::ffi::CString;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Backend tunables.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HidOptions {
    /// Capabilities assumed where the platform cannot report them.
    pub fallback_capabilities: DeviceCapabilities,
    pub report_id_prefix: bool,
}

impl Default for HidOptions {
    fn default() -> Self {
        Self {
            fallback_capabilities: DeviceCapabilities::default(),
            report_id_prefix: true,
        }
    }
}

impl From<&crate::config::DeviceSection> for HidOptions {
    fn from(section: &crate::config::DeviceSection) -> Self {
        Self {
            fallback_capabilities: section.fallback_capabilities,
            report_id_prefix: section.report_id_prefix,
        }
    }
}

#[derive(Clone)]
pub struct HidLocator {
    api: Arc<Mutex<HidApi>>,
    options: HidOptions,
}

impl HidLocator {
    pub fn new(options: HidOptions) -> Result<Self, DeviceError> {
        let api = HidApi::new()?;
        Ok(Self::with_api(api, options))
    }

    pub fn with_api(api: HidApi, options: HidOptions) -> Self {
        Self {
            api: Arc::new(Mutex::new(api)),
            options,
        }
    }

    pub fn options(&self) -> HidOptions {
        self.options
    }

    /// Every attached interface matching `identity`, with metadata. For diagnostics.
    pub fn list(&mut self, identity: DeviceIdentity) -> Vec<DeviceMeta> {
        let mut api = self.api.lock();
        if let Err(e) = api.refresh_devices() {
            warn!("HID enumeration failed: {e}");
            return Vec::new();
        }
        api.device_list()
            .filter(|info| identity.matches(info.vendor_id(), info.product_id()))
            .map(meta)
            .collect()
    }

    /// Confirm a candidate and read its report lengths.
    #[cfg(target_os = "windows")]
    fn probe(&self, info: &DeviceInfo, identity: DeviceIdentity) -> Option<DeviceCapabilities> {
        let path = info.path().to_string_lossy();
        match crate::backends::windows::probe(&path) {
            Ok((found, caps)) if found == identity => Some(caps),
            Ok((found, _)) => {
                debug!(%path, %found, "attribute mismatch, skipping");
                None
            }
            Err(e) => {
                debug!("skipping candidate: {e}");
                None
            }
        }
    }

    /// Without a capability query, trust the enumeration and use the fallback lengths.
    #[cfg(not(target_os = "windows"))]
    fn probe(&self, info: &DeviceInfo, _identity: DeviceIdentity) -> Option<DeviceCapabilities> {
        let caps = self.options.fallback_capabilities;
        debug!(
            path = %info.path().to_string_lossy(),
            input = caps.input_report_length,
            output = caps.output_report_length,
            "using configured report lengths"
        );
        Some(caps)
    }
}

impl DeviceLocator for HidLocator {
    fn find(&mut self, identity: DeviceIdentity) -> Option<LocatedDevice> {
        let mut api = self.api.lock();
        if let Err(e) = api.refresh_devices() {
            warn!("HID enumeration failed: {e}");
            return None;
        }

        for info in api.device_list() {
            if !identity.matches(info.vendor_id(), info.product_id()) {
                continue;
            }
            let Some(capabilities) = self.probe(info, identity) else {
                continue;
            };
            let path = DevicePath::new(info.path().to_string_lossy());
            trace!(%path, "pad located");
            return Some(LocatedDevice {
                path,
                capabilities,
                meta: meta(info),
            });
        }
        None
    }

    fn open(&mut self, device: &LocatedDevice) -> Result<Box<dyn ReportTransport>, DeviceError> {
        let c_path = CString::new(device.path.as_str()).map_err(|e| DeviceError::Open {
            path: device.path.to_string(),
            reason: e.to_string(),
        })?;
        let handle = self
            .api
            .lock()
            .open_path(&c_path)
            .map_err(|e| DeviceError::Open {
                path: device.path.to_string(),
                reason: e.to_string(),
            })?;
        debug!(path = %device.path, prefix = self.options.report_id_prefix, "pad opened");
        Ok(Box::new(HidTransport::new(handle, self.options.report_id_prefix)))
    }

    fn present_paths(&mut self, identity: DeviceIdentity) -> Vec<DevicePath> {
        let mut api = self.api.lock();
        if let Err(e) = api.refresh_devices() {
            warn!("HID enumeration failed: {e}");
            return Vec::new();
        }
        api.device_list()
            .filter(|info| identity.matches(info.vendor_id(), info.product_id()))
            .map(|info| DevicePath::new(info.path().to_string_lossy()))
            .collect()
    }
}

/// An open pad.
pub struct HidTransport {
    device: HidDevice,
    report_id_prefix: bool,
}

impl HidTransport {
    pub fn new(device: HidDevice, report_id_prefix: bool) -> Self {
        Self {
            device,
            report_id_prefix,
        }
    }
}

impl ReportTransport for HidTransport {
    fn write_output(&mut self, report: &[u8]) -> Result<usize, DeviceError> {
        // The first byte is the report ID; the all-zero request already carries 0.
        self.device
            .write(report)
            .map_err(|e| DeviceError::Transfer(format!("write: {e}")))
    }

    fn read_input(
        &mut self,
        buf: &mut [u8],
        timeout: Option<Duration>,
    ) -> Result<usize, DeviceError> {
        let timeout_ms = match timeout {
            None => -1,
            Some(t) => i32::try_from(t.as_millis()).unwrap_or(i32::MAX),
        };

        if !self.report_id_prefix {
            return self
                .device
                .read_timeout(buf, timeout_ms)
                .map_err(|e| DeviceError::Transfer(format!("read: {e}")));
        }

        let Some((id, payload)) = buf.split_first_mut() else {
            return Ok(0);
        };
        let n = self
            .device
            .read_timeout(payload, timeout_ms)
            .map_err(|e| DeviceError::Transfer(format!("read: {e}")))?;
        if n == 0 {
            return Ok(0);
        }
        *id = 0;
        Ok(n + 1)
    }
}

/// Build a [`DeviceMeta`] snapshot for a `hidapi` device entry.
///
/// Fields are best-effort; unknown values remain `None`.
fn meta(info: &DeviceInfo) -> DeviceMeta {
    let interface_number = Some(info.interface_number()).filter(|n| *n >= 0);
    DeviceMeta {
        bus: Some("usb".into()),
        vid: Some(info.vendor_id()),
        pid: Some(info.product_id()),
        product_string: info.product_string().map(str::to_owned),
        manufacturer_string: info.manufacturer_string().map(str::to_owned),
        serial_number: info.serial_number().map(str::to_owned),
        interface_number,
        path: Some(info.path().to_string_lossy().into_owned()),
    }
}
