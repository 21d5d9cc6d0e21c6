//! Windows attribute and capability probe.
//!
//! `hidapi` enumerates the HID interface class for us; this module confirms a
//! candidate the way the HID class driver sees it:
//!
//! - open the interface path with **no** read/write access (this works even
//!   for devices another process holds exclusively),
//! - `HidD_GetAttributes` for the vendor/product pair,
//! - `HidD_GetPreparsedData` + `HidP_GetCaps` for the report lengths.
//!
//! The probe handle and preparsed data are released before returning.

#![cfg(target_os = "windows")]

use crate::device::{DeviceCapabilities, DeviceIdentity};
use crate::error::DeviceError;
use std::ffi::OsStr;
use std::mem::MaybeUninit;
use std::os::windows::ffi::OsStrExt;

use windows_sys::Win32::Devices::HumanInterfaceDevice::{
    HidD_FreePreparsedData, HidD_GetAttributes, HidD_GetPreparsedData, HidP_GetCaps,
    HIDD_ATTRIBUTES, HIDP_CAPS, HIDP_STATUS_SUCCESS, PHIDP_PREPARSED_DATA,
};
use windows_sys::Win32::Foundation::{CloseHandle, GetLastError, HANDLE, INVALID_HANDLE_VALUE};
use windows_sys::Win32::Storage::FileSystem::{
    CreateFileW, FILE_ATTRIBUTE_NORMAL, FILE_SHARE_READ, FILE_SHARE_WRITE, OPEN_EXISTING,
};

/// Closes the probe handle.
struct HandleGuard(HANDLE);

impl Drop for HandleGuard {
    fn drop(&mut self) {
        if !self.0.is_null() && self.0 != INVALID_HANDLE_VALUE {
            unsafe { CloseHandle(self.0) };
        }
    }
}

/// Frees preparsed data.
struct PreparsedGuard(PHIDP_PREPARSED_DATA);

impl Drop for PreparsedGuard {
    fn drop(&mut self) {
        if self.0 != 0 {
            unsafe { HidD_FreePreparsedData(self.0) };
        }
    }
}

/// Identity and report lengths of the interface at `path`.
pub fn probe(path: &str) -> Result<(DeviceIdentity, DeviceCapabilities), DeviceError> {
    let handle = open_device_handle(path, 0).map_err(|code| DeviceError::Open {
        path: path.to_owned(),
        reason: format!("CreateFileW failed (error {code})"),
    })?;
    let handle = HandleGuard(handle);

    let identity = attributes(handle.0).ok_or_else(|| DeviceError::Attributes {
        path: path.to_owned(),
    })?;
    let capabilities = capabilities(handle.0).ok_or_else(|| DeviceError::Capabilities {
        path: path.to_owned(),
    })?;

    Ok((identity, capabilities))
}

fn attributes(handle: HANDLE) -> Option<DeviceIdentity> {
    let mut attrs: HIDD_ATTRIBUTES = unsafe { std::mem::zeroed() };
    attrs.Size = std::mem::size_of::<HIDD_ATTRIBUTES>() as u32;
    let ok = unsafe { HidD_GetAttributes(handle, &mut attrs) };
    if ok == 0 {
        return None;
    }
    Some(DeviceIdentity::new(attrs.VendorID, attrs.ProductID))
}

fn capabilities(handle: HANDLE) -> Option<DeviceCapabilities> {
    let mut ppd: PHIDP_PREPARSED_DATA = 0;
    let ok = unsafe { HidD_GetPreparsedData(handle, &mut ppd) };
    if ok == 0 || ppd == 0 {
        return None;
    }
    let ppd = PreparsedGuard(ppd);

    let mut caps = MaybeUninit::<HIDP_CAPS>::uninit();
    let status = unsafe { HidP_GetCaps(ppd.0, caps.as_mut_ptr()) };
    if status != HIDP_STATUS_SUCCESS {
        return None;
    }
    let caps = unsafe { caps.assume_init() };

    Some(DeviceCapabilities {
        input_report_length: caps.InputReportByteLength,
        output_report_length: caps.OutputReportByteLength,
    })
}

/// Open a HID interface path. `access == 0` opens for attribute queries only.
///
/// ### Errors
/// Returns `Err(GetLastError())` on failure.
fn open_device_handle(path: &str, access: u32) -> Result<HANDLE, u32> {
    use std::ptr::{null, null_mut};

    // UTF-16 + NUL
    let wide: Vec<u16> = OsStr::new(path)
        .encode_wide()
        .chain(std::iter::once(0))
        .collect();

    let handle = unsafe {
        CreateFileW(
            wide.as_ptr(),
            access,
            FILE_SHARE_READ | FILE_SHARE_WRITE,
            null(),
            OPEN_EXISTING,
            FILE_ATTRIBUTE_NORMAL,
            null_mut(),
        )
    };

    if handle == INVALID_HANDLE_VALUE {
        Err(unsafe { GetLastError() })
    } else {
        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_path_is_an_open_error() {
        let err = probe(r"\\?\HID#VID_0000&PID_0000#does-not-exist").unwrap_err();
        assert!(matches!(err, DeviceError::Open { .. }));
    }
}
