//! `WM_DEVICECHANGE` notification source.
//!
//! Registers a host window for HID interface arrival/removal broadcasts. The
//! host's window procedure forwards every message through
//! [`WindowNotifier::handle_message`], which parses the broadcast and pushes a
//! [`DeviceEvent`] into the session's sink. Nothing here blocks.
//!
//! Window handles are stored as `isize` so the notifier can move between threads;
//! they are only dereferenced by Windows itself.

#![cfg(target_os = "windows")]

use crate::device::{DeviceIdentity, DevicePath};
use crate::error::DeviceError;
use crate::notify::{DeviceEvent, DeviceNotifier, EventSink};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, trace};

use windows_sys::core::GUID;
use windows_sys::Win32::Devices::HumanInterfaceDevice::HidD_GetHidGuid;
use windows_sys::Win32::UI::WindowsAndMessaging::{
    RegisterDeviceNotificationW, UnregisterDeviceNotification, DEV_BROADCAST_DEVICEINTERFACE_W,
    DEV_BROADCAST_HDR,
};

// Local constants (avoid relying on module exports that vary by windows-sys version)
pub const WM_DEVICECHANGE: u32 = 0x0219;
const DBT_DEVICEARRIVAL: usize = 0x8000;
const DBT_DEVICEREMOVECOMPLETE: usize = 0x8004;
const DBT_DEVTYP_DEVICEINTERFACE: u32 = 0x0005;
const DEVICE_NOTIFY_WINDOW_HANDLE: u32 = 0x0000;

struct Inner {
    hwnd: isize,
    registration: isize,
    sink: Option<EventSink>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        if self.registration != 0 {
            unsafe { UnregisterDeviceNotification(self.registration as _) };
            self.registration = 0;
        }
    }
}

/// Device notifications delivered through a host window's message loop.
///
/// Clone it before handing it to the session: the session keeps one clone,
/// the window procedure keeps another.
#[derive(Clone)]
pub struct WindowNotifier {
    inner: Arc<Mutex<Inner>>,
}

impl WindowNotifier {
    pub fn new(hwnd: isize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                hwnd,
                registration: 0,
                sink: None,
            })),
        }
    }

    pub fn is_registered(&self) -> bool {
        self.inner.lock().registration != 0
    }

    /// Feed one window message. Returns `true` if it was a HID interface change
    /// that got forwarded.
    pub fn handle_message(&self, msg: u32, wparam: usize, lparam: isize) -> bool {
        if msg != WM_DEVICECHANGE {
            return false;
        }
        let Some(event) = parse_broadcast(wparam, lparam) else {
            return false;
        };

        let inner = self.inner.lock();
        let Some(sink) = inner.sink.as_ref() else {
            trace!(?event, "device change before subscription");
            return false;
        };
        trace!(?event, "device change");
        sink.notify(event)
    }
}

impl DeviceNotifier for WindowNotifier {
    fn subscribe(&mut self, identity: DeviceIdentity, sink: EventSink) -> Result<(), DeviceError> {
        let mut inner = self.inner.lock();
        if inner.registration != 0 {
            return Err(DeviceError::Subscription(
                "window already registered for device notifications".into(),
            ));
        }
        if inner.hwnd == 0 {
            return Err(DeviceError::Subscription("no host window".into()));
        }

        let mut filter: DEV_BROADCAST_DEVICEINTERFACE_W = unsafe { std::mem::zeroed() };
        filter.dbcc_size = std::mem::size_of::<DEV_BROADCAST_DEVICEINTERFACE_W>() as u32;
        filter.dbcc_devicetype = DBT_DEVTYP_DEVICEINTERFACE;
        filter.dbcc_classguid = hid_class_guid();

        let registration = unsafe {
            RegisterDeviceNotificationW(
                inner.hwnd as _,
                &filter as *const DEV_BROADCAST_DEVICEINTERFACE_W as *const _,
                DEVICE_NOTIFY_WINDOW_HANDLE,
            )
        };
        if registration.is_null() {
            let os = std::io::Error::last_os_error();
            return Err(DeviceError::Subscription(format!(
                "RegisterDeviceNotificationW: {os}"
            )));
        }

        inner.registration = registration as isize;
        inner.sink = Some(sink);
        debug!(%identity, "window registered for HID interface notifications");
        Ok(())
    }
}

fn hid_class_guid() -> GUID {
    let mut guid: GUID = unsafe { std::mem::zeroed() };
    unsafe { HidD_GetHidGuid(&mut guid) };
    guid
}

/// Decode a `WM_DEVICECHANGE` broadcast into an event.
///
/// `lparam` must be null or point to a `DEV_BROADCAST_HDR` sent by Windows.
fn parse_broadcast(wparam: usize, lparam: isize) -> Option<DeviceEvent> {
    let arrived = match wparam {
        DBT_DEVICEARRIVAL => true,
        DBT_DEVICEREMOVECOMPLETE => false,
        _ => return None,
    };
    if lparam == 0 {
        return None;
    }

    let path = unsafe { interface_name(lparam as *const DEV_BROADCAST_HDR) }?;
    Some(if arrived {
        DeviceEvent::Arrived(path)
    } else {
        DeviceEvent::Removed(path)
    })
}

/// Read the interface path out of a device-interface broadcast.
unsafe fn interface_name(hdr: *const DEV_BROADCAST_HDR) -> Option<DevicePath> {
    let header = core::ptr::read_unaligned(hdr);
    if header.dbch_devicetype != DBT_DEVTYP_DEVICEINTERFACE {
        return None;
    }

    let name_offset = std::mem::offset_of!(DEV_BROADCAST_DEVICEINTERFACE_W, dbcc_name);
    let total = header.dbch_size as usize;
    if total <= name_offset {
        return None;
    }

    let max_chars = (total - name_offset) / 2;
    let name_ptr = (hdr as *const u8).add(name_offset) as *const u16;
    let mut wide = Vec::with_capacity(max_chars);
    for i in 0..max_chars {
        let c = core::ptr::read_unaligned(name_ptr.add(i));
        if c == 0 {
            break;
        }
        wide.push(c);
    }
    if wide.is_empty() {
        return None;
    }
    Some(DevicePath::new(String::from_utf16_lossy(&wide)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::event_channel;

    /// Build a broadcast the way Windows lays it out: fixed header then a NUL-terminated name.
    fn broadcast(name: &str) -> Vec<u64> {
        let offset = std::mem::offset_of!(DEV_BROADCAST_DEVICEINTERFACE_W, dbcc_name);
        let wide: Vec<u16> = name.encode_utf16().chain(std::iter::once(0)).collect();
        let total = offset + wide.len() * 2;

        let mut storage = vec![0u64; total.div_ceil(8)];
        let base = storage.as_mut_ptr() as *mut u8;
        unsafe {
            let hdr = DEV_BROADCAST_HDR {
                dbch_size: total as u32,
                dbch_devicetype: DBT_DEVTYP_DEVICEINTERFACE,
                dbch_reserved: 0,
            };
            core::ptr::write_unaligned(base as *mut DEV_BROADCAST_HDR, hdr);
            let name_ptr = base.add(offset) as *mut u16;
            for (i, c) in wide.iter().enumerate() {
                core::ptr::write_unaligned(name_ptr.add(i), *c);
            }
        }
        storage
    }

    #[test]
    fn removal_broadcast_reaches_sink() {
        let (sink, stream) = event_channel();
        let notifier = WindowNotifier::new(0);
        notifier.inner.lock().sink = Some(sink);

        let path = r"\\?\HID#VID_0079&PID_0011#7&1a2b3c&0&0000#{4d1e55b2-f16f-11cf-88cb-001111000030}";
        let msg = broadcast(path);
        assert!(notifier.handle_message(
            WM_DEVICECHANGE,
            DBT_DEVICEREMOVECOMPLETE,
            msg.as_ptr() as isize
        ));

        let events = stream.drain();
        assert_eq!(events, vec![DeviceEvent::Removed(DevicePath::new(path))]);
    }

    #[test]
    fn other_messages_are_ignored() {
        let notifier = WindowNotifier::new(0);
        assert!(!notifier.handle_message(0x0100, 0, 0));
        assert!(!notifier.handle_message(WM_DEVICECHANGE, 0x0007, 0));
        assert!(!notifier.handle_message(WM_DEVICECHANGE, DBT_DEVICEARRIVAL, 0));
    }

    #[test]
    fn subscribe_without_window_fails() {
        let (sink, _stream) = event_channel();
        let mut notifier = WindowNotifier::new(0);
        let err = notifier
            .subscribe(DeviceIdentity::SNES_PAD, sink)
            .unwrap_err();
        assert!(matches!(err, DeviceError::Subscription(_)));
        assert!(!notifier.is_registered());
    }
}
