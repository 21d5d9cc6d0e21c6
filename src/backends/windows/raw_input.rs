//! Windows Raw Input keyboard ingestion.
//!
//! Parses `WM_INPUT` payloads into key make/break packets and applies them to a
//! [`KeyboardState`]. Hosts that own the Win32 message loop register their
//! window once with [`register_keyboard`] and forward every `WM_INPUT` through
//! [`apply_wm_input`].
//!
//! ## Conventions
//! - Keys are identified by `(scancode, extended)`, packed into a [`KeyCode`].
//!   This is layout-independent; there is no text translation here.
//! - Mouse and HID payloads are ignored.

#![cfg(target_os = "windows")]

use crate::error::DeviceError;
use crate::keyboard::{KeyCode, KeyboardState};
use core::ffi::c_void;
use windows_sys::Win32::Foundation::HANDLE;
use windows_sys::Win32::UI::Input::KeyboardAndMouse::{MapVirtualKeyW, MAPVK_VK_TO_VSC_EX};
use windows_sys::Win32::UI::Input::*;

#[derive(Clone, Copy, Debug)]
pub(crate) struct RawKeyboardPacket {
    /// Raw Input device handle that produced the event.
    pub hdevice: HANDLE,
    /// Hardware scancode (layout-independent).
    pub scancode: u16,
    /// Extended key flag (E0/E1 or MapVirtualKey-derived).
    pub is_extended: bool,
    /// `true` for key-up (break), `false` for key-down (make).
    pub is_break: bool,
}

impl RawKeyboardPacket {
    pub fn key(&self) -> KeyCode {
        KeyCode::from_scancode(self.scancode, self.is_extended)
    }
}

// Local constants (avoid relying on module exports that vary by windows-sys version)
const RI_KEY_BREAK: u16 = 0x0001;
const RI_KEY_E0: u16 = 0x0002;
const RI_KEY_E1: u16 = 0x0004;

const USAGE_PAGE_GENERIC_DESKTOP: u16 = 0x01;
const USAGE_KEYBOARD: u16 = 0x06;

#[inline]
fn vkey_to_scancode(vkey: u16) -> Option<(u16, bool)> {
    unsafe {
        // MAPVK_VK_TO_VSC_EX can encode extended keys by returning 0xE0xx.
        let sc = MapVirtualKeyW(vkey as u32, MAPVK_VK_TO_VSC_EX);
        if sc == 0 {
            return None;
        }
        if (sc & 0xFF00) == 0xE000 {
            Some(((sc & 0x00FF) as u16, true))
        } else {
            Some((sc as u16, false))
        }
    }
}

/// Ask Windows to deliver keyboard `WM_INPUT` messages to `hwnd`.
pub fn register_keyboard(hwnd: isize) -> Result<(), DeviceError> {
    let device = RAWINPUTDEVICE {
        usUsagePage: USAGE_PAGE_GENERIC_DESKTOP,
        usUsage: USAGE_KEYBOARD,
        dwFlags: 0,
        hwndTarget: hwnd as _,
    };
    let ok = unsafe {
        RegisterRawInputDevices(&device, 1, std::mem::size_of::<RAWINPUTDEVICE>() as u32)
    };
    if ok == 0 {
        return Err(std::io::Error::last_os_error().into());
    }
    tracing::debug!("raw keyboard input registered");
    Ok(())
}

/// Apply a `WM_INPUT` message to `state`. Returns `true` if it was a keyboard packet.
pub fn apply_wm_input(lparam: isize, state: &mut KeyboardState) -> bool {
    apply(read_wm_input(lparam), state)
}

/// Same as [`apply_wm_input`] for payload bytes copied out of `GetRawInputData` earlier.
pub fn apply_raw_input_bytes(buf: &[u8], state: &mut KeyboardState) -> bool {
    apply(read_raw_input_bytes(buf), state)
}

fn apply(packet: Option<RawKeyboardPacket>, state: &mut KeyboardState) -> bool {
    let Some(packet) = packet else {
        return false;
    };
    let key = packet.key();
    tracing::trace!(%key, up = packet.is_break, device = ?packet.hdevice, "raw key");
    state.set(key, !packet.is_break);
    true
}

/// Parse a `WM_INPUT` lparam into a keyboard packet (if applicable).
pub(crate) fn read_wm_input(lparam: isize) -> Option<RawKeyboardPacket> {
    unsafe {
        let mut size: u32 = 0;
        let r0 = GetRawInputData(
            lparam as _,
            RID_INPUT,
            core::ptr::null_mut(),
            &mut size,
            core::mem::size_of::<RAWINPUTHEADER>() as u32,
        );
        if r0 == u32::MAX || size == 0 {
            return None;
        }

        let mut buf = vec![0u8; size as usize];
        let r1 = GetRawInputData(
            lparam as _,
            RID_INPUT,
            buf.as_mut_ptr() as *mut c_void,
            &mut size,
            core::mem::size_of::<RAWINPUTHEADER>() as u32,
        );
        if r1 == u32::MAX {
            return None;
        }

        read_raw_input_bytes(&buf)
    }
}

/// Parse a raw `RID_INPUT` payload into a keyboard packet (if applicable).
pub(crate) fn read_raw_input_bytes(buf: &[u8]) -> Option<RawKeyboardPacket> {
    let hdr_sz = core::mem::size_of::<RAWINPUTHEADER>();
    let need = hdr_sz + core::mem::size_of::<RAWKEYBOARD>();
    if buf.len() < need {
        return None;
    }

    unsafe {
        let hdr: RAWINPUTHEADER = core::ptr::read_unaligned(buf.as_ptr() as *const RAWINPUTHEADER);
        if hdr.dwType != RIM_TYPEKEYBOARD {
            return None;
        }

        let kbd: RAWKEYBOARD =
            core::ptr::read_unaligned(buf.as_ptr().add(hdr_sz) as *const RAWKEYBOARD);
        let make: u16 = kbd.MakeCode;
        let flags: u16 = kbd.Flags;

        let is_break = (flags & RI_KEY_BREAK) != 0;
        let is_extended_flags = (flags & (RI_KEY_E0 | RI_KEY_E1)) != 0;

        // Prefer MakeCode; if it's 0, fall back to VKey.
        let (scancode, ext_from_map) = if make != 0 {
            (make, false)
        } else {
            vkey_to_scancode(kbd.VKey)?
        };

        Some(RawKeyboardPacket {
            hdevice: hdr.hDevice,
            scancode,
            is_extended: is_extended_flags || ext_from_map,
            is_break,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(make: u16, flags: u16) -> Vec<u8> {
        let mut hdr: RAWINPUTHEADER = unsafe { std::mem::zeroed() };
        hdr.dwType = RIM_TYPEKEYBOARD;
        let mut kbd: RAWKEYBOARD = unsafe { std::mem::zeroed() };
        kbd.MakeCode = make;
        kbd.Flags = flags;

        let mut out = Vec::new();
        unsafe {
            out.extend_from_slice(std::slice::from_raw_parts(
                &hdr as *const RAWINPUTHEADER as *const u8,
                std::mem::size_of::<RAWINPUTHEADER>(),
            ));
            out.extend_from_slice(std::slice::from_raw_parts(
                &kbd as *const RAWKEYBOARD as *const u8,
                std::mem::size_of::<RAWKEYBOARD>(),
            ));
        }
        out
    }

    #[test]
    fn extended_make_and_break_toggle_arrow_key() {
        let mut state = KeyboardState::new();
        assert!(apply_raw_input_bytes(&payload(0x4B, RI_KEY_E0), &mut state));
        assert!(state.is_held(KeyCode::ARROW_LEFT));
        // Numpad 4 (same scancode, not extended) is a different key.
        assert!(!state.is_held(KeyCode::from_scancode(0x4B, false)));

        assert!(apply_raw_input_bytes(
            &payload(0x4B, RI_KEY_E0 | RI_KEY_BREAK),
            &mut state
        ));
        assert!(!state.is_held(KeyCode::ARROW_LEFT));
    }

    #[test]
    fn truncated_payload_is_ignored() {
        let mut state = KeyboardState::new();
        let bytes = payload(0x2C, 0);
        assert!(!apply_raw_input_bytes(&bytes[..bytes.len() - 1], &mut state));
        assert!(state.held().next().is_none());
    }
}
