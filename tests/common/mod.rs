//! Scripted device doubles shared by the integration tests.

#![allow(dead_code)]

use padlink::metadata::DeviceMeta;
use padlink::{
    DeviceCapabilities, DeviceError, DeviceIdentity, DeviceLocator, DevicePath, LocatedDevice,
    ReportTransport,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const REPORT_LEFT_A: [u8; 8] = [0, 0, 0, 0, 0x00, 0x7F, 0x20, 0x00];
pub const REPORT_IDLE: [u8; 8] = [0, 0, 0, 0, 0x7F, 0x7F, 0x00, 0x00];

/// The "physical" pad: plug state and the report it currently answers with.
#[derive(Clone)]
pub struct FakePad {
    pub plugged: Arc<AtomicBool>,
    /// Enumerated and writable, but reads time out.
    pub silent: Arc<AtomicBool>,
    pub report: Arc<Mutex<Vec<u8>>>,
    pub finds: Arc<AtomicUsize>,
    pub opens: Arc<AtomicUsize>,
    pub writes: Arc<AtomicUsize>,
}

impl FakePad {
    pub fn new(report: &[u8]) -> Self {
        Self {
            plugged: Arc::new(AtomicBool::new(true)),
            silent: Arc::new(AtomicBool::new(false)),
            report: Arc::new(Mutex::new(report.to_vec())),
            finds: Arc::new(AtomicUsize::new(0)),
            opens: Arc::new(AtomicUsize::new(0)),
            writes: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn unplug(&self) {
        self.plugged.store(false, Ordering::SeqCst);
    }

    pub fn plug(&self) {
        self.plugged.store(true, Ordering::SeqCst);
    }

    pub fn stop_answering(&self) {
        self.silent.store(true, Ordering::SeqCst);
    }

    pub fn resume_answering(&self) {
        self.silent.store(false, Ordering::SeqCst);
    }

    pub fn set_report(&self, report: &[u8]) {
        *self.report.lock() = report.to_vec();
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn finds(&self) -> usize {
        self.finds.load(Ordering::SeqCst)
    }

    pub fn path() -> DevicePath {
        DevicePath::new(r"\\?\hid#vid_0079&pid_0011#fake")
    }

    pub fn locator(&self) -> MockLocator {
        MockLocator { pad: self.clone() }
    }
}

pub struct MockLocator {
    pad: FakePad,
}

impl DeviceLocator for MockLocator {
    fn find(&mut self, identity: DeviceIdentity) -> Option<LocatedDevice> {
        self.pad.finds.fetch_add(1, Ordering::SeqCst);
        if identity != DeviceIdentity::SNES_PAD || !self.pad.plugged.load(Ordering::SeqCst) {
            return None;
        }
        Some(LocatedDevice {
            path: FakePad::path(),
            capabilities: DeviceCapabilities {
                input_report_length: 8,
                output_report_length: 8,
            },
            meta: DeviceMeta {
                vid: Some(identity.vendor_id),
                pid: Some(identity.product_id),
                product_string: Some("Fake Pad".into()),
                ..Default::default()
            },
        })
    }

    fn open(&mut self, device: &LocatedDevice) -> Result<Box<dyn ReportTransport>, DeviceError> {
        if !self.pad.plugged.load(Ordering::SeqCst) {
            return Err(DeviceError::Open {
                path: device.path.to_string(),
                reason: "not present".into(),
            });
        }
        self.pad.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockTransport {
            pad: self.pad.clone(),
        }))
    }

    fn present_paths(&mut self, _identity: DeviceIdentity) -> Vec<DevicePath> {
        if self.pad.plugged.load(Ordering::SeqCst) {
            vec![FakePad::path()]
        } else {
            Vec::new()
        }
    }
}

/// Open handle. Fails every transfer once the pad is unplugged.
pub struct MockTransport {
    pad: FakePad,
}

impl ReportTransport for MockTransport {
    fn write_output(&mut self, report: &[u8]) -> Result<usize, DeviceError> {
        if !self.pad.plugged.load(Ordering::SeqCst) {
            return Err(DeviceError::Transfer("device not connected".into()));
        }
        self.pad.writes.fetch_add(1, Ordering::SeqCst);
        Ok(report.len())
    }

    fn read_input(
        &mut self,
        buf: &mut [u8],
        timeout: Option<Duration>,
    ) -> Result<usize, DeviceError> {
        if !self.pad.plugged.load(Ordering::SeqCst) {
            return Err(DeviceError::Transfer("device not connected".into()));
        }
        if timeout == Some(Duration::ZERO) || self.pad.silent.load(Ordering::SeqCst) {
            // Nothing queued behind the answered request.
            return Ok(0);
        }
        let report = self.pad.report.lock();
        buf[..report.len()].copy_from_slice(&report);
        Ok(report.len())
    }
}
