//! Report channel: one request/response exchange at a time.
//!
//! A [`ReportChannel`] owns an open [`ReportTransport`] and a completion worker
//! thread. [`ReportChannel::begin_query`] runs on the caller's (frame) thread:
//!
//! 1. claim the in-flight flag (refuse if a read is outstanding),
//! 2. write an all-zero output report (the pad's "send me your state" request),
//! 3. hand the read to the worker.
//!
//! The worker performs the read, decodes it, publishes the key into the
//! channel's [`KeyCell`], drains any reports that queued up behind it, and
//! clears the in-flight flag on the way out, panics included.
//!
//! ## Failure policy
//! - Write failure: the cycle is aborted and the error returned; the session
//!   drops the channel (closing the handle). No retry inside the cycle.
//! - Read failure: the channel is marked [faulted](ReportChannel::is_faulted);
//!   the session notices on its next query.
//! - Short report: decoded as [`ControllerKey::STATIONARY`].
//! - Read timeout: nothing is published.
//!
//! There is no cancellation. Dropping a channel mid-read detaches the worker,
//! which exits (and releases the handle) once the read returns.

use crate::device::{DeviceCapabilities, ReportTransport};
use crate::error::DeviceError;
use crate::key::ControllerKey;
use crate::report::{decode_with, ReportLayout};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

/// Safety valve: maximum number of stale reports discarded after each completed read.
///
/// Prevents a chatty device from pinning the worker if it produces reports
/// faster than they can be drained.
pub const MAX_STALE_REPORTS: usize = 32;

/// Default worker read timeout.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(100);

const PRESENT: u32 = 1 << 31;

/// Single-producer/single-consumer cell holding the latest decoded key.
///
/// The completion worker is the only writer; the frame thread reads.
/// Release/acquire ordering makes a published key visible to the next load.
#[derive(Debug, Default)]
pub struct KeyCell {
    bits: AtomicU32,
    generation: AtomicU32,
}

impl KeyCell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, key: ControllerKey) {
        self.bits
            .store(PRESENT | u32::from(key.bits()), Ordering::Release);
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    /// Latest published key, or `None` if nothing was ever published.
    pub fn latest(&self) -> Option<ControllerKey> {
        let raw = self.bits.load(Ordering::Acquire);
        (raw & PRESENT != 0).then(|| ControllerKey::from_bits_truncate(raw as u16))
    }

    /// Number of publishes so far. Lets callers tell a fresh value from a repeated one.
    pub fn generation(&self) -> u32 {
        self.generation.load(Ordering::Acquire)
    }
}

/// State shared between the channel and its worker.
#[derive(Debug, Default)]
struct Shared {
    in_flight: AtomicBool,
    faulted: AtomicBool,
    cell: KeyCell,
}

/// Clears the in-flight flag when dropped, whatever happened in between.
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Tunables for a channel.
#[derive(Clone, Copy, Debug)]
pub struct ChannelOptions {
    pub read_timeout: Duration,
    pub layout: ReportLayout,
}

impl Default for ChannelOptions {
    fn default() -> Self {
        Self {
            read_timeout: DEFAULT_READ_TIMEOUT,
            layout: ReportLayout::V1,
        }
    }
}

pub struct ReportChannel {
    transport: Arc<Mutex<Box<dyn ReportTransport>>>,
    capabilities: DeviceCapabilities,
    shared: Arc<Shared>,
    output_report: Vec<u8>,
    requests: Option<mpsc::Sender<()>>,
    worker: Option<JoinHandle<()>>,
}

impl ReportChannel {
    /// Take ownership of an open transport and start the completion worker.
    pub fn open(
        transport: Box<dyn ReportTransport>,
        capabilities: DeviceCapabilities,
        options: ChannelOptions,
    ) -> Result<Self, DeviceError> {
        let transport = Arc::new(Mutex::new(transport));
        let shared = Arc::new(Shared::default());
        let (tx, rx) = mpsc::channel::<()>();

        let worker = {
            let transport = Arc::clone(&transport);
            let shared = Arc::clone(&shared);
            std::thread::Builder::new()
                .name("padlink-read".into())
                .spawn(move || completion_loop(&transport, &shared, capabilities, options, &rx))?
        };

        debug!(
            input = capabilities.input_report_length,
            output = capabilities.output_report_length,
            "report channel open"
        );
        if capabilities.output_report_length == 0 {
            debug!("no output report; queries read without writing a request");
        }

        Ok(Self {
            transport,
            capabilities,
            shared,
            output_report: vec![0u8; usize::from(capabilities.output_report_length)],
            requests: Some(tx),
            worker: Some(worker),
        })
    }

    pub fn capabilities(&self) -> DeviceCapabilities {
        self.capabilities
    }

    /// Start one request/response cycle.
    ///
    /// Returns `Ok(false)` without touching the device if a read is still
    /// outstanding. On `Err` the cycle was aborted and the channel should be dropped.
    pub fn begin_query(&self) -> Result<bool, DeviceError> {
        if self
            .shared
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            trace!("query refused: transfer in progress");
            return Ok(false);
        }
        let guard = InFlightGuard(&self.shared.in_flight);

        if !self.output_report.is_empty() {
            let written = self.transport.lock().write_output(&self.output_report)?;
            trace!(written, "output report written");
        }

        let Some(requests) = self.requests.as_ref() else {
            return Err(DeviceError::WorkerGone);
        };
        requests.send(()).map_err(|_| DeviceError::WorkerGone)?;

        // The worker owns the flag from here on.
        std::mem::forget(guard);
        Ok(true)
    }

    #[inline]
    pub fn in_flight(&self) -> bool {
        self.shared.in_flight.load(Ordering::Acquire)
    }

    /// A read failed on this handle; it must not be used again.
    #[inline]
    pub fn is_faulted(&self) -> bool {
        self.shared.faulted.load(Ordering::Acquire)
    }

    /// Latest decoded key, if any read completed on this channel.
    #[inline]
    pub fn latest(&self) -> Option<ControllerKey> {
        self.shared.cell.latest()
    }

    #[inline]
    pub fn generation(&self) -> u32 {
        self.shared.cell.generation()
    }

    /// Block until no read is outstanding or `timeout` elapses. Returns `true` if idle.
    ///
    /// Never called from the frame loop; intended for shutdown paths, tools and tests.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.in_flight() {
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        true
    }

    /// Stop the worker and wait for it. Blocks for at most one read timeout.
    pub fn shutdown(mut self) {
        self.requests.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("report worker panicked");
            }
        }
    }
}

impl Drop for ReportChannel {
    fn drop(&mut self) {
        // Closing the request channel ends the worker after any read in progress.
        self.requests.take();
        if let Some(worker) = self.worker.take() {
            if worker.is_finished() && worker.join().is_err() {
                warn!("report worker panicked");
            }
        }
    }
}

fn completion_loop(
    transport: &Mutex<Box<dyn ReportTransport>>,
    shared: &Shared,
    capabilities: DeviceCapabilities,
    options: ChannelOptions,
    requests: &mpsc::Receiver<()>,
) {
    let expected = usize::from(capabilities.input_report_length);
    let mut buf = vec![0u8; expected.max(options.layout.min_len())];

    while requests.recv().is_ok() {
        let _guard = InFlightGuard(&shared.in_flight);
        let mut transport = transport.lock();

        match transport.read_input(&mut buf, Some(options.read_timeout)) {
            Ok(0) => trace!("input read timed out"),
            Ok(n) => {
                let report = &buf[..n];
                #[cfg(feature = "debug-log")]
                trace!(n, bytes = ?report, "input report");
                let key = decode_with(report, expected, &options.layout);
                shared.cell.publish(key);
                trace!(%key, "input report decoded");

                let dropped = drain_stale(&mut **transport, &mut buf);
                if dropped > 0 {
                    trace!(dropped, "discarded queued input reports");
                }
            }
            Err(e) => {
                warn!("input read failed: {e}");
                shared.faulted.store(true, Ordering::Release);
            }
        }
    }
    trace!("report worker exiting");
}

/// Discard reports already queued behind the one just decoded.
fn drain_stale(transport: &mut dyn ReportTransport, buf: &mut [u8]) -> usize {
    let mut dropped = 0;
    while dropped < MAX_STALE_REPORTS {
        match transport.read_input(buf, Some(Duration::ZERO)) {
            Ok(0) => break,
            Ok(_) => dropped += 1,
            Err(e) => {
                // The next full read will surface a persistent failure.
                trace!("drain stopped: {e}");
                break;
            }
        }
    }
    dropped
}
