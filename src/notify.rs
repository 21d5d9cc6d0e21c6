//! Device arrival/removal notifications.
//!
//! Notification sources push [`DeviceEvent`]s into an [`EventSink`]; the
//! session drains the paired [`EventStream`] at the start of every query and
//! acts only on events that [concern](DeviceEvent::concerns) its tracked path.
//!
//! Sources:
//! - [`PresenceWatcher`]: portable fallback. Re-enumerates on a background
//!   thread at a fixed interval and diffs device presence.
//! - `WindowNotifier` (Windows): `WM_DEVICECHANGE` registration on a host
//!   window; see [`backends::windows::device_notify`](crate::backends).
//! - The host itself, through
//!   [`ControllerSession::notification_sink`](crate::session::ControllerSession::notification_sink).
//!
//! Sinks never block: a notification handler running inside a message pump
//! can call [`EventSink::notify`] freely.

use crate::device::{DeviceIdentity, DeviceLocator, DevicePath};
use crate::error::DeviceError;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, trace, warn};

/// A device interface appeared or disappeared.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeviceEvent {
    Arrived(DevicePath),
    Removed(DevicePath),
}

impl DeviceEvent {
    pub fn path(&self) -> &DevicePath {
        match self {
            DeviceEvent::Arrived(p) | DeviceEvent::Removed(p) => p,
        }
    }

    /// Whether this event is about `tracked`.
    #[inline]
    pub fn concerns(&self, tracked: &DevicePath) -> bool {
        self.path() == tracked
    }

    #[inline]
    pub fn is_removal(&self) -> bool {
        matches!(self, DeviceEvent::Removed(_))
    }
}

/// Sending half handed to notification sources.
#[derive(Clone, Debug)]
pub struct EventSink(mpsc::Sender<DeviceEvent>);

impl EventSink {
    /// Deliver one event. Returns `false` once the receiving session is gone.
    pub fn notify(&self, event: DeviceEvent) -> bool {
        self.0.send(event).is_ok()
    }
}

/// Receiving half owned by the session.
#[derive(Debug)]
pub struct EventStream(mpsc::Receiver<DeviceEvent>);

impl EventStream {
    /// Take every event queued so far without blocking.
    pub fn drain(&self) -> Vec<DeviceEvent> {
        self.0.try_iter().collect()
    }
}

/// Create a connected sink/stream pair.
pub fn event_channel() -> (EventSink, EventStream) {
    let (tx, rx) = mpsc::channel();
    (EventSink(tx), EventStream(rx))
}

/// A source of device change notifications.
pub trait DeviceNotifier: Send {
    /// Start delivering events for interfaces of `identity` into `sink`.
    ///
    /// Called once, after the first successful discovery.
    fn subscribe(&mut self, identity: DeviceIdentity, sink: EventSink) -> Result<(), DeviceError>;
}

/// Default re-enumeration interval of [`PresenceWatcher`].
pub const DEFAULT_WATCH_INTERVAL: Duration = Duration::from_millis(1000);

/// Stop-flag polling granularity while the watcher sleeps.
const WATCH_SLICE: Duration = Duration::from_millis(25);

/// Poll-based notification source.
///
/// Owns a locator (typically a clone of the session's) and runs it on a
/// background thread, diffing the set of matching paths between passes. The
/// first pass only records a baseline.
pub struct PresenceWatcher {
    interval: Duration,
    locator: Option<Box<dyn DeviceLocator>>,
    stop: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl PresenceWatcher {
    pub fn new(locator: impl DeviceLocator + 'static, interval: Duration) -> Self {
        Self {
            interval,
            locator: Some(Box::new(locator)),
            stop: Arc::new(AtomicBool::new(false)),
            worker: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.worker.as_ref().is_some_and(|w| !w.is_finished())
    }
}

impl DeviceNotifier for PresenceWatcher {
    fn subscribe(&mut self, identity: DeviceIdentity, sink: EventSink) -> Result<(), DeviceError> {
        let Some(mut locator) = self.locator.take() else {
            // Already running; a second subscription would need a second locator.
            return Err(DeviceError::Subscription(
                "presence watcher already subscribed".into(),
            ));
        };

        let stop = Arc::clone(&self.stop);
        let interval = self.interval;
        let handle = std::thread::Builder::new()
            .name("padlink-watch".into())
            .spawn(move || watch_loop(&mut *locator, identity, interval, &sink, &stop))
            .map_err(|e| DeviceError::Subscription(format!("spawn watcher thread: {e}")))?;

        debug!(%identity, ?interval, "presence watcher started");
        self.worker = Some(handle);
        Ok(())
    }
}

impl Drop for PresenceWatcher {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("presence watcher thread panicked");
            }
        }
    }
}

fn watch_loop(
    locator: &mut dyn DeviceLocator,
    identity: DeviceIdentity,
    interval: Duration,
    sink: &EventSink,
    stop: &AtomicBool,
) {
    let mut known: HashSet<DevicePath> = locator.present_paths(identity).into_iter().collect();
    trace!(count = known.len(), "presence baseline");

    loop {
        if !sleep_unless_stopped(interval, stop) {
            return;
        }

        let now: HashSet<DevicePath> = locator.present_paths(identity).into_iter().collect();
        for event in diff_presence(&known, &now) {
            debug!(?event, "presence changed");
            if !sink.notify(event) {
                debug!("session gone; presence watcher exiting");
                return;
            }
        }
        known = now;
    }
}

/// Events turning `before` into `after`. Removals come first.
pub fn diff_presence(before: &HashSet<DevicePath>, after: &HashSet<DevicePath>) -> Vec<DeviceEvent> {
    let removed = before
        .difference(after)
        .cloned()
        .map(DeviceEvent::Removed);
    let arrived = after
        .difference(before)
        .cloned()
        .map(DeviceEvent::Arrived);
    removed.chain(arrived).collect()
}

/// Sleep for `total`, waking early when `stop` is raised. Returns `false` if stopped.
fn sleep_unless_stopped(total: Duration, stop: &AtomicBool) -> bool {
    let mut left = total;
    while !left.is_zero() {
        if stop.load(Ordering::Relaxed) {
            return false;
        }
        let step = left.min(WATCH_SLICE);
        std::thread::sleep(step);
        left -= step;
    }
    !stop.load(Ordering::Relaxed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{LocatedDevice, ReportTransport};
    use parking_lot::Mutex;

    struct ListLocator(Arc<Mutex<Vec<DevicePath>>>);

    impl DeviceLocator for ListLocator {
        fn find(&mut self, _identity: DeviceIdentity) -> Option<LocatedDevice> {
            None
        }
        fn open(&mut self, _: &LocatedDevice) -> Result<Box<dyn ReportTransport>, DeviceError> {
            Err(DeviceError::Transfer("not openable".into()))
        }
        fn present_paths(&mut self, _identity: DeviceIdentity) -> Vec<DevicePath> {
            self.0.lock().clone()
        }
    }

    #[test]
    fn concerns_matches_tracked_path_only() {
        let tracked = DevicePath::new("hid#pad-1");
        assert!(DeviceEvent::Removed("HID#PAD-1".into()).concerns(&tracked));
        assert!(!DeviceEvent::Removed("hid#pad-2".into()).concerns(&tracked));
    }

    #[test]
    fn diff_reports_removals_then_arrivals() {
        let before: HashSet<DevicePath> = ["a".into(), "b".into()].into_iter().collect();
        let after: HashSet<DevicePath> = ["b".into(), "c".into()].into_iter().collect();
        assert_eq!(
            diff_presence(&before, &after),
            vec![
                DeviceEvent::Removed("a".into()),
                DeviceEvent::Arrived("c".into())
            ]
        );
        assert!(diff_presence(&after, &after).is_empty());
    }

    #[test]
    fn watcher_reports_unplug_and_replug() {
        let paths = Arc::new(Mutex::new(vec![DevicePath::new("pad")]));
        let mut watcher =
            PresenceWatcher::new(ListLocator(Arc::clone(&paths)), Duration::from_millis(5));
        let (sink, stream) = event_channel();
        watcher
            .subscribe(DeviceIdentity::SNES_PAD, sink)
            .expect("subscribe");
        assert!(watcher.is_running());

        // Let the baseline pass run before changing presence.
        std::thread::sleep(Duration::from_millis(30));
        paths.lock().clear();
        let removed = wait_for_event(&stream);
        assert_eq!(removed, DeviceEvent::Removed("pad".into()));

        paths.lock().push("pad".into());
        let arrived = wait_for_event(&stream);
        assert_eq!(arrived, DeviceEvent::Arrived("pad".into()));
    }

    #[test]
    fn second_subscription_is_refused() {
        let mut watcher = PresenceWatcher::new(
            ListLocator(Arc::new(Mutex::new(Vec::new()))),
            Duration::from_millis(50),
        );
        let (sink, _stream) = event_channel();
        watcher
            .subscribe(DeviceIdentity::SNES_PAD, sink.clone())
            .expect("first");
        assert!(matches!(
            watcher.subscribe(DeviceIdentity::SNES_PAD, sink),
            Err(DeviceError::Subscription(_))
        ));
    }

    fn wait_for_event(stream: &EventStream) -> DeviceEvent {
        for _ in 0..400 {
            if let Some(ev) = stream.drain().into_iter().next() {
                return ev;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        panic!("no presence event within 2s");
    }
}
