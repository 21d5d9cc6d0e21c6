//! Controller session: discovery, report exchange, and reconnects.
//!
//! ```text
//!            query()                      locator.find + open
//! Disconnected ─────► Discovering ─────────────────────────────► Connected
//!      ▲                   │ not found / open failed                 │  ▲
//!      │                   ▼                                begin_query │ read completes
//!      │              Disconnected                                   ▼  │
//!      └──── removal notification / transfer failure ──── TransferInProgress
//! ```
//!
//! There is no terminal state: a session can be queried indefinitely and
//! recovers on its own after the pad is unplugged and plugged back in. Every
//! reconnect acquires a fresh handle; a handle is never reused after removal
//! or failure.
//!
//! Nothing here returns errors to the caller. Failures are logged and end in
//! `Disconnected`, to be retried on the next query.

use crate::channel::{ChannelOptions, ReportChannel};
use crate::device::{DeviceIdentity, DeviceLocator, DevicePath, LocatedDevice};
use crate::key::ControllerKey;
use crate::notify::{event_channel, DeviceEvent, DeviceNotifier, EventSink, EventStream};
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SessionState {
    Disconnected,
    /// Transient: only exists while a query runs discovery.
    Discovering,
    Connected,
    TransferInProgress,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Discovering => "discovering",
            SessionState::Connected => "connected",
            SessionState::TransferInProgress => "transfer in progress",
        };
        f.write_str(s)
    }
}

/// What one [`ControllerSession::query`] call did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QueryOutcome {
    /// A report request was written and a read issued.
    Started,
    /// A read is still outstanding; nothing was sent.
    Busy,
    /// No usable device this time.
    Disconnected,
}

/// The open device: where it lives and the channel talking to it.
struct Connection {
    device: LocatedDevice,
    channel: ReportChannel,
}

pub struct ControllerSession {
    identity: DeviceIdentity,
    locator: Box<dyn DeviceLocator>,
    notifier: Option<Box<dyn DeviceNotifier>>,
    notifier_subscribed: bool,
    subscription_error: Option<String>,
    sink: EventSink,
    events: EventStream,
    options: ChannelOptions,
    connection: Option<Connection>,
    connects: u64,
}

impl ControllerSession {
    pub fn new(identity: DeviceIdentity, locator: impl DeviceLocator + 'static) -> Self {
        let (sink, events) = event_channel();
        Self {
            identity,
            locator: Box::new(locator),
            notifier: None,
            notifier_subscribed: false,
            subscription_error: None,
            sink,
            events,
            options: ChannelOptions::default(),
            connection: None,
            connects: 0,
        }
    }

    /// Subscribe `notifier` after the first successful discovery.
    pub fn with_notifier(mut self, notifier: impl DeviceNotifier + 'static) -> Self {
        self.notifier = Some(Box::new(notifier));
        self
    }

    pub fn with_channel_options(mut self, options: ChannelOptions) -> Self {
        self.options = options;
        self
    }

    /// Session over the `hidapi` backend, with the presence watcher when enabled.
    #[cfg(feature = "hid")]
    pub fn from_config(config: &crate::config::PadConfig) -> Result<Self, crate::error::DeviceError> {
        use crate::backends::hid::{HidLocator, HidOptions};
        use crate::notify::PresenceWatcher;

        let locator = HidLocator::new(HidOptions::from(&config.device))?;
        let mut session = Self::new(config.device.identity(), locator.clone())
            .with_channel_options(config.device.channel_options());
        if config.watcher.enabled {
            session = session.with_notifier(PresenceWatcher::new(locator, config.watcher.interval()));
        }
        Ok(session)
    }

    pub fn identity(&self) -> DeviceIdentity {
        self.identity
    }

    /// Observable state. Never [`SessionState::Discovering`]: discovery runs to
    /// completion inside [`query`](Self::query).
    pub fn state(&self) -> SessionState {
        match &self.connection {
            None => SessionState::Disconnected,
            Some(c) if c.channel.in_flight() => SessionState::TransferInProgress,
            Some(_) => SessionState::Connected,
        }
    }

    #[inline]
    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// The currently open device, if any.
    pub fn device(&self) -> Option<&LocatedDevice> {
        self.connection.as_ref().map(|c| &c.device)
    }

    pub fn tracked_path(&self) -> Option<&DevicePath> {
        self.device().map(|d| &d.path)
    }

    /// Number of successful connects so far (first connect included).
    pub fn connects(&self) -> u64 {
        self.connects
    }

    /// Sink for hosts that receive device notifications themselves.
    pub fn notification_sink(&self) -> EventSink {
        self.sink.clone()
    }

    /// Set when the notifier failed to subscribe. Discovery by polling still works.
    pub fn subscription_error(&self) -> Option<&str> {
        self.subscription_error.as_deref()
    }

    /// Latest decoded key from the open device.
    pub fn latest_key(&self) -> Option<ControllerKey> {
        self.connection.as_ref().and_then(|c| c.channel.latest())
    }

    /// Number of reports decoded on the open connection. Starts at 0 on every connect.
    pub fn report_generation(&self) -> Option<u32> {
        self.connection.as_ref().map(|c| c.channel.generation())
    }

    /// Apply one device change event. Returns `true` if it disconnected the session.
    pub fn handle_event(&mut self, event: &DeviceEvent) -> bool {
        let Some(tracked) = self.tracked_path() else {
            trace!(?event, "device event while disconnected");
            return false;
        };
        if !event.concerns(tracked) {
            return false;
        }
        match event {
            DeviceEvent::Removed(_) => {
                self.disconnect("device removed");
                true
            }
            DeviceEvent::Arrived(path) => {
                debug!(%path, "arrival for already-connected device");
                false
            }
        }
    }

    /// Drain queued notifications.
    pub fn process_notifications(&mut self) {
        for event in self.events.drain() {
            self.handle_event(&event);
        }
    }

    /// Run one step: apply notifications, (re)discover if needed, start an exchange.
    pub fn query(&mut self) -> QueryOutcome {
        self.process_notifications();

        if self
            .connection
            .as_ref()
            .is_some_and(|c| c.channel.is_faulted())
        {
            self.disconnect("input read failed");
        }

        if self.connection.is_none() && !self.connect() {
            return QueryOutcome::Disconnected;
        }

        let Some(conn) = self.connection.as_ref() else {
            return QueryOutcome::Disconnected;
        };
        match conn.channel.begin_query() {
            Ok(true) => QueryOutcome::Started,
            Ok(false) => QueryOutcome::Busy,
            Err(e) => {
                warn!("report request failed: {e}");
                self.disconnect("transfer failure");
                QueryOutcome::Disconnected
            }
        }
    }

    /// Drop the current handle. The next query rediscovers.
    pub fn disconnect(&mut self, reason: &str) {
        if let Some(conn) = self.connection.take() {
            info!(path = %conn.device.path, reason, "pad disconnected");
            // Dropping the channel closes the handle once any outstanding read returns.
            drop(conn);
        }
    }

    /// Close the device and wait for the read worker to exit.
    pub fn shutdown(&mut self) {
        if let Some(conn) = self.connection.take() {
            debug!(path = %conn.device.path, "session shutdown");
            conn.channel.shutdown();
        }
    }

    /// Wait for an outstanding read to finish. For tools and tests, not the frame loop.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        self.connection
            .as_ref()
            .map_or(true, |c| c.channel.wait_idle(timeout))
    }

    fn connect(&mut self) -> bool {
        trace!(state = %SessionState::Discovering, identity = %self.identity, "looking for pad");
        let Some(device) = self.locator.find(self.identity) else {
            trace!(identity = %self.identity, "pad not attached");
            return false;
        };

        let transport = match self.locator.open(&device) {
            Ok(t) => t,
            Err(e) => {
                debug!(path = %device.path, "open failed: {e}");
                return false;
            }
        };

        let channel = match ReportChannel::open(transport, device.capabilities, self.options) {
            Ok(c) => c,
            Err(e) => {
                warn!(path = %device.path, "could not start report channel: {e}");
                return false;
            }
        };

        info!(
            path = %device.path,
            device = %device.meta,
            input = device.capabilities.input_report_length,
            output = device.capabilities.output_report_length,
            "pad connected"
        );
        self.connects += 1;
        self.connection = Some(Connection { device, channel });
        self.subscribe_once();
        true
    }

    fn subscribe_once(&mut self) {
        if self.notifier_subscribed {
            return;
        }
        self.notifier_subscribed = true;
        let Some(mut notifier) = self.notifier.take() else {
            return;
        };
        match notifier.subscribe(self.identity, self.sink.clone()) {
            Ok(()) => {
                debug!("device notifications subscribed");
                // Keep the notifier alive for the session's lifetime.
                self.notifier = Some(notifier);
            }
            Err(e) => {
                warn!("device notifications unavailable, relying on polling: {e}");
                self.subscription_error = Some(e.to_string());
            }
        }
    }
}

impl Drop for ControllerSession {
    fn drop(&mut self) {
        self.disconnect("session dropped");
    }
}
