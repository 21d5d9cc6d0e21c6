//! Debounced polling.
//!
//! A full discovery plus report exchange is too expensive to run every frame.
//! [`DebouncedPoller`] runs a real session query on the first call and then on
//! every `period`-th call; the calls in between return the cached state
//! unchanged. Input latency grows by at most `period - 1` frames, and a
//! replugged pad is picked up within one period.
//!
//! A real query reports `Connected(key)` only when a report was decoded since
//! the previous real query on the same connection. A pad that stays enumerated
//! but stops answering reads as `Disconnected` instead of holding its last keys.
//! The first query on a new connection reports `Connected(STATIONARY)` while its
//! first read is outstanding.

use crate::key::{ControllerKey, PadState};
use crate::session::{ControllerSession, QueryOutcome};
use tracing::{debug, trace};

/// Default query period, in calls.
pub const DEFAULT_PERIOD: u32 = 3;

/// Report generation seen by a real query, tagged with the connection it belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReportMark {
    pub connection: u64,
    pub generation: u32,
}

/// Poller-owned cache. Mutated only by [`DebouncedPoller::get_state`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CachedState {
    pub last: PadState,
    pub ticks_since_query: u32,
    /// `None` while disconnected.
    pub seen: Option<ReportMark>,
}

pub struct DebouncedPoller {
    session: ControllerSession,
    period: u32,
    cache: CachedState,
    real_queries: u64,
}

impl DebouncedPoller {
    /// Wrap `session`. A `period` of 0 is treated as 1 (query every call).
    pub fn new(session: ControllerSession, period: u32) -> Self {
        let period = period.max(1);
        Self {
            session,
            period,
            cache: CachedState {
                last: PadState::Disconnected,
                // Primed so the very first call performs a real query.
                ticks_since_query: period - 1,
                seen: None,
            },
            real_queries: 0,
        }
    }

    #[cfg(feature = "hid")]
    pub fn from_config(config: &crate::config::PadConfig) -> Result<Self, crate::error::DeviceError> {
        let session = ControllerSession::from_config(config)?;
        Ok(Self::new(session, config.poller.period))
    }

    /// Current pad state, querying the device at most once per period.
    pub fn get_state(&mut self) -> PadState {
        self.cache.ticks_since_query += 1;
        if self.cache.ticks_since_query < self.period {
            return self.cache.last;
        }

        self.cache.ticks_since_query = 0;
        let state = self.query();
        self.cache.last = state;
        state
    }

    fn query(&mut self) -> PadState {
        self.real_queries += 1;
        let before = self.mark();
        let outcome = self.session.query();
        trace!(?outcome, "debounced query");

        if outcome == QueryOutcome::Disconnected || !self.session.is_connected() {
            self.cache.seen = None;
            return PadState::Disconnected;
        }

        let connection = self.session.connects();
        let now = before
            .filter(|m| m.connection == connection)
            .unwrap_or(ReportMark {
                connection,
                generation: 0,
            });
        let Some(previous) = self.cache.seen.filter(|m| m.connection == connection) else {
            // First query on this connection: its read has only just been issued.
            self.cache.seen = Some(now);
            return PadState::Connected(ControllerKey::STATIONARY);
        };
        self.cache.seen = Some(now);

        if now.generation != previous.generation {
            return PadState::Connected(
                self.session
                    .latest_key()
                    .unwrap_or(ControllerKey::STATIONARY),
            );
        }
        if outcome == QueryOutcome::Busy {
            // The previous read is still outstanding.
            return self.cache.last;
        }
        debug!(generation = now.generation, "no report since the last query");
        PadState::Disconnected
    }

    /// Generation of the open connection, sampled before a query issues its read.
    fn mark(&self) -> Option<ReportMark> {
        self.session.report_generation().map(|generation| ReportMark {
            connection: self.session.connects(),
            generation,
        })
    }

    /// Last returned state without advancing the counter.
    pub fn cached(&self) -> PadState {
        self.cache.last
    }

    pub fn cache(&self) -> CachedState {
        self.cache
    }

    pub fn period(&self) -> u32 {
        self.period
    }

    /// Number of real session queries issued.
    pub fn real_queries(&self) -> u64 {
        self.real_queries
    }

    pub fn session(&self) -> &ControllerSession {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut ControllerSession {
        &mut self.session
    }

    pub fn into_session(self) -> ControllerSession {
        self.session
    }
}

impl crate::aggregator::PadSource for DebouncedPoller {
    fn get_state(&mut self) -> PadState {
        DebouncedPoller::get_state(self)
    }
}
