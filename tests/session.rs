mod common;

use common::{FakePad, REPORT_IDLE, REPORT_LEFT_A};
use padlink::{
    ControllerKey, ControllerSession, DebouncedPoller, DeviceEvent, DeviceIdentity, PadState,
    PresenceWatcher, QueryOutcome, SessionState,
};
use std::time::{Duration, Instant};

const IDLE_WAIT: Duration = Duration::from_secs(2);

fn session(pad: &FakePad) -> ControllerSession {
    ControllerSession::new(DeviceIdentity::SNES_PAD, pad.locator())
}

/// Run one debounce period (first call queries) and return every value seen.
fn period(poller: &mut DebouncedPoller) -> Vec<PadState> {
    let states: Vec<PadState> = (0..poller.period()).map(|_| poller.get_state()).collect();
    assert!(poller.session().wait_idle(IDLE_WAIT));
    states
}

/// One real query with the poller at period 1, then wait for its read.
fn step(poller: &mut DebouncedPoller) -> PadState {
    let state = poller.get_state();
    assert!(poller.session().wait_idle(IDLE_WAIT));
    state
}

#[test]
fn left_and_a_report_decodes_end_to_end() {
    let pad = FakePad::new(&REPORT_LEFT_A);
    let mut s = session(&pad);
    assert_eq!(s.state(), SessionState::Disconnected);

    assert_eq!(s.query(), QueryOutcome::Started);
    assert!(s.wait_idle(IDLE_WAIT));
    assert_eq!(s.state(), SessionState::Connected);
    assert_eq!(s.latest_key(), Some(ControllerKey::LEFT | ControllerKey::A));
    assert_eq!(s.device().map(|d| d.meta.to_string()).as_deref(), Some("Fake Pad (0079:0011)"));
}

#[test]
fn absent_pad_is_disconnected_not_an_error() {
    let pad = FakePad::new(&REPORT_IDLE);
    pad.unplug();
    let mut s = session(&pad);
    assert_eq!(s.query(), QueryOutcome::Disconnected);
    assert_eq!(s.query(), QueryOutcome::Disconnected);
    // Discovery finishes inside query(); it is never left observable.
    assert_eq!(s.state(), SessionState::Disconnected);
    assert_eq!(pad.finds(), 2);
    assert_eq!(pad.opens(), 0);
    assert_eq!(s.latest_key(), None);
}

#[test]
fn calls_within_one_period_share_a_single_query() {
    let pad = FakePad::new(&REPORT_LEFT_A);
    let mut poller = DebouncedPoller::new(session(&pad), 5);

    let seen: Vec<PadState> = (0..4).map(|_| poller.get_state()).collect();
    assert_eq!(poller.real_queries(), 1);
    assert_eq!(pad.finds(), 1);
    assert!(seen.windows(2).all(|w| w[0] == w[1]), "{seen:?}");
}

#[test]
fn removal_notification_forces_rediscovery() {
    let pad = FakePad::new(&REPORT_LEFT_A);
    let mut s = session(&pad);
    assert_eq!(s.query(), QueryOutcome::Started);
    assert!(s.wait_idle(IDLE_WAIT));
    assert_eq!(pad.opens(), 1);

    // Events for other interfaces are ignored.
    assert!(!s.handle_event(&DeviceEvent::Removed("some-other-device".into())));
    assert!(s.is_connected());

    assert!(s.handle_event(&DeviceEvent::Removed(FakePad::path())));
    assert_eq!(s.state(), SessionState::Disconnected);
    assert_eq!(s.latest_key(), None);

    // The next query opens a fresh handle instead of reusing the old one.
    assert_eq!(s.query(), QueryOutcome::Started);
    assert_eq!(pad.opens(), 2);
    assert_eq!(s.connects(), 2);
    assert!(s.wait_idle(IDLE_WAIT));
}

#[test]
fn queued_removal_is_applied_at_next_query() {
    let pad = FakePad::new(&REPORT_IDLE);
    let mut s = session(&pad);
    s.query();
    assert!(s.wait_idle(IDLE_WAIT));

    let sink = s.notification_sink();
    pad.unplug();
    assert!(sink.notify(DeviceEvent::Removed(FakePad::path())));

    assert_eq!(s.query(), QueryOutcome::Disconnected);
    assert_eq!(pad.opens(), 1);
}

#[test]
fn unplug_then_replug_through_the_poller() {
    let pad = FakePad::new(&REPORT_LEFT_A);
    let mut poller = DebouncedPoller::new(session(&pad), 3);

    let first = period(&mut poller);
    assert!(first.iter().all(|s| *s == PadState::Connected(ControllerKey::STATIONARY)));
    let live = period(&mut poller);
    assert!(live.iter().all(|s| *s == PadState::Connected(ControllerKey::LEFT | ControllerKey::A)));

    pad.unplug();
    for _ in 0..3 {
        let states = period(&mut poller);
        assert!(states.iter().all(|s| *s == PadState::Disconnected), "{states:?}");
    }
    assert!(!poller.session().is_connected());

    pad.plug();
    pad.set_report(&REPORT_IDLE);
    let back = period(&mut poller);
    assert!(back[0].is_connected(), "reconnect within one period");
    let resumed = period(&mut poller);
    assert_eq!(resumed[0], PadState::Connected(ControllerKey::STATIONARY));
    assert_eq!(pad.opens(), 2);
}

#[test]
fn pad_that_stops_answering_does_not_hold_its_last_keys() {
    let pad = FakePad::new(&REPORT_LEFT_A);
    let mut poller = DebouncedPoller::new(session(&pad), 1);
    assert_eq!(step(&mut poller), PadState::Connected(ControllerKey::STATIONARY));
    assert_eq!(step(&mut poller), PadState::Connected(ControllerKey::LEFT | ControllerKey::A));

    pad.stop_answering();
    let states: Vec<PadState> = (0..20).map(|_| step(&mut poller)).collect();
    // The answer that arrived before the pad went quiet is reported once.
    assert_eq!(states[0], PadState::Connected(ControllerKey::LEFT | ControllerKey::A));
    assert!(states[1..].iter().all(|s| *s == PadState::Disconnected), "{states:?}");
    assert!(poller.session().is_connected());
    assert_eq!(pad.opens(), 1);

    pad.resume_answering();
    assert_eq!(step(&mut poller), PadState::Disconnected);
    assert_eq!(step(&mut poller), PadState::Connected(ControllerKey::LEFT | ControllerKey::A));
}

#[test]
fn presence_watcher_delivers_removal() {
    let pad = FakePad::new(&REPORT_IDLE);
    let watcher = PresenceWatcher::new(pad.locator(), Duration::from_millis(5));
    let mut s = session(&pad).with_notifier(watcher);

    assert_eq!(s.query(), QueryOutcome::Started);
    assert!(s.wait_idle(IDLE_WAIT));
    assert!(s.subscription_error().is_none());

    // Give the watcher time to take its baseline.
    std::thread::sleep(Duration::from_millis(50));
    pad.unplug();

    let deadline = Instant::now() + IDLE_WAIT;
    while s.is_connected() && Instant::now() < deadline {
        s.process_notifications();
        std::thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(s.state(), SessionState::Disconnected);
}

#[test]
fn write_failure_disconnects_without_retry() {
    let pad = FakePad::new(&REPORT_IDLE);
    let mut s = session(&pad);
    s.query();
    assert!(s.wait_idle(IDLE_WAIT));
    let writes = pad.writes.load(std::sync::atomic::Ordering::SeqCst);

    pad.unplug();
    assert_eq!(s.query(), QueryOutcome::Disconnected);
    assert_eq!(pad.writes.load(std::sync::atomic::Ordering::SeqCst), writes);
    assert!(!s.is_connected());
}
