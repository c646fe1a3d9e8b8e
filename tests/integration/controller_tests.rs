//! End-to-end tests for the garage control loop.
//!
//! Each test boots a [`GarageController`] against the mock board, a fake
//! clock and a scripted broker, then drives it tick by tick the way the
//! firmware run loop does.

use std::cell::RefCell;
use std::ops::ControlFlow;
use std::rc::Rc;

use garagectl::app::commands::DoorRequest;
use garagectl::app::connection::{ConnectivityFault, RestartReason, RestartRequest};
use garagectl::app::controller::GarageController;
use garagectl::app::events::GarageEvent;
use garagectl::app::ports::{BeepPattern, Led, WallTime};
use garagectl::app::state::{AutoClosePhase, DoorId, RelayId};
use garagectl::config::{FeedTopics, GarageConfig};
use garagectl::error::{ConnectivityError, Error, LookupError, SensorError, TransportError};

use crate::mock_hw::{
    Broker, FakeClock, HwCall, Link, MockHardware, MockLookup, MockNetwork, RecordingSink,
    ScriptedMessaging, at, feed_key, msg,
};

/// Cooldown is counted from boot, so this is the first instant an
/// auto-close attempt may arm with the default config.
const FIRST_ELIGIBLE_MS: u64 = 30 * 60 * 1000;

struct Rig {
    controller: GarageController<MockNetwork, ScriptedMessaging>,
    topics: FeedTopics,
    link: Rc<RefCell<Link>>,
    broker: Rc<RefCell<Broker>>,
    messaging: ScriptedMessaging,
    hw: MockHardware,
    clock: FakeClock,
    sink: RecordingSink,
}

impl Rig {
    fn new(wall: Option<WallTime>) -> Self {
        let topics = FeedTopics::derive("alice").unwrap();
        let network = MockNetwork::default();
        let messaging = ScriptedMessaging::default();
        let controller =
            GarageController::new(&GarageConfig::default(), &topics, network.clone(), messaging.clone());
        Self {
            controller,
            topics,
            link: network.0,
            broker: messaging.0.clone(),
            messaging,
            hw: MockHardware::new(),
            clock: FakeClock::new(wall),
            sink: RecordingSink::default(),
        }
    }

    fn start(&mut self, lookup: &mut MockLookup) -> Result<(), RestartRequest> {
        self.controller.start(&mut self.hw, &mut self.clock, &mut self.sink, lookup)
    }

    /// Boot with auto-close enabled and clear the boot-time history.
    fn booted(wall: Option<WallTime>) -> Self {
        let mut rig = Self::new(wall);
        rig.start(&mut MockLookup::answering("ON")).unwrap();
        rig.hw.calls.clear();
        rig.sink.events.clear();
        rig.sink.stamps.clear();
        rig
    }

    fn tick(&mut self) -> ControlFlow<RestartRequest> {
        self.controller.tick(&mut self.hw, &mut self.clock, &mut self.sink)
    }

    fn published(&self) -> Vec<(String, String)> {
        self.broker.borrow().published.clone()
    }

    /// Most recent payload published on the feed with key `key`.
    fn last_payload(&self, key: &str) -> Option<String> {
        self.broker
            .borrow()
            .published
            .iter()
            .rev()
            .find(|(topic, _)| feed_key(topic) == key)
            .map(|(_, payload)| payload.clone())
    }
}

// ── Startup ───────────────────────────────────────────────────

#[test]
fn boot_connects_subscribes_and_loads_auto_close_default() {
    let mut rig = Rig::new(None);
    let mut lookup = MockLookup::answering("ON");

    assert_eq!(rig.start(&mut lookup), Ok(()));

    assert!(rig.controller.supervisor().is_established());
    assert!(rig.controller.state().auto_close_enabled);
    assert_eq!(lookup.requests, vec![rig.topics.auto_close.to_string()]);

    let subscribed = rig.broker.borrow().subscriptions.clone();
    let expected: Vec<String> = rig.topics.command_topics().iter().map(|t| t.to_string()).collect();
    assert_eq!(subscribed, expected);

    assert_eq!(
        rig.hw.calls,
        vec![
            HwCall::AllLedsOff,
            HwCall::ResetRelays,
            HwCall::SetLed(Led::Yellow, true),
            HwCall::SetLed(Led::Yellow, false),
            HwCall::SetLed(Led::Red, false),
            HwCall::SetLed(Led::Green, true),
            HwCall::SetLed(Led::Yellow, false),
            HwCall::Beep(BeepPattern::Ready),
        ]
    );
    assert_eq!(rig.sink.events, vec![GarageEvent::Initialized]);
}

#[test]
fn boot_treats_anything_but_on_as_disabled() {
    let mut rig = Rig::new(None);
    rig.start(&mut MockLookup::answering("OFF")).unwrap();
    assert!(!rig.controller.state().auto_close_enabled);
}

#[test]
fn boot_survives_failed_default_lookup() {
    let mut rig = Rig::new(None);
    let mut lookup = MockLookup::failing(LookupError::Status(404));

    assert_eq!(rig.start(&mut lookup), Ok(()));

    assert!(!rig.controller.state().auto_close_enabled);
    assert_eq!(
        rig.sink.events,
        vec![
            GarageEvent::DefaultsUnavailable(LookupError::Status(404)),
            GarageEvent::Initialized,
        ]
    );
}

#[test]
fn boot_network_failure_backs_off_then_requests_restart() {
    let mut rig = Rig::new(None);
    rig.link.borrow_mut().refuse = true;
    let mut lookup = MockLookup::answering("ON");

    let fault = ConnectivityFault::Network(ConnectivityError::ConnectionFailed);
    assert_eq!(
        rig.start(&mut lookup),
        Err(RestartRequest { reason: RestartReason::EstablishFailed(fault) })
    );

    assert!(rig.hw.led(Led::Red));
    assert_eq!(rig.clock.sleeps, vec![60_000]);
    assert!(lookup.requests.is_empty(), "no lookup without a connection");
    assert_eq!(
        rig.sink.events,
        vec![
            GarageEvent::ConnectFailed(fault),
            GarageEvent::Restarting(RestartReason::EstablishFailed(fault)),
        ]
    );
    assert!(!rig.hw.beeps().contains(&BeepPattern::Ready));
}

#[test]
fn boot_broker_refusal_names_the_session_stage() {
    let mut rig = Rig::new(None);
    rig.broker.borrow_mut().refuse_connect = true;

    let err = rig.start(&mut MockLookup::answering("ON")).unwrap_err();
    assert_eq!(
        err.reason,
        RestartReason::EstablishFailed(ConnectivityFault::Session(TransportError::ConnectFailed))
    );
    assert_eq!(rig.link.borrow().disconnects, 1);
    assert!(!rig.controller.supervisor().is_established());
}

// ── Telemetry ─────────────────────────────────────────────────

#[test]
fn first_tick_publishes_full_batch_in_order() {
    let mut rig = Rig::booted(None);

    assert_eq!(rig.tick(), ControlFlow::Continue(()));

    assert_eq!(
        rig.published(),
        vec![
            (rig.topics.temperature.to_string(), "68.0".to_owned()),
            (rig.topics.humidity.to_string(), "45.0".to_owned()),
            (rig.topics.pressure.to_string(), "1012.5 hPa".to_owned()),
            (rig.topics.brightness.to_string(), "3.200".to_owned()),
            (rig.topics.gas.to_string(), "30500".to_owned()),
            (rig.topics.door1_status.to_string(), "0".to_owned()),
            (rig.topics.door2_status.to_string(), "0".to_owned()),
        ]
    );
    assert_eq!(rig.controller.state().last_published_ms(), Some(0));
}

#[test]
fn telemetry_respects_publish_interval() {
    let mut rig = Rig::booted(None);
    assert_eq!(rig.tick(), ControlFlow::Continue(()));
    assert_eq!(rig.published().len(), 7);

    rig.clock.advance(59_999);
    assert_eq!(rig.tick(), ControlFlow::Continue(()));
    assert_eq!(rig.published().len(), 7);

    rig.clock.advance(1);
    assert_eq!(rig.tick(), ControlFlow::Continue(()));
    assert_eq!(rig.published().len(), 14);
    assert_eq!(rig.controller.state().last_published_ms(), Some(60_000));
}

#[test]
fn first_batch_after_boot_reports_real_door_positions() {
    let mut rig = Rig::new(None);
    rig.hw.open = [true, true];
    rig.start(&mut MockLookup::answering("ON")).unwrap();

    assert!(rig.controller.state().door(DoorId::Door1).is_open);
    assert!(rig.hw.led(Led::Red));
    assert!(rig.hw.led(Led::Yellow));

    assert_eq!(rig.tick(), ControlFlow::Continue(()));
    assert_eq!(rig.last_payload("door1status").as_deref(), Some("1"));
    assert_eq!(rig.last_payload("door2status").as_deref(), Some("1"));
}

#[test]
fn door_status_reflects_last_sample() {
    let mut rig = Rig::booted(None);
    rig.hw.open = [true, false];
    assert_eq!(rig.tick(), ControlFlow::Continue(()));
    assert_eq!(rig.last_payload("door1status").as_deref(), Some("1"));
    assert_eq!(rig.last_payload("door2status").as_deref(), Some("0"));

    rig.hw.open = [false, true];
    rig.clock.advance(60_000);
    assert_eq!(rig.tick(), ControlFlow::Continue(()));
    assert_eq!(rig.last_payload("door1status").as_deref(), Some("0"));
    assert_eq!(rig.last_payload("door2status").as_deref(), Some("1"));
}

#[test]
fn sensor_failure_abandons_batch_and_retries_next_tick() {
    let mut rig = Rig::booted(None);
    rig.hw.env = Err(SensorError::BusFault);

    assert_eq!(rig.tick(), ControlFlow::Continue(()));
    assert!(rig.published().is_empty());
    assert_eq!(rig.controller.state().last_published_ms(), None);
    assert_eq!(
        rig.sink.events,
        vec![GarageEvent::PublishFailed(Error::Sensor(SensorError::BusFault))]
    );

    rig.hw.env = Ok(crate::mock_hw::readings());
    rig.clock.advance(1_000);
    assert_eq!(rig.tick(), ControlFlow::Continue(()));
    assert_eq!(rig.published().len(), 7);
}

#[test]
fn environment_publish_failure_stops_the_batch() {
    let mut rig = Rig::booted(None);
    rig.broker.borrow_mut().reject_suffixes = vec![".hpa"];

    assert_eq!(rig.tick(), ControlFlow::Continue(()));

    let keys = rig.broker.borrow().published_keys();
    assert_eq!(keys, vec!["temperature", "humidity"]);
    assert_eq!(
        rig.sink.events,
        vec![GarageEvent::PublishFailed(Error::Transport(TransportError::PublishFailed))]
    );
    assert_eq!(rig.controller.state().last_published_ms(), None);
}

#[test]
fn door_status_failures_are_independent() {
    let mut rig = Rig::booted(None);
    rig.broker.borrow_mut().reject_suffixes = vec![".door1status"];

    assert_eq!(rig.tick(), ControlFlow::Continue(()));

    let keys = rig.broker.borrow().published_keys();
    assert_eq!(keys.last().map(String::as_str), Some("door2status"));
    assert_eq!(
        rig.sink.events,
        vec![GarageEvent::DoorStatusPublishFailed {
            door: DoorId::Door1,
            error: TransportError::PublishFailed,
        }]
    );
    assert_eq!(rig.controller.state().last_published_ms(), Some(0));
}

// ── Commands ──────────────────────────────────────────────────

fn calls_after_door_command(payload: &str) -> Vec<HwCall> {
    let mut rig = Rig::booted(None);
    assert_eq!(rig.tick(), ControlFlow::Continue(()));
    rig.hw.calls.clear();
    let topic = rig.topics.door1_button.to_string();
    rig.messaging.deliver(vec![msg(&topic, payload)]);
    assert_eq!(rig.tick(), ControlFlow::Continue(()));
    rig.hw.calls
}

#[test]
fn open_and_close_both_toggle_the_door() {
    let open = calls_after_door_command("OPEN");
    let close = calls_after_door_command("CLOSE");

    assert_eq!(open, close);
    assert_eq!(
        &open[..5],
        &[
            HwCall::SetLed(Led::Green, true),
            HwCall::Pulse(RelayId::One),
            HwCall::SetLed(Led::Yellow, true),
            HwCall::AllLedsOff,
            HwCall::ResetRelays,
        ]
    );
}

#[test]
fn door_toggle_is_recorded() {
    let mut rig = Rig::booted(None);
    let topic = rig.topics.door2_button.to_string();
    rig.messaging.deliver(vec![msg(&topic, "CLOSE")]);

    assert_eq!(rig.tick(), ControlFlow::Continue(()));

    assert_eq!(rig.hw.pulses(), vec![RelayId::Two]);
    assert!(rig.sink.contains(&GarageEvent::DoorToggled {
        door: DoorId::Door2,
        requested: DoorRequest::Close,
    }));
    assert!(rig.controller.state().door(DoorId::Door2).is_open);
}

#[test]
fn unrecognised_door_payload_does_not_actuate() {
    let mut rig = Rig::booted(None);
    let topic = rig.topics.door1_button.to_string();
    rig.messaging.deliver(vec![msg(&topic, "open"), msg(&topic, "TOGGLE")]);

    assert_eq!(rig.tick(), ControlFlow::Continue(()));

    assert!(rig.hw.pulses().is_empty());
    assert!(rig.hw.calls.contains(&HwCall::AllLedsOff));
}

#[test]
fn reserved_relays_and_unknown_topics_never_actuate() {
    let mut rig = Rig::booted(None);
    let relay3 = rig.topics.relay3.to_string();
    let relay4 = rig.topics.relay4.to_string();
    rig.messaging.deliver(vec![
        msg(&relay3, "ON"),
        msg(&relay4, "OPEN"),
        msg("alice/feeds/other.thing", "OPEN"),
    ]);

    assert_eq!(rig.tick(), ControlFlow::Continue(()));
    assert!(rig.hw.pulses().is_empty());
}

#[test]
fn auto_close_switch_follows_dashboard() {
    let mut rig = Rig::booted(None);
    let topic = rig.topics.auto_close.to_string();

    rig.messaging.deliver(vec![msg(&topic, "OFF")]);
    assert_eq!(rig.tick(), ControlFlow::Continue(()));
    assert!(!rig.controller.state().auto_close_enabled);

    rig.messaging.deliver(vec![msg(&topic, "ON")]);
    assert_eq!(rig.tick(), ControlFlow::Continue(()));
    assert!(rig.controller.state().auto_close_enabled);

    rig.messaging.deliver(vec![msg(&topic, "on")]);
    assert_eq!(rig.tick(), ControlFlow::Continue(()));
    assert!(!rig.controller.state().auto_close_enabled);
}

#[test]
fn non_utf8_payload_is_skipped() {
    let mut rig = Rig::booted(None);
    let topic = rig.topics.door1_button.to_string();
    rig.messaging.deliver(vec![(topic, vec![0xff, 0xfe])]);

    assert_eq!(rig.tick(), ControlFlow::Continue(()));
    assert!(rig.hw.pulses().is_empty());
}

// ── Indicators ────────────────────────────────────────────────

#[test]
fn leds_mirror_door_sensors() {
    let mut rig = Rig::booted(None);

    rig.hw.open = [true, false];
    assert_eq!(rig.tick(), ControlFlow::Continue(()));
    assert!(rig.hw.led(Led::Red));
    assert!(!rig.hw.led(Led::Green));
    assert!(!rig.hw.led(Led::Yellow));

    rig.hw.open = [false, true];
    assert_eq!(rig.tick(), ControlFlow::Continue(()));
    assert!(!rig.hw.led(Led::Red));
    assert!(rig.hw.led(Led::Green));
    assert!(rig.hw.led(Led::Yellow));
}

#[test]
fn failed_door_read_keeps_previous_sample() {
    let mut rig = Rig::booted(None);
    rig.hw.open = [true, false];
    assert_eq!(rig.tick(), ControlFlow::Continue(()));

    rig.hw.door_read_fails = true;
    rig.hw.open = [false, false];
    assert_eq!(rig.tick(), ControlFlow::Continue(()));
    assert!(rig.controller.state().door(DoorId::Door1).is_open);
    assert!(rig.sink.events.is_empty(), "door read failures stay on the console");
}

// ── Connectivity faults ───────────────────────────────────────

#[test]
fn broken_session_requests_restart_without_publishing() {
    let mut rig = Rig::booted(None);
    rig.broker.borrow_mut().fail_poll = true;

    let fault = ConnectivityFault::Session(TransportError::SessionLost);
    assert_eq!(
        rig.tick(),
        ControlFlow::Break(RestartRequest { reason: RestartReason::ConnectionLost(fault) })
    );

    assert!(rig.published().is_empty());
    assert!(rig.hw.led(Led::Red));
    assert_eq!(
        rig.sink.events,
        vec![
            GarageEvent::TransportFault(fault),
            GarageEvent::Restarting(RestartReason::ConnectionLost(fault)),
        ]
    );
    assert_eq!(rig.link.borrow().disconnects, 1);
    assert!(rig.clock.sleeps.is_empty(), "runtime faults restart without backoff");
}

#[test]
fn dropped_link_requests_restart() {
    let mut rig = Rig::booted(None);
    rig.link.borrow_mut().up = false;

    let ControlFlow::Break(request) = rig.tick() else {
        panic!("expected a restart request");
    };
    assert_eq!(
        request.reason,
        RestartReason::ConnectionLost(ConnectivityFault::Network(ConnectivityError::LinkDown))
    );
    assert_eq!(rig.broker.borrow().polls, 0);
}

// ── Auto-close ────────────────────────────────────────────────

#[test]
fn auto_close_runs_full_sequence_after_cutoff() {
    let mut rig = Rig::booted(Some(at(23, 31)));
    rig.hw.open = [true, false];
    rig.clock.now_ms = FIRST_ELIGIBLE_MS;

    assert_eq!(rig.tick(), ControlFlow::Continue(()));

    assert_eq!(rig.clock.sleeps, vec![15_000, 5_000, 1_000, 5_000]);
    assert_eq!(rig.hw.pulses(), vec![RelayId::One]);
    assert_eq!(
        rig.hw.beeps(),
        vec![BeepPattern::Warning, BeepPattern::FinalWarning, BeepPattern::Closing]
    );
    assert_eq!(
        rig.sink.events,
        vec![
            GarageEvent::AutoCloseStarting,
            GarageEvent::ClosingDoor(DoorId::Door1),
            GarageEvent::AutoCloseFinished { closed: 1 },
        ]
    );
    assert!(rig.sink.stamps.iter().all(|s| *s == Some(at(23, 31))));

    // Grace window serviced the broker once more.
    assert_eq!(rig.broker.borrow().polls, 2);

    // Regular batch plus the immediate post-close batch.
    assert_eq!(rig.published().len(), 14);
    assert_eq!(rig.last_payload("door1status").as_deref(), Some("0"));

    let state = rig.controller.state();
    assert_eq!(state.phase(), AutoClosePhase::Idle);
    assert_eq!(state.last_auto_close_attempt_ms(), FIRST_ELIGIBLE_MS);
    assert!(!state.door(DoorId::Door1).is_open);
}

#[test]
fn auto_close_toggles_every_open_door() {
    let mut rig = Rig::booted(Some(at(23, 45)));
    rig.hw.open = [true, true];
    rig.clock.now_ms = FIRST_ELIGIBLE_MS;

    assert_eq!(rig.tick(), ControlFlow::Continue(()));

    assert_eq!(rig.hw.pulses(), vec![RelayId::One, RelayId::Two]);
    assert_eq!(rig.clock.sleeps, vec![15_000, 5_000, 1_000, 5_000, 5_000]);
    assert!(rig.sink.contains(&GarageEvent::AutoCloseFinished { closed: 2 }));
}

#[test]
fn auto_close_does_not_rearm_within_cooldown() {
    let mut rig = Rig::booted(Some(at(23, 31)));
    rig.hw.open = [true, false];
    rig.clock.now_ms = FIRST_ELIGIBLE_MS;
    assert_eq!(rig.tick(), ControlFlow::Continue(()));

    // Door reopened straight away; the cooldown still holds.
    rig.hw.open = [true, false];
    rig.clock.sleeps.clear();
    assert_eq!(rig.tick(), ControlFlow::Continue(()));
    assert!(rig.clock.sleeps.is_empty());
    assert_eq!(rig.hw.pulses(), vec![RelayId::One]);
}

#[test]
fn dashboard_can_cancel_during_grace_window() {
    let mut rig = Rig::booted(Some(at(23, 31)));
    rig.hw.open = [true, false];
    rig.clock.now_ms = FIRST_ELIGIBLE_MS;
    let topic = rig.topics.auto_close.to_string();
    // First poll is the regular tick, the second is the grace window.
    rig.messaging.deliver(vec![]);
    rig.messaging.deliver(vec![msg(&topic, "OFF")]);

    assert_eq!(rig.tick(), ControlFlow::Continue(()));

    assert!(rig.hw.pulses().is_empty());
    assert_eq!(rig.clock.sleeps, vec![15_000]);
    assert_eq!(
        rig.sink.events,
        vec![GarageEvent::AutoCloseStarting, GarageEvent::AutoCloseCancelled]
    );
    assert!(!rig.controller.state().auto_close_enabled);
    assert_eq!(rig.controller.state().phase(), AutoClosePhase::Idle);
    assert_eq!(rig.published().len(), 7, "no post-close batch after a cancel");
}

#[test]
fn nothing_open_finishes_without_warning() {
    let mut rig = Rig::booted(Some(at(23, 31)));
    rig.clock.now_ms = FIRST_ELIGIBLE_MS;

    assert_eq!(rig.tick(), ControlFlow::Continue(()));

    assert_eq!(
        rig.sink.events,
        vec![GarageEvent::AutoCloseStarting, GarageEvent::AutoCloseFinished { closed: 0 }]
    );
    assert!(rig.hw.beeps().is_empty());
    assert!(rig.clock.sleeps.is_empty());
    assert_eq!(rig.controller.state().last_auto_close_attempt_ms(), FIRST_ELIGIBLE_MS);
}

#[test]
fn auto_close_waits_for_cutoff() {
    let mut rig = Rig::booted(Some(at(23, 29)));
    rig.hw.open = [true, true];
    rig.clock.now_ms = FIRST_ELIGIBLE_MS;

    assert_eq!(rig.tick(), ControlFlow::Continue(()));

    assert!(rig.hw.pulses().is_empty());
    assert!(!rig.sink.contains(&GarageEvent::AutoCloseStarting));
    assert_eq!(rig.controller.state().last_auto_close_attempt_ms(), 0);
}

#[test]
fn auto_close_needs_a_known_wall_clock() {
    let mut rig = Rig::booted(None);
    rig.hw.open = [true, true];
    rig.clock.now_ms = FIRST_ELIGIBLE_MS;

    assert_eq!(rig.tick(), ControlFlow::Continue(()));

    assert!(rig.hw.pulses().is_empty());
    assert!(rig.sink.events.is_empty());
}

#[test]
fn auto_close_waits_for_cooldown_after_boot() {
    let mut rig = Rig::booted(Some(at(23, 50)));
    rig.hw.open = [true, false];
    rig.clock.now_ms = FIRST_ELIGIBLE_MS - 1;

    assert_eq!(rig.tick(), ControlFlow::Continue(()));
    assert!(rig.hw.pulses().is_empty());

    rig.clock.advance(1);
    assert_eq!(rig.tick(), ControlFlow::Continue(()));
    assert_eq!(rig.hw.pulses(), vec![RelayId::One]);
}

#[test]
fn auto_close_disabled_at_boot_never_runs() {
    let mut rig = Rig::new(Some(at(23, 50)));
    rig.start(&mut MockLookup::answering("OFF")).unwrap();
    rig.hw.open = [true, true];
    rig.clock.now_ms = 10 * FIRST_ELIGIBLE_MS;

    assert_eq!(rig.tick(), ControlFlow::Continue(()));

    assert!(rig.hw.pulses().is_empty());
}
