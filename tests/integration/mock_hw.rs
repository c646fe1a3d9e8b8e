//! Mock adapters for integration tests.
//!
//! The hardware double records every port call so tests can assert on the
//! full command history without touching GPIO or I2C.  The network and
//! broker doubles share their state through `Rc<RefCell<_>>` so a test can
//! keep a handle after the controller has taken ownership of the adapter.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use garagectl::app::events::GarageEvent;
use garagectl::app::ports::{
    BeepPattern, ClockPort, ConnectivityPort, DoorSensorPort, EnvironmentPort, EnvironmentReadings,
    EventSink, FeedLookupPort, IndicatorPort, Led, MessagingPort, RelayPort, WallTime,
};
use garagectl::app::state::{DoorId, RelayId};
use garagectl::error::{ActuatorError, ClockError, ConnectivityError, LookupError, SensorError, TransportError};

// ── Hardware ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HwCall {
    SetLed(Led, bool),
    AllLedsOff,
    Beep(BeepPattern),
    Pulse(RelayId),
    ResetRelays,
    ReadEnvironment,
}

pub struct MockHardware {
    pub calls: Vec<HwCall>,
    pub open: [bool; 2],
    pub door_read_fails: bool,
    pub env: Result<EnvironmentReadings, SensorError>,
    /// A relay pulse flips the matching door, like a real opener.
    pub pulse_moves_door: bool,
}

pub fn readings() -> EnvironmentReadings {
    EnvironmentReadings {
        temperature_f: 68.0,
        humidity_pct: 45.0,
        pressure_hpa: 1012.5,
        brightness: 3.2,
        raw_gas: 30_500,
    }
}

impl MockHardware {
    pub fn new() -> Self {
        Self {
            calls: Vec::new(),
            open: [false; 2],
            door_read_fails: false,
            env: Ok(readings()),
            pulse_moves_door: true,
        }
    }

    pub fn pulses(&self) -> Vec<RelayId> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                HwCall::Pulse(r) => Some(*r),
                _ => None,
            })
            .collect()
    }

    pub fn beeps(&self) -> Vec<BeepPattern> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                HwCall::Beep(p) => Some(*p),
                _ => None,
            })
            .collect()
    }

    /// Last level written to `led`, with `AllLedsOff` counting as off.
    pub fn led(&self, led: Led) -> bool {
        self.calls
            .iter()
            .rev()
            .find_map(|c| match c {
                HwCall::SetLed(l, on) if *l == led => Some(*on),
                HwCall::AllLedsOff => Some(false),
                _ => None,
            })
            .unwrap_or(false)
    }
}

impl Default for MockHardware {
    fn default() -> Self {
        Self::new()
    }
}

impl DoorSensorPort for MockHardware {
    fn is_open(&mut self, door: DoorId) -> Result<bool, SensorError> {
        if self.door_read_fails {
            return Err(SensorError::GpioReadFailed);
        }
        Ok(self.open[usize::from(door.number() - 1)])
    }
}

impl RelayPort for MockHardware {
    fn pulse_relay(&mut self, relay: RelayId) -> Result<(), ActuatorError> {
        self.calls.push(HwCall::Pulse(relay));
        if self.pulse_moves_door {
            if let Some(door) = DoorId::ALL.into_iter().find(|d| d.relay() == relay) {
                let slot = usize::from(door.number() - 1);
                self.open[slot] = !self.open[slot];
            }
        }
        Ok(())
    }

    fn reset_relays(&mut self) -> Result<(), ActuatorError> {
        self.calls.push(HwCall::ResetRelays);
        Ok(())
    }
}

impl IndicatorPort for MockHardware {
    fn set_led(&mut self, led: Led, on: bool) {
        self.calls.push(HwCall::SetLed(led, on));
    }

    fn all_leds_off(&mut self) {
        self.calls.push(HwCall::AllLedsOff);
    }

    fn beep(&mut self, pattern: BeepPattern) {
        self.calls.push(HwCall::Beep(pattern));
    }
}

impl EnvironmentPort for MockHardware {
    fn read_environment(&mut self) -> Result<EnvironmentReadings, SensorError> {
        self.calls.push(HwCall::ReadEnvironment);
        self.env
    }
}

// ── Clock ─────────────────────────────────────────────────────

/// Monotonic time only moves when the controller sleeps or the test
/// advances it; the wall clock is fixed unless the test changes it.
pub struct FakeClock {
    pub now_ms: u64,
    pub wall: Option<WallTime>,
    pub sleeps: Vec<u32>,
}

pub fn at(hour: u8, minute: u8) -> WallTime {
    WallTime { year: 2024, month: 6, day: 1, hour, minute, second: 0 }
}

impl FakeClock {
    pub fn new(wall: Option<WallTime>) -> Self {
        Self { now_ms: 0, wall, sleeps: Vec::new() }
    }

    pub fn advance(&mut self, ms: u64) {
        self.now_ms += ms;
    }
}

impl ClockPort for FakeClock {
    fn monotonic_ms(&self) -> u64 {
        self.now_ms
    }

    fn now(&self) -> Result<WallTime, ClockError> {
        self.wall.ok_or(ClockError::NotSynced)
    }

    fn sleep_ms(&mut self, ms: u32) {
        self.sleeps.push(ms);
        self.now_ms += u64::from(ms);
    }
}

// ── Network link ──────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct Link {
    pub up: bool,
    pub refuse: bool,
    pub connects: usize,
    pub disconnects: usize,
}

#[derive(Clone, Default)]
pub struct MockNetwork(pub Rc<RefCell<Link>>);

impl ConnectivityPort for MockNetwork {
    fn connect(&mut self) -> Result<(), ConnectivityError> {
        let mut link = self.0.borrow_mut();
        link.connects += 1;
        if link.refuse {
            return Err(ConnectivityError::ConnectionFailed);
        }
        link.up = true;
        Ok(())
    }

    fn disconnect(&mut self) {
        let mut link = self.0.borrow_mut();
        link.up = false;
        link.disconnects += 1;
    }

    fn is_connected(&self) -> bool {
        self.0.borrow().up
    }

    fn set_credentials(&mut self, _: &str, _: &str) -> Result<(), ConnectivityError> {
        Ok(())
    }
}

// ── Broker ────────────────────────────────────────────────────

pub type Message = (String, Vec<u8>);

#[derive(Debug, Default)]
pub struct Broker {
    pub connected: bool,
    pub refuse_connect: bool,
    pub subscriptions: Vec<String>,
    pub published: Vec<(String, String)>,
    /// One entry per `poll()`; a poll with no entry delivers nothing.
    pub deliveries: VecDeque<Vec<Message>>,
    pub polls: usize,
    pub fail_poll: bool,
    /// Publishes to topics ending in any of these suffixes fail.
    pub reject_suffixes: Vec<&'static str>,
}

impl Broker {
    /// Feed keys (the part after the group) of everything published.
    pub fn published_keys(&self) -> Vec<String> {
        self.published.iter().map(|(t, _)| feed_key(t).to_owned()).collect()
    }
}

pub fn feed_key(topic: &str) -> &str {
    topic.rsplit('.').next().unwrap_or(topic)
}

#[derive(Clone, Default)]
pub struct ScriptedMessaging(pub Rc<RefCell<Broker>>);

impl ScriptedMessaging {
    /// Queue a batch for the next poll that has nothing scripted yet.
    pub fn deliver(&self, batch: Vec<Message>) {
        self.0.borrow_mut().deliveries.push_back(batch);
    }
}

pub fn msg(topic: &str, payload: &str) -> Message {
    (topic.to_owned(), payload.as_bytes().to_vec())
}

impl MessagingPort for ScriptedMessaging {
    fn connect(&mut self) -> Result<(), TransportError> {
        let mut b = self.0.borrow_mut();
        if b.refuse_connect {
            return Err(TransportError::ConnectFailed);
        }
        b.connected = true;
        Ok(())
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), TransportError> {
        self.0.borrow_mut().subscriptions.push(topic.to_owned());
        Ok(())
    }

    fn publish(&mut self, topic: &str, payload: &str) -> Result<(), TransportError> {
        let mut b = self.0.borrow_mut();
        if b.reject_suffixes.iter().any(|s| topic.ends_with(s)) {
            return Err(TransportError::PublishFailed);
        }
        b.published.push((topic.to_owned(), payload.to_owned()));
        Ok(())
    }

    fn poll(&mut self, on_message: &mut dyn FnMut(&str, &[u8])) -> Result<usize, TransportError> {
        // Take the batch first so the handler never runs under a borrow.
        let batch = {
            let mut b = self.0.borrow_mut();
            b.polls += 1;
            if b.fail_poll {
                return Err(TransportError::SessionLost);
            }
            b.deliveries.pop_front().unwrap_or_default()
        };
        for (topic, payload) in &batch {
            on_message(topic, payload);
        }
        Ok(batch.len())
    }
}

// ── Feed lookup ───────────────────────────────────────────────

pub struct MockLookup {
    pub answer: Result<&'static str, LookupError>,
    pub requests: Vec<String>,
}

impl MockLookup {
    pub fn answering(value: &'static str) -> Self {
        Self { answer: Ok(value), requests: Vec::new() }
    }

    pub fn failing(error: LookupError) -> Self {
        Self { answer: Err(error), requests: Vec::new() }
    }
}

impl FeedLookupPort for MockLookup {
    fn last_value(&mut self, feed: &str) -> Result<heapless::String<64>, LookupError> {
        self.requests.push(feed.to_owned());
        let value = self.answer?;
        heapless::String::try_from(value).map_err(|_| LookupError::Malformed)
    }
}

// ── Event sink ────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<GarageEvent>,
    pub stamps: Vec<Option<WallTime>>,
}

impl RecordingSink {
    pub fn lines(&self) -> Vec<String> {
        self.events.iter().map(ToString::to_string).collect()
    }

    pub fn contains(&self, wanted: &GarageEvent) -> bool {
        self.events.iter().any(|e| e == wanted)
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, at: Option<WallTime>, event: &GarageEvent) {
        self.stamps.push(at);
        self.events.push(*event);
    }
}
