//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ GarageController (domain)
//! ```
//!
//! Driven adapters (door switches, relays, indicators, sensors, clock,
//! messaging, lookup, storage) implement these traits.  The
//! [`GarageController`](super::controller::GarageController) consumes them
//! via generics, so the domain core never touches hardware directly.
//!
//! All port errors are typed; only the connectivity ports can produce a
//! fault that ends the process.

use core::fmt;

use crate::app::state::{DoorId, RelayId};
use crate::config::GarageConfig;
use crate::error::{
    ActuatorError, ClockError, ConnectivityError, LookupError, SensorError, TransportError,
};

// ───────────────────────────────────────────────────────────────
// Door sensor port (driven adapter: hardware → domain)
// ───────────────────────────────────────────────────────────────

/// Magnetic reed switch per door.
pub trait DoorSensorPort {
    /// `true` when the door is open.
    fn is_open(&mut self, door: DoorId) -> Result<bool, SensorError>;
}

// ───────────────────────────────────────────────────────────────
// Relay port (driven adapter: domain → hardware)
// ───────────────────────────────────────────────────────────────

pub trait RelayPort {
    /// Drive the relay to its active level, hold, then return every relay
    /// to idle.  Returns only after the relay is idle again.
    fn pulse_relay(&mut self, relay: RelayId) -> Result<(), ActuatorError>;

    /// Put every relay at its idle level.
    fn reset_relays(&mut self) -> Result<(), ActuatorError>;
}

// ───────────────────────────────────────────────────────────────
// Indicator port (LEDs + buzzer)
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Led {
    Red,
    Yellow,
    Green,
}

/// Named buzzer sequences.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeepPattern {
    /// Boot finished.
    Ready,
    /// Auto-close is about to start; the grace window follows.
    Warning,
    /// Grace window over, doors will move.
    FinalWarning,
    /// Played before each door toggles during auto-close.
    Closing,
}

impl BeepPattern {
    /// `(count, period_ms)`; each beep is on for `period_ms` then off for `period_ms`.
    pub const fn shape(self) -> (u8, u32) {
        match self {
            Self::Ready => (2, 250),
            Self::Warning => (5, 1000),
            Self::FinalWarning => (10, 100),
            Self::Closing => (3, 200),
        }
    }
}

/// LED and buzzer writes are best-effort; adapters log their own failures.
pub trait IndicatorPort {
    fn set_led(&mut self, led: Led, on: bool);

    fn all_leds_off(&mut self) {
        for led in [Led::Red, Led::Yellow, Led::Green] {
            self.set_led(led, false);
        }
    }

    /// Play a pattern to completion (blocking).
    fn beep(&mut self, pattern: BeepPattern);
}

// ───────────────────────────────────────────────────────────────
// Environment sensor port
// ───────────────────────────────────────────────────────────────

/// One sample of every environment sensor on the shield.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnvironmentReadings {
    pub temperature_f: f32,
    pub humidity_pct: f32,
    pub pressure_hpa: f32,
    /// Raw light-sensor value scaled by 1/1000.
    pub brightness: f32,
    /// Uncompensated VOC signal.
    pub raw_gas: u16,
}

pub trait EnvironmentPort {
    fn read_environment(&mut self) -> Result<EnvironmentReadings, SensorError>;
}

/// Everything the control loop drives on the board.
pub trait GarageHardware: DoorSensorPort + RelayPort + IndicatorPort + EnvironmentPort {}

impl<T: DoorSensorPort + RelayPort + IndicatorPort + EnvironmentPort> GarageHardware for T {}

// ───────────────────────────────────────────────────────────────
// Clock port
// ───────────────────────────────────────────────────────────────

/// Calendar date and time of day as read from the RTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WallTime {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl fmt::Display for WallTime {
    /// `M/D/YYYY - h:MM:SS` on a 12-hour clock without suffix.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{} - {}:{:02}:{:02}",
            self.month,
            self.day,
            self.year,
            self.hour % 12,
            self.minute,
            self.second
        )
    }
}

pub trait ClockPort {
    /// Milliseconds since boot; never goes backwards.
    fn monotonic_ms(&self) -> u64;

    /// Local wall-clock time.
    fn now(&self) -> Result<WallTime, ClockError>;

    /// Block the control loop.
    fn sleep_ms(&mut self, ms: u32);
}

// ───────────────────────────────────────────────────────────────
// Event sink port (durable log)
// ───────────────────────────────────────────────────────────────

/// Append-only record of notable events.  Best-effort: implementations
/// swallow their own write failures.
pub trait EventSink {
    fn emit(&mut self, at: Option<WallTime>, event: &super::events::GarageEvent);
}

// ───────────────────────────────────────────────────────────────
// Connectivity port (network link)
// ───────────────────────────────────────────────────────────────

pub trait ConnectivityPort {
    fn connect(&mut self) -> Result<(), ConnectivityError>;
    fn disconnect(&mut self);
    fn is_connected(&self) -> bool;
    fn set_credentials(&mut self, ssid: &str, password: &str) -> Result<(), ConnectivityError>;
}

// ───────────────────────────────────────────────────────────────
// Messaging port (pub/sub session)
// ───────────────────────────────────────────────────────────────

pub trait MessagingPort {
    fn connect(&mut self) -> Result<(), TransportError>;
    fn subscribe(&mut self, topic: &str) -> Result<(), TransportError>;
    fn publish(&mut self, topic: &str, payload: &str) -> Result<(), TransportError>;

    /// Hand every queued inbound message to `on_message`, returning how
    /// many were delivered.  An error means the session is unusable.
    fn poll(&mut self, on_message: &mut dyn FnMut(&str, &[u8])) -> Result<usize, TransportError>;
}

/// Receives inbound messages while the transport is serviced.
pub trait MessageHandler {
    fn on_message(&mut self, topic: &str, payload: &str);
}

// ───────────────────────────────────────────────────────────────
// Feed lookup port (remote key/value)
// ───────────────────────────────────────────────────────────────

pub trait FeedLookupPort {
    /// Last value stored on the given feed.
    fn last_value(&mut self, feed: &str) -> Result<heapless::String<64>, LookupError>;
}

// ───────────────────────────────────────────────────────────────
// Config port (persistent configuration)
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Stored data could not be deserialised.
    Corrupted,
    /// Underlying I/O operation failed.
    IoError,
    /// A value failed range validation.
    ValidationFailed(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Corrupted => write!(f, "stored config is corrupted"),
            Self::IoError => write!(f, "config storage I/O failed"),
            Self::ValidationFailed(why) => write!(f, "config rejected: {why}"),
        }
    }
}

impl core::error::Error for ConfigError {}

/// Load/save configuration.  `save` MUST validate before persisting.
pub trait ConfigPort {
    /// `Ok(None)` when nothing has been stored yet.
    fn load(&self) -> Result<Option<GarageConfig>, ConfigError>;
    fn save(&self, config: &GarageConfig) -> Result<(), ConfigError>;
}
