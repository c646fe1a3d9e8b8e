//! Outbound application events.
//!
//! The controller emits these through the [`EventSink`] port.  Their
//! `Display` form is the exact text written to the durable log.

use core::fmt;

use crate::app::commands::DoorRequest;
use crate::app::connection::{ConnectivityFault, RestartReason};
use crate::app::ports::{ClockPort, EventSink};
use crate::app::state::{DoorId, RelayId};
use crate::error::{ActuatorError, Error, LookupError, SensorError, TransportError};

/// Structured events emitted by the garage controller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GarageEvent {
    /// Boot sequence finished.
    Initialized,

    /// Connectivity could not be established at boot.
    ConnectFailed(ConnectivityFault),

    /// An established session broke while being serviced.
    TransportFault(ConnectivityFault),

    /// The process is about to restart.
    Restarting(RestartReason),

    /// The I2C sensor shield did not come up at boot; the board restarts.
    SensorShieldFailed(SensorError),

    /// The persisted auto-close default could not be fetched.
    DefaultsUnavailable(LookupError),

    /// A telemetry batch was abandoned.
    PublishFailed(Error),

    /// One door-status publish failed; the other is unaffected.
    DoorStatusPublishFailed { door: DoorId, error: TransportError },

    /// A dashboard button toggled a door.
    DoorToggled { door: DoorId, requested: DoorRequest },

    ActuationFailed { relay: Option<RelayId>, error: ActuatorError },

    AutoCloseStarting,

    ClosingDoor(DoorId),

    /// The transport could not be serviced inside the grace window.
    GraceServiceFailed(ConnectivityFault),

    /// The dashboard switch was turned off during the grace window.
    AutoCloseCancelled,

    AutoCloseFinished { closed: u8 },
}

impl fmt::Display for GarageEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Initialized => write!(f, "Initialized"),
            Self::ConnectFailed(fault) => {
                write!(f, "Something went wrong connecting to the MQTT server: {fault}")
            }
            Self::TransportFault(fault) => write!(f, "Failed while running the MQTT loop: {fault}"),
            Self::Restarting(reason) => {
                write!(f, "Performing soft reboot to recover from broken connections ({reason})")
            }
            Self::SensorShieldFailed(e) => {
                write!(f, "Performing soft reboot, sensor shield failed to initialize: {e}")
            }
            Self::DefaultsUnavailable(e) => write!(f, "Issue setting default values: {e}"),
            Self::PublishFailed(e) => write!(f, "Error while sending data to MQTT Broker: {e}"),
            Self::DoorStatusPublishFailed { door, error } => {
                write!(f, "Error while sending {door} status: {error}")
            }
            Self::DoorToggled { door, requested } => {
                write!(f, "Dashboard {:?} request toggled {door}", requested)
            }
            Self::ActuationFailed { relay: Some(relay), error } => {
                write!(f, "Failed to drive {relay}: {error}")
            }
            Self::ActuationFailed { relay: None, error } => write!(f, "Failed to reset relays: {error}"),
            Self::AutoCloseStarting => write!(f, "About to close garage doors automatically"),
            Self::ClosingDoor(door) => write!(f, "Closing {door}"),
            Self::GraceServiceFailed(fault) => {
                write!(f, "Failed to run the MQTT loop during the auto-close warning: {fault}")
            }
            Self::AutoCloseCancelled => write!(f, "Auto-close cancelled from the dashboard"),
            Self::AutoCloseFinished { closed } => write!(f, "Auto-close finished, {closed} door(s) toggled"),
        }
    }
}

/// Stamp `event` with the current wall time (when known) and hand it to `sink`.
pub fn record(clock: &impl ClockPort, sink: &mut impl EventSink, event: GarageEvent) {
    sink.emit(clock.now().ok(), &event);
}
