//! Inbound commands to the garage controller.
//!
//! The [`MessageRouter`](super::router::MessageRouter) turns dashboard
//! messages into these; the controller interprets and acts upon them.

use crate::app::state::{DoorId, RelayId};

/// What the dashboard button asked for.  The opener has a single button,
/// so both requests drive the same toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoorRequest {
    Open,
    Close,
}

impl DoorRequest {
    pub fn parse(payload: &str) -> Option<Self> {
        match payload {
            "OPEN" => Some(Self::Open),
            "CLOSE" => Some(Self::Close),
            _ => None,
        }
    }
}

/// Commands that the router can hand to the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GarageCommand {
    /// Pulse the door's relay.
    ToggleDoor { door: DoorId, requested: DoorRequest },

    /// Door feed carried something other than OPEN/CLOSE; no actuation.
    IgnoredDoorPayload(DoorId),

    /// Dashboard auto-close switch changed.
    SetAutoClose(bool),

    /// Message on a reserved relay feed; accepted, never actuated.
    ReservedRelay(RelayId),
}
