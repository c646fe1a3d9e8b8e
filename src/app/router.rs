//! Inbound topic routing.
//!
//! A fixed table maps each subscribed feed to a [`Route`]; the payload is
//! then interpreted per route.  Unknown topics yield `None`.

use crate::app::commands::{DoorRequest, GarageCommand};
use crate::app::state::{DoorId, RelayId};
use crate::config::{FeedTopic, FeedTopics};

/// What a subscribed feed controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    DoorButton(DoorId),
    AutoCloseSwitch,
    ReservedRelay(RelayId),
}

pub struct MessageRouter {
    table: heapless::Vec<(FeedTopic, Route), 5>,
}

impl MessageRouter {
    pub fn new(topics: &FeedTopics) -> Self {
        let mut table = heapless::Vec::new();
        for entry in [
            (topics.door1_button.clone(), Route::DoorButton(DoorId::Door1)),
            (topics.door2_button.clone(), Route::DoorButton(DoorId::Door2)),
            (topics.relay3.clone(), Route::ReservedRelay(RelayId::Three)),
            (topics.relay4.clone(), Route::ReservedRelay(RelayId::Four)),
            (topics.auto_close.clone(), Route::AutoCloseSwitch),
        ] {
            // Capacity matches the entry count.
            let _ = table.push(entry);
        }
        Self { table }
    }

    pub fn lookup(&self, topic: &str) -> Option<Route> {
        self.table
            .iter()
            .find(|(feed, _)| feed.as_str() == topic)
            .map(|(_, route)| *route)
    }

    /// Translate one inbound message, `None` when the topic is not ours.
    pub fn route(&self, topic: &str, payload: &str) -> Option<GarageCommand> {
        let command = match self.lookup(topic)? {
            Route::DoorButton(door) => match DoorRequest::parse(payload) {
                Some(requested) => GarageCommand::ToggleDoor { door, requested },
                None => GarageCommand::IgnoredDoorPayload(door),
            },
            Route::AutoCloseSwitch => GarageCommand::SetAutoClose(payload == "ON"),
            Route::ReservedRelay(relay) => GarageCommand::ReservedRelay(relay),
        };
        Some(command)
    }
}
