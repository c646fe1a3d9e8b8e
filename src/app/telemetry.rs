//! Periodic telemetry batches.
//!
//! A batch is the five environment feeds in a fixed order followed by both
//! door statuses.  The environment part is all-or-nothing from the
//! caller's point of view: the first failure abandons the rest of the
//! batch and leaves the publish timestamp alone so the next tick retries
//! everything.  Door statuses are published best-effort after that.

use core::fmt::Write as _;

use crate::app::ports::{EnvironmentPort, EnvironmentReadings, MessagingPort};
use crate::app::state::{DoorId, GarageState};
use crate::config::{FeedTopic, FeedTopics};
use crate::error::{Error, TransportError};

type Payload = heapless::String<24>;

#[derive(Debug, Clone, PartialEq)]
pub enum PublishOutcome {
    /// Interval not elapsed; the transport was not touched.
    Skipped,
    /// Every environment feed went out.  Door-status failures, if any, are
    /// listed per door.
    Published { door_failures: heapless::Vec<(DoorId, TransportError), 2> },
    /// The batch was abandoned at the first failure.
    Failed(Error),
}

pub struct TelemetryPublisher {
    interval_ms: u64,
    temperature: FeedTopic,
    humidity: FeedTopic,
    pressure: FeedTopic,
    brightness: FeedTopic,
    gas: FeedTopic,
    door_status: [FeedTopic; 2],
}

impl TelemetryPublisher {
    pub fn new(topics: &FeedTopics, interval_ms: u64) -> Self {
        Self {
            interval_ms,
            temperature: topics.temperature.clone(),
            humidity: topics.humidity.clone(),
            pressure: topics.pressure.clone(),
            brightness: topics.brightness.clone(),
            gas: topics.gas.clone(),
            door_status: [topics.door1_status.clone(), topics.door2_status.clone()],
        }
    }

    pub fn is_due(&self, state: &GarageState, now_ms: u64) -> bool {
        state
            .last_published_ms()
            .is_none_or(|last| now_ms.saturating_sub(last) >= self.interval_ms)
    }

    pub fn publish_if_due(
        &self,
        state: &mut GarageState,
        now_ms: u64,
        env: &mut impl EnvironmentPort,
        transport: &mut impl MessagingPort,
    ) -> PublishOutcome {
        if !self.is_due(state, now_ms) {
            return PublishOutcome::Skipped;
        }
        self.publish_now(state, now_ms, env, transport)
    }

    /// Publish a full batch regardless of the interval.
    pub fn publish_now(
        &self,
        state: &mut GarageState,
        now_ms: u64,
        env: &mut impl EnvironmentPort,
        transport: &mut impl MessagingPort,
    ) -> PublishOutcome {
        let readings = match env.read_environment() {
            Ok(readings) => readings,
            Err(e) => return PublishOutcome::Failed(e.into()),
        };

        for (topic, payload) in self.environment_payloads(&readings) {
            if let Err(e) = transport.publish(topic, &payload) {
                return PublishOutcome::Failed(e.into());
            }
        }

        let mut door_failures = heapless::Vec::new();
        for door in DoorId::ALL {
            let payload = if state.door(door).is_open { "1" } else { "0" };
            let topic = &self.door_status[door.number() as usize - 1];
            if let Err(error) = transport.publish(topic, payload) {
                // One slot per door.
                let _ = door_failures.push((door, error));
            }
        }

        state.mark_published(now_ms);
        PublishOutcome::Published { door_failures }
    }

    fn environment_payloads(&self, r: &EnvironmentReadings) -> [(&FeedTopic, Payload); 5] {
        [
            (&self.temperature, format_payload(format_args!("{:.1}", r.temperature_f))),
            (&self.humidity, format_payload(format_args!("{:.1}", r.humidity_pct))),
            (&self.pressure, format_payload(format_args!("{:.1} hPa", r.pressure_hpa))),
            (&self.brightness, format_payload(format_args!("{:.3}", r.brightness))),
            (&self.gas, format_payload(format_args!("{}", r.raw_gas))),
        ]
    }
}

fn format_payload(args: core::fmt::Arguments<'_>) -> Payload {
    let mut out = Payload::new();
    // Sensor values never come close to 24 characters; a truncated payload
    // is still better than none.
    let _ = out.write_fmt(args);
    out
}
