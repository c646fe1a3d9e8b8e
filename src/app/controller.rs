//! The garage control loop.
//!
//! ```text
//!   tick:  service transport ─▶ telemetry ─▶ door sensors ─▶ auto-close
//!             │ (fault)
//!             ▼
//!          RestartRequest
//! ```
//!
//! The controller owns [`GarageState`] and the connection supervisor.  The
//! board, the clock and the durable log are passed into each call so tests
//! keep ownership of their fakes.  Nothing runs concurrently; every wait
//! goes through [`ClockPort::sleep_ms`].

use core::ops::ControlFlow;

use log::{info, warn};

use crate::app::autoclose::{AutoCloseOutcome, AutoCloseScheduler};
use crate::app::commands::GarageCommand;
use crate::app::connection::{ConnectionSupervisor, ConnectivityFault, RestartRequest};
use crate::app::events::{GarageEvent, record};
use crate::app::ports::{
    BeepPattern, ClockPort, ConnectivityPort, EventSink, FeedLookupPort, GarageHardware, Led,
    MessageHandler, MessagingPort,
};
use crate::app::router::MessageRouter;
use crate::app::state::{DoorId, GarageState};
use crate::app::telemetry::{PublishOutcome, TelemetryPublisher};
use crate::config::{FeedTopic, FeedTopics, GarageConfig};

pub struct GarageController<N, M> {
    router: MessageRouter,
    supervisor: ConnectionSupervisor<N, M>,
    publisher: TelemetryPublisher,
    scheduler: AutoCloseScheduler,
    state: GarageState,
    auto_close_feed: FeedTopic,
}

impl<N: ConnectivityPort, M: MessagingPort> GarageController<N, M> {
    pub fn new(config: &GarageConfig, topics: &FeedTopics, network: N, transport: M) -> Self {
        Self {
            router: MessageRouter::new(topics),
            supervisor: ConnectionSupervisor::new(
                network,
                transport,
                topics,
                config.connect_backoff_secs * 1000,
            ),
            publisher: TelemetryPublisher::new(topics, config.publish_interval_ms()),
            scheduler: AutoCloseScheduler::new(config),
            state: GarageState::new(0),
            auto_close_feed: topics.auto_close.clone(),
        }
    }

    pub fn state(&self) -> &GarageState {
        &self.state
    }

    pub fn supervisor(&self) -> &ConnectionSupervisor<N, M> {
        &self.supervisor
    }

    /// Boot sequence.  On `Err` the caller must restart the process.
    pub fn start<H, C, S>(
        &mut self,
        hw: &mut H,
        clock: &mut C,
        sink: &mut S,
        lookup: &mut impl FeedLookupPort,
    ) -> Result<(), RestartRequest>
    where
        H: GarageHardware,
        C: ClockPort,
        S: EventSink,
    {
        self.state = GarageState::new(clock.monotonic_ms());
        reset_indicators(hw, &*clock, sink);
        hw.set_led(Led::Yellow, true);

        if let Err(fault) = self.supervisor.establish() {
            reset_indicators(hw, &*clock, sink);
            hw.set_led(Led::Red, true);
            return Err(self.supervisor.recover_from_failed_establish(fault, clock, sink));
        }

        match lookup.last_value(&self.auto_close_feed) {
            Ok(value) => {
                self.state.auto_close_enabled = value.as_str() == "ON";
                info!("Auto-close default: {value}");
            }
            Err(e) => {
                warn!("Issue setting default values: {e}");
                record(&*clock, sink, GarageEvent::DefaultsUnavailable(e));
            }
        }

        hw.set_led(Led::Yellow, false);
        // Door LEDs show the real positions from boot on.
        self.refresh_doors(hw);
        hw.beep(BeepPattern::Ready);
        record(&*clock, sink, GarageEvent::Initialized);
        Ok(())
    }

    /// One pass of the control loop.
    pub fn tick<H, C, S>(&mut self, hw: &mut H, clock: &mut C, sink: &mut S) -> ControlFlow<RestartRequest>
    where
        H: GarageHardware,
        C: ClockPort,
        S: EventSink,
    {
        // ── 1. Connectivity ──────────────────────────────────────
        if let Err(fault) = self.service_transport(hw, &*clock, sink) {
            hw.set_led(Led::Red, true);
            return ControlFlow::Break(self.supervisor.recover(fault, &*clock, sink));
        }

        // ── 2. Telemetry ─────────────────────────────────────────
        let now = clock.monotonic_ms();
        if self.publisher.is_due(&self.state, now) {
            self.sample_doors(hw);
        }
        let outcome = self
            .publisher
            .publish_if_due(&mut self.state, now, hw, self.supervisor.transport_mut());
        log_publish(outcome, &*clock, sink);

        // ── 3. Door sensors ──────────────────────────────────────
        self.refresh_doors(hw);

        // ── 4. Auto-close ────────────────────────────────────────
        self.auto_close_if_due(hw, clock, sink);

        ControlFlow::Continue(())
    }

    fn service_transport<H, C, S>(
        &mut self,
        hw: &mut H,
        clock: &C,
        sink: &mut S,
    ) -> Result<usize, ConnectivityFault>
    where
        H: GarageHardware,
        C: ClockPort,
        S: EventSink,
    {
        let mut dispatch = CommandDispatch {
            router: &self.router,
            state: &mut self.state,
            hw,
            clock,
            sink,
        };
        self.supervisor.service(&mut dispatch)
    }

    /// Read both reed switches into the state, keeping the last sample on error.
    fn sample_doors(&mut self, hw: &mut impl GarageHardware) {
        for door in DoorId::ALL {
            match hw.is_open(door) {
                Ok(open) => self.state.set_door_open(door, open),
                Err(e) => warn!("Could not read {door} sensor, keeping last sample: {e}"),
            }
        }
    }

    /// Sample the doors and mirror them on the LEDs.
    fn refresh_doors(&mut self, hw: &mut impl GarageHardware) {
        self.sample_doors(hw);
        let door1_open = self.state.door(DoorId::Door1).is_open;
        hw.set_led(Led::Red, door1_open);
        hw.set_led(Led::Green, !door1_open);
        hw.set_led(Led::Yellow, self.state.door(DoorId::Door2).is_open);
    }

    fn auto_close_if_due<H, C, S>(&mut self, hw: &mut H, clock: &mut C, sink: &mut S)
    where
        H: GarageHardware,
        C: ClockPort,
        S: EventSink,
    {
        let now = clock.monotonic_ms();
        let Some(open) = self.scheduler.try_arm(&mut self.state, now, &*clock) else {
            return;
        };
        let outcome = self.run_auto_close(&open, hw, clock, sink);
        self.scheduler.disarm(&mut self.state);

        let closed = match outcome {
            AutoCloseOutcome::Cancelled => {
                info!("Auto-close cancelled");
                record(&*clock, sink, GarageEvent::AutoCloseCancelled);
                return;
            }
            AutoCloseOutcome::NothingOpen => 0,
            AutoCloseOutcome::Closed(n) => n,
        };
        record(&*clock, sink, GarageEvent::AutoCloseFinished { closed });

        // Report the post-close position straight away.
        self.refresh_doors(hw);
        let now = clock.monotonic_ms();
        let outcome = self
            .publisher
            .publish_now(&mut self.state, now, hw, self.supervisor.transport_mut());
        log_publish(outcome, &*clock, sink);
    }

    fn run_auto_close<H, C, S>(
        &mut self,
        open: &[DoorId],
        hw: &mut H,
        clock: &mut C,
        sink: &mut S,
    ) -> AutoCloseOutcome
    where
        H: GarageHardware,
        C: ClockPort,
        S: EventSink,
    {
        info!("About to close garage doors automatically");
        record(&*clock, sink, GarageEvent::AutoCloseStarting);
        if open.is_empty() {
            return AutoCloseOutcome::NothingOpen;
        }
        let timing = self.scheduler.timing();

        hw.beep(BeepPattern::Warning);
        clock.sleep_ms(timing.grace_ms);

        // Last chance for the dashboard to turn auto-close off.
        if let Err(fault) = self.service_transport(hw, &*clock, sink) {
            warn!("Grace-window service failed: {fault}");
            record(&*clock, sink, GarageEvent::GraceServiceFailed(fault));
        }
        if !self.state.auto_close_enabled {
            return AutoCloseOutcome::Cancelled;
        }

        clock.sleep_ms(timing.pre_actuation_ms);
        hw.beep(BeepPattern::FinalWarning);
        clock.sleep_ms(timing.final_warning_ms);

        for &door in open {
            info!("Closing {door}");
            record(&*clock, sink, GarageEvent::ClosingDoor(door));
            hw.beep(BeepPattern::Closing);
            toggle_door(hw, door, &*clock, sink);
            clock.sleep_ms(timing.settle_ms);
        }
        reset_indicators(hw, &*clock, sink);
        AutoCloseOutcome::Closed(open.len() as u8)
    }
}

// ───────────────────────────────────────────────────────────────
// Command dispatch
// ───────────────────────────────────────────────────────────────

/// Message handler lent to the supervisor for one `service` call.
struct CommandDispatch<'a, H, C, S> {
    router: &'a MessageRouter,
    state: &'a mut GarageState,
    hw: &'a mut H,
    clock: &'a C,
    sink: &'a mut S,
}

impl<H: GarageHardware, C: ClockPort, S: EventSink> MessageHandler for CommandDispatch<'_, H, C, S> {
    fn on_message(&mut self, topic: &str, payload: &str) {
        info!("New message on topic {topic}: {payload}");
        let Some(command) = self.router.route(topic, payload) else {
            warn!("Ignoring message on unknown topic {topic}");
            return;
        };

        match command {
            GarageCommand::ToggleDoor { door, requested } => {
                record(self.clock, self.sink, GarageEvent::DoorToggled { door, requested });
                toggle_door(self.hw, door, self.clock, self.sink);
            }
            GarageCommand::IgnoredDoorPayload(door) => {
                info!("Unknown request for {door}: {payload}");
            }
            GarageCommand::SetAutoClose(enabled) => {
                info!("Auto-close {}", if enabled { "enabled" } else { "disabled" });
                self.state.auto_close_enabled = enabled;
            }
            GarageCommand::ReservedRelay(relay) => {
                info!("{relay} is reserved, nothing to do");
            }
        }
        reset_indicators(self.hw, self.clock, self.sink);
    }
}

// ───────────────────────────────────────────────────────────────
// Shared actions
// ───────────────────────────────────────────────────────────────

/// Press the opener button for `door`: green on, pulse, yellow on.
fn toggle_door(hw: &mut impl GarageHardware, door: DoorId, clock: &impl ClockPort, sink: &mut impl EventSink) {
    hw.set_led(Led::Green, true);
    let relay = door.relay();
    if let Err(error) = hw.pulse_relay(relay) {
        warn!("Failed to pulse {relay}: {error}");
        record(clock, sink, GarageEvent::ActuationFailed { relay: Some(relay), error });
    }
    hw.set_led(Led::Yellow, true);
}

/// All LEDs off, every relay idle.
fn reset_indicators(hw: &mut impl GarageHardware, clock: &impl ClockPort, sink: &mut impl EventSink) {
    hw.all_leds_off();
    if let Err(error) = hw.reset_relays() {
        warn!("Failed to reset relays: {error}");
        record(clock, sink, GarageEvent::ActuationFailed { relay: None, error });
    }
}

fn log_publish(outcome: PublishOutcome, clock: &impl ClockPort, sink: &mut impl EventSink) {
    match outcome {
        PublishOutcome::Skipped => {}
        PublishOutcome::Published { door_failures } => {
            info!("Published telemetry");
            for (door, error) in door_failures {
                warn!("Could not publish {door} status: {error}");
                record(clock, sink, GarageEvent::DoorStatusPublishFailed { door, error });
            }
        }
        PublishOutcome::Failed(e) => {
            warn!("Error while sending data to MQTT Broker: {e}");
            record(clock, sink, GarageEvent::PublishFailed(e));
        }
    }
}
