//! Network link and messaging session lifecycle.
//!
//! The supervisor owns both halves of the connection.  It brings them up
//! once at boot and services the session every tick.  Any failure after
//! boot is fatal: the supervisor logs it and hands back a
//! [`RestartRequest`] for the run-loop driver to execute.  Nothing is ever
//! reconnected in place.

use core::fmt;

use log::{error, info, warn};

use crate::app::events::{GarageEvent, record};
use crate::app::ports::{ClockPort, ConnectivityPort, EventSink, MessageHandler, MessagingPort};
use crate::config::{FeedTopic, FeedTopics};
use crate::error::{ConnectivityError, TransportError};

/// A failure of the network link or the messaging session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityFault {
    Network(ConnectivityError),
    Session(TransportError),
    Subscribe(TransportError),
}

impl fmt::Display for ConnectivityFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network(e) => write!(f, "network link: {e}"),
            Self::Session(e) => write!(f, "broker session: {e}"),
            Self::Subscribe(e) => write!(f, "subscription: {e}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartReason {
    /// Connectivity never came up at boot.
    EstablishFailed(ConnectivityFault),
    /// An established connection broke.
    ConnectionLost(ConnectivityFault),
}

impl fmt::Display for RestartReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EstablishFailed(fault) => write!(f, "connect failed: {fault}"),
            Self::ConnectionLost(fault) => write!(f, "connection lost: {fault}"),
        }
    }
}

/// Ask the run-loop driver to restart the process.  All volatile state is
/// discarded; the next boot rebuilds it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "a restart request must be executed by the run loop"]
pub struct RestartRequest {
    pub reason: RestartReason,
}

pub struct ConnectionSupervisor<N, M> {
    network: N,
    transport: M,
    subscriptions: [FeedTopic; 5],
    connect_backoff_ms: u32,
    established: bool,
}

impl<N: ConnectivityPort, M: MessagingPort> ConnectionSupervisor<N, M> {
    pub fn new(network: N, transport: M, topics: &FeedTopics, connect_backoff_ms: u32) -> Self {
        Self {
            network,
            transport,
            subscriptions: topics.command_topics().map(Clone::clone),
            connect_backoff_ms,
            established: false,
        }
    }

    /// Bring up the link, open the session, subscribe to every command feed.
    pub fn establish(&mut self) -> Result<(), ConnectivityFault> {
        info!("Connecting to WiFi...");
        self.network.connect().map_err(ConnectivityFault::Network)?;
        info!("Connected to WiFi");

        info!("Connecting to MQTT broker...");
        self.transport.connect().map_err(ConnectivityFault::Session)?;
        for topic in &self.subscriptions {
            self.transport.subscribe(topic).map_err(ConnectivityFault::Subscribe)?;
            info!("Subscribed to {topic}");
        }
        self.established = true;
        Ok(())
    }

    pub fn is_established(&self) -> bool {
        self.established
    }

    /// Drain pending inbound messages into `handler`.
    pub fn service(&mut self, handler: &mut dyn MessageHandler) -> Result<usize, ConnectivityFault> {
        if !self.established {
            return Err(ConnectivityFault::Session(TransportError::NotConnected));
        }
        if !self.network.is_connected() {
            return Err(ConnectivityFault::Network(ConnectivityError::LinkDown));
        }
        self.transport
            .poll(&mut |topic, payload| match core::str::from_utf8(payload) {
                Ok(text) => handler.on_message(topic, text),
                Err(_) => warn!("Dropping non-UTF-8 payload on {topic} ({} bytes)", payload.len()),
            })
            .map_err(ConnectivityFault::Session)
    }

    /// Log a fault seen while running and request a restart.
    pub fn recover(
        &mut self,
        fault: ConnectivityFault,
        clock: &impl ClockPort,
        sink: &mut impl EventSink,
    ) -> RestartRequest {
        error!("Connectivity fault: {fault}");
        record(clock, sink, GarageEvent::TransportFault(fault));
        self.restart(RestartReason::ConnectionLost(fault), clock, sink)
    }

    /// Log a boot-time connect failure, back off, then request a restart.
    pub fn recover_from_failed_establish(
        &mut self,
        fault: ConnectivityFault,
        clock: &mut impl ClockPort,
        sink: &mut impl EventSink,
    ) -> RestartRequest {
        error!("Could not establish connectivity: {fault}");
        record(&*clock, sink, GarageEvent::ConnectFailed(fault));
        clock.sleep_ms(self.connect_backoff_ms);
        self.restart(RestartReason::EstablishFailed(fault), &*clock, sink)
    }

    fn restart(
        &mut self,
        reason: RestartReason,
        clock: &impl ClockPort,
        sink: &mut impl EventSink,
    ) -> RestartRequest {
        record(clock, sink, GarageEvent::Restarting(reason));
        self.established = false;
        self.network.disconnect();
        RestartRequest { reason }
    }

    pub fn transport(&self) -> &M {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut M {
        &mut self.transport
    }

    pub fn network(&self) -> &N {
        &self.network
    }
}
