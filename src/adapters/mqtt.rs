//! MQTT session adapter for the Adafruit IO broker.
//!
//! Implements [`MessagingPort`].  The broker pushes messages from the
//! client task; they are queued and only handed to the controller when it
//! calls `poll()`, so all command handling happens on the control loop.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: `EspMqttClient` over TLS (certificate
//!   bundle) when the port is 8883, plain TCP otherwise.
//! - **all other targets**: an in-memory broker double with injection
//!   hooks for host-side tests.

use log::info;
#[cfg(target_os = "espidf")]
use log::{error, warn};

use crate::app::ports::MessagingPort;
use crate::config::Secrets;
use crate::error::TransportError;

#[cfg(not(target_os = "espidf"))]
use std::collections::VecDeque;

#[cfg(target_os = "espidf")]
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
    mpsc::{Receiver, Sender, TryRecvError, channel},
};

#[cfg(target_os = "espidf")]
use esp_idf_svc::mqtt::client::{EspMqttClient, EventPayload, MqttClientConfiguration, QoS};

const TLS_PORT: u16 = 8883;

/// How long `connect()` waits for the broker's CONNACK.
#[cfg(target_os = "espidf")]
const CONNECT_TIMEOUT_MS: u32 = 15_000;
#[cfg(target_os = "espidf")]
const CONNECT_POLL_MS: u32 = 100;

#[cfg(target_os = "espidf")]
type Inbound = (String, Vec<u8>);

/// Broker URL for the configured host and port.
pub fn broker_url(host: &str, port: u16) -> String {
    let scheme = if port == TLS_PORT { "mqtts" } else { "mqtt" };
    format!("{scheme}://{host}:{port}")
}

pub struct MqttAdapter {
    url: String,
    username: &'static str,
    key: &'static str,
    #[cfg(target_os = "espidf")]
    client: Option<EspMqttClient<'static>>,
    #[cfg(target_os = "espidf")]
    inbound: Option<Receiver<Inbound>>,
    #[cfg(target_os = "espidf")]
    connected: Arc<AtomicBool>,
    /// Set once the broker has dropped an established session.
    #[cfg(target_os = "espidf")]
    session_lost: Arc<AtomicBool>,

    #[cfg(not(target_os = "espidf"))]
    sim: SimBroker,
}

/// Simulation state: what the broker would see and deliver.
#[cfg(not(target_os = "espidf"))]
#[derive(Debug, Default)]
pub struct SimBroker {
    pub connected: bool,
    pub subscriptions: Vec<String>,
    pub published: Vec<(String, String)>,
    pub inbox: VecDeque<(String, Vec<u8>)>,
    pub refuse_connect: bool,
    pub session_lost: bool,
    pub fail_publish: bool,
}

impl MqttAdapter {
    pub fn new(secrets: &Secrets) -> Self {
        Self {
            url: broker_url(secrets.broker, secrets.port),
            username: secrets.aio_username,
            key: secrets.aio_key,
            #[cfg(target_os = "espidf")]
            client: None,
            #[cfg(target_os = "espidf")]
            inbound: None,
            #[cfg(target_os = "espidf")]
            connected: Arc::new(AtomicBool::new(false)),
            #[cfg(target_os = "espidf")]
            session_lost: Arc::new(AtomicBool::new(false)),
            #[cfg(not(target_os = "espidf"))]
            sim: SimBroker::default(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn sim(&mut self) -> &mut SimBroker {
        &mut self.sim
    }

    /// Simulation: queue a message as if the broker had delivered it.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_inject(&mut self, topic: &str, payload: &[u8]) {
        self.sim.inbox.push_back((topic.to_owned(), payload.to_vec()));
    }
}

// ───────────────────────────────────────────────────────────────
// ESP-IDF session
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
impl MessagingPort for MqttAdapter {
    fn connect(&mut self) -> Result<(), TransportError> {
        let (tx, rx): (Sender<Inbound>, Receiver<Inbound>) = channel();
        self.connected.store(false, Ordering::Release);
        self.session_lost.store(false, Ordering::Release);

        let conf = MqttClientConfiguration {
            client_id: Some(self.username),
            username: Some(self.username),
            password: Some(self.key),
            crt_bundle_attach: if self.url.starts_with("mqtts") {
                Some(esp_idf_svc::sys::esp_crt_bundle_attach)
            } else {
                None
            },
            ..Default::default()
        };

        let connected = Arc::clone(&self.connected);
        let session_lost = Arc::clone(&self.session_lost);
        info!("MQTT: connecting to {}", self.url);
        let client = EspMqttClient::new_cb(&self.url, &conf, move |event| match event.payload() {
            EventPayload::Connected(_) => connected.store(true, Ordering::Release),
            EventPayload::Disconnected => {
                if connected.swap(false, Ordering::AcqRel) {
                    session_lost.store(true, Ordering::Release);
                }
            }
            EventPayload::Received { topic: Some(topic), data, .. } => {
                // The receiver only disappears when the adapter is dropped.
                let _ = tx.send((topic.to_owned(), data.to_vec()));
            }
            EventPayload::Error(e) => warn!("MQTT: client error {e:?}"),
            _ => {}
        })
        .map_err(|e| {
            error!("MQTT: client init failed: {e}");
            TransportError::ConnectFailed
        })?;

        self.client = Some(client);
        self.inbound = Some(rx);

        let mut waited = 0;
        while !self.connected.load(Ordering::Acquire) {
            if waited >= CONNECT_TIMEOUT_MS {
                error!("MQTT: no CONNACK after {} ms", CONNECT_TIMEOUT_MS);
                self.client = None;
                return Err(TransportError::ConnectFailed);
            }
            esp_idf_svc::hal::delay::FreeRtos::delay_ms(CONNECT_POLL_MS);
            waited += CONNECT_POLL_MS;
        }
        info!("MQTT: connected");
        Ok(())
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), TransportError> {
        let client = self.client.as_mut().ok_or(TransportError::NotConnected)?;
        client
            .subscribe(topic, QoS::AtMostOnce)
            .map(|_| ())
            .map_err(|_| TransportError::SubscribeFailed)
    }

    fn publish(&mut self, topic: &str, payload: &str) -> Result<(), TransportError> {
        if !self.connected.load(Ordering::Acquire) {
            return Err(TransportError::NotConnected);
        }
        let client = self.client.as_mut().ok_or(TransportError::NotConnected)?;
        client
            .publish(topic, QoS::AtMostOnce, false, payload.as_bytes())
            .map(|_| ())
            .map_err(|_| TransportError::PublishFailed)
    }

    fn poll(&mut self, on_message: &mut dyn FnMut(&str, &[u8])) -> Result<usize, TransportError> {
        if self.session_lost.load(Ordering::Acquire) {
            return Err(TransportError::SessionLost);
        }
        let rx = self.inbound.as_ref().ok_or(TransportError::NotConnected)?;
        let mut delivered = 0;
        loop {
            match rx.try_recv() {
                Ok((topic, payload)) => {
                    on_message(&topic, &payload);
                    delivered += 1;
                }
                Err(TryRecvError::Empty) => return Ok(delivered),
                Err(TryRecvError::Disconnected) => return Err(TransportError::SessionLost),
            }
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Simulation
// ───────────────────────────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
impl MessagingPort for MqttAdapter {
    fn connect(&mut self) -> Result<(), TransportError> {
        if self.sim.refuse_connect || self.username.is_empty() || self.key.is_empty() {
            return Err(TransportError::ConnectFailed);
        }
        self.sim.connected = true;
        self.sim.session_lost = false;
        info!("MQTT(sim): connected to {}", self.url);
        Ok(())
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), TransportError> {
        if !self.sim.connected {
            return Err(TransportError::NotConnected);
        }
        self.sim.subscriptions.push(topic.to_owned());
        Ok(())
    }

    fn publish(&mut self, topic: &str, payload: &str) -> Result<(), TransportError> {
        if !self.sim.connected {
            return Err(TransportError::NotConnected);
        }
        if self.sim.fail_publish {
            return Err(TransportError::PublishFailed);
        }
        self.sim.published.push((topic.to_owned(), payload.to_owned()));
        Ok(())
    }

    fn poll(&mut self, on_message: &mut dyn FnMut(&str, &[u8])) -> Result<usize, TransportError> {
        if self.sim.session_lost {
            return Err(TransportError::SessionLost);
        }
        if !self.sim.connected {
            return Err(TransportError::NotConnected);
        }
        let mut delivered = 0;
        while let Some((topic, payload)) = self.sim.inbox.pop_front() {
            on_message(&topic, &payload);
            delivered += 1;
        }
        Ok(delivered)
    }
}
