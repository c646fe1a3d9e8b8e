//! System configuration parameters
//!
//! All tunable timing for the garage controller, plus the build-time
//! secrets and the feed topics derived from the account name.  The values
//! are built once at boot and handed to each component's constructor;
//! nothing mutates them afterwards.

use core::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::app::ports::ConfigError;

/// Wall-clock time of day as hour and minute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CutoffTime {
    pub hour: u8,
    pub minute: u8,
}

/// Core system configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GarageConfig {
    // --- Telemetry ---
    /// Minimum spacing between telemetry batches (seconds)
    pub publish_interval_secs: u32,

    // --- Auto-close ---
    /// Time of day from which auto-close may run
    pub auto_close_cutoff: CutoffTime,
    /// Minimum spacing between auto-close attempts (seconds)
    pub auto_close_cooldown_secs: u32,
    /// Warning window during which the dashboard can cancel (seconds)
    pub grace_period_secs: u32,
    /// Pause between the grace window and the final warning (seconds)
    pub pre_actuation_pause_secs: u32,
    /// Pause between the final warning and the first relay pulse (seconds)
    pub final_warning_pause_secs: u32,
    /// Wait after each door toggle before the next one (seconds)
    pub actuation_settle_secs: u32,

    // --- Connectivity ---
    /// Pause before restarting after a failed connect at boot (seconds)
    pub connect_backoff_secs: u32,

    // --- Loop ---
    /// Sleep between control-loop ticks (milliseconds)
    pub loop_interval_ms: u32,

    // --- Storage ---
    /// Append-only event log on the mounted data partition
    pub log_path: heapless::String<64>,
}

/// Default location of the durable event log.
pub const DEFAULT_LOG_PATH: &str = "/data/garage_log.txt";

impl Default for GarageConfig {
    fn default() -> Self {
        let mut log_path = heapless::String::new();
        // DEFAULT_LOG_PATH is well under the 64-byte capacity.
        let _ = log_path.push_str(DEFAULT_LOG_PATH);
        Self {
            // Telemetry
            publish_interval_secs: 60,

            // Auto-close
            auto_close_cutoff: CutoffTime { hour: 23, minute: 30 },
            auto_close_cooldown_secs: 30 * 60,
            grace_period_secs: 15,
            pre_actuation_pause_secs: 5,
            final_warning_pause_secs: 1,
            actuation_settle_secs: 5,

            // Connectivity
            connect_backoff_secs: 60,

            // Loop
            loop_interval_ms: 1000,

            log_path,
        }
    }
}

impl GarageConfig {
    pub fn publish_interval_ms(&self) -> u64 {
        u64::from(self.publish_interval_secs) * 1000
    }

    pub fn auto_close_cooldown_ms(&self) -> u64 {
        u64::from(self.auto_close_cooldown_secs) * 1000
    }
}

// ---------------------------------------------------------------------------
// Secrets
// ---------------------------------------------------------------------------

/// Credentials baked in at build time from the environment.
///
/// | Variable                | Meaning                        |
/// |-------------------------|--------------------------------|
/// | `GARAGE_WIFI_SSID`      | WiFi network name              |
/// | `GARAGE_WIFI_PASSWORD`  | WiFi passphrase (empty = open) |
/// | `GARAGE_AIO_USERNAME`   | Adafruit IO account name       |
/// | `GARAGE_AIO_KEY`        | Adafruit IO key                |
/// | `GARAGE_MQTT_BROKER`    | broker host (io.adafruit.com)  |
/// | `GARAGE_MQTT_PORT`      | broker port (8883)             |
#[derive(Debug, Clone, Copy)]
pub struct Secrets {
    pub wifi_ssid: &'static str,
    pub wifi_password: &'static str,
    pub aio_username: &'static str,
    pub aio_key: &'static str,
    pub broker: &'static str,
    pub port: u16,
}

const DEFAULT_BROKER: &str = "io.adafruit.com";
const DEFAULT_TLS_PORT: u16 = 8883;

impl Secrets {
    pub fn from_build_env() -> Self {
        Self {
            wifi_ssid: option_env!("GARAGE_WIFI_SSID").unwrap_or(""),
            wifi_password: option_env!("GARAGE_WIFI_PASSWORD").unwrap_or(""),
            aio_username: option_env!("GARAGE_AIO_USERNAME").unwrap_or(""),
            aio_key: option_env!("GARAGE_AIO_KEY").unwrap_or(""),
            broker: option_env!("GARAGE_MQTT_BROKER").unwrap_or(DEFAULT_BROKER),
            port: option_env!("GARAGE_MQTT_PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(DEFAULT_TLS_PORT),
        }
    }
}

// ---------------------------------------------------------------------------
// Feed topics
// ---------------------------------------------------------------------------

pub const MAX_TOPIC_LEN: usize = 96;

/// Bounded topic identifier, e.g. `alice/feeds/garagegroup.door1button`.
pub type FeedTopic = heapless::String<MAX_TOPIC_LEN>;

/// Dashboard group every garage feed lives in.
pub const FEED_GROUP: &str = "garagegroup";

/// Every topic the controller touches, derived once from the account name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedTopics {
    // inbound commands
    pub door1_button: FeedTopic,
    pub door2_button: FeedTopic,
    pub relay3: FeedTopic,
    pub relay4: FeedTopic,
    /// Inbound toggle; its persisted last value is the boot default.
    pub auto_close: FeedTopic,

    // outbound status
    pub door1_status: FeedTopic,
    pub door2_status: FeedTopic,

    // outbound telemetry
    pub temperature: FeedTopic,
    pub humidity: FeedTopic,
    pub pressure: FeedTopic,
    pub brightness: FeedTopic,
    pub gas: FeedTopic,
}

fn feed(account: &str, key: &str) -> Result<FeedTopic, ConfigError> {
    let mut topic = FeedTopic::new();
    write!(topic, "{account}/feeds/{FEED_GROUP}.{key}")
        .map_err(|_| ConfigError::ValidationFailed("account name too long for feed topics"))?;
    Ok(topic)
}

impl FeedTopics {
    pub fn derive(account: &str) -> Result<Self, ConfigError> {
        if account.is_empty() || account.contains(['/', '#', '+']) {
            return Err(ConfigError::ValidationFailed("account name must be non-empty and free of '/', '#', '+'"));
        }
        Ok(Self {
            door1_button: feed(account, "door1button")?,
            door2_button: feed(account, "door2button")?,
            relay3: feed(account, "relay3")?,
            relay4: feed(account, "relay4")?,
            auto_close: feed(account, "auto-close-doors")?,
            door1_status: feed(account, "door1status")?,
            door2_status: feed(account, "door2status")?,
            temperature: feed(account, "temperature")?,
            humidity: feed(account, "humidity")?,
            pressure: feed(account, "hpa")?,
            brightness: feed(account, "brightness")?,
            gas: feed(account, "gas")?,
        })
    }

    /// Topics the controller subscribes to, in subscription order.
    pub fn command_topics(&self) -> [&FeedTopic; 5] {
        [
            &self.door1_button,
            &self.door2_button,
            &self.relay3,
            &self.relay4,
            &self.auto_close,
        ]
    }
}
