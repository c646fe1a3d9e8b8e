//! Concrete implementations of the hexagonal port traits.
//!
//! | Adapter       | Implements          | Connects to                   |
//! |---------------|---------------------|-------------------------------|
//! | `hardware`    | DoorSensorPort      | reed switches (GPIO)          |
//! |               | RelayPort           | relay shield (GPIO)           |
//! |               | IndicatorPort       | LED / buzzer shield (GPIO)    |
//! |               | EnvironmentPort     | sensor shield (I2C)           |
//! | `log_sink`    | EventSink           | log file on the data volume   |
//! | `nvs`         | ConfigPort          | NVS / in-memory store         |
//! | `time`        | ClockPort           | ESP32 system timer + clock    |
//! | `wifi`        | ConnectivityPort    | ESP-IDF WiFi STA              |
//! | `mqtt`        | MessagingPort       | Adafruit IO MQTT broker       |
//! | `feed_lookup` | FeedLookupPort      | Adafruit IO REST API          |

pub mod feed_lookup;
pub mod hardware;
pub mod log_sink;
pub mod mqtt;
pub mod nvs;
pub mod time;
pub mod wifi;
