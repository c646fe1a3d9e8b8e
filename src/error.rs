//! Unified error types for the garage controller.
//!
//! Every subsystem has its own small `Copy` error enum; all of them convert
//! into [`Error`] so durable log records can carry any failure without
//! allocation.  Only connectivity faults are fatal; they travel separately
//! as [`ConnectivityFault`](crate::app::connection::ConnectivityFault).

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every locally-recoverable failure funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A sensor could not be read or returned implausible data.
    Sensor(SensorError),
    /// An actuator (relay, LED, buzzer) command failed.
    Actuator(ActuatorError),
    /// The messaging transport rejected an operation.
    Transport(TransportError),
    /// The network link failed.
    Connectivity(ConnectivityError),
    /// The remote feed lookup failed.
    Lookup(LookupError),
    /// The wall clock is unavailable.
    Clock(ClockError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sensor(e) => write!(f, "sensor: {e}"),
            Self::Actuator(e) => write!(f, "actuator: {e}"),
            Self::Transport(e) => write!(f, "transport: {e}"),
            Self::Connectivity(e) => write!(f, "network: {e}"),
            Self::Lookup(e) => write!(f, "lookup: {e}"),
            Self::Clock(e) => write!(f, "clock: {e}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Sensor errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// I2C transaction failed (NACK, arbitration loss, timeout).
    BusFault,
    /// GPIO read returned an error.
    GpioReadFailed,
    /// Chip ID did not match the expected part.
    UnexpectedChip(u8),
    /// A CRC-protected word failed its checksum.
    CrcMismatch,
    /// Reading decoded to a physically impossible value.
    OutOfRange,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BusFault => write!(f, "I2C bus fault"),
            Self::GpioReadFailed => write!(f, "GPIO read failed"),
            Self::UnexpectedChip(id) => write!(f, "unexpected chip id 0x{id:02x}"),
            Self::CrcMismatch => write!(f, "CRC mismatch"),
            Self::OutOfRange => write!(f, "reading out of range"),
        }
    }
}

impl From<SensorError> for Error {
    fn from(e: SensorError) -> Self {
        Self::Sensor(e)
    }
}

// ---------------------------------------------------------------------------
// Actuator errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorError {
    /// GPIO set failed.
    GpioWriteFailed,
}

impl fmt::Display for ActuatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GpioWriteFailed => write!(f, "GPIO write failed"),
        }
    }
}

impl From<ActuatorError> for Error {
    fn from(e: ActuatorError) -> Self {
        Self::Actuator(e)
    }
}

// ---------------------------------------------------------------------------
// Transport errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    /// No session has been established yet.
    NotConnected,
    /// The broker did not accept the session.
    ConnectFailed,
    /// The broker rejected a subscription.
    SubscribeFailed,
    /// A publish could not be queued.
    PublishFailed,
    /// The session dropped after it was established.
    SessionLost,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotConnected => write!(f, "not connected to broker"),
            Self::ConnectFailed => write!(f, "broker connect failed"),
            Self::SubscribeFailed => write!(f, "subscribe failed"),
            Self::PublishFailed => write!(f, "publish failed"),
            Self::SessionLost => write!(f, "broker session lost"),
        }
    }
}

impl From<TransportError> for Error {
    fn from(e: TransportError) -> Self {
        Self::Transport(e)
    }
}

// ---------------------------------------------------------------------------
// Connectivity errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityError {
    NoCredentials,
    InvalidSsid,
    InvalidPassword,
    ConnectionFailed,
    LinkDown,
}

impl fmt::Display for ConnectivityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoCredentials => write!(f, "no WiFi credentials configured"),
            Self::InvalidSsid => write!(f, "SSID invalid (must be 1-32 printable ASCII bytes)"),
            Self::InvalidPassword => write!(f, "password invalid (must be 8-64 bytes for WPA2, or empty for open)"),
            Self::ConnectionFailed => write!(f, "WiFi connection failed"),
            Self::LinkDown => write!(f, "WiFi link down"),
        }
    }
}

impl From<ConnectivityError> for Error {
    fn from(e: ConnectivityError) -> Self {
        Self::Connectivity(e)
    }
}

// ---------------------------------------------------------------------------
// Remote lookup errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupError {
    /// The HTTP request could not be sent or the response not read.
    Request,
    /// The server answered with a non-success status.
    Status(u16),
    /// The body was not the expected JSON document.
    Malformed,
    /// The feed exists but has no stored value.
    NoValue,
}

impl fmt::Display for LookupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Request => write!(f, "HTTP request failed"),
            Self::Status(code) => write!(f, "HTTP status {code}"),
            Self::Malformed => write!(f, "malformed feed response"),
            Self::NoValue => write!(f, "feed has no last value"),
        }
    }
}

impl From<LookupError> for Error {
    fn from(e: LookupError) -> Self {
        Self::Lookup(e)
    }
}

// ---------------------------------------------------------------------------
// Clock errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockError {
    /// The wall clock has never been set.
    NotSynced,
}

impl fmt::Display for ClockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotSynced => write!(f, "wall clock not set"),
        }
    }
}

impl From<ClockError> for Error {
    fn from(e: ClockError) -> Self {
        Self::Clock(e)
    }
}

impl core::error::Error for Error {}
impl core::error::Error for SensorError {}
impl core::error::Error for ActuatorError {}
impl core::error::Error for TransportError {}
impl core::error::Error for ConnectivityError {}
impl core::error::Error for LookupError {}
impl core::error::Error for ClockError {}
