//! Sensor types for the BLE transport.

use crate::sensors::ftms::FrameLayout;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Kind of BLE device this crate talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorKind {
    /// Indoor bike exposing the Fitness Machine Service
    Bike,
    /// Heart rate monitor exposing the Heart Rate Service
    HeartRate,
}

impl std::fmt::Display for SensorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SensorKind::Bike => write!(f, "Indoor Bike"),
            SensorKind::HeartRate => write!(f, "Heart Rate"),
        }
    }
}

/// Connection state of a sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "Disconnected"),
            ConnectionState::Connecting => write!(f, "Connecting..."),
            ConnectionState::Connected => write!(f, "Connected"),
        }
    }
}

/// A sensor seen during scanning.
#[derive(Debug, Clone)]
pub struct DiscoveredSensor {
    /// BLE device identifier
    pub device_id: String,
    /// Advertised local name
    pub name: String,
    pub kind: SensorKind,
    /// Signal strength (RSSI)
    pub signal_strength: Option<i16>,
    pub last_seen: Instant,
}

/// Status events from the transport.
#[derive(Debug, Clone)]
pub enum SensorEvent {
    Discovered(DiscoveredSensor),
    ConnectionChanged {
        device_id: String,
        kind: SensorKind,
        state: ConnectionState,
    },
    /// Resistance range read from the bike
    ResistanceRange {
        device_id: String,
        min: i16,
        max: i16,
        step: i16,
    },
    ScanStarted,
    ScanStopped,
    Error(String),
}

/// Transport configuration.
#[derive(Debug, Clone)]
pub struct SensorConfig {
    /// How long to scan before giving up
    pub discovery_timeout: Duration,
    /// Timeout for a single connection attempt
    pub connection_timeout: Duration,
    /// Indoor Bike Data frame layout
    pub frame_layout: FrameLayout,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            discovery_timeout: Duration::from_secs(30),
            connection_timeout: Duration::from_secs(10),
            frame_layout: FrameLayout::Fixed,
        }
    }
}

/// Errors from the BLE transport.
#[derive(Debug, Error)]
pub enum SensorError {
    #[error("Bluetooth adapter not found")]
    AdapterNotFound,

    #[error("Failed to start scanning: {0}")]
    ScanFailed(String),

    #[error("Sensor not found: {0}")]
    SensorNotFound(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Connection timed out")]
    ConnectionTimeout,

    #[error("Missing characteristic {0}")]
    MissingCharacteristic(uuid::Uuid),

    #[error("Failed to subscribe to notifications: {0}")]
    SubscriptionFailed(String),

    #[error("Read failed: {0}")]
    ReadFailed(String),

    #[error("BLE error: {0}")]
    BleError(String),
}

impl From<btleplug::Error> for SensorError {
    fn from(e: btleplug::Error) -> Self {
        SensorError::BleError(e.to_string())
    }
}
