//! Sensor module for FTMS bikes and heart rate monitors over BLE.

pub mod calibration;
pub mod ftms;
pub mod manager;
pub mod types;

pub use calibration::ResistanceCalibration;
pub use ftms::{FrameLayout, IndoorBikeData, ResistanceRange};
pub use manager::SensorManager;
pub use types::{
    ConnectionState, DiscoveredSensor, SensorConfig, SensorError, SensorEvent, SensorKind,
};
