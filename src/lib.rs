//! SpinRide - indoor bike workout recorder
//!
//! Decodes FTMS Indoor Bike Data and Heart Rate Measurement notifications,
//! accumulates a 1 Hz workout session, estimates calories and exports TCX.

pub mod integrations;
pub mod metrics;
pub mod recording;
pub mod sensors;
pub mod storage;

// Re-export commonly used types
pub use metrics::calories::estimate_calories;
pub use recording::session::WorkoutSession;
pub use recording::types::{SessionSnapshot, WorkoutSummary};
pub use sensors::manager::SensorManager;
pub use storage::config::{AppConfig, UserProfile};
