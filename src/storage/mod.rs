//! Configuration and user profile persistence.

pub mod config;

pub use config::{AppConfig, ConfigError, Sex, UserProfile};
