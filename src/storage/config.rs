//! User profile and application configuration.
//!
//! Configuration lives in `config.toml` under the platform data directory.
//! A missing file yields defaults; every section and field is optional.

use crate::metrics::calories::CalorieConfig;
use crate::recording::types::SessionConfig;
use crate::sensors::ftms::FrameLayout;
use crate::sensors::types::SensorConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Sex category used by the heart-rate calorie regression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sex {
    Male,
    Female,
    #[default]
    Unspecified,
}

impl std::fmt::Display for Sex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Sex::Male => write!(f, "Male"),
            Sex::Female => write!(f, "Female"),
            Sex::Unspecified => write!(f, "Unspecified"),
        }
    }
}

/// Physiological profile for calorie estimation. Every field is optional.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UserProfile {
    /// Body mass in kilograms
    pub mass_kg: Option<f64>,
    /// Age in years
    pub age: Option<u32>,
    pub sex: Sex,
}

impl UserProfile {
    /// Validate body mass (20-300 kg).
    pub fn validate_mass(mass_kg: f64) -> bool {
        (20.0..=300.0).contains(&mass_kg)
    }

    /// Validate age (5-120 years).
    pub fn validate_age(age: u32) -> bool {
        (5..=120).contains(&age)
    }

    /// Drop fields that fail validation so the estimator falls back cleanly.
    pub fn sanitized(self) -> Self {
        Self {
            mass_kg: self.mass_kg.filter(|&m| Self::validate_mass(m)),
            age: self.age.filter(|&a| Self::validate_age(a)),
            sex: self.sex,
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub version: String,
    /// Data directory path
    #[serde(skip)]
    pub data_dir: PathBuf,
    pub sensors: SensorSettings,
    pub session: SessionSettings,
    pub calories: CalorieConfig,
    pub profile: UserProfile,
    pub strava: StravaSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            data_dir: PathBuf::new(),
            sensors: SensorSettings::default(),
            session: SessionSettings::default(),
            calories: CalorieConfig::default(),
            profile: UserProfile::default(),
            strava: StravaSettings::default(),
        }
    }
}

impl AppConfig {
    /// Directory for exported TCX files.
    pub fn rides_dir(&self) -> PathBuf {
        self.data_dir.join("rides")
    }

    /// Path of the persisted Strava token.
    pub fn strava_token_path(&self) -> PathBuf {
        self.data_dir.join("strava_token.json")
    }
}

/// Sensor-related settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorSettings {
    /// Discovery timeout in seconds
    pub discovery_timeout_secs: u32,
    /// Connection timeout in seconds
    pub connection_timeout_secs: u32,
    /// Only connect to bikes whose name contains this text
    pub bike_name_filter: Option<String>,
    /// Also look for a heart rate monitor
    pub heart_rate_monitor: bool,
    /// Indoor Bike Data frame layout
    pub frame_layout: FrameLayout,
}

impl Default for SensorSettings {
    fn default() -> Self {
        Self {
            discovery_timeout_secs: 30,
            connection_timeout_secs: 10,
            bike_name_filter: None,
            heart_rate_monitor: true,
            frame_layout: FrameLayout::Fixed,
        }
    }
}

impl SensorSettings {
    pub fn to_sensor_config(&self) -> SensorConfig {
        SensorConfig {
            discovery_timeout: Duration::from_secs(u64::from(self.discovery_timeout_secs)),
            connection_timeout: Duration::from_secs(u64::from(self.connection_timeout_secs)),
            frame_layout: self.frame_layout,
        }
    }
}

/// Staleness windows, in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    pub cadence_stale_ms: u64,
    pub value_stale_ms: u64,
    pub heart_rate_hold_ms: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        let defaults = SessionConfig::default();
        Self {
            cadence_stale_ms: defaults.cadence_stale.as_millis() as u64,
            value_stale_ms: defaults.value_stale.as_millis() as u64,
            heart_rate_hold_ms: defaults.heart_rate_hold.as_millis() as u64,
        }
    }
}

impl SessionSettings {
    pub fn to_session_config(&self) -> SessionConfig {
        SessionConfig {
            cadence_stale: Duration::from_millis(self.cadence_stale_ms),
            value_stale: Duration::from_millis(self.value_stale_ms),
            heart_rate_hold: Duration::from_millis(self.heart_rate_hold_ms),
        }
    }
}

/// Strava application credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StravaSettings {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    /// Upload automatically after a ride when a token exists
    pub upload_after_ride: bool,
}

impl Default for StravaSettings {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            redirect_uri: "http://localhost/strava-callback".to_string(),
            upload_after_ride: false,
        }
    }
}

impl StravaSettings {
    pub fn is_configured(&self) -> bool {
        !self.client_id.is_empty() && !self.client_secret.is_empty()
    }
}

/// Get the application data directory.
pub fn get_data_dir() -> PathBuf {
    directories::ProjectDirs::from("com", "spinride", "SpinRide")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Get the configuration file path.
pub fn get_config_path() -> PathBuf {
    get_data_dir().join("config.toml")
}

/// Load application configuration from the default location.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    let mut config = load_config_from(&get_config_path())?;
    config.data_dir = get_data_dir();
    Ok(config)
}

/// Load configuration from an explicit path.
///
/// The data directory is set to the file's parent directory.
pub fn load_config_from(path: &Path) -> Result<AppConfig, ConfigError> {
    let data_dir = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    if !path.exists() {
        tracing::debug!("No config at {}, using defaults", path.display());
        return Ok(AppConfig {
            data_dir,
            ..Default::default()
        });
    }

    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;

    let mut config: AppConfig =
        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))?;

    config.data_dir = data_dir;
    config.profile = config.profile.sanitized();

    Ok(config)
}

/// Save application configuration to the default location.
pub fn save_config(config: &AppConfig) -> Result<(), ConfigError> {
    save_config_to(config, &get_config_path())
}

/// Save configuration to an explicit path.
pub fn save_config_to(config: &AppConfig, path: &Path) -> Result<(), ConfigError> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
    }

    let content =
        toml::to_string_pretty(config).map_err(|e| ConfigError::SerializeError(e.to_string()))?;

    std::fs::write(path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

    Ok(())
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),
}
