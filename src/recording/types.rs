//! Session types: state machine states, snapshots, histories and summaries.

use crate::metrics::calories::{estimate_calories, CalorieConfig};
use crate::storage::config::UserProfile;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Fixed accumulation step.
pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Lifecycle state of a workout session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No session started yet
    #[default]
    Idle,
    /// Ticks accumulate
    Running,
    /// Ticks fire but do not accumulate
    Paused,
    /// Session frozen; data readable until the next start
    Stopped,
}

impl SessionState {
    /// A session exists and has not been stopped.
    pub fn is_active(self) -> bool {
        matches!(self, SessionState::Running | SessionState::Paused)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Idle => write!(f, "Idle"),
            SessionState::Running => write!(f, "Running"),
            SessionState::Paused => write!(f, "Paused"),
            SessionState::Stopped => write!(f, "Stopped"),
        }
    }
}

/// Staleness windows applied at each tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionConfig {
    /// Cadence older than this reads as 0 rpm
    pub cadence_stale: Duration,
    /// Power and speed older than this read as absent
    pub value_stale: Duration,
    /// Heart rate older than this reads as absent
    pub heart_rate_hold: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cadence_stale: Duration::from_millis(2500),
            value_stale: Duration::from_millis(5000),
            heart_rate_hold: Duration::from_millis(3000),
        }
    }
}

/// Per-second histories, all indexed by elapsed second.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionHistory {
    /// Power in watts (absent recorded as 0)
    pub power: Vec<f64>,
    /// Speed in km/h (absent recorded as 0)
    pub speed: Vec<f64>,
    /// Cadence in RPM
    pub cadence: Vec<f64>,
    /// Heart rate in BPM, `None` when no reading was held
    pub heart_rate: Vec<Option<u16>>,
}

impl SessionHistory {
    /// Append one tick's values to every series.
    pub fn push(&mut self, power: f64, speed: f64, cadence: f64, heart_rate: Option<u16>) {
        self.power.push(power);
        self.speed.push(speed);
        self.cadence.push(cadence);
        self.heart_rate.push(heart_rate);
    }

    pub fn len(&self) -> usize {
        self.power.len()
    }

    pub fn is_empty(&self) -> bool {
        self.power.is_empty()
    }

    /// All four series have the same length.
    pub fn is_consistent(&self) -> bool {
        let len = self.power.len();
        self.speed.len() == len && self.cadence.len() == len && self.heart_rate.len() == len
    }
}

/// Immutable view of a session, published on every update.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionSnapshot {
    pub state: SessionState,
    /// Seconds accumulated (paused time excluded)
    pub elapsed_secs: u32,
    pub power_watts: Option<f64>,
    pub speed_kmh: Option<f64>,
    pub cadence_rpm: Option<f64>,
    /// Heart rate, only refreshed at tick boundaries
    pub heart_rate_bpm: Option<u16>,
    pub resistance_raw: Option<f64>,
    /// `None` when the bike never reported a usable range
    pub resistance_pct: Option<f64>,
    pub distance_km: f64,
    pub total_kj: f64,
    pub top_power_watts: f64,
    pub top_speed_kmh: f64,
    pub top_heart_rate_bpm: Option<u16>,
    /// Wall-clock start of the session
    pub started_at: Option<DateTime<Utc>>,
    pub history: Arc<SessionHistory>,
}

impl SessionSnapshot {
    /// Average power over elapsed time, 0 before the first tick.
    pub fn avg_power_watts(&self) -> f64 {
        if self.elapsed_secs == 0 {
            0.0
        } else {
            self.total_kj * 1000.0 / f64::from(self.elapsed_secs)
        }
    }

    /// Resistance for display: percent when calibrated, else the raw level.
    pub fn resistance_label(&self) -> String {
        match (self.resistance_pct, self.resistance_raw) {
            (Some(pct), _) => format!("{:.0}%", pct),
            (None, Some(raw)) => format!("{:.0}", raw),
            (None, None) => "--".to_string(),
        }
    }
}

/// Everything an exporter needs once a session has stopped.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkoutSummary {
    pub elapsed_secs: u32,
    pub distance_km: f64,
    pub avg_power_watts: f64,
    pub top_power_watts: f64,
    pub top_speed_kmh: f64,
    pub top_heart_rate_bpm: Option<u16>,
    pub total_kj: f64,
    pub estimated_kcal: f64,
    pub started_at: DateTime<Utc>,
    pub history: SessionHistory,
}

impl WorkoutSummary {
    /// Build a summary from a snapshot, estimating calories with the given profile.
    ///
    /// Returns `None` if the snapshot has no session start.
    pub fn from_snapshot(
        snapshot: &SessionSnapshot,
        profile: Option<&UserProfile>,
        calories: &CalorieConfig,
    ) -> Option<Self> {
        let started_at = snapshot.started_at?;
        let history = SessionHistory::clone(&snapshot.history);
        let estimated_kcal =
            estimate_calories(snapshot.total_kj, &history.heart_rate, profile, calories);

        Some(Self {
            elapsed_secs: snapshot.elapsed_secs,
            distance_km: snapshot.distance_km,
            avg_power_watts: snapshot.avg_power_watts(),
            top_power_watts: snapshot.top_power_watts,
            top_speed_kmh: snapshot.top_speed_kmh,
            top_heart_rate_bpm: snapshot.top_heart_rate_bpm,
            total_kj: snapshot.total_kj,
            estimated_kcal,
            started_at,
            history,
        })
    }

    /// Session start as Unix epoch milliseconds.
    pub fn start_epoch_ms(&self) -> i64 {
        self.started_at.timestamp_millis()
    }
}

/// Errors talking to the session task.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session task has shut down")]
    Closed,
}

/// Errors during export.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("No data to export")]
    NoData,

    #[error("XML error: {0}")]
    XmlError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
