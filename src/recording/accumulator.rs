//! Session accumulator: the workout state machine.
//!
//! Telemetry lands in a last-known-value cache at notification rate. Once per
//! second [`SessionAccumulator::tick`] turns that cache into one history
//! sample, applying a staleness window per signal:
//!
//! | signal        | window | when stale |
//! |---------------|--------|------------|
//! | cadence       | 2.5 s  | 0 rpm      |
//! | power, speed  | 5 s    | absent     |
//! | heart rate    | 3 s    | absent     |
//!
//! Every method that depends on time takes the monotonic `Instant` from the
//! caller, so the accumulator itself never reads a clock.

use crate::recording::types::{SessionConfig, SessionHistory, SessionSnapshot, SessionState};
use crate::sensors::calibration::ResistanceCalibration;
use crate::sensors::ftms::{IndoorBikeData, ResistanceRange};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Latest value of one signal and when it arrived.
#[derive(Debug, Clone, Copy)]
struct Signal<T> {
    value: T,
    at: Instant,
}

impl<T: Copy> Signal<T> {
    fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.at)
    }

    /// Value if received no more than `window` before `now`.
    fn within(&self, now: Instant, window: Duration) -> Option<T> {
        (self.age(now) <= window).then_some(self.value)
    }
}

/// Per-signal last-known-value cache.
#[derive(Debug, Clone, Default)]
struct LastKnown {
    power: Option<Signal<f64>>,
    speed: Option<Signal<f64>>,
    cadence: Option<Signal<f64>>,
    heart_rate: Option<Signal<u16>>,
}

fn record<T>(slot: &mut Option<Signal<T>>, value: T, at: Instant) {
    // Receipt times never go backwards per signal
    let at = match slot {
        Some(previous) if previous.at > at => previous.at,
        _ => at,
    };
    *slot = Some(Signal { value, at });
}

/// Owns one workout session's mutable state.
#[derive(Debug)]
pub struct SessionAccumulator {
    config: SessionConfig,
    calibration: ResistanceCalibration,
    last: LastKnown,
    /// Published view; histories are copy-on-write.
    current: SessionSnapshot,
}

impl SessionAccumulator {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            calibration: ResistanceCalibration::new(),
            last: LastKnown::default(),
            current: SessionSnapshot::default(),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        self.current.state
    }

    pub fn calibration(&self) -> &ResistanceCalibration {
        &self.calibration
    }

    /// Immutable copy of the current state.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.current.clone()
    }

    /// Begin a new session, discarding any previous one.
    pub fn start(&mut self, started_at: DateTime<Utc>) {
        let previous = std::mem::take(&mut self.current);
        self.current = SessionSnapshot {
            state: SessionState::Running,
            started_at: Some(started_at),
            // Live dial values carry over; staleness expires them at the next tick.
            power_watts: previous.power_watts,
            speed_kmh: previous.speed_kmh,
            cadence_rpm: previous.cadence_rpm,
            resistance_raw: previous.resistance_raw,
            resistance_pct: previous.resistance_pct,
            ..Default::default()
        };
        tracing::info!("Session started at {}", started_at.to_rfc3339());
    }

    /// Stop accumulating without ending the session.
    pub fn pause(&mut self) {
        if self.current.state == SessionState::Running {
            self.current.state = SessionState::Paused;
            tracing::info!("Session paused at {}s", self.current.elapsed_secs);
        }
    }

    /// Resume a paused session. Returns whether a session is now running.
    ///
    /// No-op on an idle or stopped accumulator.
    pub fn resume(&mut self) -> bool {
        match self.current.state {
            SessionState::Paused => {
                self.current.state = SessionState::Running;
                tracing::info!("Session resumed at {}s", self.current.elapsed_secs);
                true
            }
            SessionState::Running => true,
            SessionState::Idle | SessionState::Stopped => {
                tracing::debug!("Resume ignored in state {}", self.current.state);
                false
            }
        }
    }

    /// Freeze the session. Its data stays readable until the next start.
    pub fn stop(&mut self) {
        if self.current.state.is_active() {
            self.current.state = SessionState::Stopped;
            tracing::info!(
                "Session stopped: {}s, {:.2} km, {:.1} kJ",
                self.current.elapsed_secs,
                self.current.distance_km,
                self.current.total_kj
            );
        }
    }

    /// Fold a decoded bike frame into the cache and live values.
    ///
    /// Display values and peaks update immediately; history only at ticks.
    /// Peaks are frozen once the session is stopped.
    pub fn on_bike_data(&mut self, frame: &IndoorBikeData, now: Instant) {
        let active = self.current.state.is_active();

        if let Some(watts) = frame.power_watts {
            record(&mut self.last.power, watts, now);
            self.current.power_watts = Some(watts);
            if active {
                self.current.top_power_watts = self.current.top_power_watts.max(watts);
            }
        }

        if let Some(kmh) = frame.speed_kmh {
            record(&mut self.last.speed, kmh, now);
            self.current.speed_kmh = Some(kmh);
            if active {
                self.current.top_speed_kmh = self.current.top_speed_kmh.max(kmh);
            }
        }

        if let Some(rpm) = frame.cadence_rpm {
            record(&mut self.last.cadence, rpm, now);
            self.current.cadence_rpm = Some(rpm);
        }

        if let Some(level) = frame.resistance_level {
            self.current.resistance_raw = Some(level);
            self.current.resistance_pct = self.calibration.percent_of(level);
        }
    }

    /// Record a heart rate reading. Surfaced only at the next tick.
    pub fn on_heart_rate(&mut self, bpm: u16, now: Instant) {
        record(&mut self.last.heart_rate, bpm, now);
    }

    /// Record the bike's resistance range for this connection.
    pub fn record_resistance_range(&mut self, range: ResistanceRange) {
        self.calibration.record_range(range);
        if let Some(level) = self.current.resistance_raw {
            self.current.resistance_pct = self.calibration.percent_of(level);
        }
    }

    /// Forget the resistance range (bike disconnected).
    pub fn clear_resistance_range(&mut self) {
        self.calibration.clear();
        self.current.resistance_pct = None;
    }

    /// One accumulation step. Returns `false` when not running.
    pub fn tick(&mut self, now: Instant) -> bool {
        if self.current.state != SessionState::Running {
            return false;
        }

        let config = self.config;
        let cadence = match &self.last.cadence {
            None => self.current.cadence_rpm,
            Some(signal) => Some(signal.within(now, config.cadence_stale).unwrap_or(0.0)),
        };
        let power = self.last.power.and_then(|s| s.within(now, config.value_stale));
        let speed = self.last.speed.and_then(|s| s.within(now, config.value_stale));
        let heart_rate = self
            .last
            .heart_rate
            .and_then(|s| s.within(now, config.heart_rate_hold));

        let power_or_zero = power.unwrap_or(0.0);
        let speed_or_zero = speed.unwrap_or(0.0);

        let current = &mut self.current;
        current.total_kj += power_or_zero / 1000.0;
        current.distance_km += speed_or_zero / 3600.0;

        let history = Arc::make_mut(&mut current.history);
        history.push(
            power_or_zero,
            speed_or_zero,
            cadence.unwrap_or(0.0),
            heart_rate,
        );
        debug_assert!(history.is_consistent(), "history series diverged");

        current.top_power_watts = current.top_power_watts.max(power_or_zero);
        current.top_speed_kmh = current.top_speed_kmh.max(speed_or_zero);
        if let Some(bpm) = heart_rate {
            current.top_heart_rate_bpm =
                Some(current.top_heart_rate_bpm.map_or(bpm, |top| top.max(bpm)));
        }

        current.elapsed_secs += 1;
        current.power_watts = power;
        current.speed_kmh = speed;
        current.cadence_rpm = cadence;
        current.heart_rate_bpm = heart_rate;

        debug_assert_eq!(current.history.len(), current.elapsed_secs as usize);
        tracing::trace!(
            "tick {}: power={:?} speed={:?} cadence={:?} hr={:?}",
            current.elapsed_secs,
            power,
            speed,
            cadence,
            heart_rate
        );
        true
    }

    /// The session's histories, shared with published snapshots.
    pub fn history(&self) -> &SessionHistory {
        &self.current.history
    }
}

impl Default for SessionAccumulator {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}
