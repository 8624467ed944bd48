//! Workout session runtime.
//!
//! A single tokio task owns the [`SessionAccumulator`]. Telemetry and control
//! commands reach it through one queue, the 1 Hz interval lives inside the
//! same task, and every state change is published on a `watch` channel. No
//! state is shared between threads.

use crate::recording::accumulator::SessionAccumulator;
use crate::recording::types::{SessionConfig, SessionError, SessionSnapshot, TICK_INTERVAL};
use crate::sensors::ftms::{IndoorBikeData, ResistanceRange};
use chrono::Utc;
use std::time::Instant;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{Interval, MissedTickBehavior};

enum Command {
    Start(oneshot::Sender<()>),
    Pause(oneshot::Sender<()>),
    Resume(oneshot::Sender<bool>),
    Stop(oneshot::Sender<SessionSnapshot>),
    BikeData(IndoorBikeData, Instant),
    HeartRate(u16, Instant),
    ResistanceRange(ResistanceRange),
    ClearResistanceRange,
    Shutdown,
}

/// Handle to a running session task. Cheap to clone.
#[derive(Clone)]
pub struct WorkoutSession {
    commands: mpsc::UnboundedSender<Command>,
    snapshots: watch::Receiver<SessionSnapshot>,
}

impl WorkoutSession {
    /// Spawn the session task on the current tokio runtime.
    pub fn spawn(config: SessionConfig) -> Self {
        let (commands, rx) = mpsc::unbounded_channel();
        let (publisher, snapshots) = watch::channel(SessionSnapshot::default());
        let accumulator = SessionAccumulator::new(config);

        tokio::spawn(run(accumulator, rx, publisher));

        Self {
            commands,
            snapshots,
        }
    }

    /// Start a new session, discarding the previous one.
    pub async fn start(&self) -> Result<(), SessionError> {
        self.request(Command::Start).await
    }

    pub async fn pause(&self) -> Result<(), SessionError> {
        self.request(Command::Pause).await
    }

    /// Resume a paused session. `Ok(false)` when there was nothing to resume.
    pub async fn resume(&self) -> Result<bool, SessionError> {
        self.request(Command::Resume).await
    }

    /// Stop the session and return its final snapshot.
    ///
    /// No tick is applied after this returns.
    pub async fn stop(&self) -> Result<SessionSnapshot, SessionError> {
        self.request(Command::Stop).await
    }

    /// Feed a decoded Indoor Bike Data frame.
    pub fn on_bike_data(&self, frame: IndoorBikeData) {
        self.send(Command::BikeData(frame, now()));
    }

    /// Feed a heart rate reading.
    pub fn on_heart_rate(&self, bpm: u16) {
        self.send(Command::HeartRate(bpm, now()));
    }

    /// Record the connected bike's resistance range.
    pub fn on_resistance_range(&self, range: ResistanceRange) {
        self.send(Command::ResistanceRange(range));
    }

    /// Forget the resistance range after a disconnect.
    pub fn clear_resistance_range(&self) {
        self.send(Command::ClearResistanceRange);
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Receiver notified on every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.clone()
    }

    /// End the session task. Other handles become inert.
    pub fn shutdown(&self) {
        self.send(Command::Shutdown);
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, SessionError> {
        let (ack, reply) = oneshot::channel();
        self.commands
            .send(make(ack))
            .map_err(|_| SessionError::Closed)?;
        reply.await.map_err(|_| SessionError::Closed)
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            tracing::debug!("Session task closed, dropping input");
        }
    }
}

/// Receipt time on tokio's clock, so paused test time applies.
fn now() -> Instant {
    tokio::time::Instant::now().into_std()
}

fn new_ticker() -> Interval {
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + TICK_INTERVAL, TICK_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

/// Wait for the next tick, or forever when there is no ticker.
///
/// Returns the time the tick is handled, which trails the deadline when the
/// task runs late.
async fn next_tick(ticker: &mut Option<Interval>) -> Instant {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
            now()
        }
        None => std::future::pending().await,
    }
}

async fn run(
    mut accumulator: SessionAccumulator,
    mut commands: mpsc::UnboundedReceiver<Command>,
    publisher: watch::Sender<SessionSnapshot>,
) {
    let mut ticker: Option<Interval> = None;

    loop {
        tokio::select! {
            biased;

            command = commands.recv() => {
                let Some(command) = command else { break };
                match command {
                    Command::Start(ack) => {
                        accumulator.start(Utc::now());
                        ticker = Some(new_ticker());
                        publisher.send_replace(accumulator.snapshot());
                        let _ = ack.send(());
                    }
                    Command::Pause(ack) => {
                        accumulator.pause();
                        publisher.send_replace(accumulator.snapshot());
                        let _ = ack.send(());
                    }
                    Command::Resume(ack) => {
                        let running = accumulator.resume();
                        if running && ticker.is_none() {
                            ticker = Some(new_ticker());
                        }
                        publisher.send_replace(accumulator.snapshot());
                        let _ = ack.send(running);
                    }
                    Command::Stop(ack) => {
                        accumulator.stop();
                        ticker = None;
                        let snapshot = accumulator.snapshot();
                        publisher.send_replace(snapshot.clone());
                        let _ = ack.send(snapshot);
                    }
                    Command::BikeData(frame, at) => {
                        accumulator.on_bike_data(&frame, at);
                        publisher.send_replace(accumulator.snapshot());
                    }
                    Command::HeartRate(bpm, at) => accumulator.on_heart_rate(bpm, at),
                    Command::ResistanceRange(range) => {
                        accumulator.record_resistance_range(range);
                        publisher.send_replace(accumulator.snapshot());
                    }
                    Command::ClearResistanceRange => {
                        accumulator.clear_resistance_range();
                        publisher.send_replace(accumulator.snapshot());
                    }
                    Command::Shutdown => break,
                }
            }

            at = next_tick(&mut ticker) => {
                if accumulator.tick(at) {
                    publisher.send_replace(accumulator.snapshot());
                }
            }
        }
    }

    tracing::debug!("Session task finished");
}
