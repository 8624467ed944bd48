//! Integration tests for the session runtime on virtual time.

use spinride::recording::{SessionConfig, SessionState, WorkoutSession, WorkoutSummary};
use spinride::metrics::calories::CalorieConfig;
use spinride::sensors::ftms::{parse_heart_rate_measurement, parse_indoor_bike_data, ResistanceRange};
use std::time::Duration;

const BIKE_FRAME: [u8; 10] = [0x00, 0x00, 0xB8, 0x0B, 0xA0, 0x00, 0x32, 0x00, 0x96, 0x00];

async fn advance(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

#[tokio::test(start_paused = true)]
async fn test_one_frame_one_tick() {
    let session = WorkoutSession::spawn(SessionConfig::default());
    session.start().await.unwrap();
    session.on_bike_data(parse_indoor_bike_data(&BIKE_FRAME));
    advance(1100).await;

    let snap = session.snapshot();
    assert_eq!(snap.elapsed_secs, 1);
    assert_eq!(snap.power_watts, Some(150.0));
    assert_eq!(snap.speed_kmh, Some(30.0));
    assert_eq!(snap.cadence_rpm, Some(80.0));
    assert!((snap.distance_km - 0.00833).abs() < 1e-5);
    assert!((snap.total_kj - 0.15).abs() < 1e-9);
    assert_eq!(snap.top_power_watts, 150.0);
    assert_eq!(snap.top_speed_kmh, 30.0);
    assert_eq!(snap.history.power, vec![150.0]);
    assert_eq!(snap.history.speed, vec![30.0]);
    assert_eq!(snap.history.cadence, vec![80.0]);
}

#[tokio::test(start_paused = true)]
async fn test_signal_loss_windows() {
    let session = WorkoutSession::spawn(SessionConfig::default());
    session.start().await.unwrap();
    session.on_bike_data(parse_indoor_bike_data(&BIKE_FRAME));
    session.on_heart_rate(parse_heart_rate_measurement(&[0x00, 135]).unwrap());

    advance(3500).await;
    let at_three = session.snapshot();
    assert_eq!(at_three.elapsed_secs, 3);
    assert_eq!(at_three.cadence_rpm, Some(0.0));
    assert_eq!(at_three.power_watts, Some(150.0));
    assert_eq!(at_three.heart_rate_bpm, Some(135));

    advance(1000).await;
    assert_eq!(session.snapshot().heart_rate_bpm, None);

    advance(2000).await;
    let at_six = session.snapshot();
    assert_eq!(at_six.elapsed_secs, 6);
    assert_eq!(at_six.power_watts, None);
    assert_eq!(at_six.speed_kmh, None);
    assert_eq!(at_six.history.power, vec![150.0, 150.0, 150.0, 150.0, 150.0, 0.0]);
    assert_eq!(at_six.history.heart_rate[..4], [Some(135), Some(135), Some(135), None]);
}

#[tokio::test(start_paused = true)]
async fn test_pause_resume_stop() {
    let session = WorkoutSession::spawn(SessionConfig::default());
    session.start().await.unwrap();
    for _ in 0..4 {
        session.on_bike_data(parse_indoor_bike_data(&BIKE_FRAME));
        advance(1000).await;
    }
    advance(200).await;
    assert_eq!(session.snapshot().elapsed_secs, 4);

    session.pause().await.unwrap();
    advance(5000).await;
    assert_eq!(session.snapshot().elapsed_secs, 4);
    assert_eq!(session.snapshot().history.len(), 4);

    assert!(session.resume().await.unwrap());
    session.on_bike_data(parse_indoor_bike_data(&BIKE_FRAME));
    advance(2000).await;

    let stopped = session.stop().await.unwrap();
    assert_eq!(stopped.state, SessionState::Stopped);
    assert_eq!(stopped.elapsed_secs, 6);
    assert!(stopped.history.is_consistent());
    assert_eq!(stopped.history.len(), 6);

    advance(5000).await;
    assert_eq!(session.snapshot().elapsed_secs, 6);

    let summary = WorkoutSummary::from_snapshot(&stopped, None, &CalorieConfig::default()).unwrap();
    assert!((summary.total_kj - 0.9).abs() < 1e-9);
}

#[tokio::test(start_paused = true)]
async fn test_resistance_percent_through_session() {
    let session = WorkoutSession::spawn(SessionConfig::default());
    session.on_resistance_range(ResistanceRange {
        min: 0,
        max: 100,
        step: 1,
    });
    session.start().await.unwrap();
    session.on_bike_data(parse_indoor_bike_data(&BIKE_FRAME));
    advance(10).await;

    let snap = session.snapshot();
    assert_eq!(snap.resistance_raw, Some(50.0));
    assert_eq!(snap.resistance_pct, Some(50.0));

    session.clear_resistance_range();
    advance(10).await;
    assert_eq!(session.snapshot().resistance_pct, None);
}

#[tokio::test(start_paused = true)]
async fn test_restart_resets_totals() {
    let session = WorkoutSession::spawn(SessionConfig::default());
    session.start().await.unwrap();
    session.on_bike_data(parse_indoor_bike_data(&BIKE_FRAME));
    advance(2500).await;
    session.stop().await.unwrap();

    session.start().await.unwrap();
    let fresh = session.snapshot();
    assert_eq!(fresh.state, SessionState::Running);
    assert_eq!(fresh.elapsed_secs, 0);
    assert_eq!(fresh.total_kj, 0.0);
    assert!(fresh.history.is_empty());
}
