//! Unit tests for TCX export of a recorded session.

use chrono::{TimeZone, Utc};
use spinride::metrics::calories::CalorieConfig;
use spinride::recording::exporter_tcx::export_tcx;
use spinride::recording::{ExportError, SessionAccumulator, SessionState, WorkoutSummary};
use spinride::sensors::ftms::parse_indoor_bike_data;
use std::time::{Duration, Instant};

fn recorded_summary(seconds: u64) -> WorkoutSummary {
    let mut acc = SessionAccumulator::default();
    acc.start(Utc.with_ymd_and_hms(2024, 5, 4, 7, 0, 0).unwrap());
    let t0 = Instant::now();

    let frame = parse_indoor_bike_data(&[0x00, 0x00, 0xB8, 0x0B, 0xA0, 0x00, 0x0A, 0x00, 0x96, 0x00]);
    for s in 1..=seconds {
        let at = t0 + Duration::from_secs(s);
        acc.on_bike_data(&frame, at - Duration::from_millis(500));
        acc.on_heart_rate(120, at - Duration::from_millis(200));
        acc.tick(at);
    }
    acc.stop();

    let snapshot = acc.snapshot();
    assert_eq!(snapshot.state, SessionState::Stopped);
    WorkoutSummary::from_snapshot(&snapshot, None, &CalorieConfig::default()).unwrap()
}

#[test]
fn test_export_recorded_session() {
    let summary = recorded_summary(10);
    let xml = export_tcx(&summary).unwrap();

    assert!(xml.contains("<Id>2024-05-04T07:00:00Z</Id>"));
    assert!(xml.contains("<TotalTimeSeconds>10</TotalTimeSeconds>"));
    // 10 s at 30 km/h
    assert!(xml.contains("<DistanceMeters>83.3</DistanceMeters>"));
    assert_eq!(xml.matches("<Trackpoint>").count(), 10);
    assert_eq!(xml.matches("<ns3:Watts>150</ns3:Watts>").count(), 10);
    assert_eq!(xml.matches("<Cadence>80</Cadence>").count(), 10);
    assert!(xml.contains("<Value>120</Value>"));
    assert!(xml.contains("<Time>2024-05-04T07:00:09Z</Time>"));
}

#[test]
fn test_export_without_ticks_is_no_data() {
    let summary = recorded_summary(0);
    assert!(matches!(export_tcx(&summary), Err(ExportError::NoData)));
}

#[test]
fn test_summary_totals() {
    let summary = recorded_summary(60);
    assert_eq!(summary.elapsed_secs, 60);
    assert!((summary.total_kj - 9.0).abs() < 1e-9);
    assert!((summary.avg_power_watts - 150.0).abs() < 1e-9);
    assert!((summary.distance_km - 0.5).abs() < 1e-9);
    assert_eq!(summary.top_heart_rate_bpm, Some(120));
    assert!(summary.estimated_kcal > 0.0);
}
