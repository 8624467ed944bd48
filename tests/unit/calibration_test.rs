//! Unit tests for resistance calibration.

use spinride::sensors::calibration::ResistanceCalibration;
use spinride::sensors::ftms::ResistanceRange;

fn range(min: i16, max: i16) -> ResistanceRange {
    ResistanceRange { min, max, step: 1 }
}

#[test]
fn test_percent_is_monotonic_and_bounded() {
    let mut calibration = ResistanceCalibration::new();
    calibration.record_range(range(-20, 180));

    let mut previous = f64::MIN;
    for raw in -100..=300 {
        let pct = calibration.percent_of(f64::from(raw)).unwrap();
        assert!((0.0..=100.0).contains(&pct), "raw {raw} -> {pct}");
        assert!(pct >= previous);
        previous = pct;
    }
}

#[test]
fn test_endpoints() {
    let mut calibration = ResistanceCalibration::new();
    calibration.record_range(range(10, 110));
    assert_eq!(calibration.percent_of(10.0), Some(0.0));
    assert_eq!(calibration.percent_of(110.0), Some(100.0));
    assert_eq!(calibration.percent_of(60.0), Some(50.0));
}

#[test]
fn test_absent_without_usable_range() {
    let mut calibration = ResistanceCalibration::new();
    assert_eq!(calibration.percent_of(50.0), None);

    calibration.record_range(range(40, 40));
    assert_eq!(calibration.percent_of(50.0), None);
}

#[test]
fn test_reconnect_cycle() {
    let mut calibration = ResistanceCalibration::new();
    calibration.record_range(range(0, 100));
    calibration.record_range(range(0, 200));
    assert_eq!(calibration.range(), Some(range(0, 100)));

    calibration.clear();
    assert_eq!(calibration.percent_of(50.0), None);

    calibration.record_range(range(0, 200));
    assert_eq!(calibration.percent_of(50.0), Some(25.0));
}
