//! Unit tests for FTMS and Heart Rate Measurement parsing.

use spinride::sensors::ftms::{
    parse_heart_rate_measurement, parse_indoor_bike_data, parse_indoor_bike_data_flagged,
    parse_supported_resistance_range, FrameLayout, ResistanceRange,
};

#[test]
fn test_fixed_frame_reference_values() {
    // flags 0, speed 30.00 km/h, cadence 160/2 rpm, resistance 10, power 150 W
    let data = [0x00, 0x00, 0xB8, 0x0B, 0xA0, 0x00, 0x0A, 0x00, 0x96, 0x00];
    let frame = parse_indoor_bike_data(&data);

    assert_eq!(frame.speed_kmh, Some(30.0));
    assert_eq!(frame.cadence_rpm, Some(80.0));
    assert_eq!(frame.resistance_level, Some(10.0));
    assert_eq!(frame.power_watts, Some(150.0));
}

#[test]
fn test_fixed_frame_ignores_trailing_bytes() {
    let data = [0x00, 0x00, 0xB8, 0x0B, 0xA0, 0x00, 0x0A, 0x00, 0x96, 0x00, 0xFF, 0xFF];
    assert_eq!(parse_indoor_bike_data(&data).power_watts, Some(150.0));
}

#[test]
fn test_fixed_frame_too_short_is_empty() {
    let frame = parse_indoor_bike_data(&[0x00, 0x00, 0xB8, 0x0B, 0xA0, 0x00, 0x0A, 0x00, 0x96]);
    assert!(frame.is_empty());
    assert!(parse_indoor_bike_data(&[]).is_empty());
}

#[test]
fn test_fixed_frame_signed_power() {
    // power -5 W
    let data = [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xFB, 0xFF];
    assert_eq!(parse_indoor_bike_data(&data).power_watts, Some(-5.0));
}

#[test]
fn test_flagged_speed_cadence_power() {
    // flags: cadence + power
    let data = [0x44, 0x00, 0xAC, 0x0D, 0xBE, 0x00, 0xC8, 0x00];
    let frame = parse_indoor_bike_data_flagged(&data);

    assert_eq!(frame.speed_kmh, Some(35.0));
    assert_eq!(frame.cadence_rpm, Some(95.0));
    assert_eq!(frame.power_watts, Some(200.0));
    assert_eq!(frame.resistance_level, None);
}

#[test]
fn test_flagged_skips_total_distance_before_resistance() {
    // flags: cadence + total distance + resistance + power
    let data = [
        0x74, 0x00, // flags
        0xD0, 0x07, // speed 20.00
        0xB4, 0x00, // cadence 90
        0x10, 0x27, 0x00, // distance 10000 m
        0x19, 0x00, // resistance 25
        0xFA, 0x00, // power 250
    ];
    let frame = parse_indoor_bike_data_flagged(&data);

    assert_eq!(frame.speed_kmh, Some(20.0));
    assert_eq!(frame.cadence_rpm, Some(90.0));
    assert_eq!(frame.resistance_level, Some(25.0));
    assert_eq!(frame.power_watts, Some(250.0));
}

#[test]
fn test_flagged_truncation_keeps_decoded_fields() {
    // flags say power follows but the frame ends after cadence
    let data = [0x44, 0x00, 0xD0, 0x07, 0xB4, 0x00, 0xFA];
    let frame = parse_indoor_bike_data_flagged(&data);

    assert_eq!(frame.cadence_rpm, Some(90.0));
    assert_eq!(frame.power_watts, None);
}

#[test]
fn test_layout_dispatch() {
    let data = [0x40, 0x00, 0xB8, 0x0B, 0xFA, 0x00];
    assert_eq!(FrameLayout::Flags.decode(&data).power_watts, Some(250.0));
    assert!(FrameLayout::Fixed.decode(&data).is_empty());
}

#[test]
fn test_heart_rate_uint8() {
    assert_eq!(parse_heart_rate_measurement(&[0x00, 72]), Some(72));
}

#[test]
fn test_heart_rate_uint16() {
    assert_eq!(parse_heart_rate_measurement(&[0x01, 0x2C, 0x01]), Some(300));
}

#[test]
fn test_heart_rate_malformed() {
    assert_eq!(parse_heart_rate_measurement(&[]), None);
    assert_eq!(parse_heart_rate_measurement(&[0x00]), None);
    assert_eq!(parse_heart_rate_measurement(&[0x01, 0x2C]), None);
}

#[test]
fn test_supported_resistance_range() {
    let data = [0x00, 0x00, 0x64, 0x00, 0x01, 0x00];
    assert_eq!(
        parse_supported_resistance_range(&data),
        Some(ResistanceRange {
            min: 0,
            max: 100,
            step: 1
        })
    );
    assert_eq!(parse_supported_resistance_range(&data[..5]), None);
}
