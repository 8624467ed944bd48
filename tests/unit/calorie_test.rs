//! Unit tests for calorie estimation.

use spinride::metrics::calories::{
    estimate_calories, kcal_from_acsm, kcal_from_heart_rate_keytel, kcal_from_power_only,
    CalorieConfig,
};
use spinride::storage::config::{Sex, UserProfile};

#[test]
fn test_reference_power_only() {
    let kcal = estimate_calories(100.0, &[], None, &CalorieConfig::default());
    assert!((kcal - 99.6).abs() < 0.05, "got {kcal}");
}

#[test]
fn test_nonpositive_work_is_exactly_zero() {
    let profile = UserProfile {
        mass_kg: Some(70.0),
        age: Some(30),
        sex: Sex::Female,
    };
    let hr = vec![Some(160); 3600];
    assert_eq!(estimate_calories(0.0, &hr, Some(&profile), &CalorieConfig::default()), 0.0);
}

#[test]
fn test_never_negative() {
    // Very low heart rate makes the Keytel term floor at zero
    let profile = UserProfile {
        mass_kg: Some(300.0),
        age: Some(5),
        sex: Sex::Female,
    };
    let hr = vec![Some(30); 60];
    let kcal = estimate_calories(0.001, &hr, Some(&profile), &CalorieConfig::default());
    assert!(kcal >= 0.0);
}

#[test]
fn test_tier_order() {
    let config = CalorieConfig::default();
    let hr: Vec<Option<u16>> = vec![Some(150); 1800];
    let total_kj = 360.0; // 200 W for 30 min

    let mass_only = UserProfile {
        mass_kg: Some(70.0),
        ..Default::default()
    };
    let acsm = estimate_calories(total_kj, &hr, Some(&mass_only), &config);
    assert!((acsm - kcal_from_acsm(200.0, 70.0, 1800, false)).abs() < 1e-9);

    let full = UserProfile {
        mass_kg: Some(70.0),
        age: Some(40),
        sex: Sex::Male,
    };
    let blended = estimate_calories(total_kj, &hr, Some(&full), &config);
    let keytel = kcal_from_heart_rate_keytel(150, 70.0, 40, true, 1800);
    assert!((blended - (0.85 * acsm + 0.15 * keytel)).abs() < 1e-9);

    let none = estimate_calories(total_kj, &hr, None, &config);
    assert!((none - kcal_from_power_only(total_kj, 0.24)).abs() < 1e-9);
}

#[test]
fn test_hr_weight_is_configurable() {
    let config = CalorieConfig {
        hr_weight: 0.25,
        ..Default::default()
    };
    let full = UserProfile {
        mass_kg: Some(70.0),
        age: Some(40),
        sex: Sex::Female,
    };
    let hr = vec![Some(140); 600];
    let kcal = estimate_calories(120.0, &hr, Some(&full), &config);

    let acsm = kcal_from_acsm(200.0, 70.0, 600, false);
    let keytel = kcal_from_heart_rate_keytel(140, 70.0, 40, false, 600);
    assert!((kcal - (0.75 * acsm + 0.25 * keytel)).abs() < 1e-9);
}
