//! Calorie estimation with graceful fallbacks.
//!
//! The estimate is an ordered chain:
//! 1. A base estimate from the first tier that applies: ACSM cycling
//!    (needs body mass and a duration), otherwise power-only from mechanical
//!    efficiency.
//! 2. A Keytel heart-rate estimate blended in at a low weight when the full
//!    demographic context and an average heart rate are available.
//!
//! The result is never negative and never an error.

use crate::storage::config::{Sex, UserProfile};
use serde::{Deserialize, Serialize};

/// Kilojoules per kilocalorie.
pub const KJ_PER_KCAL: f64 = 4.184;

/// Accepted range for gross mechanical efficiency.
pub const MECH_EFFICIENCY_RANGE: (f64, f64) = (0.15, 0.30);

/// Resting VO2 (ml/kg/min) added for a gross ACSM estimate.
pub const ACSM_RESTING_VO2: f64 = 7.0;

/// Tunables for [`estimate_calories`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalorieConfig {
    /// Mechanical efficiency for the power-only tier
    pub mech_efficiency: f64,
    /// Weight of the heart-rate estimate in the blend
    pub hr_weight: f64,
    /// Add resting VO2 to the ACSM estimate
    pub acsm_gross: bool,
}

impl Default for CalorieConfig {
    fn default() -> Self {
        Self {
            mech_efficiency: 0.24,
            hr_weight: 0.15,
            acsm_gross: false,
        }
    }
}

/// Power-only estimate: metabolic energy = mechanical work / efficiency.
///
/// Efficiency is clamped to [`MECH_EFFICIENCY_RANGE`].
pub fn kcal_from_power_only(total_kj: f64, mech_efficiency: f64) -> f64 {
    let (lo, hi) = MECH_EFFICIENCY_RANGE;
    let efficiency = mech_efficiency.clamp(lo, hi);
    (total_kj / efficiency) / KJ_PER_KCAL
}

/// ACSM leg cycling equation.
///
/// - work rate (kg·m/min) = 6.12 × P
/// - VO2 (ml/kg/min) = 1.8 × work rate / mass (+ 7 when gross)
/// - kcal/min = VO2 × mass × 5 / 1000
pub fn kcal_from_acsm(avg_power_watts: f64, mass_kg: f64, duration_secs: u32, gross: bool) -> f64 {
    if avg_power_watts <= 0.0 || mass_kg <= 0.0 || duration_secs == 0 {
        return 0.0;
    }

    let work_rate = 6.12 * avg_power_watts;
    let resting = if gross { ACSM_RESTING_VO2 } else { 0.0 };
    let vo2 = 1.8 * work_rate / mass_kg + resting;
    let kcal_per_min = vo2 * mass_kg * 5.0 / 1000.0;
    kcal_per_min * (f64::from(duration_secs) / 60.0)
}

/// Keytel et al. (2005) heart-rate regression.
///
/// The per-minute estimate is floored at zero before scaling by duration.
pub fn kcal_from_heart_rate_keytel(
    avg_hr: u32,
    mass_kg: f64,
    age: u32,
    male: bool,
    duration_secs: u32,
) -> f64 {
    if avg_hr == 0 || mass_kg <= 0.0 || age == 0 || duration_secs == 0 {
        return 0.0;
    }

    let hr = f64::from(avg_hr);
    let age = f64::from(age);
    let kj_per_min = if male {
        -55.0969 + 0.6309 * hr + 0.1988 * mass_kg + 0.2017 * age
    } else {
        -20.4022 + 0.4472 * hr - 0.1263 * mass_kg + 0.074 * age
    };
    let per_min = kj_per_min / KJ_PER_KCAL;
    per_min.max(0.0) * (f64::from(duration_secs) / 60.0)
}

/// Rounded mean of the present heart-rate samples.
pub fn average_heart_rate(history: &[Option<u16>]) -> Option<u32> {
    let (sum, count) = history
        .iter()
        .flatten()
        .fold((0u64, 0u64), |(sum, count), &hr| (sum + u64::from(hr), count + 1));
    if count == 0 {
        return None;
    }
    Some((sum as f64 / count as f64).round() as u32)
}

/// Inputs shared by every tier, derived once.
struct EstimateContext<'a> {
    total_kj: f64,
    duration_secs: Option<u32>,
    avg_hr: Option<u32>,
    profile: Option<&'a UserProfile>,
    config: &'a CalorieConfig,
}

impl EstimateContext<'_> {
    fn avg_power_watts(&self) -> Option<f64> {
        self.duration_secs
            .map(|secs| self.total_kj * 1000.0 / f64::from(secs))
    }

    fn mass_kg(&self) -> Option<f64> {
        self.profile.and_then(|p| p.mass_kg)
    }
}

type BaseTier = fn(&EstimateContext<'_>) -> Option<f64>;

/// Base tiers in order of preference; the last one always applies.
const BASE_TIERS: [BaseTier; 2] = [acsm_tier, power_only_tier];

fn acsm_tier(ctx: &EstimateContext<'_>) -> Option<f64> {
    let mass = ctx.mass_kg()?;
    let secs = ctx.duration_secs?;
    let avg_power = ctx.avg_power_watts()?;
    Some(kcal_from_acsm(avg_power, mass, secs, ctx.config.acsm_gross))
}

fn power_only_tier(ctx: &EstimateContext<'_>) -> Option<f64> {
    Some(kcal_from_power_only(ctx.total_kj, ctx.config.mech_efficiency))
}

/// Heart-rate-only estimate, when the full context is present.
fn keytel_tier(ctx: &EstimateContext<'_>) -> Option<f64> {
    let avg_hr = ctx.avg_hr?;
    let profile = ctx.profile?;
    let mass = profile.mass_kg?;
    let age = profile.age?;
    let male = match profile.sex {
        Sex::Male => true,
        Sex::Female => false,
        Sex::Unspecified => return None,
    };
    let secs = ctx.duration_secs?;
    Some(kcal_from_heart_rate_keytel(avg_hr, mass, age, male, secs))
}

/// Estimate calories for a session.
///
/// `heart_rate_history` has one entry per elapsed second; its length is the
/// session duration. Returns exactly 0 when `total_kj <= 0`.
pub fn estimate_calories(
    total_kj: f64,
    heart_rate_history: &[Option<u16>],
    profile: Option<&UserProfile>,
    config: &CalorieConfig,
) -> f64 {
    if total_kj <= 0.0 {
        return 0.0;
    }

    let duration_secs = u32::try_from(heart_rate_history.len())
        .ok()
        .filter(|&secs| secs > 0);
    let ctx = EstimateContext {
        total_kj,
        duration_secs,
        avg_hr: average_heart_rate(heart_rate_history),
        profile,
        config,
    };

    let base = BASE_TIERS
        .iter()
        .find_map(|tier| tier(&ctx))
        .unwrap_or_default();

    let blended = match keytel_tier(&ctx) {
        Some(hr_only) => (1.0 - config.hr_weight) * base + config.hr_weight * hr_only,
        None => base,
    };

    blended.max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(mass: Option<f64>, age: Option<u32>, sex: Sex) -> UserProfile {
        UserProfile {
            mass_kg: mass,
            age,
            sex,
        }
    }

    #[test]
    fn test_zero_work_is_zero() {
        let p = profile(Some(80.0), Some(40), Sex::Male);
        let hr = vec![Some(150); 600];
        assert_eq!(estimate_calories(0.0, &hr, Some(&p), &CalorieConfig::default()), 0.0);
        assert_eq!(estimate_calories(-3.0, &[], None, &CalorieConfig::default()), 0.0);
    }

    #[test]
    fn test_power_only_without_context() {
        let kcal = estimate_calories(100.0, &[], None, &CalorieConfig::default());
        assert!((kcal - (100.0 / 0.24) / 4.184).abs() < 1e-9);
        assert!((kcal - 99.59).abs() < 0.01);
    }

    #[test]
    fn test_power_only_clamps_efficiency() {
        assert_eq!(kcal_from_power_only(100.0, 0.05), kcal_from_power_only(100.0, 0.15));
        assert_eq!(kcal_from_power_only(100.0, 0.9), kcal_from_power_only(100.0, 0.30));
    }

    #[test]
    fn test_mass_without_duration_falls_back_to_power_only() {
        let p = profile(Some(75.0), None, Sex::Unspecified);
        let kcal = estimate_calories(100.0, &[], Some(&p), &CalorieConfig::default());
        assert!((kcal - kcal_from_power_only(100.0, 0.24)).abs() < 1e-9);
    }

    #[test]
    fn test_acsm_with_mass_and_duration() {
        let p = profile(Some(75.0), None, Sex::Unspecified);
        // 600 s at 200 W = 120 kJ
        let hr = vec![None; 600];
        let kcal = estimate_calories(120.0, &hr, Some(&p), &CalorieConfig::default());

        let expected = kcal_from_acsm(200.0, 75.0, 600, false);
        assert!((kcal - expected).abs() < 1e-9);
        // 6.12 * 200 * 1.8 * 5 / 1000 * 10 min
        assert!((expected - 110.16).abs() < 1e-9);
    }

    #[test]
    fn test_acsm_gross_adds_resting_cost() {
        let net = kcal_from_acsm(200.0, 75.0, 600, false);
        let gross = kcal_from_acsm(200.0, 75.0, 600, true);
        assert!((gross - net - 7.0 * 75.0 * 5.0 / 1000.0 * 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_full_context_blends_keytel() {
        let p = profile(Some(80.0), Some(35), Sex::Male);
        let hr: Vec<Option<u16>> = (0..1200).map(|i| Some(if i % 2 == 0 { 140 } else { 150 })).collect();
        let config = CalorieConfig::default();
        let total_kj = 216.0;

        let kcal = estimate_calories(total_kj, &hr, Some(&p), &config);

        let acsm = kcal_from_acsm(180.0, 80.0, 1200, false);
        let keytel = kcal_from_heart_rate_keytel(145, 80.0, 35, true, 1200);
        let expected = (1.0 - config.hr_weight) * acsm + config.hr_weight * keytel;
        assert!((kcal - expected).abs() < 1e-9);
    }

    #[test]
    fn test_unspecified_sex_skips_blend() {
        let p = profile(Some(80.0), Some(35), Sex::Unspecified);
        let hr = vec![Some(150); 600];
        let kcal = estimate_calories(120.0, &hr, Some(&p), &CalorieConfig::default());
        assert!((kcal - kcal_from_acsm(200.0, 80.0, 600, false)).abs() < 1e-9);
    }

    #[test]
    fn test_female_keytel() {
        let kcal = kcal_from_heart_rate_keytel(150, 60.0, 30, false, 600);
        let per_min = (-20.4022 + 0.4472 * 150.0 - 0.1263 * 60.0 + 0.074 * 30.0) / 4.184;
        assert!((kcal - per_min * 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_keytel_floors_per_minute_at_zero() {
        assert_eq!(kcal_from_heart_rate_keytel(40, 50.0, 20, true, 600), 0.0);
    }

    #[test]
    fn test_average_heart_rate_ignores_gaps() {
        let history = [None, Some(100), None, Some(103)];
        assert_eq!(average_heart_rate(&history), Some(102));
        assert_eq!(average_heart_rate(&[None, None]), None);
    }
}
