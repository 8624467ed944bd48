//! Resistance calibration from the Supported Resistance Level Range.

use crate::sensors::ftms::ResistanceRange;

/// Maps raw resistance levels onto 0-100 %.
///
/// The range is recorded once per connection and cleared on disconnect.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResistanceCalibration {
    range: Option<ResistanceRange>,
}

impl ResistanceCalibration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the device range. The first record wins until [`clear`](Self::clear).
    pub fn record_range(&mut self, range: ResistanceRange) {
        if let Some(existing) = self.range {
            if existing != range {
                tracing::warn!(
                    "Ignoring resistance range {:?}, already calibrated with {:?}",
                    range,
                    existing
                );
            }
            return;
        }

        tracing::info!(
            "Resistance range: min={} max={} step={}",
            range.min,
            range.max,
            range.step
        );
        self.range = Some(range);
    }

    /// Forget the recorded range.
    pub fn clear(&mut self) {
        self.range = None;
    }

    pub fn range(&self) -> Option<ResistanceRange> {
        self.range
    }

    /// Percentage of the device range for a raw level, clamped to 0-100.
    ///
    /// `None` when no range is known or the range is degenerate (`max <= min`).
    /// Callers display the raw level in that case.
    pub fn percent_of(&self, raw_level: f64) -> Option<f64> {
        let range = self.range?;
        if range.max <= range.min {
            return None;
        }

        let min = f64::from(range.min);
        let span = f64::from(range.max) - min;
        Some(((raw_level - min) / span * 100.0).clamp(0.0, 100.0))
    }
}
