//! FTMS (Fitness Machine Service) and Heart Rate Service payload decoding.
//!
//! All decoders are pure functions over a notification buffer. A buffer that
//! is too short never produces an error: the affected fields are simply
//! absent, so a corrupt notification contributes nothing to a session.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// FTMS Service UUID (0x1826)
pub const FTMS_SERVICE_UUID: Uuid = Uuid::from_u128(0x0000_1826_0000_1000_8000_0080_5f9b_34fb);

/// Indoor Bike Data Characteristic UUID (0x2AD2)
pub const INDOOR_BIKE_DATA_UUID: Uuid = Uuid::from_u128(0x0000_2ad2_0000_1000_8000_0080_5f9b_34fb);

/// Supported Resistance Level Range Characteristic UUID (0x2AD6)
pub const SUPPORTED_RESISTANCE_RANGE_UUID: Uuid =
    Uuid::from_u128(0x0000_2ad6_0000_1000_8000_0080_5f9b_34fb);

/// Heart Rate Service UUID (0x180D)
pub const HEART_RATE_SERVICE_UUID: Uuid =
    Uuid::from_u128(0x0000_180d_0000_1000_8000_0080_5f9b_34fb);

/// Heart Rate Measurement UUID (0x2A37)
pub const HEART_RATE_MEASUREMENT_UUID: Uuid =
    Uuid::from_u128(0x0000_2a37_0000_1000_8000_0080_5f9b_34fb);

/// Length of the fixed Indoor Bike Data frame.
pub const FIXED_FRAME_LEN: usize = 10;

/// One decoded Indoor Bike Data notification.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct IndoorBikeData {
    /// Raw flags field
    pub flags: u16,
    /// Instantaneous speed in km/h
    pub speed_kmh: Option<f64>,
    /// Instantaneous cadence in RPM (0.5 resolution)
    pub cadence_rpm: Option<f64>,
    /// Resistance level in device units
    pub resistance_level: Option<f64>,
    /// Instantaneous power in watts
    pub power_watts: Option<f64>,
}

impl IndoorBikeData {
    /// True when the frame carried no usable field.
    pub fn is_empty(&self) -> bool {
        self.speed_kmh.is_none()
            && self.cadence_rpm.is_none()
            && self.resistance_level.is_none()
            && self.power_watts.is_none()
    }
}

/// Device-reported resistance range, in raw device units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResistanceRange {
    pub min: i16,
    pub max: i16,
    pub step: i16,
}

/// Byte arrangement assumed for Indoor Bike Data notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameLayout {
    /// Fixed 10-byte frame: flags, speed, cadence, resistance, power.
    ///
    /// The flags are carried through but not used to locate fields. This
    /// matches the Peloton/Grupetto bridge firmware and is not general FTMS
    /// conformance.
    #[default]
    Fixed,
    /// Standard flag-driven variable layout.
    Flags,
}

impl FrameLayout {
    /// Decode a notification with this layout.
    pub fn decode(self, data: &[u8]) -> IndoorBikeData {
        match self {
            FrameLayout::Fixed => parse_indoor_bike_data(data),
            FrameLayout::Flags => parse_indoor_bike_data_flagged(data),
        }
    }
}

impl std::fmt::Display for FrameLayout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FrameLayout::Fixed => write!(f, "fixed"),
            FrameLayout::Flags => write!(f, "flags"),
        }
    }
}

/// Little-endian reader over a notification buffer.
struct LeReader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> LeReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    fn take<const N: usize>(&mut self) -> Option<[u8; N]> {
        let end = self.offset.checked_add(N)?;
        let bytes: [u8; N] = self.data.get(self.offset..end)?.try_into().ok()?;
        self.offset = end;
        Some(bytes)
    }

    fn u8(&mut self) -> Option<u8> {
        self.take::<1>().map(|[b]| b)
    }

    fn u16(&mut self) -> Option<u16> {
        self.take::<2>().map(u16::from_le_bytes)
    }

    fn i16(&mut self) -> Option<i16> {
        self.take::<2>().map(i16::from_le_bytes)
    }

    fn u24(&mut self) -> Option<u32> {
        self.take::<3>().map(|[a, b, c]| u32::from_le_bytes([a, b, c, 0]))
    }

    fn skip(&mut self, n: usize) -> Option<()> {
        let end = self.offset.checked_add(n)?;
        if end > self.data.len() {
            return None;
        }
        self.offset = end;
        Some(())
    }
}

/// Parse an Indoor Bike Data notification using the fixed 10-byte layout.
///
/// - Bytes 0-1: flags
/// - Bytes 2-3: speed, u16, 0.01 km/h
/// - Bytes 4-5: cadence, u16, 0.5 RPM
/// - Bytes 6-7: resistance level, i16
/// - Bytes 8-9: power, i16, watts
///
/// Frames shorter than 10 bytes decode to [`IndoorBikeData::default`].
pub fn parse_indoor_bike_data(data: &[u8]) -> IndoorBikeData {
    if data.len() < FIXED_FRAME_LEN {
        return IndoorBikeData::default();
    }

    let mut reader = LeReader::new(data);
    let (Some(flags), Some(speed), Some(cadence), Some(resistance), Some(power)) = (
        reader.u16(),
        reader.u16(),
        reader.u16(),
        reader.i16(),
        reader.i16(),
    ) else {
        return IndoorBikeData::default();
    };

    IndoorBikeData {
        flags,
        speed_kmh: Some(f64::from(speed) / 100.0),
        cadence_rpm: Some(f64::from(cadence) / 2.0),
        resistance_level: Some(f64::from(resistance)),
        power_watts: Some(f64::from(power)),
    }
}

const FLAG_MORE_DATA: u16 = 0x0001;
const FLAG_AVG_SPEED: u16 = 0x0002;
const FLAG_INST_CADENCE: u16 = 0x0004;
const FLAG_AVG_CADENCE: u16 = 0x0008;
const FLAG_TOTAL_DISTANCE: u16 = 0x0010;
const FLAG_RESISTANCE: u16 = 0x0020;
const FLAG_INST_POWER: u16 = 0x0040;
const FLAG_AVG_POWER: u16 = 0x0080;
const FLAG_EXPENDED_ENERGY: u16 = 0x0100;
const FLAG_HEART_RATE: u16 = 0x0200;
const FLAG_METABOLIC_EQUIVALENT: u16 = 0x0400;
const FLAG_ELAPSED_TIME: u16 = 0x0800;
const FLAG_REMAINING_TIME: u16 = 0x1000;

/// Parse an Indoor Bike Data notification using the standard flag-driven layout.
///
/// Fields that this crate does not track (averages, distance, energy, ...) are
/// consumed so that later fields land on the right offset. A frame truncated
/// part-way keeps whatever was decoded before the cut.
pub fn parse_indoor_bike_data_flagged(data: &[u8]) -> IndoorBikeData {
    let mut reader = LeReader::new(data);
    let Some(flags) = reader.u16() else {
        return IndoorBikeData::default();
    };
    let mut result = IndoorBikeData {
        flags,
        ..Default::default()
    };
    let has = |bit: u16| flags & bit != 0;

    // Speed is present when "more data" is clear
    if !has(FLAG_MORE_DATA) {
        let Some(speed) = reader.u16() else {
            return result;
        };
        result.speed_kmh = Some(f64::from(speed) / 100.0);
    }

    if has(FLAG_AVG_SPEED) && reader.skip(2).is_none() {
        return result;
    }

    if has(FLAG_INST_CADENCE) {
        let Some(cadence) = reader.u16() else {
            return result;
        };
        result.cadence_rpm = Some(f64::from(cadence) / 2.0);
    }

    if has(FLAG_AVG_CADENCE) && reader.skip(2).is_none() {
        return result;
    }

    if has(FLAG_TOTAL_DISTANCE) && reader.u24().is_none() {
        return result;
    }

    if has(FLAG_RESISTANCE) {
        let Some(level) = reader.i16() else {
            return result;
        };
        result.resistance_level = Some(f64::from(level));
    }

    if has(FLAG_INST_POWER) {
        let Some(power) = reader.i16() else {
            return result;
        };
        result.power_watts = Some(f64::from(power));
    }

    // Trailing fields are not tracked; walk them only to validate the frame.
    let trailing = [
        (FLAG_AVG_POWER, 2),
        (FLAG_EXPENDED_ENERGY, 5),
        (FLAG_HEART_RATE, 1),
        (FLAG_METABOLIC_EQUIVALENT, 1),
        (FLAG_ELAPSED_TIME, 2),
        (FLAG_REMAINING_TIME, 2),
    ];
    for (bit, len) in trailing {
        if has(bit) && reader.skip(len).is_none() {
            tracing::debug!("Indoor Bike Data truncated after flag {:#06x}", bit);
            break;
        }
    }

    result
}

/// Parse a Heart Rate Measurement notification into BPM.
///
/// Bit 0 of the flags byte selects the 16-bit value format. Returns `None`
/// when the buffer is empty or the value bytes are missing.
pub fn parse_heart_rate_measurement(data: &[u8]) -> Option<u16> {
    let mut reader = LeReader::new(data);
    let flags = reader.u8()?;

    if flags & 0x01 != 0 {
        reader.u16()
    } else {
        reader.u8().map(u16::from)
    }
}

/// Parse the Supported Resistance Level Range characteristic.
///
/// Three consecutive i16 values: minimum, maximum, increment.
pub fn parse_supported_resistance_range(data: &[u8]) -> Option<ResistanceRange> {
    let mut reader = LeReader::new(data);
    Some(ResistanceRange {
        min: reader.i16()?,
        max: reader.i16()?,
        step: reader.i16()?,
    })
}
