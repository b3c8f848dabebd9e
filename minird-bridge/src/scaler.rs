//! Raw ADC to simulator scale conversion

use crate::calibration::CalibrationRange;

/// Highest value the simulator accepts for a continuous control
pub const SIM_MAX: u8 = 255;

/// Map a raw reading onto 0..=255 using a calibrated range.
///
/// Readings at or below `min` give 0, at or above `max` give 255. In between
/// the linear map is truncated toward zero.
pub fn scale(range: CalibrationRange, raw: i32) -> u8 {
    if raw <= range.min {
        return 0;
    }
    if raw >= range.max {
        return SIM_MAX;
    }
    let offset = i64::from(raw) - i64::from(range.min);
    let span = i64::from(range.max) - i64::from(range.min);
    (i64::from(SIM_MAX) * offset / span) as u8
}
