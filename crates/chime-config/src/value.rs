//! Unit-aware value strings.
//!
//! Configuration values are strings so patches can say `"-6dB"` or
//! `"250ms"` instead of raw numbers.

use crate::error::ConfigError;

/// Parse a value string into an f32.
///
/// Supports:
/// - Plain numbers: "0.5", "1.2", "-0.3"
/// - Percentages: "50%", "120%" (divided by 100)
/// - Decibels: "-6dB", "+3dB" (converted to linear gain)
/// - Time in ms: "100ms" (converted to seconds)
/// - Time in s: "1.5s" (kept as seconds)
/// - Frequency in Hz: "440Hz"
/// - Frequency in kHz: "1.2kHz" (converted to Hz)
pub fn parse_value(value: &str) -> Option<f32> {
    let value = value.trim();

    if let Some(pct) = value.strip_suffix('%') {
        return pct.trim().parse::<f32>().ok().map(|v| v / 100.0);
    }

    if let Some(db) = value
        .strip_suffix("dB")
        .or_else(|| value.strip_suffix("db"))
    {
        return db
            .trim()
            .parse::<f32>()
            .ok()
            .map(|v| libm::powf(10.0, v / 20.0));
    }

    if let Some(ms) = value.strip_suffix("ms") {
        return ms.trim().parse::<f32>().ok().map(|v| v / 1000.0);
    }

    if let Some(s) = value.strip_suffix('s') {
        return s.trim().parse::<f32>().ok();
    }

    if let Some(khz) = value
        .strip_suffix("kHz")
        .or_else(|| value.strip_suffix("khz"))
    {
        return khz.trim().parse::<f32>().ok().map(|v| v * 1000.0);
    }

    if let Some(hz) = value
        .strip_suffix("Hz")
        .or_else(|| value.strip_suffix("hz"))
    {
        return hz.trim().parse::<f32>().ok();
    }

    value.parse::<f32>().ok()
}

/// [`parse_value`] for a named field, rejecting non-finite results.
pub fn field_value(field: &str, value: &str) -> Result<f32, ConfigError> {
    parse_value(value)
        .filter(|v| v.is_finite())
        .ok_or_else(|| ConfigError::invalid_value(field, value))
}

/// [`field_value`] widened to seconds on the playback clock.
pub fn field_seconds(field: &str, value: &str) -> Result<f64, ConfigError> {
    field_value(field, value).map(f64::from)
}
