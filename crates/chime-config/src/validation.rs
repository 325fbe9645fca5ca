//! Patch and beat track validation.
//!
//! Validation checks a configuration without building anything, so every
//! problem in a file is reported at once instead of the first one a build
//! would hit.
//!
//! # Example
//!
//! ```rust
//! use chime_config::{SoundPatch, validate_patch};
//!
//! let patch = SoundPatch::new("lead").with_waveform("square");
//! validate_patch(&patch).expect("patch should be valid");
//! ```

use thiserror::Error;

use chime_core::{BiquadType, Note, ParamType, RampKind, Waveform};

use crate::beat_track::{BeatTrackConfig, parse_pattern};
use crate::patch::{ParamEventConfig, SoundPatch, StageConfig};
use crate::value::parse_value;

/// Validation error types.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    /// A name the core does not recognize.
    #[error("unknown {kind} '{name}' in '{field}'")]
    UnknownName {
        /// What the name should be (waveform, parameter, ...).
        kind: &'static str,
        /// Field holding the name.
        field: String,
        /// The name.
        name: String,
    },

    /// A value string that does not parse to a finite number.
    #[error("invalid format for '{field}': '{value}'")]
    InvalidFormat {
        /// Field holding the value.
        field: String,
        /// The raw string.
        value: String,
    },

    /// A value outside its allowed range.
    #[error("'{field}' value {value} out of range [{min}, {max}]")]
    OutOfRange {
        /// Field holding the value.
        field: String,
        /// Parsed value.
        value: f32,
        /// Minimum allowed value.
        min: f32,
        /// Maximum allowed value.
        max: f32,
    },

    /// An exponential ramp that cannot be scheduled.
    #[error("'{field}': exponential ramps cannot target 0 or run on pan")]
    InvalidExponentialRamp {
        /// Field of the offending event.
        field: String,
    },

    /// More pattern steps than beats.
    #[error("pattern has {len} steps but the track has {num_beats} beats")]
    PatternTooLong {
        /// Steps in the pattern.
        len: usize,
        /// Beats in the track.
        num_beats: usize,
    },

    /// A sampler needs at least one sample.
    #[error("beat track has no samples")]
    NoSamples,

    /// Multiple validation errors.
    #[error(
        "multiple validation errors: {}",
        .0.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("; ")
    )]
    Multiple(Vec<ValidationError>),
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Error accumulator.
#[derive(Default)]
struct Report {
    errors: Vec<ValidationError>,
}

impl Report {
    fn push(&mut self, err: ValidationError) {
        self.errors.push(err);
    }

    fn name<T: core::str::FromStr>(
        &mut self,
        kind: &'static str,
        field: &str,
        name: &str,
    ) -> Option<T> {
        let parsed = name.parse().ok();
        if parsed.is_none() {
            self.push(ValidationError::UnknownName {
                kind,
                field: field.to_string(),
                name: name.to_string(),
            });
        }
        parsed
    }

    fn value(&mut self, field: &str, value: &str) -> Option<f32> {
        let parsed = parse_value(value).filter(|v| v.is_finite());
        if parsed.is_none() {
            self.push(ValidationError::InvalidFormat {
                field: field.to_string(),
                value: value.to_string(),
            });
        }
        parsed
    }

    fn ranged(&mut self, field: &str, value: &str, min: f32, max: f32) -> Option<f32> {
        let value = self.value(field, value)?;
        if !(min..=max).contains(&value) {
            self.push(ValidationError::OutOfRange {
                field: field.to_string(),
                value,
                min,
                max,
            });
            return None;
        }
        Some(value)
    }

    fn finish(mut self) -> ValidationResult<()> {
        match self.errors.len() {
            0 => Ok(()),
            1 => Err(self.errors.remove(0)),
            _ => Err(ValidationError::Multiple(self.errors)),
        }
    }
}

fn check_exponential(
    report: &mut Report,
    field: String,
    param: Option<ParamType>,
    kind: Option<RampKind>,
    target: Option<f32>,
) {
    if kind != Some(RampKind::Exponential) {
        return;
    }
    if param == Some(ParamType::Pan) || target == Some(0.0) {
        report.push(ValidationError::InvalidExponentialRamp { field });
    }
}

fn validate_event(report: &mut Report, index: usize, event: &ParamEventConfig) {
    let field = |name: &str| format!("events[{index}].{name}");
    let param: Option<ParamType> = report.name("parameter", &field("param"), event.param_name());
    match event {
        ParamEventConfig::Set { value, .. } => {
            report.value(&field("value"), value);
        }
        ParamEventConfig::SetAt { value, at, .. } => {
            report.value(&field("value"), value);
            report.ranged(&field("at"), at, 0.0, f32::MAX);
        }
        ParamEventConfig::RampTo {
            value, at, kind, ..
        } => {
            let target = report.value(&field("value"), value);
            report.ranged(&field("at"), at, 0.0, f32::MAX);
            let kind = report.name("ramp kind", &field("kind"), kind);
            check_exponential(report, field("value"), param, kind, target);
        }
        ParamEventConfig::Ramp {
            from,
            to,
            over,
            kind,
            ..
        } => {
            report.value(&field("from"), from);
            let target = report.value(&field("to"), to);
            report.ranged(&field("over"), over, 0.0, f32::MAX);
            let kind = report.name("ramp kind", &field("kind"), kind);
            check_exponential(report, field("to"), param, kind, target);
        }
    }
}

/// Validate a sound patch.
pub fn validate_patch(patch: &SoundPatch) -> ValidationResult<()> {
    let mut report = Report::default();
    report.name::<Waveform>("waveform", "waveform", &patch.waveform);
    if let Some(note) = &patch.note {
        report.name::<Note>("note", "note", note);
    } else if let Some(frequency) = &patch.frequency {
        report.ranged("frequency", frequency, 0.0, f32::MAX);
    }
    if let Some(gain) = &patch.gain {
        report.value("gain", gain);
    }
    if let Some(pan) = &patch.pan {
        report.ranged("pan", pan, -1.0, 1.0);
    }
    for (i, stage) in patch.stages.iter().enumerate() {
        match stage {
            StageConfig::Filter {
                filter,
                frequency,
                q,
            } => {
                report.name::<BiquadType>("filter type", &format!("stages[{i}].filter"), filter);
                report.ranged(&format!("stages[{i}].frequency"), frequency, 0.0, f32::MAX);
                report.value(&format!("stages[{i}].q"), q);
            }
            StageConfig::Delay { time } => {
                report.ranged(&format!("stages[{i}].time"), time, 0.0, f32::MAX);
            }
        }
    }
    for (i, event) in patch.events.iter().enumerate() {
        validate_event(&mut report, i, event);
    }
    report.finish()
}

/// Validate a beat track configuration.
pub fn validate_beat_track(config: &BeatTrackConfig) -> ValidationResult<()> {
    let mut report = Report::default();
    if let Some(seconds) = report.value("beat_duration", &config.beat_duration)
        && seconds <= 0.0
    {
        report.push(ValidationError::OutOfRange {
            field: "beat_duration".to_string(),
            value: seconds,
            min: f32::MIN_POSITIVE,
            max: f32::MAX,
        });
    }
    match parse_pattern(&config.pattern) {
        Ok(flags) if flags.len() > config.num_beats => {
            report.push(ValidationError::PatternTooLong {
                len: flags.len(),
                num_beats: config.num_beats,
            });
        }
        Ok(_) => {}
        Err(_) => report.push(ValidationError::InvalidFormat {
            field: "pattern".to_string(),
            value: config.pattern.clone(),
        }),
    }
    if let Some(gain) = &config.gain {
        report.value("gain", gain);
    }
    if let Some(pan) = &config.pan {
        report.ranged("pan", pan, -1.0, 1.0);
    }
    if config.samples.is_empty() {
        report.push(ValidationError::NoSamples);
    }
    for (i, sample) in config.samples.iter().enumerate() {
        report.ranged(&format!("samples[{i}].duration"), &sample.duration, 0.0, f32::MAX);
    }
    report.ranged(
        "engine.tick_interval",
        &config.engine.tick_interval,
        f32::MIN_POSITIVE,
        f32::MAX,
    );
    report.ranged("engine.lookahead", &config.engine.lookahead, 0.0, f32::MAX);
    report.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::beat_track::SampleConfig;

    fn ramp_to(param: &str, value: &str, kind: &str) -> ParamEventConfig {
        ParamEventConfig::RampTo {
            param: param.to_string(),
            value: value.to_string(),
            at: "1s".to_string(),
            kind: kind.to_string(),
        }
    }

    #[test]
    fn valid_patch_passes() {
        let patch = SoundPatch::new("lead")
            .with_note("C4")
            .with_event(ramp_to("gain", "-60dB", "exponential"));
        assert_eq!(validate_patch(&patch), Ok(()));
    }

    #[test]
    fn exponential_to_zero_flagged() {
        let patch = SoundPatch::new("p").with_event(ramp_to("gain", "0", "exponential"));
        assert!(matches!(
            validate_patch(&patch),
            Err(ValidationError::InvalidExponentialRamp { .. })
        ));
        let linear = SoundPatch::new("p").with_event(ramp_to("gain", "0", "linear"));
        assert_eq!(validate_patch(&linear), Ok(()));
    }

    #[test]
    fn exponential_pan_flagged() {
        let patch = SoundPatch::new("p").with_event(ramp_to("pan", "0.5", "exp"));
        assert!(validate_patch(&patch).is_err());
    }

    #[test]
    fn all_problems_reported() {
        let patch = SoundPatch::new("p")
            .with_waveform("pulse")
            .with_event(ramp_to("wobble", "loud", "cubic"));
        let Err(ValidationError::Multiple(errors)) = validate_patch(&patch) else {
            panic!("expected multiple errors");
        };
        assert_eq!(errors.len(), 4);
    }

    #[test]
    fn beat_track_checks() {
        let config = BeatTrackConfig::new("t", 2, "0s").with_pattern("xxx");
        let Err(ValidationError::Multiple(errors)) = validate_beat_track(&config) else {
            panic!("expected multiple errors");
        };
        assert!(errors.contains(&ValidationError::NoSamples));
        assert!(errors.contains(&ValidationError::PatternTooLong {
            len: 3,
            num_beats: 2
        }));
        assert!(errors.iter().any(|e| matches!(
            e,
            ValidationError::OutOfRange { field, .. } if field == "beat_duration"
        )));

        let ok = BeatTrackConfig::new("t", 4, "250ms")
            .with_pattern("x.x.")
            .with_sample(SampleConfig::new("0.1s"));
        assert_eq!(validate_beat_track(&ok), Ok(()));
    }
}
