//! Beat track file format.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::rc::Rc;

use chime_core::{AudioBuffer, AudioContext, BeatTrack, Playable, Sampler};

use crate::engine::EngineConfig;
use crate::error::ConfigError;
use crate::file;
use crate::value::{field_seconds, field_value};

/// A step sequence over a set of samples.
///
/// Sample decoding happens outside this crate, so samples are described by
/// their length and format and built as silent buffers. Hosts that decode
/// real audio swap them for decoded buffers with the same shape.
///
/// # TOML Format
///
/// ```toml
/// name = "four on the floor"
/// num_beats = 8
/// beat_duration = "125ms"
/// pattern = "x..x x..."
/// pan = "-0.2"
///
/// [[samples]]
/// duration = "80ms"
/// sample_rate = 44100
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BeatTrackConfig {
    /// Track name.
    pub name: String,

    /// Steps per pass.
    pub num_beats: usize,

    /// Length of one step.
    pub beat_duration: String,

    /// Active steps: `x` plays, `.` rests; spaces and `|` are ignored.
    #[serde(default)]
    pub pattern: String,

    /// Sampler gain, applied only with `apply_sample_gain`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gain: Option<String>,

    /// Sampler pan.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pan: Option<String>,

    /// Whether the sampler gain overrides each sample's own.
    #[serde(default)]
    pub apply_sample_gain: bool,

    /// Timing settings.
    #[serde(default)]
    pub engine: EngineConfig,

    /// Samples in rotation order.
    #[serde(default)]
    pub samples: Vec<SampleConfig>,
}

/// Shape of one sample.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SampleConfig {
    /// Sample length.
    pub duration: String,

    /// Sample rate in Hz (defaults to 44100).
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    /// Channel count (defaults to 1).
    #[serde(default = "default_channels")]
    pub channels: usize,
}

fn default_sample_rate() -> u32 {
    44100
}

fn default_channels() -> usize {
    1
}

impl SampleConfig {
    /// A mono 44.1 kHz sample of `duration`.
    pub fn new(duration: impl Into<String>) -> Self {
        Self {
            duration: duration.into(),
            sample_rate: default_sample_rate(),
            channels: default_channels(),
        }
    }

    /// A silent buffer with this shape.
    pub fn buffer(&self, index: usize) -> Result<AudioBuffer, ConfigError> {
        let duration = field_seconds(&format!("samples[{index}].duration"), &self.duration)?;
        Ok(AudioBuffer::silent(
            self.sample_rate as f32,
            self.channels,
            duration,
        ))
    }
}

/// Parse a pattern string into active flags.
pub fn parse_pattern(pattern: &str) -> Result<Vec<bool>, ConfigError> {
    pattern
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '|')
        .map(|c| match c {
            'x' | 'X' | '1' | '*' => Ok(true),
            '.' | '-' | '0' | '_' => Ok(false),
            _ => Err(ConfigError::invalid_value("pattern", pattern)),
        })
        .collect()
}

/// Render active flags back into a pattern string.
pub fn format_pattern(pattern: &[bool]) -> String {
    pattern.iter().map(|&on| if on { 'x' } else { '.' }).collect()
}

impl BeatTrackConfig {
    /// `num_beats` rests of `beat_duration`.
    pub fn new(
        name: impl Into<String>,
        num_beats: usize,
        beat_duration: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            num_beats,
            beat_duration: beat_duration.into(),
            pattern: String::new(),
            gain: None,
            pan: None,
            apply_sample_gain: false,
            engine: EngineConfig::default(),
            samples: Vec::new(),
        }
    }

    /// Set the pattern string.
    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = pattern.into();
        self
    }

    /// Add a sample.
    pub fn with_sample(mut self, sample: SampleConfig) -> Self {
        self.samples.push(sample);
        self
    }

    /// Load a beat track from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        file::load(path.as_ref())
    }

    /// Load a beat track from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Save the beat track to a TOML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        file::save(self, path.as_ref())
    }

    /// Convert the beat track to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Active flags from the pattern string.
    pub fn pattern_flags(&self) -> Result<Vec<bool>, ConfigError> {
        parse_pattern(&self.pattern)
    }

    /// Beat length in seconds.
    pub fn beat_seconds(&self) -> Result<f64, ConfigError> {
        field_seconds("beat_duration", &self.beat_duration)
    }

    /// Build the sampler and beat track on `context`.
    pub fn build(&self, context: &AudioContext) -> Result<BeatTrack, ConfigError> {
        let buffers = self
            .samples
            .iter()
            .enumerate()
            .map(|(i, sample)| sample.buffer(i).map(Rc::new))
            .collect::<Result<Vec<_>, _>>()?;
        let mut sampler = Sampler::from_buffers(context, buffers)?;
        sampler.set_apply_gain(self.apply_sample_gain);
        if let Some(gain) = &self.gain {
            sampler.set_gain(field_value("gain", gain)?)?;
        }
        if let Some(pan) = &self.pan {
            sampler.set_pan(field_value("pan", pan)?)?;
        }

        let mut track =
            BeatTrack::from_sampler(context, sampler, self.num_beats, self.beat_seconds()?);
        track.set_pattern(&self.pattern_flags()?)?;
        tracing::debug!(
            name = %self.name,
            beats = self.num_beats,
            samples = self.samples.len(),
            "beat track built"
        );
        Ok(track)
    }
}
