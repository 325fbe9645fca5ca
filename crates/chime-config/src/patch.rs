//! Oscillator patch file format.

use serde::{Deserialize, Serialize};
use std::path::Path;

use chime_core::{
    AudioContext, BiquadType, EventId, Note, Oscillator, ParamController, ParamType, Playable,
    RampKind, Waveform,
};

use crate::error::ConfigError;
use crate::file;
use crate::value::{field_seconds, field_value};

/// An oscillator voice with filter stages and on-play automation.
///
/// # TOML Format
///
/// ```toml
/// name = "pluck"
/// waveform = "sawtooth"
/// note = "A3"
/// gain = "-6dB"
///
/// [[stages]]
/// type = "filter"
/// filter = "lowpass"
/// frequency = "1.2kHz"
///
/// [[events]]
/// event = "ramp"
/// param = "gain"
/// from = "0dB"
/// to = "-60dB"
/// over = "400ms"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SoundPatch {
    /// Patch name.
    pub name: String,

    /// Optional description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Waveform name (`sine`, `square`, `sawtooth`, `triangle`).
    #[serde(default = "default_waveform")]
    pub waveform: String,

    /// Note name such as `"C#4"`. Takes precedence over `frequency`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,

    /// Base frequency, e.g. `"220Hz"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency: Option<String>,

    /// Output gain kept across plays.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gain: Option<String>,

    /// Stereo position in [-1, 1].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pan: Option<String>,

    /// Processing stages between the oscillator and its gain.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stages: Vec<StageConfig>,

    /// Automation replayed on every play.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<ParamEventConfig>,
}

fn default_waveform() -> String {
    "sine".to_string()
}

/// A processing stage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StageConfig {
    /// Biquad filter.
    Filter {
        /// Response type name.
        #[serde(default = "default_filter")]
        filter: String,
        /// Cutoff or center frequency.
        frequency: String,
        /// Resonance.
        #[serde(default = "default_q")]
        q: String,
    },
    /// Delay line.
    Delay {
        /// Delay time, e.g. `"120ms"`.
        time: String,
    },
}

fn default_filter() -> String {
    "lowpass".to_string()
}

fn default_q() -> String {
    "1".to_string()
}

/// One queued parameter event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ParamEventConfig {
    /// Set at play time.
    Set {
        /// Parameter name.
        param: String,
        /// Value.
        value: String,
    },
    /// Set `at` seconds after play.
    SetAt {
        /// Parameter name.
        param: String,
        /// Value.
        value: String,
        /// Offset from play time.
        at: String,
    },
    /// Ramp from the previous value, arriving `at` seconds after play.
    RampTo {
        /// Parameter name.
        param: String,
        /// Target value.
        value: String,
        /// Offset from play time.
        at: String,
        /// `exponential` or `linear`.
        #[serde(default = "default_ramp_kind")]
        kind: String,
    },
    /// Set `from` at play time and ramp to `to` over `over` seconds.
    Ramp {
        /// Parameter name.
        param: String,
        /// Start value.
        from: String,
        /// End value.
        to: String,
        /// Ramp length.
        over: String,
        /// `exponential` or `linear`.
        #[serde(default = "default_ramp_kind")]
        kind: String,
    },
}

fn default_ramp_kind() -> String {
    "exponential".to_string()
}

impl ParamEventConfig {
    /// Name of the automated parameter.
    pub fn param_name(&self) -> &str {
        match self {
            ParamEventConfig::Set { param, .. }
            | ParamEventConfig::SetAt { param, .. }
            | ParamEventConfig::RampTo { param, .. }
            | ParamEventConfig::Ramp { param, .. } => param,
        }
    }

    /// Queue this event on `controller`. `index` only labels errors.
    pub fn apply(
        &self,
        index: usize,
        controller: &mut ParamController,
    ) -> Result<EventId, ConfigError> {
        let field = |name: &str| format!("events[{index}].{name}");
        let param: ParamType = self.param_name().parse()?;
        let id = match self {
            ParamEventConfig::Set { value, .. } => {
                let value = field_value(&field("value"), value)?;
                controller.on_play_set(param).to(value).id()
            }
            ParamEventConfig::SetAt { value, at, .. } => {
                let value = field_value(&field("value"), value)?;
                let at = field_seconds(&field("at"), at)?;
                controller.on_play_set(param).to(value).at(at)
            }
            ParamEventConfig::RampTo {
                value, at, kind, ..
            } => {
                let value = field_value(&field("value"), value)?;
                let at = field_seconds(&field("at"), at)?;
                let kind: RampKind = kind.parse()?;
                let queued = controller.on_play_set(param).to(value);
                let id = queued.id();
                if let Err(err) = queued.ending_at_with(at, kind) {
                    controller.remove(id);
                    return Err(err.into());
                }
                id
            }
            ParamEventConfig::Ramp {
                from,
                to,
                over,
                kind,
                ..
            } => {
                let from = field_value(&field("from"), from)?;
                let to = field_value(&field("to"), to)?;
                let over = field_seconds(&field("over"), over)?;
                let kind: RampKind = kind.parse()?;
                controller
                    .on_play_ramp(param, kind)
                    .from(from)
                    .to(to)
                    .over(over)?
            }
        };
        Ok(id)
    }
}

impl SoundPatch {
    /// An empty sine patch.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            waveform: default_waveform(),
            note: None,
            frequency: None,
            gain: None,
            pan: None,
            stages: Vec::new(),
            events: Vec::new(),
        }
    }

    /// Set the waveform name.
    pub fn with_waveform(mut self, waveform: impl Into<String>) -> Self {
        self.waveform = waveform.into();
        self
    }

    /// Tune to a note name.
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    /// Set the output gain.
    pub fn with_gain(mut self, gain: impl Into<String>) -> Self {
        self.gain = Some(gain.into());
        self
    }

    /// Add a stage.
    pub fn with_stage(mut self, stage: StageConfig) -> Self {
        self.stages.push(stage);
        self
    }

    /// Add an event.
    pub fn with_event(mut self, event: ParamEventConfig) -> Self {
        self.events.push(event);
        self
    }

    /// Load a patch from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        file::load(path.as_ref())
    }

    /// Load a patch from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Save the patch to a TOML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        file::save(self, path.as_ref())
    }

    /// Convert the patch to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Queue every event on `controller`, in file order.
    ///
    /// Works for any sound's controller, not just oscillators built from
    /// this patch.
    pub fn apply_events(
        &self,
        controller: &mut ParamController,
    ) -> Result<Vec<EventId>, ConfigError> {
        self.events
            .iter()
            .enumerate()
            .map(|(i, event)| event.apply(i, controller))
            .collect()
    }

    /// Build an oscillator from this patch on `context`.
    pub fn build(&self, context: &AudioContext) -> Result<Oscillator, ConfigError> {
        let waveform: Waveform = self.waveform.parse()?;
        let mut osc = match &self.note {
            Some(name) => {
                let note: Note = name
                    .parse()
                    .map_err(|_| ConfigError::invalid_value("note", name.as_str()))?;
                Oscillator::for_note(context, note, waveform)
            }
            None => Oscillator::new(context, waveform),
        };
        if let (None, Some(frequency)) = (&self.note, &self.frequency) {
            osc.set_frequency(field_value("frequency", frequency)?)?;
        }
        if let Some(gain) = &self.gain {
            osc.set_gain(field_value("gain", gain)?)?;
        }
        if let Some(pan) = &self.pan {
            osc.set_pan(field_value("pan", pan)?)?;
        }
        for (i, stage) in self.stages.iter().enumerate() {
            match stage {
                StageConfig::Filter {
                    filter,
                    frequency,
                    q,
                } => {
                    let filter: BiquadType = filter.parse()?;
                    let frequency = field_value(&format!("stages[{i}].frequency"), frequency)?;
                    let q = field_value(&format!("stages[{i}].q"), q)?;
                    osc.add_filter(filter, frequency, q)?;
                }
                StageConfig::Delay { time } => {
                    osc.add_delay(field_value(&format!("stages[{i}].time"), time)?)?;
                }
            }
        }
        self.apply_events(osc.playback_mut().params_mut())?;
        tracing::debug!(
            name = %self.name,
            stages = self.stages.len(),
            events = self.events.len(),
            "patch built"
        );
        Ok(osc)
    }
}

impl Default for SoundPatch {
    fn default() -> Self {
        Self::new("Untitled")
    }
}
