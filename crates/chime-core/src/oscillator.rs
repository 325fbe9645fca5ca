//! Generated waveforms with optional filter stages.
//!
//! An [`Oscillator`] has no natural end: it plays until stopped. Filter
//! stages are ordinary connections inserted between the source and the gain
//! node, so they persist across plays while the oscillator itself is
//! recreated each time.

use std::rc::Rc;

use crate::context::AudioContext;
use crate::error::Result;
use crate::graph::{
    AttributeRule, Connection, ConnectionGraph, NodeSource, ScheduledValue, SoundField,
    SoundSettings,
};
use crate::host::{BiquadType, NodeAttribute, NodeKind, Oversample, ParamName, Waveform};
use crate::lifecycle::{Playable, Playback};
use crate::note::Note;
use crate::param::{OnPlayRamp, OnPlaySet, ParamType, RampKind, Update};

/// Default oscillator frequency in Hz.
pub const DEFAULT_FREQUENCY: f32 = 440.0;

/// A periodic waveform source.
pub struct Oscillator {
    playback: Playback,
    stages: usize,
}

impl Oscillator {
    /// An oscillator at [`DEFAULT_FREQUENCY`].
    pub fn new(context: &AudioContext, waveform: Waveform) -> Self {
        let mut graph = ConnectionGraph::new(NodeSource::Create(NodeKind::Oscillator));
        graph
            .source_mut()
            .add_attribute(AttributeRule::Field(SoundField::Waveform));
        let settings = SoundSettings {
            waveform,
            ..SoundSettings::default()
        };
        let mut playback = Playback::new(context, graph, settings);
        playback
            .params_mut()
            .set_live_value(ParamType::Frequency, DEFAULT_FREQUENCY);
        Self { playback, stages: 0 }
    }

    /// An oscillator tuned to `note`.
    pub fn for_note(context: &AudioContext, note: Note, waveform: Waveform) -> Self {
        let mut oscillator = Self::new(context, waveform);
        oscillator
            .playback
            .params_mut()
            .set_live_value(ParamType::Frequency, note.frequency());
        oscillator
    }

    /// Current waveform.
    pub fn waveform(&self) -> Waveform {
        self.playback.settings().waveform
    }

    /// Change the waveform, including on a sounding oscillator.
    pub fn set_waveform(&mut self, waveform: Waveform) -> Result<()> {
        self.playback.settings_mut().waveform = waveform;
        if self.playback.graph().is_materialized() {
            self.playback
                .graph()
                .source_node()?
                .set_attribute(NodeAttribute::Waveform(waveform))?;
        }
        Ok(())
    }

    /// Base frequency in Hz.
    pub fn frequency(&self) -> f32 {
        self.playback
            .params()
            .live_value(ParamType::Frequency)
            .unwrap_or(DEFAULT_FREQUENCY)
    }

    /// Set the base frequency, live if sounding.
    pub fn set_frequency(&mut self, frequency: f32) -> Result<()> {
        self.playback
            .update(ParamType::Frequency)
            .to(frequency)
            .apply()
            .map(|_| ())
    }

    fn next_stage_name(&mut self, prefix: &str) -> String {
        self.stages += 1;
        format!("{prefix}-{}", self.stages)
    }

    fn add_stage(&mut self, connection: Connection) -> Result<String> {
        let name = connection.name().to_string();
        self.playback.graph_mut().add_connection(connection)?;
        Ok(name)
    }

    /// Append a biquad filter stage. Returns the stage name.
    pub fn add_filter(&mut self, filter: BiquadType, frequency: f32, q: f32) -> Result<String> {
        let name = self.next_stage_name("filter");
        let stage = Connection::create(name, NodeKind::BiquadFilter)
            .with_attribute(AttributeRule::Literal(NodeAttribute::FilterType(filter)))
            .with_param(ParamName::Frequency, ScheduledValue::Set(frequency))?
            .with_param(ParamName::Q, ScheduledValue::Set(q))?;
        self.add_stage(stage)
    }

    /// Append a wave shaper stage with the given transfer curve.
    pub fn add_wave_shaper(
        &mut self,
        curve: impl Into<Rc<[f32]>>,
        oversample: Oversample,
    ) -> Result<String> {
        let name = self.next_stage_name("shaper");
        self.add_stage(
            Connection::create(name, NodeKind::WaveShaper)
                .with_attribute(AttributeRule::Literal(NodeAttribute::Curve(curve.into())))
                .with_attribute(AttributeRule::Literal(NodeAttribute::Oversample(oversample))),
        )
    }

    /// Append a delay stage.
    pub fn add_delay(&mut self, delay_time: f32) -> Result<String> {
        let name = self.next_stage_name("delay");
        let stage = Connection::create(name, NodeKind::Delay)
            .with_param(ParamName::DelayTime, ScheduledValue::Set(delay_time))?;
        self.add_stage(stage)
    }

    /// Remove a stage added earlier.
    pub fn remove_stage(&mut self, name: &str) -> Result<()> {
        self.playback.graph_mut().remove_connection(name)?;
        Ok(())
    }

    /// See [`ParamController::on_play_set`](crate::ParamController::on_play_set).
    pub fn on_play_set(&mut self, param: ParamType) -> OnPlaySet<'_> {
        self.playback.on_play_set(param)
    }

    /// See [`ParamController::on_play_ramp`](crate::ParamController::on_play_ramp).
    pub fn on_play_ramp(&mut self, param: ParamType, kind: RampKind) -> OnPlayRamp<'_> {
        self.playback.on_play_ramp(param, kind)
    }

    /// See [`ParamController::update`](crate::ParamController::update).
    pub fn update(&mut self, param: ParamType) -> Update<'_> {
        self.playback.update(param)
    }

    /// The lifecycle engine.
    pub fn playback(&self) -> &Playback {
        &self.playback
    }

    /// The lifecycle engine, for graph and automation access.
    pub fn playback_mut(&mut self) -> &mut Playback {
        &mut self.playback
    }
}

impl Playable for Oscillator {
    fn current_time(&self) -> Result<f64> {
        self.playback.current_time()
    }

    fn play_at(&mut self, time: f64) -> Result<()> {
        self.playback.play_at(time)
    }

    fn stop_at(&mut self, time: f64) -> Result<()> {
        self.playback.stop_at(time)
    }

    fn is_playing(&self) -> bool {
        self.playback.is_playing()
    }

    fn set_gain(&mut self, gain: f32) -> Result<()> {
        self.playback.set_gain(gain)
    }

    fn set_pan(&mut self, pan: f32) -> Result<()> {
        self.playback.set_pan(pan)
    }
}
