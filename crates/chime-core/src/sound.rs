//! Buffer playback.

use std::rc::Rc;

use crate::buffer::AudioBuffer;
use crate::context::AudioContext;
use crate::error::Result;
use crate::graph::{
    AttributeRule, ConnectionGraph, NodeSource, ScheduledValue, SoundField, SoundSettings,
};
use crate::host::{NodeKind, ParamName};
use crate::lifecycle::{Playable, Playback};
use crate::param::{OnPlayRamp, OnPlaySet, ParamType, RampKind, Update};

/// A decoded buffer that can be played any number of times.
///
/// Each play creates a fresh buffer source node; gain and pan nodes persist.
///
/// # Example
///
/// ```rust,ignore
/// let mut kick = Sound::new(&context, buffer);
/// kick.on_play_set(ParamType::Gain).to(0.8);
/// kick.play()?;
/// ```
pub struct Sound {
    playback: Playback,
    rate: f32,
}

impl Sound {
    /// A sound over `buffer`.
    pub fn new(context: &AudioContext, buffer: Rc<AudioBuffer>) -> Self {
        let mut graph = ConnectionGraph::new(NodeSource::Create(NodeKind::BufferSource));
        let source = graph.source_mut();
        source.add_attribute(AttributeRule::Field(SoundField::Buffer));
        source.add_attribute(AttributeRule::Field(SoundField::Loop));
        let settings = SoundSettings {
            buffer: Some(buffer),
            ..SoundSettings::default()
        };
        Self {
            playback: Playback::new(context, graph, settings),
            rate: 1.0,
        }
    }

    /// Take ownership of a buffer.
    pub fn from_buffer(context: &AudioContext, buffer: AudioBuffer) -> Self {
        Self::new(context, Rc::new(buffer))
    }

    /// The buffer this sound plays.
    pub fn buffer(&self) -> Option<&Rc<AudioBuffer>> {
        self.playback.settings().buffer.as_ref()
    }

    /// Buffer length in seconds.
    pub fn duration(&self) -> f64 {
        self.buffer().map_or(0.0, |b| b.duration())
    }

    /// Loop the buffer on later plays. A looping sound only ends when stopped.
    pub fn set_loop(&mut self, looping: bool) {
        self.playback.settings_mut().looping = looping;
    }

    /// Whether later plays loop.
    pub fn is_looping(&self) -> bool {
        self.playback.settings().looping
    }

    /// Seconds into the buffer each play starts from.
    pub fn start_offset(&self) -> f64 {
        self.playback.start_offset()
    }

    /// Set the start offset for later plays.
    pub fn set_start_offset(&mut self, offset: f64) {
        self.playback.set_start_offset(offset);
    }

    /// Playback speed multiplier.
    pub fn playback_rate(&self) -> f32 {
        self.rate
    }

    /// Set the playback speed for later plays.
    pub fn set_playback_rate(&mut self, rate: f32) -> Result<()> {
        self.playback
            .graph_mut()
            .source_mut()
            .set_param(ParamName::PlaybackRate, ScheduledValue::Set(rate))?;
        self.rate = rate;
        self.playback.set_rate(f64::from(rate));
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

impl Playable for Sound {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, ParamError};
    use crate::host::NodeAttribute;
    use crate::offline::OfflineHost;

    fn setup(duration: f64) -> (Rc<OfflineHost>, Sound) {
        let host = Rc::new(OfflineHost::new());
        let context = AudioContext::with_host(host.clone());
        let sound = Sound::from_buffer(&context, AudioBuffer::silent(8000.0, 1, duration));
        (host, sound)
    }

    #[test]
    fn play_assigns_buffer_and_loop() {
        let (host, mut sound) = setup(1.0);
        sound.set_loop(true);
        sound.play().unwrap();
        let source = sound.playback().graph().source_node().unwrap();
        let node = host.node(source.id()).unwrap();
        assert_eq!(node.attribute("loop"), Some(NodeAttribute::Loop(true)));
        assert!(node.attribute("buffer").is_some());
    }

    #[test]
    fn ends_after_buffer_duration() {
        let (host, mut sound) = setup(0.5);
        sound.play().unwrap();
        host.advance_to(0.4);
        assert!(sound.is_playing());
        host.advance_to(0.6);
        assert!(!sound.is_playing());
    }

    #[test]
    fn playback_rate_shortens_duration() {
        let (host, mut sound) = setup(1.0);
        sound.set_playback_rate(2.0).unwrap();
        sound.play().unwrap();
        let source = sound.playback().graph().source_node().unwrap().id();
        assert_eq!(
            host.param_value_at(source, ParamName::PlaybackRate, 0.0),
            Some(2.0)
        );
        host.advance_to(0.6);
        assert!(!sound.is_playing());
    }

    #[test]
    fn start_offset_passed_to_source() {
        let (host, mut sound) = setup(2.0);
        sound.set_start_offset(0.75);
        sound.play().unwrap();
        let source = sound.playback().graph().source_node().unwrap().id();
        assert_eq!(host.node(source).unwrap().started(), Some((0.0, 0.75)));
    }

    #[test]
    fn frequency_is_unsupported_on_buffers() {
        let (_host, mut sound) = setup(1.0);
        sound.on_play_set(ParamType::Frequency).to(440.0);
        let err = sound.play().unwrap_err();
        assert!(matches!(err, Error::Param(ParamError::UnsupportedControl(_))));
    }
}
