//! Integration tests for chime-core.
//!
//! These drive complete sounds against the offline host and check what the
//! host was asked to do: which nodes exist, how they are wired, what
//! automation they received and when sources start and stop.

use std::cell::Cell;
use std::rc::Rc;

use chime_core::offline::{AutomationOp, HostEvent, OfflineHost};
use chime_core::{
    AudioBuffer, AudioContext, BeatTrack, Connection, ConnectionGraph, ContextError, Error,
    GraphError, LayeredSound, NodeId, NodeKind, NodeSource, Oscillator, ParamError, ParamName,
    ParamType, Playable, RampKind, RatioKind, Result, Sampler, ScheduledValue, SharedPlayable,
    Sound, SoundSettings, Track, Waveform,
};

fn setup() -> (Rc<OfflineHost>, AudioContext) {
    let host = Rc::new(OfflineHost::new());
    let context = AudioContext::with_host(host.clone());
    (host, context)
}

fn buffer(duration: f64) -> Rc<AudioBuffer> {
    Rc::new(AudioBuffer::silent(1000.0, 1, duration))
}

fn gain_node(osc: &Oscillator) -> NodeId {
    osc.playback()
        .graph()
        .get_node_from(ConnectionGraph::GAIN)
        .unwrap()
        .id()
}

/// Playable that only counts calls.
#[derive(Default)]
struct Counting {
    plays: Rc<Cell<usize>>,
    stops: Rc<Cell<usize>>,
}

impl Playable for Counting {
    fn current_time(&self) -> Result<f64> {
        Ok(0.0)
    }

    fn play_at(&mut self, _time: f64) -> Result<()> {
        self.plays.set(self.plays.get() + 1);
        Ok(())
    }

    fn stop_at(&mut self, _time: f64) -> Result<()> {
        self.stops.set(self.stops.get() + 1);
        Ok(())
    }

    fn is_playing(&self) -> bool {
        self.plays.get() > self.stops.get()
    }

    fn set_gain(&mut self, _gain: f32) -> Result<()> {
        Ok(())
    }

    fn set_pan(&mut self, _pan: f32) -> Result<()> {
        Ok(())
    }
}

// ============================================================================
// 1. Context preconditions
// ============================================================================

#[test]
fn uninitialized_context_rejects_playback() {
    let context = AudioContext::new();
    let mut osc = Oscillator::new(&context, Waveform::Sine);
    let err = osc.play().unwrap_err();
    assert_eq!(err, Error::Context(ContextError::NotInitialized));
}

#[test]
fn late_initialization_enables_existing_sounds() {
    let context = AudioContext::new();
    let mut osc = Oscillator::new(&context, Waveform::Square);
    let host = Rc::new(OfflineHost::suspended());
    context.initialize(host.clone()).unwrap();
    osc.play().unwrap();
    assert!(osc.is_playing());
    assert!(matches!(host.events()[0].event, HostEvent::Resumed));
}

// ============================================================================
// 2. Connection graph
// ============================================================================

#[test]
fn wiring_twice_keeps_order_and_persistent_nodes() {
    let (host, context) = setup();
    let mut graph = ConnectionGraph::new(NodeSource::Create(NodeKind::Oscillator));
    graph
        .add_connection(Connection::create("filter", NodeKind::BiquadFilter))
        .unwrap();
    let settings = SoundSettings::default();

    graph.wire(&context, &settings, 0.0).unwrap();
    let first: Vec<_> = graph
        .connections()
        .iter()
        .map(|c| c.node().unwrap().id())
        .collect();
    graph.wire(&context, &settings, 1.0).unwrap();
    let second: Vec<_> = graph
        .connections()
        .iter()
        .map(|c| c.node().unwrap().id())
        .collect();

    let names: Vec<_> = graph.names().collect();
    assert_eq!(names, ["source", "filter", "gain", "pan"]);
    assert_ne!(first[0], second[0], "oscillator is recreated");
    assert_eq!(first[1..], second[1..], "persistent nodes survive");
    assert_eq!(host.created_count(NodeKind::BiquadFilter), 1);
    assert_eq!(host.created_count(NodeKind::Gain), 1);
    assert_eq!(host.created_count(NodeKind::StereoPanner), 1);
    assert_eq!(host.outputs(second[0]), vec![second[1]]);
    assert_eq!(host.outputs(second[3]), vec![host.destination_id()]);
}

#[test]
fn missing_node_source_fails_at_play() {
    let (_host, context) = setup();
    let mut osc = Oscillator::new(&context, Waveform::Sine);
    osc.playback_mut()
        .graph_mut()
        .add_connection(Connection::new("reverb"))
        .unwrap();
    let err = osc.play().unwrap_err();
    assert_eq!(
        err,
        Error::Graph(GraphError::MissingNodeSource("reverb".to_string()))
    );
}

#[test]
fn stages_sit_between_source_and_gain() {
    let (host, context) = setup();
    let mut osc = Oscillator::new(&context, Waveform::Sawtooth);
    let filter = osc
        .add_filter(chime_core::BiquadType::Lowpass, 800.0, 0.7)
        .unwrap();
    osc.add_delay(0.1).unwrap();
    osc.play().unwrap();

    let graph = osc.playback().graph();
    let names: Vec<_> = graph.names().collect();
    assert_eq!(names, ["source", filter.as_str(), "delay-2", "gain", "pan"]);
    let filter_id = graph.get_node_from(&filter).unwrap().id();
    assert_eq!(
        host.param_value_at(filter_id, ParamName::Frequency, 0.0),
        Some(800.0)
    );
}

#[test]
fn exponential_rule_to_zero_never_reaches_host() {
    let (host, context) = setup();
    let mut osc = Oscillator::new(&context, Waveform::Sine);
    let err = Connection::create("sweep", NodeKind::BiquadFilter)
        .with_param(
            ParamName::Frequency,
            ScheduledValue::RampTo {
                value: 0.0,
                time: 1.0,
            },
        )
        .unwrap_err();
    assert!(matches!(err, ParamError::ExponentialRuleToZero { .. }));

    osc.play().unwrap();
    assert_eq!(osc.playback().graph().len(), 3);
    assert!(!host.events().iter().any(|e| matches!(
        e.event,
        HostEvent::Automation {
            op: AutomationOp::ExponentialRamp,
            ..
        }
    )));
}

// ============================================================================
// 3. Play/stop lifecycle
// ============================================================================

#[test]
fn repeated_play_at_schedules_once() {
    let (host, context) = setup();
    let mut osc = Oscillator::new(&context, Waveform::Sine);
    osc.play_at(0.5).unwrap();
    let created = host.created_count(NodeKind::Oscillator);
    let events = host.events().len();
    osc.play_at(0.5).unwrap();
    assert_eq!(host.created_count(NodeKind::Oscillator), created);
    assert_eq!(host.events().len(), events);
    assert_eq!(host.starts().len(), 1);
}

#[test]
fn stop_with_nothing_registered_does_nothing() {
    let (host, context) = setup();
    let mut sound = Sound::new(&context, buffer(1.0));
    sound.stop_at(2.0).unwrap();
    sound.stop().unwrap();
    assert!(host.stops().is_empty());
    assert!(host.events().is_empty());
    assert!(!sound.is_playing());
}

#[test]
fn sound_play_and_stop_transitions() {
    let (host, context) = setup();
    let mut sound = Sound::new(&context, buffer(5.0));
    assert!(!sound.is_playing());
    sound.play().unwrap();
    assert!(sound.is_playing());
    host.advance_to(1.0);
    sound.stop().unwrap();
    assert!(!sound.is_playing());
    assert_eq!(host.stops().len(), 1);
}

#[test]
fn sound_ends_naturally() {
    let (host, context) = setup();
    let mut sound = Sound::new(&context, buffer(0.5));
    sound.play().unwrap();
    host.advance_to(0.4);
    assert!(sound.is_playing());
    host.advance_to(0.6);
    assert!(!sound.is_playing());
}

#[test]
fn stop_between_plays_stops_only_earlier_play() {
    let (host, context) = setup();
    let mut osc = Oscillator::new(&context, Waveform::Sine);
    osc.play_at(1.0).unwrap();
    osc.play_at(3.0).unwrap();
    osc.stop_at(2.0).unwrap();

    let starts = host.starts();
    assert_eq!(host.stops(), vec![(starts[0].0, 2.0)]);
    assert_eq!(osc.playback().registry().times(), vec![3.0]);
    host.advance_to(1.5);
    assert!(osc.is_playing());
    host.advance_to(2.5);
    assert!(!osc.is_playing());
    host.advance_to(3.5);
    assert!(osc.is_playing());
}

#[test]
fn stop_before_every_play_does_nothing() {
    let (host, context) = setup();
    let mut osc = Oscillator::new(&context, Waveform::Sine);
    osc.play_at(2.0).unwrap();
    osc.stop_at(1.0).unwrap();
    assert!(host.stops().is_empty());
    assert_eq!(osc.playback().registry().times(), vec![2.0]);
    host.advance_to(2.5);
    assert!(osc.is_playing());
}

#[test]
fn play_for_longer_than_buffer_ends_with_buffer() {
    let (host, context) = setup();
    let mut sound = Sound::new(&context, buffer(1.0));
    sound.play_for(5.0).unwrap();
    assert_eq!(host.stops()[0].1, 5.0);
    host.advance_to(0.5);
    assert!(sound.is_playing());
    host.advance_to(2.0);
    assert!(!sound.is_playing());
    host.advance_to(6.0);
    assert!(!sound.is_playing());
}

#[test]
fn play_in_and_stop_after_brackets_the_play() {
    let (host, context) = setup();
    let mut osc = Oscillator::new(&context, Waveform::Triangle);
    osc.play_in_and_stop_after(1.0, 2.0).unwrap();
    assert_eq!(host.starts()[0].1, 1.0);
    assert_eq!(host.stops()[0].1, 3.0);
    assert!(!osc.is_playing());
    host.advance_to(1.5);
    assert!(osc.is_playing());
    host.advance_to(3.5);
    assert!(!osc.is_playing());
}

// ============================================================================
// 4. Parameter automation
// ============================================================================

#[test]
fn on_play_ramp_matches_set_then_ramp() {
    let (host, context) = setup();
    for kind in [RampKind::Linear, RampKind::Exponential] {
        let mut ramped = Oscillator::new(&context, Waveform::Sine);
        ramped
            .on_play_ramp(ParamType::Gain, kind)
            .from(1.0)
            .to(0.25)
            .over(1.0)
            .unwrap();

        let mut manual = Oscillator::new(&context, Waveform::Sine);
        manual.on_play_set(ParamType::Gain).to(1.0);
        manual
            .on_play_set(ParamType::Gain)
            .to(0.25)
            .ending_at_with(1.0, kind)
            .unwrap();

        let start = host.now();
        ramped.play().unwrap();
        manual.play().unwrap();
        let (a, b) = (gain_node(&ramped), gain_node(&manual));
        for step in 0..=12 {
            let t = start + f64::from(step) * 0.1;
            let left = host.param_value_at(a, ParamName::Gain, t).unwrap();
            let right = host.param_value_at(b, ParamName::Gain, t).unwrap();
            assert!((left - right).abs() < 1e-6, "{kind} at {t}: {left} vs {right}");
        }
        host.advance_by(2.0);
    }
}

#[test]
fn exponential_ramp_to_zero_is_rejected() {
    let (_host, context) = setup();
    let mut osc = Oscillator::new(&context, Waveform::Sine);
    let err = osc
        .on_play_ramp(ParamType::Gain, RampKind::Exponential)
        .from(1.0)
        .to(0.0)
        .over(0.5)
        .unwrap_err();
    assert!(matches!(err, ParamError::ExponentialToZero { .. }));
    assert!(osc.playback().params().is_empty());
}

#[test]
fn events_replay_on_every_play() {
    let (host, context) = setup();
    let mut osc = Oscillator::new(&context, Waveform::Sine);
    osc.on_play_set(ParamType::Gain).to(0.5);
    osc.on_play_set(ParamType::Gain).to(0.1).at(0.5);

    osc.play_for(1.0).unwrap();
    host.advance_to(2.0);
    osc.play_for(1.0).unwrap();

    let gain = gain_node(&osc);
    assert_eq!(host.param_value_at(gain, ParamName::Gain, 2.1), Some(0.5));
    assert_eq!(host.param_value_at(gain, ParamName::Gain, 2.6), Some(0.1));
}

#[test]
fn live_updates_persist_to_later_plays() {
    let (host, context) = setup();
    let mut osc = Oscillator::new(&context, Waveform::Sine);
    osc.play().unwrap();
    osc.set_gain(0.3).unwrap();
    let gain = gain_node(&osc);
    assert_eq!(host.param_value_at(gain, ParamName::Gain, 0.0), Some(0.3));

    osc.stop().unwrap();
    host.advance_to(1.0);
    osc.play().unwrap();
    assert_eq!(host.param_value_at(gain, ParamName::Gain, 1.0), Some(0.3));
}

#[test]
fn percent_update_scales_value() {
    let (host, context) = setup();
    let mut osc = Oscillator::new(&context, Waveform::Sine);
    osc.play().unwrap();
    osc.update(ParamType::Gain)
        .to(50.0)
        .from(RatioKind::Percent)
        .unwrap();
    let gain = gain_node(&osc);
    assert_eq!(host.param_value_at(gain, ParamName::Gain, 0.0), Some(0.5));
}

// ============================================================================
// 5. Composites
// ============================================================================

#[test]
fn layered_sound_plays_each_layer_once() {
    let (_host, context) = setup();
    let a = Counting::default();
    let b = Counting::default();
    let (a_plays, b_plays) = (a.plays.clone(), b.plays.clone());
    let layers: Vec<SharedPlayable> = vec![a.into_shared(), b.into_shared()];
    let mut layered = LayeredSound::new(&context, layers).unwrap();
    layered.play().unwrap();
    assert_eq!(a_plays.get(), 1);
    assert_eq!(b_plays.get(), 1);
}

#[test]
fn sampler_cycles_in_order() {
    let (_host, context) = setup();
    let counters: Vec<Counting> = (0..3).map(|_| Counting::default()).collect();
    let plays: Vec<_> = counters.iter().map(|c| c.plays.clone()).collect();
    let sounds = counters.into_iter().map(Playable::into_shared).collect();
    let mut sampler = Sampler::new(&context, sounds).unwrap();

    let mut order = Vec::new();
    for _ in 0..4 {
        let before: Vec<_> = plays.iter().map(|p| p.get()).collect();
        sampler.play().unwrap();
        let hit = plays
            .iter()
            .zip(&before)
            .position(|(p, b)| p.get() > *b)
            .unwrap();
        order.push(hit);
    }
    assert_eq!(order, [0, 1, 2, 0]);
}

#[test]
fn beat_track_resize_scenario() {
    let (_host, context) = setup();
    let sounds = vec![Sound::new(&context, buffer(0.1)).into_shared()];
    let mut track = BeatTrack::new(&context, sounds, 4, 0.25).unwrap();
    track.set_active(0, true).unwrap();
    track.set_active(2, true).unwrap();

    track.set_num_beats(6);
    assert_eq!(track.pattern(), [true, false, true, false, false, false]);
    track.set_num_beats(4);
    assert_eq!(track.pattern(), [true, false, true, false]);
}

#[test]
fn beat_pass_plays_active_beats_only() {
    let (host, context) = setup();
    let sounds = vec![
        Sound::new(&context, buffer(0.1)).into_shared(),
        Sound::new(&context, buffer(0.1)).into_shared(),
    ];
    let mut track = BeatTrack::new(&context, sounds, 4, 0.5).unwrap();
    track.set_pattern(&[true, true, false, true]).unwrap();
    track.schedule_pass(0.0).unwrap();
    let times: Vec<_> = host.starts().iter().map(|&(_, t)| t).collect();
    assert_eq!(times, [0.0, 0.5, 1.5]);

    host.advance_to(1.1);
    assert!(track.beats()[2].current_time_is_playing());
    assert!(!track.beats()[2].is_playing());
}

// ============================================================================
// 6. Track transport
// ============================================================================

#[test]
fn track_seek_by_ratio_and_percent() {
    let (_host, context) = setup();
    let mut track = Track::new(&context, buffer(10.0));
    let pos = track.seek(0.5).from(RatioKind::Ratio).unwrap();
    assert!((pos - 5.0).abs() < 1e-9);
    let pos = track.seek(90.0).from(RatioKind::Percent).unwrap();
    assert!((pos - 9.0).abs() < 1e-9);
}

#[test]
fn track_pause_resume_continues() {
    let (host, context) = setup();
    let mut track = Track::new(&context, buffer(10.0)).with_tick_interval(0.1);
    track.play().unwrap();
    host.advance_to(3.0);
    track.pause().unwrap();
    host.advance_to(4.0);
    track.resume().unwrap();
    host.advance_to(5.05);
    assert!((track.position() - 4.0).abs() < 0.11);
    assert!(track.is_playing());
}
