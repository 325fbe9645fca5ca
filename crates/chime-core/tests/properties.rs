//! Property-based tests for chime-core scheduling primitives.
//!
//! Tests play deduplication, graph wiring stability, ramp bounds, rotation
//! order and note conversions using proptest for randomized input generation.

use std::rc::Rc;

use proptest::prelude::*;

use chime_core::note::identifier_frequency;
use chime_core::offline::OfflineHost;
use chime_core::{
    AudioBuffer, AudioContext, BeatTrack, Connection, ConnectionGraph, NodeKind, NodeSource,
    Oscillator, ParamName, ParamType, Playable, RampKind, RatioKind, Sampler, SoundSettings,
    Waveform, nearest_note, note_from_identifier,
};

fn setup() -> (Rc<OfflineHost>, AudioContext) {
    let host = Rc::new(OfflineHost::new());
    let context = AudioContext::with_host(host.clone());
    (host, context)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Any sequence of `play_at` calls starts one source per distinct time.
    #[test]
    fn play_at_starts_once_per_distinct_time(slots in prop::collection::vec(0u8..8, 1..24)) {
        let (host, context) = setup();
        let mut osc = Oscillator::new(&context, Waveform::Sine);
        let mut distinct: Vec<f64> = Vec::new();
        for slot in slots {
            let time = f64::from(slot) * 0.25;
            osc.play_at(time).unwrap();
            if !distinct.contains(&time) {
                distinct.push(time);
            }
        }
        prop_assert_eq!(host.starts().len(), distinct.len());
        prop_assert_eq!(host.created_count(NodeKind::Oscillator), distinct.len());
    }

    /// Wiring any number of times keeps the connection order and creates
    /// each persistent node exactly once.
    #[test]
    fn wiring_is_stable(stages in 0usize..5, passes in 1usize..5) {
        let (host, context) = setup();
        let mut graph = ConnectionGraph::new(NodeSource::Create(NodeKind::Oscillator));
        for i in 0..stages {
            graph
                .add_connection(Connection::create(format!("stage-{i}"), NodeKind::Delay))
                .unwrap();
        }
        let order: Vec<String> = graph.names().map(str::to_string).collect();
        let settings = SoundSettings::default();
        for pass in 0..passes {
            graph.wire(&context, &settings, pass as f64).unwrap();
        }
        let after: Vec<String> = graph.names().map(str::to_string).collect();
        prop_assert_eq!(order, after);
        prop_assert_eq!(host.created_count(NodeKind::Delay), stages);
        prop_assert_eq!(host.created_count(NodeKind::Gain), 1);
        prop_assert_eq!(host.created_count(NodeKind::Oscillator), passes);
    }

    /// A linear ramp never leaves the range spanned by its endpoints.
    #[test]
    fn linear_ramp_stays_within_endpoints(
        start in 0.0f32..2.0,
        end in 0.0f32..2.0,
        duration in 0.01f64..5.0,
        probes in prop::collection::vec(0.0f64..6.0, 1..16),
    ) {
        let (host, context) = setup();
        let mut osc = Oscillator::new(&context, Waveform::Sine);
        osc.on_play_ramp(ParamType::Gain, RampKind::Linear)
            .from(start)
            .to(end)
            .over(duration)
            .unwrap();
        osc.play().unwrap();
        let gain = osc.playback().graph().get_node_from(ConnectionGraph::GAIN).unwrap().id();
        let (lo, hi) = (start.min(end), start.max(end));
        for t in probes {
            let value = host.param_value_at(gain, ParamName::Gain, t).unwrap();
            prop_assert!(
                value >= lo - 1e-5 && value <= hi + 1e-5,
                "{} outside [{}, {}]",
                value,
                lo,
                hi
            );
        }
    }

    /// Ratio and inverse ratio of the same value sum to one.
    #[test]
    fn inverse_ratio_complements_ratio(value in -10.0f32..10.0) {
        let sum = RatioKind::Ratio.apply(value) + RatioKind::InverseRatio.apply(value);
        prop_assert!((sum - 1.0).abs() < 1e-5);
        prop_assert!((RatioKind::Percent.apply(value * 100.0) - value).abs() < 1e-4);
    }

    /// Every sound of a sampler is chosen in turn.
    #[test]
    fn sampler_rotates_evenly(sounds in 1usize..6, plays in 0usize..20) {
        let (_host, context) = setup();
        let buffers = (0..sounds).map(|_| Rc::new(AudioBuffer::silent(1000.0, 1, 0.1)));
        let mut sampler = Sampler::from_buffers(&context, buffers).unwrap();
        let mut picks = vec![0usize; sounds];
        for _ in 0..plays {
            let chosen = sampler.next_sound().unwrap();
            let index = sampler
                .sounds()
                .iter()
                .position(|s| Rc::ptr_eq(s, &chosen))
                .unwrap();
            picks[index] += 1;
        }
        prop_assert_eq!(sampler.cursor(), plays % sounds);
        for (i, &count) in picks.iter().enumerate() {
            let expected = plays / sounds + usize::from(i < plays % sounds);
            prop_assert_eq!(count, expected);
        }
    }

    /// Shrinking then regrowing a beat row restores the hidden beats.
    #[test]
    fn beat_resize_round_trip(
        pattern in prop::collection::vec(any::<bool>(), 1..12),
        shrink in 0usize..12,
    ) {
        let (_host, context) = setup();
        let sampler =
            Sampler::from_buffers(&context, [Rc::new(AudioBuffer::silent(1000.0, 1, 0.1))])
                .unwrap();
        let len = pattern.len();
        let mut track = BeatTrack::from_sampler(&context, sampler, len, 0.25);
        track.set_pattern(&pattern).unwrap();
        let shrink = shrink.min(len);
        track.set_num_beats(shrink);
        prop_assert_eq!(track.pattern(), pattern[..shrink].to_vec());
        track.set_num_beats(len + 2);
        let mut grown = pattern.clone();
        grown.extend([false, false]);
        prop_assert_eq!(track.pattern(), grown);
    }

    /// MIDI numbers survive a note round trip and their exact frequency
    /// snaps back to the same note.
    #[test]
    fn note_identifier_round_trip(identifier in 0i32..128) {
        let note = note_from_identifier(identifier);
        prop_assert_eq!(note.identifier(), identifier);
        prop_assert_eq!(nearest_note(identifier_frequency(identifier)), Some(note));
    }
}
