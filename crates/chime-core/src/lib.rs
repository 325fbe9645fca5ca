//! Chime Core - scheduling, wiring and lifecycle for host audio graphs
//!
//! This crate is the convenience layer between application code and a
//! browser-style audio API. It does no signal processing itself; it decides
//! which nodes exist, how they are wired, what automation they receive and
//! when they start and stop.
//!
//! # Core Abstractions
//!
//! ## Host and Context
//!
//! - [`AudioHost`] - clock, node factory and deferred calls the core consumes
//! - [`AudioContext`] - explicitly constructed, cheaply cloned host handle
//! - [`offline::OfflineHost`] - deterministic host with a manual clock
//!
//! ## Parameter Automation
//!
//! - [`ParamController`] - immediate, timed and ramped events replayed on every play
//! - [`ParamType`], [`RampKind`], [`RatioKind`] - what to automate and how
//!
//! ## Connection Graph
//!
//! - [`ConnectionGraph`] - ordered `source → ... → gain → pan → destination` chain
//! - [`Connection`] - named node descriptor with attribute and parameter rules
//!
//! ## Playables
//!
//! - [`Playable`] - `play`, `play_at`, `play_in`, `play_for`, `stop`, `stop_at`
//! - [`Sound`], [`Oscillator`], [`Track`] - single-source sounds
//! - [`LayeredSound`], [`Sampler`], [`BeatTrack`] - composites
//!
//! ## Musical Identity
//!
//! - [`Note`] with [`note_frequency`], [`note_identifier`], [`nearest_note`]
//!
//! # Threading
//!
//! Everything runs on one thread against one playback clock. Handles are
//! `Rc`-based and deferred work runs through the host's timer primitive.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::rc::Rc;
//! use chime_core::{AudioContext, Oscillator, ParamType, Playable, RampKind, Waveform};
//! use chime_core::offline::OfflineHost;
//!
//! let host = Rc::new(OfflineHost::new());
//! let context = AudioContext::with_host(host.clone());
//!
//! let mut osc = Oscillator::new(&context, Waveform::Sawtooth);
//! osc.on_play_ramp(ParamType::Gain, RampKind::Exponential)
//!     .from(1.0)
//!     .to(0.001)
//!     .over(0.5)?;
//! osc.play_for(0.5)?;
//!
//! host.advance_by(1.0);
//! assert!(!osc.is_playing());
//! ```

pub mod beat;
pub mod buffer;
pub mod composite;
pub mod context;
pub mod error;
pub mod graph;
pub mod host;
pub mod lifecycle;
pub mod note;
pub mod offline;
pub mod oscillator;
pub mod param;
pub mod sound;
pub mod track;

pub use beat::{Beat, BeatTrack};
pub use buffer::AudioBuffer;
pub use composite::{LayeredSound, Sampler};
pub use context::AudioContext;
pub use error::{CompositeError, ContextError, Error, GraphError, HostError, ParamError, Result};
pub use graph::{
    AttributeRule, Connection, ConnectionGraph, NodeSource, ScheduledValue, SoundField,
    SoundSettings,
};
pub use host::{
    AudioHost, AudioNode, AudioParam, BiquadType, ClockSource, DeferredCalls, NodeAttribute,
    NodeFactory, NodeHandle, NodeId, NodeKind, Oversample, ParamHandle, ParamName, TimerId,
    Waveform,
};
pub use lifecycle::{PlayRegistry, Playable, Playback, SharedPlayable, Sounding};
pub use note::{
    Accidental, Letter, Note, ParseNoteError, nearest_note, note_frequency,
    note_from_identifier, note_identifier,
};
pub use oscillator::Oscillator;
pub use param::{EventId, ParamController, ParamEvent, ParamType, RampKind, RatioKind};
pub use sound::Sound;
pub use track::Track;
