//! Configuration files for chime sounds and sequences.
//!
//! This crate turns TOML files into ready-to-play chime objects, and checks
//! them before anything is built.
//!
//! # Features
//!
//! - **Patches**: oscillator voices with filter stages and on-play automation
//! - **Beat Tracks**: step patterns over a round-robin sampler
//! - **Engine Settings**: tick interval and scheduling lookahead
//! - **Validation**: every problem in a file reported at once
//! - **Unit Values**: `"-6dB"`, `"250ms"`, `"1.2kHz"`, `"50%"`
//!
//! # Example
//!
//! ```rust,no_run
//! use std::rc::Rc;
//! use chime_config::{SoundPatch, validate_patch};
//! use chime_core::{AudioContext, Playable};
//! use chime_core::offline::OfflineHost;
//!
//! let patch = SoundPatch::load("pluck.toml").unwrap();
//! validate_patch(&patch).unwrap();
//!
//! let context = AudioContext::with_host(Rc::new(OfflineHost::new()));
//! let mut voice = patch.build(&context).unwrap();
//! voice.play_for(0.5).unwrap();
//! ```

mod beat_track;
mod engine;
mod error;
mod file;
mod patch;
mod value;

/// Patch and beat track validation.
pub mod validation;

pub use beat_track::{BeatTrackConfig, SampleConfig, format_pattern, parse_pattern};
pub use engine::EngineConfig;
pub use error::ConfigError;
pub use patch::{ParamEventConfig, SoundPatch, StageConfig};
pub use validation::{ValidationError, ValidationResult, validate_beat_track, validate_patch};
pub use value::{field_seconds, field_value, parse_value};
