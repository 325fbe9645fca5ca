//! Host audio API abstraction.
//!
//! The core never talks to a platform audio API directly. It consumes three
//! collaborator interfaces, bundled as [`AudioHost`]:
//!
//! - [`ClockSource`]: monotonic playback clock in seconds, starting at 0
//! - [`NodeFactory`]: creates processing nodes by [`NodeKind`]
//! - [`DeferredCalls`]: timers keyed to the playback clock
//!
//! Nodes are handed out as [`NodeHandle`]s (`Rc<dyn AudioNode>`). Everything
//! runs on a single thread, so handles use `Rc` and the traits take `&self`;
//! implementations use interior mutability.
//!
//! [`offline::OfflineHost`](crate::offline::OfflineHost) implements every trait
//! deterministically for tests and simulations.

use core::fmt;
use core::str::FromStr;
use std::rc::Rc;

use crate::buffer::AudioBuffer;
use crate::error::{HostError, ParamError};

/// Identifier of a node inside a host.
///
/// IDs are assigned by the host and never reused within a host instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u64);

impl NodeId {
    /// Returns the raw numeric identifier.
    #[inline]
    pub fn index(self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

/// Kinds of processing node a host can create.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// Generated periodic waveform. Single-use.
    Oscillator,
    /// Plays an [`AudioBuffer`]. Single-use.
    BufferSource,
    /// Volume control.
    Gain,
    /// Equal-power stereo panner.
    StereoPanner,
    /// Second-order filter.
    BiquadFilter,
    /// Curve-based distortion.
    WaveShaper,
    /// Delay line.
    Delay,
    /// Pass-through analysis tap.
    Analyser,
    /// The host's final output. Never created by the core.
    Destination,
}

impl NodeKind {
    /// Returns `true` for sources that can only be started once.
    pub fn is_single_use(self) -> bool {
        matches!(self, NodeKind::Oscillator | NodeKind::BufferSource)
    }

    /// Returns `true` for nodes that produce sound and accept `start`/`stop`.
    pub fn is_source(self) -> bool {
        self.is_single_use()
    }

    /// Stable lowercase name.
    pub fn name(self) -> &'static str {
        match self {
            NodeKind::Oscillator => "oscillator",
            NodeKind::BufferSource => "buffer-source",
            NodeKind::Gain => "gain",
            NodeKind::StereoPanner => "stereo-panner",
            NodeKind::BiquadFilter => "biquad-filter",
            NodeKind::WaveShaper => "wave-shaper",
            NodeKind::Delay => "delay",
            NodeKind::Analyser => "analyser",
            NodeKind::Destination => "destination",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Ramp-capable parameters exposed by nodes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ParamName {
    /// Oscillator pitch or filter cutoff, in Hz.
    Frequency,
    /// Pitch offset in cents.
    Detune,
    /// Linear gain.
    Gain,
    /// Stereo position, -1 (left) to 1 (right).
    Pan,
    /// Filter quality factor.
    Q,
    /// Delay time in seconds.
    DelayTime,
    /// Buffer playback speed multiplier.
    PlaybackRate,
}

impl ParamName {
    /// Stable lowercase name.
    pub fn name(self) -> &'static str {
        match self {
            ParamName::Frequency => "frequency",
            ParamName::Detune => "detune",
            ParamName::Gain => "gain",
            ParamName::Pan => "pan",
            ParamName::Q => "q",
            ParamName::DelayTime => "delay-time",
            ParamName::PlaybackRate => "playback-rate",
        }
    }
}

impl fmt::Display for ParamName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Oscillator waveform shapes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Waveform {
    /// Pure fundamental.
    #[default]
    Sine,
    /// 50% duty cycle square.
    Square,
    /// Rising sawtooth.
    Sawtooth,
    /// Triangle.
    Triangle,
}

impl Waveform {
    /// Lowercase name, as accepted by `parse`.
    pub fn name(self) -> &'static str {
        match self {
            Waveform::Sine => "sine",
            Waveform::Square => "square",
            Waveform::Sawtooth => "sawtooth",
            Waveform::Triangle => "triangle",
        }
    }
}

impl fmt::Display for Waveform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Waveform {
    type Err = ParamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sine" => Ok(Waveform::Sine),
            "square" => Ok(Waveform::Square),
            "sawtooth" | "saw" => Ok(Waveform::Sawtooth),
            "triangle" => Ok(Waveform::Triangle),
            other => Err(ParamError::unsupported(format!("waveform '{other}'"))),
        }
    }
}

/// Biquad filter response types.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum BiquadType {
    /// Low-pass.
    #[default]
    Lowpass,
    /// High-pass.
    Highpass,
    /// Band-pass.
    Bandpass,
    /// Notch.
    Notch,
    /// Peaking EQ.
    Peaking,
    /// Low shelf.
    Lowshelf,
    /// High shelf.
    Highshelf,
    /// All-pass.
    Allpass,
}

impl FromStr for BiquadType {
    type Err = ParamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lowpass" => Ok(BiquadType::Lowpass),
            "highpass" => Ok(BiquadType::Highpass),
            "bandpass" => Ok(BiquadType::Bandpass),
            "notch" => Ok(BiquadType::Notch),
            "peaking" => Ok(BiquadType::Peaking),
            "lowshelf" => Ok(BiquadType::Lowshelf),
            "highshelf" => Ok(BiquadType::Highshelf),
            "allpass" => Ok(BiquadType::Allpass),
            other => Err(ParamError::unsupported(format!("filter type '{other}'"))),
        }
    }
}

/// Wave shaper oversampling.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Oversample {
    /// No oversampling.
    #[default]
    None,
    /// 2x.
    X2,
    /// 4x.
    X4,
}

/// A plain (non-automatable) node attribute together with its value.
#[derive(Clone, Debug, PartialEq)]
pub enum NodeAttribute {
    /// Oscillator waveform.
    Waveform(Waveform),
    /// Buffer played by a buffer source.
    Buffer(Rc<AudioBuffer>),
    /// Whether a buffer source loops.
    Loop(bool),
    /// Biquad response type.
    FilterType(BiquadType),
    /// Wave shaper transfer curve.
    Curve(Rc<[f32]>),
    /// Wave shaper oversampling.
    Oversample(Oversample),
    /// Analyser FFT size.
    FftSize(u32),
}

impl NodeAttribute {
    /// Attribute name, used in logs and errors.
    pub fn name(&self) -> &'static str {
        match self {
            NodeAttribute::Waveform(_) => "type",
            NodeAttribute::Buffer(_) => "buffer",
            NodeAttribute::Loop(_) => "loop",
            NodeAttribute::FilterType(_) => "filter-type",
            NodeAttribute::Curve(_) => "curve",
            NodeAttribute::Oversample(_) => "oversample",
            NodeAttribute::FftSize(_) => "fft-size",
        }
    }
}

/// A ramp-capable parameter on a live node.
pub trait AudioParam {
    /// Current intrinsic value.
    fn value(&self) -> f32;

    /// Set the value right now, bypassing the automation timeline.
    fn set_value(&self, value: f32);

    /// Jump to `value` at `time`.
    fn set_value_at_time(&self, value: f32, time: f64) -> Result<(), HostError>;

    /// Ramp linearly from the previous event to `value`, arriving at `end_time`.
    fn linear_ramp_to_value_at_time(&self, value: f32, end_time: f64) -> Result<(), HostError>;

    /// Ramp exponentially from the previous event to `value`, arriving at
    /// `end_time`. Hosts reject a target of exactly 0.
    fn exponential_ramp_to_value_at_time(&self, value: f32, end_time: f64)
    -> Result<(), HostError>;
}

/// Shared handle to a live parameter.
pub type ParamHandle = Rc<dyn AudioParam>;

/// A live processing node.
pub trait AudioNode {
    /// Host-assigned identifier.
    fn id(&self) -> NodeId;

    /// What kind of node this is.
    fn kind(&self) -> NodeKind;

    /// Route this node's output into `destination`'s input.
    ///
    /// Connecting the same pair twice is a no-op.
    fn connect(&self, destination: &dyn AudioNode) -> Result<(), HostError>;

    /// Drop every outgoing connection of this node.
    fn disconnect(&self);

    /// Look up a ramp-capable parameter. `None` if this kind has no such param.
    fn param(&self, name: ParamName) -> Option<ParamHandle>;

    /// Assign a plain attribute.
    fn set_attribute(&self, attribute: NodeAttribute) -> Result<(), HostError>;

    /// Start a source at `when`, `offset` seconds into its material.
    fn start(&self, when: f64, offset: f64) -> Result<(), HostError>;

    /// Stop a started source at `when`.
    fn stop(&self, when: f64) -> Result<(), HostError>;
}

/// Shared handle to a live node.
pub type NodeHandle = Rc<dyn AudioNode>;

/// Monotonic playback clock.
pub trait ClockSource {
    /// Seconds since the context was created.
    fn current_time(&self) -> f64;

    /// Resume a suspended clock. Idempotent.
    fn resume(&self);

    /// Whether the clock is currently running.
    fn is_running(&self) -> bool;
}

/// Creates processing nodes.
pub trait NodeFactory {
    /// Create a fresh node of `kind`.
    fn create_node(&self, kind: NodeKind) -> Result<NodeHandle, HostError>;

    /// The final output every graph ends in.
    fn destination(&self) -> NodeHandle;
}

/// Handle returned by [`DeferredCalls::schedule_after`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(pub u64);

/// Callback run by a deferred call.
pub type Deferred = Box<dyn FnOnce()>;

/// Timers keyed to the playback clock rather than wall-clock time.
pub trait DeferredCalls {
    /// Run `callback` after `delay_ms` milliseconds of playback-clock time.
    ///
    /// Callbacks due at the same instant run in the order they were scheduled.
    fn schedule_after(&self, delay_ms: f64, callback: Deferred) -> TimerId;

    /// Cancel a pending callback. Returns `false` if it already ran.
    fn cancel(&self, id: TimerId) -> bool;
}

/// Everything the core needs from a host.
pub trait AudioHost: ClockSource + NodeFactory + DeferredCalls {}

impl<T: ClockSource + NodeFactory + DeferredCalls + ?Sized> AudioHost for T {}
