//! Error types for the chime core.
//!
//! Every failure here is a programmer or authoring error surfaced synchronously
//! at the point of misuse. Nothing is retried and nothing is swallowed.

use thiserror::Error;

use crate::graph::SoundField;
use crate::host::{NodeId, NodeKind, ParamName};
use crate::param::ParamType;

/// The audio context was used before it was ready.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContextError {
    /// No host has been attached yet.
    #[error(
        "audio context is not initialized: call `AudioContext::initialize` from a user-interaction handler before playing"
    )]
    NotInitialized,

    /// `initialize` was called on a context that already has a host.
    #[error("audio context is already initialized")]
    AlreadyInitialized,
}

/// Failures reported by the host audio API.
///
/// The lifecycle is built so these never occur; seeing one means a bug in
/// the core rather than a recoverable condition.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HostError {
    /// A single-use source node was started a second time.
    #[error("{kind} node {node} has already been started")]
    AlreadyStarted {
        /// Offending node.
        node: NodeId,
        /// Kind of the offending node.
        kind: NodeKind,
    },

    /// `stop` was called on a source that was never started.
    #[error("{kind} node {node} was stopped before being started")]
    NotStarted {
        /// Offending node.
        node: NodeId,
        /// Kind of the offending node.
        kind: NodeKind,
    },

    /// `start`/`stop` was called on a node that is not a source.
    #[error("{0} nodes cannot be started or stopped")]
    NotASource(NodeKind),

    /// An attribute was assigned to a node kind that does not have it.
    #[error("{kind} nodes have no `{attribute}` attribute")]
    UnsupportedAttribute {
        /// Kind of the node the attribute was assigned to.
        kind: NodeKind,
        /// Attribute name.
        attribute: &'static str,
    },

    /// An exponential ramp targeted zero.
    #[error("exponential ramp target must be non-zero, got {value}")]
    InvalidRampTarget {
        /// The rejected target value.
        value: f32,
    },

    /// The node factory cannot produce this kind of node.
    #[error("host cannot create {0} nodes")]
    UnsupportedNode(NodeKind),
}

/// Connection graph authoring and materialization errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    /// A connection has neither a node kind to create nor a pre-supplied node.
    #[error(
        "connection '{0}' has no node source: give it a node kind to create or an existing node"
    )]
    MissingNodeSource(String),

    /// A pre-supplied node was flagged as created-on-play.
    #[error(
        "connection '{0}' is created on play but wraps a pre-supplied node that cannot be recreated"
    )]
    CannotRecreate(String),

    /// Connection names must be unique within a graph.
    #[error("connection '{0}' already exists")]
    DuplicateConnection(String),

    /// No connection with this name.
    #[error("connection '{0}' not found")]
    ConnectionNotFound(String),

    /// The source, gain and pan connections frame every graph.
    #[error("connection '{0}' is part of the fixed source/gain/pan frame and cannot be removed")]
    FixedConnection(String),

    /// A node was requested before the graph was wired.
    #[error("connection '{0}' has not been materialized")]
    NotMaterialized(String),

    /// A derived attribute points at a sound field that has no value.
    #[error("connection '{connection}' reads sound field `{field}` which is not set")]
    MissingField {
        /// Connection holding the attribute rule.
        connection: String,
        /// Field the rule reads.
        field: SoundField,
    },
}

/// Parameter controller errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParamError {
    /// An unknown or unsupported parameter / ramp / ratio combination.
    #[error("unsupported control: {0}")]
    UnsupportedControl(String),

    /// Exponential ramps cannot reach zero; the caller picks a floor value.
    #[error("exponential ramp on {param} cannot target 0; use a small floor such as 0.00001")]
    ExponentialToZero {
        /// Parameter the ramp was queued on.
        param: ParamType,
    },

    /// A connection's parameter rule asked for an exponential ramp to 0.
    #[error("exponential ramp on {param} of connection '{connection}' cannot target 0")]
    ExponentialRuleToZero {
        /// Connection holding the rule.
        connection: String,
        /// Node parameter the rule targets.
        param: ParamName,
    },
}

impl ParamError {
    /// Shorthand for an [`UnsupportedControl`](Self::UnsupportedControl) error.
    pub fn unsupported(control: impl Into<String>) -> Self {
        ParamError::UnsupportedControl(control.into())
    }
}

/// Composite player errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompositeError {
    /// Samplers, layers and beat tracks need at least one playable.
    #[error("{0} needs at least one playable")]
    Empty(&'static str),

    /// A beat index past the current sequence length.
    #[error("beat index {index} out of range for {len} beats")]
    BeatOutOfRange {
        /// Requested index.
        index: usize,
        /// Current number of beats.
        len: usize,
    },
}

/// Crate-level error.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// Precondition failure: context not ready.
    #[error(transparent)]
    Context(#[from] ContextError),

    /// Host API failure.
    #[error(transparent)]
    Host(#[from] HostError),

    /// Configuration error in a connection graph.
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// Unsupported control or invalid automation.
    #[error(transparent)]
    Param(#[from] ParamError),

    /// Composite player misuse.
    #[error(transparent)]
    Composite(#[from] CompositeError),
}

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;
