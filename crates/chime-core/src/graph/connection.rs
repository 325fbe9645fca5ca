//! Named node descriptors.

use core::fmt;
use std::rc::Rc;

use crate::buffer::AudioBuffer;
use crate::context::AudioContext;
use crate::error::{GraphError, ParamError, Result};
use crate::host::{NodeAttribute, NodeHandle, NodeKind, ParamName, Waveform};

/// Where a connection's node comes from.
#[derive(Clone)]
pub enum NodeSource {
    /// Create a fresh node of this kind.
    Create(NodeKind),
    /// Use a node the caller already built.
    Existing(NodeHandle),
}

impl fmt::Debug for NodeSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeSource::Create(kind) => f.debug_tuple("Create").field(kind).finish(),
            NodeSource::Existing(node) => f
                .debug_tuple("Existing")
                .field(&node.kind())
                .field(&node.id())
                .finish(),
        }
    }
}

/// Sound-level settings that attribute rules can read.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SoundField {
    /// [`SoundSettings::waveform`].
    Waveform,
    /// [`SoundSettings::buffer`].
    Buffer,
    /// [`SoundSettings::looping`].
    Loop,
}

impl fmt::Display for SoundField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SoundField::Waveform => "waveform",
            SoundField::Buffer => "buffer",
            SoundField::Loop => "loop",
        })
    }
}

/// Values owned by a sound and re-read on every wire.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SoundSettings {
    /// Oscillator waveform.
    pub waveform: Waveform,
    /// Buffer for buffer sources.
    pub buffer: Option<Rc<AudioBuffer>>,
    /// Whether buffer playback loops.
    pub looping: bool,
}

/// How an attribute gets its value.
#[derive(Clone, Debug, PartialEq)]
pub enum AttributeRule {
    /// Fixed value.
    Literal(NodeAttribute),
    /// Read from the owning sound's settings at wire time.
    Field(SoundField),
}

impl AttributeRule {
    fn resolve(
        &self,
        connection: &str,
        settings: &SoundSettings,
    ) -> Result<NodeAttribute, GraphError> {
        match self {
            AttributeRule::Literal(attribute) => Ok(attribute.clone()),
            AttributeRule::Field(SoundField::Waveform) => {
                Ok(NodeAttribute::Waveform(settings.waveform))
            }
            AttributeRule::Field(SoundField::Loop) => Ok(NodeAttribute::Loop(settings.looping)),
            AttributeRule::Field(field @ SoundField::Buffer) => settings
                .buffer
                .clone()
                .map(NodeAttribute::Buffer)
                .ok_or_else(|| GraphError::MissingField {
                    connection: connection.to_string(),
                    field: *field,
                }),
        }
    }
}

/// Automation a connection schedules on its own node each wire. Times are
/// seconds after the play time.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ScheduledValue {
    /// Set at play time.
    Set(f32),
    /// Set at play time + `time`.
    SetAt {
        /// Value.
        value: f32,
        /// Offset in seconds.
        time: f64,
    },
    /// Exponential ramp ending at play time + `time`.
    RampTo {
        /// Target, non-zero.
        value: f32,
        /// Offset in seconds.
        time: f64,
    },
    /// Linear ramp ending at play time + `time`.
    LinearRampTo {
        /// Target.
        value: f32,
        /// Offset in seconds.
        time: f64,
    },
}

/// A queued value for one node parameter.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ParamRule {
    /// Node parameter.
    pub param: ParamName,
    /// What to schedule.
    pub value: ScheduledValue,
}

/// One named step in a [`ConnectionGraph`](super::ConnectionGraph).
#[derive(Clone)]
pub struct Connection {
    name: String,
    source: Option<NodeSource>,
    created_on_play: bool,
    attributes: Vec<AttributeRule>,
    params: Vec<ParamRule>,
    node: Option<NodeHandle>,
}

impl Connection {
    /// A connection with no node source yet. Wiring fails until one is set.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: None,
            created_on_play: false,
            attributes: Vec::new(),
            params: Vec::new(),
            node: None,
        }
    }

    /// A connection that creates a node of `kind`. Single-use kinds are
    /// recreated on every play.
    pub fn create(name: impl Into<String>, kind: NodeKind) -> Self {
        Self::new(name).with_source(NodeSource::Create(kind))
    }

    /// A connection around a caller-built node.
    pub fn existing(name: impl Into<String>, node: NodeHandle) -> Self {
        Self::new(name).with_source(NodeSource::Existing(node))
    }

    /// Replace the node source. Resets `created_on_play` to what the source
    /// implies.
    pub fn with_source(mut self, source: NodeSource) -> Self {
        self.created_on_play = match &source {
            NodeSource::Create(kind) => kind.is_single_use(),
            NodeSource::Existing(_) => false,
        };
        self.source = Some(source);
        self
    }

    /// Override whether the node is recreated on every play.
    pub fn created_on_play(mut self, created_on_play: bool) -> Self {
        self.created_on_play = created_on_play;
        self
    }

    /// Add an attribute rule.
    pub fn with_attribute(mut self, rule: AttributeRule) -> Self {
        self.attributes.push(rule);
        self
    }

    /// Add a parameter rule. See [`set_param`](Self::set_param).
    pub fn with_param(
        mut self,
        param: ParamName,
        value: ScheduledValue,
    ) -> Result<Self, ParamError> {
        self.set_param(param, value)?;
        Ok(self)
    }

    /// Add an attribute rule in place.
    pub fn add_attribute(&mut self, rule: AttributeRule) {
        self.attributes.push(rule);
    }

    /// Replace any existing rules for `param` with `value`.
    ///
    /// An exponential ramp to exactly 0 is rejected here and the existing
    /// rules are kept.
    pub fn set_param(&mut self, param: ParamName, value: ScheduledValue) -> Result<(), ParamError> {
        if let ScheduledValue::RampTo { value: 0.0, .. } = value {
            return Err(ParamError::ExponentialRuleToZero {
                connection: self.name.clone(),
                param,
            });
        }
        self.params.retain(|rule| rule.param != param);
        self.params.push(ParamRule { param, value });
        Ok(())
    }

    /// Connection name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Node source, if any.
    pub fn source(&self) -> Option<&NodeSource> {
        self.source.as_ref()
    }

    /// Whether the node is recreated on every play.
    pub fn is_created_on_play(&self) -> bool {
        self.created_on_play
    }

    /// Attribute rules in application order.
    pub fn attributes(&self) -> &[AttributeRule] {
        &self.attributes
    }

    /// Parameter rules.
    pub fn params(&self) -> &[ParamRule] {
        &self.params
    }

    /// Kind of node this connection produces, if known.
    pub fn node_kind(&self) -> Option<NodeKind> {
        match &self.source {
            Some(NodeSource::Create(kind)) => Some(*kind),
            Some(NodeSource::Existing(node)) => Some(node.kind()),
            None => None,
        }
    }

    /// Current node. `None` before the first wire.
    pub fn node(&self) -> Option<&NodeHandle> {
        self.node.as_ref()
    }

    pub(crate) fn materialized(&self) -> Result<&NodeHandle, GraphError> {
        self.node
            .as_ref()
            .ok_or_else(|| GraphError::NotMaterialized(self.name.clone()))
    }

    /// Create or reuse the node and apply attributes.
    pub(crate) fn materialize(
        &mut self,
        context: &AudioContext,
        settings: &SoundSettings,
    ) -> Result<()> {
        if self.created_on_play || self.node.is_none() {
            let node = match &self.source {
                None => return Err(GraphError::MissingNodeSource(self.name.clone()).into()),
                Some(NodeSource::Existing(_)) if self.created_on_play => {
                    return Err(GraphError::CannotRecreate(self.name.clone()).into());
                }
                Some(NodeSource::Existing(node)) => node.clone(),
                Some(NodeSource::Create(kind)) => context.create_node(*kind)?,
            };
            tracing::debug!(
                connection = %self.name,
                node = %node.id(),
                kind = %node.kind(),
                "materialized node"
            );
            self.node = Some(node);
        }
        let node = self.materialized()?;
        for rule in &self.attributes {
            node.set_attribute(rule.resolve(&self.name, settings)?)?;
        }
        Ok(())
    }

    /// Schedule parameter rules for a play at `at`.
    pub(crate) fn schedule_params(&self, at: f64) -> Result<()> {
        if self.params.is_empty() {
            return Ok(());
        }
        let node = self.materialized()?;
        for rule in &self.params {
            let param = node.param(rule.param).ok_or_else(|| {
                ParamError::unsupported(format!("{} on {} node", rule.param, node.kind()))
            })?;
            match rule.value {
                ScheduledValue::Set(value) => param.set_value_at_time(value, at)?,
                ScheduledValue::SetAt { value, time } => {
                    param.set_value_at_time(value, at + time)?;
                }
                ScheduledValue::RampTo { value, time } => {
                    param.exponential_ramp_to_value_at_time(value, at + time)?;
                }
                ScheduledValue::LinearRampTo { value, time } => {
                    param.linear_ramp_to_value_at_time(value, at + time)?;
                }
            }
        }
        Ok(())
    }

    pub(crate) fn detach(&self) {
        if let Some(node) = &self.node {
            node.disconnect();
        }
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("name", &self.name)
            .field("source", &self.source)
            .field("created_on_play", &self.created_on_play)
            .field("attributes", &self.attributes)
            .field("params", &self.params)
            .field("node", &self.node.as_ref().map(|node| node.id()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_use_kinds_default_to_created_on_play() {
        assert!(Connection::create("osc", NodeKind::Oscillator).is_created_on_play());
        assert!(!Connection::create("filter", NodeKind::BiquadFilter).is_created_on_play());
        assert!(
            Connection::create("filter", NodeKind::BiquadFilter)
                .created_on_play(true)
                .is_created_on_play()
        );
    }

    #[test]
    fn buffer_field_requires_buffer() {
        let rule = AttributeRule::Field(SoundField::Buffer);
        let err = rule.resolve("source", &SoundSettings::default()).unwrap_err();
        assert_eq!(
            err,
            GraphError::MissingField {
                connection: "source".to_string(),
                field: SoundField::Buffer
            }
        );
    }

    #[test]
    fn set_param_replaces_previous_rule() {
        let mut connection = Connection::create("filter", NodeKind::BiquadFilter);
        connection.set_param(ParamName::Q, ScheduledValue::Set(1.0)).unwrap();
        connection.set_param(ParamName::Q, ScheduledValue::Set(4.0)).unwrap();
        assert_eq!(connection.params().len(), 1);
        assert_eq!(connection.params()[0].value, ScheduledValue::Set(4.0));
    }

    #[test]
    fn exponential_rule_to_zero_is_rejected() {
        let mut connection = Connection::create("filter", NodeKind::BiquadFilter);
        connection
            .set_param(ParamName::Frequency, ScheduledValue::Set(800.0))
            .unwrap();
        let err = connection
            .set_param(
                ParamName::Frequency,
                ScheduledValue::RampTo {
                    value: 0.0,
                    time: 1.0,
                },
            )
            .unwrap_err();
        assert_eq!(
            err,
            ParamError::ExponentialRuleToZero {
                connection: "filter".to_string(),
                param: ParamName::Frequency,
            }
        );
        assert_eq!(connection.params()[0].value, ScheduledValue::Set(800.0));

        let linear = Connection::create("filter", NodeKind::BiquadFilter).with_param(
            ParamName::Frequency,
            ScheduledValue::LinearRampTo {
                value: 0.0,
                time: 1.0,
            },
        );
        assert!(linear.is_ok());
    }
}
