//! Offline nodes and automation timelines.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::error::HostError;
use crate::host::{AudioNode, AudioParam, NodeAttribute, NodeId, NodeKind, ParamHandle, ParamName};

use super::{AutomationOp, HostEvent, Shared};

#[derive(Clone, Copy, Debug, PartialEq)]
enum Point {
    Set { value: f32, time: f64 },
    Linear { value: f32, time: f64, issued: f64 },
    Exponential { value: f32, time: f64, issued: f64 },
}

impl Point {
    fn time(&self) -> f64 {
        match *self {
            Point::Set { time, .. }
            | Point::Linear { time, .. }
            | Point::Exponential { time, .. } => time,
        }
    }

    fn value(&self) -> f32 {
        match *self {
            Point::Set { value, .. }
            | Point::Linear { value, .. }
            | Point::Exponential { value, .. } => value,
        }
    }
}

/// A parameter with an automation timeline evaluated against the virtual clock.
pub struct OfflineParam {
    node: NodeId,
    name: ParamName,
    default: f32,
    timeline: RefCell<Vec<Point>>,
    shared: Rc<Shared>,
}

impl OfflineParam {
    fn new(node: NodeId, name: ParamName, default: f32, shared: Rc<Shared>) -> Self {
        Self {
            node,
            name,
            default,
            timeline: RefCell::new(Vec::new()),
            shared,
        }
    }

    /// Default value before any automation.
    pub fn default_value(&self) -> f32 {
        self.default
    }

    /// Number of automation events on the timeline.
    pub fn event_count(&self) -> usize {
        self.timeline.borrow().len()
    }

    fn insert(&self, point: Point, op: AutomationOp) {
        let mut timeline = self.timeline.borrow_mut();
        let index = timeline.partition_point(|p| p.time() <= point.time());
        timeline.insert(index, point);
        drop(timeline);
        self.shared.log(HostEvent::Automation {
            node: self.node,
            param: self.name,
            op,
            value: point.value(),
            time: point.time(),
        });
    }

    /// Value of the parameter at `time`.
    ///
    /// Follows the usual automation rules: a set holds until the next event,
    /// a ramp runs from the previous event (or from the moment it was issued,
    /// if nothing precedes it) to its own end time.
    pub fn value_at(&self, time: f64) -> f32 {
        let timeline = self.timeline.borrow();
        let next = timeline.partition_point(|p| p.time() <= time);
        let previous = next.checked_sub(1).map(|i| timeline[i]);
        let (start_time, start_value) = match previous {
            Some(point) => (point.time(), point.value()),
            None => (f64::NEG_INFINITY, self.default),
        };
        match timeline.get(next) {
            Some(&Point::Linear {
                value,
                time: end,
                issued,
            }) => {
                let start = if previous.is_some() { start_time } else { issued };
                if time < start || end <= start {
                    return start_value;
                }
                let progress = (time - start) / (end - start);
                start_value + (value - start_value) * progress as f32
            }
            Some(&Point::Exponential {
                value,
                time: end,
                issued,
            }) => {
                let start = if previous.is_some() { start_time } else { issued };
                if time < start
                    || end <= start
                    || start_value == 0.0
                    || start_value.signum() != value.signum()
                {
                    return start_value;
                }
                let progress = (time - start) / (end - start);
                let ratio = f64::from(value) / f64::from(start_value);
                (f64::from(start_value) * libm::pow(ratio, progress)) as f32
            }
            _ => start_value,
        }
    }
}

impl AudioParam for OfflineParam {
    fn value(&self) -> f32 {
        self.value_at(self.shared.now())
    }

    fn set_value(&self, value: f32) {
        let time = self.shared.now();
        self.insert(Point::Set { value, time }, AutomationOp::SetValue);
    }

    fn set_value_at_time(&self, value: f32, time: f64) -> Result<(), HostError> {
        self.insert(Point::Set { value, time }, AutomationOp::SetValueAtTime);
        Ok(())
    }

    fn linear_ramp_to_value_at_time(&self, value: f32, end_time: f64) -> Result<(), HostError> {
        let issued = self.shared.now();
        self.insert(
            Point::Linear {
                value,
                time: end_time,
                issued,
            },
            AutomationOp::LinearRamp,
        );
        Ok(())
    }

    fn exponential_ramp_to_value_at_time(
        &self,
        value: f32,
        end_time: f64,
    ) -> Result<(), HostError> {
        if value == 0.0 {
            return Err(HostError::InvalidRampTarget { value });
        }
        let issued = self.shared.now();
        self.insert(
            Point::Exponential {
                value,
                time: end_time,
                issued,
            },
            AutomationOp::ExponentialRamp,
        );
        Ok(())
    }
}

fn default_params(kind: NodeKind) -> &'static [(ParamName, f32)] {
    match kind {
        NodeKind::Oscillator => &[(ParamName::Frequency, 440.0), (ParamName::Detune, 0.0)],
        NodeKind::BufferSource => &[(ParamName::Detune, 0.0), (ParamName::PlaybackRate, 1.0)],
        NodeKind::Gain => &[(ParamName::Gain, 1.0)],
        NodeKind::StereoPanner => &[(ParamName::Pan, 0.0)],
        NodeKind::BiquadFilter => &[
            (ParamName::Frequency, 350.0),
            (ParamName::Q, 1.0),
            (ParamName::Gain, 0.0),
            (ParamName::Detune, 0.0),
        ],
        NodeKind::Delay => &[(ParamName::DelayTime, 0.0)],
        NodeKind::WaveShaper | NodeKind::Analyser | NodeKind::Destination => &[],
    }
}

fn accepts(kind: NodeKind, attribute: &NodeAttribute) -> bool {
    matches!(
        (kind, attribute),
        (NodeKind::Oscillator, NodeAttribute::Waveform(_))
            | (NodeKind::BufferSource, NodeAttribute::Buffer(_) | NodeAttribute::Loop(_))
            | (NodeKind::BiquadFilter, NodeAttribute::FilterType(_))
            | (NodeKind::WaveShaper, NodeAttribute::Curve(_) | NodeAttribute::Oversample(_))
            | (NodeKind::Analyser, NodeAttribute::FftSize(_))
    )
}

/// A node living in an [`OfflineHost`](super::OfflineHost).
pub struct OfflineNode {
    id: NodeId,
    kind: NodeKind,
    outputs: RefCell<Vec<NodeId>>,
    attributes: RefCell<Vec<NodeAttribute>>,
    params: Vec<(ParamName, Rc<OfflineParam>)>,
    started: Cell<Option<(f64, f64)>>,
    stopped: Cell<Option<f64>>,
    shared: Rc<Shared>,
}

impl OfflineNode {
    pub(super) fn new(id: NodeId, kind: NodeKind, shared: Rc<Shared>) -> Self {
        let params = default_params(kind)
            .iter()
            .map(|&(name, default)| {
                (name, Rc::new(OfflineParam::new(id, name, default, shared.clone())))
            })
            .collect();
        Self {
            id,
            kind,
            outputs: RefCell::new(Vec::new()),
            attributes: RefCell::new(Vec::new()),
            params,
            started: Cell::new(None),
            stopped: Cell::new(None),
            shared,
        }
    }

    /// Nodes this node feeds, in connection order.
    pub fn outputs(&self) -> Vec<NodeId> {
        self.outputs.borrow().clone()
    }

    /// Last value assigned to the attribute called `name`.
    pub fn attribute(&self, name: &str) -> Option<NodeAttribute> {
        self.attributes
            .borrow()
            .iter()
            .find(|a| a.name() == name)
            .cloned()
    }

    /// Concrete parameter, for timeline inspection.
    pub fn offline_param(&self, name: ParamName) -> Option<Rc<OfflineParam>> {
        self.params
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, p)| p.clone())
    }

    /// `(when, offset)` of the start call, if started.
    pub fn started(&self) -> Option<(f64, f64)> {
        self.started.get()
    }

    /// Scheduled stop time, if stopped.
    pub fn stopped(&self) -> Option<f64> {
        self.stopped.get()
    }

    /// Whether the source is sounding at `time`.
    pub fn is_sounding_at(&self, time: f64) -> bool {
        match self.started.get() {
            Some((when, _)) if when <= time => self.stopped.get().is_none_or(|stop| time < stop),
            _ => false,
        }
    }
}

impl AudioNode for OfflineNode {
    fn id(&self) -> NodeId {
        self.id
    }

    fn kind(&self) -> NodeKind {
        self.kind
    }

    fn connect(&self, destination: &dyn AudioNode) -> Result<(), HostError> {
        let to = destination.id();
        let mut outputs = self.outputs.borrow_mut();
        if !outputs.contains(&to) {
            outputs.push(to);
            drop(outputs);
            self.shared.log(HostEvent::Connected { from: self.id, to });
        }
        Ok(())
    }

    fn disconnect(&self) {
        let had_outputs = !self.outputs.borrow().is_empty();
        self.outputs.borrow_mut().clear();
        if had_outputs {
            self.shared.log(HostEvent::Disconnected { node: self.id });
        }
    }

    fn param(&self, name: ParamName) -> Option<ParamHandle> {
        self.offline_param(name).map(|p| p as ParamHandle)
    }

    fn set_attribute(&self, attribute: NodeAttribute) -> Result<(), HostError> {
        if !accepts(self.kind, &attribute) {
            return Err(HostError::UnsupportedAttribute {
                kind: self.kind,
                attribute: attribute.name(),
            });
        }
        let name = attribute.name();
        let mut attributes = self.attributes.borrow_mut();
        attributes.retain(|a| a.name() != name);
        attributes.push(attribute);
        drop(attributes);
        self.shared.log(HostEvent::Attribute {
            node: self.id,
            name,
        });
        Ok(())
    }

    fn start(&self, when: f64, offset: f64) -> Result<(), HostError> {
        if !self.kind.is_source() {
            return Err(HostError::NotASource(self.kind));
        }
        if self.started.get().is_some() {
            return Err(HostError::AlreadyStarted {
                node: self.id,
                kind: self.kind,
            });
        }
        self.started.set(Some((when, offset)));
        self.shared.log(HostEvent::Started {
            node: self.id,
            kind: self.kind,
            when,
            offset,
        });
        Ok(())
    }

    fn stop(&self, when: f64) -> Result<(), HostError> {
        if !self.kind.is_source() {
            return Err(HostError::NotASource(self.kind));
        }
        if self.started.get().is_none() {
            return Err(HostError::NotStarted {
                node: self.id,
                kind: self.kind,
            });
        }
        self.stopped.set(Some(when));
        self.shared.log(HostEvent::Stopped {
            node: self.id,
            kind: self.kind,
            when,
        });
        Ok(())
    }
}
