//! Parameter controller: queued automation applied on every play.
//!
//! A [`ParamController`] owns the automation a sound replays each time it
//! starts. Events live in four buckets, applied in this order:
//!
//! 1. immediate values (set at the play time)
//! 2. timed values (set at play time + offset)
//! 3. exponential ramps
//! 4. linear ramps
//!
//! Events persist across plays until removed or [`clear`](ParamController::clear)ed.
//!
//! Live mutations via [`update`](ParamController::update) touch the running
//! node right away and are remembered as the baseline for later plays.
//!
//! ```rust,ignore
//! controller.on_play_set(ParamType::Gain).to(1.0).ending_at(0.5)?;
//! controller
//!     .on_play_ramp(ParamType::Frequency, RampKind::Linear)
//!     .from(220.0)
//!     .to(440.0)
//!     .over(2.0)?;
//! ```

use core::fmt;
use core::str::FromStr;

use crate::error::{ParamError, Result};
use crate::graph::ConnectionGraph;
use crate::host::{ParamHandle, ParamName};

/// Parameters the controller can automate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ParamType {
    /// Source pitch in Hz.
    Frequency,
    /// Output gain.
    Gain,
    /// Source detune in cents.
    Detune,
    /// Stereo position.
    Pan,
}

impl ParamType {
    /// All controllable parameters.
    pub const ALL: [ParamType; 4] = [
        ParamType::Frequency,
        ParamType::Gain,
        ParamType::Detune,
        ParamType::Pan,
    ];

    /// Stable lowercase name.
    pub fn name(self) -> &'static str {
        match self {
            ParamType::Frequency => "frequency",
            ParamType::Gain => "gain",
            ParamType::Detune => "detune",
            ParamType::Pan => "pan",
        }
    }

    /// Connection and node parameter this type automates.
    pub fn target(self) -> (&'static str, ParamName) {
        match self {
            ParamType::Frequency => (ConnectionGraph::SOURCE, ParamName::Frequency),
            ParamType::Detune => (ConnectionGraph::SOURCE, ParamName::Detune),
            ParamType::Gain => (ConnectionGraph::GAIN, ParamName::Gain),
            ParamType::Pan => (ConnectionGraph::PAN, ParamName::Pan),
        }
    }

    fn slot(self) -> usize {
        match self {
            ParamType::Frequency => 0,
            ParamType::Gain => 1,
            ParamType::Detune => 2,
            ParamType::Pan => 3,
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ParamType {
    type Err = ParamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "frequency" => Ok(ParamType::Frequency),
            "gain" => Ok(ParamType::Gain),
            "detune" => Ok(ParamType::Detune),
            "pan" => Ok(ParamType::Pan),
            other => Err(ParamError::unsupported(format!("parameter '{other}'"))),
        }
    }
}

/// Ramp curve shape.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum RampKind {
    /// Exponential approach. Cannot reach or cross zero.
    #[default]
    Exponential,
    /// Straight line.
    Linear,
}

impl fmt::Display for RampKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RampKind::Exponential => "exponential",
            RampKind::Linear => "linear",
        })
    }
}

impl FromStr for RampKind {
    type Err = ParamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "exponential" | "exp" => Ok(RampKind::Exponential),
            "linear" => Ok(RampKind::Linear),
            other => Err(ParamError::unsupported(format!("ramp kind '{other}'"))),
        }
    }
}

/// How a live update value is interpreted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum RatioKind {
    /// Use the value as-is.
    #[default]
    Ratio,
    /// `1 - value`.
    InverseRatio,
    /// `value / 100`.
    Percent,
}

impl RatioKind {
    /// Map a raw value through this ratio kind.
    #[inline]
    pub fn apply(self, value: f32) -> f32 {
        match self {
            RatioKind::Ratio => value,
            RatioKind::InverseRatio => 1.0 - value,
            RatioKind::Percent => value / 100.0,
        }
    }
}

impl FromStr for RatioKind {
    type Err = ParamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ratio" => Ok(RatioKind::Ratio),
            "inverseRatio" | "inverse-ratio" | "inverse_ratio" => Ok(RatioKind::InverseRatio),
            "percent" | "%" => Ok(RatioKind::Percent),
            other => Err(ParamError::unsupported(format!("ratio kind '{other}'"))),
        }
    }
}

/// One queued automation event. Times are seconds after the play time.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ParamEvent {
    /// Set at the play time.
    Immediate {
        /// Target parameter.
        param: ParamType,
        /// Value.
        value: f32,
    },
    /// Set at play time + `time`.
    TimedSet {
        /// Target parameter.
        param: ParamType,
        /// Value.
        value: f32,
        /// Offset from the play time in seconds.
        time: f64,
    },
    /// Ramp to `value`, arriving at play time + `time`.
    Ramp {
        /// Target parameter.
        param: ParamType,
        /// Ramp target.
        value: f32,
        /// Offset of the ramp end from the play time in seconds.
        time: f64,
        /// Ramp shape.
        kind: RampKind,
    },
}

impl ParamEvent {
    /// Parameter this event targets.
    pub fn param(&self) -> ParamType {
        match *self {
            ParamEvent::Immediate { param, .. }
            | ParamEvent::TimedSet { param, .. }
            | ParamEvent::Ramp { param, .. } => param,
        }
    }

    /// Reject combinations the host cannot perform.
    pub fn validate(&self) -> Result<(), ParamError> {
        if let ParamEvent::Ramp {
            param,
            value,
            kind: RampKind::Exponential,
            ..
        } = *self
        {
            if param == ParamType::Pan {
                return Err(ParamError::unsupported("exponential ramp on pan"));
            }
            if value == 0.0 {
                return Err(ParamError::ExponentialToZero { param });
            }
        }
        Ok(())
    }

    fn schedule(&self, param: &ParamHandle, at: f64) -> Result<()> {
        match *self {
            ParamEvent::Immediate { value, .. } => param.set_value_at_time(value, at)?,
            ParamEvent::TimedSet { value, time, .. } => param.set_value_at_time(value, at + time)?,
            ParamEvent::Ramp {
                value,
                time,
                kind: RampKind::Exponential,
                ..
            } => param.exponential_ramp_to_value_at_time(value, at + time)?,
            ParamEvent::Ramp {
                value,
                time,
                kind: RampKind::Linear,
                ..
            } => param.linear_ramp_to_value_at_time(value, at + time)?,
        }
        Ok(())
    }
}

/// Handle to a queued event, stable while the event stays queued.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventId(u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Bucket {
    Immediate,
    Timed,
    Exponential,
    Linear,
}

impl Bucket {
    fn of(event: &ParamEvent) -> Self {
        match event {
            ParamEvent::Immediate { .. } => Bucket::Immediate,
            ParamEvent::TimedSet { .. } => Bucket::Timed,
            ParamEvent::Ramp {
                kind: RampKind::Exponential,
                ..
            } => Bucket::Exponential,
            ParamEvent::Ramp {
                kind: RampKind::Linear,
                ..
            } => Bucket::Linear,
        }
    }
}

/// Per-sound automation state.
#[derive(Debug, Default, Clone)]
pub struct ParamController {
    immediate: Vec<(EventId, ParamEvent)>,
    timed: Vec<(EventId, ParamEvent)>,
    exponential: Vec<(EventId, ParamEvent)>,
    linear: Vec<(EventId, ParamEvent)>,
    live: [Option<f32>; 4],
    next_id: u64,
}

impl ParamController {
    /// An empty controller.
    pub fn new() -> Self {
        Self::default()
    }

    fn bucket_mut(&mut self, bucket: Bucket) -> &mut Vec<(EventId, ParamEvent)> {
        match bucket {
            Bucket::Immediate => &mut self.immediate,
            Bucket::Timed => &mut self.timed,
            Bucket::Exponential => &mut self.exponential,
            Bucket::Linear => &mut self.linear,
        }
    }

    /// Validate and queue `event`.
    pub fn push(&mut self, event: ParamEvent) -> Result<EventId, ParamError> {
        event.validate()?;
        let id = EventId(self.next_id);
        self.next_id += 1;
        self.bucket_mut(Bucket::of(&event)).push((id, event));
        Ok(id)
    }

    /// Queue a value set when the sound plays. Refine with
    /// [`QueuedSet::at`] or [`QueuedSet::ending_at`].
    pub fn on_play_set(&mut self, param: ParamType) -> OnPlaySet<'_> {
        OnPlaySet {
            controller: self,
            param,
        }
    }

    /// Queue a ramp from one value to another, starting at play time.
    pub fn on_play_ramp(&mut self, param: ParamType, kind: RampKind) -> OnPlayRamp<'_> {
        OnPlayRamp {
            controller: self,
            param,
            kind,
        }
    }

    /// Live mutation against the current node, remembered for later plays.
    pub fn update<'a>(
        &'a mut self,
        graph: &'a ConnectionGraph,
        param: ParamType,
    ) -> Update<'a> {
        Update {
            controller: self,
            graph,
            param,
        }
    }

    /// Remove a queued event. Returns it if it was still queued.
    pub fn remove(&mut self, id: EventId) -> Option<ParamEvent> {
        for bucket in [
            Bucket::Immediate,
            Bucket::Timed,
            Bucket::Exponential,
            Bucket::Linear,
        ] {
            let events = self.bucket_mut(bucket);
            if let Some(pos) = events.iter().position(|(eid, _)| *eid == id) {
                return Some(events.remove(pos).1);
            }
        }
        None
    }

    /// Look up a queued event.
    pub fn get(&self, id: EventId) -> Option<&ParamEvent> {
        self.events_with_ids()
            .find(|(eid, _)| *eid == id)
            .map(|(_, event)| event)
    }

    /// Drop every queued event and live value.
    pub fn clear(&mut self) {
        self.immediate.clear();
        self.timed.clear();
        self.exponential.clear();
        self.linear.clear();
        self.live = [None; 4];
    }

    /// Number of queued events.
    pub fn len(&self) -> usize {
        self.immediate.len() + self.timed.len() + self.exponential.len() + self.linear.len()
    }

    /// Whether nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn events_with_ids(&self) -> impl Iterator<Item = &(EventId, ParamEvent)> {
        self.immediate
            .iter()
            .chain(&self.timed)
            .chain(&self.exponential)
            .chain(&self.linear)
    }

    /// Queued events in application order.
    pub fn events(&self) -> impl Iterator<Item = &ParamEvent> {
        self.events_with_ids().map(|(_, event)| event)
    }

    /// Remembered live value for `param`.
    pub fn live_value(&self, param: ParamType) -> Option<f32> {
        self.live[param.slot()]
    }

    /// Set the remembered live value without touching a node.
    pub fn set_live_value(&mut self, param: ParamType, value: f32) {
        self.live[param.slot()] = Some(value);
    }

    /// Schedule everything on the wired graph for a play starting at `at`.
    pub fn apply(&self, graph: &ConnectionGraph, at: f64) -> Result<()> {
        for param in ParamType::ALL {
            if let Some(value) = self.live[param.slot()] {
                resolve(graph, param)?.set_value_at_time(value, at)?;
            }
        }
        for (_, event) in self.events_with_ids() {
            let handle = resolve(graph, event.param())?;
            event.schedule(&handle, at)?;
        }
        tracing::trace!(events = self.len(), at, "applied param events");
        Ok(())
    }
}

/// Resolve the live node parameter `param` controls.
pub(crate) fn resolve(graph: &ConnectionGraph, param: ParamType) -> Result<ParamHandle> {
    let (connection, name) = param.target();
    let node = graph.get_node_from(connection)?;
    node.param(name).ok_or_else(|| {
        ParamError::unsupported(format!("{param} on {} node", node.kind())).into()
    })
}

/// Builder returned by [`ParamController::on_play_set`].
pub struct OnPlaySet<'a> {
    controller: &'a mut ParamController,
    param: ParamType,
}

impl<'a> OnPlaySet<'a> {
    /// Queue `value` as an immediate-at-play set.
    pub fn to(self, value: f32) -> QueuedSet<'a> {
        let id = EventId(self.controller.next_id);
        self.controller.next_id += 1;
        self.controller.immediate.push((
            id,
            ParamEvent::Immediate {
                param: self.param,
                value,
            },
        ));
        QueuedSet {
            controller: self.controller,
            id,
            param: self.param,
            value,
        }
    }
}

/// An immediate set that can be upgraded to a timed set or a ramp.
pub struct QueuedSet<'a> {
    controller: &'a mut ParamController,
    id: EventId,
    param: ParamType,
    value: f32,
}

impl QueuedSet<'_> {
    /// Id of the queued event.
    pub fn id(&self) -> EventId {
        self.id
    }

    fn upgrade(self, event: ParamEvent) -> Result<EventId, ParamError> {
        event.validate()?;
        self.controller.remove(self.id);
        self.controller
            .bucket_mut(Bucket::of(&event))
            .push((self.id, event));
        Ok(self.id)
    }

    /// Set at `time` seconds after play instead of immediately.
    pub fn at(self, time: f64) -> EventId {
        let event = ParamEvent::TimedSet {
            param: self.param,
            value: self.value,
            time,
        };
        let id = self.id;
        self.controller.remove(id);
        self.controller.timed.push((id, event));
        id
    }

    /// Exponential ramp arriving `time` seconds after play.
    pub fn ending_at(self, time: f64) -> Result<EventId, ParamError> {
        self.ending_at_with(time, RampKind::Exponential)
    }

    /// Ramp of `kind` arriving `time` seconds after play.
    ///
    /// On error the immediate set stays queued.
    pub fn ending_at_with(self, time: f64, kind: RampKind) -> Result<EventId, ParamError> {
        let event = ParamEvent::Ramp {
            param: self.param,
            value: self.value,
            time,
            kind,
        };
        self.upgrade(event)
    }
}

/// Builder returned by [`ParamController::on_play_ramp`].
pub struct OnPlayRamp<'a> {
    controller: &'a mut ParamController,
    param: ParamType,
    kind: RampKind,
}

impl<'a> OnPlayRamp<'a> {
    /// Starting value, set at play time.
    pub fn from(self, start: f32) -> RampFrom<'a> {
        RampFrom { ramp: self, start }
    }
}

/// Ramp with a start value.
pub struct RampFrom<'a> {
    ramp: OnPlayRamp<'a>,
    start: f32,
}

impl<'a> RampFrom<'a> {
    /// Ramp target.
    pub fn to(self, end: f32) -> RampTo<'a> {
        RampTo { from: self, end }
    }
}

/// Ramp with start and end values, waiting for its duration.
pub struct RampTo<'a> {
    from: RampFrom<'a>,
    end: f32,
}

impl RampTo<'_> {
    /// Queue the set and the ramp ending `duration` seconds after play.
    /// Returns the ramp's id. Nothing is queued on error.
    pub fn over(self, duration: f64) -> Result<EventId, ParamError> {
        let OnPlayRamp {
            controller,
            param,
            kind,
        } = self.from.ramp;
        let ramp = ParamEvent::Ramp {
            param,
            value: self.end,
            time: duration,
            kind,
        };
        ramp.validate()?;
        controller.push(ParamEvent::Immediate {
            param,
            value: self.from.start,
        })?;
        controller.push(ramp)
    }
}

/// Builder returned by [`ParamController::update`].
pub struct Update<'a> {
    controller: &'a mut ParamController,
    graph: &'a ConnectionGraph,
    param: ParamType,
}

impl<'a> Update<'a> {
    /// Raw value; interpreted by [`UpdateTo::from`].
    pub fn to(self, value: f32) -> UpdateTo<'a> {
        UpdateTo {
            update: self,
            value,
        }
    }
}

/// Live update waiting for its ratio kind.
pub struct UpdateTo<'a> {
    update: Update<'a>,
    value: f32,
}

impl UpdateTo<'_> {
    /// Apply the value through `kind`. Returns the value written.
    pub fn from(self, kind: RatioKind) -> Result<f32> {
        let Update {
            controller,
            graph,
            param,
        } = self.update;
        let value = kind.apply(self.value);
        if graph.is_materialized() {
            resolve(graph, param)?.set_value(value);
        }
        controller.set_live_value(param, value);
        tracing::debug!(%param, value, "live param update");
        Ok(value)
    }

    /// Apply the value as a plain ratio.
    pub fn apply(self) -> Result<f32> {
        self.from(RatioKind::Ratio)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ratio_kinds() {
        assert_eq!(RatioKind::Ratio.apply(0.25), 0.25);
        assert_eq!(RatioKind::InverseRatio.apply(0.25), 0.75);
        assert_eq!(RatioKind::Percent.apply(25.0), 0.25);
    }

    #[test]
    fn unknown_names_are_unsupported() {
        let err = "wobble".parse::<ParamType>().unwrap_err();
        assert!(err.to_string().contains("wobble"));
        assert!("cubic".parse::<RampKind>().is_err());
        assert_eq!("inverseRatio".parse::<RatioKind>(), Ok(RatioKind::InverseRatio));
    }

    #[test]
    fn upgrade_moves_out_of_immediate_bucket() {
        let mut controller = ParamController::new();
        let id = controller.on_play_set(ParamType::Gain).to(0.5).at(1.0);
        assert_eq!(controller.len(), 1);
        assert_eq!(
            controller.get(id),
            Some(&ParamEvent::TimedSet {
                param: ParamType::Gain,
                value: 0.5,
                time: 1.0
            })
        );
    }

    #[test]
    fn ending_at_defaults_to_exponential() {
        let mut controller = ParamController::new();
        let id = controller
            .on_play_set(ParamType::Frequency)
            .to(880.0)
            .ending_at(2.0)
            .unwrap();
        assert!(matches!(
            controller.get(id),
            Some(ParamEvent::Ramp {
                kind: RampKind::Exponential,
                ..
            })
        ));
    }

    #[test]
    fn exponential_to_zero_rejected_and_immediate_kept() {
        let mut controller = ParamController::new();
        let err = controller
            .on_play_set(ParamType::Gain)
            .to(0.0)
            .ending_at(1.0)
            .unwrap_err();
        assert_eq!(
            err,
            ParamError::ExponentialToZero {
                param: ParamType::Gain
            }
        );
        assert_eq!(
            controller.events().copied().collect::<Vec<_>>(),
            vec![ParamEvent::Immediate {
                param: ParamType::Gain,
                value: 0.0
            }]
        );
    }

    #[test]
    fn ramp_builder_emits_set_then_ramp() {
        let mut controller = ParamController::new();
        controller
            .on_play_ramp(ParamType::Gain, RampKind::Linear)
            .from(0.0)
            .to(1.0)
            .over(3.0)
            .unwrap();
        let events: Vec<_> = controller.events().copied().collect();
        assert_eq!(
            events,
            vec![
                ParamEvent::Immediate {
                    param: ParamType::Gain,
                    value: 0.0
                },
                ParamEvent::Ramp {
                    param: ParamType::Gain,
                    value: 1.0,
                    time: 3.0,
                    kind: RampKind::Linear
                },
            ]
        );
    }

    #[test]
    fn failed_ramp_queues_nothing() {
        let mut controller = ParamController::new();
        let result = controller
            .on_play_ramp(ParamType::Gain, RampKind::Exponential)
            .from(1.0)
            .to(0.0)
            .over(1.0);
        assert!(result.is_err());
        assert!(controller.is_empty());
    }

    #[test]
    fn pan_cannot_ramp_exponentially() {
        let mut controller = ParamController::new();
        let err = controller
            .on_play_ramp(ParamType::Pan, RampKind::Exponential)
            .from(-1.0)
            .to(1.0)
            .over(1.0)
            .unwrap_err();
        assert!(matches!(err, ParamError::UnsupportedControl(_)));
    }

    #[test]
    fn apply_order_is_bucket_order() {
        let mut controller = ParamController::new();
        controller
            .on_play_set(ParamType::Gain)
            .to(0.2)
            .ending_at_with(1.0, RampKind::Linear)
            .unwrap();
        controller
            .on_play_set(ParamType::Gain)
            .to(0.5)
            .ending_at(2.0)
            .unwrap();
        controller.on_play_set(ParamType::Gain).to(0.1).at(0.5);
        controller.on_play_set(ParamType::Gain).to(1.0);
        let kinds: Vec<_> = controller.events().map(|e| Bucket::of(e)).collect();
        assert_eq!(
            kinds,
            vec![
                Bucket::Immediate,
                Bucket::Timed,
                Bucket::Exponential,
                Bucket::Linear
            ]
        );
    }

    #[test]
    fn remove_and_clear() {
        let mut controller = ParamController::new();
        let id = controller.on_play_set(ParamType::Detune).to(10.0).id();
        controller.set_live_value(ParamType::Pan, 0.3);
        assert!(controller.remove(id).is_some());
        assert!(controller.remove(id).is_none());
        controller.clear();
        assert_eq!(controller.live_value(ParamType::Pan), None);
    }
}
