//! Deterministic in-process host.
//!
//! [`OfflineHost`] implements every host trait against a virtual clock that
//! only moves when told to. Tests, benchmarks and the CLI drive it with
//! [`advance_to`](OfflineHost::advance_to) / [`advance_by`](OfflineHost::advance_by)
//! and then inspect what happened through the [`HostEvent`] log and the node
//! registry.
//!
//! Failure modes mirror the browser API: restarting a started source, stopping
//! one that never started, and exponential ramps to zero are all errors.
//!
//! ```rust,ignore
//! let host = Rc::new(OfflineHost::new());
//! let context = AudioContext::with_host(host.clone());
//! let mut osc = Oscillator::new(&context, Waveform::Sine);
//! osc.play_for(1.0)?;
//! host.advance_by(2.0);
//! assert!(!osc.is_playing());
//! ```

mod node;
mod timers;

pub use node::{OfflineNode, OfflineParam};

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::error::HostError;
use crate::host::{
    AudioNode, ClockSource, Deferred, DeferredCalls, NodeFactory, NodeHandle, NodeId, NodeKind,
    ParamName, TimerId,
};

use timers::TimerQueue;

/// Kind of automation call recorded in the log.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AutomationOp {
    /// Direct value assignment at the current time.
    SetValue,
    /// `set_value_at_time`.
    SetValueAtTime,
    /// `linear_ramp_to_value_at_time`.
    LinearRamp,
    /// `exponential_ramp_to_value_at_time`.
    ExponentialRamp,
}

impl AutomationOp {
    /// Stable name.
    pub fn name(self) -> &'static str {
        match self {
            AutomationOp::SetValue => "set-value",
            AutomationOp::SetValueAtTime => "set-value-at-time",
            AutomationOp::LinearRamp => "linear-ramp",
            AutomationOp::ExponentialRamp => "exponential-ramp",
        }
    }
}

/// Something the core asked the host to do.
#[derive(Clone, Debug, PartialEq)]
pub enum HostEvent {
    /// The clock was resumed.
    Resumed,
    /// A node was created.
    Created {
        /// New node.
        node: NodeId,
        /// Its kind.
        kind: NodeKind,
    },
    /// An output connection was added.
    Connected {
        /// Upstream node.
        from: NodeId,
        /// Downstream node.
        to: NodeId,
    },
    /// All outputs of a node were dropped.
    Disconnected {
        /// Node.
        node: NodeId,
    },
    /// A plain attribute was assigned.
    Attribute {
        /// Node.
        node: NodeId,
        /// Attribute name.
        name: &'static str,
    },
    /// An automation call on a parameter.
    Automation {
        /// Node.
        node: NodeId,
        /// Parameter.
        param: ParamName,
        /// Call kind.
        op: AutomationOp,
        /// Target value.
        value: f32,
        /// Event time on the playback clock.
        time: f64,
    },
    /// A source was started.
    Started {
        /// Node.
        node: NodeId,
        /// Its kind.
        kind: NodeKind,
        /// Start time.
        when: f64,
        /// Offset into the material.
        offset: f64,
    },
    /// A source was stopped.
    Stopped {
        /// Node.
        node: NodeId,
        /// Its kind.
        kind: NodeKind,
        /// Stop time.
        when: f64,
    },
}

/// A logged event with the clock time of the call.
#[derive(Clone, Debug, PartialEq)]
pub struct LoggedEvent {
    /// Virtual clock time when the call was made.
    pub at: f64,
    /// What happened.
    pub event: HostEvent,
}

/// State shared between the host, its nodes and its params.
#[derive(Default)]
pub(crate) struct Shared {
    now: Cell<f64>,
    log: RefCell<Vec<LoggedEvent>>,
}

impl Shared {
    pub(crate) fn now(&self) -> f64 {
        self.now.get()
    }

    pub(crate) fn set_now(&self, time: f64) {
        self.now.set(time);
    }

    pub(crate) fn log(&self, event: HostEvent) {
        self.log.borrow_mut().push(LoggedEvent {
            at: self.now(),
            event,
        });
    }
}

/// Deterministic host with a manually advanced clock.
pub struct OfflineHost {
    shared: Rc<Shared>,
    running: Cell<bool>,
    timers: RefCell<TimerQueue>,
    nodes: RefCell<Vec<Rc<OfflineNode>>>,
}

impl Default for OfflineHost {
    fn default() -> Self {
        Self::new()
    }
}

impl OfflineHost {
    /// A running host at time 0.
    pub fn new() -> Self {
        let host = Self::suspended();
        host.running.set(true);
        host
    }

    /// A host whose clock starts suspended, as browsers do before a gesture.
    pub fn suspended() -> Self {
        let shared = Rc::new(Shared::default());
        let destination = Rc::new(OfflineNode::new(
            NodeId(0),
            NodeKind::Destination,
            shared.clone(),
        ));
        Self {
            shared,
            running: Cell::new(false),
            timers: RefCell::new(TimerQueue::default()),
            nodes: RefCell::new(vec![destination]),
        }
    }

    /// Current virtual time.
    pub fn now(&self) -> f64 {
        self.shared.now()
    }

    /// Fire every timer due up to `time`, then leave the clock at `time`.
    ///
    /// Timers scheduled by callbacks are fired too if they fall inside the
    /// window. Returns the number of callbacks run. The clock never moves
    /// backwards.
    pub fn advance_to(&self, time: f64) -> usize {
        if time < self.now() {
            tracing::warn!(now = self.now(), requested = time, "ignoring backwards clock move");
            return 0;
        }
        let mut fired = 0;
        loop {
            let next = self.timers.borrow_mut().pop_due(time);
            let Some((id, due, callback)) = next else {
                break;
            };
            self.shared.set_now(due.max(self.now()));
            tracing::trace!(timer = id.0, at = self.now(), "timer fired");
            callback();
            fired += 1;
        }
        self.shared.set_now(time);
        fired
    }

    /// [`advance_to`](Self::advance_to) relative to now.
    pub fn advance_by(&self, delta: f64) -> usize {
        self.advance_to(self.now() + delta.max(0.0))
    }

    /// Number of timers waiting to fire.
    pub fn pending_timers(&self) -> usize {
        self.timers.borrow().len()
    }

    /// Due time of the next pending timer.
    pub fn next_timer_due(&self) -> Option<f64> {
        self.timers.borrow().next_due()
    }

    /// Look up a node by id.
    pub fn node(&self, id: NodeId) -> Option<Rc<OfflineNode>> {
        usize::try_from(id.index())
            .ok()
            .and_then(|i| self.nodes.borrow().get(i).cloned())
    }

    /// Id of the destination node.
    pub fn destination_id(&self) -> NodeId {
        NodeId(0)
    }

    /// Outputs of a node; empty if unknown.
    pub fn outputs(&self, id: NodeId) -> Vec<NodeId> {
        self.node(id).map(|n| n.outputs()).unwrap_or_default()
    }

    /// Value of a node parameter at `time`.
    pub fn param_value_at(&self, id: NodeId, param: ParamName, time: f64) -> Option<f32> {
        self.node(id)?.offline_param(param).map(|p| p.value_at(time))
    }

    /// Nodes of `kind` created so far.
    pub fn created_count(&self, kind: NodeKind) -> usize {
        self.nodes
            .borrow()
            .iter()
            .skip(1)
            .filter(|n| n.kind() == kind)
            .count()
    }

    /// Every logged call, oldest first.
    pub fn events(&self) -> Vec<LoggedEvent> {
        self.shared.log.borrow().clone()
    }

    /// Logged source starts as `(node, when)`.
    pub fn starts(&self) -> Vec<(NodeId, f64)> {
        self.shared
            .log
            .borrow()
            .iter()
            .filter_map(|e| match e.event {
                HostEvent::Started { node, when, .. } => Some((node, when)),
                _ => None,
            })
            .collect()
    }

    /// Logged source stops as `(node, when)`.
    pub fn stops(&self) -> Vec<(NodeId, f64)> {
        self.shared
            .log
            .borrow()
            .iter()
            .filter_map(|e| match e.event {
                HostEvent::Stopped { node, when, .. } => Some((node, when)),
                _ => None,
            })
            .collect()
    }

    /// Drop the event log.
    pub fn clear_events(&self) {
        self.shared.log.borrow_mut().clear();
    }
}

impl ClockSource for OfflineHost {
    fn current_time(&self) -> f64 {
        self.now()
    }

    fn resume(&self) {
        if !self.running.replace(true) {
            self.shared.log(HostEvent::Resumed);
        }
    }

    fn is_running(&self) -> bool {
        self.running.get()
    }
}

impl NodeFactory for OfflineHost {
    fn create_node(&self, kind: NodeKind) -> Result<NodeHandle, HostError> {
        if kind == NodeKind::Destination {
            return Err(HostError::UnsupportedNode(kind));
        }
        let mut nodes = self.nodes.borrow_mut();
        let id = NodeId(nodes.len() as u64);
        let node = Rc::new(OfflineNode::new(id, kind, self.shared.clone()));
        nodes.push(node.clone());
        drop(nodes);
        self.shared.log(HostEvent::Created { node: id, kind });
        Ok(node)
    }

    fn destination(&self) -> NodeHandle {
        self.nodes.borrow()[0].clone()
    }
}

impl DeferredCalls for OfflineHost {
    fn schedule_after(&self, delay_ms: f64, callback: Deferred) -> TimerId {
        let due = self.now() + delay_ms.max(0.0) / 1000.0;
        self.timers.borrow_mut().push(due, callback)
    }

    fn cancel(&self, id: TimerId) -> bool {
        self.timers.borrow_mut().cancel(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timers_fire_in_order_and_move_clock() {
        let host = Rc::new(OfflineHost::new());
        let seen = Rc::new(RefCell::new(Vec::new()));
        for (delay, tag) in [(500.0, "b"), (100.0, "a"), (500.0, "c")] {
            let seen = seen.clone();
            let clock = host.clone();
            host.schedule_after(
                delay,
                Box::new(move || seen.borrow_mut().push((tag, clock.now()))),
            );
        }
        assert_eq!(host.advance_to(1.0), 3);
        assert_eq!(*seen.borrow(), vec![("a", 0.1), ("b", 0.5), ("c", 0.5)]);
        assert_eq!(host.now(), 1.0);
    }

    #[test]
    fn callbacks_can_schedule_within_window() {
        let host = Rc::new(OfflineHost::new());
        let count = Rc::new(Cell::new(0));
        let inner_host = host.clone();
        let inner_count = count.clone();
        host.schedule_after(
            100.0,
            Box::new(move || {
                let count = inner_count.clone();
                inner_host.schedule_after(100.0, Box::new(move || count.set(count.get() + 1)));
            }),
        );
        assert_eq!(host.advance_to(0.15), 1);
        assert_eq!(host.pending_timers(), 1);
        host.advance_to(0.25);
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn backwards_advance_is_ignored() {
        let host = OfflineHost::new();
        host.advance_to(2.0);
        assert_eq!(host.advance_to(1.0), 0);
        assert_eq!(host.now(), 2.0);
    }

    #[test]
    fn nodes_are_registered_and_logged() {
        let host = OfflineHost::new();
        let gain = host.create_node(NodeKind::Gain).unwrap();
        gain.connect(&*host.destination()).unwrap();
        gain.connect(&*host.destination()).unwrap();
        assert_eq!(host.outputs(gain.id()), vec![host.destination_id()]);
        assert_eq!(host.created_count(NodeKind::Gain), 1);
        let connects = host
            .events()
            .iter()
            .filter(|e| matches!(e.event, HostEvent::Connected { .. }))
            .count();
        assert_eq!(connects, 1);
        assert!(host.create_node(NodeKind::Destination).is_err());
    }
}
