//! Shared helpers for rendering offline host activity.

use chime_core::offline::{HostEvent, LoggedEvent};
use serde_json::{Value, json};

/// One-line human description of a host event.
pub fn describe(event: &HostEvent) -> String {
    match event {
        HostEvent::Resumed => "clock resumed".to_string(),
        HostEvent::Created { node, kind } => format!("create   {kind} #{}", node.index()),
        HostEvent::Connected { from, to } => {
            format!("connect  #{} -> #{}", from.index(), to.index())
        }
        HostEvent::Disconnected { node } => format!("detach   #{}", node.index()),
        HostEvent::Attribute { node, name } => format!("attr     #{}.{name}", node.index()),
        HostEvent::Automation {
            node,
            param,
            op,
            value,
            time,
        } => format!(
            "{:<17} #{}.{param} = {value:.4} @ {time:.3}s",
            op.name(),
            node.index()
        ),
        HostEvent::Started {
            node,
            kind,
            when,
            offset,
        } => format!(
            "start    {kind} #{} @ {when:.3}s (offset {offset:.3}s)",
            node.index()
        ),
        HostEvent::Stopped { node, kind, when } => {
            format!("stop     {kind} #{} @ {when:.3}s", node.index())
        }
    }
}

/// JSON form of a logged event.
pub fn event_json(logged: &LoggedEvent) -> Value {
    let body = match &logged.event {
        HostEvent::Resumed => json!({ "type": "resumed" }),
        HostEvent::Created { node, kind } => {
            json!({ "type": "created", "node": node.index(), "kind": kind.name() })
        }
        HostEvent::Connected { from, to } => {
            json!({ "type": "connected", "from": from.index(), "to": to.index() })
        }
        HostEvent::Disconnected { node } => {
            json!({ "type": "disconnected", "node": node.index() })
        }
        HostEvent::Attribute { node, name } => {
            json!({ "type": "attribute", "node": node.index(), "name": name })
        }
        HostEvent::Automation {
            node,
            param,
            op,
            value,
            time,
        } => json!({
            "type": "automation",
            "node": node.index(),
            "param": param.name(),
            "op": op.name(),
            "value": value,
            "time": time,
        }),
        HostEvent::Started {
            node,
            kind,
            when,
            offset,
        } => json!({
            "type": "started",
            "node": node.index(),
            "kind": kind.name(),
            "when": when,
            "offset": offset,
        }),
        HostEvent::Stopped { node, kind, when } => json!({
            "type": "stopped",
            "node": node.index(),
            "kind": kind.name(),
            "when": when,
        }),
    };
    json!({ "at": logged.at, "event": body })
}

/// Print an event log, one line per event.
pub fn print_log(events: &[LoggedEvent]) {
    println!("Host calls ({}):", events.len());
    for logged in events {
        println!("  [{:>7.3}s] {}", logged.at, describe(&logged.event));
    }
}

/// Sample times `0, step, 2*step, ...` up to and including `end`.
pub fn sample_times(end: f64, step: f64) -> Vec<f64> {
    if step <= 0.0 || !end.is_finite() || end < 0.0 {
        return vec![0.0];
    }
    let count = (end / step + 1e-9).floor() as usize;
    (0..=count).map(|i| i as f64 * step).collect()
}
