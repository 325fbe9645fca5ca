//! Timer queue keyed to the virtual clock.

use crate::host::{Deferred, TimerId};

struct Timer {
    id: TimerId,
    due: f64,
    callback: Deferred,
}

/// Pending deferred calls, fired in `(due, issue order)` order.
#[derive(Default)]
pub(super) struct TimerQueue {
    next_id: u64,
    timers: Vec<Timer>,
}

impl TimerQueue {
    pub(super) fn push(&mut self, due: f64, callback: Deferred) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        self.timers.push(Timer { id, due, callback });
        id
    }

    pub(super) fn cancel(&mut self, id: TimerId) -> bool {
        let before = self.timers.len();
        self.timers.retain(|t| t.id != id);
        self.timers.len() != before
    }

    pub(super) fn len(&self) -> usize {
        self.timers.len()
    }

    pub(super) fn next_due(&self) -> Option<f64> {
        self.timers.iter().map(|t| t.due).min_by(f64::total_cmp)
    }

    /// Remove the earliest timer due at or before `limit`.
    ///
    /// IDs grow monotonically, so ties on `due` resolve in issue order.
    pub(super) fn pop_due(&mut self, limit: f64) -> Option<(TimerId, f64, Deferred)> {
        let index = self
            .timers
            .iter()
            .enumerate()
            .filter(|(_, t)| t.due <= limit)
            .min_by(|(_, a), (_, b)| a.due.total_cmp(&b.due).then(a.id.cmp(&b.id)))
            .map(|(i, _)| i)?;
        let timer = self.timers.remove(index);
        Some((timer.id, timer.due, timer.callback))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ties_fire_in_issue_order() {
        let mut queue = TimerQueue::default();
        let a = queue.push(1.0, Box::new(|| {}));
        let b = queue.push(0.5, Box::new(|| {}));
        let c = queue.push(1.0, Box::new(|| {}));
        let order: Vec<_> =
            std::iter::from_fn(|| queue.pop_due(2.0).map(|(id, _, _)| id)).collect();
        assert_eq!(order, vec![b, a, c]);
    }

    #[test]
    fn cancel_removes_pending() {
        let mut queue = TimerQueue::default();
        let id = queue.push(1.0, Box::new(|| {}));
        assert!(queue.cancel(id));
        assert!(!queue.cancel(id));
        assert!(queue.pop_due(5.0).is_none());
    }
}
