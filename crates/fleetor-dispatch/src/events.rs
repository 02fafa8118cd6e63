//! Non-blocking deferred actions keyed by simulation time.
//!
//! The scheduler never blocks: "wait, then act" maneuvers (deadlock
//! retreat-then-resume) are stored here and drained by the coordinator each
//! tick once their deadline has passed.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use fleetor_core::{AgentId, Point};

/// An action to perform when its deadline passes.
#[derive(Debug, Clone, PartialEq)]
pub enum ScheduledAction {
    /// Re-issue an agent's pre-retreat destination, unless the agent was
    /// reassigned in the meantime (epoch mismatch).
    ResumeDestination {
        /// Agent to resume.
        agent: AgentId,
        /// Destination held before the retreat.
        destination: Point,
        /// Assignment epoch captured when the retreat was issued.
        epoch: u64,
    },
}

#[derive(Debug)]
struct TimedEvent {
    due: f64,
    seq: u64,
    action: ScheduledAction,
}

// Min-heap ordering: earliest deadline first, insertion order on ties.
impl Ord for TimedEvent {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .due
            .total_cmp(&self.due)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for TimedEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for TimedEvent {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for TimedEvent {}

/// Deadline-ordered queue of [`ScheduledAction`]s.
#[derive(Debug, Default)]
pub struct EventSchedule {
    heap: BinaryHeap<TimedEvent>,
    next_seq: u64,
}

impl EventSchedule {
    /// Creates an empty schedule.
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedules `action` to fire once simulation time reaches `due`.
    pub fn schedule(&mut self, due: f64, action: ScheduledAction) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(TimedEvent { due, seq, action });
    }

    /// Removes and returns every action whose deadline is at or before `now`,
    /// in deadline order.
    pub fn drain_due(&mut self, now: f64) -> Vec<ScheduledAction> {
        let mut due = Vec::new();
        while let Some(event) = self.heap.peek() {
            if event.due > now {
                break;
            }
            if let Some(event) = self.heap.pop() {
                due.push(event.action);
            }
        }
        due
    }

    /// Number of pending actions.
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Whether no actions are pending.
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Drops all pending actions.
    pub fn clear(&mut self) {
        self.heap.clear();
    }
}
