//! Scored task queues with a restock dedup guard.
//!
//! Two ordered collections (orders, restocks) selected by score rather than
//! FIFO position. A companion set guarantees that any shelf has at most one
//! pending restock entry at a time.

use std::collections::HashSet;

use fleetor_core::{ShelfId, Task, TaskKind};
use tracing::debug;

use crate::scoring::task_score;

/// Holds queued orders and restocks until the dispatcher hands them to
/// agents.
#[derive(Debug, Default)]
pub struct TaskQueue {
    orders: Vec<Task>,
    restocks: Vec<Task>,
    pending_restock: HashSet<ShelfId>,
}

impl TaskQueue {
    /// Creates an empty queue pair.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a delivery order unconditionally.
    pub fn enqueue_order(&mut self, task: Task) {
        debug_assert_eq!(task.kind, TaskKind::Order);
        self.orders.push(task);
    }

    /// Appends a restock unless its shelf already has one pending.
    ///
    /// Returns false for the idempotent no-op case.
    pub fn enqueue_restock(&mut self, task: Task) -> bool {
        debug_assert_eq!(task.kind, TaskKind::Restock);
        if !self.pending_restock.insert(task.shelf) {
            debug!(shelf = task.shelf, "restock already pending, dropping duplicate");
            return false;
        }
        self.restocks.push(task);
        true
    }

    /// Removes and returns the best-scoring task across both queues.
    ///
    /// Restock scores are multiplied by `restock_weight`; on an exact score
    /// tie the order candidate wins. Returns `None` when both queues are
    /// empty.
    pub fn dequeue_best(&mut self, now: f64, restock_weight: f64) -> Option<Task> {
        let order = best_index(&self.orders, now, 1.0);
        let restock = best_index(&self.restocks, now, restock_weight);

        match (order, restock) {
            (Some((oi, os)), Some((ri, rs))) => {
                if rs > os {
                    Some(self.take_restock(ri))
                } else {
                    Some(self.orders.swap_remove(oi))
                }
            }
            (Some((oi, _)), None) => Some(self.orders.swap_remove(oi)),
            (None, Some((ri, _))) => Some(self.take_restock(ri)),
            (None, None) => None,
        }
    }

    /// Removes and returns the best-scoring restock, ignoring orders.
    ///
    /// Used by the dispatcher's fairness guard.
    pub fn dequeue_restock(&mut self, now: f64) -> Option<Task> {
        let (index, _) = best_index(&self.restocks, now, 1.0)?;
        Some(self.take_restock(index))
    }

    /// Reinserts a task whose hand-off failed, restoring the restock
    /// pending-shelf mark where applicable.
    pub fn requeue(&mut self, task: Task) {
        match task.kind {
            TaskKind::Order => self.orders.push(task),
            TaskKind::Restock => {
                // A duplicate may have been enqueued between dequeue and
                // requeue; the dedup invariant wins over the retry.
                if self.pending_restock.insert(task.shelf) {
                    self.restocks.push(task);
                } else {
                    debug!(
                        shelf = task.shelf,
                        task_id = %task.id,
                        "restock superseded while in flight, dropping requeue"
                    );
                }
            }
        }
    }

    /// Whether a restock for `shelf` is queued.
    pub fn has_pending_restock(&self, shelf: ShelfId) -> bool {
        self.pending_restock.contains(&shelf)
    }

    /// Number of queued orders.
    pub fn order_count(&self) -> usize {
        self.orders.len()
    }

    /// Number of queued restocks.
    pub fn restock_count(&self) -> usize {
        self.restocks.len()
    }

    /// True when both queues are empty.
    pub fn is_empty(&self) -> bool {
        self.orders.is_empty() && self.restocks.is_empty()
    }

    /// Drops all queued work and pending-restock marks.
    pub fn clear(&mut self) {
        self.orders.clear();
        self.restocks.clear();
        self.pending_restock.clear();
    }

    fn take_restock(&mut self, index: usize) -> Task {
        let task = self.restocks.swap_remove(index);
        self.pending_restock.remove(&task.shelf);
        task
    }
}

/// Index and score of the winning task in `tasks`, if any.
///
/// Higher score wins; equal scores prefer the lowest task id, which keeps
/// selection independent of insertion order.
fn best_index(tasks: &[Task], now: f64, weight: f64) -> Option<(usize, f64)> {
    let mut best: Option<(usize, f64)> = None;
    for (index, task) in tasks.iter().enumerate() {
        let score = task_score(task.priority, task.age(now), weight);
        let wins = match best {
            None => true,
            Some((best_index, best_score)) => {
                score > best_score || (score == best_score && task.id < tasks[best_index].id)
            }
        };
        if wins {
            best = Some((index, score));
        }
    }
    best
}
