//! Task hand-off to available agents.
//!
//! The dispatcher owns the task queues, picks the best-scoring task for each
//! available agent, and applies the delivery-streak fairness guard so a busy
//! order flow cannot starve restocks indefinitely.

use std::collections::{BTreeMap, HashMap};

use fleetor_core::{AgentId, ShelfId, Task, TaskKind, TaskPriority};
use tracing::{debug, info, warn};

use crate::config::CoordinatorConfig;
use crate::queue::TaskQueue;
use crate::traits::{Inventory, Navigation, Telemetry};
use crate::types::{Agent, AgentStatus, AssignmentTelemetry};

/// Hands queued tasks to available agents in score order.
#[derive(Debug, Default)]
pub struct Dispatcher {
    queue: TaskQueue,
    delivery_streak: u32,
    telemetry_by_agent: HashMap<AgentId, AssignmentTelemetry>,
}

impl Dispatcher {
    /// Creates a dispatcher with empty queues.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a delivery order.
    pub fn enqueue_order(&mut self, task: Task) {
        self.queue.enqueue_order(task);
    }

    /// Queues a restock; returns false when the shelf already has one
    /// pending.
    pub fn enqueue_restock(&mut self, task: Task) -> bool {
        self.queue.enqueue_restock(task)
    }

    /// Returns a dequeued task to the queues, for hand-offs undone by the
    /// caller (agent removal, rejected destinations).
    pub fn requeue(&mut self, task: Task) {
        self.queue.requeue(task);
    }

    /// Whether a restock for `shelf` is already queued.
    pub fn has_pending_restock(&self, shelf: ShelfId) -> bool {
        self.queue.has_pending_restock(shelf)
    }

    /// Number of queued delivery orders.
    pub fn pending_orders(&self) -> usize {
        self.queue.order_count()
    }

    /// Number of queued restocks.
    pub fn pending_restocks(&self) -> usize {
        self.queue.restock_count()
    }

    /// Number of assignments currently in flight.
    pub fn active_assignments(&self) -> usize {
        self.telemetry_by_agent.len()
    }

    /// Consecutive orders dispatched since the last restock hand-off.
    pub fn delivery_streak(&self) -> u32 {
        self.delivery_streak
    }

    /// Drops all queued work and in-flight assignment records.
    pub fn clear(&mut self) {
        self.queue.clear();
        self.delivery_streak = 0;
        self.telemetry_by_agent.clear();
    }

    /// Runs one dispatch round at simulation time `now`.
    ///
    /// Available agents are visited in ascending id order; each receives the
    /// current best-scoring task, subject to the fairness guard. Returns the
    /// number of assignments made.
    pub fn run<N: Navigation, I: Inventory, T: Telemetry>(
        &mut self,
        now: f64,
        agents: &mut BTreeMap<AgentId, Agent>,
        nav: &mut N,
        inventory: &I,
        telemetry: &mut T,
        config: &CoordinatorConfig,
    ) -> usize {
        let mut assigned = 0;
        for (&agent_id, agent) in agents.iter_mut() {
            if !agent.is_available() {
                continue;
            }
            if self.queue.is_empty() {
                break;
            }
            if self.assign_to(now, agent_id, agent, nav, inventory, telemetry, config) {
                assigned += 1;
            }
        }
        assigned
    }

    /// Finalizes a completed task: records telemetry, applies the stock
    /// mutation, and triggers a restock when the shelf falls below its
    /// threshold.
    pub fn complete<I: Inventory, T: Telemetry>(
        &mut self,
        now: f64,
        agent: &mut Agent,
        task: Task,
        inventory: &mut I,
        telemetry: &mut T,
        config: &CoordinatorConfig,
    ) {
        let record = self.telemetry_by_agent.remove(&agent.id);
        if inventory.current_stock(task.shelf).is_none() {
            // A completion against a vanished shelf has nothing to apply.
            warn!(agent = agent.id, shelf = task.shelf, "completion for unknown shelf ignored");
        } else {
            if let Some(record) = record {
                telemetry.report_completion(
                    agent.id,
                    (now - record.started_at).max(0.0),
                    record.baseline_distance,
                    record.optimal_distance,
                );
            }
            match task.kind {
                TaskKind::Order => {
                    let remaining = inventory.remove_stock(task.shelf, task.quantity);
                    debug!(shelf = task.shelf, remaining, "order picked");
                }
                TaskKind::Restock => {
                    let level = inventory.add_stock(task.shelf, task.quantity);
                    debug!(shelf = task.shelf, level, "shelf restocked");
                }
            }
            if inventory.is_low_stock(task.shelf) && !self.queue.has_pending_restock(task.shelf) {
                self.queue.enqueue_restock(Task::restock(
                    task.shelf,
                    config.restock_batch_size,
                    TaskPriority::High,
                    now,
                ));
                debug!(shelf = task.shelf, "low stock after completion, restock queued");
            }
        }

        agent.status = AgentStatus::Idle;
        agent.active_task = None;
        agent.assigned_node = None;
        agent.destination = None;
        if config.verbose_logging {
            info!(agent = agent.id, task_id = %task.id, "task completed");
        }
    }

    /// Picks the next task for one agent and issues it. Returns true on a
    /// successful hand-off.
    #[allow(clippy::too_many_arguments)]
    fn assign_to<N: Navigation, I: Inventory, T: Telemetry>(
        &mut self,
        now: f64,
        agent_id: AgentId,
        agent: &mut Agent,
        nav: &mut N,
        inventory: &I,
        telemetry: &mut T,
        config: &CoordinatorConfig,
    ) -> bool {
        loop {
            let Some(task) = self.next_task(now, config) else {
                return false;
            };

            // A task whose shelf vanished is unrecoverable; drop it and try
            // the next candidate for the same agent.
            let Some(target) = nav.shelf_location(task.shelf) else {
                warn!(task_id = %task.id, shelf = task.shelf, "dropping task for unknown shelf");
                continue;
            };
            if inventory.current_stock(task.shelf).is_none() {
                warn!(task_id = %task.id, shelf = task.shelf, "dropping task for untracked shelf");
                continue;
            }

            let from = nav.current_position(agent_id);
            if !nav.has_feasible_path(from, target) || !nav.set_destination(agent_id, target) {
                // The agent cannot take work this tick; put the task back and
                // leave the agent for the next round.
                debug!(
                    agent = agent_id,
                    task_id = %task.id,
                    "hand-off failed, requeueing task"
                );
                self.queue.requeue(task);
                return false;
            }

            let kind = task.kind;
            agent.status = AgentStatus::Moving;
            agent.assigned_node = None;
            agent.destination = Some(target);
            agent.assignment_epoch += 1;
            self.telemetry_by_agent.insert(
                agent_id,
                AssignmentTelemetry {
                    task_id: task.id,
                    kind,
                    started_at: now,
                    baseline_distance: nav.remaining_distance(agent_id),
                    optimal_distance: from.distance(target),
                },
            );
            telemetry.report_assignment(agent_id, &task);
            if config.verbose_logging {
                info!(
                    agent = agent_id,
                    task_id = %task.id,
                    kind = ?kind,
                    priority = %task.priority,
                    "task assigned"
                );
            }
            agent.active_task = Some(task);

            match kind {
                TaskKind::Order => self.delivery_streak += 1,
                TaskKind::Restock => self.delivery_streak = 0,
            }
            return true;
        }
    }

    /// Next task under the fairness guard: after `max_consecutive_deliveries`
    /// straight orders, a queued restock is forced ahead of any order.
    fn next_task(&mut self, now: f64, config: &CoordinatorConfig) -> Option<Task> {
        if self.delivery_streak >= config.max_consecutive_deliveries {
            if let Some(task) = self.queue.dequeue_restock(now) {
                debug!(
                    streak = self.delivery_streak,
                    task_id = %task.id,
                    "delivery streak limit hit, forcing restock"
                );
                return Some(task);
            }
        }
        self.queue.dequeue_best(now, config.restock_weight)
    }
}
