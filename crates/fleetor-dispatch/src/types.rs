//! Scheduling-side agent state and per-assignment telemetry records.

use fleetor_core::{AgentId, Point, Task, TaskId, TaskKind};
use serde::{Deserialize, Serialize};

/// Scheduling status of a fleet agent.
///
/// Motion itself is delegated to the navigation collaborator; these states
/// only gate what the coordination core may do with the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    /// Available for dispatch and idle-roam node contention.
    Idle,
    /// En route to a task target.
    Moving,
    /// At the shelf, picking items.
    Picking,
    /// Carrying items to the drop-off.
    Delivering,
    /// Lost a node contention round; excluded from dispatch and contention
    /// until the yield timer expires.
    Yielding,
}

/// A mobile agent as seen by the coordination core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    /// Roster identifier; also the deterministic iteration key.
    pub id: AgentId,
    /// Current scheduling status.
    pub status: AgentStatus,
    /// Index into the navigation node pool, if this agent claims a roam node.
    pub assigned_node: Option<usize>,
    /// The task currently owned by this agent, at most one.
    pub active_task: Option<Task>,
    /// Right-of-way rank; lower wins contention.
    pub priority_rank: u32,
    /// Last destination issued to the navigation collaborator.
    pub destination: Option<Point>,
    /// Bumped on every destination-issuing action; stale scheduled callbacks
    /// compare against it and cancel themselves.
    pub assignment_epoch: u64,
    yield_remaining: f64,
}

impl Agent {
    /// Creates an idle agent with the given roster id and right-of-way rank.
    pub fn new(id: AgentId, priority_rank: u32) -> Self {
        Self {
            id,
            status: AgentStatus::Idle,
            assigned_node: None,
            active_task: None,
            priority_rank,
            destination: None,
            assignment_epoch: 0,
            yield_remaining: 0.0,
        }
    }

    /// Whether the agent can accept a task or a roam node this tick.
    pub fn is_available(&self) -> bool {
        self.status == AgentStatus::Idle && self.active_task.is_none()
    }

    /// Puts the agent into the yielding state for `duration` seconds and
    /// releases any claimed node.
    pub fn begin_yield(&mut self, duration: f64) {
        self.status = AgentStatus::Yielding;
        self.assigned_node = None;
        self.destination = None;
        self.yield_remaining = duration;
        self.assignment_epoch += 1;
    }

    /// Counts the yield timer down by `delta`; returns true when it expires
    /// this call and the agent returns to idle.
    pub fn tick_yield(&mut self, delta: f64) -> bool {
        if self.status != AgentStatus::Yielding {
            return false;
        }
        self.yield_remaining -= delta;
        if self.yield_remaining <= 0.0 {
            self.status = AgentStatus::Idle;
            self.assigned_node = None;
            self.yield_remaining = 0.0;
            return true;
        }
        false
    }

    /// Seconds left on the yield timer (zero when not yielding).
    pub fn yield_remaining(&self) -> f64 {
        self.yield_remaining
    }
}

/// Ephemeral per-assignment record, created at hand-off and consumed once at
/// completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignmentTelemetry {
    /// Task this record belongs to.
    pub task_id: TaskId,
    /// Order or restock.
    pub kind: TaskKind,
    /// Simulation time at hand-off.
    pub started_at: f64,
    /// Planned path length at hand-off.
    pub baseline_distance: f32,
    /// Straight-line distance at hand-off.
    pub optimal_distance: f32,
}
