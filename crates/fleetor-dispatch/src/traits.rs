//! Collaborator interfaces consumed by the coordination core.
//!
//! The core never computes trajectories, mutates stock ledgers, or renders
//! metrics itself; it talks to these three seams. Implementations must be
//! driven from the same thread as [`crate::Coordinator::tick`] — the core is
//! single-threaded by design and none of these calls may block.

use fleetor_core::{AgentId, Point, ShelfId, Task};

/// Path planning and motion execution, owned by the host.
///
/// `set_destination` is an idempotent overwrite: issuing a new destination
/// implicitly cancels the previous one, so the core never sends an explicit
/// cancellation.
pub trait Navigation {
    /// Whether a traversable path exists between two floor points.
    fn has_feasible_path(&self, from: Point, to: Point) -> bool;

    /// Command an agent to move to `point`. Returns false if the request
    /// was rejected (unreachable, agent unknown, ...).
    fn set_destination(&mut self, agent: AgentId, point: Point) -> bool;

    /// Remaining path distance for the agent's current destination.
    fn remaining_distance(&self, agent: AgentId) -> f32;

    /// The agent's current floor position.
    fn current_position(&self, agent: AgentId) -> Point;

    /// A reachable point roughly `distance` behind the agent's current
    /// heading, or `None` if no such point is traversable.
    fn retreat_point(&self, agent: AgentId, distance: f32) -> Option<Point>;

    /// Sample a candidate idle-roam destination. Used once, at pool
    /// construction.
    fn sample_roam_point(&mut self) -> Option<Point>;

    /// A single known-feasible point, used when roam sampling yields nothing.
    fn fallback_point(&self) -> Point;

    /// Floor position of a shelf, or `None` for an unknown handle.
    fn shelf_location(&self, shelf: ShelfId) -> Option<Point>;
}

/// Stock levels and mutations for the shelves tasks operate on.
pub trait Inventory {
    /// Current stock of a shelf, or `None` for an unknown handle.
    fn current_stock(&self, shelf: ShelfId) -> Option<u32>;

    /// Whether the shelf is at or below its low-stock threshold.
    fn is_low_stock(&self, shelf: ShelfId) -> bool;

    /// Remove up to `quantity` items; returns the new stock level.
    fn remove_stock(&mut self, shelf: ShelfId, quantity: u32) -> u32;

    /// Add `quantity` items; returns the new stock level.
    fn add_stock(&mut self, shelf: ShelfId, quantity: u32) -> u32;

    /// Shelves that crossed their low-stock threshold since the last drain.
    ///
    /// The coordinator consumes this at the top of every tick instead of
    /// subscribing to a re-entrant callback, so queue mutation never happens
    /// mid-iteration.
    fn drain_low_stock(&mut self) -> Vec<ShelfId>;
}

/// Sink for assignment and completion telemetry.
pub trait Telemetry {
    /// A task was handed to an agent.
    fn report_assignment(&mut self, agent: AgentId, task: &Task);

    /// An agent finished its active task.
    ///
    /// `actual_distance` is the path length at assignment time and
    /// `optimal_distance` the straight-line distance, so the ratio measures
    /// routing overhead.
    fn report_completion(
        &mut self,
        agent: AgentId,
        duration_seconds: f64,
        actual_distance: f32,
        optimal_distance: f32,
    );

    /// An agent lost a node contention round and was told to yield.
    fn report_yield(&mut self, agent: AgentId);

    /// An agent was retreated to break a deadlock cluster.
    fn report_deadlock_retreat(&mut self, agent: AgentId);
}
