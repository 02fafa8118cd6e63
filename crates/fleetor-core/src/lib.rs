//! Core types and error definitions for the Fleetor coordination system.
//!
//! This crate provides the foundational types shared across all Fleetor
//! crates: the task model, priority classes, plain geometry, identifier
//! aliases, and the unified error enum.
//!
//! # Main types
//!
//! - [`FleetorError`] — Unified error enum for all Fleetor subsystems.
//! - [`FleetorResult`] — Convenience alias for `Result<T, FleetorError>`.
//! - [`Task`] — A unit of work (delivery order or shelf restock).
//! - [`TaskPriority`] — Priority class driving dispatch scoring.
//! - [`Point`] — 2D warehouse-floor coordinate.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// --- Error types ---

/// Top-level error type for the Fleetor system.
///
/// Each variant corresponds to a subsystem that can produce errors.
#[derive(Debug, thiserror::Error)]
pub enum FleetorError {
    /// An invalid or malformed task.
    #[error("Task error: {0}")]
    Task(String),

    /// An error from the dispatch/coordination loop.
    #[error("Dispatch error: {0}")]
    Dispatch(String),

    /// An error reported by the navigation collaborator.
    #[error("Navigation error: {0}")]
    Navigation(String),

    /// An error reported by the inventory collaborator.
    #[error("Inventory error: {0}")]
    Inventory(String),

    /// An error in configuration parsing or validation.
    #[error("Config error: {0}")]
    Config(String),

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A convenience `Result` alias using [`FleetorError`].
pub type FleetorResult<T> = Result<T, FleetorError>;

// --- Identifiers ---

/// Unique identifier for a task.
pub type TaskId = Uuid;
/// Identifier for a mobile agent in the fleet roster.
pub type AgentId = u64;
/// Handle to a shelf (the shared target resource of orders and restocks).
pub type ShelfId = u32;

// --- Geometry ---

/// A 2D position on the warehouse floor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal coordinate in meters.
    pub x: f32,
    /// Vertical coordinate in meters.
    pub y: f32,
}

impl Point {
    /// Creates a point from raw coordinates.
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance to another point.
    pub fn distance_sq(&self, other: Point) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    /// Euclidean distance to another point.
    pub fn distance(&self, other: Point) -> f32 {
        self.distance_sq(other).sqrt()
    }
}

// --- Task model ---

/// Priority class of a task. Higher classes score higher at equal age.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    /// Background work.
    Low,
    /// Default priority for routine orders.
    Normal,
    /// Expedited work.
    High,
    /// Must be served before anything else of equal age.
    Critical,
}

impl TaskPriority {
    /// Numeric rank used by the priority scorer (Low = 0 .. Critical = 3).
    pub fn rank(self) -> u8 {
        match self {
            TaskPriority::Low => 0,
            TaskPriority::Normal => 1,
            TaskPriority::High => 2,
            TaskPriority::Critical => 3,
        }
    }
}

impl std::fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskPriority::Low => write!(f, "low"),
            TaskPriority::Normal => write!(f, "normal"),
            TaskPriority::High => write!(f, "high"),
            TaskPriority::Critical => write!(f, "critical"),
        }
    }
}

/// Category of work a task represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    /// Pick items from a shelf and deliver them.
    Order,
    /// Bring stock back to a depleted shelf.
    Restock,
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskKind::Order => write!(f, "order"),
            TaskKind::Restock => write!(f, "restock"),
        }
    }
}

/// A unit of work assigned to a fleet agent.
///
/// Tasks are immutable values: created once, destroyed on dequeue when
/// ownership transfers to the assigned agent's active-task slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier, also the deterministic tie-break key.
    pub id: TaskId,
    /// The shelf this task reads from or writes to.
    pub shelf: ShelfId,
    /// Item count; always >= 1 (clamped at construction).
    pub quantity: u32,
    /// Priority class driving the dispatch score.
    pub priority: TaskPriority,
    /// Order or restock.
    pub kind: TaskKind,
    /// Simulation timestamp at creation, in seconds.
    pub created_at: f64,
}

impl Task {
    /// Creates a delivery order for `quantity` items from `shelf`.
    pub fn order(shelf: ShelfId, quantity: u32, priority: TaskPriority, now: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            shelf,
            quantity: quantity.max(1),
            priority,
            kind: TaskKind::Order,
            created_at: now,
        }
    }

    /// Creates a restock task for `shelf`.
    pub fn restock(shelf: ShelfId, quantity: u32, priority: TaskPriority, now: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            shelf,
            quantity: quantity.max(1),
            priority,
            kind: TaskKind::Restock,
            created_at: now,
        }
    }

    /// Age of the task at simulation time `now`, never negative.
    pub fn age(&self, now: f64) -> f64 {
        (now - self.created_at).max(0.0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_quantity_clamped_to_one() {
        let task = Task::order(3, 0, TaskPriority::Normal, 0.0);
        assert_eq!(task.quantity, 1);
        let task = Task::restock(3, 0, TaskPriority::Low, 0.0);
        assert_eq!(task.quantity, 1);
    }

    #[test]
    fn test_age_never_negative() {
        let task = Task::order(1, 5, TaskPriority::High, 10.0);
        assert_eq!(task.age(4.0), 0.0);
        assert_eq!(task.age(12.5), 2.5);
    }

    #[test]
    fn test_priority_ranks() {
        assert_eq!(TaskPriority::Low.rank(), 0);
        assert_eq!(TaskPriority::Normal.rank(), 1);
        assert_eq!(TaskPriority::High.rank(), 2);
        assert_eq!(TaskPriority::Critical.rank(), 3);
    }

    #[test]
    fn test_point_distance() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(3.0, 4.0);
        assert_eq!(a.distance_sq(b), 25.0);
        assert_eq!(a.distance(b), 5.0);
    }

    #[test]
    fn test_task_serialization_round_trip() {
        let task = Task::order(7, 3, TaskPriority::Critical, 1.0);
        let json = serde_json::to_string(&task).unwrap();
        assert!(json.contains("critical"));
        let parsed: Task = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, task);
    }
}
