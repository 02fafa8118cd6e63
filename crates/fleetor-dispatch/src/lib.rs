//! Warehouse task dispatch and multi-agent coordination core.
//!
//! Decides which agent does what and when: scores and queues delivery orders
//! and restocks, hands them to available agents, arbitrates idle-roam node
//! contention by right-of-way rank, and detects and breaks deadlock clusters
//! with a retreat-then-resume maneuver. Motion, stock ledgers, and metric
//! rendering live behind the collaborator traits; the core itself is
//! single-threaded and tick-driven.
//!
//! # Main types
//!
//! - [`Coordinator`] — Top-level tick loop owning the roster and every subsystem.
//! - [`Dispatcher`] — Scored task hand-off with the delivery-streak fairness guard.
//! - [`TaskQueue`] — Dual order/restock queues with per-shelf restock dedup.
//! - [`ContentionResolver`] — Rank-based arbitration of idle-roam nodes.
//! - [`DeadlockDetector`] — Movement-history detection of stuck clusters.
//! - [`FleetMonitor`] — In-repo [`Telemetry`] implementation with JSON snapshots.

/// Coordinator and deadlock tuning knobs.
pub mod config;
/// Idle-roam node contention arbitration.
pub mod contention;
/// Top-level coordination loop.
pub mod coordinator;
/// Deadlock detection and retreat-based recovery.
pub mod deadlock;
/// Scored task hand-off and fairness guard.
pub mod dispatcher;
/// Deadline-ordered deferred actions.
pub mod events;
/// Per-agent metrics collection.
pub mod monitor;
/// Idle-roam node pool.
pub mod nodes;
/// Order and restock queues.
pub mod queue;
/// Priority scoring.
pub mod scoring;
/// Collaborator seams (navigation, inventory, telemetry).
pub mod traits;
/// Agent state and per-assignment records.
pub mod types;

pub use config::{CoordinatorConfig, DeadlockConfig};
pub use contention::ContentionResolver;
pub use coordinator::{Coordinator, CoordinatorStats};
pub use deadlock::DeadlockDetector;
pub use dispatcher::Dispatcher;
pub use events::{EventSchedule, ScheduledAction};
pub use monitor::{AgentMetrics, FleetMonitor};
pub use nodes::NodePool;
pub use queue::TaskQueue;
pub use scoring::task_score;
pub use traits::{Inventory, Navigation, Telemetry};
pub use types::{Agent, AgentStatus, AssignmentTelemetry};
