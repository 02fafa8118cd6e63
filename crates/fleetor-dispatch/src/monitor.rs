//! Fleet-wide metrics collection.
//!
//! [`FleetMonitor`] is the in-repo implementation of the [`Telemetry`]
//! collaborator: per-agent counters plus aggregates, with a JSON snapshot for
//! dashboards.

use std::collections::BTreeMap;

use fleetor_core::{AgentId, Task, TaskKind};
use serde::{Deserialize, Serialize};

use crate::traits::Telemetry;

/// Counters tracked per fleet agent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentMetrics {
    /// Tasks handed to this agent.
    pub assignments: u32,
    /// Delivery orders among those assignments.
    pub order_assignments: u32,
    /// Restocks among those assignments.
    pub restock_assignments: u32,
    /// Tasks completed.
    pub completions: u32,
    /// Contention rounds lost.
    pub yields: u32,
    /// Deadlock retreats performed.
    pub deadlock_retreats: u32,
    /// Seconds spent on completed assignments.
    pub busy_seconds: f64,
    /// Planned path distance over completed assignments.
    pub actual_distance: f32,
    /// Straight-line distance over completed assignments.
    pub optimal_distance: f32,
}

/// Tracks metrics for every agent the coordinator reports on.
#[derive(Debug, Default)]
pub struct FleetMonitor {
    agents: BTreeMap<AgentId, AgentMetrics>,
}

impl FleetMonitor {
    /// Creates an empty monitor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Metrics for one agent, if it has reported anything.
    pub fn agent_metrics(&self, agent: AgentId) -> Option<&AgentMetrics> {
        self.agents.get(&agent)
    }

    /// Sum of all per-agent counters.
    pub fn aggregate(&self) -> AgentMetrics {
        let mut total = AgentMetrics::default();
        for metrics in self.agents.values() {
            total.assignments += metrics.assignments;
            total.order_assignments += metrics.order_assignments;
            total.restock_assignments += metrics.restock_assignments;
            total.completions += metrics.completions;
            total.yields += metrics.yields;
            total.deadlock_retreats += metrics.deadlock_retreats;
            total.busy_seconds += metrics.busy_seconds;
            total.actual_distance += metrics.actual_distance;
            total.optimal_distance += metrics.optimal_distance;
        }
        total
    }

    /// Serializes per-agent and aggregate metrics as JSON.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "agents": self.agents,
            "aggregate": self.aggregate(),
        })
    }

    fn entry(&mut self, agent: AgentId) -> &mut AgentMetrics {
        self.agents.entry(agent).or_default()
    }
}

impl Telemetry for FleetMonitor {
    fn report_assignment(&mut self, agent: AgentId, task: &Task) {
        let metrics = self.entry(agent);
        metrics.assignments += 1;
        match task.kind {
            TaskKind::Order => metrics.order_assignments += 1,
            TaskKind::Restock => metrics.restock_assignments += 1,
        }
    }

    fn report_completion(
        &mut self,
        agent: AgentId,
        duration_seconds: f64,
        actual_distance: f32,
        optimal_distance: f32,
    ) {
        let metrics = self.entry(agent);
        metrics.completions += 1;
        metrics.busy_seconds += duration_seconds;
        metrics.actual_distance += actual_distance;
        metrics.optimal_distance += optimal_distance;
    }

    fn report_yield(&mut self, agent: AgentId) {
        self.entry(agent).yields += 1;
    }

    fn report_deadlock_retreat(&mut self, agent: AgentId) {
        self.entry(agent).deadlock_retreats += 1;
    }
}
