//! Deadlock detection and recovery.
//!
//! The detector keeps a per-agent movement history and, on each sweep,
//! reports clusters of agents that have all stopped moving near each other.
//! The resolver breaks a cluster by retreating its best-ranked member and
//! scheduling a deferred resume of its original destination.

use std::collections::{BTreeMap, HashMap};

use fleetor_core::{AgentId, Point};
use tracing::{debug, info, warn};

use crate::config::DeadlockConfig;
use crate::events::{EventSchedule, ScheduledAction};
use crate::traits::{Navigation, Telemetry};
use crate::types::Agent;

#[derive(Debug, Clone, Copy)]
struct MovementSample {
    position: Point,
    last_movement: f64,
}

/// Finds clusters of mutually blocking agents.
///
/// The movement history persists across sweeps; everything else is derived
/// per sweep.
#[derive(Debug, Default)]
pub struct DeadlockDetector {
    samples: HashMap<AgentId, MovementSample>,
}

impl DeadlockDetector {
    /// Creates a detector with no movement history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs one detection sweep at simulation time `now`.
    ///
    /// Returns the agents that are stuck and within `cluster_distance` of at
    /// least one other stuck agent; empty unless that set has two or more
    /// members. Agents observed for the first time are seeded and never
    /// reported on the same sweep.
    pub fn detect<N: Navigation>(
        &mut self,
        now: f64,
        agents: &BTreeMap<AgentId, Agent>,
        nav: &N,
        config: &DeadlockConfig,
    ) -> Vec<AgentId> {
        let mut stuck: Vec<(AgentId, Point)> = Vec::new();

        for &agent_id in agents.keys() {
            let position = nav.current_position(agent_id);
            match self.samples.get_mut(&agent_id) {
                None => {
                    self.samples.insert(
                        agent_id,
                        MovementSample {
                            position,
                            last_movement: now,
                        },
                    );
                }
                Some(sample) => {
                    if position.distance(sample.position) > config.movement_threshold {
                        sample.position = position;
                        sample.last_movement = now;
                    } else if now - sample.last_movement >= config.stuck_duration {
                        stuck.push((agent_id, position));
                    }
                }
            }
        }

        // Drop history for agents no longer in the roster.
        self.samples.retain(|agent_id, _| agents.contains_key(agent_id));

        // A stuck agent only counts when another stuck agent is close by;
        // isolated stalls are navigation problems, not deadlocks.
        let cluster: Vec<AgentId> = stuck
            .iter()
            .filter(|(agent_id, position)| {
                stuck.iter().any(|(other_id, other_position)| {
                    other_id != agent_id
                        && position.distance(*other_position) <= config.cluster_distance
                })
            })
            .map(|&(agent_id, _)| agent_id)
            .collect();

        if cluster.len() >= 2 {
            info!(agents = ?cluster, "deadlock cluster detected");
            cluster
        } else {
            Vec::new()
        }
    }

    /// Drops all movement history.
    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

/// Breaks a stuck cluster by retreating one member.
///
/// The victim is the member with the numerically lowest right-of-way rank
/// (ties: lowest agent id). It is sent `retreat_distance` opposite its
/// heading; a [`ScheduledAction::ResumeDestination`] restores its original
/// destination after `resume_delay`, unless a new assignment lands first.
///
/// Returns the retreated agent, or `None` when no valid retreat point exists
/// this cycle (resolution is deferred to the next sweep).
pub fn resolve_cluster<N: Navigation, T: Telemetry>(
    cluster: &[AgentId],
    now: f64,
    agents: &mut BTreeMap<AgentId, Agent>,
    nav: &mut N,
    telemetry: &mut T,
    events: &mut EventSchedule,
    config: &DeadlockConfig,
) -> Option<AgentId> {
    let victim_id = cluster
        .iter()
        .filter_map(|id| agents.get(id).map(|agent| (agent.priority_rank, *id)))
        .min()?
        .1;

    let Some(retreat) = nav.retreat_point(victim_id, config.retreat_distance) else {
        warn!(agent = victim_id, "no valid retreat point, deferring deadlock resolution");
        return None;
    };
    if !nav.set_destination(victim_id, retreat) {
        warn!(agent = victim_id, "retreat destination rejected, deferring");
        return None;
    }

    let agent = agents.get_mut(&victim_id)?;
    if let Some(original) = agent.destination {
        events.schedule(
            now + config.resume_delay,
            ScheduledAction::ResumeDestination {
                agent: victim_id,
                destination: original,
                epoch: agent.assignment_epoch,
            },
        );
    }
    telemetry.report_deadlock_retreat(victim_id);
    debug!(
        agent = victim_id,
        x = retreat.x,
        y = retreat.y,
        "deadlock victim retreating"
    );
    Some(victim_id)
}
