//! Idle-roam node contention.
//!
//! Every `assignment_interval` ticks the resolver collects the roam node each
//! idle agent wants, resolves collisions by right-of-way rank, and issues the
//! winners their destinations. Losers yield for a fixed duration and are
//! excluded from dispatch and contention until the timer expires.

use std::collections::{BTreeMap, HashSet};

use fleetor_core::AgentId;
use tracing::{debug, info};

use crate::config::CoordinatorConfig;
use crate::nodes::NodePool;
use crate::traits::{Navigation, Telemetry};
use crate::types::Agent;

/// Resolves competing claims on idle-roam nodes.
#[derive(Debug)]
pub struct ContentionResolver {
    pool: NodePool,
}

impl ContentionResolver {
    /// Creates a resolver over the given node pool.
    pub fn new(pool: NodePool) -> Self {
        Self { pool }
    }

    /// The node pool this resolver arbitrates.
    pub fn pool(&self) -> &NodePool {
        &self.pool
    }

    /// Runs one contention round. Returns the number of destinations issued.
    pub fn run<N: Navigation, T: Telemetry>(
        &mut self,
        agents: &mut BTreeMap<AgentId, Agent>,
        nav: &mut N,
        telemetry: &mut T,
        config: &CoordinatorConfig,
    ) -> usize {
        // Snapshot of nodes already claimed, taken before any new requests.
        let occupied: HashSet<usize> = agents
            .values()
            .filter_map(|agent| agent.assigned_node)
            .collect();

        // Desired node per idle agent, in ascending agent id order.
        let mut requests: Vec<(AgentId, usize)> = Vec::new();
        for (&agent_id, agent) in agents.iter() {
            if !agent.is_available() {
                continue;
            }
            let position = nav.current_position(agent_id);
            if let Some(node) =
                self.pool
                    .nearest_unoccupied(position, &occupied, config.min_roam_distance)
            {
                requests.push((agent_id, node));
            }
        }

        // First requester provisionally owns a node; later requesters
        // challenge on right-of-way rank. Losers yield.
        let mut owners: BTreeMap<usize, AgentId> = BTreeMap::new();
        for (challenger, node) in requests {
            let Some(&incumbent) = owners.get(&node) else {
                owners.insert(node, challenger);
                continue;
            };
            let challenger_rank = match agents.get(&challenger) {
                Some(agent) => agent.priority_rank,
                None => continue,
            };
            let incumbent_rank = match agents.get(&incumbent) {
                Some(agent) => agent.priority_rank,
                None => continue,
            };
            let loser = if challenger_rank < incumbent_rank {
                owners.insert(node, challenger);
                incumbent
            } else {
                challenger
            };
            if let Some(agent) = agents.get_mut(&loser) {
                agent.begin_yield(config.yield_duration);
            }
            telemetry.report_yield(loser);
            if config.verbose_logging {
                info!(agent = loser, node, "agent yields node contention");
            } else {
                debug!(agent = loser, node, "agent yields node contention");
            }
        }

        // Issue destinations; nodes the navigation rejects stay unclaimed and
        // return to the pool next round.
        let mut issued = 0;
        for (node, agent_id) in owners {
            let Some(point) = self.pool.get(node) else {
                continue;
            };
            let Some(agent) = agents.get_mut(&agent_id) else {
                continue;
            };
            if nav.set_destination(agent_id, point) {
                agent.assigned_node = Some(node);
                agent.destination = Some(point);
                agent.assignment_epoch += 1;
                issued += 1;
                debug!(agent = agent_id, node, "roam destination issued");
            } else {
                agent.assigned_node = None;
                debug!(agent = agent_id, node, "roam destination rejected");
            }
        }
        issued
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use fleetor_core::{Point, ShelfId};
    use std::collections::HashMap;

    use crate::monitor::FleetMonitor;
    use crate::types::AgentStatus;

    struct StubNav {
        positions: HashMap<AgentId, Point>,
        destinations: Vec<(AgentId, Point)>,
        accept: bool,
    }

    impl StubNav {
        fn new(positions: &[(AgentId, Point)]) -> Self {
            Self {
                positions: positions.iter().copied().collect(),
                destinations: Vec::new(),
                accept: true,
            }
        }
    }

    impl Navigation for StubNav {
        fn has_feasible_path(&self, _: Point, _: Point) -> bool {
            true
        }
        fn set_destination(&mut self, agent: AgentId, point: Point) -> bool {
            if self.accept {
                self.destinations.push((agent, point));
            }
            self.accept
        }
        fn remaining_distance(&self, _: AgentId) -> f32 {
            0.0
        }
        fn current_position(&self, agent: AgentId) -> Point {
            self.positions.get(&agent).copied().unwrap_or_default()
        }
        fn retreat_point(&self, _: AgentId, _: f32) -> Option<Point> {
            None
        }
        fn sample_roam_point(&mut self) -> Option<Point> {
            None
        }
        fn fallback_point(&self) -> Point {
            Point::default()
        }
        fn shelf_location(&self, _: ShelfId) -> Option<Point> {
            None
        }
    }

    fn roster(ranks: &[(AgentId, u32)]) -> BTreeMap<AgentId, Agent> {
        ranks
            .iter()
            .map(|&(id, rank)| (id, Agent::new(id, rank)))
            .collect()
    }

    fn config() -> CoordinatorConfig {
        CoordinatorConfig {
            min_roam_distance: 0.0,
            ..CoordinatorConfig::default()
        }
    }

    #[test]
    fn test_lower_rank_wins_collision_and_loser_yields() {
        // Single node: both agents must request it.
        let mut resolver = ContentionResolver::new(NodePool::from_points(vec![Point::new(
            10.0, 0.0,
        )]));
        let mut agents = roster(&[(1, 1), (2, 2)]);
        let mut nav = StubNav::new(&[(1, Point::new(0.0, 0.0)), (2, Point::new(1.0, 0.0))]);
        let mut monitor = FleetMonitor::new();

        let issued = resolver.run(&mut agents, &mut nav, &mut monitor, &config());

        assert_eq!(issued, 1);
        assert_eq!(agents[&1].assigned_node, Some(0));
        assert_eq!(agents[&2].status, AgentStatus::Yielding);
        assert!(agents[&2].assigned_node.is_none());
        assert_eq!(monitor.agent_metrics(2).unwrap().yields, 1);
        assert_eq!(nav.destinations, vec![(1, Point::new(10.0, 0.0))]);
    }

    #[test]
    fn test_higher_rank_challenger_displaces_provisional_owner() {
        let mut resolver =
            ContentionResolver::new(NodePool::from_points(vec![Point::new(10.0, 0.0)]));
        // Agent 1 requests first (lower id) but has the worse rank.
        let mut agents = roster(&[(1, 5), (2, 0)]);
        let mut nav = StubNav::new(&[(1, Point::new(0.0, 0.0)), (2, Point::new(1.0, 0.0))]);
        let mut monitor = FleetMonitor::new();

        resolver.run(&mut agents, &mut nav, &mut monitor, &config());

        assert_eq!(agents[&2].assigned_node, Some(0));
        assert_eq!(agents[&1].status, AgentStatus::Yielding);
    }

    #[test]
    fn test_yielding_agents_do_not_request() {
        let mut resolver =
            ContentionResolver::new(NodePool::from_points(vec![Point::new(10.0, 0.0)]));
        let mut agents = roster(&[(1, 1)]);
        agents.get_mut(&1).unwrap().begin_yield(2.0);
        let mut nav = StubNav::new(&[(1, Point::new(0.0, 0.0))]);
        let mut monitor = FleetMonitor::new();

        let issued = resolver.run(&mut agents, &mut nav, &mut monitor, &config());
        assert_eq!(issued, 0);
    }

    #[test]
    fn test_rejected_destination_releases_node() {
        let mut resolver =
            ContentionResolver::new(NodePool::from_points(vec![Point::new(10.0, 0.0)]));
        let mut agents = roster(&[(1, 1)]);
        let mut nav = StubNav::new(&[(1, Point::new(0.0, 0.0))]);
        nav.accept = false;
        let mut monitor = FleetMonitor::new();

        let issued = resolver.run(&mut agents, &mut nav, &mut monitor, &config());
        assert_eq!(issued, 0);
        assert!(agents[&1].assigned_node.is_none());
    }

    #[test]
    fn test_occupied_nodes_excluded_from_requests() {
        let mut resolver = ContentionResolver::new(NodePool::from_points(vec![
            Point::new(10.0, 0.0),
            Point::new(20.0, 0.0),
        ]));
        let mut agents = roster(&[(1, 1), (2, 2)]);
        // Agent 1 already claims node 0; agent 2 must pick node 1.
        agents.get_mut(&1).unwrap().status = AgentStatus::Moving;
        agents.get_mut(&1).unwrap().assigned_node = Some(0);
        let mut nav = StubNav::new(&[(2, Point::new(0.0, 0.0))]);
        let mut monitor = FleetMonitor::new();

        resolver.run(&mut agents, &mut nav, &mut monitor, &config());
        assert_eq!(agents[&2].assigned_node, Some(1));
    }
}
