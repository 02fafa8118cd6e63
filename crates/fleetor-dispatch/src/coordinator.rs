//! The top-level coordination core.
//!
//! [`Coordinator`] owns the agent roster, the dispatcher, the contention
//! resolver, the deadlock detector, and the deferred-action schedule, and
//! advances all of them from a single synchronous [`tick`](Coordinator::tick).
//! The host drives the clock; the coordinator never sleeps or spawns.

use std::collections::BTreeMap;

use fleetor_core::{
    AgentId, FleetorError, FleetorResult, ShelfId, Task, TaskId, TaskPriority,
};
use tracing::{debug, info};

use crate::config::CoordinatorConfig;
use crate::contention::ContentionResolver;
use crate::deadlock::{resolve_cluster, DeadlockDetector};
use crate::dispatcher::Dispatcher;
use crate::events::{EventSchedule, ScheduledAction};
use crate::nodes::NodePool;
use crate::traits::{Inventory, Navigation, Telemetry};
use crate::types::{Agent, AgentStatus};

/// Aggregate tick-loop counters, separate from per-agent telemetry.
#[derive(Debug, Clone, Copy, Default)]
pub struct CoordinatorStats {
    /// Ticks processed since construction.
    pub ticks: u64,
    /// Tasks handed to agents.
    pub assignments: u64,
    /// Tasks completed by agents.
    pub completions: u64,
    /// Deadlock clusters broken.
    pub deadlocks_resolved: u64,
}

/// Single-threaded warehouse coordination core.
///
/// Generic over its three collaborator seams so hosts can plug in a real
/// navigation stack or the simulation used in tests.
pub struct Coordinator<N, I, T> {
    config: CoordinatorConfig,
    nav: N,
    inventory: I,
    telemetry: T,
    agents: BTreeMap<AgentId, Agent>,
    dispatcher: Dispatcher,
    contention: ContentionResolver,
    detector: DeadlockDetector,
    events: EventSchedule,
    stats: CoordinatorStats,
    now: f64,
    tick_count: u64,
    last_deadlock_check: f64,
}

impl<N: Navigation, I: Inventory, T: Telemetry> Coordinator<N, I, T> {
    /// Builds a coordinator, validating the config and sampling the roam
    /// node pool from the navigation collaborator.
    pub fn new(
        config: CoordinatorConfig,
        mut nav: N,
        inventory: I,
        telemetry: T,
    ) -> FleetorResult<Self> {
        config.validate()?;
        let pool = NodePool::build(&mut nav, config.roam_node_count);
        info!(
            nodes = pool.len(),
            assignment_interval = config.assignment_interval,
            "coordinator initialized"
        );
        Ok(Self {
            config,
            nav,
            inventory,
            telemetry,
            agents: BTreeMap::new(),
            dispatcher: Dispatcher::new(),
            contention: ContentionResolver::new(pool),
            detector: DeadlockDetector::new(),
            events: EventSchedule::new(),
            stats: CoordinatorStats::default(),
            now: 0.0,
            tick_count: 0,
            last_deadlock_check: 0.0,
        })
    }

    /// Adds an agent to the roster. Re-registering an id resets its state.
    pub fn register_agent(&mut self, id: AgentId, priority_rank: u32) {
        debug!(agent = id, rank = priority_rank, "agent registered");
        self.agents.insert(id, Agent::new(id, priority_rank));
    }

    /// Removes an agent; its active task, if any, is requeued.
    pub fn remove_agent(&mut self, id: AgentId) -> FleetorResult<()> {
        let agent = self
            .agents
            .remove(&id)
            .ok_or_else(|| FleetorError::Dispatch(format!("unknown agent {id}")))?;
        if let Some(task) = agent.active_task {
            debug!(agent = id, task_id = %task.id, "requeueing task from removed agent");
            self.dispatcher.requeue(task);
        }
        Ok(())
    }

    /// Queues a delivery order and returns its id.
    pub fn enqueue_order(
        &mut self,
        shelf: ShelfId,
        quantity: u32,
        priority: TaskPriority,
    ) -> TaskId {
        let task = Task::order(shelf, quantity, priority, self.now);
        let id = task.id;
        debug!(task_id = %id, shelf, %priority, "order queued");
        self.dispatcher.enqueue_order(task);
        id
    }

    /// Queues a restock for `shelf`; returns false when one is already
    /// pending for it.
    pub fn enqueue_restock(&mut self, shelf: ShelfId, priority: TaskPriority) -> bool {
        let task = Task::restock(shelf, self.config.restock_batch_size, priority, self.now);
        self.dispatcher.enqueue_restock(task)
    }

    /// Advances the core by `delta` simulation seconds and runs every
    /// subsystem that is due.
    pub fn tick(&mut self, delta: f64) {
        self.now += delta;
        self.tick_count += 1;
        self.stats.ticks += 1;

        for agent in self.agents.values_mut() {
            if agent.tick_yield(delta) {
                debug!(agent = agent.id, "yield expired");
            }
        }

        for action in self.events.drain_due(self.now) {
            self.apply_action(action);
        }

        // Low-stock notifications accumulated since the last tick become
        // restock tasks before dispatch runs, so they compete this round.
        for shelf in self.inventory.drain_low_stock() {
            let task = Task::restock(
                shelf,
                self.config.restock_batch_size,
                TaskPriority::High,
                self.now,
            );
            if self.dispatcher.enqueue_restock(task) {
                debug!(shelf, "low stock reported, restock queued");
            }
        }

        let assigned = self.dispatcher.run(
            self.now,
            &mut self.agents,
            &mut self.nav,
            &self.inventory,
            &mut self.telemetry,
            &self.config,
        );
        self.stats.assignments += assigned as u64;

        if self.tick_count % u64::from(self.config.assignment_interval) == 0 {
            self.contention.run(
                &mut self.agents,
                &mut self.nav,
                &mut self.telemetry,
                &self.config,
            );
        }

        if self.now - self.last_deadlock_check >= self.config.deadlock.check_interval {
            self.last_deadlock_check = self.now;
            let cluster =
                self.detector
                    .detect(self.now, &self.agents, &self.nav, &self.config.deadlock);
            if !cluster.is_empty() {
                let resolved = resolve_cluster(
                    &cluster,
                    self.now,
                    &mut self.agents,
                    &mut self.nav,
                    &mut self.telemetry,
                    &mut self.events,
                    &self.config.deadlock,
                );
                if resolved.is_some() {
                    self.stats.deadlocks_resolved += 1;
                }
            }
        }
    }

    /// Reports that `agent` finished its active task.
    ///
    /// The host calls this when the physical work (travel plus pick or
    /// place) is done; stock mutation and telemetry happen here.
    pub fn on_agent_task_completed(&mut self, agent_id: AgentId) -> FleetorResult<()> {
        let agent = self
            .agents
            .get_mut(&agent_id)
            .ok_or_else(|| FleetorError::Dispatch(format!("unknown agent {agent_id}")))?;
        let task = agent.active_task.take().ok_or_else(|| {
            FleetorError::Dispatch(format!("agent {agent_id} has no active task"))
        })?;
        self.dispatcher.complete(
            self.now,
            agent,
            task,
            &mut self.inventory,
            &mut self.telemetry,
            &self.config,
        );
        self.stats.completions += 1;
        Ok(())
    }

    /// Updates the working phase of a busy agent (moving, picking,
    /// delivering), as observed by the host.
    pub fn set_agent_phase(&mut self, agent_id: AgentId, status: AgentStatus) -> FleetorResult<()> {
        let agent = self
            .agents
            .get_mut(&agent_id)
            .ok_or_else(|| FleetorError::Dispatch(format!("unknown agent {agent_id}")))?;
        if agent.active_task.is_none() {
            return Err(FleetorError::Dispatch(format!(
                "agent {agent_id} has no active task to phase"
            )));
        }
        // A task holder stays in a working phase; Idle and Yielding are
        // reserved for the coordinator's own transitions.
        if !matches!(
            status,
            AgentStatus::Moving | AgentStatus::Picking | AgentStatus::Delivering
        ) {
            return Err(FleetorError::Dispatch(format!(
                "agent {agent_id} holds a task and cannot be phased to {status:?}"
            )));
        }
        agent.status = status;
        Ok(())
    }

    /// Toggles per-assignment info logging at runtime.
    pub fn set_verbose_logging(&mut self, verbose: bool) {
        self.config.verbose_logging = verbose;
    }

    /// Drops all queued work, pending events, and movement history. Agents
    /// stay registered but lose their assignments.
    pub fn shutdown(&mut self) {
        info!(
            pending_orders = self.dispatcher.pending_orders(),
            pending_restocks = self.dispatcher.pending_restocks(),
            "coordinator shutting down"
        );
        self.dispatcher.clear();
        self.events.clear();
        self.detector.clear();
        for agent in self.agents.values_mut() {
            agent.status = AgentStatus::Idle;
            agent.active_task = None;
            agent.assigned_node = None;
            agent.destination = None;
        }
    }

    /// Current simulation time.
    pub fn now(&self) -> f64 {
        self.now
    }

    /// Aggregate tick-loop counters.
    pub fn stats(&self) -> CoordinatorStats {
        self.stats
    }

    /// Immutable view of one agent.
    pub fn agent(&self, id: AgentId) -> Option<&Agent> {
        self.agents.get(&id)
    }

    /// The full roster in id order.
    pub fn agents(&self) -> impl Iterator<Item = &Agent> + '_ {
        self.agents.values()
    }

    /// Number of queued delivery orders.
    pub fn pending_orders(&self) -> usize {
        self.dispatcher.pending_orders()
    }

    /// Number of queued restocks.
    pub fn pending_restocks(&self) -> usize {
        self.dispatcher.pending_restocks()
    }

    /// Number of assignments currently in flight.
    pub fn active_assignments(&self) -> usize {
        self.dispatcher.active_assignments()
    }

    /// Number of agents currently sitting out a yield timer.
    pub fn yielding_agents(&self) -> usize {
        self.agents
            .values()
            .filter(|agent| agent.status == AgentStatus::Yielding)
            .count()
    }

    /// The telemetry collaborator, for reading metrics back out.
    pub fn telemetry(&self) -> &T {
        &self.telemetry
    }

    /// The inventory collaborator.
    pub fn inventory(&self) -> &I {
        &self.inventory
    }

    /// Mutable access to the inventory collaborator, for the host to apply
    /// external stock movements between ticks.
    pub fn inventory_mut(&mut self) -> &mut I {
        &mut self.inventory
    }

    /// The navigation collaborator.
    pub fn nav(&self) -> &N {
        &self.nav
    }

    /// Mutable access to the navigation collaborator, for the host to step
    /// its motion model between ticks.
    pub fn nav_mut(&mut self) -> &mut N {
        &mut self.nav
    }

    /// The active configuration.
    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    fn apply_action(&mut self, action: ScheduledAction) {
        match action {
            ScheduledAction::ResumeDestination {
                agent: agent_id,
                destination,
                epoch,
            } => {
                let Some(agent) = self.agents.get_mut(&agent_id) else {
                    return;
                };
                // A newer assignment supersedes the resume.
                if agent.assignment_epoch != epoch {
                    debug!(agent = agent_id, "resume cancelled by newer assignment");
                    return;
                }
                if self.nav.set_destination(agent_id, destination) {
                    agent.destination = Some(destination);
                    debug!(
                        agent = agent_id,
                        x = destination.x,
                        y = destination.y,
                        "destination resumed after retreat"
                    );
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use fleetor_core::Point;
    use std::collections::HashMap;

    use crate::monitor::FleetMonitor;

    #[derive(Default)]
    struct SimNav {
        positions: HashMap<AgentId, Point>,
        shelves: HashMap<ShelfId, Point>,
        destinations: Vec<(AgentId, Point)>,
    }

    impl SimNav {
        fn with_shelf(shelf: ShelfId, point: Point) -> Self {
            let mut nav = Self::default();
            nav.shelves.insert(shelf, point);
            nav
        }
    }

    impl Navigation for SimNav {
        fn has_feasible_path(&self, _: Point, _: Point) -> bool {
            true
        }
        fn set_destination(&mut self, agent: AgentId, point: Point) -> bool {
            self.destinations.push((agent, point));
            true
        }
        fn remaining_distance(&self, _: AgentId) -> f32 {
            0.0
        }
        fn current_position(&self, agent: AgentId) -> Point {
            self.positions.get(&agent).copied().unwrap_or_default()
        }
        fn retreat_point(&self, _: AgentId, _: f32) -> Option<Point> {
            Some(Point::new(-3.0, 0.0))
        }
        fn sample_roam_point(&mut self) -> Option<Point> {
            None
        }
        fn fallback_point(&self) -> Point {
            Point::default()
        }
        fn shelf_location(&self, shelf: ShelfId) -> Option<Point> {
            self.shelves.get(&shelf).copied()
        }
    }

    #[derive(Default)]
    struct SimInventory {
        stock: HashMap<ShelfId, u32>,
        threshold: u32,
        low_stock: Vec<ShelfId>,
    }

    impl Inventory for SimInventory {
        fn current_stock(&self, shelf: ShelfId) -> Option<u32> {
            self.stock.get(&shelf).copied()
        }
        fn is_low_stock(&self, shelf: ShelfId) -> bool {
            self.stock
                .get(&shelf)
                .is_some_and(|&level| level <= self.threshold)
        }
        fn remove_stock(&mut self, shelf: ShelfId, quantity: u32) -> u32 {
            let level = self.stock.entry(shelf).or_insert(0);
            *level = level.saturating_sub(quantity);
            *level
        }
        fn add_stock(&mut self, shelf: ShelfId, quantity: u32) -> u32 {
            let level = self.stock.entry(shelf).or_insert(0);
            *level += quantity;
            *level
        }
        fn drain_low_stock(&mut self) -> Vec<ShelfId> {
            std::mem::take(&mut self.low_stock)
        }
    }

    fn coordinator(
        nav: SimNav,
        inventory: SimInventory,
    ) -> Coordinator<SimNav, SimInventory, FleetMonitor> {
        Coordinator::new(
            CoordinatorConfig::default(),
            nav,
            inventory,
            FleetMonitor::new(),
        )
        .unwrap()
    }

    #[test]
    fn test_order_assigned_on_next_tick() {
        let nav = SimNav::with_shelf(1, Point::new(10.0, 0.0));
        let mut inventory = SimInventory::default();
        inventory.stock.insert(1, 50);
        let mut core = coordinator(nav, inventory);
        core.register_agent(1, 0);

        core.enqueue_order(1, 5, TaskPriority::Normal);
        core.tick(0.1);

        let agent = core.agent(1).unwrap();
        assert_eq!(agent.status, AgentStatus::Moving);
        assert!(agent.active_task.is_some());
        assert_eq!(core.pending_orders(), 0);
        assert_eq!(core.stats().assignments, 1);
    }

    #[test]
    fn test_completion_flow_updates_stock_and_metrics() {
        let nav = SimNav::with_shelf(1, Point::new(10.0, 0.0));
        let mut inventory = SimInventory::default();
        inventory.stock.insert(1, 50);
        inventory.threshold = 10;
        let mut core = coordinator(nav, inventory);
        core.register_agent(1, 0);

        core.enqueue_order(1, 5, TaskPriority::Normal);
        core.tick(0.1);
        core.set_agent_phase(1, AgentStatus::Picking).unwrap();
        core.tick(0.1);
        core.on_agent_task_completed(1).unwrap();

        assert_eq!(core.inventory().current_stock(1), Some(45));
        assert!(core.agent(1).unwrap().is_available());
        assert_eq!(core.telemetry().aggregate().completions, 1);
        assert_eq!(core.stats().completions, 1);
    }

    #[test]
    fn test_phase_cannot_sideline_a_task_holder() {
        let nav = SimNav::with_shelf(1, Point::new(10.0, 0.0));
        let mut inventory = SimInventory::default();
        inventory.stock.insert(1, 50);
        let mut core = coordinator(nav, inventory);
        core.register_agent(1, 0);
        core.enqueue_order(1, 5, TaskPriority::Normal);
        core.tick(0.1);

        assert!(core.set_agent_phase(1, AgentStatus::Idle).is_err());
        assert!(core.set_agent_phase(1, AgentStatus::Yielding).is_err());
        // The working phases remain reachable.
        assert!(core.set_agent_phase(1, AgentStatus::Delivering).is_ok());
        assert_eq!(core.agent(1).unwrap().status, AgentStatus::Delivering);
    }

    #[test]
    fn test_completion_without_task_is_error() {
        let nav = SimNav::default();
        let mut core = coordinator(nav, SimInventory::default());
        core.register_agent(1, 0);
        assert!(core.on_agent_task_completed(1).is_err());
        assert!(core.on_agent_task_completed(99).is_err());
    }

    #[test]
    fn test_drained_low_stock_becomes_single_restock() {
        let nav = SimNav::with_shelf(7, Point::new(5.0, 5.0));
        let mut inventory = SimInventory::default();
        inventory.stock.insert(7, 3);
        inventory.threshold = 10;
        // Shelf reported twice before the tick runs.
        inventory.low_stock = vec![7, 7];
        let mut core = coordinator(nav, inventory);

        core.tick(0.1);
        // No agents registered: the restock stays queued, deduplicated.
        assert_eq!(core.pending_restocks(), 1);
    }

    #[test]
    fn test_resume_after_retreat_unless_reassigned() {
        let mut nav = SimNav::with_shelf(1, Point::new(10.0, 0.0));
        nav.positions.insert(1, Point::new(0.0, 0.0));
        nav.positions.insert(2, Point::new(0.5, 0.0));
        let mut inventory = SimInventory::default();
        inventory.stock.insert(1, 50);
        let mut core = coordinator(nav, inventory);
        core.register_agent(1, 0);
        core.register_agent(2, 1);

        // Both agents get orders and then sit still long enough to form a
        // deadlock cluster.
        core.enqueue_order(1, 5, TaskPriority::Normal);
        core.enqueue_order(1, 5, TaskPriority::Normal);
        core.tick(0.1);
        assert!(core.agent(1).unwrap().active_task.is_some());
        assert!(core.agent(2).unwrap().active_task.is_some());

        let stuck_window =
            core.config().deadlock.check_interval + core.config().deadlock.stuck_duration;
        let mut elapsed = 0.0;
        while elapsed < stuck_window + 1.0 {
            core.tick(1.0);
            elapsed += 1.0;
        }
        assert_eq!(core.stats().deadlocks_resolved, 1);
        // Agent 1 holds the numerically lowest rank, so it retreated.
        let retreats = core.telemetry().agent_metrics(1).unwrap().deadlock_retreats;
        assert_eq!(retreats, 1);

        // The resume fires within resume_delay of the retreat.
        core.tick(core.config().deadlock.resume_delay);
        let last = core.nav().destinations.last().copied().unwrap();
        assert_eq!(last, (1, Point::new(10.0, 0.0)));
    }

    #[test]
    fn test_shutdown_clears_queues_and_assignments() {
        let nav = SimNav::with_shelf(1, Point::new(10.0, 0.0));
        let mut inventory = SimInventory::default();
        inventory.stock.insert(1, 50);
        let mut core = coordinator(nav, inventory);
        core.register_agent(1, 0);
        core.enqueue_order(1, 5, TaskPriority::Normal);
        core.enqueue_order(1, 5, TaskPriority::Normal);
        core.tick(0.1);

        core.shutdown();
        assert_eq!(core.pending_orders(), 0);
        assert!(core.agent(1).unwrap().is_available());
    }

    #[test]
    fn test_remove_agent_requeues_active_task() {
        let nav = SimNav::with_shelf(1, Point::new(10.0, 0.0));
        let mut inventory = SimInventory::default();
        inventory.stock.insert(1, 50);
        let mut core = coordinator(nav, inventory);
        core.register_agent(1, 0);
        core.enqueue_order(1, 5, TaskPriority::Normal);
        core.tick(0.1);
        assert_eq!(core.pending_orders(), 0);

        core.remove_agent(1).unwrap();
        assert_eq!(core.pending_orders(), 1);
        assert!(core.agent(1).is_none());
    }
}
