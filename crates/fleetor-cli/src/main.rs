//! Warehouse simulation driver for the Fleetor coordination core.

mod world;

use std::collections::HashMap;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use fleetor_core::{AgentId, FleetorError, FleetorResult, Point, TaskPriority};
use fleetor_dispatch::{AgentStatus, Coordinator, CoordinatorConfig, FleetMonitor};
use serde::Deserialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use world::{GridWorld, Rng, SimInventory};

#[derive(Parser)]
#[command(name = "fleetor", about = "Fleetor — warehouse dispatch simulation")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "fleetor.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the simulation
    Run {
        /// Number of ticks to simulate (overrides config)
        #[arg(short, long)]
        ticks: Option<u64>,
        /// Pace ticks against the wall clock instead of running flat out
        #[arg(long)]
        real_time: bool,
        /// Log every assignment and yield at info level
        #[arg(short, long)]
        verbose: bool,
    },
    /// Check the config file and exit
    Validate,
}

#[derive(Deserialize, Default)]
struct FleetorConfig {
    #[serde(default)]
    coordinator: CoordinatorConfig,
    #[serde(default)]
    simulation: SimulationConfig,
}

#[derive(Deserialize)]
struct SimulationConfig {
    #[serde(default = "default_agents")]
    agents: u64,
    #[serde(default = "default_shelf_count")]
    shelf_count: u32,
    #[serde(default = "default_width")]
    width: f32,
    #[serde(default = "default_height")]
    height: f32,
    #[serde(default = "default_agent_speed")]
    agent_speed: f32,
    #[serde(default = "default_initial_stock")]
    initial_stock: u32,
    #[serde(default = "default_low_stock_threshold")]
    low_stock_threshold: u32,
    #[serde(default = "default_order_interval_ticks")]
    order_interval_ticks: u64,
    #[serde(default = "default_max_order_quantity")]
    max_order_quantity: u32,
    #[serde(default = "default_handling_ticks")]
    handling_ticks: u32,
    #[serde(default = "default_tick_seconds")]
    tick_seconds: f64,
    #[serde(default = "default_ticks")]
    ticks: u64,
    #[serde(default = "default_seed")]
    seed: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            agents: default_agents(),
            shelf_count: default_shelf_count(),
            width: default_width(),
            height: default_height(),
            agent_speed: default_agent_speed(),
            initial_stock: default_initial_stock(),
            low_stock_threshold: default_low_stock_threshold(),
            order_interval_ticks: default_order_interval_ticks(),
            max_order_quantity: default_max_order_quantity(),
            handling_ticks: default_handling_ticks(),
            tick_seconds: default_tick_seconds(),
            ticks: default_ticks(),
            seed: default_seed(),
        }
    }
}

fn default_agents() -> u64 {
    4
}
fn default_shelf_count() -> u32 {
    8
}
fn default_width() -> f32 {
    40.0
}
fn default_height() -> f32 {
    30.0
}
fn default_agent_speed() -> f32 {
    1.5
}
fn default_initial_stock() -> u32 {
    100
}
fn default_low_stock_threshold() -> u32 {
    20
}
fn default_order_interval_ticks() -> u64 {
    4
}
fn default_max_order_quantity() -> u32 {
    8
}
fn default_handling_ticks() -> u32 {
    3
}
fn default_tick_seconds() -> f64 {
    0.5
}
fn default_ticks() -> u64 {
    600
}
fn default_seed() -> u64 {
    1
}

impl SimulationConfig {
    /// Rejects world parameters the simulation cannot run with.
    fn validate(&self) -> FleetorResult<()> {
        if self.agents == 0 {
            return Err(FleetorError::Config("agents must be >= 1".to_string()));
        }
        if self.shelf_count == 0 {
            return Err(FleetorError::Config("shelf_count must be >= 1".to_string()));
        }
        if self.max_order_quantity == 0 {
            return Err(FleetorError::Config(
                "max_order_quantity must be >= 1".to_string(),
            ));
        }
        if self.order_interval_ticks == 0 {
            return Err(FleetorError::Config(
                "order_interval_ticks must be >= 1".to_string(),
            ));
        }
        if self.tick_seconds <= 0.0 {
            return Err(FleetorError::Config(
                "tick_seconds must be positive".to_string(),
            ));
        }
        if self.width <= 0.0 || self.height <= 0.0 {
            return Err(FleetorError::Config(
                "floor dimensions must be positive".to_string(),
            ));
        }
        if self.agent_speed <= 0.0 {
            return Err(FleetorError::Config(
                "agent_speed must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    let cli = Cli::parse();

    let config = if cli.config.exists() {
        let raw = tokio::fs::read_to_string(&cli.config).await.map_err(|e| {
            anyhow::anyhow!("Failed to read config file '{}': {}", cli.config.display(), e)
        })?;
        toml::from_str::<FleetorConfig>(&raw)?
    } else {
        info!(path = %cli.config.display(), "no config file, using defaults");
        FleetorConfig::default()
    };

    config.coordinator.validate()?;
    config.simulation.validate()?;

    match cli.command {
        Commands::Validate => {
            info!("config ok");
            Ok(())
        }
        Commands::Run {
            ticks,
            real_time,
            verbose,
        } => {
            let ticks = ticks.unwrap_or(config.simulation.ticks);
            run(config, ticks, real_time, verbose).await
        }
    }
}

async fn run(config: FleetorConfig, ticks: u64, real_time: bool, verbose: bool) -> anyhow::Result<()> {
    let sim = config.simulation;
    let mut world = GridWorld::new(
        sim.width,
        sim.height,
        sim.shelf_count,
        sim.agent_speed,
        sim.seed,
    );
    // Agents start spread along the bottom edge.
    for agent in 0..sim.agents {
        let frac = (agent + 1) as f32 / (sim.agents + 1) as f32;
        world.spawn_agent(agent, Point::new(frac * sim.width, 1.0));
    }
    let mut shelves = world.shelf_ids();
    shelves.sort_unstable();
    let inventory = SimInventory::new(&shelves, sim.initial_stock, sim.low_stock_threshold);

    let mut core = Coordinator::new(config.coordinator, world, inventory, FleetMonitor::new())?;
    core.set_verbose_logging(verbose);
    for agent in 0..sim.agents {
        core.register_agent(agent, agent as u32);
    }
    info!(
        agents = sim.agents,
        shelves = shelves.len(),
        ticks,
        "simulation starting"
    );

    let mut rng = Rng::new(sim.seed.wrapping_add(1));
    let mut handling: HashMap<AgentId, u32> = HashMap::new();

    for tick in 0..ticks {
        if tick % sim.order_interval_ticks == 0 {
            let shelf = shelves[rng.next_below(shelves.len() as u64) as usize];
            let quantity = 1 + rng.next_below(u64::from(sim.max_order_quantity)) as u32;
            let priority = match rng.next_below(100) {
                0..=9 => TaskPriority::Critical,
                10..=34 => TaskPriority::High,
                35..=84 => TaskPriority::Normal,
                _ => TaskPriority::Low,
            };
            core.enqueue_order(shelf, quantity, priority);
        }

        core.tick(sim.tick_seconds);
        core.nav_mut().step(sim.tick_seconds);

        // Agents that reached a task shelf start handling it; handling takes
        // a fixed number of ticks before the task counts as complete.
        let arrived: Vec<AgentId> = core
            .agents()
            .filter(|agent| {
                agent.status == AgentStatus::Moving
                    && agent.active_task.is_some()
                    && core.nav().arrived(agent.id)
            })
            .map(|agent| agent.id)
            .collect();
        for agent in arrived {
            core.set_agent_phase(agent, AgentStatus::Picking)?;
            handling.insert(agent, sim.handling_ticks);
        }

        let done: Vec<AgentId> = handling
            .iter_mut()
            .filter_map(|(&agent, remaining)| {
                *remaining = remaining.saturating_sub(1);
                (*remaining == 0).then_some(agent)
            })
            .collect();
        for agent in done {
            handling.remove(&agent);
            core.on_agent_task_completed(agent)?;
        }

        if real_time {
            tokio::time::sleep(std::time::Duration::from_secs_f64(sim.tick_seconds)).await;
        }
    }

    core.shutdown();
    let stats = core.stats();
    info!(
        ticks = stats.ticks,
        assignments = stats.assignments,
        completions = stats.completions,
        deadlocks_resolved = stats.deadlocks_resolved,
        pending_orders = core.pending_orders(),
        "simulation finished"
    );
    let report = serde_json::json!({
        "stats": {
            "ticks": stats.ticks,
            "assignments": stats.assignments,
            "completions": stats.completions,
            "deadlocks_resolved": stats.deadlocks_resolved,
        },
        "telemetry": core.telemetry().to_json(),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_config_defaults_parse() {
        let config: FleetorConfig = toml::from_str("").unwrap();
        assert_eq!(config.simulation.agents, 4);
        assert_eq!(config.coordinator.restock_weight, 0.9);
        assert!(config.coordinator.validate().is_ok());
    }

    #[test]
    fn test_degenerate_simulation_config_rejected() {
        // Zero divisors in the order feed must be caught up front, not at
        // the first generation tick.
        for raw in [
            "[simulation]\nshelf_count = 0\n",
            "[simulation]\nmax_order_quantity = 0\n",
            "[simulation]\nagents = 0\n",
            "[simulation]\norder_interval_ticks = 0\n",
            "[simulation]\ntick_seconds = 0.0\n",
            "[simulation]\nwidth = 0.0\n",
            "[simulation]\nagent_speed = -1.0\n",
        ] {
            let config: FleetorConfig = toml::from_str(raw).unwrap();
            assert!(config.simulation.validate().is_err(), "accepted: {raw}");
        }
        assert!(SimulationConfig::default().validate().is_ok());
    }

    #[test]
    fn test_config_file_round_trip() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "[coordinator]\nrestock_weight = 0.8\n\n[simulation]\nagents = 2\nseed = 9\n"
        )
        .unwrap();
        let raw = std::fs::read_to_string(file.path()).unwrap();
        let config: FleetorConfig = toml::from_str(&raw).unwrap();
        assert_eq!(config.coordinator.restock_weight, 0.8);
        assert_eq!(config.simulation.agents, 2);
        assert_eq!(config.simulation.seed, 9);
        assert_eq!(config.simulation.ticks, 600);
    }
}
