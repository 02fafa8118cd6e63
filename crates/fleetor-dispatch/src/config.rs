//! Coordinator tuning knobs, loadable from TOML.

use fleetor_core::{FleetorError, FleetorResult};
use serde::{Deserialize, Serialize};

/// Tuning parameters for the coordination core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Category weight applied to restock scores when competing with orders.
    /// Must be in (0, 1].
    #[serde(default = "default_restock_weight")]
    pub restock_weight: f64,

    /// Fairness cap: after this many consecutive order assignments the next
    /// dispatch must take a pending restock, regardless of score.
    #[serde(default = "default_max_consecutive_deliveries")]
    pub max_consecutive_deliveries: u32,

    /// Contention resolution runs every this many ticks.
    #[serde(default = "default_assignment_interval")]
    pub assignment_interval: u32,

    /// Seconds a contention loser stays in the yielding state.
    #[serde(default = "default_yield_duration")]
    pub yield_duration: f64,

    /// Roam nodes closer than this to the requester are skipped, to avoid
    /// churn.
    #[serde(default = "default_min_roam_distance")]
    pub min_roam_distance: f32,

    /// Number of idle-roam destinations sampled at startup.
    #[serde(default = "default_roam_node_count")]
    pub roam_node_count: usize,

    /// Items enqueued per automatic low-stock replenishment task.
    #[serde(default = "default_restock_batch_size")]
    pub restock_batch_size: u32,

    /// When true, per-assignment and per-yield events are logged at info
    /// instead of debug.
    #[serde(default)]
    pub verbose_logging: bool,

    /// Deadlock detection and recovery parameters.
    #[serde(default)]
    pub deadlock: DeadlockConfig,
}

/// Parameters for the deadlock detector and resolver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadlockConfig {
    /// Seconds between detection sweeps.
    #[serde(default = "default_check_interval")]
    pub check_interval: f64,

    /// Displacement below this does not count as movement.
    #[serde(default = "default_movement_threshold")]
    pub movement_threshold: f32,

    /// Seconds without movement before an agent is a stuck candidate.
    #[serde(default = "default_stuck_duration")]
    pub stuck_duration: f64,

    /// Stuck candidates within this distance of each other form a cluster.
    #[serde(default = "default_cluster_distance")]
    pub cluster_distance: f32,

    /// How far the victim retreats, opposite its heading.
    #[serde(default = "default_retreat_distance")]
    pub retreat_distance: f32,

    /// Seconds after the retreat before the original destination is resumed.
    #[serde(default = "default_resume_delay")]
    pub resume_delay: f64,
}

fn default_restock_weight() -> f64 {
    0.9
}
fn default_max_consecutive_deliveries() -> u32 {
    5
}
fn default_assignment_interval() -> u32 {
    5
}
fn default_yield_duration() -> f64 {
    2.0
}
fn default_min_roam_distance() -> f32 {
    1.5
}
fn default_roam_node_count() -> usize {
    12
}
fn default_restock_batch_size() -> u32 {
    10
}
fn default_check_interval() -> f64 {
    3.0
}
fn default_movement_threshold() -> f32 {
    0.25
}
fn default_stuck_duration() -> f64 {
    5.0
}
fn default_cluster_distance() -> f32 {
    2.0
}
fn default_retreat_distance() -> f32 {
    3.0
}
fn default_resume_delay() -> f64 {
    1.5
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            restock_weight: default_restock_weight(),
            max_consecutive_deliveries: default_max_consecutive_deliveries(),
            assignment_interval: default_assignment_interval(),
            yield_duration: default_yield_duration(),
            min_roam_distance: default_min_roam_distance(),
            roam_node_count: default_roam_node_count(),
            restock_batch_size: default_restock_batch_size(),
            verbose_logging: false,
            deadlock: DeadlockConfig::default(),
        }
    }
}

impl Default for DeadlockConfig {
    fn default() -> Self {
        Self {
            check_interval: default_check_interval(),
            movement_threshold: default_movement_threshold(),
            stuck_duration: default_stuck_duration(),
            cluster_distance: default_cluster_distance(),
            retreat_distance: default_retreat_distance(),
            resume_delay: default_resume_delay(),
        }
    }
}

impl CoordinatorConfig {
    /// Rejects parameter combinations the scheduler cannot run with.
    pub fn validate(&self) -> FleetorResult<()> {
        if !(self.restock_weight > 0.0 && self.restock_weight <= 1.0) {
            return Err(FleetorError::Config(format!(
                "restock_weight must be in (0, 1], got {}",
                self.restock_weight
            )));
        }
        if self.assignment_interval == 0 {
            return Err(FleetorError::Config(
                "assignment_interval must be >= 1 tick".to_string(),
            ));
        }
        if self.yield_duration <= 0.0 {
            return Err(FleetorError::Config(
                "yield_duration must be positive".to_string(),
            ));
        }
        if self.roam_node_count == 0 {
            return Err(FleetorError::Config(
                "roam_node_count must be >= 1".to_string(),
            ));
        }
        if self.deadlock.stuck_duration <= 0.0 || self.deadlock.check_interval <= 0.0 {
            return Err(FleetorError::Config(
                "deadlock intervals must be positive".to_string(),
            ));
        }
        if self.deadlock.cluster_distance <= 0.0 {
            return Err(FleetorError::Config(
                "deadlock cluster_distance must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(CoordinatorConfig::default().validate().is_ok());
    }

    #[test]
    fn test_restock_weight_bounds() {
        let mut config = CoordinatorConfig::default();
        config.restock_weight = 0.0;
        assert!(config.validate().is_err());
        config.restock_weight = 1.2;
        assert!(config.validate().is_err());
        config.restock_weight = 1.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_assignment_interval_rejected() {
        let mut config = CoordinatorConfig::default();
        config.assignment_interval = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let config: CoordinatorConfig = toml_like_from_json("{}");
        assert_eq!(config.restock_weight, 0.9);
        assert_eq!(config.deadlock.stuck_duration, 5.0);
        assert!(!config.verbose_logging);
    }

    #[test]
    fn test_deserialize_partial_override() {
        let config: CoordinatorConfig =
            toml_like_from_json(r#"{"restock_weight": 0.8, "deadlock": {"stuck_duration": 9.0}}"#);
        assert_eq!(config.restock_weight, 0.8);
        assert_eq!(config.deadlock.stuck_duration, 9.0);
        assert_eq!(config.deadlock.check_interval, 3.0);
    }

    fn toml_like_from_json(raw: &str) -> CoordinatorConfig {
        serde_json::from_str(raw).unwrap()
    }
}
