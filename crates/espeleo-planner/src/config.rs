//! Planner tuning parameters.
//!
//! Defaults match the simulated Espeleo robot.  Every field carries its own
//! serde default so a partial `[planner]` table in a config file is valid.

use espeleo_types::PlannerError;
use serde::{Deserialize, Serialize};

/// Thresholds and weights consumed by graph preparation and search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannerConfig {
    /// Maximum inclination (degrees) the robot can climb.
    #[serde(default = "default_traversability_threshold")]
    pub traversability_threshold: f64,

    /// Clearance kept from graph borders (metres).  `0.0` disables border
    /// expansion.
    #[serde(default)]
    pub border_threshold: f64,

    /// Nodes with degree ≤ this are treated as graph borders during
    /// border expansion.
    #[serde(default = "default_border_degree_threshold")]
    pub border_degree_threshold: usize,

    /// Nodes with degree ≤ this are candidate frontiers.
    #[serde(default = "default_frontier_degree_threshold")]
    pub frontier_degree_threshold: usize,

    /// Components smaller than this are dropped after border expansion.
    #[serde(default = "default_min_component_size")]
    pub min_component_size: usize,

    /// Weight of the normalised distance term in the combined metric.
    #[serde(default = "default_shortest_weight")]
    pub shortest_weight: f64,

    /// Weight of the normalised energy term in the combined metric.
    #[serde(default = "default_energy_weight")]
    pub energy_weight: f64,

    /// Weight of the normalised inclination term in the combined metric.
    #[serde(default = "default_traversability_weight")]
    pub traversability_weight: f64,

    /// DBSCAN neighbourhood radius for frontier clustering (metres).
    #[serde(default = "default_dbscan_eps")]
    pub dbscan_eps: f64,

    /// DBSCAN minimum neighbourhood size (the point itself included).
    #[serde(default = "default_dbscan_min_samples")]
    pub dbscan_min_samples: usize,

    /// Std-dev (degrees) of neighbouring inclinations below which the
    /// selective metric trusts the vertex normal.
    #[serde(default = "default_std_angle_threshold")]
    pub std_angle_threshold: f64,

    /// Radius of the robot footprint used by the plane-fit estimator.
    #[serde(default = "default_footprint_radius")]
    pub footprint_radius: f64,

    /// Add a repulsive potential around graph borders to every edge weight.
    #[serde(default)]
    pub border_repulsion: bool,
}

fn default_traversability_threshold() -> f64 {
    35.0
}
fn default_border_degree_threshold() -> usize {
    9
}
fn default_frontier_degree_threshold() -> usize {
    4
}
fn default_min_component_size() -> usize {
    3
}
fn default_shortest_weight() -> f64 {
    0.25
}
fn default_energy_weight() -> f64 {
    0.25
}
fn default_traversability_weight() -> f64 {
    0.50
}
fn default_dbscan_eps() -> f64 {
    2.5
}
fn default_dbscan_min_samples() -> usize {
    2
}
fn default_std_angle_threshold() -> f64 {
    5.0
}
fn default_footprint_radius() -> f64 {
    0.5
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            traversability_threshold: default_traversability_threshold(),
            border_threshold: 0.0,
            border_degree_threshold: default_border_degree_threshold(),
            frontier_degree_threshold: default_frontier_degree_threshold(),
            min_component_size: default_min_component_size(),
            shortest_weight: default_shortest_weight(),
            energy_weight: default_energy_weight(),
            traversability_weight: default_traversability_weight(),
            dbscan_eps: default_dbscan_eps(),
            dbscan_min_samples: default_dbscan_min_samples(),
            std_angle_threshold: default_std_angle_threshold(),
            footprint_radius: default_footprint_radius(),
            border_repulsion: false,
        }
    }
}

impl PlannerConfig {
    /// Reject values that would make preparation or search meaningless.
    pub fn validate(&self) -> Result<(), PlannerError> {
        let non_negative = [
            ("traversability_threshold", self.traversability_threshold),
            ("border_threshold", self.border_threshold),
            ("shortest_weight", self.shortest_weight),
            ("energy_weight", self.energy_weight),
            ("traversability_weight", self.traversability_weight),
            ("std_angle_threshold", self.std_angle_threshold),
        ];
        for (name, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(PlannerError::InvalidConfig(format!(
                    "{name} must be a non-negative number, got {value}"
                )));
            }
        }
        for (name, value) in [
            ("dbscan_eps", self.dbscan_eps),
            ("footprint_radius", self.footprint_radius),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(PlannerError::InvalidConfig(format!(
                    "{name} must be positive, got {value}"
                )));
            }
        }
        if self.dbscan_min_samples == 0 {
            return Err(PlannerError::InvalidConfig(
                "dbscan_min_samples must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
