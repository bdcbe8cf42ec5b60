use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Edge-weighting strategy used when searching the traversability graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GraphMetricType {
    /// Minimise the euclidean length of the route.
    Shortest,
    /// Minimise the inclination of the faces the robot drives over.
    Flattest,
    /// Minimise the estimated locomotion energy.
    Energy,
    /// Normalised blend of distance, inclination and energy.
    Combined,
    /// Minimise heading changes in the horizontal plane.
    Straightest,
    /// Like `Flattest`, but the inclination comes from a pose estimator
    /// rather than the raw vertex normal.
    FlattestEstimated,
    /// Like `FlattestEstimated`, but the estimator is only consulted where
    /// the local terrain angle varies.
    FlattestEstimatedSelective,
}

impl GraphMetricType {
    pub const ALL: [GraphMetricType; 7] = [
        GraphMetricType::Shortest,
        GraphMetricType::Flattest,
        GraphMetricType::Energy,
        GraphMetricType::Combined,
        GraphMetricType::Straightest,
        GraphMetricType::FlattestEstimated,
        GraphMetricType::FlattestEstimatedSelective,
    ];

    /// Stable numeric identifier.
    pub fn id(self) -> u8 {
        match self {
            GraphMetricType::Shortest => 0,
            GraphMetricType::Flattest => 1,
            GraphMetricType::Energy => 2,
            GraphMetricType::Combined => 3,
            GraphMetricType::Straightest => 4,
            GraphMetricType::FlattestEstimated => 7,
            GraphMetricType::FlattestEstimatedSelective => 9,
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            GraphMetricType::Shortest => "Shortest metric",
            GraphMetricType::Flattest => "Flattest metric",
            GraphMetricType::Energy => "Most energy efficient metric",
            GraphMetricType::Combined => "Combined metric",
            GraphMetricType::Straightest => "Straightest metric",
            GraphMetricType::FlattestEstimated => {
                "Flattest metric using footprint pose estimation"
            }
            GraphMetricType::FlattestEstimatedSelective => {
                "Flattest metric using pose estimation with selective pruning of neighbouring normals"
            }
        }
    }

    /// RGB display colour in `[0, 1]`.
    pub fn color(self) -> (f32, f32, f32) {
        match self {
            GraphMetricType::Shortest => (1.0, 0.0, 0.0),
            GraphMetricType::Flattest => (1.0, 1.0, 1.0),
            GraphMetricType::Energy => (1.0, 1.0, 0.0),
            GraphMetricType::Combined => (0.0, 1.0, 0.0),
            GraphMetricType::Straightest => (0.5, 1.0, 0.5),
            GraphMetricType::FlattestEstimated | GraphMetricType::FlattestEstimatedSelective => {
                (0.5, 0.5, 0.5)
            }
        }
    }

    /// `snake_case` name, identical to the serialised form.
    pub fn name(self) -> &'static str {
        match self {
            GraphMetricType::Shortest => "shortest",
            GraphMetricType::Flattest => "flattest",
            GraphMetricType::Energy => "energy",
            GraphMetricType::Combined => "combined",
            GraphMetricType::Straightest => "straightest",
            GraphMetricType::FlattestEstimated => "flattest_estimated",
            GraphMetricType::FlattestEstimatedSelective => "flattest_estimated_selective",
        }
    }

    /// True for metrics that need a pose estimator.
    pub fn needs_estimator(self) -> bool {
        matches!(
            self,
            GraphMetricType::FlattestEstimated | GraphMetricType::FlattestEstimatedSelective
        )
    }
}

impl std::fmt::Display for GraphMetricType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for GraphMetricType {
    type Err = PlannerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('-', "_");
        GraphMetricType::ALL
            .into_iter()
            .find(|m| m.name() == wanted)
            .ok_or_else(|| PlannerError::InvalidConfig(format!("unknown metric '{s}'")))
    }
}

/// A planned route for a single metric.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Route {
    pub metric: GraphMetricType,
    /// Mesh vertex ids from source to target.
    pub node_path: Vec<usize>,
    /// World coordinates of `node_path`.
    pub points: Vec<[f64; 3]>,
    /// Accumulated edge weight under `metric`.
    pub cost: f64,
    /// Wall-clock time spent in the graph search.
    pub elapsed_secs: f64,
}

/// Result of running the planner for one source/target pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanReport {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    /// Path or label of the mesh that was planned over.
    pub mesh: String,
    pub source_node: usize,
    pub target_node: usize,
    pub routes: Vec<Route>,
    /// Metrics for which no route could be found.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed: Vec<GraphMetricType>,
}

impl PlanReport {
    pub fn new(mesh: String, source_node: usize, target_node: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            mesh,
            source_node,
            target_node,
            routes: Vec::new(),
            failed: Vec::new(),
        }
    }

    /// Route planned with `metric`, if any.
    pub fn route(&self, metric: GraphMetricType) -> Option<&Route> {
        self.routes.iter().find(|r| r.metric == metric)
    }
}

/// Error type shared by mesh loading, graph preparation and search.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PlannerError {
    #[error("Mesh IO Error: {0}")]
    MeshIo(String),

    #[error("Mesh Parse Error: {0}")]
    MeshParse(String),

    #[error("Mesh contains no usable triangles")]
    EmptyMesh,

    #[error("Node {0} is not in the graph")]
    NodeNotFound(usize),

    #[error("No path from {from} to {to}")]
    NoPath { from: usize, to: usize },

    #[error("Graph filtering left no nodes")]
    EmptyGraph,

    #[error("Negative or undefined edge weight from {from} to {to}")]
    NegativeWeight { from: usize, to: usize },

    #[error("Metric {0} requires a pose estimator")]
    MissingEstimator(GraphMetricType),

    #[error("Planning cancelled")]
    Cancelled,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Planner task failed: {0}")]
    TaskFailed(String),
}
