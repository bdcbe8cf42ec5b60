//! `espeleo-planner` – mesh-based path planning for ground robots.
//!
//! Plans routes over a reconstructed terrain mesh under several cost
//! metrics and finds the exploration frontiers of the map.
//!
//! # Modules
//!
//! - [`graph`] – [`MeshGraph`][graph::MeshGraph]: the undirected vertex graph.
//! - [`prepare`] – [`prepare_graph`][prepare::prepare_graph]: removes steep
//!   and unreachable terrain, reconnects the nodes a plan cannot do without
//!   and collects frontiers.
//! - [`cluster`] – DBSCAN grouping of frontier vertices into exploration
//!   goals.
//! - [`metrics`] – edge cost terms (distance, inclination, energy,
//!   rotation) and their graph-wide bounds.
//! - [`estimator`] – [`PoseEstimator`][estimator::PoseEstimator]: predicts
//!   the robot's attitude on its footprint for the estimated flattest
//!   metrics.
//! - [`search`] – [`MeshGraphSearch`][search::MeshGraphSearch]: Dijkstra with
//!   predecessor-aware edge weights.
//! - [`stats`] – per-term statistics along a route.
//! - [`planner`] – [`MeshPlanner`][planner::MeshPlanner]: runs a list of
//!   metrics, sequentially or concurrently, into a
//!   [`PlanReport`][espeleo_types::PlanReport].
//! - [`config`] – [`PlannerConfig`][config::PlannerConfig] thresholds and
//!   weights.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: log and
//!   trace output.

pub mod cluster;
pub mod config;
pub mod estimator;
pub mod graph;
pub mod metrics;
pub mod planner;
pub mod prepare;
pub mod search;
pub mod stats;
pub mod telemetry;

pub use cluster::FrontierCluster;
pub use config::PlannerConfig;
pub use estimator::{FootprintPlaneEstimator, PoseEstimator};
pub use graph::MeshGraph;
pub use planner::{MeshPlanner, PlanOutcome};
pub use search::MeshGraphSearch;
pub use stats::PathStatistics;
pub use telemetry::{TracerProviderGuard, init_tracing};
