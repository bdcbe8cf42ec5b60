//! Multi-metric route planning.
//!
//! [`MeshPlanner`] owns a terrain mesh and a list of metrics.  For every
//! metric it builds the vertex graph, prepares it, searches it and turns the
//! node path back into world coordinates.  Metrics either run one after the
//! other ([`MeshPlanner::run`]) or side by side on Tokio's blocking pool
//! ([`MeshPlanner::run_concurrent`]); both produce the same report.
//!
//! A metric that cannot reach the target does not abort the plan: it is
//! logged and listed in [`PlanReport::failed`].  Cancellation and
//! configuration errors do abort it.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use espeleo_mesh::{TriangleMesh, Vec3};
use espeleo_types::{GraphMetricType, PlanReport, PlannerError, Route};
use tracing::{error, info, instrument};

use crate::cluster::FrontierCluster;
use crate::config::PlannerConfig;
use crate::estimator::{FootprintPlaneEstimator, PoseEstimator};
use crate::graph::MeshGraph;
use crate::prepare::prepare_graph;
use crate::search::MeshGraphSearch;
use crate::stats::PathStatistics;

/// Everything one planning run produced.
#[derive(Debug, Clone)]
pub struct PlanOutcome {
    pub report: PlanReport,
    /// Path statistics, in the same order as `report.routes`.
    pub statistics: Vec<PathStatistics>,
    /// Exploration frontier clusters found while preparing the graph.
    pub clusters: Vec<FrontierCluster>,
}

/// Result of a single metric.
#[derive(Debug, Clone)]
pub struct MetricRun {
    pub route: Route,
    pub statistics: Option<PathStatistics>,
    pub clusters: Vec<FrontierCluster>,
}

pub struct MeshPlanner {
    mesh: Arc<TriangleMesh>,
    label: String,
    metrics: Vec<GraphMetricType>,
    config: PlannerConfig,
    estimator: Option<Arc<dyn PoseEstimator>>,
    cancel: Arc<AtomicBool>,
}

impl MeshPlanner {
    /// Fails with [`PlannerError::InvalidConfig`] when `metrics` is empty or
    /// `config` does not validate.
    ///
    /// Estimated metrics use a [`FootprintPlaneEstimator`] sized by
    /// `config.footprint_radius` unless another estimator is supplied with
    /// [`with_estimator`](Self::with_estimator).
    pub fn new(
        mesh: Arc<TriangleMesh>,
        metrics: Vec<GraphMetricType>,
        config: PlannerConfig,
    ) -> Result<Self, PlannerError> {
        config.validate()?;
        if metrics.is_empty() {
            return Err(PlannerError::InvalidConfig(
                "at least one metric is required".to_string(),
            ));
        }
        let estimator: Arc<dyn PoseEstimator> =
            Arc::new(FootprintPlaneEstimator::new(config.footprint_radius));
        Ok(Self {
            mesh,
            label: String::from("<memory>"),
            metrics,
            config,
            estimator: Some(estimator),
            cancel: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn with_estimator(mut self, estimator: Arc<dyn PoseEstimator>) -> Self {
        self.estimator = Some(estimator);
        self
    }

    /// Drop the estimator; estimated metrics then fail with
    /// [`PlannerError::MissingEstimator`].
    pub fn without_estimator(mut self) -> Self {
        self.estimator = None;
        self
    }

    /// Share a cancel flag, e.g. one set by a Ctrl-C handler.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = flag;
        self
    }

    /// Name recorded as [`PlanReport::mesh`].
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn mesh(&self) -> &TriangleMesh {
        &self.mesh
    }

    pub fn metrics(&self) -> &[GraphMetricType] {
        &self.metrics
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Ask any running search to stop.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    /// Nearest mesh vertex to a world point.
    pub fn snap(&self, point: Vec3) -> Result<usize, PlannerError> {
        self.mesh.nearest_vertex(point).ok_or(PlannerError::EmptyMesh)
    }

    /// Plan a single metric from scratch.
    #[instrument(skip(self))]
    pub fn run_metric(
        &self,
        metric: GraphMetricType,
        source: usize,
        target: usize,
    ) -> Result<MetricRun, PlannerError> {
        let vertex_count = self.mesh.vertex_count();
        for node in [source, target] {
            if node >= vertex_count {
                return Err(PlannerError::NodeNotFound(node));
            }
        }
        if self.cancel.load(Ordering::Relaxed) {
            return Err(PlannerError::Cancelled);
        }

        let prepared = prepare_graph(
            &self.mesh,
            MeshGraph::from_mesh(&self.mesh),
            source,
            Some(target),
            &self.config,
        )?;

        let mut search = MeshGraphSearch::new(
            prepared.graph,
            metric,
            &self.mesh,
            &self.config,
            self.estimator.clone(),
        )?
        .with_cancel_flag(Arc::clone(&self.cancel));
        let (cost, node_path) = search.search(source, target)?;
        let elapsed_secs = search.last_elapsed().as_secs_f64();

        info!(cost, hops = node_path.len().saturating_sub(1), elapsed_secs, "route found");

        let points = node_path
            .iter()
            .map(|&v| self.mesh.vertex(v).to_array())
            .collect();
        Ok(MetricRun {
            route: Route {
                metric,
                node_path,
                points,
                cost,
                elapsed_secs,
            },
            statistics: search.path_statistics(),
            clusters: prepared.clusters,
        })
    }

    /// Run every metric in order on the current thread.
    pub fn run(&self, source: usize, target: usize) -> Result<PlanOutcome, PlannerError> {
        let results = self
            .metrics
            .iter()
            .map(|&m| (m, self.run_metric(m, source, target)))
            .collect();
        self.collect(source, target, results)
    }

    /// Run every metric on Tokio's blocking pool and merge the results in
    /// metric order.
    pub async fn run_concurrent(
        self: Arc<Self>,
        source: usize,
        target: usize,
    ) -> Result<PlanOutcome, PlannerError> {
        let handles: Vec<_> = self
            .metrics
            .iter()
            .map(|&m| {
                let planner = Arc::clone(&self);
                (m, tokio::task::spawn_blocking(move || planner.run_metric(m, source, target)))
            })
            .collect();

        let mut results = Vec::with_capacity(handles.len());
        for (metric, handle) in handles {
            let result = handle
                .await
                .map_err(|e| PlannerError::TaskFailed(format!("{metric}: {e}")))?;
            results.push((metric, result));
        }
        self.collect(source, target, results)
    }

    /// Snap both world points to the mesh, then [`run`](Self::run).
    pub fn plan_between_points(&self, source: Vec3, target: Vec3) -> Result<PlanOutcome, PlannerError> {
        let (s, t) = (self.snap(source)?, self.snap(target)?);
        self.run(s, t)
    }

    fn collect(
        &self,
        source: usize,
        target: usize,
        results: Vec<(GraphMetricType, Result<MetricRun, PlannerError>)>,
    ) -> Result<PlanOutcome, PlannerError> {
        let mut outcome = PlanOutcome {
            report: PlanReport::new(self.label.clone(), source, target),
            statistics: Vec::new(),
            clusters: Vec::new(),
        };

        for (metric, result) in results {
            match result {
                Ok(run) => {
                    if outcome.report.routes.is_empty() {
                        outcome.clusters = run.clusters;
                    }
                    outcome.statistics.extend(run.statistics);
                    outcome.report.routes.push(run.route);
                }
                Err(
                    e @ (PlannerError::NoPath { .. }
                    | PlannerError::NodeNotFound(_)
                    | PlannerError::EmptyGraph),
                ) => {
                    error!(metric = %metric, error = %e, "metric failed; skipping");
                    outcome.report.failed.push(metric);
                }
                Err(e) => return Err(e),
            }
        }

        info!(
            plan = %outcome.report.id,
            routes = outcome.report.routes.len(),
            failed = outcome.report.failed.len(),
            "plan finished"
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 8×8 unit grid; past x = 4 the ground climbs at 60°.
    fn walled_grid() -> Arc<TriangleMesh> {
        let slope = 60f64.to_radians().tan();
        let p = |i: usize, j: usize| {
            let z = if i > 4 { (i - 4) as f64 * slope } else { 0.0 };
            Vec3::new(i as f64, j as f64, z)
        };
        let mut tris = Vec::new();
        for i in 0..8 {
            for j in 0..8 {
                tris.push([p(i, j), p(i + 1, j), p(i + 1, j + 1)]);
                tris.push([p(i, j), p(i + 1, j + 1), p(i, j + 1)]);
            }
        }
        Arc::new(TriangleMesh::from_triangles(&tris).unwrap())
    }

    fn planner(metrics: Vec<GraphMetricType>) -> MeshPlanner {
        MeshPlanner::new(walled_grid(), metrics, PlannerConfig::default())
            .unwrap()
            .with_label("walled-grid")
    }

    #[test]
    fn empty_metric_list_is_rejected() {
        let err = MeshPlanner::new(walled_grid(), vec![], PlannerConfig::default())
            .err()
            .unwrap();
        assert!(matches!(err, PlannerError::InvalidConfig(_)));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let cfg = PlannerConfig {
            dbscan_eps: -1.0,
            ..PlannerConfig::default()
        };
        assert!(MeshPlanner::new(walled_grid(), GraphMetricType::ALL.to_vec(), cfg).is_err());
    }

    #[test]
    fn every_metric_reaches_a_flat_target() {
        let p = planner(GraphMetricType::ALL.to_vec());
        let outcome = p
            .plan_between_points(Vec3::new(0.0, 0.0, 0.0), Vec3::new(3.0, 7.0, 0.0))
            .unwrap();
        let report = &outcome.report;
        assert_eq!(report.mesh, "walled-grid");
        assert!(report.failed.is_empty());
        assert_eq!(report.routes.len(), GraphMetricType::ALL.len());
        for (route, metric) in report.routes.iter().zip(GraphMetricType::ALL) {
            assert_eq!(route.metric, metric);
            assert_eq!(route.node_path.first(), Some(&report.source_node));
            assert_eq!(route.node_path.last(), Some(&report.target_node));
            assert_eq!(route.points.len(), route.node_path.len());
            // No route climbs the wall.
            assert!(route.points.iter().all(|p| p[2] == 0.0));
        }
        assert_eq!(outcome.statistics.len(), report.routes.len());
        assert!(!outcome.clusters.is_empty());
    }

    #[test]
    fn same_source_and_target() {
        let p = planner(vec![GraphMetricType::Energy]);
        let outcome = p.run(3, 3).unwrap();
        let route = &outcome.report.routes[0];
        assert_eq!(route.node_path, vec![3]);
        assert_eq!(route.cost, 0.0);
        // A single node has no steps to measure.
        assert!(outcome.statistics.is_empty());
    }

    #[test]
    fn out_of_range_nodes_are_recorded_as_failures() {
        let p = planner(vec![GraphMetricType::Shortest, GraphMetricType::Flattest]);
        let outcome = p.run(0, 10_000).unwrap();
        assert!(outcome.report.routes.is_empty());
        assert_eq!(
            outcome.report.failed,
            vec![GraphMetricType::Shortest, GraphMetricType::Flattest]
        );
    }

    #[test]
    fn missing_estimator_aborts_the_plan() {
        let p = planner(vec![GraphMetricType::FlattestEstimated]).without_estimator();
        assert_eq!(
            p.run(0, 5).unwrap_err(),
            PlannerError::MissingEstimator(GraphMetricType::FlattestEstimated)
        );
    }

    #[test]
    fn cancelled_plan_stops() {
        let p = planner(vec![GraphMetricType::Shortest]);
        p.cancel();
        assert_eq!(p.run(0, 5).unwrap_err(), PlannerError::Cancelled);
    }

    #[test]
    fn shared_flag_cancels_too() {
        let flag = Arc::new(AtomicBool::new(false));
        let p = planner(vec![GraphMetricType::Shortest]).with_cancel_flag(Arc::clone(&flag));
        assert!(p.run(0, 5).is_ok());
        flag.store(true, Ordering::Relaxed);
        assert_eq!(p.run(0, 5).unwrap_err(), PlannerError::Cancelled);
    }

    #[tokio::test]
    async fn concurrent_run_matches_sequential() {
        let p = Arc::new(planner(vec![
            GraphMetricType::Shortest,
            GraphMetricType::Combined,
            GraphMetricType::Straightest,
        ]));
        let source = p.snap(Vec3::new(0.0, 0.0, 0.0)).unwrap();
        let target = p.snap(Vec3::new(4.0, 6.0, 0.0)).unwrap();

        let sequential = p.run(source, target).unwrap();
        let concurrent = Arc::clone(&p).run_concurrent(source, target).await.unwrap();

        assert_eq!(sequential.report.routes.len(), concurrent.report.routes.len());
        for (a, b) in sequential.report.routes.iter().zip(&concurrent.report.routes) {
            assert_eq!(a.metric, b.metric);
            assert_eq!(a.node_path, b.node_path);
            assert_eq!(a.cost, b.cost);
        }
    }
}
