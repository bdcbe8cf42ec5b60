//! Metric-driven graph search.
//!
//! [`MeshGraphSearch`] runs Dijkstra over a prepared [`MeshGraph`] with an
//! edge weight chosen by a [`GraphMetricType`].  Several metrics price a
//! step by the direction the robot arrived from, so the weight of `v → u`
//! is computed on the fly from the first recorded predecessor of `v`.
//! Because of that the result is a heuristic, not a true optimum over
//! heading-aware states.
//!
//! # Example
//!
//! ```rust
//! use espeleo_mesh::{TriangleMesh, Vec3};
//! use espeleo_planner::config::PlannerConfig;
//! use espeleo_planner::graph::MeshGraph;
//! use espeleo_planner::search::MeshGraphSearch;
//! use espeleo_types::GraphMetricType;
//!
//! let p = |x: f64, y: f64| Vec3::new(x, y, 0.0);
//! let mesh = TriangleMesh::from_triangles(&[
//!     [p(0.0, 0.0), p(1.0, 0.0), p(1.0, 1.0)],
//!     [p(0.0, 0.0), p(1.0, 1.0), p(0.0, 1.0)],
//! ])
//! .unwrap();
//! let graph = MeshGraph::from_mesh(&mesh);
//! let config = PlannerConfig::default();
//!
//! let mut search =
//!     MeshGraphSearch::new(graph, GraphMetricType::Shortest, &mesh, &config, None).unwrap();
//! let (cost, path) = search.search(0, 2).unwrap();
//! assert_eq!(path, vec![0, 2]);
//! assert!((cost - 2f64.sqrt()).abs() < 1e-12);
//! ```

use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::time::{Duration, Instant};

use espeleo_mesh::geometry::traversal_angle;
use espeleo_mesh::spatial::Octree;
use espeleo_mesh::TriangleMesh;
use espeleo_types::{GraphMetricType, PlannerError};
use tracing::debug;

use crate::config::PlannerConfig;
use crate::estimator::PoseEstimator;
use crate::graph::MeshGraph;
use crate::metrics::{
    MetricBounds, REPULSION_MIN_DISTANCE, REPULSION_RANGE, REPULSION_SCALE, energy, euclidean,
    neighbour_angle_mean_std, normalize_from_minmax, repulsive_potential, rotation, traversability,
};
use crate::prepare::graph_borders;
use crate::stats::PathStatistics;

/// Everything Dijkstra learned, keyed by node.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShortestPaths {
    /// Final distance of every settled node.
    pub dist: BTreeMap<usize, f64>,
    /// One best path from a source to each discovered node.
    pub paths: BTreeMap<usize, Vec<usize>>,
    /// All equally good predecessors of each discovered node.
    pub pred: BTreeMap<usize, Vec<usize>>,
}

/// Fringe entry.  Ordered so that `BinaryHeap` pops the lowest cost first,
/// and among equal costs the entry pushed first.
#[derive(Debug)]
struct Candidate {
    cost: f64,
    seq: u64,
    node: usize,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Dijkstra search over a mesh graph under one metric.
pub struct MeshGraphSearch<'a> {
    graph: MeshGraph,
    mesh: &'a TriangleMesh,
    metric: GraphMetricType,
    config: PlannerConfig,
    estimator: Option<Arc<dyn PoseEstimator>>,
    bounds: MetricBounds,
    borders: Option<Octree>,
    cancel: Option<Arc<AtomicBool>>,
    /// Estimated inclination per node; the estimator is the slow part.
    estimates: RefCell<HashMap<usize, f64>>,
    /// Weighted std of second-neighbour inclinations per node.
    angle_spreads: RefCell<HashMap<usize, f64>>,
    path: Option<Vec<usize>>,
    path_cost: Option<f64>,
    last_elapsed: Duration,
}

impl<'a> MeshGraphSearch<'a> {
    /// Fails with [`PlannerError::MissingEstimator`] when `metric` needs a
    /// pose estimator and none is given.
    pub fn new(
        graph: MeshGraph,
        metric: GraphMetricType,
        mesh: &'a TriangleMesh,
        config: &PlannerConfig,
        estimator: Option<Arc<dyn PoseEstimator>>,
    ) -> Result<Self, PlannerError> {
        if metric.needs_estimator() && estimator.is_none() {
            return Err(PlannerError::MissingEstimator(metric));
        }

        let bounds = MetricBounds::estimate(mesh, &graph);
        let borders = config.border_repulsion.then(|| {
            let border_nodes = graph_borders(&graph, config.border_degree_threshold);
            Octree::from_entries(border_nodes.into_iter().map(|b| (mesh.vertex(b), b)))
        });

        Ok(Self {
            graph,
            mesh,
            metric,
            config: config.clone(),
            estimator,
            bounds,
            borders,
            cancel: None,
            estimates: RefCell::new(HashMap::new()),
            angle_spreads: RefCell::new(HashMap::new()),
            path: None,
            path_cost: None,
            last_elapsed: Duration::ZERO,
        })
    }

    /// Abort the search with [`PlannerError::Cancelled`] once `flag` is set.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn metric(&self) -> GraphMetricType {
        self.metric
    }

    pub fn graph(&self) -> &MeshGraph {
        &self.graph
    }

    pub fn bounds(&self) -> &MetricBounds {
        &self.bounds
    }

    /// Node path found by the last successful [`search`](Self::search).
    pub fn path(&self) -> Option<&[usize]> {
        self.path.as_deref()
    }

    /// Cost of [`path`](Self::path).
    pub fn path_cost(&self) -> Option<f64> {
        self.path_cost
    }

    /// Wall-clock duration of the last search.
    pub fn last_elapsed(&self) -> Duration {
        self.last_elapsed
    }

    /// Weight of the step `v → u`, given the node `predecessor` the robot
    /// reached `v` from.
    pub fn edge_weight(&self, v: usize, u: usize, predecessor: Option<usize>) -> f64 {
        let pv = self.mesh.vertex(v);
        let pu = self.mesh.vertex(u);
        let pp = predecessor.map(|p| self.mesh.vertex(p));

        let weight = match self.metric {
            GraphMetricType::Shortest => euclidean(pv, pu),
            GraphMetricType::Flattest => traversability(self.mesh, u) + euclidean(pv, pu),
            GraphMetricType::Energy => energy(pv, pu, pp),
            GraphMetricType::Straightest => rotation(pv, pu, pp),
            GraphMetricType::Combined => {
                let b = &self.bounds;
                let short = normalize_from_minmax(euclidean(pv, pu), b.min_distance, b.max_distance);
                let trav = normalize_from_minmax(
                    traversability(self.mesh, u),
                    b.min_traversability,
                    b.max_traversability,
                );
                let en = normalize_from_minmax(energy(pv, pu, pp), b.min_energy, b.max_energy);
                // Bounds are gathered without predecessors, so a turning step
                // can fall outside them.
                short.max(0.0) * self.config.shortest_weight
                    + trav.max(0.0) * self.config.traversability_weight
                    + en.max(0.0) * self.config.energy_weight
            }
            GraphMetricType::FlattestEstimated => {
                self.estimated_traversability(u) + euclidean(pv, pu)
            }
            GraphMetricType::FlattestEstimatedSelective => {
                if self.angle_spread(u) <= self.config.std_angle_threshold {
                    traversability(self.mesh, u) + euclidean(pv, pu)
                } else {
                    self.estimated_traversability(u) + euclidean(pv, pu)
                }
            }
        };

        weight + self.border_repulsion(u)
    }

    fn estimated_traversability(&self, u: usize) -> f64 {
        if let Some(angle) = self.estimates.borrow().get(&u) {
            return *angle;
        }
        let angle = self
            .estimator
            .as_ref()
            .and_then(|e| e.estimate_normal(self.mesh, self.mesh.vertex(u)))
            .map(traversal_angle)
            .unwrap_or_else(|| traversability(self.mesh, u));
        self.estimates.borrow_mut().insert(u, angle);
        angle
    }

    fn angle_spread(&self, u: usize) -> f64 {
        if let Some(std) = self.angle_spreads.borrow().get(&u) {
            return *std;
        }
        let (_, std) = neighbour_angle_mean_std(self.mesh, &self.graph, u);
        self.angle_spreads.borrow_mut().insert(u, std);
        std
    }

    fn border_repulsion(&self, u: usize) -> f64 {
        self.borders
            .as_ref()
            .and_then(|index| index.nearest(self.mesh.vertex(u)))
            .map_or(0.0, |(_, d)| {
                repulsive_potential(d, REPULSION_RANGE, REPULSION_SCALE, REPULSION_MIN_DISTANCE)
            })
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(AtomicOrdering::Relaxed))
    }

    /// Multi-source Dijkstra.
    ///
    /// Stops as soon as `target` is settled and never relaxes a step whose
    /// total cost would exceed `cutoff`.
    pub fn dijkstra(
        &self,
        sources: &[usize],
        target: Option<usize>,
        cutoff: Option<f64>,
    ) -> Result<ShortestPaths, PlannerError> {
        if sources.is_empty() {
            return Err(PlannerError::InvalidConfig(
                "search needs at least one source".to_string(),
            ));
        }

        let mut out = ShortestPaths::default();
        let mut seen: HashMap<usize, f64> = HashMap::new();
        let mut fringe = BinaryHeap::new();
        let mut seq = 0u64;

        for &s in sources {
            if !self.graph.contains(s) {
                return Err(PlannerError::NodeNotFound(s));
            }
            seen.insert(s, 0.0);
            out.pred.insert(s, Vec::new());
            out.paths.insert(s, vec![s]);
            fringe.push(Candidate { cost: 0.0, seq, node: s });
            seq += 1;
        }

        while let Some(Candidate { cost: d, node: v, .. }) = fringe.pop() {
            if self.is_cancelled() {
                return Err(PlannerError::Cancelled);
            }
            if out.dist.contains_key(&v) {
                continue;
            }
            out.dist.insert(v, d);
            if Some(v) == target {
                break;
            }

            let predecessor = out.pred.get(&v).and_then(|p| p.first().copied());
            for u in self.graph.neighbors(v) {
                let cost = self.edge_weight(v, u, predecessor);
                if cost.is_nan() || cost < 0.0 {
                    return Err(PlannerError::NegativeWeight { from: v, to: u });
                }
                let vu_dist = d + cost;
                if cutoff.is_some_and(|c| vu_dist > c) {
                    continue;
                }
                if out.dist.contains_key(&u) {
                    continue;
                }
                match seen.get(&u) {
                    Some(&best) if vu_dist == best => {
                        out.pred.entry(u).or_default().push(v);
                    }
                    Some(&best) if vu_dist > best => {}
                    _ => {
                        seen.insert(u, vu_dist);
                        fringe.push(Candidate { cost: vu_dist, seq, node: u });
                        seq += 1;
                        let mut path = out.paths.get(&v).cloned().unwrap_or_default();
                        path.push(u);
                        out.paths.insert(u, path);
                        out.pred.insert(u, vec![v]);
                    }
                }
            }
        }

        Ok(out)
    }

    /// Cheapest path from `source` to `target` under this metric.
    pub fn search(&mut self, source: usize, target: usize) -> Result<(f64, Vec<usize>), PlannerError> {
        let started = Instant::now();

        if source == target {
            self.last_elapsed = Duration::ZERO;
            self.path = Some(vec![source]);
            self.path_cost = Some(0.0);
            return Ok((0.0, vec![source]));
        }
        if !self.graph.contains(target) {
            return Err(PlannerError::NodeNotFound(target));
        }

        let mut result = self.dijkstra(&[source], Some(target), None)?;
        self.last_elapsed = started.elapsed();

        let (Some(cost), Some(path)) = (result.dist.get(&target).copied(), result.paths.remove(&target))
        else {
            return Err(PlannerError::NoPath { from: source, to: target });
        };

        debug!(
            metric = %self.metric,
            cost,
            hops = path.len().saturating_sub(1),
            elapsed_ms = self.last_elapsed.as_millis() as u64,
            "search finished"
        );
        self.path = Some(path.clone());
        self.path_cost = Some(cost);
        Ok((cost, path))
    }

    /// Per-term statistics along the last path found.
    pub fn path_statistics(&self) -> Option<PathStatistics> {
        let path = self.path.as_deref()?;
        PathStatistics::from_path(
            self.mesh,
            path,
            &self.bounds,
            self.metric,
            self.last_elapsed.as_secs_f64(),
        )
    }
}
