//! Graph preparation.
//!
//! Turns the raw vertex graph of a mesh into the graph the robot can
//! actually drive on: steep vertices are dropped, islands unreachable from
//! the robot are discarded, the source / target / frontier nodes that the
//! filtering may have removed are patched back in, and the surviving
//! frontiers are clustered into exploration goals.

use std::collections::BTreeSet;

use espeleo_mesh::spatial::Octree;
use espeleo_mesh::TriangleMesh;
use espeleo_types::PlannerError;
use tracing::{debug, info, warn};

use crate::cluster::{FrontierCluster, cluster_frontiers};
use crate::config::PlannerConfig;
use crate::graph::MeshGraph;
use crate::metrics::traversability;

/// A filtered graph together with the exploration frontiers found on it.
#[derive(Debug, Clone)]
pub struct PreparedGraph {
    pub graph: MeshGraph,
    /// Frontier nodes that survived preparation and are in `graph`.
    pub reachable_frontiers: BTreeSet<usize>,
    pub clusters: Vec<FrontierCluster>,
}

/// Remove every node whose surface inclination exceeds `threshold`.
pub fn filter_traversable(mesh: &TriangleMesh, graph: &mut MeshGraph, threshold: f64) {
    let steep: Vec<usize> = graph
        .nodes()
        .filter(|&v| traversability(mesh, v) > threshold)
        .collect();
    for v in &steep {
        graph.remove_node(*v);
    }
    debug!(removed = steep.len(), remaining = graph.len(), "filtered non traversable nodes");
}

/// Nodes with at most `degree_threshold` neighbours.
///
/// Interior vertices of a regular mesh have six or more neighbours, so a
/// low degree marks map borders and obstacle edges.
pub fn graph_borders(graph: &MeshGraph, degree_threshold: usize) -> BTreeSet<usize> {
    graph.nodes().filter(|&v| graph.degree(v) <= degree_threshold).collect()
}

/// Drop every node within `config.border_threshold` of a graph border, then
/// every component smaller than `config.min_component_size`.
pub fn expand_borders(mesh: &TriangleMesh, graph: &mut MeshGraph, config: &PlannerConfig) {
    let borders = graph_borders(graph, config.border_degree_threshold);
    if borders.is_empty() {
        return;
    }
    let index = Octree::from_entries(borders.iter().map(|&b| (mesh.vertex(b), b)));

    let near_border: Vec<usize> = graph
        .nodes()
        .filter(|&v| {
            index
                .nearest(mesh.vertex(v))
                .is_some_and(|(_, d)| d <= config.border_threshold)
        })
        .collect();
    for v in &near_border {
        graph.remove_node(*v);
    }

    let mut small = 0;
    for component in graph.connected_components() {
        if component.len() < config.min_component_size {
            small += component.len();
            for v in component {
                graph.remove_node(v);
            }
        }
    }
    debug!(
        near_border = near_border.len(),
        small_components = small,
        remaining = graph.len(),
        "expanded graph borders"
    );
}

/// Put nodes lost during filtering back into the graph.
///
/// `unchecked` nodes (source and target) are always re-added with an edge to
/// the nearest remaining node.  `checked` nodes (frontiers) are re-added
/// only when that nearest node lies within `max_distance`; otherwise the
/// nearest node stands in for them.  Returns the resulting frontier set.
pub fn reconnect_nodes(
    mesh: &TriangleMesh,
    graph: &mut MeshGraph,
    checked: &BTreeSet<usize>,
    unchecked: &[usize],
    max_distance: f64,
) -> Result<BTreeSet<usize>, PlannerError> {
    if graph.is_empty() {
        return Err(PlannerError::EmptyGraph);
    }
    // Index the graph as it is before any node is re-added.
    let index = Octree::from_entries(graph.nodes().map(|n| (mesh.vertex(n), n)));

    for &n in unchecked {
        if graph.contains(n) {
            continue;
        }
        if let Some((nearest, d)) = index.nearest(mesh.vertex(n)) {
            debug!(node = n, nearest, distance = d, "reconnecting protected node");
            graph.add_edge(n, nearest);
        }
    }

    let mut frontiers = BTreeSet::new();
    for &n in checked {
        if graph.contains(n) {
            frontiers.insert(n);
            continue;
        }
        let Some((nearest, d)) = index.nearest(mesh.vertex(n)) else {
            continue;
        };
        if d <= max_distance {
            graph.add_edge(n, nearest);
            frontiers.insert(n);
        } else {
            frontiers.insert(nearest);
        }
    }
    Ok(frontiers)
}

/// Run the whole preparation pipeline on `graph`.
pub fn prepare_graph(
    mesh: &TriangleMesh,
    mut graph: MeshGraph,
    source: usize,
    target: Option<usize>,
    config: &PlannerConfig,
) -> Result<PreparedGraph, PlannerError> {
    let initial = graph.len();
    filter_traversable(mesh, &mut graph, config.traversability_threshold);

    if !graph.retain_component(source) {
        warn!(source, "source node was filtered out; keeping every component");
    }

    let graph_frontiers = graph_borders(&graph, config.frontier_degree_threshold);
    let frontiers: BTreeSet<usize> = mesh
        .boundary_vertices()
        .intersection(&graph_frontiers)
        .copied()
        .collect();

    if config.border_threshold > 0.0 {
        expand_borders(mesh, &mut graph, config);
    }

    let mut protected = vec![source];
    protected.extend(target);
    let frontiers = reconnect_nodes(
        mesh,
        &mut graph,
        &frontiers,
        &protected,
        config.border_threshold + 1.0,
    )?;

    graph.retain_component(source);
    let reachable_frontiers: BTreeSet<usize> =
        frontiers.into_iter().filter(|&f| graph.contains(f)).collect();

    let clusters = cluster_frontiers(
        mesh,
        &graph,
        &reachable_frontiers,
        source,
        config.dbscan_eps,
        config.dbscan_min_samples,
    );

    info!(
        initial_nodes = initial,
        nodes = graph.len(),
        edges = graph.edge_count(),
        frontiers = reachable_frontiers.len(),
        clusters = clusters.len(),
        "graph prepared"
    );

    Ok(PreparedGraph {
        graph,
        reachable_frontiers,
        clusters,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use espeleo_mesh::Vec3;

    /// `n × n` unit grid; past `x = wall_from` the ground climbs at 60°.
    fn grid_with_wall(n: usize, wall_from: usize) -> TriangleMesh {
        let slope = 60f64.to_radians().tan();
        let p = |i: usize, j: usize| {
            let z = if i > wall_from { (i - wall_from) as f64 * slope } else { 0.0 };
            Vec3::new(i as f64, j as f64, z)
        };
        let mut tris = Vec::new();
        for i in 0..n {
            for j in 0..n {
                tris.push([p(i, j), p(i + 1, j), p(i + 1, j + 1)]);
                tris.push([p(i, j), p(i + 1, j + 1), p(i, j + 1)]);
            }
        }
        TriangleMesh::from_triangles(&tris).unwrap()
    }

    fn flat_grid(n: usize) -> TriangleMesh {
        grid_with_wall(n, n + 1)
    }

    fn id(mesh: &TriangleMesh, x: f64, y: f64) -> usize {
        mesh.nearest_vertex(Vec3::new(x, y, 0.0)).unwrap()
    }

    #[test]
    fn steep_vertices_are_removed() {
        let mesh = grid_with_wall(6, 3);
        let mut g = MeshGraph::from_mesh(&mesh);
        let before = g.len();
        filter_traversable(&mesh, &mut g, 35.0);
        assert!(g.len() < before);
        // Interior of the slope is gone, flat interior stays.
        let slope_vertex = mesh
            .nearest_vertex(Vec3::new(5.0, 3.0, 2.0 * 60f64.to_radians().tan()))
            .unwrap();
        assert!(!g.contains(slope_vertex));
        assert!(g.contains(id(&mesh, 1.0, 3.0)));
    }

    #[test]
    fn borders_of_a_grid_have_low_degree() {
        let mesh = flat_grid(4);
        let g = MeshGraph::from_mesh(&mesh);
        let borders = graph_borders(&g, 4);
        // Interior vertices have degree 6 on this triangulation.
        assert!(!borders.contains(&id(&mesh, 2.0, 2.0)));
        assert!(borders.contains(&id(&mesh, 0.0, 0.0)));
    }

    #[test]
    fn expand_borders_peels_the_rim() {
        let mesh = flat_grid(6);
        let mut g = MeshGraph::from_mesh(&mesh);
        let cfg = PlannerConfig {
            border_threshold: 0.5,
            border_degree_threshold: 4,
            ..PlannerConfig::default()
        };
        expand_borders(&mesh, &mut g, &cfg);
        // Rim vertices sit at distance 0 from themselves.
        assert!(!g.contains(id(&mesh, 0.0, 3.0)));
        assert!(g.contains(id(&mesh, 3.0, 3.0)));
    }

    #[test]
    fn expand_borders_drops_small_components() {
        let mesh = flat_grid(2);
        let mut g = MeshGraph::from_mesh(&mesh);
        let cfg = PlannerConfig {
            border_threshold: 0.5,
            border_degree_threshold: 4,
            ..PlannerConfig::default()
        };
        // Only the centre vertex survives the peel, and a single node is
        // below the minimum component size.
        expand_borders(&mesh, &mut g, &cfg);
        assert!(g.is_empty());
    }

    #[test]
    fn reconnect_always_restores_unchecked_nodes() {
        let mesh = flat_grid(3);
        let mut g = MeshGraph::from_mesh(&mesh);
        let far = id(&mesh, 0.0, 0.0);
        g.remove_node(far);
        g.remove_node(id(&mesh, 1.0, 0.0));
        g.remove_node(id(&mesh, 0.0, 1.0));
        g.remove_node(id(&mesh, 1.0, 1.0));

        let out = reconnect_nodes(&mesh, &mut g, &BTreeSet::new(), &[far], 0.1).unwrap();
        assert!(out.is_empty());
        assert!(g.contains(far));
        assert_eq!(g.degree(far), 1);
    }

    #[test]
    fn reconnect_checked_node_respects_distance() {
        let mesh = flat_grid(3);
        let mut g = MeshGraph::from_mesh(&mesh);
        let near = id(&mesh, 0.0, 3.0);
        let far = id(&mesh, 0.0, 0.0);
        for (x, y) in [(0.0, 0.0), (1.0, 0.0), (0.0, 1.0), (1.0, 1.0), (0.0, 3.0)] {
            g.remove_node(id(&mesh, x, y));
        }

        let checked = BTreeSet::from([near, far]);
        let out = reconnect_nodes(&mesh, &mut g, &checked, &[], 1.0).unwrap();

        // `near` is 1 m from (0, 2) and comes back.
        assert!(g.contains(near));
        assert!(out.contains(&near));
        // `far` is 2 m from the closest survivor and is replaced by it.
        assert!(!g.contains(far));
        assert!(!out.contains(&far));
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn reconnect_on_empty_graph_fails() {
        let mesh = flat_grid(1);
        let mut g = MeshGraph::new();
        let err = reconnect_nodes(&mesh, &mut g, &BTreeSet::new(), &[0], 1.0).unwrap_err();
        assert_eq!(err, PlannerError::EmptyGraph);
    }

    #[test]
    fn prepare_keeps_source_side_of_the_wall() {
        let mesh = grid_with_wall(8, 3);
        let source = id(&mesh, 0.0, 4.0);
        let prepared = prepare_graph(
            &mesh,
            MeshGraph::from_mesh(&mesh),
            source,
            None,
            &PlannerConfig::default(),
        )
        .unwrap();
        assert!(prepared.graph.contains(source));
        assert!(prepared.graph.nodes().all(|v| mesh.vertex(v).x <= 4.0 + 1e-9));
        assert!(prepared.reachable_frontiers.iter().all(|f| prepared.graph.contains(*f)));
        assert!(!prepared.clusters.is_empty());
    }

    #[test]
    fn rim_frontiers_survive_border_expansion() {
        let mesh = flat_grid(6);
        let source = id(&mesh, 3.0, 3.0);
        let cfg = PlannerConfig {
            border_threshold: 0.5,
            border_degree_threshold: 4,
            ..PlannerConfig::default()
        };
        let prepared =
            prepare_graph(&mesh, MeshGraph::from_mesh(&mesh), source, None, &cfg).unwrap();

        // Every rim vertex is a frontier. Expansion peels them all, and each
        // lies within 1.5 m of the interior so it is linked back.
        assert_eq!(prepared.reachable_frontiers.len(), 24);
        for (x, y) in [(0.0, 0.0), (0.0, 3.0), (6.0, 6.0), (3.0, 6.0)] {
            let rim = id(&mesh, x, y);
            assert!(prepared.reachable_frontiers.contains(&rim), "({x}, {y})");
            assert_eq!(prepared.graph.degree(rim), 1);
        }
        assert_eq!(prepared.graph.len(), 49);
    }

    #[test]
    fn prepare_reattaches_steep_target() {
        let mesh = grid_with_wall(8, 3);
        let source = id(&mesh, 0.0, 4.0);
        let target = mesh
            .nearest_vertex(Vec3::new(6.0, 4.0, 3.0 * 60f64.to_radians().tan()))
            .unwrap();
        let prepared = prepare_graph(
            &mesh,
            MeshGraph::from_mesh(&mesh),
            source,
            Some(target),
            &PlannerConfig::default(),
        )
        .unwrap();
        // The target was filtered out, then linked back to the nearest
        // surviving node, which is on the source's side.
        assert!(prepared.graph.contains(target));
        assert_eq!(prepared.graph.degree(target), 1);
    }
}
