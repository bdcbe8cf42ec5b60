//! Traversability graph.
//!
//! An undirected graph whose nodes are mesh vertex ids and whose edges are
//! the triangle sides connecting them.  Preparation prunes and patches this
//! graph; search walks it.  Storage is a petgraph [`UnGraphMap`], keyed by
//! vertex id so ids survive removals.  Node and neighbour iteration is
//! sorted so every tie in the search is deterministic.
//!
//! # Example
//!
//! ```rust
//! use espeleo_planner::graph::MeshGraph;
//!
//! let mut g = MeshGraph::new();
//! g.add_edge(0, 1);
//! g.add_edge(1, 2);
//! g.add_edge(7, 8);
//!
//! assert_eq!(g.degree(1), 2);
//! assert_eq!(g.connected_components().len(), 2);
//!
//! g.retain_component(0);
//! assert_eq!(g.nodes().collect::<Vec<_>>(), vec![0, 1, 2]);
//! ```

use std::collections::BTreeSet;

use espeleo_mesh::TriangleMesh;
use petgraph::graphmap::UnGraphMap;
use petgraph::visit::Bfs;

/// Undirected graph keyed by mesh vertex id.
#[derive(Debug, Clone, Default)]
pub struct MeshGraph {
    inner: UnGraphMap<usize, ()>,
}

impl MeshGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// One node per mesh vertex, one edge per triangle side.
    pub fn from_mesh(mesh: &TriangleMesh) -> Self {
        let mut g = Self::new();
        for v in 0..mesh.vertex_count() {
            g.add_node(v);
        }
        for (a, b) in mesh.edges() {
            g.add_edge(a, b);
        }
        g
    }

    pub fn add_node(&mut self, v: usize) {
        self.inner.add_node(v);
    }

    /// Add an undirected edge, inserting missing endpoints.  Self-loops are
    /// ignored.
    pub fn add_edge(&mut self, a: usize, b: usize) {
        if a == b {
            self.add_node(a);
            return;
        }
        self.inner.add_edge(a, b, ());
    }

    /// Remove `v` and every edge touching it.  Returns `false` if `v` was
    /// not present.
    pub fn remove_node(&mut self, v: usize) -> bool {
        self.inner.remove_node(v)
    }

    pub fn contains(&self, v: usize) -> bool {
        self.inner.contains_node(v)
    }

    /// Number of neighbours of `v` (0 for unknown nodes).
    pub fn degree(&self, v: usize) -> usize {
        if !self.contains(v) {
            return 0;
        }
        self.inner.neighbors(v).count()
    }

    /// Neighbours of `v` in ascending order.
    pub fn neighbors(&self, v: usize) -> impl Iterator<Item = usize> + '_ {
        let mut out: Vec<usize> = if self.contains(v) {
            self.inner.neighbors(v).collect()
        } else {
            Vec::new()
        };
        out.sort_unstable();
        out.into_iter()
    }

    /// Node ids in ascending order.
    pub fn nodes(&self) -> impl Iterator<Item = usize> + '_ {
        let mut out: Vec<usize> = self.inner.nodes().collect();
        out.sort_unstable();
        out.into_iter()
    }

    pub fn len(&self) -> usize {
        self.inner.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.node_count() == 0
    }

    pub fn edge_count(&self) -> usize {
        self.inner.edge_count()
    }

    /// Nodes reachable from `source`, or `None` if `source` is not in the
    /// graph.
    pub fn connected_component(&self, source: usize) -> Option<BTreeSet<usize>> {
        if !self.contains(source) {
            return None;
        }
        let mut bfs = Bfs::new(&self.inner, source);
        let mut seen = BTreeSet::new();
        while let Some(v) = bfs.next(&self.inner) {
            seen.insert(v);
        }
        Some(seen)
    }

    /// All connected components, ordered by their smallest node id.
    pub fn connected_components(&self) -> Vec<BTreeSet<usize>> {
        let mut assigned = BTreeSet::new();
        let mut components = Vec::new();
        for v in self.nodes() {
            if assigned.contains(&v) {
                continue;
            }
            if let Some(component) = self.connected_component(v) {
                assigned.extend(component.iter().copied());
                components.push(component);
            }
        }
        components
    }

    /// Keep only the nodes in `keep`.
    pub fn retain_nodes(&mut self, keep: &BTreeSet<usize>) {
        let doomed: Vec<usize> = self.inner.nodes().filter(|v| !keep.contains(v)).collect();
        for v in doomed {
            self.inner.remove_node(v);
        }
    }

    /// Drop every node that is not connected to `source`.
    ///
    /// Returns `false`, leaving the graph untouched, when `source` is not in
    /// the graph.
    pub fn retain_component(&mut self, source: usize) -> bool {
        match self.connected_component(source) {
            Some(component) => {
                self.retain_nodes(&component);
                true
            }
            None => false,
        }
    }

    /// `u` together with every neighbour of a neighbour of `u`.
    pub fn second_neighbors(&self, u: usize) -> BTreeSet<usize> {
        let mut out = BTreeSet::from([u]);
        for n in self.neighbors(u) {
            out.extend(self.neighbors(n));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use espeleo_mesh::Vec3;

    fn path_graph(n: usize) -> MeshGraph {
        let mut g = MeshGraph::new();
        for v in 1..n {
            g.add_edge(v - 1, v);
        }
        g
    }

    #[test]
    fn from_mesh_mirrors_triangle_edges() {
        let a = Vec3::new(0.0, 0.0, 0.0);
        let b = Vec3::new(1.0, 0.0, 0.0);
        let c = Vec3::new(1.0, 1.0, 0.0);
        let d = Vec3::new(0.0, 1.0, 0.0);
        let mesh = TriangleMesh::from_triangles(&[[a, b, c], [a, c, d]]).unwrap();
        let g = MeshGraph::from_mesh(&mesh);
        assert_eq!(g.len(), 4);
        assert_eq!(g.edge_count(), 5);
    }

    #[test]
    fn self_loop_is_ignored() {
        let mut g = MeshGraph::new();
        g.add_edge(3, 3);
        assert!(g.contains(3));
        assert_eq!(g.degree(3), 0);
    }

    #[test]
    fn remove_node_detaches_edges() {
        let mut g = path_graph(3);
        assert!(g.remove_node(1));
        assert!(!g.remove_node(1));
        assert_eq!(g.degree(0), 0);
        assert_eq!(g.degree(2), 0);
        assert_eq!(g.edge_count(), 0);
    }

    #[test]
    fn degree_of_unknown_node_is_zero() {
        assert_eq!(path_graph(2).degree(42), 0);
        assert_eq!(path_graph(2).neighbors(42).count(), 0);
    }

    #[test]
    fn connected_component_of_missing_source_is_none() {
        assert!(path_graph(3).connected_component(9).is_none());
    }

    #[test]
    fn retain_component_missing_source_keeps_graph() {
        let mut g = path_graph(3);
        g.add_edge(10, 11);
        assert!(!g.retain_component(99));
        assert_eq!(g.len(), 5);
        assert!(g.retain_component(11));
        assert_eq!(g.nodes().collect::<Vec<_>>(), vec![10, 11]);
    }

    #[test]
    fn components_are_ordered_by_smallest_id() {
        let mut g = MeshGraph::new();
        g.add_edge(5, 6);
        g.add_edge(1, 2);
        g.add_node(9);
        let comps = g.connected_components();
        assert_eq!(comps.len(), 3);
        assert_eq!(comps[0], BTreeSet::from([1, 2]));
        assert_eq!(comps[2], BTreeSet::from([9]));
    }

    #[test]
    fn ids_survive_removal_and_reinsertion() {
        let mut g = path_graph(6);
        assert!(g.remove_node(2));
        g.add_edge(1, 5);
        assert_eq!(g.nodes().collect::<Vec<_>>(), vec![0, 1, 3, 4, 5]);
        assert_eq!(g.neighbors(5).collect::<Vec<_>>(), vec![1, 4]);
        assert_eq!(g.connected_component(0), Some(BTreeSet::from([0, 1, 3, 4, 5])));
    }

    #[test]
    fn second_neighbors_reach_two_hops() {
        let g = path_graph(5);
        // 2's neighbours are 1 and 3; their neighbours are 0, 2, 4.
        assert_eq!(g.second_neighbors(2), BTreeSet::from([0, 2, 4]));
        assert_eq!(g.second_neighbors(0), BTreeSet::from([0, 2]));
    }
}
