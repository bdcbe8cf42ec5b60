//! Welded triangle mesh.
//!
//! STL files store every triangle with its own copy of each corner, so the
//! same physical vertex appears many times.  [`TriangleMesh`] welds
//! coincident corners into a single vertex id, which is what the planner
//! uses as a graph node.  Ids are assigned in first-seen order.
//!
//! # Example
//!
//! ```rust
//! use espeleo_mesh::geometry::Vec3;
//! use espeleo_mesh::mesh::TriangleMesh;
//!
//! // Unit square split into two triangles sharing an edge.
//! let a = Vec3::new(0.0, 0.0, 0.0);
//! let b = Vec3::new(1.0, 0.0, 0.0);
//! let c = Vec3::new(1.0, 1.0, 0.0);
//! let d = Vec3::new(0.0, 1.0, 0.0);
//! let mesh = TriangleMesh::from_triangles(&[[a, b, c], [a, c, d]]).unwrap();
//!
//! assert_eq!(mesh.vertex_count(), 4);
//! assert_eq!(mesh.edges().len(), 5);
//! // Every vertex of an open square lies on its border.
//! assert_eq!(mesh.boundary_vertices().len(), 4);
//! ```

use std::collections::{BTreeMap, BTreeSet, HashMap};

use espeleo_types::PlannerError;

use crate::geometry::Vec3;
use crate::spatial::Octree;

/// An indexed triangle mesh with per-vertex normals.
#[derive(Debug, Clone)]
pub struct TriangleMesh {
    vertices: Vec<Vec3>,
    triangles: Vec<[usize; 3]>,
    normals: Vec<Vec3>,
    index: Octree,
}

impl TriangleMesh {
    /// Build a mesh from raw triangle soup, welding identical corners.
    ///
    /// Degenerate triangles (two corners welded to the same vertex) are
    /// dropped.  Returns [`PlannerError::EmptyMesh`] when nothing is left.
    pub fn from_triangles(triangles: &[[Vec3; 3]]) -> Result<Self, PlannerError> {
        let mut ids: HashMap<[u64; 3], usize> = HashMap::new();
        let mut vertices = Vec::new();
        let mut faces = Vec::with_capacity(triangles.len());

        for tri in triangles {
            let mut face = [0usize; 3];
            for (slot, corner) in face.iter_mut().zip(tri.iter()) {
                let key = weld_key(*corner);
                *slot = *ids.entry(key).or_insert_with(|| {
                    vertices.push(*corner);
                    vertices.len() - 1
                });
            }
            if face[0] != face[1] && face[1] != face[2] && face[0] != face[2] {
                faces.push(face);
            }
        }

        if faces.is_empty() {
            return Err(PlannerError::EmptyMesh);
        }

        // Drop vertices only referenced by degenerate triangles so every id
        // belongs to at least one face.
        let used: BTreeSet<usize> = faces.iter().flatten().copied().collect();
        if used.len() != vertices.len() {
            let remap: HashMap<usize, usize> =
                used.iter().enumerate().map(|(new, &old)| (old, new)).collect();
            vertices = used.iter().map(|&old| vertices[old]).collect();
            for face in faces.iter_mut() {
                for v in face.iter_mut() {
                    *v = remap[&*v];
                }
            }
        }

        let normals = vertex_normals(&vertices, &faces);
        let index = Octree::from_entries(vertices.iter().copied().zip(0..));

        Ok(Self {
            vertices,
            triangles: faces,
            normals,
            index,
        })
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    pub fn vertices(&self) -> &[Vec3] {
        &self.vertices
    }

    pub fn triangles(&self) -> &[[usize; 3]] {
        &self.triangles
    }

    /// Position of vertex `id`.
    ///
    /// # Panics
    /// Panics when `id` is out of range.
    pub fn vertex(&self, id: usize) -> Vec3 {
        self.vertices[id]
    }

    /// Unit normal of vertex `id`.
    ///
    /// # Panics
    /// Panics when `id` is out of range.
    pub fn normal(&self, id: usize) -> Vec3 {
        self.normals[id]
    }

    /// Undirected edges `(a, b)` with `a < b`, sorted.
    pub fn edges(&self) -> Vec<(usize, usize)> {
        self.edge_use_counts().into_keys().collect()
    }

    /// Vertices lying on an edge that belongs to exactly one triangle.
    ///
    /// On a reconstructed map these are the holes and the unexplored
    /// borders of the surface, i.e. the exploration frontiers.
    pub fn boundary_vertices(&self) -> BTreeSet<usize> {
        self.edge_use_counts()
            .into_iter()
            .filter(|(_, uses)| *uses == 1)
            .flat_map(|((a, b), _)| [a, b])
            .collect()
    }

    /// Closest vertex to `p`.
    pub fn nearest_vertex(&self, p: Vec3) -> Option<usize> {
        self.index.nearest(p).map(|(id, _)| id)
    }

    /// Ids of every vertex within `radius` of `p`.
    pub fn vertices_within(&self, p: Vec3, radius: f64) -> Vec<usize> {
        self.index.within_radius(p, radius)
    }

    fn edge_use_counts(&self) -> BTreeMap<(usize, usize), usize> {
        let mut counts = BTreeMap::new();
        for &[a, b, c] in &self.triangles {
            for (u, v) in [(a, b), (b, c), (c, a)] {
                *counts.entry((u.min(v), u.max(v))).or_insert(0) += 1;
            }
        }
        counts
    }
}

/// Hashable key for exact vertex welding; `-0.0` and `0.0` weld together.
fn weld_key(p: Vec3) -> [u64; 3] {
    let bits = |v: f64| if v == 0.0 { 0.0f64.to_bits() } else { v.to_bits() };
    [bits(p.x), bits(p.y), bits(p.z)]
}

/// Area-weighted vertex normals.  The un-normalised cross product of two
/// triangle sides has a length of twice the triangle area, so summing them
/// weights each face by its area.
fn vertex_normals(vertices: &[Vec3], faces: &[[usize; 3]]) -> Vec<Vec3> {
    let mut sums = vec![Vec3::zero(); vertices.len()];
    for &[a, b, c] in faces {
        let n = vertices[b].sub(vertices[a]).cross(vertices[c].sub(vertices[a]));
        for v in [a, b, c] {
            sums[v] = sums[v].add(n);
        }
    }
    sums.into_iter()
        .map(|n| n.normalized().unwrap_or(Vec3::new(0.0, 0.0, 1.0)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::traversal_angle;

    /// `n × n` grid of unit squares on the plane `z = slope * x`.
    fn sloped_grid(n: usize, slope: f64) -> Vec<[Vec3; 3]> {
        let p = |i: usize, j: usize| Vec3::new(i as f64, j as f64, slope * i as f64);
        let mut tris = Vec::new();
        for i in 0..n {
            for j in 0..n {
                tris.push([p(i, j), p(i + 1, j), p(i + 1, j + 1)]);
                tris.push([p(i, j), p(i + 1, j + 1), p(i, j + 1)]);
            }
        }
        tris
    }

    #[test]
    fn welding_shares_corners() {
        let mesh = TriangleMesh::from_triangles(&sloped_grid(3, 0.0)).unwrap();
        assert_eq!(mesh.vertex_count(), 16);
        assert_eq!(mesh.triangle_count(), 18);
    }

    #[test]
    fn negative_zero_welds_with_zero() {
        let a = Vec3::new(0.0, 0.0, 0.0);
        let a_neg = Vec3::new(-0.0, 0.0, -0.0);
        let b = Vec3::new(1.0, 0.0, 0.0);
        let c = Vec3::new(0.0, 1.0, 0.0);
        let d = Vec3::new(1.0, 1.0, 0.0);
        let mesh = TriangleMesh::from_triangles(&[[a, b, c], [a_neg, d, c]]).unwrap();
        assert_eq!(mesh.vertex_count(), 4);
    }

    #[test]
    fn degenerate_triangles_are_dropped() {
        let a = Vec3::new(0.0, 0.0, 0.0);
        let b = Vec3::new(1.0, 0.0, 0.0);
        let c = Vec3::new(0.0, 1.0, 0.0);
        let far = Vec3::new(9.0, 9.0, 9.0);
        let mesh = TriangleMesh::from_triangles(&[[a, b, c], [far, far, b]]).unwrap();
        assert_eq!(mesh.triangle_count(), 1);
        assert_eq!(mesh.vertex_count(), 3);
        assert!(mesh.vertices().iter().all(|v| *v != far));
    }

    #[test]
    fn only_degenerate_input_is_empty_mesh() {
        let a = Vec3::new(1.0, 1.0, 1.0);
        let err = TriangleMesh::from_triangles(&[[a, a, a]]).unwrap_err();
        assert_eq!(err, PlannerError::EmptyMesh);
        assert_eq!(TriangleMesh::from_triangles(&[]).unwrap_err(), PlannerError::EmptyMesh);
    }

    #[test]
    fn flat_grid_normals_are_vertical() {
        let mesh = TriangleMesh::from_triangles(&sloped_grid(2, 0.0)).unwrap();
        for id in 0..mesh.vertex_count() {
            assert!(traversal_angle(mesh.normal(id)) < 1e-9);
        }
    }

    #[test]
    fn sloped_grid_normals_follow_slope() {
        // z = x  ->  45° everywhere.
        let mesh = TriangleMesh::from_triangles(&sloped_grid(2, 1.0)).unwrap();
        for id in 0..mesh.vertex_count() {
            assert!((traversal_angle(mesh.normal(id)) - 45.0).abs() < 1e-6);
        }
    }

    #[test]
    fn grid_boundary_excludes_interior() {
        let mesh = TriangleMesh::from_triangles(&sloped_grid(2, 0.0)).unwrap();
        let boundary = mesh.boundary_vertices();
        // 3x3 vertices, only the centre is interior.
        assert_eq!(boundary.len(), 8);
        let centre = mesh.nearest_vertex(Vec3::new(1.0, 1.0, 0.0)).unwrap();
        assert!(!boundary.contains(&centre));
    }

    #[test]
    fn edges_are_unique_and_ordered() {
        let mesh = TriangleMesh::from_triangles(&sloped_grid(2, 0.0)).unwrap();
        let edges = mesh.edges();
        // 12 axis-aligned + 4 diagonals.
        assert_eq!(edges.len(), 16);
        assert!(edges.iter().all(|(a, b)| a < b));
        assert!(edges.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn nearest_vertex_snaps_world_points() {
        let mesh = TriangleMesh::from_triangles(&sloped_grid(3, 0.0)).unwrap();
        let id = mesh.nearest_vertex(Vec3::new(2.2, 0.9, 0.3)).unwrap();
        assert_eq!(mesh.vertex(id), Vec3::new(2.0, 1.0, 0.0));
        assert_eq!(mesh.vertices_within(Vec3::new(0.0, 0.0, 0.0), 1.0).len(), 3);
    }
}
