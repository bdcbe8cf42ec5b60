//! `espeleo-mesh` – terrain surface representation.
//!
//! Loads the reconstructed terrain the robot will drive on and exposes it as
//! welded geometry the planner can turn into a graph.
//!
//! # Modules
//!
//! - [`geometry`] – [`Vec3`][geometry::Vec3] plus the angle helpers
//!   ([`angle_between`][geometry::angle_between],
//!   [`traversal_angle`][geometry::traversal_angle]) used to measure how
//!   steep a surface is.
//! - [`mesh`] – [`TriangleMesh`][mesh::TriangleMesh]: welded vertices,
//!   triangles, area-weighted vertex normals and border detection.
//! - [`spatial`] – [`Octree`][spatial::Octree]: nearest-neighbour and radius
//!   queries over vertices and graph nodes.
//! - [`stl`] – [`load_stl`][stl::load_stl]: ASCII / binary STL reader.

pub mod geometry;
pub mod mesh;
pub mod spatial;
pub mod stl;

pub use geometry::Vec3;
pub use mesh::TriangleMesh;
pub use stl::load_stl;
