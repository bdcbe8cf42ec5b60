//! Frontier clustering.
//!
//! Frontier vertices come in long ragged strips along holes and map
//! borders.  Grouping them with DBSCAN gives one exploration goal per strip
//! instead of one per vertex.

use std::collections::BTreeSet;

use espeleo_mesh::spatial::Octree;
use espeleo_mesh::{TriangleMesh, Vec3};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::graph::MeshGraph;

/// Output of [`dbscan`], indexed like the input points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbscanResult {
    /// Cluster label per point; `None` marks noise.
    pub labels: Vec<Option<usize>>,
    /// True for core samples.
    pub core: Vec<bool>,
}

impl DbscanResult {
    pub fn cluster_count(&self) -> usize {
        self.labels.iter().flatten().max().map_or(0, |max| max + 1)
    }
}

/// Density-based clustering of `points`.
///
/// A point is a core sample when at least `min_samples` points, itself
/// included, lie within `eps` of it.  Clusters grow outwards from core
/// samples in input order; a border point joins the first cluster that
/// reaches it.
pub fn dbscan(points: &[Vec3], eps: f64, min_samples: usize) -> DbscanResult {
    let index = Octree::from_entries(points.iter().copied().enumerate().map(|(i, p)| (p, i)));
    let neighbourhoods: Vec<Vec<usize>> = points
        .iter()
        .map(|p| index.within_radius(*p, eps))
        .collect();
    let core: Vec<bool> = neighbourhoods.iter().map(|n| n.len() >= min_samples).collect();

    let mut labels: Vec<Option<usize>> = vec![None; points.len()];
    let mut next_label = 0;
    for seed in 0..points.len() {
        if labels[seed].is_some() || !core[seed] {
            continue;
        }
        labels[seed] = Some(next_label);
        let mut stack = vec![seed];
        while let Some(i) = stack.pop() {
            for &j in &neighbourhoods[i] {
                if labels[j].is_none() {
                    labels[j] = Some(next_label);
                    if core[j] {
                        stack.push(j);
                    }
                }
            }
        }
        next_label += 1;
    }

    DbscanResult { labels, core }
}

/// A group of nearby frontier vertices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrontierCluster {
    /// Core frontier vertex closest to the source: where to drive to.
    pub visit_node: usize,
    /// Graph node closest to the mean of the core vertices.
    pub centroid_node: usize,
    /// Mean position of the core vertices.
    pub centroid: [f64; 3],
    /// Every frontier vertex in the cluster, core and border.
    pub members: Vec<usize>,
}

/// Cluster `frontiers` and pick a visit node and a centroid node for each
/// cluster.  Noise frontiers are discarded.
pub fn cluster_frontiers(
    mesh: &TriangleMesh,
    graph: &MeshGraph,
    frontiers: &BTreeSet<usize>,
    source: usize,
    eps: f64,
    min_samples: usize,
) -> Vec<FrontierCluster> {
    if frontiers.is_empty() || graph.is_empty() {
        return Vec::new();
    }

    let ids: Vec<usize> = frontiers.iter().copied().collect();
    let points: Vec<Vec3> = ids.iter().map(|&id| mesh.vertex(id)).collect();
    let result = dbscan(&points, eps, min_samples);

    let node_index = Octree::from_entries(graph.nodes().map(|n| (mesh.vertex(n), n)));
    let source_pos = mesh.vertex(source);

    let mut clusters = Vec::new();
    for label in 0..result.cluster_count() {
        let in_cluster: Vec<usize> = (0..ids.len())
            .filter(|&i| result.labels[i] == Some(label))
            .collect();
        let core: Vec<usize> = in_cluster.iter().copied().filter(|&i| result.core[i]).collect();
        if core.is_empty() {
            continue;
        }

        let sum = core.iter().fold(Vec3::zero(), |acc, &i| acc.add(points[i]));
        let centroid = sum.scale(1.0 / core.len() as f64);

        let Some(visit) = core
            .iter()
            .map(|&i| (points[i].distance(source_pos), ids[i]))
            .min_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)))
        else {
            continue;
        };
        let Some((centroid_node, _)) = node_index.nearest(centroid) else {
            continue;
        };

        clusters.push(FrontierCluster {
            visit_node: visit.1,
            centroid_node,
            centroid: centroid.to_array(),
            members: in_cluster.iter().map(|&i| ids[i]).collect(),
        });
    }

    debug!(
        frontiers = frontiers.len(),
        clusters = clusters.len(),
        "frontier clustering complete"
    );
    clusters
}
