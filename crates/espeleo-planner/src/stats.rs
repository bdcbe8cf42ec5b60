//! Per-term statistics along a planned path.

use std::fmt::Write as _;

use espeleo_mesh::TriangleMesh;
use espeleo_types::GraphMetricType;
use serde::{Deserialize, Serialize};

use crate::metrics::{MetricBounds, energy, euclidean, rotation, traversability};

/// Summary of one cost term.  `min` / `max` are graph-wide bounds, the rest
/// is measured along the path.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TermStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std: f64,
    pub sum: f64,
}

impl TermStats {
    fn from_samples(samples: &[f64], min: f64, max: f64) -> Self {
        let n = samples.len() as f64;
        let sum: f64 = samples.iter().sum();
        let mean = sum / n;
        let var = samples.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n;
        Self {
            min,
            max,
            mean,
            std: var.sqrt(),
            sum,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathStatistics {
    pub metric: GraphMetricType,
    pub elapsed_secs: f64,
    pub distance: TermStats,
    pub energy: TermStats,
    pub rotation: TermStats,
    pub traversability: TermStats,
}

impl PathStatistics {
    /// Measure every step of `path`.  `None` for paths with fewer than two
    /// nodes, which have no steps to measure.
    pub fn from_path(
        mesh: &TriangleMesh,
        path: &[usize],
        bounds: &MetricBounds,
        metric: GraphMetricType,
        elapsed_secs: f64,
    ) -> Option<Self> {
        if path.len() < 2 {
            return None;
        }

        let mut distances = Vec::with_capacity(path.len() - 1);
        let mut energies = Vec::with_capacity(path.len() - 1);
        let mut rotations = Vec::with_capacity(path.len() - 1);
        let mut inclinations = Vec::with_capacity(path.len() - 1);

        for (i, step) in path.windows(2).enumerate() {
            let (v, u) = (mesh.vertex(step[0]), mesh.vertex(step[1]));
            let pred = i.checked_sub(1).map(|p| mesh.vertex(path[p]));
            distances.push(euclidean(v, u));
            energies.push(energy(v, u, pred));
            rotations.push(rotation(v, u, pred));
            inclinations.push(traversability(mesh, step[1]));
        }

        Some(Self {
            metric,
            elapsed_secs,
            distance: TermStats::from_samples(&distances, bounds.min_distance, bounds.max_distance),
            energy: TermStats::from_samples(&energies, bounds.min_energy, bounds.max_energy),
            rotation: TermStats::from_samples(&rotations, bounds.min_rotation, bounds.max_rotation),
            traversability: TermStats::from_samples(
                &inclinations,
                bounds.min_traversability,
                bounds.max_traversability,
            ),
        })
    }

    /// Plain-text table, one row per statistic and one column per term.
    pub fn render_table(&self) -> String {
        let title = format!("{} path ({:.2} sec)", self.metric.name().to_uppercase(), self.elapsed_secs);
        let width = title.len().max(8);
        let mut out = String::new();

        let _ = writeln!(
            out,
            "{title:<width$} | {:>12} | {:>12} | {:>12} | {:>14}",
            "Distance", "Energy", "Rotation", "Traversability"
        );
        let _ = writeln!(out, "{}", "-".repeat(width + 64));

        let terms = [self.distance, self.energy, self.rotation, self.traversability];
        let rows = [
            ("min", terms.map(|t| t.min)),
            ("max", terms.map(|t| t.max)),
            ("mean", terms.map(|t| t.mean)),
            ("std dev", terms.map(|t| t.std)),
            ("sum", terms.map(|t| t.sum)),
        ];
        for (label, [d, e, r, t]) in rows {
            let _ = writeln!(
                out,
                "{label:<width$} | {d:>12.2} | {e:>12.2} | {r:>12.2} | {t:>14.2}"
            );
        }
        out
    }
}
