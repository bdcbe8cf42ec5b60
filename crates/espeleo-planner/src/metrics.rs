//! Edge cost terms.
//!
//! Each function prices a single step `v → u` of the robot, optionally
//! knowing the node `p` it arrived at `v` from.  Positions are world
//! coordinates; angles are degrees.
//!
//! The energy model is an empirical fit for the Espeleo robot: a rotation
//! term proportional to the turning angle plus a piecewise-linear term in
//! the climbing angle, both scaled by the distance travelled.

use espeleo_mesh::geometry::{GRAVITY, Vec3, angle_between, traversal_angle};
use espeleo_mesh::TriangleMesh;

use crate::graph::MeshGraph;

/// Turning cost coefficient of the energy model.
const ENERGY_ROTATION_COEF: f64 = 37735.9;
/// Climbing-angle slope / offset when descending.
const ENERGY_DESCENT_SLOPE: f64 = -475.07;
const ENERGY_DESCENT_OFFSET: f64 = 1089.3;
/// Climbing-angle slope / offset when climbing or level.
const ENERGY_ASCENT_SLOPE: f64 = 564.97;
const ENERGY_ASCENT_OFFSET: f64 = 1364.9;

/// Repulsive field defaults.
pub const REPULSION_RANGE: f64 = 2.0;
pub const REPULSION_SCALE: f64 = 3.0;
pub const REPULSION_MIN_DISTANCE: f64 = 0.2;

/// Gaussian decay variance used when averaging neighbouring inclinations.
const NEIGHBOUR_DECAY_VARIANCE: f64 = 0.3;
/// Decay weights below this are treated as zero.
const NEIGHBOUR_DECAY_CUTOFF: f64 = 0.001;

pub fn euclidean(v: Vec3, u: Vec3) -> f64 {
    v.distance(u)
}

/// Inclination of the surface at node `u`.
pub fn traversability(mesh: &TriangleMesh, u: usize) -> f64 {
    traversal_angle(mesh.normal(u))
}

/// Estimated energy to drive from `v` to `u`.
pub fn energy(v: Vec3, u: Vec3, predecessor: Option<Vec3>) -> f64 {
    let step = u.sub(v);
    let (rot, incl) = match predecessor {
        None => (angle_between(v, u), angle_between(step, GRAVITY)),
        Some(p) => {
            let heading = v.sub(p);
            (angle_between(heading, step), angle_between(heading, GRAVITY))
        }
    };

    let climb = 90.0 - incl;
    let dist = step.norm();
    let rotation_term = (ENERGY_ROTATION_COEF * rot) / 360.0;

    if climb < 0.0 {
        (rotation_term + (ENERGY_DESCENT_SLOPE * climb + ENERGY_DESCENT_OFFSET)) * dist
    } else {
        (rotation_term + (ENERGY_ASCENT_SLOPE * climb + ENERGY_ASCENT_OFFSET)) * dist
    }
}

/// Heading change in the horizontal plane when stepping `v → u`.
///
/// Zero when the predecessor is unknown.
pub fn rotation(v: Vec3, u: Vec3, predecessor: Option<Vec3>) -> f64 {
    match predecessor {
        None => 0.0,
        Some(p) => angle_between(v.xy().sub(p.xy()), u.xy().sub(v.xy())),
    }
}

/// Map `x` from `[min, max]` onto `[0, 1]`; a degenerate range maps to 0.
pub fn normalize_from_minmax(x: f64, min: f64, max: f64) -> f64 {
    let range = max - min;
    if range.abs() <= f64::EPSILON {
        0.0
    } else {
        (x - min) / range
    }
}

/// Repulsive potential of an obstacle at distance `d`.
///
/// `½·c1·(1/d − 1/d0)²` inside the range `d0`, 0 beyond it.  Distances
/// below `min_dist` are clamped to keep the field bounded.
pub fn repulsive_potential(d: f64, d0: f64, c1: f64, min_dist: f64) -> f64 {
    let d = d.max(min_dist);
    if d <= d0 {
        0.5 * c1 * (1.0 / d - 1.0 / d0).powi(2)
    } else {
        0.0
    }
}

/// `height · exp(−(x − mu)² / (2 · variance))`
pub fn gaussian_decay(x: f64, mu: f64, variance: f64, height: f64) -> f64 {
    height * (-(x - mu).powi(2) / (2.0 * variance)).exp()
}

/// Weighted mean and (population) standard deviation of `values`.
///
/// Returns `None` when the weights sum to zero.
pub fn weighted_mean_std(values: &[f64], weights: &[f64]) -> Option<(f64, f64)> {
    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        return None;
    }
    let mean = values.iter().zip(weights).map(|(v, w)| v * w).sum::<f64>() / total;
    let var = values
        .iter()
        .zip(weights)
        .map(|(v, w)| w * (v - mean).powi(2))
        .sum::<f64>()
        / total;
    Some((mean, var.sqrt()))
}

/// Decay-weighted mean and std-dev of the inclinations around `u`.
///
/// Samples `u` and its second neighbours; each is weighted by a gaussian of
/// its distance to `u`, with negligible weights zeroed.
pub fn neighbour_angle_mean_std(mesh: &TriangleMesh, graph: &MeshGraph, u: usize) -> (f64, f64) {
    let centre = mesh.vertex(u);
    let mut angles = Vec::new();
    let mut weights = Vec::new();
    for n in graph.second_neighbors(u) {
        angles.push(traversability(mesh, n));
        let decay = gaussian_decay(mesh.vertex(n).distance(centre), 0.0, NEIGHBOUR_DECAY_VARIANCE, 1.0);
        weights.push(if decay.abs() < NEIGHBOUR_DECAY_CUTOFF { 0.0 } else { decay });
    }
    // `u` itself always carries weight 1, so the fallback is unreachable for
    // nodes that are in the graph.
    weighted_mean_std(&angles, &weights).unwrap_or((traversability(mesh, u), 0.0))
}

/// Graph-wide extremes of each cost term, used to normalise the combined
/// metric and reported alongside path statistics.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MetricBounds {
    pub min_distance: f64,
    pub max_distance: f64,
    pub min_energy: f64,
    pub max_energy: f64,
    pub min_traversability: f64,
    pub max_traversability: f64,
    pub min_rotation: f64,
    pub max_rotation: f64,
}

impl MetricBounds {
    /// Scan every directed edge of `graph` (without predecessor
    /// information).  A graph without edges yields all-zero bounds.
    pub fn estimate(mesh: &TriangleMesh, graph: &MeshGraph) -> Self {
        let mut bounds: Option<MetricBounds> = None;
        for v in graph.nodes() {
            let pv = mesh.vertex(v);
            for u in graph.neighbors(v) {
                let pu = mesh.vertex(u);
                let d = euclidean(pv, pu);
                let e = energy(pv, pu, None);
                let t = traversability(mesh, u);
                let r = rotation(pv, pu, None);
                bounds = Some(match bounds {
                    None => MetricBounds {
                        min_distance: d,
                        max_distance: d,
                        min_energy: e,
                        max_energy: e,
                        min_traversability: t,
                        max_traversability: t,
                        min_rotation: r,
                        max_rotation: r,
                    },
                    Some(b) => MetricBounds {
                        min_distance: b.min_distance.min(d),
                        max_distance: b.max_distance.max(d),
                        min_energy: b.min_energy.min(e),
                        max_energy: b.max_energy.max(e),
                        min_traversability: b.min_traversability.min(t),
                        max_traversability: b.max_traversability.max(t),
                        min_rotation: b.min_rotation.min(r),
                        max_rotation: b.max_rotation.max(r),
                    },
                });
            }
        }
        bounds.unwrap_or_default()
    }
}
