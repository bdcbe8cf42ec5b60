//! Pose estimation for the estimated flattest metrics.
//!
//! A vertex normal only describes the surface under a single point, while
//! the robot rests on a footprint that can bridge small bumps.  A
//! [`PoseEstimator`] predicts the up-vector the robot would actually have
//! when placed at a point; the planner turns it into an inclination.
//!
//! # Example
//!
//! ```rust
//! use espeleo_mesh::{TriangleMesh, Vec3};
//! use espeleo_mesh::geometry::traversal_angle;
//! use espeleo_planner::estimator::{FootprintPlaneEstimator, PoseEstimator};
//!
//! // 4×4 grid on the plane z = 0.5·x  (≈26.6°).
//! let p = |i: usize, j: usize| Vec3::new(i as f64, j as f64, 0.5 * i as f64);
//! let mut tris = Vec::new();
//! for i in 0..4 {
//!     for j in 0..4 {
//!         tris.push([p(i, j), p(i + 1, j), p(i + 1, j + 1)]);
//!         tris.push([p(i, j), p(i + 1, j + 1), p(i, j + 1)]);
//!     }
//! }
//! let mesh = TriangleMesh::from_triangles(&tris).unwrap();
//!
//! let estimator = FootprintPlaneEstimator::new(1.5);
//! let normal = estimator.estimate_normal(&mesh, Vec3::new(2.0, 2.0, 1.0)).unwrap();
//! assert!((traversal_angle(normal) - 0.5f64.atan().to_degrees()).abs() < 1e-6);
//! ```

use espeleo_mesh::{TriangleMesh, Vec3};

/// Predicts the robot's up-vector when resting at a point on the mesh.
pub trait PoseEstimator: Send + Sync {
    /// Short label used in logs.
    fn name(&self) -> &str;

    /// Unit up-vector at `point`, or `None` if no estimate is possible (the
    /// caller then falls back to the vertex normal).
    fn estimate_normal(&self, mesh: &TriangleMesh, point: Vec3) -> Option<Vec3>;
}

/// Fits the least-squares plane `z = a·x + b·y + c` to every vertex within
/// the robot footprint and reports its normal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FootprintPlaneEstimator {
    radius: f64,
}

impl FootprintPlaneEstimator {
    pub fn new(radius: f64) -> Self {
        Self { radius }
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }
}

impl PoseEstimator for FootprintPlaneEstimator {
    fn name(&self) -> &str {
        "footprint-plane"
    }

    fn estimate_normal(&self, mesh: &TriangleMesh, point: Vec3) -> Option<Vec3> {
        let support = mesh.vertices_within(point, self.radius);
        if support.len() < 3 {
            return None;
        }

        // Normal equations of the fit, centred on `point` for conditioning.
        let (mut sxx, mut sxy, mut syy, mut sx, mut sy) = (0.0, 0.0, 0.0, 0.0, 0.0);
        let (mut sxz, mut syz, mut sz) = (0.0, 0.0, 0.0);
        let n = support.len() as f64;
        for id in support {
            let q = mesh.vertex(id).sub(point);
            sxx += q.x * q.x;
            sxy += q.x * q.y;
            syy += q.y * q.y;
            sx += q.x;
            sy += q.y;
            sxz += q.x * q.z;
            syz += q.y * q.z;
            sz += q.z;
        }

        let m = [[sxx, sxy, sx], [sxy, syy, sy], [sx, sy, n]];
        let rhs = [sxz, syz, sz];
        let [a, b, _c] = solve3(m, rhs)?;
        Vec3::new(-a, -b, 1.0).normalized()
    }
}

fn det3(m: [[f64; 3]; 3]) -> f64 {
    m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
        - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
        + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0])
}

/// Cramer's rule; `None` for a (near-)singular system.
fn solve3(m: [[f64; 3]; 3], rhs: [f64; 3]) -> Option<[f64; 3]> {
    let det = det3(m);
    let scale = m.iter().flatten().fold(0.0f64, |acc, v| acc.max(v.abs()));
    if det.abs() <= 1e-12 * scale.powi(3).max(f64::MIN_POSITIVE) {
        return None;
    }
    let mut out = [0.0; 3];
    for (col, slot) in out.iter_mut().enumerate() {
        let mut mc = m;
        for row in 0..3 {
            mc[row][col] = rhs[row];
        }
        *slot = det3(mc) / det;
    }
    Some(out)
}
