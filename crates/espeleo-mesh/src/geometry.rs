//! Vector primitives and the inclination measures the planner is built on.
//!
//! All angles are in **degrees**, matching the thresholds used in the
//! planner configuration (e.g. a 35° climbing limit).
//!
//! # Example
//!
//! ```rust
//! use espeleo_mesh::geometry::{Vec3, angle_between, traversal_angle};
//!
//! let up = Vec3::new(0.0, 0.0, 1.0);
//! assert!((angle_between(up, Vec3::new(1.0, 0.0, 0.0)) - 90.0).abs() < 1e-9);
//!
//! // A flat face is perfectly traversable whichever way its normal points.
//! assert!(traversal_angle(up) < 1e-9);
//! assert!(traversal_angle(Vec3::new(0.0, 0.0, -1.0)) < 1e-9);
//! ```

/// Gravity direction used as the reference for inclination.
pub const GRAVITY: Vec3 = Vec3 {
    x: 0.0,
    y: 0.0,
    z: -1.0,
};

/// A 3-D vector / point in world coordinates (metres).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    /// Create a new vector.
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// The zero vector.
    pub fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    pub fn from_array(a: [f64; 3]) -> Self {
        Self::new(a[0], a[1], a[2])
    }

    pub fn to_array(self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }

    pub fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }

    pub fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }

    pub fn scale(self, k: f64) -> Self {
        Self::new(self.x * k, self.y * k, self.z * k)
    }

    pub fn dot(self, rhs: Self) -> f64 {
        self.x * rhs.x + self.y * rhs.y + self.z * rhs.z
    }

    pub fn cross(self, rhs: Self) -> Self {
        Self::new(
            self.y * rhs.z - self.z * rhs.y,
            self.z * rhs.x - self.x * rhs.z,
            self.x * rhs.y - self.y * rhs.x,
        )
    }

    /// Euclidean length.
    pub fn norm(self) -> f64 {
        self.dot(self).sqrt()
    }

    /// Unit vector in the same direction, or `None` for a zero vector.
    pub fn normalized(self) -> Option<Self> {
        let n = self.norm();
        if n > f64::EPSILON {
            Some(self.scale(1.0 / n))
        } else {
            None
        }
    }

    pub fn distance(self, other: Self) -> f64 {
        self.sub(other).norm()
    }

    /// Projection onto the horizontal plane (z dropped to 0).
    pub fn xy(self) -> Self {
        Self::new(self.x, self.y, 0.0)
    }
}

/// Angle between two vectors in degrees, in `[0, 180]`.
///
/// Returns `0.0` when either vector has zero length.
pub fn angle_between(a: Vec3, b: Vec3) -> f64 {
    let denom = a.norm() * b.norm();
    if denom <= f64::EPSILON {
        return 0.0;
    }
    (a.dot(b) / denom).clamp(-1.0, 1.0).acos().to_degrees()
}

/// Inclination of a surface with the given normal, relative to gravity.
///
/// Angles above 90° are folded back into `[0, 90]` so that faces with
/// inverted normals are measured the same as correctly oriented ones.
pub fn traversal_angle(normal: Vec3) -> f64 {
    let theta = angle_between(normal, GRAVITY);
    if theta > 90.0 {
        (theta - 180.0).abs()
    } else {
        theta
    }
}
