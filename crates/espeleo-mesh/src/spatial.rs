//! Spatial index for mesh vertices and graph nodes.
//!
//! Partitions 3-D space using a recursive **Octree** of `(point, id)`
//! entries so the planner can quickly answer "which node is closest to this
//! point?" and "which nodes lie within this radius?".  Both queries are
//! used heavily while reconnecting filtered graphs and clustering
//! frontiers.
//!
//! # Key types
//!
//! | Type | Role |
//! |------|------|
//! | [`Aabb`]     | An axis-aligned bounding box.                          |
//! | [`Octree`]   | Spatial index; insert entries, nearest / radius query. |
//!
//! # Example
//!
//! ```rust
//! use espeleo_mesh::geometry::Vec3;
//! use espeleo_mesh::spatial::Octree;
//!
//! let tree = Octree::from_entries([
//!     (Vec3::new(0.0, 0.0, 0.0), 10),
//!     (Vec3::new(5.0, 0.0, 0.0), 11),
//!     (Vec3::new(5.0, 5.0, 0.0), 12),
//! ]);
//!
//! let (id, dist) = tree.nearest(Vec3::new(4.0, 0.5, 0.0)).unwrap();
//! assert_eq!(id, 11);
//! assert!(dist < 1.2);
//!
//! assert_eq!(tree.within_radius(Vec3::new(5.0, 2.5, 0.0), 3.0), vec![11, 12]);
//! ```

use crate::geometry::Vec3;

// ────────────────────────────────────────────────────────────────────────────
// Aabb
// ────────────────────────────────────────────────────────────────────────────

/// An axis-aligned bounding box, defined by its minimum and maximum corners.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    /// Create a bounding box from its two opposite corners.
    ///
    /// The constructor normalises the corners so that `min ≤ max` per axis.
    pub fn new(a: Vec3, b: Vec3) -> Self {
        Self {
            min: Vec3::new(a.x.min(b.x), a.y.min(b.y), a.z.min(b.z)),
            max: Vec3::new(a.x.max(b.x), a.y.max(b.y), a.z.max(b.z)),
        }
    }

    /// Smallest box containing every point, or `None` for an empty input.
    pub fn enclosing<I: IntoIterator<Item = Vec3>>(points: I) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut b = Aabb::new(first, first);
        for p in iter {
            b.min = Vec3::new(b.min.x.min(p.x), b.min.y.min(p.y), b.min.z.min(p.z));
            b.max = Vec3::new(b.max.x.max(p.x), b.max.y.max(p.y), b.max.z.max(p.z));
        }
        Some(b)
    }

    /// Grow the box by `margin` on every side.
    pub fn padded(&self, margin: f64) -> Self {
        let m = Vec3::new(margin, margin, margin);
        Self {
            min: self.min.sub(m),
            max: self.max.add(m),
        }
    }

    /// Return the centre point of the box.
    pub fn centre(&self) -> Vec3 {
        self.min.add(self.max).scale(0.5)
    }

    /// True when the point lies inside or on the boundary of the box.
    pub fn contains_point(&self, p: Vec3) -> bool {
        p.x >= self.min.x
            && p.x <= self.max.x
            && p.y >= self.min.y
            && p.y <= self.max.y
            && p.z >= self.min.z
            && p.z <= self.max.z
    }

    /// Distance from `p` to the closest point of the box (0 when inside).
    pub fn distance_to(&self, p: Vec3) -> f64 {
        let dx = (self.min.x - p.x).max(0.0).max(p.x - self.max.x);
        let dy = (self.min.y - p.y).max(0.0).max(p.y - self.max.y);
        let dz = (self.min.z - p.z).max(0.0).max(p.z - self.max.z);
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Octree
// ────────────────────────────────────────────────────────────────────────────

/// A recursive spatial index that subdivides 3-D space into eight octants.
///
/// Entries are stored in the deepest node whose bounding box still contains
/// them.  Subdividing stops when either
/// - the number of entries in a node is ≤ `capacity`, or
/// - `max_depth` levels have already been created.
#[derive(Debug, Clone)]
pub struct Octree {
    root: OctreeNode,
    max_depth: usize,
}

const DEFAULT_CAPACITY: usize = 16;
const DEFAULT_MAX_DEPTH: usize = 12;

impl Octree {
    /// Create an empty octree covering `bounds`.
    ///
    /// - `capacity` – maximum entries per leaf before subdivision is attempted.
    pub fn new(bounds: Aabb, capacity: usize) -> Self {
        Self::with_max_depth(bounds, capacity, DEFAULT_MAX_DEPTH)
    }

    /// Create an empty octree with an explicit maximum subdivision depth.
    pub fn with_max_depth(bounds: Aabb, capacity: usize, max_depth: usize) -> Self {
        Self {
            root: OctreeNode::new(bounds, capacity.max(1)),
            max_depth,
        }
    }

    /// Build a tree whose bounds enclose every entry.
    pub fn from_entries<I: IntoIterator<Item = (Vec3, usize)>>(entries: I) -> Self {
        let entries: Vec<(Vec3, usize)> = entries.into_iter().collect();
        let bounds = Aabb::enclosing(entries.iter().map(|(p, _)| *p))
            .unwrap_or(Aabb::new(Vec3::zero(), Vec3::zero()))
            .padded(1e-6);
        let mut tree = Self::new(bounds, DEFAULT_CAPACITY);
        tree.merge(&entries);
        tree
    }

    /// Insert an entry into the tree.
    ///
    /// Entries outside the root bounding box are silently ignored.
    pub fn insert(&mut self, point: Vec3, id: usize) {
        self.root.insert((point, id), self.max_depth, 0);
    }

    /// Return the total number of entries stored in the tree.
    pub fn len(&self) -> usize {
        self.root.count()
    }

    /// True when the tree contains no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Closest entry to `p` as `(id, distance)`.
    ///
    /// Ties are broken towards the smaller id.  Returns `None` for an empty
    /// tree.
    pub fn nearest(&self, p: Vec3) -> Option<(usize, f64)> {
        let mut best: Option<(usize, f64)> = None;
        self.root.nearest(p, &mut best);
        best
    }

    /// Ids of every entry within `radius` of `p` (inclusive), sorted.
    pub fn within_radius(&self, p: Vec3, radius: f64) -> Vec<usize> {
        let mut out = Vec::new();
        self.root.within_radius(p, radius, &mut out);
        out.sort_unstable();
        out
    }

    /// Merge a set of entries into this tree.
    ///
    /// Entries that fall outside the root bounding box are silently
    /// ignored, consistent with [`insert`][Self::insert].
    pub fn merge(&mut self, entries: &[(Vec3, usize)]) {
        for &(p, id) in entries {
            self.insert(p, id);
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// OctreeNode – internal implementation
// ────────────────────────────────────────────────────────────────────────────

type Entry = (Vec3, usize);

#[derive(Debug, Clone)]
struct OctreeNode {
    bounds: Aabb,
    capacity: usize,
    /// Entries stored at this node (only non-empty when the node is a leaf).
    entries: Vec<Entry>,
    /// Eight children; `None` while this node is a leaf.
    children: Option<Box<[OctreeNode; 8]>>,
}

impl OctreeNode {
    fn new(bounds: Aabb, capacity: usize) -> Self {
        Self {
            bounds,
            capacity,
            entries: Vec::new(),
            children: None,
        }
    }

    fn count(&self) -> usize {
        match &self.children {
            None => self.entries.len(),
            Some(children) => children.iter().map(|c| c.count()).sum(),
        }
    }

    fn insert(&mut self, entry: Entry, max_depth: usize, depth: usize) {
        if !self.bounds.contains_point(entry.0) {
            return;
        }

        match self.children.as_mut() {
            None => {
                self.entries.push(entry);
                // Subdivide when over capacity and depth budget remains.
                if self.entries.len() > self.capacity && depth < max_depth {
                    self.subdivide(max_depth, depth);
                }
            }
            Some(children) => {
                if let Some(child) = children
                    .iter_mut()
                    .find(|c| c.bounds.contains_point(entry.0))
                {
                    child.insert(entry, max_depth, depth + 1);
                }
            }
        }
    }

    fn nearest(&self, p: Vec3, best: &mut Option<(usize, f64)>) {
        if let Some((_, best_d)) = *best {
            if self.bounds.distance_to(p) > best_d {
                return;
            }
        }
        match &self.children {
            None => {
                for &(q, id) in &self.entries {
                    let d = q.distance(p);
                    let better = match *best {
                        None => true,
                        Some((best_id, best_d)) => d < best_d || (d == best_d && id < best_id),
                    };
                    if better {
                        *best = Some((id, d));
                    }
                }
            }
            Some(children) => {
                // Visit the closest octants first so pruning kicks in early.
                let mut order: Vec<(f64, &OctreeNode)> = children
                    .iter()
                    .map(|c| (c.bounds.distance_to(p), c))
                    .collect();
                order.sort_by(|a, b| a.0.total_cmp(&b.0));
                for (_, child) in order {
                    child.nearest(p, best);
                }
            }
        }
    }

    fn within_radius(&self, p: Vec3, radius: f64, out: &mut Vec<usize>) {
        if self.bounds.distance_to(p) > radius {
            return;
        }
        match &self.children {
            None => out.extend(
                self.entries
                    .iter()
                    .filter(|(q, _)| q.distance(p) <= radius)
                    .map(|(_, id)| *id),
            ),
            Some(children) => {
                for child in children.iter() {
                    child.within_radius(p, radius, out);
                }
            }
        }
    }

    /// Split this leaf into eight children and redistribute existing entries.
    fn subdivide(&mut self, max_depth: usize, depth: usize) {
        let c = self.bounds.centre();
        let min = self.bounds.min;
        let max = self.bounds.max;

        let octants = [
            Aabb::new(min, c),
            Aabb::new(Vec3::new(c.x, min.y, min.z), Vec3::new(max.x, c.y, c.z)),
            Aabb::new(Vec3::new(min.x, c.y, min.z), Vec3::new(c.x, max.y, c.z)),
            Aabb::new(Vec3::new(c.x, c.y, min.z), Vec3::new(max.x, max.y, c.z)),
            Aabb::new(Vec3::new(min.x, min.y, c.z), Vec3::new(c.x, c.y, max.z)),
            Aabb::new(Vec3::new(c.x, min.y, c.z), Vec3::new(max.x, c.y, max.z)),
            Aabb::new(Vec3::new(min.x, c.y, c.z), Vec3::new(c.x, max.y, max.z)),
            Aabb::new(c, max),
        ];

        let cap = self.capacity;
        let mut children = Box::new(octants.map(|b| OctreeNode::new(b, cap)));

        let entries = std::mem::take(&mut self.entries);
        for e in entries {
            if let Some(child) = children.iter_mut().find(|c| c.bounds.contains_point(e.0)) {
                child.insert(e, max_depth, depth + 1);
            }
        }

        self.children = Some(children);
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_tree(capacity: usize) -> Octree {
        Octree::new(
            Aabb::new(Vec3::new(0.0, 0.0, 0.0), Vec3::new(1.0, 1.0, 1.0)),
            capacity,
        )
    }

    fn brute_nearest(entries: &[(Vec3, usize)], p: Vec3) -> (usize, f64) {
        entries
            .iter()
            .map(|(q, id)| (*id, q.distance(p)))
            .min_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)))
            .unwrap()
    }

    // ── Aabb ────────────────────────────────────────────────────────────────

    #[test]
    fn aabb_normalises_min_max() {
        let b = Aabb::new(Vec3::new(2.0, 2.0, 2.0), Vec3::new(0.0, 0.0, 0.0));
        assert_eq!(b.min, Vec3::new(0.0, 0.0, 0.0));
        assert_eq!(b.max, Vec3::new(2.0, 2.0, 2.0));
    }

    #[test]
    fn aabb_distance_inside_is_zero_and_outside_is_euclidean() {
        let b = Aabb::new(Vec3::new(0.0, 0.0, 0.0), Vec3::new(1.0, 1.0, 1.0));
        assert_eq!(b.distance_to(Vec3::new(0.5, 0.5, 0.5)), 0.0);
        assert!((b.distance_to(Vec3::new(4.0, 5.0, 0.5)) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn aabb_enclosing_covers_all_points() {
        let pts = [
            Vec3::new(-1.0, 2.0, 0.0),
            Vec3::new(3.0, -4.0, 1.0),
            Vec3::new(0.0, 0.0, -2.0),
        ];
        let b = Aabb::enclosing(pts).unwrap();
        assert!(pts.iter().all(|p| b.contains_point(*p)));
        assert!(Aabb::enclosing(Vec::<Vec3>::new()).is_none());
    }

    // ── Octree – insert ─────────────────────────────────────────────────────

    #[test]
    fn insert_outside_bounds_is_ignored() {
        let mut tree = unit_tree(4);
        tree.insert(Vec3::new(5.0, 5.0, 5.0), 0);
        assert!(tree.is_empty());
    }

    #[test]
    fn subdivision_preserves_all_entries() {
        let mut tree = unit_tree(2);
        let pts = [
            Vec3::new(0.1, 0.1, 0.1),
            Vec3::new(0.9, 0.9, 0.9),
            Vec3::new(0.2, 0.8, 0.3),
            Vec3::new(0.7, 0.2, 0.6),
        ];
        for (i, &p) in pts.iter().enumerate() {
            tree.insert(p, i);
        }
        assert_eq!(tree.len(), 4);
        for (i, &p) in pts.iter().enumerate() {
            assert_eq!(tree.nearest(p), Some((i, 0.0)), "missing {:?}", p);
        }
    }

    // ── Octree – nearest / radius ───────────────────────────────────────────

    #[test]
    fn nearest_on_empty_tree_is_none() {
        assert!(unit_tree(4).nearest(Vec3::zero()).is_none());
    }

    #[test]
    fn nearest_matches_brute_force_on_grid() {
        let mut entries = Vec::new();
        let mut id = 0;
        for ix in 0..8 {
            for iy in 0..8 {
                for iz in 0..3 {
                    let p = Vec3::new(ix as f64 * 0.7, iy as f64 * 1.3, iz as f64 * 0.4);
                    entries.push((p, id));
                    id += 1;
                }
            }
        }
        let tree = Octree::from_entries(entries.clone());
        assert_eq!(tree.len(), entries.len());

        let queries = [
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(2.31, 4.4, 0.35),
            Vec3::new(-3.0, 20.0, 1.0),
            Vec3::new(4.9, 9.1, 0.8),
        ];
        for p in queries {
            let (id, d) = tree.nearest(p).unwrap();
            let (bid, bd) = brute_nearest(&entries, p);
            assert!((d - bd).abs() < 1e-12, "query {:?}", p);
            assert_eq!(id, bid, "query {:?}", p);
        }
    }

    #[test]
    fn nearest_breaks_ties_towards_smaller_id() {
        let tree = Octree::from_entries([
            (Vec3::new(1.0, 0.0, 0.0), 7),
            (Vec3::new(-1.0, 0.0, 0.0), 3),
        ]);
        assert_eq!(tree.nearest(Vec3::zero()).unwrap().0, 3);
    }

    #[test]
    fn within_radius_is_inclusive_and_sorted() {
        let tree = Octree::from_entries([
            (Vec3::new(0.0, 0.0, 0.0), 5),
            (Vec3::new(1.0, 0.0, 0.0), 2),
            (Vec3::new(2.0, 0.0, 0.0), 9),
        ]);
        assert_eq!(tree.within_radius(Vec3::zero(), 1.0), vec![2, 5]);
        assert_eq!(tree.within_radius(Vec3::zero(), 0.5), vec![5]);
        assert!(tree.within_radius(Vec3::new(10.0, 0.0, 0.0), 1.0).is_empty());
    }

    #[test]
    fn merge_ignores_out_of_bounds_entries() {
        let mut tree = unit_tree(4);
        tree.merge(&[(Vec3::new(0.5, 0.5, 0.5), 0), (Vec3::new(5.0, 5.0, 5.0), 1)]);
        assert_eq!(tree.len(), 1);
    }
}
