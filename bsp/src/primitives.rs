//! Geometric primitives and predicates shared by the tree, clipper, and
//! editor modules. `Vec3` comes from `glam`, as the teacher's crates use it
//! everywhere a 3-float vector is needed.

use common::EPSILON;
use glam::Vec3;

use crate::types::Plane;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub mins: Vec3,
    pub maxs: Vec3,
}

impl Aabb {
    pub fn empty() -> Self {
        Self {
            mins: Vec3::splat(f32::INFINITY),
            maxs: Vec3::splat(f32::NEG_INFINITY),
        }
    }

    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Self {
        let mut aabb = Self::empty();
        for p in points {
            aabb.grow(p);
        }
        aabb
    }

    pub fn grow(&mut self, p: Vec3) {
        self.mins = self.mins.min(p);
        self.maxs = self.maxs.max(p);
    }

    pub fn merge(&self, other: &Self) -> Self {
        Self {
            mins: self.mins.min(other.mins),
            maxs: self.maxs.max(other.maxs),
        }
    }

    pub fn size(&self) -> Vec3 {
        self.maxs - self.mins
    }

    pub fn center(&self) -> Vec3 {
        (self.mins + self.maxs) * 0.5
    }

    pub fn contains_point(&self, p: Vec3) -> bool {
        p.cmpge(self.mins - Vec3::splat(EPSILON)).all()
            && p.cmple(self.maxs + Vec3::splat(EPSILON)).all()
    }

    pub fn overlaps(&self, other: &Self) -> bool {
        self.mins.x < other.maxs.x - EPSILON
            && self.maxs.x > other.mins.x + EPSILON
            && self.mins.y < other.maxs.y - EPSILON
            && self.maxs.y > other.mins.y + EPSILON
            && self.mins.z < other.maxs.z - EPSILON
            && self.maxs.z > other.mins.z + EPSILON
    }

    /// Returns true if the two boxes can be separated along `axis` (0=x,
    /// 1=y, 2=z) with a non-negative gap.
    pub fn separable_on_axis(&self, other: &Self, axis: usize) -> bool {
        let (a_min, a_max) = (self.mins[axis], self.maxs[axis]);
        let (b_min, b_max) = (other.mins[axis], other.maxs[axis]);
        a_max <= b_min + EPSILON || b_max <= a_min + EPSILON
    }

    /// The axis (and gap) with the largest separating distance between the
    /// two boxes, used by `get_separation_plane`.
    pub fn largest_gap_axis(&self, other: &Self) -> Option<(usize, f32)> {
        (0..3)
            .filter_map(|axis| {
                let (a_min, a_max) = (self.mins[axis], self.maxs[axis]);
                let (b_min, b_max) = (other.mins[axis], other.maxs[axis]);
                if a_max <= b_min + EPSILON {
                    Some((axis, b_min - a_max))
                } else if b_max <= a_min + EPSILON {
                    Some((axis, a_min - b_max))
                } else {
                    None
                }
            })
            .max_by(|a, b| a.1.total_cmp(&b.1))
    }
}

/// Ray/plane intersection; returns the `t` along `origin + t*dir` where the
/// ray crosses the plane, or `None` if parallel.
pub fn ray_plane_intersect(origin: Vec3, dir: Vec3, plane: &Plane) -> Option<f32> {
    let denom = plane.normal.dot(dir);
    if denom.abs() <= EPSILON {
        return None;
    }
    Some((plane.distance - plane.normal.dot(origin)) / denom)
}

/// Ray/AABB slab intersection, returning `(t_enter, t_exit)` if the ray
/// crosses the box at all.
pub fn ray_aabb_intersect(origin: Vec3, dir: Vec3, aabb: &Aabb) -> Option<(f32, f32)> {
    let mut t_min = f32::NEG_INFINITY;
    let mut t_max = f32::INFINITY;

    for axis in 0..3 {
        let o = origin[axis];
        let d = dir[axis];
        let (lo, hi) = (aabb.mins[axis], aabb.maxs[axis]);

        if d.abs() <= EPSILON {
            if o < lo || o > hi {
                return None;
            }
            continue;
        }

        let mut t1 = (lo - o) / d;
        let mut t2 = (hi - o) / d;
        if t1 > t2 {
            std::mem::swap(&mut t1, &mut t2);
        }
        t_min = t_min.max(t1);
        t_max = t_max.min(t2);
        if t_min > t_max {
            return None;
        }
    }

    Some((t_min, t_max))
}

/// Projects 3D polygon verts onto 2D using the plane's dominant axis, for a
/// point-in-polygon test or a UV-extent computation.
pub fn project_to_2d(normal: Vec3, points: &[Vec3]) -> Vec<(f32, f32)> {
    let (ax, ay, az) = (normal.x.abs(), normal.y.abs(), normal.z.abs());
    if az >= ax && az >= ay {
        points.iter().map(|p| (p.x, p.y)).collect()
    } else if ay >= ax && ay >= az {
        points.iter().map(|p| (p.x, p.z)).collect()
    } else {
        points.iter().map(|p| (p.y, p.z)).collect()
    }
}

/// Ray/convex-polygon intersection: intersect the ray with the polygon's
/// plane, then test the hit point for containment via a 2D point-in-polygon
/// check (the polygon must be planar and CCW-wound, as faces always are).
pub fn ray_polygon_intersect(origin: Vec3, dir: Vec3, plane: &Plane, verts: &[Vec3]) -> Option<Vec3> {
    let t = ray_plane_intersect(origin, dir, plane)?;
    if t < 0.0 {
        return None;
    }
    let hit = origin + dir * t;

    let pts2d = project_to_2d(plane.normal, verts);
    let hit2d = project_to_2d(plane.normal, &[hit])[0];

    point_in_polygon_2d(hit2d, &pts2d).then_some(hit)
}

fn point_in_polygon_2d(p: (f32, f32), poly: &[(f32, f32)]) -> bool {
    let mut inside = false;
    let n = poly.len();
    for i in 0..n {
        let (xi, yi) = poly[i];
        let (xj, yj) = poly[(i + n - 1) % n];

        let intersects = ((yi > p.1) != (yj > p.1))
            && (p.0 < (xj - xi) * (p.1 - yi) / (yj - yi + f32::EPSILON) + xi);
        if intersects {
            inside = !inside;
        }
    }
    inside
}

/// True if every point in `verts` lies on the same side of `plane` (within
/// epsilon); used by convexity checks.
pub fn verts_all_on_one_side(plane: &Plane, verts: &[Vec3]) -> bool {
    let mut sign = 0i32;
    for &v in verts {
        let d = plane.side_distance(v);
        if d > EPSILON {
            if sign < 0 {
                return false;
            }
            sign = 1;
        } else if d < -EPSILON {
            if sign > 0 {
                return false;
            }
            sign = -1;
        }
    }
    true
}

/// Sorts a set of coplanar points into CCW winding order (as seen from the
/// side the normal points to), about their centroid.
pub fn sort_coplanar_ccw(normal: Vec3, points: &mut [Vec3]) {
    if points.len() < 3 {
        return;
    }
    let centroid = points.iter().fold(Vec3::ZERO, |a, &b| a + b) / points.len() as f32;

    let reference = (points[0] - centroid).normalize_or_zero();
    let tangent = normal.cross(reference).normalize_or_zero();

    points.sort_by(|&a, &b| {
        let da = a - centroid;
        let db = b - centroid;
        let angle_a = reference.dot(da).atan2(tangent.dot(da));
        let angle_b = reference.dot(db).atan2(tangent.dot(db));
        angle_a.total_cmp(&angle_b)
    });
}

#[cfg(test)]
mod test {
    use super::*;

    fn plane_z(d: f32) -> Plane {
        Plane {
            normal: Vec3::Z,
            distance: d,
            type_: crate::types::PlaneType::Z,
        }
    }

    #[test]
    fn aabb_merge_covers_both() {
        let a = Aabb { mins: Vec3::splat(-1.0), maxs: Vec3::splat(1.0) };
        let b = Aabb { mins: Vec3::splat(0.0), maxs: Vec3::splat(5.0) };
        let m = a.merge(&b);
        assert_eq!(m.mins, Vec3::splat(-1.0));
        assert_eq!(m.maxs, Vec3::splat(5.0));
    }

    #[test]
    fn ray_plane_intersect_parallel_is_none() {
        let plane = plane_z(0.0);
        assert!(ray_plane_intersect(Vec3::new(0.0, 0.0, 5.0), Vec3::X, &plane).is_none());
    }

    #[test]
    fn ray_plane_intersect_perpendicular_hits() {
        let plane = plane_z(10.0);
        let t = ray_plane_intersect(Vec3::ZERO, Vec3::Z, &plane).unwrap();
        assert!((t - 10.0).abs() < EPSILON);
    }

    #[test]
    fn verts_all_on_one_side_detects_straddle() {
        let plane = plane_z(0.0);
        let verts = [Vec3::new(0.0, 0.0, 1.0), Vec3::new(0.0, 0.0, -1.0)];
        assert!(!verts_all_on_one_side(&plane, &verts));
    }

    #[test]
    fn verts_all_on_one_side_true_when_coplanar() {
        let plane = plane_z(0.0);
        let verts = [Vec3::new(1.0, 0.0, 0.0), Vec3::new(-1.0, 2.0, 0.0)];
        assert!(verts_all_on_one_side(&plane, &verts));
    }

    #[test]
    fn largest_gap_axis_picks_separated_axis() {
        let a = Aabb { mins: Vec3::new(-32.0, -32.0, -32.0), maxs: Vec3::new(32.0, 32.0, 32.0) };
        let b = Aabb { mins: Vec3::new(100.0, -32.0, -32.0), maxs: Vec3::new(164.0, 32.0, 32.0) };
        let (axis, gap) = a.largest_gap_axis(&b).unwrap();
        assert_eq!(axis, 0);
        assert!(gap > 0.0);
    }
}
