//! Converts an ordered list of oriented cutting planes into an explicit
//! convex polyhedron mesh: the inverse of tree traversal.
//!
//! Starts from a cube far larger than any real map, then successively
//! clips every face against each plane (Sutherland-Hodgman), capping the
//! cut with a new face built from the segments the cut produced. Used to
//! draw a selected clipnode volume, and by the model editor to derive
//! vertex bounds for models with no visible faces of their own.

use common::EPSILON;
use glam::Vec3;

use crate::{constants::DEFAULT_MAP_EXTENT, primitives::sort_coplanar_ccw, types::Plane};

#[derive(Debug, Clone)]
pub struct ClipVertex {
    pub pos: Vec3,
    pub visible: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct ClipEdge {
    pub a: usize,
    pub b: usize,
    pub visible: bool,
}

#[derive(Debug, Clone)]
pub struct ClipFace {
    pub plane: Plane,
    pub verts: Vec<usize>,
    pub visible: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ClipMesh {
    pub vertices: Vec<ClipVertex>,
    pub faces: Vec<ClipFace>,
}

impl ClipMesh {
    fn add_vertex(&mut self, pos: Vec3) -> usize {
        if let Some(i) = self.vertices.iter().position(|v| v.pos.distance(pos) <= EPSILON) {
            return i;
        }
        self.vertices.push(ClipVertex { pos, visible: true });
        self.vertices.len() - 1
    }

    /// Derives the unique edge set from every face's vertex loop. An edge
    /// shared by a visible and a hidden face is reported visible.
    pub fn edges(&self) -> Vec<ClipEdge> {
        let mut edges: Vec<ClipEdge> = Vec::new();
        for face in &self.faces {
            let n = face.verts.len();
            for i in 0..n {
                let a = face.verts[i];
                let b = face.verts[(i + 1) % n];
                if let Some(e) = edges
                    .iter_mut()
                    .find(|e| (e.a == a && e.b == b) || (e.a == b && e.b == a))
                {
                    e.visible |= face.visible;
                } else {
                    edges.push(ClipEdge { a, b, visible: face.visible });
                }
            }
        }
        edges
    }

    pub fn visible_vertex_positions(&self) -> Vec<Vec3> {
        self.vertices.iter().filter(|v| v.visible).map(|v| v.pos).collect()
    }

    pub fn centroid(&self) -> Vec3 {
        let pts = self.visible_vertex_positions();
        if pts.is_empty() {
            return Vec3::ZERO;
        }
        pts.iter().fold(Vec3::ZERO, |a, &b| a + b) / pts.len() as f32
    }

    fn recompute_vertex_visibility(&mut self) {
        for v in &mut self.vertices {
            v.visible = false;
        }
        for face in &self.faces {
            if !face.visible {
                continue;
            }
            for &idx in &face.verts {
                self.vertices[idx].visible = true;
            }
        }
    }
}

/// Builds the convex mesh resulting from successively cutting a huge seed
/// cube by `planes`, in order.
pub fn build(planes: &[Plane]) -> ClipMesh {
    let mut mesh = seed_cube(DEFAULT_MAP_EXTENT * 2.0);

    for plane in planes {
        cut(&mut mesh, plane);
    }

    mesh.recompute_vertex_visibility();
    mesh
}

fn seed_cube(half_extent: f32) -> ClipMesh {
    let m = -half_extent;
    let x = half_extent;

    let faces: [(Vec3, [Vec3; 4]); 6] = [
        (
            Vec3::X,
            [
                Vec3::new(x, m, m),
                Vec3::new(x, x, m),
                Vec3::new(x, x, x),
                Vec3::new(x, m, x),
            ],
        ),
        (
            Vec3::NEG_X,
            [
                Vec3::new(m, m, x),
                Vec3::new(m, x, x),
                Vec3::new(m, x, m),
                Vec3::new(m, m, m),
            ],
        ),
        (
            Vec3::Y,
            [
                Vec3::new(m, x, m),
                Vec3::new(m, x, x),
                Vec3::new(x, x, x),
                Vec3::new(x, x, m),
            ],
        ),
        (
            Vec3::NEG_Y,
            [
                Vec3::new(m, m, x),
                Vec3::new(m, m, m),
                Vec3::new(x, m, m),
                Vec3::new(x, m, x),
            ],
        ),
        (
            Vec3::Z,
            [
                Vec3::new(m, m, x),
                Vec3::new(x, m, x),
                Vec3::new(x, x, x),
                Vec3::new(m, x, x),
            ],
        ),
        (
            Vec3::NEG_Z,
            [
                Vec3::new(m, m, m),
                Vec3::new(m, x, m),
                Vec3::new(x, x, m),
                Vec3::new(x, m, m),
            ],
        ),
    ];

    let mut mesh = ClipMesh::default();

    for (normal, corners) in faces {
        let indices: Vec<usize> = corners.into_iter().map(|c| mesh.add_vertex(c)).collect();
        let distance = normal.dot(corners[0]);
        mesh.faces.push(ClipFace {
            plane: Plane {
                type_: crate::types::PlaneType::classify(normal),
                normal,
                distance,
            },
            verts: indices,
            visible: true,
        });
    }

    mesh
}

/// Clips `mesh` by `plane`, keeping the side with `side_distance <= 0` and
/// capping the cut with a new face built from the crossing segments.
fn cut(mesh: &mut ClipMesh, plane: &Plane) {
    let snapshot: Vec<Vec<Vec3>> = mesh
        .faces
        .iter()
        .map(|f| f.verts.iter().map(|&i| mesh.vertices[i].pos).collect())
        .collect();

    let mut cap_points: Vec<Vec3> = Vec::new();
    let mut updates: Vec<(usize, Vec<Vec3>)> = Vec::new();

    for (face_idx, poly) in snapshot.iter().enumerate() {
        if !mesh.faces[face_idx].visible {
            continue;
        }
        let (clipped, crossings) = clip_polygon(poly, plane);
        cap_points.extend(crossings);
        updates.push((face_idx, clipped));
    }

    for (face_idx, clipped) in updates {
        if clipped.len() < 3 {
            mesh.faces[face_idx].visible = false;
            mesh.faces[face_idx].verts.clear();
            continue;
        }
        let indices: Vec<usize> = clipped.into_iter().map(|p| mesh.add_vertex(p)).collect();
        mesh.faces[face_idx].verts = indices;
    }

    dedup_points(&mut cap_points);
    if cap_points.len() < 3 {
        return;
    }

    sort_coplanar_ccw(plane.normal, &mut cap_points);
    let indices: Vec<usize> = cap_points.into_iter().map(|p| mesh.add_vertex(p)).collect();

    mesh.faces.push(ClipFace {
        plane: plane.clone(),
        verts: indices,
        visible: true,
    });
}

fn dedup_points(points: &mut Vec<Vec3>) {
    let mut out: Vec<Vec3> = Vec::new();
    for &p in points.iter() {
        if !out.iter().any(|&q| q.distance(p) <= EPSILON) {
            out.push(p);
        }
    }
    *points = out;
}

/// Sutherland-Hodgman clip of a CCW polygon against `plane`, keeping the
/// portion with `side_distance <= 0`. Returns the clipped loop and the
/// crossing points created by the cut (0 or 2 per clipped polygon).
fn clip_polygon(poly: &[Vec3], plane: &Plane) -> (Vec<Vec3>, Vec<Vec3>) {
    if poly.len() < 3 {
        return (Vec::new(), Vec::new());
    }

    let mut output = Vec::new();
    let mut crossings = Vec::new();
    let n = poly.len();

    for i in 0..n {
        let cur = poly[i];
        let prev = poly[(i + n - 1) % n];

        let cur_d = plane.side_distance(cur);
        let prev_d = plane.side_distance(prev);
        let cur_in = cur_d <= EPSILON;
        let prev_in = prev_d <= EPSILON;

        if cur_in != prev_in {
            let t = prev_d / (prev_d - cur_d);
            let cross = prev + (cur - prev) * t;
            output.push(cross);
            crossings.push(cross);
        }
        if cur_in {
            output.push(cur);
        }
    }

    (output, crossings)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::types::PlaneType;

    fn axis_planes(half: f32) -> Vec<Plane> {
        vec![
            Plane { normal: Vec3::X, distance: half, type_: PlaneType::X },
            Plane { normal: Vec3::NEG_X, distance: half, type_: PlaneType::X },
            Plane { normal: Vec3::Y, distance: half, type_: PlaneType::Y },
            Plane { normal: Vec3::NEG_Y, distance: half, type_: PlaneType::Y },
            Plane { normal: Vec3::Z, distance: half, type_: PlaneType::Z },
            Plane { normal: Vec3::NEG_Z, distance: half, type_: PlaneType::Z },
        ]
    }

    #[test]
    fn six_planes_produce_a_cube() {
        let mesh = build(&axis_planes(32.0));

        assert_eq!(mesh.faces.iter().filter(|f| f.visible).count(), 6);
        assert_eq!(mesh.visible_vertex_positions().len(), 8);
    }

    #[test]
    fn cube_centroid_is_origin() {
        let mesh = build(&axis_planes(32.0));
        let c = mesh.centroid();
        assert!(c.length() < 1.0);
    }

    #[test]
    fn single_plane_leaves_mesh_degenerate_half_space() {
        // one cutting plane alone doesn't bound a finite solid; the seed
        // cube should simply shrink to half, all 6 original faces surviving
        // plus the new cap.
        let mesh = build(&[Plane { normal: Vec3::X, distance: 0.0, type_: PlaneType::X }]);
        assert!(mesh.faces.iter().any(|f| f.visible && f.plane.normal == Vec3::X));
    }
}
