//! Read-only query layer composing the parsed lumps with the entity table.
//! Nothing here mutates; edits go through the model/face editors and come
//! back as a fresh [`crate::types::Bsp`].

use glam::Vec3;

use crate::{
    primitives::Aabb,
    types::{Bsp, Face, Model},
};

impl Bsp {
    /// The model index owning `face_idx`, by linear scan of model face
    /// ranges (models own contiguous runs of faces).
    pub fn model_from_face(&self, face_idx: usize) -> Option<usize> {
        self.models.iter().position(|m| {
            let first = m.first_face as usize;
            let count = m.face_count as usize;
            face_idx >= first && face_idx < first + count
        })
    }

    /// The leaf that references `face_idx` via its mark-surface list, if any.
    pub fn leaf_from_face(&self, face_idx: usize) -> Option<usize> {
        self.leaves.iter().position(|leaf| {
            let first = leaf.first_mark_surface as usize;
            let count = leaf.mark_surface_count as usize;
            self.mark_surfaces[first..first + count]
                .iter()
                .any(|&ms| ms as usize == face_idx)
        })
    }

    /// Entities referencing `model_idx` via `"model" "*N"` (model 0 is
    /// implicitly owned by `worldspawn`).
    pub fn model_entities(&self, model_idx: usize) -> Vec<usize> {
        if model_idx == 0 {
            return self.entities.worldspawn_index().into_iter().collect();
        }

        (0..self.entities.len())
            .filter(|&i| self.entities.get_bsp_model_idx(i) == Some(model_idx))
            .collect()
    }

    /// AABB over every vertex referenced by the model's faces (via its
    /// surfedges), independent of the stored mins/maxs fields.
    pub fn model_vertex_bounds(&self, model_idx: usize) -> Aabb {
        let Some(model) = self.models.get(model_idx) else {
            return Aabb::empty();
        };

        let mut aabb = Aabb::empty();
        let first = model.first_face as usize;
        let count = model.face_count as usize;

        for face in &self.faces[first..first.saturating_add(count).min(self.faces.len())] {
            for v in self.face_vertices(face) {
                aabb.grow(v);
            }
        }

        aabb
    }

    /// AABB over the model's collision hull 1 clipnode tree's implied bounds
    /// (falls back to the stored model bounds, since clipnodes don't carry
    /// per-node AABBs the way visible nodes do).
    pub fn model_hull_bounds(&self, model_idx: usize) -> Aabb {
        self.models
            .get(model_idx)
            .map(Model::aabb)
            .unwrap_or_else(Aabb::empty)
    }

    /// Worldspawn extents, optionally offset by the entity's `origin`.
    pub fn bounding_box(&self, apply_origin: bool) -> Aabb {
        let mut aabb = self.model_vertex_bounds(0);

        if apply_origin {
            if let Some(ws) = self.entities.worldspawn_index() {
                if let Some(origin) = self.entities.get_keyvalue(ws, "origin") {
                    if let Some(delta) = parse_vec3(origin) {
                        aabb.mins += delta;
                        aabb.maxs += delta;
                    }
                }
            }
        }

        aabb
    }

    pub fn model_center(&self, model_idx: usize) -> Vec3 {
        self.models
            .get(model_idx)
            .map(|m| m.aabb().center())
            .unwrap_or(Vec3::ZERO)
    }

    pub fn face_center(&self, face_idx: usize) -> Vec3 {
        let Some(face) = self.faces.get(face_idx) else {
            return Vec3::ZERO;
        };
        let verts = self.face_vertices(face);
        if verts.is_empty() {
            return Vec3::ZERO;
        }
        verts.iter().fold(Vec3::ZERO, |a, &b| a + b) / verts.len() as f32
    }

    /// Resolves a face's ordered vertex loop via its surfedges. Surfedge
    /// sign selects which endpoint of the edge is "first" for winding.
    pub fn face_vertices(&self, face: &Face) -> Vec<Vec3> {
        let first = face.first_edge as usize;
        let count = face.edge_count as usize;

        self.surf_edges[first..first + count]
            .iter()
            .map(|&se| {
                let edge = self.edges[se.unsigned_abs() as usize];
                let vert_idx = if se >= 0 { edge[0] } else { edge[1] };
                self.vertices[vert_idx as usize]
            })
            .collect()
    }
}

fn parse_vec3(s: &str) -> Option<Vec3> {
    let mut parts = s.split_whitespace();
    let x = parts.next()?.parse().ok()?;
    let y = parts.next()?.parse().ok()?;
    let z = parts.next()?.parse().ok()?;
    Some(Vec3::new(x, y, z))
}
