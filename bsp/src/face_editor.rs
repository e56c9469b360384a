//! Per-face edits: subdividing an n-gon to shrink its lightmap footprint,
//! retargeting a shared texinfo, re-pinning UVs after a texture resize, and
//! collapsing duplicate submodels.
//!
//! Faces, marksurfaces, and node/model face ranges are all flat arrays
//! addressed by position, so inserting one face in the middle means every
//! later index across the whole file has to shift. The index bookkeeping
//! below is the price of that layout.

use std::collections::HashMap;

use common::EPSILON;
use glam::Vec3;

use crate::{
    constants::{LIGHTMAP_GRID_SIZE, MAX_LIGHTMAP_LUXELS},
    edit_env::EditEnv,
    error::EditError,
    model_editor::{format_vec3, parse_vec3},
    types::{Bsp, Face, Plane, PlaneType, TexInfo},
};

fn min_max(xs: &[f32]) -> (f32, f32) {
    (
        xs.iter().cloned().fold(f32::INFINITY, f32::min),
        xs.iter().cloned().fold(f32::NEG_INFINITY, f32::max),
    )
}

/// Lightmap footprint of a polygon under `ti`, in 16-unit-grid luxels.
fn luxel_extent_of(verts: &[Vec3], ti: &TexInfo) -> (u32, u32) {
    if verts.is_empty() {
        return (0, 0);
    }
    let us: Vec<f32> = verts.iter().map(|&v| ti.u.dot(v) + ti.u_offset).collect();
    let vs: Vec<f32> = verts.iter().map(|&v| ti.v.dot(v) + ti.v_offset).collect();
    let (u_min, u_max) = min_max(&us);
    let (v_min, v_max) = min_max(&vs);

    let u_luxels = (u_max / LIGHTMAP_GRID_SIZE).ceil() - (u_min / LIGHTMAP_GRID_SIZE).floor();
    let v_luxels = (v_max / LIGHTMAP_GRID_SIZE).ceil() - (v_min / LIGHTMAP_GRID_SIZE).floor();
    (u_luxels.max(0.0) as u32, v_luxels.max(0.0) as u32)
}

pub(crate) fn face_luxel_extent(bsp: &Bsp, face_idx: usize) -> (u32, u32) {
    let Some(face) = bsp.faces.get(face_idx) else { return (0, 0) };
    let ti = &bsp.texinfo[face.texinfo as usize];
    luxel_extent_of(&bsp.face_vertices(face), ti)
}

/// Sutherland-Hodgman clip keeping the side of `plane` named by
/// `keep_positive`, same technique as [`crate::clipper`]'s polygon cutter.
fn clip_polygon_side(poly: &[Vec3], plane: &Plane, keep_positive: bool) -> Vec<Vec3> {
    let mut output = Vec::new();
    let n = poly.len();
    for i in 0..n {
        let cur = poly[i];
        let prev = poly[(i + n - 1) % n];
        let cur_d = plane.side_distance(cur);
        let prev_d = plane.side_distance(prev);
        let cur_in = if keep_positive { cur_d >= -EPSILON } else { cur_d <= EPSILON };
        let prev_in = if keep_positive { prev_d >= -EPSILON } else { prev_d <= EPSILON };

        if cur_in != prev_in {
            let t = prev_d / (prev_d - cur_d);
            output.push(prev + (cur - prev) * t);
        }
        if cur_in {
            output.push(cur);
        }
    }
    output
}

/// Splits `verts` along the longer of its U/V texture extents, cutting
/// through the midpoint. Shared by the dry-run estimator and the real
/// subdivide operation so both always agree on where the cut falls.
fn split_polygon_by_uv(verts: &[Vec3], ti: &TexInfo) -> (Vec<Vec3>, Vec<Vec3>) {
    let us: Vec<f32> = verts.iter().map(|&v| ti.u.dot(v) + ti.u_offset).collect();
    let vs: Vec<f32> = verts.iter().map(|&v| ti.v.dot(v) + ti.v_offset).collect();
    let (u_min, u_max) = min_max(&us);
    let (v_min, v_max) = min_max(&vs);

    let (axis, mid) = if (u_max - u_min) >= (v_max - v_min) {
        (ti.u, (u_min + u_max) * 0.5)
    } else {
        (ti.v, (v_min + v_max) * 0.5)
    };

    let len = axis.length();
    if len <= EPSILON {
        return (verts.to_vec(), Vec::new());
    }
    let normal = axis / len;

    let cut_plane = Plane {
        type_: PlaneType::classify(normal),
        normal,
        distance: mid / len,
    };

    (
        clip_polygon_side(verts, &cut_plane, false),
        clip_polygon_side(verts, &cut_plane, true),
    )
}

/// How many more cuts `face_idx` would need to bring every resulting
/// polygon's lightmap extent under `max_luxels`. Pure geometry, no mutation:
/// used to decide, before touching the file, whether subdividing alone can
/// fix a face or whether `fix_bad_surface_extents` needs to fall back.
pub fn estimate_subdivisions(bsp: &Bsp, face_idx: usize, max_luxels: u32) -> Result<usize, EditError> {
    let face = bsp
        .faces
        .get(face_idx)
        .ok_or(EditError::BadIndex { lump: "faces", index: face_idx as i64, len: bsp.faces.len() })?;
    let verts = bsp.face_vertices(face);
    if verts.len() < 3 {
        return Err(EditError::DegenerateFace { face: face_idx });
    }
    let ti = bsp.texinfo[face.texinfo as usize].clone();
    Ok(estimate_recursive(&verts, &ti, max_luxels, 0))
}

fn estimate_recursive(verts: &[Vec3], ti: &TexInfo, max_luxels: u32, depth: usize) -> usize {
    let (u, v) = luxel_extent_of(verts, ti);
    if u <= max_luxels && v <= max_luxels {
        return 0;
    }
    if depth > 12 {
        return 0;
    }

    let (poly_a, poly_b) = split_polygon_by_uv(verts, ti);
    if poly_a.len() < 3 || poly_b.len() < 3 {
        return 0;
    }

    1 + estimate_recursive(&poly_a, ti, max_luxels, depth + 1) + estimate_recursive(&poly_b, ti, max_luxels, depth + 1)
}

fn find_or_add_vertex(bsp: &mut Bsp, pos: Vec3) -> u16 {
    if let Some(i) = bsp.vertices.iter().position(|&v| v.distance(pos) <= EPSILON) {
        return i as u16;
    }
    bsp.vertices.push(pos);
    (bsp.vertices.len() - 1) as u16
}

fn find_or_add_edge(bsp: &mut Bsp, a: u16, b: u16) -> (i32, i32) {
    if let Some(idx) = bsp.edges.iter().position(|&[ea, eb]| ea == a && eb == b) {
        return (idx as i32, 1);
    }
    if let Some(idx) = bsp.edges.iter().position(|&[ea, eb]| ea == b && eb == a) {
        return (idx as i32, -1);
    }
    bsp.edges.push([a, b]);
    ((bsp.edges.len() - 1) as i32, 1)
}

fn build_face_loop(bsp: &mut Bsp, poly: &[Vec3], template: &Face) -> Face {
    let first_edge = bsp.surf_edges.len() as i32;
    for i in 0..poly.len() {
        let a = find_or_add_vertex(bsp, poly[i]);
        let b = find_or_add_vertex(bsp, poly[(i + 1) % poly.len()]);
        let (edge_idx, sign) = find_or_add_edge(bsp, a, b);
        bsp.surf_edges.push(edge_idx * sign);
    }

    Face {
        plane: template.plane,
        side: template.side,
        first_edge,
        edge_count: poly.len() as u16,
        texinfo: template.texinfo,
        styles: template.styles,
        lightmap_offset: template.lightmap_offset,
    }
}

/// Splits `face_idx` into two along its longer UV extent, inserting the
/// sibling face immediately after the original. Every face-index reference
/// at or past the insertion point (model/node face ranges, marksurfaces)
/// shifts up by one; every leaf that marked the original face now marks
/// both halves. Returns the sibling's new index.
pub fn subdivide_face(bsp: &mut Bsp, face_idx: usize) -> Result<usize, EditError> {
    let face = bsp
        .faces
        .get(face_idx)
        .cloned()
        .ok_or(EditError::BadIndex { lump: "faces", index: face_idx as i64, len: bsp.faces.len() })?;
    let verts = bsp.face_vertices(&face);
    if verts.len() < 3 {
        return Err(EditError::DegenerateFace { face: face_idx });
    }

    let ti = bsp.texinfo[face.texinfo as usize].clone();
    let (poly_a, poly_b) = split_polygon_by_uv(&verts, &ti);
    if poly_a.len() < 3 || poly_b.len() < 3 {
        return Err(EditError::DegenerateFace { face: face_idx });
    }

    let rebuilt_a = build_face_loop(bsp, &poly_a, &face);
    let rebuilt_b = build_face_loop(bsp, &poly_b, &face);
    bsp.faces[face_idx] = rebuilt_a;

    let new_face_idx = face_idx + 1;
    for model in &mut bsp.models {
        if model.first_face as usize >= new_face_idx {
            model.first_face += 1;
        }
    }
    for node in &mut bsp.nodes {
        if node.first_face as usize >= new_face_idx {
            node.first_face += 1;
        }
    }
    for ms in &mut bsp.mark_surfaces {
        if *ms as usize >= new_face_idx {
            *ms += 1;
        }
    }

    bsp.faces.insert(new_face_idx, rebuilt_b);

    if let Some(owner) = bsp.model_from_face(face_idx) {
        bsp.models[owner].face_count += 1;
    }
    for node in &mut bsp.nodes {
        let first = node.first_face as usize;
        let count = node.face_count as usize;
        if face_idx >= first && face_idx < first + count {
            node.face_count += 1;
        }
    }

    let mut hits: Vec<(usize, usize)> = Vec::new();
    for (leaf_idx, leaf) in bsp.leaves.iter().enumerate() {
        let first = leaf.first_mark_surface as usize;
        let count = leaf.mark_surface_count as usize;
        for ms_idx in first..(first + count).min(bsp.mark_surfaces.len()) {
            if bsp.mark_surfaces[ms_idx] as usize == face_idx {
                hits.push((leaf_idx, ms_idx));
            }
        }
    }
    hits.sort_by(|a, b| b.1.cmp(&a.1));
    for (leaf_idx, ms_idx) in hits {
        bsp.mark_surfaces.insert(ms_idx + 1, new_face_idx as u16);
        bsp.leaves[leaf_idx].mark_surface_count += 1;
        for leaf in &mut bsp.leaves {
            if leaf.first_mark_surface as usize > ms_idx {
                leaf.first_mark_surface += 1;
            }
        }
    }

    Ok(new_face_idx)
}

/// Clones `face_idx`'s texinfo if any other face still points at the same
/// record, so a following UV edit can touch only this face.
pub fn unique_texinfo(bsp: &mut Bsp, face_idx: usize) -> Result<(), EditError> {
    let face = bsp
        .faces
        .get(face_idx)
        .ok_or(EditError::BadIndex { lump: "faces", index: face_idx as i64, len: bsp.faces.len() })?;
    let ti_idx = face.texinfo as usize;

    let shared = bsp
        .faces
        .iter()
        .enumerate()
        .any(|(i, f)| i != face_idx && f.texinfo as usize == ti_idx);
    if !shared {
        return Ok(());
    }

    let clone = bsp.texinfo[ti_idx].clone();
    bsp.texinfo.push(clone);
    bsp.faces[face_idx].texinfo = (bsp.texinfo.len() - 1) as u16;
    Ok(())
}

/// For each face drawing texture `texture_idx`, rescales its (uniquified)
/// texinfo axes by `w1/w0, h1/h0` and shifts the offset so a reference
/// vertex's UV is unchanged by the resize.
pub fn adjust_resized_texture_coordinates(
    bsp: &mut Bsp,
    texture_idx: usize,
    (w0, h0): (u32, u32),
    (w1, h1): (u32, u32),
) -> Result<(), EditError> {
    if w0 == 0 || h0 == 0 {
        return Ok(());
    }
    let scale_u = w1 as f32 / w0 as f32;
    let scale_v = h1 as f32 / h0 as f32;

    let affected: Vec<usize> = (0..bsp.faces.len())
        .filter(|&i| {
            let ti_idx = bsp.faces[i].texinfo as usize;
            bsp.texinfo[ti_idx].texture_index as usize == texture_idx
        })
        .collect();

    for face_idx in affected {
        unique_texinfo(bsp, face_idx)?;

        let face = bsp.faces[face_idx].clone();
        let verts = bsp.face_vertices(&face);
        let Some(&reference) = verts.first() else { continue };

        let ti_idx = face.texinfo as usize;
        let (ref_u, ref_v) = {
            let ti = &bsp.texinfo[ti_idx];
            (ti.u.dot(reference) + ti.u_offset, ti.v.dot(reference) + ti.v_offset)
        };

        let ti = &mut bsp.texinfo[ti_idx];
        ti.u *= scale_u;
        ti.v *= scale_v;

        let new_ref_u = ti.u.dot(reference) + ti.u_offset;
        let new_ref_v = ti.v.dot(reference) + ti.v_offset;
        ti.u_offset += ref_u - new_ref_u;
        ti.v_offset += ref_v - new_ref_v;
    }

    Ok(())
}

/// Brings a face's lightmap footprint under the engine's 16x16-luxel limit:
/// subdivide while the per-texture cut budget allows it, otherwise halve the
/// texture's resolution, otherwise spread the texinfo axes out (losing
/// resolution but guaranteed to shrink the luxel count).
pub fn fix_bad_surface_extents(
    bsp: &mut Bsp,
    face_idx: usize,
    env: &EditEnv,
    subdivisions_used: &mut HashMap<u32, usize>,
    max_subdivisions_per_texture: usize,
) -> Result<(), EditError> {
    let (u_luxels, v_luxels) = face_luxel_extent(bsp, face_idx);
    if u_luxels <= MAX_LIGHTMAP_LUXELS && v_luxels <= MAX_LIGHTMAP_LUXELS {
        return Ok(());
    }

    let texture_index = bsp.texinfo[bsp.faces[face_idx].texinfo as usize].texture_index;
    let used = subdivisions_used.entry(texture_index).or_insert(0);

    if *used < max_subdivisions_per_texture {
        *used += 1;
        let sibling = subdivide_face(bsp, face_idx)?;
        fix_bad_surface_extents(bsp, face_idx, env, subdivisions_used, max_subdivisions_per_texture)?;
        fix_bad_surface_extents(bsp, sibling, env, subdivisions_used, max_subdivisions_per_texture)?;
        return Ok(());
    }

    let tex_idx = texture_index as usize;
    if let Some(tex) = bsp.textures.get(tex_idx) {
        let (w, h) = (tex.width, tex.height);
        if w > 1 && h > 1 {
            crate::texture_store::downscale(bsp, tex_idx, (w / 2).max(1), (h / 2).max(1), env)?;
            let (u2, v2) = face_luxel_extent(bsp, face_idx);
            if u2 <= MAX_LIGHTMAP_LUXELS && v2 <= MAX_LIGHTMAP_LUXELS {
                return Ok(());
            }
        }
    }

    unique_texinfo(bsp, face_idx)?;
    let ti_idx = bsp.faces[face_idx].texinfo as usize;
    let shrink = (u_luxels as f32 / MAX_LIGHTMAP_LUXELS as f32).max(v_luxels as f32 / MAX_LIGHTMAP_LUXELS as f32);
    let shrink = shrink.max(1.0);
    bsp.texinfo[ti_idx].u /= shrink;
    bsp.texinfo[ti_idx].v /= shrink;

    Ok(())
}

fn models_equivalent(bsp: &Bsp, a: usize, b: usize) -> bool {
    let model_a = &bsp.models[a];
    let model_b = &bsp.models[b];
    if model_a.face_count != model_b.face_count {
        return false;
    }

    let aabb_a = bsp.model_vertex_bounds(a);
    let aabb_b = bsp.model_vertex_bounds(b);
    if (aabb_a.size() - aabb_b.size()).abs().max_element() > EPSILON * 10.0 {
        return false;
    }

    let offset = aabb_b.mins - aabb_a.mins;
    let faces_a: Vec<usize> =
        (model_a.first_face as usize..(model_a.first_face + model_a.face_count) as usize).collect();
    let faces_b: Vec<usize> =
        (model_b.first_face as usize..(model_b.first_face + model_b.face_count) as usize).collect();

    let mut used_b = vec![false; faces_b.len()];
    for &fa in &faces_a {
        let found = faces_b
            .iter()
            .enumerate()
            .find(|&(bi, &fb)| !used_b[bi] && face_matches(bsp, fa, fb, offset));
        let Some((bi, _)) = found else {
            return false;
        };
        used_b[bi] = true;
    }

    true
}

fn face_matches(bsp: &Bsp, fa: usize, fb: usize, offset: Vec3) -> bool {
    let face_a = &bsp.faces[fa];
    let face_b = &bsp.faces[fb];

    if face_a.side != face_b.side {
        return false;
    }

    let plane_a = &bsp.planes[face_a.plane as usize];
    let plane_b = &bsp.planes[face_b.plane as usize];
    if plane_a.normal.distance(plane_b.normal) > EPSILON {
        return false;
    }

    let verts_a = bsp.face_vertices(face_a);
    let verts_b = bsp.face_vertices(face_b);
    if verts_a.len() != verts_b.len() {
        return false;
    }
    for (&va, &vb) in verts_a.iter().zip(&verts_b) {
        if (va + offset).distance(vb) > EPSILON {
            return false;
        }
    }

    let ti_a = &bsp.texinfo[face_a.texinfo as usize];
    let ti_b = &bsp.texinfo[face_b.texinfo as usize];
    let (tw_a, th_a) = bsp
        .textures
        .get(ti_a.texture_index as usize)
        .map(|t| (t.width.max(1) as f32, t.height.max(1) as f32))
        .unwrap_or((1.0, 1.0));
    let (tw_b, th_b) = bsp
        .textures
        .get(ti_b.texture_index as usize)
        .map(|t| (t.width.max(1) as f32, t.height.max(1) as f32))
        .unwrap_or((1.0, 1.0));

    for (&va, &vb) in verts_a.iter().zip(&verts_b) {
        let ua = ((ti_a.u.dot(va) + ti_a.u_offset) / tw_a).rem_euclid(1.0);
        let ub = ((ti_b.u.dot(vb) + ti_b.u_offset) / tw_b).rem_euclid(1.0);
        if (ua - ub).abs() > 0.005 {
            return false;
        }
        let va_t = ((ti_a.v.dot(va) + ti_a.v_offset) / th_a).rem_euclid(1.0);
        let vb_t = ((ti_b.v.dot(vb) + ti_b.v_offset) / th_b).rem_euclid(1.0);
        if (va_t - vb_t).abs() > 0.005 {
            return false;
        }
    }

    true
}

/// Collapses submodels that are geometric duplicates (same face count,
/// same vertex-AABB size, every face matching plane/side/relative-position/
/// wrapped-UV within epsilon): every entity pointing at the later model is
/// rewritten to point at the earlier one, with its `origin` adjusted by
/// `minB - minA`, and the later model is deleted.
pub fn deduplicate_models(bsp: &mut Bsp) -> Result<usize, EditError> {
    let mut removed = 0;
    let mut i = 1;

    while i < bsp.models.len() {
        let mut merge_target = None;
        for j in 0..i {
            if models_equivalent(bsp, j, i) {
                merge_target = Some(j);
                break;
            }
        }

        let Some(a_idx) = merge_target else {
            i += 1;
            continue;
        };

        let offset = bsp.models[i].mins - bsp.models[a_idx].mins;
        for ent_idx in bsp.model_entities(i) {
            bsp.entities.set_or_add_keyvalue(ent_idx, "model", &format!("*{a_idx}"));
            let origin = bsp
                .entities
                .get_keyvalue(ent_idx, "origin")
                .and_then(parse_vec3)
                .unwrap_or(Vec3::ZERO)
                + offset;
            bsp.entities.set_or_add_keyvalue(ent_idx, "origin", &format_vec3(origin));
        }

        crate::model_editor::delete_model(bsp, i)?;
        removed += 1;
    }

    Ok(removed)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::model_editor::create_solid;

    #[test]
    fn subdivide_splits_one_face_into_two_and_keeps_the_model_range_contiguous() {
        let mut bsp = create_solid(Vec3::splat(-64.0), Vec3::splat(64.0), 0);
        let before = bsp.faces.len();

        let sibling = subdivide_face(&mut bsp, 0).unwrap();

        assert_eq!(bsp.faces.len(), before + 1);
        assert_eq!(sibling, 1);
        assert_eq!(bsp.models[0].face_count as usize, before + 1);
        assert_eq!(bsp.faces[0].edge_count, 4);
        assert_eq!(bsp.faces[1].edge_count, 4);
    }

    #[test]
    fn estimate_matches_one_real_subdivide_for_an_oversized_face() {
        let bsp = create_solid(Vec3::splat(-512.0), Vec3::splat(512.0), 0);
        let needed = estimate_subdivisions(&bsp, 0, MAX_LIGHTMAP_LUXELS).unwrap();
        assert!(needed >= 1);
    }

    #[test]
    fn unique_texinfo_clones_only_when_shared() {
        let mut bsp = create_solid(Vec3::splat(-32.0), Vec3::splat(32.0), 0);
        bsp.faces[1].texinfo = bsp.faces[0].texinfo;
        let before = bsp.texinfo.len();

        unique_texinfo(&mut bsp, 0).unwrap();
        assert_eq!(bsp.texinfo.len(), before + 1);
        assert_ne!(bsp.faces[0].texinfo, bsp.faces[1].texinfo);

        let before = bsp.texinfo.len();
        unique_texinfo(&mut bsp, 0).unwrap();
        assert_eq!(bsp.texinfo.len(), before);
    }

    #[test]
    fn deduplicate_models_collapses_identical_submodel_and_rewrites_entity() {
        let mut bsp = create_solid(Vec3::splat(-32.0), Vec3::splat(32.0), 0);
        bsp.models.push(bsp.models[0].clone());

        let mut ent = crate::entity::Entity::new();
        ent.insert("classname".into(), "func_wall".into());
        ent.insert("model".into(), "*1".into());
        bsp.entities.entities.push(ent);

        let removed = deduplicate_models(&mut bsp).unwrap();
        assert_eq!(removed, 1);
        assert_eq!(bsp.models.len(), 1);
        assert_eq!(bsp.entities.get_keyvalue(0, "model"), Some("*0"));
    }
}
