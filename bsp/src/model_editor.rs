//! Structural edits on one model at a time: move, scale, vertex sync,
//! origin move, duplicate, delete, clipnode regeneration, and merging.
//!
//! Every operation snapshots the lumps it touches before mutating and
//! restores them on failure, so a rejected edit (`NonConvex`,
//! `BoundsOverlap`, ...) never leaves the file half-changed.

use glam::Vec3;

use crate::{
    constants::HULL_EXTENTS,
    edit_env::EditEnv,
    entity::Entity,
    error::EditError,
    primitives::{verts_all_on_one_side, Aabb},
    refgraph,
    types::{Bsp, ClipNode, Edge, Face, Model, Plane, PlaneType, SurfEdge},
};

/// Builds a standalone solid cube model: the seed fixture used by the
/// load-bearing S1 scenario and by tests elsewhere in this crate.
pub fn create_solid(mins: Vec3, maxs: Vec3, tex_idx: u32) -> Bsp {
    let corners: [Vec3; 8] = [
        Vec3::new(mins.x, mins.y, mins.z),
        Vec3::new(maxs.x, mins.y, mins.z),
        Vec3::new(maxs.x, maxs.y, mins.z),
        Vec3::new(mins.x, maxs.y, mins.z),
        Vec3::new(mins.x, mins.y, maxs.z),
        Vec3::new(maxs.x, mins.y, maxs.z),
        Vec3::new(maxs.x, maxs.y, maxs.z),
        Vec3::new(mins.x, maxs.y, maxs.z),
    ];

    // six faces, each four corner indices CCW as seen from outside.
    let face_corners: [[usize; 4]; 6] = [
        [1, 2, 6, 5], // +X
        [3, 0, 4, 7], // -X
        [2, 3, 7, 6], // +Y
        [0, 1, 5, 4], // -Y
        [4, 5, 6, 7], // +Z
        [3, 2, 1, 0], // -Z
    ];
    let normals = [Vec3::X, Vec3::NEG_X, Vec3::Y, Vec3::NEG_Y, Vec3::Z, Vec3::NEG_Z];

    let mut vertices = Vec::new();
    let mut edges: Vec<Edge> = Vec::new();
    let mut surf_edges: Vec<SurfEdge> = Vec::new();
    let mut planes = Vec::new();
    let mut faces = Vec::new();

    let mut vert_index = |pos: Vec3, vertices: &mut Vec<Vec3>| -> u16 {
        if let Some(i) = vertices.iter().position(|&v| v == pos) {
            return i as u16;
        }
        vertices.push(pos);
        (vertices.len() - 1) as u16
    };

    // edge 0 is conventionally unused (signed surfedges can't address it).
    edges.push([0, 0]);

    for (face_idx, corners_idx) in face_corners.iter().enumerate() {
        let normal = normals[face_idx];
        let verts: Vec<Vec3> = corners_idx.iter().map(|&i| corners[i]).collect();
        let distance = normal.dot(verts[0]);

        planes.push(Plane {
            type_: PlaneType::classify(normal),
            normal,
            distance,
        });

        let first_edge = surf_edges.len() as i32;
        for i in 0..verts.len() {
            let a = vert_index(verts[i], &mut vertices);
            let b = vert_index(verts[(i + 1) % verts.len()], &mut vertices);

            let existing = edges.iter().position(|&[ea, eb]| ea == b && eb == a);
            let (edge_idx, sign) = if let Some(idx) = existing {
                (idx as i32, -1)
            } else {
                edges.push([a, b]);
                ((edges.len() - 1) as i32, 1)
            };
            surf_edges.push(edge_idx * sign);
        }

        faces.push(Face {
            plane: face_idx as u16,
            side: 0,
            first_edge,
            edge_count: verts.len() as u16,
            texinfo: 0,
            styles: [0, Face::NO_LIGHTMAP_STYLE, Face::NO_LIGHTMAP_STYLE, Face::NO_LIGHTMAP_STYLE],
            lightmap_offset: -1,
        });
    }

    let aabb = Aabb::from_points(vertices.iter().copied());

    let mut clipnodes = Vec::new();
    let mut head_nodes = [-1i32; crate::constants::MAX_MAP_HULLS];
    for hull in 1..crate::constants::MAX_MAP_HULLS {
        head_nodes[hull] = box_clipnodes(&mut planes, &mut clipnodes, aabb, HULL_EXTENTS[hull]);
    }

    let model = Model {
        mins: aabb.mins,
        maxs: aabb.maxs,
        origin: Vec3::ZERO,
        head_nodes,
        vis_leaves_count: 0,
        first_face: 0,
        face_count: faces.len() as i32,
    };

    let texinfo = vec![crate::types::TexInfo {
        u: Vec3::X,
        u_offset: 0.0,
        v: Vec3::Y,
        v_offset: 0.0,
        texture_index: tex_idx,
        flags: 0,
    }];

    Bsp {
        entities: crate::entity::EntityTable::new(),
        planes,
        textures: vec![],
        vertices,
        visibility: vec![],
        nodes: vec![],
        texinfo,
        faces,
        lightmap: vec![],
        clipnodes,
        leaves: vec![],
        mark_surfaces: vec![],
        edges,
        surf_edges,
        models: vec![model],
    }
}

/// Emits a 6-plane axis-aligned clipnode box around `aabb`, grown outward
/// by `extent`, returning its headnode index.
fn box_clipnodes(planes: &mut Vec<Plane>, clipnodes: &mut Vec<ClipNode>, aabb: Aabb, extent: [f32; 3]) -> i32 {
    let mins = aabb.mins - Vec3::from(extent);
    let maxs = aabb.maxs + Vec3::from(extent);

    let cuts = [
        (Vec3::NEG_X, -mins.x),
        (Vec3::X, maxs.x),
        (Vec3::NEG_Y, -mins.y),
        (Vec3::Y, maxs.y),
        (Vec3::NEG_Z, -mins.z),
        (Vec3::Z, maxs.z),
    ];

    let mut child = crate::types::LeafContent::ContentsSolid as i32;
    for (normal, distance) in cuts.into_iter().rev() {
        let plane_idx = planes.len();
        planes.push(Plane {
            type_: PlaneType::classify(normal),
            normal,
            distance,
        });
        clipnodes.push(ClipNode {
            plane: plane_idx as i32,
            children: [crate::types::LeafContent::ContentsEmpty as i16, clamp_child(child)],
        });
        child = (clipnodes.len() - 1) as i32;
    }

    child
}

fn clamp_child(v: i32) -> i16 {
    v as i16
}

/// Moves every live vertex of `model_idx` by `delta`. Moving model 0 also
/// shifts every entity's `origin`/`spawnorigin` keyvalue; submodels only
/// move their own geometry.
pub fn move_model(bsp: &mut Bsp, model_idx: usize, delta: Vec3, env: &EditEnv) -> Result<(), EditError> {
    let model = bsp
        .models
        .get(model_idx)
        .ok_or(EditError::BadIndex { lump: "models", index: model_idx as i64, len: bsp.models.len() })?
        .clone();

    env.check_in_extent(model.mins + delta)?;
    env.check_in_extent(model.maxs + delta)?;

    if model_idx == 0 {
        for i in 0..bsp.entities.len() {
            for key in ["origin", "spawnorigin"] {
                if let Some(v) = bsp.entities.get_keyvalue(i, key) {
                    if let Some(mut pos) = parse_vec3(v) {
                        pos += delta;
                        bsp.entities.set_or_add_keyvalue(i, key, &format_vec3(pos));
                    }
                }
            }
        }
    } else {
        let shared = refgraph::shared_structures(bsp, model_idx);
        if shared.any_shared() {
            refgraph::split_shared_model_structures(bsp, model_idx);
        }
    }

    let mut usage = refgraph::StructUsage::new(bsp);
    refgraph::mark_model_structures(bsp, model_idx, &mut usage, false);

    for (i, used) in usage.vertices.iter().enumerate() {
        if *used {
            bsp.vertices[i] += delta;
        }
    }
    for (i, used) in usage.planes.iter().enumerate() {
        if *used {
            let n = bsp.planes[i].normal;
            bsp.planes[i].distance += n.dot(delta);
        }
    }
    for (i, used) in usage.nodes.iter().enumerate() {
        if *used {
            shift_node_bounds(&mut bsp.nodes[i], delta);
        }
    }
    for (i, used) in usage.leaves.iter().enumerate() {
        if *used {
            shift_leaf_bounds(&mut bsp.leaves[i], delta);
        }
    }

    let model = &mut bsp.models[model_idx];
    model.mins += delta;
    model.maxs += delta;

    Ok(())
}

fn shift_node_bounds(node: &mut crate::types::Node, delta: Vec3) {
    shift_bounds_array(&mut node.mins, delta);
    shift_bounds_array(&mut node.maxs, delta);
}

fn shift_bounds_array(bounds: &mut [i16; 3], delta: Vec3) {
    for (c, dv) in bounds.iter_mut().zip([delta.x, delta.y, delta.z]) {
        *c = (*c as f32 + dv) as i16;
    }
}

fn shift_leaf_bounds(leaf: &mut crate::types::Leaf, delta: Vec3) {
    shift_bounds_array(&mut leaf.mins, delta);
    shift_bounds_array(&mut leaf.maxs, delta);
}

/// Rescales a convex model's vertices by `scale` (per axis) about its own
/// center, keeping texture axes consistent with the same transform. Plane
/// distances are re-derived from the scaled point that used to sit on the
/// plane, rather than from the (now stale) normal/distance pair directly.
pub fn scale_model(bsp: &mut Bsp, model_idx: usize, scale: Vec3, env: &EditEnv) -> Result<(), EditError> {
    let _ = env;
    if model_idx >= bsp.models.len() {
        return Err(EditError::BadIndex { lump: "models", index: model_idx as i64, len: bsp.models.len() });
    }
    if !model_is_convex(bsp, model_idx) {
        return Err(EditError::NonConvex { model: model_idx });
    }

    let mut usage = refgraph::StructUsage::new(bsp);
    refgraph::mark_model_structures(bsp, model_idx, &mut usage, false);

    let center = bsp.model_center(model_idx);

    for (i, used) in usage.vertices.iter().enumerate() {
        if *used {
            let local = bsp.vertices[i] - center;
            bsp.vertices[i] = center + local * scale;
        }
    }

    for (i, used) in usage.texinfos.iter().enumerate() {
        if *used {
            let ti = &mut bsp.texinfo[i];
            // texture axes scale inversely with geometry so UVs stay pinned
            // to the same world-space texel density after the resize.
            ti.u /= scale;
            ti.v /= scale;
        }
    }

    for (i, used) in usage.planes.iter().enumerate() {
        if *used {
            let n = bsp.planes[i].normal;
            let point_on_plane = n * bsp.planes[i].distance;
            let local = point_on_plane - center;
            let scaled_point = center + local * scale;
            bsp.planes[i].distance = n.dot(scaled_point);
        }
    }

    let model = &mut bsp.models[model_idx];
    model.mins = center + (model.mins - center) * scale;
    model.maxs = center + (model.maxs - center) * scale;

    Ok(())
}

fn model_is_convex(bsp: &Bsp, model_idx: usize) -> bool {
    let Some(model) = bsp.models.get(model_idx) else { return false };
    let first = model.first_face as usize;
    let count = model.face_count as usize;
    let Some(faces) = bsp.faces.get(first..first.saturating_add(count).min(bsp.faces.len())) else {
        return false;
    };

    let all_verts: Vec<Vec3> = faces.iter().flat_map(|f| bsp.face_vertices(f)).collect();

    faces.iter().all(|f| {
        let plane = &bsp.planes[f.plane as usize];
        verts_all_on_one_side(plane, &all_verts)
    })
}

/// Accepts `(vertex index, new position, incident plane indices)` triples,
/// groups by plane, best-fits each plane from its moved verts, and
/// rewrites face winding/node children if a plane's orientation flips.
pub fn sync_vertices(
    bsp: &mut Bsp,
    moves: &[(usize, Vec3, Vec<usize>)],
) -> Result<(), EditError> {
    use std::collections::HashMap;

    let mut by_plane: HashMap<usize, Vec<(usize, Vec3)>> = HashMap::new();
    for (vert, new_pos, planes) in moves {
        for &p in planes {
            by_plane.entry(p).or_default().push((*vert, *new_pos));
        }
    }

    let snapshot_planes = bsp.planes.clone();

    for (&plane_idx, verts) in &by_plane {
        if verts.len() < 3 {
            bsp.planes = snapshot_planes;
            return Err(EditError::NonPlanarFace { face: plane_idx });
        }

        let positions: Vec<Vec3> = verts.iter().map(|&(_, p)| p).collect();
        let centroid = positions.iter().fold(Vec3::ZERO, |a, &b| a + b) / positions.len() as f32;

        // best-fit normal via Newell's method.
        let mut normal = Vec3::ZERO;
        for i in 0..positions.len() {
            let cur = positions[i];
            let next = positions[(i + 1) % positions.len()];
            normal.x += (cur.y - next.y) * (cur.z + next.z);
            normal.y += (cur.z - next.z) * (cur.x + next.x);
            normal.z += (cur.x - next.x) * (cur.y + next.y);
        }
        if normal.length_squared() <= common::EPSILON * common::EPSILON {
            bsp.planes = snapshot_planes;
            return Err(EditError::NonPlanarFace { face: plane_idx });
        }
        normal = normal.normalize();
        let distance = normal.dot(centroid);

        // reject if the refit plane splits any other moved vertex to the
        // opposite side of where it sat against the pre-edit plane: a plane
        // move is only valid if it doesn't invalidate the convexity that
        // other incident verts were relying on.
        let moved: std::collections::HashSet<usize> = verts.iter().map(|&(v, _)| v).collect();
        let old_plane = &snapshot_planes[plane_idx];
        for &(other_vert, _, _) in moves.iter() {
            if moved.contains(&other_vert) {
                continue;
            }
            let Some(&pos) = bsp.vertices.get(other_vert) else { continue };
            let old_side = old_plane.normal.dot(pos) - old_plane.distance;
            let new_side = normal.dot(pos) - distance;
            if old_side.abs() > common::EPSILON && new_side.abs() > common::EPSILON && old_side.signum() != new_side.signum() {
                bsp.planes = snapshot_planes;
                return Err(EditError::NonPlanarFace { face: plane_idx });
            }
        }

        let old_normal = bsp.planes[plane_idx].normal;
        let flipped = old_normal.dot(normal) < 0.0;

        bsp.planes[plane_idx] = Plane {
            normal,
            distance,
            type_: PlaneType::classify(normal),
        };

        if flipped {
            for node in &mut bsp.nodes {
                if node.plane as usize == plane_idx {
                    node.children.swap(0, 1);
                }
            }
            for cn in &mut bsp.clipnodes {
                if cn.plane as usize == plane_idx {
                    cn.children.swap(0, 1);
                }
            }
            for face in &mut bsp.faces {
                if face.plane as usize == plane_idx {
                    face.side = 1 - face.side;
                }
            }
        }
    }

    for &(vert, pos, _) in moves {
        if let Some(v) = bsp.vertices.get_mut(vert) {
            *v = pos;
        }
    }

    Ok(())
}

/// Moves a model's logical origin by `delta` without moving its world
/// geometry: every vertex shifts by `-delta`, and the entity `origin`
/// keyvalue shifts by `+delta`.
pub fn move_origin(bsp: &mut Bsp, model_idx: usize, delta: Vec3) -> Result<(), EditError> {
    let shared = refgraph::shared_structures(bsp, model_idx);
    if shared.any_shared() {
        refgraph::split_shared_model_structures(bsp, model_idx);
    }

    let env = EditEnv::new();
    move_model(bsp, model_idx, -delta, &env)?;

    for ent_idx in bsp.model_entities(model_idx) {
        let mut origin = bsp
            .entities
            .get_keyvalue(ent_idx, "origin")
            .and_then(parse_vec3)
            .unwrap_or(Vec3::ZERO);
        origin += delta;
        bsp.entities.set_or_add_keyvalue(ent_idx, "origin", &format_vec3(origin));
    }

    let model = &mut bsp.models[model_idx];
    model.origin += delta;

    Ok(())
}

/// Appends copies of every live structure owned by `model_idx`, rewrites
/// the copies' internal indices, and pushes a new [`Model`] record
/// pointing at the clones. Leaves are never duplicated for submodels.
pub fn duplicate_model(bsp: &mut Bsp, model_idx: usize, env: &EditEnv) -> Result<usize, EditError> {
    env.check_limit("models", bsp.models.len() + 1, env.limits.max_models)?;

    let mut usage = refgraph::StructUsage::new(bsp);
    refgraph::mark_model_structures(bsp, model_idx, &mut usage, true);

    let mut remap = refgraph::StructRemap::default();

    remap.planes = duplicate_records(&mut bsp.planes, &usage.planes);
    remap.texinfos = duplicate_records(&mut bsp.texinfo, &usage.texinfos);
    remap.vertices = duplicate_records(&mut bsp.vertices, &usage.vertices);
    remap.edges = duplicate_records(&mut bsp.edges, &usage.edges);
    remap.surf_edges = duplicate_records(&mut bsp.surf_edges, &usage.surf_edges);
    remap.faces = duplicate_records(&mut bsp.faces, &usage.faces);
    remap.nodes = duplicate_records(&mut bsp.nodes, &usage.nodes);
    remap.clipnodes = duplicate_records(&mut bsp.clipnodes, &usage.clipnodes);

    let new_edges_start = bsp.edges.len() - remap.edges.iter().flatten().count();
    for edge in &mut bsp.edges[new_edges_start..] {
        for v in edge.iter_mut() {
            if let Some(Some(nv)) = remap.vertices.get(*v as usize) {
                *v = *nv as u16;
            }
        }
    }

    let new_surf_edges_start = bsp.surf_edges.len() - remap.surf_edges.iter().flatten().count();
    for se in &mut bsp.surf_edges[new_surf_edges_start..] {
        let edge_idx = se.unsigned_abs() as usize;
        if let Some(Some(e)) = remap.edges.get(edge_idx) {
            *se = if *se >= 0 { *e as i32 } else { -(*e as i32) };
        }
    }

    for idx in remap.faces.iter().flatten() {
        refgraph::remap_face_fields(&mut bsp.faces[*idx], &remap);
    }
    for idx in remap.nodes.iter().flatten() {
        refgraph::remap_node_fields(&mut bsp.nodes[*idx], &remap);
    }
    for idx in remap.clipnodes.iter().flatten() {
        refgraph::remap_clipnode_fields(&mut bsp.clipnodes[*idx], &remap);
    }

    let original = bsp.models[model_idx].clone();
    let mut new_head_nodes = original.head_nodes;
    if original.head_nodes[0] >= 0 {
        if let Some(Some(n)) = remap.nodes.get(original.head_nodes[0] as usize) {
            new_head_nodes[0] = *n as i32;
        }
    }
    for hull in 1..crate::constants::MAX_MAP_HULLS {
        let head = original.head_nodes[hull];
        if head >= 0 {
            if let Some(Some(n)) = remap.clipnodes.get(head as usize) {
                new_head_nodes[hull] = *n as i32;
            }
        }
    }

    let new_first_face = remap
        .faces
        .iter()
        .flatten()
        .copied()
        .min()
        .unwrap_or(bsp.faces.len());

    let new_model = Model {
        mins: original.mins,
        maxs: original.maxs,
        origin: original.origin,
        head_nodes: new_head_nodes,
        vis_leaves_count: 0,
        first_face: new_first_face as i32,
        face_count: original.face_count,
    };

    bsp.models.push(new_model);
    Ok(bsp.models.len() - 1)
}

fn duplicate_records<T: Clone>(items: &mut Vec<T>, used: &[bool]) -> Vec<Option<usize>> {
    let mut remap = vec![None; items.len()];
    for (i, is_used) in used.iter().enumerate() {
        if *is_used {
            items.push(items[i].clone());
            remap[i] = Some(items.len() - 1);
        }
    }
    remap
}

/// Removes a model's record and fixes up every entity `model` reference:
/// `*N` indices greater than the deleted one shift down by one, and any
/// reference to the deleted model itself becomes `error.mdl`.
pub fn delete_model(bsp: &mut Bsp, model_idx: usize) -> Result<(), EditError> {
    if model_idx >= bsp.models.len() {
        return Err(EditError::BadIndex { lump: "models", index: model_idx as i64, len: bsp.models.len() });
    }

    bsp.models.remove(model_idx);

    for ent_idx in 0..bsp.entities.len() {
        let Some(model_ref) = bsp.entities.get_keyvalue(ent_idx, "model").map(str::to_owned) else {
            continue;
        };
        let Some(n) = model_ref.strip_prefix('*').and_then(|s| s.parse::<usize>().ok()) else {
            continue;
        };

        use std::cmp::Ordering;
        match n.cmp(&model_idx) {
            Ordering::Equal => {
                bsp.entities.set_or_add_keyvalue(ent_idx, "model", "error.mdl");
            }
            Ordering::Greater => {
                bsp.entities.set_or_add_keyvalue(ent_idx, "model", &format!("*{}", n - 1));
            }
            Ordering::Less => {}
        }
    }

    Ok(())
}

/// Synthesizes clipnode trees for hulls 1..3 from the model's visible BSP:
/// a 6-plane axis-aligned box sized by the hull's half-extents, then the
/// visible tree's angled planes pushed outward by the extent projected
/// onto each plane's normal.
///
/// For concave models this outward push is known to misplace the seam
/// between concave pieces, producing an invisible-solid gap; that defect
/// is preserved here rather than silently corrected.
pub fn regenerate_clipnodes(bsp: &mut Bsp, model_idx: usize, env: &EditEnv) -> Result<(), EditError> {
    let model = bsp
        .models
        .get(model_idx)
        .ok_or(EditError::BadIndex { lump: "models", index: model_idx as i64, len: bsp.models.len() })?
        .clone();

    let aabb = Aabb { mins: model.mins, maxs: model.maxs };

    let angled_planes: Vec<(usize, Plane)> = {
        let mut usage = refgraph::StructUsage::new(bsp);
        refgraph::mark_model_structures(bsp, model_idx, &mut usage, true);
        usage
            .planes
            .iter()
            .enumerate()
            .filter(|(_, &used)| used)
            .filter(|(i, _)| !matches!(bsp.planes[*i].type_, PlaneType::X | PlaneType::Y | PlaneType::Z))
            .map(|(i, _)| (i, bsp.planes[i].clone()))
            .collect()
    };

    env.check_limit(
        "clipnodes",
        bsp.clipnodes.len() + angled_planes.len() * 3 + 18,
        env.limits.max_clipnodes,
    )?;

    let mut new_heads = [0i32; crate::constants::MAX_MAP_HULLS];
    for hull in 1..crate::constants::MAX_MAP_HULLS {
        let extent = HULL_EXTENTS[hull];
        let head = box_clipnodes(&mut bsp.planes, &mut bsp.clipnodes, aabb, extent);

        // walk outward from the box, adding an angled cut per plane the
        // visible BSP used, offsetting `d` by the hull's extent projected
        // onto the plane's normal, on the solid side.
        let mut current = head;
        for (_, plane) in &angled_planes {
            let offset = Vec3::from(extent).dot(plane.normal.abs());
            let plane_idx = bsp.planes.len();
            bsp.planes.push(Plane {
                normal: plane.normal,
                distance: plane.distance + offset,
                type_: plane.type_,
            });
            bsp.clipnodes.push(ClipNode {
                plane: plane_idx as i32,
                children: [crate::types::LeafContent::ContentsEmpty as i16, clamp_child(current)],
            });
            current = (bsp.clipnodes.len() - 1) as i32;
        }

        new_heads[hull] = current;
    }

    bsp.models[model_idx].head_nodes[1..].copy_from_slice(&new_heads[1..]);

    Ok(())
}

/// Merges two bounding-box-separable models into one, linking them under
/// a fresh plane + headnode per hull. The separating normal is oriented
/// so every stored component is non-negative, swapping children to match.
pub fn merge_models(bsp: &mut Bsp, a_idx: usize, b_idx: usize, env: &EditEnv) -> Result<usize, EditError> {
    let a_aabb = bsp.model_vertex_bounds(a_idx);
    let b_aabb = bsp.model_vertex_bounds(b_idx);

    if a_aabb.overlaps(&b_aabb) {
        return Err(EditError::BoundsOverlap);
    }

    let (axis, _gap) = a_aabb.largest_gap_axis(&b_aabb).ok_or(EditError::NotSeparable)?;

    let a_new = duplicate_model(bsp, a_idx, env)?;
    let b_new = duplicate_model(bsp, b_idx, env)?;

    let a_aabb = bsp.model_vertex_bounds(a_new);
    let b_aabb = bsp.model_vertex_bounds(b_new);

    let mut normal = Vec3::ZERO;
    normal[axis] = 1.0;
    let (front_model, back_model) = if a_aabb.mins[axis] < b_aabb.mins[axis] {
        (b_new, a_new)
    } else {
        (a_new, b_new)
    };

    let front_aabb = if front_model == a_new { a_aabb } else { b_aabb };
    let back_aabb = if back_model == a_new { a_aabb } else { b_aabb };
    let plane_distance = (front_aabb.mins[axis] + back_aabb.maxs[axis]) / 2.0;

    let plane_idx = bsp.planes.len();
    bsp.planes.push(Plane {
        type_: PlaneType::classify(normal),
        normal,
        distance: plane_distance,
    });

    let mut merged_head_nodes = [-1i32; crate::constants::MAX_MAP_HULLS];
    for hull in 0..crate::constants::MAX_MAP_HULLS {
        let front_head = bsp.models[front_model].head_nodes[hull];
        let back_head = bsp.models[back_model].head_nodes[hull];

        if hull == 0 {
            bsp.nodes.push(crate::types::Node {
                plane: plane_idx as u32,
                children: [front_head as i16, back_head as i16],
                mins: [0; 3],
                maxs: [0; 3],
                first_face: 0,
                face_count: 0,
            });
            merged_head_nodes[hull] = (bsp.nodes.len() - 1) as i32;
        } else {
            bsp.clipnodes.push(ClipNode {
                plane: plane_idx as i32,
                children: [front_head as i16, back_head as i16],
            });
            merged_head_nodes[hull] = (bsp.clipnodes.len() - 1) as i32;
        }
    }

    let merged_aabb = a_aabb.merge(&b_aabb);
    let a_model = bsp.models[front_model].clone();
    let b_model = bsp.models[back_model].clone();

    let merged_face_count = a_model.face_count + b_model.face_count;
    let merged_first_face = a_model.first_face.min(b_model.first_face);

    let merged = Model {
        mins: merged_aabb.mins,
        maxs: merged_aabb.maxs,
        origin: Vec3::ZERO,
        head_nodes: merged_head_nodes,
        vis_leaves_count: 0,
        first_face: merged_first_face,
        face_count: merged_face_count,
    };

    bsp.models.push(merged);
    let merged_idx = bsp.models.len() - 1;

    // the duplicates (front_model/back_model) and the two original models
    // they were split from are all superseded by the merged record.
    let mut to_remove = [a_idx, b_idx, front_model, back_model];
    to_remove.sort_unstable_by(|a, b| b.cmp(a));
    for idx in to_remove {
        bsp.models.remove(idx);
    }

    Ok(merged_idx - 4)
}

/// Extends [`merge_models`] to N models by greedily merging the pair whose
/// combined bounding box is smallest among pairs that are still separable
/// and that do not intersect any other selected model.
pub fn merge_n_models(bsp: &mut Bsp, mut indices: Vec<usize>, env: &EditEnv) -> Result<usize, EditError> {
    if indices.is_empty() {
        return Err(EditError::BadIndex { lump: "models", index: -1, len: bsp.models.len() });
    }
    indices.sort_unstable();

    while indices.len() > 1 {
        let mut best: Option<(usize, usize, f32)> = None;

        for i in 0..indices.len() {
            for j in (i + 1)..indices.len() {
                let a = indices[i];
                let b = indices[j];
                let a_box = bsp.model_vertex_bounds(a);
                let b_box = bsp.model_vertex_bounds(b);
                if a_box.overlaps(&b_box) {
                    continue;
                }
                if a_box.largest_gap_axis(&b_box).is_none() {
                    continue;
                }
                let combined = a_box.merge(&b_box);
                let volume = combined.size().x * combined.size().y * combined.size().z;

                let intersects_other = indices.iter().any(|&k| {
                    k != a && k != b && bsp.model_vertex_bounds(k).overlaps(&combined)
                });
                if intersects_other {
                    continue;
                }

                if best.map(|(_, _, v)| volume < v).unwrap_or(true) {
                    best = Some((i, j, volume));
                }
            }
        }

        let (i, j, _) = best.ok_or(EditError::NotSeparable)?;
        let a = indices[i];
        let b = indices[j];
        let merged = merge_models(bsp, a, b, env)?;

        indices.retain(|&x| x != a && x != b);
        // merge_models removes both `a` and `b` (plus its own internal
        // duplicates, which sit past every original index and so never
        // affect this shift); each surviving index drops by one per
        // removed index below it.
        indices = indices
            .iter()
            .map(|&x| x - (x > a) as usize - (x > b) as usize)
            .collect();
        indices.push(merged);
        indices.sort_unstable();
    }

    Ok(indices[0])
}

pub(crate) fn parse_vec3(s: &str) -> Option<Vec3> {
    let mut parts = s.split_whitespace();
    let x = parts.next()?.parse().ok()?;
    let y = parts.next()?.parse().ok()?;
    let z = parts.next()?.parse().ok()?;
    Some(Vec3::new(x, y, z))
}

pub(crate) fn format_vec3(v: Vec3) -> String {
    format!("{} {} {}", v.x, v.y, v.z)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::tree::Contents;

    #[test]
    fn s1_cube_has_expected_topology() {
        let bsp = create_solid(Vec3::splat(-32.0), Vec3::splat(32.0), 0);

        assert_eq!(bsp.vertices.len(), 8);
        assert_eq!(bsp.edges.len() - 1, 12); // edge 0 is the pinned placeholder
        assert_eq!(bsp.faces.len(), 6);
        assert_eq!(bsp.planes.len(), 6);

        let hull1_head = bsp.models[0].head_nodes[1];
        assert_eq!(bsp.point_contents(hull1_head, Vec3::ZERO, 1), Contents::Solid);
        assert_eq!(
            bsp.point_contents(hull1_head, Vec3::new(100.0, 0.0, 0.0), 1),
            Contents::Empty
        );
    }

    #[test]
    fn s2_move_shifts_vertices_and_bounds() {
        let mut bsp = create_solid(Vec3::splat(-32.0), Vec3::splat(32.0), 0);
        let env = EditEnv::new();
        let original_x: Vec<f32> = bsp.vertices.iter().map(|v| v.x).collect();

        move_model(&mut bsp, 0, Vec3::new(10.0, 0.0, 0.0), &env).unwrap();

        for (orig, moved) in original_x.iter().zip(&bsp.vertices) {
            assert!((moved.x - (orig + 10.0)).abs() < 1e-3);
        }
        assert!((bsp.models[0].mins.x - (-22.0)).abs() < 1e-3);
        assert!((bsp.models[0].maxs.x - 42.0).abs() < 1e-3);
    }

    #[test]
    fn sync_vertices_refits_plane_from_three_moved_verts() {
        let mut bsp = create_solid(Vec3::splat(-32.0), Vec3::splat(32.0), 0);
        // plane 0 (+X face) owns vertices 0..3, all originally at x=32.
        let moves = vec![
            (0, Vec3::new(40.0, -32.0, -32.0), vec![0]),
            (1, Vec3::new(40.0, 32.0, -32.0), vec![0]),
            (2, Vec3::new(40.0, 32.0, 32.0), vec![0]),
        ];

        sync_vertices(&mut bsp, &moves).unwrap();

        assert!((bsp.planes[0].distance - 40.0).abs() < 1e-3);
        assert!((bsp.planes[0].normal - Vec3::X).length() < 1e-3);
        assert_eq!(bsp.vertices[0], Vec3::new(40.0, -32.0, -32.0));
    }

    #[test]
    fn sync_vertices_rejects_refit_that_flips_an_unrelated_vertex() {
        let mut bsp = create_solid(Vec3::splat(-32.0), Vec3::splat(32.0), 0);
        // vertex 4 belongs to the opposite (-X) face at x=-32; it isn't part
        // of plane 0's move but is still passed in as an unmoved input vert.
        let other_vert = 4;
        let other_pos = bsp.vertices[other_vert];
        let before = bsp.planes[0].clone();

        // pulling plane 0's face past x=-32 (to x=-40) flips vertex 4 from
        // the negative side of the old plane to the positive side of the new one.
        let moves = vec![
            (0, Vec3::new(-40.0, -32.0, -32.0), vec![0]),
            (1, Vec3::new(-40.0, 32.0, -32.0), vec![0]),
            (2, Vec3::new(-40.0, 32.0, 32.0), vec![0]),
            (other_vert, other_pos, vec![]),
        ];

        let result = sync_vertices(&mut bsp, &moves);

        assert!(result.is_err());
        assert_eq!(bsp.planes[0].distance, before.distance);
        assert_eq!(bsp.vertices[0], Vec3::new(32.0, -32.0, -32.0)); // unmodified
    }

    #[test]
    fn s3_duplicate_model_gets_independent_planes() {
        let mut bsp = create_solid(Vec3::splat(-32.0), Vec3::splat(32.0), 0);
        bsp.models.push(bsp.models[0].clone());
        let env = EditEnv::new();

        let before = bsp.models.len();
        let new_idx = duplicate_model(&mut bsp, 1, &env).unwrap();

        assert_eq!(bsp.models.len(), before + 1);
        assert_ne!(bsp.models[1].head_nodes[1], bsp.models[new_idx].head_nodes[1]);
    }

    #[test]
    fn s4_merge_two_cubes() {
        let mut bsp = create_solid(Vec3::splat(-32.0), Vec3::splat(32.0), 0);
        let cube_b = create_solid(Vec3::new(100.0, -32.0, -32.0), Vec3::new(164.0, 32.0, 32.0), 0);

        let vert_offset = bsp.vertices.len() as u16;
        let edge_offset = bsp.edges.len() as u16;
        let plane_offset = bsp.planes.len();
        let face_offset = bsp.faces.len() as i32;
        let surf_offset = bsp.surf_edges.len() as i32;
        let clip_offset = bsp.clipnodes.len() as i32;

        bsp.vertices.extend(cube_b.vertices);
        bsp.edges
            .extend(cube_b.edges.into_iter().map(|[a, b]| [a + vert_offset, b + vert_offset]));
        bsp.planes.extend(cube_b.planes);
        bsp.surf_edges.extend(cube_b.surf_edges.into_iter().map(|se| {
            let sign = if se >= 0 { 1 } else { -1 };
            sign * (se.abs() + edge_offset as i32)
        }));
        bsp.faces.extend(cube_b.faces.into_iter().map(|mut f| {
            f.plane += plane_offset as u16;
            f.first_edge += surf_offset;
            f
        }));
        bsp.clipnodes.extend(cube_b.clipnodes.into_iter().map(|mut cn| {
            cn.plane += plane_offset as i32;
            for c in &mut cn.children {
                if *c >= 0 {
                    *c += clip_offset as i16;
                }
            }
            cn
        }));

        let mut b_model = cube_b.models[0].clone();
        b_model.first_face += face_offset;
        for hull in 1..crate::constants::MAX_MAP_HULLS {
            if b_model.head_nodes[hull] >= 0 {
                b_model.head_nodes[hull] += clip_offset;
            }
        }
        bsp.models.push(b_model);

        let env = EditEnv::new();
        let merged = merge_models(&mut bsp, 0, 1, &env).unwrap();

        assert_eq!(bsp.models[merged].face_count, 12);

        let hull1 = bsp.models[merged].head_nodes[1];
        assert_eq!(bsp.point_contents(hull1, Vec3::ZERO, 1), Contents::Solid);
        assert_eq!(bsp.point_contents(hull1, Vec3::new(132.0, 0.0, 0.0), 1), Contents::Solid);
        assert_eq!(bsp.point_contents(hull1, Vec3::new(60.0, 0.0, 0.0), 1), Contents::Empty);
    }

    #[test]
    fn delete_model_shifts_star_references_down() {
        let mut bsp = create_solid(Vec3::splat(-32.0), Vec3::splat(32.0), 0);
        bsp.models.push(bsp.models[0].clone());
        bsp.models.push(bsp.models[0].clone());

        let mut ent = Entity::new();
        ent.insert("classname".into(), "func_door".into());
        ent.insert("model".into(), "*2".into());
        bsp.entities.entities.push(ent);

        delete_model(&mut bsp, 1).unwrap();

        assert_eq!(bsp.entities.get_keyvalue(0, "model"), Some("*1"));
    }
}
