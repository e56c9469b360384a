//! Reference-graph compaction: finds which lump records a model actually
//! uses, drops the rest, and rewrites every surviving index.
//!
//! A BSP file has no garbage collector; every lump is a flat array and
//! cross-references are raw indices. Deleting or duplicating a model means
//! walking its reachable structures, deciding what else still needs them,
//! and only then physically shrinking (or growing) the arrays.

use std::collections::HashSet;

use crate::{
    types::{Bsp, ClipNode, Face, LeafContent, Node},
    vis,
};

/// One bool per record in each compactable lump, plus textures. `true`
/// means "reachable from some model we care about, keep it".
#[derive(Debug, Clone)]
pub struct StructUsage {
    pub planes: Vec<bool>,
    pub clipnodes: Vec<bool>,
    pub nodes: Vec<bool>,
    pub leaves: Vec<bool>,
    pub mark_surfaces: Vec<bool>,
    pub faces: Vec<bool>,
    pub surf_edges: Vec<bool>,
    pub texinfos: Vec<bool>,
    pub edges: Vec<bool>,
    pub vertices: Vec<bool>,
    pub textures: Vec<bool>,
}

impl StructUsage {
    pub fn new(bsp: &Bsp) -> Self {
        Self {
            planes: vec![false; bsp.planes.len()],
            clipnodes: vec![false; bsp.clipnodes.len()],
            nodes: vec![false; bsp.nodes.len()],
            leaves: vec![false; bsp.leaves.len()],
            mark_surfaces: vec![false; bsp.mark_surfaces.len()],
            faces: vec![false; bsp.faces.len()],
            surf_edges: vec![false; bsp.surf_edges.len()],
            texinfos: vec![false; bsp.texinfo.len()],
            edges: vec![false; bsp.edges.len()],
            vertices: vec![false; bsp.vertices.len()],
            textures: vec![false; bsp.textures.len()],
        }
    }

    /// Bitwise AND against `other`: the result marks what both sides use.
    pub fn intersect(&self, other: &Self) -> Self {
        fn and(a: &[bool], b: &[bool]) -> Vec<bool> {
            a.iter().zip(b).map(|(&x, &y)| x && y).collect()
        }
        Self {
            planes: and(&self.planes, &other.planes),
            clipnodes: and(&self.clipnodes, &other.clipnodes),
            nodes: and(&self.nodes, &other.nodes),
            leaves: and(&self.leaves, &other.leaves),
            mark_surfaces: and(&self.mark_surfaces, &other.mark_surfaces),
            faces: and(&self.faces, &other.faces),
            surf_edges: and(&self.surf_edges, &other.surf_edges),
            texinfos: and(&self.texinfos, &other.texinfos),
            edges: and(&self.edges, &other.edges),
            vertices: and(&self.vertices, &other.vertices),
            textures: and(&self.textures, &other.textures),
        }
    }

    pub fn any_shared(&self) -> bool {
        self.planes.contains(&true)
            || self.clipnodes.contains(&true)
            || self.nodes.contains(&true)
            || self.faces.contains(&true)
            || self.texinfos.contains(&true)
    }
}

/// Old-index -> new-index table per lump, produced by [`remove_unused_structs`].
#[derive(Debug, Clone, Default)]
pub struct StructRemap {
    pub planes: Vec<Option<usize>>,
    pub clipnodes: Vec<Option<usize>>,
    pub nodes: Vec<Option<usize>>,
    pub leaves: Vec<Option<usize>>,
    pub mark_surfaces: Vec<Option<usize>>,
    pub faces: Vec<Option<usize>>,
    pub surf_edges: Vec<Option<usize>>,
    pub texinfos: Vec<Option<usize>>,
    pub edges: Vec<Option<usize>>,
    pub vertices: Vec<Option<usize>>,
    pub textures: Vec<Option<usize>>,
}

/// Recursive walk marking every plane/node/face/... reachable from
/// `model_idx`'s hull 0 tree and hulls 1..3's clipnode trees.
pub fn mark_model_structures(bsp: &Bsp, model_idx: usize, usage: &mut StructUsage, skip_leaves: bool) {
    let Some(model) = bsp.models.get(model_idx) else { return };

    mark_node(bsp, model.head_nodes[0], usage, skip_leaves);

    for &head in &model.head_nodes[1..] {
        mark_clipnode(bsp, head, usage);
    }

    // a model's face range is its own even for faces no node in its tree
    // references directly (e.g. a model with a degenerate hull 0).
    let first = model.first_face as usize;
    let count = model.face_count as usize;
    for idx in first..(first + count).min(bsp.faces.len()) {
        mark_face(bsp, idx, usage);
    }
}

fn mark_node(bsp: &Bsp, node_idx: i32, usage: &mut StructUsage, skip_leaves: bool) {
    if node_idx < 0 {
        if skip_leaves {
            return;
        }
        let leaf_idx = !node_idx as usize;
        let Some(leaf) = bsp.leaves.get(leaf_idx) else { return };
        if usage.leaves.get(leaf_idx).copied().unwrap_or(false) {
            return;
        }
        if leaf_idx < usage.leaves.len() {
            usage.leaves[leaf_idx] = true;
        }

        let first = leaf.first_mark_surface as usize;
        let count = leaf.mark_surface_count as usize;
        for ms_idx in first..(first + count).min(bsp.mark_surfaces.len()) {
            if ms_idx < usage.mark_surfaces.len() {
                usage.mark_surfaces[ms_idx] = true;
            }
            let face_idx = bsp.mark_surfaces[ms_idx] as usize;
            mark_face(bsp, face_idx, usage);
        }
        return;
    }

    let idx = node_idx as usize;
    if usage.nodes.get(idx).copied().unwrap_or(true) {
        return;
    }
    usage.nodes[idx] = true;

    let node = &bsp.nodes[idx];
    if (node.plane as usize) < usage.planes.len() {
        usage.planes[node.plane as usize] = true;
    }

    let first = node.first_face as usize;
    let count = node.face_count as usize;
    for f in first..(first + count).min(bsp.faces.len()) {
        mark_face(bsp, f, usage);
    }

    mark_node(bsp, node.children[0] as i32, usage, skip_leaves);
    mark_node(bsp, node.children[1] as i32, usage, skip_leaves);
}

fn mark_clipnode(bsp: &Bsp, node_idx: i32, usage: &mut StructUsage) {
    if node_idx < 0 {
        return;
    }
    let idx = node_idx as usize;
    if idx >= bsp.clipnodes.len() || usage.clipnodes[idx] {
        return;
    }
    usage.clipnodes[idx] = true;

    let cn = &bsp.clipnodes[idx];
    if cn.plane >= 0 && (cn.plane as usize) < usage.planes.len() {
        usage.planes[cn.plane as usize] = true;
    }

    mark_clipnode(bsp, cn.children[0] as i32, usage);
    mark_clipnode(bsp, cn.children[1] as i32, usage);
}

fn mark_face(bsp: &Bsp, face_idx: usize, usage: &mut StructUsage) {
    let Some(face) = bsp.faces.get(face_idx) else { return };
    if usage.faces.get(face_idx).copied().unwrap_or(false) {
        return;
    }
    usage.faces[face_idx] = true;

    if (face.plane as usize) < usage.planes.len() {
        usage.planes[face.plane as usize] = true;
    }
    if (face.texinfo as usize) < usage.texinfos.len() {
        usage.texinfos[face.texinfo as usize] = true;
    }
    if let Some(ti) = bsp.texinfo.get(face.texinfo as usize) {
        if (ti.texture_index as usize) < usage.textures.len() {
            usage.textures[ti.texture_index as usize] = true;
        }
    }

    let first = face.first_edge as usize;
    let count = face.edge_count as usize;
    for se_idx in first..(first + count).min(bsp.surf_edges.len()) {
        usage.surf_edges[se_idx] = true;
        let edge_idx = bsp.surf_edges[se_idx].unsigned_abs() as usize;
        if edge_idx < usage.edges.len() {
            usage.edges[edge_idx] = true;
            let edge = bsp.edges[edge_idx];
            for &v in &edge {
                if (v as usize) < usage.vertices.len() {
                    usage.vertices[v as usize] = true;
                }
            }
        }
    }
}

/// Intersection of what `model_idx` uses and what every other model uses:
/// structures that cannot be freely moved/deleted without first splitting.
pub fn shared_structures(bsp: &Bsp, model_idx: usize) -> StructUsage {
    let mut mine = StructUsage::new(bsp);
    mark_model_structures(bsp, model_idx, &mut mine, false);

    let mut others = StructUsage::new(bsp);
    for i in 0..bsp.models.len() {
        if i != model_idx {
            mark_model_structures(bsp, i, &mut others, false);
        }
    }

    mine.intersect(&others)
}

fn compact<T: Clone>(items: &[T], used: &[bool]) -> (Vec<T>, Vec<Option<usize>>) {
    let mut remap = vec![None; items.len()];
    let mut out = Vec::new();
    for (i, item) in items.iter().enumerate() {
        if used.get(i).copied().unwrap_or(false) {
            remap[i] = Some(out.len());
            out.push(item.clone());
        }
    }
    (out, remap)
}

/// Compacts every lump in canonical order, returning the total number of
/// records removed and the index tables needed to fix up the survivors.
///
/// Canonical order: lightmaps -> planes -> clipnodes -> nodes -> leaves ->
/// marksurfs -> faces -> surfedges -> texinfos -> edges -> verts ->
/// textures. Edge 0 is pinned live: signed surfedges cannot address it.
pub fn remove_unused_structs(bsp: &mut Bsp, mut usage: StructUsage) -> (usize, StructRemap) {
    if !usage.edges.is_empty() {
        usage.edges[0] = true;
    }

    let mut removed = 0;
    let mut remap = StructRemap::default();

    let (planes, r) = compact(&bsp.planes, &usage.planes);
    removed += bsp.planes.len() - planes.len();
    bsp.planes = planes;
    remap.planes = r;

    let (clipnodes, r) = compact(&bsp.clipnodes, &usage.clipnodes);
    removed += bsp.clipnodes.len() - clipnodes.len();
    bsp.clipnodes = clipnodes;
    remap.clipnodes = r;

    let (nodes, r) = compact(&bsp.nodes, &usage.nodes);
    removed += bsp.nodes.len() - nodes.len();
    bsp.nodes = nodes;
    remap.nodes = r;

    // captured before `bsp.leaves` is overwritten below, since VIS recompaction
    // needs every old leaf's row position in the pre-compaction visibility lump.
    let old_vis_offsets: Vec<i32> = bsp.leaves.iter().map(|leaf| leaf.vis_offset).collect();
    let old_num_leaves = bsp.leaves.len();
    let old_visibility = std::mem::take(&mut bsp.visibility);

    let (leaves, r) = compact(&bsp.leaves, &usage.leaves);
    removed += bsp.leaves.len() - leaves.len();
    bsp.leaves = leaves;
    remap.leaves = r;

    recompact_visibility(bsp, &remap, &old_vis_offsets, old_num_leaves, &old_visibility);

    let (mark_surfaces, r) = compact(&bsp.mark_surfaces, &usage.mark_surfaces);
    removed += bsp.mark_surfaces.len() - mark_surfaces.len();
    bsp.mark_surfaces = mark_surfaces;
    remap.mark_surfaces = r;

    let (faces, r) = compact(&bsp.faces, &usage.faces);
    removed += bsp.faces.len() - faces.len();
    bsp.faces = faces;
    remap.faces = r;

    let (surf_edges, r) = compact(&bsp.surf_edges, &usage.surf_edges);
    removed += bsp.surf_edges.len() - surf_edges.len();
    bsp.surf_edges = surf_edges;
    remap.surf_edges = r;

    let (texinfo, r) = compact(&bsp.texinfo, &usage.texinfos);
    removed += bsp.texinfo.len() - texinfo.len();
    bsp.texinfo = texinfo;
    remap.texinfos = r;

    let (edges, r) = compact(&bsp.edges, &usage.edges);
    removed += bsp.edges.len() - edges.len();
    bsp.edges = edges;
    remap.edges = r;

    let (vertices, r) = compact(&bsp.vertices, &usage.vertices);
    removed += bsp.vertices.len() - vertices.len();
    bsp.vertices = vertices;
    remap.vertices = r;

    let (textures, r) = compact(&bsp.textures, &usage.textures);
    removed += bsp.textures.len() - textures.len();
    bsp.textures = textures;
    remap.textures = r;

    apply_remap_everywhere(bsp, &remap);

    (removed, remap)
}

/// Recompresses `bsp.visibility` to the post-compaction leaf count and
/// restamps every surviving leaf's `vis_offset`, using `remap.leaves` as the
/// column remap (§4.L: VIS is recompressed after a leaf count change).
/// Leaves dropped from the graph drop their row; any leaf that had no row to
/// begin with (`vis_offset < 0`) keeps that state.
fn recompact_visibility(
    bsp: &mut Bsp,
    remap: &StructRemap,
    old_vis_offsets: &[i32],
    old_num_leaves: usize,
    old_visibility: &[u8],
) {
    let new_num_leaves = bsp.leaves.len();

    let mut rows = Vec::new();
    let mut row_targets = Vec::new();
    for (old_idx, &vis_offset) in old_vis_offsets.iter().enumerate() {
        let Some(Some(new_idx)) = remap.leaves.get(old_idx) else { continue };
        if vis_offset < 0 {
            continue;
        }
        rows.push(old_visibility[vis_offset as usize..].to_vec());
        row_targets.push(*new_idx);
    }

    let (new_visibility, row_offsets) = vis::remap_leaf_count(&rows, old_num_leaves, new_num_leaves, &remap.leaves);
    bsp.visibility = new_visibility;

    for leaf in &mut bsp.leaves {
        leaf.vis_offset = -1;
    }
    for (row_i, &new_idx) in row_targets.iter().enumerate() {
        bsp.leaves[new_idx].vis_offset = row_offsets[row_i] as i32;
    }
}

pub(crate) fn remap_face_fields(face: &mut Face, remap: &StructRemap) {
    if let Some(Some(p)) = remap.planes.get(face.plane as usize) {
        face.plane = *p as u16;
    }
    if let Some(Some(t)) = remap.texinfos.get(face.texinfo as usize) {
        face.texinfo = *t as u16;
    }
    if let Some(Some(fe)) = remap.surf_edges.get(face.first_edge as usize) {
        face.first_edge = *fe as i32;
    }
}

pub(crate) fn remap_node_fields(node: &mut Node, remap: &StructRemap) {
    if let Some(Some(p)) = remap.planes.get(node.plane as usize) {
        node.plane = *p as u32;
    }
    for child in &mut node.children {
        if *child >= 0 {
            if let Some(Some(n)) = remap.nodes.get(*child as usize) {
                *child = *n as i16;
            }
        } else {
            let leaf_idx = !*child as usize;
            if let Some(Some(l)) = remap.leaves.get(leaf_idx) {
                *child = !(*l as i16);
            }
        }
    }
    if let Some(Some(f)) = remap.faces.get(node.first_face as usize) {
        node.first_face = *f as u16;
    }
}

pub(crate) fn remap_clipnode_fields(cn: &mut ClipNode, remap: &StructRemap) {
    if cn.plane >= 0 {
        if let Some(Some(p)) = remap.planes.get(cn.plane as usize) {
            cn.plane = *p as i32;
        }
    }
    for child in &mut cn.children {
        if *child >= 0 {
            if let Some(Some(n)) = remap.clipnodes.get(*child as usize) {
                *child = *n as i16;
            }
        }
        // negative children are content codes, never remapped.
    }
}

/// Rewrites every surviving record's cross-references after a compaction
/// pass. Surfedges, mark-surfaces, and face/node/leaf ranges are assumed
/// contiguous and unchanged in length (a kept parent always keeps its
/// entire child range) — only the starting index moves.
fn apply_remap_everywhere(bsp: &mut Bsp, remap: &StructRemap) {
    for node in &mut bsp.nodes {
        remap_node_fields(node, remap);
    }
    for cn in &mut bsp.clipnodes {
        remap_clipnode_fields(cn, remap);
    }
    for face in &mut bsp.faces {
        remap_face_fields(face, remap);
    }
    for leaf in &mut bsp.leaves {
        if let Some(Some(ms)) = remap.mark_surfaces.get(leaf.first_mark_surface as usize) {
            leaf.first_mark_surface = *ms as u16;
        }
    }
    for se in &mut bsp.surf_edges {
        let edge_idx = se.unsigned_abs() as usize;
        if let Some(Some(e)) = remap.edges.get(edge_idx) {
            *se = if *se >= 0 { *e as i32 } else { -(*e as i32) };
        }
    }
    for ms in &mut bsp.mark_surfaces {
        if let Some(Some(f)) = remap.faces.get(*ms as usize) {
            *ms = *f as u16;
        }
    }
    for ti in &mut bsp.texinfo {
        if let Some(Some(t)) = remap.textures.get(ti.texture_index as usize) {
            ti.texture_index = *t as u32;
        }
    }
    for model in &mut bsp.models {
        for (hull, head) in model.head_nodes.iter_mut().enumerate() {
            if *head < 0 {
                continue;
            }
            let table = if hull == 0 { &remap.nodes } else { &remap.clipnodes };
            if let Some(Some(n)) = table.get(*head as usize) {
                *head = *n as i32;
            }
        }
        if let Some(Some(f)) = remap.faces.get(model.first_face as usize) {
            model.first_face = *f as i32;
        }
    }
}

/// Rewrites only the structures reachable from `model_idx` against
/// `remap`, using a visitation set so a structure shared within the
/// model's own tree (a reconverging DAG edge) is never remapped twice.
pub fn remap_model_structures(bsp: &mut Bsp, model_idx: usize, remap: &StructRemap) {
    let Some(model) = bsp.models.get(model_idx).cloned() else { return };

    let mut visited = HashSet::new();
    remap_node_subtree(bsp, model.head_nodes[0], remap, &mut visited);

    for &head in &model.head_nodes[1..] {
        let mut visited_cn = HashSet::new();
        remap_clipnode_subtree(bsp, head, remap, &mut visited_cn);
    }
}

fn remap_node_subtree(bsp: &mut Bsp, node_idx: i32, remap: &StructRemap, visited: &mut HashSet<i32>) {
    if node_idx < 0 || !visited.insert(node_idx) {
        return;
    }
    let idx = node_idx as usize;
    if idx >= bsp.nodes.len() {
        return;
    }
    let (c0, c1) = {
        let node = &mut bsp.nodes[idx];
        remap_node_fields(node, remap);
        (node.children[0] as i32, node.children[1] as i32)
    };
    remap_node_subtree(bsp, c0, remap, visited);
    remap_node_subtree(bsp, c1, remap, visited);
}

fn remap_clipnode_subtree(bsp: &mut Bsp, node_idx: i32, remap: &StructRemap, visited: &mut HashSet<i32>) {
    if node_idx < 0 || !visited.insert(node_idx) {
        return;
    }
    let idx = node_idx as usize;
    if idx >= bsp.clipnodes.len() {
        return;
    }
    let (c0, c1) = {
        let cn = &mut bsp.clipnodes[idx];
        remap_clipnode_fields(cn, remap);
        (cn.children[0] as i32, cn.children[1] as i32)
    };
    remap_clipnode_subtree(bsp, c0, remap, visited);
    remap_clipnode_subtree(bsp, c1, remap, visited);
}

/// Physically duplicates every plane/clipnode/texinfo that `model_idx`
/// shares with any other model, appending the copy and rewriting only
/// this model's references to it. Call before mutating a shared model.
pub fn split_shared_model_structures(bsp: &mut Bsp, model_idx: usize) {
    let shared = shared_structures(bsp, model_idx);
    if !shared.any_shared() {
        return;
    }

    let mut plane_dup = vec![None; bsp.planes.len()];
    for (i, &is_shared) in shared.planes.iter().enumerate() {
        if is_shared {
            plane_dup[i] = Some(bsp.planes.len());
            bsp.planes.push(bsp.planes[i].clone());
        }
    }

    let mut texinfo_dup = vec![None; bsp.texinfo.len()];
    for (i, &is_shared) in shared.texinfos.iter().enumerate() {
        if is_shared {
            texinfo_dup[i] = Some(bsp.texinfo.len());
            bsp.texinfo.push(bsp.texinfo[i].clone());
        }
    }

    let mut clipnode_dup = vec![None; bsp.clipnodes.len()];
    for (i, &is_shared) in shared.clipnodes.iter().enumerate() {
        if is_shared {
            clipnode_dup[i] = Some(bsp.clipnodes.len());
            bsp.clipnodes.push(bsp.clipnodes[i].clone());
        }
    }

    let dup_remap = StructRemap {
        planes: plane_dup,
        texinfos: texinfo_dup,
        clipnodes: clipnode_dup,
        ..Default::default()
    };

    remap_model_structures(bsp, model_idx, &dup_remap);

    for face in &mut bsp.faces {
        if let Some(Some(t)) = dup_remap.texinfos.get(face.texinfo as usize) {
            face.texinfo = *t as u16;
        }
    }
}

fn bounds_out_of_extent(mins: [i16; 3], maxs: [i16; 3], extent: f32) -> bool {
    (0..3).any(|axis| mins[axis] as f32 > extent || (maxs[axis] as f32) < -extent)
}

fn find_out_of_bounds<T>(items: &[T], bounds: impl Fn(&T) -> ([i16; 3], [i16; 3]), extent: f32) -> Vec<usize> {
    items
        .iter()
        .enumerate()
        .filter_map(|(i, item)| {
            let (mins, maxs) = bounds(item);
            bounds_out_of_extent(mins, maxs, extent).then_some(i)
        })
        .collect()
}

/// Nodes and leaves out of the configured map extent, found by [`prune_out_of_bounds`].
#[derive(Debug, Clone, Default)]
pub struct OobPruneReport {
    pub oob_nodes: Vec<usize>,
    pub oob_leaves_evicted: Vec<usize>,
}

/// Trims content beyond the map's configured extent. The original tool had
/// two near-identical walks here, one over [`crate::types::Node`] and one
/// over [`crate::types::Leaf`], that differed only in which array they
/// checked and what "out of bounds" meant for it; both reduce to the same
/// `mins`/`maxs` bounds test, unified here as [`find_out_of_bounds`].
///
/// Node bounds are reported but not rewritten: collapsing a node's
/// subtree into a solid leaf is a topology edit left to a caller that
/// also owns clipnode consistency. Leaves are evicted outright: every
/// mark surface an out-of-bounds leaf references is dropped and its
/// contents flip to solid, regardless of whether some of its faces
/// happen to sit back inside the extent. The original code tried to
/// special-case a "partially out of bounds" leaf by comparing an OOB-face
/// counter against `leaf.mark_surface_count`, but the counter it compared
/// against was always zero, so the branch never took the path its name
/// implied. There is no partial eviction here on purpose.
pub fn prune_out_of_bounds(bsp: &mut Bsp, env: &crate::edit_env::EditEnv) -> OobPruneReport {
    let extent = env.map_extent;

    let oob_nodes = find_out_of_bounds(&bsp.nodes, |n| (n.mins, n.maxs), extent);
    let oob_leaf_indices = find_out_of_bounds(&bsp.leaves, |l| (l.mins, l.maxs), extent);

    let mut oob_leaves_evicted = Vec::new();
    for &leaf_idx in &oob_leaf_indices {
        let leaf = &bsp.leaves[leaf_idx];
        if leaf.mark_surface_count == 0 && leaf.contents == LeafContent::ContentsSolid {
            continue;
        }

        log::warn!(
            "leaf {leaf_idx} lies outside the {extent} map extent, evicting {} mark surface(s)",
            leaf.mark_surface_count
        );

        bsp.leaves[leaf_idx].mark_surface_count = 0;
        bsp.leaves[leaf_idx].contents = LeafContent::ContentsSolid;
        oob_leaves_evicted.push(leaf_idx);
    }

    if !oob_nodes.is_empty() {
        log::warn!("{} node(s) lie outside the {extent} map extent", oob_nodes.len());
    }

    OobPruneReport { oob_nodes, oob_leaves_evicted }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        edit_env::EditEnv,
        entity::EntityTable,
        types::{Model, Plane, PlaneType},
    };
    use glam::Vec3;

    fn minimal_bsp_two_models() -> Bsp {
        let plane = Plane { normal: Vec3::X, distance: 0.0, type_: PlaneType::X };
        Bsp {
            entities: EntityTable::new(),
            planes: vec![plane.clone(), plane],
            textures: vec![],
            vertices: vec![],
            visibility: vec![],
            nodes: vec![],
            texinfo: vec![],
            faces: vec![],
            lightmap: vec![],
            clipnodes: vec![
                ClipNode { plane: 0, children: [LeafContent::ContentsEmpty as i16, LeafContent::ContentsSolid as i16] },
                ClipNode { plane: 1, children: [LeafContent::ContentsEmpty as i16, LeafContent::ContentsSolid as i16] },
            ],
            leaves: vec![],
            mark_surfaces: vec![],
            edges: vec![],
            surf_edges: vec![],
            models: vec![
                Model {
                    mins: Vec3::splat(-1.0),
                    maxs: Vec3::splat(1.0),
                    origin: Vec3::ZERO,
                    head_nodes: [-1, 0, 0, 0],
                    vis_leaves_count: 0,
                    first_face: 0,
                    face_count: 0,
                },
                Model {
                    mins: Vec3::splat(-1.0),
                    maxs: Vec3::splat(1.0),
                    origin: Vec3::ZERO,
                    head_nodes: [-1, 1, 1, 1],
                    vis_leaves_count: 0,
                    first_face: 0,
                    face_count: 0,
                },
            ],
        }
    }

    #[test]
    fn mark_model_structures_only_touches_its_own_plane() {
        let bsp = minimal_bsp_two_models();
        let mut usage = StructUsage::new(&bsp);
        mark_model_structures(&bsp, 0, &mut usage, false);

        assert!(usage.planes[0]);
        assert!(!usage.planes[1]);
        assert!(usage.clipnodes[0]);
        assert!(!usage.clipnodes[1]);
    }

    #[test]
    fn shared_structures_empty_for_disjoint_models() {
        let bsp = minimal_bsp_two_models();
        let shared = shared_structures(&bsp, 0);
        assert!(!shared.any_shared());
    }

    #[test]
    fn remove_unused_structs_drops_unreferenced_plane() {
        let mut bsp = minimal_bsp_two_models();
        bsp.models.truncate(1);

        let mut usage = StructUsage::new(&bsp);
        mark_model_structures(&bsp, 0, &mut usage, false);

        let (removed, _remap) = remove_unused_structs(&mut bsp, usage);
        assert_eq!(removed, 2); // plane 1 and clipnode 1 go unused
        assert_eq!(bsp.planes.len(), 1);
        assert_eq!(bsp.clipnodes.len(), 1);
    }

    fn leaf_with_bounds(mins: [i16; 3], maxs: [i16; 3], mark_surface_count: u16) -> crate::types::Leaf {
        crate::types::Leaf {
            contents: LeafContent::ContentsEmpty,
            vis_offset: -1,
            mins,
            maxs,
            first_mark_surface: 0,
            mark_surface_count,
            ambient_levels: [0; 4],
        }
    }

    #[test]
    fn prune_out_of_bounds_evicts_only_the_leaf_beyond_the_extent() {
        let mut bsp = minimal_bsp_two_models();
        bsp.leaves = vec![
            leaf_with_bounds([-10, -10, -10], [10, 10, 10], 3),
            leaf_with_bounds([20_000, 0, 0], [20_100, 10, 10], 2),
        ];
        let mut env = EditEnv::new();
        env.map_extent = 100.0;

        let report = prune_out_of_bounds(&mut bsp, &env);

        assert_eq!(report.oob_leaves_evicted, vec![1]);
        assert_eq!(bsp.leaves[0].mark_surface_count, 3);
        assert_eq!(bsp.leaves[1].mark_surface_count, 0);
        assert_eq!(bsp.leaves[1].contents, LeafContent::ContentsSolid);
    }

    #[test]
    fn prune_out_of_bounds_is_a_no_op_when_everything_is_inside() {
        let mut bsp = minimal_bsp_two_models();
        bsp.leaves = vec![leaf_with_bounds([-10, -10, -10], [10, 10, 10], 5)];
        let env = EditEnv::new();

        let report = prune_out_of_bounds(&mut bsp, &env);

        assert!(report.oob_nodes.is_empty());
        assert!(report.oob_leaves_evicted.is_empty());
        assert_eq!(bsp.leaves[0].mark_surface_count, 5);
    }

    #[test]
    fn remove_unused_structs_recompresses_vis_and_restamps_offsets() {
        let mut bsp = minimal_bsp_two_models();
        bsp.leaves = vec![
            leaf_with_bounds([0, 0, 0], [1, 1, 1], 0), // survives, sees old leaf 2
            leaf_with_bounds([0, 0, 0], [1, 1, 1], 0), // dropped
            leaf_with_bounds([0, 0, 0], [1, 1, 1], 0), // survives, sees old leaf 0
        ];
        // each row is 1 content byte + 7 bytes of implicit 64-leaf padding.
        let row_leaf0 = vec![0b100, 0, 0, 0, 0, 0, 0, 0]; // sees leaf 2
        let row_leaf2 = vec![0b001, 0, 0, 0, 0, 0, 0, 0]; // sees leaf 0
        let compressed0 = vis::compress(&row_leaf0);
        bsp.leaves[0].vis_offset = 0;
        bsp.leaves[2].vis_offset = compressed0.len() as i32;
        bsp.visibility = [compressed0.clone(), vis::compress(&row_leaf2)].concat();

        let mut usage = StructUsage::new(&bsp);
        usage.leaves = vec![true, false, true];

        let (_removed, remap) = remove_unused_structs(&mut bsp, usage);

        assert_eq!(bsp.leaves.len(), 2);
        assert_eq!(remap.leaves, vec![Some(0), None, Some(1)]);

        // new leaf 0 (old leaf 0) now sees new leaf 1 (old leaf 2): bit 1.
        let new_row0 = vis::decompress(&bsp.visibility[bsp.leaves[0].vis_offset as usize..], 2);
        assert_eq!(new_row0[0] & 0b11, 0b10);

        // new leaf 1 (old leaf 2) now sees new leaf 0 (old leaf 0): bit 0.
        let new_row1 = vis::decompress(&bsp.visibility[bsp.leaves[1].vis_offset as usize..], 2);
        assert_eq!(new_row1[0] & 0b11, 0b01);
    }

    #[test]
    fn remove_unused_structs_leaves_missing_vis_rows_alone() {
        let mut bsp = minimal_bsp_two_models();
        bsp.leaves = vec![
            leaf_with_bounds([0, 0, 0], [1, 1, 1], 0),
            leaf_with_bounds([0, 0, 0], [1, 1, 1], 0),
        ];
        bsp.leaves[0].vis_offset = -1;
        bsp.leaves[1].vis_offset = -1;
        bsp.visibility = vec![];

        let mut usage = StructUsage::new(&bsp);
        usage.leaves = vec![true, true];

        let (_removed, _remap) = remove_unused_structs(&mut bsp, usage);

        assert!(bsp.visibility.is_empty());
        assert!(bsp.leaves.iter().all(|l| l.vis_offset == -1));
    }
}
