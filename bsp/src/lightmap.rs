//! Lightmap atlas packing: a 2D bin-packer that places each face's luxel
//! footprint into a fixed-size atlas for external consumption (preview
//! renderers, baking tools), plus the best-effort texel carryover used when
//! a face's footprint changes size after a re-pack.
//!
//! The BSP lightmap lump itself stores texels linearly per face; this
//! module's atlas coordinates are a separate addressing scheme layered on
//! top, not a rewrite of that lump's layout.

use crate::{edit_env::EditEnv, face_editor, types::Bsp};

/// A single quad-tree bin packer, Sleator-style: a leaf node is either free,
/// used, or split into two children along whichever dimension has more slack.
struct QuadNode {
    x: u32,
    y: u32,
    w: u32,
    h: u32,
    used: bool,
    children: Option<Box<(QuadNode, QuadNode)>>,
}

impl QuadNode {
    fn new(x: u32, y: u32, w: u32, h: u32) -> Self {
        Self { x, y, w, h, used: false, children: None }
    }

    /// Finds a free `w x h` slot under this node, marks it used and returns
    /// its top-left corner. `None` if nothing in this subtree fits.
    fn insert(&mut self, w: u32, h: u32) -> Option<(u32, u32)> {
        if let Some(children) = &mut self.children {
            let (left, right) = children.as_mut();
            return left.insert(w, h).or_else(|| right.insert(w, h));
        }

        if self.used || w > self.w || h > self.h {
            return None;
        }

        if w == self.w && h == self.h {
            self.used = true;
            return Some((self.x, self.y));
        }

        let free_w = self.w - w;
        let free_h = self.h - h;

        let (first, second) = if free_w > free_h {
            (
                QuadNode::new(self.x, self.y, w, self.h),
                QuadNode::new(self.x + w, self.y, self.w - w, self.h),
            )
        } else {
            (
                QuadNode::new(self.x, self.y, self.w, h),
                QuadNode::new(self.x, self.y + h, self.w, self.h - h),
            )
        };

        let mut children = Box::new((first, second));
        let result = children.0.insert(w, h);
        self.children = Some(children);
        result
    }
}

/// One atlas, divided into a grid of independently-packed zones so a single
/// face's allocation never has to search the whole atlas.
struct Atlas {
    zone_size: u32,
    zones: Vec<QuadNode>,
}

impl Atlas {
    fn new(atlas_size: u32, zone_size: u32) -> Self {
        let per_side = (atlas_size / zone_size).max(1);
        let mut zones = Vec::with_capacity((per_side * per_side) as usize);
        for zy in 0..per_side {
            for zx in 0..per_side {
                zones.push(QuadNode::new(zx * zone_size, zy * zone_size, zone_size, zone_size));
            }
        }
        Self { zone_size, zones }
    }

    fn insert(&mut self, w: u32, h: u32) -> Option<(u32, u32)> {
        if w > self.zone_size || h > self.zone_size {
            return None;
        }
        self.zones.iter_mut().find_map(|z| z.insert(w, h))
    }
}

/// Packs lightmap footprints across one or more fixed-size atlases,
/// allocating a new atlas whenever the current one is full.
pub struct AtlasAllocator {
    atlas_size: u32,
    zone_size: u32,
    atlases: Vec<Atlas>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AtlasSlot {
    pub atlas_id: usize,
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl AtlasSlot {
    /// Mid-texel UV of the texel at `(tx, ty)` within this slot, normalized
    /// to the atlas's full side length.
    pub fn mid_texel_uv(&self, atlas_size: u32, tx: u32, ty: u32) -> (f32, f32) {
        let u = (self.x + tx) as f32 + 0.5;
        let v = (self.y + ty) as f32 + 0.5;
        (u / atlas_size as f32, v / atlas_size as f32)
    }
}

impl AtlasAllocator {
    pub fn new(atlas_size: u32, zone_size: u32) -> Self {
        Self { atlas_size, zone_size, atlases: vec![Atlas::new(atlas_size, zone_size)] }
    }

    pub fn from_env(env: &EditEnv) -> Self {
        Self::new(env.atlas_size, env.atlas_zone_size)
    }

    /// Allocates a `w x h` footprint, trying existing atlases in order
    /// before opening a new one.
    pub fn alloc(&mut self, w: u32, h: u32) -> AtlasSlot {
        for (atlas_id, atlas) in self.atlases.iter_mut().enumerate() {
            if let Some((x, y)) = atlas.insert(w, h) {
                return AtlasSlot { atlas_id, x, y, w, h };
            }
        }

        let mut fresh = Atlas::new(self.atlas_size, self.zone_size);
        let (x, y) = fresh
            .insert(w, h)
            .expect("a fresh atlas must fit any footprint within one zone");
        let atlas_id = self.atlases.len();
        self.atlases.push(fresh);
        AtlasSlot { atlas_id, x, y, w, h }
    }
}

/// One face's atlas placement, plus one mid-texel `(u, v)` sample per light
/// style layer it carries (every layer shares the same footprint).
#[derive(Debug, Clone)]
pub struct FacePacking {
    pub face_idx: usize,
    pub slot: AtlasSlot,
    pub mid_texel_uvs: Vec<(f32, f32)>,
}

/// Packs every lit face's luxel footprint into `allocator`, skipping faces
/// with no lightmap at all (`styles[0] == Face::NO_LIGHTMAP_STYLE`).
pub fn pack_all_faces(bsp: &Bsp, allocator: &mut AtlasAllocator) -> Vec<FacePacking> {
    let mut out = Vec::new();

    for face_idx in 0..bsp.faces.len() {
        let face = &bsp.faces[face_idx];
        if !face.has_lightmap() {
            continue;
        }

        let (w, h) = face_editor::face_luxel_extent(bsp, face_idx);
        let style_count = face.style_count().max(1);
        let slot = allocator.alloc(w.max(1), h.max(1));

        let center = slot.mid_texel_uv(allocator.atlas_size, slot.w / 2, slot.h / 2);
        let mid_texel_uvs = vec![center; style_count];

        out.push(FacePacking { face_idx, slot, mid_texel_uvs });
    }

    out
}

/// Carries a face's texel data over to a resized footprint: an unchanged
/// size is a straight copy; a changed size searches +-1 texel offsets for
/// the alignment with the largest overlap, copies what overlaps, and fills
/// anything left uncovered with a checker pattern so a missed re-bake is
/// visibly obvious rather than silently black.
pub fn relocate_lightmap_texels(
    old: &[[u8; 3]],
    old_w: u32,
    old_h: u32,
    new_w: u32,
    new_h: u32,
) -> Vec<[u8; 3]> {
    if old_w == new_w && old_h == new_h {
        return old.to_vec();
    }

    const CHECKER_A: [u8; 3] = [255, 0, 255];
    const CHECKER_B: [u8; 3] = [0, 0, 0];

    let mut best_offset = (0i32, 0i32);
    let mut best_overlap = -1i64;

    for dy in -1..=1i32 {
        for dx in -1..=1i32 {
            let ox = (old_w as i32 + dx).min(new_w as i32).max(0);
            let oy = (old_h as i32 + dy).min(new_h as i32).max(0);
            let overlap_w = ox.min(new_w as i32).min(old_w as i32);
            let overlap_h = oy.min(new_h as i32).min(old_h as i32);
            let overlap = (overlap_w.max(0) as i64) * (overlap_h.max(0) as i64);
            if overlap > best_overlap {
                best_overlap = overlap;
                best_offset = (dx, dy);
            }
        }
    }

    let mut out = vec![CHECKER_B; (new_w * new_h) as usize];
    for ty in 0..new_h {
        for tx in 0..new_w {
            let checker = if (tx + ty) % 2 == 0 { CHECKER_A } else { CHECKER_B };
            out[(ty * new_w + tx) as usize] = checker;
        }
    }

    let (dx, dy) = best_offset;
    for sy in 0..old_h {
        let dy_idx = sy as i32 + dy;
        if dy_idx < 0 || dy_idx >= new_h as i32 {
            continue;
        }
        for sx in 0..old_w {
            let dx_idx = sx as i32 + dx;
            if dx_idx < 0 || dx_idx >= new_w as i32 {
                continue;
            }
            out[(dy_idx as u32 * new_w + dx_idx as u32) as usize] = old[(sy * old_w + sx) as usize];
        }
    }

    out
}

#[cfg(test)]
mod test {
    use super::*;

    fn slots_overlap(a: &AtlasSlot, b: &AtlasSlot) -> bool {
        a.atlas_id == b.atlas_id
            && a.x < b.x + b.w
            && b.x < a.x + a.w
            && a.y < b.y + b.h
            && b.y < a.y + a.h
    }

    #[test]
    fn s5_two_allocations_in_one_zone_do_not_overlap() {
        let mut allocator = AtlasAllocator::new(2048, 128);

        let first = allocator.alloc(50, 40);
        assert_eq!((first.atlas_id, first.x, first.y), (0, 0, 0));

        let second = allocator.alloc(80, 80);
        assert!(!slots_overlap(&first, &second));
        assert!(second.x + second.w <= 2048);
        assert!(second.y + second.h <= 2048);
    }

    #[test]
    fn packs_many_small_faces_without_overlap() {
        let mut allocator = AtlasAllocator::new(256, 128);
        let mut slots = Vec::new();

        for _ in 0..20 {
            slots.push(allocator.alloc(16, 16));
        }

        for i in 0..slots.len() {
            for j in (i + 1)..slots.len() {
                assert!(!slots_overlap(&slots[i], &slots[j]), "slots {i} and {j} overlap");
            }
        }
    }

    #[test]
    fn exhausting_one_atlas_opens_a_second() {
        let mut allocator = AtlasAllocator::new(128, 128);
        let first = allocator.alloc(128, 128);
        let second = allocator.alloc(128, 128);
        assert_eq!(first.atlas_id, 0);
        assert_eq!(second.atlas_id, 1);
    }

    #[test]
    fn relocate_same_size_is_a_plain_copy() {
        let old = vec![[1u8, 2, 3]; 16];
        let moved = relocate_lightmap_texels(&old, 4, 4, 4, 4);
        assert_eq!(moved, old);
    }

    #[test]
    fn relocate_grown_footprint_preserves_original_corner_and_fills_the_rest() {
        let old = vec![[9u8, 9, 9]; 4]; // 2x2
        let moved = relocate_lightmap_texels(&old, 2, 2, 4, 4);

        assert_eq!(moved.len(), 16);
        assert_eq!(moved[0], [9, 9, 9]);
        assert!(moved.iter().any(|&px| px != [9, 9, 9]));
    }
}
