//! Texture lump edits: adding a brand new embedded texture, splicing pixel
//! data in or out against a loaded WAD, and resampling an embedded texture
//! down in place.
//!
//! GoldSrc miptex records are always 8-bit paletted with exactly 4 mip
//! levels (full size, 1/2, 1/4, 1/8 per axis), so every operation here ends
//! by requantizing to at most 256 colors and rebuilding all four levels
//! together, never touching the levels independently.

use wad::{
    quantize::{downsample_box, downsample_nearest, quantize_median_cut},
    types::{FileEntry, MipTex, Wad},
};

use crate::{edit_env::EditEnv, error::EditError};

fn downsample_indices_nearest(indices: &[u8], w: u32, h: u32, new_w: u32, new_h: u32) -> Vec<u8> {
    let mut out = vec![0u8; (new_w * new_h) as usize];
    for dy in 0..new_h {
        let sy = (dy as u64 * h as u64 / new_h as u64).min(h as u64 - 1) as u32;
        for dx in 0..new_w {
            let sx = (dx as u64 * w as u64 / new_w as u64).min(w as u64 - 1) as u32;
            out[(dy * new_w + dx) as usize] = indices[(sy * w + sx) as usize];
        }
    }
    out
}

/// Builds the 4 mip levels for a miptex from one full-size index buffer,
/// each half the linear resolution of the one before, by nearest-sampling
/// the index buffer directly (averaging palette indices is meaningless).
fn build_mip_chain(indices: &[u8], w: u32, h: u32) -> [Vec<u8>; 4] {
    let mip0 = indices.to_vec();
    let mip1 = downsample_indices_nearest(&mip0, w, h, (w / 2).max(1), (h / 2).max(1));
    let mip2 = downsample_indices_nearest(&mip1, (w / 2).max(1), (h / 2).max(1), (w / 4).max(1), (h / 4).max(1));
    let mip3 = downsample_indices_nearest(&mip2, (w / 4).max(1), (h / 4).max(1), (w / 8).max(1), (h / 8).max(1));
    [mip0, mip1, mip2, mip3]
}

/// Palette index reserved for the transparency key, matching the engine
/// convention (`wad::constants::TRANSPARENT_PALETTE_INDEX`, not exported).
const TRANSPARENT_PALETTE_INDEX: usize = 255;

fn transparent_key_color(tex: &MipTex) -> Option<[u8; 3]> {
    tex.texture_name
        .is_transparent_key()
        .then(|| tex.palette.get_bytes()[TRANSPARENT_PALETTE_INDEX])
}

/// Adds a new embedded texture built from a full-size RGB24 image,
/// quantizing to at most 256 colors and building the 4 mip levels by
/// nearest downsampling. Returns the new texture's index.
pub fn add_texture(
    bsp: &mut crate::types::Bsp,
    name: &str,
    rgb: &[u8],
    (w, h): (u32, u32),
    env: &EditEnv,
) -> Result<usize, EditError> {
    env.check_limit("textures", bsp.textures.len() + 1, env.limits.max_textures)?;

    // masked textures (`{`/`!` prefix) use pure blue as the documented key
    // color; every pixel this exact shade maps to the reserved palette slot.
    let keep_color = name
        .chars()
        .next()
        .is_some_and(|c| matches!(c, '{' | '!'))
        .then_some([0u8, 0, 255]);

    let (palette, indices) = quantize_median_cut(rgb, 256, keep_color)?;
    let [mip0, mip1, mip2, mip3] = build_mip_chain(&indices, w, h);

    let miptex = MipTex::new(name, (w, h), &[&mip0, &mip1, &mip2, &mip3], palette);
    bsp.textures.push(miptex);

    log::debug!("added texture `{name}` ({w}x{h})");
    Ok(bsp.textures.len() - 1)
}

/// Copies pixel data from a loaded WAD into a WAD-referenced (external)
/// texture record, turning it embedded. A no-op if the record already
/// carries pixel data. Adjusts UVs if the WAD's stored dimensions differ
/// from what the bsp record had on file.
pub fn embed(bsp: &mut crate::types::Bsp, texture_idx: usize, wad: &Wad) -> Result<(), EditError> {
    let tex = bsp
        .textures
        .get(texture_idx)
        .ok_or(EditError::BadIndex { lump: "textures", index: texture_idx as i64, len: bsp.textures.len() })?;

    if !tex.is_external() {
        return Ok(());
    }

    let name = tex.texture_name.get_string();
    let (old_w, old_h) = (tex.width, tex.height);

    let entry = wad.find(&name).ok_or_else(|| EditError::MissingTexture { name: name.clone() })?;
    let FileEntry::MipTex(src) = &entry.file_entry else {
        return Err(EditError::MissingTexture { name });
    };

    let (new_w, new_h) = (src.width, src.height);
    bsp.textures[texture_idx] = src.clone();

    if (new_w, new_h) != (old_w, old_h) {
        crate::face_editor::adjust_resized_texture_coordinates(bsp, texture_idx, (old_w, old_h), (new_w, new_h))?;
    }

    log::debug!("embedded texture `{name}` from wad");
    Ok(())
}

/// Strips an embedded texture's pixel data back to a name-only WAD
/// reference, restoring width/height from the matching WAD entry and
/// adjusting UVs if that leaves a size mismatch against what was embedded.
pub fn unembed(bsp: &mut crate::types::Bsp, texture_idx: usize, wad: &Wad) -> Result<(), EditError> {
    let tex = bsp
        .textures
        .get(texture_idx)
        .ok_or(EditError::BadIndex { lump: "textures", index: texture_idx as i64, len: bsp.textures.len() })?;

    if tex.is_external() {
        return Ok(());
    }

    let name = tex.texture_name.get_string();
    let (old_w, old_h) = (tex.width, tex.height);

    let entry = wad.find(&name).ok_or_else(|| EditError::MissingTexture { name: name.clone() })?;
    let (wad_w, wad_h) = entry.file_entry.dimensions();

    let tex = &mut bsp.textures[texture_idx];
    tex.mip_images.clear();
    tex.mip_offsets = vec![0, 0, 0, 0];
    tex.width = wad_w;
    tex.height = wad_h;

    if (wad_w, wad_h) != (old_w, old_h) {
        crate::face_editor::adjust_resized_texture_coordinates(bsp, texture_idx, (old_w, old_h), (wad_w, wad_h))?;
    }

    log::debug!("unembedded texture `{name}`, restored to {wad_w}x{wad_h}");
    Ok(())
}

/// Resamples an embedded texture down to `(new_w, new_h)` in place: box
/// filter for ordinary textures, nearest-neighbor for the masked/key-color
/// convention so the key survives exactly, then requantizes to <=256 colors
/// and always re-pins every affected face's UVs to the new resolution.
pub fn downscale(
    bsp: &mut crate::types::Bsp,
    texture_idx: usize,
    new_w: u32,
    new_h: u32,
    env: &EditEnv,
) -> Result<(), EditError> {
    let _ = env;
    let tex = bsp
        .textures
        .get(texture_idx)
        .ok_or(EditError::BadIndex { lump: "textures", index: texture_idx as i64, len: bsp.textures.len() })?;

    if tex.is_external() {
        return Err(EditError::MissingTexture { name: tex.texture_name.get_string() });
    }

    let (old_w, old_h) = (tex.width, tex.height);
    if new_w >= old_w && new_h >= old_h {
        return Ok(());
    }

    let keep_color = transparent_key_color(tex);
    let (rgb, _) = tex.to_rgb();

    let resized = if keep_color.is_some() {
        downsample_nearest(&rgb, old_w, old_h, new_w, new_h)
    } else {
        downsample_box(&rgb, old_w, old_h, new_w, new_h)
    };

    let (palette, indices) = quantize_median_cut(&resized, 256, keep_color)?;
    let [mip0, mip1, mip2, mip3] = build_mip_chain(&indices, new_w, new_h);

    let name = tex.texture_name.get_string();
    bsp.textures[texture_idx] = MipTex::new(name.as_str(), (new_w, new_h), &[&mip0, &mip1, &mip2, &mip3], palette);

    crate::face_editor::adjust_resized_texture_coordinates(bsp, texture_idx, (old_w, old_h), (new_w, new_h))?;

    log::debug!("downscaled texture `{name}` {old_w}x{old_h} -> {new_w}x{new_h}");
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{edit_env::EditEnv, model_editor::create_solid};
    use glam::Vec3;

    fn solid_rgb(w: u32, h: u32, color: [u8; 3]) -> Vec<u8> {
        let mut out = Vec::with_capacity((w * h * 3) as usize);
        for _ in 0..(w * h) {
            out.extend_from_slice(&color);
        }
        out
    }

    #[test]
    fn add_texture_appends_and_builds_four_mips() {
        let mut bsp = create_solid(Vec3::splat(-32.0), Vec3::splat(32.0), 0);
        let env = EditEnv::new();
        let rgb = solid_rgb(32, 32, [10, 20, 30]);

        let idx = add_texture(&mut bsp, "BRICK", &rgb, (32, 32), &env).unwrap();

        assert_eq!(idx, 0);
        assert_eq!(bsp.textures[idx].width, 32);
        assert_eq!(bsp.textures[idx].mip_images.len(), 4);
        assert!(!bsp.textures[idx].is_external());
    }

    #[test]
    fn downscale_halves_dimensions_and_rescales_texinfo() {
        let mut bsp = create_solid(Vec3::splat(-32.0), Vec3::splat(32.0), 0);
        let env = EditEnv::new();
        let rgb = solid_rgb(64, 64, [200, 200, 200]);
        add_texture(&mut bsp, "WALL", &rgb, (64, 64), &env).unwrap();

        let before_u = bsp.texinfo[0].u;
        downscale(&mut bsp, 0, 32, 32, &env).unwrap();

        assert_eq!(bsp.textures[0].width, 32);
        assert_eq!(bsp.textures[0].height, 32);
        assert!((bsp.texinfo[0].u.length() - before_u.length() * 0.5).abs() < 1e-3);
    }

    #[test]
    fn downscale_on_missing_wad_reference_is_an_error() {
        let mut bsp = create_solid(Vec3::splat(-32.0), Vec3::splat(32.0), 0);
        let env = EditEnv::new();
        bsp.textures.push(MipTex {
            texture_name: wad::types::TextureName::from_string("EXTERNAL"),
            width: 64,
            height: 64,
            mip_offsets: vec![0, 0, 0, 0],
            mip_images: vec![],
            colors_used: 0,
            palette: wad::types::Palette::new(vec![[0u8; 3]; 256]),
        });

        assert!(downscale(&mut bsp, 0, 32, 32, &env).is_err());
    }
}
