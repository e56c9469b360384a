//! Palette re-quantization and resampling for embedded miptex pixel data.
//!
//! GoldSrc textures are always 8-bit paletted, so every resize or format
//! conversion has to end with requantizing to <=256 colors. Resampling goes
//! through `image::imageops::resize`; quantization goes through `quantette`'s
//! k-means pipeline in Oklab space, the same pair of crates the original
//! texture-authoring tools reach for, since a hand-rolled box filter and
//! median-cut bucketer would just be reimplementing what's already imported
//! elsewhere in this workspace.

use image::RgbImage;
use quantette::{ColorSpace, ImagePipeline, QuantizeMethod};

use crate::{constants::TRANSPARENT_PALETTE_INDEX, error::WadError};

fn rgb_image(rgb: &[u8], w: u32, h: u32) -> RgbImage {
    RgbImage::from_raw(w, h, rgb.to_vec()).expect("rgb buffer sized for w*h*3")
}

/// Box-filter downsample of an RGB24 image to `(new_w, new_h)`.
pub fn downsample_box(rgb: &[u8], w: u32, h: u32, new_w: u32, new_h: u32) -> Vec<u8> {
    let img = rgb_image(rgb, w, h);
    image::imageops::resize(&img, new_w, new_h, image::imageops::FilterType::Triangle).into_raw()
}

/// Nearest-neighbor downsample, used only to preserve the exact transparency
/// key color through a resize (averaging would blend it away).
pub fn downsample_nearest(rgb: &[u8], w: u32, h: u32, new_w: u32, new_h: u32) -> Vec<u8> {
    let img = rgb_image(rgb, w, h);
    image::imageops::resize(&img, new_w, new_h, image::imageops::FilterType::Nearest).into_raw()
}

/// Quantizes an RGB24 image into at most `max_colors` palette entries via
/// `quantette`. Returns `(palette, indices)`; `indices.len() ==
/// pixels.len()`. If `keep_color` is set (the `{`/`!` transparency key), it
/// is excluded from the quantizer's input, forced into the last reserved
/// slot, and every pixel matching it exactly maps there, so the key survives
/// the requantization intact.
pub fn quantize_median_cut(
    rgb: &[u8],
    max_colors: usize,
    keep_color: Option<[u8; 3]>,
) -> Result<(Vec<[u8; 3]>, Vec<u8>), WadError> {
    assert!(max_colors >= 1 && max_colors <= 256);

    let pixel_count = rgb.len() / 3;
    let mut keep_mask = vec![false; pixel_count];
    let mut quant_pixels: Vec<u8> = Vec::with_capacity(rgb.len());

    for i in 0..pixel_count {
        let p = [rgb[i * 3], rgb[i * 3 + 1], rgb[i * 3 + 2]];
        if keep_color == Some(p) {
            keep_mask[i] = true;
            continue;
        }
        quant_pixels.extend_from_slice(&p);
    }

    let budget = (if keep_color.is_some() {
        max_colors - 1
    } else {
        max_colors
    })
    .clamp(1, 255) as u8;

    let (quantized_pixels, palette_colors) = if quant_pixels.is_empty() {
        (Vec::new(), Vec::new())
    } else {
        // only the colors matter here, not their arrangement, so the
        // surviving pixels are laid out as a single row.
        let row_width = (quant_pixels.len() / 3) as u32;
        let img = rgb_image(&quant_pixels, row_width, 1);

        let pipeline = ImagePipeline::try_from(&img)
            .map_err(|e| WadError::Quantize { message: e.to_string() })?
            .palette_size(budget)
            .dither(true)
            .colorspace(ColorSpace::Oklab)
            .quantize_method(QuantizeMethod::kmeans());

        let quantized = pipeline.clone().quantized_rgbimage_par();
        let palette = pipeline
            .palette_par()
            .into_iter()
            .map(|c| [c.red, c.green, c.blue])
            .collect::<Vec<[u8; 3]>>();

        (quantized.into_raw(), palette)
    };

    let mut palette = palette_colors;
    let key_index = keep_color.map(|key| {
        palette.push(key);
        (palette.len() - 1) as u8
    });

    while palette.len() < max_colors.min(256) {
        palette.push([0, 0, 0]);
    }

    // swap the reserved key into the last slot of the full-size palette,
    // matching the engine convention.
    if let Some(ki) = key_index {
        let target = (max_colors.min(256) - 1) as u8;
        if ki != target {
            palette.swap(ki as usize, target as usize);
        }
    }

    let mut quantized_pixels = quantized_pixels.chunks_exact(3);
    let indices = (0..pixel_count)
        .map(|i| {
            if keep_mask[i] {
                return (max_colors.min(256) - 1) as u8;
            }

            let p = quantized_pixels
                .next()
                .expect("one quantized pixel per non-key input pixel");
            nearest_index(&palette, [p[0], p[1], p[2]])
        })
        .collect();

    Ok((palette, indices))
}

/// Nearest palette entry by squared Euclidean distance in RGB space.
pub fn nearest_index(palette: &[[u8; 3]], color: [u8; 3]) -> u8 {
    palette
        .iter()
        .enumerate()
        .min_by_key(|(_, p)| {
            let dr = p[0] as i32 - color[0] as i32;
            let dg = p[1] as i32 - color[1] as i32;
            let db = p[2] as i32 - color[2] as i32;
            dr * dr + dg * dg + db * db
        })
        .map(|(i, _)| i as u8)
        .unwrap_or(TRANSPARENT_PALETTE_INDEX)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn box_downsample_halves_dims_and_averages() {
        // 2x2 image: black, white, white, black -> averaging down to 1x1 is gray
        let rgb = vec![0, 0, 0, 255, 255, 255, 255, 255, 255, 0, 0, 0];
        let out = downsample_box(&rgb, 2, 2, 1, 1);
        assert_eq!(out, vec![127, 127, 127]);
    }

    #[test]
    fn nearest_downsample_preserves_exact_colors() {
        let rgb = vec![0, 255, 0, 10, 20, 30, 40, 50, 60, 70, 80, 90];
        let out = downsample_nearest(&rgb, 2, 2, 1, 1);
        // nearest-neighbor for a 2x2 -> 1x1 resize lands on the top-left texel.
        assert_eq!(out, vec![0, 255, 0]);
    }

    #[test]
    fn quantize_reduces_to_requested_count() {
        let mut rgb = vec![];
        for i in 0..64u32 {
            rgb.extend_from_slice(&[(i * 4) as u8, 0, 0]);
        }
        let (palette, indices) = quantize_median_cut(&rgb, 8, None).unwrap();
        assert_eq!(palette.len(), 8);
        assert_eq!(indices.len(), 64);
        for idx in indices {
            assert!((idx as usize) < palette.len());
        }
    }

    #[test]
    fn quantize_preserves_transparency_key() {
        let mut rgb = vec![0, 255, 0, 0, 255, 0]; // two key-colored pixels
        rgb.extend_from_slice(&[10, 20, 30]);
        let (palette, indices) = quantize_median_cut(&rgb, 4, Some([0, 255, 0])).unwrap();
        let key_idx = (4 - 1) as u8;
        assert_eq!(palette[key_idx as usize], [0, 255, 0]);
        assert_eq!(indices[0], key_idx);
        assert_eq!(indices[1], key_idx);
    }
}
