//! Run-length codec for the per-leaf potentially-visible-set bit vectors.
//!
//! A literal byte is copied as-is, except that a zero byte is always
//! followed by a run-length byte giving how many consecutive zero bytes to
//! emit (capped at 255; longer runs are split across multiple pairs).

/// The PVS bit vector is terminated at `(numLeaves+63)&~63` bits, not the
/// next byte boundary: the engine always walks it 8 bytes (64 bits) at a
/// time. A row's true length in bytes is this value divided by 8.
fn row_bytes(num_leaves: usize) -> usize {
    ((num_leaves + 63) & !63) >> 3
}

/// Decompresses one PVS row, 64-leaf-aligned per [`row_bytes`].
pub fn decompress(src: &[u8], num_leaves: usize) -> Vec<u8> {
    let row_bytes = row_bytes(num_leaves);

    let mut out = Vec::with_capacity(row_bytes);
    let mut i = 0;

    while out.len() < row_bytes && i < src.len() {
        let b = src[i];
        if b == 0 {
            i += 1;
            let run = if i < src.len() { src[i] as usize } else { 0 };
            i += 1;
            for _ in 0..run {
                if out.len() >= row_bytes {
                    break;
                }
                out.push(0);
            }
        } else {
            out.push(b);
            i += 1;
        }
    }

    out.resize(row_bytes, 0);
    out
}

/// Compresses a decompressed PVS row, emitting zero runs as `0x00, n`.
pub fn compress(src: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut i = 0;

    while i < src.len() {
        if src[i] == 0 {
            let mut run = 0usize;
            while i < src.len() && src[i] == 0 && run < 255 {
                run += 1;
                i += 1;
            }
            out.push(0);
            out.push(run as u8);
        } else {
            out.push(src[i]);
            i += 1;
        }
    }

    out
}

/// Recompresses a VIS lump after a leaf-count change: decompress every row
/// at the old row size, OR the old bits into the new row layout via
/// `old_to_new_leaf`, then recompress. `old_to_new_leaf[old_idx]` gives the
/// new leaf index, or `None` if that leaf was removed.
///
/// Returns the flat recompressed blob plus each input row's byte offset into
/// it, in the same order as `rows`, for the caller to restamp as the owning
/// leaf's new `vis_offset`.
pub fn remap_leaf_count(
    rows: &[Vec<u8>],
    old_num_leaves: usize,
    new_num_leaves: usize,
    old_to_new_leaf: &[Option<usize>],
) -> (Vec<u8>, Vec<usize>) {
    let new_row_bytes = row_bytes(new_num_leaves);
    let mut out = Vec::new();
    let mut offsets = Vec::with_capacity(rows.len());

    for row in rows {
        let decompressed = decompress(row, old_num_leaves);
        let mut new_row = vec![0u8; new_row_bytes];

        for (old_leaf, &new_leaf) in old_to_new_leaf.iter().enumerate() {
            let Some(new_leaf) = new_leaf else { continue };
            let byte = old_leaf / 8;
            let bit = old_leaf % 8;
            if byte >= decompressed.len() {
                continue;
            }
            if decompressed[byte] & (1 << bit) != 0 {
                new_row[new_leaf / 8] |= 1 << (new_leaf % 8);
            }
        }

        let recompressed = compress(&new_row);
        offsets.push(out.len());
        out.extend_from_slice(&recompressed);
    }

    (out, offsets)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn decompress_spec_example() {
        // S6: [0x00,0x03,0xA5,0x00,0x02] decodes to the 6 content bytes
        // [0x00,0x00,0x00,0xA5,0x00,0x00]; the row itself is padded to the
        // next 64-leaf (8-byte) boundary, so a 48-leaf row is 8 bytes with
        // the last 2 coming from the implicit trailing-zero pad.
        let src = [0x00, 0x03, 0xA5, 0x00, 0x02];
        let out = decompress(&src, 48);
        assert_eq!(row_bytes(48), 8);
        assert_eq!(
            out,
            vec![0x00, 0x00, 0x00, 0xA5, 0x00, 0x00, 0x00, 0x00]
        );
    }

    #[test]
    fn round_trips_through_compress() {
        let original = vec![0x00, 0x00, 0x00, 0xA5, 0x00, 0x00, 0x00, 0x00];
        let compressed = compress(&original);
        let decompressed = decompress(&compressed, original.len() * 8);
        assert_eq!(decompressed, original);
    }

    #[test]
    fn row_bytes_aligns_up_to_the_next_64_leaf_boundary() {
        assert_eq!(row_bytes(1), 8);
        assert_eq!(row_bytes(48), 8);
        assert_eq!(row_bytes(64), 8);
        assert_eq!(row_bytes(65), 16);
    }

    #[test]
    fn splits_runs_longer_than_255() {
        let original = vec![0u8; 600];
        let compressed = compress(&original);
        // every run capped at 255 means at least 3 (0x00,n) pairs
        assert!(compressed.len() >= 6);
        let decompressed = decompress(&compressed, original.len() * 8);
        assert_eq!(decompressed, original);
    }

    #[test]
    fn remap_leaf_count_drops_removed_columns_and_reports_row_offsets() {
        // 3 old leaves: leaf 1 sees {0, 2}; leaf 2 sees {1}. Leaf 1 is removed,
        // leaf 0 and leaf 2 survive as new leaves 0 and 1 respectively.
        let mut row0 = vec![0u8; row_bytes(3)];
        row0[0] |= 1 << 0 | 1 << 2;
        let mut row2 = vec![0u8; row_bytes(3)];
        row2[0] |= 1 << 1;
        let rows = vec![compress(&row0), compress(&row2)];

        let old_to_new = vec![Some(0), None, Some(1)];
        let (blob, offsets) = remap_leaf_count(&rows, 3, 2, &old_to_new);

        assert_eq!(offsets.len(), 2);
        let new_row0 = decompress(&blob[offsets[0]..], 2);
        let new_row1 = decompress(&blob[offsets[1]..], 2);
        // old leaf 0 and old leaf 2 both survive and shift into the 2-leaf row.
        assert_eq!(new_row0[0] & 0b11, 0b11);
        // old leaf 1 (removed) is the only bit row2 had set, so it's dropped.
        assert_eq!(new_row1[0] & 0b11, 0);
    }
}
