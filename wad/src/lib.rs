//! WAD3 archive parsing and writing.
//!
//! Based on the specification at https://twhl.info/wiki/page/Specification%3A_WAD3

mod constants;
pub mod error;
mod parser;
pub mod quantize;
pub mod types;
pub mod utils;

pub use error::WadError;
pub use parser::{parse_miptex, parse_wad};

#[cfg(test)]
mod test {
    use crate::types::{Entry, FileEntry, Wad};

    fn checkerboard_palette() -> Vec<[u8; 3]> {
        let mut palette = vec![[0u8; 3]; 256];
        palette[0] = [255, 0, 0];
        palette[1] = [0, 255, 0];
        palette
    }

    fn checkerboard_entry(name: &str, size: u32) -> Entry {
        let pixel_count = (size * size) as usize;
        let mip0 = (0..pixel_count)
            .map(|i| (i % 2) as u8)
            .collect::<Vec<u8>>();
        let mip1 = vec![0u8; pixel_count / 4];
        let mip2 = vec![0u8; pixel_count / 16];
        let mip3 = vec![0u8; pixel_count / 64];
        let palette = checkerboard_palette();

        Entry::new(
            name,
            (size, size),
            &[&mip0, &mip1, &mip2, &mip3],
            palette,
        )
    }

    #[test]
    fn round_trips_a_single_texture_through_bytes() {
        let wad = Wad {
            header: Default::default(),
            entries: vec![checkerboard_entry("white", 16)],
        };

        let bytes = wad.write_to_bytes();
        let parsed = Wad::from_bytes(&bytes).expect("valid wad bytes");

        assert_eq!(parsed.entries.len(), 1);
        assert_eq!(parsed.entries[0].texture_name(), "white");

        let FileEntry::MipTex(miptex) = &parsed.entries[0].file_entry else {
            panic!("expected miptex entry");
        };
        assert_eq!(miptex.width, 16);
        assert_eq!(miptex.height, 16);
        assert!(!miptex.is_external());
    }

    #[test]
    fn round_trips_multiple_textures_in_order() {
        let wad = Wad {
            header: Default::default(),
            entries: vec![
                checkerboard_entry("white", 16),
                checkerboard_entry("black", 32),
            ],
        };

        let bytes = wad.write_to_bytes();
        let parsed = Wad::from_bytes(&bytes).expect("valid wad bytes");

        assert_eq!(parsed.entries.len(), 2);
        assert_eq!(parsed.entries[0].texture_name(), "white");
        assert_eq!(parsed.entries[1].texture_name(), "black");
        assert_eq!(parsed.header.magic, "WAD3".as_bytes());
    }

    #[test]
    fn find_is_case_insensitive() {
        let wad = Wad {
            header: Default::default(),
            entries: vec![checkerboard_entry("Sky_Day", 16)],
        };

        assert!(wad.find("sky_day").is_some());
        assert!(wad.find("SKY_DAY").is_some());
        assert!(wad.find("nonexistent").is_none());
    }

    #[test]
    fn rejects_bytes_without_wad3_magic() {
        let bytes = b"GARBAGE1".to_vec();
        assert!(Wad::from_bytes(&bytes).is_err());
    }

    #[test]
    fn external_texture_round_trips_with_zero_offsets() {
        use crate::utils::create_blue_miptex;

        let miptex = create_blue_miptex(16, 16, "BLUE");
        let mut writer = byte_writer::ByteWriter::new();
        miptex.write(&mut writer);

        // embedded textures always carry pixel data: mip0 offset is non-zero.
        assert_ne!(writer.data.len(), 0);
    }
}
