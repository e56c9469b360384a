use std::{
    ffi::OsStr,
    fmt::{self, Display, Write as FmtWrite},
    fs::OpenOptions,
    io::Write,
    path::{Path, PathBuf},
    str::from_utf8,
};

use byte_writer::ByteWriter;

use crate::{
    constants::{MAX_TEXTURE_NAME_LENGTH, MIPTEX_HEADER_LENGTH},
    error::WadError,
    parser::parse_wad,
};

#[derive(Debug, Clone)]
pub struct Header {
    pub magic: Vec<u8>,
    pub num_dirs: i32,
    pub dir_offset: i32,
}

impl Header {
    pub fn new() -> Self {
        Self {
            magic: "WAD3".as_bytes().to_owned(),
            num_dirs: 0,
            dir_offset: 0,
        }
    }
}

impl Default for Header {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct DirectoryEntry {
    pub entry_offset: i32,
    pub disk_size: i32,
    pub entry_size: i32,
    pub file_type: i8,
    pub compressed: bool,
    pub padding: i16,
    pub texture_name: TextureName,
}

impl DirectoryEntry {
    /// Creates a new directory entry for a miptex with just the texture name.
    pub fn new(s: impl AsRef<str> + Into<String>) -> Self {
        Self {
            entry_offset: 0,
            disk_size: 0,
            entry_size: 0,
            file_type: crate::constants::FILE_TYPE_MIPTEX,
            compressed: false,
            padding: 256,
            texture_name: TextureName::from_string(s),
        }
    }
}

#[derive(Clone)]
/// Don't use `to_string()`. Use [`TextureName::get_string`] instead.
pub struct TextureName(pub Vec<u8>);

impl fmt::Debug for TextureName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple(&self.get_string()).field(&self.0).finish()
    }
}

impl TextureName {
    pub fn get_string(&self) -> String {
        let mut res: Vec<u8> = vec![];

        for c in self.get_bytes() {
            if *c == 0 || *c < 32 || *c > 127 {
                break;
            }

            res.push(*c);
        }

        from_utf8(&res).unwrap_or_default().to_string()
    }

    /// Texture name upper-cased, as used for case-insensitive lookups.
    pub fn get_string_standard(&self) -> String {
        self.get_string().to_uppercase()
    }

    pub fn from_string(s: impl AsRef<str> + Into<String>) -> Self {
        let mut res = vec![0u8; MAX_TEXTURE_NAME_LENGTH + 1];
        let texture_name_length = s.as_ref().len().min(MAX_TEXTURE_NAME_LENGTH);

        res[..texture_name_length].copy_from_slice(&s.as_ref().as_bytes()[..texture_name_length]);

        Self(res)
    }

    pub fn get_bytes(&self) -> &Vec<u8> {
        &self.0
    }

    pub fn set_name(&mut self, s: impl AsRef<str> + Into<String>) -> Result<(), WadError> {
        if s.as_ref().len() > MAX_TEXTURE_NAME_LENGTH {
            return Err(WadError::GenericError {
                message: format!(
                    "max length for a texture name is {MAX_TEXTURE_NAME_LENGTH} characters"
                ),
            });
        }

        if s.as_ref().contains(' ') {
            return Err(WadError::GenericError {
                message: "texture name must not contain spaces".to_string(),
            });
        }

        self.0.fill(0);
        self.0[..s.as_ref().len()].copy_from_slice(s.as_ref().as_bytes());

        Ok(())
    }

    /// True if the masked/transparency convention (`{` or `!` prefix) applies.
    pub fn is_transparent_key(&self) -> bool {
        self.get_string()
            .chars()
            .next()
            .is_some_and(|c| crate::constants::TRANSPARENT_KEY_PREFIXES.contains(&c))
    }
}

impl Display for TextureName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for c in &self.0 {
            if *c == 0 {
                continue;
            }

            f.write_char(*c as char)?;
        }

        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct Image(pub Vec<u8>);

impl Image {
    pub fn new(s: impl AsRef<[u8]> + Into<Vec<u8>>) -> Self {
        Self(s.into())
    }

    pub fn get_bytes(&self) -> &Vec<u8> {
        &self.0
    }
}

#[derive(Debug, Clone)]
pub struct Palette(pub Vec<[u8; 3]>);

impl Palette {
    pub fn new(s: impl Into<Vec<[u8; 3]>>) -> Self {
        Self(s.into())
    }

    pub fn get_bytes(&self) -> &Vec<[u8; 3]> {
        &self.0
    }
}

#[derive(Debug, Clone)]
pub struct Qpic {
    pub width: u32,
    pub height: u32,
    pub data: Image,
    pub colors_used: i16,
    pub palette: Palette,
}

#[derive(Debug, Clone)]
pub struct MipMap {
    pub data: Image,
}

impl MipMap {
    pub fn new(s: impl Into<Vec<u8>>) -> Self {
        Self {
            data: Image::new(s.into()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MipTex {
    /// The texture name might differ from the directory entry's; prefer the
    /// directory entry's name for lookups.
    pub texture_name: TextureName,
    pub width: u32,
    pub height: u32,
    pub mip_offsets: Vec<u32>,
    /// Empty when the texture is WAD-referenced only (no pixel data embedded).
    pub mip_images: Vec<MipMap>,
    pub colors_used: i16,
    pub palette: Palette,
}

impl MipTex {
    /// Builds all 4 mip levels from a full-size indexed image by 2x nearest
    /// downsampling, matching how the compile tools generate miptex mips.
    pub fn new(
        s: impl AsRef<str> + Into<String>,
        (width, height): (u32, u32),
        images: &[&[u8]],
        palette: impl Into<Vec<[u8; 3]>>,
    ) -> Self {
        let mip0_len = (width * height) as usize;

        let mip0 = MipMap::new(images[0]);
        let mip1 = MipMap::new(images[1]);
        let mip2 = MipMap::new(images[2]);
        let mip3 = MipMap::new(images[3]);

        let mip0_offset = MIPTEX_HEADER_LENGTH;
        let mip1_offset = mip0_offset + mip0_len as u32;
        let mip2_offset = mip1_offset + (mip0_len / 4) as u32;
        let mip3_offset = mip2_offset + (mip0_len / 16) as u32;

        Self {
            texture_name: TextureName::from_string(s),
            width,
            height,
            mip_offsets: vec![mip0_offset, mip1_offset, mip2_offset, mip3_offset],
            mip_images: vec![mip0, mip1, mip2, mip3],
            colors_used: 256,
            palette: Palette::new(palette),
        }
    }

    /// A WAD-referenced texture entry: the miptex carries name/size only,
    /// no embedded pixel data.
    pub fn is_external(&self) -> bool {
        self.mip_images.is_empty()
    }

    /// Returns RGB image and dimensions of mip level 0.
    pub fn to_rgb(&self) -> (Vec<u8>, (u32, u32)) {
        let image = self.mip_images[0]
            .data
            .get_bytes()
            .iter()
            .flat_map(|&palette_idx| self.palette.get_bytes()[palette_idx as usize])
            .collect::<Vec<u8>>();

        (image, (self.width, self.height))
    }

    /// Returns RGBA image and dimensions of mip level 0; the transparency key
    /// color (index 255 for `{`/`!` textures) is mapped to alpha 0.
    pub fn to_rgba(&self) -> (Vec<u8>, (u32, u32)) {
        let transparent = self.texture_name.is_transparent_key();

        let image = self.mip_images[0]
            .data
            .get_bytes()
            .iter()
            .flat_map(|&palette_idx| {
                let [r, g, b] = self.palette.get_bytes()[palette_idx as usize];
                let a = if transparent
                    && palette_idx == crate::constants::TRANSPARENT_PALETTE_INDEX
                {
                    0
                } else {
                    255
                };
                [r, g, b, a]
            })
            .collect::<Vec<u8>>();

        (image, (self.width, self.height))
    }

    pub fn write(&self, writer: &mut ByteWriter) {
        let texture_name_bytes = self.texture_name.get_bytes();
        writer.append_u8_slice(texture_name_bytes);
        writer.append_u8_slice(&vec![0u8; 16 - texture_name_bytes.len()]);

        writer.append_u32(self.width);
        writer.append_u32(self.height);

        if self.is_external() {
            // WAD-referenced: offsets all zero, no pixel data follows.
            writer.append_u32(0);
            writer.append_u32(0);
            writer.append_u32(0);
            writer.append_u32(0);
            return;
        }

        writer.append_u32(MIPTEX_HEADER_LENGTH);
        writer.append_u32(MIPTEX_HEADER_LENGTH + self.width * self.height);
        writer.append_u32(
            MIPTEX_HEADER_LENGTH + self.width * self.height + (self.width * self.height) / 4,
        );
        writer.append_u32(
            MIPTEX_HEADER_LENGTH
                + self.width * self.height
                + (self.width * self.height) / 4
                + (self.width * self.height) / 4 / 4,
        );

        for image in &self.mip_images {
            writer.append_u8_slice(image.data.get_bytes());
        }

        writer.append_i16(256);

        for row in self.palette.get_bytes() {
            writer.append_u8_slice(row);
        }

        writer.append_u8_slice(&vec![0u8; (256 - self.palette.get_bytes().len()) * 3]);
    }
}

#[derive(Debug, Clone)]
pub struct CharInfo {
    pub offset_y: i8,
    pub offset_x: i8,
    pub charwidth: i16,
}

#[derive(Debug, Clone)]
pub struct Font {
    pub width: u32,
    pub height: u32,
    pub row_count: u32,
    pub row_height: u32,
    pub font_info: Vec<CharInfo>,
    pub data: Image,
    pub colors_used: i16,
    pub palette: Palette,
}

/// A directory entry paired with its decoded payload. Not how the bytes are
/// physically laid out (directory entries are all written together after
/// every payload), but convenient for in-memory editing.
#[derive(Debug, Clone)]
pub struct Entry {
    pub directory_entry: DirectoryEntry,
    pub file_entry: FileEntry,
}

impl Entry {
    pub fn new(
        texture_name: impl AsRef<str> + Into<String>,
        dimensions: (u32, u32),
        images: &[&[u8]],
        palette: impl Into<Vec<[u8; 3]>> + AsRef<[[u8; 3]]>,
    ) -> Self {
        Self {
            directory_entry: DirectoryEntry::new(texture_name.as_ref()),
            file_entry: FileEntry::new_miptex(texture_name, images, dimensions, palette),
        }
    }

    pub fn texture_name(&self) -> String {
        self.directory_entry.texture_name.get_string()
    }

    pub fn texture_name_standard(&self) -> String {
        self.directory_entry.texture_name.get_string_standard()
    }

    pub fn set_name(&mut self, s: impl AsRef<str> + Into<String> + Clone) -> Result<(), WadError> {
        self.directory_entry.texture_name.set_name(s.clone())?;

        if let FileEntry::MipTex(miptex) = &mut self.file_entry {
            miptex.texture_name.set_name(s)?;
        }

        Ok(())
    }
}

#[derive(Debug, Clone)]
pub enum FileEntry {
    Qpic(Qpic),
    MipTex(MipTex),
    Font(Font),
}

impl FileEntry {
    pub fn new_miptex(
        texture_name: impl AsRef<str> + Into<String>,
        images: &[&[u8]],
        dimensions: (u32, u32),
        palette: impl Into<Vec<[u8; 3]>>,
    ) -> Self {
        Self::MipTex(MipTex::new(texture_name, dimensions, images, palette))
    }

    pub fn dimensions(&self) -> (u32, u32) {
        match &self {
            Self::Qpic(qpic) => (qpic.width, qpic.height),
            Self::MipTex(miptex) => (miptex.width, miptex.height),
            Self::Font(font) => (font.width, font.height),
        }
    }

    pub fn image(&self) -> &Vec<u8> {
        match &self {
            Self::Qpic(qpic) => qpic.data.get_bytes(),
            Self::MipTex(miptex) => miptex.mip_images[0].data.get_bytes(),
            Self::Font(font) => font.data.get_bytes(),
        }
    }

    pub fn palette(&self) -> &Vec<[u8; 3]> {
        match &self {
            Self::Qpic(qpic) => qpic.palette.get_bytes(),
            Self::MipTex(miptex) => miptex.palette.get_bytes(),
            Self::Font(font) => font.palette.get_bytes(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Wad {
    pub header: Header,
    pub entries: Vec<Entry>,
}

impl Default for Wad {
    fn default() -> Self {
        Self::new()
    }
}

impl Wad {
    pub fn new() -> Self {
        Self {
            header: Header::default(),
            entries: vec![],
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, WadError> {
        match parse_wad(bytes) {
            Ok((_, res)) => Ok(res),
            Err(_) => Err(WadError::ParseHeader),
        }
    }

    pub fn from_file(path: impl AsRef<Path> + AsRef<OsStr>) -> Result<Self, WadError> {
        let path: &Path = AsRef::<Path>::as_ref(&path);
        let bytes = std::fs::read(path)?;
        Self::from_bytes(&bytes)
    }

    pub fn write_to_file(&self, path: impl AsRef<Path> + Into<PathBuf>) -> Result<(), WadError> {
        let bytes = self.write_to_bytes();

        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        file.write_all(&bytes)?;
        file.flush()?;

        Ok(())
    }

    /// Looks up an entry by case-insensitive texture name.
    pub fn find(&self, name: &str) -> Option<&Entry> {
        let name = name.to_uppercase();
        self.entries
            .iter()
            .find(|e| e.texture_name_standard() == name)
    }

    pub fn write_to_bytes(&self) -> Vec<u8> {
        let mut writer = ByteWriter::new();

        let header = &self.header;

        writer.append_u8_slice(&header.magic);
        writer.append_i32(self.entries.len() as i32);

        let dir_offset_index = writer.get_offset();
        writer.append_i32(header.dir_offset);

        let file_entries_offset_and_length = self
            .entries
            .iter()
            .map(|entry| {
                let file_entry = &entry.file_entry;
                let file_entry_offset = writer.get_offset();

                match file_entry {
                    FileEntry::Qpic(_) => unimplemented!("qpic entries are not written"),
                    FileEntry::MipTex(miptex) => {
                        miptex.write(&mut writer);
                    }
                    FileEntry::Font(_) => unimplemented!("font entries are not written"),
                }

                // keep Wally-compatible 4-byte alignment between entries
                let offset_bytes_needed = (4 - writer.get_offset() % 4) % 4;

                for _ in 0..offset_bytes_needed {
                    writer.append_u8(0);
                }

                (file_entry_offset, writer.get_offset() - file_entry_offset)
            })
            .collect::<Vec<(usize, usize)>>();

        let directory_entry_offset = writer.get_offset();
        writer.replace_with_u32(dir_offset_index, directory_entry_offset as u32);

        self.entries
            .iter()
            .zip(file_entries_offset_and_length)
            .for_each(|(entry, (offset, length))| {
                let DirectoryEntry {
                    entry_offset: _,
                    disk_size: _,
                    entry_size: _,
                    file_type,
                    compressed: _,
                    padding: _,
                    texture_name,
                } = &entry.directory_entry;

                writer.append_i32(offset as i32);
                writer.append_i32(length as i32);
                writer.append_i32(length as i32);
                writer.append_i8(*file_type);
                writer.append_i8(0);
                writer.append_i16(256);

                let texture_name_bytes = texture_name.get_bytes();
                writer.append_u8_slice(texture_name_bytes);
                writer.append_u8_slice(&vec![0u8; 16 - texture_name_bytes.len()]);
            });

        writer.data
    }
}
