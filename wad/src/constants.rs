pub const MAX_TEXTURE_NAME_LENGTH: usize = 15;
pub const MIPTEX_HEADER_LENGTH: u32 = 16 + 4 + 4 + 4 * 4;

/// Directory entry file types, per the WAD3 spec.
pub const FILE_TYPE_QPIC: i8 = 0x42;
pub const FILE_TYPE_MIPTEX: i8 = 0x43;
pub const FILE_TYPE_MIPTEX_WAD3: i8 = 0x40;
pub const FILE_TYPE_FONT: i8 = 0x45;
pub const FILE_TYPE_FONT_ALT: i8 = 0x46;

/// Transparency key color name prefixes used by GoldSrc's renderer to pick
/// masked rendering: `{texture` blends palette index 255 as alpha, `!texture`
/// is an animated/scrolling water texture using the same masked convention.
pub const TRANSPARENT_KEY_PREFIXES: [char; 2] = ['{', '!'];

/// Palette index reserved for the transparency key when present.
pub const TRANSPARENT_PALETTE_INDEX: u8 = 255;
