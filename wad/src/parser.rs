use nom::{
    bytes::complete::take,
    combinator::map,
    multi::count,
    number::complete::{le_i16, le_i32, le_i8, le_u32, le_u8},
    sequence::tuple,
    IResult as _IResult,
};

use crate::{
    constants::{
        FILE_TYPE_FONT, FILE_TYPE_FONT_ALT, FILE_TYPE_MIPTEX, FILE_TYPE_MIPTEX_WAD3,
        FILE_TYPE_QPIC,
    },
    types::{
        CharInfo, DirectoryEntry, Entry, FileEntry, Font, Header, Image, MipMap, MipTex, Palette,
        Qpic, TextureName, Wad,
    },
};

type IResult<'a, T> = _IResult<&'a [u8], T>;

fn parse_header(i: &[u8]) -> IResult<Header> {
    map(
        tuple((count(le_u8, 4), le_i32, le_i32)),
        |(magic, num_dirs, dir_offset)| Header {
            magic,
            num_dirs,
            dir_offset,
        },
    )(i)
}

fn parse_directory_entry(i: &[u8]) -> IResult<DirectoryEntry> {
    map(
        tuple((
            le_i32,
            le_i32,
            le_i32,
            le_i8,
            le_i8,
            le_i16,
            count(le_u8, 16),
        )),
        |(entry_offset, disk_size, entry_size, file_type, compressed, padding, texture_name)| {
            DirectoryEntry {
                entry_offset,
                disk_size,
                entry_size,
                file_type,
                compressed: compressed != 0,
                padding,
                texture_name: TextureName(texture_name),
            }
        },
    )(i)
}

fn parse_qpic(i: &[u8]) -> IResult<Qpic> {
    let (i, (width, height)) = tuple((le_u32, le_u32))(i)?;
    let (i, data) = count(le_u8, (width * height) as usize)(i)?;
    let (i, colors_used) = le_i16(i)?;
    let (i, palette) = count(
        map(take(3usize), |res: &[u8]| [res[0], res[1], res[2]]),
        colors_used as usize,
    )(i)?;

    Ok((
        i,
        Qpic {
            width,
            height,
            data: Image(data),
            colors_used,
            palette: Palette(palette),
        },
    ))
}

/// Parses a miptex starting at its own header; mip offsets are relative to
/// this same start, so callers must hand in the slice beginning at the
/// texture's own offset, not the file start.
pub fn parse_miptex(i: &[u8]) -> IResult<MipTex> {
    let struct_start = i;

    let (i, texture_name) = count(le_u8, 16)(i)?;
    let (i, (width, height)) = tuple((le_u32, le_u32))(i)?;
    let (i, mip_offsets) = count(le_u32, 4)(i)?;

    if mip_offsets[0] == 0 {
        return Ok((
            i,
            MipTex {
                texture_name: TextureName(texture_name),
                width,
                height,
                mip_offsets,
                mip_images: vec![],
                colors_used: 0,
                palette: Palette(vec![]),
            },
        ));
    }

    let (_, miptex0) =
        count(le_u8, (width * height) as usize)(&struct_start[(mip_offsets[0] as usize)..])?;
    let (_, miptex1) =
        count(le_u8, (width * height / 4) as usize)(&struct_start[(mip_offsets[1] as usize)..])?;
    let (_, miptex2) = count(le_u8, (width * height / 16) as usize)(
        &struct_start[(mip_offsets[2] as usize)..],
    )?;
    let (palette_start, miptex3) = count(le_u8, (width * height / 64) as usize)(
        &struct_start[(mip_offsets[3] as usize)..],
    )?;

    let (palette_start, colors_used) = le_i16(palette_start)?;

    // some third-party editors write a bogus colors_used; the format is
    // always a full 256-color palette regardless of what this field says.
    let colors_used = if !(1..=256).contains(&colors_used) {
        256
    } else {
        colors_used
    };

    let (_, palette) = count(
        map(take(3usize), |res: &[u8]| [res[0], res[1], res[2]]),
        colors_used as usize,
    )(palette_start)?;

    Ok((
        i,
        MipTex {
            texture_name: TextureName(texture_name),
            width,
            height,
            mip_offsets,
            mip_images: vec![
                MipMap {
                    data: Image(miptex0),
                },
                MipMap {
                    data: Image(miptex1),
                },
                MipMap {
                    data: Image(miptex2),
                },
                MipMap {
                    data: Image(miptex3),
                },
            ],
            colors_used,
            palette: Palette(palette),
        },
    ))
}

fn parse_font(i: &[u8]) -> IResult<Font> {
    let (i, (width, height)) = tuple((le_u32, le_u32))(i)?;
    let (i, (row_count, row_height)) = tuple((le_u32, le_u32))(i)?;

    let (i, font_info) = count(
        map(
            tuple((le_i8, le_i8, le_i16)),
            |(offset_y, offset_x, charwidth)| CharInfo {
                offset_y,
                offset_x,
                charwidth,
            },
        ),
        256,
    )(i)?;

    let (i, data) = count(le_u8, (width * height) as usize)(i)?;
    let (i, colors_used) = le_i16(i)?;
    let (i, palette) = count(map(take(3usize), |res: &[u8]| [res[0], res[1], res[2]]), 256)(i)?;

    Ok((
        i,
        Font {
            width,
            height,
            row_count,
            row_height,
            font_info,
            data: Image(data),
            colors_used,
            palette: Palette(palette),
        },
    ))
}

static FILE_TYPES: &[i8] = &[
    FILE_TYPE_MIPTEX_WAD3,
    FILE_TYPE_QPIC,
    FILE_TYPE_MIPTEX,
    FILE_TYPE_FONT,
    FILE_TYPE_FONT_ALT,
];

fn verify_failure(i: &[u8]) -> nom::Err<nom::error::Error<&[u8]>> {
    nom::Err::Failure(nom::error::Error::new(i, nom::error::ErrorKind::Verify))
}

pub fn parse_wad(i: &[u8]) -> IResult<Wad> {
    let file_start = i;

    let (_, header) = parse_header(i)?;

    if header.magic != "WAD3".as_bytes() {
        return Err(verify_failure(i));
    }

    let dir_start = &i[(header.dir_offset as usize)..];
    let (_, directory_entries) =
        count(parse_directory_entry, header.num_dirs as usize)(dir_start)?;

    if directory_entries.iter().any(|entry| entry.compressed) {
        log::warn!("WAD contains compressed entries; they are not supported and will be skipped");
    }

    if directory_entries
        .iter()
        .any(|entry| !FILE_TYPES.contains(&entry.file_type))
    {
        return Err(verify_failure(i));
    }

    let mut entries = Vec::with_capacity(directory_entries.len());

    for directory_entry in directory_entries {
        if directory_entry.compressed {
            continue;
        }

        let file_entry_start = &file_start[directory_entry.entry_offset as usize..];

        let file_entry = match directory_entry.file_type {
            t if t == FILE_TYPE_QPIC => {
                let Ok((_, res)) = parse_qpic(file_entry_start) else {
                    return Err(verify_failure(i));
                };
                FileEntry::Qpic(res)
            }
            t if t == FILE_TYPE_MIPTEX || t == FILE_TYPE_MIPTEX_WAD3 => {
                let Ok((_, res)) = parse_miptex(file_entry_start) else {
                    return Err(verify_failure(i));
                };
                FileEntry::MipTex(res)
            }
            t if t == FILE_TYPE_FONT || t == FILE_TYPE_FONT_ALT => {
                let Ok((_, res)) = parse_font(file_entry_start) else {
                    return Err(verify_failure(i));
                };
                FileEntry::Font(res)
            }
            _ => unreachable!("file type checked above"),
        };

        entries.push(Entry {
            directory_entry,
            file_entry,
        });
    }

    Ok((i, Wad { header, entries }))
}
