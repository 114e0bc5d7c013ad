#![allow(dead_code)]

use divakit::cursor::Endian;
use divakit::formats::txp::{SUB_TEXTURE_MAGIC, TEXTURE_MAGIC_V5, TEXTURE_SET_MAGIC};

/// Growable buffer that writes words in a fixed byte order.
pub struct Builder {
    pub endian: Endian,
    pub buf: Vec<u8>,
}

impl Builder {
    pub fn new(endian: Endian) -> Self {
        Self {
            endian,
            buf: Vec::new(),
        }
    }

    pub fn pos(&self) -> usize {
        self.buf.len()
    }

    pub fn u32(&mut self, v: u32) -> &mut Self {
        let bytes = self.endian.u32_to(v);
        self.buf.extend_from_slice(&bytes);
        self
    }

    pub fn f32(&mut self, v: f32) -> &mut Self {
        self.u32(v.to_bits())
    }

    pub fn bytes(&mut self, b: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(b);
        self
    }

    pub fn cstr(&mut self, s: &str) -> &mut Self {
        self.buf.extend_from_slice(s.as_bytes());
        self.buf.push(0);
        self
    }

    pub fn align(&mut self, n: usize) -> &mut Self {
        while self.buf.len() % n != 0 {
            self.buf.push(0);
        }
        self
    }

    pub fn patch_u32(&mut self, at: usize, v: u32) {
        let bytes = self.endian.u32_to(v);
        self.buf[at..at + 4].copy_from_slice(&bytes);
    }
}

pub fn sub_texture(
    endian: Endian,
    width: u32,
    height: u32,
    format: u32,
    id: u32,
    payload: &[u8],
) -> Vec<u8> {
    let mut b = Builder::new(endian);
    b.u32(SUB_TEXTURE_MAGIC)
        .u32(width)
        .u32(height)
        .u32(format)
        .u32(id)
        .u32(payload.len() as u32)
        .bytes(payload);
    b.buf
}

/// Texture block with `array_size` rows of `mip_count` cells, listed
/// array-major; `None` cells get a zero offset.
pub fn texture(
    endian: Endian,
    array_size: u32,
    mip_count: u32,
    cells: &[Option<Vec<u8>>],
) -> Vec<u8> {
    let mut b = Builder::new(endian);
    b.u32(TEXTURE_MAGIC_V5)
        .u32(cells.len() as u32)
        .u32((array_size << 8) | mip_count);
    let table = b.pos();
    for _ in cells {
        b.u32(0);
    }
    for (i, cell) in cells.iter().enumerate() {
        if let Some(bytes) = cell {
            let at = b.pos() as u32;
            b.patch_u32(table + 4 * i, at);
            b.bytes(bytes);
        }
    }
    b.buf
}

/// Texture set holding `textures`; `None` entries get a zero offset.
pub fn texture_set(endian: Endian, textures: &[Option<Vec<u8>>]) -> Vec<u8> {
    let mut b = Builder::new(endian);
    b.u32(TEXTURE_SET_MAGIC)
        .u32(textures.len() as u32)
        .u32(textures.len() as u32);
    let table = b.pos();
    for _ in textures {
        b.u32(0);
    }
    for (i, tex) in textures.iter().enumerate() {
        if let Some(bytes) = tex {
            let at = b.pos() as u32;
            b.patch_u32(table + 4 * i, at);
            b.bytes(bytes);
        }
    }
    b.buf
}

/// A single-texture set whose base image is a `width × height` DXT5
/// sub-texture.
pub fn simple_texture_set(endian: Endian, width: u32, height: u32) -> Vec<u8> {
    let sub = sub_texture(endian, width, height, 9, 0, &[0xAB; 16]);
    let tex = texture(endian, 1, 1, &[Some(sub)]);
    texture_set(endian, &[Some(tex)])
}

pub struct SpriteDef<'a> {
    pub texture_index: u32,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub name: Option<&'a str>,
}

impl<'a> SpriteDef<'a> {
    pub fn new(texture_index: u32, rect: [f32; 4], name: Option<&'a str>) -> Self {
        let [x, y, width, height] = rect;
        Self {
            texture_index,
            x,
            y,
            width,
            height,
            name,
        }
    }
}

/// Sprite set placed after `prefix`. Relative offsets are relative to the
/// sprite set's start; texture set, texture names and all strings use
/// absolute offsets.
pub fn sprite_set_at(
    endian: Endian,
    prefix: &[u8],
    sprites: &[SpriteDef<'_>],
    textures: Option<&[u8]>,
    texture_names: &[&str],
) -> Vec<u8> {
    let mut b = Builder::new(endian);
    b.bytes(prefix);
    let base = b.pos();

    b.u32(0); // signature
    let textures_offset_at = b.pos();
    b.u32(0)
        .u32(texture_names.len() as u32)
        .u32(sprites.len() as u32);
    let sprites_offset_at = b.pos();
    b.u32(0);
    let texture_names_at = b.pos();
    b.u32(0);
    let sprite_names_at = b.pos();
    b.u32(0).u32(0);

    if !sprites.is_empty() {
        let rel = (b.pos() - base) as u32;
        b.patch_u32(sprites_offset_at, rel);
        for s in sprites {
            b.u32(s.texture_index)
                .u32(0)
                .f32(0.0)
                .f32(0.0)
                .f32(1.0)
                .f32(1.0)
                .f32(s.x)
                .f32(s.y)
                .f32(s.width)
                .f32(s.height);
        }
    }

    let sprite_table = b.pos();
    if sprites.iter().any(|s| s.name.is_some()) {
        let rel = (sprite_table - base) as u32;
        b.patch_u32(sprite_names_at, rel);
        for _ in sprites {
            b.u32(0);
        }
    }
    let texture_table = b.pos();
    if !texture_names.is_empty() {
        b.patch_u32(texture_names_at, texture_table as u32);
        for _ in texture_names {
            b.u32(0);
        }
    }

    for (i, s) in sprites.iter().enumerate() {
        if let Some(name) = s.name {
            let at = b.pos() as u32;
            b.patch_u32(sprite_table + 4 * i, at);
            b.cstr(name);
        }
    }
    for (i, name) in texture_names.iter().enumerate() {
        let at = b.pos() as u32;
        b.patch_u32(texture_table + 4 * i, at);
        b.cstr(name);
    }

    if let Some(set) = textures {
        b.align(16);
        let at = b.pos() as u32;
        b.patch_u32(textures_offset_at, at);
        b.bytes(set);
    }
    b.buf
}

pub fn sprite_set(
    endian: Endian,
    sprites: &[SpriteDef<'_>],
    textures: Option<&[u8]>,
    texture_names: &[&str],
) -> Vec<u8> {
    sprite_set_at(endian, &[], sprites, textures, texture_names)
}

/// Minimal (`FArc`) archive holding `entries` back to back after the header.
pub fn minimal_archive(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let table_len: usize = entries.iter().map(|(n, _)| n.len() + 1 + 8).sum();
    let header_end = 12 + table_len;

    let mut b = Builder::new(Endian::Big);
    b.bytes(b"FArc").u32((header_end - 8) as u32).u32(16);
    let mut offset = header_end;
    for (name, data) in entries {
        b.cstr(name).u32(offset as u32).u32(data.len() as u32);
        offset += data.len();
    }
    for (_, data) in entries {
        b.bytes(data);
    }
    b.buf
}

/// Full (`FARC`) archive with the compression flag set; each entry is
/// `(name, stored bytes, uncompressed size)`.
pub fn compressed_archive(entries: &[(&str, &[u8], u32)]) -> Vec<u8> {
    let table_len: usize = entries.iter().map(|(n, _, _)| n.len() + 1 + 12).sum();
    let header_end = 28 + table_len;

    let mut b = Builder::new(Endian::Big);
    b.bytes(b"FARC")
        .u32((header_end - 8) as u32)
        .u32(2)
        .u32(0)
        .u32(16)
        .u32(0)
        .u32(0);
    let mut offset = header_end;
    for (name, data, size) in entries {
        b.cstr(name)
            .u32(offset as u32)
            .u32(data.len() as u32)
            .u32(*size);
        offset += data.len();
    }
    for (_, data, _) in entries {
        b.bytes(data);
    }
    b.buf
}

pub fn gzip(data: &[u8]) -> Vec<u8> {
    use std::io::Write;

    use flate2::Compression;
    use flate2::write::GzEncoder;

    let mut enc = GzEncoder::new(Vec::new(), Compression::default());
    enc.write_all(data).unwrap();
    enc.finish().unwrap()
}
