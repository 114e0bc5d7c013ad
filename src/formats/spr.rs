//! SPR - sprite sets: pixel rectangles cut out of an embedded texture set.
//!
//! ## Layout
//! ```text
//! [0x00] Signature            (u32, always 0)
//! [0x04] TexturesOffset       (u32, absolute) -> TextureSet
//! [0x08] TextureCount         (i32, informational)
//! [0x0C] SpriteCount          (i32)
//! [0x10] SpritesOffset        (u32, relative to the sprite set)
//! [0x14] TextureNamesOffset   (u32, absolute) -> u32[TextureCount]
//! [0x18] SpriteNamesOffset    (u32, relative) -> u32[SpriteCount]
//! [0x1C] SpriteModesOffset    (u32, relative, unused)
//! ```
//! Name tables hold absolute offsets to null-terminated strings.
//!
//! ## Sprite record (0x28 bytes)
//! ```text
//! [0x00] TextureIndex         (u32)
//! [0x04] Reserved             (u32)
//! [0x08] RectBegin            (f32 x, f32 y)
//! [0x10] RectEnd              (f32 x, f32 y)
//! [0x18] X, Y                 (f32, pixels)
//! [0x20] Width, Height        (f32, pixels)
//! ```

use tracing::debug;

use crate::cursor::{Cursor, Endian};
use crate::formats::txp::{TextureSet, read_name_table};
use crate::{Error, Result};

pub const SPRITE_SET_MAGIC: u32 = 0;

/// Size of one sprite record in bytes.
pub const SPRITE_RECORD_SIZE: usize = 0x28;

/// Fixed header fields of a sprite set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SpriteSetHeader {
    pub textures_offset: u32,
    pub texture_count: i32,
    pub sprite_count: i32,
    pub sprites_offset: u32,
    pub texture_names_offset: u32,
    pub sprite_names_offset: u32,
    pub sprite_modes_offset: u32,
}

impl SpriteSetHeader {
    /// Read the signature and header fields at the cursor.
    pub fn read(c: &mut Cursor<'_>) -> Result<Self> {
        c.expect_magic(&[SPRITE_SET_MAGIC], "invalid SpriteSet signature")?;
        Ok(SpriteSetHeader {
            textures_offset: c.read_u32()?,
            texture_count: c.read_i32()?,
            sprite_count: c.read_i32()?,
            sprites_offset: c.read_u32()?,
            texture_names_offset: c.read_u32()?,
            sprite_names_offset: c.read_u32()?,
            sprite_modes_offset: c.read_u32()?,
        })
    }
}

/// A named rectangle on one texture of the owning sprite set.
#[derive(Debug, Clone, PartialEq)]
pub struct Sprite {
    /// Position in the sprite set's texture list. Not validated at parse
    /// time.
    pub texture_index: u32,
    /// Normalised texture coordinates. Not used for cropping.
    pub rect_begin: (f32, f32),
    pub rect_end: (f32, f32),
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub name: Option<String>,
}

impl Sprite {
    /// Decode one fixed-size sprite record.
    pub fn read(c: &mut Cursor<'_>) -> Result<Self> {
        let texture_index = c.read_u32()?;
        let _reserved = c.read_u32()?;
        let rect_begin = (c.read_f32()?, c.read_f32()?);
        let rect_end = (c.read_f32()?, c.read_f32()?);
        Ok(Sprite {
            texture_index,
            rect_begin,
            rect_end,
            x: c.read_f32()?,
            y: c.read_f32()?,
            width: c.read_f32()?,
            height: c.read_f32()?,
            name: None,
        })
    }
}

/// Sprites together with the texture set they are cut from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpriteSet {
    pub sprites: Vec<Sprite>,
    pub texture_set: Option<TextureSet>,
}

impl SpriteSet {
    /// Parse a sprite set at the start of `data`.
    ///
    /// The byte order is not recorded, so both are tried. A parse that
    /// yields sprites wins; otherwise the first error-free parse is
    /// returned, and if neither order parses the big-endian error is.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut fallback = None;
        let mut last_err = Error::MalformedHeader("invalid SpriteSet signature");
        for endian in [Endian::Little, Endian::Big] {
            let mut c = Cursor::with_endian(data, endian);
            match Self::read(&mut c) {
                Ok(set) if !set.sprites.is_empty() => return Ok(set),
                Ok(set) => {
                    fallback.get_or_insert(set);
                }
                Err(e) => {
                    debug!(?endian, "SpriteSet parse failed: {e}");
                    last_err = e;
                }
            }
        }
        fallback.ok_or(last_err)
    }

    /// Decode a sprite set at the cursor position.
    ///
    /// Relative offsets resolve against the innermost base, which the caller
    /// sets to the start of the sprite set (the root base `0` for a file
    /// that starts with one). The cursor position is restored afterwards.
    pub fn read(c: &mut Cursor<'_>) -> Result<Self> {
        let header = SpriteSetHeader::read(c)?;
        debug!(?header, endian = ?c.endian(), "SpriteSet header");

        let saved = c.position();
        let result = Self::read_body(c, &header);
        c.seek(saved);
        result
    }

    fn read_body(c: &mut Cursor<'_>, header: &SpriteSetHeader) -> Result<Self> {
        let mut set = SpriteSet::default();
        let sprite_count = header.sprite_count.max(0) as usize;

        if header.textures_offset != 0 {
            let at = header.textures_offset as usize;
            c.seek(at);
            let textures = c.with_base(at, |c| TextureSet::read(c, header.texture_names_offset))?;
            set.texture_set = Some(textures);
        }

        if header.sprites_offset != 0 {
            c.seek(c.resolve(header.sprites_offset)?);
            c.ensure(
                sprite_count
                    .checked_mul(SPRITE_RECORD_SIZE)
                    .ok_or(Error::UnexpectedEof)?,
            )?;
            set.sprites.reserve(sprite_count);
            for _ in 0..sprite_count {
                set.sprites.push(Sprite::read(c)?);
            }
        }

        if header.sprite_names_offset != 0 {
            c.seek(c.resolve(header.sprite_names_offset)?);
            for (i, name) in read_name_table(c, sprite_count)? {
                if let Some(sprite) = set.sprites.get_mut(i) {
                    sprite.name = Some(name);
                }
            }
        }

        debug!(
            sprites = set.sprites.len(),
            textures = set.texture_set.as_ref().map_or(0, |t| t.textures.len()),
            "SpriteSet parsed"
        );
        Ok(set)
    }

    /// Number of textures available for sprites to reference.
    pub fn texture_count(&self) -> usize {
        self.texture_set.as_ref().map_or(0, |t| t.textures.len())
    }
}
