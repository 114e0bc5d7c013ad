//! TXP - texture sets, textures and their mip/array sub-images.
//!
//! A texture set is a small tree of offset-addressed blocks. Every block
//! starts with a `"TXP"` signature whose fourth byte gives the block type.
//! Child pointers are displacements from the start of the *enclosing* block,
//! so parsers push a base on entry and resolve children with
//! [`Cursor::read_at`]. A zero pointer means the child is absent.
//!
//! ## Layout
//! ```text
//! TextureSet  (magic 0x03505854, "TXP\x03" when little-endian)
//! [0x00] Magic
//! [0x04] TextureCount                 (i32)
//! [0x08] TextureCountWithPadding      (i32, unused)
//! [0x0C] TextureOffsets[TextureCount] (u32, relative to the set)
//!
//! Texture     (magic 0x04505854 or 0x05505854)
//! [0x00] Magic
//! [0x04] SubTextureCount              (i32)
//! [0x08] Info                         (u32: bits 0-7 mip count,
//!                                           bits 8-15 array size)
//! [0x0C] SubTextureOffsets[ArraySize * MipCount]
//!                                     (u32, relative to the texture,
//!                                      array-major)
//!
//! SubTexture  (magic 0x02505854)
//! [0x00] Magic
//! [0x04] Width                        (i32)
//! [0x08] Height                       (i32)
//! [0x0C] Format                       (i32, see [`TextureFormat`])
//! [0x10] Id                           (i32)
//! [0x14] DataSize                     (i32)
//! [0x18] Data[DataSize]
//! ```
//!
//! ## Endianness
//! Not recorded anywhere. Every signature is checked in the cursor's current
//! byte order first and in the opposite order second; the order that matched
//! stays in effect for the rest of the parse.

use std::collections::BTreeMap;
use std::fmt;

use tracing::debug;

use crate::cursor::{Cursor, Endian};
use crate::{Error, Result};

pub const TEXTURE_SET_MAGIC: u32 = 0x0350_5854;
pub const TEXTURE_MAGIC_V4: u32 = 0x0450_5854;
pub const TEXTURE_MAGIC_V5: u32 = 0x0550_5854;
pub const SUB_TEXTURE_MAGIC: u32 = 0x0250_5854;

/// Every TXP block signature, in the order the scanner reports them.
pub const MAGICS: [u32; 4] = [
    TEXTURE_SET_MAGIC,
    TEXTURE_MAGIC_V4,
    TEXTURE_MAGIC_V5,
    SUB_TEXTURE_MAGIC,
];

/// Pixel format of a [`SubTexture`] payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    A8,
    Rgb8,
    Rgba8,
    Rgb5,
    Rgb5A1,
    Rgba4,
    Dxt1,
    Dxt1a,
    Dxt3,
    Dxt5,
    Ati1,
    Ati2,
    L8,
    L8A8,
    Bc7,
    Bc6h,
    Unknown(u32),
}

impl TextureFormat {
    pub fn from_id(id: u32) -> Self {
        match id {
            0 => TextureFormat::A8,
            1 => TextureFormat::Rgb8,
            2 => TextureFormat::Rgba8,
            3 => TextureFormat::Rgb5,
            4 => TextureFormat::Rgb5A1,
            5 => TextureFormat::Rgba4,
            6 => TextureFormat::Dxt1,
            7 => TextureFormat::Dxt1a,
            8 => TextureFormat::Dxt3,
            9 => TextureFormat::Dxt5,
            10 => TextureFormat::Ati1,
            11 => TextureFormat::Ati2,
            12 => TextureFormat::L8,
            13 => TextureFormat::L8A8,
            15 => TextureFormat::Bc7,
            127 => TextureFormat::Bc6h,
            other => TextureFormat::Unknown(other),
        }
    }

    pub fn id(self) -> u32 {
        match self {
            TextureFormat::A8 => 0,
            TextureFormat::Rgb8 => 1,
            TextureFormat::Rgba8 => 2,
            TextureFormat::Rgb5 => 3,
            TextureFormat::Rgb5A1 => 4,
            TextureFormat::Rgba4 => 5,
            TextureFormat::Dxt1 => 6,
            TextureFormat::Dxt1a => 7,
            TextureFormat::Dxt3 => 8,
            TextureFormat::Dxt5 => 9,
            TextureFormat::Ati1 => 10,
            TextureFormat::Ati2 => 11,
            TextureFormat::L8 => 12,
            TextureFormat::L8A8 => 13,
            TextureFormat::Bc7 => 15,
            TextureFormat::Bc6h => 127,
            TextureFormat::Unknown(id) => id,
        }
    }

    /// Canonical upper-case name, as used in asset tooling.
    pub fn name(self) -> &'static str {
        match self {
            TextureFormat::A8 => "A8",
            TextureFormat::Rgb8 => "RGB8",
            TextureFormat::Rgba8 => "RGBA8",
            TextureFormat::Rgb5 => "RGB5",
            TextureFormat::Rgb5A1 => "RGB5A1",
            TextureFormat::Rgba4 => "RGBA4",
            TextureFormat::Dxt1 => "DXT1",
            TextureFormat::Dxt1a => "DXT1a",
            TextureFormat::Dxt3 => "DXT3",
            TextureFormat::Dxt5 => "DXT5",
            TextureFormat::Ati1 => "ATI1",
            TextureFormat::Ati2 => "ATI2",
            TextureFormat::L8 => "L8",
            TextureFormat::L8A8 => "L8A8",
            TextureFormat::Bc7 => "BC7",
            TextureFormat::Bc6h => "BC6H",
            TextureFormat::Unknown(_) => "UNKNOWN",
        }
    }

    /// Whether sprite export can decode this format.
    pub fn is_decodable(self) -> bool {
        matches!(self, TextureFormat::Dxt1 | TextureFormat::Dxt5)
    }
}

impl fmt::Display for TextureFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TextureFormat::Unknown(id) => write!(f, "UNKNOWN_{id}"),
            known => f.write_str(known.name()),
        }
    }
}

/// One image of a texture: a single mip level of a single array slice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubTexture {
    pub width: u32,
    pub height: u32,
    /// Raw format id; see [`SubTexture::format`].
    pub format_id: u32,
    pub id: u32,
    /// Compressed pixel payload, exactly `DataSize` bytes.
    pub data: Vec<u8>,
}

impl SubTexture {
    /// Decode a sub-texture at the cursor position.
    pub fn read(c: &mut Cursor<'_>) -> Result<Self> {
        c.expect_magic(&[SUB_TEXTURE_MAGIC], "invalid SubTexture signature")?;
        let width = c.read_u32()?;
        let height = c.read_u32()?;
        let format_id = c.read_u32()?;
        let id = c.read_u32()?;
        let size = c.read_u32()? as usize;
        let data = c.read_bytes(size)?.to_vec();
        Ok(SubTexture {
            width,
            height,
            format_id,
            id,
            data,
        })
    }

    pub fn format(&self) -> TextureFormat {
        TextureFormat::from_id(self.format_id)
    }

    /// File name for dumping the raw payload, e.g.
    /// `tex0_arr0_mip0_w256_h256_f6_id3.bin`.
    pub fn blob_name(&self, prefix: &str) -> String {
        format!(
            "{prefix}_w{}_h{}_f{}_id{}.bin",
            self.width, self.height, self.format_id, self.id
        )
    }
}

/// A texture: a fixed `array_size × mip_count` grid of optional sub-images.
#[derive(Debug, Clone, PartialEq)]
pub struct Texture {
    /// Block signature the texture was read with (v4 or v5).
    pub version: u32,
    pub array_size: usize,
    pub mip_count: usize,
    /// Indexed `[array][mip]`. Absent cells had a zero offset.
    pub subtextures: Vec<Vec<Option<SubTexture>>>,
    pub name: Option<String>,
}

impl Texture {
    /// Decode a texture starting at the cursor position.
    ///
    /// The texture's own start becomes the base for its sub-texture offsets
    /// and is popped again before returning.
    pub fn read(c: &mut Cursor<'_>) -> Result<Self> {
        let start = c.position();
        c.with_base(start, Self::read_body)
    }

    fn read_body(c: &mut Cursor<'_>) -> Result<Self> {
        let version = c.expect_magic(
            &[TEXTURE_MAGIC_V4, TEXTURE_MAGIC_V5],
            "invalid Texture signature",
        )?;
        let subcount = c.read_i32()?;
        let info = c.read_u32()?;
        let mut mip_count = (info & 0xFF) as i64;
        let array_size = ((info >> 8) & 0xFF) as i64;
        // Some encoders write a mip count that disagrees with the actual
        // number of sub-textures for non-array textures.
        if array_size == 1 && i64::from(subcount) != mip_count {
            mip_count = i64::from(subcount);
        }
        let array_size = array_size.max(1) as usize;
        let mip_count = mip_count.max(1) as usize;

        let cells = array_size
            .checked_mul(mip_count)
            .ok_or(Error::UnexpectedEof)?;
        c.ensure_words(cells)?;

        let mut subtextures = vec![vec![None; mip_count]; array_size];
        for row in subtextures.iter_mut() {
            for cell in row.iter_mut() {
                let offset = c.read_u32()?;
                *cell = c.read_at(offset, SubTexture::read)?;
            }
        }

        Ok(Texture {
            version,
            array_size,
            mip_count,
            subtextures,
            name: None,
        })
    }

    /// Sub-texture at `(array, mip)`, if present.
    pub fn subtexture(&self, array: usize, mip: usize) -> Option<&SubTexture> {
        self.subtextures.get(array)?.get(mip)?.as_ref()
    }

    /// Full-resolution image of the first array slice.
    pub fn base(&self) -> Option<&SubTexture> {
        self.subtexture(0, 0)
    }

    /// Every present sub-texture as `(array, mip, subtexture)`.
    pub fn iter_subtextures(&self) -> impl Iterator<Item = (usize, usize, &SubTexture)> {
        self.subtextures.iter().enumerate().flat_map(|(a, row)| {
            row.iter()
                .enumerate()
                .filter_map(move |(m, cell)| cell.as_ref().map(|st| (a, m, st)))
        })
    }
}

/// An ordered list of textures, optionally named.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextureSet {
    pub textures: Vec<Texture>,
    /// Names by position in the name table. May name indices past the end
    /// of `textures` when the offset table had holes.
    pub names: BTreeMap<usize, String>,
}

impl TextureSet {
    /// Parse a texture set at the start of `data`, trying little-endian
    /// first and big-endian second.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut c = Cursor::new(data);
        Self::read(&mut c, 0)
    }

    /// Decode a texture set at the cursor position.
    ///
    /// Texture offsets resolve against the innermost base, which the caller
    /// must have set to the start of the set. `names_at` is the absolute
    /// position of the texture name table, or `0` for none; name offsets
    /// inside it are absolute too.
    pub fn read(c: &mut Cursor<'_>, names_at: u32) -> Result<Self> {
        c.expect_magic(&[TEXTURE_SET_MAGIC], "invalid TextureSet signature")?;
        let tex_count = c.read_i32()?.max(0) as usize;
        let _tex_count_with_padding = c.read_i32()?;

        c.ensure_words(tex_count)?;
        let mut offsets = Vec::with_capacity(tex_count);
        for _ in 0..tex_count {
            offsets.push(c.read_u32()?);
        }

        let mut set = TextureSet::default();
        for offset in offsets {
            if let Some(tex) = c.read_at(offset, Texture::read)? {
                set.textures.push(tex);
            }
        }
        debug!(
            textures = set.textures.len(),
            endian = ?c.endian(),
            "TextureSet parsed"
        );

        if names_at != 0 {
            set.assign_names(c, names_at as usize, tex_count)?;
        }

        Ok(set)
    }

    fn assign_names(&mut self, c: &mut Cursor<'_>, names_at: usize, count: usize) -> Result<()> {
        let saved = c.position();
        c.seek(names_at);
        let result = read_name_table(c, count);
        c.seek(saved);

        for (i, name) in result? {
            if let Some(tex) = self.textures.get_mut(i) {
                tex.name = Some(name.clone());
            }
            self.names.insert(i, name);
        }
        Ok(())
    }

    /// Texture at `index`, if it exists.
    pub fn get(&self, index: usize) -> Option<&Texture> {
        self.textures.get(index)
    }

    /// Display name for the texture at `index`: its own name or
    /// `texture_<index>`.
    pub fn display_name(&self, index: usize) -> String {
        self.get(index)
            .and_then(|t| t.name.clone())
            .unwrap_or_else(|| format!("texture_{index}"))
    }
}

/// Read `count` absolute string offsets at the cursor and resolve the
/// non-zero ones, returning `(index, name)` pairs.
pub(crate) fn read_name_table(c: &mut Cursor<'_>, count: usize) -> Result<Vec<(usize, String)>> {
    c.ensure_words(count)?;
    let mut offsets = Vec::with_capacity(count);
    for _ in 0..count {
        offsets.push(c.read_u32()?);
    }
    offsets
        .into_iter()
        .enumerate()
        .filter(|&(_, off)| off != 0)
        .map(|(i, off)| c.string_at(off as usize).map(|name| (i, name)))
        .collect()
}

/// Kind of TXP block a signature identifies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    TextureSet,
    Texture,
    SubTexture,
}

impl BlockKind {
    pub fn from_magic(magic: u32) -> Option<Self> {
        match magic {
            TEXTURE_SET_MAGIC => Some(BlockKind::TextureSet),
            TEXTURE_MAGIC_V4 | TEXTURE_MAGIC_V5 => Some(BlockKind::Texture),
            SUB_TEXTURE_MAGIC => Some(BlockKind::SubTexture),
            _ => None,
        }
    }

    /// Work out which byte order turns the word at `offset` into a known
    /// signature. Little-endian wins when both would.
    pub fn classify(data: &[u8], offset: usize) -> Option<(Self, Endian)> {
        let raw: [u8; 4] = data.get(offset..offset.checked_add(4)?)?.try_into().ok()?;
        let le = Self::from_magic(Endian::Little.u32_from(raw));
        let be = Self::from_magic(Endian::Big.u32_from(raw));
        match (le, be) {
            (Some(kind), _) => Some((kind, Endian::Little)),
            (None, Some(kind)) => Some((kind, Endian::Big)),
            (None, None) => None,
        }
    }
}

/// Any decoded TXP block.
#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    TextureSet(TextureSet),
    Texture(Texture),
    SubTexture(SubTexture),
}

impl Block {
    pub fn kind(&self) -> BlockKind {
        match self {
            Block::TextureSet(_) => BlockKind::TextureSet,
            Block::Texture(_) => BlockKind::Texture,
            Block::SubTexture(_) => BlockKind::SubTexture,
        }
    }

    /// Decode a block of the given kind at the cursor position. The caller
    /// owns the base for texture-set offsets.
    pub fn read(c: &mut Cursor<'_>, kind: BlockKind, names_at: u32) -> Result<Self> {
        Ok(match kind {
            BlockKind::TextureSet => Block::TextureSet(TextureSet::read(c, names_at)?),
            BlockKind::Texture => Block::Texture(Texture::read(c)?),
            BlockKind::SubTexture => Block::SubTexture(SubTexture::read(c)?),
        })
    }

    /// Decode whichever block sits at offset 0 of `data`, in whichever byte
    /// order makes its signature valid.
    pub fn read_root(data: &[u8]) -> Result<Self> {
        let (kind, endian) = BlockKind::classify(data, 0)
            .ok_or(Error::MalformedHeader("no TXP signature at offset 0"))?;
        let mut c = Cursor::with_endian(data, endian);
        Self::read(&mut c, kind, 0)
    }

    /// The textures this block contributes: all of a set's textures, the
    /// texture itself, or nothing for a lone sub-texture.
    pub fn textures(&self) -> &[Texture] {
        match self {
            Block::TextureSet(set) => &set.textures,
            Block::Texture(tex) => std::slice::from_ref(tex),
            Block::SubTexture(_) => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(endian: Endian, ws: &[u32]) -> Vec<u8> {
        ws.iter().flat_map(|w| endian.u32_to(*w)).collect()
    }

    fn sub_texture(endian: Endian, payload: &[u8]) -> Vec<u8> {
        let mut out = words(
            endian,
            &[SUB_TEXTURE_MAGIC, 4, 4, 6, 1, payload.len() as u32],
        );
        out.extend_from_slice(payload);
        out
    }

    #[test]
    fn sub_texture_reads_exact_payload() {
        let mut data = sub_texture(Endian::Little, &[1, 2, 3, 4, 5, 6, 7, 8]);
        data.extend_from_slice(&[0xFF; 4]);
        let mut c = Cursor::new(&data);
        let st = SubTexture::read(&mut c).unwrap();
        assert_eq!(st.data, [1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(st.format(), TextureFormat::Dxt1);
        assert_eq!(c.position(), 32);
        assert_eq!(st.blob_name("sub0"), "sub0_w4_h4_f6_id1.bin");
    }

    #[test]
    fn sub_texture_short_payload_is_eof() {
        let mut data = sub_texture(Endian::Little, &[0; 8]);
        data.truncate(28);
        assert!(matches!(
            SubTexture::read(&mut Cursor::new(&data)),
            Err(Error::UnexpectedEof)
        ));
    }

    #[test]
    fn mip_count_follows_subcount_for_single_slice() {
        // subcount 3, info: mip 1, array 1. Offsets: 0x18, 0, 0.
        let mut data = words(Endian::Little, &[TEXTURE_MAGIC_V5, 3, 0x0101, 0x18, 0, 0]);
        data.extend_from_slice(&sub_texture(Endian::Little, &[9; 4]));
        let tex = Texture::read(&mut Cursor::new(&data)).unwrap();
        assert_eq!(tex.version, TEXTURE_MAGIC_V5);
        assert_eq!((tex.array_size, tex.mip_count), (1, 3));
        assert_eq!(tex.base().unwrap().data, [9; 4]);
        assert!(tex.subtexture(0, 1).is_none());
        assert!(tex.subtexture(0, 2).is_none());
        assert_eq!(tex.iter_subtextures().count(), 1);
    }

    #[test]
    fn zero_dimensions_floor_to_one() {
        let data = words(Endian::Little, &[TEXTURE_MAGIC_V4, 0, 0x0000, 0]);
        let tex = Texture::read(&mut Cursor::new(&data)).unwrap();
        assert_eq!((tex.array_size, tex.mip_count), (1, 1));
        assert!(tex.base().is_none());
    }

    #[test]
    fn oversized_grid_is_rejected_before_allocating() {
        let data = words(Endian::Little, &[TEXTURE_MAGIC_V4, i32::MAX as u32, 0x0101]);
        assert!(matches!(
            Texture::read(&mut Cursor::new(&data)),
            Err(Error::UnexpectedEof)
        ));
    }

    #[test]
    fn texture_pops_its_base_on_failure() {
        let data = words(Endian::Little, &[TEXTURE_MAGIC_V4, 1, 0x0101, 0x40]);
        let mut c = Cursor::new(&data);
        assert!(Texture::read(&mut c).is_err());
        assert_eq!(c.base_depth(), 1);
    }

    #[test]
    fn format_names() {
        assert_eq!(TextureFormat::from_id(9).to_string(), "DXT5");
        assert_eq!(TextureFormat::from_id(14).to_string(), "UNKNOWN_14");
        assert_eq!(TextureFormat::from_id(127), TextureFormat::Bc6h);
        assert!(TextureFormat::Dxt1.is_decodable());
        assert!(!TextureFormat::Bc7.is_decodable());
    }

    #[test]
    fn classify_prefers_matching_order() {
        let le = TEXTURE_SET_MAGIC.to_le_bytes();
        let be = TEXTURE_SET_MAGIC.to_be_bytes();
        assert_eq!(
            BlockKind::classify(&le, 0),
            Some((BlockKind::TextureSet, Endian::Little))
        );
        assert_eq!(
            BlockKind::classify(&be, 0),
            Some((BlockKind::TextureSet, Endian::Big))
        );
        assert_eq!(BlockKind::classify(&[0; 4], 0), None);
        assert_eq!(BlockKind::classify(&le, 2), None);
    }
}
