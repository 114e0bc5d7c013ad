//! Sprite composition: decode a texture's base image and cut sprites out of
//! it.
//!
//! Pixel decoding is delegated to a [`PixelDecoder`]. With the `bcn`
//! feature (enabled by default) [`BcDecoder`] handles the two block formats
//! sprite textures use in practice, DXT1 and DXT5; every other
//! [`TextureFormat`] is rejected with [`Error::UnsupportedPixelFormat`]
//! before a decoder is consulted.
//!
//! Decoded images are stored bottom row first relative to sprite
//! coordinates, so [`crop_sprite`] flips the image vertically before
//! cropping.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use image::{ImageFormat, RgbaImage, imageops};
use tracing::{debug, info, warn};

use crate::formats::farc::FarcReader;
use crate::formats::spr::{Sprite, SpriteSet};
use crate::formats::txp::{Texture, TextureFormat};
use crate::{Error, Result, scan};

/// Turns a compressed pixel payload into RGBA8 pixels.
pub trait PixelDecoder {
    /// Decode `data` into exactly `width * height * 4` bytes of RGBA8,
    /// row-major, first row first.
    fn decode(&self, data: &[u8], width: u32, height: u32, format: TextureFormat)
    -> Result<Vec<u8>>;
}

impl<D: PixelDecoder + ?Sized> PixelDecoder for &D {
    fn decode(
        &self,
        data: &[u8],
        width: u32,
        height: u32,
        format: TextureFormat,
    ) -> Result<Vec<u8>> {
        (**self).decode(data, width, height, format)
    }
}

/// DXT1/DXT5 decoder backed by `texture2ddecoder` (requires the `bcn`
/// feature).
#[cfg(feature = "bcn")]
#[derive(Debug, Clone, Copy, Default)]
pub struct BcDecoder;

#[cfg(feature = "bcn")]
impl PixelDecoder for BcDecoder {
    fn decode(
        &self,
        data: &[u8],
        width: u32,
        height: u32,
        format: TextureFormat,
    ) -> Result<Vec<u8>> {
        let block_size = match format {
            TextureFormat::Dxt1 => 8,
            TextureFormat::Dxt5 => 16,
            other => return Err(Error::UnsupportedPixelFormat(other.id())),
        };
        let (w, h) = (width as usize, height as usize);
        let needed = w
            .div_ceil(4)
            .checked_mul(h.div_ceil(4))
            .and_then(|blocks| blocks.checked_mul(block_size))
            .ok_or(Error::PixelDecode("dimensions overflow"))?;
        if data.len() < needed {
            return Err(Error::PixelDecode("payload shorter than its dimensions"));
        }

        let count = w
            .checked_mul(h)
            .ok_or(Error::PixelDecode("dimensions overflow"))?;
        let mut pixels = vec![0u32; count];
        let decoded = match format {
            TextureFormat::Dxt1 => texture2ddecoder::decode_bc1(data, w, h, &mut pixels),
            _ => texture2ddecoder::decode_bc3(data, w, h, &mut pixels),
        };
        decoded.map_err(|_| Error::PixelDecode("BCn block decode failed"))?;

        // Pixels come back as little-endian BGRA words.
        Ok(pixels
            .iter()
            .flat_map(|p| {
                let [b, g, r, a] = p.to_le_bytes();
                [r, g, b, a]
            })
            .collect())
    }
}

/// Decode the base image (array 0, mip 0) of `texture`.
///
/// Returns `Ok(None)` when the texture has no base sub-texture.
pub fn base_image<D: PixelDecoder + ?Sized>(
    texture: &Texture,
    decoder: &D,
) -> Result<Option<RgbaImage>> {
    let Some(st) = texture.base() else {
        return Ok(None);
    };
    let format = st.format();
    if !format.is_decodable() {
        return Err(Error::UnsupportedPixelFormat(st.format_id));
    }

    let rgba = decoder.decode(&st.data, st.width, st.height, format)?;
    let expected = (st.width as usize)
        .checked_mul(st.height as usize)
        .and_then(|n| n.checked_mul(4));
    if Some(rgba.len()) != expected {
        return Err(Error::PixelDecode("decoder returned a wrongly sized buffer"));
    }
    RgbaImage::from_raw(st.width, st.height, rgba)
        .map(Some)
        .ok_or(Error::PixelDecode("decoder returned a wrongly sized buffer"))
}

/// Largest width or height a cropped sprite may have.
pub const MAX_SPRITE_EXTENT: u32 = 16384;

/// Cut `sprite` out of its texture's decoded base image.
///
/// The image is flipped vertically, then the rectangle
/// `[x, x + width) × [y, y + height)` (each value truncated to an integer)
/// is copied out. Parts of the rectangle outside the image come back
/// transparent. Returns `Ok(None)` when there is no image, and
/// [`Error::InvalidSprite`] for non-finite fields or an extent above
/// [`MAX_SPRITE_EXTENT`].
pub fn crop_sprite(sprite: &Sprite, image: Option<&RgbaImage>) -> Result<Option<RgbaImage>> {
    let Some(image) = image else {
        return Ok(None);
    };
    let fields = [sprite.x, sprite.y, sprite.width, sprite.height];
    if !fields.iter().all(|v| v.is_finite()) {
        return Err(Error::InvalidSprite("non-finite rectangle"));
    }

    let x = sprite.x as i64;
    let y = sprite.y as i64;
    let width = (sprite.width as i64).max(0);
    let height = (sprite.height as i64).max(0);
    if width > i64::from(MAX_SPRITE_EXTENT) || height > i64::from(MAX_SPRITE_EXTENT) {
        return Err(Error::InvalidSprite("rectangle too large"));
    }

    let flipped = imageops::flip_vertical(image);
    let mut out = RgbaImage::new(width as u32, height as u32);
    let x_range = x.max(0)..x.saturating_add(width).min(i64::from(flipped.width()));
    let y_range = y.max(0)..y.saturating_add(height).min(i64::from(flipped.height()));
    for sy in y_range {
        for sx in x_range.clone() {
            let px = *flipped.get_pixel(sx as u32, sy as u32);
            out.put_pixel((sx - x) as u32, (sy - y) as u32, px);
        }
    }
    Ok(Some(out))
}

/// A sprite cut out of its texture.
#[derive(Debug, Clone)]
pub struct RenderedSprite {
    /// Sprite name, or `sprite_<texture>_<ordinal>` for unnamed sprites.
    pub name: String,
    pub texture_index: u32,
    pub image: RgbaImage,
}

/// Outcome of rendering a sprite set.
#[derive(Debug, Default)]
pub struct ExportBatch {
    pub sprites: Vec<RenderedSprite>,
    /// Sprites whose texture was out of range, absent or undecodable.
    pub skipped: usize,
}

/// Files written by [`ExportBatch::save_png`].
#[derive(Debug, Default)]
pub struct SavedPngs {
    pub written: Vec<PathBuf>,
    pub failed: usize,
}

impl ExportBatch {
    /// Sprites looked at, rendered or not.
    pub fn processed(&self) -> usize {
        self.sprites.len() + self.skipped
    }

    /// Write every rendered sprite to `dir` as `<name>.png`.
    ///
    /// Only failing to create `dir` is an error; individual write failures
    /// are logged and counted.
    pub fn save_png(&self, dir: &Path) -> Result<SavedPngs> {
        fs::create_dir_all(dir)?;
        let mut saved = SavedPngs::default();
        for sprite in &self.sprites {
            let path = dir.join(format!("{}.png", sprite.name));
            match write_png(&sprite.image, &path) {
                Ok(()) => saved.written.push(path),
                Err(e) => {
                    warn!(path = %path.display(), "failed to write sprite: {e}");
                    saved.failed += 1;
                }
            }
        }
        info!(
            written = saved.written.len(),
            failed = saved.failed,
            dir = %dir.display(),
            "sprite PNGs saved"
        );
        Ok(saved)
    }
}

fn write_png(image: &RgbaImage, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    image.save_with_format(path, ImageFormat::Png)?;
    Ok(())
}

/// Renders every sprite of a sprite set through one [`PixelDecoder`].
#[derive(Debug, Clone, Default)]
pub struct SpriteExporter<D> {
    decoder: D,
}

impl<D: PixelDecoder> SpriteExporter<D> {
    pub fn new(decoder: D) -> Self {
        Self { decoder }
    }

    /// Crop every sprite whose texture decodes.
    ///
    /// Each referenced texture is decoded at most once. Sprites referencing
    /// a missing or undecodable texture are logged and counted in
    /// [`ExportBatch::skipped`].
    pub fn render(&self, set: &SpriteSet) -> ExportBatch {
        let textures = set
            .texture_set
            .as_ref()
            .map_or(&[][..], |t| t.textures.as_slice());
        let mut cache: HashMap<u32, Option<RgbaImage>> = HashMap::new();
        let mut batch = ExportBatch::default();

        for sprite in &set.sprites {
            let index = sprite.texture_index;
            let name = sprite
                .name
                .clone()
                .unwrap_or_else(|| format!("sprite_{index}_{}", batch.sprites.len()));

            let Some(texture) = textures.get(index as usize) else {
                let e = Error::OutOfRangeReference {
                    index,
                    count: textures.len(),
                };
                warn!(sprite = %name, "skipping: {e}");
                batch.skipped += 1;
                continue;
            };

            let image = cache
                .entry(index)
                .or_insert_with(|| self.decode_texture(index, texture));
            let cropped = match crop_sprite(sprite, image.as_ref()) {
                Ok(Some(cropped)) => cropped,
                Ok(None) => {
                    warn!(sprite = %name, "skipping: texture {index} not available");
                    batch.skipped += 1;
                    continue;
                }
                Err(e) => {
                    warn!(sprite = %name, "skipping: {e}");
                    batch.skipped += 1;
                    continue;
                }
            };

            debug!(
                sprite = %name,
                x = sprite.x as i64,
                y = sprite.y as i64,
                w = cropped.width(),
                h = cropped.height(),
                texture = texture.name.as_deref().unwrap_or("?"),
                "sprite cropped"
            );
            batch.sprites.push(RenderedSprite {
                name,
                texture_index: index,
                image: cropped,
            });
        }

        info!(
            rendered = batch.sprites.len(),
            skipped = batch.skipped,
            "sprite set rendered"
        );
        batch
    }

    fn decode_texture(&self, index: u32, texture: &Texture) -> Option<RgbaImage> {
        match base_image(texture, &self.decoder) {
            Ok(Some(image)) => {
                debug!(
                    texture = index,
                    width = image.width(),
                    height = image.height(),
                    "texture decoded"
                );
                Some(image)
            }
            Ok(None) => {
                warn!(texture = index, "texture has no base image");
                None
            }
            Err(e) => {
                warn!(texture = index, "failed to decode texture: {e}");
                None
            }
        }
    }

    /// Render `set` and write the result to `dir` as PNG files.
    pub fn export_png(&self, set: &SpriteSet, dir: &Path) -> Result<(ExportBatch, SavedPngs)> {
        let batch = self.render(set);
        let saved = batch.save_png(dir)?;
        Ok((batch, saved))
    }

    /// Render the sprite set stored as the first entry of a FARC archive,
    /// without writing the entry to disk.
    pub fn render_archive(&self, data: &[u8]) -> Result<ExportBatch> {
        let reader = FarcReader::new(data)?;
        let entry = reader
            .entries()
            .next()
            .ok_or(Error::MalformedHeader("FARC archive has no entries"))?;
        let payload = reader.extract(entry)?;
        info!(entry = %entry.name, bytes = payload.len(), "sprite database extracted");

        let set = scan::find_sprite_set(&payload)?;
        Ok(self.render(&set))
    }
}
