//! Signature scanning for TXP data that cannot be read from its start.
//!
//! Texture sets are sometimes embedded in larger files, or preceded by a
//! header this crate does not understand. When [`Block::read_root`] fails,
//! [`scan`] searches the whole buffer for every TXP signature in both byte
//! orders and tries to decode a block at each hit. A hit that fails to
//! decode is logged and skipped; the rest of the buffer is still scanned.
//!
//! This path is heuristic. The deterministic parsers live in
//! [`crate::formats`].

use tracing::{debug, info, warn};

use crate::cursor::{Cursor, Endian};
use crate::formats::spr::{SpriteSet, SpriteSetHeader};
use crate::formats::txp::{Block, BlockKind, MAGICS};
use crate::{Error, Result};

/// How many bytes before an embedded texture set are searched for the
/// sprite set header that owns it.
pub const SPRITE_SET_SEARCH_WINDOW: usize = 1000;

/// A block decoded during recovery.
#[derive(Debug, Clone, PartialEq)]
pub struct Recovered {
    /// Absolute offset of the block's signature.
    pub offset: usize,
    /// Byte order the signature matched in.
    pub endian: Endian,
    pub block: Block,
}

/// Outcome of [`scan`] or [`recover`].
#[derive(Debug, Default)]
pub struct ScanReport {
    /// Signature hits examined.
    pub candidates: usize,
    /// Blocks that decoded, in offset order.
    pub blocks: Vec<Recovered>,
    /// Offsets that looked like a block but failed to decode.
    pub failures: Vec<(usize, Error)>,
}

impl ScanReport {
    pub fn successes(&self) -> usize {
        self.blocks.len()
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }
}

/// Every offset where a TXP signature appears in either byte order,
/// ascending and without duplicates.
pub fn find_candidates(data: &[u8]) -> Vec<usize> {
    let patterns: Vec<[u8; 4]> = MAGICS
        .iter()
        .flat_map(|&m| [m.to_le_bytes(), m.to_be_bytes()])
        .collect();
    data.windows(4)
        .enumerate()
        .filter(|(_, w)| patterns.iter().any(|p| p == w))
        .map(|(i, _)| i)
        .collect()
}

/// Decode a block at every signature hit in `data`.
pub fn scan(data: &[u8]) -> ScanReport {
    let candidates = find_candidates(data);
    let mut report = ScanReport {
        candidates: candidates.len(),
        ..ScanReport::default()
    };
    let mut c = Cursor::new(data);

    for offset in candidates {
        let Some((kind, endian)) = BlockKind::classify(data, offset) else {
            continue;
        };

        let names_at = match kind {
            BlockKind::TextureSet => find_owning_header(data, offset, endian)
                .map_or(0, |(_, header)| header.texture_names_offset),
            _ => 0,
        };

        c.set_endian(endian);
        c.seek(offset);
        match c.with_base(offset, |c| Block::read(c, kind, names_at)) {
            Ok(block) => {
                debug!(offset, ?kind, ?endian, "recovered TXP block");
                report.blocks.push(Recovered {
                    offset,
                    endian,
                    block,
                });
            }
            Err(e) => {
                warn!(offset, ?kind, "failed to parse TXP candidate: {e}");
                report.failures.push((offset, e));
            }
        }
    }

    info!(
        candidates = report.candidates,
        recovered = report.successes(),
        failed = report.failed(),
        "TXP scan finished"
    );
    report
}

/// Decode the block at the start of `data`, falling back to [`scan`] when
/// that fails.
///
/// Returns [`Error::MalformedHeader`] when neither the root nor any
/// signature hit yields a block.
pub fn recover(data: &[u8]) -> Result<ScanReport> {
    match Block::read_root(data) {
        Ok(block) => {
            let endian = BlockKind::classify(data, 0).map_or(Endian::Little, |(_, e)| e);
            return Ok(ScanReport {
                candidates: 1,
                blocks: vec![Recovered {
                    offset: 0,
                    endian,
                    block,
                }],
                failures: Vec::new(),
            });
        }
        Err(e) => debug!("root TXP parse failed: {e}; scanning"),
    }

    let report = scan(data);
    if report.blocks.is_empty() {
        return Err(if report.candidates == 0 {
            Error::MalformedHeader("no TXP signature found")
        } else {
            Error::MalformedHeader("TXP signatures found but none parsed")
        });
    }
    Ok(report)
}

/// Search backwards from an embedded texture set for a sprite set header
/// whose `TexturesOffset` points at it.
///
/// Returns the header's offset and fields. Best effort: a sprite set that
/// lies further back than [`SPRITE_SET_SEARCH_WINDOW`] is not found.
pub fn find_owning_header(
    data: &[u8],
    texture_set_at: usize,
    endian: Endian,
) -> Option<(usize, SpriteSetHeader)> {
    let floor = texture_set_at.saturating_sub(SPRITE_SET_SEARCH_WINDOW);
    let steps = (texture_set_at - floor) / 4;
    (1..=steps).map(|k| texture_set_at - 4 * k).find_map(|at| {
        let mut c = Cursor::with_endian(data, endian);
        c.seek(at);
        let header = SpriteSetHeader::read(&mut c).ok()?;
        let plausible = header.textures_offset as usize == texture_set_at
            && header.texture_names_offset != 0
            && (header.texture_names_offset as usize) < data.len();
        plausible.then(|| {
            debug!(at, texture_set_at, "found owning SpriteSet header");
            (at, header)
        })
    })
}

/// Find a sprite set in `data`.
///
/// The root is tried first in both byte orders. If that yields no sprites,
/// each texture set found by scanning is traced back to its owning header
/// with [`find_owning_header`] and the sprite set is parsed there, with its
/// own start as the base for relative offsets.
pub fn find_sprite_set(data: &[u8]) -> Result<SpriteSet> {
    let root = SpriteSet::parse(data);
    if root.as_ref().is_ok_and(|set| !set.sprites.is_empty()) {
        return root;
    }

    for offset in find_candidates(data) {
        let Some((BlockKind::TextureSet, endian)) = BlockKind::classify(data, offset) else {
            continue;
        };
        let Some((at, _)) = find_owning_header(data, offset, endian) else {
            continue;
        };

        let mut c = Cursor::with_endian(data, endian);
        c.seek(at);
        match c.with_base(at, SpriteSet::read) {
            Ok(set) if !set.sprites.is_empty() => return Ok(set),
            Ok(_) => {}
            Err(e) => debug!(at, "embedded SpriteSet parse failed: {e}"),
        }
    }

    root.map_err(|_| Error::MalformedHeader("no SpriteSet found"))
}
