//! FARC - File ARChive container.
//!
//! Holds a flat list of named blobs, optionally gzip-compressed one by one.
//! Sprite databases ship as a FARC whose first entry is the SPR file.
//!
//! ## Layout
//! ```text
//! [0x00] Tag                 (4 bytes: "FARC" / "FArC" / "FArc")
//! [0x04] HeaderSize          (u32 BE) - entry table ends at HeaderSize + 8
//! [0x08] Variant fields      (see below)
//! [...]  Entry table         (until HeaderSize + 8)
//! [...]  Entry data          (absolute offsets from the entry table)
//! ```
//! All header fields are big-endian.
//!
//! ## Variants
//! ```text
//! "FARC" (full)     Flags (u32)         bit 1 = compressed, bit 2 = encrypted
//!                   Reserved (u32)
//!                   Alignment (u32)
//!                   EntryPadding (u32)  bytes skipped after every entry
//!                   HeaderPadding (u32) bytes skipped before the table
//!                   Entry: Name\0, Offset, CompressedSize, UncompressedSize
//!
//! "FArC" (legacy)   Alignment (u32)
//!                   Entry: Name\0, Offset, CompressedSize, UncompressedSize
//!                   UncompressedSize == 0 means stored raw
//!
//! "FArc" (minimal)  Alignment (u32)
//!                   Entry: Name\0, Offset, Size   (never compressed)
//! ```

use tracing::{debug, info, warn};

use crate::cursor::{Cursor, Endian};
use crate::{Error, Result};

/// Bytes between the start of the file and the point `HeaderSize` counts
/// from.
const HEADER_SIZE_BIAS: usize = 8;

/// Upper bound on the output buffer reserved up front for decompression.
#[cfg(feature = "compression")]
const PREALLOC_LIMIT: usize = 64 << 20;

/// Which of the three FARC tags the archive carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FarcKind {
    /// `FARC`: flags word, per-entry padding, optional compression.
    Full,
    /// `FArC`: per-entry compression inferred from sizes.
    Legacy,
    /// `FArc`: single size per entry, never compressed.
    Minimal,
}

impl FarcKind {
    pub fn from_tag(tag: &[u8; 4]) -> Option<Self> {
        match tag {
            b"FARC" => Some(FarcKind::Full),
            b"FArC" => Some(FarcKind::Legacy),
            b"FArc" => Some(FarcKind::Minimal),
            _ => None,
        }
    }
}

/// Parsed FARC archive (metadata only).
///
/// Entry data is accessed via [`FarcReader`].
#[derive(Debug, Clone)]
pub struct Farc {
    /// Tag variant.
    pub kind: FarcKind,
    /// Data alignment declared in the header.
    pub alignment: u32,
    /// Archive-wide compression flag (only the full variant has one).
    pub compressed: bool,
    /// Entries in table order.
    pub entries: Vec<FarcEntry>,
    /// Absolute end of the entry table.
    pub header_end: usize,
}

/// A single entry inside a FARC archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FarcEntry {
    pub name: String,
    /// Absolute offset of the stored bytes.
    pub offset: u32,
    /// Number of stored bytes.
    pub compressed_size: u32,
    /// Size after decompression (equals `compressed_size` for raw entries).
    pub uncompressed_size: u32,
    pub is_compressed: bool,
}

impl Farc {
    /// Parse the FARC header and entry table at the start of `data`.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut c = Cursor::with_endian(data, Endian::Big);

        let tag = c.read_array::<4>()?;
        let kind = FarcKind::from_tag(&tag).ok_or(Error::MalformedHeader("unknown FARC tag"))?;

        let header_end = (c.read_u32()? as usize)
            .checked_add(HEADER_SIZE_BIAS)
            .ok_or(Error::MalformedHeader("FARC header size overflows"))?;
        if header_end > data.len() {
            return Err(Error::UnexpectedEof);
        }
        debug!(?kind, header_end, "FARC header");

        let mut farc = Farc {
            kind,
            alignment: 0,
            compressed: false,
            entries: Vec::new(),
            header_end,
        };

        match kind {
            FarcKind::Full => farc.parse_full(&mut c)?,
            FarcKind::Legacy => farc.parse_legacy(&mut c)?,
            FarcKind::Minimal => farc.parse_minimal(&mut c)?,
        }

        Ok(farc)
    }

    fn parse_full(&mut self, c: &mut Cursor<'_>) -> Result<()> {
        let flags = c.read_u32()?;
        let _reserved = c.read_u32()?;
        self.alignment = c.read_u32()?;
        self.compressed = flags & 2 != 0;
        let encrypted = flags & 4 != 0;
        debug!(
            compressed = self.compressed,
            encrypted,
            alignment = self.alignment,
            "FARC flags"
        );
        if encrypted {
            return Err(Error::UnsupportedFeature("encrypted FARC archive"));
        }

        let entry_padding = c.read_u32()? as usize;
        let header_padding = c.read_u32()? as usize;
        c.skip(header_padding)?;

        let compressed = self.compressed;
        self.entries = read_table(c, self.header_end, |c| {
            let name = c.read_cstring()?;
            let offset = c.read_u32()?;
            let compressed_size = c.read_u32()?;
            let uncompressed_size = c.read_u32()?;
            c.skip(entry_padding)?;
            Ok(FarcEntry {
                name,
                offset,
                compressed_size,
                uncompressed_size,
                is_compressed: compressed && compressed_size != uncompressed_size,
            })
        })?;
        Ok(())
    }

    fn parse_legacy(&mut self, c: &mut Cursor<'_>) -> Result<()> {
        self.alignment = c.read_u32()?;
        self.entries = read_table(c, self.header_end, |c| {
            let name = c.read_cstring()?;
            let offset = c.read_u32()?;
            let compressed_size = c.read_u32()?;
            let mut uncompressed_size = c.read_u32()?;
            let is_compressed = uncompressed_size != 0 && compressed_size != uncompressed_size;
            if uncompressed_size == 0 {
                uncompressed_size = compressed_size;
            }
            Ok(FarcEntry {
                name,
                offset,
                compressed_size,
                uncompressed_size,
                is_compressed,
            })
        })?;
        Ok(())
    }

    fn parse_minimal(&mut self, c: &mut Cursor<'_>) -> Result<()> {
        self.alignment = c.read_u32()?;
        self.entries = read_table(c, self.header_end, |c| {
            let name = c.read_cstring()?;
            let offset = c.read_u32()?;
            let size = c.read_u32()?;
            Ok(FarcEntry {
                name,
                offset,
                compressed_size: size,
                uncompressed_size: size,
                is_compressed: false,
            })
        })?;
        Ok(())
    }

    /// Find an entry by its exact name.
    pub fn get_entry_by_name(&self, name: &str) -> Option<&FarcEntry> {
        self.entries.iter().find(|e| e.name == name)
    }
}

/// Read entries until the cursor sits exactly on `header_end`.
fn read_table(
    c: &mut Cursor<'_>,
    header_end: usize,
    mut read_entry: impl FnMut(&mut Cursor<'_>) -> Result<FarcEntry>,
) -> Result<Vec<FarcEntry>> {
    if c.position() > header_end {
        return Err(Error::MalformedHeader("FARC header fields overrun header size"));
    }

    let mut entries = Vec::new();
    while c.position() < header_end {
        let entry = read_entry(c)?;
        if c.position() > header_end {
            return Err(Error::MalformedHeader("FARC entry overruns header size"));
        }
        debug!(
            name = %entry.name,
            offset = entry.offset,
            compressed_size = entry.compressed_size,
            uncompressed_size = entry.uncompressed_size,
            is_compressed = entry.is_compressed,
            "FARC entry"
        );
        entries.push(entry);
    }
    Ok(entries)
}

/// Result of [`FarcReader::extract_all`].
#[derive(Debug, Default)]
pub struct Extracted {
    /// `(name, payload)` for every entry that could be read.
    pub files: Vec<(String, Vec<u8>)>,
    /// Entries whose stored bytes lay outside the buffer.
    pub failed: usize,
}

/// Parsed [`Farc`] together with the buffer it was parsed from.
pub struct FarcReader<'a> {
    data: &'a [u8],
    /// Parsed metadata.
    pub farc: Farc,
}

impl<'a> FarcReader<'a> {
    /// Parse a FARC archive and keep the buffer for extraction.
    pub fn new(data: &'a [u8]) -> Result<Self> {
        let farc = Farc::parse(data)?;
        Ok(Self { data, farc })
    }

    /// Iterate over all entries in table order.
    pub fn entries(&self) -> impl Iterator<Item = &FarcEntry> {
        self.farc.entries.iter()
    }

    /// Find an entry by name. Returns [`None`] if not found.
    pub fn get_entry_by_name(&self, name: &str) -> Option<&FarcEntry> {
        self.farc.get_entry_by_name(name)
    }

    /// The entry's bytes exactly as stored.
    pub fn raw_entry(&self, entry: &FarcEntry) -> Result<&'a [u8]> {
        let mut c = Cursor::new(self.data);
        c.seek(entry.offset as usize);
        c.read_bytes(entry.compressed_size as usize)
    }

    /// Read an entry, decompressing it if it is flagged compressed.
    ///
    /// A payload that fails to decompress is logged and returned as stored;
    /// only a short read is an error.
    pub fn extract(&self, entry: &FarcEntry) -> Result<Vec<u8>> {
        let raw = self.raw_entry(entry)?;
        if !entry.is_compressed {
            return Ok(raw.to_vec());
        }

        #[cfg(feature = "compression")]
        {
            let hint = (entry.uncompressed_size as usize).min(PREALLOC_LIMIT);
            match crate::compression::gzip::decompress_gzip_with_size(raw, hint) {
                Ok(data) => Ok(data),
                Err(e) => {
                    warn!(entry = %entry.name, "{e}; keeping stored bytes");
                    Ok(raw.to_vec())
                }
            }
        }

        #[cfg(not(feature = "compression"))]
        {
            warn!(entry = %entry.name, "compression support disabled; keeping stored bytes");
            Ok(raw.to_vec())
        }
    }

    /// Extract every entry, skipping (and counting) the ones that cannot be
    /// read.
    pub fn extract_all(&self) -> Extracted {
        let mut out = Extracted::default();
        for entry in self.entries() {
            match self.extract(entry) {
                Ok(data) => out.files.push((entry.name.clone(), data)),
                Err(e) => {
                    warn!(entry = %entry.name, "failed to extract: {e}");
                    out.failed += 1;
                }
            }
        }
        info!(
            extracted = out.files.len(),
            failed = out.failed,
            "FARC extraction finished"
        );
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn push_entry(buf: &mut Vec<u8>, name: &str, fields: &[u32]) {
        buf.extend_from_slice(name.as_bytes());
        buf.push(0);
        for f in fields {
            buf.extend_from_slice(&f.to_be_bytes());
        }
    }

    /// Assemble `tag | size | prelude | table`, fixing up the size field.
    fn archive(tag: &[u8; 4], prelude: &[u32], table: &[u8]) -> Vec<u8> {
        let mut buf = tag.to_vec();
        buf.extend_from_slice(&[0; 4]);
        for f in prelude {
            buf.extend_from_slice(&f.to_be_bytes());
        }
        buf.extend_from_slice(table);
        let size = (buf.len() - HEADER_SIZE_BIAS) as u32;
        buf[4..8].copy_from_slice(&size.to_be_bytes());
        buf
    }

    #[test]
    fn minimal_entries_extract_raw() {
        let mut table = Vec::new();
        push_entry(&mut table, "a.bin", &[16, 8]);
        push_entry(&mut table, "b.bin", &[24, 4]);
        let data = archive(b"FArc", &[16], &table);

        let reader = FarcReader::new(&data).unwrap();
        assert_eq!(reader.farc.kind, FarcKind::Minimal);
        assert_eq!(reader.farc.alignment, 16);
        let names: Vec<_> = reader.entries().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["a.bin", "b.bin"]);

        let a = reader.extract(reader.get_entry_by_name("a.bin").unwrap()).unwrap();
        let b = reader.extract(reader.get_entry_by_name("b.bin").unwrap()).unwrap();
        assert_eq!(a, &data[16..24]);
        assert_eq!(b, &data[24..28]);
        assert!(reader.entries().all(|e| !e.is_compressed));
    }

    #[test]
    fn legacy_zero_uncompressed_size_means_raw() {
        let mut table = Vec::new();
        push_entry(&mut table, "raw.spr", &[0, 12, 0]);
        push_entry(&mut table, "packed.spr", &[0, 12, 40]);
        push_entry(&mut table, "same.spr", &[0, 12, 12]);
        let farc = Farc::parse(&archive(b"FArC", &[1], &table)).unwrap();

        let raw = &farc.entries[0];
        assert!(!raw.is_compressed);
        assert_eq!(raw.uncompressed_size, 12);
        assert!(farc.entries[1].is_compressed);
        assert!(!farc.entries[2].is_compressed);
    }

    #[test]
    fn full_variant_honours_flags_and_padding() {
        let mut table = Vec::new();
        push_entry(&mut table, "spr_test.bin", &[0, 10, 20]);
        table.extend_from_slice(&[0xEE; 4]);
        push_entry(&mut table, "plain.bin", &[0, 10, 10]);
        table.extend_from_slice(&[0xEE; 4]);
        let mut prelude_table = vec![0xCC; 2];
        prelude_table.extend_from_slice(&table);
        let data = archive(b"FARC", &[2, 0, 16, 4, 2], &prelude_table);

        let farc = Farc::parse(&data).unwrap();
        assert!(farc.compressed);
        assert_eq!(farc.entries.len(), 2);
        assert!(farc.entries[0].is_compressed);
        assert!(!farc.entries[1].is_compressed);
    }

    #[test]
    fn encrypted_archive_is_rejected() {
        let data = archive(b"FARC", &[4, 0, 16, 0, 0], &[]);
        assert!(matches!(
            Farc::parse(&data),
            Err(Error::UnsupportedFeature(_))
        ));
    }

    #[test]
    fn entry_crossing_header_boundary_is_malformed() {
        let mut table = Vec::new();
        push_entry(&mut table, "x", &[0, 1]);
        let mut data = archive(b"FArc", &[0], &table);
        // Shrink the declared table by two bytes, keeping the buffer intact.
        let size = u32::from_be_bytes(data[4..8].try_into().unwrap()) - 2;
        data[4..8].copy_from_slice(&size.to_be_bytes());
        assert!(matches!(
            Farc::parse(&data),
            Err(Error::MalformedHeader(_))
        ));
    }

    #[test]
    fn unknown_tag_is_malformed() {
        let data = archive(b"SARC", &[0], &[]);
        assert!(matches!(
            Farc::parse(&data),
            Err(Error::MalformedHeader("unknown FARC tag"))
        ));
    }

    #[test]
    fn header_size_past_buffer_is_eof() {
        let mut data = archive(b"FArc", &[0], &[]);
        data[4..8].copy_from_slice(&0x1000u32.to_be_bytes());
        assert!(matches!(Farc::parse(&data), Err(Error::UnexpectedEof)));
    }

    #[test]
    fn bad_compressed_payload_falls_back_to_raw() {
        let mut table = Vec::new();
        push_entry(&mut table, "broken", &[0, 6, 100]);
        let mut data = archive(b"FArC", &[0], &table);
        let offset = data.len() as u32;
        data.extend_from_slice(b"nogzip");
        let at = data.len() - 6 - 12;
        data[at..at + 4].copy_from_slice(&offset.to_be_bytes());

        let reader = FarcReader::new(&data).unwrap();
        let entry = &reader.farc.entries[0];
        assert!(entry.is_compressed);
        assert_eq!(reader.extract(entry).unwrap(), b"nogzip");
    }

    #[test]
    fn out_of_bounds_entry_counts_as_failed() {
        let mut table = Vec::new();
        push_entry(&mut table, "ok", &[0, 4]);
        push_entry(&mut table, "gone", &[0x1000, 4]);
        let data = archive(b"FArc", &[0], &table);

        let out = FarcReader::new(&data).unwrap().extract_all();
        assert_eq!(out.files.len(), 1);
        assert_eq!(out.files[0].0, "ok");
        assert_eq!(out.failed, 1);
    }
}
