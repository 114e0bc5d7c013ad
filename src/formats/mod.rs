//! Parsers for the sprite database binary formats.
//!
//! Each submodule targets one format family. All parsers follow the same
//! conventions:
//!
//! * **Whole-buffer input** - parsers read from a [`crate::cursor::Cursor`]
//!   over a byte slice that holds the entire file. Nothing is streamed.
//! * **No panics on bad data** - every offset and count is checked against
//!   the buffer before it is followed or allocated for.
//! * **Reader wrappers** - the archive format ([`farc::Farc`]) has a
//!   matching [`farc::FarcReader`] that keeps the buffer and hands out
//!   entry payloads.
//! * **Compression is separate** - TXP/SPR parsers receive decompressed
//!   bytes; archive entries are inflated through [`crate::compression`].
//!
//! ## Format overview
//!
//! | Module   | Format | Description |
//! |----------|--------|-------------|
//! | [`farc`] | FARC   | Archive of named, optionally gzip-compressed blobs (big-endian header) |
//! | [`txp`]  | TXP    | Offset-addressed texture set / texture / sub-texture blocks, either byte order |
//! | [`spr`]  | SPR    | Sprite set: sprite rectangles, names and an embedded TXP texture set |

pub mod farc;
pub mod spr;
pub mod txp;
