//! **divakit** - a library for recovering sprites and textures from FARC
//! archives and TXP/SPR sprite databases.
//!
//! # Supported formats
//! | Module | Format |
//! |--------|--------|
//! | [`formats::farc`] | FARC / FArC / FArc - named-blob archive |
//! | [`formats::txp`]  | TXP - texture sets, textures and mip/array sub-images |
//! | [`formats::spr`]  | SPR - sprite rectangles bound to an embedded texture set |
//!
//! # Pipeline
//! 1. [`formats::farc::FarcReader`] opens the archive and extracts the
//!    sprite database (gzip-decompressed with the `compression` feature).
//! 2. [`formats::spr::SpriteSet::parse`] decodes the sprite set and its
//!    texture set. Loose texture files go through
//!    [`formats::txp::Block::read_root`], and [`scan::recover`] falls back
//!    to signature scanning when the start of the file is unreadable.
//! 3. [`sprite::SpriteExporter`] decodes each referenced texture once and
//!    crops every sprite out of it.

pub mod compression;
pub mod cursor;
pub mod error;
pub mod formats;
pub mod scan;
pub mod sprite;

pub use error::{Error, Result};
