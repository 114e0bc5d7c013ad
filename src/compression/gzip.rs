//! Gzip decompression (requires the `compression` feature).
//!
//! FARC archives compress each entry independently as a single gzip member.
//! The stored uncompressed size is known from the entry table, so
//! [`decompress_gzip_with_size`] can pre-allocate the output.

#![cfg(feature = "compression")]

use std::io::Read;

use flate2::read::GzDecoder;

use crate::{Error, Result};

/// Decompress a complete gzip-compressed buffer.
///
/// Returns [`Error::Decompression`] on any decoder failure.
pub fn decompress_gzip(data: &[u8]) -> Result<Vec<u8>> {
    decompress_gzip_with_size(data, 0)
}

/// Decompress a gzip-compressed buffer when the decompressed size is known
/// ahead of time.
///
/// The size is only a capacity hint; a stream that inflates to a different
/// length is still returned in full.
pub fn decompress_gzip_with_size(data: &[u8], decompressed_size: usize) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(decompressed_size);
    GzDecoder::new(data)
        .read_to_end(&mut out)
        .map_err(Error::Decompression)?;
    Ok(out)
}
