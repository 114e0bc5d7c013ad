//! Library-wide error and result types.

use std::fmt;
use std::io;

/// Result alias used throughout divakit.
pub type Result<T> = std::result::Result<T, Error>;

/// All errors the library can produce.
///
/// Batch operations (archive extraction, signature scanning, sprite export)
/// catch these per item and keep going; single-structure parsers return them
/// to the caller.
#[derive(Debug)]
pub enum Error {
    /// A signature did not match in either byte order, or a header field is
    /// structurally impossible (message describes which one).
    MalformedHeader(&'static str),
    /// A read would run past the end of the buffer.
    UnexpectedEof,
    /// A null-terminated string had no null terminator within the buffer.
    UnterminatedString,
    /// The data uses a feature this parser deliberately does not handle.
    UnsupportedFeature(&'static str),
    /// A pixel decode was requested for a format id with no decoder.
    UnsupportedPixelFormat(u32),
    /// A sprite references a texture index past the end of the texture set.
    OutOfRangeReference {
        /// Texture index stored in the sprite record.
        index: u32,
        /// Number of textures actually parsed.
        count: usize,
    },
    /// An archive entry flagged as compressed failed to decompress.
    Decompression(io::Error),
    /// The pixel decoder rejected its input or returned a short buffer.
    PixelDecode(&'static str),
    /// A sprite rectangle cannot be cropped (non-finite or oversized).
    InvalidSprite(&'static str),
    /// An underlying I/O operation failed.
    Io(io::Error),
    /// Encoding or writing an image failed.
    Image(image::ImageError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::MalformedHeader(s) => write!(f, "malformed header: {s}"),
            Error::UnexpectedEof => write!(f, "unexpected end of data"),
            Error::UnterminatedString => write!(f, "unterminated string"),
            Error::UnsupportedFeature(s) => write!(f, "unsupported feature: {s}"),
            Error::UnsupportedPixelFormat(id) => write!(f, "unsupported pixel format: {id}"),
            Error::OutOfRangeReference { index, count } => {
                write!(f, "texture index {index} out of range ({count} textures)")
            }
            Error::Decompression(e) => write!(f, "decompression failed: {e}"),
            Error::PixelDecode(s) => write!(f, "pixel decode failed: {s}"),
            Error::InvalidSprite(s) => write!(f, "invalid sprite: {s}"),
            Error::Io(e) => write!(f, "I/O error: {e}"),
            Error::Image(e) => write!(f, "image error: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Decompression(e) | Error::Io(e) => Some(e),
            Error::Image(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<image::ImageError> for Error {
    fn from(e: image::ImageError) -> Self {
        Error::Image(e)
    }
}
