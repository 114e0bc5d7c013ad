//! Decompression helpers (require the `compression` feature).
//!
//! Gated behind the `compression` Cargo feature (enabled by default) so the
//! parsers can be built without `flate2`:
//!
//! ```toml
//! [dependencies]
//! divakit = { version = "0.1", default-features = false }
//! ```
//!
//! Without the feature, [`crate::formats::farc::FarcReader::extract`] returns
//! compressed entries as stored and logs a warning.
//!
//! ## Submodules
//!
//! | Module | Algorithm | Typical use in divakit |
//! |--------|-----------|------------------------|
//! | [`gzip`] | Gzip (deflate) | FARC entries flagged as compressed |

#[cfg(feature = "compression")]
pub mod gzip;
