//! In-memory byte cursor shared by all parsers.
//!
//! Every read either returns exactly the bytes it promises or fails with
//! [`Error::UnexpectedEof`]; there is no partial-read ambiguity.
//!
//! Besides the read position the cursor carries two pieces of mutable state:
//!
//! * the current [`Endian`], which a parser may flip mid-stream when a
//!   signature only matches in the other byte order;
//! * a stack of *base offsets*. Structures in the TXP/SPR formats store
//!   child pointers as displacements from the start of the enclosing
//!   structure; a parser pushes that start when it enters the structure and
//!   pops it on the way out, and [`Cursor::read_at`] resolves offsets against
//!   the innermost base. The bottom of the stack is always `0`.

use tracing::debug;

use crate::{Error, Result};

/// Byte order used for multi-byte reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Endian {
    /// Least significant byte first. The default for TXP/SPR data.
    #[default]
    Little,
    /// Most significant byte first. Used by FARC headers.
    Big,
}

impl Endian {
    /// The opposite byte order.
    pub fn flipped(self) -> Self {
        match self {
            Endian::Little => Endian::Big,
            Endian::Big => Endian::Little,
        }
    }

    /// Decode a 32-bit word in this byte order.
    #[inline]
    pub fn u32_from(self, bytes: [u8; 4]) -> u32 {
        match self {
            Endian::Little => u32::from_le_bytes(bytes),
            Endian::Big => u32::from_be_bytes(bytes),
        }
    }

    /// Encode a 32-bit word in this byte order.
    #[inline]
    pub fn u32_to(self, value: u32) -> [u8; 4] {
        match self {
            Endian::Little => value.to_le_bytes(),
            Endian::Big => value.to_be_bytes(),
        }
    }
}

/// Reader over an immutable byte buffer.
#[derive(Debug, Clone)]
pub struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
    endian: Endian,
    bases: Vec<usize>,
}

impl<'a> Cursor<'a> {
    /// Little-endian cursor at position 0.
    pub fn new(data: &'a [u8]) -> Self {
        Self::with_endian(data, Endian::Little)
    }

    /// Cursor at position 0 with a fixed starting byte order.
    pub fn with_endian(data: &'a [u8], endian: Endian) -> Self {
        Self {
            data,
            pos: 0,
            endian,
            bases: vec![0],
        }
    }

    /// Absolute read position.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Move to an absolute position.
    ///
    /// Seeking past the end is allowed; the next read fails instead.
    pub fn seek(&mut self, pos: usize) {
        self.pos = pos;
    }

    /// Bytes left between the read position and the end of the buffer.
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    pub fn endian(&self) -> Endian {
        self.endian
    }

    pub fn set_endian(&mut self, endian: Endian) {
        self.endian = endian;
    }

    pub fn flip_endian(&mut self) {
        self.endian = self.endian.flipped();
    }

    /// The innermost base offset.
    pub fn base(&self) -> usize {
        self.bases.last().copied().unwrap_or(0)
    }

    /// Number of entries on the base stack, including the root `0`.
    pub fn base_depth(&self) -> usize {
        self.bases.len()
    }

    /// Push the current position as the new base.
    pub fn push_base(&mut self) {
        self.bases.push(self.pos);
    }

    /// Push an explicit base.
    pub fn push_base_at(&mut self, base: usize) {
        self.bases.push(base);
    }

    /// Pop the innermost base. The root base is never popped.
    pub fn pop_base(&mut self) -> Option<usize> {
        if self.bases.len() > 1 {
            self.bases.pop()
        } else {
            None
        }
    }

    /// Run `f` with `base` pushed, popping it again whether `f` succeeds or
    /// fails.
    pub fn with_base<T>(
        &mut self,
        base: usize,
        f: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        let depth = self.bases.len();
        self.push_base_at(base);
        let out = f(self);
        self.bases.truncate(depth);
        out
    }

    /// Fail unless at least `len` bytes remain.
    pub fn ensure(&self, len: usize) -> Result<()> {
        if self.remaining() < len {
            return Err(Error::UnexpectedEof);
        }
        Ok(())
    }

    /// Fail unless `count` 32-bit words remain. Used to bound table sizes
    /// before allocating for them.
    pub fn ensure_words(&self, count: usize) -> Result<()> {
        self.ensure(count.checked_mul(4).ok_or(Error::UnexpectedEof)?)
    }

    /// Read exactly `len` bytes, borrowing them from the buffer.
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(len).ok_or(Error::UnexpectedEof)?;
        let bytes = self.data.get(self.pos..end).ok_or(Error::UnexpectedEof)?;
        self.pos = end;
        Ok(bytes)
    }

    /// Skip `len` bytes.
    pub fn skip(&mut self, len: usize) -> Result<()> {
        self.read_bytes(len).map(|_| ())
    }

    /// Read exactly `N` bytes into a fixed-size array.
    #[inline]
    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut b = [0u8; N];
        b.copy_from_slice(self.read_bytes(N)?);
        Ok(b)
    }

    /// Read a `u32` in the current byte order.
    #[inline]
    pub fn read_u32(&mut self) -> Result<u32> {
        let b = self.read_array::<4>()?;
        Ok(self.endian.u32_from(b))
    }

    /// Read an `i32` in the current byte order.
    #[inline]
    pub fn read_i32(&mut self) -> Result<i32> {
        self.read_u32().map(|v| v as i32)
    }

    /// Read an IEEE-754 `f32` in the current byte order.
    #[inline]
    pub fn read_f32(&mut self) -> Result<f32> {
        self.read_u32().map(f32::from_bits)
    }

    /// Read a null-terminated string at the current position and advance
    /// past its terminator.
    pub fn read_cstring(&mut self) -> Result<String> {
        let (name, len) = null_string(self.data, self.pos)?;
        self.pos += len + 1;
        Ok(name)
    }

    /// Read a null-terminated string at an absolute position. The read
    /// position is left untouched.
    pub fn string_at(&self, pos: usize) -> Result<String> {
        null_string(self.data, pos).map(|(s, _)| s)
    }

    /// Absolute position of `offset` relative to the innermost base.
    pub fn resolve(&self, offset: u32) -> Result<usize> {
        self.base()
            .checked_add(offset as usize)
            .ok_or(Error::UnexpectedEof)
    }

    /// Decode a child structure through a base-relative offset.
    ///
    /// A zero offset means "absent" and yields `None` without reading.
    /// Otherwise the cursor jumps to `base + offset`, runs `decode` and
    /// returns to where it was, on success and on failure alike.
    pub fn read_at<T>(
        &mut self,
        offset: u32,
        decode: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<Option<T>> {
        if offset == 0 {
            return Ok(None);
        }
        let target = self.resolve(offset)?;
        let saved = self.pos;
        self.pos = target;
        let out = decode(self);
        self.pos = saved;
        out.map(Some)
    }

    /// Read a 4-byte signature and check it against `accepted`.
    ///
    /// On mismatch the byte order is flipped and the same four bytes are
    /// read again; a match in the flipped order leaves the cursor in that
    /// order for the rest of the parse. If neither order matches, the
    /// position and byte order are restored and
    /// [`Error::MalformedHeader`] is returned with `what` as the message.
    pub fn expect_magic(&mut self, accepted: &[u32], what: &'static str) -> Result<u32> {
        let start = self.pos;
        let sig = self.read_u32()?;
        if accepted.contains(&sig) {
            return Ok(sig);
        }

        self.flip_endian();
        self.pos = start;
        let flipped = self.read_u32()?;
        if accepted.contains(&flipped) {
            debug!("{what} matched after switching to {:?} at {start:#x}", self.endian);
            return Ok(flipped);
        }

        self.flip_endian();
        self.pos = start;
        debug!("{what} mismatch at {start:#x}: found {sig:#010X}");
        Err(Error::MalformedHeader(what))
    }
}

/// Extract a null-terminated UTF-8 string from `buf` at `offset`, returning
/// it together with its length in bytes (terminator excluded).
fn null_string(buf: &[u8], offset: usize) -> Result<(String, usize)> {
    let slice = buf.get(offset..).ok_or(Error::UnexpectedEof)?;
    let end = slice
        .iter()
        .position(|&b| b == 0)
        .ok_or(Error::UnterminatedString)?;
    Ok((String::from_utf8_lossy(&slice[..end]).into_owned(), end))
}
