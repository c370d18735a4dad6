//! Copying between exchange sequences and caller-owned fixed memory.
//!
//! Every copy checks the destination up front and writes nothing when it is
//! too small, so a failed call never leaves half-filled caller memory.

use crate::error::{ExchangeError, Result};

/// Copy all of `src` into the front of `dest`.
///
/// Returns the number of elements copied; `0` when `src` is empty.
pub fn copy_into<T: Copy>(src: &[T], dest: &mut [T]) -> Result<usize> {
    if src.is_empty() {
        return Ok(0);
    }
    if dest.len() < src.len() {
        return Err(ExchangeError::BufferTooSmall {
            needed: src.len(),
            capacity: dest.len(),
        });
    }
    dest[..src.len()].copy_from_slice(src);
    Ok(src.len())
}

/// One caller-owned character buffer receiving a NUL-terminated string.
#[derive(Debug)]
pub struct TextSlot<'a> {
    buf: &'a mut [u8],
    written: usize,
}

impl<'a> TextSlot<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, written: 0 }
    }

    /// Bytes available in the slot, terminator included.
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Length written by the last fill, terminator included. `0` if unfilled.
    pub fn written_len(&self) -> usize {
        self.written
    }

    /// The part of `text` a C reader sees: everything before the first NUL.
    fn visible(text: &str) -> &[u8] {
        let bytes = text.as_bytes();
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        &bytes[..end]
    }

    fn required(text: &str) -> usize {
        Self::visible(text).len() + 1
    }

    fn fill(&mut self, text: &str) {
        let bytes = Self::visible(text);
        self.buf[..bytes.len()].copy_from_slice(bytes);
        self.buf[bytes.len()] = 0;
        self.written = bytes.len() + 1;
    }
}

/// Copy strings into caller slots, one string per slot.
///
/// A string with an embedded NUL is cut at the first one.
///
/// Fails with `BufferTooSmall` before writing anything if there are fewer
/// slots than strings or any string (plus its terminator) overflows its slot.
pub fn copy_texts_into<S: AsRef<str>>(src: &[S], dest: &mut [TextSlot<'_>]) -> Result<usize> {
    if src.is_empty() {
        return Ok(0);
    }
    if dest.len() < src.len() {
        return Err(ExchangeError::BufferTooSmall {
            needed: src.len(),
            capacity: dest.len(),
        });
    }
    for (text, slot) in src.iter().zip(dest.iter()) {
        let needed = TextSlot::required(text.as_ref());
        if needed > slot.capacity() {
            return Err(ExchangeError::BufferTooSmall {
                needed,
                capacity: slot.capacity(),
            });
        }
    }
    for (text, slot) in src.iter().zip(dest.iter_mut()) {
        slot.fill(text.as_ref());
    }
    Ok(src.len())
}

/// Read a caller string: stops at the first NUL, invalid UTF-8 is replaced.
pub fn text_from_bytes(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}
