//! The write head ([`Cursor`]) and read head ([`Chunk`]) the serialize and
//! deserialize engines walk a layout with.
//!
//! A `serialize` or `deserialize` call owns its cursor/chunk exclusively for
//! its duration; the byte buffer is the only mutable state involved, and it
//! belongs to the caller (see the base spec's §5).

use crate::error::Error;

/// A mutable write head into a pre-sized buffer.
pub struct Cursor<'a> {
    pub buffer: &'a mut [u8],
    pub offset: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(buffer: &'a mut [u8]) -> Cursor<'a> {
        Cursor { buffer, offset: 0 }
    }

    /// Writes `bytes` at the current offset and advances past them.
    pub fn put(&mut self, bytes: &[u8]) {
        let end = self.offset + bytes.len();
        self.buffer[self.offset..end].copy_from_slice(bytes);
        self.offset = end;
    }

    /// Reserves `n` zero-filled bytes at the current offset (e.g. for a
    /// length prefix to be patched in later) and returns where they start.
    pub fn reserve(&mut self, n: usize) -> usize {
        let at = self.offset;
        self.offset += n;
        at
    }

    /// Overwrites `bytes` at an already-visited offset without moving the cursor.
    pub fn patch(&mut self, at: usize, bytes: &[u8]) {
        let end = at + bytes.len();
        self.buffer[at..end].copy_from_slice(bytes);
    }
}

/// An immutable read head bounded to `[offset, end)` within `buffer`.
#[derive(Clone, Copy)]
pub struct Chunk<'a> {
    pub buffer: &'a [u8],
    pub offset: usize,
    pub end: usize,
}

impl<'a> Chunk<'a> {
    pub fn new(buffer: &'a [u8]) -> Chunk<'a> {
        Chunk {
            buffer,
            offset: 0,
            end: buffer.len(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.end - self.offset
    }

    /// Reads and consumes the next `n` bytes, or fails with `Truncated`.
    pub fn advance(&mut self, n: usize) -> Result<&'a [u8], Error> {
        if self.offset + n > self.end {
            return Err(Error::Truncated {
                requested: n,
                remaining: self.remaining(),
            });
        }
        let slice = &self.buffer[self.offset..self.offset + n];
        self.offset += n;
        Ok(slice)
    }

    /// Carves a sub-chunk of exactly `len` bytes starting at the current
    /// offset, without advancing `self`; the caller advances `self` by `len`
    /// once the sub-chunk has been fully consumed (see the base spec's §4.E
    /// on carving a sub-chunk for a `bytes`-with-nested-layout item).
    pub fn sub_chunk(&self, len: usize) -> Result<Chunk<'a>, Error> {
        if self.offset + len > self.end {
            return Err(Error::Truncated {
                requested: len,
                remaining: self.remaining(),
            });
        }
        Ok(Chunk {
            buffer: self.buffer,
            offset: self.offset,
            end: self.offset + len,
        })
    }
}
