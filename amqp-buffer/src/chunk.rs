use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;

use crate::error::{Error, Result};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn next_id() -> u64 {
    NEXT_ID.fetch_add(1, Ordering::Relaxed)
}

/// A single contiguous allocation with independent read and write cursors.
///
/// Invariant: `read_offset <= write_offset <= capacity` always holds.
#[derive(Debug)]
pub struct Chunk {
    id: u64,
    storage: Vec<u8>,
    read_offset: usize,
    write_offset: usize,
}

impl Clone for Chunk {
    /// A clone is a distinct buffer: it gets a fresh identity so a composite
    /// buffer cannot mistake it for the buffer it was cloned from.
    fn clone(&self) -> Self {
        Self {
            id: next_id(),
            storage: self.storage.clone(),
            read_offset: self.read_offset,
            write_offset: self.write_offset,
        }
    }
}

impl Chunk {
    /// Identity used by composite buffers to reject duplicate constituents.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Allocates a chunk with a small default capacity.
    pub fn allocate() -> Self {
        Self::allocate_with_capacity(256)
    }

    /// Allocates a chunk with the given capacity. The chunk starts empty:
    /// nothing has been written, so nothing can be read yet.
    pub fn allocate_with_capacity(capacity: usize) -> Self {
        Self {
            id: next_id(),
            storage: vec![0u8; capacity],
            read_offset: 0,
            write_offset: 0,
        }
    }

    /// Wraps an existing byte vector as a chunk whose writable region is
    /// already fully written (`write_offset == capacity`) and whose readable
    /// region starts at offset 0. This is the entry point for bytes arriving
    /// from a transport.
    pub fn wrap(bytes: impl Into<Vec<u8>>) -> Self {
        let storage = bytes.into();
        let write_offset = storage.len();
        Self {
            id: next_id(),
            storage,
            read_offset: 0,
            write_offset,
        }
    }

    /// Total addressable capacity.
    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// Current read cursor.
    pub fn read_offset(&self) -> usize {
        self.read_offset
    }

    /// Current write cursor.
    pub fn write_offset(&self) -> usize {
        self.write_offset
    }

    /// Bytes available to read.
    pub fn readable(&self) -> usize {
        self.write_offset - self.read_offset
    }

    /// Bytes available to write before reaching capacity.
    pub fn writable(&self) -> usize {
        self.capacity() - self.write_offset
    }

    /// A slice over the currently readable region.
    pub fn readable_slice(&self) -> &[u8] {
        &self.storage[self.read_offset..self.write_offset]
    }

    /// A mutable slice over the currently writable region.
    pub fn writable_slice_mut(&mut self) -> &mut [u8] {
        let write_offset = self.write_offset;
        &mut self.storage[write_offset..]
    }

    /// Advances the read cursor by `n` bytes.
    pub fn advance_read(&mut self, n: usize) -> Result<()> {
        if n > self.readable() {
            return Err(Error::out_of_range(self.read_offset + n, self.write_offset));
        }
        self.read_offset += n;
        Ok(())
    }

    /// Advances the write cursor by `n` bytes, marking that range as readable.
    pub fn advance_write(&mut self, n: usize) -> Result<()> {
        if n > self.writable() {
            return Err(Error::out_of_range(self.write_offset + n, self.capacity()));
        }
        self.write_offset += n;
        Ok(())
    }

    /// Reads `len` bytes without consuming them.
    pub fn peek(&self, len: usize) -> Result<&[u8]> {
        if len > self.readable() {
            return Err(Error::out_of_range(self.read_offset + len, self.write_offset));
        }
        Ok(&self.storage[self.read_offset..self.read_offset + len])
    }

    /// Reads `len` bytes, advancing the read cursor.
    pub fn read_bytes(&mut self, len: usize) -> Result<Bytes> {
        let slice = self.peek(len)?;
        let out = Bytes::copy_from_slice(slice);
        self.read_offset += len;
        Ok(out)
    }

    /// Writes a byte slice, advancing the write cursor.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        if bytes.len() > self.writable() {
            return Err(Error::out_of_range(
                self.write_offset + bytes.len(),
                self.capacity(),
            ));
        }
        let start = self.write_offset;
        self.storage[start..start + bytes.len()].copy_from_slice(bytes);
        self.write_offset += bytes.len();
        Ok(())
    }

    /// Fills the remaining writable region with `byte`, advancing the write
    /// cursor to capacity.
    pub fn fill(&mut self, byte: u8) {
        let start = self.write_offset;
        let cap = self.capacity();
        self.storage[start..cap].fill(byte);
        self.write_offset = cap;
    }

    /// Splits this chunk at `offset` (relative to the start of the buffer,
    /// not the read cursor). The returned chunk owns `[0, offset)`; `self`
    /// is rebased to own `[offset, capacity)` with cursors shifted down by
    /// `offset`. Bit-exact: every byte ends up in exactly one of the two
    /// halves.
    pub fn split_at(&mut self, offset: usize) -> Result<Chunk> {
        if offset > self.capacity() {
            return Err(Error::out_of_range(offset, self.capacity()));
        }
        let tail = self.storage.split_off(offset);
        let head_storage = std::mem::replace(&mut self.storage, tail);

        let head = Chunk {
            id: next_id(),
            storage: head_storage,
            read_offset: self.read_offset.min(offset),
            write_offset: self.write_offset.min(offset),
        };

        self.read_offset = self.read_offset.saturating_sub(offset);
        self.write_offset = self.write_offset.saturating_sub(offset);

        Ok(head)
    }

    /// Copies out the byte range `[start, end)` without moving any cursor.
    pub fn copy_range(&self, start: usize, end: usize) -> Result<Bytes> {
        if start > end || end > self.capacity() {
            return Err(Error::out_of_range(end, self.capacity()));
        }
        Ok(Bytes::copy_from_slice(&self.storage[start..end]))
    }

    /// Drops the fully-read prefix, shifting remaining bytes (and both
    /// cursors) down to offset 0. Does not change capacity.
    pub fn compact(&mut self) {
        if self.read_offset == 0 {
            return;
        }
        self.storage.copy_within(self.read_offset..self.write_offset, 0);
        self.write_offset -= self.read_offset;
        self.read_offset = 0;
    }

    /// Grows capacity so at least `n` more bytes can be written, compacting
    /// the fully-read prefix first if that alone makes enough room.
    pub fn ensure_writable(&mut self, n: usize) {
        if self.writable() >= n {
            return;
        }
        self.compact();
        if self.writable() >= n {
            return;
        }
        let additional = n - self.writable();
        self.storage.resize(self.capacity() + additional, 0);
    }

    /// True once every written byte has also been read.
    pub fn is_fully_read(&self) -> bool {
        self.read_offset == self.write_offset
    }
}
