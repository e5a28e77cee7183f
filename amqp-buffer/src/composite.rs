use std::collections::HashSet;

use bytes::Bytes;

use crate::chunk::Chunk;
use crate::error::{Error, Result};

/// A buffer whose storage is an ordered sequence of [`Chunk`] constituents,
/// presenting a single logical byte sequence with one read cursor and one
/// write cursor projected across all of them.
///
/// Invariants maintained by every method on this type:
/// - constituents are unique by identity ([`Chunk::id`]);
/// - no "write gap": once a constituent has writable bytes remaining, no
///   later constituent may have a non-zero write offset;
/// - no "read gap": the analogous condition for the read cursor;
/// - the read cursor never passes the write cursor.
#[derive(Debug, Default)]
pub struct CompositeBuffer {
    constituents: Vec<Chunk>,
    ids: HashSet<u64>,
}

impl CompositeBuffer {
    /// An empty composite buffer.
    pub fn new() -> Self {
        Self {
            constituents: Vec::new(),
            ids: HashSet::new(),
        }
    }

    /// Appends a constituent buffer. Rejects a chunk that is already a
    /// constituent (by identity) or whose write offset would create a write
    /// gap with the existing tail.
    pub fn append(&mut self, chunk: Chunk) -> Result<()> {
        if !self.ids.insert(chunk.id()) {
            return Err(Error::DuplicateConstituent);
        }
        if let Some(last) = self.constituents.last() {
            if last.writable() > 0 && chunk.write_offset() > 0 {
                self.ids.remove(&chunk.id());
                return Err(Error::StructuralViolation);
            }
        }
        self.constituents.push(chunk);
        Ok(())
    }

    /// The constituent chunks, in order.
    pub fn decompose(self) -> Vec<Chunk> {
        self.constituents
    }

    /// Drops fully-read leading constituents, freeing their storage.
    pub fn reclaim(&mut self) {
        while matches!(self.constituents.first(), Some(c) if c.is_fully_read() && c.writable() == 0)
        {
            let dropped = self.constituents.remove(0);
            self.ids.remove(&dropped.id());
        }
    }

    /// Sum of every constituent's capacity.
    pub fn capacity(&self) -> usize {
        self.constituents.iter().map(|c| c.capacity()).sum()
    }

    /// Bytes available to read across all constituents.
    pub fn readable(&self) -> usize {
        self.constituents.iter().map(|c| c.readable()).sum()
    }

    /// Bytes available to write before every constituent reaches capacity.
    pub fn writable(&self) -> usize {
        self.constituents.iter().map(|c| c.writable()).sum()
    }

    /// Makes sure at least `n` more bytes can be written, allocating a new
    /// tail constituent if compacting the existing ones is not enough.
    pub fn ensure_writable(&mut self, n: usize) {
        self.reclaim();
        if self.writable() >= n {
            return;
        }
        let shortfall = n - self.writable();
        self.constituents
            .push(Chunk::allocate_with_capacity(shortfall.max(256)));
    }

    /// Reads `len` bytes, advancing the read cursor across as many
    /// constituents as necessary.
    pub fn read_bytes(&mut self, len: usize) -> Result<Bytes> {
        if len > self.readable() {
            return Err(Error::out_of_range(len, self.readable()));
        }
        let mut out = Vec::with_capacity(len);
        let mut remaining = len;
        for chunk in self.constituents.iter_mut() {
            if remaining == 0 {
                break;
            }
            let take = remaining.min(chunk.readable());
            if take == 0 {
                continue;
            }
            out.extend_from_slice(chunk.peek(take)?);
            chunk.advance_read(take)?;
            remaining -= take;
        }
        Ok(Bytes::from(out))
    }

    /// Writes a byte slice, spilling into newly allocated constituents as
    /// needed.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.ensure_writable(bytes.len());
        let mut remaining = bytes;
        for chunk in self.constituents.iter_mut() {
            if remaining.is_empty() {
                break;
            }
            let take = remaining.len().min(chunk.writable());
            if take == 0 {
                continue;
            }
            chunk.write_bytes(&remaining[..take])?;
            remaining = &remaining[take..];
        }
        if !remaining.is_empty() {
            // ensure_writable guarantees this cannot happen; defensive only.
            return Err(Error::CapacityOverflow);
        }
        Ok(())
    }

    /// True once every constituent has been fully read.
    pub fn is_empty(&self) -> bool {
        self.readable() == 0
    }

    /// Number of constituent chunks currently held.
    pub fn constituent_count(&self) -> usize {
        self.constituents.len()
    }
}
