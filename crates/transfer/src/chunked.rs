use std::iter::FusedIterator;
use std::ops::Range;

use crate::TransferError;

/// A chunk of payload data read for transmission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Byte offset of the first byte within the payload.
    pub offset: u64,
    /// Raw chunk data.
    pub data: Vec<u8>,
}

impl Chunk {
    pub fn len(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Offset one past the last byte of this chunk.
    pub fn end(&self) -> u64 {
        self.offset + self.len()
    }
}

// ---------------------------------------------------------------------------
// ChunkPlan
// ---------------------------------------------------------------------------

/// Partition of `[0, total)` into ranges of `chunk_size` bytes.
///
/// Every range is `chunk_size` long except the last, which holds the
/// remainder. Enumeration can restart from any offset up to `total`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPlan {
    total: u64,
    chunk_size: u64,
}

impl ChunkPlan {
    /// Creates a plan. A zero `chunk_size` is rejected.
    pub fn new(total: u64, chunk_size: u64) -> Result<Self, TransferError> {
        if chunk_size == 0 {
            return Err(TransferError::InvalidChunkSize(chunk_size));
        }
        Ok(Self { total, chunk_size })
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    /// Number of ranges covering the whole payload.
    pub fn chunk_count(&self) -> u64 {
        self.total.div_ceil(self.chunk_size)
    }

    /// All ranges, starting at offset 0.
    pub fn ranges(&self) -> ChunkRanges {
        ChunkRanges {
            next: 0,
            total: self.total,
            chunk_size: self.chunk_size,
        }
    }

    /// Ranges starting at `offset` (a resume point).
    pub fn ranges_from(&self, offset: u64) -> Result<ChunkRanges, TransferError> {
        if offset > self.total {
            return Err(TransferError::OffsetOutOfRange {
                offset,
                total: self.total,
            });
        }
        Ok(ChunkRanges {
            next: offset,
            total: self.total,
            chunk_size: self.chunk_size,
        })
    }

    /// The single range beginning at `offset`, or `None` once `offset`
    /// reaches the total length.
    pub fn range_at(&self, offset: u64) -> Option<Range<u64>> {
        self.ranges_from(offset).ok()?.next()
    }
}

/// Lazy iterator over the byte ranges of a [`ChunkPlan`].
#[derive(Debug, Clone)]
pub struct ChunkRanges {
    next: u64,
    total: u64,
    chunk_size: u64,
}

impl Iterator for ChunkRanges {
    type Item = Range<u64>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.total {
            return None;
        }
        let start = self.next;
        let end = start.saturating_add(self.chunk_size).min(self.total);
        self.next = end;
        Some(start..end)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.total.saturating_sub(self.next).div_ceil(self.chunk_size);
        let n = usize::try_from(remaining).unwrap_or(usize::MAX);
        (n, Some(n))
    }
}

impl ExactSizeIterator for ChunkRanges {}

impl FusedIterator for ChunkRanges {}
