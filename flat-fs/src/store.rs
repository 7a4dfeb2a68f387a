//! # Block store
//!
//! The whole image lives in memory as one contiguous buffer of `capacity`
//! blocks. Every other layer reaches blocks through [`BlockStore::map`] and
//! [`BlockStore::map_mut`], which check the block number against the
//! capacity before handing out a slice.
//!
//! Nothing here is written back on its own; the persistence layer copies the
//! buffer to the backing device when asked.

use crate::layout::BlockId;
use crate::{FsError, Result, BLOCK_SIZE};

#[derive(Debug)]
pub struct BlockStore {
    data: Box<[u8]>,
    capacity: usize,
}

impl BlockStore {
    /// A zeroed store of `capacity` blocks.
    pub fn new(capacity: usize) -> Self {
        Self {
            data: vec![0; capacity * BLOCK_SIZE].into_boxed_slice(),
            capacity,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn block(&self, id: BlockId) -> Result<&[u8]> {
        let range = self.range(id)?;
        Ok(&self.data[range])
    }

    pub fn block_mut(&mut self, id: BlockId) -> Result<&mut [u8]> {
        let range = self.range(id)?;
        Ok(&mut self.data[range])
    }

    #[inline]
    pub fn map<V>(&self, id: BlockId, f: impl FnOnce(&[u8]) -> V) -> Result<V> {
        self.block(id).map(f)
    }

    #[inline]
    pub fn map_mut<V>(&mut self, id: BlockId, f: impl FnOnce(&mut [u8]) -> V) -> Result<V> {
        self.block_mut(id).map(f)
    }

    pub fn zero(&mut self, id: BlockId) -> Result<()> {
        self.map_mut(id, |block| block.fill(0))
    }

    /// Raw image bytes, in block order.
    #[cfg(test)]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    fn range(&self, id: BlockId) -> Result<core::ops::Range<usize>> {
        if id.index() >= self.capacity {
            return Err(FsError::OutOfBounds {
                what: "block",
                index: id.index() as u64,
            });
        }
        let start = id.index() * BLOCK_SIZE;
        Ok(start..start + BLOCK_SIZE)
    }
}
