//! # On-image data structures
//!
//! Image layout of flat-fs:
//! slot table | data region
//!
//! The slot table starts at byte 0 and fills `table_blocks` blocks. The data
//! region holds exactly one block per slot: slot `i` owns block
//! `table_blocks + i` while it is occupied, so an occupied slot never
//! records block 0.

mod slot;
pub use slot::{DiskSlot, SlotKind, NAME_MAX_LEN, SLOTS_PER_BLOCK, SLOT_SIZE};

/// Child list stored in a directory's data block
mod dir;
pub use dir::{DirBlock, DIR_CAPACITY};

use derive_more::{Display, From, Into};

use crate::BLOCK_SIZE;

/// Index of a slot in the slot table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, From, Into)]
#[repr(transparent)]
pub struct SlotId(u32);

/// Number of a block in the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, From, Into)]
#[repr(transparent)]
pub struct BlockId(u32);

impl SlotId {
    /// The root directory always lives here.
    pub const ROOT: Self = Self(0);

    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// A raw `next_slot` value: 0 ends the chain.
    #[inline]
    pub fn link(raw: u32) -> Option<Self> {
        (raw != 0).then_some(Self(raw))
    }
}

impl BlockId {
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Sizes of the image regions for a given slot count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    slots: u32,
    table_blocks: u32,
}

impl Geometry {
    pub fn new(slots: u32) -> Self {
        let table_blocks = (slots as usize * SLOT_SIZE).div_ceil(BLOCK_SIZE) as u32;
        Self {
            slots,
            table_blocks,
        }
    }

    /// Number of slots, which is also the number of data blocks.
    #[inline]
    pub fn slots(&self) -> u32 {
        self.slots
    }

    /// Blocks taken by the slot table.
    #[inline]
    pub fn table_blocks(&self) -> u32 {
        self.table_blocks
    }

    /// Total blocks in the image.
    #[inline]
    pub fn capacity(&self) -> usize {
        (self.table_blocks + self.slots) as usize
    }

    /// Length of the image in bytes.
    #[inline]
    pub fn image_len(&self) -> usize {
        self.capacity() * BLOCK_SIZE
    }

    /// The data block owned by `slot` while it is occupied.
    #[inline]
    pub fn data_block(&self, slot: SlotId) -> BlockId {
        BlockId(self.table_blocks + slot.0)
    }

    /// Where a slot record sits: **block id** and **offset inside the block**.
    #[inline]
    pub fn slot_pos(&self, slot: SlotId) -> (BlockId, usize) {
        let block = slot.index() / SLOTS_PER_BLOCK;
        let offset = slot.index() % SLOTS_PER_BLOCK * SLOT_SIZE;
        (BlockId(block as u32), offset)
    }

    #[inline]
    pub fn contains(&self, slot: SlotId) -> bool {
        slot.0 < self.slots
    }
}
