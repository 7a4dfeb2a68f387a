//! # Slot manager
//!
//! Owns the block store and the free-slot counter, and is the only place a
//! slot moves between free and occupied. Slot records are decoded from and
//! encoded back into the table region on every access, so the image bytes
//! are always the single source of truth.

use crate::layout::{BlockId, DiskSlot, Geometry, SlotId, SlotKind, SLOT_SIZE};
use crate::store::BlockStore;
use crate::{FsError, Result};

#[derive(Debug)]
pub struct Volume {
    store: BlockStore,
    geometry: Geometry,
    /// Always equals the number of slots with `block == 0`.
    free: usize,
}

impl Volume {
    /// A zeroed volume: every slot free.
    pub fn new(geometry: Geometry) -> Self {
        Self {
            store: BlockStore::new(geometry.capacity()),
            geometry,
            free: geometry.slots() as usize,
        }
    }

    /// Adopt a loaded store and rebuild the free counter from it.
    pub fn from_store(store: BlockStore, geometry: Geometry) -> Result<Self> {
        let mut volume = Self {
            store,
            geometry,
            free: 0,
        };
        volume.free = volume.count_free()?;
        Ok(volume)
    }

    #[inline]
    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    #[inline]
    pub fn store(&self) -> &BlockStore {
        &self.store
    }

    /// Free slots according to the maintained counter.
    #[inline]
    pub fn free_slots(&self) -> usize {
        self.free
    }

    /// Free slots according to a full scan of the table.
    pub fn count_free(&self) -> Result<usize> {
        let mut free = 0;
        for id in self.ids() {
            if self.on_slot(id, DiskSlot::is_free)? {
                free += 1;
            }
        }
        Ok(free)
    }

    pub fn ids(&self) -> impl Iterator<Item = SlotId> {
        (0..self.geometry.slots()).map(SlotId::new)
    }

    /// Read a slot record and process it.
    pub fn on_slot<V>(&self, id: SlotId, f: impl FnOnce(&DiskSlot) -> V) -> Result<V> {
        let (block, offset) = self.slot_pos(id)?;
        self.store
            .map(block, |data| f(&DiskSlot::decode(&data[offset..offset + SLOT_SIZE])))
    }

    /// Modify a slot record's metadata.
    ///
    /// The occupied/free state belongs to the allocator and must not change here.
    pub fn on_slot_mut<V>(&mut self, id: SlotId, f: impl FnOnce(&mut DiskSlot) -> V) -> Result<V> {
        let (block, offset) = self.slot_pos(id)?;
        self.store.map_mut(block, |data| {
            let raw = &mut data[offset..offset + SLOT_SIZE];
            let mut slot = DiskSlot::decode(raw);
            let was_free = slot.is_free();
            let value = f(&mut slot);
            debug_assert_eq!(was_free, slot.is_free());
            slot.encode(raw);
            value
        })
    }

    #[inline]
    pub fn slot(&self, id: SlotId) -> Result<DiskSlot> {
        self.on_slot(id, DiskSlot::clone)
    }

    /// The record of a head slot; anything else is `NotFound`.
    pub fn head(&self, id: SlotId) -> Result<DiskSlot> {
        if !self.geometry.contains(id) {
            return Err(FsError::NotFound);
        }
        let slot = self.slot(id)?;
        if slot.is_head() {
            Ok(slot)
        } else {
            Err(FsError::NotFound)
        }
    }

    /// Allocate a head slot named `name` with `blocks` chained data blocks.
    ///
    /// The lowest free slots win. Either every block is allocated or
    /// nothing changes.
    pub fn alloc_head(&mut self, name: &str, kind: SlotKind, blocks: usize) -> Result<SlotId> {
        debug_assert_ne!(kind, SlotKind::None);

        let blocks = blocks.max(1);
        if blocks > self.free {
            return Err(FsError::NoSpace);
        }
        // validate before anything is written
        DiskSlot::default().set_name(name)?;

        let ids = self.lowest_free(blocks)?;
        let head = ids[0];
        let block = self.geometry.data_block(head);
        self.write_slot(head, |slot| slot.init_head(head, block, kind, name))??;
        self.free -= 1;
        self.store.zero(block)?;

        self.append_links(head, &ids[1..])?;
        log::debug!("alloc head {head} {name:?} with {blocks} block(s)");
        Ok(head)
    }

    /// Append `count` fresh blocks to the chain ending at `tail`.
    pub fn extend_chain(&mut self, tail: SlotId, count: usize) -> Result<()> {
        if count == 0 {
            return Ok(());
        }
        if count > self.free {
            return Err(FsError::NoSpace);
        }
        let ids = self.lowest_free(count)?;
        self.append_links(tail, &ids)
    }

    /// Free every slot of the chain starting at `head`, returning how many.
    pub fn free_chain(&mut self, head: SlotId) -> Result<usize> {
        let chain = self.chain(head)?;
        for &(id, block) in &chain {
            self.write_slot(id, DiskSlot::clear)?;
            self.store.zero(block)?;
            self.free += 1;
        }
        log::debug!("freed chain of {head}: {} slot(s)", chain.len());
        Ok(chain.len())
    }

    /// The `(slot, block)` links of the chain starting at `head`, in order.
    pub fn chain(&self, head: SlotId) -> Result<Vec<(SlotId, BlockId)>> {
        let mut links = Vec::new();
        let mut current = Some(head);

        while let Some(id) = current {
            if links.len() == self.geometry.slots() as usize {
                // longer than the table: there is a cycle
                return Err(FsError::OutOfBounds {
                    what: "chain of slot",
                    index: head.raw().into(),
                });
            }
            let slot = self.slot(id)?;
            if slot.is_free() {
                return Err(FsError::OutOfBounds {
                    what: "chain link",
                    index: id.raw().into(),
                });
            }
            links.push((id, self.data_block(&slot)?));
            current = slot.next_slot();
        }

        Ok(links)
    }

    pub fn data(&self, block: BlockId) -> Result<&[u8]> {
        self.store.block(block)
    }

    pub fn data_mut(&mut self, block: BlockId) -> Result<&mut [u8]> {
        self.store.block_mut(block)
    }

    /// Unconditionally free a single slot. Only for orphan reclamation, which
    /// works on slots no chain reaches any more.
    pub fn release(&mut self, id: SlotId) -> Result<()> {
        let slot = self.slot(id)?;
        if slot.is_free() {
            return Ok(());
        }
        if let Ok(block) = self.data_block(&slot) {
            self.store.zero(block)?;
        }
        self.write_slot(id, DiskSlot::clear)?;
        self.free += 1;
        Ok(())
    }
}

impl Volume {
    /// Where a slot record sits: **block id** and **offset inside the block**.
    fn slot_pos(&self, id: SlotId) -> Result<(BlockId, usize)> {
        if !self.geometry.contains(id) {
            return Err(FsError::OutOfBounds {
                what: "slot",
                index: id.raw().into(),
            });
        }
        Ok(self.geometry.slot_pos(id))
    }

    /// Raw record access for the allocator, free to flip the occupied state.
    fn write_slot<V>(&mut self, id: SlotId, f: impl FnOnce(&mut DiskSlot) -> V) -> Result<V> {
        let (block, offset) = self.slot_pos(id)?;
        self.store.map_mut(block, |data| {
            let raw = &mut data[offset..offset + SLOT_SIZE];
            let mut slot = DiskSlot::decode(raw);
            let value = f(&mut slot);
            slot.encode(raw);
            value
        })
    }

    /// The data block a record points at, which must lie in the data region.
    pub(crate) fn data_block(&self, slot: &DiskSlot) -> Result<BlockId> {
        let block = BlockId::new(slot.block);
        if slot.block < self.geometry.table_blocks() || block.index() >= self.geometry.capacity() {
            return Err(FsError::OutOfBounds {
                what: "block",
                index: slot.block.into(),
            });
        }
        Ok(block)
    }

    /// The `count` lowest free slot ids.
    fn lowest_free(&self, count: usize) -> Result<Vec<SlotId>> {
        let mut ids = Vec::with_capacity(count);
        for id in self.ids() {
            if ids.len() == count {
                break;
            }
            if self.on_slot(id, DiskSlot::is_free)? {
                ids.push(id);
            }
        }
        if ids.len() < count {
            // the counter and the table disagree
            return Err(FsError::NoSpace);
        }
        Ok(ids)
    }

    /// Occupy `ids` as continuation links hanging off `tail`, in order.
    fn append_links(&mut self, tail: SlotId, ids: &[SlotId]) -> Result<()> {
        let mut prev = tail;
        for &id in ids {
            let block = self.geometry.data_block(id);
            self.write_slot(id, |slot| slot.init_link(id, block))?;
            self.free -= 1;
            self.store.zero(block)?;
            self.write_slot(prev, |slot| slot.next = id.raw())?;
            prev = id;
        }
        Ok(())
    }
}
