//! # Directory layer
//!
//! Parent-child linkage. A directory's first data block holds its child
//! list; these methods are the only code that reads or changes it.

use crate::layout::{BlockId, DirBlock, SlotId, DIR_CAPACITY};
use crate::volume::Volume;
use crate::{FsError, Result};

impl Volume {
    /// Slot ids listed by directory `dir`, in insertion order.
    pub fn children(&self, dir: SlotId) -> Result<Vec<SlotId>> {
        let block = self.dir_block(dir)?;
        self.store()
            .map(block, |data| DirBlock::new(data).children().collect())
    }

    /// The child of `dir` named `name`.
    pub fn find_child(&self, dir: SlotId, name: &str) -> Result<Option<SlotId>> {
        for child in self.children(dir)? {
            let found = self.on_slot(child, |slot| slot.is_head() && slot.name() == name)?;
            if found {
                return Ok(Some(child));
            }
        }
        Ok(None)
    }

    /// Whether `dir` can't list another child.
    pub fn is_full(&self, dir: SlotId) -> Result<bool> {
        let block = self.dir_block(dir)?;
        self.store()
            .map(block, |data| DirBlock::new(data).len() >= DIR_CAPACITY)
    }

    pub fn add_child(&mut self, dir: SlotId, child: SlotId) -> Result<()> {
        let block = self.dir_block(dir)?;
        DirBlock::new(self.data_mut(block)?).push(child)?;
        log::debug!("dir {dir}: + {child}");
        Ok(())
    }

    /// Remove `child` from `dir`'s list, returning whether it was listed.
    pub fn remove_child(&mut self, dir: SlotId, child: SlotId) -> Result<bool> {
        if child == SlotId::ROOT {
            return Err(FsError::Busy);
        }
        let block = self.dir_block(dir)?;
        let removed = DirBlock::new(self.data_mut(block)?).remove(child);
        log::debug!("dir {dir}: - {child} ({removed})");
        Ok(removed)
    }

    /// Empty the child list of a freshly allocated directory.
    pub fn init_dir(&mut self, dir: SlotId) -> Result<()> {
        let block = self.dir_block(dir)?;
        DirBlock::new(self.data_mut(block)?).init();
        Ok(())
    }

    /// The directory that lists `slot`. Root is its own parent.
    pub fn parent_of(&self, slot: SlotId) -> Result<SlotId> {
        if slot == SlotId::ROOT {
            return Ok(SlotId::ROOT);
        }
        for id in self.ids() {
            if self.on_slot(id, |s| s.is_head() && s.is_dir())?
                && self.children(id)?.contains(&slot)
            {
                return Ok(id);
            }
        }
        Err(FsError::NotFound)
    }

    /// Data block of directory `dir`.
    fn dir_block(&self, dir: SlotId) -> Result<BlockId> {
        let slot = self.head(dir)?;
        if !slot.is_dir() {
            return Err(FsError::NotADirectory);
        }
        self.data_block(&slot)
    }
}
