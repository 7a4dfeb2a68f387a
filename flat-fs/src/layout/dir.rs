use crate::layout::SlotId;
use crate::{FsError, Result, BLOCK_SIZE};

const ENTRY_WIDTH: usize = 4;

/// Children a directory block can list: one entry's worth of space holds the count.
pub const DIR_CAPACITY: usize = BLOCK_SIZE / ENTRY_WIDTH - 1;

/// View over a directory's data block: a `u32` child count followed by that
/// many `u32` slot ids.
pub struct DirBlock<B>(B);

impl<B: AsRef<[u8]>> DirBlock<B> {
    #[inline]
    pub fn new(data: B) -> Self {
        debug_assert_eq!(data.as_ref().len(), BLOCK_SIZE);
        Self(data)
    }

    /// Stored count, clamped to the capacity in case the image is damaged.
    pub fn len(&self) -> usize {
        (self.entry(0) as usize).min(DIR_CAPACITY)
    }

    pub fn children(&self) -> impl Iterator<Item = SlotId> + '_ {
        (0..self.len()).map(|i| SlotId::new(self.entry(i + 1)))
    }

    fn entry(&self, index: usize) -> u32 {
        let at = index * ENTRY_WIDTH;
        let mut bytes = [0; ENTRY_WIDTH];
        bytes.copy_from_slice(&self.0.as_ref()[at..at + ENTRY_WIDTH]);
        u32::from_le_bytes(bytes)
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> DirBlock<B> {
    /// Empty child list.
    pub fn init(&mut self) {
        self.0.as_mut().fill(0);
    }

    /// Append `child`, failing when the list is full.
    pub fn push(&mut self, child: SlotId) -> Result<()> {
        let len = self.len();
        if len == DIR_CAPACITY {
            return Err(FsError::NoSpace);
        }
        self.set_entry(len + 1, child.raw());
        self.set_entry(0, (len + 1) as u32);
        Ok(())
    }

    /// Remove `child`, shifting later entries left so sibling order is kept.
    pub fn remove(&mut self, child: SlotId) -> bool {
        let len = self.len();
        let Some(pos) = self.children().position(|id| id == child) else {
            return false;
        };

        let data = self.0.as_mut();
        let start = (pos + 1) * ENTRY_WIDTH;
        let end = (len + 1) * ENTRY_WIDTH;
        data.copy_within(start + ENTRY_WIDTH..end, start);
        data[end - ENTRY_WIDTH..end].fill(0);
        self.set_entry(0, (len - 1) as u32);
        true
    }

    fn set_entry(&mut self, index: usize, value: u32) {
        let at = index * ENTRY_WIDTH;
        self.0.as_mut()[at..at + ENTRY_WIDTH].copy_from_slice(&value.to_le_bytes());
    }
}
