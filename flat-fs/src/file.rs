//! # File I/O
//!
//! Byte access to a node's block chain. Block `k` of the chain holds bytes
//! `k * BLOCK_SIZE..(k + 1) * BLOCK_SIZE` of the file. The recorded size can
//! run past the chain after a growing truncate; bytes there read as zeros.
//! Bytes in the chain beyond the recorded size are always zero.

use crate::layout::{BlockId, DiskSlot, SlotId};
use crate::volume::Volume;
use crate::{FsError, Result, BLOCK_SIZE};

/// Blocks needed to hold `len` bytes; every file owns at least one.
#[inline]
pub fn blocks_for(len: u64) -> usize {
    (len.div_ceil(BLOCK_SIZE as u64) as usize).max(1)
}

/// `offset + len`, failing `TooLarge` past `max`.
pub fn end_of(offset: u64, len: usize, max: u64) -> Result<u64> {
    let end = offset.checked_add(len as u64).ok_or(FsError::TooLarge {
        size: u64::MAX,
        max,
    })?;
    if end > max {
        return Err(FsError::TooLarge { size: end, max });
    }
    Ok(end)
}

impl Volume {
    /// Read up to `len` bytes at `offset` from file `head`.
    pub fn read_at(&self, head: SlotId, offset: u64, len: usize) -> Result<Vec<u8>> {
        let slot = self.file_head(head)?;
        let size = u64::from(slot.size);
        if offset >= size || len == 0 {
            return Ok(Vec::new());
        }
        let end = size.min(offset.saturating_add(len as u64));

        let chain = self.chain(head)?;
        let mut buf = Vec::with_capacity((end - offset) as usize);
        let mut pos = offset;
        while pos < end {
            let index = (pos / BLOCK_SIZE as u64) as usize;
            let in_block = (pos % BLOCK_SIZE as u64) as usize;
            let n = (BLOCK_SIZE - in_block).min((end - pos) as usize);
            match chain.get(index) {
                Some(&(_, block)) => {
                    buf.extend_from_slice(&self.data(block)?[in_block..in_block + n])
                }
                None => buf.resize(buf.len() + n, 0),
            }
            pos += n as u64;
        }

        Ok(buf)
    }

    /// Write `data` at `offset` into file `head`, growing the chain as
    /// needed. Nothing is written unless the whole request fits.
    ///
    /// The file ends where the write ends: bytes recorded past
    /// `offset + data.len()` are cut off and zeroed.
    pub fn write_at(&mut self, head: SlotId, offset: u64, data: &[u8], max: u64) -> Result<usize> {
        let slot = self.file_head(head)?;
        let end = end_of(offset, data.len(), max)?;
        if data.is_empty() {
            return Ok(0);
        }

        let mut chain = self.chain(head)?;
        let needed = blocks_for(end);
        if needed > chain.len() {
            let tail = chain.last().map_or(head, |&(id, _)| id);
            self.extend_chain(tail, needed - chain.len())?;
            chain = self.chain(head)?;
        }

        let mut written = 0;
        while written < data.len() {
            let pos = offset + written as u64;
            let index = (pos / BLOCK_SIZE as u64) as usize;
            let in_block = (pos % BLOCK_SIZE as u64) as usize;
            let n = (BLOCK_SIZE - in_block).min(data.len() - written);
            let (_, block) = chain[index];
            self.data_mut(block)?[in_block..in_block + n]
                .copy_from_slice(&data[written..written + n]);
            written += n;
        }

        let old = u64::from(slot.size);
        if end < old {
            let stored = old.min((chain.len() * BLOCK_SIZE) as u64);
            self.zero_range(&chain, end, stored)?;
        }

        self.on_slot_mut(head, |slot| slot.size = end as u32)?;
        log::debug!("write {head}: {written} byte(s) at {offset}, size {old} -> {end}");
        Ok(written)
    }

    /// Set the recorded size of file `head`. The chain keeps its length;
    /// bytes cut off inside it are zeroed.
    pub fn set_len(&mut self, head: SlotId, size: u64, max: u64) -> Result<()> {
        let slot = self.file_head(head)?;
        if size > max {
            return Err(FsError::TooLarge { size, max });
        }

        let old = u64::from(slot.size);
        if size < old {
            let chain = self.chain(head)?;
            let stored = old.min((chain.len() * BLOCK_SIZE) as u64);
            self.zero_range(&chain, size, stored)?;
        }

        self.on_slot_mut(head, |slot| slot.size = size as u32)?;
        log::debug!("truncate {head}: {old} -> {size}");
        Ok(())
    }

    fn file_head(&self, head: SlotId) -> Result<DiskSlot> {
        let slot = self.head(head)?;
        if slot.is_dir() {
            return Err(FsError::IsADirectory);
        }
        Ok(slot)
    }

    fn zero_range(&mut self, chain: &[(SlotId, BlockId)], from: u64, to: u64) -> Result<()> {
        let mut pos = from;
        while pos < to {
            let index = (pos / BLOCK_SIZE as u64) as usize;
            let in_block = (pos % BLOCK_SIZE as u64) as usize;
            let n = (BLOCK_SIZE - in_block).min((to - pos) as usize);
            let (_, block) = chain[index];
            self.data_mut(block)?[in_block..in_block + n].fill(0);
            pos += n as u64;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{Geometry, SlotKind};

    const MAX: u64 = 64 * BLOCK_SIZE as u64;

    fn volume() -> (Volume, SlotId) {
        let mut vol = Volume::new(Geometry::new(16));
        let head = vol.alloc_head("f", SlotKind::File, 1).unwrap();
        (vol, head)
    }

    #[test]
    fn write_across_blocks() {
        let (mut vol, head) = volume();
        let data: Vec<u8> = (0..2 * BLOCK_SIZE + 100).map(|i| i as u8).collect();
        assert_eq!(vol.write_at(head, 0, &data, MAX).unwrap(), data.len());
        assert_eq!(vol.chain(head).unwrap().len(), 3);
        assert_eq!(vol.read_at(head, 0, data.len()).unwrap(), data);

        // a read straddling a block boundary
        let part = vol.read_at(head, BLOCK_SIZE as u64 - 2, 4).unwrap();
        assert_eq!(part, &data[BLOCK_SIZE - 2..BLOCK_SIZE + 2]);

        // reads stop at the size
        assert_eq!(vol.read_at(head, data.len() as u64 - 1, 10).unwrap().len(), 1);
        assert!(vol.read_at(head, data.len() as u64, 10).unwrap().is_empty());
    }

    #[test]
    fn write_sets_size_to_its_end() {
        let (mut vol, head) = volume();
        vol.write_at(head, 0, b"hello world", MAX).unwrap();
        vol.write_at(head, 0, b"HELLO", MAX).unwrap();
        assert_eq!(vol.head(head).unwrap().size, 5);
        assert_eq!(vol.read_at(head, 0, 100).unwrap(), b"HELLO");

        // the cut-off tail doesn't come back when the file grows
        vol.set_len(head, 11, MAX).unwrap();
        assert_eq!(vol.read_at(head, 0, 100).unwrap(), b"HELLO\0\0\0\0\0\0");
    }

    #[test]
    fn too_large_writes_nothing() {
        let (mut vol, head) = volume();
        let free = vol.free_slots();
        assert!(matches!(
            vol.write_at(head, MAX - 1, b"ab", MAX),
            Err(FsError::TooLarge { .. })
        ));
        assert_eq!(vol.free_slots(), free);
        assert_eq!(vol.head(head).unwrap().size, 0);
    }

    #[test]
    fn no_space_writes_nothing() {
        let (mut vol, head) = volume();
        let data = vec![1; 17 * BLOCK_SIZE];
        assert!(matches!(vol.write_at(head, 0, &data, MAX), Err(FsError::NoSpace)));
        assert_eq!(vol.chain(head).unwrap().len(), 1);
        assert_eq!(vol.head(head).unwrap().size, 0);
    }

    #[test]
    fn truncate_changes_size_only() {
        let (mut vol, head) = volume();
        vol.write_at(head, 0, &[7; BLOCK_SIZE + 10], MAX).unwrap();

        vol.set_len(head, 3, MAX).unwrap();
        assert_eq!(vol.chain(head).unwrap().len(), 2);
        assert_eq!(vol.read_at(head, 0, 100).unwrap(), [7, 7, 7]);

        // growing again shows zeros, not the old bytes
        vol.set_len(head, 3 * BLOCK_SIZE as u64, MAX).unwrap();
        assert_eq!(vol.chain(head).unwrap().len(), 2);
        let data = vol.read_at(head, 0, 3 * BLOCK_SIZE).unwrap();
        assert_eq!(data.len(), 3 * BLOCK_SIZE);
        assert_eq!(&data[..3], [7, 7, 7]);
        assert!(data[3..].iter().all(|&b| b == 0));

        assert!(matches!(vol.set_len(head, MAX + 1, MAX), Err(FsError::TooLarge { .. })));
    }

    #[test]
    fn directories_have_no_bytes() {
        let mut vol = Volume::new(Geometry::new(4));
        let dir = vol.alloc_head("d", SlotKind::Directory, 1).unwrap();
        assert!(matches!(vol.read_at(dir, 0, 1), Err(FsError::IsADirectory)));
        assert!(matches!(vol.write_at(dir, 0, b"x", MAX), Err(FsError::IsADirectory)));
    }

    #[test]
    fn block_counts() {
        assert_eq!(blocks_for(0), 1);
        assert_eq!(blocks_for(1), 1);
        assert_eq!(blocks_for(BLOCK_SIZE as u64), 1);
        assert_eq!(blocks_for(BLOCK_SIZE as u64 + 1), 2);
    }
}
