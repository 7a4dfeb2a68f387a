//! # Persistence
//!
//! The image moves between memory and the backing device only as a whole:
//! every block is read on load and every block is written on save.

use crate::layout::{BlockId, Geometry, SlotId};
use crate::store::BlockStore;
use crate::volume::Volume;
use crate::{BlockDevice, FsError, Result, BLOCK_SIZE};

/// Read a complete image of `geometry` from `device`.
///
/// A device that ends before the last block is `CorruptImage`; the image
/// is never silently truncated.
pub fn load(device: &dyn BlockDevice, geometry: Geometry) -> Result<Volume> {
    let mut store = BlockStore::new(geometry.capacity());
    for block in 0..geometry.capacity() {
        let buf = store.block_mut(block_id(block))?;
        let read = device.read_block(block, buf)?;
        if read < BLOCK_SIZE {
            return Err(FsError::CorruptImage {
                block,
                read,
                expected: BLOCK_SIZE,
            });
        }
    }

    let mut probe = [0; 1];
    if device.read_block(geometry.capacity(), &mut probe)? > 0 {
        log::warn!(
            "image is longer than {} blocks, the rest is ignored",
            geometry.capacity()
        );
    }

    let volume = Volume::from_store(store, geometry)?;
    match volume.head(SlotId::ROOT) {
        Ok(root) if root.is_dir() => {}
        _ => return Err(FsError::MissingRoot),
    }

    log::info!(
        "loaded image: {} slots, {} free",
        geometry.slots(),
        volume.free_slots()
    );
    Ok(volume)
}

/// Write every block of `volume` to `device`, then sync it.
pub fn save(device: &dyn BlockDevice, volume: &Volume) -> Result<()> {
    let store = volume.store();
    for block in 0..store.capacity() {
        device.write_block(block, store.block(block_id(block))?)?;
    }
    device.sync()?;
    log::info!("saved image: {} blocks", store.capacity());
    Ok(())
}

#[inline]
fn block_id(block: usize) -> BlockId {
    BlockId::new(block as u32)
}
