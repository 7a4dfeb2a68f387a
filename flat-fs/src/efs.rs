//! # Filesystem context
//!
//! [`FlatFileSystem`] owns the whole in-memory image together with the
//! device it came from. It is opened once, mutated by the operations in
//! the operation layer, and saved back as a whole.

use std::sync::Arc;

use spin::Mutex;

use crate::file::blocks_for;
use crate::layout::{SlotId, SlotKind};
use crate::volume::Volume;
use crate::{image, BlockDevice, FsConfig, Result, StatKind};

/// A filesystem shared between threads. The lock is the single point
/// every operation goes through.
pub type SharedFileSystem = Arc<Mutex<FlatFileSystem>>;

pub struct FlatFileSystem {
    device: Arc<dyn BlockDevice>,
    pub(crate) volume: Volume,
    pub(crate) config: FsConfig,
}

impl FlatFileSystem {
    /// Load the image held by `device`, or format a fresh one when the
    /// device is empty.
    pub fn open(device: Arc<dyn BlockDevice>, config: FsConfig) -> Result<Self> {
        config.validate()?;
        if !device.exists() {
            log::info!("no image on the device, formatting");
            return Self::format(device, config);
        }

        let volume = image::load(device.as_ref(), config.geometry())?;
        Ok(Self {
            device,
            volume,
            config,
        })
    }

    /// Build a fresh image: the root directory in slot 0, then the seed
    /// file if one is configured. Nothing reaches the device until
    /// [`save`](Self::save).
    pub fn format(device: Arc<dyn BlockDevice>, config: FsConfig) -> Result<Self> {
        config.validate()?;
        let geometry = config.geometry();
        let mut efs = Self {
            device,
            volume: Volume::new(geometry),
            config,
        };

        let root = efs.volume.alloc_head("/", SlotKind::Directory, 1)?;
        debug_assert_eq!(root, SlotId::ROOT);
        efs.stamp_new(root, efs.config.dir_perm)?;
        efs.volume.init_dir(root)?;

        if let Some(seed) = efs.config.seed.clone() {
            let blocks = blocks_for(seed.content.len() as u64);
            let file = efs.create_in(
                SlotId::ROOT,
                &seed.name,
                StatKind::FILE,
                efs.config.file_perm,
                blocks,
            )?;
            efs.volume
                .write_at(file, 0, &seed.content, efs.config.max_file_size)?;
        }

        log::info!(
            "formatted image: {} slots in {} blocks, {} free",
            geometry.slots(),
            geometry.capacity(),
            efs.volume.free_slots()
        );
        Ok(efs)
    }

    /// Write the whole image to the device.
    pub fn save(&self) -> Result<()> {
        image::save(self.device.as_ref(), &self.volume)
    }

    /// Save and drop the filesystem.
    pub fn close(self) -> Result<()> {
        self.save()
    }

    pub fn into_shared(self) -> SharedFileSystem {
        Arc::new(Mutex::new(self))
    }

    #[inline]
    pub fn config(&self) -> &FsConfig {
        &self.config
    }

    #[inline]
    pub fn geometry(&self) -> crate::Geometry {
        self.volume.geometry()
    }

    #[inline]
    pub fn device(&self) -> &Arc<dyn BlockDevice> {
        &self.device
    }
}

impl core::fmt::Debug for FlatFileSystem {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FlatFileSystem")
            .field("geometry", &self.volume.geometry())
            .field("free_slots", &self.volume.free_slots())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{RamDisk, SeedFile};

    fn config() -> FsConfig {
        FsConfig::default().with_slots(32)
    }

    #[test]
    fn format_seeds_root() {
        let efs = FlatFileSystem::open(Arc::new(RamDisk::new()), config()).unwrap();
        let root = efs.volume.head(SlotId::ROOT).unwrap();
        assert!(root.is_dir());
        assert_eq!(root.perm, 0o755);

        let seed = SeedFile::default();
        let file = efs.volume.find_child(SlotId::ROOT, &seed.name).unwrap().unwrap();
        let data = efs.volume.read_at(file, 0, 1024).unwrap();
        assert_eq!(data, seed.content);
        assert_eq!(efs.volume.free_slots(), 30);
    }

    #[test]
    fn format_without_seed() {
        let efs = FlatFileSystem::format(
            Arc::new(RamDisk::new()),
            config().without_seed(),
        )
        .unwrap();
        assert!(efs.volume.children(SlotId::ROOT).unwrap().is_empty());
        assert_eq!(efs.volume.free_slots(), 31);
    }

    #[test]
    fn nothing_is_written_before_save() {
        let disk = Arc::new(RamDisk::new());
        let efs = FlatFileSystem::open(disk.clone(), config()).unwrap();
        assert!(!disk.exists());
        efs.close().unwrap();
        assert_eq!(disk.image().unwrap().len(), config().geometry().image_len());
    }

    #[test]
    fn invalid_config_is_rejected() {
        let res = FlatFileSystem::open(Arc::new(RamDisk::new()), config().with_slots(0));
        assert!(matches!(res, Err(crate::FsError::InvalidConfig(_))));
    }
}
