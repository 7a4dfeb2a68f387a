//! # Backing device interface
//!
//! A block device stores data in units of **blocks**. [`BlockDevice`] is the
//! abstraction the persistence layer reads the image from and writes it back
//! to; types implementing it are **device drivers**.
//!
//! `flat-fs` only ever moves whole images through a device: every block is
//! read at startup and every block is written on save.

use std::any::Any;
use std::io;

use spin::Mutex;

use crate::BLOCK_SIZE;

/// Block device driver trait.
pub trait BlockDevice: Send + Sync + Any {
    /// Whether the device already holds an image.
    fn exists(&self) -> bool;

    /// Read block `block_id` into `buf`, returning how many bytes were
    /// available. Anything short of `buf.len()` means the image ended early.
    fn read_block(&self, block_id: usize, buf: &mut [u8]) -> io::Result<usize>;

    /// Write `buf` as block `block_id`, creating the image if needed.
    fn write_block(&self, block_id: usize, buf: &[u8]) -> io::Result<()>;

    /// Make previous writes durable.
    fn sync(&self) -> io::Result<()> {
        Ok(())
    }
}

/// A device kept in memory, absent until the first write.
#[derive(Debug, Default)]
pub struct RamDisk {
    image: Mutex<Option<Vec<u8>>>,
}

impl RamDisk {
    pub fn new() -> Self {
        Self::default()
    }

    /// A device that already holds `image`.
    pub fn with_image(image: Vec<u8>) -> Self {
        Self {
            image: Mutex::new(Some(image)),
        }
    }

    /// Copy of the stored image, if any.
    pub fn image(&self) -> Option<Vec<u8>> {
        self.image.lock().clone()
    }
}

impl BlockDevice for RamDisk {
    fn exists(&self) -> bool {
        self.image.lock().is_some()
    }

    fn read_block(&self, block_id: usize, buf: &mut [u8]) -> io::Result<usize> {
        let image = self.image.lock();
        let image = image
            .as_ref()
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotFound))?;

        let start = (block_id * BLOCK_SIZE).min(image.len());
        let end = (start + buf.len()).min(image.len());
        buf[..end - start].copy_from_slice(&image[start..end]);
        Ok(end - start)
    }

    fn write_block(&self, block_id: usize, buf: &[u8]) -> io::Result<()> {
        let mut image = self.image.lock();
        let image = image.get_or_insert_with(Vec::new);

        let start = block_id * BLOCK_SIZE;
        let end = start + buf.len();
        if image.len() < end {
            image.resize(end, 0);
        }
        image[start..end].copy_from_slice(buf);
        Ok(())
    }
}
