//! Host side of flat-fs: an image file on the host filesystem as the
//! backing device, a FUSE bridge, and packing of host directory trees.

#[cfg(test)]
mod tests;

#[cfg(feature = "fuse")]
mod bridge;
mod pack;

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use flat_fs::{BlockDevice, FsError, BLOCK_SIZE};
use thiserror::Error;

#[cfg(feature = "fuse")]
pub use self::bridge::{mount, FuseBridge};
pub use self::pack::{pack, PackStats};

/// Startup and host I/O failures, with the path they concern.
#[derive(Error, Debug)]
pub enum HostError {
    #[error("can't open image {}: {source}", .path.display())]
    Image {
        path: PathBuf,
        #[source]
        source: FsError,
    },

    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("can't mount on {}: {source}", .path.display())]
    Mount {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Fs(#[from] FsError),
}

/// An image file. The file is created by the first write, so a missing
/// image reads as an empty device.
#[derive(Debug)]
pub struct BlockFile {
    path: PathBuf,
    file: Mutex<Option<File>>,
}

impl BlockFile {
    /// Use the image at `path`, if there is one.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = match OpenOptions::new().read(true).write(true).open(&path) {
            Ok(file) => Some(file),
            Err(err) if err.kind() == io::ErrorKind::NotFound => None,
            Err(err) => return Err(err),
        };
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    /// Start a new, empty image at `path`, discarding any old one.
    pub fn create(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)?;
        Ok(Self {
            path,
            file: Mutex::new(Some(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl BlockDevice for BlockFile {
    fn exists(&self) -> bool {
        let file = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        file.as_ref()
            .and_then(|file| file.metadata().ok())
            .is_some_and(|meta| meta.len() > 0)
    }

    fn read_block(&self, block_id: usize, buf: &mut [u8]) -> io::Result<usize> {
        let mut file = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        let file = file
            .as_mut()
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotFound))?;
        file.seek(SeekFrom::Start((block_id * BLOCK_SIZE) as u64))?;

        let mut read = 0;
        while read < buf.len() {
            match file.read(&mut buf[read..]) {
                Ok(0) => break,
                Ok(n) => read += n,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(err) => return Err(err),
            }
        }
        Ok(read)
    }

    fn write_block(&self, block_id: usize, buf: &[u8]) -> io::Result<()> {
        let mut file = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        if file.is_none() {
            log::info!("creating image {}", self.path.display());
            *file = Some(
                OpenOptions::new()
                    .read(true)
                    .write(true)
                    .create(true)
                    .truncate(false)
                    .open(&self.path)?,
            );
        }
        let file = file
            .as_mut()
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotFound))?;
        file.seek(SeekFrom::Start((block_id * BLOCK_SIZE) as u64))?;
        file.write_all(buf)
    }

    fn sync(&self) -> io::Result<()> {
        let file = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        match file.as_ref() {
            Some(file) => file.sync_all(),
            None => Ok(()),
        }
    }
}
