//! Configuration of a filesystem instance.

use crate::layout::Geometry;
use crate::{FsError, Result, BLOCK_SIZE, NAME_MAX_LEN};

/// Default number of slots, which is also the number of data blocks.
pub const DEFAULT_SLOTS: u32 = 1024;

/// Default cap on a single file's size.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 64_000_000;

/// Configuration options for a filesystem instance.
///
/// # Example
///
/// ```
/// use flat_fs::FsConfig;
///
/// let config = FsConfig::default()
///     .with_slots(64)
///     .with_max_file_size(16 * 4096)
///     .without_seed();
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct FsConfig {
    /// Number of slots in the slot table.
    pub slots: u32,
    /// Largest size a file may reach through write or truncate.
    pub max_file_size: u64,
    /// Permission bits of the seed file and of nodes created without any.
    pub file_perm: u16,
    /// Permission bits of the root directory.
    pub dir_perm: u16,
    /// Owner recorded on newly created nodes.
    pub uid: u32,
    /// Group recorded on newly created nodes.
    pub gid: u32,
    /// File written into the root directory when a fresh image is formatted.
    pub seed: Option<SeedFile>,
}

/// A file placed in a freshly formatted image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedFile {
    pub name: String,
    pub content: Vec<u8>,
}

impl Default for FsConfig {
    fn default() -> Self {
        Self {
            slots: DEFAULT_SLOTS,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            file_perm: 0o644,
            dir_perm: 0o755,
            uid: 0,
            gid: 0,
            seed: Some(SeedFile::default()),
        }
    }
}

impl Default for SeedFile {
    fn default() -> Self {
        Self {
            name: String::from("WELCOME.txt"),
            content: b"Welcome to flat-fs!\n".to_vec(),
        }
    }
}

impl FsConfig {
    /// Set the number of slots.
    pub fn with_slots(mut self, slots: u32) -> Self {
        self.slots = slots;
        self
    }

    /// Set the maximum file size.
    pub fn with_max_file_size(mut self, max_file_size: u64) -> Self {
        self.max_file_size = max_file_size;
        self
    }

    /// Set the owner of newly created nodes.
    pub fn with_owner(mut self, uid: u32, gid: u32) -> Self {
        self.uid = uid;
        self.gid = gid;
        self
    }

    /// Replace the seed file.
    pub fn with_seed(mut self, seed: SeedFile) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Format images with an empty root directory.
    pub fn without_seed(mut self) -> Self {
        self.seed = None;
        self
    }

    /// Layout of an image built with this configuration.
    pub fn geometry(&self) -> Geometry {
        Geometry::new(self.slots)
    }

    pub fn validate(&self) -> Result<()> {
        // root and at least one more node
        if self.slots < 2 {
            return Err(FsError::InvalidConfig(format!(
                "need at least 2 slots, got {}",
                self.slots
            )));
        }
        // slot ids are stored as u32 and data blocks are numbered after the table
        if u64::from(self.slots) + u64::from(self.geometry().table_blocks()) > u64::from(u32::MAX)
        {
            return Err(FsError::InvalidConfig(format!(
                "{} slots don't fit 32-bit block numbers",
                self.slots
            )));
        }
        if self.max_file_size > u64::from(u32::MAX) {
            return Err(FsError::InvalidConfig(format!(
                "maximum file size {} doesn't fit the 32-bit size field",
                self.max_file_size
            )));
        }
        if self.file_perm > 0o7777 || self.dir_perm > 0o7777 {
            return Err(FsError::InvalidConfig(String::from(
                "permission bits must fit in 0o7777",
            )));
        }
        if let Some(seed) = &self.seed {
            if seed.name.is_empty() || seed.name.contains('/') || seed.name.len() > NAME_MAX_LEN {
                return Err(FsError::InvalidConfig(format!(
                    "invalid seed file name {:?}",
                    seed.name
                )));
            }
            if seed.content.len() as u64 > self.max_file_size
                || seed.content.len().div_ceil(BLOCK_SIZE) as u64 >= u64::from(self.slots)
            {
                return Err(FsError::InvalidConfig(String::from(
                    "seed file doesn't fit the image",
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        let config = FsConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.geometry().slots(), DEFAULT_SLOTS);
    }

    #[test]
    fn rejects_tiny_tables() {
        let config = FsConfig::default().with_slots(1);
        assert!(matches!(config.validate(), Err(FsError::InvalidConfig(_))));
    }

    #[test]
    fn rejects_bad_seed() {
        let config = FsConfig::default().with_seed(SeedFile {
            name: String::from("a/b"),
            content: Vec::new(),
        });
        assert!(matches!(config.validate(), Err(FsError::InvalidConfig(_))));

        let config = FsConfig::default()
            .with_slots(2)
            .with_seed(SeedFile {
                name: String::from("big"),
                content: vec![1; BLOCK_SIZE + 1],
            });
        assert!(matches!(config.validate(), Err(FsError::InvalidConfig(_))));
    }
}
