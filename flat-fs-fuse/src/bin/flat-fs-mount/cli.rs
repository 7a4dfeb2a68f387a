use std::path::PathBuf;

use clap::Parser;
use flat_fs::{FsConfig, DEFAULT_MAX_FILE_SIZE, DEFAULT_SLOTS};

/// Mount a flat-fs image through FUSE.
#[derive(Parser)]
pub struct Cli {
    /// Directory to mount the filesystem on
    pub mountpoint: PathBuf,

    /// Image file; created on the first save if it doesn't exist
    #[arg(long, short, default_value = "hdd1")]
    pub image: PathBuf,

    /// Number of slots of the image
    #[arg(long, default_value_t = DEFAULT_SLOTS)]
    pub slots: u32,

    /// Largest size a single file may reach, in bytes
    #[arg(long, default_value_t = DEFAULT_MAX_FILE_SIZE)]
    pub max_file_size: u64,

    /// Start from a freshly formatted image, discarding the old contents
    #[arg(long)]
    pub format: bool,

    /// Free slots no longer reachable from the root before mounting
    #[arg(long)]
    pub reclaim: bool,

    /// Don't put a welcome file into freshly formatted images
    #[arg(long)]
    pub no_seed: bool,
}

impl Cli {
    pub fn config(&self) -> FsConfig {
        // SAFETY: getuid and getgid can't fail
        let (uid, gid) = unsafe { (libc::getuid(), libc::getgid()) };
        let config = FsConfig::default()
            .with_slots(self.slots)
            .with_max_file_size(self.max_file_size)
            .with_owner(uid, gid);
        if self.no_seed {
            config.without_seed()
        } else {
            config
        }
    }
}
