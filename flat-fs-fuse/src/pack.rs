//! Copying a host directory tree into an image.

use std::fs;
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use flat_fs::{blocks_for, end_of, FlatFileSystem, SlotId, StatKind};

use crate::HostError;

/// What [`pack`] copied.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PackStats {
    pub files: usize,
    pub dirs: usize,
    pub bytes: u64,
}

/// Copy the contents of host directory `source` into the root directory of
/// `fs`, recursively. Entries are visited in name order; symlinks and
/// special files are skipped.
pub fn pack(fs: &mut FlatFileSystem, source: &Path) -> Result<PackStats, HostError> {
    let mut stats = PackStats::default();
    pack_dir(fs, source, SlotId::ROOT, &mut stats)?;
    Ok(stats)
}

fn pack_dir(
    fs: &mut FlatFileSystem,
    host_dir: &Path,
    dir: SlotId,
    stats: &mut PackStats,
) -> Result<(), HostError> {
    let mut entries = fs::read_dir(host_dir)
        .map_err(io_err(host_dir))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(io_err(host_dir))?;
    entries.sort_by_key(|entry| entry.file_name());

    for entry in entries {
        let path = entry.path();
        let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
            log::warn!("skipping {}: name isn't UTF-8", path.display());
            continue;
        };
        let meta = entry.metadata().map_err(io_err(&path))?;
        let perm = (meta.permissions().mode() & 0o7777) as u16;

        if meta.is_dir() {
            let child = fs.create_in(dir, &name, StatKind::DIR, perm, 1)?;
            stats.dirs += 1;
            log::info!("dir  {}", path.display());
            pack_dir(fs, &path, child, stats)?;
        } else if meta.is_file() {
            let content = fs::read(&path).map_err(io_err(&path))?;
            let end = end_of(0, content.len(), fs.config().max_file_size)?;
            let child = fs.create_in(dir, &name, StatKind::FILE, perm, blocks_for(end))?;
            fs.write_slot(child, &content, 0)?;
            stats.files += 1;
            stats.bytes += content.len() as u64;
            log::info!("file {} ({} bytes)", path.display(), content.len());
        } else {
            log::warn!("skipping {}: not a regular file or directory", path.display());
        }
    }

    Ok(())
}

fn io_err(path: &Path) -> impl FnOnce(io::Error) -> HostError {
    let path = path.to_path_buf();
    move |source| HostError::Io { path, source }
}
