//! # Operation layer
//!
//! The operations a host calls, in two flavours: path-addressed (every call
//! resolves from the root, as a path-based bridge expects) and
//! slot-addressed (for inode-based bridges that remember what they looked
//! up). Path-level operations are thin wrappers over the slot-level ones.

use std::collections::HashSet;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::file::{blocks_for, end_of};
use crate::layout::{SlotId, SlotKind};
use crate::path::{validate_name, Path};
use crate::{
    DirEntry, FlatFileSystem, FsError, FsStats, Result, Stat, StatKind, BLOCK_SIZE, NAME_MAX_LEN,
};

const PERM_MASK: u32 = 0o7777;

/// Permission bits of the root directory as reported by `getattr`.
const ROOT_PERM: u16 = 0o755;

/// Current time in Unix seconds.
fn now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs() as i64)
}

/// Path-level operations.
impl FlatFileSystem {
    /// Create an empty regular file.
    pub fn create(&mut self, path: &str, mode: u32) -> Result<SlotId> {
        let (parent, name) = self.new_entry(path)?;
        self.create_in(parent, name, StatKind::FILE, perm_of(mode), 1)
    }

    pub fn mkdir(&mut self, path: &str, mode: u32) -> Result<SlotId> {
        let (parent, name) = self.new_entry(path)?;
        self.create_in(parent, name, StatKind::DIR, perm_of(mode), 1)
    }

    /// Create a node of the type in `mode`'s type bits. Only regular files
    /// can be made this way.
    pub fn mknod(&mut self, path: &str, mode: u32) -> Result<SlotId> {
        match StatKind::from_mode(mode) {
            Some(StatKind::FILE) => self.create(path, mode),
            _ => Err(FsError::InvalidArgument),
        }
    }

    pub fn getattr(&self, path: &str) -> Result<Stat> {
        let slot = self.volume.resolve(path)?;
        self.stat_slot(slot)
    }

    /// Names in directory `path`, starting with `.` and `..`.
    pub fn readdir(&self, path: &str) -> Result<Vec<String>> {
        let dir = self.volume.resolve(path)?;
        let mut names = vec![String::from("."), String::from("..")];
        names.extend(self.list(dir)?.into_iter().map(|entry| entry.name));
        Ok(names)
    }

    /// Read up to `size` bytes at `offset`.
    pub fn read(&mut self, path: &str, size: usize, offset: u64) -> Result<Vec<u8>> {
        let slot = self.volume.resolve(path)?;
        self.read_slot(slot, size, offset)
    }

    /// Write `buf` at `offset`, creating the file when `path` doesn't exist.
    pub fn write(&mut self, path: &str, buf: &[u8], offset: u64) -> Result<usize> {
        let slot = match self.volume.resolve(path) {
            Ok(slot) => slot,
            Err(FsError::NotFound) => {
                let (parent, name) = self.new_entry(path)?;
                let end = end_of(offset, buf.len(), self.config.max_file_size)?;
                let perm = self.config.file_perm;
                self.create_in(parent, name, StatKind::FILE, perm, blocks_for(end))?
            }
            Err(err) => return Err(err),
        };
        self.write_slot(slot, buf, offset)
    }

    /// Set the size of `path`, creating an empty file of that nominal size
    /// when it doesn't exist.
    pub fn truncate(&mut self, path: &str, size: u64) -> Result<()> {
        let max = self.config.max_file_size;
        if size > max {
            return Err(FsError::TooLarge { size, max });
        }
        let slot = match self.volume.resolve(path) {
            Ok(slot) => slot,
            Err(FsError::NotFound) => {
                let (parent, name) = self.new_entry(path)?;
                let perm = self.config.file_perm;
                self.create_in(parent, name, StatKind::FILE, perm, 1)?
            }
            Err(err) => return Err(err),
        };
        self.truncate_slot(slot, size)
    }

    pub fn unlink(&mut self, path: &str) -> Result<()> {
        let (parent, name) = self.existing_entry(path, FsError::IsADirectory)?;
        self.unlink_in(parent, name)
    }

    /// Remove directory `path` together with the nodes it lists directly.
    pub fn rmdir(&mut self, path: &str) -> Result<()> {
        let (parent, name) = self.existing_entry(path, FsError::Busy)?;
        self.rmdir_in(parent, name)
    }

    pub fn chmod(&mut self, path: &str, mode: u32) -> Result<()> {
        let slot = self.volume.resolve(path)?;
        self.chmod_slot(slot, mode)
    }

    /// Change owner and group; `None` leaves a field as it is.
    pub fn chown(&mut self, path: &str, uid: Option<u32>, gid: Option<u32>) -> Result<()> {
        let slot = self.volume.resolve(path)?;
        self.chown_slot(slot, uid, gid)
    }

    /// A handle on `path` was closed: persist the image.
    pub fn release(&mut self, path: &str) -> Result<()> {
        log::debug!("release {path:?}");
        self.save()
    }

    pub fn open_file(&self, _path: &str) -> Result<()> {
        Ok(())
    }

    pub fn fsync(&self, _path: &str) -> Result<()> {
        Ok(())
    }

    /// Timestamps are only set by reads and writes.
    pub fn utimens(&self, _path: &str) -> Result<()> {
        Ok(())
    }
}

/// Slot-level operations.
impl FlatFileSystem {
    /// The child of directory `parent` named `name`.
    pub fn lookup(&self, parent: SlotId, name: &str) -> Result<SlotId> {
        if !self.volume.head(parent)?.is_dir() {
            return Err(FsError::NotADirectory);
        }
        self.volume
            .find_child(parent, name)?
            .ok_or(FsError::NotFound)
    }

    pub fn stat_slot(&self, slot: SlotId) -> Result<Stat> {
        let head = self.volume.head(slot)?;
        let blocks = self.volume.chain(slot)?.len();
        let mut stat = Stat::new(&head, blocks);
        if slot == SlotId::ROOT {
            stat.kind = StatKind::DIR;
            stat.perm = ROOT_PERM;
            stat.nlink = StatKind::DIR.links();
        }
        Ok(stat)
    }

    /// Children of directory `dir`, without `.` and `..`.
    pub fn list(&self, dir: SlotId) -> Result<Vec<DirEntry>> {
        self.volume
            .children(dir)?
            .into_iter()
            .map(|child| {
                let head = self.volume.head(child)?;
                Ok(DirEntry {
                    name: head.name().to_owned(),
                    slot: child,
                    kind: head.kind.into(),
                })
            })
            .collect()
    }

    pub fn parent_of(&self, slot: SlotId) -> Result<SlotId> {
        self.volume.parent_of(slot)
    }

    /// Create `name` in directory `parent` with `blocks` chained data blocks.
    ///
    /// Every check runs before the slot is allocated.
    pub fn create_in(
        &mut self,
        parent: SlotId,
        name: &str,
        kind: StatKind,
        perm: u16,
        blocks: usize,
    ) -> Result<SlotId> {
        validate_name(name)?;
        if !self.volume.head(parent)?.is_dir() {
            return Err(FsError::NotADirectory);
        }
        if self.volume.find_child(parent, name)?.is_some() {
            return Err(FsError::AlreadyExists);
        }
        if self.volume.is_full(parent)? {
            return Err(FsError::NoSpace);
        }

        let slot = self.volume.alloc_head(name, SlotKind::from(kind), blocks)?;
        self.stamp_new(slot, perm)?;
        if kind == StatKind::DIR {
            self.volume.init_dir(slot)?;
        }
        self.volume.add_child(parent, slot)?;
        self.touch(parent)?;

        log::debug!("create {name:?} ({kind:?}) as {slot} in {parent}");
        Ok(slot)
    }

    pub fn read_slot(&mut self, slot: SlotId, size: usize, offset: u64) -> Result<Vec<u8>> {
        let data = self.volume.read_at(slot, offset, size)?;
        let atime = now();
        self.volume.on_slot_mut(slot, |head| head.atime = atime)?;
        Ok(data)
    }

    pub fn write_slot(&mut self, slot: SlotId, buf: &[u8], offset: u64) -> Result<usize> {
        let written = self
            .volume
            .write_at(slot, offset, buf, self.config.max_file_size)?;
        self.touch(slot)?;
        Ok(written)
    }

    pub fn truncate_slot(&mut self, slot: SlotId, size: u64) -> Result<()> {
        self.volume.set_len(slot, size, self.config.max_file_size)?;
        self.touch(slot)
    }

    pub fn chmod_slot(&mut self, slot: SlotId, mode: u32) -> Result<()> {
        self.volume.head(slot)?;
        self.volume
            .on_slot_mut(slot, |head| head.perm = perm_of(mode))
    }

    pub fn chown_slot(&mut self, slot: SlotId, uid: Option<u32>, gid: Option<u32>) -> Result<()> {
        self.volume.head(slot)?;
        self.volume.on_slot_mut(slot, |head| {
            if let Some(uid) = uid {
                head.uid = uid;
            }
            if let Some(gid) = gid {
                head.gid = gid;
            }
        })
    }

    /// Remove file `name` from directory `parent` and free its chain.
    pub fn unlink_in(&mut self, parent: SlotId, name: &str) -> Result<()> {
        let child = self.lookup(parent, name)?;
        if self.volume.head(child)?.is_dir() {
            return Err(FsError::IsADirectory);
        }
        self.volume.free_chain(child)?;
        self.volume.remove_child(parent, child)?;
        self.touch(parent)?;
        log::debug!("unlink {name:?} ({child}) from {parent}");
        Ok(())
    }

    /// Remove directory `name` from `parent`, freeing the nodes it lists.
    ///
    /// Only one level is freed: what a listed subdirectory itself lists is
    /// left allocated but unreachable, see [`reclaim_orphans`](Self::reclaim_orphans).
    pub fn rmdir_in(&mut self, parent: SlotId, name: &str) -> Result<()> {
        let dir = self.lookup(parent, name)?;
        if !self.volume.head(dir)?.is_dir() {
            return Err(FsError::NotADirectory);
        }

        // Walk every chain up front so a damaged child frees nothing.
        let children = self.volume.children(dir)?;
        for &child in &children {
            if self.volume.head(child)?.is_dir() && !self.volume.children(child)?.is_empty() {
                log::warn!("rmdir {name:?}: the contents of {child} are orphaned");
            }
            self.volume.chain(child)?;
        }
        self.volume.chain(dir)?;

        for child in children {
            self.volume.free_chain(child)?;
        }
        self.volume.free_chain(dir)?;
        self.volume.remove_child(parent, dir)?;
        self.touch(parent)?;
        log::debug!("rmdir {name:?} ({dir}) from {parent}");
        Ok(())
    }

    pub fn statfs(&self) -> FsStats {
        FsStats {
            slots: self.volume.geometry().slots().into(),
            free_slots: self.volume.free_slots() as u64,
            block_size: BLOCK_SIZE as u32,
            name_max: NAME_MAX_LEN as u32,
        }
    }

    /// Free every occupied slot that can't be reached from the root,
    /// returning how many were freed.
    pub fn reclaim_orphans(&mut self) -> Result<usize> {
        let mut reachable = HashSet::new();
        let mut pending = vec![SlotId::ROOT];
        while let Some(slot) = pending.pop() {
            if !reachable.insert(slot) {
                continue;
            }
            let head = self.volume.head(slot)?;
            for (link, _) in self.volume.chain(slot)? {
                reachable.insert(link);
            }
            if head.is_dir() {
                pending.extend(self.volume.children(slot)?);
            }
        }

        let mut freed = 0;
        let ids: Vec<SlotId> = self.volume.ids().collect();
        for id in ids {
            if !reachable.contains(&id) && !self.volume.slot(id)?.is_free() {
                self.volume.release(id)?;
                freed += 1;
            }
        }

        if freed > 0 {
            log::warn!("reclaimed {freed} orphaned slot(s)");
        }
        Ok(freed)
    }
}

impl FlatFileSystem {
    /// Metadata of a node that was just allocated.
    pub(crate) fn stamp_new(&mut self, slot: SlotId, perm: u16) -> Result<()> {
        let (uid, gid) = (self.config.uid, self.config.gid);
        let time = now();
        self.volume.on_slot_mut(slot, |head| {
            head.perm = perm;
            head.uid = uid;
            head.gid = gid;
            head.size = 0;
            head.atime = time;
            head.mtime = time;
        })
    }

    /// Record a modification of `slot`.
    fn touch(&mut self, slot: SlotId) -> Result<()> {
        let time = now();
        self.volume.on_slot_mut(slot, |head| head.mtime = time)
    }

    /// Parent and name for a node about to be created at `path`.
    fn new_entry<'a>(&self, path: &'a str) -> Result<(SlotId, &'a str)> {
        if path.is_root() {
            return Err(FsError::AlreadyExists);
        }
        self.volume.resolve_parent(path)
    }

    /// Parent and name of the existing node at `path`; `root` is what
    /// removing the root directory fails with.
    fn existing_entry<'a>(&self, path: &'a str, root: FsError) -> Result<(SlotId, &'a str)> {
        if path.is_root() {
            return Err(root);
        }
        self.volume.resolve_parent(path)
    }
}

#[inline]
fn perm_of(mode: u32) -> u16 {
    (mode & PERM_MASK) as u16
}
