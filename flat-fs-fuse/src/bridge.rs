//! FUSE bridge: kernel requests are answered from a shared flat-fs handle.
//!
//! Inode numbers are slot ids plus one, so the root slot is
//! [`fuser::FUSE_ROOT_ID`]. Every handle release and the unmount save the
//! whole image.

use std::ffi::OsStr;
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use fuser::{
    FileAttr, FileType, Filesystem, MountOption, ReplyAttr, ReplyCreate, ReplyData,
    ReplyDirectory, ReplyEmpty, ReplyEntry, ReplyOpen, ReplyStatfs, ReplyWrite, Request,
    TimeOrNow,
};
use libc::c_int;

use flat_fs::{FsError, SharedFileSystem, SlotId, Stat, StatKind, BLOCK_SIZE};

use crate::HostError;

const TTL: Duration = Duration::from_secs(1);

pub struct FuseBridge {
    fs: SharedFileSystem,
}

impl FuseBridge {
    pub fn new(fs: SharedFileSystem) -> Self {
        Self { fs }
    }
}

/// Mount `fs` on `mountpoint` and serve requests until it is unmounted.
pub fn mount(fs: SharedFileSystem, mountpoint: &Path) -> Result<(), HostError> {
    fuser::mount2(
        FuseBridge::new(fs),
        mountpoint,
        &[
            MountOption::FSName("flat-fs".into()),
            MountOption::AutoUnmount,
        ],
    )
    .map_err(|source| HostError::Mount {
        path: mountpoint.to_path_buf(),
        source,
    })
}

#[inline]
fn slot_of(ino: u64) -> SlotId {
    SlotId::new(ino.saturating_sub(1) as u32)
}

#[inline]
fn ino_of(slot: SlotId) -> u64 {
    u64::from(slot.raw()) + 1
}

fn time_of(secs: i64) -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(secs.max(0) as u64)
}

fn file_type(kind: StatKind) -> FileType {
    match kind {
        StatKind::DIR => FileType::Directory,
        StatKind::FILE => FileType::RegularFile,
    }
}

fn attr_of(stat: &Stat) -> FileAttr {
    FileAttr {
        ino: ino_of(stat.slot),
        size: stat.size,
        blocks: stat.blocks * (BLOCK_SIZE / 512) as u64,
        atime: time_of(stat.atime),
        mtime: time_of(stat.mtime),
        ctime: time_of(stat.mtime),
        crtime: UNIX_EPOCH,
        kind: file_type(stat.kind),
        perm: stat.perm,
        nlink: stat.nlink,
        uid: stat.uid,
        gid: stat.gid,
        rdev: 0,
        blksize: BLOCK_SIZE as u32,
        flags: 0,
    }
}

/// Errno for a failed request.
fn errno(op: &str, err: FsError) -> c_int {
    match err {
        FsError::NotFound => log::debug!("{op}: {err}"),
        _ => log::error!("{op}: {err}"),
    }
    err.errno()
}

fn name_of(name: &OsStr) -> Result<&str, FsError> {
    name.to_str().ok_or(FsError::InvalidArgument)
}

impl FuseBridge {
    /// Create `name` in `parent` and return its attributes.
    fn entry(
        &mut self,
        op: &str,
        parent: u64,
        name: &OsStr,
        kind: StatKind,
        mode: u32,
    ) -> Result<Stat, c_int> {
        let name = name_of(name).map_err(|err| errno(op, err))?;
        let mut fs = self.fs.lock();
        fs.create_in(slot_of(parent), name, kind, (mode & 0o7777) as u16, 1)
            .and_then(|slot| fs.stat_slot(slot))
            .map_err(|err| errno(op, err))
    }
}

impl Filesystem for FuseBridge {
    fn destroy(&mut self) {
        if let Err(err) = self.fs.lock().save() {
            log::error!("save on unmount: {err}");
        }
    }

    fn lookup(&mut self, _req: &Request, parent: u64, name: &OsStr, reply: ReplyEntry) {
        let fs = self.fs.lock();
        let res = name_of(name)
            .and_then(|name| fs.lookup(slot_of(parent), name))
            .and_then(|slot| fs.stat_slot(slot));
        match res {
            Ok(stat) => reply.entry(&TTL, &attr_of(&stat), 0),
            Err(err) => reply.error(errno("lookup", err)),
        }
    }

    fn getattr(&mut self, _req: &Request, ino: u64, reply: ReplyAttr) {
        match self.fs.lock().stat_slot(slot_of(ino)) {
            Ok(stat) => reply.attr(&TTL, &attr_of(&stat)),
            Err(err) => reply.error(errno("getattr", err)),
        }
    }

    fn setattr(
        &mut self,
        _req: &Request,
        ino: u64,
        mode: Option<u32>,
        uid: Option<u32>,
        gid: Option<u32>,
        size: Option<u64>,
        _atime: Option<TimeOrNow>,
        _mtime: Option<TimeOrNow>,
        _ctime: Option<SystemTime>,
        _fh: Option<u64>,
        _crtime: Option<SystemTime>,
        _chgtime: Option<SystemTime>,
        _bkuptime: Option<SystemTime>,
        _flags: Option<u32>,
        reply: ReplyAttr,
    ) {
        let slot = slot_of(ino);
        let mut fs = self.fs.lock();
        let mut res = Ok(());
        if let Some(size) = size {
            res = res.and_then(|()| fs.truncate_slot(slot, size));
        }
        if let Some(mode) = mode {
            res = res.and_then(|()| fs.chmod_slot(slot, mode));
        }
        if uid.is_some() || gid.is_some() {
            res = res.and_then(|()| fs.chown_slot(slot, uid, gid));
        }
        match res.and_then(|()| fs.stat_slot(slot)) {
            Ok(stat) => reply.attr(&TTL, &attr_of(&stat)),
            Err(err) => reply.error(errno("setattr", err)),
        }
    }

    fn mknod(
        &mut self,
        _req: &Request,
        parent: u64,
        name: &OsStr,
        mode: u32,
        _umask: u32,
        _rdev: u32,
        reply: ReplyEntry,
    ) {
        if StatKind::from_mode(mode) != Some(StatKind::FILE) {
            reply.error(errno("mknod", FsError::InvalidArgument));
            return;
        }
        match self.entry("mknod", parent, name, StatKind::FILE, mode) {
            Ok(stat) => reply.entry(&TTL, &attr_of(&stat), 0),
            Err(code) => reply.error(code),
        }
    }

    fn mkdir(
        &mut self,
        _req: &Request,
        parent: u64,
        name: &OsStr,
        mode: u32,
        _umask: u32,
        reply: ReplyEntry,
    ) {
        match self.entry("mkdir", parent, name, StatKind::DIR, mode) {
            Ok(stat) => reply.entry(&TTL, &attr_of(&stat), 0),
            Err(code) => reply.error(code),
        }
    }

    fn create(
        &mut self,
        _req: &Request,
        parent: u64,
        name: &OsStr,
        mode: u32,
        _umask: u32,
        _flags: i32,
        reply: ReplyCreate,
    ) {
        match self.entry("create", parent, name, StatKind::FILE, mode) {
            Ok(stat) => reply.created(&TTL, &attr_of(&stat), 0, 0, 0),
            Err(code) => reply.error(code),
        }
    }

    fn unlink(&mut self, _req: &Request, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        let mut fs = self.fs.lock();
        match name_of(name).and_then(|name| fs.unlink_in(slot_of(parent), name)) {
            Ok(()) => reply.ok(),
            Err(err) => reply.error(errno("unlink", err)),
        }
    }

    fn rmdir(&mut self, _req: &Request, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        let mut fs = self.fs.lock();
        match name_of(name).and_then(|name| fs.rmdir_in(slot_of(parent), name)) {
            Ok(()) => reply.ok(),
            Err(err) => reply.error(errno("rmdir", err)),
        }
    }

    fn open(&mut self, _req: &Request, ino: u64, _flags: i32, reply: ReplyOpen) {
        match self.fs.lock().stat_slot(slot_of(ino)) {
            Ok(_) => reply.opened(0, 0),
            Err(err) => reply.error(errno("open", err)),
        }
    }

    fn read(
        &mut self,
        _req: &Request,
        ino: u64,
        _fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock: Option<u64>,
        reply: ReplyData,
    ) {
        let Ok(offset) = u64::try_from(offset) else {
            reply.error(libc::EINVAL);
            return;
        };
        match self.fs.lock().read_slot(slot_of(ino), size as usize, offset) {
            Ok(data) => reply.data(&data),
            Err(err) => reply.error(errno("read", err)),
        }
    }

    fn write(
        &mut self,
        _req: &Request,
        ino: u64,
        _fh: u64,
        offset: i64,
        data: &[u8],
        _write_flags: u32,
        _flags: i32,
        _lock: Option<u64>,
        reply: ReplyWrite,
    ) {
        let Ok(offset) = u64::try_from(offset) else {
            reply.error(libc::EINVAL);
            return;
        };
        match self.fs.lock().write_slot(slot_of(ino), data, offset) {
            Ok(written) => reply.written(written as u32),
            Err(err) => reply.error(errno("write", err)),
        }
    }

    fn release(
        &mut self,
        _req: &Request,
        _ino: u64,
        _fh: u64,
        _flags: i32,
        _lock_owner: Option<u64>,
        _flush: bool,
        reply: ReplyEmpty,
    ) {
        match self.fs.lock().save() {
            Ok(()) => reply.ok(),
            Err(err) => reply.error(errno("release", err)),
        }
    }

    fn fsync(&mut self, _req: &Request, _ino: u64, _fh: u64, _datasync: bool, reply: ReplyEmpty) {
        reply.ok();
    }

    fn readdir(
        &mut self,
        _req: &Request,
        ino: u64,
        _fh: u64,
        offset: i64,
        mut reply: ReplyDirectory,
    ) {
        let dir = slot_of(ino);
        let fs = self.fs.lock();
        let listing = fs.list(dir).and_then(|children| Ok((fs.parent_of(dir)?, children)));
        let (parent, children) = match listing {
            Ok(listing) => listing,
            Err(err) => {
                reply.error(errno("readdir", err));
                return;
            }
        };

        let mut entries = vec![
            (ino, FileType::Directory, String::from(".")),
            (ino_of(parent), FileType::Directory, String::from("..")),
        ];
        entries.extend(
            children
                .into_iter()
                .map(|entry| (ino_of(entry.slot), file_type(entry.kind), entry.name)),
        );

        for (i, (ino, kind, name)) in entries.iter().enumerate().skip(offset as usize) {
            if reply.add(*ino, (i + 1) as i64, *kind, name) {
                break;
            }
        }
        reply.ok();
    }

    fn statfs(&mut self, _req: &Request, _ino: u64, reply: ReplyStatfs) {
        let stats = self.fs.lock().statfs();
        reply.statfs(
            stats.slots,
            stats.free_slots,
            stats.free_slots,
            stats.slots,
            stats.free_slots,
            stats.block_size,
            stats.name_max,
            stats.block_size,
        );
    }
}
