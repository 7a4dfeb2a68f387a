//! Attribute types handed out by the operation layer.

use enumflags2::bitflags;

use crate::layout::{DiskSlot, SlotId, SlotKind};

const S_IFMT: u32 = 0o170000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stat {
    pub slot: SlotId,
    pub kind: StatKind,
    pub perm: u16,
    pub nlink: u32,
    pub size: u64,
    /// Blocks in the node's chain.
    pub blocks: u64,
    pub uid: u32,
    pub gid: u32,
    pub atime: i64,
    pub mtime: i64,
}

/// File type bits of `st_mode`.
#[allow(clippy::upper_case_acronyms)]
#[bitflags]
#[repr(u32)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StatKind {
    DIR = 0o040000,
    #[default]
    FILE = 0o100000,
}

/// One child of a directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub slot: SlotId,
    pub kind: StatKind,
}

/// Capacity figures of a mounted image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FsStats {
    pub slots: u64,
    pub free_slots: u64,
    pub block_size: u32,
    pub name_max: u32,
}

impl Stat {
    pub(crate) fn new(head: &DiskSlot, blocks: usize) -> Self {
        let kind = StatKind::from(head.kind);
        Self {
            slot: SlotId::new(head.id),
            kind,
            perm: head.perm,
            nlink: kind.links(),
            size: head.size.into(),
            blocks: blocks as u64,
            uid: head.uid,
            gid: head.gid,
            atime: head.atime,
            mtime: head.mtime,
        }
    }

    /// Full `st_mode`: type bits and permission bits.
    #[inline]
    pub fn mode(&self) -> u32 {
        self.kind as u32 | u32::from(self.perm)
    }

    #[inline]
    pub fn is_dir(&self) -> bool {
        self.kind == StatKind::DIR
    }
}

impl StatKind {
    /// Node type requested by a creation `mode`. No type bits means a
    /// regular file; types other than file and directory are unsupported.
    pub fn from_mode(mode: u32) -> Option<Self> {
        match mode & S_IFMT {
            0 => Some(Self::FILE),
            bits if bits == Self::FILE as u32 => Some(Self::FILE),
            bits if bits == Self::DIR as u32 => Some(Self::DIR),
            _ => None,
        }
    }

    #[inline]
    pub fn links(self) -> u32 {
        match self {
            Self::DIR => 2,
            Self::FILE => 1,
        }
    }
}

impl From<SlotKind> for StatKind {
    #[inline]
    fn from(kind: SlotKind) -> Self {
        match kind {
            SlotKind::Directory => Self::DIR,
            SlotKind::File | SlotKind::None => Self::FILE,
        }
    }
}

impl From<StatKind> for SlotKind {
    #[inline]
    fn from(kind: StatKind) -> Self {
        match kind {
            StatKind::DIR => Self::Directory,
            StatKind::FILE => Self::File,
        }
    }
}
