//! Slot records.
//!
//! A slot either heads a file or directory, continues a head's block chain,
//! or is free (`block == 0`). Only heads carry a name and metadata.
//!
//! Record layout, little-endian:
//!
//! | offset | field  | type      |
//! |-------:|--------|-----------|
//! |      0 | id     | u32       |
//! |      4 | kind   | u8        |
//! |      8 | perm   | u16       |
//! |     12 | size   | u32       |
//! |     16 | block  | u32       |
//! |     20 | next   | u32       |
//! |     24 | uid    | u32       |
//! |     28 | gid    | u32       |
//! |     32 | mtime  | i64       |
//! |     40 | atime  | i64       |
//! |     48 | name   | [u8; 208] |

use crate::layout::{BlockId, SlotId};
use crate::{FsError, Result, BLOCK_SIZE};

/// A slot record is always 256 bytes.
pub const SLOT_SIZE: usize = 256;
pub const SLOTS_PER_BLOCK: usize = BLOCK_SIZE / SLOT_SIZE;

const NAME_OFFSET: usize = 48;
// the last byte is left for \0
pub const NAME_MAX_LEN: usize = SLOT_SIZE - NAME_OFFSET - 1;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum SlotKind {
    /// Free slot or chain continuation.
    #[default]
    None,
    File,
    Directory,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskSlot {
    pub id: u32,
    pub kind: SlotKind,
    pub perm: u16,
    pub size: u32,
    pub block: u32,
    pub next: u32,
    pub uid: u32,
    pub gid: u32,
    pub mtime: i64,
    pub atime: i64,
    name: [u8; NAME_MAX_LEN + 1],
}

impl Default for DiskSlot {
    fn default() -> Self {
        Self {
            id: 0,
            kind: SlotKind::None,
            perm: 0,
            size: 0,
            block: 0,
            next: 0,
            uid: 0,
            gid: 0,
            mtime: 0,
            atime: 0,
            name: [0; NAME_MAX_LEN + 1],
        }
    }
}

impl DiskSlot {
    /// Turn a free slot into the head of a new node.
    pub fn init_head(&mut self, id: SlotId, block: BlockId, kind: SlotKind, name: &str) -> Result<()> {
        *self = Self {
            id: id.raw(),
            kind,
            block: block.into(),
            ..Default::default()
        };
        self.set_name(name)
    }

    /// Turn a free slot into a chain continuation.
    pub fn init_link(&mut self, id: SlotId, block: BlockId) {
        *self = Self {
            id: id.raw(),
            block: block.into(),
            ..Default::default()
        };
    }

    /// Back to the free state.
    pub fn clear(&mut self) {
        let id = self.id;
        *self = Self {
            id,
            ..Default::default()
        };
    }

    #[inline]
    pub fn is_free(&self) -> bool {
        self.block == 0
    }

    /// Occupied and referenced from a directory rather than from a chain.
    #[inline]
    pub fn is_head(&self) -> bool {
        !self.is_free() && self.kind != SlotKind::None
    }

    #[inline]
    pub fn is_dir(&self) -> bool {
        self.kind == SlotKind::Directory
    }

    #[inline]
    pub fn next_slot(&self) -> Option<SlotId> {
        SlotId::link(self.next)
    }

    pub fn name(&self) -> &str {
        let len = self.name.iter().position(|&c| c == 0).unwrap_or(NAME_MAX_LEN);
        core::str::from_utf8(&self.name[..len]).unwrap_or_default()
    }

    pub fn set_name(&mut self, name: &str) -> Result<()> {
        let bytes = name.as_bytes();
        if bytes.len() > NAME_MAX_LEN {
            return Err(FsError::NameTooLong);
        }
        self.name = [0; NAME_MAX_LEN + 1];
        self.name[..bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    pub fn decode(raw: &[u8]) -> Self {
        debug_assert_eq!(raw.len(), SLOT_SIZE);

        let mut name = [0; NAME_MAX_LEN + 1];
        name.copy_from_slice(&raw[NAME_OFFSET..SLOT_SIZE]);

        Self {
            id: le_u32(raw, 0),
            kind: match raw[4] {
                1 => SlotKind::File,
                2 => SlotKind::Directory,
                _ => SlotKind::None,
            },
            perm: u16::from_le_bytes([raw[8], raw[9]]),
            size: le_u32(raw, 12),
            block: le_u32(raw, 16),
            next: le_u32(raw, 20),
            uid: le_u32(raw, 24),
            gid: le_u32(raw, 28),
            mtime: le_i64(raw, 32),
            atime: le_i64(raw, 40),
            name,
        }
    }

    pub fn encode(&self, raw: &mut [u8]) {
        debug_assert_eq!(raw.len(), SLOT_SIZE);

        raw.fill(0);
        raw[0..4].copy_from_slice(&self.id.to_le_bytes());
        raw[4] = match self.kind {
            SlotKind::None => 0,
            SlotKind::File => 1,
            SlotKind::Directory => 2,
        };
        raw[8..10].copy_from_slice(&self.perm.to_le_bytes());
        raw[12..16].copy_from_slice(&self.size.to_le_bytes());
        raw[16..20].copy_from_slice(&self.block.to_le_bytes());
        raw[20..24].copy_from_slice(&self.next.to_le_bytes());
        raw[24..28].copy_from_slice(&self.uid.to_le_bytes());
        raw[28..32].copy_from_slice(&self.gid.to_le_bytes());
        raw[32..40].copy_from_slice(&self.mtime.to_le_bytes());
        raw[40..48].copy_from_slice(&self.atime.to_le_bytes());
        raw[NAME_OFFSET..SLOT_SIZE].copy_from_slice(&self.name);
    }
}

#[inline]
fn le_u32(raw: &[u8], at: usize) -> u32 {
    let mut bytes = [0; 4];
    bytes.copy_from_slice(&raw[at..at + 4]);
    u32::from_le_bytes(bytes)
}

#[inline]
fn le_i64(raw: &[u8], at: usize) -> i64 {
    let mut bytes = [0; 8];
    bytes.copy_from_slice(&raw[at..at + 8]);
    i64::from_le_bytes(bytes)
}
