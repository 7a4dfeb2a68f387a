//! # flat-fs
//!
//! An in-memory filesystem whose whole state lives in one flat image:
//! a slot table at the front and one data block per slot behind it.
//! The image is loaded from a [`BlockDevice`] at startup and written back
//! in one piece when the host asks for it.

/* flat-fs layering, top to bottom */

// Operation layer: path- and slot-addressed filesystem operations
mod vfs;

// File I/O across chained blocks
mod file;

// Path resolution from the root slot
mod path;

// Child lists stored in directory blocks
mod dir;

// Slot allocation, release and chain walking
mod volume;

// Filesystem context: lifecycle and persistence
mod efs;
mod image;

// On-image data structures
mod layout;

// The in-memory block store
mod store;

// Backing device interface
mod block_dev;

mod config;
mod error;
mod stat;

pub use self::{
    block_dev::{BlockDevice, RamDisk},
    config::{FsConfig, SeedFile, DEFAULT_MAX_FILE_SIZE, DEFAULT_SLOTS},
    efs::{FlatFileSystem, SharedFileSystem},
    error::{FsError, Result, Status},
    file::{blocks_for, end_of},
    layout::{BlockId, Geometry, SlotId},
    stat::{DirEntry, FsStats, Stat, StatKind},
};

/// Size of one block of the image.
pub const BLOCK_SIZE: usize = 4096;

/// Longest name a slot can hold, in bytes.
pub const NAME_MAX_LEN: usize = layout::NAME_MAX_LEN;

/// Number of children a directory block can list.
pub const DIR_CAPACITY: usize = layout::DIR_CAPACITY;

/// Raw uid/gid value meaning "leave unchanged" (`(uid_t)-1`).
pub const UNSPECIFIED_ID: u32 = u32::MAX;

/// Decode a raw uid/gid argument: [`UNSPECIFIED_ID`] means "no change".
#[inline]
pub fn specified(raw: u32) -> Option<u32> {
    (raw != UNSPECIFIED_ID).then_some(raw)
}
