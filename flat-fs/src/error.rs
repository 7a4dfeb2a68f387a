//! Error types of the engine and their POSIX view.

use std::io;

use thiserror::Error;

pub type Result<T> = core::result::Result<T, FsError>;

/// Everything an operation can fail with.
///
/// Every failure is detected before the image is touched, so an `Err`
/// leaves the block store and the slot table as they were.
#[derive(Error, Debug)]
pub enum FsError {
    /// No slot resolves for the path, or a middle component isn't a directory.
    #[error("no such file or directory")]
    NotFound,

    #[error("an entry with this name already exists")]
    AlreadyExists,

    #[error("not a directory")]
    NotADirectory,

    #[error("is a directory")]
    IsADirectory,

    #[error("file name too long")]
    NameTooLong,

    /// The allocator ran out of slots, or a directory block is full.
    #[error("no space left in the image")]
    NoSpace,

    /// Requested size is over the configured maximum file size.
    #[error("file size {size} exceeds the maximum of {max} bytes")]
    TooLarge { size: u64, max: u64 },

    /// Unsupported node type or malformed argument.
    #[error("invalid argument")]
    InvalidArgument,

    #[error("the root directory can't be removed")]
    Busy,

    /// The backing image is shorter than the configured geometry.
    #[error("corrupt image: block {block} read {read} of {expected} bytes")]
    CorruptImage {
        block: usize,
        read: usize,
        expected: usize,
    },

    /// Slot 0 of a loaded image isn't a directory.
    #[error("image has no root directory")]
    MissingRoot,

    /// A stored link points outside the image.
    #[error("{what} {index} is out of bounds")]
    OutOfBounds { what: &'static str, index: u64 },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error on the backing device: {0}")]
    Io(#[from] io::Error),
}

impl FsError {
    /// The positive errno this error is reported as.
    pub fn errno(&self) -> i32 {
        match self {
            Self::NotFound => libc::ENOENT,
            Self::AlreadyExists => libc::EEXIST,
            Self::NotADirectory => libc::ENOTDIR,
            Self::IsADirectory => libc::EISDIR,
            Self::NameTooLong => libc::ENAMETOOLONG,
            Self::NoSpace => libc::ENOSPC,
            Self::TooLarge { .. } => libc::EFBIG,
            Self::InvalidArgument | Self::InvalidConfig(_) => libc::EINVAL,
            Self::Busy => libc::EBUSY,
            Self::CorruptImage { .. } | Self::MissingRoot | Self::OutOfBounds { .. } => libc::EIO,
            Self::Io(err) => err.raw_os_error().unwrap_or(libc::EIO),
        }
    }
}

/// Conversion of an operation result into the integer a kernel bridge expects:
/// `0` or a byte count on success, `-errno` on failure.
pub trait Status {
    fn status(&self) -> i32;
}

impl Status for Result<()> {
    fn status(&self) -> i32 {
        match self {
            Ok(()) => 0,
            Err(err) => -err.errno(),
        }
    }
}

impl Status for Result<usize> {
    fn status(&self) -> i32 {
        match self {
            Ok(len) => i32::try_from(*len).unwrap_or(i32::MAX),
            Err(err) => -err.errno(),
        }
    }
}

impl Status for Result<Vec<u8>> {
    fn status(&self) -> i32 {
        match self {
            Ok(data) => i32::try_from(data.len()).unwrap_or(i32::MAX),
            Err(err) => -err.errno(),
        }
    }
}
