//! # Path resolution
//!
//! Paths are `/`-separated and always walked from the root slot. Empty
//! components are dropped, so `//a///b/` names the same node as `/a/b`.
//! Resolution is purely name based: no parent pointers are cached.

use core::iter::Filter;
use core::str::Split;

use crate::layout::SlotId;
use crate::volume::Volume;
use crate::{FsError, Result, NAME_MAX_LEN};

pub type Components<'a> = Filter<Split<'a, char>, fn(&&str) -> bool>;

pub trait Path {
    /// Non-empty components, in order.
    fn components(&self) -> Components<'_>;

    /// Whether the path names the root directory.
    fn is_root(&self) -> bool;

    /// Returns the path's `(parent, file name)`, or `None` for the root.
    fn parent_file(&self) -> Option<(&str, &str)>;
}

impl Path for str {
    fn components(&self) -> Components<'_> {
        self.split('/').filter(non_empty as fn(&&str) -> bool)
    }

    fn is_root(&self) -> bool {
        self.components().next().is_none()
    }

    fn parent_file(&self) -> Option<(&str, &str)> {
        let trimmed = self.trim_end_matches('/');
        let (parent, file) = trimmed.rsplit_once('/').unwrap_or(("", trimmed));
        (!file.is_empty()).then_some((parent, file))
    }
}

fn non_empty(s: &&str) -> bool {
    !s.is_empty()
}

/// Check a name about to be stored in a new slot.
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name.contains('/') || name == "." || name == ".." {
        return Err(FsError::InvalidArgument);
    }
    if name.len() > NAME_MAX_LEN {
        return Err(FsError::NameTooLong);
    }
    Ok(())
}

impl Volume {
    /// The slot `path` names.
    ///
    /// A missing component or a component that isn't a directory, other
    /// than the last, is `NotFound`.
    pub fn resolve(&self, path: &str) -> Result<SlotId> {
        let mut current = SlotId::ROOT;
        for name in path.components() {
            if !self.head(current)?.is_dir() {
                return Err(FsError::NotFound);
            }
            current = self.find_child(current, name)?.ok_or(FsError::NotFound)?;
        }
        Ok(current)
    }

    /// The directory that would list `path`, and the last component.
    ///
    /// The root has no parent and is `InvalidArgument`.
    pub fn resolve_parent<'a>(&self, path: &'a str) -> Result<(SlotId, &'a str)> {
        let (parent, name) = path.parent_file().ok_or(FsError::InvalidArgument)?;
        let parent = self.resolve(parent)?;
        if !self.head(parent)?.is_dir() {
            return Err(FsError::NotFound);
        }
        Ok((parent, name))
    }
}
