//! The bounded pathname shared by the recursive walkers.
//!
//! A walk keeps exactly one pathname: the location currently being read or written.  Entering a
//! directory entry pushes its name, leaving it pops the name again, so the path always mirrors the
//! recursion.

use std::{ffi::OsStr, os::unix::ffi::OsStrExt, path::Path};

use crate::error::{Error, Result};

const SEPARATOR: u8 = b'/';

/// A pathname with stack-like push/pop of components and a fixed upper bound on its length.
///
/// The bound counts a terminator slot: with `limit == 1024` the path may hold at most 1023
/// bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathStack {
    buf: Vec<u8>,
    limit: usize,
}

impl PathStack {
    /// Initializes the path to `base`.
    ///
    /// Fails with [`Error::PathTooLong`] if `base` plus its terminator doesn't fit in `limit`.
    pub fn new(base: impl AsRef<OsStr>, limit: usize) -> Result<Self> {
        let base = base.as_ref().as_bytes();
        let len = base.len() + 1;
        if len > limit {
            return Err(Error::PathTooLong { len, limit });
        }

        let mut buf = Vec::with_capacity(limit);
        buf.extend_from_slice(base);
        Ok(Self { buf, limit })
    }

    /// Appends `/` and `component` to the path.
    ///
    /// `component` must not contain a `/`; this isn't checked.  On failure the path is left
    /// unchanged.
    pub fn push(&mut self, component: impl AsRef<OsStr>) -> Result<()> {
        let component = component.as_ref().as_bytes();
        let len = self.buf.len() + 1 + component.len() + 1;
        if len > self.limit {
            return Err(Error::PathTooLong {
                len,
                limit: self.limit,
            });
        }

        self.buf.push(SEPARATOR);
        self.buf.extend_from_slice(component);
        Ok(())
    }

    /// Removes the last component, including the `/` in front of it.  If the path contains no
    /// `/` at all, it becomes empty.
    pub fn pop(&mut self) -> Result<()> {
        if self.buf.is_empty() {
            return Err(Error::EmptyPath);
        }

        let end = self
            .buf
            .iter()
            .rposition(|&c| c == SEPARATOR)
            .unwrap_or(0);
        self.buf.truncate(end);
        Ok(())
    }

    pub fn as_path(&self) -> &Path {
        Path::new(OsStr::from_bytes(&self.buf))
    }

    /// Length of the path in bytes, not counting the terminator slot.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }
}
