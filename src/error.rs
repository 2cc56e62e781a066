//! Error types for stream encoding, decoding and tree walking.

use std::{ffi::OsStr, fmt, path::PathBuf};

use thiserror::Error;

use crate::record::RecordType;

/// Coarse classification of an [`Error`].
///
/// Every error is terminal for the operation in progress; the kind exists so that callers (and
/// tests) can tell a corrupt stream from a failing disk without matching on every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The stream does not follow the record format or grammar.
    Format,
    /// Reading, writing or filesystem access failed.
    Io,
    /// A deserialize target already exists and clobbering is disabled.
    Conflict,
    /// A path or a name exceeds its configured bound.
    Capacity,
}

/// Errors that can occur while serializing or deserializing a tree.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error from the stream or the filesystem.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The three magic bytes were missing or wrong.
    #[error("bad magic {found:02x?} at offset {pos}")]
    BadMagic {
        /// The bytes found where the magic was expected (may be short at end of stream).
        found: Vec<u8>,
        /// Offset of the record in the stream.
        pos: u64,
    },

    /// The type byte does not name any known record type.
    #[error("unknown record type {0:#04x}")]
    UnknownRecordType(u8),

    /// A well-formed record of the wrong type was found.
    #[error("expected {expected}, found {found:?}")]
    UnexpectedRecord {
        /// Description of what the parser was waiting for.
        expected: Expected,
        /// The record type actually read.
        found: RecordType,
    },

    /// A record carries a depth other than the one its position in the stream implies.
    #[error("{record_type:?} at depth {found}, expected depth {expected}")]
    DepthMismatch {
        /// The record carrying the wrong depth.
        record_type: RecordType,
        /// Depth implied by the enclosing brackets.
        expected: u32,
        /// Depth read from the record.
        found: u32,
    },

    /// The length field is inconsistent with the record type.
    #[error("invalid length {length} for {record_type:?}")]
    InvalidLength {
        /// The record with the bad length.
        record_type: RecordType,
        /// The declared length.
        length: u64,
    },

    /// A directory entry name that can't be used as a single path component.
    #[error("invalid entry name {0:?}")]
    InvalidName(Box<OsStr>),

    /// A FILE_DATA payload disagrees with the size declared by its directory entry.
    #[error("file data for {path:?} holds {actual} bytes, entry declared {declared}")]
    SizeMismatch {
        /// Target path of the file.
        path: PathBuf,
        /// Size from the DIRECTORY_ENTRY record.
        declared: u64,
        /// Payload size from the FILE_DATA record.
        actual: u64,
    },

    /// A file changed size between being listed and being read.
    #[error("{path:?} changed size while being read (expected {expected} bytes)")]
    SizeChanged {
        /// The file being serialized.
        path: PathBuf,
        /// Size reported when the entry was recorded.
        expected: u64,
    },

    /// A deserialize target exists and clobbering is disabled.
    #[error("{0:?} already exists")]
    Conflict(PathBuf),

    /// The path would exceed the configured limit.
    #[error("path exceeds limit: {len} bytes > {limit} bytes")]
    PathTooLong {
        /// Length the path would have (including the terminator slot).
        len: usize,
        /// Configured limit.
        limit: usize,
    },

    /// An entry name would exceed the configured limit.
    #[error("name exceeds limit: {len} bytes > {limit} bytes")]
    NameTooLong {
        /// Length of the name (including the terminator slot).
        len: u64,
        /// Configured limit.
        limit: usize,
    },

    /// Attempted to pop a component from an empty path.
    #[error("path is empty")]
    EmptyPath,
}

/// What the deserializer was waiting for when it found an unexpected record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expected {
    /// A specific record type.
    Record(RecordType),
    /// A DIRECTORY_ENTRY or the DIRECTORY_END closing the bracket.
    EntryOrEnd,
}

impl fmt::Display for Expected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expected::Record(record_type) => write!(f, "{record_type:?}"),
            Expected::EntryOrEnd => write!(f, "DirectoryEntry or DirectoryEnd"),
        }
    }
}

impl From<rustix::io::Errno> for Error {
    fn from(errno: rustix::io::Errno) -> Self {
        Error::Io(errno.into())
    }
}

impl Error {
    /// Classifies the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Io(_) | Error::SizeChanged { .. } => ErrorKind::Io,
            Error::BadMagic { .. }
            | Error::UnknownRecordType(_)
            | Error::UnexpectedRecord { .. }
            | Error::DepthMismatch { .. }
            | Error::InvalidLength { .. }
            | Error::InvalidName(_)
            | Error::SizeMismatch { .. } => ErrorKind::Format,
            Error::Conflict(_) => ErrorKind::Conflict,
            Error::PathTooLong { .. } | Error::NameTooLong { .. } | Error::EmptyPath => {
                ErrorKind::Capacity
            }
        }
    }
}

/// Result type for transplant operations.
pub type Result<T> = std::result::Result<T, Error>;
