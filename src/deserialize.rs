//! Reads a record stream and recreates the tree it describes.
//!
//! The parser is a recursive state machine mirroring the serializer: a transmission holds one
//! bracket at depth 1, a bracket holds entries at its own depth, and each entry is followed by
//! either a single FILE_DATA record at the same depth or a nested bracket one level deeper.  The
//! first record that doesn't fit aborts the whole operation; entries created before that point are
//! left in place.

use std::{
    ffi::OsStr,
    io::{ErrorKind as IoErrorKind, Read},
    os::unix::ffi::OsStrExt,
    path::Path,
};

use log::{debug, warn};
use rustix::{
    fs::{chmodat, mkdirat, statat, AtFlags, FileType, Mode, CWD},
    io::Errno,
};

use crate::{
    error::{Error, Result},
    options::Options,
    path_stack::PathStack,
    record::{EntryMetadata, Header, RecordReader, RecordType, ENTRY_FIXED_SIZE},
    util::ErrnoFilter,
};

/// Checks that a name read from the stream is usable as a single path component.
fn check_name(name: &[u8]) -> Result<&OsStr> {
    match name {
        b"" | b"." | b".." => Err(Error::InvalidName(OsStr::from_bytes(name).into())),
        _ if name.iter().any(|&c| c == b'/' || c == 0) => {
            Err(Error::InvalidName(OsStr::from_bytes(name).into()))
        }
        _ => Ok(OsStr::from_bytes(name)),
    }
}

/// The state of one deserialize operation: where we are in the tree, where the records come from,
/// and what we're allowed to overwrite.
#[derive(Debug)]
pub struct Deserializer<R: Read> {
    path: PathStack,
    input: RecordReader<R>,
    options: Options,
}

impl<R: Read> Deserializer<R> {
    pub fn new(path: PathStack, input: R, options: Options) -> Self {
        Self {
            path,
            input: RecordReader::new(input),
            options,
        }
    }

    /// Reads a whole transmission and recreates its contents inside the directory named by the
    /// path.  The directory is created if it doesn't exist, regardless of the clobber option.
    pub fn deserialize(&mut self) -> Result<()> {
        match mkdirat(CWD, self.path.as_path(), Mode::RWXU) {
            Ok(()) | Err(Errno::EXIST) => {}
            Err(e) => return Err(e.into()),
        }

        self.input.expect(RecordType::TransmissionStart, 0)?;
        self.deserialize_directory(1)?;

        // The tree is complete once the root bracket closes.  Whatever record follows is only
        // looked at, never fatal; older writers tag the trailer with type 0x10.
        match self.input.expect_opt(RecordType::TransmissionEnd, 0) {
            Ok(Some(_)) => {}
            Ok(None) => warn!(
                "Stream ended without {} after {} bytes",
                RecordType::TransmissionEnd.name(),
                self.input.position()
            ),
            Err(err) => warn!("Ignoring trailer after the root directory: {err}"),
        }
        Ok(())
    }

    /// Reads a DIRECTORY_START…DIRECTORY_END bracket at `depth` and recreates its entries inside
    /// the directory named by the path.
    fn deserialize_directory(&mut self, depth: u32) -> Result<()> {
        self.input.expect(RecordType::DirectoryStart, depth)?;

        loop {
            let header = self.input.expect_entry_or_end(depth)?;
            if header.record_type == RecordType::DirectoryEnd {
                return Ok(());
            }
            self.deserialize_entry(&header, depth)?;
        }
    }

    fn deserialize_entry(&mut self, header: &Header, depth: u32) -> Result<()> {
        let name_len = header
            .length
            .checked_sub(ENTRY_FIXED_SIZE)
            .ok_or(Error::InvalidLength {
                record_type: header.record_type,
                length: header.length,
            })?;
        let metadata = self.input.read_entry_metadata()?;
        let name = self
            .input
            .read_name(name_len, self.options.limits.max_name_len)?;

        self.path.push(check_name(&name)?)?;
        let result = self.deserialize_inode(&metadata, depth);
        self.path.pop()?;
        result
    }

    fn deserialize_inode(&mut self, metadata: &EntryMetadata, depth: u32) -> Result<()> {
        if FileType::from_raw_mode(metadata.mode) == FileType::RegularFile {
            self.deserialize_file(metadata.size, depth)?;
        } else {
            self.create_directory()?;
            self.deserialize_directory(depth + 1)?;
        }

        // Set last, so that a read-only directory can still be populated first.
        let mode = Mode::from_raw_mode(metadata.mode & 0o777);
        chmodat(CWD, self.path.as_path(), mode, AtFlags::empty())?;
        Ok(())
    }

    fn create_directory(&self) -> Result<()> {
        let path = self.path.as_path();
        debug!("Directory {path:?}");

        match mkdirat(CWD, path, Mode::RWXU) {
            Ok(()) => Ok(()),
            Err(Errno::EXIST) if self.options.clobber => {
                debug!("Merging into existing {path:?}");
                Ok(())
            }
            Err(Errno::EXIST) => Err(Error::Conflict(path.to_path_buf())),
            Err(e) => Err(e.into()),
        }
    }

    /// Reads the FILE_DATA record for the regular file named by the path.  The content goes to a
    /// temporary file next to the target which is only moved into place once it is complete, so a
    /// truncated stream never leaves a short file behind.
    fn deserialize_file(&mut self, size: u64, depth: u32) -> Result<()> {
        let target = self.path.as_path();
        let clobber = self.options.clobber;

        if !clobber
            && statat(CWD, target, AtFlags::SYMLINK_NOFOLLOW)
                .filter_errno(Errno::NOENT)?
                .is_some()
        {
            return Err(Error::Conflict(target.to_path_buf()));
        }

        let header = self.input.expect(RecordType::FileData, depth)?;
        let len = header.payload_len()?;
        if len != size {
            return Err(Error::SizeMismatch {
                path: target.to_path_buf(),
                declared: size,
                actual: len,
            });
        }

        let dir = match target.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut tmp = tempfile::Builder::new()
            .prefix(".transplant-")
            .tempfile_in(dir)?;
        self.input.copy_payload(len, tmp.as_file_mut())?;
        debug!("File {target:?}: {len} bytes");

        let persisted = if clobber {
            tmp.persist(target)
        } else {
            tmp.persist_noclobber(target)
        };
        match persisted {
            Ok(_) => Ok(()),
            Err(e) if e.error.kind() == IoErrorKind::AlreadyExists => {
                Err(Error::Conflict(target.to_path_buf()))
            }
            Err(e) => Err(e.error.into()),
        }
    }

    pub fn into_inner(self) -> R {
        self.input.into_inner()
    }
}

/// Recreates the tree described by the stream read from `input` inside the directory `base`.
///
/// On failure, whatever was already created stays in place.
pub fn deserialize(base: impl AsRef<OsStr>, input: impl Read, options: &Options) -> Result<()> {
    let path = PathStack::new(base, options.limits.max_path_len)?;
    Deserializer::new(path, input, options.clone()).deserialize()
}
