//! The record codec.
//!
//! A stream is a sequence of records, each starting with a 16 byte header:
//!
//! ```text
//! +-------+------+-------+--------+---------
//! | magic | type | depth | length | payload
//! |  3    |  1   | 4 BE  |  8 BE  | length - 16
//! +-------+------+-------+--------+---------
//! ```
//!
//! `length` counts the header itself.  Only DIRECTORY_ENTRY (mode, size, name) and FILE_DATA
//! (raw file content) records carry a payload.

use std::io::{Read, Write};

use zerocopy::{
    big_endian::{U32, U64},
    FromBytes, FromZeros, Immutable, IntoBytes, KnownLayout,
};

use crate::{
    error::{Error, Expected, Result},
    util::{copy_exact, read_exactish},
};

pub const MAGIC: [u8; 3] = [0x0c, 0x0d, 0xed];

/// Size of every record header, and therefore the length of payload-free records.
pub const HEADER_SIZE: u64 = size_of::<RawHeader>() as u64;

/// Header plus the fixed mode and size fields of a DIRECTORY_ENTRY; the name follows.
pub const ENTRY_FIXED_SIZE: u64 = HEADER_SIZE + size_of::<RawEntryMetadata>() as u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RecordType {
    TransmissionStart = 0,
    TransmissionEnd = 1,
    DirectoryStart = 2,
    DirectoryEnd = 3,
    DirectoryEntry = 4,
    FileData = 5,
}

impl TryFrom<u8> for RecordType {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        Ok(match value {
            0 => RecordType::TransmissionStart,
            1 => RecordType::TransmissionEnd,
            2 => RecordType::DirectoryStart,
            3 => RecordType::DirectoryEnd,
            4 => RecordType::DirectoryEntry,
            5 => RecordType::FileData,
            other => return Err(Error::UnknownRecordType(other)),
        })
    }
}

impl RecordType {
    /// The name used in listings.
    pub fn name(self) -> &'static str {
        match self {
            RecordType::TransmissionStart => "START_OF_TRANSMISSION",
            RecordType::TransmissionEnd => "END_OF_TRANSMISSION",
            RecordType::DirectoryStart => "START_OF_DIRECTORY",
            RecordType::DirectoryEnd => "END_OF_DIRECTORY",
            RecordType::DirectoryEntry => "DIRECTORY_ENTRY",
            RecordType::FileData => "FILE_DATA",
        }
    }

    /// Records that never carry a payload.
    pub fn is_marker(self) -> bool {
        !matches!(self, RecordType::DirectoryEntry | RecordType::FileData)
    }
}

// The type byte is kept raw here; it gets checked in RecordReader::read_header().
#[repr(C)]
#[derive(Debug, FromBytes, IntoBytes, Immutable, KnownLayout)]
struct RawHeader {
    magic: [u8; 3],
    record_type: u8,
    depth: U32,
    length: U64,
}

#[repr(C)]
#[derive(Debug, FromBytes, IntoBytes, Immutable, KnownLayout)]
struct RawEntryMetadata {
    mode: U32,
    size: U64,
}

/// A decoded record header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub record_type: RecordType,
    pub depth: u32,
    pub length: u64,
}

impl Header {
    /// Number of payload bytes following the header.
    pub fn payload_len(&self) -> Result<u64> {
        self.length
            .checked_sub(HEADER_SIZE)
            .ok_or(Error::InvalidLength {
                record_type: self.record_type,
                length: self.length,
            })
    }

    fn check(&self, record_type: RecordType, depth: u32) -> Result<()> {
        if self.record_type != record_type {
            return Err(Error::UnexpectedRecord {
                expected: Expected::Record(record_type),
                found: self.record_type,
            });
        }
        self.check_depth(depth)?;
        self.check_marker_length()
    }

    fn check_depth(&self, expected: u32) -> Result<()> {
        if self.depth != expected {
            return Err(Error::DepthMismatch {
                record_type: self.record_type,
                expected,
                found: self.depth,
            });
        }
        Ok(())
    }

    /// Markers are exactly one header long.
    fn check_marker_length(&self) -> Result<()> {
        if self.record_type.is_marker() && self.length != HEADER_SIZE {
            return Err(Error::InvalidLength {
                record_type: self.record_type,
                length: self.length,
            });
        }
        Ok(())
    }
}

/// The mode and size fields of a DIRECTORY_ENTRY payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryMetadata {
    pub mode: u32,
    pub size: u64,
}

/// Writes records to an underlying byte stream.
#[derive(Debug)]
pub struct RecordWriter<W: Write> {
    inner: W,
}

impl<W: Write> RecordWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn write_header(&mut self, record_type: RecordType, depth: u32, length: u64) -> Result<()> {
        let header = RawHeader {
            magic: MAGIC,
            record_type: record_type as u8,
            depth: depth.into(),
            length: length.into(),
        };
        self.inner.write_all(header.as_bytes())?;
        Ok(())
    }

    /// Writes a payload-free record.
    pub fn write_marker(&mut self, record_type: RecordType, depth: u32) -> Result<()> {
        self.write_header(record_type, depth, HEADER_SIZE)
    }

    pub fn write_entry(&mut self, depth: u32, mode: u32, size: u64, name: &[u8]) -> Result<()> {
        let length = ENTRY_FIXED_SIZE + name.len() as u64;
        self.write_header(RecordType::DirectoryEntry, depth, length)?;

        let metadata = RawEntryMetadata {
            mode: mode.into(),
            size: size.into(),
        };
        self.inner.write_all(metadata.as_bytes())?;
        self.inner.write_all(name)?;
        Ok(())
    }

    /// Writes a FILE_DATA record holding exactly `size` bytes taken from `content`.
    ///
    /// If `content` runs out early the header has already been written; the stream is left
    /// truncated and an UnexpectedEof error is returned.
    pub fn write_file_data(&mut self, depth: u32, size: u64, content: &mut impl Read) -> Result<()> {
        self.write_header(RecordType::FileData, depth, HEADER_SIZE + size)?;
        copy_exact(content, &mut self.inner, size)?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.inner.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

/// Reads records from an underlying byte stream.
#[derive(Debug)]
pub struct RecordReader<R: Read> {
    inner: R,
    pos: u64,
}

impl<R: Read> RecordReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner, pos: 0 }
    }

    /// Offset of the next unread byte.
    pub fn position(&self) -> u64 {
        self.pos
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        self.inner.read_exact(buf)?;
        self.pos += buf.len() as u64;
        Ok(())
    }

    /// Reads the next header.  Returns `None` if the stream ends cleanly before it.
    ///
    /// A stream that ends inside the magic, or holds something other than the magic, is a
    /// format error.  A stream that ends later in the header is an I/O error.
    pub fn read_header_opt(&mut self) -> Result<Option<Header>> {
        let start = self.pos;
        let mut raw = RawHeader::new_zeroed();
        let buf = raw.as_mut_bytes();
        let (magic, rest) = buf.split_at_mut(MAGIC.len());

        match read_exactish(&mut self.inner, magic) {
            Ok(true) => {}
            Ok(false) => return Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                // truncated inside the magic
                return Err(Error::BadMagic {
                    found: vec![],
                    pos: start,
                });
            }
            Err(e) => return Err(e.into()),
        }
        if magic != MAGIC {
            return Err(Error::BadMagic {
                found: magic.to_vec(),
                pos: start,
            });
        }
        self.pos += MAGIC.len() as u64;
        self.read_exact(rest)?;

        let header = Header {
            record_type: RecordType::try_from(raw.record_type)?,
            depth: raw.depth.get(),
            length: raw.length.get(),
        };
        log::trace!("@{start}: {header:?}");
        Ok(Some(header))
    }

    /// Reads the next header, treating a clean end of stream as a missing magic.
    pub fn read_header(&mut self) -> Result<Header> {
        let pos = self.pos;
        self.read_header_opt()?.ok_or(Error::BadMagic { found: vec![], pos })
    }

    /// Reads a header that must be of `record_type` at `depth`.  Payload-free record types must
    /// also have the exact header length.
    pub fn expect(&mut self, record_type: RecordType, depth: u32) -> Result<Header> {
        let header = self.read_header()?;
        header.check(record_type, depth)?;
        Ok(header)
    }

    /// Like [`Self::expect()`] but a clean end of stream gives `None`.
    pub fn expect_opt(&mut self, record_type: RecordType, depth: u32) -> Result<Option<Header>> {
        let Some(header) = self.read_header_opt()? else {
            return Ok(None);
        };
        header.check(record_type, depth)?;
        Ok(Some(header))
    }

    /// Reads the header that follows inside a DIRECTORY_START bracket at `depth`: either a
    /// DIRECTORY_ENTRY or the closing DIRECTORY_END.
    pub fn expect_entry_or_end(&mut self, depth: u32) -> Result<Header> {
        let header = self.read_header()?;
        match header.record_type {
            RecordType::DirectoryEntry | RecordType::DirectoryEnd => {}
            found => {
                return Err(Error::UnexpectedRecord {
                    expected: Expected::EntryOrEnd,
                    found,
                })
            }
        }
        header.check_depth(depth)?;
        header.check_marker_length()?;
        Ok(header)
    }

    pub fn read_entry_metadata(&mut self) -> Result<EntryMetadata> {
        let mut raw = RawEntryMetadata::new_zeroed();
        self.read_exact(raw.as_mut_bytes())?;
        Ok(EntryMetadata {
            mode: raw.mode.get(),
            size: raw.size.get(),
        })
    }

    /// Reads an entry name of `len` bytes.
    ///
    /// `limit` counts a terminator slot, like [`crate::Limits::max_name_len`].  An oversized
    /// name is rejected before any of it is consumed.
    pub fn read_name(&mut self, len: u64, limit: usize) -> Result<Vec<u8>> {
        if len.saturating_add(1) > limit as u64 {
            return Err(Error::NameTooLong {
                len: len.saturating_add(1),
                limit,
            });
        }
        let mut name = vec![0u8; len as usize];
        self.read_exact(&mut name)?;
        Ok(name)
    }

    /// Streams `len` payload bytes to `writer`.
    pub fn copy_payload(&mut self, len: u64, writer: &mut impl Write) -> Result<()> {
        copy_exact(&mut self.inner, writer, len)?;
        self.pos += len;
        Ok(())
    }

    /// Consumes and discards `len` payload bytes.
    pub fn skip_payload(&mut self, len: u64) -> Result<()> {
        self.copy_payload(len, &mut std::io::sink())
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}
