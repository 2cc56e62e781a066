//! Prints the records of a stream without extracting anything.

use std::{
    ffi::OsStr,
    io::{Read, Write},
    os::unix::ffi::OsStrExt,
};

use crate::{
    error::{Error, Result},
    options::Limits,
    record::{RecordReader, RecordType, ENTRY_FIXED_SIZE, HEADER_SIZE},
};

/// Writes one line per record read from `input` to `output`, until the stream ends.
///
/// Only each record's own length is checked, not whether records appear in a valid order, so
/// this can be used to look at broken streams.  Depth is shown as indentation.
pub fn list(input: impl Read, mut output: impl Write) -> Result<()> {
    let mut reader = RecordReader::new(input);

    loop {
        let pos = reader.position();
        let Some(header) = reader.read_header_opt()? else {
            break;
        };

        let indent = "  ".repeat(header.depth.min(64) as usize);
        write!(
            output,
            "{pos:>10} {indent}{} depth={} length={}",
            header.record_type.name(),
            header.depth,
            header.length
        )?;

        match header.record_type {
            RecordType::DirectoryEntry => {
                let name_len =
                    header
                        .length
                        .checked_sub(ENTRY_FIXED_SIZE)
                        .ok_or(Error::InvalidLength {
                            record_type: header.record_type,
                            length: header.length,
                        })?;
                let metadata = reader.read_entry_metadata()?;
                let name = reader.read_name(name_len, Limits::default().max_name_len)?;
                write!(
                    output,
                    " mode={:o} size={} name={:?}",
                    metadata.mode,
                    metadata.size,
                    OsStr::from_bytes(&name)
                )?;
            }
            RecordType::FileData => reader.skip_payload(header.payload_len()?)?,
            _ if header.length != HEADER_SIZE => {
                return Err(Error::InvalidLength {
                    record_type: header.record_type,
                    length: header.length,
                })
            }
            _ => {}
        }
        writeln!(output)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use similar_asserts::assert_eq;

    use super::*;
    use crate::{error::ErrorKind, record::RecordWriter};

    #[test]
    fn test_list() {
        let mut bytes = vec![];
        let mut w = RecordWriter::new(&mut bytes);
        w.write_marker(RecordType::TransmissionStart, 0).unwrap();
        w.write_marker(RecordType::DirectoryStart, 1).unwrap();
        w.write_entry(1, 0o100644, 2, b"a.txt").unwrap();
        w.write_file_data(1, 2, &mut &b"hi"[..]).unwrap();
        w.write_marker(RecordType::DirectoryEnd, 1).unwrap();
        w.write_marker(RecordType::TransmissionEnd, 0).unwrap();

        let mut out = vec![];
        list(bytes.as_slice(), &mut out).unwrap();
        let expected = [
            "         0 START_OF_TRANSMISSION depth=0 length=16",
            "        16   START_OF_DIRECTORY depth=1 length=16",
            "        32   DIRECTORY_ENTRY depth=1 length=33 mode=100644 size=2 name=\"a.txt\"",
            "        65   FILE_DATA depth=1 length=18",
            "        83   END_OF_DIRECTORY depth=1 length=16",
            "        99 END_OF_TRANSMISSION depth=0 length=16",
            "",
        ]
        .join("\n");
        assert_eq!(String::from_utf8(out).unwrap(), expected);
    }

    #[test]
    fn test_list_truncated() {
        let mut bytes = vec![];
        let mut w = RecordWriter::new(&mut bytes);
        w.write_marker(RecordType::TransmissionStart, 0).unwrap();
        w.write_header(RecordType::FileData, 1, 100).unwrap();
        bytes.extend_from_slice(&[0u8; 40]);

        let err = list(bytes.as_slice(), &mut vec![]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
    }
}
