//! Walks a directory tree and writes it out as a record stream.

use std::{
    ffi::OsStr,
    fs::File,
    io::Write,
    os::unix::ffi::OsStrExt,
};

use log::debug;
use rustix::fs::{fstat, openat, statat, AtFlags, Dir, FileType, Mode, OFlags, CWD};

use crate::{
    error::{Error, Result},
    options::Options,
    path_stack::PathStack,
    record::{RecordType, RecordWriter},
    util::at_eof,
};

/// The state of one serialize operation: where we are in the tree and where the records go.
#[derive(Debug)]
pub struct Serializer<W: Write> {
    path: PathStack,
    output: RecordWriter<W>,
}

impl<W: Write> Serializer<W> {
    pub fn new(path: PathStack, output: W) -> Self {
        Self {
            path,
            output: RecordWriter::new(output),
        }
    }

    /// Writes the whole transmission: the contents of the current directory, bracketed by the
    /// transmission markers.  The directory itself is not recorded, only what it contains.
    pub fn serialize(&mut self) -> Result<()> {
        self.output.write_marker(RecordType::TransmissionStart, 0)?;
        self.serialize_directory(1)?;
        self.output.write_marker(RecordType::TransmissionEnd, 0)?;
        self.output.flush()
    }

    /// Writes a DIRECTORY_START…DIRECTORY_END bracket for the directory named by the path, with
    /// all of its entries at `depth` and subdirectories recursively at `depth + 1`.
    fn serialize_directory(&mut self, depth: u32) -> Result<()> {
        let fd = openat(
            CWD,
            self.path.as_path(),
            OFlags::RDONLY | OFlags::DIRECTORY | OFlags::CLOEXEC,
            Mode::empty(),
        )?;

        self.output.write_marker(RecordType::DirectoryStart, depth)?;

        // Entries come in whatever order the filesystem hands them out.
        for item in Dir::read_from(&fd)? {
            let entry = item?;
            let name = OsStr::from_bytes(entry.file_name().to_bytes());

            if name == "." || name == ".." {
                continue;
            }

            self.path.push(name)?;
            let result = self.serialize_entry(name, depth);
            self.path.pop()?;
            result?;
        }

        self.output.write_marker(RecordType::DirectoryEnd, depth)
    }

    fn serialize_entry(&mut self, name: &OsStr, depth: u32) -> Result<()> {
        let stat = statat(CWD, self.path.as_path(), AtFlags::SYMLINK_NOFOLLOW)?;
        let size = stat.st_size as u64;

        match FileType::from_raw_mode(stat.st_mode) {
            FileType::RegularFile => {
                self.output
                    .write_entry(depth, stat.st_mode, size, name.as_bytes())?;
                self.serialize_file(depth, size)
            }
            FileType::Directory => {
                debug!("Directory {:?} at depth {}", self.path.as_path(), depth);
                self.output
                    .write_entry(depth, stat.st_mode, size, name.as_bytes())?;
                self.serialize_directory(depth + 1)
            }
            other => {
                debug!("Skipping {:?}: {:?}", self.path.as_path(), other);
                Ok(())
            }
        }
    }

    /// Writes the FILE_DATA record for the regular file named by the path.  `size` is what the
    /// DIRECTORY_ENTRY declared; the file has to still hold exactly that many bytes.
    fn serialize_file(&mut self, depth: u32, size: u64) -> Result<()> {
        let fd = openat(
            CWD,
            self.path.as_path(),
            OFlags::RDONLY | OFlags::NOFOLLOW | OFlags::CLOEXEC,
            Mode::empty(),
        )?;

        if fstat(&fd)?.st_size as u64 != size {
            return Err(self.size_changed(size));
        }

        let mut file = File::from(fd);
        debug!("File {:?}: {} bytes", self.path.as_path(), size);
        self.output
            .write_file_data(depth, size, &mut file)
            .map_err(|err| match err {
                Error::Io(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    self.size_changed(size)
                }
                other => other,
            })?;

        if !at_eof(&mut file)? {
            return Err(self.size_changed(size));
        }
        Ok(())
    }

    fn size_changed(&self, expected: u64) -> Error {
        Error::SizeChanged {
            path: self.path.as_path().to_path_buf(),
            expected,
        }
    }

    pub fn into_inner(self) -> W {
        self.output.into_inner()
    }
}

/// Serializes the contents of the directory `base` to `output`.
///
/// On failure, whatever was already written stays written.
pub fn serialize(base: impl AsRef<OsStr>, output: impl Write, options: &Options) -> Result<()> {
    let path = PathStack::new(base, options.limits.max_path_len)?;
    Serializer::new(path, output).serialize()
}

#[cfg(test)]
mod tests {
    use std::{fs, os::unix::fs::PermissionsExt, path::Path};

    use super::*;
    use crate::{
        error::ErrorKind,
        options::Limits,
        record::{RecordReader, ENTRY_FIXED_SIZE},
        test::tempdir,
    };

    fn serialize_to_vec(path: &Path) -> Result<Vec<u8>> {
        let mut out = vec![];
        serialize(path, &mut out, &Options::default())?;
        Ok(out)
    }

    #[test]
    fn test_empty_directory() {
        let td = tempdir();
        let bytes = serialize_to_vec(td.path()).unwrap();
        assert_eq!(bytes.len(), 4 * 16);

        let mut r = RecordReader::new(bytes.as_slice());
        r.expect(RecordType::TransmissionStart, 0).unwrap();
        r.expect(RecordType::DirectoryStart, 1).unwrap();
        r.expect(RecordType::DirectoryEnd, 1).unwrap();
        r.expect(RecordType::TransmissionEnd, 0).unwrap();
        assert_eq!(r.read_header_opt().unwrap(), None);
    }

    #[test]
    fn test_single_file() {
        let td = tempdir();
        let file = td.path().join("a.txt");
        fs::write(&file, b"hi").unwrap();
        fs::set_permissions(&file, fs::Permissions::from_mode(0o644)).unwrap();

        let bytes = serialize_to_vec(td.path()).unwrap();
        let mut r = RecordReader::new(bytes.as_slice());
        r.expect(RecordType::TransmissionStart, 0).unwrap();
        r.expect(RecordType::DirectoryStart, 1).unwrap();

        let header = r.expect_entry_or_end(1).unwrap();
        assert_eq!(header.record_type, RecordType::DirectoryEntry);
        assert_eq!(header.length, ENTRY_FIXED_SIZE + 5);
        let metadata = r.read_entry_metadata().unwrap();
        assert_eq!(metadata.mode & 0o777, 0o644);
        assert_eq!(FileType::from_raw_mode(metadata.mode), FileType::RegularFile);
        assert_eq!(metadata.size, 2);
        assert_eq!(r.read_name(5, 256).unwrap(), b"a.txt");

        let header = r.expect(RecordType::FileData, 1).unwrap();
        assert_eq!(header.length, 18);
        let mut content = vec![];
        r.copy_payload(2, &mut content).unwrap();
        assert_eq!(content, b"hi");

        r.expect(RecordType::DirectoryEnd, 1).unwrap();
        r.expect(RecordType::TransmissionEnd, 0).unwrap();
    }

    #[test]
    fn test_nested_depths() {
        let td = tempdir();
        fs::create_dir_all(td.path().join("x/y")).unwrap();

        let bytes = serialize_to_vec(td.path()).unwrap();
        let mut r = RecordReader::new(bytes.as_slice());
        r.expect(RecordType::TransmissionStart, 0).unwrap();
        for depth in 1..=2 {
            r.expect(RecordType::DirectoryStart, depth).unwrap();
            let header = r.expect_entry_or_end(depth).unwrap();
            assert_eq!(header.record_type, RecordType::DirectoryEntry);
            let metadata = r.read_entry_metadata().unwrap();
            assert_eq!(FileType::from_raw_mode(metadata.mode), FileType::Directory);
            r.read_name(1, 256).unwrap();
        }
        // y is empty
        r.expect(RecordType::DirectoryStart, 3).unwrap();
        r.expect(RecordType::DirectoryEnd, 3).unwrap();

        r.expect(RecordType::DirectoryEnd, 2).unwrap();
        r.expect(RecordType::DirectoryEnd, 1).unwrap();
        r.expect(RecordType::TransmissionEnd, 0).unwrap();
    }

    #[test]
    fn test_symlinks_skipped() {
        let td = tempdir();
        std::os::unix::fs::symlink("nowhere", td.path().join("link")).unwrap();

        let bytes = serialize_to_vec(td.path()).unwrap();
        assert_eq!(bytes.len(), 4 * 16);
    }

    #[test]
    fn test_missing_directory() {
        let td = tempdir();
        let err = serialize_to_vec(&td.path().join("nope")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[test]
    fn test_path_too_long() {
        let td = tempdir();
        fs::write(td.path().join("a-rather-long-file-name"), b"").unwrap();

        let base = td.path().as_os_str().len();
        let options = Options {
            limits: Limits {
                max_path_len: base + 8,
                ..Default::default()
            },
            ..Default::default()
        };
        let err = serialize(td.path(), &mut vec![], &options).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Capacity);
    }

    #[test]
    fn test_size_changed() {
        let td = tempdir();
        let file = td.path().join("f");
        fs::write(&file, b"0123456789").unwrap();

        for size in [9, 11] {
            let path = PathStack::new(&file, 1024).unwrap();
            let err = Serializer::new(path, vec![])
                .serialize_file(1, size)
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Io);
            match err {
                Error::SizeChanged { path, expected } => {
                    assert_eq!(path, file);
                    assert_eq!(expected, size);
                }
                other => panic!("expected SizeChanged, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_file_data_record() {
        let td = tempdir();
        let file = td.path().join("f");
        fs::write(&file, b"abc").unwrap();

        let path = PathStack::new(&file, 1024).unwrap();
        let mut serializer = Serializer::new(path, vec![]);
        serializer.serialize_file(2, 3).unwrap();
        let bytes = serializer.into_inner();
        assert_eq!(bytes.len(), 19);
        assert_eq!(&bytes[16..], b"abc");

        let mut r = RecordReader::new(bytes.as_slice());
        assert_eq!(r.expect(RecordType::FileData, 2).unwrap().length, 19);
    }
}
