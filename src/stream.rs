//! The random-access stream capability the splice engine drives.
//!
//! The engine never opens or closes a stream. Callers own the lifecycle and
//! hand the editor a `&mut` borrow for the duration of one operation.

use std::fs::{File, OpenOptions};
use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};
use std::path::Path;

/// Seekable, readable, writable byte sequence with a mutable length.
pub trait RandomAccessStream {
    /// Move the cursor, returning the new absolute position.
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64>;

    /// Read up to `buf.len()` bytes at the cursor. Returns 0 at end-of-stream.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Write all of `buf` at the cursor, advancing it.
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()>;

    /// Truncate or extend the stream to exactly `len` bytes.
    fn set_len(&mut self, len: u64) -> io::Result<()>;

    /// Current length in bytes.
    fn len(&mut self) -> io::Result<u64>;

    fn is_empty(&mut self) -> io::Result<bool> {
        Ok(self.len()? == 0)
    }

    fn can_seek(&self) -> bool {
        true
    }

    fn can_write(&self) -> bool {
        true
    }
}

impl RandomAccessStream for File {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        Seek::seek(self, pos)
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Read::read(self, buf)
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        Write::write_all(self, buf)
    }

    fn set_len(&mut self, len: u64) -> io::Result<()> {
        File::set_len(self, len)
    }

    fn len(&mut self) -> io::Result<u64> {
        Ok(self.metadata()?.len())
    }
}

/// A [`File`] that remembers whether it was opened for writing.
///
/// A bare `File` cannot report its access mode, so edits on a read-only
/// handle would only fail at the first write. `FileStream` lets the editor
/// reject them up front instead.
#[derive(Debug)]
pub struct FileStream {
    file: File,
    writable: bool,
}

impl FileStream {
    /// Open an existing file for reading and writing.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        Ok(Self {
            file,
            writable: true,
        })
    }

    /// Open an existing file for reading only. Every edit on it fails with
    /// an unsupported-capability error.
    pub fn open_read_only(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::open(path)?;
        Ok(Self {
            file,
            writable: false,
        })
    }

    pub fn from_file(file: File, writable: bool) -> Self {
        Self { file, writable }
    }

    /// Flush file content and metadata to disk.
    pub fn sync(&self) -> io::Result<()> {
        self.file.sync_all()
    }

    pub fn into_inner(self) -> File {
        self.file
    }
}

impl RandomAccessStream for FileStream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        Seek::seek(&mut self.file, pos)
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Read::read(&mut self.file, buf)
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        Write::write_all(&mut self.file, buf)
    }

    fn set_len(&mut self, len: u64) -> io::Result<()> {
        self.file.set_len(len)
    }

    fn len(&mut self) -> io::Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    fn can_write(&self) -> bool {
        self.writable
    }
}

fn resize_vec(vec: &mut Vec<u8>, len: u64) -> io::Result<()> {
    let len = usize::try_from(len).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            "length does not fit in memory buffer",
        )
    })?;
    vec.resize(len, 0);
    Ok(())
}

impl RandomAccessStream for Cursor<Vec<u8>> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        Seek::seek(self, pos)
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Read::read(self, buf)
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        Write::write_all(self, buf)
    }

    fn set_len(&mut self, len: u64) -> io::Result<()> {
        resize_vec(self.get_mut(), len)
    }

    fn len(&mut self) -> io::Result<u64> {
        Ok(self.get_ref().len() as u64)
    }
}

impl RandomAccessStream for Cursor<&mut Vec<u8>> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        Seek::seek(self, pos)
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Read::read(self, buf)
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        Write::write_all(self, buf)
    }

    fn set_len(&mut self, len: u64) -> io::Result<()> {
        resize_vec(self.get_mut(), len)
    }

    fn len(&mut self) -> io::Result<u64> {
        Ok(self.get_ref().len() as u64)
    }
}

/// Borrowed bytes: readable and seekable, never writable.
impl RandomAccessStream for Cursor<&[u8]> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        Seek::seek(self, pos)
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Read::read(self, buf)
    }

    fn write_all(&mut self, _buf: &[u8]) -> io::Result<()> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "borrowed slice is read-only",
        ))
    }

    fn set_len(&mut self, _len: u64) -> io::Result<()> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "borrowed slice is read-only",
        ))
    }

    fn len(&mut self) -> io::Result<u64> {
        Ok(self.get_ref().len() as u64)
    }

    fn can_write(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_vec_set_len_truncates_and_extends() {
        let mut stream = Cursor::new(b"hello".to_vec());
        stream.set_len(3).unwrap();
        assert_eq!(stream.get_ref(), b"hel");
        stream.set_len(5).unwrap();
        assert_eq!(stream.get_ref(), b"hel\0\0");
        assert_eq!(RandomAccessStream::len(&mut stream).unwrap(), 5);
    }

    #[test]
    fn test_borrowed_slice_is_read_only() {
        let data = b"abc".to_vec();
        let mut stream = Cursor::new(data.as_slice());
        assert!(!stream.can_write());
        assert!(RandomAccessStream::write_all(&mut stream, b"x").is_err());
        assert!(RandomAccessStream::set_len(&mut stream, 0).is_err());
    }

    #[test]
    fn test_file_stream_capabilities() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("data.bin");
        std::fs::write(&path, b"0123456789").unwrap();

        let mut rw = FileStream::open(&path).unwrap();
        assert!(rw.can_write());
        assert_eq!(rw.len().unwrap(), 10);

        let ro = FileStream::open_read_only(&path).unwrap();
        assert!(!ro.can_write());
        assert!(ro.can_seek());
    }
}
