//! Sliding-window copy loops used by the range editor.
//!
//! Both shifts move the tail of a stream through buffers sized to the shift
//! margin, so memory use tracks the size of the edit and never the size of
//! the stream. Source and destination overlap in the same storage; the
//! cursor discipline below is what keeps the copies correct.

use crate::stream::RandomAccessStream;
use std::io::{self, SeekFrom};

/// Summary of one shift, for logging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShiftStats {
    /// Number of window-sized chunks relayed
    pub windows: u64,
    /// Total bytes relocated
    pub bytes_moved: u64,
}

/// Fill `buf` from the stream cursor until it is full or the stream ends.
///
/// A single `read` may return fewer bytes than requested without being at
/// end-of-stream; the shift loops treat a short window as "tail reached", so
/// they must only ever see short windows at the real end.
pub(crate) fn read_window<S>(stream: &mut S, buf: &mut [u8]) -> io::Result<usize>
where
    S: RandomAccessStream + ?Sized,
{
    let mut filled = 0;
    while filled < buf.len() {
        match stream.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Move every byte in `[read_cursor, len)` left by `margin`.
///
/// The write cursor trails the read cursor by exactly `margin` bytes, so a
/// read never observes a byte that an earlier write already replaced. The
/// stream length is left alone; the caller truncates afterwards.
///
/// Requires `read_cursor >= margin`.
pub fn shift_left<S>(stream: &mut S, read_cursor: u64, margin: usize) -> io::Result<ShiftStats>
where
    S: RandomAccessStream + ?Sized,
{
    let mut stats = ShiftStats::default();
    if margin == 0 {
        return Ok(stats);
    }

    let mut window = vec![0u8; margin];
    stream.seek(SeekFrom::Start(read_cursor))?;

    loop {
        let read = read_window(stream, &mut window)?;
        if read == 0 {
            break;
        }

        stream.seek(SeekFrom::Current(-((margin + read) as i64)))?;
        stream.write_all(&window[..read])?;
        stats.windows += 1;
        stats.bytes_moved += read as u64;

        if read < margin {
            break;
        }
        stream.seek(SeekFrom::Current(margin as i64))?;
    }

    tracing::trace!(
        read_cursor,
        margin,
        windows = stats.windows,
        bytes_moved = stats.bytes_moved,
        "left shift complete"
    );
    Ok(stats)
}

/// Write `payload` at `offset`, relaying the displaced tail right by
/// `payload.len()`.
///
/// Two buffers of `payload.len()` bytes alternate: `pending` holds bytes
/// already displaced and waiting for their new slot, `incoming` receives the
/// next chunk before `pending` overwrites it. No byte is overwritten before
/// it has been copied out.
///
/// Requires `offset <= len`. The stream grows by `payload.len()`.
pub fn shift_right<S>(stream: &mut S, offset: u64, payload: &[u8]) -> io::Result<ShiftStats>
where
    S: RandomAccessStream + ?Sized,
{
    let margin = payload.len();
    let mut stats = ShiftStats::default();
    if margin == 0 {
        return Ok(stats);
    }

    let mut pending = vec![0u8; margin];
    let mut incoming = vec![0u8; margin];

    stream.seek(SeekFrom::Start(offset))?;
    let mut pending_len = read_window(stream, &mut pending)?;
    stream.seek(SeekFrom::Start(offset))?;
    stream.write_all(payload)?;

    // Cursor now sits `margin` bytes past `offset`; everything from here on
    // is still original content.
    while pending_len == margin {
        let read = read_window(stream, &mut incoming)?;
        stream.seek(SeekFrom::Current(-(read as i64)))?;
        stream.write_all(&pending)?;
        stats.windows += 1;
        stats.bytes_moved += margin as u64;

        std::mem::swap(&mut pending, &mut incoming);
        pending_len = read;
    }

    if pending_len > 0 {
        stream.write_all(&pending[..pending_len])?;
        stats.windows += 1;
        stats.bytes_moved += pending_len as u64;
    }

    tracing::trace!(
        offset,
        margin,
        windows = stats.windows,
        bytes_moved = stats.bytes_moved,
        "right shift complete"
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// Returns at most `limit` bytes per read, to exercise refill logic.
    struct Trickle {
        inner: Cursor<Vec<u8>>,
        limit: usize,
    }

    impl RandomAccessStream for Trickle {
        fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
            RandomAccessStream::seek(&mut self.inner, pos)
        }

        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let end = buf.len().min(self.limit);
            RandomAccessStream::read(&mut self.inner, &mut buf[..end])
        }

        fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
            RandomAccessStream::write_all(&mut self.inner, buf)
        }

        fn set_len(&mut self, len: u64) -> io::Result<()> {
            RandomAccessStream::set_len(&mut self.inner, len)
        }

        fn len(&mut self) -> io::Result<u64> {
            RandomAccessStream::len(&mut self.inner)
        }
    }

    #[test]
    fn test_read_window_refills_short_reads() {
        let mut stream = Trickle {
            inner: Cursor::new(b"abcdefgh".to_vec()),
            limit: 3,
        };
        let mut buf = [0u8; 7];
        let n = read_window(&mut stream, &mut buf).unwrap();
        assert_eq!(n, 7);
        assert_eq!(&buf, b"abcdefg");
    }

    #[test]
    fn test_shift_left_moves_tail() {
        let mut stream = Cursor::new(b"ABCDEFGHIJ".to_vec());
        let stats = shift_left(&mut stream, 5, 3).unwrap();
        // Tail "FGHIJ" now starts at 2; the last 3 bytes are stale.
        assert_eq!(&stream.get_ref()[..7], b"ABFGHIJ");
        assert_eq!(stats.bytes_moved, 5);
        assert_eq!(stats.windows, 2);
    }

    #[test]
    fn test_shift_left_zero_margin_is_noop() {
        let mut stream = Cursor::new(b"ABC".to_vec());
        let stats = shift_left(&mut stream, 1, 0).unwrap();
        assert_eq!(stats, ShiftStats::default());
        assert_eq!(stream.get_ref(), b"ABC");
    }

    #[test]
    fn test_shift_right_relays_tail() {
        let mut stream = Cursor::new(b"ABFGHIJ".to_vec());
        shift_right(&mut stream, 2, b"XYZ").unwrap();
        assert_eq!(stream.get_ref(), b"ABXYZFGHIJ");
    }

    #[test]
    fn test_shift_right_margin_larger_than_tail() {
        let mut stream = Cursor::new(b"ABCD".to_vec());
        shift_right(&mut stream, 3, b"123456").unwrap();
        assert_eq!(stream.get_ref(), b"ABC123456D");
    }

    #[test]
    fn test_shift_right_exact_multiple_of_margin() {
        let mut stream = Cursor::new(b"0123".to_vec());
        shift_right(&mut stream, 0, b"ab").unwrap();
        assert_eq!(stream.get_ref(), b"ab0123");
    }

    #[test]
    fn test_shifts_with_trickling_reads() {
        let mut stream = Trickle {
            inner: Cursor::new(b"0123456789abcdef".to_vec()),
            limit: 1,
        };
        shift_right(&mut stream, 4, b"XYZW").unwrap();
        assert_eq!(stream.inner.get_ref(), b"0123XYZW456789abcdef");

        shift_left(&mut stream, 8, 4).unwrap();
        stream.set_len(16).unwrap();
        assert_eq!(stream.inner.get_ref(), b"0123456789abcdef");
    }
}
