use crate::error::{Capability, SpliceError};
use crate::stream::RandomAccessStream;
use crate::window::{self, read_window, ShiftStats};
use std::io::SeekFrom;

/// In-place delete, insert, and update of byte ranges on a borrowed stream.
///
/// The editor holds nothing but the borrow. Each call validates its
/// arguments before touching the stream, then shifts the tail through a
/// buffer sized to the edit margin. Calls are not transactional: an I/O
/// failure partway through a shift leaves the stream partially shifted.
///
/// The stream cursor position after any call is unspecified.
#[derive(Debug)]
pub struct RangeEditor<'a, S: RandomAccessStream + ?Sized> {
    stream: &'a mut S,
}

/// How an update was carried out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateStrategy {
    /// Same size: plain overwrite
    Overwrite,
    /// Replacement shorter than the range: overwrite then delete the surplus
    Shrink { surplus: u64 },
    /// Replacement longer than the range: save the margin, overwrite, re-insert
    Grow { margin: u64 },
}

impl<'a, S: RandomAccessStream + ?Sized> RangeEditor<'a, S> {
    pub fn new(stream: &'a mut S) -> Self {
        Self { stream }
    }

    /// Remove `count` bytes starting at `offset`, shifting the tail left and
    /// truncating the stream by `count`.
    pub fn delete_range(&mut self, offset: u64, count: u64) -> Result<(), SpliceError> {
        self.check_capabilities()?;
        let len = self.stream.len()?;
        let end = range_end(offset, count, "count")?;
        if end > len {
            return Err(SpliceError::OutOfRange {
                name: "offset + count",
                value: end,
                limit: len,
            });
        }
        let margin = margin_size(count, "count")?;

        tracing::debug!(offset, count, len, "delete range");
        self.delete_unchecked(offset, margin, len)?;
        Ok(())
    }

    /// Insert `data[data_offset..data_offset + data_count]` at `offset`,
    /// shifting existing bytes at and after `offset` right.
    ///
    /// `offset == len` appends without shifting.
    pub fn insert_range(
        &mut self,
        offset: u64,
        data: &[u8],
        data_offset: usize,
        data_count: usize,
    ) -> Result<(), SpliceError> {
        self.check_capabilities()?;
        let payload = select(data, data_offset, data_count)?;
        if payload.is_empty() {
            return Err(SpliceError::EmptyInput);
        }
        let len = self.stream.len()?;
        if offset > len {
            return Err(SpliceError::OutOfRange {
                name: "offset",
                value: offset,
                limit: len,
            });
        }

        tracing::debug!(offset, data_count, len, "insert range");
        if offset == len {
            self.stream.seek(SeekFrom::Start(offset))?;
            self.stream.write_all(payload)?;
        } else {
            window::shift_right(self.stream, offset, payload)?;
        }
        Ok(())
    }

    /// Insert all of `data` at `offset`.
    pub fn insert(&mut self, offset: u64, data: &[u8]) -> Result<(), SpliceError> {
        self.insert_range(offset, data, 0, data.len())
    }

    /// Replace the `count` bytes at `offset` with
    /// `data[data_offset..data_offset + data_count]`.
    ///
    /// A zero-length replacement is a pure delete.
    pub fn update_range(
        &mut self,
        offset: u64,
        count: u64,
        data: &[u8],
        data_offset: usize,
        data_count: usize,
    ) -> Result<UpdateStrategy, SpliceError> {
        self.check_capabilities()?;
        let payload = select(data, data_offset, data_count)?;
        let len = self.stream.len()?;
        if offset > len {
            return Err(SpliceError::OutOfRange {
                name: "offset",
                value: offset,
                limit: len,
            });
        }
        let end = range_end(offset, count, "count")?;
        if end > len {
            return Err(SpliceError::OutOfRange {
                name: "offset + count",
                value: end,
                limit: len,
            });
        }

        let new_count = payload.len() as u64;
        let strategy = if new_count == count {
            UpdateStrategy::Overwrite
        } else if new_count < count {
            UpdateStrategy::Shrink {
                surplus: count - new_count,
            }
        } else {
            UpdateStrategy::Grow {
                margin: new_count - count,
            }
        };
        tracing::debug!(offset, count, data_count, len, ?strategy, "update range");

        match strategy {
            UpdateStrategy::Overwrite => {
                self.stream.seek(SeekFrom::Start(offset))?;
                self.stream.write_all(payload)?;
            }
            UpdateStrategy::Shrink { surplus } => {
                self.stream.seek(SeekFrom::Start(offset))?;
                self.stream.write_all(payload)?;
                let margin = margin_size(surplus, "count")?;
                self.delete_unchecked(offset + new_count, margin, len)?;
            }
            UpdateStrategy::Grow { margin } => {
                // Save the bytes the longer payload is about to cover. Near the
                // end of the stream fewer than `margin` may exist.
                let mut saved = vec![0u8; margin_size(margin, "data_count")?];
                self.stream.seek(SeekFrom::Start(end))?;
                let saved_len = read_window(self.stream, &mut saved)?;

                self.stream.seek(SeekFrom::Start(offset))?;
                self.stream.write_all(payload)?;

                // Everything past the saved bytes is untouched; relay it right
                // by the number of bytes actually saved. A short save means the
                // payload already reached the end and the relay just appends.
                window::shift_right(self.stream, offset + new_count, &saved[..saved_len])?;
            }
        }
        Ok(strategy)
    }

    /// Replace the `count` bytes at `offset` with all of `data`.
    pub fn update(
        &mut self,
        offset: u64,
        count: u64,
        data: &[u8],
    ) -> Result<UpdateStrategy, SpliceError> {
        self.update_range(offset, count, data, 0, data.len())
    }

    /// Read `count` bytes at `offset` without modifying the stream.
    pub fn read_range(&mut self, offset: u64, count: u64) -> Result<Vec<u8>, SpliceError> {
        if !self.stream.can_seek() {
            return Err(SpliceError::Unsupported {
                capability: Capability::Seek,
            });
        }
        let len = self.stream.len()?;
        let end = range_end(offset, count, "count")?;
        if end > len {
            return Err(SpliceError::OutOfRange {
                name: "offset + count",
                value: end,
                limit: len,
            });
        }
        let mut buf = vec![0u8; margin_size(count, "count")?];
        self.stream.seek(SeekFrom::Start(offset))?;
        let read = read_window(self.stream, &mut buf)?;
        buf.truncate(read);
        Ok(buf)
    }

    fn delete_unchecked(
        &mut self,
        offset: u64,
        margin: usize,
        len: u64,
    ) -> Result<ShiftStats, SpliceError> {
        let stats = window::shift_left(self.stream, offset + margin as u64, margin)?;
        self.stream.set_len(len - margin as u64)?;
        Ok(stats)
    }

    fn check_capabilities(&self) -> Result<(), SpliceError> {
        if !self.stream.can_seek() {
            return Err(SpliceError::Unsupported {
                capability: Capability::Seek,
            });
        }
        if !self.stream.can_write() {
            return Err(SpliceError::Unsupported {
                capability: Capability::Write,
            });
        }
        Ok(())
    }
}

fn range_end(offset: u64, count: u64, name: &'static str) -> Result<u64, SpliceError> {
    offset
        .checked_add(count)
        .ok_or_else(|| SpliceError::InvalidArgument {
            name,
            reason: format!("range {offset} + {count} overflows"),
        })
}

/// Window buffers are allocated in memory, so a margin must fit in `usize`.
fn margin_size(margin: u64, name: &'static str) -> Result<usize, SpliceError> {
    usize::try_from(margin).map_err(|_| SpliceError::InvalidArgument {
        name,
        reason: format!("margin of {margin} bytes cannot be buffered"),
    })
}

fn select(data: &[u8], data_offset: usize, data_count: usize) -> Result<&[u8], SpliceError> {
    let end = data_offset
        .checked_add(data_count)
        .ok_or_else(|| SpliceError::InvalidArgument {
            name: "data_count",
            reason: format!("data range {data_offset} + {data_count} overflows"),
        })?;
    if end > data.len() {
        return Err(SpliceError::OutOfRange {
            name: "data_offset + data_count",
            value: end as u64,
            limit: data.len() as u64,
        });
    }
    Ok(&data[data_offset..end])
}
