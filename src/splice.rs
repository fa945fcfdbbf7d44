use crate::editor::{RangeEditor, UpdateStrategy};
use crate::error::SpliceError;
use crate::stream::{FileStream, RandomAccessStream};
use std::cmp::Reverse;
use std::path::Path;
use thiserror::Error;
use xxhash_rust::xxh3::xxh3_64;

/// A single in-place range replacement with optional before-content
/// verification.
///
/// Deletes, inserts, and updates are all a `Splice`: a delete carries no
/// data, an insert has `count == 0`. A splice with neither is rejected as
/// empty input.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "Splice does nothing until apply() is called"]
pub struct Splice {
    /// Start of the replaced range
    pub offset: u64,
    /// Length of the replaced range
    pub count: u64,
    /// Bytes written in place of the range
    pub data: Vec<u8>,
    /// What the range must contain before the splice is applied
    pub expected_before: Option<SpliceVerification>,
}

/// Verification strategy for the bytes a splice replaces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpliceVerification {
    /// Exact byte match required
    ExactMatch(Vec<u8>),
    /// xxh3 hash of the expected bytes
    Hash(u64),
}

impl SpliceVerification {
    pub fn matches(&self, bytes: &[u8]) -> bool {
        match self {
            SpliceVerification::ExactMatch(expected) => bytes == expected.as_slice(),
            SpliceVerification::Hash(expected_hash) => xxh3_64(bytes) == *expected_hash,
        }
    }

    /// Create verification from bytes, using a hash above 1KB.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        if bytes.len() > 1024 {
            SpliceVerification::Hash(xxh3_64(bytes))
        } else {
            SpliceVerification::ExactMatch(bytes.to_vec())
        }
    }

    pub fn hash(&self) -> u64 {
        match self {
            SpliceVerification::Hash(h) => *h,
            SpliceVerification::ExactMatch(bytes) => xxh3_64(bytes),
        }
    }
}

#[derive(Error, Debug)]
pub enum SpliceApplyError {
    #[error("before-content verification failed at offset {offset} (count {count}): expected hash {expected:#018x}, found {found:#018x}")]
    BeforeContentMismatch {
        offset: u64,
        count: u64,
        expected: u64,
        found: u64,
    },

    #[error("splices overlap: [{first_offset}, {first_end}) and [{second_offset}, {second_end})")]
    Overlap {
        first_offset: u64,
        first_end: u64,
        second_offset: u64,
        second_end: u64,
    },

    #[error(transparent)]
    Splice(#[from] SpliceError),

    #[error("failed to open {path}: {source}")]
    Open {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl From<std::io::Error> for SpliceApplyError {
    fn from(e: std::io::Error) -> Self {
        SpliceApplyError::Splice(SpliceError::Io(e))
    }
}

/// State of a splice relative to current stream content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpliceStatus {
    /// Range is valid and verification (if any) passed
    Pending,
    /// The stream already holds the new data at `offset`
    AlreadyApplied,
}

/// Result of applying a splice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "SpliceResult should be checked for success/already-applied"]
pub enum SpliceResult {
    Applied {
        offset: u64,
        bytes_removed: u64,
        bytes_inserted: u64,
    },
    AlreadyApplied {
        offset: u64,
    },
}

impl SpliceResult {
    /// Change in stream length caused by this splice.
    pub fn length_delta(&self) -> i64 {
        match self {
            SpliceResult::Applied {
                bytes_removed,
                bytes_inserted,
                ..
            } => *bytes_inserted as i64 - *bytes_removed as i64,
            SpliceResult::AlreadyApplied { .. } => 0,
        }
    }
}

impl Splice {
    /// Replace `count` bytes at `offset` with `data`, verifying the current
    /// content equals `expected_before`.
    pub fn new(offset: u64, count: u64, data: impl Into<Vec<u8>>, expected_before: &[u8]) -> Self {
        Self {
            offset,
            count,
            data: data.into(),
            expected_before: Some(SpliceVerification::from_bytes(expected_before)),
        }
    }

    /// Replace `count` bytes at `offset` with `data`, unverified.
    pub fn update(offset: u64, count: u64, data: impl Into<Vec<u8>>) -> Self {
        Self {
            offset,
            count,
            data: data.into(),
            expected_before: None,
        }
    }

    pub fn insert(offset: u64, data: impl Into<Vec<u8>>) -> Self {
        Self::update(offset, 0, data)
    }

    pub fn delete(offset: u64, count: u64) -> Self {
        Self::update(offset, count, Vec::new())
    }

    pub fn with_verification(mut self, verification: SpliceVerification) -> Self {
        self.expected_before = Some(verification);
        self
    }

    /// End of the replaced range. Saturates; an overflowing range is
    /// rejected by the editor.
    pub fn end(&self) -> u64 {
        self.offset.saturating_add(self.count)
    }

    /// Validate the splice against current stream content without writing.
    pub fn status<S>(&self, stream: &mut S) -> Result<SpliceStatus, SpliceApplyError>
    where
        S: RandomAccessStream + ?Sized,
    {
        if self.count == 0 && self.data.is_empty() {
            return Err(SpliceError::EmptyInput.into());
        }

        let mut editor = RangeEditor::new(stream);
        let current = editor.read_range(self.offset, self.count)?;

        if !self.data.is_empty() && self.count == self.data.len() as u64 && current == self.data {
            return Ok(SpliceStatus::AlreadyApplied);
        }

        let Some(expected) = &self.expected_before else {
            return Ok(SpliceStatus::Pending);
        };
        if expected.matches(&current) {
            return Ok(SpliceStatus::Pending);
        }

        // A growing splice that already ran leaves its data where the old
        // range started. Shorter data cannot be told apart from a real
        // mismatch, so only growth gets this fallback.
        if self.data.len() as u64 > self.count {
            if let Ok(landed) = editor.read_range(self.offset, self.data.len() as u64) {
                if landed == self.data {
                    return Ok(SpliceStatus::AlreadyApplied);
                }
            }
        }

        tracing::warn!(
            offset = self.offset,
            count = self.count,
            "before-content verification failed"
        );
        Err(SpliceApplyError::BeforeContentMismatch {
            offset: self.offset,
            count: self.count,
            expected: expected.hash(),
            found: xxh3_64(&current),
        })
    }

    /// Apply this splice to the stream in place.
    pub fn apply<S>(&self, stream: &mut S) -> Result<SpliceResult, SpliceApplyError>
    where
        S: RandomAccessStream + ?Sized,
    {
        if self.status(stream)? == SpliceStatus::AlreadyApplied {
            return Ok(SpliceResult::AlreadyApplied {
                offset: self.offset,
            });
        }
        self.apply_unchecked(stream)
    }

    fn apply_unchecked<S>(&self, stream: &mut S) -> Result<SpliceResult, SpliceApplyError>
    where
        S: RandomAccessStream + ?Sized,
    {
        let mut editor = RangeEditor::new(stream);
        if self.data.is_empty() {
            editor.delete_range(self.offset, self.count)?;
        } else if self.count == 0 {
            editor.insert(self.offset, &self.data)?;
        } else {
            let strategy: UpdateStrategy = editor.update(self.offset, self.count, &self.data)?;
            tracing::trace!(offset = self.offset, ?strategy, "splice applied");
        }
        Ok(SpliceResult::Applied {
            offset: self.offset,
            bytes_removed: self.count,
            bytes_inserted: self.data.len() as u64,
        })
    }

    /// Open `path` for writing, apply the splice, and sync to disk.
    pub fn apply_to_path(&self, path: impl AsRef<Path>) -> Result<SpliceResult, SpliceApplyError> {
        let path = path.as_ref();
        let mut stream = open_writable(path)?;
        let result = self.apply(&mut stream)?;
        stream.sync()?;
        Ok(result)
    }

    /// Apply several splices to one stream.
    ///
    /// Offsets refer to the content before any splice runs. Every splice is
    /// validated first; they are then applied from the highest offset down,
    /// so no application moves the range of one still pending. Results come
    /// back in input order.
    pub fn apply_batch<S>(
        stream: &mut S,
        splices: &[Splice],
    ) -> Result<Vec<SpliceResult>, SpliceApplyError>
    where
        S: RandomAccessStream + ?Sized,
    {
        let order = Self::plan_batch(stream, splices)?;

        let mut results = vec![None; splices.len()];
        for (idx, status) in order {
            let splice = &splices[idx];
            let result = match status {
                SpliceStatus::AlreadyApplied => SpliceResult::AlreadyApplied {
                    offset: splice.offset,
                },
                SpliceStatus::Pending => splice.apply_unchecked(stream)?,
            };
            results[idx] = Some(result);
        }

        Ok(results.into_iter().flatten().collect())
    }

    /// Validate a batch without writing. Returns each splice's status in input
    /// order.
    pub fn check_batch<S>(
        stream: &mut S,
        splices: &[Splice],
    ) -> Result<Vec<SpliceStatus>, SpliceApplyError>
    where
        S: RandomAccessStream + ?Sized,
    {
        let order = Self::plan_batch(stream, splices)?;
        let mut statuses = vec![SpliceStatus::Pending; splices.len()];
        for (idx, status) in order {
            statuses[idx] = status;
        }
        Ok(statuses)
    }

    /// Order a batch for bottom-to-top application and validate each entry.
    ///
    /// Splices at the same offset run in reverse input order, so their data
    /// ends up in input order.
    fn plan_batch<S>(
        stream: &mut S,
        splices: &[Splice],
    ) -> Result<Vec<(usize, SpliceStatus)>, SpliceApplyError>
    where
        S: RandomAccessStream + ?Sized,
    {
        let mut order: Vec<usize> = (0..splices.len()).collect();
        order.sort_by_key(|&idx| (Reverse(splices[idx].offset), Reverse(idx)));

        // Each splice must end at or before the start of the one applied
        // just before it.
        for pair in order.windows(2) {
            let (applied, next) = (&splices[pair[0]], &splices[pair[1]]);
            if next.end() > applied.offset {
                return Err(SpliceApplyError::Overlap {
                    first_offset: next.offset,
                    first_end: next.end(),
                    second_offset: applied.offset,
                    second_end: applied.end(),
                });
            }
        }

        let mut planned = Vec::with_capacity(order.len());
        for idx in order {
            planned.push((idx, splices[idx].status(stream)?));
        }
        Ok(planned)
    }
}

pub(crate) fn open_writable(path: &Path) -> Result<FileStream, SpliceApplyError> {
    FileStream::open(path).map_err(|source| SpliceApplyError::Open {
        path: path.to_path_buf(),
        source,
    })
}
