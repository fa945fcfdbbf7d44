//! Byte Splice: in-place, bounded-memory byte-range editing
//!
//! Delete, insert, or replace a contiguous range of bytes at any offset of a
//! random-access file, shifting everything after it, without reading the
//! file into memory.
//!
//! # Architecture
//!
//! [`RangeEditor`] validates arguments and picks a strategy; the
//! [`window`] module moves the tail of the stream through buffers sized to
//! the edit margin (`count`, `data_count`, or their difference). Memory use
//! never depends on the stream length.
//!
//! Higher layers compile down to the editor: [`Splice`] adds before-content
//! verification and bottom-to-top batching, and [`config`] loads TOML plans
//! of splices.
//!
//! # Guarantees and limits
//!
//! - Arguments are validated before the stream is touched
//! - Edits are not transactional: an I/O error mid-shift leaves the file
//!   partially shifted
//! - No locking; callers serialize access to a stream
//! - No ceiling on the margin buffer size
//!
//! # Example
//!
//! ```no_run
//! use byte_splice::{FileStream, RangeEditor};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut stream = FileStream::open("records.bin")?;
//! let mut editor = RangeEditor::new(&mut stream);
//!
//! editor.delete_range(2, 3)?;
//! editor.insert(2, b"XYZ")?;
//! editor.update(0, 2, b"header")?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod editor;
pub mod error;
pub mod safety;
pub mod splice;
pub mod stream;
pub mod window;

// Re-exports
pub use config::{
    apply_plan, check_plan, load_from_path, load_from_str, ApplicationError, ConfigError,
    PlanConfig, PlanResult,
};
pub use editor::{RangeEditor, UpdateStrategy};
pub use error::{Capability, SpliceError};
pub use safety::{PathGuard, SafetyError};
pub use splice::{Splice, SpliceApplyError, SpliceResult, SpliceStatus, SpliceVerification};
pub use stream::{FileStream, RandomAccessStream};
pub use window::{shift_left, shift_right, ShiftStats};
