use thiserror::Error;

/// Stream capability the engine requires before touching any bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Seek,
    Write,
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Capability::Seek => write!(f, "seek"),
            Capability::Write => write!(f, "write"),
        }
    }
}

#[derive(Error, Debug)]
pub enum SpliceError {
    #[error("invalid argument '{name}': {reason}")]
    InvalidArgument { name: &'static str, reason: String },

    #[error("'{name}' is out of range: {value} exceeds {limit}")]
    OutOfRange {
        name: &'static str,
        value: u64,
        limit: u64,
    },

    #[error("cannot {capability} in the stream")]
    Unsupported { capability: Capability },

    #[error("data to insert is empty")]
    EmptyInput,

    #[error("stream I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SpliceError {
    /// True when the error was raised by validation, i.e. before any byte of
    /// the stream was written.
    pub fn is_validation(&self) -> bool {
        !matches!(self, SpliceError::Io(_))
    }
}
