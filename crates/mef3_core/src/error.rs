//! Error types for MEF3 core operations.

use crate::codec::CodecError;
use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur while writing or reading a segment.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] mef3_storage::StorageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Caller-supplied input is unusable (empty buffer, zero block size, ...).
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Description of the problem.
        message: String,
    },

    /// The block codec failed on a given block.
    #[error("codec error in block {block}: {source}")]
    Codec {
        /// Zero-based block number.
        block: u64,
        /// Underlying codec failure.
        #[source]
        source: CodecError,
    },

    /// An internal invariant was violated.
    #[error("internal invariant violated: {message}")]
    Logic {
        /// Description of the violated invariant.
        message: String,
    },

    /// A file on disk does not have the expected layout.
    #[error("invalid file format: {message}")]
    InvalidFormat {
        /// Description of the format issue.
        message: String,
    },

    /// Checksum mismatch detected.
    #[error("checksum mismatch: expected {expected:08x}, got {actual:08x}")]
    ChecksumMismatch {
        /// Expected checksum.
        expected: u32,
        /// Actual checksum.
        actual: u32,
    },

    /// A file-system precondition of a segment operation does not hold.
    #[error("precondition failed: {message}")]
    Precondition {
        /// Description of the failed precondition.
        message: String,
    },
}

/// Coarse classification of a [`CoreError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Fix the input and retry.
    InvalidArgument,
    /// Compression failed.
    Codec,
    /// Reading or writing a file failed.
    Io,
    /// A bug in this crate.
    Logic,
    /// A file on disk is corrupt or not a MEF3 file.
    Format,
}

impl CoreError {
    /// Creates an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates a logic error.
    pub fn logic(message: impl Into<String>) -> Self {
        Self::Logic {
            message: message.into(),
        }
    }

    /// Creates an invalid format error.
    pub fn invalid_format(message: impl Into<String>) -> Self {
        Self::InvalidFormat {
            message: message.into(),
        }
    }

    /// Creates a precondition error.
    pub fn precondition(message: impl Into<String>) -> Self {
        Self::Precondition {
            message: message.into(),
        }
    }

    /// Returns the classification of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidArgument { .. } | Self::Precondition { .. } => ErrorKind::InvalidArgument,
            Self::Codec { .. } => ErrorKind::Codec,
            Self::Storage(_) | Self::Io(_) => ErrorKind::Io,
            Self::Logic { .. } => ErrorKind::Logic,
            Self::InvalidFormat { .. } | Self::ChecksumMismatch { .. } => ErrorKind::Format,
        }
    }
}
