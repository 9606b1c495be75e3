use thiserror::Error;

/// Unified error type for checkpoint store operations.
///
/// Low-level I/O failures are wrapped with a context string naming the file,
/// partition group, and block or byte range involved, so a failure deep in a
/// retry loop still points at the offending split.
#[derive(Error, Debug)]
pub enum CheckpointError {
    /// Missing or non-directory path, or an inconsistent split configuration.
    #[error("invalid directory: {0}")]
    InvalidDirectory(String),

    /// An expected checkpoint file is absent under check-only or non-create open.
    #[error("checkpoint file not found: {0}")]
    FileNotFound(String),

    /// Underlying read/fsync/hole-punch failure, or a partial transfer that
    /// exhausted its retry budget.
    #[error("I/O error ({context}): {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// `read_block` range precondition violation.
    #[error("checkpoint file read failed ({0})")]
    ReadChunkFailed(String),

    /// Terminal failure in `write_block` or `write_partial_block`.
    #[error("checkpoint file write failed ({context}): {source}")]
    WriteFailed {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl CheckpointError {
    /// Stable numeric code for each error kind, for trace correlation.
    pub fn code(&self) -> u32 {
        match self {
            CheckpointError::InvalidDirectory(_) => 1,
            CheckpointError::FileNotFound(_) => 2,
            CheckpointError::Io { .. } => 3,
            CheckpointError::ReadChunkFailed(_) => 4,
            CheckpointError::WriteFailed { .. } => 5,
        }
    }

    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        CheckpointError::Io {
            context: context.into(),
            source,
        }
    }

    pub(crate) fn write(context: impl Into<String>, source: std::io::Error) -> Self {
        CheckpointError::WriteFailed {
            context: context.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, CheckpointError>;
