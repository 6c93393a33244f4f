use thiserror::Error;

/// Errors surfaced by channel, file and store operations.
#[derive(Debug, Error)]
pub enum FsError {
    #[error("channel is closed")]
    ClosedChannel,

    #[error("channel was closed by another thread during a blocking operation")]
    AsynchronousClose,

    #[error("channel was closed because the blocked thread was interrupted")]
    ClosedByInterrupt,

    #[error("channel is not open for reading")]
    NonReadable,

    #[error("channel is not open for writing")]
    NonWritable,

    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    #[error("{0} is not supported")]
    Unsupported(&'static str),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, FsError>;
