use std::fmt;
use std::io;

/// Errors raised by the storage path: buffer pool, segment files and stream writers.
#[derive(Debug)]
pub enum StorageError {
    /// A single I/O failure (open, read, write, fsync, close).
    Io(io::Error),
    /// A rollover attempted to open the next segment and/or close the previous one and at
    /// least one of the two steps failed. Both underlying errors are kept, not just the first.
    Rollover {
        open: Option<io::Error>,
        close: Option<io::Error>,
    },
    /// The record did not fit into a fresh, empty segment.
    MessageTooLarge,
    /// A flush attempted both a buffered-writer flush and an `fsync` and at least one failed.
    Flush {
        flush: Option<io::Error>,
        fsync: Option<io::Error>,
    },
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::Io(err) => write!(f, "storage io error: {}", err),
            StorageError::Rollover { open, close } => {
                write!(f, "segment rollover failed")?;
                if let Some(err) = open {
                    write!(f, "; open next segment: {}", err)?;
                }
                if let Some(err) = close {
                    write!(f, "; close previous segment: {}", err)?;
                }
                Ok(())
            }
            StorageError::MessageTooLarge => write!(f, "message too large for an empty segment"),
            StorageError::Flush { flush, fsync } => {
                write!(f, "segment flush failed")?;
                if let Some(err) = flush {
                    write!(f, "; buffered writer flush: {}", err)?;
                }
                if let Some(err) = fsync {
                    write!(f, "; fsync: {}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StorageError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for StorageError {
    #[inline]
    fn from(err: io::Error) -> Self {
        StorageError::Io(err)
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Errors raised while resolving or creating a stream's writer through the [`crate::manager::StreamManager`].
#[derive(Debug, Clone)]
pub enum ManagerError {
    /// Failed to lazily construct the stream's writer.
    Open(std::sync::Arc<StorageError>),
    /// The writer was resolved but the write itself failed.
    Write(std::sync::Arc<StorageError>),
}

impl fmt::Display for ManagerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ManagerError::Open(err) => write!(f, "failed to open stream writer: {}", err),
            ManagerError::Write(err) => write!(f, "failed to write record: {}", err),
        }
    }
}

impl std::error::Error for ManagerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ManagerError::Open(err) => Some(err.as_ref()),
            ManagerError::Write(err) => Some(err.as_ref()),
        }
    }
}
