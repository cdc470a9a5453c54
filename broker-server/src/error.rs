use broker_core::{ManagerError, WireError};
use std::fmt;
use std::io;

/// Errors raised at the networking boundary: either a fatal per-connection wire-parse failure, a
/// failure to resolve/write through the stream manager, or an I/O failure on the listener itself.
#[derive(Debug)]
pub enum EngineError {
    Wire(WireError),
    Manager(ManagerError),
    Io(io::Error),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::Wire(err) => write!(f, "wire parse error: {}", err),
            EngineError::Manager(err) => write!(f, "stream manager error: {}", err),
            EngineError::Io(err) => write!(f, "network io error: {}", err),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EngineError::Wire(err) => Some(err),
            EngineError::Manager(err) => Some(err),
            EngineError::Io(err) => Some(err),
        }
    }
}

impl From<io::Error> for EngineError {
    #[inline]
    fn from(err: io::Error) -> Self {
        EngineError::Io(err)
    }
}

impl From<WireError> for EngineError {
    #[inline]
    fn from(err: WireError) -> Self {
        EngineError::Wire(err)
    }
}

impl From<ManagerError> for EngineError {
    #[inline]
    fn from(err: ManagerError) -> Self {
        EngineError::Manager(err)
    }
}
