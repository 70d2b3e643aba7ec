use std::io::{Error as IoError, ErrorKind};
use std::time::Duration;

use thiserror::Error;

/// Failure inside a single check.
///
/// Never leaves a checker: it is turned into a `down` result at the
/// checker boundary.
#[derive(Debug, Error)]
pub enum CheckError {
    /// Refused, unreachable, DNS failure and other transport errors
    #[error("{0}")]
    Connection(String),
    #[error("Connection timed out after {0:?}")]
    Timeout(Duration),
    /// Malformed or unexpected framing from the remote side
    #[error("{0}")]
    Protocol(String),
    #[error("Unexpected status code: {0}")]
    UnexpectedStatus(u16),
    #[error("Expected keyword not found")]
    KeywordNotFound { status_code: u16 },
    /// The remote answered but its answer is not healthy
    #[error("{0}")]
    Validation(String),
}

impl CheckError {
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection(message.into())
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Status code observed before the failure, if any
    pub fn status_code(&self) -> Option<u16> {
        match self {
            CheckError::UnexpectedStatus(code) => Some(*code),
            CheckError::KeywordNotFound { status_code } => Some(*status_code),
            _ => None,
        }
    }
}

impl From<IoError> for CheckError {
    fn from(error: IoError) -> Self {
        match error.kind() {
            ErrorKind::UnexpectedEof => {
                CheckError::Protocol(format!("Connection closed mid-response: {error}"))
            }
            ErrorKind::InvalidData => CheckError::Protocol(error.to_string()),
            _ => CheckError::Connection(error.to_string()),
        }
    }
}

/// Errors returned to callers of the registry
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Unknown monitor type: {0}")]
    UnknownMonitorType(String),
}
