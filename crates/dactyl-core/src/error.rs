use thiserror::Error;

use crate::types::RetryCause;

pub type Result<T> = std::result::Result<T, Error>;

/// Error kinds of the device contract.
///
/// `Retry` is the only recoverable kind: the caller owns the
/// resubmission loop for verify/identify. Every other kind is terminal
/// for the operation that produced it, and the device is left
/// consistent (finger status reset, pending slot cleared) before the
/// error is reported.
#[derive(Debug, Error)]
pub enum Error {
    // Device lifecycle
    #[error("device is not open")]
    NotOpen,

    #[error("another operation is already pending on this device")]
    Busy,

    #[error("failed to open device: {0}")]
    Open(String),

    #[error("failed to close device: {0}")]
    Close(String),

    #[error("operation not supported by this device: {0}")]
    Unsupported(&'static str),

    // Operation outcomes
    #[error("scan was not usable ({0}), resubmit the operation")]
    Retry(RetryCause),

    #[error("no gallery print matched the probe")]
    NoMatch,

    #[error("enrollment failed: {0}")]
    EnrollFailed(String),

    #[error("operation was cancelled")]
    Cancelled,

    // Storage
    #[error("print is not present in device storage")]
    NotFound,

    // Data and transport
    #[error("malformed print data: {0}")]
    MalformedData(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a malformed-data error.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedData(message.into())
    }

    /// Create a protocol error.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }

    /// Create a transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    /// Create an enrollment failure.
    pub fn enroll_failed(message: impl Into<String>) -> Self {
        Self::EnrollFailed(message.into())
    }

    /// Whether this error obligates the caller to resubmit the same
    /// operation rather than treat it as a failure.
    pub fn is_retry(&self) -> bool {
        matches!(self, Self::Retry(_))
    }
}
