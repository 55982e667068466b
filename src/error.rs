//! Error types for Sonora

use crate::system::SystemError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SonoraError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Lookup failed: {0}")]
    LookupFailed(String),

    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    #[error("Asset unavailable: {0}")]
    AssetUnavailable(String),

    #[error("Buffer at {address:#x} is not {alignment} byte aligned")]
    Misaligned { address: usize, alignment: usize },

    #[error("Audio system error: {0}")]
    System(#[from] SystemError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Audio file error: {0}")]
    AudioFile(String),
}

pub type Result<T> = std::result::Result<T, SonoraError>;

/// Outcome of a request handed to the adapter by the host.
///
/// `Pending` means the request was accepted but its completion is reported later
/// through a [`SonoraEvent`](crate::SonoraEvent).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStatus {
    Success,
    Failure,
    Pending,
}

impl RequestStatus {
    /// Folds a fallible operation into a status, logging the error under `context`.
    pub fn from_result<T>(result: Result<T>, context: &str) -> Self {
        match result {
            Ok(_) => Self::Success,
            Err(e) => {
                log::error!("{}: {}", context, e);
                Self::Failure
            }
        }
    }

    pub fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }

    pub fn is_failure(self) -> bool {
        matches!(self, Self::Failure)
    }
}

impl From<bool> for RequestStatus {
    fn from(ok: bool) -> Self {
        if ok { Self::Success } else { Self::Failure }
    }
}
