//! Client-specific error type wrapping reqwest errors.

use homesync_domain::error::{CommandError, SyncError, TransportError};

/// Errors originating from the HTTP client layer.
#[derive(Debug, thiserror::Error)]
pub enum ReqwestError {
    /// The request could not be sent or the body could not be read.
    #[error("http error")]
    Http(#[from] reqwest::Error),

    /// The response body was not the expected JSON.
    #[error("JSON deserialization error")]
    Json(#[from] serde_json::Error),

    /// The server answered with a non-success status.
    #[error("unexpected status {0}")]
    Status(u16),
}

impl From<ReqwestError> for CommandError {
    fn from(err: ReqwestError) -> Self {
        match err {
            ReqwestError::Status(401) => Self::Unauthorized,
            ReqwestError::Status(status) => Self::Status { status },
            ReqwestError::Http(inner) if inner.is_decode() => Self::Decode(Box::new(inner)),
            ReqwestError::Http(inner) => Self::Network(Box::new(inner)),
            ReqwestError::Json(inner) => Self::Decode(Box::new(inner)),
        }
    }
}

impl From<ReqwestError> for SyncError {
    fn from(err: ReqwestError) -> Self {
        Self::Command(err.into())
    }
}

impl From<ReqwestError> for TransportError {
    fn from(err: ReqwestError) -> Self {
        match err {
            ReqwestError::Status(status) => Self::Status { status },
            other => Self::Connect(Box::new(other)),
        }
    }
}

/// Fail with [`ReqwestError::Status`] unless `response` is a 2xx.
pub(crate) fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ReqwestError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(ReqwestError::Status(status.as_u16()))
    }
}
