//! Error kinds raised at the boundary between the sync core and the upstream API

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    #[error("network failure: {0}")]
    NetworkFailure(String),
    #[error("malformed response: {0}")]
    MalformedResponse(String),
    #[error("empty result: {0}")]
    EmptyResult(String),
    #[error("invalid input: {0}")]
    ValidationFailure(String),
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            SyncError::MalformedResponse(err.to_string())
        } else if err.is_timeout() {
            SyncError::NetworkFailure(format!("request timed out: {err}"))
        } else {
            SyncError::NetworkFailure(err.to_string())
        }
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::MalformedResponse(err.to_string())
    }
}
