//! Sync error types.

use thiserror::Error;
use tokio_tungstenite::tungstenite;

use crate::domain::rules::FailureKind;

/// Errors from talking to the scaling backend.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("invalid base url {url:?}: {source}")]
    InvalidBaseUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("unsupported base url scheme: {0}")]
    UnsupportedScheme(String),

    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),

    #[error("scale-up request failed: {0}")]
    TriggerRequest(#[source] reqwest::Error),

    #[error("scale-up request rejected with HTTP {0}")]
    TriggerStatus(reqwest::StatusCode),

    #[error("could not open replica stream: {0}")]
    StreamConnect(#[source] tungstenite::Error),

    #[error("replica stream error: {0}")]
    Stream(#[source] tungstenite::Error),

    #[error("replica stream closed by backend")]
    StreamClosed,
}

impl SyncError {
    /// Which session-ending failure this error represents.
    pub fn failure(&self) -> FailureKind {
        match self {
            SyncError::InvalidBaseUrl { .. }
            | SyncError::UnsupportedScheme(_)
            | SyncError::HttpClient(_)
            | SyncError::TriggerRequest(_)
            | SyncError::TriggerStatus(_) => FailureKind::Trigger,
            SyncError::StreamConnect(_) | SyncError::Stream(_) => FailureKind::StreamError,
            SyncError::StreamClosed => FailureKind::StreamClosed,
        }
    }
}

pub type SyncResult<T> = Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_rejection_is_trigger_failure() {
        let err = SyncError::TriggerStatus(reqwest::StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.failure(), FailureKind::Trigger);
        assert!(err.to_string().contains("503"));
    }

    #[test]
    fn stream_errors_map_to_stream_kinds() {
        assert_eq!(SyncError::StreamClosed.failure(), FailureKind::StreamClosed);
        let err = SyncError::Stream(tungstenite::Error::ConnectionClosed);
        assert_eq!(err.failure(), FailureKind::StreamError);
        let err = SyncError::StreamConnect(tungstenite::Error::ConnectionClosed);
        assert_eq!(err.failure(), FailureKind::StreamError);
    }
}
