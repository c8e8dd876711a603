//! Error types for scib-room
//!
//! One enum for the whole service; HTTP handlers map it to a status code and
//! a `{ ok: false, error }` body.

use hyper::StatusCode;

/// Main error type for room operations
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// Empty or oversized body. Shown inline, never retried.
    #[error("{0}")]
    Validation(String),

    /// An entry with this id is already in the feed
    #[error("Duplicate entry id: {0}")]
    DuplicateId(String),

    /// Network failure talking to a room (snapshot, publish or stream)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Subscriber fell further behind than the broadcast buffer
    #[error("Subscriber fell behind by {0} entries")]
    Lagged(u64),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Unlock key outside the configured set
    #[error("Unknown unlock key: {0}")]
    UnknownKey(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl RoomError {
    /// Convert error to HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::DuplicateId(_) => StatusCode::CONFLICT,
            Self::Transport(_) => StatusCode::BAD_GATEWAY,
            Self::Lagged(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::UnknownKey(_) => StatusCode::BAD_REQUEST,
            Self::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether a merge layer should swallow this error without telling the user
    pub fn is_silent(&self) -> bool {
        matches!(self, Self::DuplicateId(_))
    }

    /// Convert to status code and body tuple for HTTP response
    pub fn into_status_code_and_body(self) -> (StatusCode, String) {
        let status = self.status_code();
        let body = self.to_string();
        (status, body)
    }
}

impl From<std::io::Error> for RoomError {
    fn from(err: std::io::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for RoomError {
    fn from(err: serde_json::Error) -> Self {
        Self::BadRequest(format!("JSON error: {}", err))
    }
}

impl From<hyper::Error> for RoomError {
    fn from(err: hyper::Error) -> Self {
        Self::Internal(format!("HTTP error: {}", err))
    }
}

impl From<reqwest::Error> for RoomError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

/// Result type alias for room operations
pub type Result<T> = std::result::Result<T, RoomError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            RoomError::Validation("empty".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            RoomError::DuplicateId("a".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            RoomError::Transport("down".into()).status_code(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_validation_message_is_bare() {
        let (status, body) = RoomError::Validation("Message is empty.".into())
            .into_status_code_and_body();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, "Message is empty.");
    }

    #[test]
    fn test_only_duplicates_are_silent() {
        assert!(RoomError::DuplicateId("x".into()).is_silent());
        assert!(!RoomError::Validation("x".into()).is_silent());
        assert!(!RoomError::Transport("x".into()).is_silent());
    }
}
