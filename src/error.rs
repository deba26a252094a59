//! Helper Error Types
//!
//! Error taxonomy shared by the completion and streaming calls.

use thiserror::Error;

/// Main error type for chat-completion operations
#[derive(Debug, Error)]
pub enum ChatError {
    /// Configuration errors (bad endpoint, bad key, unreadable config file)
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP request failed before a response arrived
    #[error("Request failed: {0}")]
    Request(String),

    /// Transport timeout
    #[error("Request timeout: {0}")]
    Timeout(String),

    /// Server answered with a non-success status
    #[error("Request failed with status {status}: {body}")]
    Status { status: u16, body: String },

    /// Response body did not decode into the expected shape
    #[error("Response error: {0}")]
    Response(String),

    /// Failure while reading or decoding an event stream
    #[error("Streaming error: {0}")]
    Stream(String),

    /// Every attempt failed
    #[error("All {attempts} attempts failed")]
    Exhausted {
        attempts: u32,
        last: Option<Box<ChatError>>,
    },

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ChatError {
    /// Whether this failure was a transport timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, ChatError::Timeout(_))
    }

    /// Build a status error, truncating the body for log output
    pub fn status(status: u16, body: &str) -> Self {
        ChatError::Status {
            status,
            body: truncate(body, 500).to_string(),
        }
    }
}

/// Cut `s` to at most `max` characters
pub(crate) fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

impl From<reqwest::Error> for ChatError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ChatError::Timeout(err.to_string())
        } else if err.is_connect() {
            ChatError::Request(format!("Connection failed: {}", err))
        } else if err.is_decode() {
            ChatError::Response(format!("Failed to decode response: {}", err))
        } else {
            ChatError::Request(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ChatError {
    fn from(err: serde_json::Error) -> Self {
        ChatError::Response(format!("JSON parsing error: {}", err))
    }
}

impl From<std::io::Error> for ChatError {
    fn from(err: std::io::Error) -> Self {
        ChatError::Config(format!("IO error: {}", err))
    }
}

/// Result type alias for helper operations
pub type Result<T> = std::result::Result<T, ChatError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_body_is_truncated() {
        let body = "x".repeat(800);
        match ChatError::status(503, &body) {
            ChatError::Status { status, body } => {
                assert_eq!(status, 503);
                assert_eq!(body.len(), 500);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_is_timeout() {
        assert!(ChatError::Timeout("slow".into()).is_timeout());
        assert!(!ChatError::Request("refused".into()).is_timeout());
    }

    #[test]
    fn test_json_error_maps_to_response() {
        let err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert!(matches!(ChatError::from(err), ChatError::Response(_)));
    }
}
