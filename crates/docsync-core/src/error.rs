//! Sync error handling
//!
//! Typed errors for pull/push/subscribe. A missing remote document is not an
//! error: `pull` reports it as `Ok(None)`.

use std::time::Duration;

use thiserror::Error;

/// Result type for sync operations
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur while talking to the remote peer
#[derive(Error, Debug)]
pub enum SyncError {
    /// The remote peer explicitly reported a failure
    #[error("Remote error{}: {message}", code_suffix(.code))]
    Remote {
        code: Option<String>,
        message: String,
    },

    /// No acknowledgement arrived within the bound
    #[error("Timed out after {}ms waiting for the remote peer", .0.as_millis())]
    Timeout(Duration),

    /// Operation unsupported in this sync mode
    #[error("{0} is not supported by the static snapshot client")]
    NotImplemented(&'static str),

    /// Channel-level failure not otherwise classified
    #[error("Transport error: {0}")]
    Transport(String),

    /// HTTP request failed before a response arrived
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// A payload was not valid base64
    #[error("Invalid payload encoding: {0}")]
    Decode(#[from] base64::DecodeError),

    /// The remote reply did not match the expected shape
    #[error("Malformed reply: {0}")]
    InvalidReply(String),

    /// A server URL could not be used
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// A live subscription is already active on this client
    #[error("A subscription is already active for this workspace")]
    AlreadySubscribed,
}

impl SyncError {
    /// Build a remote error from the code/message pair of an error reply
    pub fn remote(code: Option<String>, message: impl Into<String>) -> Self {
        SyncError::Remote {
            code,
            message: message.into(),
        }
    }

    /// Check if a higher layer may retry the call with backoff
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SyncError::Timeout(_) | SyncError::Transport(_) | SyncError::Http(_)
        )
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(error: serde_json::Error) -> Self {
        SyncError::InvalidReply(error.to_string())
    }
}

fn code_suffix(code: &Option<String>) -> String {
    code.as_deref()
        .map(|c| format!(" [{}]", c))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(SyncError::Timeout(Duration::from_secs(30)).is_retryable());
        assert!(SyncError::Transport("socket closed".into()).is_retryable());
        assert!(!SyncError::remote(None, "boom").is_retryable());
        assert!(!SyncError::NotImplemented("push").is_retryable());
        assert!(!SyncError::AlreadySubscribed.is_retryable());
    }

    #[test]
    fn test_error_display() {
        let err = SyncError::remote(Some("INTERNAL".into()), "database offline");
        assert_eq!(err.to_string(), "Remote error [INTERNAL]: database offline");

        let err = SyncError::remote(None, "X");
        assert_eq!(err.to_string(), "Remote error: X");

        let err = SyncError::Timeout(Duration::from_secs(30));
        assert!(err.to_string().contains("30000ms"));

        let err = SyncError::NotImplemented("subscribe");
        assert!(err.to_string().starts_with("subscribe"));
    }
}
