//! Backend client error types
//!
//! Every failure an outbound call can produce, classified so callers can
//! branch on category without string matching.

use thiserror::Error;

/// Result type alias for backend client operations
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur while talking to the generation backend
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// The configured backend base URL could not be parsed
    #[error("Invalid server URL: {0}")]
    InvalidServerUrl(String),

    /// The backend answered with a non-2xx status
    #[error("Backend request failed ({status}): {message}")]
    RequestFailed { status: u16, message: String },

    /// Connection refused, DNS failure, timeout, or a dropped connection
    #[error("Backend unreachable: {message}")]
    Transport { message: String, timed_out: bool },

    /// The backend replied 2xx but the body did not match the expected shape
    #[error("Unexpected backend response: {0}")]
    Decode(String),
}

impl ClientError {
    /// Create an invalid server URL error
    pub fn invalid_url(raw: impl Into<String>) -> Self {
        Self::InvalidServerUrl(raw.into())
    }

    /// Create a rejected-request error
    pub fn rejected(status: u16, message: impl Into<String>) -> Self {
        Self::RequestFailed {
            status,
            message: message.into(),
        }
    }

    /// Create a transport error
    pub fn transport(message: impl Into<String>, timed_out: bool) -> Self {
        Self::Transport {
            message: message.into(),
            timed_out,
        }
    }

    /// Configuration problem; no network call was attempted.
    pub fn is_invalid_configuration(&self) -> bool {
        matches!(self, Self::InvalidServerUrl(_))
    }

    /// The backend could not be reached at all.
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }

    /// The backend was reached and said no.
    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::RequestFailed { .. })
    }

    /// Status code reported by the backend, if it answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::RequestFailed { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return Self::Decode(err.to_string());
        }
        Self::transport(err.to_string(), err.is_timeout())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = ClientError::invalid_url("::nope");
        assert_eq!(err.to_string(), "Invalid server URL: ::nope");

        let err = ClientError::rejected(500, "boom");
        assert_eq!(err.to_string(), "Backend request failed (500): boom");

        let err = ClientError::transport("connection refused", false);
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn test_classification() {
        assert!(ClientError::invalid_url("").is_invalid_configuration());
        assert!(ClientError::transport("x", true).is_unreachable());
        assert!(ClientError::rejected(404, "x").is_rejected());
        assert_eq!(ClientError::rejected(404, "x").status(), Some(404));
        assert_eq!(ClientError::Decode("x".into()).status(), None);
    }
}
