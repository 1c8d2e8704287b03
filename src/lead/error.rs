//! Lead submission error types

use thiserror::Error;

/// Submission error with classification
#[derive(Debug, Error)]
#[error("{message}")]
pub struct SubmitError {
    pub kind: SubmitErrorKind,
    pub message: String,
}

impl SubmitError {
    pub fn new(kind: SubmitErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(SubmitErrorKind::Network, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(SubmitErrorKind::Timeout, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(SubmitErrorKind::Unknown, message)
    }

    /// Classify a non-success HTTP response
    pub fn from_status(status: u16, body: &str) -> Self {
        let kind = match status {
            400..=499 => SubmitErrorKind::Rejected,
            500..=599 => SubmitErrorKind::ServerError,
            _ => SubmitErrorKind::Unknown,
        };
        let body = body.trim();
        let message = if body.is_empty() {
            format!("Lead endpoint returned HTTP {status}")
        } else {
            format!("Lead endpoint returned HTTP {status}: {body}")
        };
        Self::new(kind, message)
    }

    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::timeout(format!("Lead endpoint timed out: {err}"))
        } else if err.is_connect() || err.is_request() {
            Self::network(format!("Could not reach lead endpoint: {err}"))
        } else {
            Self::unknown(err.to_string())
        }
    }
}

/// Error classification, used for logging only: submissions are never retried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitErrorKind {
    /// Connection refused, DNS failure
    Network,
    Timeout,
    /// Endpoint refused the payload (4xx)
    Rejected,
    /// Endpoint failed (5xx)
    ServerError,
    Unknown,
}

impl SubmitErrorKind {
    /// Whether a later manual resubmission might succeed
    pub fn is_transient(self) -> bool {
        matches!(self, Self::Network | Self::Timeout | Self::ServerError)
    }
}
