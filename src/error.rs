//! Error taxonomy shared by every client component.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors surfaced by the resource layer and the controllers built on it.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ClientError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Rejected locally, before any request was made.
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    /// Transport failure (`status` is `None`) or a non-2xx response.
    #[error("Request failed{}: {message}", status.map(|s| format!(" (status {s})")).unwrap_or_default())]
    FetchFailed {
        status: Option<u16>,
        message: String,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized")]
    Unauthorized,
}

impl ClientError {
    pub fn fetch(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::FetchFailed {
            status,
            message: message.into(),
        }
    }

    /// True when the caller should send the user back to authentication.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Unauthorized | Self::InvalidCredentials)
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        Self::fetch(err.status().map(|s| s.as_u16()), err.to_string())
    }
}
