//! Client error types.

use std::fmt;

use gcal_token_core::{RecordError, TracingError};
use gcal_token_oauth::OAuthError;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur in the client.
#[derive(Debug)]
pub enum ClientError {
    /// The authorization flow failed.
    OAuth(OAuthError),
    /// The credential record could not be written.
    Record(RecordError),
    /// Writing to the terminal failed.
    Io(std::io::Error),
    /// Logging could not be set up.
    Tracing(TracingError),
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OAuth(err) => write!(f, "authorization failed: {}", err),
            Self::Record(err) => write!(f, "{}", err),
            Self::Io(err) => write!(f, "IO error: {}", err),
            Self::Tracing(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for ClientError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::OAuth(err) => Some(err),
            Self::Record(err) => Some(err),
            Self::Io(err) => Some(err),
            Self::Tracing(err) => Some(err),
        }
    }
}

impl From<OAuthError> for ClientError {
    fn from(err: OAuthError) -> Self {
        Self::OAuth(err)
    }
}

impl From<RecordError> for ClientError {
    fn from(err: RecordError) -> Self {
        Self::Record(err)
    }
}

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<TracingError> for ClientError {
    fn from(err: TracingError) -> Self {
        Self::Tracing(err)
    }
}
