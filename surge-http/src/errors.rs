//! HTTP error types

use crate::types::HttpMethodError;
use surge_resilience::Retryable;

pub type HttpResult<T> = Result<T, HttpError>;

/// Error type for client operations
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    #[error("Network error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("got status {code}: {body}")]
    Status { code: u16, body: String },

    #[error("login failed: {0}")]
    Auth(#[source] Box<HttpError>),

    #[error("decoding user id from auth token: {0}")]
    TokenDecode(String),

    #[error(transparent)]
    Task(#[from] TaskError),

    #[error(transparent)]
    Stream(#[from] StreamError),

    #[error("Invalid JSON: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Invalid HTTP method: {0}")]
    InvalidMethod(#[from] HttpMethodError),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("client is already logged in")]
    AlreadyAuthenticated,

    #[error("not connected: {0}")]
    NotConnected(String),

    #[error("operation cancelled")]
    Cancelled,
}

impl HttpError {
    /// Whether the error only reports that the caller gave up
    pub fn is_cancelled(&self) -> bool {
        match self {
            HttpError::Cancelled | HttpError::Task(TaskError::Cancelled) => true,
            HttpError::Auth(inner) => inner.is_cancelled(),
            _ => false,
        }
    }

    /// Status code of a non-2xx response
    pub fn status(&self) -> Option<u16> {
        match self {
            HttpError::Status { code, .. } => Some(*code),
            HttpError::Auth(inner) => inner.status(),
            _ => None,
        }
    }
}

impl Retryable for HttpError {
    fn is_retryable(&self) -> bool {
        match self {
            // Wrong credentials do not get better by asking again
            HttpError::Status { code, .. } => !matches!(code, 401 | 403),
            HttpError::Transport(_) => true,
            _ => false,
        }
    }
}

/// Failure of an asynchronous action
///
/// Cloneable so every holder of a [`Task`](crate::Task) can read it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TaskError {
    #[error("task aborted")]
    Aborted,

    #[error("autoupdate connection was broken")]
    StreamBroken,

    #[error("decoding autoupdate response: {0}")]
    Decode(String),

    #[error("reading autoupdate response: {0}")]
    Transport(String),

    #[error("task observation cancelled")]
    Cancelled,
}

/// Failure while reading a change stream
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StreamError {
    #[error("reading change stream: {0}")]
    Read(String),

    #[error("change line exceeds {0} bytes")]
    LineTooLong(usize),

    #[error("decoding change line: {0}")]
    Decode(String),

    #[error("change stream closed")]
    Closed,
}

impl From<StreamError> for TaskError {
    fn from(error: StreamError) -> Self {
        match error {
            StreamError::Read(message) => TaskError::Transport(message),
            StreamError::LineTooLong(_) | StreamError::Decode(_) => {
                TaskError::Decode(error.to_string())
            }
            StreamError::Closed => TaskError::StreamBroken,
        }
    }
}
