//! Error types for fanned-out work

use surge_http::HttpError;
use thiserror::Error;

/// Why one item of a fan-out produced no duration
#[derive(Error, Debug)]
pub enum WorkError<E> {
    /// The run was cancelled before or while the item was worked on
    #[error("cancelled")]
    Cancelled,

    #[error(transparent)]
    Failed(E),
}

impl WorkError<HttpError> {
    /// Whether the error only reports a cancellation
    pub fn is_cancelled(&self) -> bool {
        match self {
            WorkError::Cancelled => true,
            WorkError::Failed(error) => error.is_cancelled(),
        }
    }
}
