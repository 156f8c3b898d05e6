//! Error types for the Sesame API client.
//!
//! # Design
//! Every failure is returned to the immediate caller with its cause attached.
//! Cancellation and deadline expiry get their own variants so callers can tell
//! "I gave up" apart from "the network failed". Non-200 responses keep only the
//! status line: the vendor API has no error schema, so the body is never read.

use std::error::Error as StdError;
use std::io;

use thiserror::Error;

use crate::context::ContextError;

/// Boxed cause carried by `ApiError::Transport`.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Errors returned by `SesameClient`.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request could not be built from the given inputs.
    #[error("creating HTTP request: {0}")]
    RequestConstruction(String),

    /// DNS, connect, TLS or I/O failure.
    #[error("doing HTTP request: {0}")]
    Transport(#[source] BoxError),

    /// The caller cancelled the context.
    #[error("request canceled")]
    Canceled,

    /// The context deadline or a transport timeout elapsed.
    #[error("request timed out")]
    Timeout,

    /// The server answered with something other than 200 OK.
    #[error("unexpected HTTP status: {status} {reason}")]
    UnexpectedStatus { status: u16, reason: String },

    /// The body was not JSON or not the expected shape.
    #[error("decoding response body: {0}")]
    Decode(#[source] serde_json::Error),
}

impl ApiError {
    /// Wrap any error as a transport failure.
    pub fn transport<E>(err: E) -> Self
    where
        E: Into<BoxError>,
    {
        ApiError::Transport(err.into())
    }

    /// Classify an I/O error raised while reading a response body.
    ///
    /// Reads that were aborted by the context carry a `ContextError` payload
    /// and map back to `Canceled` / `Timeout`.
    pub fn from_body_io(err: io::Error) -> Self {
        if let Some(ctx_err) = err
            .get_ref()
            .and_then(|inner| inner.downcast_ref::<ContextError>())
        {
            return (*ctx_err).into();
        }
        if err.kind() == io::ErrorKind::TimedOut {
            return ApiError::Timeout;
        }
        ApiError::Transport(Box::new(err))
    }

    /// HTTP status code, if the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::UnexpectedStatus { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether an external retry loop could reasonably try again.
    ///
    /// The client itself never retries.
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::Transport(_) | ApiError::Timeout => true,
            ApiError::UnexpectedStatus { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

impl From<ContextError> for ApiError {
    fn from(err: ContextError) -> Self {
        match err {
            ContextError::Canceled => ApiError::Canceled,
            ContextError::DeadlineExceeded => ApiError::Timeout,
        }
    }
}
