use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::{core::store::StoreError, runtime::handle::RuntimeError};

/// Request-level failure rendered as a plain-text HTTP response.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed or incomplete request.
    #[error("{0}")]
    BadRequest(String),
    /// Lookup matched nothing.
    #[error("{0}")]
    NotFound(String),
    /// Error returned by the store runtime.
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

impl ApiError {
    /// Status code this error maps to.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) | Self::Runtime(RuntimeError::Invalid(_)) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) | Self::Runtime(RuntimeError::Store(StoreError::NotFound(_))) => {
                StatusCode::NOT_FOUND
            }
            Self::Runtime(RuntimeError::Store(StoreError::DuplicateName(_))) => StatusCode::CONFLICT,
            Self::Runtime(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), self.to_string()).into_response()
    }
}

/// Failures that stop the server itself.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Binding or serving the listener failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Loading the snapshot on the blocking pool panicked or was cancelled.
    #[error("snapshot load task failed: {0}")]
    Load(#[from] tokio::task::JoinError),
    /// The store runtime failed during shutdown.
    #[error("runtime error: {0}")]
    Runtime(#[from] RuntimeError),
}

/// Result alias for server lifecycle operations.
pub type ServerResult<T> = Result<T, ServerError>;
