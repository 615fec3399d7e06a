use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::services::StoreError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    Conflict(String),
    #[error("not logged in")]
    Unauthenticated,
    #[error("wrong username or password")]
    BadCredentials,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
    /// Answers with `status` no matter what `inner` is; `inner` is still logged.
    #[error("{inner}")]
    Masked {
        status: StatusCode,
        inner: Box<AppError>,
    },
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "not_found",
            AppError::Conflict(_) => "conflict",
            AppError::Unauthenticated => "unauthenticated",
            AppError::BadCredentials => "bad_credentials",
            AppError::Store(StoreError::Conflict(_)) => "conflict",
            AppError::Store(_) => "store_failure",
            AppError::Internal(_) => "internal",
            AppError::Masked { inner, .. } => inner.kind(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_)
            | AppError::Store(StoreError::Conflict(_))
            | AppError::Unauthenticated
            | AppError::BadCredentials => StatusCode::FORBIDDEN,
            AppError::Store(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Masked { status, .. } => *status,
        }
    }
}

impl From<tower_sessions::session::Error> for AppError {
    fn from(err: tower_sessions::session::Error) -> Self {
        Self::Internal(err.into())
    }
}

// Tell axum how to convert `AppError` into a response.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(kind = self.kind(), %status, error = ?self, "request failed");
        } else {
            tracing::warn!(kind = self.kind(), %status, error = %self, "request rejected");
        }

        match self {
            AppError::Masked { .. } | AppError::Store(_) | AppError::Internal(_) => {
                status.into_response()
            }
            other => (status, other.to_string()).into_response(),
        }
    }
}
