use axum::http::StatusCode;

use crate::error::AppError;

/// Collapses every failure into one status code, for endpoints whose clients
/// only ever see a single error status.
pub trait MaskStatus<T> {
    fn mask_status(self, status: StatusCode) -> Result<T, AppError>;
}

impl<T, E> MaskStatus<T> for Result<T, E>
where
    E: Into<AppError>,
{
    fn mask_status(self, status: StatusCode) -> Result<T, AppError> {
        self.map_err(|e| match e.into() {
            AppError::Masked { inner, .. } => AppError::Masked { status, inner },
            inner => AppError::Masked {
                status,
                inner: Box::new(inner),
            },
        })
    }
}
