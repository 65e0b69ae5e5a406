//! Request-boundary errors and their HTTP rendering.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use blobsync_core::StorageError;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Unauthenticated(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    PayloadTooLarge(String),
    #[error("{0}")]
    Persistence(String),
    #[error("{0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Persistence(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::UnknownDatabase(_) | StorageError::UnknownCollection { .. } => {
                ApiError::NotFound("Invalid db or collection".to_string())
            }
            StorageError::RecordNotFound(_) => ApiError::NotFound("Not found".to_string()),
            StorageError::Validation(e) => ApiError::Validation(e.to_string()),
            other => ApiError::Persistence(format!("Failed to persist changes: {}", other)),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        (status, Json(ErrorBody { error: self.to_string() })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blobsync_core::ValidationError;

    #[test]
    fn test_storage_errors_map_to_status() {
        let cases = [
            (StorageError::UnknownDatabase("x".into()), StatusCode::NOT_FOUND),
            (
                StorageError::UnknownCollection { database: "x".into(), collection: "y".into() },
                StatusCode::NOT_FOUND,
            ),
            (StorageError::RecordNotFound("a1".into()), StatusCode::NOT_FOUND),
            (
                StorageError::Validation(ValidationError::MissingField { index: 0, field: "id" }),
                StatusCode::BAD_REQUEST,
            ),
            (StorageError::Other("disk full".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[test]
    fn test_messages() {
        let err = ApiError::from(StorageError::UnknownCollection {
            database: "statements".into(),
            collection: "nope".into(),
        });
        assert_eq!(err.to_string(), "Invalid db or collection");

        let err = ApiError::from(StorageError::Validation(ValidationError::MissingField {
            index: 2,
            field: "encryptedData",
        }));
        assert_eq!(err.to_string(), "record 2: missing encryptedData");
    }
}
