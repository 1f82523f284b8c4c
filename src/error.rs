use axum::{
    Json,
    extract::{FromRequest, Request, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::{auth::AuthError, deadline::Elapsed, repository::RepoError};

/// ErrorBody
///
/// The JSON body of every non-2xx response: a stable machine-readable `error`
/// code plus a human-readable `message`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

/// AppError
///
/// Every failure a use case or handler can surface. Each variant maps to a
/// single HTTP status in [`IntoResponse`]. Persistence and internal details
/// are logged, never returned to the client.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Authentication(#[from] AuthError),

    #[error("insufficient role for this operation")]
    Forbidden,

    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("{0}")]
    Conflict(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("invalid credentials")]
    InvalidCredential,

    #[error("operation timed out")]
    Timeout,

    #[error("persistence failure: {0}")]
    Persistence(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        AppError::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Stable code written to the `error` field.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Authentication(auth) => auth.code(),
            AppError::Forbidden => "forbidden",
            AppError::Validation { .. } => "validation_failed",
            AppError::Conflict(_) => "conflict",
            AppError::NotFound(_) => "not_found",
            AppError::InvalidCredential => "invalid_credential",
            AppError::Timeout => "timeout",
            AppError::Persistence(_) => "persistence_error",
            AppError::Internal(_) => "internal_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Authentication(_) | AppError::InvalidCredential => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::Validation { .. } => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Timeout => StatusCode::GATEWAY_TIMEOUT,
            AppError::Persistence(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<Elapsed> for AppError {
    fn from(_: Elapsed) -> Self {
        AppError::Timeout
    }
}

impl From<RepoError> for AppError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::Timeout => AppError::Timeout,
            RepoError::Duplicate(detail) => AppError::Conflict(detail),
            RepoError::Database(detail) => AppError::Persistence(detail),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::validation("body", rejection.body_text())
    }
}

/// AppJson
///
/// `Json` whose rejection is an [`AppError`], so an unreadable body gets the
/// same 400 `validation_failed` shape as a body that fails its rules.
#[derive(Debug, Clone, Copy, Default)]
pub struct AppJson<T>(pub T);

impl<S, T> FromRequest<S> for AppJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(AppJson(value))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            AppError::Persistence(detail) => {
                tracing::error!(detail = %detail, "persistence failure");
                "the request could not be completed".to_string()
            }
            AppError::Internal(detail) => {
                tracing::error!(detail = %detail, "internal failure");
                "internal server error".to_string()
            }
            other => other.to_string(),
        };

        let body = ErrorBody {
            error: self.code().to_string(),
            message,
        };

        (status, Json(body)).into_response()
    }
}
