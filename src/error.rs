use axum::{
    BoxError, Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

pub type AppResult<T> = Result<T, AppError>;

/// AppError
///
/// The discriminated failure of every store and repository operation. Handlers never catch
/// anything themselves: they return `AppResult<T>` and the `IntoResponse` impl below maps the
/// variant to its HTTP status and the `{ "message": ... }` envelope.
#[derive(Debug, Error)]
pub enum AppError {
    /// Missing or malformed client input.
    #[error("{0}")]
    Validation(String),
    #[error("invalid id")]
    InvalidId,
    #[error("token not provided")]
    MissingToken,
    /// Every token verification failure collapses into this one variant.
    #[error("invalid or expired token")]
    InvalidToken,
    /// Login failure. Unknown email and wrong password are indistinguishable.
    #[error("invalid credentials")]
    Unauthorized,
    #[error("{0}")]
    Forbidden(&'static str),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    Conflict(&'static str),
    #[error("song is already in this playlist")]
    DuplicateSong,
    #[error("song not found in playlist")]
    SongNotFound,
    #[error("the liked playlist cannot be deleted")]
    ProtectedResource,
    #[error("you cannot delete your own admin account")]
    SelfDeleteForbidden,
    #[error("request timed out")]
    Timeout,
    /// Unexpected store/runtime failure. The detail is logged, never returned.
    #[error("internal error: {0}")]
    Internal(String),
}

/// ErrorBody
///
/// The failure envelope shared by every endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub message: String,
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_)
            | Self::InvalidId
            | Self::ProtectedResource
            | Self::SelfDeleteForbidden => StatusCode::BAD_REQUEST,
            Self::MissingToken | Self::InvalidToken | Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) | Self::SongNotFound => StatusCode::NOT_FOUND,
            Self::Conflict(_) | Self::DuplicateSong => StatusCode::CONFLICT,
            Self::Timeout => StatusCode::REQUEST_TIMEOUT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The text sent to the client.
    pub fn public_message(&self) -> String {
        match self {
            Self::Internal(_) => "internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let Self::Internal(detail) = &self {
            tracing::error!(%detail, "request failed with internal error");
        }
        let body = ErrorBody {
            message: self.public_message(),
        };
        (self.status_code(), Json(body)).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Internal(err.to_string())
    }
}

/// handle_layer_error
///
/// Converts failures raised by the tower middleware stack into the standard envelope: an elapsed
/// request timeout becomes 408, anything else a 500.
pub async fn handle_layer_error(err: BoxError) -> AppError {
    if err.is::<tower::timeout::error::Elapsed>() {
        tracing::warn!("request timed out");
        AppError::Timeout
    } else {
        AppError::Internal(format!("middleware failure: {err}"))
    }
}
