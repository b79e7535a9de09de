//! Conversion of every failure into the JSON error envelope.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use compute::ComputeError;
use sea_orm::{DbErr, SqlErr};
use thiserror::Error;
use tracing::{error, warn};

use crate::schemas::ErrorResponse;

/// Convenient result alias for handlers.
pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    /// A business rule refused the request.
    #[error("{message}")]
    Rule { code: &'static str, message: String },

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadGateway(String),

    /// Detail is logged, never sent.
    #[error("Internal server error")]
    Internal(String),
}

impl ApiError {
    pub fn rule(code: &'static str, message: impl Into<String>) -> Self {
        Self::Rule {
            code,
            message: message.into(),
        }
    }

    pub fn internal(detail: impl std::fmt::Display) -> Self {
        Self::Internal(detail.to_string())
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::Rule { .. } => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadGateway(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Rule { code, .. } => *code,
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::NotFound(_) => "NOT_FOUND",
            Self::BadGateway(_) => "PAYMENT_GATEWAY_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            Self::Internal(detail) => error!(%detail, "Request failed"),
            Self::BadGateway(detail) => error!(%detail, "Upstream failure"),
            other => warn!(code = other.code(), "Request refused: {other}"),
        }

        let body = ErrorResponse {
            success: false,
            message: self.to_string(),
            error: self.code().to_string(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<DbErr> for ApiError {
    fn from(err: DbErr) -> Self {
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(detail)) => {
                warn!(%detail, "Unique constraint violated");
                Self::rule("DUPLICATE_RECORD", "El registro ya existe")
            }
            Some(SqlErr::ForeignKeyConstraintViolation(detail)) => {
                warn!(%detail, "Foreign key constraint violated");
                Self::rule(
                    "RECORD_IN_USE",
                    "El registro está relacionado con otros datos",
                )
            }
            _ => Self::internal(err),
        }
    }
}

impl From<ComputeError> for ApiError {
    fn from(err: ComputeError) -> Self {
        match err {
            ComputeError::Database(e) => e.into(),
            ComputeError::NotFound(what) => Self::NotFound(format!("{what} not found")),
            ComputeError::Forbidden(message) => Self::Forbidden(message),
            ComputeError::Validation(message) => Self::Validation(message),
            e @ ComputeError::NoPlacesAvailable => Self::rule("NO_PLACES_AVAILABLE", e.to_string()),
            e @ ComputeError::UnderAge { .. } => {
                Self::rule("AGE_REQUIREMENT_NOT_MET", e.to_string())
            }
            e @ ComputeError::AlreadyEnrolled => Self::rule("ALREADY_ENROLLED", e.to_string()),
            e @ ComputeError::NotEnrolled => Self::rule("NOT_ENROLLED", e.to_string()),
            ComputeError::Gateway(e) => Self::BadGateway(e.to_string()),
            e @ ComputeError::Date(_) => Self::internal(e),
        }
    }
}
