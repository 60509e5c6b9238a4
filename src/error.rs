use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::{
    preview::PreviewChange,
    response::ApiResponse,
};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not Found")]
    NotFound,

    #[error("Bad Request {0}")]
    BadRequest(String),

    #[error("Forbidden")]
    Forbidden,

    #[error("Preview is stale")]
    Conflict(Vec<PreviewChange>),

    #[error("Order could not be persisted")]
    Integrity(String),

    #[error("Internal invariant violated")]
    Invariant(String),

    #[error("Database error")]
    DbError(#[from] sqlx::Error),

    #[error("ORM error")]
    OrmError(#[from] sea_orm::DbErr),

    #[error("Internal Server Error")]
    Internal(#[from] anyhow::Error),
}

#[derive(Serialize)]
struct ErrorData {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    changes: Option<Vec<PreviewChange>>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Integrity(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Invariant(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::DbError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::OrmError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        match &self {
            AppError::Integrity(detail) | AppError::Invariant(detail) => {
                tracing::error!(error = %self, detail = %detail, "request failed");
            }
            AppError::DbError(err) => tracing::error!(error = %err, "database error"),
            AppError::OrmError(err) => tracing::error!(error = %err, "orm error"),
            AppError::Internal(err) => tracing::error!(error = %err, "internal error"),
            _ => {}
        }

        let message = self.to_string();
        let changes = match self {
            AppError::Conflict(changes) => Some(changes),
            _ => None,
        };

        let body = ApiResponse::failure(
            message.clone(),
            ErrorData {
                error: message,
                changes,
            },
        );

        (status, axum::Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
