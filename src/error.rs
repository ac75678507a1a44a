//! HTTP-facing error type. Every handler failure funnels through `AppError`, which
//! renders a `{"detail": ...}` body with the matching status code.

use axum::extract::rejection::QueryRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::error;

use crate::deck::DeckError;
use crate::gemini::LlmError;
use crate::normalize::{InvalidTypesDetail, NormalizeError};
use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Normalize(#[from] NormalizeError),
    #[error(transparent)]
    Llm(#[from] LlmError),
    #[error(transparent)]
    Deck(#[from] DeckError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Query(#[from] QueryRejection),
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(&'static str),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, detail) = match &self {
            AppError::Normalize(NormalizeError::InvalidErrorType { invalid, allowed }) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                json!(InvalidTypesDetail { invalid_types: invalid, allowed }),
            ),
            AppError::Normalize(e @ NormalizeError::MalformedResult(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, json!(e.to_string()))
            }
            AppError::Llm(e) if e.is_rate_limited() => (StatusCode::TOO_MANY_REQUESTS, json!(e.to_string())),
            AppError::Llm(e) => (StatusCode::INTERNAL_SERVER_ERROR, json!(e.to_string())),
            AppError::Deck(e) => (StatusCode::UNPROCESSABLE_ENTITY, json!(e.to_string())),
            AppError::Store(e) => (StatusCode::INTERNAL_SERVER_ERROR, json!(e.to_string())),
            AppError::Query(rejection) => (StatusCode::UNPROCESSABLE_ENTITY, json!(rejection.body_text())),
            AppError::Validation(msg) => (StatusCode::UNPROCESSABLE_ENTITY, json!(msg)),
            AppError::NotFound(what) => (StatusCode::NOT_FOUND, json!(what)),
        };

        if status.is_server_error() {
            error!(target: "transcorrect", %status, error = %self, "Request failed");
        }
        (status, Json(json!({ "detail": detail }))).into_response()
    }
}
