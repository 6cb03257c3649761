//! API error type and its HTTP mapping.
//!
//! Every handler returns `ApiResult<T>`; failures render as a JSON
//! body with a stable machine-readable `code` next to the human
//! message. Seat conflicts additionally carry the contested seats,
//! state machine rejections carry the attempted transition.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::error;

use crate::services::booking::BookingError;
use crate::store::StoreError;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Booking(#[from] BookingError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("{0}")]
    BadRequest(String),
    #[error(transparent)]
    Validation(#[from] validator::ValidationErrors),
    #[error("authentication required")]
    Unauthorized,
    #[error("admin access required")]
    Forbidden,
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("password hashing failed")]
    Hash(#[from] bcrypt::BcryptError),
}

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str, Value) {
        match self {
            ApiError::Booking(err) => booking_parts(err),
            ApiError::Store(err) => store_parts(err),
            ApiError::BadRequest(message) => (
                StatusCode::BAD_REQUEST,
                "BAD_REQUEST",
                json!({ "error": message }),
            ),
            ApiError::Validation(errors) => (
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
                json!({ "error": errors.to_string() }),
            ),
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                json!({ "error": "Authentication required" }),
            ),
            ApiError::Forbidden => (
                StatusCode::FORBIDDEN,
                "FORBIDDEN",
                json!({ "error": "Admin access required" }),
            ),
            ApiError::NotFound(what) => (
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                json!({ "error": format!("{what} not found") }),
            ),
            ApiError::Hash(err) => {
                error!(error = %err, "password hashing failed");
                internal()
            }
        }
    }
}

fn booking_parts(err: &BookingError) -> (StatusCode, &'static str, Value) {
    match err {
        BookingError::ShowtimeNotFound(_) | BookingError::BookingNotFound(_) => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            json!({ "error": err.to_string() }),
        ),
        BookingError::EmptySelection => (
            StatusCode::BAD_REQUEST,
            "EMPTY_SELECTION",
            json!({ "error": err.to_string() }),
        ),
        BookingError::DuplicateSeat(_) => (
            StatusCode::BAD_REQUEST,
            "DUPLICATE_SEAT",
            json!({ "error": err.to_string() }),
        ),
        BookingError::InvalidSeat(_) => (
            StatusCode::BAD_REQUEST,
            "INVALID_SEAT",
            json!({ "error": err.to_string() }),
        ),
        BookingError::SeatConflict(seats) => (
            StatusCode::CONFLICT,
            "SEAT_CONFLICT",
            json!({
                "error": err.to_string(),
                "seats": seats.iter().map(ToString::to_string).collect::<Vec<_>>(),
            }),
        ),
        BookingError::InvalidTransition { from, to } => (
            StatusCode::CONFLICT,
            "INVALID_TRANSITION",
            json!({
                "error": err.to_string(),
                "from": from.as_str(),
                "to": to.as_str(),
            }),
        ),
        BookingError::Storage(err) => store_parts(err),
    }
}

fn store_parts(err: &StoreError) -> (StatusCode, &'static str, Value) {
    match err {
        StoreError::Conflict(what) => (
            StatusCode::CONFLICT,
            "CONFLICT",
            json!({ "error": format!("{what} already exists") }),
        ),
        other => {
            error!(error = %other, "storage failure");
            internal()
        }
    }
}

fn internal() -> (StatusCode, &'static str, Value) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        json!({ "error": "Internal server error" }),
    )
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, mut body) = self.parts();
        if let Value::Object(map) = &mut body {
            map.insert("code".to_string(), Value::String(code.to_string()));
        }
        (status, Json(body)).into_response()
    }
}
