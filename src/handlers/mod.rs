// src/handlers/mod.rs

use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use crate::error::AppError;

pub mod auth;
pub mod quiz;

/// Wraps a payload as `{status, data}`.
pub fn respond<T: Serialize>(status: StatusCode, data: T) -> impl IntoResponse {
    (
        status,
        Json(json!({
            "status": status.as_u16(),
            "data": data,
        })),
    )
}

/// Parses a path segment as a UUID, rejecting nil and malformed values.
pub fn parse_uuid(raw: &str) -> Result<Uuid, AppError> {
    match Uuid::parse_str(raw.trim()) {
        Ok(id) if !id.is_nil() => Ok(id),
        _ => Err(AppError::Validation(format!("invalid UUID: {raw:?}"))),
    }
}
