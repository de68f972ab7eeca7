// src/handlers/auth.rs

use std::sync::Arc;

use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use serde_json::json;
use validator::Validate;

use super::respond;
use crate::{
    error::{AppError, AuthError},
    models::user::{ChangePasswordRequest, LoginRequest, LoginResponse, NewUser, RegisterRequest},
    services::SessionAuth,
    stores::UserDirectory,
    utils::{
        hash::{hash_password, verify_password},
        jwt::Claims,
    },
};

/// Registers a new user.
///
/// Hashes the password using Argon2 before storing it.
/// Returns 201 Created and the user object (excluding password).
pub async fn register(
    State(users): State<Arc<dyn UserDirectory>>,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::Validation(validation_errors.to_string()));
    }

    let password_hash = hash_password(&payload.password)?;
    let user = users
        .create(NewUser {
            username: payload.username,
            password_hash,
            full_name: payload.full_name,
        })
        .await?;

    tracing::info!(user_id = user.id, username = %user.username, "User registered");
    Ok(respond(StatusCode::CREATED, user))
}

/// Authenticates a user and starts a session.
///
/// Any previous session of the same user is replaced, so tokens issued
/// before this call stop working.
pub async fn login(
    State(users): State<Arc<dyn UserDirectory>>,
    State(sessions): State<Arc<SessionAuth>>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::Validation(validation_errors.to_string()));
    }

    let user = users
        .find_by_username(&payload.username)
        .await?
        .ok_or(AuthError::InvalidCredentials)?;

    if !verify_password(&payload.password, &user.password)? {
        return Err(AuthError::InvalidCredentials.into());
    }

    let (session_id, token) = sessions.login(&user).await?;

    Ok(respond(
        StatusCode::OK,
        LoginResponse {
            token,
            token_type: "Bearer",
            session_id,
            user,
        },
    ))
}

/// Ends the caller's session.
pub async fn logout(
    State(sessions): State<Arc<SessionAuth>>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    sessions.logout(&claims.sub).await?;
    tracing::info!(user_id = %claims.sub, "User logged out");
    Ok(respond(StatusCode::OK, json!({ "message": "Logged out" })))
}

/// Replaces the caller's password after checking the old one.
///
/// The session is dropped afterwards, so every token issued before the change
/// (including the one on this request) is rejected.
pub async fn change_password(
    State(users): State<Arc<dyn UserDirectory>>,
    State(sessions): State<Arc<SessionAuth>>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::Validation(validation_errors.to_string()));
    }

    let user = users
        .find_by_uuid(claims.uid)
        .await?
        .ok_or(AuthError::SessionInvalidated)?;

    if !verify_password(&payload.old_password, &user.password)? {
        return Err(AuthError::InvalidCredentials.into());
    }

    let password_hash = hash_password(&payload.new_password)?;
    users.update_password(user.uuid, &password_hash).await?;
    sessions.logout(&claims.sub).await?;

    tracing::info!(user_id = %claims.sub, "Password changed");
    Ok(respond(
        StatusCode::OK,
        json!({ "message": "Password updated successfully" }),
    ))
}
