// src/utils/jwt.rs

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    body::Body,
    extract::State,
    http::{Request, header},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::{AppError, AuthError},
    models::user::User,
    services::session::SessionAuth,
};

/// JWT Claims structure.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Subject - Stores the User ID (as string).
    pub sub: String,
    /// Public user UUID, used as the progress key.
    pub uid: Uuid,
    /// Session identifier; must match the server-side session entry.
    pub sid: String,
    pub is_admin: bool,
    pub fullname: String,
    /// Expiration time as Unix timestamp.
    pub exp: usize,
}

/// Signs a new JWT for the user, bound to `session_id`.
pub fn sign_jwt(
    user: &User,
    session_id: &str,
    secret: &str,
    expiration_seconds: u64,
) -> Result<String, AppError> {
    // Calculate expiration: current time + expiration_seconds
    let expiration = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| AppError::Internal(e.to_string()))?
        .as_secs() as usize
        + expiration_seconds as usize;

    let claims = Claims {
        sub: user.id.to_string(),
        uid: user.uuid,
        sid: session_id.to_owned(),
        is_admin: user.is_admin,
        fullname: user.full_name.clone(),
        exp: expiration,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(e.to_string()))
}

/// Verifies signature and expiry and decodes the claims.
pub fn verify_jwt(token: &str, secret: &str) -> Result<Claims, AppError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;

    Ok(token_data.claims)
}

/// Extracts the token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(req: &Request<Body>) -> Result<&str, AuthError> {
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());

    match auth_header {
        Some(header) if header.starts_with("Bearer ") && header.len() > 7 => Ok(&header[7..]),
        _ => Err(AuthError::MissingToken),
    }
}

/// Axum Middleware: Authentication.
///
/// Validates the bearer token and the server-side session behind it, then
/// injects `Claims` into the request extensions for handlers to use.
pub async fn auth_middleware(
    State(auth): State<Arc<SessionAuth>>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    // Owned: the request body is not `Sync`, so no borrow of `req` may live
    // across the await.
    let token = bearer_token(&req)?.to_owned();
    let claims = auth.authenticate(&token).await?;
    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

/// Axum Middleware: Admin Authorization.
///
/// Must be used AFTER `auth_middleware`.
pub async fn admin_middleware(req: Request<Body>, next: Next) -> Result<Response, AppError> {
    let claims = req
        .extensions()
        .get::<Claims>()
        .ok_or(AuthError::MissingToken)?;

    SessionAuth::require_admin(claims)?;

    Ok(next.run(req).await)
}
