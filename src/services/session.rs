// src/services/session.rs

use std::sync::Arc;

use uuid::Uuid;

use crate::config::SessionConfig;
use crate::error::{AppError, AppResult, AuthError};
use crate::models::user::User;
use crate::stores::kv::{CacheClient, KeyValueStore};
use crate::utils::jwt::{Claims, sign_jwt, verify_jwt};

/// Session-gated authentication.
///
/// A token is only honoured while its session id is the one on record for
/// the user, so a newer login or a logout revokes older tokens before they
/// expire.
pub struct SessionAuth {
    sessions: CacheClient,
    config: SessionConfig,
}

fn session_key(user_id: &str) -> String {
    format!("user:{user_id}")
}

impl SessionAuth {
    pub fn new(config: SessionConfig, store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            sessions: CacheClient::new(store, config.store_timeout),
            config,
        }
    }

    /// Starts a session for `user`, replacing any previous one.
    /// Returns `(session_id, token)`.
    pub async fn login(&self, user: &User) -> AppResult<(String, String)> {
        let session_id = Uuid::new_v4().to_string();
        let token = sign_jwt(
            user,
            &session_id,
            &self.config.jwt_secret,
            self.config.ttl.as_secs(),
        )?;

        self.sessions
            .set_json(&session_key(&user.id.to_string()), &session_id, self.config.ttl)
            .await
            .map_err(|e| e.context("store session"))?;

        tracing::info!(user_id = user.id, "Session started");
        Ok((session_id, token))
    }

    /// Verifies the token, then checks its session id against the store.
    pub async fn authenticate(&self, token: &str) -> AppResult<Claims> {
        let claims = verify_jwt(token, &self.config.jwt_secret)?;

        let stored: Option<String> = self
            .sessions
            .get_json(&session_key(&claims.sub))
            .await
            .map_err(|e| e.context("check session"))?;

        match stored {
            Some(sid) if sid == claims.sid => Ok(claims),
            _ => {
                tracing::debug!(user_id = %claims.sub, "Session not found or mismatch");
                Err(AuthError::SessionInvalidated.into())
            }
        }
    }

    pub fn require_admin(claims: &Claims) -> AppResult<()> {
        if claims.is_admin {
            Ok(())
        } else {
            Err(AppError::Auth(AuthError::AdminRequired))
        }
    }

    /// Ends the user's session; all of their tokens stop working.
    pub async fn logout(&self, user_id: &str) -> AppResult<()> {
        self.sessions.delete(&session_key(user_id)).await
    }
}
