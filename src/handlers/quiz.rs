// src/handlers/quiz.rs

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::json;
use validator::Validate;

use super::{parse_uuid, respond};
use crate::{
    broker::{MessageBroker, Topic},
    error::AppError,
    models::progress::{LeaderboardQuery, SubmitAnswerRequest},
    services::{LeaderboardReader, ProgressService},
    utils::jwt::Claims,
};

#[derive(Debug, Deserialize)]
pub struct SocketQuery {
    pub socket_id: Option<String>,
}

/// Queues an export of the quiz. The outcome is pushed to `socket_id`.
pub async fn export_quiz(
    State(broker): State<Arc<MessageBroker>>,
    Path(uuid): Path<String>,
    Query(query): Query<SocketQuery>,
) -> Result<impl IntoResponse, AppError> {
    enqueue(&broker, Topic::QuizExport, &uuid, query).await
}

/// Queues a revocation of the quiz.
pub async fn revoke_quiz(
    State(broker): State<Arc<MessageBroker>>,
    Path(uuid): Path<String>,
    Query(query): Query<SocketQuery>,
) -> Result<impl IntoResponse, AppError> {
    enqueue(&broker, Topic::QuizRevoke, &uuid, query).await
}

async fn enqueue(
    broker: &MessageBroker,
    topic: Topic,
    raw_uuid: &str,
    query: SocketQuery,
) -> Result<impl IntoResponse + use<>, AppError> {
    let quiz_uuid = parse_uuid(raw_uuid)?;
    let socket_id = query
        .socket_id
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| AppError::Validation("socket_id is required".to_string()))?;

    broker
        .publish(topic, &quiz_uuid.to_string(), &socket_id)
        .await?;
    tracing::info!(topic = %topic, quiz_uuid = %quiz_uuid, "Request queued");

    Ok(respond(
        StatusCode::ACCEPTED,
        json!({ "message": format!("{topic} queued"), "quiz_uuid": quiz_uuid }),
    ))
}

/// Returns the caller's progress, starting it on first access.
pub async fn quiz_status(
    State(progress): State<ProgressService>,
    Extension(claims): Extension<Claims>,
    Path(uuid): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let quiz_uuid = parse_uuid(&uuid)?;
    let status = progress
        .quiz_status(claims.uid, quiz_uuid, &claims.fullname)
        .await?;
    Ok(respond(StatusCode::OK, status))
}

pub async fn submit_answer(
    State(progress): State<ProgressService>,
    Extension(claims): Extension<Claims>,
    Path(uuid): Path<String>,
    Json(payload): Json<SubmitAnswerRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::Validation(validation_errors.to_string()));
    }
    let quiz_uuid = parse_uuid(&uuid)?;
    let outcome = progress
        .submit_answer(claims.uid, quiz_uuid, &payload)
        .await?;
    Ok(respond(StatusCode::OK, outcome))
}

pub async fn get_leaderboard(
    State(reader): State<LeaderboardReader>,
    Path(uuid): Path<String>,
    Query(query): Query<LeaderboardQuery>,
) -> Result<impl IntoResponse, AppError> {
    let quiz_uuid = parse_uuid(&uuid)?;
    let entries = reader
        .top_scores(quiz_uuid, query.limit.unwrap_or(0))
        .await?;
    Ok(respond(StatusCode::OK, entries))
}
