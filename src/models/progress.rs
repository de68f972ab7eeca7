// src/models/progress.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// A user's run through a published quiz.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserQuizProgress {
    pub user_uuid: Uuid,
    pub quiz_uuid: Uuid,
    pub current_question_uuid: Uuid,
    #[serde(rename = "fullname")]
    pub full_name: String,
    pub score: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Leaderboard line, as served and cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub user_uuid: Uuid,
    pub quiz_uuid: Uuid,
    #[serde(rename = "fullname")]
    pub full_name: String,
    pub score: i32,
}

#[derive(Debug, Deserialize)]
pub struct LeaderboardQuery {
    pub limit: Option<i64>,
}

/// DTO for answering the current question.
#[derive(Debug, Deserialize, Validate)]
pub struct SubmitAnswerRequest {
    pub question_uuid: Uuid,
    #[validate(length(max = 64))]
    pub answer_uuids: Vec<Uuid>,
}

/// Outcome of an answer submission.
#[derive(Debug, Clone, Serialize)]
pub struct AnswerOutcome {
    pub correct: bool,
    /// True once the tail question has been answered.
    pub finished: bool,
    pub progress: UserQuizProgress,
}
