// src/models/quiz.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A quiz with its ordered questions, as held by the relational store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quiz {
    pub uuid: Uuid,
    pub title: String,
    pub is_published: bool,
    pub questions: Vec<Question>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// A question in a quiz. `position` defines chain order and is unique
/// within the quiz.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub uuid: Uuid,
    pub description: String,
    pub position: i32,
    /// Seconds allowed for this question.
    pub time_limit: i32,
    pub answers: Vec<Answer>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    pub uuid: Uuid,
    pub description: String,
    /// Never leaves the service; exported only as part of `answer_hash`.
    pub is_correct: bool,
}

/// Row of the `quizzes` table.
#[derive(Debug, Clone, FromRow)]
pub struct QuizRow {
    pub uuid: Uuid,
    pub title: String,
    pub is_published: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Row of the `questions` table.
#[derive(Debug, Clone, FromRow)]
pub struct QuestionRow {
    pub uuid: Uuid,
    pub description: String,
    pub position: i32,
    pub time_limit: i32,
}

/// Row of the `answers` table.
#[derive(Debug, Clone, FromRow)]
pub struct AnswerRow {
    pub uuid: Uuid,
    pub question_uuid: Uuid,
    pub description: String,
    pub is_correct: bool,
}

/// Answer as published: correctness stripped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicAnswer {
    pub uuid: Uuid,
    pub description: String,
}

/// Per-question export document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionArtifact {
    pub uuid: Uuid,
    pub description: String,
    pub position: i32,
    pub time_limit: i32,
    pub answers: Vec<PublicAnswer>,
    /// Empty string on the tail question.
    pub next_question_uuid: String,
}

/// Quiz-level export document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizArtifact {
    pub uuid: Uuid,
    pub title: String,
    pub is_published: bool,
    /// Sum of every question's time limit.
    pub total_time: i32,
    /// Head of the question chain.
    pub question_uuid: Uuid,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// One link of the exported question chain in the read store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionLedgerRow {
    pub quiz_uuid: Uuid,
    pub question_uuid: Uuid,
    pub prev_question_uuid: Option<Uuid>,
    pub next_question_uuid: Option<Uuid>,
    pub answer_hash: String,
}

/// Published-quiz marker in the read store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizLedgerRow {
    pub quiz_uuid: Uuid,
    pub question_uuid: Uuid,
    pub total_time: i32,
}
