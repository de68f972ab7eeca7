// src/services/progress.rs

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use super::flatten::answer_hash;
use crate::broker::{MessageBroker, Topic};
use crate::error::{AppError, AppResult};
use crate::models::progress::{AnswerOutcome, SubmitAnswerRequest, UserQuizProgress};
use crate::wide_column::{Column, ColumnValues, CqlValue, Row, Table, WideColumnRepository};

/// Per-user progress through published quizzes.
///
/// A finished run keeps the nil UUID as its current question.
#[derive(Clone)]
pub struct ProgressService {
    repo: WideColumnRepository,
    broker: Arc<MessageBroker>,
}

impl ProgressService {
    pub fn new(repo: WideColumnRepository, broker: Arc<MessageBroker>) -> Self {
        Self { repo, broker }
    }

    /// Returns the user's progress, starting a run at the head question on
    /// first access. Fails with `NotFound` when the quiz is not published.
    pub async fn quiz_status(
        &self,
        user_uuid: Uuid,
        quiz_uuid: Uuid,
        full_name: &str,
    ) -> AppResult<UserQuizProgress> {
        if let Some(progress) = self.find(user_uuid, quiz_uuid).await? {
            return Ok(progress);
        }

        let quiz = self
            .repo
            .select(
                Table::Quizzes,
                &[Column::QuestionUuid],
                BTreeMap::from([(Column::QuizUuid, CqlValue::from(quiz_uuid))]),
                None,
                Some(1),
            )
            .await?;
        let head = quiz
            .first()
            .ok_or_else(|| AppError::NotFound(format!("quiz {quiz_uuid} is not published")))?
            .uuid(Column::QuestionUuid)?;

        let now = Utc::now();
        let progress = UserQuizProgress {
            user_uuid,
            quiz_uuid,
            current_question_uuid: head,
            full_name: full_name.to_string(),
            score: 0,
            created_at: now,
            updated_at: now,
        };
        self.repo
            .insert(Table::UserQuizzes, progress_row(&progress))
            .await
            .map_err(|e| e.context("create progress"))?;

        tracing::info!(user_uuid = %user_uuid, quiz_uuid = %quiz_uuid, "Progress created");

        match serde_json::to_string(&progress) {
            Ok(payload) => {
                let key = format!("{user_uuid}|{quiz_uuid}");
                if let Err(e) = self.broker.publish(Topic::UserQuizExport, &key, &payload).await {
                    tracing::warn!(%key, error = %e, "Failed to publish progress snapshot");
                }
            }
            Err(e) => tracing::warn!(error = %e, "Failed to encode progress snapshot"),
        }

        Ok(progress)
    }

    /// Checks the answer set for the user's current question and advances.
    pub async fn submit_answer(
        &self,
        user_uuid: Uuid,
        quiz_uuid: Uuid,
        req: &SubmitAnswerRequest,
    ) -> AppResult<AnswerOutcome> {
        let current = self
            .find(user_uuid, quiz_uuid)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("no progress for quiz {quiz_uuid}")))?;

        if current.current_question_uuid.is_nil() {
            return Err(AppError::Validation("quiz already finished".to_string()));
        }
        if current.current_question_uuid != req.question_uuid {
            return Err(AppError::Validation(format!(
                "question {} is not the current question",
                req.question_uuid
            )));
        }

        let rows = self
            .repo
            .select(
                Table::Questions,
                &[Column::NextQuestionUuid, Column::AnswerHash],
                BTreeMap::from([
                    (Column::QuizUuid, CqlValue::from(quiz_uuid)),
                    (Column::QuestionUuid, CqlValue::from(req.question_uuid)),
                ]),
                None,
                Some(1),
            )
            .await?;
        let question = rows.first().ok_or_else(|| {
            AppError::NotFound(format!("question {} is not published", req.question_uuid))
        })?;

        let correct =
            answer_hash(req.answer_uuids.iter().copied()) == question.text(Column::AnswerHash)?;
        let next = question.opt_uuid(Column::NextQuestionUuid)?;

        let updated = UserQuizProgress {
            current_question_uuid: next.unwrap_or_else(Uuid::nil),
            score: current.score + i32::from(correct),
            updated_at: Utc::now(),
            ..current.clone()
        };

        if updated.score == current.score {
            self.repo
                .update(
                    Table::UserQuizzes,
                    BTreeMap::from([
                        (
                            Column::CurrentQuestionUuid,
                            CqlValue::from(updated.current_question_uuid),
                        ),
                        (Column::UpdatedAt, CqlValue::from(updated.updated_at)),
                    ]),
                    progress_key(&current),
                )
                .await?;
        } else {
            // Score is part of the primary key: write the new row first so a
            // failure in between leaves a duplicate rather than nothing.
            self.repo
                .insert(Table::UserQuizzes, progress_row(&updated))
                .await?;
            self.repo
                .delete(Table::UserQuizzes, progress_key(&current))
                .await
                .map_err(|e| AppError::PartialFailure {
                    completed: vec![format!("insert {} score {}", Table::UserQuizzes, updated.score)],
                    cause: e.to_string(),
                })?;
        }

        Ok(AnswerOutcome {
            correct,
            finished: next.is_none(),
            progress: updated,
        })
    }

    async fn find(&self, user_uuid: Uuid, quiz_uuid: Uuid) -> AppResult<Option<UserQuizProgress>> {
        let rows = self
            .repo
            .select(
                Table::UserQuizzesByUser,
                &[],
                BTreeMap::from([
                    (Column::UserUuid, CqlValue::from(user_uuid)),
                    (Column::QuizUuid, CqlValue::from(quiz_uuid)),
                ]),
                None,
                Some(1),
            )
            .await?;
        rows.first().map(progress_from_row).transpose()
    }
}

fn progress_key(p: &UserQuizProgress) -> ColumnValues {
    BTreeMap::from([
        (Column::QuizUuid, CqlValue::from(p.quiz_uuid)),
        (Column::Score, CqlValue::from(p.score)),
        (Column::UserUuid, CqlValue::from(p.user_uuid)),
    ])
}

fn progress_row(p: &UserQuizProgress) -> ColumnValues {
    let mut row = progress_key(p);
    row.extend([
        (Column::FullName, CqlValue::from(p.full_name.as_str())),
        (Column::CurrentQuestionUuid, CqlValue::from(p.current_question_uuid)),
        (Column::CreatedAt, CqlValue::from(p.created_at)),
        (Column::UpdatedAt, CqlValue::from(p.updated_at)),
    ]);
    row
}

fn progress_from_row(row: &Row) -> AppResult<UserQuizProgress> {
    Ok(UserQuizProgress {
        user_uuid: row.uuid(Column::UserUuid)?,
        quiz_uuid: row.uuid(Column::QuizUuid)?,
        current_question_uuid: row.uuid(Column::CurrentQuestionUuid)?,
        full_name: row.text(Column::FullName)?,
        score: row.int(Column::Score)?,
        created_at: row.timestamp(Column::CreatedAt)?,
        updated_at: row.timestamp(Column::UpdatedAt)?,
    })
}
