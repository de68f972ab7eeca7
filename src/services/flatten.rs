// src/services/flatten.rs

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::quiz::{
    PublicAnswer, Question, QuestionArtifact, QuestionLedgerRow, Quiz, QuizArtifact,
    QuizLedgerRow,
};

/// Hex digest over the sorted, comma-joined UUIDs of `correct`.
///
/// Permutations of the same set hash identically, so a submitted answer set
/// can be checked without the stored side ever revealing which answers are
/// correct.
pub fn answer_hash<I>(correct: I) -> String
where
    I: IntoIterator<Item = Uuid>,
{
    let mut ids: Vec<String> = correct.into_iter().map(|u| u.to_string()).collect();
    ids.sort();
    hex::encode(Sha256::digest(ids.join(",").as_bytes()))
}

/// One question in chain position.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainLink {
    pub artifact: QuestionArtifact,
    pub ledger: QuestionLedgerRow,
}

/// Everything an export writes for one quiz.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportPlan {
    pub quiz: QuizArtifact,
    pub quiz_row: QuizLedgerRow,
    /// Head first.
    pub links: Vec<ChainLink>,
}

impl ExportPlan {
    pub fn head(&self) -> Uuid {
        self.quiz_row.question_uuid
    }
}

/// Builds the export chain: questions stable-sorted by position, each linked
/// to its neighbours.
pub fn plan_export(quiz: &Quiz) -> AppResult<ExportPlan> {
    let mut ordered: Vec<&Question> = quiz.questions.iter().collect();
    // `sort_by_key` is stable: equal positions keep their input order.
    ordered.sort_by_key(|q| q.position);

    let Some(head) = ordered.first() else {
        return Err(AppError::Validation(format!(
            "quiz {} has no questions to export",
            quiz.uuid
        )));
    };
    let head = head.uuid;

    let links = ordered
        .iter()
        .enumerate()
        .map(|(i, q)| {
            let prev = i.checked_sub(1).map(|p| ordered[p].uuid);
            let next = ordered.get(i + 1).map(|n| n.uuid);
            ChainLink {
                artifact: QuestionArtifact {
                    uuid: q.uuid,
                    description: q.description.clone(),
                    position: q.position,
                    time_limit: q.time_limit,
                    answers: q
                        .answers
                        .iter()
                        .map(|a| PublicAnswer {
                            uuid: a.uuid,
                            description: a.description.clone(),
                        })
                        .collect(),
                    next_question_uuid: next.map(|u| u.to_string()).unwrap_or_default(),
                },
                ledger: QuestionLedgerRow {
                    quiz_uuid: quiz.uuid,
                    question_uuid: q.uuid,
                    prev_question_uuid: prev,
                    next_question_uuid: next,
                    answer_hash: answer_hash(
                        q.answers.iter().filter(|a| a.is_correct).map(|a| a.uuid),
                    ),
                },
            }
        })
        .collect();

    let total_time = ordered
        .iter()
        .try_fold(0i32, |acc, q| acc.checked_add(q.time_limit))
        .ok_or_else(|| {
            AppError::Validation(format!("quiz {} total time limit overflows", quiz.uuid))
        })?;

    Ok(ExportPlan {
        quiz: QuizArtifact {
            uuid: quiz.uuid,
            title: quiz.title.clone(),
            is_published: quiz.is_published,
            total_time,
            question_uuid: head,
            created_at: quiz.created_at,
            updated_at: quiz.updated_at,
        },
        quiz_row: QuizLedgerRow {
            quiz_uuid: quiz.uuid,
            question_uuid: head,
            total_time,
        },
        links,
    })
}

/// Artifact directory of a quiz.
pub fn quiz_dir(quiz_uuid: Uuid) -> String {
    quiz_uuid.to_string()
}

/// Path of the quiz-level document.
pub fn quiz_artifact_path(quiz_uuid: Uuid) -> String {
    format!("{quiz_uuid}/quiz.json")
}

pub fn question_artifact_path(quiz_uuid: Uuid, question_uuid: Uuid) -> String {
    format!("{quiz_uuid}/questions/{question_uuid}.json")
}
