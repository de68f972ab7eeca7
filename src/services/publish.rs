// src/services/publish.rs

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use super::flatten::{
    ExportPlan, plan_export, question_artifact_path, quiz_artifact_path, quiz_dir,
};
use crate::broker::{Delivery, TopicHandler};
use crate::error::{AppError, AppResult};
use crate::models::quiz::{QuizArtifact, QuestionLedgerRow};
use crate::stores::{ArtifactStore, CacheClient, Notifier, QuizGraphReader};
use crate::wide_column::{Column, ColumnValues, CqlValue, Table, WideColumnRepository};

/// How long a delivery token is remembered for notification dedupe.
const DELIVERY_TOKEN_TTL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    Export,
    Revoke,
}

impl Operation {
    fn verb(self) -> &'static str {
        match self {
            Operation::Export => "export",
            Operation::Revoke => "revoke",
        }
    }

    fn done(self) -> &'static str {
        match self {
            Operation::Export => "exported",
            Operation::Revoke => "revoked",
        }
    }
}

/// Writes already applied by the current run.
#[derive(Debug, Default)]
struct WriteLog {
    completed: Vec<String>,
}

impl WriteLog {
    fn record(&mut self, what: impl Into<String>) {
        self.completed.push(what.into());
    }

    /// Upgrades `err` to `PartialFailure` once anything has been written.
    fn fail(&mut self, err: AppError) -> AppError {
        if self.completed.is_empty() {
            err
        } else {
            AppError::PartialFailure {
                completed: std::mem::take(&mut self.completed),
                cause: err.to_string(),
            }
        }
    }
}

/// Export and revocation of quizzes, run from broker consumers.
///
/// Neither operation is transactional: the artifact store and the ledger are
/// written one statement at a time, and a failure after the first landed
/// write surfaces as `PartialFailure` listing what was written.
pub struct PublishOrchestrator {
    reader: Arc<dyn QuizGraphReader>,
    artifacts: Arc<dyn ArtifactStore>,
    ledger: WideColumnRepository,
    notifier: Arc<dyn Notifier>,
    deliveries: CacheClient,
}

impl PublishOrchestrator {
    pub fn new(
        reader: Arc<dyn QuizGraphReader>,
        artifacts: Arc<dyn ArtifactStore>,
        ledger: WideColumnRepository,
        notifier: Arc<dyn Notifier>,
        deliveries: CacheClient,
    ) -> Self {
        Self {
            reader,
            artifacts,
            ledger,
            notifier,
            deliveries,
        }
    }

    /// Publishes the quiz: artifacts plus ledger rows, replacing any previous
    /// generation. Returns the quiz title.
    ///
    /// `delivery` is the broker token of the triggering message, if any; a
    /// redelivered message re-runs the writes but does not notify again.
    pub async fn export(
        &self,
        quiz_uuid: Uuid,
        socket_id: &str,
        delivery: Option<&str>,
    ) -> AppResult<String> {
        let (title, result) = match self.reader.get_quiz_graph(quiz_uuid).await {
            Ok(Some(quiz)) => {
                let title = quiz.title.clone();
                let result = match plan_export(&quiz) {
                    Ok(plan) => self.write_generation(&plan).await,
                    Err(e) => Err(e),
                };
                (title, result)
            }
            Ok(None) => (
                String::new(),
                Err(AppError::NotFound(format!("quiz {quiz_uuid}"))),
            ),
            Err(e) => (String::new(), Err(e.context("load quiz graph"))),
        };

        self.report(Operation::Export, quiz_uuid, &title, socket_id, delivery, &result)
            .await;
        result.map(|()| title)
    }

    /// Removes the published artifacts and ledger rows. Returns the title
    /// recovered from the quiz document.
    ///
    /// A second call for the same quiz fails with `NotFound`.
    pub async fn revoke(
        &self,
        quiz_uuid: Uuid,
        socket_id: &str,
        delivery: Option<&str>,
    ) -> AppResult<String> {
        let (title, result) = match self.published_title(quiz_uuid).await {
            Ok(title) => {
                let result = self.remove_generation(quiz_uuid, &mut WriteLog::default()).await;
                (title, result)
            }
            Err(e) => (String::new(), Err(e)),
        };

        self.report(Operation::Revoke, quiz_uuid, &title, socket_id, delivery, &result)
            .await;
        result.map(|()| title)
    }

    async fn write_generation(&self, plan: &ExportPlan) -> AppResult<()> {
        let quiz_uuid = plan.quiz.uuid;
        let mut log = WriteLog::default();

        // Re-runs must not leave links from an older chain behind.
        self.remove_generation(quiz_uuid, &mut log).await?;

        for link in &plan.links {
            let path = question_artifact_path(quiz_uuid, link.artifact.uuid);
            self.write_json(&path, &link.artifact)
                .await
                .map_err(|e| log.fail(e))?;
            log.record(path);

            self.ledger
                .insert(Table::Questions, question_row(&link.ledger))
                .await
                .map_err(|e| log.fail(e))?;
            log.record(format!("questions/{}", link.ledger.question_uuid));
        }

        let path = quiz_artifact_path(quiz_uuid);
        self.write_json(&path, &plan.quiz)
            .await
            .map_err(|e| log.fail(e))?;
        log.record(path);

        let row = BTreeMap::from([
            (Column::QuizUuid, CqlValue::from(plan.quiz_row.quiz_uuid)),
            (Column::QuestionUuid, CqlValue::from(plan.quiz_row.question_uuid)),
            (Column::TotalTime, CqlValue::from(plan.quiz_row.total_time)),
        ]);
        self.ledger
            .insert(Table::Quizzes, row)
            .await
            .map_err(|e| log.fail(e))?;

        tracing::info!(
            quiz_uuid = %quiz_uuid,
            questions = plan.links.len(),
            total_time = plan.quiz.total_time,
            "Quiz exported"
        );
        Ok(())
    }

    /// Deletes the artifact tree, then the question rows, then the quiz row.
    async fn remove_generation(&self, quiz_uuid: Uuid, log: &mut WriteLog) -> AppResult<()> {
        let dir = quiz_dir(quiz_uuid);
        self.artifacts
            .delete_tree(&dir)
            .await
            .map_err(|e| log.fail(e.context("delete artifacts")))?;
        log.record(format!("delete {dir}/"));

        for table in [Table::Questions, Table::Quizzes] {
            self.ledger
                .delete(table, by_quiz(quiz_uuid))
                .await
                .map_err(|e| log.fail(e))?;
            log.record(format!("delete {table}"));
        }
        Ok(())
    }

    /// Title of the published quiz, or `NotFound` when nothing is published.
    async fn published_title(&self, quiz_uuid: Uuid) -> AppResult<String> {
        let path = quiz_artifact_path(quiz_uuid);
        if !self.artifacts.exists(&quiz_dir(quiz_uuid)).await?
            || !self.artifacts.exists(&path).await?
        {
            return Err(AppError::NotFound(format!(
                "no published artifacts for quiz {quiz_uuid}"
            )));
        }

        let raw = self.artifacts.read(&path).await?;
        let doc: QuizArtifact = serde_json::from_slice(&raw)
            .map_err(|e| AppError::Internal(format!("corrupt quiz document {path}: {e}")))?;
        Ok(doc.title)
    }

    async fn write_json<T: serde::Serialize>(&self, path: &str, doc: &T) -> AppResult<()> {
        let bytes = serde_json::to_vec_pretty(doc)
            .map_err(|e| AppError::Internal(format!("encode {path}: {e}")))?;
        self.artifacts.write(path, bytes).await
    }

    /// Sends the outcome to the requester. Failures here are only logged.
    async fn report(
        &self,
        op: Operation,
        quiz_uuid: Uuid,
        title: &str,
        socket_id: &str,
        delivery: Option<&str>,
        result: &AppResult<()>,
    ) {
        let message = match result {
            Ok(()) => format!("Quiz \"{title}\" {} successfully", op.done()),
            Err(err) => {
                tracing::error!(
                    quiz_uuid = %quiz_uuid,
                    title = %title,
                    error = %err,
                    "Failed to {} quiz",
                    op.verb()
                );
                format!("Failed to {} quiz \"{title}\": {err}", op.verb())
            }
        };

        if let Some(token) = delivery {
            match self
                .deliveries
                .set_if_absent(&format!("delivery:{token}"), socket_id, DELIVERY_TOKEN_TTL)
                .await
            {
                Ok(true) => {}
                Ok(false) => {
                    tracing::info!(token, "Notification already sent for this delivery");
                    return;
                }
                // Fail open: a duplicate notification beats a lost one.
                Err(e) => tracing::warn!(token, error = %e, "Delivery dedupe unavailable"),
            }
        }

        if let Err(e) = self.notifier.notify(socket_id, &message).await {
            tracing::warn!(socket_id, error = %e, "Failed to send notification");
        }
    }
}

fn by_quiz(quiz_uuid: Uuid) -> ColumnValues {
    BTreeMap::from([(Column::QuizUuid, CqlValue::from(quiz_uuid))])
}

fn question_row(row: &QuestionLedgerRow) -> ColumnValues {
    BTreeMap::from([
        (Column::QuizUuid, CqlValue::from(row.quiz_uuid)),
        (Column::QuestionUuid, CqlValue::from(row.question_uuid)),
        (Column::PrevQuestionUuid, CqlValue::from(row.prev_question_uuid)),
        (Column::NextQuestionUuid, CqlValue::from(row.next_question_uuid)),
        (Column::AnswerHash, CqlValue::from(row.answer_hash.as_str())),
    ])
}

/// Parses the quiz UUID carried as the message key.
fn quiz_key(delivery: &Delivery) -> AppResult<Uuid> {
    Uuid::parse_str(&delivery.key).map_err(|_| {
        AppError::Validation(format!("message key {:?} is not a quiz UUID", delivery.key))
    })
}

/// `quiz_export` consumer: key is the quiz UUID, value the requester's socket.
pub struct ExportHandler(pub Arc<PublishOrchestrator>);

#[async_trait]
impl TopicHandler for ExportHandler {
    async fn handle(&self, delivery: &Delivery) -> AppResult<()> {
        let quiz_uuid = quiz_key(delivery)?;
        self.0
            .export(quiz_uuid, &delivery.value, Some(&delivery.token()))
            .await
            .map(|_| ())
    }
}

/// `revoke_quiz` consumer, same message shape as export.
pub struct RevokeHandler(pub Arc<PublishOrchestrator>);

#[async_trait]
impl TopicHandler for RevokeHandler {
    async fn handle(&self, delivery: &Delivery) -> AppResult<()> {
        let quiz_uuid = quiz_key(delivery)?;
        self.0
            .revoke(quiz_uuid, &delivery.value, Some(&delivery.token()))
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::quiz::{Answer, Question, Quiz};
    use crate::stores::{
        MemoryArtifactStore, MemoryKeyValueStore, MemoryNotifier, MemoryQuizGraphReader,
    };
    use crate::wide_column::{MemoryCluster, StatementKind};

    struct Fixture {
        reader: Arc<MemoryQuizGraphReader>,
        artifacts: Arc<MemoryArtifactStore>,
        cluster: Arc<MemoryCluster>,
        notifier: Arc<MemoryNotifier>,
        orchestrator: PublishOrchestrator,
    }

    fn fixture() -> Fixture {
        let reader = Arc::new(MemoryQuizGraphReader::new());
        let artifacts = Arc::new(MemoryArtifactStore::new());
        let cluster = Arc::new(MemoryCluster::recording());
        let notifier = Arc::new(MemoryNotifier::new());
        let orchestrator = PublishOrchestrator::new(
            reader.clone(),
            artifacts.clone(),
            WideColumnRepository::new(cluster.clone()),
            notifier.clone(),
            CacheClient::new(Arc::new(MemoryKeyValueStore::new()), Duration::from_secs(5)),
        );
        Fixture {
            reader,
            artifacts,
            cluster,
            notifier,
            orchestrator,
        }
    }

    struct FailingNotifier;

    #[async_trait]
    impl Notifier for FailingNotifier {
        async fn notify(&self, _socket_id: &str, _message: &str) -> AppResult<()> {
            Err(AppError::TransientStore("room service down".into()))
        }
    }

    fn sample_quiz(limits: &[i32]) -> Quiz {
        Quiz {
            uuid: Uuid::new_v4(),
            title: "Rivers of Europe".into(),
            is_published: true,
            questions: limits
                .iter()
                .enumerate()
                .map(|(i, limit)| Question {
                    uuid: Uuid::new_v4(),
                    description: format!("Question {}", i + 1),
                    position: i as i32 + 1,
                    time_limit: *limit,
                    answers: vec![
                        Answer {
                            uuid: Uuid::new_v4(),
                            description: "right".into(),
                            is_correct: true,
                        },
                        Answer {
                            uuid: Uuid::new_v4(),
                            description: "wrong".into(),
                            is_correct: false,
                        },
                    ],
                })
                .collect(),
            created_at: None,
            updated_at: None,
        }
    }

    #[tokio::test]
    async fn export_writes_artifacts_and_ledger() {
        let fx = fixture();
        let quiz = sample_quiz(&[10, 20, 15]);
        fx.reader.put(quiz.clone());

        let title = fx.orchestrator.export(quiz.uuid, "sock-1", None).await.unwrap();
        assert_eq!(title, "Rivers of Europe");

        assert_eq!(fx.artifacts.paths().len(), 4);
        let doc: QuizArtifact = serde_json::from_slice(
            &fx.artifacts.read(&quiz_artifact_path(quiz.uuid)).await.unwrap(),
        )
        .unwrap();
        assert_eq!(doc.total_time, 45);
        assert_eq!(doc.question_uuid, quiz.questions[0].uuid);

        assert_eq!(fx.cluster.row_count(Table::Questions), 3);
        assert_eq!(fx.cluster.row_count(Table::Quizzes), 1);

        let sent = fx.notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "sock-1");
        assert!(sent[0].1.contains("exported successfully"));
    }

    #[tokio::test]
    async fn reexport_replaces_previous_chain() {
        let fx = fixture();
        let mut quiz = sample_quiz(&[10, 20, 15]);
        fx.reader.put(quiz.clone());
        fx.orchestrator.export(quiz.uuid, "s", None).await.unwrap();

        quiz.questions.truncate(1);
        fx.reader.put(quiz.clone());
        fx.orchestrator.export(quiz.uuid, "s", None).await.unwrap();

        assert_eq!(fx.cluster.row_count(Table::Questions), 1);
        assert_eq!(fx.artifacts.paths().len(), 2);
    }

    #[tokio::test]
    async fn missing_and_empty_quizzes_fail_before_writing() {
        let fx = fixture();
        let err = fx
            .orchestrator
            .export(Uuid::new_v4(), "s", None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let empty = sample_quiz(&[]);
        fx.reader.put(empty.clone());
        let err = fx.orchestrator.export(empty.uuid, "s", None).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        assert!(fx.cluster.executed().is_empty());
        let sent = fx.notifier.sent();
        assert_eq!(sent.len(), 2);
        assert!(sent.iter().all(|(_, m)| m.starts_with("Failed to export")));
    }

    #[tokio::test]
    async fn ledger_failure_midway_is_partial() {
        let fx = fixture();
        let quiz = sample_quiz(&[10, 20]);
        fx.reader.put(quiz.clone());
        fx.cluster.fail_on(Table::Quizzes, StatementKind::Insert);

        let err = fx.orchestrator.export(quiz.uuid, "s", None).await.unwrap_err();
        match err {
            AppError::PartialFailure { completed, .. } => {
                assert!(completed.contains(&quiz_artifact_path(quiz.uuid)));
            }
            other => panic!("expected partial failure, got {other:?}"),
        }
        // Question rows landed without the quiz row.
        assert_eq!(fx.cluster.row_count(Table::Questions), 2);
        assert_eq!(fx.cluster.row_count(Table::Quizzes), 0);
    }

    #[tokio::test]
    async fn revoke_removes_everything_and_second_call_is_not_found() {
        let fx = fixture();
        let quiz = sample_quiz(&[10, 20]);
        fx.reader.put(quiz.clone());
        fx.orchestrator.export(quiz.uuid, "s", None).await.unwrap();

        let title = fx.orchestrator.revoke(quiz.uuid, "s", None).await.unwrap();
        assert_eq!(title, "Rivers of Europe");
        assert!(fx.artifacts.paths().is_empty());
        assert_eq!(fx.cluster.row_count(Table::Questions), 0);
        assert_eq!(fx.cluster.row_count(Table::Quizzes), 0);

        let err = fx.orchestrator.revoke(quiz.uuid, "s", None).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn redelivery_does_not_notify_twice() {
        let fx = fixture();
        let quiz = sample_quiz(&[10]);
        fx.reader.put(quiz.clone());

        let delivery = Delivery {
            topic: "quiz_export".into(),
            offset: 3,
            key: quiz.uuid.to_string(),
            value: "sock-9".into(),
        };
        let handler = ExportHandler(Arc::new(fx.orchestrator));
        handler.handle(&delivery).await.unwrap();
        handler.handle(&delivery).await.unwrap();

        assert_eq!(fx.notifier.sent().len(), 1);
        assert_eq!(fx.cluster.row_count(Table::Questions), 1);
    }

    #[tokio::test]
    async fn handler_rejects_malformed_key() {
        let fx = fixture();
        let handler = RevokeHandler(Arc::new(fx.orchestrator));
        let delivery = Delivery {
            topic: "revoke_quiz".into(),
            offset: 0,
            key: "not-a-uuid".into(),
            value: "s".into(),
        };
        assert!(matches!(
            handler.handle(&delivery).await,
            Err(AppError::Validation(_))
        ));
        assert!(fx.notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn notification_failure_does_not_fail_the_operation() {
        let reader = Arc::new(MemoryQuizGraphReader::new());
        let artifacts = Arc::new(MemoryArtifactStore::new());
        let cluster = Arc::new(MemoryCluster::new());
        let orchestrator = PublishOrchestrator::new(
            reader.clone(),
            artifacts.clone(),
            WideColumnRepository::new(cluster.clone()),
            Arc::new(FailingNotifier),
            CacheClient::new(Arc::new(MemoryKeyValueStore::new()), Duration::from_secs(5)),
        );
        let quiz = sample_quiz(&[10, 20]);
        reader.put(quiz.clone());

        let title = orchestrator.export(quiz.uuid, "s", Some("quiz_export:0")).await.unwrap();
        assert_eq!(title, "Rivers of Europe");
        assert_eq!(cluster.row_count(Table::Questions), 2);

        let title = orchestrator.revoke(quiz.uuid, "s", Some("revoke_quiz:0")).await.unwrap();
        assert_eq!(title, "Rivers of Europe");
        assert!(artifacts.paths().is_empty());
    }

    #[tokio::test]
    async fn revoke_failure_after_artifacts_are_gone_is_partial() {
        let fx = fixture();
        let quiz = sample_quiz(&[10, 20]);
        fx.reader.put(quiz.clone());
        fx.orchestrator.export(quiz.uuid, "s", None).await.unwrap();
        fx.cluster.fail_on(Table::Quizzes, StatementKind::Delete);

        let err = fx.orchestrator.revoke(quiz.uuid, "s", None).await.unwrap_err();
        match err {
            AppError::PartialFailure { completed, .. } => {
                assert_eq!(
                    completed,
                    vec![format!("delete {}/", quiz.uuid), "delete questions".to_string()]
                );
            }
            other => panic!("expected partial failure, got {other:?}"),
        }
        assert!(fx.artifacts.paths().is_empty());
        assert_eq!(fx.cluster.row_count(Table::Questions), 0);
        assert_eq!(fx.cluster.row_count(Table::Quizzes), 1);

        let sent = fx.notifier.sent();
        assert!(sent.last().unwrap().1.starts_with("Failed to revoke quiz \"Rivers of Europe\""));
    }
}
