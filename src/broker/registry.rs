// src/broker/registry.rs

use std::sync::Arc;

use async_trait::async_trait;

use super::topic::Topic;
use super::transport::Delivery;
use crate::error::AppResult;

/// Processes messages consumed from one topic.
///
/// Invoked at least once per message; a redelivery carries the same
/// `Delivery::token()`.
#[async_trait]
pub trait TopicHandler: Send + Sync + 'static {
    async fn handle(&self, delivery: &Delivery) -> AppResult<()>;
}

/// Dispatch table binding every `Topic` to its handler.
///
/// One field per topic, so a missing binding is a compile error rather than
/// a silent no-op at runtime. There is no way to mutate it once built.
pub struct HandlerRegistry {
    quiz_export: Arc<dyn TopicHandler>,
    quiz_revoke: Arc<dyn TopicHandler>,
    user_quiz_export: Arc<dyn TopicHandler>,
}

impl HandlerRegistry {
    pub fn new(
        quiz_export: Arc<dyn TopicHandler>,
        quiz_revoke: Arc<dyn TopicHandler>,
        user_quiz_export: Arc<dyn TopicHandler>,
    ) -> Self {
        Self {
            quiz_export,
            quiz_revoke,
            user_quiz_export,
        }
    }

    pub fn handler(&self, topic: Topic) -> Arc<dyn TopicHandler> {
        match topic {
            Topic::QuizExport => self.quiz_export.clone(),
            Topic::QuizRevoke => self.quiz_revoke.clone(),
            Topic::UserQuizExport => self.user_quiz_export.clone(),
        }
    }
}

/// Handler that only records the message in the log.
pub struct LogOnlyHandler;

#[async_trait]
impl TopicHandler for LogOnlyHandler {
    async fn handle(&self, delivery: &Delivery) -> AppResult<()> {
        tracing::info!(
            topic = %delivery.topic,
            offset = delivery.offset,
            key = %delivery.key,
            value = %delivery.value,
            "Message consumed"
        );
        Ok(())
    }
}
