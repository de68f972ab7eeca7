// src/broker/memory.rs

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use super::transport::{BrokerMessage, BrokerTransport, Delivery, TopicCreation};
use crate::error::{AppError, AppResult};

#[derive(Debug, Default)]
struct TopicLog {
    messages: Vec<BrokerMessage>,
    committed: HashMap<String, u64>,
    cursors: HashMap<String, u64>,
}

#[derive(Debug, Default)]
pub struct MemoryBroker {
    topics: Mutex<HashMap<String, TopicLog>>,
    appended: Notify,
    /// Auto-create topics on first produce, like a broker with
    /// `auto.create.topics.enable`.
    auto_create: bool,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_auto_create() -> Self {
        Self {
            auto_create: true,
            ..Self::default()
        }
    }

    /// All messages ever produced to `topic`.
    pub fn messages(&self, topic: &str) -> Vec<BrokerMessage> {
        self.topics
            .lock()
            .ok()
            .and_then(|t| t.get(topic).map(|log| log.messages.clone()))
            .unwrap_or_default()
    }

    pub fn committed_offset(&self, group: &str, topic: &str) -> u64 {
        self.topics
            .lock()
            .ok()
            .and_then(|t| t.get(topic).and_then(|log| log.committed.get(group).copied()))
            .unwrap_or(0)
    }

    fn next(&self, group: &str, topic: &str) -> AppResult<Option<Delivery>> {
        let mut topics = self.lock()?;
        let log = topics
            .get_mut(topic)
            .ok_or_else(|| AppError::NotFound(format!("unknown topic: {topic}")))?;
        let committed = log.committed.get(group).copied().unwrap_or(0);
        let cursor = log.cursors.entry(group.to_string()).or_insert(committed);

        let Some(message) = log.messages.get(*cursor as usize) else {
            return Ok(None);
        };
        let delivery = Delivery {
            topic: topic.to_string(),
            offset: *cursor,
            key: message.key.clone(),
            value: message.value.clone(),
        };
        *cursor += 1;
        Ok(Some(delivery))
    }

    fn lock(&self) -> AppResult<std::sync::MutexGuard<'_, HashMap<String, TopicLog>>> {
        self.topics
            .lock()
            .map_err(|_| AppError::Internal("lock poisoned".into()))
    }
}

#[async_trait]
impl BrokerTransport for MemoryBroker {
    async fn topic_exists(&self, topic: &str) -> AppResult<bool> {
        Ok(self.lock()?.contains_key(topic))
    }

    async fn create_topic(
        &self,
        topic: &str,
        _partitions: u32,
        _replication_factor: u16,
    ) -> AppResult<TopicCreation> {
        let mut topics = self.lock()?;
        if topics.contains_key(topic) {
            return Ok(TopicCreation::AlreadyExists);
        }
        topics.insert(topic.to_string(), TopicLog::default());
        Ok(TopicCreation::Created)
    }

    async fn produce(&self, message: &BrokerMessage) -> AppResult<()> {
        {
            let mut topics = self.lock()?;
            if !topics.contains_key(&message.topic) && !self.auto_create {
                return Err(AppError::TransientStore(format!(
                    "unknown topic: {}",
                    message.topic
                )));
            }
            topics
                .entry(message.topic.clone())
                .or_default()
                .messages
                .push(message.clone());
        }
        self.appended.notify_waiters();
        Ok(())
    }

    async fn subscribe(&self, group: &str, topic: &str) -> AppResult<()> {
        let mut topics = self.lock()?;
        let log = topics
            .get_mut(topic)
            .ok_or_else(|| AppError::NotFound(format!("unknown topic: {topic}")))?;
        let committed = log.committed.get(group).copied().unwrap_or(0);
        log.cursors.insert(group.to_string(), committed);
        Ok(())
    }

    async fn fetch(
        &self,
        group: &str,
        topic: &str,
        max_wait: Duration,
    ) -> AppResult<Option<Delivery>> {
        let notified = self.appended.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        if let Some(delivery) = self.next(group, topic)? {
            return Ok(Some(delivery));
        }
        let _ = tokio::time::timeout(max_wait, notified).await;
        self.next(group, topic)
    }

    async fn commit(&self, group: &str, delivery: &Delivery) -> AppResult<()> {
        let mut topics = self.lock()?;
        let log = topics
            .get_mut(&delivery.topic)
            .ok_or_else(|| AppError::NotFound(format!("unknown topic: {}", delivery.topic)))?;
        let committed = log.committed.entry(group.to_string()).or_insert(0);
        *committed = (*committed).max(delivery.offset + 1);
        Ok(())
    }
}
