// src/broker/transport.rs

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AppResult;

/// A message handed to the producer pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerMessage {
    pub topic: String,
    pub key: String,
    pub value: String,
}

/// A fetched message together with its position in the topic log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub topic: String,
    pub offset: u64,
    pub key: String,
    pub value: String,
}

impl Delivery {
    /// Stable identifier of this log position, shared by every redelivery.
    pub fn token(&self) -> String {
        format!("{}:{}", self.topic, self.offset)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicCreation {
    Created,
    /// Another creator won the race. Not an error.
    AlreadyExists,
}

/// Wire-level broker operations.
#[async_trait]
pub trait BrokerTransport: Send + Sync + 'static {
    async fn topic_exists(&self, topic: &str) -> AppResult<bool>;

    async fn create_topic(
        &self,
        topic: &str,
        partitions: u32,
        replication_factor: u16,
    ) -> AppResult<TopicCreation>;

    async fn produce(&self, message: &BrokerMessage) -> AppResult<()>;

    /// Positions the group's reader at its last committed offset.
    async fn subscribe(&self, group: &str, topic: &str) -> AppResult<()>;

    /// Returns the next uncommitted message, waiting at most `max_wait`.
    async fn fetch(&self, group: &str, topic: &str, max_wait: Duration)
    -> AppResult<Option<Delivery>>;

    /// Commits a single message. Offsets never move backwards.
    async fn commit(&self, group: &str, delivery: &Delivery) -> AppResult<()>;
}
