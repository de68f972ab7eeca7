// src/broker/mod.rs

pub mod memory;
pub mod registry;
pub mod service;
pub mod topic;
pub mod transport;

pub use memory::MemoryBroker;
pub use registry::{HandlerRegistry, LogOnlyHandler, TopicHandler};
pub use service::{ConsumerGroup, MessageBroker, ensure_topic_exists};
pub use topic::Topic;
pub use transport::{BrokerMessage, BrokerTransport, Delivery, TopicCreation};
