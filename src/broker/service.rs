// src/broker/service.rs

use std::sync::{Arc, Mutex};

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use super::registry::HandlerRegistry;
use super::topic::Topic;
use super::transport::{BrokerMessage, BrokerTransport, TopicCreation};
use crate::config::BrokerConfig;
use crate::error::{AppError, AppResult};

type Receiver = Arc<tokio::sync::Mutex<mpsc::Receiver<BrokerMessage>>>;

/// Producer worker pool plus per-topic consumers.
///
/// `publish` only enqueues; a fixed set of workers drains the bounded queue
/// into the transport. `close` stops intake and waits for the queue to drain.
pub struct MessageBroker {
    transport: Arc<dyn BrokerTransport>,
    config: BrokerConfig,
    queue: Mutex<Option<mpsc::Sender<BrokerMessage>>>,
    workers: tokio::sync::Mutex<Vec<JoinHandle<()>>>,
}

/// Running consumers, one task per topic.
pub struct ConsumerGroup {
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl MessageBroker {
    /// Provisions the configured topics and starts the producer pool.
    /// Topic provisioning failures are logged; the service starts anyway.
    pub async fn connect(config: BrokerConfig, transport: Arc<dyn BrokerTransport>) -> Self {
        tracing::info!(
            group_id = %config.group_id,
            workers = config.worker_count,
            queue_capacity = config.queue_capacity,
            "Initializing message broker"
        );

        for topic in &config.topics {
            if let Err(e) = ensure_topic_exists(transport.as_ref(), topic.as_str()).await {
                tracing::error!(topic = %topic, error = %e, "Failed to ensure topic exists");
            }
        }

        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let rx: Receiver = Arc::new(tokio::sync::Mutex::new(rx));
        let workers = (0..config.worker_count.max(1))
            .map(|id| tokio::spawn(worker(id, rx.clone(), transport.clone())))
            .collect();

        Self {
            transport,
            config,
            queue: Mutex::new(Some(tx)),
            workers: tokio::sync::Mutex::new(workers),
        }
    }

    /// Enqueues a message for the worker pool. Waits only while the queue is
    /// full; delivery outcome is logged by the worker, not reported here.
    pub async fn publish(&self, topic: Topic, key: &str, value: &str) -> AppResult<()> {
        let sender = self
            .queue
            .lock()
            .map_err(|_| AppError::Internal("lock poisoned".into()))?
            .clone()
            .ok_or_else(|| AppError::TransientStore("broker is shutting down".into()))?;

        sender
            .send(BrokerMessage {
                topic: topic.as_str().to_string(),
                key: key.to_string(),
                value: value.to_string(),
            })
            .await
            .map_err(|_| AppError::TransientStore("broker is shutting down".into()))
    }

    /// Starts one consumer per topic. Each consumer fetches, dispatches to the
    /// registry and commits only after the handler returns or panics.
    pub async fn start_consuming(
        &self,
        topics: &[Topic],
        registry: Arc<HandlerRegistry>,
    ) -> ConsumerGroup {
        let (shutdown, shutdown_rx) = watch::channel(false);
        let mut tasks = Vec::with_capacity(topics.len());

        for &topic in topics {
            if let Err(e) = self
                .transport
                .subscribe(&self.config.group_id, topic.as_str())
                .await
            {
                tracing::error!(topic = %topic, error = %e, "Failed to subscribe");
            }
            tasks.push(tokio::spawn(consume(
                topic,
                self.config.clone(),
                self.transport.clone(),
                registry.clone(),
                shutdown_rx.clone(),
            )));
        }

        ConsumerGroup { shutdown, tasks }
    }

    /// Stops accepting publishes, waits until every queued message has been
    /// handed to the transport, then returns.
    pub async fn close(&self) {
        if let Ok(mut queue) = self.queue.lock() {
            queue.take();
        }

        let workers: Vec<JoinHandle<()>> = self.workers.lock().await.drain(..).collect();
        for handle in workers {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Producer worker panicked");
            }
        }
        tracing::info!("Message broker shut down successfully");
    }
}

impl ConsumerGroup {
    /// Signals every consumer to stop after its current message and waits.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        for task in self.tasks {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "Consumer task panicked");
            }
        }
    }
}

/// Creates `topic` if absent. A concurrent creator winning the race counts
/// as success.
pub async fn ensure_topic_exists(transport: &dyn BrokerTransport, topic: &str) -> AppResult<()> {
    if transport.topic_exists(topic).await? {
        return Ok(());
    }
    match transport.create_topic(topic, 1, 1).await? {
        TopicCreation::Created => tracing::info!(topic, "Created topic"),
        TopicCreation::AlreadyExists => tracing::debug!(topic, "Topic created concurrently"),
    }
    Ok(())
}

async fn worker(id: usize, rx: Receiver, transport: Arc<dyn BrokerTransport>) {
    loop {
        let next = rx.lock().await.recv().await;
        let Some(message) = next else { break };

        match transport.produce(&message).await {
            Ok(()) => tracing::info!(worker = id, topic = %message.topic, "Published message"),
            Err(e) => tracing::error!(
                worker = id,
                topic = %message.topic,
                error = %e,
                "Failed to publish message"
            ),
        }
    }
}

async fn consume(
    topic: Topic,
    config: BrokerConfig,
    transport: Arc<dyn BrokerTransport>,
    registry: Arc<HandlerRegistry>,
    shutdown: watch::Receiver<bool>,
) {
    tracing::info!(topic = %topic, "Starting consumer");
    let handler = registry.handler(topic);

    while !*shutdown.borrow() {
        let delivery = match transport
            .fetch(&config.group_id, topic.as_str(), config.max_wait)
            .await
        {
            Ok(Some(delivery)) => delivery,
            Ok(None) => continue,
            Err(e) => {
                tracing::error!(topic = %topic, error = %e, "Error fetching message");
                tokio::time::sleep(config.max_wait).await;
                continue;
            }
        };

        // Run on its own task so a panicking handler cannot take the
        // consumer loop down with it.
        let task = {
            let handler = handler.clone();
            let delivery = delivery.clone();
            tokio::spawn(async move { handler.handle(&delivery).await })
        };
        match task.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!(
                topic = %topic,
                offset = delivery.offset,
                key = %delivery.key,
                error = %e,
                "Handler failed"
            ),
            Err(e) => tracing::error!(
                topic = %topic,
                offset = delivery.offset,
                key = %delivery.key,
                error = %e,
                "Handler panicked"
            ),
        }

        if let Err(e) = transport.commit(&config.group_id, &delivery).await {
            tracing::error!(topic = %topic, offset = delivery.offset, error = %e, "Error committing message");
        }
    }
    tracing::info!(topic = %topic, "Consumer stopped");
}
