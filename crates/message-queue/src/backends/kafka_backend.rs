use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use queue_message::QueueMessage;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::Message as _;
use rdkafka::producer::{FutureProducer, FutureRecord};
use tokio_stream::wrappers::ReceiverStream;

use crate::{Error, MessageQueue, PublishCallback, QueueConfig};

const CHANNEL_CAPACITY: usize = 256;

/// Kafka back-end. Each topic is a Kafka topic; `get_messages` starts one
/// consumer group per call, named after this client's `group_id` so that
/// multiple control-plane instances sharing a group id load-balance instead
/// of each receiving every message (spec: "one consumer group per logical
/// consumer id").
pub struct KafkaMessageQueue {
    bootstrap_servers: String,
    group_id: String,
    producer: FutureProducer,
}

impl KafkaMessageQueue {
    pub fn new(bootstrap_servers: impl Into<String>, group_id: impl Into<String>) -> anyhow::Result<Self> {
        let bootstrap_servers = bootstrap_servers.into();
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &bootstrap_servers)
            .create()?;
        Ok(Self {
            bootstrap_servers,
            group_id: group_id.into(),
            producer,
        })
    }
}

#[async_trait]
impl MessageQueue for KafkaMessageQueue {
    async fn publish(
        &self,
        message: QueueMessage,
        topic: &str,
        _create_topic: bool,
        callback: Option<PublishCallback>,
    ) -> Result<(), Error> {
        let payload = serde_json::to_string(&message).map_err(|e| Error::Transport(e.into()))?;
        let record = FutureRecord::to(topic).key(&message.id).payload(&payload);

        self.producer
            .send(record, Duration::from_secs(5))
            .await
            .map_err(|(err, _)| Error::Transport(err.into()))?;

        if let Some(callback) = callback {
            if let Err(err) = callback(&message) {
                tracing::warn!(?err, "publish callback failed");
            }
        }
        Ok(())
    }

    fn get_messages(&self, topic: &str) -> BoxStream<'static, QueueMessage> {
        let topic = topic.to_string();
        let (tx, rx) = tokio::sync::mpsc::channel(CHANNEL_CAPACITY);

        let consumer: anyhow::Result<StreamConsumer> = ClientConfig::new()
            .set("bootstrap.servers", &self.bootstrap_servers)
            .set("group.id", &self.group_id)
            .set("enable.auto.commit", "true")
            .set("auto.offset.reset", "earliest")
            .create()
            .map_err(anyhow::Error::from);

        tokio::spawn(async move {
            let consumer = match consumer {
                Ok(c) => c,
                Err(err) => {
                    tracing::error!(?err, "failed to create kafka consumer");
                    return;
                }
            };
            if let Err(err) = consumer.subscribe(&[&topic]) {
                tracing::error!(?err, %topic, "failed to subscribe to kafka topic");
                return;
            }

            loop {
                match consumer.recv().await {
                    Ok(borrowed) => {
                        let Some(payload) = borrowed.payload() else {
                            continue;
                        };
                        let message: QueueMessage = match serde_json::from_slice(payload) {
                            Ok(m) => m,
                            Err(err) => {
                                tracing::warn!(?err, "failed to parse QueueMessage from kafka");
                                continue;
                            }
                        };
                        if tx.send(message).await.is_err() {
                            return;
                        }
                    }
                    Err(err) => {
                        tracing::error!(?err, "kafka consumer recv error, retrying");
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        });

        ReceiverStream::new(rx).boxed()
    }

    async fn cleanup(&self) -> Result<(), Error> {
        Ok(())
    }

    fn as_config(&self) -> QueueConfig {
        QueueConfig::Kafka {
            bootstrap_servers: self.bootstrap_servers.clone(),
            group_id: self.group_id.clone(),
        }
    }
}
