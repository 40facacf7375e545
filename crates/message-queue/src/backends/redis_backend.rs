use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use queue_message::QueueMessage;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tokio_stream::wrappers::ReceiverStream;

use crate::{Error, MessageQueue, PublishCallback, QueueConfig};

const DEDUP_TTL_SECONDS: i64 = 300;
const CHANNEL_CAPACITY: usize = 256;

/// Redis Pub/Sub back-end. When `exclusive_mode` is enabled, each received
/// message's id is recorded in a per-topic `SADD`-backed set with a 300s TTL
/// (refreshed `NX`); an `SADD` returning 0 means the message was already
/// seen and is dropped before being yielded (spec §4.2.1).
pub struct RedisMessageQueue {
    client: redis::Client,
    url: String,
    exclusive_mode: bool,
}

impl RedisMessageQueue {
    pub async fn connect(url: impl Into<String>, exclusive_mode: bool) -> anyhow::Result<Self> {
        let url = url.into();
        let client = redis::Client::open(url.clone())?;
        Ok(Self {
            client,
            url,
            exclusive_mode,
        })
    }

    async fn manager(&self) -> anyhow::Result<ConnectionManager> {
        Ok(self.client.get_connection_manager().await?)
    }
}

#[async_trait]
impl MessageQueue for RedisMessageQueue {
    async fn publish(
        &self,
        message: QueueMessage,
        topic: &str,
        _create_topic: bool,
        callback: Option<PublishCallback>,
    ) -> Result<(), Error> {
        let mut conn = self.manager().await.map_err(Error::Transport)?;
        let payload = serde_json::to_string(&message).map_err(|e| Error::Transport(e.into()))?;
        let _: () = conn
            .publish(topic, payload)
            .await
            .map_err(|e| Error::Transport(e.into()))?;

        if let Some(callback) = callback {
            if let Err(err) = callback(&message) {
                tracing::warn!(?err, "publish callback failed");
            }
        }
        Ok(())
    }

    fn get_messages(&self, topic: &str) -> BoxStream<'static, QueueMessage> {
        let client = self.client.clone();
        let topic = topic.to_string();
        let exclusive_mode = self.exclusive_mode;
        let (tx, rx) = tokio::sync::mpsc::channel(CHANNEL_CAPACITY);

        tokio::spawn(async move {
            let dedup_key = format!("{topic}.processed_messages");
            loop {
                let mut pubsub = match client.get_async_pubsub().await {
                    Ok(pubsub) => pubsub,
                    Err(err) => {
                        tracing::error!(?err, "redis pubsub connect failed, retrying");
                        tokio::time::sleep(Duration::from_secs(1)).await;
                        continue;
                    }
                };
                if let Err(err) = pubsub.subscribe(&topic).await {
                    tracing::error!(?err, %topic, "redis subscribe failed, retrying");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    continue;
                }

                let mut dedup_conn = client.get_connection_manager().await.ok();
                let mut stream = pubsub.on_message();

                while let Some(msg) = stream.next().await {
                    let payload: String = match msg.get_payload() {
                        Ok(p) => p,
                        Err(err) => {
                            tracing::warn!(?err, "failed to decode redis payload");
                            continue;
                        }
                    };
                    let message: QueueMessage = match serde_json::from_str(&payload) {
                        Ok(m) => m,
                        Err(err) => {
                            tracing::warn!(?err, "failed to parse QueueMessage from redis");
                            continue;
                        }
                    };

                    if exclusive_mode {
                        if let Some(conn) = dedup_conn.as_mut() {
                            let added: i64 = conn.sadd(&dedup_key, &message.id).await.unwrap_or(1);
                            let _: Result<bool, _> = conn.expire_nx(&dedup_key, DEDUP_TTL_SECONDS).await;
                            if added == 0 {
                                continue;
                            }
                        }
                    }

                    if tx.send(message).await.is_err() {
                        return;
                    }
                }
                // The subscription dropped (connection reset); reconnect.
            }
        });

        ReceiverStream::new(rx).boxed()
    }

    async fn cleanup(&self) -> Result<(), Error> {
        // ConnectionManager connections close on drop; nothing to do here
        // beyond making the call idempotent for callers.
        Ok(())
    }

    fn as_config(&self) -> QueueConfig {
        QueueConfig::Redis {
            url: self.url.clone(),
            exclusive_mode: self.exclusive_mode,
        }
    }
}
