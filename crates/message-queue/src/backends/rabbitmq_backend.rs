use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicPublishOptions, ExchangeDeclareOptions,
    QueueBindOptions, QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Connection, ConnectionProperties, ExchangeKind};
use queue_message::QueueMessage;
use tokio_stream::wrappers::ReceiverStream;

use crate::{Error, MessageQueue, PublishCallback, QueueConfig};

const CHANNEL_CAPACITY: usize = 256;

/// RabbitMQ back-end: a topic exchange per namespace, with one exclusive
/// queue per consumer bound to the requested topic as routing key.
pub struct RabbitMqMessageQueue {
    connection: Connection,
    url: String,
    exchange: String,
}

impl RabbitMqMessageQueue {
    pub async fn connect(url: impl Into<String>, exchange: impl Into<String>) -> anyhow::Result<Self> {
        let url = url.into();
        let connection = Connection::connect(&url, ConnectionProperties::default()).await?;
        let exchange = exchange.into();

        let channel = connection.create_channel().await?;
        channel
            .exchange_declare(
                &exchange,
                ExchangeKind::Topic,
                ExchangeDeclareOptions::default(),
                FieldTable::default(),
            )
            .await?;

        Ok(Self {
            connection,
            url,
            exchange,
        })
    }
}

#[async_trait]
impl MessageQueue for RabbitMqMessageQueue {
    async fn publish(
        &self,
        message: QueueMessage,
        topic: &str,
        _create_topic: bool,
        callback: Option<PublishCallback>,
    ) -> Result<(), Error> {
        let channel = self
            .connection
            .create_channel()
            .await
            .map_err(|e| Error::Transport(e.into()))?;
        let payload = serde_json::to_vec(&message).map_err(|e| Error::Transport(e.into()))?;

        channel
            .basic_publish(
                &self.exchange,
                topic,
                BasicPublishOptions::default(),
                &payload,
                BasicProperties::default().with_message_id(message.id.clone().into()),
            )
            .await
            .map_err(|e| Error::Transport(e.into()))?
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
        let connection = self.connection.clone();
        let exchange = self.exchange.clone();
        let topic = topic.to_string();
        let (tx, rx) = tokio::sync::mpsc::channel(CHANNEL_CAPACITY);

        tokio::spawn(async move {
            let setup = async {
                let channel = connection.create_channel().await?;
                let queue = channel
                    .queue_declare(
                        "",
                        QueueDeclareOptions {
                            exclusive: true,
                            auto_delete: true,
                            ..QueueDeclareOptions::default()
                        },
                        FieldTable::default(),
                    )
                    .await?;
                channel
                    .queue_bind(
                        queue.name().as_str(),
                        &exchange,
                        &topic,
                        QueueBindOptions::default(),
                        FieldTable::default(),
                    )
                    .await?;
                let consumer = channel
                    .basic_consume(
                        queue.name().as_str(),
                        "control-plane",
                        BasicConsumeOptions::default(),
                        FieldTable::default(),
                    )
                    .await?;
                Ok::<_, lapin::Error>(consumer)
            };

            let mut consumer = match setup.await {
                Ok(c) => c,
                Err(err) => {
                    tracing::error!(?err, "failed to declare rabbitmq consumer queue");
                    return;
                }
            };

            while let Some(delivery) = consumer.next().await {
                let delivery = match delivery {
                    Ok(d) => d,
                    Err(err) => {
                        tracing::error!(?err, "rabbitmq delivery error");
                        continue;
                    }
                };
                let message: QueueMessage = match serde_json::from_slice(&delivery.data) {
                    Ok(m) => m,
                    Err(err) => {
                        tracing::warn!(?err, "failed to parse QueueMessage from rabbitmq");
                        let _ = delivery.ack(BasicAckOptions::default()).await;
                        continue;
                    }
                };
                let _ = delivery.ack(BasicAckOptions::default()).await;
                if tx.send(message).await.is_err() {
                    return;
                }
            }
        });

        ReceiverStream::new(rx).boxed()
    }

    async fn cleanup(&self) -> Result<(), Error> {
        self.connection
            .close(200, "cleanup")
            .await
            .map_err(|e| Error::Transport(e.into()))
    }

    fn as_config(&self) -> QueueConfig {
        QueueConfig::RabbitMq {
            url: self.url.clone(),
            exchange: self.exchange.clone(),
        }
    }
}
