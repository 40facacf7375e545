use async_trait::async_trait;
use aws_sdk_sns::Client as SnsClient;
use aws_sdk_sqs::Client as SqsClient;
use futures::stream::{BoxStream, StreamExt};
use queue_message::QueueMessage;
use tokio_stream::wrappers::ReceiverStream;

use crate::{Error, MessageQueue, PublishCallback, QueueConfig};

const CHANNEL_CAPACITY: usize = 256;
const LONG_POLL_SECONDS: i32 = 20;

/// SQS/SNS back-end: publish fans out through an SNS topic, each consumer
/// drains its own SQS queue (provisioning the per-subscriber queue and its
/// SNS subscription is the deployment manager's job, not this client's;
/// this back-end assumes the queue named `<queue_url_prefix><topic>`
/// already exists and is subscribed to `<topic_arn_prefix><topic>`).
pub struct SqsMessageQueue {
    sns: SnsClient,
    sqs: SqsClient,
    region: String,
    topic_arn_prefix: String,
    queue_url_prefix: String,
}

impl SqsMessageQueue {
    pub async fn connect(
        region: impl Into<String>,
        topic_arn_prefix: impl Into<String>,
        queue_url_prefix: impl Into<String>,
    ) -> Self {
        let region = region.into();
        let shared_config = aws_config::from_env()
            .region(aws_config::Region::new(region.clone()))
            .load()
            .await;
        Self {
            sns: SnsClient::new(&shared_config),
            sqs: SqsClient::new(&shared_config),
            region,
            topic_arn_prefix: topic_arn_prefix.into(),
            queue_url_prefix: queue_url_prefix.into(),
        }
    }
}

#[async_trait]
impl MessageQueue for SqsMessageQueue {
    async fn publish(
        &self,
        message: QueueMessage,
        topic: &str,
        _create_topic: bool,
        callback: Option<PublishCallback>,
    ) -> Result<(), Error> {
        let payload = serde_json::to_string(&message).map_err(|e| Error::Transport(e.into()))?;
        let topic_arn = format!("{}{topic}", self.topic_arn_prefix);

        self.sns
            .publish()
            .topic_arn(topic_arn)
            .message(payload)
            .send()
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
        let sqs = self.sqs.clone();
        let queue_url = format!("{}{topic}", self.queue_url_prefix);
        let (tx, rx) = tokio::sync::mpsc::channel(CHANNEL_CAPACITY);

        tokio::spawn(async move {
            loop {
                let received = sqs
                    .receive_message()
                    .queue_url(&queue_url)
                    .wait_time_seconds(LONG_POLL_SECONDS)
                    .max_number_of_messages(10)
                    .send()
                    .await;

                let response = match received {
                    Ok(r) => r,
                    Err(err) => {
                        tracing::error!(?err, %queue_url, "sqs receive_message failed, retrying");
                        tokio::time::sleep(std::time::Duration::from_secs(1)).await;
                        continue;
                    }
                };

                for sqs_message in response.messages.unwrap_or_default() {
                    let Some(body) = sqs_message.body.as_deref() else {
                        continue;
                    };
                    let message: QueueMessage = match serde_json::from_str(body) {
                        Ok(m) => m,
                        Err(err) => {
                            tracing::warn!(?err, "failed to parse QueueMessage from sqs body");
                            continue;
                        }
                    };

                    if tx.send(message).await.is_err() {
                        return;
                    }

                    // Delete after yielding, not before: a crash in this
                    // window redelivers the message once its visibility
                    // timeout elapses, which is the intended at-least-once
                    // semantics (spec §4.2).
                    if let Some(receipt_handle) = sqs_message.receipt_handle {
                        let _ = sqs
                            .delete_message()
                            .queue_url(&queue_url)
                            .receipt_handle(receipt_handle)
                            .send()
                            .await;
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
        QueueConfig::Sqs {
            region: self.region.clone(),
            topic_arn_prefix: self.topic_arn_prefix.clone(),
            queue_url_prefix: self.queue_url_prefix.clone(),
        }
    }
}
