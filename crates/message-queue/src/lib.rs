//! A polymorphic pub/sub abstraction over pluggable message-bus back-ends.
//!
//! Every back-end implements [`MessageQueue`]: `publish`, `get_messages`,
//! `register_consumer`, `deregister_consumer`, `cleanup` and `as_config`.
//! Back-ends differ in whether `register_consumer` is meaningful — push-style
//! brokers (the in-process back-end) need it, pull-style ones do not — so the
//! trait models that with a no-op default rather than a separate interface.

mod config;
mod error;

pub mod backends;

pub use config::QueueConfig;
pub use error::Error;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;
use queue_message::QueueMessage;

/// Invoked after a successful publish. Any error it returns is logged and
/// never propagated to the publisher (spec §4.2).
pub type PublishCallback = Arc<dyn Fn(&QueueMessage) -> anyhow::Result<()> + Send + Sync>;

/// The opaque handle returned by `register_consumer`; invoking it begins the
/// consume loop. Most pull-style back-ends never construct one that does
/// anything beyond resolve immediately.
pub type StartConsuming = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Implemented by components that want push-style delivery from a back-end
/// that supports `register_consumer` (currently only the in-process one).
#[async_trait]
pub trait MessageQueueConsumer: Send + Sync {
    /// A stable identifier for this consumer, used e.g. as a Kafka
    /// consumer-group id by back-ends that care.
    fn id(&self) -> &str;

    async fn process(&self, message: QueueMessage) -> anyhow::Result<()>;
}

/// The broker-neutral publish/consume contract described in spec §4.2.
#[async_trait]
pub trait MessageQueue: Send + Sync {
    /// Deliver `message` to all current consumers of `topic`. May create the
    /// topic on first use when `create_topic` is set. `callback`, if given,
    /// is invoked after a successful publish; its errors are logged, never
    /// raised to the caller.
    async fn publish(
        &self,
        message: QueueMessage,
        topic: &str,
        create_topic: bool,
        callback: Option<PublishCallback>,
    ) -> Result<(), Error>;

    /// A restartable, infinite stream of messages arriving on `topic`.
    /// Delivery is at-least-once; callers must be idempotent or rely on a
    /// back-end's exclusive (dedup) mode.
    fn get_messages(&self, topic: &str) -> BoxStream<'static, QueueMessage>;

    /// Attach a consumer to a topic. Returns a start handle whose resolution
    /// begins the consume loop. Back-ends that have no notion of explicit
    /// subscription (Kafka, RabbitMQ, SQS/SNS, Redis) return a handle that
    /// resolves immediately; subscription already happened in `get_messages`.
    async fn register_consumer(
        &self,
        consumer: Arc<dyn MessageQueueConsumer>,
        topic: &str,
    ) -> Result<StartConsuming, Error> {
        let _ = (consumer, topic);
        Ok(Box::pin(async {}))
    }

    /// Detach a previously registered consumer. No-op by default.
    async fn deregister_consumer(&self, consumer: Arc<dyn MessageQueueConsumer>) -> Result<(), Error> {
        let _ = consumer;
        Ok(())
    }

    /// Idempotent release of broker resources (connections, ephemeral
    /// queues/streams). Safe to call more than once.
    async fn cleanup(&self) -> Result<(), Error>;

    /// The configuration needed to reconstruct an equivalent client,
    /// returned to workflow services via `GET /queue_config`.
    fn as_config(&self) -> QueueConfig;
}
