#[cfg(feature = "inprocess")]
mod inprocess;
#[cfg(feature = "inprocess")]
pub use inprocess::InProcessMessageQueue;

#[cfg(feature = "redis")]
mod redis_backend;
#[cfg(feature = "redis")]
pub use redis_backend::RedisMessageQueue;

#[cfg(feature = "kafka")]
mod kafka_backend;
#[cfg(feature = "kafka")]
pub use kafka_backend::KafkaMessageQueue;

#[cfg(feature = "rabbitmq")]
mod rabbitmq_backend;
#[cfg(feature = "rabbitmq")]
pub use rabbitmq_backend::RabbitMqMessageQueue;

#[cfg(feature = "sqs")]
mod sqs_backend;
#[cfg(feature = "sqs")]
pub use sqs_backend::SqsMessageQueue;
