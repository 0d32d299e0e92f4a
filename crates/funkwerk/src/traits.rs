use std::sync::Arc;

use async_trait::async_trait;

use crate::error::FunkwerkError;
use crate::message::Message;

/// Publishes messages to all subscribers via the fanout broadcast.
///
/// Every connected subscriber whose topic filter matches receives every
/// published message — this is the broadcast side of directory replication.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish a message. Subscribers filter by the message's topic.
    async fn publish(&self, message: Message) -> Result<(), FunkwerkError>;
}

/// Blanket implementation so `Arc<dyn EventPublisher>` can be used directly.
#[async_trait]
impl<T: EventPublisher + ?Sized> EventPublisher for Arc<T> {
    async fn publish(&self, message: Message) -> Result<(), FunkwerkError> {
        (**self).publish(message).await
    }
}

/// Subscribes to broadcast messages matching topic prefixes.
#[async_trait]
pub trait EventSubscriber: Send + Sync {
    /// Subscribe to messages with topics matching the given prefix.
    async fn subscribe(&self, topic_prefix: &str) -> Result<(), FunkwerkError>;

    /// Receive the next message. Blocks until a message is available.
    async fn recv(&self) -> Result<Message, FunkwerkError>;
}

/// Sends messages into a named point-to-point queue.
///
/// When several receivers consume the same queue, delivery is load-balanced
/// across them; each message reaches exactly one receiver.
#[async_trait]
pub trait QueueSender: Send + Sync {
    /// Enqueue a message.
    async fn send(&self, message: Message) -> Result<(), FunkwerkError>;
}

/// Blanket implementation so `Arc<dyn QueueSender>` can be used directly.
#[async_trait]
impl<T: QueueSender + ?Sized> QueueSender for Arc<T> {
    async fn send(&self, message: Message) -> Result<(), FunkwerkError> {
        (**self).send(message).await
    }
}

/// Receives messages from a named point-to-point queue.
#[async_trait]
pub trait QueueReceiver: Send + Sync {
    /// Dequeue the next message. Blocks until one is available.
    async fn recv(&self) -> Result<Message, FunkwerkError>;
}
