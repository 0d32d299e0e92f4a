use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};
use zeromq::prelude::*;
use zeromq::{PubSocket, SubSocket, ZmqMessage};

use crate::error::FunkwerkError;
use crate::message::Message;
use crate::traits::{EventPublisher, EventSubscriber};
use crate::transport::Transport;

/// ZeroMQ PUB socket publisher that connects to the broker's frontend.
///
/// Messages are sent as two-frame ZMQ messages:
/// 1. Topic string (used by SUB sockets for prefix filtering)
/// 2. JSON-encoded [`Message`] envelope
///
/// The publisher connects to the broker's frontend (SUB socket),
/// which subscribes to all topics and forwards them to the backend (PUB socket).
pub struct ZmqPublisher {
    socket: Mutex<PubSocket>,
}

impl ZmqPublisher {
    /// Create a new publisher that connects to the broker's frontend endpoint.
    #[instrument(skip_all, fields(endpoint = %transport))]
    pub async fn connect(transport: &Transport) -> Result<Self, FunkwerkError> {
        let mut socket = PubSocket::new();
        let endpoint = transport.endpoint();
        info!(endpoint = %endpoint, "connecting PUB socket to broker frontend");
        socket.connect(&endpoint).await?;
        Ok(Self {
            socket: Mutex::new(socket),
        })
    }

    /// Create a new publisher that binds to the given endpoint.
    ///
    /// Use this for direct PUB/SUB without a broker (publisher binds,
    /// subscribers connect).
    #[instrument(skip_all, fields(endpoint = %transport))]
    pub async fn bind(transport: &Transport) -> Result<Self, FunkwerkError> {
        transport
            .ensure_ipc_dir()
            .map_err(|e| FunkwerkError::Transport(e.to_string()))?;
        transport
            .remove_stale_socket()
            .map_err(|e| FunkwerkError::Transport(e.to_string()))?;
        let mut socket = PubSocket::new();
        let endpoint = transport.endpoint();
        info!(endpoint = %endpoint, "binding PUB socket");
        socket.bind(&endpoint).await?;
        Ok(Self {
            socket: Mutex::new(socket),
        })
    }
}

#[async_trait]
impl EventPublisher for ZmqPublisher {
    /// Publish a message as a two-frame ZMQ message: [topic, envelope].
    ///
    /// The topic frame enables subscriber-side prefix filtering.
    /// The envelope frame contains the full JSON-serialized [`Message`].
    async fn publish(&self, message: Message) -> Result<(), FunkwerkError> {
        let topic = message.topic.clone();
        let envelope_bytes = message.to_bytes()?;

        let mut zmq_msg = ZmqMessage::from(topic.as_str());
        zmq_msg.push_back(envelope_bytes.into());

        let mut socket = self.socket.lock().await;
        socket.send(zmq_msg).await?;

        debug!(topic = %topic, "published message");
        Ok(())
    }
}

/// ZeroMQ SUB socket subscriber that connects to the broker's backend.
///
/// Receives two-frame ZMQ messages: [topic, envelope]. The subscriber
/// connects to the broker's backend (PUB socket), which forwards messages
/// received from publishers on the frontend.
pub struct ZmqSubscriber {
    socket: Mutex<SubSocket>,
}

impl ZmqSubscriber {
    /// Create a new subscriber that connects to the broker's backend endpoint.
    #[instrument(skip_all, fields(endpoint = %transport))]
    pub async fn connect(transport: &Transport) -> Result<Self, FunkwerkError> {
        let mut socket = SubSocket::new();
        let endpoint = transport.endpoint();
        info!(endpoint = %endpoint, "connecting SUB socket to broker backend");
        socket.connect(&endpoint).await?;
        Ok(Self {
            socket: Mutex::new(socket),
        })
    }
}

#[async_trait]
impl EventSubscriber for ZmqSubscriber {
    /// Subscribe to messages with topics matching the given prefix.
    ///
    /// An empty string subscribes to all topics.
    /// Multiple subscriptions can be active simultaneously.
    async fn subscribe(&self, topic_prefix: &str) -> Result<(), FunkwerkError> {
        let mut socket = self.socket.lock().await;
        socket.subscribe(topic_prefix).await?;
        info!(topic_prefix = %topic_prefix, "subscribed to topic prefix");
        Ok(())
    }

    /// Receive the next message matching a subscription.
    ///
    /// Expects a two-frame ZMQ message: [topic, envelope].
    /// The envelope (second frame) is deserialized into a [`Message`].
    async fn recv(&self) -> Result<Message, FunkwerkError> {
        let mut socket = self.socket.lock().await;
        let zmq_msg = socket.recv().await?;

        // The message may arrive as a single frame (topic+data combined)
        // or two frames [topic, envelope]; handle both.
        let frames: Vec<_> = zmq_msg.iter().collect();

        if frames.len() >= 2 {
            let envelope_bytes = frames[1].as_ref();
            let message = Message::from_bytes(envelope_bytes)?;
            debug!(topic = %message.topic, "received message");
            Ok(message)
        } else if !frames.is_empty() {
            // Single-frame fallback: the entire frame is the envelope.
            let envelope_bytes = frames[0].as_ref();
            let message = Message::from_bytes(envelope_bytes)?;
            debug!(topic = %message.topic, "received single-frame message");
            Ok(message)
        } else {
            Err(FunkwerkError::Transport("empty ZMQ message".into()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zmq_message_two_frame_construction() {
        let topic = "vigil.test.topic";
        let payload_bytes = b"test-payload";

        let mut msg = ZmqMessage::from(topic);
        msg.push_back(payload_bytes.to_vec().into());

        let frames: Vec<_> = msg.iter().collect();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].as_ref(), topic.as_bytes());
        assert_eq!(frames[1].as_ref(), payload_bytes);
    }
}
