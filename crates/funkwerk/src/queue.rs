//! Point-to-point queues over ZeroMQ PUSH/PULL sockets.
//!
//! Each named queue in the bus topology maps to one PUSH/PULL endpoint.
//! A queue has any number of senders and receivers; each message is
//! delivered to exactly one receiver (round-robin load balancing).

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};
use zeromq::{PullSocket, PushSocket, Socket, SocketRecv, SocketSend};

use crate::error::FunkwerkError;
use crate::message::Message;
use crate::traits::{QueueReceiver, QueueSender};
use crate::transport::Transport;

/// Default ZeroMQ high-water mark (max queued messages before backpressure).
const DEFAULT_HIGH_WATER_MARK: usize = 1000;

/// Configuration for queue transport behavior.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Maximum number of messages buffered before applying backpressure.
    /// When the buffer is full, `send()` blocks until space is available —
    /// a slow consumer lags without the publisher failing.
    pub high_water_mark: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            high_water_mark: DEFAULT_HIGH_WATER_MARK,
        }
    }
}

/// PUSH socket sender feeding a named queue.
///
/// Senders connect (not bind) because producers are typically ephemeral
/// peers of a stable consuming service.
pub struct ZmqQueueSender {
    socket: Mutex<PushSocket>,
}

impl ZmqQueueSender {
    /// Create a sender that connects to the queue's endpoint.
    #[instrument(skip_all, fields(endpoint = %transport))]
    pub async fn connect(
        transport: &Transport,
        config: QueueConfig,
    ) -> Result<Self, FunkwerkError> {
        let mut socket = PushSocket::new();
        let endpoint = transport.endpoint();
        info!(endpoint = %endpoint, hwm = config.high_water_mark, "connecting PUSH socket");
        socket.connect(&endpoint).await?;
        Ok(Self {
            socket: Mutex::new(socket),
        })
    }

    /// Create a sender that binds the queue's endpoint.
    ///
    /// Use bind when this sender is the stable end (a single producer that
    /// multiple consuming workers connect to).
    #[instrument(skip_all, fields(endpoint = %transport))]
    pub async fn bind(
        transport: &Transport,
        config: QueueConfig,
    ) -> Result<Self, FunkwerkError> {
        transport
            .ensure_ipc_dir()
            .map_err(|e| FunkwerkError::Transport(e.to_string()))?;
        transport
            .remove_stale_socket()
            .map_err(|e| FunkwerkError::Transport(e.to_string()))?;
        let mut socket = PushSocket::new();
        let endpoint = transport.endpoint();
        info!(endpoint = %endpoint, hwm = config.high_water_mark, "binding PUSH socket");
        socket.bind(&endpoint).await?;
        Ok(Self {
            socket: Mutex::new(socket),
        })
    }
}

#[async_trait]
impl QueueSender for ZmqQueueSender {
    async fn send(&self, message: Message) -> Result<(), FunkwerkError> {
        let bytes = message.to_bytes()?;
        let mut socket = self.socket.lock().await;
        socket.send(bytes.into()).await?;
        debug!(topic = %message.topic, "enqueued message");
        Ok(())
    }
}

/// PULL socket receiver draining a named queue.
///
/// Receivers bind (stable workers that producers connect to). When several
/// receivers bind the same logical queue behind one PUSH sender, delivery
/// is load-balanced round-robin.
pub struct ZmqQueueReceiver {
    socket: Mutex<PullSocket>,
}

impl ZmqQueueReceiver {
    /// Create a receiver that binds the queue's endpoint.
    #[instrument(skip_all, fields(endpoint = %transport))]
    pub async fn bind(transport: &Transport) -> Result<Self, FunkwerkError> {
        transport
            .ensure_ipc_dir()
            .map_err(|e| FunkwerkError::Transport(e.to_string()))?;
        transport
            .remove_stale_socket()
            .map_err(|e| FunkwerkError::Transport(e.to_string()))?;
        let mut socket = PullSocket::new();
        let endpoint = transport.endpoint();
        info!(endpoint = %endpoint, "binding PULL socket");
        socket.bind(&endpoint).await?;
        Ok(Self {
            socket: Mutex::new(socket),
        })
    }

    /// Create a receiver that connects to the queue's endpoint.
    ///
    /// Use connect when the sender is the stable end and this receiver is
    /// one of several ephemeral workers.
    #[instrument(skip_all, fields(endpoint = %transport))]
    pub async fn connect(transport: &Transport) -> Result<Self, FunkwerkError> {
        let mut socket = PullSocket::new();
        let endpoint = transport.endpoint();
        info!(endpoint = %endpoint, "connecting PULL socket");
        socket.connect(&endpoint).await?;
        Ok(Self {
            socket: Mutex::new(socket),
        })
    }
}

#[async_trait]
impl QueueReceiver for ZmqQueueReceiver {
    async fn recv(&self) -> Result<Message, FunkwerkError> {
        let mut socket = self.socket.lock().await;
        let raw = socket.recv().await?;
        let bytes = raw
            .get(0)
            .ok_or_else(|| FunkwerkError::Transport("empty ZMQ frame".into()))?;
        let message = Message::from_bytes(bytes.as_ref())?;
        Ok(message)
    }
}
