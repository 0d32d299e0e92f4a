//! In-memory bus substitute.
//!
//! Implements the same publisher/subscriber/queue seams as the ZeroMQ
//! transports on top of tokio channels, so directory and evaluator logic
//! can be exercised in tests without a broker process.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc};
use tracing::warn;

use crate::error::FunkwerkError;
use crate::message::Message;
use crate::traits::{EventPublisher, EventSubscriber, QueueReceiver, QueueSender};

const FANOUT_CAPACITY: usize = 1024;
const QUEUE_CAPACITY: usize = 1024;

struct MemoryQueue {
    tx: mpsc::Sender<Message>,
    rx: tokio::sync::Mutex<mpsc::Receiver<Message>>,
}

/// One in-process bus: a fanout broadcast plus named point-to-point queues.
pub struct InMemoryBus {
    fanout: broadcast::Sender<Message>,
    queues: Mutex<HashMap<String, Arc<MemoryQueue>>>,
}

impl InMemoryBus {
    pub fn new() -> Self {
        let (fanout, _) = broadcast::channel(FANOUT_CAPACITY);
        Self {
            fanout,
            queues: Mutex::new(HashMap::new()),
        }
    }

    /// Publisher handle for the fanout broadcast.
    pub fn publisher(&self) -> MemoryPublisher {
        MemoryPublisher {
            fanout: self.fanout.clone(),
        }
    }

    /// Subscriber handle for the fanout broadcast.
    ///
    /// Each subscriber receives every message published after it was
    /// created, filtered by its subscribed topic prefixes.
    pub fn subscriber(&self) -> MemorySubscriber {
        MemorySubscriber {
            rx: tokio::sync::Mutex::new(self.fanout.subscribe()),
            filters: Mutex::new(Vec::new()),
        }
    }

    fn queue(&self, name: &str) -> Arc<MemoryQueue> {
        let mut queues = self.queues.lock().expect("queue map poisoned");
        queues
            .entry(name.to_string())
            .or_insert_with(|| {
                let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
                Arc::new(MemoryQueue {
                    tx,
                    rx: tokio::sync::Mutex::new(rx),
                })
            })
            .clone()
    }

    /// Sending end of a named queue.
    pub fn queue_sender(&self, name: &str) -> MemoryQueueSender {
        MemoryQueueSender {
            queue: self.queue(name),
        }
    }

    /// Receiving end of a named queue. Competing receivers load-balance.
    pub fn queue_receiver(&self, name: &str) -> MemoryQueueReceiver {
        MemoryQueueReceiver {
            queue: self.queue(name),
        }
    }
}

impl Default for InMemoryBus {
    fn default() -> Self {
        Self::new()
    }
}

pub struct MemoryPublisher {
    fanout: broadcast::Sender<Message>,
}

#[async_trait]
impl EventPublisher for MemoryPublisher {
    async fn publish(&self, message: Message) -> Result<(), FunkwerkError> {
        // A fanout with no subscribers drops the message, same as a real
        // PUB socket with nobody connected.
        let _ = self.fanout.send(message);
        Ok(())
    }
}

pub struct MemorySubscriber {
    rx: tokio::sync::Mutex<broadcast::Receiver<Message>>,
    filters: Mutex<Vec<String>>,
}

#[async_trait]
impl EventSubscriber for MemorySubscriber {
    async fn subscribe(&self, topic_prefix: &str) -> Result<(), FunkwerkError> {
        self.filters
            .lock()
            .expect("filter list poisoned")
            .push(topic_prefix.to_string());
        Ok(())
    }

    async fn recv(&self) -> Result<Message, FunkwerkError> {
        let mut rx = self.rx.lock().await;
        loop {
            match rx.recv().await {
                Ok(message) => {
                    let filters = self.filters.lock().expect("filter list poisoned");
                    let matches = filters.is_empty()
                        || filters.iter().any(|f| message.topic.starts_with(f.as_str()));
                    if matches {
                        return Ok(message);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "in-memory subscriber lagged, messages skipped");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    return Err(FunkwerkError::Transport("in-memory bus closed".into()));
                }
            }
        }
    }
}

pub struct MemoryQueueSender {
    queue: Arc<MemoryQueue>,
}

#[async_trait]
impl QueueSender for MemoryQueueSender {
    async fn send(&self, message: Message) -> Result<(), FunkwerkError> {
        self.queue
            .tx
            .send(message)
            .await
            .map_err(|_| FunkwerkError::Transport("in-memory queue closed".into()))
    }
}

pub struct MemoryQueueReceiver {
    queue: Arc<MemoryQueue>,
}

#[async_trait]
impl QueueReceiver for MemoryQueueReceiver {
    async fn recv(&self) -> Result<Message, FunkwerkError> {
        let mut rx = self.queue.rx.lock().await;
        rx.recv()
            .await
            .ok_or_else(|| FunkwerkError::Transport("in-memory queue closed".into()))
    }
}
