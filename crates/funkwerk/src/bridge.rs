//! Dispatch/subscription bridge.
//!
//! Hands inbound bus messages to in-process consumers (e.g. the API
//! layer's subscription feed) via one bounded channel per event category.
//! Messages queue while no reader is attached; exceeding the capacity is a
//! counted, logged overflow that drops the oldest entry — never a crash,
//! never a silent drop.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;
use tracing::warn;

use crate::message::Message;

/// Default per-category buffer capacity.
const DEFAULT_CAPACITY: usize = 256;

/// In-process event categories surfaced to API-layer subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventCategory {
    /// A new SD instance entered the directory.
    InstanceRegistered,
    /// A fulfillment result was recorded or superseded.
    FulfillmentUpdated,
}

impl EventCategory {
    pub const ALL: [EventCategory; 2] = [
        EventCategory::InstanceRegistered,
        EventCategory::FulfillmentUpdated,
    ];
}

impl std::fmt::Display for EventCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventCategory::InstanceRegistered => write!(f, "instance-registered"),
            EventCategory::FulfillmentUpdated => write!(f, "fulfillment-updated"),
        }
    }
}

struct Channel {
    queue: Mutex<VecDeque<Message>>,
    notify: Notify,
    overflow: AtomicU64,
}

impl Channel {
    fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
            overflow: AtomicU64::new(0),
        }
    }
}

/// Single-writer bridge between the bus consumer tasks and in-process readers.
pub struct EventBridge {
    capacity: usize,
    channels: HashMap<EventCategory, Arc<Channel>>,
}

impl EventBridge {
    pub fn new(capacity: usize) -> Self {
        let channels = EventCategory::ALL
            .iter()
            .map(|c| (*c, Arc::new(Channel::new())))
            .collect();
        Self { capacity, channels }
    }

    /// Queue a message for the category's reader.
    ///
    /// When the bounded buffer is full the oldest entry is dropped and the
    /// overflow counter incremented — the reported, non-fatal condition.
    pub fn dispatch(&self, category: EventCategory, message: Message) {
        let channel = &self.channels[&category];
        {
            let mut queue = channel.queue.lock().expect("bridge queue poisoned");
            if queue.len() >= self.capacity {
                queue.pop_front();
                let dropped = channel.overflow.fetch_add(1, Ordering::Relaxed) + 1;
                warn!(category = %category, dropped, "bridge buffer overflow, dropped oldest");
            }
            queue.push_back(message);
        }
        channel.notify.notify_one();
    }

    /// Attach a reader for one category.
    pub fn receiver(&self, category: EventCategory) -> BridgeReceiver {
        BridgeReceiver {
            channel: self.channels[&category].clone(),
        }
    }

    /// Messages dropped so far for a category.
    pub fn overflow_count(&self, category: EventCategory) -> u64 {
        self.channels[&category].overflow.load(Ordering::Relaxed)
    }
}

impl Default for EventBridge {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// Reading end of one bridge category.
pub struct BridgeReceiver {
    channel: Arc<Channel>,
}

impl BridgeReceiver {
    /// Receive the next queued message, waiting if the buffer is empty.
    pub async fn recv(&self) -> Message {
        loop {
            if let Some(message) = self
                .channel
                .queue
                .lock()
                .expect("bridge queue poisoned")
                .pop_front()
            {
                return message;
            }
            self.channel.notify.notified().await;
        }
    }

    /// Non-blocking receive.
    pub fn try_recv(&self) -> Option<Message> {
        self.channel
            .queue
            .lock()
            .expect("bridge queue poisoned")
            .pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn msg(n: u64) -> Message {
        Message::new("bridge.test", &n).unwrap()
    }

    #[tokio::test]
    async fn delivers_in_order() {
        let bridge = EventBridge::new(8);
        let rx = bridge.receiver(EventCategory::InstanceRegistered);

        bridge.dispatch(EventCategory::InstanceRegistered, msg(1));
        bridge.dispatch(EventCategory::InstanceRegistered, msg(2));

        assert_eq!(rx.recv().await.decode::<u64>().unwrap(), 1);
        assert_eq!(rx.recv().await.decode::<u64>().unwrap(), 2);
    }

    #[tokio::test]
    async fn buffers_before_reader_attaches() {
        let bridge = EventBridge::new(8);
        bridge.dispatch(EventCategory::FulfillmentUpdated, msg(7));

        // Reader attached after the dispatch still sees the message.
        let rx = bridge.receiver(EventCategory::FulfillmentUpdated);
        assert_eq!(rx.recv().await.decode::<u64>().unwrap(), 7);
    }

    #[tokio::test]
    async fn overflow_drops_oldest_and_counts() {
        let bridge = EventBridge::new(2);
        for n in 0..5 {
            bridge.dispatch(EventCategory::InstanceRegistered, msg(n));
        }

        assert_eq!(bridge.overflow_count(EventCategory::InstanceRegistered), 3);

        // The two newest survive.
        let rx = bridge.receiver(EventCategory::InstanceRegistered);
        assert_eq!(rx.recv().await.decode::<u64>().unwrap(), 3);
        assert_eq!(rx.recv().await.decode::<u64>().unwrap(), 4);
        assert!(rx.try_recv().is_none());
    }

    #[tokio::test]
    async fn recv_wakes_on_dispatch() {
        let bridge = Arc::new(EventBridge::new(8));
        let rx = bridge.receiver(EventCategory::FulfillmentUpdated);

        let b = bridge.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            b.dispatch(EventCategory::FulfillmentUpdated, msg(42));
        });

        let received = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("recv should wake");
        assert_eq!(received.decode::<u64>().unwrap(), 42);
    }

    #[tokio::test]
    async fn categories_are_independent() {
        let bridge = EventBridge::new(8);
        bridge.dispatch(EventCategory::InstanceRegistered, msg(1));

        let other = bridge.receiver(EventCategory::FulfillmentUpdated);
        assert!(other.try_recv().is_none());
    }
}
