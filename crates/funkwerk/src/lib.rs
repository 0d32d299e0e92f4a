pub mod bridge;
pub mod broker;
pub mod config;
pub mod error;
pub mod memory;
pub mod message;
pub mod messages;
pub mod pubsub;
pub mod queue;
pub mod traits;
pub mod transport;
pub mod worker;

pub use bridge::{EventBridge, EventCategory};
pub use broker::{BrokerSockets, EventBroker};
pub use config::{BusTopology, FunkwerkConfig, QueueEndpoints};
pub use error::FunkwerkError;
pub use memory::InMemoryBus;
pub use message::Message;
pub use messages::events;
pub use messages::topics;
pub use pubsub::{ZmqPublisher, ZmqSubscriber};
pub use queue::{QueueConfig, ZmqQueueReceiver, ZmqQueueSender};
pub use traits::{EventPublisher, EventSubscriber, QueueReceiver, QueueSender};
pub use transport::Transport;
pub use worker::{Worker, WorkerBuilder, WorkerRunner, WorkerRunnerConfig};
