//! End-to-end bus tests over real ZeroMQ sockets.

use std::time::Duration;

use vigil_funkwerk::broker::{BrokerSockets, EventBroker};
use vigil_funkwerk::events::SdInstancesUpdate;
use vigil_funkwerk::queue::{QueueConfig, ZmqQueueReceiver, ZmqQueueSender};
use vigil_funkwerk::topics;
use vigil_funkwerk::traits::{EventPublisher, EventSubscriber, QueueReceiver, QueueSender};
use vigil_funkwerk::{Message, Transport, ZmqPublisher, ZmqSubscriber};

use vigil_core::sd::SdInstance;

#[tokio::test]
async fn direct_pub_sub_roundtrip() {
    // Direct PUB/SUB without broker: publisher binds, subscriber connects.
    let transport = Transport::tcp("127.0.0.1", 25700);

    let publisher = ZmqPublisher::bind(&transport).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let subscriber = ZmqSubscriber::connect(&transport).await.unwrap();
    subscriber.subscribe("vigil.test").await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    let msg = Message::new("vigil.test.hello", &"world".to_string()).unwrap();
    let correlation_id = msg.correlation_id;
    publisher.publish(msg).await.unwrap();

    let received = tokio::time::timeout(Duration::from_secs(2), subscriber.recv())
        .await
        .expect("timed out waiting for message")
        .unwrap();

    assert_eq!(received.topic, "vigil.test.hello");
    assert_eq!(received.correlation_id, correlation_id);
    assert_eq!(received.decode::<String>().unwrap(), "world");
}

#[tokio::test]
async fn topic_filtering_works() {
    // Subscriber should only receive messages matching its subscription prefix.
    let transport = Transport::tcp("127.0.0.1", 25701);

    let publisher = ZmqPublisher::bind(&transport).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let subscriber = ZmqSubscriber::connect(&transport).await.unwrap();
    subscriber.subscribe(topics::SD_INSTANCES_UPDATES).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    // A type-set update should be filtered out.
    let filtered = Message::new(topics::SD_TYPES_UPDATES, &1u64).unwrap();
    publisher.publish(filtered).await.unwrap();

    // An instance-set update should arrive.
    let wanted = Message::new(topics::SD_INSTANCES_UPDATES, &2u64).unwrap();
    let wanted_id = wanted.correlation_id;
    publisher.publish(wanted).await.unwrap();

    let received = tokio::time::timeout(Duration::from_secs(2), subscriber.recv())
        .await
        .expect("timed out")
        .unwrap();

    assert_eq!(received.topic, topics::SD_INSTANCES_UPDATES);
    assert_eq!(received.correlation_id, wanted_id);

    let extra = tokio::time::timeout(Duration::from_millis(300), subscriber.recv()).await;
    assert!(extra.is_err(), "should not receive filtered message");
}

#[tokio::test]
async fn broker_fans_out_to_every_subscriber() {
    let sockets = BrokerSockets::tcp("127.0.0.1", 25710, 25711, 25712);

    let broker_handle = tokio::spawn({
        let sockets = sockets.clone();
        async move {
            let broker = EventBroker::new(sockets);
            broker.run().await
        }
    });
    tokio::time::sleep(Duration::from_millis(100)).await;

    // Publisher connects to broker frontend, subscribers to the backend.
    let publisher = ZmqPublisher::connect(&Transport::tcp("127.0.0.1", 25710))
        .await
        .unwrap();
    let sub1 = ZmqSubscriber::connect(&Transport::tcp("127.0.0.1", 25711))
        .await
        .unwrap();
    let sub2 = ZmqSubscriber::connect(&Transport::tcp("127.0.0.1", 25711))
        .await
        .unwrap();
    sub1.subscribe("").await.unwrap();
    sub2.subscribe("").await.unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    let update = SdInstancesUpdate {
        seq: 1,
        sd_instances: vec![SdInstance::unconfirmed("ws-0042", "weather-station")],
    };
    let msg = Message::new(topics::SD_INSTANCES_UPDATES, &update).unwrap();
    let cid = msg.correlation_id;
    publisher.publish(msg).await.unwrap();

    for sub in [&sub1, &sub2] {
        let received = tokio::time::timeout(Duration::from_secs(3), sub.recv())
            .await
            .expect("timed out waiting for broker-forwarded message")
            .unwrap();
        assert_eq!(received.correlation_id, cid);

        let decoded: SdInstancesUpdate = received.decode().unwrap();
        assert_eq!(decoded.seq, 1);
        assert_eq!(decoded.sd_instances[0].uid, "ws-0042");
    }

    broker_handle.abort();
}

#[tokio::test]
async fn queue_roundtrip() {
    let transport = Transport::tcp("127.0.0.1", 25720);

    // Receiver binds first (stable endpoint), sender connects.
    let receiver = ZmqQueueReceiver::bind(&transport).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let sender = ZmqQueueSender::connect(&transport, QueueConfig::default())
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let msg = Message::new(topics::SD_INSTANCE_REGISTRATION_REQUESTS, &"ws-0042").unwrap();
    let correlation_id = msg.correlation_id;
    sender.send(msg).await.unwrap();

    let received = tokio::time::timeout(Duration::from_secs(2), receiver.recv())
        .await
        .expect("timed out")
        .unwrap();
    assert_eq!(received.topic, topics::SD_INSTANCE_REGISTRATION_REQUESTS);
    assert_eq!(received.correlation_id, correlation_id);
    assert_eq!(received.decode::<String>().unwrap(), "ws-0042");
}
