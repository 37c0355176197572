use order_relay::bus::InMemoryBroker;
use order_relay::OrderPayload;

use crate::support::{order, relay, CANONICAL};

#[tokio::test]
async fn published_body_decodes_to_the_submitted_order() {
    let broker = InMemoryBroker::new();
    let relay = relay(&broker);
    let orders = [
        order("A-1", &[("P1", 1)]),
        order("A-2", &[("P1", 3), ("P2", 7), ("P3", 1)]),
        order("Ünïcode-✓", &[("café", 42)]),
    ];

    for order in &orders {
        relay.publish(order).await.unwrap();
    }

    let published = broker.published();
    assert_eq!(published.len(), orders.len());
    for (message, order) in published.iter().zip(&orders) {
        let decoded: OrderPayload = serde_json::from_slice(&message.body).unwrap();
        assert_eq!(&decoded, order);
        assert_eq!(message.message_id.as_deref(), Some(order.order_id.as_str()));
        assert_eq!(message.content_type.as_deref(), Some("application/json"));
    }
}

#[tokio::test]
async fn canonical_document_is_published_byte_for_byte() {
    let broker = InMemoryBroker::new();
    let order = OrderPayload::from_json_str(CANONICAL).unwrap();

    relay(&broker).publish(&order).await.unwrap();

    let queued = broker.queue_messages("order.queue");
    assert_eq!(queued.len(), 1);
    assert_eq!(queued[0].body_str(), Some(CANONICAL));
    assert!(queued[0].persistent);
}

#[tokio::test]
async fn only_the_order_queue_receives_orders() {
    let broker = InMemoryBroker::new();
    relay(&broker)
        .publish(&order("O1", &[("P1", 1)]))
        .await
        .unwrap();

    assert_eq!(broker.queue_messages("order.queue").len(), 1);
    assert!(broker.queue_messages("stock.response.queue").is_empty());
    assert!(broker.queue_messages("stock.update.queue").is_empty());
}

#[tokio::test]
async fn persisted_order_survives_broker_restart() {
    let broker = InMemoryBroker::new();
    relay(&broker)
        .publish(&order("O1", &[("P1", 1)]))
        .await
        .unwrap();

    broker.restart();

    let queued = broker.queue_messages("order.queue");
    assert_eq!(queued.len(), 1);
    let decoded: OrderPayload = serde_json::from_slice(&queued[0].body).unwrap();
    assert_eq!(decoded.order_id, "O1");
}
