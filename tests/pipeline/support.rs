//! Shared fixtures for pipeline tests.

#![allow(dead_code)]

use std::sync::Arc;

use order_relay::bus::{CloseCall, InMemoryBroker};
use order_relay::{Client, OrderPayload, OrderRelay, ProductLine, ShippingAddress, TopologyDescriptor};

pub const CANONICAL: &str = r#"{"orderId":"O1","client":{"name":"A","email":"a@x.com","phone":"555"},"products":[{"productId":"P1","quantity":2}],"shippingAddress":{"street":"s","city":"c","state":"st","zipCode":"00000","country":"US"}}"#;

pub fn order(id: &str, lines: &[(&str, u32)]) -> OrderPayload {
    OrderPayload {
        order_id: id.to_string(),
        client: Client {
            name: "Ada Lovelace".into(),
            email: "ada@example.com".into(),
            phone: "+44 20 7946 0000".into(),
        },
        products: lines
            .iter()
            .map(|(product_id, quantity)| ProductLine {
                product_id: product_id.to_string(),
                quantity: *quantity,
            })
            .collect(),
        shipping_address: ShippingAddress {
            street: "12 Analytical Row".into(),
            city: "London".into(),
            state: "Greater London".into(),
            zip_code: "NW1 6XE".into(),
            country: "UK".into(),
        },
    }
}

pub fn relay(broker: &InMemoryBroker) -> OrderRelay {
    OrderRelay::new(
        Arc::new(broker.clone()),
        Arc::new(TopologyDescriptor::order_service()),
    )
}

/// Assert no connection or channel is left open.
pub fn assert_released(broker: &InMemoryBroker) {
    assert_eq!(broker.open_connections(), 0, "connection leaked");
    assert_eq!(broker.open_channels(), 0, "channel leaked");
}

/// Assert each of `sessions` sequential sessions closed its channel and then
/// the connection that owned it.
pub fn assert_closed_in_order(broker: &InMemoryBroker, sessions: usize) {
    let calls = broker.close_calls();
    assert_eq!(calls.len(), sessions * 2, "{calls:?}");
    for pair in calls.chunks(2) {
        match pair {
            [CloseCall::Channel { connection }, CloseCall::Connection { id }] => {
                assert_eq!(connection, id, "{calls:?}")
            }
            other => panic!("channel must close before its connection: {other:?}"),
        }
    }
}
