#![allow(dead_code)]

use std::sync::Arc;

use order_relay::bus::InMemoryBroker;
use order_relay::{http, OrderRelay, TopologyDescriptor};

pub const CANONICAL: &str = r#"{"orderId":"O1","client":{"name":"A","email":"a@x.com","phone":"555"},"products":[{"productId":"P1","quantity":2}],"shippingAddress":{"street":"s","city":"c","state":"st","zipCode":"00000","country":"US"}}"#;

pub fn order_json(id: &str) -> serde_json::Value {
    let mut value: serde_json::Value = serde_json::from_str(CANONICAL).unwrap();
    value["orderId"] = serde_json::Value::String(id.to_string());
    value
}

/// Bind to port 0 and return the base URL.
pub async fn start_server(broker: &InMemoryBroker) -> String {
    let relay = OrderRelay::new(
        Arc::new(broker.clone()),
        Arc::new(TopologyDescriptor::order_service()),
    );
    let app = http::router(relay);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}
