use order_relay::bus::InMemoryBroker;

use crate::support::start_server;

#[tokio::test]
async fn health_does_not_touch_broker() {
    let broker = InMemoryBroker::new();
    let base = start_server(&broker).await;

    let resp = reqwest::get(format!("{base}/health")).await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(broker.connection_attempts(), 0);
}
