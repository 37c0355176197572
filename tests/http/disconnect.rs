use std::time::Duration;

use order_relay::bus::{CloseCall, InMemoryBroker};
use tokio::time::{sleep, Instant};

use crate::support::{order_json, start_server};

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn client_disconnect_does_not_abandon_the_publish() {
    // A full pipeline takes well over a second at this latency.
    let broker = InMemoryBroker::new().with_latency(Duration::from_millis(100));
    let base = start_server(&broker).await;
    let client = reqwest::Client::builder()
        .timeout(Duration::from_millis(150))
        .build()
        .unwrap();

    let err = client
        .post(format!("{base}/publish-order"))
        .json(&order_json("GONE"))
        .send()
        .await
        .unwrap_err();
    assert!(err.is_timeout(), "{err:?}");

    let deadline = Instant::now() + Duration::from_secs(5);
    while broker.close_calls().len() < 2 && Instant::now() < deadline {
        sleep(Duration::from_millis(20)).await;
    }

    assert_eq!(broker.connection_attempts(), 1);
    assert_eq!(broker.open_connections(), 0, "connection leaked");
    assert_eq!(broker.open_channels(), 0, "channel leaked");
    assert!(matches!(
        broker.close_calls().as_slice(),
        [CloseCall::Channel { .. }, CloseCall::Connection { .. }]
    ));
    let published = broker.published();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].message_id.as_deref(), Some("GONE"));
}
