use std::collections::HashSet;
use std::time::Duration;

use order_relay::bus::{CloseCall, InMemoryBroker};

use crate::support::{order_json, start_server};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_requests_complete_independently() {
    let broker = InMemoryBroker::new().with_latency(Duration::from_millis(5));
    let base = start_server(&broker).await;
    let client = reqwest::Client::new();

    let requests = (0..8).map(|i| {
        let client = client.clone();
        let url = format!("{base}/publish-order");
        tokio::spawn(async move {
            let resp = client
                .post(url)
                .json(&order_json(&format!("C{i}")))
                .send()
                .await
                .unwrap();
            resp.status()
        })
    });
    let handles: Vec<_> = requests.collect();
    for handle in handles {
        assert_eq!(handle.await.unwrap(), 200);
    }

    assert_eq!(broker.connection_attempts(), 8);
    assert_eq!(broker.open_connections(), 0);
    assert_eq!(broker.open_channels(), 0);
    let calls = broker.close_calls();
    let channel_closes = calls
        .iter()
        .filter(|call| matches!(call, CloseCall::Channel { .. }))
        .count();
    assert_eq!(channel_closes, 8);
    // each channel close precedes the close of the connection that owns it
    for (at, call) in calls.iter().enumerate() {
        if let CloseCall::Connection { id } = call {
            assert!(calls[..at].contains(&CloseCall::Channel { connection: *id }));
        }
    }

    let ids: HashSet<String> = broker
        .published()
        .into_iter()
        .filter_map(|m| m.message_id)
        .collect();
    let expected: HashSet<String> = (0..8).map(|i| format!("C{i}")).collect();
    assert_eq!(ids, expected);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn a_failing_request_does_not_affect_its_neighbours() {
    let broker = InMemoryBroker::new().with_latency(Duration::from_millis(2));
    let base = start_server(&broker).await;
    let client = reqwest::Client::new();

    let good = {
        let client = client.clone();
        let url = format!("{base}/publish-order");
        tokio::spawn(async move {
            client
                .post(url)
                .json(&order_json("GOOD"))
                .send()
                .await
                .unwrap()
                .status()
        })
    };
    let bad = client
        .post(format!("{base}/publish-order"))
        .body(r#"{"orderId":"BAD"}"#)
        .send()
        .await
        .unwrap()
        .status();

    assert_eq!(bad, 400);
    assert_eq!(good.await.unwrap(), 200);
    assert_eq!(broker.connection_attempts(), 1);
    assert_eq!(broker.published().len(), 1);
}
