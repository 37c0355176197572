use order_relay::bus::{with_session, CloseCall, Fault, InMemoryBroker};
use order_relay::RelayError;

use crate::support::{assert_closed_in_order, assert_released, order, relay};

async fn publish_with_fault(fault: Fault) -> (InMemoryBroker, Result<(), RelayError>) {
    let broker = InMemoryBroker::new();
    broker.inject(fault);
    let result = relay(&broker)
        .publish(&order("O1", &[("P1", 2)]))
        .await
        .map(|_| ());
    (broker, result)
}

#[tokio::test]
async fn success_releases_session() {
    let broker = InMemoryBroker::new();
    relay(&broker)
        .publish(&order("O1", &[("P1", 2)]))
        .await
        .unwrap();
    assert_eq!(broker.connection_attempts(), 1);
    assert_released(&broker);
    assert_closed_in_order(&broker, 1);
}

#[tokio::test]
async fn connect_failure() {
    let (broker, result) = publish_with_fault(Fault::Connect).await;
    assert!(matches!(result, Err(RelayError::Connectivity(_))));
    assert!(broker.published().is_empty());
    assert_released(&broker);
    assert!(broker.close_calls().is_empty());
}

#[tokio::test]
async fn access_refused() {
    let (broker, result) = publish_with_fault(Fault::AccessRefused).await;
    assert!(matches!(result, Err(RelayError::Connectivity(_))));
    assert_released(&broker);
    assert!(broker.close_calls().is_empty());
}

#[tokio::test]
async fn channel_open_failure() {
    let (broker, result) = publish_with_fault(Fault::OpenChannel).await;
    assert!(matches!(result, Err(RelayError::Connectivity(_))));
    assert_released(&broker);
    assert!(matches!(
        broker.close_calls().as_slice(),
        [CloseCall::Connection { .. }]
    ));
}

#[tokio::test]
async fn declare_failures() {
    for fault in [Fault::DeclareExchange, Fault::DeclareQueue, Fault::Bind] {
        let (broker, result) = publish_with_fault(fault).await;
        assert!(
            matches!(result, Err(RelayError::Topology(_))),
            "{fault:?}: {result:?}"
        );
        assert!(broker.published().is_empty(), "{fault:?}");
        assert_released(&broker);
        // the broker already closed the channel; the session still sends its close
        assert_closed_in_order(&broker, 1);
    }
}

#[tokio::test]
async fn publish_failure() {
    let (broker, result) = publish_with_fault(Fault::Publish).await;
    assert!(matches!(result, Err(RelayError::Publish(_))));
    assert!(broker.published().is_empty());
    assert_released(&broker);
    assert_closed_in_order(&broker, 1);
}

#[tokio::test]
async fn close_failures_do_not_fail_a_successful_publish() {
    for fault in [Fault::CloseChannel, Fault::CloseConnection] {
        let (broker, result) = publish_with_fault(fault).await;
        assert!(result.is_ok(), "{fault:?}: {result:?}");
        assert_eq!(broker.published().len(), 1);
        assert_released(&broker);
        assert_closed_in_order(&broker, 1);
    }
}

#[tokio::test]
async fn close_failure_does_not_hide_publish_error() {
    let broker = InMemoryBroker::new();
    broker.inject(Fault::Publish);
    broker.inject(Fault::CloseChannel);
    let err = relay(&broker)
        .publish(&order("O1", &[("P1", 2)]))
        .await
        .unwrap_err();
    assert!(matches!(err, RelayError::Publish(_)));
    assert_released(&broker);
    assert_closed_in_order(&broker, 1);
}

#[tokio::test]
async fn work_error_propagates_through_session() {
    let broker = InMemoryBroker::new();
    let err = with_session(&broker, |_channel| async {
        Err::<(), _>(RelayError::Validation("stop".into()))
    })
    .await
    .unwrap_err();
    assert!(err.is_validation());
    assert_released(&broker);
    assert_closed_in_order(&broker, 1);
}

#[tokio::test]
async fn every_publish_uses_its_own_connection() {
    let broker = InMemoryBroker::new();
    let relay = relay(&broker);
    for i in 0..5 {
        relay
            .publish(&order(&format!("O{i}"), &[("P1", 1)]))
            .await
            .unwrap();
    }
    assert_eq!(broker.connection_attempts(), 5);
    assert_released(&broker);
    assert_closed_in_order(&broker, 5);
}
