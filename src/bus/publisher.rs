//! Publisher: encodes an order and emits it through a provisioned channel.

use serde::Serialize;
use tracing::info;

use super::broker::{Channel, OutboundMessage};
use crate::error::RelayError;
use crate::order::OrderPayload;
use crate::topology::TopologyDescriptor;

/// Encode any serializable payload as UTF-8 JSON.
///
/// Runs before any network call so an encoding failure never leaves a
/// half-sent message behind.
pub fn encode<T: Serialize + ?Sized>(payload: &T) -> Result<Vec<u8>, RelayError> {
    serde_json::to_vec(payload).map_err(RelayError::Serialization)
}

/// Publish `order` to the primary exchange of `topology` with persistent
/// delivery.
///
/// Returns once the client accepted the message; the broker's own
/// durability covers delivery from there.
pub async fn publish(
    channel: &dyn Channel,
    topology: &TopologyDescriptor,
    order: &OrderPayload,
) -> Result<(), RelayError> {
    let body = encode(order)?;
    let target = topology.primary();
    let len = body.len();
    let message = OutboundMessage::json(&target.exchange.name, &target.routing_key, body)
        .with_message_id(&order.order_id);

    channel.publish(message).await.map_err(RelayError::Publish)?;

    info!(
        order_id = %order.order_id,
        exchange = %target.exchange.name,
        routing_key = %target.routing_key,
        bytes = len,
        "order published"
    );
    Ok(())
}
