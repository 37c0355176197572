//! Topology provisioner: idempotent declaration against a live channel.

use tracing::debug;

use super::TopologyDescriptor;
use crate::bus::Channel;
use crate::error::RelayError;

/// Declare exchange, then queue, then binding for each declaration, in
/// descriptor order.
///
/// Identical re-declarations are no-ops on the broker. A conflicting one is
/// rejected by the broker and returned as `RelayError::Topology` with the
/// broker's reply text; no attempt is made to reconcile definitions.
pub async fn ensure_topology(
    channel: &dyn Channel,
    topology: &TopologyDescriptor,
) -> Result<(), RelayError> {
    for declaration in topology.declarations() {
        let exchange = &declaration.exchange;
        let queue = &declaration.queue;

        channel
            .declare_exchange(exchange)
            .await
            .map_err(RelayError::Topology)?;
        channel
            .declare_queue(queue)
            .await
            .map_err(RelayError::Topology)?;
        channel
            .bind_queue(&queue.name, &exchange.name, &declaration.routing_key)
            .await
            .map_err(RelayError::Topology)?;

        debug!(
            exchange = %exchange.name,
            kind = %exchange.kind,
            queue = %queue.name,
            routing_key = %declaration.routing_key,
            "topology declared"
        );
    }
    Ok(())
}
