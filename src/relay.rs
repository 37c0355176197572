//! The publish pipeline: connect → declare → publish → close.
//!
//! Every call to `OrderRelay::publish` is a self-contained unit of work with
//! its own broker session. The relay itself only holds read-only
//! configuration and the one-time provisioning flag, so it can be cloned
//! into every HTTP handler.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, error, info};

use crate::bus::{publish, with_session, Broker, Channel};
use crate::error::RelayError;
use crate::order::OrderPayload;
use crate::topology::{ensure_topology, TopologyDescriptor};

/// Stages of a single publish operation.
///
/// `Closing` is entered from every stage after `Idle`, including straight
/// from `Connecting` when the connection cannot be set up.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Idle,
    Connecting,
    Provisioning,
    Publishing,
    Closing,
    Done,
    Failed,
}

/// When topology is declared.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Provisioning {
    /// Declare the full topology on every publish.
    #[default]
    EveryPublish,
    /// Declare once per process; re-declare after any failed publish.
    Once,
}

impl fmt::Display for Provisioning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provisioning::EveryPublish => f.write_str("every-publish"),
            Provisioning::Once => f.write_str("once"),
        }
    }
}

impl FromStr for Provisioning {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "every-publish" | "always" => Ok(Provisioning::EveryPublish),
            "once" => Ok(Provisioning::Once),
            other => Err(format!(
                "unknown provisioning mode '{other}' (expected 'every-publish' or 'once')"
            )),
        }
    }
}

/// What the broker was handed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishReceipt {
    pub order_id: String,
    pub exchange: String,
    pub routing_key: String,
}

/// Publishes orders through a fresh broker session per call.
#[derive(Clone)]
pub struct OrderRelay {
    broker: Arc<dyn Broker>,
    topology: Arc<TopologyDescriptor>,
    provisioning: Provisioning,
    provisioned: Arc<AtomicBool>,
}

impl OrderRelay {
    pub fn new(broker: Arc<dyn Broker>, topology: Arc<TopologyDescriptor>) -> Self {
        Self {
            broker,
            topology,
            provisioning: Provisioning::default(),
            provisioned: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_provisioning(mut self, provisioning: Provisioning) -> Self {
        self.provisioning = provisioning;
        self
    }

    pub fn topology(&self) -> &TopologyDescriptor {
        &self.topology
    }

    pub fn provisioning(&self) -> Provisioning {
        self.provisioning
    }

    /// Run the full pipeline once for `order`.
    ///
    /// Errors from any stage are returned unchanged after the session has
    /// been released.
    pub async fn publish(&self, order: &OrderPayload) -> Result<PublishReceipt, RelayError> {
        let order_id = order.order_id.as_str();
        transition(order_id, Stage::Idle);
        transition(order_id, Stage::Connecting);

        let result = with_session(self.broker.as_ref(), |channel| async move {
            let outcome = self.provision_and_publish(channel.as_ref(), order).await;
            transition(order_id, Stage::Closing);
            outcome
        })
        .await;

        match result {
            Ok(()) => {
                transition(order_id, Stage::Done);
                let primary = self.topology.primary();
                Ok(PublishReceipt {
                    order_id: order.order_id.clone(),
                    exchange: primary.exchange.name.clone(),
                    routing_key: primary.routing_key.clone(),
                })
            }
            Err(err) => {
                if matches!(err, RelayError::Connectivity(_)) {
                    transition(order_id, Stage::Closing);
                }
                // The broker may have lost its definitions; declare again next time.
                self.provisioned.store(false, Ordering::Release);
                transition(order_id, Stage::Failed);
                error!(order_id, kind = err.kind(), error = %err, "order publish failed");
                Err(err)
            }
        }
    }

    async fn provision_and_publish(
        &self,
        channel: &dyn Channel,
        order: &OrderPayload,
    ) -> Result<(), RelayError> {
        let order_id = order.order_id.as_str();
        transition(order_id, Stage::Provisioning);
        if self.provisioning == Provisioning::Once && self.provisioned.load(Ordering::Acquire) {
            debug!(order_id, "topology already ensured by this process");
        } else {
            ensure_topology(channel, &self.topology).await?;
            self.provisioned.store(true, Ordering::Release);
        }

        transition(order_id, Stage::Publishing);
        publish(channel, &self.topology, order).await
    }
}

fn transition(order_id: &str, stage: Stage) {
    match stage {
        Stage::Done => info!(order_id, stage = ?stage, "publish pipeline finished"),
        _ => debug!(order_id, stage = ?stage, "publish pipeline stage"),
    }
}
