//! Connection manager: one connection and one channel per publish operation.
//!
//! `with_session` is the only way the pipeline touches the broker. The
//! channel and connection it opens are closed on every exit path: success,
//! an error returned by the work, or a failure opening the channel. Close
//! failures are logged and never replace the outcome of the work.

use std::future::Future;
use std::sync::Arc;

use tracing::{debug, warn};

use super::broker::{Broker, Channel, Connection};
use crate::error::RelayError;

/// An owned (connection, channel) pair scoped to a single operation.
///
/// Never cached or shared between operations; `close` consumes it.
pub struct BrokerSession {
    connection: Box<dyn Connection>,
    channel: Arc<dyn Channel>,
}

impl BrokerSession {
    /// Connect and derive one channel. If the channel cannot be opened the
    /// connection is closed before the error is returned.
    pub async fn open(broker: &dyn Broker) -> Result<Self, RelayError> {
        debug!(endpoint = %broker.endpoint(), "connecting to broker");
        let connection = broker.connect().await.map_err(RelayError::Connectivity)?;

        match connection.open_channel().await {
            Ok(channel) => Ok(Self {
                connection,
                channel,
            }),
            Err(err) => {
                if let Err(close_err) = connection.close().await {
                    warn!(error = %close_err, "failed to close connection after channel error");
                }
                Err(RelayError::Connectivity(err))
            }
        }
    }

    pub fn channel(&self) -> Arc<dyn Channel> {
        Arc::clone(&self.channel)
    }

    /// Close channel then connection. Failures are logged, never returned.
    pub async fn close(self) {
        let mut clean = true;
        if let Err(err) = self.channel.close().await {
            warn!(error = %err, "failed to close broker channel");
            clean = false;
        }
        if let Err(err) = self.connection.close().await {
            warn!(error = %err, "failed to close broker connection");
            clean = false;
        }
        debug!(clean, "broker session closed");
    }
}

/// Run `work` against a fresh channel, then release the session.
///
/// The outcome of `work` is returned unchanged once cleanup has been
/// attempted.
pub async fn with_session<T, F, Fut>(broker: &dyn Broker, work: F) -> Result<T, RelayError>
where
    F: FnOnce(Arc<dyn Channel>) -> Fut,
    Fut: Future<Output = Result<T, RelayError>>,
{
    let session = BrokerSession::open(broker).await?;
    let outcome = work(session.channel()).await;
    session.close().await;
    outcome
}
