//! Broker client traits.
//!
//! A `Broker` opens connections; a `Connection` opens channels; a `Channel`
//! carries declarations and publishes. The traits are object safe so the
//! pipeline can hold an `Arc<dyn Broker>` and swap the AMQP client for the
//! in-memory broker in tests.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::topology::{ExchangeSpec, QueueSpec};

/// AMQP reply code for `PRECONDITION_FAILED` (conflicting re-declaration).
pub const PRECONDITION_FAILED: u16 = 406;
/// AMQP reply code for `ACCESS_REFUSED`.
pub const ACCESS_REFUSED: u16 = 403;
/// AMQP reply code for `NOT_FOUND`.
pub const NOT_FOUND: u16 = 404;

/// Error reported by a broker client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BrokerError {
    /// No TCP/TLS connection could be established.
    #[error("broker unreachable: {0}")]
    Unreachable(String),
    /// Credentials or vhost were rejected.
    #[error("access refused: {0}")]
    AccessRefused(String),
    /// The broker answered with a channel or connection exception.
    #[error("broker replied {code}: {text}")]
    Rejected { code: u16, text: String },
    /// The channel or connection is no longer usable.
    #[error("channel closed")]
    ChannelClosed,
    /// Transport-level failure mid-conversation (reset, broken pipe).
    #[error("i/o error: {0}")]
    Io(String),
}

/// A message ready to be handed to the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub exchange: String,
    pub routing_key: String,
    pub body: Vec<u8>,
    /// Delivery mode 2: stored on disk by the broker.
    pub persistent: bool,
    pub content_type: Option<String>,
    pub message_id: Option<String>,
}

impl OutboundMessage {
    /// A persistent JSON message.
    pub fn json(exchange: impl Into<String>, routing_key: impl Into<String>, body: Vec<u8>) -> Self {
        Self {
            exchange: exchange.into(),
            routing_key: routing_key.into(),
            body,
            persistent: true,
            content_type: Some("application/json".to_string()),
            message_id: None,
        }
    }

    pub fn with_message_id(mut self, id: impl Into<String>) -> Self {
        self.message_id = Some(id.into());
        self
    }

    /// Get the body as a string (if valid UTF-8).
    pub fn body_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.body).ok()
    }
}

/// Opens connections to a broker.
#[async_trait]
pub trait Broker: Send + Sync {
    /// Open a new connection. Each call yields an independent connection.
    async fn connect(&self) -> Result<Box<dyn Connection>, BrokerError>;

    /// Human-readable endpoint for logs. Must not include credentials.
    fn endpoint(&self) -> String;
}

/// A live broker connection.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Open a logical channel over this connection.
    async fn open_channel(&self) -> Result<Arc<dyn Channel>, BrokerError>;

    /// Close the connection. Closing an already-closed connection is an error.
    async fn close(&self) -> Result<(), BrokerError>;
}

/// A logical channel over a connection.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Declare an exchange. Idempotent for identical parameters.
    async fn declare_exchange(&self, exchange: &ExchangeSpec) -> Result<(), BrokerError>;

    /// Declare a queue. Idempotent for identical parameters.
    async fn declare_queue(&self, queue: &QueueSpec) -> Result<(), BrokerError>;

    /// Bind `queue` to `exchange` for `routing_key`.
    async fn bind_queue(
        &self,
        queue: &str,
        exchange: &str,
        routing_key: &str,
    ) -> Result<(), BrokerError>;

    /// Hand a message to the client. Returns once the client accepted it;
    /// no broker-side confirmation is awaited.
    async fn publish(&self, message: OutboundMessage) -> Result<(), BrokerError>;

    /// Close the channel. Closing an already-closed channel is an error.
    async fn close(&self) -> Result<(), BrokerError>;
}
