//! Broker topology: which exchanges, queues and bindings a deployment needs.
//!
//! A `TopologyDescriptor` is built once at startup and shared read-only by
//! every publish operation (`Arc<TopologyDescriptor>`). The first declaration
//! is the primary one: orders are published to its exchange with its routing
//! key. The remaining declarations are provisioned alongside it so downstream
//! services find their queues in place.

mod provisioner;

use std::fmt;
use std::str::FromStr;

pub use provisioner::ensure_topology;

/// AMQP exchange type.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ExchangeKind {
    #[default]
    Direct,
    Fanout,
    Topic,
    Headers,
}

impl ExchangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExchangeKind::Direct => "direct",
            ExchangeKind::Fanout => "fanout",
            ExchangeKind::Topic => "topic",
            ExchangeKind::Headers => "headers",
        }
    }
}

impl fmt::Display for ExchangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExchangeKind {
    type Err = TopologyConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "direct" => Ok(ExchangeKind::Direct),
            "fanout" => Ok(ExchangeKind::Fanout),
            "topic" => Ok(ExchangeKind::Topic),
            "headers" => Ok(ExchangeKind::Headers),
            other => Err(TopologyConfigError::UnknownExchangeKind(other.to_string())),
        }
    }
}

/// Exchange parameters as sent in `exchange.declare`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExchangeSpec {
    pub name: String,
    pub kind: ExchangeKind,
    pub durable: bool,
}

/// Queue parameters as sent in `queue.declare`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueueSpec {
    pub name: String,
    pub durable: bool,
}

/// One exchange, its queue, and the binding between them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Declaration {
    pub exchange: ExchangeSpec,
    pub queue: QueueSpec,
    pub routing_key: String,
}

impl Declaration {
    /// A durable direct exchange bound to a durable queue.
    pub fn durable_direct(
        exchange: impl Into<String>,
        queue: impl Into<String>,
        routing_key: impl Into<String>,
    ) -> Self {
        Self {
            exchange: ExchangeSpec {
                name: exchange.into(),
                kind: ExchangeKind::Direct,
                durable: true,
            },
            queue: QueueSpec {
                name: queue.into(),
                durable: true,
            },
            routing_key: routing_key.into(),
        }
    }

    pub fn with_exchange_kind(mut self, kind: ExchangeKind) -> Self {
        self.exchange.kind = kind;
        self
    }

    pub fn with_exchange_durable(mut self, durable: bool) -> Self {
        self.exchange.durable = durable;
        self
    }

    pub fn with_queue_durable(mut self, durable: bool) -> Self {
        self.queue.durable = durable;
        self
    }
}

/// Errors raised while building a descriptor from configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TopologyConfigError {
    #[error("topology must declare at least one exchange/queue/binding")]
    Empty,
    #[error("unknown exchange kind: {0}")]
    UnknownExchangeKind(String),
    #[error("declaration {index} has an empty {field}")]
    BlankName { index: usize, field: &'static str },
}

/// Immutable, process-wide topology.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TopologyDescriptor {
    declarations: Vec<Declaration>,
}

impl TopologyDescriptor {
    /// Build a descriptor. The first declaration becomes the publish target.
    pub fn new(declarations: Vec<Declaration>) -> Result<Self, TopologyConfigError> {
        if declarations.is_empty() {
            return Err(TopologyConfigError::Empty);
        }
        for (index, declaration) in declarations.iter().enumerate() {
            // An empty routing key is legal (fanout), empty names are not.
            if declaration.exchange.name.trim().is_empty() {
                return Err(TopologyConfigError::BlankName {
                    index,
                    field: "exchange name",
                });
            }
            if declaration.queue.name.trim().is_empty() {
                return Err(TopologyConfigError::BlankName {
                    index,
                    field: "queue name",
                });
            }
        }
        Ok(Self { declarations })
    }

    /// Single-declaration descriptor.
    pub fn single(declaration: Declaration) -> Result<Self, TopologyConfigError> {
        Self::new(vec![declaration])
    }

    /// The order-service deployment: orders, stock responses, stock updates.
    pub fn order_service() -> Self {
        Self {
            declarations: vec![
                Declaration::durable_direct("order.exchange", "order.queue", "order.key"),
                Declaration::durable_direct(
                    "stock.response.exchange",
                    "stock.response.queue",
                    "stock.response.key",
                ),
                Declaration::durable_direct(
                    "stock.update.exchange",
                    "stock.update.queue",
                    "stock.update.key",
                ),
            ],
        }
    }

    /// The declaration orders are published through.
    pub fn primary(&self) -> &Declaration {
        // `new` guarantees at least one entry.
        &self.declarations[0]
    }

    pub fn declarations(&self) -> &[Declaration] {
        &self.declarations
    }
}

impl Default for TopologyDescriptor {
    fn default() -> Self {
        Self::order_service()
    }
}
