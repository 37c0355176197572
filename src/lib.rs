//! Reliable order publishing onto an AMQP broker.
//!
//! An order document arrives over HTTP or the command line, is checked for
//! shape, and is published as a persistent JSON message. Each publish runs
//! its own connect → declare → publish → close cycle.

pub mod bus;
pub mod cli;
pub mod config;
mod error;
#[cfg(feature = "http")]
pub mod http;
mod order;
mod relay;
pub mod telemetry;
pub mod topology;

pub use error::RelayError;
pub use order::{Client, OrderPayload, ProductLine, ShippingAddress};
pub use relay::{OrderRelay, Provisioning, PublishReceipt, Stage};
pub use topology::{Declaration, ExchangeKind, TopologyDescriptor};
