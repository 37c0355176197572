//! AMQP 0-9-1 broker client backed by `lapin`.
//!
//! Each `connect` opens a fresh TCP connection; nothing is pooled. Publishes
//! use delivery mode 2 and do not wait on publisher confirms.

use std::sync::Arc;

use async_trait::async_trait;
use lapin::options::{
    BasicPublishOptions, ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::{BasicProperties, ConnectionProperties};

use super::broker::{Broker, BrokerError, Channel, Connection, OutboundMessage, ACCESS_REFUSED};
use crate::config::redact_uri;
use crate::topology::{ExchangeKind, ExchangeSpec, QueueSpec};

const REPLY_SUCCESS: u16 = 200;
const DELIVERY_MODE_PERSISTENT: u8 = 2;

/// Broker reached through an `amqp://` or `amqps://` URI.
#[derive(Clone)]
pub struct AmqpBroker {
    uri: String,
}

impl AmqpBroker {
    pub fn new(uri: impl Into<String>) -> Self {
        Self { uri: uri.into() }
    }
}

#[async_trait]
impl Broker for AmqpBroker {
    async fn connect(&self) -> Result<Box<dyn Connection>, BrokerError> {
        let connection = lapin::Connection::connect(&self.uri, ConnectionProperties::default())
            .await
            .map_err(connect_error)?;
        Ok(Box::new(AmqpConnection { inner: connection }))
    }

    fn endpoint(&self) -> String {
        redact_uri(&self.uri)
    }
}

struct AmqpConnection {
    inner: lapin::Connection,
}

#[async_trait]
impl Connection for AmqpConnection {
    async fn open_channel(&self) -> Result<Arc<dyn Channel>, BrokerError> {
        let channel = self.inner.create_channel().await.map_err(channel_error)?;
        Ok(Arc::new(AmqpChannel { inner: channel }))
    }

    async fn close(&self) -> Result<(), BrokerError> {
        self.inner
            .close(REPLY_SUCCESS, "OK")
            .await
            .map_err(channel_error)
    }
}

struct AmqpChannel {
    inner: lapin::Channel,
}

#[async_trait]
impl Channel for AmqpChannel {
    async fn declare_exchange(&self, exchange: &ExchangeSpec) -> Result<(), BrokerError> {
        let options = ExchangeDeclareOptions {
            durable: exchange.durable,
            ..ExchangeDeclareOptions::default()
        };
        self.inner
            .exchange_declare(
                &exchange.name,
                lapin_kind(exchange.kind),
                options,
                FieldTable::default(),
            )
            .await
            .map_err(channel_error)
    }

    async fn declare_queue(&self, queue: &QueueSpec) -> Result<(), BrokerError> {
        let options = QueueDeclareOptions {
            durable: queue.durable,
            ..QueueDeclareOptions::default()
        };
        self.inner
            .queue_declare(&queue.name, options, FieldTable::default())
            .await
            .map(|_| ())
            .map_err(channel_error)
    }

    async fn bind_queue(
        &self,
        queue: &str,
        exchange: &str,
        routing_key: &str,
    ) -> Result<(), BrokerError> {
        self.inner
            .queue_bind(
                queue,
                exchange,
                routing_key,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(channel_error)
    }

    async fn publish(&self, message: OutboundMessage) -> Result<(), BrokerError> {
        let mut properties = BasicProperties::default();
        if message.persistent {
            properties = properties.with_delivery_mode(DELIVERY_MODE_PERSISTENT);
        }
        if let Some(content_type) = message.content_type {
            properties = properties.with_content_type(content_type.into());
        }
        if let Some(message_id) = message.message_id {
            properties = properties.with_message_id(message_id.into());
        }

        // The returned confirm is dropped: acceptance by the client is the
        // success condition.
        self.inner
            .basic_publish(
                &message.exchange,
                &message.routing_key,
                BasicPublishOptions::default(),
                &message.body,
                properties,
            )
            .await
            .map(|_confirm| ())
            .map_err(channel_error)
    }

    async fn close(&self) -> Result<(), BrokerError> {
        self.inner
            .close(REPLY_SUCCESS, "OK")
            .await
            .map_err(channel_error)
    }
}

fn lapin_kind(kind: ExchangeKind) -> lapin::ExchangeKind {
    match kind {
        ExchangeKind::Direct => lapin::ExchangeKind::Direct,
        ExchangeKind::Fanout => lapin::ExchangeKind::Fanout,
        ExchangeKind::Topic => lapin::ExchangeKind::Topic,
        ExchangeKind::Headers => lapin::ExchangeKind::Headers,
    }
}

fn connect_error(err: lapin::Error) -> BrokerError {
    match &err {
        lapin::Error::ProtocolError(amqp) if amqp.get_id() == ACCESS_REFUSED => {
            BrokerError::AccessRefused(amqp.to_string())
        }
        _ => BrokerError::Unreachable(err.to_string()),
    }
}

fn channel_error(err: lapin::Error) -> BrokerError {
    match &err {
        lapin::Error::ProtocolError(amqp) => BrokerError::Rejected {
            code: amqp.get_id(),
            text: amqp.to_string(),
        },
        lapin::Error::InvalidChannelState(_) | lapin::Error::InvalidConnectionState(_) => {
            BrokerError::ChannelClosed
        }
        _ => BrokerError::Io(err.to_string()),
    }
}
