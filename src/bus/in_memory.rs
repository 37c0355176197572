//! In-memory broker for testing and brokerless development.
//!
//! `InMemoryBroker` follows the AMQP 0-9-1 model closely enough to exercise
//! the pipeline without a running broker:
//! - exchanges (direct, fanout, topic, headers), queues and bindings
//! - re-declaration with identical parameters is a no-op; conflicting
//!   parameters fail with `406 PRECONDITION_FAILED` and close the channel
//! - publishing to a missing exchange fails with `404 NOT_FOUND`
//! - `restart()` drops transient declarations and non-persistent messages
//!
//! It also counts connection attempts and open handles, records every
//! close call in order, and can inject a fault at any stage of a session.
//!
//! Nothing consumes the queues. `with_max_length` bounds each queue and the
//! published history, dropping the oldest messages first, so a long-running
//! process using this backend stays within a fixed footprint.
//!
//! ## Example
//!
//! ```
//! use order_relay::bus::{Fault, InMemoryBroker};
//!
//! let broker = InMemoryBroker::new();
//! broker.inject(Fault::Connect);
//! assert_eq!(broker.connection_attempts(), 0);
//! assert!(broker.published().is_empty());
//! ```

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::broker::{
    Broker, BrokerError, Channel, Connection, OutboundMessage, ACCESS_REFUSED, NOT_FOUND,
    PRECONDITION_FAILED,
};
use crate::topology::{ExchangeKind, ExchangeSpec, QueueSpec};

/// A stage of a broker session at which a failure can be injected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Fault {
    /// The broker cannot be reached.
    Connect,
    /// The broker rejects the credentials.
    AccessRefused,
    OpenChannel,
    DeclareExchange,
    DeclareQueue,
    Bind,
    Publish,
    CloseChannel,
    CloseConnection,
}

/// A close call received by the broker, whether or not it succeeded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CloseCall {
    Channel { connection: u64 },
    Connection { id: u64 },
}

/// A binding of a queue to an exchange.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Binding {
    pub queue: String,
    pub exchange: String,
    pub routing_key: String,
}

struct StoredQueue {
    spec: QueueSpec,
    messages: VecDeque<OutboundMessage>,
}

#[derive(Default)]
struct BrokerState {
    exchanges: HashMap<String, ExchangeSpec>,
    queues: HashMap<String, StoredQueue>,
    bindings: Vec<Binding>,
    published: VecDeque<OutboundMessage>,
    max_length: Option<usize>,
    connection_attempts: usize,
    declarations: usize,
    next_handle: u64,
    open_connections: HashSet<u64>,
    /// channel id -> owning connection id
    open_channels: HashMap<u64, u64>,
    channel_owners: HashMap<u64, u64>,
    close_calls: VecDeque<CloseCall>,
    faults: HashSet<Fault>,
}

impl BrokerState {
    fn next_handle(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }

    fn channel_exception(&mut self, channel: u64, code: u16, text: String) -> BrokerError {
        self.open_channels.remove(&channel);
        BrokerError::Rejected { code, text }
    }

    fn ensure_channel_open(&self, channel: u64) -> Result<(), BrokerError> {
        if self.open_channels.contains_key(&channel) {
            Ok(())
        } else {
            Err(BrokerError::ChannelClosed)
        }
    }

    fn route(&mut self, message: &OutboundMessage) {
        let Some(exchange) = self.exchanges.get(&message.exchange) else {
            return;
        };
        let kind = exchange.kind;
        let targets: HashSet<String> = self
            .bindings
            .iter()
            .filter(|b| b.exchange == message.exchange)
            .filter(|b| routing_matches(kind, &b.routing_key, &message.routing_key))
            .map(|b| b.queue.clone())
            .collect();
        let max_length = self.max_length;
        for name in targets {
            if let Some(queue) = self.queues.get_mut(&name) {
                queue.messages.push_back(message.clone());
                truncate_front(&mut queue.messages, max_length);
            }
        }
    }

    fn record_published(&mut self, message: OutboundMessage) {
        self.published.push_back(message);
        truncate_front(&mut self.published, self.max_length);
    }

    fn record_close(&mut self, call: CloseCall) {
        self.close_calls.push_back(call);
        truncate_front(&mut self.close_calls, self.max_length);
    }
}

/// Thread-safe in-memory broker. Clones share the same broker state.
#[derive(Clone)]
pub struct InMemoryBroker {
    state: Arc<Mutex<BrokerState>>,
    latency: Option<Duration>,
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBroker {
    /// Create an empty broker.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(BrokerState::default())),
            latency: None,
        }
    }

    /// Delay every broker round-trip by `latency`, so concurrent sessions
    /// interleave the way they would over a network.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Keep at most `limit` messages per queue, in the published history and
    /// in the close log, dropping the oldest first. Shared by every clone.
    pub fn with_max_length(self, limit: usize) -> Self {
        self.state.lock().max_length = Some(limit);
        self
    }

    /// Make every later call at `fault` fail until `clear_faults`.
    pub fn inject(&self, fault: Fault) {
        self.state.lock().faults.insert(fault);
    }

    pub fn clear_faults(&self) {
        self.state.lock().faults.clear();
    }

    /// Number of `connect` calls, successful or not.
    pub fn connection_attempts(&self) -> usize {
        self.state.lock().connection_attempts
    }

    /// Number of declare/bind calls that reached the broker, including no-ops.
    pub fn declaration_calls(&self) -> usize {
        self.state.lock().declarations
    }

    pub fn open_connections(&self) -> usize {
        self.state.lock().open_connections.len()
    }

    pub fn open_channels(&self) -> usize {
        self.state.lock().open_channels.len()
    }

    /// Every message accepted by the broker, in publish order.
    pub fn published(&self) -> Vec<OutboundMessage> {
        self.state.lock().published.iter().cloned().collect()
    }

    /// Every channel and connection close call, in the order received.
    /// Bounded by `with_max_length` like the published history.
    pub fn close_calls(&self) -> Vec<CloseCall> {
        self.state.lock().close_calls.iter().copied().collect()
    }

    /// Messages currently held by a queue, oldest first.
    pub fn queue_messages(&self, queue: &str) -> Vec<OutboundMessage> {
        self.state
            .lock()
            .queues
            .get(queue)
            .map(|q| q.messages.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn exchange(&self, name: &str) -> Option<ExchangeSpec> {
        self.state.lock().exchanges.get(name).cloned()
    }

    pub fn queue(&self, name: &str) -> Option<QueueSpec> {
        self.state.lock().queues.get(name).map(|q| q.spec.clone())
    }

    pub fn bindings(&self) -> Vec<Binding> {
        self.state.lock().bindings.clone()
    }

    /// Pre-declare an exchange, as if another service had created it.
    pub fn seed_exchange(&self, exchange: ExchangeSpec) {
        self.state
            .lock()
            .exchanges
            .insert(exchange.name.clone(), exchange);
    }

    /// Pre-declare a queue, as if another service had created it.
    pub fn seed_queue(&self, queue: QueueSpec) {
        self.state.lock().queues.insert(
            queue.name.clone(),
            StoredQueue {
                spec: queue,
                messages: VecDeque::new(),
            },
        );
    }

    /// Simulate a broker restart: all connections drop, transient exchanges
    /// and queues disappear, durable queues keep only persistent messages.
    pub fn restart(&self) {
        let mut state = self.state.lock();
        state.open_connections.clear();
        state.open_channels.clear();
        state.exchanges.retain(|_, exchange| exchange.durable);
        state.queues.retain(|_, queue| queue.spec.durable);
        for queue in state.queues.values_mut() {
            queue.messages.retain(|message| message.persistent);
        }
        let BrokerState {
            exchanges,
            queues,
            bindings,
            ..
        } = &mut *state;
        bindings.retain(|b| exchanges.contains_key(&b.exchange) && queues.contains_key(&b.queue));
    }

    /// Wipe every declaration and message, as a brand new broker would be.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.exchanges.clear();
        state.queues.clear();
        state.bindings.clear();
        state.published.clear();
    }

    async fn round_trip(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl Broker for InMemoryBroker {
    async fn connect(&self) -> Result<Box<dyn Connection>, BrokerError> {
        self.round_trip().await;
        let mut state = self.state.lock();
        state.connection_attempts += 1;
        if state.faults.contains(&Fault::Connect) {
            return Err(BrokerError::Unreachable("connection refused".into()));
        }
        if state.faults.contains(&Fault::AccessRefused) {
            return Err(BrokerError::AccessRefused(format!(
                "{ACCESS_REFUSED} ACCESS_REFUSED - login refused"
            )));
        }
        let id = state.next_handle();
        state.open_connections.insert(id);
        Ok(Box::new(InMemoryConnection {
            id,
            broker: self.clone(),
        }))
    }

    fn endpoint(&self) -> String {
        "memory://local".to_string()
    }
}

struct InMemoryConnection {
    id: u64,
    broker: InMemoryBroker,
}

#[async_trait]
impl Connection for InMemoryConnection {
    async fn open_channel(&self) -> Result<Arc<dyn Channel>, BrokerError> {
        self.broker.round_trip().await;
        let mut state = self.broker.state.lock();
        if !state.open_connections.contains(&self.id) {
            return Err(BrokerError::Io("connection reset".into()));
        }
        if state.faults.contains(&Fault::OpenChannel) {
            return Err(BrokerError::Io("channel open timed out".into()));
        }
        let id = state.next_handle();
        state.open_channels.insert(id, self.id);
        state.channel_owners.insert(id, self.id);
        Ok(Arc::new(InMemoryChannel {
            id,
            broker: self.broker.clone(),
        }))
    }

    async fn close(&self) -> Result<(), BrokerError> {
        self.broker.round_trip().await;
        let mut state = self.broker.state.lock();
        state.record_close(CloseCall::Connection { id: self.id });
        let was_open = state.open_connections.remove(&self.id);
        state.open_channels.retain(|_, owner| *owner != self.id);
        if state.faults.contains(&Fault::CloseConnection) {
            return Err(BrokerError::Io("connection reset during close".into()));
        }
        if was_open {
            Ok(())
        } else {
            Err(BrokerError::Io("connection already closed".into()))
        }
    }
}

struct InMemoryChannel {
    id: u64,
    broker: InMemoryBroker,
}

#[async_trait]
impl Channel for InMemoryChannel {
    async fn declare_exchange(&self, exchange: &ExchangeSpec) -> Result<(), BrokerError> {
        self.broker.round_trip().await;
        let mut state = self.broker.state.lock();
        state.ensure_channel_open(self.id)?;
        state.declarations += 1;
        if state.faults.contains(&Fault::DeclareExchange) {
            let text = format!("injected failure declaring exchange '{}'", exchange.name);
            return Err(state.channel_exception(self.id, PRECONDITION_FAILED, text));
        }
        match state.exchanges.get(&exchange.name) {
            Some(existing) if existing == exchange => Ok(()),
            Some(existing) => {
                let text = format!(
                    "PRECONDITION_FAILED - inequivalent arg for exchange '{}': declared type={} durable={}, existing type={} durable={}",
                    exchange.name, exchange.kind, exchange.durable, existing.kind, existing.durable
                );
                Err(state.channel_exception(self.id, PRECONDITION_FAILED, text))
            }
            None => {
                state
                    .exchanges
                    .insert(exchange.name.clone(), exchange.clone());
                Ok(())
            }
        }
    }

    async fn declare_queue(&self, queue: &QueueSpec) -> Result<(), BrokerError> {
        self.broker.round_trip().await;
        let mut state = self.broker.state.lock();
        state.ensure_channel_open(self.id)?;
        state.declarations += 1;
        if state.faults.contains(&Fault::DeclareQueue) {
            let text = format!("injected failure declaring queue '{}'", queue.name);
            return Err(state.channel_exception(self.id, PRECONDITION_FAILED, text));
        }
        match state.queues.get(&queue.name) {
            Some(existing) if existing.spec == *queue => Ok(()),
            Some(existing) => {
                let text = format!(
                    "PRECONDITION_FAILED - inequivalent arg 'durable' for queue '{}': received {} but current is {}",
                    queue.name, queue.durable, existing.spec.durable
                );
                Err(state.channel_exception(self.id, PRECONDITION_FAILED, text))
            }
            None => {
                state.queues.insert(
                    queue.name.clone(),
                    StoredQueue {
                        spec: queue.clone(),
                        messages: VecDeque::new(),
                    },
                );
                Ok(())
            }
        }
    }

    async fn bind_queue(
        &self,
        queue: &str,
        exchange: &str,
        routing_key: &str,
    ) -> Result<(), BrokerError> {
        self.broker.round_trip().await;
        let mut state = self.broker.state.lock();
        state.ensure_channel_open(self.id)?;
        state.declarations += 1;
        if state.faults.contains(&Fault::Bind) {
            let text = format!("injected failure binding '{queue}' to '{exchange}'");
            return Err(state.channel_exception(self.id, PRECONDITION_FAILED, text));
        }
        if !state.exchanges.contains_key(exchange) {
            let text = format!("NOT_FOUND - no exchange '{exchange}'");
            return Err(state.channel_exception(self.id, NOT_FOUND, text));
        }
        if !state.queues.contains_key(queue) {
            let text = format!("NOT_FOUND - no queue '{queue}'");
            return Err(state.channel_exception(self.id, NOT_FOUND, text));
        }
        let binding = Binding {
            queue: queue.to_string(),
            exchange: exchange.to_string(),
            routing_key: routing_key.to_string(),
        };
        if !state.bindings.contains(&binding) {
            state.bindings.push(binding);
        }
        Ok(())
    }

    async fn publish(&self, message: OutboundMessage) -> Result<(), BrokerError> {
        self.broker.round_trip().await;
        let mut state = self.broker.state.lock();
        state.ensure_channel_open(self.id)?;
        if state.faults.contains(&Fault::Publish) {
            return Err(BrokerError::Io("connection reset during publish".into()));
        }
        if !state.exchanges.contains_key(&message.exchange) {
            let text = format!("NOT_FOUND - no exchange '{}'", message.exchange);
            return Err(state.channel_exception(self.id, NOT_FOUND, text));
        }
        state.route(&message);
        state.record_published(message);
        Ok(())
    }

    async fn close(&self) -> Result<(), BrokerError> {
        self.broker.round_trip().await;
        let mut state = self.broker.state.lock();
        let connection = state.channel_owners.remove(&self.id).unwrap_or_default();
        state.record_close(CloseCall::Channel { connection });
        let was_open = state.open_channels.remove(&self.id).is_some();
        if state.faults.contains(&Fault::CloseChannel) {
            return Err(BrokerError::Io("channel close timed out".into()));
        }
        if was_open {
            Ok(())
        } else {
            Err(BrokerError::ChannelClosed)
        }
    }
}

fn truncate_front<T>(items: &mut VecDeque<T>, max_length: Option<usize>) {
    if let Some(limit) = max_length {
        while items.len() > limit {
            items.pop_front();
        }
    }
}

/// Whether a binding key selects a routing key for the given exchange kind.
fn routing_matches(kind: ExchangeKind, binding_key: &str, routing_key: &str) -> bool {
    match kind {
        ExchangeKind::Direct => binding_key == routing_key,
        // Messages carry no headers and bindings no arguments: everything matches.
        ExchangeKind::Fanout | ExchangeKind::Headers => true,
        ExchangeKind::Topic => {
            let pattern: Vec<&str> = binding_key.split('.').collect();
            let words: Vec<&str> = routing_key.split('.').collect();
            topic_matches(&pattern, &words)
        }
    }
}

/// AMQP topic matching: `*` is exactly one word, `#` is zero or more.
fn topic_matches(pattern: &[&str], words: &[&str]) -> bool {
    match pattern.split_first() {
        None => words.is_empty(),
        Some((&"#", rest)) => (0..=words.len()).any(|skip| topic_matches(rest, &words[skip..])),
        Some((&head, rest)) => match words.split_first() {
            Some((&word, tail)) if head == "*" || head == word => topic_matches(rest, tail),
            _ => false,
        },
    }
}
