//! Publish pipeline integration tests.
//!
//! Everything runs against `InMemoryBroker`:
//! - delivery: the message on the broker equals the submitted order
//! - provisioning: repeat declarations are no-ops, conflicts surface
//! - lifecycle: sessions are released under a fault at every stage

mod support;
mod delivery;
mod lifecycle;
