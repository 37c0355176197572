//! HTTP ingress integration tests.
//!
//! Starts an axum server on an ephemeral port and exercises it with reqwest.

#![cfg(feature = "http")]

mod support;
mod health;
mod concurrency;
mod disconnect;
