//! Error taxonomy for the publish pipeline.
//!
//! `Validation` is raised by the ingress adapters before the pipeline runs.
//! Every other kind originates inside the pipeline and reaches the adapter
//! unmodified; the adapter alone decides the external signal.

use thiserror::Error;

use crate::bus::BrokerError;

/// Error type for a single publish operation.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Malformed or incomplete external input. Never reaches the broker.
    #[error("invalid payload: {0}")]
    Validation(String),
    /// Connection or channel establishment failed.
    #[error("broker connection failed: {0}")]
    Connectivity(#[source] BrokerError),
    /// A declaration or binding was rejected by the broker.
    #[error("topology declaration rejected: {0}")]
    Topology(#[source] BrokerError),
    /// The payload could not be encoded.
    #[error("payload serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
    /// The emit call itself was rejected.
    #[error("publish rejected: {0}")]
    Publish(#[source] BrokerError),
}

impl RelayError {
    /// Stable label for logs and error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            RelayError::Validation(_) => "validation",
            RelayError::Connectivity(_) => "connectivity",
            RelayError::Topology(_) => "topology",
            RelayError::Serialization(_) => "serialization",
            RelayError::Publish(_) => "publish",
        }
    }

    /// Map this error to an HTTP-style status code.
    pub fn status_code(&self) -> u16 {
        match self {
            RelayError::Validation(_) => 400,
            _ => 500,
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, RelayError::Validation(_))
    }
}
